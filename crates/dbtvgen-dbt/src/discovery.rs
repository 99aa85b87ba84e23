//! dbtvault.yml discovery
//!
//! Walks a model directory and collects the `dbtvault` section of every
//! marker file, keyed by the directory it lives in relative to the project
//! root (`.` for the root itself, `./a/b` otherwise).

use dbtvgen_core::{ConfigCollection, Result, VaultGenError, CONFIG_FILE_NAME, CONFIG_KEY, ROOT_LOCATION};
use serde_yaml::{Mapping, Value};
use std::path::Path;
use walkdir::WalkDir;
use crate::yaml::load_yaml_with_includes;

/// Collect config fragments under `project_dir/subfolder`
///
/// When `recursive` is false only the marker file directly inside the
/// search directory is considered. A search directory that does not exist
/// yields an empty collection.
pub fn discover_configs(project_dir: &Path, subfolder: &str, recursive: bool) -> Result<ConfigCollection> {
    let search_dir = if subfolder.is_empty() || subfolder == ROOT_LOCATION {
        project_dir.to_path_buf()
    } else {
        project_dir.join(subfolder)
    };

    let mut configs = ConfigCollection::new();
    if !search_dir.is_dir() {
        tracing::debug!(dir = %search_dir.display(), "search directory does not exist");
        return Ok(configs);
    }

    let max_depth = if recursive { usize::MAX } else { 1 };
    let walker = WalkDir::new(&search_dir)
        .min_depth(1)
        .max_depth(max_depth)
        .sort_by_file_name();

    for entry in walker.into_iter().filter_map(|e| e.ok()) {
        if !entry.file_type().is_file() || entry.file_name() != CONFIG_FILE_NAME {
            continue;
        }

        let path = entry.path();
        let document = load_yaml_with_includes(path).map_err(|e| {
            VaultGenError::ConfigInvalid(format!("Error reading in file {}: {}", path.display(), e))
        })?;

        let section = match document.get(CONFIG_KEY) {
            Some(Value::Mapping(section)) => section.clone(),
            Some(Value::Null) => Mapping::new(),
            Some(_) => {
                return Err(VaultGenError::ConfigInvalid(format!(
                    "The '{}' key in {} must hold a mapping",
                    CONFIG_KEY,
                    path.display()
                )))
            }
            None => {
                tracing::debug!(file = %path.display(), "no '{}' key, skipping", CONFIG_KEY);
                continue;
            }
        };

        let dir = path.parent().unwrap_or(project_dir);
        let location = location_key(project_dir, dir);
        tracing::debug!(location = %location, "found config fragment");
        configs.insert(location, section);
    }

    Ok(configs)
}

/// Location key of a directory relative to the project root
pub fn location_key(project_dir: &Path, dir: &Path) -> String {
    let Ok(relative) = dir.strip_prefix(project_dir) else {
        return dir.display().to_string();
    };

    let parts: Vec<String> = relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();

    if parts.is_empty() {
        ROOT_LOCATION.to_string()
    } else {
        format!("{}/{}", ROOT_LOCATION, parts.join("/"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::fs;

    fn write(root: &Path, rel: &str, contents: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, contents).unwrap();
    }

    #[test]
    fn location_keys() {
        let root = Path::new("/project");
        assert_eq!(location_key(root, root), ".");
        assert_eq!(location_key(root, &root.join("models/raw_vault")), "./models/raw_vault");
    }

    #[test]
    fn recursive_and_flat_discovery() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "models/dbtvault.yml", "dbtvault:\n  defaults: {}\n");
        write(dir.path(), "models/raw_vault/dbtvault.yml", "dbtvault:\n  models: []\n");
        write(dir.path(), "models/other/dbtvault.yml", "unrelated: true\n");

        let all = discover_configs(dir.path(), "models", true).unwrap();
        assert_eq!(
            all.keys().cloned().collect::<Vec<_>>(),
            vec!["./models".to_string(), "./models/raw_vault".to_string()]
        );

        let flat = discover_configs(dir.path(), "models", false).unwrap();
        assert_eq!(flat.keys().cloned().collect::<Vec<_>>(), vec!["./models".to_string()]);
    }

    #[test]
    fn root_marker_uses_root_location() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "dbtvault.yml", "dbtvault:\n  defaults:\n    use_prefix: true\n");

        let configs = discover_configs(dir.path(), "", false).unwrap();
        assert!(configs.contains_key("."));
    }

    #[test]
    fn missing_folder_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        assert!(discover_configs(dir.path(), "nowhere", true).unwrap().is_empty());
    }

    #[test]
    fn unreadable_yaml_is_config_invalid() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "models/dbtvault.yml", "dbtvault: [broken\n");

        let err = discover_configs(dir.path(), "models", true).unwrap_err();
        assert!(matches!(err, VaultGenError::ConfigInvalid(_)));
    }
}
