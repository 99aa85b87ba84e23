//! YAML file loading with `!include` support
//!
//! `key: !include relative/path.yml` is replaced by the parsed content of the
//! referenced file, resolved relative to the file containing the tag. A
//! top-level `version` key of the included document is dropped so that shared
//! snippets can also be valid dbt YAML files on their own.

use serde_yaml::value::TaggedValue;
use serde_yaml::{Mapping, Value};
use std::path::Path;

/// Tag name of the include directive
pub const INCLUDE_TAG: &str = "include";

/// Nesting limit for includes, guards against include cycles
pub const MAX_INCLUDE_DEPTH: usize = 16;

/// YAML loading errors
#[derive(Debug, thiserror::Error)]
pub enum YamlError {
    #[error("Failed to read {0}: {1}")]
    IoError(String, String),

    #[error("Failed to parse YAML in {0}: {1}")]
    ParseError(String, String),

    #[error("Invalid include in {0}: {1}")]
    IncludeError(String, String),
}

/// Read and parse a YAML file without resolving includes
pub fn read_yaml_file(path: &Path) -> Result<Value, YamlError> {
    let contents = std::fs::read_to_string(path)
        .map_err(|e| YamlError::IoError(path.display().to_string(), e.to_string()))?;

    serde_yaml::from_str(&contents)
        .map_err(|e| YamlError::ParseError(path.display().to_string(), e.to_string()))
}

/// Read a YAML file and splice in every `!include`d document
pub fn load_yaml_with_includes(path: &Path) -> Result<Value, YamlError> {
    load(path, 0)
}

fn load(path: &Path, depth: usize) -> Result<Value, YamlError> {
    if depth > MAX_INCLUDE_DEPTH {
        return Err(YamlError::IncludeError(
            path.display().to_string(),
            format!("includes nested deeper than {} levels", MAX_INCLUDE_DEPTH),
        ));
    }

    let value = read_yaml_file(path)?;
    let base_dir = path.parent().unwrap_or_else(|| Path::new("."));
    resolve_includes(value, path, base_dir, depth)
}

fn resolve_includes(value: Value, file: &Path, base_dir: &Path, depth: usize) -> Result<Value, YamlError> {
    match value {
        Value::Tagged(tagged) => {
            let TaggedValue { tag, value } = *tagged;
            if tag == INCLUDE_TAG {
                let Value::String(relative) = value else {
                    return Err(YamlError::IncludeError(
                        file.display().to_string(),
                        "!include expects a relative file path".to_string(),
                    ));
                };
                tracing::debug!(from = %file.display(), include = %relative, "resolving include");
                let included = load(&base_dir.join(&relative), depth + 1)?;
                Ok(strip_version(included))
            } else {
                let value = resolve_includes(value, file, base_dir, depth)?;
                Ok(Value::Tagged(Box::new(TaggedValue { tag, value })))
            }
        }
        Value::Mapping(mapping) => {
            let mut resolved = Mapping::with_capacity(mapping.len());
            for (key, value) in mapping {
                resolved.insert(key, resolve_includes(value, file, base_dir, depth)?);
            }
            Ok(Value::Mapping(resolved))
        }
        Value::Sequence(items) => items
            .into_iter()
            .map(|item| resolve_includes(item, file, base_dir, depth))
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Sequence),
        other => Ok(other),
    }
}

fn strip_version(value: Value) -> Value {
    match value {
        Value::Mapping(mut mapping) => {
            mapping.remove("version");
            Value::Mapping(mapping)
        }
        other => other,
    }
}
