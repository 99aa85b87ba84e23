//! schema.yml documents
//!
//! Generated documentation is merged into whatever the user already has in
//! the file: new entries win, existing entries the generator knows nothing
//! about are kept.

use dbtvgen_core::{recursive_merge, Result, VaultGenError};
use serde::{Deserialize, Serialize};
use serde_yaml::{Mapping, Value};
use std::path::Path;

pub const SCHEMA_FILE_NAME: &str = "schema.yml";

/// A dbt properties document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaDocument {
    pub version: u32,

    #[serde(default)]
    pub models: Vec<SchemaModel>,
}

impl Default for SchemaDocument {
    fn default() -> Self {
        Self {
            version: 2,
            models: Vec::new(),
        }
    }
}

/// Model entry of a properties document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaModel {
    pub name: String,

    #[serde(default)]
    pub description: String,

    #[serde(default)]
    pub columns: Vec<SchemaColumn>,
}

/// Column entry of a properties document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaColumn {
    pub name: String,

    #[serde(default)]
    pub description: String,

    #[serde(default)]
    pub data_type: String,

    /// Either plain test names (`unique`) or test mappings
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tests: Option<Vec<Value>>,
}

impl SchemaDocument {
    pub fn new(models: Vec<SchemaModel>) -> Self {
        Self { version: 2, models }
    }

    pub fn to_mapping(&self) -> Result<Mapping> {
        match serde_yaml::to_value(self) {
            Ok(Value::Mapping(mapping)) => Ok(mapping),
            Ok(_) => Err(VaultGenError::DbtArtifact(
                "schema document did not serialize to a mapping".to_string(),
            )),
            Err(e) => Err(VaultGenError::DbtArtifact(e.to_string())),
        }
    }
}

/// Write `document` to `path`, merging it over the existing content unless
/// `overwrite` is set. Parent directories are created as needed.
pub fn merge_and_write(path: &Path, document: &SchemaDocument, overwrite: bool) -> Result<()> {
    let payload = document.to_mapping()?;

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| VaultGenError::io(parent, e))?;
    }

    let merged = if !overwrite && path.is_file() {
        let existing = read_existing(path)?;
        tracing::debug!(path = %path.display(), "merging into existing schema document");
        recursive_merge(&existing, &payload)
    } else {
        payload
    };

    let yaml = serde_yaml::to_string(&merged)
        .map_err(|e| VaultGenError::DbtArtifact(format!("Failed to serialize {}: {}", path.display(), e)))?;
    std::fs::write(path, yaml).map_err(|e| VaultGenError::io(path, e))?;

    tracing::info!(path = %path.display(), models = document.models.len(), "wrote schema document");
    Ok(())
}

fn read_existing(path: &Path) -> Result<Mapping> {
    let contents = std::fs::read_to_string(path).map_err(|e| VaultGenError::io(path, e))?;

    let value: Value = serde_yaml::from_str(&contents).map_err(|e| {
        VaultGenError::DbtArtifact(format!(
            "Existing schema file {} could not be parsed: {}",
            path.display(),
            e
        ))
    })?;

    match value {
        Value::Mapping(mapping) => Ok(mapping),
        Value::Null => Ok(Mapping::new()),
        _ => Err(VaultGenError::DbtArtifact(format!(
            "Existing schema file {} is not a mapping",
            path.display()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn document(description: &str) -> SchemaDocument {
        SchemaDocument::new(vec![SchemaModel {
            name: "hub_customer".to_string(),
            description: description.to_string(),
            columns: vec![SchemaColumn {
                name: "CUSTOMER_HK".to_string(),
                description: String::new(),
                data_type: "BINARY".to_string(),
                tests: Some(vec![Value::from("unique"), Value::from("not_null")]),
            }],
        }])
    }

    #[test]
    fn writes_new_file_with_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("models/raw_vault").join(SCHEMA_FILE_NAME);

        merge_and_write(&path, &document(""), false).unwrap();

        let written: SchemaDocument =
            serde_yaml::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(written, document(""));
    }

    #[test]
    fn merge_keeps_unrelated_entries() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(SCHEMA_FILE_NAME);
        std::fs::write(
            &path,
            "version: 2\nmodels:\n  - name: handwritten\n    description: mine\n",
        )
        .unwrap();

        merge_and_write(&path, &document("generated"), false).unwrap();
        merge_and_write(&path, &document("generated"), false).unwrap();

        let written: SchemaDocument =
            serde_yaml::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        let names: Vec<&str> = written.models.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, vec!["handwritten", "hub_customer"]);
        assert_eq!(written.models[1].columns.len(), 1);
    }

    #[test]
    fn overwrite_replaces_content() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(SCHEMA_FILE_NAME);
        std::fs::write(&path, "version: 2\nmodels:\n  - name: handwritten\n").unwrap();

        merge_and_write(&path, &document(""), true).unwrap();

        let written: SchemaDocument =
            serde_yaml::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(written.models.len(), 1);
    }

    #[test]
    fn unparseable_existing_file_is_an_artifact_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(SCHEMA_FILE_NAME);
        std::fs::write(&path, "models: [oops\n").unwrap();

        let err = merge_and_write(&path, &document(""), false).unwrap_err();
        assert_eq!(err.code(), "DBT_ARTIFACT_ERROR");
    }
}
