//! dbt catalog.json parsing
//!
//! The catalog is produced by `dbt docs generate` and describes the columns
//! each model actually has in the warehouse. Only model nodes are kept.

use dbtvgen_core::VaultGenError;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;

pub const CATALOG_FILE_NAME: &str = "catalog.json";

/// Raw catalog.json structure (subset of fields we care about)
#[derive(Debug, Clone, Deserialize)]
struct CatalogFile {
    #[serde(default)]
    nodes: HashMap<String, CatalogNode>,
}

#[derive(Debug, Clone, Deserialize)]
struct CatalogNode {
    metadata: NodeMetadata,

    #[serde(default)]
    columns: HashMap<String, RawColumn>,
}

#[derive(Debug, Clone, Deserialize)]
struct NodeMetadata {
    name: String,
}

#[derive(Debug, Clone, Deserialize)]
struct RawColumn {
    #[serde(rename = "type")]
    data_type: String,

    #[serde(default)]
    index: Option<u64>,

    #[serde(default)]
    name: Option<String>,
}

/// A realized column
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogColumn {
    pub name: String,
    pub data_type: String,
}

/// A model and its columns in warehouse order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogModel {
    pub name: String,
    pub columns: Vec<CatalogColumn>,
}

/// Model columns keyed by model name
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Catalog {
    models: HashMap<String, CatalogModel>,
}

impl Catalog {
    /// Load `<target_dir>/catalog.json`
    pub fn from_target_dir(target_dir: &Path) -> Result<Self, CatalogError> {
        let path = target_dir.join(CATALOG_FILE_NAME);
        if !path.is_file() {
            return Err(CatalogError::Missing(path.display().to_string()));
        }
        Self::from_file(&path)
    }

    /// Load catalog from file
    pub fn from_file(path: &Path) -> Result<Self, CatalogError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| CatalogError::IoError(path.display().to_string(), e.to_string()))?;

        Self::from_str(&contents)
    }

    /// Parse catalog from JSON string
    pub fn from_str(json: &str) -> Result<Self, CatalogError> {
        let raw: CatalogFile =
            serde_json::from_str(json).map_err(|e| CatalogError::ParseError(e.to_string()))?;

        let models = raw
            .nodes
            .into_iter()
            .filter(|(unique_id, _)| unique_id.starts_with("model."))
            .map(|(_, node)| {
                let model = CatalogModel::from_node(node);
                (model.name.clone(), model)
            })
            .collect();

        Ok(Self { models })
    }

    /// Look up a model by its (display) name
    pub fn get(&self, name: &str) -> Option<&CatalogModel> {
        self.models.get(name)
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }
}

impl CatalogModel {
    fn from_node(node: CatalogNode) -> Self {
        let mut columns: Vec<(Option<u64>, CatalogColumn)> = node
            .columns
            .into_iter()
            .map(|(key, raw)| {
                (
                    raw.index,
                    CatalogColumn {
                        name: raw.name.unwrap_or(key),
                        data_type: raw.data_type,
                    },
                )
            })
            .collect();

        // Columns without an index go last, ties broken by name
        columns.sort_by(|(a_index, a), (b_index, b)| {
            a_index
                .unwrap_or(u64::MAX)
                .cmp(&b_index.unwrap_or(u64::MAX))
                .then_with(|| a.name.cmp(&b.name))
        });

        Self {
            name: node.metadata.name,
            columns: columns.into_iter().map(|(_, column)| column).collect(),
        }
    }
}

/// Errors reading catalog.json
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("Catalog not found at {0}, run `dbt docs generate` or pass --generate-catalog")]
    Missing(String),

    #[error("Failed to read catalog from {0}: {1}")]
    IoError(String, String),

    #[error("Failed to parse catalog JSON: {0}")]
    ParseError(String),
}

impl From<CatalogError> for VaultGenError {
    fn from(err: CatalogError) -> Self {
        VaultGenError::DbtArtifact(err.to_string())
    }
}
