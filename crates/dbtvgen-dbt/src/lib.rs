//! dbt artifact and project file handling
//!
//! This crate handles:
//! - Reading dbt_project.yml (model directories, target directory)
//! - Parsing catalog.json (realized column metadata)
//! - Discovering dbtvault.yml files, including `!include` splicing
//! - Reading, merging and writing schema.yml documents

pub mod project;
pub mod catalog;
pub mod discovery;
pub mod schema_file;
pub mod yaml;

pub use project::{ProjectConfig, DEFAULT_TARGET_DIR, PROJECT_FILE_NAME};
pub use catalog::{Catalog, CatalogModel, CatalogColumn, CatalogError, CATALOG_FILE_NAME};
pub use discovery::discover_configs;
pub use schema_file::{SchemaDocument, SchemaModel, SchemaColumn, merge_and_write, SCHEMA_FILE_NAME};
