//! Generation engine for dbtvault models
//!
//! This crate handles:
//! - Extracting key columns per model kind and matching relationships
//! - Building schema.yml entries from catalog columns
//! - Running external tools (dbt) behind a mockable seam
//! - The SQL and docs generation workflows

pub mod relationships;
pub mod schema_builder;
pub mod exec;
pub mod mock;
pub mod runner;

pub use relationships::{extract_keys, match_relationships, KeyExtractor, RelationshipExtract, RelationshipIndex};
pub use schema_builder::build_entry;
pub use exec::{check_dbt_install, cli_passthrough_args, run_checked, CommandOutput, CommandRunner, ShellRunner, DBT_EXECUTABLE};
pub use mock::MockRunner;
pub use runner::{
    parse_model_names, process_config, DocsGenerator, DocsOptions, DocsReport, RunnerConfig,
    SqlGenerator, SqlReport,
};
