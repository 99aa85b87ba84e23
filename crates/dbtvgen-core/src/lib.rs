//! dbtvault-gen Core
//!
//! Core domain model shared by every other crate: the error taxonomy,
//! the default-merge over YAML mappings, resolved generator options,
//! the ten data vault model kinds and the config resolver that turns
//! raw `dbtvault.yml` fragments into validated model declarations.

pub mod error;
pub mod merge;
pub mod config;
pub mod model;
pub mod resolve;

pub use error::{VaultGenError, Result};
pub use merge::recursive_merge;
pub use config::{VaultOptions, TablePrefixes};
pub use model::{
    ModelKind, ModelArguments, ModelDeclaration, StringOrList, StringOrMapping,
    FieldSpec, FieldShape, KindArguments,
    StageArguments, HubArguments, LinkArguments, TLinkArguments, SatArguments,
    EffSatArguments, MaSatArguments, XtsArguments, PitArguments, BridgeArguments,
};
pub use resolve::{resolve_configs, ConfigCollection};

/// Marker file name searched for in every model directory
pub const CONFIG_FILE_NAME: &str = "dbtvault.yml";

/// Top-level key wrapping the generator config inside a marker file
pub const CONFIG_KEY: &str = "dbtvault";

/// Location key of the project root fragment
pub const ROOT_LOCATION: &str = ".";
