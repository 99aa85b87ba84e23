//! Jinja templating for generated dbtvault models
//!
//! This crate handles:
//! - Rendering model declarations into dbt SQL model files
//! - Unquoting Jinja expressions embedded in YAML metadata
//! - Checking generated payloads are well-formed Jinja

pub mod templater;
pub mod validate;

pub use templater::{ModelTemplater, TemplateError, render_model, render_metadata, render_macro_call, unquote_jinja};
pub use validate::{has_jinja, validate_syntax};
