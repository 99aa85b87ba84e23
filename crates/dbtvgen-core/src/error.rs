//! Error taxonomy
//!
//! Every failure surfaced to the command line maps onto exactly one variant.
//! The codes returned by [`VaultGenError::code`] are stable identifiers and
//! are printed alongside the message, so never rename them.

/// Errors raised while reading, resolving or generating dbtvault models
#[derive(Debug, thiserror::Error)]
pub enum VaultGenError {
    /// Malformed inline YAML argument or argument shape
    #[error("{0}")]
    ArgParse(String),

    /// Missing or corrupt dbt_project.yml, or no model directories declared
    #[error("{0}")]
    ProjectNotConfigured(String),

    /// Unknown model kind, field validation failure or duplicate model names
    #[error("{0}")]
    ConfigInvalid(String),

    /// Discovery produced no usable config fragments
    #[error("No dbtvault.yml configuration was found in {0}")]
    NoConfigFound(String),

    /// The dbt executable is not available in the environment
    #[error("{0}")]
    NoExternalToolInstall(String),

    /// External tool exited unsuccessfully
    #[error("Call to `{command}` did not exit with code 0 (status {status}), output: {output}")]
    SubprocessFailed {
        command: String,
        status: String,
        output: String,
    },

    /// catalog.json or an existing schema document could not be used
    #[error("{0}")]
    DbtArtifact(String),

    /// A rendered model is not well-formed Jinja
    #[error("Generated template for model '{model}' is not valid Jinja: {message}")]
    TemplateInvalid { model: String, message: String },

    /// File system failure
    #[error("Failed to access {path}: {message}")]
    Io { path: String, message: String },
}

impl VaultGenError {
    /// Stable machine-readable code for this error kind
    pub fn code(&self) -> &'static str {
        match self {
            Self::ArgParse(_) => "ARG_PARSE_ERROR",
            Self::ProjectNotConfigured(_) => "PROJECT_NOT_CONFIGURED",
            Self::ConfigInvalid(_) => "CONFIG_INVALID",
            Self::NoConfigFound(_) => "NO_CONFIG_FOUND",
            Self::NoExternalToolInstall(_) => "NO_DBT_INSTALL",
            Self::SubprocessFailed { .. } => "SUBPROCESS_FAILED",
            Self::DbtArtifact(_) => "DBT_ARTIFACT_ERROR",
            Self::TemplateInvalid { .. } => "TEMPLATE_INVALID",
            Self::Io { .. } => "IO_ERROR",
        }
    }

    /// Whether the error stems from how the tool was invoked rather than
    /// from project content
    pub fn is_usage_error(&self) -> bool {
        matches!(self, Self::ArgParse(_) | Self::ProjectNotConfigured(_))
    }

    /// Build an I/O error for a path
    pub fn io(path: impl AsRef<std::path::Path>, err: impl std::fmt::Display) -> Self {
        Self::Io {
            path: path.as_ref().display().to_string(),
            message: err.to_string(),
        }
    }
}

/// Result alias used across the workspace
pub type Result<T> = std::result::Result<T, VaultGenError>;
