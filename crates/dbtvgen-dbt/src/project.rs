//! dbt_project.yml reader
//!
//! Only the handful of keys the generator needs are read; everything else in
//! the project file is ignored.

use dbtvgen_core::{Result, VaultGenError};
use serde::Deserialize;
use std::path::Path;
use crate::yaml::{read_yaml_file, YamlError};

pub const PROJECT_FILE_NAME: &str = "dbt_project.yml";

/// Used when neither the command line nor the project sets a target path
pub const DEFAULT_TARGET_DIR: &str = "target";

/// Subset of dbt_project.yml
#[derive(Debug, Clone, Default, Deserialize)]
struct DbtProjectFile {
    #[serde(default)]
    name: Option<String>,

    #[serde(default, rename = "model-paths")]
    model_paths: Vec<String>,

    /// Pre dbt 1.0 name of `model-paths`
    #[serde(default, rename = "source-paths")]
    source_paths: Vec<String>,

    #[serde(default, rename = "target-path")]
    target_path: Option<String>,
}

/// The parts of the dbt project configuration the generator relies on
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectConfig {
    /// Project name, if declared
    pub name: Option<String>,

    /// Model directories, relative to the project root
    pub model_dirs: Vec<String>,

    /// Directory dbt writes its artifacts to, relative to the project root
    pub target_dir: String,
}

impl ProjectConfig {
    /// Load from `<project_dir>/dbt_project.yml`
    pub fn from_project_dir(project_dir: &Path, target_override: Option<&str>) -> Result<Self> {
        let project_file = project_dir.join(PROJECT_FILE_NAME);
        if !project_file.is_file() {
            return Err(VaultGenError::ProjectNotConfigured(format!(
                "The specified directory {} is not a valid dbt project (no {} found)",
                project_dir.display(),
                PROJECT_FILE_NAME
            )));
        }

        let value = read_yaml_file(&project_file).map_err(|e| corrupted(&project_file, e))?;
        let parsed: DbtProjectFile = match value {
            serde_yaml::Value::Null => DbtProjectFile::default(),
            value => serde_yaml::from_value(value).map_err(|e| {
                corrupted(
                    &project_file,
                    YamlError::ParseError(project_file.display().to_string(), e.to_string()),
                )
            })?,
        };

        Self::from_parsed(parsed, target_override)
    }

    /// Parse dbt_project.yml content directly
    pub fn from_yaml_str(yaml: &str, target_override: Option<&str>) -> Result<Self> {
        let parsed: DbtProjectFile = serde_yaml::from_str(yaml).map_err(|e| {
            VaultGenError::ProjectNotConfigured(format!(
                "The file {} is corrupted and cannot be read, please fix before continuing: {}",
                PROJECT_FILE_NAME, e
            ))
        })?;
        Self::from_parsed(parsed, target_override)
    }

    fn from_parsed(parsed: DbtProjectFile, target_override: Option<&str>) -> Result<Self> {
        let mut model_dirs: Vec<String> = Vec::new();
        for dir in parsed.model_paths.into_iter().chain(parsed.source_paths) {
            if !model_dirs.contains(&dir) {
                model_dirs.push(dir);
            }
        }

        if model_dirs.is_empty() {
            return Err(VaultGenError::ProjectNotConfigured(
                "This project contains no model directories, code cannot be generated".to_string(),
            ));
        }

        let target_dir = target_override
            .map(str::to_string)
            .or(parsed.target_path)
            .unwrap_or_else(|| DEFAULT_TARGET_DIR.to_string());

        Ok(Self {
            name: parsed.name,
            model_dirs,
            target_dir,
        })
    }
}

fn corrupted(path: &Path, err: YamlError) -> VaultGenError {
    VaultGenError::ProjectNotConfigured(format!(
        "The file {} is corrupted and cannot be read, please fix before continuing: {}",
        path.display(),
        err
    ))
}
