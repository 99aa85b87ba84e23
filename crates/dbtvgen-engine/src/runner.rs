//! Generation workflows
//!
//! Both workflows start from the same resolved configuration: the project
//! file, every discovered dbtvault.yml and the model declarations they
//! resolve to.

use crate::exec::{check_dbt_install, cli_passthrough_args, run_checked, CommandRunner, DBT_EXECUTABLE};
use crate::relationships::match_relationships;
use crate::schema_builder::build_entry;
use dbtvgen_core::{resolve_configs, ModelDeclaration, Result, VaultGenError};
use dbtvgen_dbt::{
    discover_configs, merge_and_write, Catalog, ProjectConfig, SchemaDocument, SchemaModel,
    SCHEMA_FILE_NAME,
};
use dbtvgen_jinja::ModelTemplater;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Resolved state shared by every workflow
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    pub project_dir: PathBuf,
    pub project: ProjectConfig,
    /// Locations of the config fragments that were found
    pub locations: Vec<String>,
    pub models: Vec<ModelDeclaration>,
}

impl RunnerConfig {
    /// dbt artifact directory
    pub fn target_dir(&self) -> PathBuf {
        self.project_dir.join(&self.project.target_dir)
    }

    /// Where the SQL file of a model is generated
    pub fn sql_path(&self, model: &ModelDeclaration) -> PathBuf {
        self.project_dir
            .join(&model.options.target_path)
            .join(model.sql_file_name())
    }
}

/// Read the project, discover config fragments and resolve every model.
///
/// The project root is searched non-recursively first, then every model
/// directory recursively.
pub fn process_config(project_dir: &Path, target_override: Option<&str>) -> Result<RunnerConfig> {
    let project = ProjectConfig::from_project_dir(project_dir, target_override)?;

    let mut configs = discover_configs(project_dir, "", false)?;

    let mut model_dirs = project.model_dirs.clone();
    model_dirs.sort();
    model_dirs.dedup();
    for model_dir in &model_dirs {
        configs.extend(discover_configs(project_dir, model_dir, true)?);
    }

    let locations: Vec<String> = configs.keys().cloned().collect();
    let models = resolve_configs(&configs)?;

    tracing::info!(
        project = %project_dir.display(),
        fragments = locations.len(),
        models = models.len(),
        "resolved dbtvault configuration"
    );

    Ok(RunnerConfig {
        project_dir: project_dir.to_path_buf(),
        project,
        locations,
        models,
    })
}

/// Outcome of a SQL generation run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SqlReport {
    pub written: Vec<PathBuf>,
    /// Existing files left untouched
    pub skipped: Vec<PathBuf>,
}

/// Writes one SQL model file per declaration
#[derive(Debug, Clone, Default)]
pub struct SqlGenerator {
    templater: ModelTemplater,
}

impl SqlGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn run(&self, project_dir: &Path, overwrite: bool) -> Result<SqlReport> {
        let config = process_config(project_dir, None)?;
        let mut report = SqlReport::default();

        for model in &config.models {
            let rendered = self.templater.render(model)?;
            let path = config.sql_path(model);

            if path.is_file() && !overwrite {
                tracing::debug!(path = %path.display(), "file exists, skipping");
                report.skipped.push(path);
                continue;
            }

            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent).map_err(|e| VaultGenError::io(parent, e))?;
            }
            std::fs::write(&path, rendered).map_err(|e| VaultGenError::io(&path, e))?;

            tracing::info!(model = %model.name, path = %path.display(), "wrote model");
            report.written.push(path);
        }

        Ok(report)
    }
}

/// Settings of a docs generation run
#[derive(Debug, Clone, Default)]
pub struct DocsOptions {
    /// Overrides the project's `target-path`
    pub target_path: Option<String>,
    /// Inline YAML, e.g. `{model_names: [hub_customer]}`
    pub args: Option<String>,
    pub overwrite: bool,
    /// Run `dbt docs generate` before reading the catalog
    pub generate_catalog: bool,
}

/// Outcome of a docs generation run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DocsReport {
    pub written: Vec<PathBuf>,
    pub documented: Vec<String>,
    /// Models left out because the catalog has no entry for them
    pub missing_from_catalog: Vec<String>,
}

/// `--args` payload of the docs command
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct DocsArgs {
    model_names: Option<Vec<String>>,
}

/// Parse the `model_names` selection out of the inline YAML arguments.
///
/// Missing, blank or `{}` arguments select every model. Any other mapping must
/// carry a non-empty `model_names` list and nothing else.
pub fn parse_model_names(args: Option<&str>) -> Result<Vec<String>> {
    let Some(args) = args.filter(|args| !args.trim().is_empty()) else {
        return Ok(Vec::new());
    };

    let value: serde_yaml::Value = serde_yaml::from_str(args).map_err(|_| {
        VaultGenError::ArgParse("The arguments passed in the --args field is not a valid yml string".to_string())
    })?;
    match &value {
        serde_yaml::Value::Null => return Ok(Vec::new()),
        serde_yaml::Value::Mapping(mapping) if mapping.is_empty() => return Ok(Vec::new()),
        serde_yaml::Value::Mapping(_) => {}
        _ => {
            return Err(VaultGenError::ArgParse(
                "The --args field must be a YAML mapping".to_string(),
            ))
        }
    }

    let parsed: DocsArgs = serde_yaml::from_value(value).map_err(|e| {
        VaultGenError::ArgParse(format!(
            "The --args field must be a mapping whose model_names is a list of strings: {}",
            e
        ))
    })?;
    match parsed.model_names {
        Some(names) if !names.is_empty() => Ok(names),
        _ => Err(VaultGenError::ArgParse(
            "The --args field must name at least one model in model_names".to_string(),
        )),
    }
}

/// Writes schema.yml documentation for generated models from the dbt catalog
pub struct DocsGenerator<R: CommandRunner> {
    runner: R,
}

impl<R: CommandRunner> DocsGenerator<R> {
    pub fn new(runner: R) -> Self {
        Self { runner }
    }

    pub fn run(&self, project_dir: &Path, options: &DocsOptions) -> Result<DocsReport> {
        let version = check_dbt_install(&self.runner)?;
        tracing::debug!(%version, "dbt is available");

        let config = process_config(project_dir, options.target_path.as_deref())?;
        let model_names = parse_model_names(options.args.as_deref())?;

        if options.generate_catalog {
            self.generate_catalog(&config)?;
        }
        let catalog = Catalog::from_target_dir(&config.target_dir())?;

        let selected = select_models(&config.models, &model_names);
        let named: Vec<(String, &ModelDeclaration)> = selected
            .into_iter()
            .map(|model| (model.display_name(), model))
            .collect();
        let relationships = match_relationships(&named);

        let mut report = DocsReport::default();
        let mut by_location: BTreeMap<&str, Vec<SchemaModel>> = BTreeMap::new();
        for (name, model) in &named {
            let Some(catalog_model) = catalog.get(name) else {
                tracing::warn!(model = %name, "model not found in catalog, run dbt before generating docs");
                report.missing_from_catalog.push(name.clone());
                continue;
            };

            let primary_key = relationships.primary_key(name);
            let entry = build_entry(name, primary_key, catalog_model, relationships.references(name));
            by_location
                .entry(model.options.target_path.as_str())
                .or_default()
                .push(entry);
            report.documented.push(name.clone());
        }

        for (location, models) in by_location {
            let path = config.project_dir.join(location).join(SCHEMA_FILE_NAME);
            merge_and_write(&path, &SchemaDocument::new(models), options.overwrite)?;
            report.written.push(path);
        }

        Ok(report)
    }

    fn generate_catalog(&self, config: &RunnerConfig) -> Result<()> {
        let mut args = vec!["docs".to_string(), "generate".to_string()];
        args.extend(cli_passthrough_args(&[
            ("project_dir", Some(config.project_dir.display().to_string())),
            ("target_path", Some(config.project.target_dir.clone())),
        ]));

        tracing::info!("running dbt docs generate");
        run_checked(&self.runner, DBT_EXECUTABLE, &args)?;
        Ok(())
    }
}

/// Models matching the requested names (by name or display name), or all of
/// them when no names were requested
fn select_models<'a>(models: &'a [ModelDeclaration], names: &[String]) -> Vec<&'a ModelDeclaration> {
    if names.is_empty() {
        return models.iter().collect();
    }

    for name in names {
        let known = models
            .iter()
            .any(|model| &model.name == name || &model.display_name() == name);
        if !known {
            tracing::warn!(model = %name, "requested model is not declared in any dbtvault.yml");
        }
    }

    models
        .iter()
        .filter(|model| names.contains(&model.name) || names.contains(&model.display_name()))
        .collect()
}
