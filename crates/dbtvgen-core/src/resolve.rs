//! Config resolution
//!
//! Folds the raw `dbtvault` sections discovered across a project into a flat
//! list of validated [`ModelDeclaration`]s. Option precedence, lowest first:
//! built-in defaults, root `defaults`, directory `defaults`, model `options`.

use serde_yaml::{Mapping, Value};
use std::collections::{BTreeMap, HashMap};
use crate::config::{lift_legacy_prefixes, VaultOptions};
use crate::error::{Result, VaultGenError};
use crate::merge::recursive_merge;
use crate::model::{ModelArguments, ModelDeclaration, ModelKind};
use crate::ROOT_LOCATION;

/// Raw `dbtvault` sections keyed by location (`.`, `./models/raw_vault`, ...)
pub type ConfigCollection = BTreeMap<String, Mapping>;

pub const DEFAULTS_KEY: &str = "defaults";
pub const MODELS_KEY: &str = "models";
pub const OPTIONS_KEY: &str = "options";
pub const NAME_KEY: &str = "name";
pub const MODEL_TYPE_KEY: &str = "model_type";
pub const MODEL_KIND_ALIAS: &str = "model_kind";
pub const ARGUMENTS_KEY: &str = "dbtvault_arguments";

const MISSING_NAME: &str = "--NAME MISSING--";

/// Resolve every model declared in `configs`
pub fn resolve_configs(configs: &ConfigCollection) -> Result<Vec<ModelDeclaration>> {
    if configs.is_empty() {
        return Err(VaultGenError::NoConfigFound("the project".to_string()));
    }

    let root_defaults = match configs.get(ROOT_LOCATION) {
        Some(root) => section_mapping(root, DEFAULTS_KEY, ROOT_LOCATION)?,
        None => Mapping::new(),
    };
    let root_defaults = VaultOptions::from_mapping(&root_defaults).map_err(|e| {
        VaultGenError::ConfigInvalid(format!(
            "The defaults at location {} are invalid: {}",
            ROOT_LOCATION, e
        ))
    })?;
    let root_defaults = option_layer(&root_defaults.to_mapping());

    let mut models = Vec::new();
    for (location, fragment) in configs {
        let local_defaults = section_mapping(fragment, DEFAULTS_KEY, location)?;
        let default_config = recursive_merge(&root_defaults, &option_layer(&local_defaults));

        for (index, raw_model) in section_models(fragment, location)?.iter().enumerate() {
            let model = parse_model_definition(raw_model, index, &default_config, location)?;
            tracing::debug!(
                model = %model.name,
                kind = %model.model_type,
                location = %model.location,
                "resolved model declaration"
            );
            models.push(model);
        }
    }

    check_duplicate_names(&models)?;
    Ok(models)
}

/// Build one declaration from its raw mapping
fn parse_model_definition(
    raw_model: &Value,
    index: usize,
    defaults: &Mapping,
    location: &str,
) -> Result<ModelDeclaration> {
    let Value::Mapping(raw_model) = raw_model else {
        return Err(VaultGenError::ConfigInvalid(format!(
            "The entry models[{}] at location {} is not a mapping",
            index, location
        )));
    };

    let name = raw_model.get(NAME_KEY).and_then(Value::as_str);
    let error_prefix = format!(
        "The model at location {} with name {}",
        location,
        name.unwrap_or(MISSING_NAME)
    );

    let raw_kind = raw_model
        .get(MODEL_TYPE_KEY)
        .or_else(|| raw_model.get(MODEL_KIND_ALIAS));
    let kind = match raw_kind.and_then(Value::as_str).map(str::parse::<ModelKind>) {
        Some(Ok(kind)) => kind,
        _ => {
            return Err(VaultGenError::ConfigInvalid(format!(
                "{} has invalid type {}",
                error_prefix,
                raw_kind.map(describe_value).unwrap_or_else(|| "None".to_string())
            )));
        }
    };

    let mut errors = Vec::new();
    if name.is_none() {
        errors.push(format!("{}: field required", NAME_KEY));
    }
    for key in raw_model.keys() {
        let known = matches!(
            key.as_str(),
            Some(NAME_KEY | MODEL_TYPE_KEY | MODEL_KIND_ALIAS | OPTIONS_KEY | ARGUMENTS_KEY)
        );
        if !known {
            errors.push(format!("{}: unknown field", describe_value(key)));
        }
    }

    let model_options = match raw_model.get(OPTIONS_KEY) {
        None | Some(Value::Null) => Mapping::new(),
        Some(Value::Mapping(options)) => options.clone(),
        Some(_) => {
            errors.push(format!("{}: expected a mapping", OPTIONS_KEY));
            Mapping::new()
        }
    };

    let arguments = raw_model.get(ARGUMENTS_KEY).cloned().unwrap_or(Value::Null);
    errors.extend(kind.validate(&arguments, ARGUMENTS_KEY));

    if !errors.is_empty() {
        return Err(VaultGenError::ConfigInvalid(format!(
            "{} raised validation errors on the following fields: [{}]",
            error_prefix,
            errors.join(", ")
        )));
    }

    let options = build_model_config(defaults, &model_options, location).map_err(|e| {
        VaultGenError::ConfigInvalid(format!("{} has invalid options: {}", error_prefix, e))
    })?;
    let arguments = ModelArguments::from_value(kind, arguments).map_err(|e| {
        VaultGenError::ConfigInvalid(format!(
            "{} raised validation errors on the following fields: [{}: {}]",
            error_prefix, ARGUMENTS_KEY, e
        ))
    })?;

    Ok(ModelDeclaration {
        name: name.unwrap_or(MISSING_NAME).to_string(),
        model_type: kind,
        location: location.to_string(),
        options,
        arguments,
    })
}

/// Merge model options onto the location defaults.
///
/// An empty or missing `target_path` never overrides an inherited one; when
/// no layer sets it, the declaring location is used.
fn build_model_config(
    defaults: &Mapping,
    model_options: &Mapping,
    location: &str,
) -> std::result::Result<VaultOptions, serde_yaml::Error> {
    let merged = recursive_merge(defaults, &option_layer(model_options));
    let mut options = VaultOptions::from_mapping(&merged)?;

    if options.target_path.is_empty() {
        options.target_path = location.to_string();
    }
    Ok(options)
}

/// Normalize one layer of options before merging
fn option_layer(options: &Mapping) -> Mapping {
    let mut layer = lift_legacy_prefixes(options);

    let empty_target = match layer.get(VaultOptions::TARGET_PATH_KEY) {
        Some(Value::String(path)) => path.is_empty(),
        Some(Value::Null) => true,
        _ => false,
    };
    if empty_target {
        layer.remove(VaultOptions::TARGET_PATH_KEY);
    }
    layer
}

fn section_mapping(fragment: &Mapping, key: &str, location: &str) -> Result<Mapping> {
    match fragment.get(key) {
        None | Some(Value::Null) => Ok(Mapping::new()),
        Some(Value::Mapping(mapping)) => Ok(mapping.clone()),
        Some(_) => Err(VaultGenError::ConfigInvalid(format!(
            "The `{}` section at location {} must be a mapping",
            key, location
        ))),
    }
}

fn section_models<'a>(fragment: &'a Mapping, location: &str) -> Result<&'a [Value]> {
    match fragment.get(MODELS_KEY) {
        None | Some(Value::Null) => Ok(&[]),
        Some(Value::Sequence(models)) => Ok(models.as_slice()),
        Some(_) => Err(VaultGenError::ConfigInvalid(format!(
            "The `{}` section at location {} must be a list",
            MODELS_KEY, location
        ))),
    }
}

fn check_duplicate_names(models: &[ModelDeclaration]) -> Result<()> {
    let mut seen: HashMap<&str, &str> = HashMap::new();
    let mut duplicates = Vec::new();

    for model in models {
        match seen.get(model.name.as_str()) {
            Some(first_location) => duplicates.push(format!(
                "{}: {} and {}",
                model.name, first_location, model.location
            )),
            None => {
                seen.insert(&model.name, &model.location);
            }
        }
    }

    if duplicates.is_empty() {
        Ok(())
    } else {
        Err(VaultGenError::ConfigInvalid(format!(
            "Duplicate model names detected:\n{}",
            duplicates.join("\n")
        )))
    }
}

fn describe_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => serde_yaml::to_string(other)
            .map(|s| s.trim_end().to_string())
            .unwrap_or_else(|_| "?".to_string()),
    }
}
