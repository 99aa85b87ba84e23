//! Model SQL rendering
//!
//! Every generated model has the same two-part shape: the kind arguments
//! dumped as YAML into a `yaml_metadata` block, followed by a single call to
//! the kind's macro that looks each argument up from the parsed metadata.

use dbtvgen_core::{FieldSpec, ModelDeclaration, VaultGenError};
use regex::{Captures, Regex};
use serde_yaml::Mapping;
use std::sync::LazyLock;
use crate::validate::{has_jinja, validate_syntax};

const SET_YAML_METADATA: &str = "{%- set yaml_metadata -%}";
const END_SET: &str = "{%- endset -%}";
const SET_METADATA_DICT: &str = "{% set metadata_dict = fromyaml(yaml_metadata) %}";
const ARGUMENT_INDENT: &str = "        ";

/// A `{{ ... }}` expression wrapped in single or double YAML quotes
static QUOTED_JINJA: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"'(\{\{.*?\}\})'|"(\{\{.*?\}\})""#).expect("quoted jinja pattern is valid")
});

/// Error during model rendering
#[derive(Debug, thiserror::Error)]
pub enum TemplateError {
    #[error("Failed to serialize arguments of model '{model}': {message}")]
    Serialize { model: String, message: String },

    #[error("Generated template for model '{model}' is not valid Jinja: {message}")]
    Syntax { model: String, message: String },
}

impl From<TemplateError> for VaultGenError {
    fn from(err: TemplateError) -> Self {
        match err {
            TemplateError::Serialize { model, message } | TemplateError::Syntax { model, message } => {
                VaultGenError::TemplateInvalid { model, message }
            }
        }
    }
}

/// Renders model declarations into dbt SQL model files
#[derive(Debug, Clone, Copy)]
pub struct ModelTemplater {
    validate: bool,
}

impl ModelTemplater {
    /// Templater that checks every payload parses as Jinja
    pub fn new() -> Self {
        Self { validate: true }
    }

    /// Render the SQL body for one declaration
    pub fn render(&self, declaration: &ModelDeclaration) -> Result<String, TemplateError> {
        let rendered = render_model(declaration)?;

        if self.validate {
            validate_syntax(&declaration.name, &rendered).map_err(|message| TemplateError::Syntax {
                model: declaration.name.clone(),
                message,
            })?;
        }

        Ok(rendered)
    }
}

impl Default for ModelTemplater {
    fn default() -> Self {
        Self::new()
    }
}

/// Render a declaration without validating the result
pub fn render_model(declaration: &ModelDeclaration) -> Result<String, TemplateError> {
    let arguments = declaration
        .arguments
        .to_mapping()
        .map_err(|e| TemplateError::Serialize {
            model: declaration.name.clone(),
            message: e.to_string(),
        })?;

    let metadata = render_metadata(&arguments).map_err(|e| TemplateError::Serialize {
        model: declaration.name.clone(),
        message: e.to_string(),
    })?;

    let call = render_macro_call(
        &declaration.macro_name(),
        declaration.model_type.fields(),
        &arguments,
    );

    tracing::debug!(model = %declaration.name, macro_name = %declaration.macro_name(), "rendered model");
    Ok(format!("{}\n\n{}\n", metadata, call))
}

/// The `yaml_metadata` block and the `metadata_dict` assignment
pub fn render_metadata(arguments: &Mapping) -> Result<String, serde_yaml::Error> {
    let yaml = if arguments.is_empty() {
        String::new()
    } else {
        unquote_jinja(&serde_yaml::to_string(arguments)?)
    };

    Ok(format!(
        "{}\n\n{}\n{}\n\n{}",
        SET_YAML_METADATA, yaml, END_SET, SET_METADATA_DICT
    ))
}

/// The macro invocation, one argument per line in field order. Fields absent
/// from `arguments` are passed as `none`.
pub fn render_macro_call(macro_name: &str, fields: &[FieldSpec], arguments: &Mapping) -> String {
    let lines: Vec<String> = fields
        .iter()
        .map(|field| {
            let value = if arguments.contains_key(field.name) {
                format!("metadata_dict['{}']", field.name)
            } else {
                "none".to_string()
            };
            format!("{}{}={}", ARGUMENT_INDENT, field.name, value)
        })
        .collect();

    format!("{{{{\n{}(\n{}\n)\n}}}}", macro_name, lines.join(",\n"))
}

/// Strip the YAML quoting around embedded `{{ ... }}` expressions so dbt
/// renders them before `fromyaml` sees the document
pub fn unquote_jinja(yaml: &str) -> String {
    if !has_jinja(yaml) {
        return yaml.to_string();
    }

    QUOTED_JINJA.replace_all(yaml, |caps: &Captures| {
        if let Some(single) = caps.get(1) {
            single.as_str().replace("''", "'")
        } else if let Some(double) = caps.get(2) {
            double.as_str().replace("\\\"", "\"")
        } else {
            caps[0].to_string()
        }
    })
    .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use dbtvgen_core::{ModelArguments, ModelKind, VaultOptions};
    use pretty_assertions::assert_eq;
    use serde_yaml::Value;

    fn declaration(kind: ModelKind, name: &str, arguments: &str) -> ModelDeclaration {
        let arguments: Value = serde_yaml::from_str(arguments).unwrap();
        ModelDeclaration {
            name: name.to_string(),
            model_type: kind,
            location: ".".to_string(),
            options: VaultOptions::default(),
            arguments: ModelArguments::from_value(kind, arguments).unwrap(),
        }
    }

    fn argument_lines(rendered: &str) -> Vec<String> {
        rendered
            .lines()
            .filter(|line| line.starts_with(ARGUMENT_INDENT))
            .map(|line| line.trim().trim_end_matches(',').to_string())
            .collect()
    }

    const FULL_STAGE: &str = r#"
include_source_columns: false
source_model:
  raw: customers
derived_columns:
  RECORD_SOURCE: "!CRM"
null_columns:
  CUSTOMER_ID: CUSTOMER_ID
hashed_columns:
  CUSTOMER_HK: CUSTOMER_ID
ranked_columns:
  RANK:
    partition_by: CUSTOMER_HK
    order_by: LOAD_DATE
"#;

    #[test]
    fn fully_populated_stage_has_no_none() {
        let stage = declaration(ModelKind::Stage, "customer", FULL_STAGE);
        let rendered = ModelTemplater::new().render(&stage).unwrap();

        assert!(!rendered.contains("=none"));
        assert!(rendered.contains("dbtvault.stage(\n"));
        assert!(rendered.starts_with("{%- set yaml_metadata -%}\n\n"));
        assert!(rendered.ends_with("\n)\n}}\n"));
    }

    #[test]
    fn one_none_per_unset_stage_field() {
        let stage = declaration(ModelKind::Stage, "customer", "source_model: raw_customers\n");
        let rendered = ModelTemplater::new().render(&stage).unwrap();

        assert_eq!(rendered.matches("=none").count(), 4);
        assert_eq!(
            argument_lines(&rendered),
            vec![
                "include_source_columns=metadata_dict['include_source_columns']",
                "source_model=metadata_dict['source_model']",
                "derived_columns=none",
                "null_columns=none",
                "hashed_columns=none",
                "ranked_columns=none",
            ]
        );
    }

    #[test]
    fn exact_hub_output() {
        let hub = declaration(
            ModelKind::Hub,
            "customer",
            "src_pk: CUSTOMER_HK\nsrc_nk: CUSTOMER_ID\nsrc_ldts: LOAD_DATE\nsrc_source: RECORD_SOURCE\nsource_model: stg_customer\n",
        );

        let expected = concat!(
            "{%- set yaml_metadata -%}\n",
            "\n",
            "src_pk: CUSTOMER_HK\n",
            "src_nk: CUSTOMER_ID\n",
            "src_ldts: LOAD_DATE\n",
            "src_source: RECORD_SOURCE\n",
            "source_model: stg_customer\n",
            "\n",
            "{%- endset -%}\n",
            "\n",
            "{% set metadata_dict = fromyaml(yaml_metadata) %}\n",
            "\n",
            "{{\n",
            "dbtvault.hub(\n",
            "        src_pk=metadata_dict['src_pk'],\n",
            "        src_nk=metadata_dict['src_nk'],\n",
            "        src_extra_columns=none,\n",
            "        src_ldts=metadata_dict['src_ldts'],\n",
            "        src_source=metadata_dict['src_source'],\n",
            "        source_model=metadata_dict['source_model']\n",
            ")\n",
            "}}\n",
        );

        assert_eq!(ModelTemplater::new().render(&hub).unwrap(), expected);
    }

    /// Required arguments only, so optional fields show up as `none`
    const MINIMAL_ARGUMENTS: &[(ModelKind, &str)] = &[
        (ModelKind::Stage, "source_model: raw_customers\n"),
        (
            ModelKind::Hub,
            "src_pk: CUSTOMER_HK\nsrc_nk: CUSTOMER_ID\nsrc_ldts: LOAD_DATE\nsrc_source: RECORD_SOURCE\nsource_model: stg_customer\n",
        ),
        (
            ModelKind::Link,
            "src_pk: ORDER_CUSTOMER_HK\nsrc_fk: [ORDER_HK, CUSTOMER_HK]\nsrc_ldts: LOAD_DATE\nsrc_source: RECORD_SOURCE\nsource_model: stg_order\n",
        ),
        (
            ModelKind::TLink,
            "src_pk: TRANSACTION_HK\nsrc_fk: [CUSTOMER_HK, ORDER_HK]\nsrc_eff: EFFECTIVE_FROM\nsrc_ldts: LOAD_DATE\nsrc_source: RECORD_SOURCE\nsource_model: stg_transaction\n",
        ),
        (
            ModelKind::Sat,
            "src_pk: CUSTOMER_HK\nsrc_hashdiff: HASHDIFF\nsrc_payload: [NAME]\nsrc_ldts: LOAD_DATE\nsrc_source: RECORD_SOURCE\nsource_model: stg_customer\n",
        ),
        (
            ModelKind::EffSat,
            "src_pk: ORDER_CUSTOMER_HK\nsrc_dfk: ORDER_HK\nsrc_sfk: CUSTOMER_HK\nsrc_start_date: START_DATE\nsrc_end_date: END_DATE\nsrc_eff: EFFECTIVE_FROM\nsrc_ldts: LOAD_DATE\nsrc_source: RECORD_SOURCE\nsource_model: stg_order\n",
        ),
        (
            ModelKind::MaSat,
            "src_pk: CUSTOMER_HK\nsrc_cdk: [PHONE_TYPE]\nsrc_hashdiff: HASHDIFF\nsrc_payload: [PHONE]\nsrc_ldts: LOAD_DATE\nsrc_source: RECORD_SOURCE\nsource_model: stg_customer_phone\n",
        ),
        (
            ModelKind::Xts,
            "src_pk: CUSTOMER_HK\nsrc_satellite:\n  SATELLITE_CUSTOMER:\n    sat_name: {SATELLITE_NAME: SAT_CUSTOMER}\n    hashdiff: {HASHDIFF: HASHDIFF}\nsrc_ldts: LOAD_DATE\nsrc_source: RECORD_SOURCE\nsource_model: stg_customer\n",
        ),
        (
            ModelKind::Pit,
            "src_pk: CUSTOMER_HK\nas_of_dates_table: AS_OF_DATE\nsatellites:\n  SAT_CUSTOMER:\n    pk: {PK: CUSTOMER_HK}\nstage_tables_ldts: {STG_CUSTOMER: LOAD_DATE}\nsrc_ldts: LOAD_DATE\nsource_model: hub_customer\n",
        ),
        (
            ModelKind::Bridge,
            "source_model: hub_customer\nsrc_pk: CUSTOMER_HK\nsrc_ldts: LOAD_DATE\nbridge_walk:\n  CUSTOMER_ORDER:\n    bridge_link_pk: LINK_CUSTOMER_ORDER_PK\nas_of_dates_table: AS_OF_DATE\nstage_tables_ldts: {STG_CUSTOMER_ORDER: LOAD_DATE}\n",
        ),
    ];

    /// `name=metadata_dict['name']`, or `name=none` for entries written as `name=none`
    fn expected_lines(arguments: &[&str]) -> Vec<String> {
        arguments
            .iter()
            .map(|argument| {
                if argument.ends_with("=none") {
                    argument.to_string()
                } else {
                    format!("{}=metadata_dict['{}']", argument, argument)
                }
            })
            .collect()
    }

    #[test]
    fn macro_arguments_in_order_for_every_kind() {
        let expected: Vec<(ModelKind, Vec<&str>)> = vec![
            (
                ModelKind::Stage,
                vec![
                    "include_source_columns",
                    "source_model",
                    "derived_columns=none",
                    "null_columns=none",
                    "hashed_columns=none",
                    "ranked_columns=none",
                ],
            ),
            (
                ModelKind::Hub,
                vec!["src_pk", "src_nk", "src_extra_columns=none", "src_ldts", "src_source", "source_model"],
            ),
            (
                ModelKind::Link,
                vec!["src_pk", "src_fk", "src_extra_columns=none", "src_ldts", "src_source", "source_model"],
            ),
            (
                ModelKind::TLink,
                vec![
                    "src_pk",
                    "src_fk",
                    "src_payload=none",
                    "src_extra_columns=none",
                    "src_eff",
                    "src_ldts",
                    "src_source",
                    "source_model",
                ],
            ),
            (
                ModelKind::Sat,
                vec![
                    "src_pk",
                    "src_hashdiff",
                    "src_payload",
                    "src_extra_columns=none",
                    "src_eff=none",
                    "src_ldts",
                    "src_source",
                    "source_model",
                ],
            ),
            (
                ModelKind::EffSat,
                vec![
                    "src_pk",
                    "src_dfk",
                    "src_sfk",
                    "src_start_date",
                    "src_end_date",
                    "src_extra_columns=none",
                    "src_eff",
                    "src_ldts",
                    "src_source",
                    "source_model",
                ],
            ),
            (
                ModelKind::MaSat,
                vec![
                    "src_pk",
                    "src_cdk",
                    "src_hashdiff",
                    "src_payload",
                    "src_eff=none",
                    "src_extra_columns=none",
                    "src_ldts",
                    "src_source",
                    "source_model",
                ],
            ),
            (
                ModelKind::Xts,
                vec!["src_pk", "src_satellite", "src_extra_columns=none", "src_ldts", "src_source", "source_model"],
            ),
            (
                ModelKind::Pit,
                vec!["src_pk", "as_of_dates_table", "satellites", "stage_tables_ldts", "src_ldts", "source_model"],
            ),
            (
                ModelKind::Bridge,
                vec!["source_model", "src_pk", "src_ldts", "bridge_walk", "as_of_dates_table", "stage_tables_ldts"],
            ),
        ];
        assert_eq!(expected.len(), MINIMAL_ARGUMENTS.len());

        for ((kind, arguments), (fixture_kind, fixture)) in expected.iter().zip(MINIMAL_ARGUMENTS) {
            assert_eq!(kind, fixture_kind);
            let model = declaration(*kind, "customer", fixture);
            let rendered = ModelTemplater::new().render(&model).unwrap();

            assert!(rendered.contains(&format!("\ndbtvault.{}(\n", kind.as_str())));
            assert_eq!(argument_lines(&rendered), expected_lines(arguments), "argument order of {}", kind);
        }
    }

    #[test]
    fn custom_macro_is_used() {
        let mut sat = declaration(
            ModelKind::Sat,
            "customer_details",
            "src_pk: CUSTOMER_HK\nsrc_hashdiff: HASHDIFF\nsrc_payload: [NAME, EMAIL]\nsrc_ldts: LOAD_DATE\nsrc_source: RECORD_SOURCE\nsource_model: stg_customer\n",
        );
        sat.options
            .custom_macros
            .insert(ModelKind::Sat, "my_package.sat".to_string());

        let rendered = ModelTemplater::new().render(&sat).unwrap();
        assert!(rendered.contains("\nmy_package.sat(\n"));
        assert!(!rendered.contains("dbtvault.sat("));
    }

    #[test]
    fn rendering_is_deterministic() {
        let stage = declaration(ModelKind::Stage, "customer", FULL_STAGE);
        let templater = ModelTemplater::new();
        assert_eq!(templater.render(&stage).unwrap(), templater.render(&stage).unwrap());
    }

    #[test]
    fn embedded_jinja_is_unquoted() {
        let yaml = "source_model: '{{ var(''source'') }}'\nother: \"{{ x }}\"\nplain: value\n";
        assert_eq!(
            unquote_jinja(yaml),
            "source_model: {{ var('source') }}\nother: {{ x }}\nplain: value\n"
        );
    }

    #[test]
    fn stage_with_jinja_value_renders() {
        let stage = declaration(
            ModelKind::Stage,
            "customer",
            "source_model: \"{{ var('customer_source') }}\"\n",
        );
        let rendered = ModelTemplater::new().render(&stage).unwrap();
        assert!(rendered.contains("source_model: {{ var('customer_source') }}\n"));
    }

    #[test]
    fn syntax_errors_convert_to_template_invalid() {
        let err: VaultGenError = TemplateError::Syntax {
            model: "hub".to_string(),
            message: "unexpected end of input".to_string(),
        }
        .into();
        assert_eq!(err.code(), "TEMPLATE_INVALID");
    }
}
