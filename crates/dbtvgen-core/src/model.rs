//! Data vault model kinds and their argument records
//!
//! Each of the ten kinds has its own argument struct. The field order of the
//! struct and of its [`FieldSpec`] table is the argument order of the dbtvault
//! macro, so generated SQL is stable byte-for-byte.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_yaml::{Mapping, Value};
use std::fmt;
use std::str::FromStr;
use crate::config::VaultOptions;

/// The ten data vault table archetypes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelKind {
    Stage,
    Hub,
    Link,
    /// Transactional link
    TLink,
    /// Satellite
    Sat,
    /// Effectivity satellite
    EffSat,
    /// Multi-active satellite
    MaSat,
    /// Cross satellite
    Xts,
    /// Point-in-time table
    Pit,
    Bridge,
}

impl ModelKind {
    pub const ALL: [ModelKind; 10] = [
        Self::Stage,
        Self::Hub,
        Self::Link,
        Self::TLink,
        Self::Sat,
        Self::EffSat,
        Self::MaSat,
        Self::Xts,
        Self::Pit,
        Self::Bridge,
    ];

    /// Tag used in dbtvault.yml and in macro names
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Stage => "stage",
            Self::Hub => "hub",
            Self::Link => "link",
            Self::TLink => "t_link",
            Self::Sat => "sat",
            Self::EffSat => "eff_sat",
            Self::MaSat => "ma_sat",
            Self::Xts => "xts",
            Self::Pit => "pit",
            Self::Bridge => "bridge",
        }
    }

    /// `dbtvault.<kind>`
    pub fn default_macro(&self) -> String {
        format!("dbtvault.{}", self.as_str())
    }

    /// Argument fields of this kind in macro order
    pub fn fields(&self) -> &'static [FieldSpec] {
        match self {
            Self::Stage => StageArguments::FIELDS,
            Self::Hub => HubArguments::FIELDS,
            Self::Link => LinkArguments::FIELDS,
            Self::TLink => TLinkArguments::FIELDS,
            Self::Sat => SatArguments::FIELDS,
            Self::EffSat => EffSatArguments::FIELDS,
            Self::MaSat => MaSatArguments::FIELDS,
            Self::Xts => XtsArguments::FIELDS,
            Self::Pit => PitArguments::FIELDS,
            Self::Bridge => BridgeArguments::FIELDS,
        }
    }

    /// Check a raw argument mapping against this kind's field table.
    ///
    /// Returns one message per failing field path; empty when valid.
    pub fn validate(&self, arguments: &Value, path: &str) -> Vec<String> {
        let empty = Mapping::new();
        let mapping = match arguments {
            Value::Mapping(mapping) => mapping,
            Value::Null => &empty,
            _ => return vec![format!("{}: expected a mapping", path)],
        };

        let fields = self.fields();
        let mut errors = Vec::new();

        for spec in fields {
            match mapping.get(spec.name) {
                None | Some(Value::Null) => {
                    if spec.required {
                        errors.push(format!("{}.{}: field required", path, spec.name));
                    }
                }
                Some(value) if !spec.shape.accepts(value) => {
                    errors.push(format!(
                        "{}.{}: expected {}",
                        path,
                        spec.name,
                        spec.shape.describe()
                    ));
                }
                Some(_) => {}
            }
        }

        for key in mapping.keys() {
            let known = key
                .as_str()
                .map(|name| fields.iter().any(|spec| spec.name == name))
                .unwrap_or(false);
            if !known {
                errors.push(format!("{}.{}: unknown field", path, describe_key(key)));
            }
        }

        errors
    }
}

fn describe_key(key: &Value) -> String {
    match key {
        Value::String(s) => s.clone(),
        other => serde_yaml::to_string(other)
            .map(|s| s.trim_end().to_string())
            .unwrap_or_else(|_| "?".to_string()),
    }
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ModelKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| format!("unknown model type '{}'", s))
    }
}

/// Accepted YAML shape of an argument field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldShape {
    Bool,
    Str,
    /// A string or a list of strings
    StrOrList,
    Map,
    /// A string or a mapping
    StrOrMap,
}

impl FieldShape {
    pub fn accepts(&self, value: &Value) -> bool {
        match self {
            Self::Bool => value.is_bool(),
            Self::Str => value.is_string(),
            Self::StrOrList => {
                value.is_string()
                    || value
                        .as_sequence()
                        .map(|items| items.iter().all(Value::is_string))
                        .unwrap_or(false)
            }
            Self::Map => value.is_mapping(),
            Self::StrOrMap => value.is_string() || value.is_mapping(),
        }
    }

    pub fn describe(&self) -> &'static str {
        match self {
            Self::Bool => "a boolean",
            Self::Str => "a string",
            Self::StrOrList => "a string or a list of strings",
            Self::Map => "a mapping",
            Self::StrOrMap => "a string or a mapping",
        }
    }
}

/// One argument of a model kind
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    pub name: &'static str,
    pub shape: FieldShape,
    pub required: bool,
}

const fn required(name: &'static str, shape: FieldShape) -> FieldSpec {
    FieldSpec { name, shape, required: true }
}

const fn optional(name: &'static str, shape: FieldShape) -> FieldSpec {
    FieldSpec { name, shape, required: false }
}

/// A field accepting either a single column name or a list of them
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StringOrList {
    Single(String),
    List(Vec<String>),
}

impl StringOrList {
    /// Canonical list form
    pub fn to_list(&self) -> Vec<String> {
        match self {
            Self::Single(value) => vec![value.clone()],
            Self::List(values) => values.clone(),
        }
    }

    pub fn first(&self) -> Option<&str> {
        match self {
            Self::Single(value) => Some(value),
            Self::List(values) => values.first().map(String::as_str),
        }
    }

    /// Reduce to a single column name, logging when list entries are dropped
    pub fn coerce_single(&self, model: &str, field: &str) -> Option<String> {
        if let Self::List(values) = self {
            if values.len() > 1 {
                tracing::warn!(
                    model,
                    field,
                    kept = %values[0],
                    dropped = values.len() - 1,
                    "composite key coerced to its first column; relationship inference may be incomplete"
                );
            }
        }
        self.first().map(str::to_string)
    }
}

impl From<&str> for StringOrList {
    fn from(value: &str) -> Self {
        Self::Single(value.to_string())
    }
}

/// A field accepting either a single value or a mapping (e.g. a hashdiff
/// `{source_column: ..., alias: ...}`)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StringOrMapping {
    Single(String),
    Mapping(Mapping),
}

/// Common contract of the per-kind argument records
pub trait KindArguments: Serialize + DeserializeOwned + Clone + fmt::Debug {
    const KIND: ModelKind;

    /// Fields in macro argument order
    const FIELDS: &'static [FieldSpec];
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StageArguments {
    #[serde(default = "default_true")]
    pub include_source_columns: bool,
    pub source_model: StringOrMapping,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub derived_columns: Option<Mapping>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub null_columns: Option<Mapping>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hashed_columns: Option<Mapping>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ranked_columns: Option<Mapping>,
}

impl KindArguments for StageArguments {
    const KIND: ModelKind = ModelKind::Stage;
    const FIELDS: &'static [FieldSpec] = &[
        optional("include_source_columns", FieldShape::Bool),
        required("source_model", FieldShape::StrOrMap),
        optional("derived_columns", FieldShape::Map),
        optional("null_columns", FieldShape::Map),
        optional("hashed_columns", FieldShape::Map),
        optional("ranked_columns", FieldShape::Map),
    ];
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HubArguments {
    pub src_pk: StringOrList,
    pub src_nk: StringOrList,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub src_extra_columns: Option<StringOrList>,
    pub src_ldts: String,
    pub src_source: String,
    pub source_model: StringOrList,
}

impl KindArguments for HubArguments {
    const KIND: ModelKind = ModelKind::Hub;
    const FIELDS: &'static [FieldSpec] = &[
        required("src_pk", FieldShape::StrOrList),
        required("src_nk", FieldShape::StrOrList),
        optional("src_extra_columns", FieldShape::StrOrList),
        required("src_ldts", FieldShape::Str),
        required("src_source", FieldShape::Str),
        required("source_model", FieldShape::StrOrList),
    ];
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LinkArguments {
    pub src_pk: StringOrList,
    pub src_fk: StringOrList,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub src_extra_columns: Option<StringOrList>,
    pub src_ldts: String,
    pub src_source: String,
    pub source_model: StringOrList,
}

impl KindArguments for LinkArguments {
    const KIND: ModelKind = ModelKind::Link;
    const FIELDS: &'static [FieldSpec] = &[
        required("src_pk", FieldShape::StrOrList),
        required("src_fk", FieldShape::StrOrList),
        optional("src_extra_columns", FieldShape::StrOrList),
        required("src_ldts", FieldShape::Str),
        required("src_source", FieldShape::Str),
        required("source_model", FieldShape::StrOrList),
    ];
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TLinkArguments {
    pub src_pk: StringOrList,
    pub src_fk: StringOrList,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub src_payload: Option<StringOrList>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub src_extra_columns: Option<StringOrList>,
    pub src_eff: String,
    pub src_ldts: String,
    pub src_source: String,
    pub source_model: String,
}

impl KindArguments for TLinkArguments {
    const KIND: ModelKind = ModelKind::TLink;
    const FIELDS: &'static [FieldSpec] = &[
        required("src_pk", FieldShape::StrOrList),
        required("src_fk", FieldShape::StrOrList),
        optional("src_payload", FieldShape::StrOrList),
        optional("src_extra_columns", FieldShape::StrOrList),
        required("src_eff", FieldShape::Str),
        required("src_ldts", FieldShape::Str),
        required("src_source", FieldShape::Str),
        required("source_model", FieldShape::Str),
    ];
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SatArguments {
    pub src_pk: String,
    pub src_hashdiff: StringOrMapping,
    pub src_payload: StringOrList,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub src_extra_columns: Option<StringOrList>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub src_eff: Option<String>,
    pub src_ldts: String,
    pub src_source: String,
    pub source_model: String,
}

impl KindArguments for SatArguments {
    const KIND: ModelKind = ModelKind::Sat;
    const FIELDS: &'static [FieldSpec] = &[
        required("src_pk", FieldShape::Str),
        required("src_hashdiff", FieldShape::StrOrMap),
        required("src_payload", FieldShape::StrOrList),
        optional("src_extra_columns", FieldShape::StrOrList),
        optional("src_eff", FieldShape::Str),
        required("src_ldts", FieldShape::Str),
        required("src_source", FieldShape::Str),
        required("source_model", FieldShape::Str),
    ];
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EffSatArguments {
    pub src_pk: String,
    pub src_dfk: StringOrList,
    pub src_sfk: StringOrList,
    pub src_start_date: String,
    pub src_end_date: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub src_extra_columns: Option<StringOrList>,
    pub src_eff: String,
    pub src_ldts: String,
    pub src_source: String,
    pub source_model: String,
}

impl KindArguments for EffSatArguments {
    const KIND: ModelKind = ModelKind::EffSat;
    const FIELDS: &'static [FieldSpec] = &[
        required("src_pk", FieldShape::Str),
        required("src_dfk", FieldShape::StrOrList),
        required("src_sfk", FieldShape::StrOrList),
        required("src_start_date", FieldShape::Str),
        required("src_end_date", FieldShape::Str),
        optional("src_extra_columns", FieldShape::StrOrList),
        required("src_eff", FieldShape::Str),
        required("src_ldts", FieldShape::Str),
        required("src_source", FieldShape::Str),
        required("source_model", FieldShape::Str),
    ];
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MaSatArguments {
    pub src_pk: String,
    pub src_cdk: StringOrList,
    pub src_hashdiff: StringOrMapping,
    pub src_payload: StringOrList,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub src_eff: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub src_extra_columns: Option<StringOrList>,
    pub src_ldts: String,
    pub src_source: String,
    pub source_model: String,
}

impl KindArguments for MaSatArguments {
    const KIND: ModelKind = ModelKind::MaSat;
    const FIELDS: &'static [FieldSpec] = &[
        required("src_pk", FieldShape::Str),
        required("src_cdk", FieldShape::StrOrList),
        required("src_hashdiff", FieldShape::StrOrMap),
        required("src_payload", FieldShape::StrOrList),
        optional("src_eff", FieldShape::Str),
        optional("src_extra_columns", FieldShape::StrOrList),
        required("src_ldts", FieldShape::Str),
        required("src_source", FieldShape::Str),
        required("source_model", FieldShape::Str),
    ];
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct XtsArguments {
    pub src_pk: StringOrList,
    pub src_satellite: Mapping,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub src_extra_columns: Option<StringOrList>,
    pub src_ldts: String,
    pub src_source: String,
    pub source_model: StringOrList,
}

impl KindArguments for XtsArguments {
    const KIND: ModelKind = ModelKind::Xts;
    const FIELDS: &'static [FieldSpec] = &[
        required("src_pk", FieldShape::StrOrList),
        required("src_satellite", FieldShape::Map),
        optional("src_extra_columns", FieldShape::StrOrList),
        required("src_ldts", FieldShape::Str),
        required("src_source", FieldShape::Str),
        required("source_model", FieldShape::StrOrList),
    ];
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PitArguments {
    pub src_pk: String,
    pub as_of_dates_table: String,
    /// satellite name -> `{pk: {PK: column}, ldts: {LDTS: column}}`
    pub satellites: Mapping,
    pub stage_tables_ldts: Mapping,
    pub src_ldts: String,
    pub source_model: String,
}

impl KindArguments for PitArguments {
    const KIND: ModelKind = ModelKind::Pit;
    const FIELDS: &'static [FieldSpec] = &[
        required("src_pk", FieldShape::Str),
        required("as_of_dates_table", FieldShape::Str),
        required("satellites", FieldShape::Map),
        required("stage_tables_ldts", FieldShape::Map),
        required("src_ldts", FieldShape::Str),
        required("source_model", FieldShape::Str),
    ];
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BridgeArguments {
    pub source_model: String,
    pub src_pk: String,
    pub src_ldts: String,
    pub bridge_walk: Mapping,
    pub as_of_dates_table: String,
    pub stage_tables_ldts: Mapping,
}

impl KindArguments for BridgeArguments {
    const KIND: ModelKind = ModelKind::Bridge;
    const FIELDS: &'static [FieldSpec] = &[
        required("source_model", FieldShape::Str),
        required("src_pk", FieldShape::Str),
        required("src_ldts", FieldShape::Str),
        required("bridge_walk", FieldShape::Map),
        required("as_of_dates_table", FieldShape::Str),
        required("stage_tables_ldts", FieldShape::Map),
    ];
}

/// Kind-specific arguments of a model declaration
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ModelArguments {
    Stage(StageArguments),
    Hub(HubArguments),
    Link(LinkArguments),
    TLink(TLinkArguments),
    Sat(SatArguments),
    EffSat(EffSatArguments),
    MaSat(MaSatArguments),
    Xts(XtsArguments),
    Pit(PitArguments),
    Bridge(BridgeArguments),
}

impl ModelArguments {
    /// Build the record for `kind` from its raw YAML arguments
    pub fn from_value(kind: ModelKind, value: Value) -> Result<Self, serde_yaml::Error> {
        let value = match value {
            Value::Null => Value::Mapping(Mapping::new()),
            other => other,
        };

        Ok(match kind {
            ModelKind::Stage => Self::Stage(serde_yaml::from_value(value)?),
            ModelKind::Hub => Self::Hub(serde_yaml::from_value(value)?),
            ModelKind::Link => Self::Link(serde_yaml::from_value(value)?),
            ModelKind::TLink => Self::TLink(serde_yaml::from_value(value)?),
            ModelKind::Sat => Self::Sat(serde_yaml::from_value(value)?),
            ModelKind::EffSat => Self::EffSat(serde_yaml::from_value(value)?),
            ModelKind::MaSat => Self::MaSat(serde_yaml::from_value(value)?),
            ModelKind::Xts => Self::Xts(serde_yaml::from_value(value)?),
            ModelKind::Pit => Self::Pit(serde_yaml::from_value(value)?),
            ModelKind::Bridge => Self::Bridge(serde_yaml::from_value(value)?),
        })
    }

    pub fn kind(&self) -> ModelKind {
        match self {
            Self::Stage(_) => ModelKind::Stage,
            Self::Hub(_) => ModelKind::Hub,
            Self::Link(_) => ModelKind::Link,
            Self::TLink(_) => ModelKind::TLink,
            Self::Sat(_) => ModelKind::Sat,
            Self::EffSat(_) => ModelKind::EffSat,
            Self::MaSat(_) => ModelKind::MaSat,
            Self::Xts(_) => ModelKind::Xts,
            Self::Pit(_) => ModelKind::Pit,
            Self::Bridge(_) => ModelKind::Bridge,
        }
    }

    /// Serialized arguments with absent optional fields omitted, in field order
    pub fn to_mapping(&self) -> Result<Mapping, serde_yaml::Error> {
        match serde_yaml::to_value(self)? {
            Value::Mapping(mapping) => Ok(mapping),
            _ => Ok(Mapping::new()),
        }
    }
}

/// A validated model declaration with fully resolved options
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelDeclaration {
    pub name: String,
    pub model_type: ModelKind,
    /// Location key of the dbtvault.yml that declared the model
    pub location: String,
    pub options: VaultOptions,
    #[serde(rename = "dbtvault_arguments")]
    pub arguments: ModelArguments,
}

impl ModelDeclaration {
    /// Model name with the kind prefix applied when prefixing is enabled
    pub fn display_name(&self) -> String {
        self.options.display_name(self.model_type, &self.name)
    }

    /// File name of the generated SQL model
    pub fn sql_file_name(&self) -> String {
        format!("{}.sql", self.display_name())
    }

    pub fn macro_name(&self) -> String {
        self.options.macro_name(self.model_type)
    }
}
