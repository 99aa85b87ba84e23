//! Generator options (the `defaults` / `options` sections of dbtvault.yml)

use serde::{Deserialize, Serialize};
use serde_yaml::{Mapping, Value};
use std::collections::BTreeMap;
use crate::model::ModelKind;

/// Table name prefixes, one per model kind
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TablePrefixes {
    pub stage: String,
    pub hub: String,
    pub link: String,
    pub t_link: String,
    pub sat: String,
    pub eff_sat: String,
    pub ma_sat: String,
    pub xts: String,
    pub pit: String,
    pub bridge: String,
}

impl Default for TablePrefixes {
    fn default() -> Self {
        Self {
            stage: "stg_".to_string(),
            hub: "hub_".to_string(),
            link: "lnk_".to_string(),
            t_link: "tlnk_".to_string(),
            sat: "sat_".to_string(),
            eff_sat: "eff_sat_".to_string(),
            ma_sat: "ma_sat_".to_string(),
            xts: "xts_".to_string(),
            pit: "pit_".to_string(),
            bridge: "bridge_".to_string(),
        }
    }
}

impl TablePrefixes {
    /// Prefix configured for a model kind
    pub fn get(&self, kind: ModelKind) -> &str {
        match kind {
            ModelKind::Stage => &self.stage,
            ModelKind::Hub => &self.hub,
            ModelKind::Link => &self.link,
            ModelKind::TLink => &self.t_link,
            ModelKind::Sat => &self.sat,
            ModelKind::EffSat => &self.eff_sat,
            ModelKind::MaSat => &self.ma_sat,
            ModelKind::Xts => &self.xts,
            ModelKind::Pit => &self.pit,
            ModelKind::Bridge => &self.bridge,
        }
    }
}

/// Fully resolved generator options attached to every model declaration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VaultOptions {
    /// Prefix generated file and table names with the kind prefix
    #[serde(default)]
    pub use_prefix: bool,

    /// Directory (relative to the project root) generated SQL is written to
    #[serde(default)]
    pub target_path: String,

    /// Per-kind table prefixes
    #[serde(default)]
    pub prefixes: TablePrefixes,

    /// Per-kind macro overrides (e.g. `hub: my_package.hub`)
    #[serde(default)]
    pub custom_macros: BTreeMap<ModelKind, String>,
}

impl Default for VaultOptions {
    fn default() -> Self {
        Self {
            use_prefix: false,
            target_path: String::new(),
            prefixes: TablePrefixes::default(),
            custom_macros: BTreeMap::new(),
        }
    }
}

impl VaultOptions {
    pub const TARGET_PATH_KEY: &'static str = "target_path";

    /// Coerce a raw options mapping, filling every missing field with its default
    pub fn from_mapping(mapping: &Mapping) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_value(Value::Mapping(lift_legacy_prefixes(mapping)))
    }

    /// Fully populated mapping form, used as the base of option merges
    pub fn to_mapping(&self) -> Mapping {
        match serde_yaml::to_value(self) {
            Ok(Value::Mapping(mapping)) => mapping,
            // A struct of strings, bools and string maps always serializes to a mapping
            _ => Mapping::new(),
        }
    }

    /// Name of a model with its kind prefix applied when prefixing is enabled
    pub fn display_name(&self, kind: ModelKind, name: &str) -> String {
        if self.use_prefix {
            format!("{}{}", self.prefixes.get(kind), name)
        } else {
            name.to_string()
        }
    }

    /// Macro invoked for a kind: the configured override or `dbtvault.<kind>`
    pub fn macro_name(&self, kind: ModelKind) -> String {
        self.custom_macros
            .get(&kind)
            .cloned()
            .unwrap_or_else(|| kind.default_macro())
    }
}

/// Accept the older `prefixes: {table: {...}}` layout by hoisting the
/// `table` entries one level up
pub fn lift_legacy_prefixes(options: &Mapping) -> Mapping {
    let mut options = options.clone();

    let Some(Value::Mapping(prefixes)) = options.get("prefixes") else {
        return options;
    };
    let Some(Value::Mapping(table)) = prefixes.get("table") else {
        return options;
    };

    let mut lifted = table.clone();
    for (key, value) in prefixes {
        if key.as_str() != Some("table") {
            lifted.insert(key.clone(), value.clone());
        }
    }
    options.insert(Value::from("prefixes"), Value::Mapping(lifted));
    options
}
