//! Relationship inference between vault models
//!
//! Keys are matched purely by column name: a foreign key column of one model
//! that is the primary key of a hub, link or t_link points at that model.

use dbtvgen_core::{
    BridgeArguments, EffSatArguments, HubArguments, LinkArguments, MaSatArguments, ModelArguments,
    ModelDeclaration, ModelKind, PitArguments, SatArguments, StageArguments, TLinkArguments,
    XtsArguments,
};
use serde_yaml::Value;
use std::collections::{BTreeMap, HashMap};

/// Key columns declared by one model
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RelationshipExtract {
    pub primary_key: Option<String>,
    pub foreign_keys: Vec<String>,
}

impl RelationshipExtract {
    fn foreign(foreign_keys: Vec<String>) -> Self {
        Self {
            primary_key: None,
            foreign_keys,
        }
    }
}

/// Outcome of matching a set of models, keyed by display name
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RelationshipIndex {
    primary_keys: BTreeMap<String, String>,
    /// Foreign key column -> display name of the model owning it as primary key
    references: BTreeMap<String, BTreeMap<String, String>>,
}

impl RelationshipIndex {
    /// Primary key column of a model, when its kind declares one
    pub fn primary_key(&self, model: &str) -> Option<&str> {
        self.primary_keys.get(model).map(String::as_str)
    }

    /// Resolved foreign keys of a model; `None` when nothing matched
    pub fn references(&self, model: &str) -> Option<&BTreeMap<String, String>> {
        self.references.get(model)
    }

    /// Number of models with at least one resolved foreign key
    pub fn len(&self) -> usize {
        self.references.len()
    }

    pub fn is_empty(&self) -> bool {
        self.references.is_empty()
    }
}

/// Per-kind key extraction
pub trait KeyExtractor {
    /// `model` is only used to attribute log messages
    fn extract_keys(&self, model: &str) -> RelationshipExtract;
}

impl KeyExtractor for StageArguments {
    fn extract_keys(&self, _model: &str) -> RelationshipExtract {
        RelationshipExtract::default()
    }
}

impl KeyExtractor for HubArguments {
    fn extract_keys(&self, model: &str) -> RelationshipExtract {
        RelationshipExtract {
            primary_key: self.src_pk.coerce_single(model, "src_pk"),
            foreign_keys: Vec::new(),
        }
    }
}

impl KeyExtractor for LinkArguments {
    fn extract_keys(&self, model: &str) -> RelationshipExtract {
        RelationshipExtract {
            primary_key: self.src_pk.coerce_single(model, "src_pk"),
            foreign_keys: self.src_fk.to_list(),
        }
    }
}

impl KeyExtractor for TLinkArguments {
    fn extract_keys(&self, model: &str) -> RelationshipExtract {
        RelationshipExtract {
            primary_key: self.src_pk.coerce_single(model, "src_pk"),
            foreign_keys: self.src_fk.to_list(),
        }
    }
}

impl KeyExtractor for SatArguments {
    fn extract_keys(&self, _model: &str) -> RelationshipExtract {
        RelationshipExtract::foreign(vec![self.src_pk.clone()])
    }
}

impl KeyExtractor for EffSatArguments {
    fn extract_keys(&self, model: &str) -> RelationshipExtract {
        let mut foreign_keys = vec![self.src_pk.clone()];
        foreign_keys.extend(self.src_dfk.coerce_single(model, "src_dfk"));
        foreign_keys.extend(self.src_sfk.coerce_single(model, "src_sfk"));
        RelationshipExtract::foreign(foreign_keys)
    }
}

impl KeyExtractor for MaSatArguments {
    fn extract_keys(&self, _model: &str) -> RelationshipExtract {
        let mut foreign_keys = vec![self.src_pk.clone()];
        foreign_keys.extend(self.src_cdk.to_list());
        RelationshipExtract::foreign(foreign_keys)
    }
}

impl KeyExtractor for XtsArguments {
    fn extract_keys(&self, _model: &str) -> RelationshipExtract {
        RelationshipExtract::foreign(self.src_pk.to_list())
    }
}

impl KeyExtractor for PitArguments {
    fn extract_keys(&self, _model: &str) -> RelationshipExtract {
        let foreign_keys = self
            .satellites
            .values()
            .filter_map(|satellite| satellite.get("pk"))
            .filter_map(first_string)
            .collect();

        RelationshipExtract {
            primary_key: Some(self.src_pk.clone()),
            foreign_keys,
        }
    }
}

impl KeyExtractor for BridgeArguments {
    fn extract_keys(&self, model: &str) -> RelationshipExtract {
        tracing::warn!(model, "relationship inference is not implemented for bridge models");
        RelationshipExtract::default()
    }
}

impl KeyExtractor for ModelArguments {
    fn extract_keys(&self, model: &str) -> RelationshipExtract {
        match self {
            Self::Stage(args) => args.extract_keys(model),
            Self::Hub(args) => args.extract_keys(model),
            Self::Link(args) => args.extract_keys(model),
            Self::TLink(args) => args.extract_keys(model),
            Self::Sat(args) => args.extract_keys(model),
            Self::EffSat(args) => args.extract_keys(model),
            Self::MaSat(args) => args.extract_keys(model),
            Self::Xts(args) => args.extract_keys(model),
            Self::Pit(args) => args.extract_keys(model),
            Self::Bridge(args) => args.extract_keys(model),
        }
    }
}

/// `customer_hk` or `{PK: customer_hk}`
fn first_string(value: &Value) -> Option<String> {
    match value {
        Value::String(column) => Some(column.clone()),
        Value::Mapping(mapping) => mapping.values().find_map(|v| v.as_str().map(str::to_string)),
        _ => None,
    }
}

/// Key columns of a declaration
pub fn extract_keys(declaration: &ModelDeclaration) -> RelationshipExtract {
    declaration.arguments.extract_keys(&declaration.name)
}

/// Kinds whose primary key other models can reference
fn owns_primary_key(kind: ModelKind) -> bool {
    matches!(kind, ModelKind::Hub | ModelKind::Link | ModelKind::TLink)
}

/// Match every model's foreign keys against the primary keys of hubs, links
/// and t_links. `models` pairs each declaration with its display name.
///
/// Keys are extracted once per model. A model never references itself and
/// models without any match get no references.
pub fn match_relationships(models: &[(String, &ModelDeclaration)]) -> RelationshipIndex {
    let extracts: Vec<(&str, ModelKind, RelationshipExtract)> = models
        .iter()
        .map(|(name, declaration)| (name.as_str(), declaration.model_type, extract_keys(declaration)))
        .collect();

    let mut owners: HashMap<&str, &str> = HashMap::new();
    for (name, kind, extract) in &extracts {
        if !owns_primary_key(*kind) {
            continue;
        }
        let Some(primary_key) = extract.primary_key.as_deref() else {
            continue;
        };
        if let Some(previous) = owners.insert(primary_key, *name) {
            tracing::warn!(
                primary_key,
                previous,
                replacement = *name,
                "primary key declared by more than one model, keeping the later one"
            );
        }
    }

    let mut index = RelationshipIndex::default();
    for (name, _, extract) in &extracts {
        if let Some(primary_key) = &extract.primary_key {
            index.primary_keys.insert(name.to_string(), primary_key.clone());
        }
        for foreign_key in &extract.foreign_keys {
            match owners.get(foreign_key.as_str()) {
                Some(owner) if owner != name => {
                    index
                        .references
                        .entry(name.to_string())
                        .or_default()
                        .insert(foreign_key.clone(), owner.to_string());
                }
                _ => {}
            }
        }
    }

    index
}

#[cfg(test)]
mod tests {
    use super::*;
    use dbtvgen_core::VaultOptions;
    use pretty_assertions::assert_eq;

    fn declaration(kind: ModelKind, name: &str, arguments: &str) -> ModelDeclaration {
        ModelDeclaration {
            name: name.to_string(),
            model_type: kind,
            location: ".".to_string(),
            options: VaultOptions::default(),
            arguments: ModelArguments::from_value(kind, serde_yaml::from_str(arguments).unwrap())
                .unwrap(),
        }
    }

    fn hub(name: &str, pk: &str) -> ModelDeclaration {
        declaration(
            ModelKind::Hub,
            name,
            &format!("src_pk: {pk}\nsrc_nk: ID\nsrc_ldts: LDTS\nsrc_source: SRC\nsource_model: stg\n"),
        )
    }

    fn sat(name: &str, pk: &str) -> ModelDeclaration {
        declaration(
            ModelKind::Sat,
            name,
            &format!(
                "src_pk: {pk}\nsrc_hashdiff: HASHDIFF\nsrc_payload: [NAME]\nsrc_ldts: LDTS\nsrc_source: SRC\nsource_model: stg\n"
            ),
        )
    }

    fn pairs(models: &[ModelDeclaration]) -> Vec<(String, &ModelDeclaration)> {
        models.iter().map(|m| (m.display_name(), m)).collect()
    }

    #[test]
    fn sat_points_at_hub() {
        let models = vec![hub("hub_customer", "customer_hk"), sat("sat_customer", "customer_hk")];
        let index = match_relationships(&pairs(&models));

        assert_eq!(index.len(), 1);
        assert_eq!(index.references("sat_customer").unwrap()["customer_hk"], "hub_customer");
        assert_eq!(index.primary_key("hub_customer"), Some("customer_hk"));
        assert_eq!(index.primary_key("sat_customer"), None);
    }

    #[test]
    fn link_accumulates_every_hub() {
        let link = declaration(
            ModelKind::Link,
            "link_order_customer",
            "src_pk: order_customer_hk\nsrc_fk: [order_hk, customer_hk]\nsrc_ldts: LDTS\nsrc_source: SRC\nsource_model: stg\n",
        );
        let models = vec![hub("hub_customer", "customer_hk"), hub("hub_order", "order_hk"), link];
        let index = match_relationships(&pairs(&models));

        let link_entry = index.references("link_order_customer").unwrap();
        assert_eq!(link_entry.len(), 2);
        assert_eq!(link_entry["order_hk"], "hub_order");
        assert_eq!(link_entry["customer_hk"], "hub_customer");
    }

    #[test]
    fn duplicate_primary_key_keeps_later_owner() {
        let models = vec![
            hub("hub_customer", "customer_hk"),
            hub("hub_customer_v2", "customer_hk"),
            sat("sat_customer", "customer_hk"),
        ];
        let index = match_relationships(&pairs(&models));

        assert_eq!(index.references("sat_customer").unwrap()["customer_hk"], "hub_customer_v2");
        assert!(index.references("hub_customer").is_none());
    }

    #[test]
    fn composite_primary_key_uses_first_column() {
        let hub = declaration(
            ModelKind::Hub,
            "hub_customer",
            "src_pk: [customer_hk, tenant_hk]\nsrc_nk: ID\nsrc_ldts: LDTS\nsrc_source: SRC\nsource_model: stg\n",
        );
        assert_eq!(extract_keys(&hub).primary_key.as_deref(), Some("customer_hk"));
    }

    #[test]
    fn per_kind_foreign_keys() {
        let eff_sat = declaration(
            ModelKind::EffSat,
            "eff_sat_order_customer",
            "src_pk: order_customer_hk\nsrc_dfk: order_hk\nsrc_sfk: [customer_hk]\nsrc_start_date: START\nsrc_end_date: END\nsrc_eff: EFF\nsrc_ldts: LDTS\nsrc_source: SRC\nsource_model: stg\n",
        );
        assert_eq!(
            extract_keys(&eff_sat).foreign_keys,
            vec!["order_customer_hk", "order_hk", "customer_hk"]
        );

        let ma_sat = declaration(
            ModelKind::MaSat,
            "ma_sat_customer_phone",
            "src_pk: customer_hk\nsrc_cdk: [phone_type]\nsrc_hashdiff: HASHDIFF\nsrc_payload: [PHONE]\nsrc_ldts: LDTS\nsrc_source: SRC\nsource_model: stg\n",
        );
        assert_eq!(extract_keys(&ma_sat).foreign_keys, vec!["customer_hk", "phone_type"]);

        let pit = declaration(
            ModelKind::Pit,
            "pit_customer",
            "src_pk: customer_hk\nas_of_dates_table: as_of\nsatellites:\n  sat_customer:\n    pk: {PK: customer_hk}\n    ldts: {LDTS: load_date}\n  sat_customer_login:\n    pk: customer_hk\nstage_tables_ldts: {stg_customer: load_date}\nsrc_ldts: load_date\nsource_model: hub_customer\n",
        );
        let extract = extract_keys(&pit);
        assert_eq!(extract.primary_key.as_deref(), Some("customer_hk"));
        assert_eq!(extract.foreign_keys, vec!["customer_hk", "customer_hk"]);
    }

    #[test]
    fn stage_and_bridge_have_no_keys() {
        let stage = declaration(ModelKind::Stage, "stg_customer", "source_model: raw\n");
        assert_eq!(extract_keys(&stage), RelationshipExtract::default());

        let bridge = declaration(
            ModelKind::Bridge,
            "bridge_customer",
            "source_model: hub_customer\nsrc_pk: customer_hk\nsrc_ldts: load_date\nbridge_walk: {}\nas_of_dates_table: as_of\nstage_tables_ldts: {}\n",
        );
        assert_eq!(extract_keys(&bridge), RelationshipExtract::default());
    }

    #[test]
    fn model_never_matches_itself() {
        let t_link = declaration(
            ModelKind::TLink,
            "t_link_transaction",
            "src_pk: transaction_hk\nsrc_fk: [transaction_hk, customer_hk]\nsrc_eff: EFF\nsrc_ldts: LDTS\nsrc_source: SRC\nsource_model: stg\n",
        );
        let models = vec![t_link];
        let index = match_relationships(&pairs(&models));
        assert!(index.is_empty());
        assert_eq!(index.primary_key("t_link_transaction"), Some("transaction_hk"));
    }
}
