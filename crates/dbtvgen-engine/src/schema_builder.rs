//! schema.yml entries for generated models

use dbtvgen_dbt::{CatalogModel, SchemaColumn, SchemaModel};
use serde_yaml::{Mapping, Value};
use std::collections::BTreeMap;

/// `where` filter of generated relationship tests
pub const RELATIONSHIP_TEST_FILTER: &str = "1 = 0";

/// Build the schema entry of one model from its catalog columns.
///
/// The primary key column gets `unique` and `not_null` tests, every column
/// present in `relationships` gets a `relationships` test pointing at the
/// owning model. Column names are compared case-insensitively.
pub fn build_entry(
    display_name: &str,
    primary_key: Option<&str>,
    catalog_model: &CatalogModel,
    relationships: Option<&BTreeMap<String, String>>,
) -> SchemaModel {
    let columns = catalog_model
        .columns
        .iter()
        .map(|column| {
            let tests = if primary_key.is_some_and(|pk| pk.eq_ignore_ascii_case(&column.name)) {
                Some(vec![Value::from("unique"), Value::from("not_null")])
            } else {
                relationships
                    .and_then(|related| find_owner(related, &column.name))
                    .map(|owner| vec![relationship_test(owner, &column.name)])
            };

            SchemaColumn {
                name: column.name.clone(),
                description: String::new(),
                data_type: column.data_type.clone(),
                tests,
            }
        })
        .collect();

    SchemaModel {
        name: display_name.to_string(),
        description: String::new(),
        columns,
    }
}

fn find_owner<'a>(relationships: &'a BTreeMap<String, String>, column: &str) -> Option<&'a str> {
    relationships
        .iter()
        .find(|(foreign_key, _)| foreign_key.eq_ignore_ascii_case(column))
        .map(|(_, owner)| owner.as_str())
}

/// `{relationships: {to: ref('<owner>'), field: <field>, config: {where: 1 = 0}}}`
fn relationship_test(owner: &str, field: &str) -> Value {
    let mut config = Mapping::new();
    config.insert(Value::from("where"), Value::from(RELATIONSHIP_TEST_FILTER));

    let mut test = Mapping::new();
    test.insert(Value::from("to"), Value::from(format!("ref('{}')", owner)));
    test.insert(Value::from("field"), Value::from(field));
    test.insert(Value::from("config"), Value::Mapping(config));

    let mut wrapper = Mapping::new();
    wrapper.insert(Value::from("relationships"), Value::Mapping(test));
    Value::Mapping(wrapper)
}
