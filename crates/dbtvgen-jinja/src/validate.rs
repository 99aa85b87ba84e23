//! Jinja syntax checks for generated model files

use minijinja::Environment;

/// Check if text contains Jinja markup
pub fn has_jinja(text: &str) -> bool {
    text.contains("{{") || text.contains("{%") || text.contains("{#")
}

/// Parse `source` as a Jinja template without rendering it.
///
/// Only the syntax is checked; dbt-provided functions such as `fromyaml`
/// and the dbtvault macros are never resolved.
pub fn validate_syntax(name: &str, source: &str) -> Result<(), String> {
    let env = Environment::new();
    let parsed = env.template_from_named_str(name, source).map(|_| ());
    parsed.map_err(|e| e.to_string())
}
