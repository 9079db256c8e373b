//! Configuration templates for `venus init`.

use std::collections::HashSet;

use serde_json::Value;

use crate::config::Config;
use crate::schema::SchemaModel;

struct TemplateEntry<'a> {
    key: &'a str,
    description: Option<&'a str>,
    default: Option<&'a Value>,
}

/// Every key the schema knows: properties in declaration order, then
/// requirement keys without a property of their own.
fn entries(schema: &SchemaModel) -> Vec<TemplateEntry<'_>> {
    let mut seen = HashSet::new();
    let mut entries = Vec::new();

    for spec in schema.properties() {
        if seen.insert(spec.name.as_str()) {
            entries.push(TemplateEntry {
                key: &spec.name,
                description: spec.description.as_deref(),
                default: spec.default.as_ref(),
            });
        }
    }

    let engine_sets = schema.engine_names().map(|e| schema.engine_requirements(e));
    let target_sets = schema.target_names().map(|t| schema.target_requirements(t));
    let requirement_keys = schema
        .universal_requirements()
        .iter()
        .chain(engine_sets.flatten())
        .chain(target_sets.flatten());
    for key in requirement_keys {
        if seen.insert(key.name.as_str()) {
            entries.push(TemplateEntry {
                key: &key.name,
                description: key.description.as_deref(),
                default: None,
            });
        }
    }

    if seen.insert(schema.engine_key()) {
        entries.push(TemplateEntry {
            key: schema.engine_key(),
            description: None,
            default: None,
        });
    }
    entries
}

/// Render a value on one line. Sequences and mappings use YAML flow style.
fn render_value(value: &Value) -> String {
    match value {
        Value::Array(_) | Value::Object(_) => value.to_string(),
        scalar => serde_yaml::to_string(scalar)
            .map(|s| s.trim_end().to_string())
            .unwrap_or_else(|_| scalar.to_string()),
    }
}

/// Render a config file covering every schema key. Keys with a value are
/// written out; the rest are left commented so they read as not provided.
/// Also returns the config keys the schema does not know, in config order.
pub fn render_config_template(schema: &SchemaModel, config: &Config) -> (String, Vec<String>) {
    let entries = entries(schema);
    let mut out = String::new();

    for entry in &entries {
        if let Some(description) = entry.description {
            for line in description.lines() {
                out.push_str(&format!("# {line}\n"));
            }
        }
        match (config.get(entry.key), entry.default) {
            (Some(value), _) => out.push_str(&format!("{}: {}\n", entry.key, render_value(value))),
            (None, Some(default)) => {
                out.push_str(&format!("#{}: {}\n", entry.key, render_value(default)))
            }
            (None, None) => out.push_str(&format!("#{}:\n", entry.key)),
        }
        out.push('\n');
    }

    let known: HashSet<&str> = entries.iter().map(|e| e.key).collect();
    let unused: Vec<String> = config
        .keys()
        .filter(|key| !known.contains(key))
        .map(str::to_string)
        .collect();
    for key in &unused {
        tracing::warn!(key = %key, "key is not used by the schema");
    }

    (out, unused)
}
