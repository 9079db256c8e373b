//! The merged user configuration.
//!
//! A key is *provided* when it is present and not set to the not-set marker
//! (YAML `null`, which is what `key:` with no value or `key: ~` parse to).
//! Keys commented out in the file are simply absent. Both read as missing.

use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use venus_types::{Result, VenusError};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Config {
    values: Map<String, Value>,
}

impl Config {
    pub fn new(values: Map<String, Value>) -> Self {
        Self { values }
    }

    /// Parse YAML text. A blank document is an empty configuration.
    pub fn from_yaml_str(source: &str) -> Result<Self> {
        let blank = source
            .lines()
            .map(str::trim)
            .all(|line| line.is_empty() || line.starts_with('#'));
        if blank {
            return Ok(Self::default());
        }
        let value: Value =
            serde_yaml::from_str(source).map_err(|e| VenusError::ConfigParse(e.to_string()))?;
        match value {
            Value::Null => Ok(Self::default()),
            Value::Object(values) => Ok(Self { values }),
            other => Err(VenusError::ConfigParse(format!(
                "top level must be a mapping of keys to values, found {}",
                kind_name(&other)
            ))),
        }
    }

    pub fn load(path: &Path) -> Result<Self> {
        let source = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&source)
    }

    /// Whether `key` is present and not the not-set marker.
    pub fn is_provided(&self, key: &str) -> bool {
        self.values.get(key).is_some_and(|v| !v.is_null())
    }

    /// The value of a provided key.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key).filter(|v| !v.is_null())
    }

    pub fn set(&mut self, key: impl Into<String>, value: Value) {
        self.values.insert(key.into(), value);
    }

    /// The selected engine, read from `engine_key`. Scalars are rendered as
    /// text; sequences and mappings render as JSON, which names no engine.
    pub fn engine_choice(&self, engine_key: &str) -> Option<String> {
        self.get(engine_key).map(|v| match v {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        })
    }

    pub fn values(&self) -> &Map<String, Value> {
        &self.values
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    /// Recursively merge `other` into `self`. Nested mappings merge key by
    /// key; every other value in `other` replaces the existing one.
    pub fn merge(&mut self, other: Config) {
        merge_maps(&mut self.values, other.values);
    }

    /// Apply command-line `key:value` overrides. The pair splits on the first
    /// `:`; values are read as YAML scalars, so `threads:8` is an integer and
    /// `reference_genome:` unsets the key.
    pub fn apply_overrides<I, S>(&mut self, pairs: I) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut overrides = Map::new();
        for pair in pairs {
            let (key, value) = parse_override(pair.as_ref())?;
            overrides.insert(key, value);
        }
        tracing::debug!(count = overrides.len(), "applying config overrides");
        merge_maps(&mut self.values, overrides);
        Ok(())
    }
}

fn kind_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a sequence",
        Value::Object(_) => "a mapping",
    }
}

fn merge_maps(base: &mut Map<String, Value>, updates: Map<String, Value>) {
    for (key, update) in updates {
        match (base.get_mut(&key), update) {
            (Some(Value::Object(existing)), Value::Object(nested)) => merge_maps(existing, nested),
            (_, update) => {
                base.insert(key, update);
            }
        }
    }
}

/// Split one `key:value` pair.
pub fn parse_override(pair: &str) -> Result<(String, Value)> {
    let invalid = |message: &str| VenusError::InvalidOverride {
        pair: pair.to_string(),
        message: message.to_string(),
    };

    let (key, raw) = pair
        .trim()
        .split_once(':')
        .ok_or_else(|| invalid("expected key:value"))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(invalid("key is empty"));
    }

    let raw = raw.trim();
    let value = if raw.is_empty() {
        Value::Null
    } else {
        // anything YAML cannot read as a value is kept as plain text
        serde_yaml::from_str::<Value>(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
    };
    Ok((key.to_string(), value))
}
