//! Structural validation: value types, enums, ranges and patterns.
//!
//! Completeness is not checked here. A key that is absent or set to the
//! not-set marker is skipped; whether it was required is the resolver's call.

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use venus_types::{Result, ValueError, VenusError};

/// The seam for a generic schema validator.
pub trait StructuralValidator: Send + Sync {
    fn validate(&self, values: &Map<String, Value>) -> Vec<ValueError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueKind {
    String,
    Integer,
    Number,
    Boolean,
    Array,
    Object,
}

impl ValueKind {
    fn matches(self, value: &Value) -> bool {
        match self {
            ValueKind::String => value.is_string(),
            ValueKind::Integer => value.is_i64() || value.is_u64(),
            ValueKind::Number => value.is_number(),
            ValueKind::Boolean => value.is_boolean(),
            ValueKind::Array => value.is_array(),
            ValueKind::Object => value.is_object(),
        }
    }

    fn name(self) -> &'static str {
        match self {
            ValueKind::String => "string",
            ValueKind::Integer => "integer",
            ValueKind::Number => "number",
            ValueKind::Boolean => "boolean",
            ValueKind::Array => "array",
            ValueKind::Object => "object",
        }
    }
}

fn describe(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(n) if n.is_f64() => "number",
        Value::Number(_) => "integer",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// One schema property, in declaration order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PropertySpec {
    #[serde(skip)]
    pub name: String,
    #[serde(default, rename = "type")]
    pub kind: Option<ValueKind>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default, rename = "enum")]
    pub allowed: Option<Vec<Value>>,
    #[serde(default)]
    pub minimum: Option<f64>,
    #[serde(default)]
    pub maximum: Option<f64>,
    #[serde(default)]
    pub pattern: Option<String>,
    #[serde(default)]
    pub default: Option<Value>,
    #[serde(skip)]
    compiled: Option<Regex>,
}

impl PropertySpec {
    /// Check a provided value. Returns one reason per violated constraint.
    pub fn check(&self, value: &Value) -> Vec<String> {
        let mut reasons = Vec::new();

        if let Some(kind) = self.kind {
            if !kind.matches(value) {
                // the remaining constraints assume the declared type
                reasons.push(format!("expected {}, got {}", kind.name(), describe(value)));
                return reasons;
            }
        }

        if let Some(ref allowed) = self.allowed {
            if !allowed.contains(value) {
                let choices: Vec<String> = allowed.iter().map(render_scalar).collect();
                reasons.push(format!("must be one of: {}", choices.join(", ")));
            }
        }

        if let Some(n) = value.as_f64() {
            if let Some(min) = self.minimum {
                if n < min {
                    reasons.push(format!("must be >= {min}"));
                }
            }
            if let Some(max) = self.maximum {
                if n > max {
                    reasons.push(format!("must be <= {max}"));
                }
            }
        }

        if let (Some(re), Some(s)) = (&self.compiled, value.as_str()) {
            if !re.is_match(s) {
                reasons.push(format!(
                    "'{s}' does not match pattern '{}'",
                    self.pattern.as_deref().unwrap_or_default()
                ));
            }
        }

        reasons
    }
}

pub(crate) fn render_scalar(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Convert a YAML `properties:` mapping into ordered property specs.
pub fn parse_properties(mapping: &serde_yaml::Mapping) -> Result<Vec<PropertySpec>> {
    let mut properties = Vec::with_capacity(mapping.len());
    for (key, value) in mapping {
        let name = key
            .as_str()
            .ok_or_else(|| VenusError::SchemaParse(format!("property name {key:?} is not a string")))?
            .to_string();

        let mut spec: PropertySpec = if value.is_null() {
            PropertySpec::default()
        } else {
            serde_yaml::from_value(value.clone())
                .map_err(|e| VenusError::SchemaParse(format!("property '{name}': {e}")))?
        };

        if let Some(ref pattern) = spec.pattern {
            let re = Regex::new(pattern).map_err(|e| {
                VenusError::SchemaParse(format!("property '{name}' has invalid pattern: {e}"))
            })?;
            spec.compiled = Some(re);
        }
        spec.name = name;
        properties.push(spec);
    }
    Ok(properties)
}

/// Validates provided values against a list of property specs.
/// Keys the properties do not mention are accepted.
#[derive(Debug, Clone, Default)]
pub struct PropertyValidator {
    properties: Vec<PropertySpec>,
}

impl PropertyValidator {
    pub fn new(properties: Vec<PropertySpec>) -> Self {
        Self { properties }
    }
}

impl StructuralValidator for PropertyValidator {
    fn validate(&self, values: &Map<String, Value>) -> Vec<ValueError> {
        let mut errors = Vec::new();
        for spec in &self.properties {
            let Some(value) = values.get(&spec.name).filter(|v| !v.is_null()) else {
                continue;
            };
            errors.extend(
                spec.check(value)
                    .into_iter()
                    .map(|reason| ValueError::new(spec.name.clone(), reason)),
            );
        }
        errors
    }
}
