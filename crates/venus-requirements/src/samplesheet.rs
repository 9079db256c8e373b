//! Samplesheet parsing and per-record validation.
//!
//! A samplesheet is tab-separated with a header row. Each following row is
//! one sample record keyed by the header names.

use std::path::Path;

use serde::Deserialize;
use serde_json::{Map, Value};

use venus_types::{Result, ValueError, VenusError};

use crate::structural::{parse_properties, PropertySpec, PropertyValidator, StructuralValidator};

pub type SampleRecord = Map<String, Value>;

fn is_skipped(line: &str) -> bool {
    let trimmed = line.trim();
    trimmed.is_empty() || trimmed.starts_with('#')
}

/// Parse samplesheet text. Blank lines and `#` comments are skipped, empty
/// and missing trailing cells are not-set, and a row with more cells than
/// the header is an error.
pub fn parse_samples(text: &str) -> Result<Vec<SampleRecord>> {
    let mut lines = text
        .lines()
        .enumerate()
        .filter(|(_, line)| !is_skipped(line));

    let Some((_, header)) = lines.next() else {
        return Err(VenusError::Samplesheet("samplesheet is empty".into()));
    };
    let columns: Vec<&str> = header.split('\t').map(str::trim).collect();
    if let Some(pos) = columns.iter().position(|c| c.is_empty()) {
        return Err(VenusError::Samplesheet(format!(
            "header column {} has no name",
            pos + 1
        )));
    }

    let mut records = Vec::new();
    for (index, line) in lines {
        let cells: Vec<&str> = line.split('\t').map(str::trim).collect();
        if cells.len() > columns.len() {
            return Err(VenusError::Samplesheet(format!(
                "line {}: {} cells but the header has {} columns",
                index + 1,
                cells.len(),
                columns.len()
            )));
        }
        let record = columns
            .iter()
            .enumerate()
            .map(|(i, column)| {
                let value = match cells.get(i) {
                    Some(cell) if !cell.is_empty() => Value::String(cell.to_string()),
                    _ => Value::Null,
                };
                (column.to_string(), value)
            })
            .collect();
        records.push(record);
    }

    if records.is_empty() {
        return Err(VenusError::Samplesheet("samplesheet has no samples".into()));
    }
    tracing::debug!(samples = records.len(), columns = columns.len(), "parsed samplesheet");
    Ok(records)
}

pub fn load_samples(path: &Path) -> Result<Vec<SampleRecord>> {
    let text = std::fs::read_to_string(path).map_err(|e| {
        VenusError::Samplesheet(format!("cannot read {}: {e}", path.display()))
    })?;
    parse_samples(&text)
}

#[derive(Deserialize)]
struct RawRecordSchema {
    #[serde(default)]
    properties: serde_yaml::Mapping,
    #[serde(default)]
    required: Vec<String>,
}

/// Constraints every samplesheet record must satisfy.
#[derive(Debug, Clone)]
pub struct RecordSchema {
    properties: PropertyValidator,
    required: Vec<String>,
}

impl RecordSchema {
    pub fn new(properties: Vec<PropertySpec>, required: Vec<String>) -> Self {
        Self {
            properties: PropertyValidator::new(properties),
            required,
        }
    }

    pub fn load(source: &str) -> Result<Self> {
        let raw: RawRecordSchema =
            serde_yaml::from_str(source).map_err(|e| VenusError::SchemaParse(e.to_string()))?;
        Ok(Self::new(parse_properties(&raw.properties)?, raw.required))
    }

    pub fn required(&self) -> &[String] {
        &self.required
    }
}

impl StructuralValidator for RecordSchema {
    fn validate(&self, values: &Map<String, Value>) -> Vec<ValueError> {
        let mut errors: Vec<ValueError> = self
            .required
            .iter()
            .filter(|key| values.get(key.as_str()).map_or(true, Value::is_null))
            .map(|key| ValueError::new(key.clone(), "is required"))
            .collect();
        errors.extend(self.properties.validate(values));
        errors
    }
}

/// Validate every record. Keys are reported as `row N: column`, counting
/// samples from 1.
pub fn validate_samples(records: &[SampleRecord], schema: &RecordSchema) -> Vec<ValueError> {
    records
        .iter()
        .enumerate()
        .flat_map(|(i, record)| {
            schema
                .validate(record)
                .into_iter()
                .map(move |e| ValueError::new(format!("row {}: {}", i + 1, e.key), e.reason))
        })
        .collect()
}
