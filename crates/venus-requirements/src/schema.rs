//! Schema model: the conditional requirement sets and property specs.
//!
//! A schema document carries four sections next to the engine-choice key name:
//!
//! ```yaml
//! engine_key: assembler
//! properties:
//!   output_dir: { type: string, description: "Where results are written" }
//! universal: [output_dir]
//! engines:
//!   spades: [min_contig_len]
//! targets:
//!   annotation: [{ name: reference_genome, description: "GenBank reference" }]
//! ```
//!
//! Lookups for unknown engines or targets return an empty slice: whether an
//! engine or target name is valid is a question for structural validation,
//! not for the requirement model.

use std::collections::{BTreeMap, HashSet};
use std::path::Path;

use serde::{Deserialize, Serialize};

use venus_types::{Result, Tier, VenusError};

use crate::structural::{parse_properties, PropertySpec};

pub const DEFAULT_ENGINE_KEY: &str = "engine";

/// A configuration key some tier requires.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequirementKey {
    pub name: String,
    pub description: Option<String>,
}

impl RequirementKey {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
        }
    }
}

/// Key entries may be written as a bare name or as a mapping.
#[derive(Deserialize)]
#[serde(untagged)]
enum RawKey {
    Name(String),
    Detailed {
        name: String,
        #[serde(default)]
        description: Option<String>,
    },
}

impl From<RawKey> for RequirementKey {
    fn from(raw: RawKey) -> Self {
        match raw {
            RawKey::Name(name) => RequirementKey::new(name),
            RawKey::Detailed { name, description } => RequirementKey { name, description },
        }
    }
}

fn default_engine_key() -> String {
    DEFAULT_ENGINE_KEY.to_string()
}

#[derive(Deserialize)]
struct RawSchema {
    #[serde(default = "default_engine_key")]
    engine_key: String,
    #[serde(default)]
    properties: serde_yaml::Mapping,
    #[serde(default)]
    universal: Vec<RawKey>,
    // `skesa:` with no list means the engine adds no requirements
    #[serde(default)]
    engines: BTreeMap<String, Option<Vec<RawKey>>>,
    #[serde(default)]
    targets: BTreeMap<String, Option<Vec<RawKey>>>,
}

/// Build one requirement set, rejecting duplicate names within it.
fn requirement_set(tier: &Tier, raw: Vec<RawKey>) -> Result<Vec<RequirementKey>> {
    let mut seen = HashSet::new();
    let mut keys = Vec::with_capacity(raw.len());
    for key in raw.into_iter().map(RequirementKey::from) {
        if key.name.trim().is_empty() {
            return Err(VenusError::SchemaParse(format!(
                "empty key name in the {tier} requirements"
            )));
        }
        if !seen.insert(key.name.clone()) {
            return Err(VenusError::SchemaParse(format!(
                "duplicate key '{}' in the {tier} requirements",
                key.name
            )));
        }
        keys.push(key);
    }
    Ok(keys)
}

fn named_sets(
    raw: BTreeMap<String, Option<Vec<RawKey>>>,
    tier: fn(String) -> Tier,
) -> Result<BTreeMap<String, Vec<RequirementKey>>> {
    raw.into_iter()
        .map(|(name, keys)| {
            let set = requirement_set(&tier(name.clone()), keys.unwrap_or_default())?;
            Ok((name, set))
        })
        .collect()
}

/// Immutable schema shared read-only by every check of a resolution pass.
#[derive(Debug, Clone)]
pub struct SchemaModel {
    engine_key: String,
    properties: Vec<PropertySpec>,
    universal: Vec<RequirementKey>,
    engines: BTreeMap<String, Vec<RequirementKey>>,
    targets: BTreeMap<String, Vec<RequirementKey>>,
}

impl SchemaModel {
    /// Parse a schema from YAML (or JSON) source.
    pub fn load(source: &str) -> Result<Self> {
        if source.trim().is_empty() {
            return Err(VenusError::SchemaParse("schema source is empty".into()));
        }
        let raw: RawSchema =
            serde_yaml::from_str(source).map_err(|e| VenusError::SchemaParse(e.to_string()))?;

        if raw.engine_key.trim().is_empty() {
            return Err(VenusError::SchemaParse("engine_key must not be empty".into()));
        }

        let schema = Self {
            engine_key: raw.engine_key,
            properties: parse_properties(&raw.properties)?,
            universal: requirement_set(&Tier::Universal, raw.universal)?,
            engines: named_sets(raw.engines, Tier::Engine)?,
            targets: named_sets(raw.targets, Tier::Target)?,
        };
        tracing::debug!(
            universal = schema.universal.len(),
            engines = schema.engines.len(),
            targets = schema.targets.len(),
            "loaded requirement schema"
        );
        Ok(schema)
    }

    /// Read and parse a schema file.
    pub fn load_file(path: &Path) -> Result<Self> {
        let source = std::fs::read_to_string(path)?;
        Self::load(&source)
    }

    /// The configuration key that selects the engine.
    pub fn engine_key(&self) -> &str {
        &self.engine_key
    }

    pub fn properties(&self) -> &[PropertySpec] {
        &self.properties
    }

    pub fn universal_requirements(&self) -> &[RequirementKey] {
        &self.universal
    }

    /// Extra keys the named engine requires; empty for unknown engines.
    pub fn engine_requirements(&self, engine: &str) -> &[RequirementKey] {
        self.engines.get(engine).map(Vec::as_slice).unwrap_or_default()
    }

    /// Extra keys the named target requires; empty for unknown targets.
    pub fn target_requirements(&self, target: &str) -> &[RequirementKey] {
        self.targets.get(target).map(Vec::as_slice).unwrap_or_default()
    }

    /// Look up any requirement set by its tier. Engine selection has no set
    /// of its own.
    pub fn requirement_set(&self, tier: &Tier) -> &[RequirementKey] {
        match tier {
            Tier::Universal => self.universal_requirements(),
            Tier::EngineSelection => &[],
            Tier::Engine(name) => self.engine_requirements(name),
            Tier::Target(name) => self.target_requirements(name),
        }
    }

    /// Every target the schema knows about, sorted.
    pub fn target_names(&self) -> impl Iterator<Item = &str> {
        self.targets.keys().map(String::as_str)
    }

    pub fn is_target(&self, name: &str) -> bool {
        self.targets.contains_key(name)
    }

    pub fn engine_names(&self) -> impl Iterator<Item = &str> {
        self.engines.keys().map(String::as_str)
    }
}
