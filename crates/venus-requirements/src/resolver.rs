//! Three-tier requirement resolution.
//!
//! Each check is a pure function of the configuration and the schema and
//! reports every missing key of its tier in schema declaration order.

use std::collections::{BTreeMap, BTreeSet};

use crate::config::Config;
use crate::schema::{RequirementKey, SchemaModel};

/// Names of the keys in `required` that `config` does not provide.
pub fn missing_keys(config: &Config, required: &[RequirementKey]) -> Vec<String> {
    required
        .iter()
        .filter(|key| !config.is_provided(&key.name))
        .map(|key| key.name.clone())
        .collect()
}

pub fn check_universal(config: &Config, schema: &SchemaModel) -> Vec<String> {
    missing_keys(config, schema.universal_requirements())
}

/// Missing keys of the selected engine. With no engine selected the answer is
/// the engine-choice key itself; engine requirements are not consulted.
pub fn check_engine(config: &Config, schema: &SchemaModel) -> Vec<String> {
    match config.engine_choice(schema.engine_key()) {
        Some(engine) => missing_keys(config, schema.engine_requirements(&engine)),
        None => vec![schema.engine_key().to_string()],
    }
}

/// Missing keys per detected target. Targets with nothing missing are left out.
pub fn check_targets(
    config: &Config,
    schema: &SchemaModel,
    targets: &BTreeSet<String>,
) -> BTreeMap<String, Vec<String>> {
    targets
        .iter()
        .filter_map(|target| {
            let missing = missing_keys(config, schema.target_requirements(target));
            (!missing.is_empty()).then(|| (target.clone(), missing))
        })
        .collect()
}
