//! Validation façade.
//!
//! Runs the checks in a fixed order: structural validation, universal keys,
//! engine keys, then the rule graph and the keys of every target it builds.
//! The rule graph is only requested once the configuration has passed the
//! first three checks, since the planning run itself reads the configuration.

use std::collections::{BTreeMap, BTreeSet, HashSet};

use async_trait::async_trait;
use serde::Serialize;

use venus_types::{Result, Tier, ValueError, VenusError};

use crate::config::Config;
use crate::graph::{detect_targets, RuleGraph};
use crate::resolver::{check_engine, check_targets, check_universal};
use crate::schema::SchemaModel;
use crate::structural::{PropertyValidator, StructuralValidator};

/// Source of rule-graph DOT text, usually a planning run of the engine.
#[async_trait]
pub trait GraphTextProvider: Send {
    async fn graph_text(&mut self) -> Result<String>;
}

#[async_trait]
impl<F> GraphTextProvider for F
where
    F: FnMut() -> Result<String> + Send,
{
    async fn graph_text(&mut self) -> Result<String> {
        (*self)()
    }
}

/// Result of a fail-fast validation pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ValidationOutcome {
    /// Every tier is satisfied. Carries the targets the graph will build.
    Passed { targets: BTreeSet<String> },
    /// Provided values violate their property specs.
    Invalid { errors: Vec<ValueError> },
    /// The first tier with missing keys.
    Failed { tier: Tier, missing: Vec<String> },
}

impl ValidationOutcome {
    pub fn is_passed(&self) -> bool {
        matches!(self, ValidationOutcome::Passed { .. })
    }

    pub fn into_result(self) -> Result<BTreeSet<String>> {
        match self {
            ValidationOutcome::Passed { targets } => Ok(targets),
            ValidationOutcome::Invalid { errors } => Err(VenusError::InvalidValues { errors }),
            ValidationOutcome::Failed { tier, missing } => Err(VenusError::MissingRequirements {
                tier,
                keys: missing,
            }),
        }
    }
}

/// Result of an accumulating validation pass. A key missing from several
/// tiers is reported only under the first of them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationReport {
    pub value_errors: Vec<ValueError>,
    pub universal: Vec<String>,
    /// The selected engine, or engine selection when none is chosen.
    pub engine_tier: Tier,
    pub engine: Vec<String>,
    /// Only filled in when the rule graph was consulted.
    pub targets: BTreeMap<String, Vec<String>>,
    /// `None` when the rule graph was not consulted.
    pub detected: Option<BTreeSet<String>>,
}

impl ValidationReport {
    pub fn is_ok(&self) -> bool {
        self.value_errors.is_empty() && self.failures().is_empty()
    }

    /// Tiers with missing keys, in check order.
    pub fn failures(&self) -> Vec<(Tier, &[String])> {
        let mut failures = Vec::new();
        if !self.universal.is_empty() {
            failures.push((Tier::Universal, self.universal.as_slice()));
        }
        if !self.engine.is_empty() {
            failures.push((self.engine_tier.clone(), self.engine.as_slice()));
        }
        for (target, missing) in &self.targets {
            failures.push((Tier::Target(target.clone()), missing.as_slice()));
        }
        failures
    }

    /// The first finding as an error, or the detected targets.
    pub fn into_result(self) -> Result<BTreeSet<String>> {
        if !self.value_errors.is_empty() {
            return Err(VenusError::InvalidValues {
                errors: self.value_errors,
            });
        }
        if let Some((tier, missing)) = self.failures().into_iter().next() {
            return Err(VenusError::MissingRequirements {
                tier,
                keys: missing.to_vec(),
            });
        }
        Ok(self.detected.unwrap_or_default())
    }
}

fn engine_tier(config: &Config, schema: &SchemaModel) -> Tier {
    match config.engine_choice(schema.engine_key()) {
        Some(name) => Tier::Engine(name),
        None => Tier::EngineSelection,
    }
}

/// Validates configurations against one schema.
pub struct Validator<'a> {
    schema: &'a SchemaModel,
    structural: Box<dyn StructuralValidator + 'a>,
}

impl<'a> Validator<'a> {
    /// A validator using the schema's own property specs for structural checks.
    pub fn new(schema: &'a SchemaModel) -> Self {
        Self {
            schema,
            structural: Box::new(PropertyValidator::new(schema.properties().to_vec())),
        }
    }

    /// Replace the structural validator.
    pub fn with_structural(mut self, structural: Box<dyn StructuralValidator + 'a>) -> Self {
        self.structural = structural;
        self
    }

    pub fn schema(&self) -> &SchemaModel {
        self.schema
    }

    async fn detect<P: GraphTextProvider>(&self, provider: &mut P) -> Result<BTreeSet<String>> {
        tracing::info!("requesting rule graph");
        let text = provider.graph_text().await?;
        let graph = RuleGraph::parse(&text)?;
        Ok(detect_targets(&graph, self.schema))
    }

    /// Fail-fast validation. Stops at the first failing check.
    pub async fn validate<P: GraphTextProvider>(
        &self,
        config: &Config,
        mut provider: P,
    ) -> Result<ValidationOutcome> {
        let errors = self.structural.validate(config.values());
        if !errors.is_empty() {
            tracing::info!(count = errors.len(), "structural validation failed");
            return Ok(ValidationOutcome::Invalid { errors });
        }

        let missing = check_universal(config, self.schema);
        if !missing.is_empty() {
            return Ok(ValidationOutcome::Failed {
                tier: Tier::Universal,
                missing,
            });
        }

        let missing = check_engine(config, self.schema);
        if !missing.is_empty() {
            return Ok(ValidationOutcome::Failed {
                tier: engine_tier(config, self.schema),
                missing,
            });
        }
        tracing::info!("universal and engine requirements satisfied");

        let targets = self.detect(&mut provider).await?;
        let report = check_targets(config, self.schema, &targets);
        // targets iterate in sorted order, so the first failure is deterministic
        if let Some((target, missing)) = report.into_iter().next() {
            return Ok(ValidationOutcome::Failed {
                tier: Tier::Target(target),
                missing,
            });
        }

        tracing::info!(targets = targets.len(), "configuration satisfies all requirements");
        Ok(ValidationOutcome::Passed { targets })
    }

    /// Accumulating validation: structural, universal and engine findings are
    /// all reported. The rule graph is requested only once those three pass,
    /// so target findings appear only for an otherwise complete configuration.
    pub async fn validate_all<P: GraphTextProvider>(
        &self,
        config: &Config,
        mut provider: P,
    ) -> Result<ValidationReport> {
        let value_errors = self.structural.validate(config.values());
        let universal = check_universal(config, self.schema);

        let reported: HashSet<&str> = universal.iter().map(String::as_str).collect();
        let engine: Vec<String> = check_engine(config, self.schema)
            .into_iter()
            .filter(|key| !reported.contains(key.as_str()))
            .collect();

        let ready = value_errors.is_empty() && universal.is_empty() && engine.is_empty();
        let (targets, detected) = if ready {
            let detected = self.detect(&mut provider).await?;
            (check_targets(config, self.schema, &detected), Some(detected))
        } else {
            tracing::info!(
                value_errors = value_errors.len(),
                universal = universal.len(),
                engine = engine.len(),
                "skipping rule graph until earlier checks pass"
            );
            (BTreeMap::new(), None)
        };

        Ok(ValidationReport {
            value_errors,
            universal,
            engine_tier: engine_tier(config, self.schema),
            engine,
            targets,
            detected,
        })
    }
}

/// Fail-fast validation with the schema's own structural checks.
pub async fn validate<P: GraphTextProvider>(
    schema: &SchemaModel,
    config: &Config,
    provider: P,
) -> Result<ValidationOutcome> {
    Validator::new(schema).validate(config, provider).await
}
