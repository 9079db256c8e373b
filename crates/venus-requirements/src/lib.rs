//! Schema model, rule-graph target detection, and three-tier requirement resolution.
//!
//! This crate decides whether a Venus configuration is complete for the run it
//! is about to drive: universal keys, the keys of the selected assembler, and
//! the keys of every schema target the pipeline's rule graph will build. It
//! also carries the samplesheet checks, the `init` templating, and the
//! Snakemake invocation used for planning and execution.

pub mod config;
pub mod graph;
pub mod planner;
pub mod resolver;
pub mod samplesheet;
pub mod schema;
pub mod structural;
pub mod template;
pub mod validation;

pub use config::{parse_override, Config};
pub use graph::{detect_targets, RuleGraph, StageEdge, StageNode};
pub use planner::SnakemakeInvocation;
pub use resolver::{check_engine, check_targets, check_universal, missing_keys};
pub use samplesheet::{load_samples, parse_samples, validate_samples, RecordSchema, SampleRecord};
pub use schema::{RequirementKey, SchemaModel, DEFAULT_ENGINE_KEY};
pub use structural::{PropertySpec, PropertyValidator, StructuralValidator, ValueKind};
pub use template::render_config_template;
pub use validation::{validate, GraphTextProvider, ValidationOutcome, ValidationReport, Validator};
