//! Shared types and errors for the Venus configuration gate.
//!
//! This crate provides the foundational types used across the other Venus crates:
//! - `VenusError` — unified error taxonomy
//! - `Tier` — the three requirement tiers (universal, engine, target)
//! - `ValueError` — a single structural validation finding

use std::fmt;

use serde::{Deserialize, Serialize};

/// Process exit status for a run whose pipeline finished cleanly.
pub const EXIT_SUCCESS: i32 = 0;
/// Process exit status when the pipeline itself failed.
pub const EXIT_PIPELINE_FAILED: i32 = 1;
/// Process exit status when the configuration or samplesheet is invalid.
pub const EXIT_CONFIG_INVALID: i32 = 2;
/// Process exit status for fatal errors before execution (schema, graph, engine, I/O).
pub const EXIT_FATAL: i32 = 3;

// ---------------------------------------------------------------------------
// Tier — which requirement set a key belongs to
// ---------------------------------------------------------------------------

/// A requirement tier. Engine and target tiers carry the name that selected them.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "tier", content = "name", rename_all = "snake_case")]
pub enum Tier {
    Universal,
    /// No engine chosen yet; the only missing key is the engine key itself.
    EngineSelection,
    Engine(String),
    Target(String),
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Tier::Universal => write!(f, "universal"),
            Tier::EngineSelection => write!(f, "engine selection"),
            Tier::Engine(name) => write!(f, "engine '{name}'"),
            Tier::Target(name) => write!(f, "target '{name}'"),
        }
    }
}

// ---------------------------------------------------------------------------
// ValueError — one structural validation finding
// ---------------------------------------------------------------------------

/// A value that is present but does not satisfy its schema property.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValueError {
    pub key: String,
    pub reason: String,
}

impl ValueError {
    pub fn new(key: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            reason: reason.into(),
        }
    }
}

impl fmt::Display for ValueError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.key, self.reason)
    }
}

// ---------------------------------------------------------------------------
// VenusError
// ---------------------------------------------------------------------------

/// Unified error type for all Venus subsystems.
#[derive(Debug, thiserror::Error)]
pub enum VenusError {
    // === Schema / input errors ===
    #[error("Schema parse error: {0}")]
    SchemaParse(String),

    #[error("Rule graph parse error at line {line}, col {col}: {message}")]
    GraphParse {
        line: usize,
        col: usize,
        message: String,
        source_snippet: Option<String>,
    },

    #[error("Config parse error: {0}")]
    ConfigParse(String),

    #[error("Could not parse key:value '{pair}': {message}")]
    InvalidOverride { pair: String, message: String },

    #[error("Samplesheet error: {0}")]
    Samplesheet(String),

    // === Requirement findings ===
    #[error("The {tier} tier requires the following keys to be defined and uncommented: {}", keys.join(", "))]
    MissingRequirements { tier: Tier, keys: Vec<String> },

    #[error("Found {} invalid value(s): {}", errors.len(), join_values(errors))]
    InvalidValues { errors: Vec<ValueError> },

    // === External engine ===
    #[error("`{command}` failed with status {}: {stderr}", status.map_or_else(|| "unknown".to_string(), |s| s.to_string()))]
    ExternalEngine {
        command: String,
        status: Option<i32>,
        stderr: String,
    },

    // === Generic ===
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{0}")]
    Other(String),
}

fn join_values(errors: &[ValueError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

impl VenusError {
    /// Returns `true` if the error means the configuration is incomplete or
    /// invalid, something the user fixes by editing their files.
    pub fn is_user_fixable(&self) -> bool {
        matches!(
            self,
            VenusError::MissingRequirements { .. }
                | VenusError::InvalidValues { .. }
                | VenusError::InvalidOverride { .. }
                | VenusError::ConfigParse(_)
                | VenusError::Samplesheet(_)
        )
    }

    /// Returns `true` if the error aborts validation before any verdict on the
    /// configuration can be reached.
    pub fn is_fatal(&self) -> bool {
        !self.is_user_fixable()
    }

    /// Maps the error to the process exit status the CLI reports.
    pub fn exit_code(&self) -> i32 {
        if self.is_user_fixable() {
            EXIT_CONFIG_INVALID
        } else {
            EXIT_FATAL
        }
    }
}

/// A convenience alias for `Result<T, VenusError>`.
pub type Result<T> = std::result::Result<T, VenusError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tier_display() {
        assert_eq!(Tier::Universal.to_string(), "universal");
        assert_eq!(Tier::EngineSelection.to_string(), "engine selection");
        assert_eq!(Tier::Engine("spades".into()).to_string(), "engine 'spades'");
        assert_eq!(
            Tier::Target("annotation".into()).to_string(),
            "target 'annotation'"
        );
    }

    #[test]
    fn error_display_missing_requirements() {
        let err = VenusError::MissingRequirements {
            tier: Tier::Engine("spades".into()),
            keys: vec!["min_contig_len".into(), "kmer_sizes".into()],
        };
        assert_eq!(
            err.to_string(),
            "The engine 'spades' tier requires the following keys to be defined and uncommented: min_contig_len, kmer_sizes"
        );
    }

    #[test]
    fn error_display_graph_parse() {
        let err = VenusError::GraphParse {
            line: 3,
            col: 7,
            message: "unexpected token".into(),
            source_snippet: Some("0[label".into()),
        };
        assert_eq!(
            err.to_string(),
            "Rule graph parse error at line 3, col 7: unexpected token"
        );
    }

    #[test]
    fn error_display_external_engine() {
        let err = VenusError::ExternalEngine {
            command: "snakemake --rulegraph".into(),
            status: Some(1),
            stderr: "MissingInputException".into(),
        };
        assert_eq!(
            err.to_string(),
            "`snakemake --rulegraph` failed with status 1: MissingInputException"
        );

        let killed = VenusError::ExternalEngine {
            command: "snakemake".into(),
            status: None,
            stderr: String::new(),
        };
        assert!(killed.to_string().contains("status unknown"));
    }

    #[test]
    fn error_display_invalid_values() {
        let err = VenusError::InvalidValues {
            errors: vec![
                ValueError::new("threads", "expected integer, got string"),
                ValueError::new("assembler", "must be one of: spades, skesa"),
            ],
        };
        assert_eq!(
            err.to_string(),
            "Found 2 invalid value(s): threads: expected integer, got string; assembler: must be one of: spades, skesa"
        );
    }

    #[test]
    fn exit_codes_distinguish_user_and_fatal_errors() {
        let missing = VenusError::MissingRequirements {
            tier: Tier::Universal,
            keys: vec!["output_dir".into()],
        };
        assert!(missing.is_user_fixable());
        assert_eq!(missing.exit_code(), EXIT_CONFIG_INVALID);

        let schema = VenusError::SchemaParse("bad yaml".into());
        assert!(schema.is_fatal());
        assert_eq!(schema.exit_code(), EXIT_FATAL);

        let io = VenusError::Io(std::io::Error::new(std::io::ErrorKind::NotFound, "gone"));
        assert_eq!(io.exit_code(), EXIT_FATAL);
        assert_ne!(EXIT_PIPELINE_FAILED, EXIT_CONFIG_INVALID);
        assert_ne!(EXIT_SUCCESS, EXIT_PIPELINE_FAILED);
    }

    #[test]
    fn tier_serializes_tagged() {
        let json = serde_json::to_value(Tier::Target("annotation".into())).unwrap();
        assert_eq!(json, serde_json::json!({"tier": "target", "name": "annotation"}));
        let back: Tier = serde_json::from_value(json).unwrap();
        assert_eq!(back, Tier::Target("annotation".into()));

        let json = serde_json::to_value(Tier::EngineSelection).unwrap();
        assert_eq!(json, serde_json::json!({"tier": "engine_selection"}));
    }
}
