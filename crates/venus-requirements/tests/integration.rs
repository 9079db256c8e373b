//! End-to-end tests for the Venus requirement gate.
//!
//! Each test walks the whole path: load schema -> load config -> apply
//! overrides -> read the rule graph -> resolve every tier -> verify.

use std::collections::BTreeSet;

use venus_requirements::{
    check_engine, check_targets, check_universal, detect_targets, parse_samples,
    render_config_template, validate, validate_samples, Config, RecordSchema, RuleGraph,
    SchemaModel, ValidationOutcome, Validator,
};
use venus_types::{Result, Tier, VenusError, EXIT_CONFIG_INVALID, EXIT_FATAL};

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

const SCHEMA: &str = r#"
engine_key: assembler
properties:
  output_dir: {type: string, description: "Directory for all results"}
  samplesheet_fp: {type: string}
  assembler: {type: string, enum: [spades, skesa]}
  min_contig_len: {type: integer, minimum: 0}
  kmer_sizes: {type: array}
  threads: {type: integer, minimum: 1, default: 1}
universal: [output_dir, samplesheet_fp]
engines:
  spades: [min_contig_len, kmer_sizes]
  skesa: [min_contig_len]
targets:
  annotation: [reference_genome]
  assembly_qc: [busco_lineage]
"#;

/// `snakemake --rulegraph` output for a run that annotates but skips QC.
const RULEGRAPH: &str = r#"Building DAG of jobs...
digraph snakemake_dag {
    graph[bgcolor=white, margin=0];
    node[shape=box, style=rounded, fontname=sans, fontsize=10, penwidth=2];
    edge[penwidth=2, color=grey];
	0[label = "all", color = "0.00 0.6 0.85", style="rounded"];
	1[label = "annotation", color = "0.44 0.6 0.85", style="rounded"];
	2[label = "assemble", color = "0.22 0.6 0.85", style="rounded"];
	3[label = "trim_reads", color = "0.11 0.6 0.85", style="rounded"];
	4[label = "qc_report", color = "0.33 0.6 0.85", style="rounded"];
	1 -> 0
	4 -> 0
	2 -> 1
	3 -> 2
}
"#;

fn schema() -> SchemaModel {
    SchemaModel::load(SCHEMA).expect("schema should load")
}

fn config(yaml: &str) -> Config {
    Config::from_yaml_str(yaml).expect("config should parse")
}

fn rulegraph() -> Result<String> {
    Ok(RULEGRAPH.to_string())
}

// ---------------------------------------------------------------------------
// Scenario: spades selected, one engine key missing
// ---------------------------------------------------------------------------

#[tokio::test]
async fn spades_without_kmer_sizes_stops_at_engine_tier() {
    let cfg = config(
        "output_dir: venus_output\nsamplesheet_fp: samplesheet.tsv\nassembler: spades\nmin_contig_len: 500\n",
    );
    let outcome = validate(&schema(), &cfg, rulegraph).await.unwrap();
    assert_eq!(
        outcome,
        ValidationOutcome::Failed {
            tier: Tier::Engine("spades".into()),
            missing: vec!["kmer_sizes".into()],
        }
    );
}

// ---------------------------------------------------------------------------
// Scenario: annotation target in the graph, reference missing
// ---------------------------------------------------------------------------

#[tokio::test]
async fn annotation_in_graph_requires_reference_genome() {
    let cfg = config(
        "output_dir: venus_output\nsamplesheet_fp: samplesheet.tsv\nassembler: skesa\nmin_contig_len: 500\n",
    );
    let err = validate(&schema(), &cfg, rulegraph)
        .await
        .unwrap()
        .into_result()
        .unwrap_err();
    assert_eq!(
        err.to_string(),
        "The target 'annotation' tier requires the following keys to be defined and uncommented: reference_genome"
    );
    assert_eq!(err.exit_code(), EXIT_CONFIG_INVALID);
}

// ---------------------------------------------------------------------------
// Scenario: graph stages that are not schema targets add nothing
// ---------------------------------------------------------------------------

#[tokio::test]
async fn non_target_stages_add_no_requirements() {
    let cfg = config(
        "output_dir: o\nsamplesheet_fp: s.tsv\nassembler: skesa\nmin_contig_len: 0\nreference_genome: ref.gbk\n",
    );
    let targets = validate(&schema(), &cfg, rulegraph)
        .await
        .unwrap()
        .into_result()
        .expect("qc_report is not a schema target");
    assert_eq!(targets, BTreeSet::from(["annotation".to_string()]));
}

// ---------------------------------------------------------------------------
// Overrides flow through every tier
// ---------------------------------------------------------------------------

#[tokio::test]
async fn overrides_complete_a_partial_config() {
    let mut cfg = config("output_dir: o\nsamplesheet_fp: s.tsv\nassembler: skesa\n");
    cfg.apply_overrides(["min_contig_len:500", "reference_genome:ref.gbk"])
        .unwrap();
    let outcome = validate(&schema(), &cfg, rulegraph).await.unwrap();
    assert!(outcome.is_passed(), "expected pass, got {outcome:?}");

    cfg.apply_overrides(["min_contig_len:-1"]).unwrap();
    let outcome = validate(&schema(), &cfg, rulegraph).await.unwrap();
    let ValidationOutcome::Invalid { errors } = outcome else {
        panic!("expected structural failure");
    };
    assert_eq!(errors[0].to_string(), "min_contig_len: must be >= 0");
}

// ---------------------------------------------------------------------------
// Resolver functions agree with the façade
// ---------------------------------------------------------------------------

#[test]
fn resolver_functions_match_detected_graph() {
    let s = schema();
    let cfg = config("assembler: spades\n");
    let graph = RuleGraph::parse(RULEGRAPH).unwrap();
    let targets = detect_targets(&graph, &s);

    assert_eq!(check_universal(&cfg, &s), vec!["output_dir", "samplesheet_fp"]);
    assert_eq!(check_engine(&cfg, &s), vec!["min_contig_len", "kmer_sizes"]);
    let report = check_targets(&cfg, &s, &targets);
    assert_eq!(report.len(), 1);
    assert_eq!(report["annotation"], vec!["reference_genome"]);
}

#[tokio::test]
async fn accumulating_mode_lists_config_tiers_before_planning() {
    let s = schema();
    let report = Validator::new(&s)
        .validate_all(&config("assembler: spades\n"), rulegraph)
        .await
        .unwrap();
    let tiers: Vec<Tier> = report.failures().into_iter().map(|(tier, _)| tier).collect();
    assert_eq!(tiers, vec![Tier::Universal, Tier::Engine("spades".into())]);
    assert!(report.detected.is_none());

    let report = Validator::new(&s)
        .validate_all(
            &config("output_dir: o\nsamplesheet_fp: s.tsv\nassembler: skesa\nmin_contig_len: 1\n"),
            rulegraph,
        )
        .await
        .unwrap();
    let tiers: Vec<Tier> = report.failures().into_iter().map(|(tier, _)| tier).collect();
    assert_eq!(tiers, vec![Tier::Target("annotation".into())]);
}

// ---------------------------------------------------------------------------
// Fatal errors are never downgraded
// ---------------------------------------------------------------------------

#[tokio::test]
async fn malformed_rulegraph_is_fatal() {
    let cfg = config(
        "output_dir: o\nsamplesheet_fp: s.tsv\nassembler: skesa\nmin_contig_len: 1\n",
    );
    let truncated = || -> Result<String> { Ok("digraph snakemake_dag {\n 0[label = \"all\"".into()) };
    let err = validate(&schema(), &cfg, truncated).await.unwrap_err();
    assert!(matches!(err, VenusError::GraphParse { .. }));
    assert_eq!(err.exit_code(), EXIT_FATAL);
}

// ---------------------------------------------------------------------------
// init template round trip and samplesheet checks
// ---------------------------------------------------------------------------

#[test]
fn init_template_validates_as_incomplete() {
    let s = schema();
    let mut defaults = Config::default();
    defaults
        .apply_overrides(["output_dir:venus_output", "samplesheet_fp:samplesheet.tsv"])
        .unwrap();
    let (text, unused) = render_config_template(&s, &defaults);
    assert!(unused.is_empty());

    let written = config(&text);
    assert!(check_universal(&written, &s).is_empty());
    assert_eq!(check_engine(&written, &s), vec!["assembler"]);
    assert!(!written.is_provided("threads"));
}

#[test]
fn samplesheet_findings_are_user_fixable() {
    let schema = RecordSchema::load("properties:\n  sample_id: {type: string}\nrequired: [sample_id, R1]\n").unwrap();
    let samples = parse_samples("sample_id\tR1\nS1\tS1_R1.fastq.gz\nS2\t\n").unwrap();
    let errors = validate_samples(&samples, &schema);
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].to_string(), "row 2: R1: is required");

    let err = VenusError::InvalidValues { errors };
    assert!(err.is_user_fixable());
}
