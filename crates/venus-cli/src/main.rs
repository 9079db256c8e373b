//! CLI binary for configuring, checking and running the Venus pipeline.

use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand};

use venus_requirements::{
    load_samples, render_config_template, validate_samples, Config, RecordSchema, SchemaModel,
    SnakemakeInvocation, ValidationReport, Validator,
};
use venus_types::{VenusError, EXIT_CONFIG_INVALID, EXIT_FATAL, EXIT_PIPELINE_FAILED, EXIT_SUCCESS};

const CONFIG_SCHEMA: &str = include_str!("../data/config.schema.yaml");
const SAMPLESHEET_SCHEMA: &str = include_str!("../data/samplesheet.schema.yaml");
const DEFAULT_VALUES: [&str; 2] = ["output_dir:venus_output", "samplesheet_fp:samplesheet.tsv"];

#[derive(Parser)]
#[command(
    name = "venus",
    version,
    about = "Configuration gate and runner for the Venus WGS assembly pipeline"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a config file with every schema key, unset keys commented out
    Init {
        /// Config values as key:value (default: output_dir:venus_output samplesheet_fp:samplesheet.tsv)
        values: Vec<String>,

        /// Output config file
        #[arg(short, long, default_value = "config.yml")]
        output: PathBuf,

        /// Existing config whose values are carried over
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Overwrite the output file if it exists
        #[arg(long)]
        force: bool,

        /// Requirement schema (default: bundled Venus schema)
        #[arg(long)]
        schema: Option<PathBuf>,
    },

    /// Check that a config satisfies every requirement of the planned run
    Check {
        #[command(flatten)]
        gate: GateArgs,

        /// Report every failing tier instead of stopping at the first
        #[arg(long)]
        all_errors: bool,
    },

    /// Check a config and samplesheet, then run the pipeline
    Run {
        #[command(flatten)]
        gate: GateArgs,
    },
}

#[derive(Args)]
struct GateArgs {
    /// Pipeline config file
    configfile: PathBuf,

    /// Requirement schema (default: bundled Venus schema)
    #[arg(long)]
    schema: Option<PathBuf>,

    /// Samplesheet record schema (default: bundled schema)
    #[arg(long)]
    samplesheet_schema: Option<PathBuf>,

    /// Snakefile describing the pipeline
    #[arg(long, default_value = "Snakefile")]
    snakefile: PathBuf,

    /// Snakemake executable
    #[arg(long, default_value = venus_requirements::planner::DEFAULT_PROGRAM)]
    snakemake: PathBuf,

    /// Do not pass --use-conda to Snakemake
    #[arg(long)]
    no_conda: bool,

    /// Override a config value as key:value (repeatable)
    #[arg(long = "set", value_name = "KEY:VALUE")]
    overrides: Vec<String>,

    /// Extra arguments passed through to Snakemake
    #[arg(last = true)]
    snakemake_args: Vec<String>,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Setup tracing
    let filter = if cli.verbose { "debug" } else { "info" };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();

    let result = match cli.command {
        Commands::Init {
            values,
            output,
            config,
            force,
            schema,
        } => cmd_init(values, &output, config.as_deref(), force, schema.as_deref()),
        Commands::Check { gate, all_errors } => cmd_check(&gate, all_errors).await,
        Commands::Run { gate } => cmd_run(&gate).await,
    };

    let code = match result {
        Ok(code) => code,
        Err(err) => report_error(&err),
    };
    std::process::exit(code);
}

/// Print an error the way the user needs to see it and pick the exit status.
fn report_error(err: &anyhow::Error) -> i32 {
    let Some(venus) = err.downcast_ref::<VenusError>() else {
        eprintln!("Error: {err:#}");
        return EXIT_FATAL;
    };
    eprint!("{}", render_error(venus));
    venus.exit_code()
}

fn render_error(err: &VenusError) -> String {
    match err {
        VenusError::MissingRequirements { tier, keys } => render_missing(&tier.to_string(), keys),
        VenusError::InvalidValues { errors } => {
            let mut out = format!("Found {} invalid value(s):\n", errors.len());
            for e in errors {
                out.push_str(&format!("  {e}\n"));
            }
            out
        }
        VenusError::GraphParse {
            source_snippet: Some(snippet),
            ..
        } => format!("Error: {err}\n  near: {snippet}\n"),
        VenusError::ExternalEngine { command, status, stderr } => {
            let status = status.map_or_else(|| "unknown".to_string(), |s| s.to_string());
            format!("Error: `{command}` failed with status {status}\n{stderr}")
        }
        other => format!("Error: {other}\n"),
    }
}

fn render_missing(tier: &str, keys: &[String]) -> String {
    let mut out = format!("The {tier} tier requires the following keys to be defined and uncommented:\n");
    for key in keys {
        out.push_str(&format!("  - {key}\n"));
    }
    out
}

fn load_schema(path: Option<&Path>) -> Result<SchemaModel, VenusError> {
    match path {
        Some(path) => SchemaModel::load_file(path),
        None => SchemaModel::load(CONFIG_SCHEMA),
    }
}

fn load_record_schema(path: Option<&Path>) -> Result<RecordSchema, VenusError> {
    match path {
        Some(path) => RecordSchema::load(&std::fs::read_to_string(path)?),
        None => RecordSchema::load(SAMPLESHEET_SCHEMA),
    }
}

fn cmd_init(
    values: Vec<String>,
    output: &Path,
    existing: Option<&Path>,
    force: bool,
    schema: Option<&Path>,
) -> anyhow::Result<i32> {
    if output.exists() && !force {
        tracing::error!(path = %output.display(), "refusing to overwrite existing config");
        eprintln!("Error: {} already exists; use --force to overwrite it", output.display());
        return Ok(EXIT_CONFIG_INVALID);
    }

    let schema = load_schema(schema)?;
    let mut config = match existing {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };

    let values = if values.is_empty() {
        tracing::info!("Default output_dir chosen: 'venus_output'");
        tracing::info!("Default samplesheet_fp chosen: 'samplesheet.tsv'");
        DEFAULT_VALUES.iter().map(|v| v.to_string()).collect()
    } else {
        values
    };
    let mut given = Config::default();
    given.apply_overrides(&values)?;
    config.merge(given);

    let (text, unused) = render_config_template(&schema, &config);
    if !unused.is_empty() {
        tracing::warn!(
            "{} key(s) not in the schema were left out: {}",
            unused.len(),
            unused.join(", ")
        );
    }
    std::fs::write(output, text)?;
    tracing::info!(path = %output.display(), "wrote config");
    Ok(EXIT_SUCCESS)
}

/// Load the config with overrides applied and the matching Snakemake command.
fn prepare(gate: &GateArgs) -> anyhow::Result<(SchemaModel, Config, SnakemakeInvocation)> {
    let schema = load_schema(gate.schema.as_deref())?;
    let mut config = Config::load(&gate.configfile)?;
    config.apply_overrides(&gate.overrides)?;

    let mut invocation = SnakemakeInvocation::new(&gate.snakefile, &gate.configfile)
        .with_program(&gate.snakemake)
        .with_extra_args(gate.snakemake_args.iter().cloned())
        .with_config_overrides(&gate.overrides);
    invocation.use_conda = !gate.no_conda;
    Ok((schema, config, invocation))
}

/// Validate every samplesheet record.
fn check_samplesheet(config: &Config, gate: &GateArgs) -> Result<(), VenusError> {
    let Some(path) = config.get("samplesheet_fp").and_then(|v| v.as_str()) else {
        tracing::debug!("no samplesheet configured");
        return Ok(());
    };
    tracing::info!(path, "validating samplesheet");
    let samples = load_samples(Path::new(path))?;
    let errors = validate_samples(&samples, &load_record_schema(gate.samplesheet_schema.as_deref())?);
    if !errors.is_empty() {
        return Err(VenusError::InvalidValues { errors });
    }
    tracing::info!(samples = samples.len(), "samplesheet is valid");
    Ok(())
}

fn print_report(report: &ValidationReport) {
    if !report.value_errors.is_empty() {
        eprint!(
            "{}",
            render_error(&VenusError::InvalidValues {
                errors: report.value_errors.clone(),
            })
        );
    }
    for (tier, keys) in report.failures() {
        eprint!("{}", render_missing(&tier.to_string(), keys));
    }
}

fn print_targets<'a>(targets: impl IntoIterator<Item = &'a String>) {
    let targets: Vec<&str> = targets.into_iter().map(String::as_str).collect();
    if targets.is_empty() {
        println!("Configuration is complete; the planned run builds no schema targets");
    } else {
        println!("Configuration is complete for targets: {}", targets.join(", "));
    }
}

async fn cmd_check(gate: &GateArgs, all_errors: bool) -> anyhow::Result<i32> {
    let (schema, config, invocation) = prepare(gate)?;
    let validator = Validator::new(&schema);

    if all_errors {
        let report = validator.validate_all(&config, invocation).await?;
        if !report.is_ok() {
            print_report(&report);
            return Ok(EXIT_CONFIG_INVALID);
        }
        check_samplesheet(&config, gate)?;
        print_targets(report.detected.iter().flatten());
        return Ok(EXIT_SUCCESS);
    }

    let targets = validator.validate(&config, invocation).await?.into_result()?;
    check_samplesheet(&config, gate)?;
    print_targets(&targets);
    Ok(EXIT_SUCCESS)
}

async fn cmd_run(gate: &GateArgs) -> anyhow::Result<i32> {
    let (schema, config, invocation) = prepare(gate)?;
    let targets = Validator::new(&schema)
        .validate(&config, invocation.clone())
        .await?
        .into_result()?;
    check_samplesheet(&config, gate)?;
    tracing::info!(targets = ?targets, "configuration satisfies all requirements");

    let exit_code = invocation.execute().await?;
    if exit_code == 0 {
        Ok(EXIT_SUCCESS)
    } else {
        tracing::error!(exit_code, "pipeline failed");
        Ok(EXIT_PIPELINE_FAILED)
    }
}
