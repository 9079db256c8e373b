//! Snakemake invocation: planning runs for the rule graph and the real run.

use std::path::PathBuf;
use std::process::Stdio;

use async_trait::async_trait;

use venus_types::{Result, VenusError};

use crate::validation::GraphTextProvider;

pub const DEFAULT_PROGRAM: &str = "snakemake";

/// One Snakemake command line, reused for planning and execution.
#[derive(Debug, Clone)]
pub struct SnakemakeInvocation {
    pub program: PathBuf,
    pub snakefile: PathBuf,
    pub configfile: PathBuf,
    pub use_conda: bool,
    /// Arguments passed through to Snakemake unchanged.
    pub extra_args: Vec<String>,
    /// `key=value` pairs for Snakemake's `--config`.
    pub config_overrides: Vec<String>,
}

impl SnakemakeInvocation {
    pub fn new(snakefile: impl Into<PathBuf>, configfile: impl Into<PathBuf>) -> Self {
        Self {
            program: PathBuf::from(DEFAULT_PROGRAM),
            snakefile: snakefile.into(),
            configfile: configfile.into(),
            use_conda: true,
            extra_args: Vec::new(),
            config_overrides: Vec::new(),
        }
    }

    pub fn with_program(mut self, program: impl Into<PathBuf>) -> Self {
        self.program = program.into();
        self
    }

    pub fn with_extra_args(mut self, args: impl IntoIterator<Item = String>) -> Self {
        self.extra_args.extend(args);
        self
    }

    /// Forward `key:value` overrides as `--config key=value`.
    pub fn with_config_overrides<S: AsRef<str>>(mut self, pairs: &[S]) -> Self {
        for pair in pairs {
            let pair = pair.as_ref().trim();
            let forwarded = match pair.split_once(':') {
                Some((key, value)) => format!("{}={}", key.trim(), value.trim()),
                None => pair.to_string(),
            };
            self.config_overrides.push(forwarded);
        }
        self
    }

    /// Arguments for a run, with `mode` flags ahead of `--config` (which
    /// swallows everything after it).
    fn args_with(&self, mode: &[&str]) -> Vec<String> {
        let mut args = Vec::new();
        if self.use_conda {
            args.push("--use-conda".to_string());
        }
        args.push("--snakefile".to_string());
        args.push(self.snakefile.display().to_string());
        args.push("--configfile".to_string());
        args.push(self.configfile.display().to_string());
        args.push("-p".to_string());
        args.extend(self.extra_args.iter().cloned());
        args.extend(mode.iter().map(|s| s.to_string()));
        if !self.config_overrides.is_empty() {
            args.push("--config".to_string());
            args.extend(self.config_overrides.iter().cloned());
        }
        args
    }

    /// Arguments of the execution run.
    pub fn args(&self) -> Vec<String> {
        self.args_with(&[])
    }

    /// The execution command line, for display.
    pub fn command_line(&self) -> String {
        render(&self.program, &self.args())
    }

    /// Run the planning mode and capture the rule graph from stdout. The
    /// engine's stderr is kept verbatim in the error on failure.
    pub async fn rule_graph(&self) -> Result<String> {
        let args = self.args_with(&["--rulegraph"]);
        let command = render(&self.program, &args);
        tracing::debug!(command = %command, "planning run");

        let output = tokio::process::Command::new(&self.program)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| VenusError::ExternalEngine {
                command: command.clone(),
                status: None,
                stderr: format!("failed to spawn: {e}"),
            })?;

        if !output.status.success() {
            return Err(VenusError::ExternalEngine {
                command,
                status: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            });
        }

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        tracing::debug!(stdout_len = stdout.len(), "planning run completed");
        Ok(stdout)
    }

    /// Run the pipeline with inherited stdio and return its exit status.
    /// A run ended by a signal reports `-1`.
    pub async fn execute(&self) -> Result<i32> {
        let args = self.args();
        let command = render(&self.program, &args);
        tracing::info!(command = %command, "running pipeline");

        let status = tokio::process::Command::new(&self.program)
            .args(&args)
            .status()
            .await
            .map_err(|e| VenusError::ExternalEngine {
                command,
                status: None,
                stderr: format!("failed to spawn: {e}"),
            })?;

        let exit_code = status.code().unwrap_or(-1);
        tracing::info!(exit_code, "pipeline finished");
        Ok(exit_code)
    }
}

fn render(program: &std::path::Path, args: &[String]) -> String {
    let mut parts = vec![program.display().to_string()];
    parts.extend(args.iter().cloned());
    parts.join(" ")
}

#[async_trait]
impl GraphTextProvider for SnakemakeInvocation {
    async fn graph_text(&mut self) -> Result<String> {
        self.rule_graph().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn argv_order() {
        let invocation = SnakemakeInvocation::new("Snakefile", "config.yml")
            .with_extra_args(vec!["--cores".to_string(), "4".to_string()])
            .with_config_overrides(&["threads:8"]);
        assert_eq!(
            invocation.args(),
            vec![
                "--use-conda",
                "--snakefile",
                "Snakefile",
                "--configfile",
                "config.yml",
                "-p",
                "--cores",
                "4",
                "--config",
                "threads=8",
            ]
        );
        assert_eq!(
            invocation.args_with(&["--rulegraph"])[8],
            "--rulegraph"
        );
        assert!(invocation.command_line().starts_with("snakemake --use-conda"));
    }

    #[test]
    fn conda_can_be_disabled() {
        let mut invocation = SnakemakeInvocation::new("Snakefile", "c.yml");
        invocation.use_conda = false;
        assert_eq!(invocation.args()[0], "--snakefile");
        assert!(!invocation.args().contains(&"--config".to_string()));
    }

    #[tokio::test]
    async fn spawn_failure_is_external_engine_error() {
        let dir = tempfile::tempdir().unwrap();
        let invocation = SnakemakeInvocation::new("Snakefile", "c.yml")
            .with_program(dir.path().join("no-such-snakemake"));
        let err = invocation.rule_graph().await.unwrap_err();
        match err {
            VenusError::ExternalEngine { status, stderr, .. } => {
                assert_eq!(status, None);
                assert!(stderr.starts_with("failed to spawn"));
            }
            other => panic!("expected ExternalEngine, got {other:?}"),
        }
    }

    #[cfg(unix)]
    mod unix {
        use super::*;
        use std::os::unix::fs::PermissionsExt;
        use std::path::Path;

        fn script(dir: &Path, name: &str, body: &str) -> PathBuf {
            let path = dir.join(name);
            std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
            std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
            path
        }

        #[tokio::test]
        async fn rule_graph_captures_stdout() {
            let dir = tempfile::tempdir().unwrap();
            let program = script(
                dir.path(),
                "snakemake",
                r#"printf 'digraph snakemake_dag {\n  0[label = "all"];\n}\n'"#,
            );
            let invocation = SnakemakeInvocation::new("Snakefile", "c.yml").with_program(program);
            let text = invocation.rule_graph().await.unwrap();
            assert!(text.starts_with("digraph snakemake_dag {"));
            assert!(text.contains("label = \"all\""));
        }

        #[tokio::test]
        async fn failing_planning_run_keeps_stderr() {
            let dir = tempfile::tempdir().unwrap();
            let program = script(
                dir.path(),
                "snakemake",
                "echo 'MissingInputException in rule annotation' >&2\nexit 1",
            );
            let mut invocation =
                SnakemakeInvocation::new("Snakefile", "c.yml").with_program(program);
            let err = invocation.graph_text().await.unwrap_err();
            match err {
                VenusError::ExternalEngine {
                    command,
                    status,
                    stderr,
                } => {
                    assert!(command.ends_with("--rulegraph"));
                    assert_eq!(status, Some(1));
                    assert_eq!(stderr, "MissingInputException in rule annotation\n");
                }
                other => panic!("expected ExternalEngine, got {other:?}"),
            }
        }

        #[tokio::test]
        async fn execute_reports_exit_status() {
            let dir = tempfile::tempdir().unwrap();
            let program = script(dir.path(), "snakemake", "exit 3");
            let invocation = SnakemakeInvocation::new("Snakefile", "c.yml").with_program(program);
            assert_eq!(invocation.execute().await.unwrap(), 3);
        }
    }
}
