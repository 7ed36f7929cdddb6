use std::process::Stdio;
use std::time::Duration;

use runtally_core::{AppError, AppResult};
use serde_json::Value;
use tokio::process::Command;
use tracing::trace;

/// Runs `aws` CLI commands with JSON output and a fixed timeout.
#[derive(Debug, Clone)]
pub struct AwsCliRunner {
    program: String,
    profile: Option<String>,
    region: Option<String>,
    timeout: Duration,
}

impl AwsCliRunner {
    /// Creates a runner invoking `aws` from `PATH`.
    #[must_use]
    pub fn new(timeout: Duration) -> Self {
        Self {
            program: "aws".to_owned(),
            profile: None,
            region: None,
            timeout,
        }
    }

    /// Sets the named CLI profile passed with `--profile`.
    #[must_use]
    pub fn with_profile(mut self, profile: Option<String>) -> Self {
        self.profile = profile.filter(|profile| !profile.trim().is_empty());
        self
    }

    /// Sets the region passed with `--region`.
    #[must_use]
    pub fn with_region(mut self, region: Option<String>) -> Self {
        self.region = region.filter(|region| !region.trim().is_empty());
        self
    }

    /// Overrides the executable.
    #[must_use]
    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    /// Runs one command and parses its standard output as JSON.
    ///
    /// A spawn failure, timeout, non-zero exit or unparsable output is an
    /// [`AppError::Transport`].
    pub async fn run_json(&self, args: &[&str]) -> AppResult<Value> {
        let mut command = Command::new(self.program.as_str());
        command.args(args).args(["--output", "json"]);
        if let Some(profile) = &self.profile {
            command.args(["--profile", profile.as_str()]);
        }
        if let Some(region) = &self.region {
            command.args(["--region", region.as_str()]);
        }
        command
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let rendered = args.join(" ");
        trace!(target: "raw_payload", program = %self.program, args = %rendered, "invoking aws cli");

        let output = tokio::time::timeout(self.timeout, command.output())
            .await
            .map_err(|_| {
                AppError::Transport(format!(
                    "{} {rendered} timed out after {}s",
                    self.program,
                    self.timeout.as_secs()
                ))
            })?
            .map_err(|error| {
                AppError::Transport(format!("failed to invoke {} {rendered}: {error}", self.program))
            })?;

        if !output.status.success() {
            let code = output
                .status
                .code()
                .map_or_else(|| "signal".to_owned(), |code| code.to_string());
            return Err(AppError::Transport(format!(
                "exit code {code} for {} {rendered}: {}",
                self.program,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        serde_json::from_slice::<Value>(&output.stdout).map_err(|error| {
            AppError::Transport(format!(
                "failed to parse output of {} {rendered}: {error}",
                self.program
            ))
        })
    }
}
