//! Timeout-bounded execution of external commands.

use std::process::Stdio;
use std::time::{Duration, Instant};

use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use shipway_core::{PipelineError, Result};

/// Captured result of one external command.
#[derive(Debug, Clone)]
pub struct CommandOutput {
    /// Exit code (0 = success, -1 when terminated by signal).
    pub exit_code: i32,

    /// Captured stdout.
    pub stdout: String,

    /// Captured stderr.
    pub stderr: String,

    /// Duration in milliseconds.
    pub duration_ms: u64,
}

impl CommandOutput {
    /// Whether the command exited with code 0.
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Runs one external command with captured output and a hard timeout.
pub struct CommandRunner;

impl CommandRunner {
    /// Execute `program` with `args`, optionally feeding `stdin_payload` to
    /// the child's stdin (used to hand credentials over without putting
    /// them on the argv).
    ///
    /// `step` names the operation for timeout diagnostics. Extra environment
    /// variables in `envs` are visible only to the child.
    pub async fn run(
        step: &str,
        program: &str,
        args: &[String],
        envs: &[(&str, String)],
        stdin_payload: Option<&str>,
        timeout_secs: u64,
    ) -> Result<CommandOutput> {
        let start = Instant::now();

        let mut command = Command::new(program);
        command
            .args(args)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            // Dropping the wait future on timeout must also end the child:
            // a build or push that outlives its bound may not finish later
            // and mutate the registry behind a stage that already failed.
            .kill_on_drop(true);
        for (key, value) in envs {
            command.env(key, value);
        }
        if stdin_payload.is_some() {
            command.stdin(Stdio::piped());
        }

        let mut child = command.spawn()?;

        if let Some(payload) = stdin_payload {
            let mut stdin = child.stdin.take().ok_or_else(|| {
                PipelineError::InvalidInput(format!("{step}: child stdin unavailable"))
            })?;
            // A child that fails before reading its stdin closes the pipe;
            // surface its exit status instead of the broken pipe.
            match stdin.write_all(payload.as_bytes()).await {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::BrokenPipe => {}
                Err(e) => return Err(e.into()),
            }
            // Drop closes the pipe so the child sees EOF.
        }

        let output = tokio::time::timeout(
            Duration::from_secs(timeout_secs),
            child.wait_with_output(),
        )
        .await
        .map_err(|_| PipelineError::Timeout {
            step: step.to_string(),
            secs: timeout_secs,
        })??;

        Ok(CommandOutput {
            exit_code: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            duration_ms: start.elapsed().as_millis() as u64,
        })
    }
}
