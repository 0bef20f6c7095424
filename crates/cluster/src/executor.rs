//! Command executors for the `oc` binary.

use async_trait::async_trait;
use std::process::Stdio;
use thoth_s2i_common::{Error, Result};
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

/// Captured result of a finished command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

/// Trait for command execution.
#[async_trait]
pub trait Executor: Send + Sync {
    /// Run `program` with `args`, feeding `stdin` when given.
    async fn execute(&self, program: &str, args: &[String], stdin: Option<&str>)
        -> Result<CommandOutput>;
}

/// Runs commands on the local machine.
pub struct LocalExecutor;

impl LocalExecutor {
    pub fn new() -> Self {
        Self
    }
}

impl Default for LocalExecutor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Executor for LocalExecutor {
    async fn execute(
        &self,
        program: &str,
        args: &[String],
        stdin: Option<&str>,
    ) -> Result<CommandOutput> {
        let command_line = format!("{} {}", program, args.join(" "));
        debug!("Local exec: {}", command_line);

        let path = which::which(program).map_err(|e| Error::Oc {
            cmd: command_line.clone(),
            reason: format!("{} is not installed or not available on PATH: {}", program, e),
        })?;

        let mut child = Command::new(path)
            .args(args)
            .stdin(if stdin.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()?;

        if let (Some(input), Some(mut pipe)) = (stdin, child.stdin.take()) {
            pipe.write_all(input.as_bytes()).await?;
            // Close stdin so the command sees EOF.
            drop(pipe);
        }

        let output = child.wait_with_output().await?;

        Ok(CommandOutput {
            exit_code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_program_is_oc_error() {
        let err = LocalExecutor::new()
            .execute("thoth-s2i-no-such-binary", &[], None)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Oc { .. }));
        assert!(err.to_string().contains("not available on PATH"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_stdin_is_forwarded() {
        let output = LocalExecutor::new()
            .execute("cat", &[], Some("kind: BuildConfig\n"))
            .await
            .unwrap();
        assert!(output.success());
        assert_eq!(output.stdout, "kind: BuildConfig\n");
    }
}
