//! Builder for running external tools
//!
//! Patch application, diffing, regeneration commands and mirror uploads all
//! shell out. [`ToolCommand`] gives them one code path for logging, timeouts
//! and turning a non-zero exit into [`DepbumpError::ToolFailed`].
//!
//! ```rust,no_run
//! use depbump::process::ToolCommand;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let output = ToolCommand::new("diff")
//!     .args(["-urN", "a", "b"])
//!     .current_dir("/tmp/work/foo")
//!     .allow_exit_code(1)
//!     .execute()
//!     .await?;
//! println!("{} bytes of diff", output.stdout.len());
//! # Ok(())
//! # }
//! ```

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tokio::time::timeout;

use crate::constants::TOOL_TIMEOUT;
use crate::core::DepbumpError;

/// Fluent builder for one external process invocation.
pub struct ToolCommand {
    program: String,

    args: Vec<String>,

    current_dir: Option<PathBuf>,

    /// Exit codes other than 0 that still count as success
    allowed_exit_codes: Vec<i32>,

    timeout_duration: Option<Duration>,

    context: Option<String>,
}

/// Captured output of a finished process.
#[derive(Debug)]
pub struct ToolOutput {
    /// Raw standard output; diffs are not guaranteed to be UTF-8
    pub stdout: Vec<u8>,
    pub stderr: String,
    /// Exit code, `None` when terminated by a signal
    pub code: Option<i32>,
}

impl ToolCommand {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            current_dir: None,
            allowed_exit_codes: Vec::new(),
            timeout_duration: Some(TOOL_TIMEOUT),
            context: None,
        }
    }

    /// Builds a command from an argv vector (`argv[0]` is the program).
    ///
    /// # Errors
    ///
    /// Fails when `argv` is empty.
    pub fn from_argv(argv: &[String]) -> Result<Self> {
        let (program, rest) = argv.split_first().ok_or_else(|| DepbumpError::Other {
            message: "empty command".to_string(),
        })?;
        Ok(Self::new(program.clone()).args(rest.iter().cloned()))
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn current_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.current_dir = Some(dir.as_ref().to_path_buf());
        self
    }

    /// Treats `code` as a successful exit (`diff` exits 1 when files differ).
    pub fn allow_exit_code(mut self, code: i32) -> Self {
        self.allowed_exit_codes.push(code);
        self
    }

    pub const fn with_timeout(mut self, duration: Option<Duration>) -> Self {
        self.timeout_duration = duration;
        self
    }

    /// Adds a context label to log lines, usually the dependency name.
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    fn display_dir(&self) -> String {
        self.current_dir.as_ref().map_or_else(|| ".".to_string(), |d| d.display().to_string())
    }

    /// Runs the process to completion and captures its output.
    ///
    /// The child is not killed if this future is dropped; an abandoned
    /// regeneration command runs to completion in the background.
    ///
    /// # Errors
    ///
    /// - [`DepbumpError::ToolNotFound`] when the program cannot be found
    /// - [`DepbumpError::ToolFailed`] on a disallowed exit code or timeout
    pub async fn execute(self) -> Result<ToolOutput> {
        let start = std::time::Instant::now();
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(false);
        if let Some(ref dir) = self.current_dir {
            cmd.current_dir(dir);
        }

        let command_line = format!("{} {}", self.program, self.args.join(" "));
        let ctx = self.context.as_deref().unwrap_or("-");
        tracing::debug!(target: "tool", "({}) Executing in {}: {}", ctx, self.display_dir(), command_line);

        let output_future = cmd.output();
        let result = match self.timeout_duration {
            Some(duration) => match timeout(duration, output_future).await {
                Ok(result) => result,
                Err(_) => {
                    tracing::warn!(
                        target: "tool",
                        "({}) Command timed out after {} seconds: {}",
                        ctx,
                        duration.as_secs(),
                        command_line
                    );
                    return Err(DepbumpError::ToolFailed {
                        tool: self.program.clone(),
                        dir: self.display_dir(),
                        stderr: format!("timed out after {} seconds", duration.as_secs()),
                    }
                    .into());
                }
            },
            None => output_future.await,
        };

        let output = match result {
            Ok(output) => output,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(DepbumpError::ToolNotFound {
                    tool: self.program.clone(),
                }
                .into());
            }
            Err(e) => {
                return Err(e).with_context(|| format!("Failed to execute {command_line}"));
            }
        };

        let code = output.status.code();
        let stderr = String::from_utf8_lossy(&output.stderr).to_string();
        let allowed = output.status.success()
            || code.is_some_and(|c| self.allowed_exit_codes.contains(&c));

        if !allowed {
            tracing::debug!(target: "tool", "({}) Command failed with exit code: {:?}", ctx, code);
            let stderr = if stderr.trim().is_empty() {
                String::from_utf8_lossy(&output.stdout).trim().to_string()
            } else {
                stderr.trim().to_string()
            };
            return Err(DepbumpError::ToolFailed {
                tool: self.program.clone(),
                dir: self.display_dir(),
                stderr: if stderr.is_empty() {
                    format!("exit status {}", code.map_or_else(|| "signal".to_string(), |c| c.to_string()))
                } else {
                    stderr
                },
            }
            .into());
        }

        if !stderr.is_empty() {
            tracing::debug!(target: "tool", "({}) {}", ctx, stderr.trim());
        }

        let elapsed = start.elapsed();
        if elapsed.as_secs() > 1 {
            tracing::debug!(
                target: "tool::perf",
                "({}) {} took {:.2}s",
                ctx,
                self.program,
                elapsed.as_secs_f64()
            );
        }

        Ok(ToolOutput {
            stdout: output.stdout,
            stderr,
            code,
        })
    }

    /// Runs the process and discards its output.
    pub async fn execute_success(self) -> Result<()> {
        self.execute().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_execute_captures_stdout() {
        let output = ToolCommand::new("sh").args(["-c", "printf hello"]).execute().await.unwrap();
        assert_eq!(output.stdout, b"hello");
        assert_eq!(output.code, Some(0));
    }

    #[tokio::test]
    async fn test_execute_in_current_dir() {
        let temp = tempdir().unwrap();
        std::fs::write(temp.path().join("marker"), "x").unwrap();

        ToolCommand::new("test").args(["-f", "marker"]).current_dir(temp.path()).execute_success().await.unwrap();
    }

    #[tokio::test]
    async fn test_allowed_exit_code() {
        let output = ToolCommand::new("sh")
            .args(["-c", "echo changed; exit 1"])
            .allow_exit_code(1)
            .execute()
            .await
            .unwrap();
        assert_eq!(output.code, Some(1));
        assert_eq!(output.stdout, b"changed\n");
    }

    #[tokio::test]
    async fn test_failure_reports_stderr() {
        let err = ToolCommand::new("sh")
            .args(["-c", "echo broken >&2; exit 2"])
            .allow_exit_code(1)
            .execute()
            .await
            .unwrap_err();

        match err.downcast_ref::<DepbumpError>() {
            Some(DepbumpError::ToolFailed { tool, stderr, .. }) => {
                assert_eq!(tool, "sh");
                assert_eq!(stderr, "broken");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_missing_program() {
        let err = ToolCommand::new("depbump-no-such-tool").execute().await.unwrap_err();
        assert!(matches!(err.downcast_ref::<DepbumpError>(), Some(DepbumpError::ToolNotFound { .. })));
    }

    #[tokio::test]
    async fn test_timeout() {
        let err = ToolCommand::new("sleep")
            .arg("5")
            .with_timeout(Some(Duration::from_millis(50)))
            .execute()
            .await
            .unwrap_err();
        assert!(err.to_string().contains("timed out"));
    }

    #[test]
    fn test_from_argv_empty() {
        assert!(ToolCommand::from_argv(&[]).is_err());
    }
}
