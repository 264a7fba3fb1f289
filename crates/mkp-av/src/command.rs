//! Builder for executing external tool commands with timeout support.

use std::path::PathBuf;
use std::process::ExitStatus;
use std::time::Duration;

use tokio::process::Command;

/// Default command timeout: 5 minutes.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(300);

/// Output captured from a tool execution.
#[derive(Debug, Clone)]
pub struct ToolOutput {
    /// Process exit status.
    pub status: ExitStatus,
    /// Captured standard output (lossy UTF-8).
    pub stdout: String,
    /// Captured standard error (lossy UTF-8).
    pub stderr: String,
}

/// A low-level command failure, before it is classified.
///
/// The command runner does not know whether it was extracting, mutating, or
/// remuxing; callers map this into the matching [`mkp_core::Error`] variant.
#[derive(Debug)]
pub struct CommandFailure {
    /// File name of the tool that failed.
    pub tool: String,
    /// Diagnostic text, including stderr where available.
    pub message: String,
}

/// A builder for constructing and executing external tool invocations.
#[derive(Debug)]
pub struct ToolCommand {
    program: PathBuf,
    args: Vec<String>,
    timeout: Duration,
    /// Keeps the options file alive until the process has exited.
    options_file: Option<tempfile::NamedTempFile>,
}

impl ToolCommand {
    /// Create a new command for the given program path.
    pub fn new(program: PathBuf) -> Self {
        Self {
            program,
            args: Vec::new(),
            timeout: DEFAULT_TIMEOUT,
            options_file: None,
        }
    }

    /// Append a single argument.
    pub fn arg(mut self, s: impl Into<String>) -> Self {
        self.args.push(s.into());
        self
    }

    /// Append multiple arguments.
    pub fn args(mut self, iter: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.args.extend(iter.into_iter().map(Into::into));
        self
    }

    /// Set the maximum execution time.
    pub fn timeout(mut self, d: Duration) -> Self {
        self.timeout = d;
        self
    }

    /// Pass `options` through a JSON options file (`@file`), the mkvtoolnix
    /// convention for long argument lists. Avoids OS command-line length
    /// limits on files with many tracks.
    pub fn options_via_file(
        mut self,
        options: &[String],
    ) -> std::result::Result<Self, CommandFailure> {
        let tool = self.tool_name();
        let file = tempfile::Builder::new()
            .prefix("mkvpriority-opts-")
            .suffix(".json")
            .tempfile()
            .map_err(|e| CommandFailure {
                tool: tool.clone(),
                message: format!("failed to create options file: {e}"),
            })?;
        serde_json::to_writer(&file, options).map_err(|e| CommandFailure {
            tool,
            message: format!("failed to write options file: {e}"),
        })?;
        self.args.push(format!("@{}", file.path().display()));
        self.options_file = Some(file);
        Ok(self)
    }

    fn tool_name(&self) -> String {
        self.program
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| self.program.to_string_lossy().to_string())
    }

    /// Execute the command, capturing stdout and stderr.
    ///
    /// Fails when the process cannot be spawned, exits non-zero (the message
    /// includes trimmed stderr), or exceeds the timeout.
    pub async fn execute(self) -> std::result::Result<ToolOutput, CommandFailure> {
        let tool = self.tool_name();

        tracing::debug!(tool = %tool, args = ?self.args, "running tool");

        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args);
        cmd.stdout(std::process::Stdio::piped());
        cmd.stderr(std::process::Stdio::piped());
        cmd.kill_on_drop(true);

        let child = cmd.spawn().map_err(|e| CommandFailure {
            tool: tool.clone(),
            message: format!("failed to spawn: {e}"),
        })?;

        let result = tokio::time::timeout(self.timeout, child.wait_with_output()).await;

        match result {
            Ok(Ok(output)) => {
                let tool_output = ToolOutput {
                    status: output.status,
                    stdout: String::from_utf8_lossy(&output.stdout).to_string(),
                    stderr: String::from_utf8_lossy(&output.stderr).to_string(),
                };

                if !output.status.success() {
                    return Err(CommandFailure {
                        tool,
                        message: format!(
                            "exited with status {}: {}",
                            output.status,
                            tool_output.stderr.trim()
                        ),
                    });
                }

                Ok(tool_output)
            }
            Ok(Err(e)) => Err(CommandFailure {
                tool,
                message: format!("I/O error waiting for process: {e}"),
            }),
            // On timeout the wait future is dropped and kill_on_drop reaps
            // the child.
            Err(_elapsed) => Err(CommandFailure {
                tool,
                message: format!("timed out after {:?}", self.timeout),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn execute_echo() {
        // `echo` should be universally available.
        let output = ToolCommand::new(PathBuf::from("echo"))
            .arg("hello")
            .execute()
            .await;

        match output {
            Ok(out) => {
                assert!(out.status.success());
                assert!(out.stdout.trim().contains("hello"));
            }
            Err(_) => {
                // On some minimal environments echo may not exist; skip.
            }
        }
    }

    #[tokio::test]
    async fn execute_nonexistent_tool() {
        let result = ToolCommand::new(PathBuf::from("nonexistent_tool_xyz_12345"))
            .execute()
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn timeout_fires() {
        // `sleep 10` should be killed well before 10 seconds.
        let result = ToolCommand::new(PathBuf::from("sleep"))
            .arg("10")
            .timeout(Duration::from_millis(100))
            .execute()
            .await;
        assert!(result.is_err());
        let err = result.err().map(|f| f.message).unwrap_or_default();
        assert!(err.contains("timed out"), "unexpected error: {err}");
    }

    #[tokio::test]
    async fn options_file_expands_on_the_tool_side() {
        // `cat @file` would fail; use echo to verify the arg shape only.
        let cmd = ToolCommand::new(PathBuf::from("echo"))
            .options_via_file(&["--set".to_string(), "flag-default=1".to_string()]);
        let cmd = match cmd {
            Ok(c) => c,
            Err(_) => return,
        };
        let out = cmd.execute().await;
        if let Ok(out) = out {
            assert!(out.stdout.contains('@'));
        }
    }
}
