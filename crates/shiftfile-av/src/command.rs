//! Builder for executing external tool commands with timeout support.

use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use tokio::process::Command;

/// Default command timeout: 5 minutes.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(300);

/// Longest stderr excerpt carried into an error message.
const STDERR_EXCERPT: usize = 2000;

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

/// Why an external command did not produce a usable result.
///
/// The command itself cannot tell whether a failure means "bad input" or
/// "encoder problem"; callers classify it with [`CommandError::into_decode`]
/// or [`CommandError::into_encode`].
#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    #[error("{tool}: failed to spawn: {source}")]
    Spawn {
        tool: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{tool}: exited with status {status}: {stderr}")]
    Failed {
        tool: String,
        status: ExitStatus,
        stderr: String,
    },

    #[error("{tool}: timed out after {timeout:?}")]
    TimedOut { tool: String, timeout: Duration },

    #[error("{tool}: I/O error waiting for process: {source}")]
    Io {
        tool: String,
        #[source]
        source: std::io::Error,
    },
}

impl CommandError {
    /// Classify as a failure to read the input.
    pub fn into_decode(self) -> shiftfile_core::Error {
        match self {
            Self::Spawn { tool, source } => spawn_error(tool, source),
            other => shiftfile_core::Error::Decode(other.to_string()),
        }
    }

    /// Classify as a failure to produce the output.
    pub fn into_encode(self) -> shiftfile_core::Error {
        match self {
            Self::Spawn { tool, source } => spawn_error(tool, source),
            other => shiftfile_core::Error::Encode(other.to_string()),
        }
    }
}

fn spawn_error(tool: String, source: std::io::Error) -> shiftfile_core::Error {
    shiftfile_core::Error::backend(tool, format!("could not be started: {source}"))
}

/// A builder for constructing and executing external tool invocations.
///
/// The child process is killed if the returned future is dropped, so a
/// timeout or an abandoned request never leaves orphaned work behind.
///
/// # Example
///
/// ```no_run
/// use shiftfile_av::ToolCommand;
/// use std::path::PathBuf;
///
/// # async fn example() -> Result<(), shiftfile_av::CommandError> {
/// let output = ToolCommand::new(PathBuf::from("ffprobe"))
///     .args(["-v", "error", "-print_format", "json", "-show_streams"])
///     .arg("/path/to/song.flac")
///     .execute()
///     .await?;
/// println!("{}", output.stdout);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct ToolCommand {
    program: PathBuf,
    args: Vec<String>,
    timeout: Duration,
}

impl ToolCommand {
    /// Create a new command for the given program path.
    pub fn new(program: PathBuf) -> Self {
        Self {
            program,
            args: Vec::new(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Append a single argument.
    pub fn arg(&mut self, s: impl Into<String>) -> &mut Self {
        self.args.push(s.into());
        self
    }

    /// Append multiple arguments.
    pub fn args(&mut self, iter: impl IntoIterator<Item = impl Into<String>>) -> &mut Self {
        self.args.extend(iter.into_iter().map(Into::into));
        self
    }

    /// Set the maximum execution time.
    pub fn timeout(&mut self, d: Duration) -> &mut Self {
        self.timeout = d;
        self
    }

    /// The arguments collected so far.
    pub fn get_args(&self) -> &[String] {
        &self.args
    }

    fn program_name(&self) -> String {
        self.program
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| self.program.to_string_lossy().to_string())
    }

    /// Execute the command, capturing stdout and stderr.
    ///
    /// # Errors
    ///
    /// - [`CommandError::Spawn`] if the process cannot be started.
    /// - [`CommandError::Failed`] on a non-zero exit (carries stderr).
    /// - [`CommandError::TimedOut`] if the timeout expires; the child is
    ///   killed.
    pub async fn execute(&self) -> Result<ToolOutput, CommandError> {
        let tool = self.program_name();
        tracing::debug!(tool = %tool, args = ?self.args, "running external tool");

        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let child = cmd.spawn().map_err(|source| CommandError::Spawn {
            tool: tool.clone(),
            source,
        })?;

        // Dropping the wait future on timeout drops the child, which kills it.
        let result = tokio::time::timeout(self.timeout, child.wait_with_output()).await;

        match result {
            Ok(Ok(output)) => {
                let tool_output = ToolOutput {
                    status: output.status,
                    stdout: String::from_utf8_lossy(&output.stdout).to_string(),
                    stderr: String::from_utf8_lossy(&output.stderr).to_string(),
                };

                if !output.status.success() {
                    return Err(CommandError::Failed {
                        tool,
                        status: output.status,
                        stderr: stderr_excerpt(&tool_output.stderr),
                    });
                }

                Ok(tool_output)
            }
            Ok(Err(source)) => Err(CommandError::Io { tool, source }),
            Err(_elapsed) => Err(CommandError::TimedOut {
                tool,
                timeout: self.timeout,
            }),
        }
    }
}

/// The tail of stderr, where ffmpeg puts the actual error.
fn stderr_excerpt(stderr: &str) -> String {
    let trimmed = stderr.trim();
    if trimmed.len() <= STDERR_EXCERPT {
        return trimmed.to_string();
    }
    let mut start = trimmed.len() - STDERR_EXCERPT;
    while !trimmed.is_char_boundary(start) {
        start += 1;
    }
    format!("...{}", &trimmed[start..])
}
