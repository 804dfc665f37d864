//! Builder for one-shot runs of the external media engine.
//!
//! Used for runs whose whole output is needed before anything can be sent
//! (inspection, subtitle extraction). Streaming transcodes manage their own
//! process in [`crate::transcode::session`].

use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use tokio::process::Command;

/// Default engine timeout: 5 minutes.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(300);

/// Lines of stderr kept for error messages.
pub const STDERR_TAIL_LINES: usize = 8;

/// Output captured from an engine run.
#[derive(Debug, Clone)]
pub struct EngineOutput {
    pub status: ExitStatus,
    pub stdout: Vec<u8>,
    pub stderr: String,
}

/// Engine run failures, mapped by callers onto their own error kinds.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("failed to spawn {program}: {source}")]
    Spawn {
        program: String,
        source: std::io::Error,
    },

    #[error("{program} timed out after {timeout:?}")]
    Timeout { program: String, timeout: Duration },

    #[error("{program} exited with {status}: {stderr}")]
    Exit {
        program: String,
        status: ExitStatus,
        stderr: String,
    },

    #[error("I/O error waiting for {program}: {source}")]
    Io {
        program: String,
        source: std::io::Error,
    },
}

/// A builder for engine invocations.
#[derive(Debug, Clone)]
pub struct EngineCommand {
    program: PathBuf,
    args: Vec<String>,
    timeout: Duration,
}

impl EngineCommand {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn arg(&mut self, s: impl Into<String>) -> &mut Self {
        self.args.push(s.into());
        self
    }

    pub fn args(&mut self, iter: impl IntoIterator<Item = impl Into<String>>) -> &mut Self {
        self.args.extend(iter.into_iter().map(Into::into));
        self
    }

    /// Append a filesystem path argument.
    pub fn path_arg(&mut self, path: &Path) -> &mut Self {
        self.args.push(path.to_string_lossy().into_owned());
        self
    }

    pub fn timeout(&mut self, d: Duration) -> &mut Self {
        self.timeout = d;
        self
    }

    pub fn program_name(&self) -> String {
        program_name(&self.program)
    }

    /// Run to completion, capturing stdout and stderr.
    ///
    /// The child is killed if the timeout fires.
    pub async fn output(&self) -> Result<EngineOutput, EngineError> {
        let program = self.program_name();

        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        tracing::debug!(program = %program, args = ?self.args, "running engine");

        let child = cmd.spawn().map_err(|source| EngineError::Spawn {
            program: program.clone(),
            source,
        })?;

        // On timeout the future owning `child` is dropped, which kills it.
        let output = match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(source)) => return Err(EngineError::Io { program, source }),
            Err(_) => {
                return Err(EngineError::Timeout {
                    program,
                    timeout: self.timeout,
                })
            }
        };

        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
        if !output.status.success() {
            return Err(EngineError::Exit {
                program,
                status: output.status,
                stderr: stderr_tail(&stderr, STDERR_TAIL_LINES),
            });
        }

        Ok(EngineOutput {
            status: output.status,
            stdout: output.stdout,
            stderr,
        })
    }
}

pub fn program_name(program: &Path) -> String {
    program
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| program.to_string_lossy().into_owned())
}

/// Last `max_lines` non-empty lines of engine stderr, joined with "; ".
pub fn stderr_tail(stderr: &str, max_lines: usize) -> String {
    let lines: Vec<&str> = stderr
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect();
    let start = lines.len().saturating_sub(max_lines);
    lines[start..].join("; ")
}
