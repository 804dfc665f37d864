//! Engine process tied to an HTTP response body.
//!
//! The response body owns a [`TranscodeStream`]; dropping the body (end of
//! stream, client disconnect, error) drops the stream, which closes the
//! engine's stdout and then lets the [`ProcessGuard`] reap or kill it.

use bytes::Bytes;
use futures_util::{Stream, StreamExt};
use std::collections::VecDeque;
use std::path::Path;
use std::pin::Pin;
use std::process::Stdio;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, ChildStderr, ChildStdout, Command};
use tokio::task::JoinHandle;
use tokio_util::io::ReaderStream;
use uuid::Uuid;

use super::registry::{SessionInfo, SessionRegistry};
use crate::engine::{program_name, STDERR_TAIL_LINES};
use crate::error::TranscodeError;

/// Read size for engine stdout.
const CHUNK_SIZE: usize = 64 * 1024;

/// Engine stdout as a byte stream.
///
/// Field order matters: `reader` drops before `guard`, so the engine sees
/// its output pipe closed before the guard starts waiting on it.
pub struct TranscodeStream {
    reader: ReaderStream<ChildStdout>,
    pending: Option<Bytes>,
    guard: ProcessGuard,
}

impl TranscodeStream {
    pub fn id(&self) -> Uuid {
        self.guard.id
    }
}

impl Stream for TranscodeStream {
    type Item = std::io::Result<Bytes>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        if let Some(chunk) = this.pending.take() {
            this.guard.bytes_sent += chunk.len() as u64;
            return Poll::Ready(Some(Ok(chunk)));
        }

        match Pin::new(&mut this.reader).poll_next(cx) {
            Poll::Ready(Some(Ok(chunk))) => {
                this.guard.bytes_sent += chunk.len() as u64;
                Poll::Ready(Some(Ok(chunk)))
            }
            other => other,
        }
    }
}

/// Owns the engine child process for one session.
pub struct ProcessGuard {
    id: Uuid,
    child: Option<Child>,
    registry: Arc<SessionRegistry>,
    grace: Duration,
    bytes_sent: u64,
}

impl ProcessGuard {
    /// Wait up to the grace period for the engine to exit on its own, then
    /// kill it. Returns the exit status as text.
    async fn wait_or_kill(&mut self) -> String {
        let Some(child) = self.child.as_mut() else {
            return "unknown".to_string();
        };
        match tokio::time::timeout(self.grace, child.wait()).await {
            Ok(Ok(status)) => status.to_string(),
            Ok(Err(e)) => format!("wait failed: {}", e),
            Err(_) => {
                tracing::debug!(session = %self.id, grace = ?self.grace, "engine still running, killing");
                match child.kill().await {
                    Ok(()) => "killed after closing its output".to_string(),
                    Err(e) => format!("kill failed: {}", e),
                }
            }
        }
    }
}

impl Drop for ProcessGuard {
    fn drop(&mut self) {
        self.registry.finish(&self.id, self.bytes_sent);
        tracing::info!(session = %self.id, bytes = self.bytes_sent, "transcode session closed");

        let Some(mut child) = self.child.take() else {
            return;
        };
        let id = self.id;
        let grace = self.grace;

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    match tokio::time::timeout(grace, child.wait()).await {
                        Ok(Ok(status)) => {
                            tracing::debug!(session = %id, %status, "engine exited");
                        }
                        Ok(Err(e)) => {
                            tracing::warn!(session = %id, error = %e, "failed to wait for engine");
                        }
                        Err(_) => {
                            tracing::debug!(session = %id, ?grace, "engine still running, killing");
                            if let Err(e) = child.kill().await {
                                tracing::warn!(session = %id, error = %e, "failed to kill engine");
                            }
                        }
                    }
                });
            }
            Err(_) => {
                let _ = child.start_kill();
            }
        }
    }
}

/// Launch the engine and wait for its first output chunk.
///
/// Fails without leaving a process behind if the engine cannot start or
/// exits before writing anything.
pub async fn open(
    ffmpeg: &Path,
    args: Vec<String>,
    mut info: SessionInfo,
    registry: Arc<SessionRegistry>,
    grace: Duration,
) -> Result<TranscodeStream, TranscodeError> {
    let program = program_name(ffmpeg);
    tracing::debug!(session = %info.id, program = %program, args = ?args, "spawning engine");

    let mut child = Command::new(ffmpeg)
        .args(&args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| TranscodeError::SpawnFailed(format!("{}: {}", program, e)))?;

    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| TranscodeError::SpawnFailed(format!("{}: stdout not captured", program)))?;
    let stderr_task = child.stderr.take().map(|stderr| drain_stderr(stderr, info.id));

    info.pid = child.id();
    let id = info.id;
    tracing::info!(
        session = %id,
        path = %info.path,
        start_time = info.start_time,
        audio_track = info.audio_track,
        subtitle_track = ?info.subtitle_track,
        pid = ?info.pid,
        "transcode session started"
    );
    registry.insert(info);

    let mut guard = ProcessGuard {
        id,
        child: Some(child),
        registry,
        grace,
        bytes_sent: 0,
    };
    let mut reader = ReaderStream::with_capacity(stdout, CHUNK_SIZE);

    match reader.next().await {
        Some(Ok(chunk)) => Ok(TranscodeStream {
            reader,
            pending: Some(chunk),
            guard,
        }),
        Some(Err(e)) => Err(TranscodeError::Io(e)),
        None => {
            drop(reader);
            let status = guard.wait_or_kill().await;
            // Descendants of the engine may still hold stderr open.
            let stderr = match stderr_task {
                Some(task) => tokio::time::timeout(guard.grace, task)
                    .await
                    .ok()
                    .and_then(Result::ok)
                    .unwrap_or_default(),
                None => String::new(),
            };
            tracing::warn!(session = %id, %status, stderr = %stderr, "engine exited without output");
            Err(TranscodeError::EngineExited { status, stderr })
        }
    }
}

/// Log engine stderr at debug level and return its last lines.
///
/// Reads until EOF whatever the bytes are, so the engine never sees its
/// stderr pipe close while it runs.
fn drain_stderr(stderr: ChildStderr, id: Uuid) -> JoinHandle<String> {
    tokio::spawn(async move {
        let mut reader = BufReader::new(stderr);
        let mut buf = Vec::new();
        let mut tail: VecDeque<String> = VecDeque::with_capacity(STDERR_TAIL_LINES);
        loop {
            buf.clear();
            match reader.read_until(b'\n', &mut buf).await {
                Ok(0) => break,
                Ok(_) => {}
                Err(e) => {
                    tracing::debug!(session = %id, error = %e, "engine stderr read failed");
                    break;
                }
            }
            let line = String::from_utf8_lossy(&buf).trim().to_string();
            if line.is_empty() {
                continue;
            }
            tracing::debug!(session = %id, "engine: {}", line);
            if tail.len() == STDERR_TAIL_LINES {
                tail.pop_front();
            }
            tail.push_back(line);
        }
        tail.into_iter().collect::<Vec<_>>().join("; ")
    })
}
