use crate::report::ExecutionResult;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// How long stream readers may keep draining after the process is gone
const READER_GRACE: Duration = Duration::from_secs(2);

const READ_CHUNK: usize = 8192;

/// Runs one validated argv as a subprocess, never through a shell
#[derive(Debug, Clone)]
pub struct Executor {
    root: PathBuf,
    timeout: Duration,
    max_output: usize,
}

enum Termination {
    Exited(ExitStatus),
    WaitFailed(String),
    TimedOut,
    Cancelled,
}

/// Bytes kept from one stream plus the number of bytes seen
#[derive(Debug, Default)]
struct Capture {
    bytes: Vec<u8>,
    total: usize,
}

impl Capture {
    fn push(&mut self, chunk: &[u8], cap: usize) {
        self.total += chunk.len();
        let room = cap.saturating_sub(self.bytes.len());
        let take = room.min(chunk.len());
        self.bytes.extend_from_slice(&chunk[..take]);
    }

    fn truncated(&self) -> bool {
        self.total > self.bytes.len()
    }

    fn into_text(self) -> (String, bool) {
        let truncated = self.truncated();
        let mut text = String::from_utf8_lossy(&self.bytes).into_owned();
        if truncated {
            text.push_str(&format!("\n... (truncated, {} total bytes)", self.total));
        }
        (text, truncated)
    }
}

type SharedCapture = Arc<Mutex<Capture>>;

impl Executor {
    pub fn new<P: AsRef<Path>>(root: P, timeout: Duration, max_output: usize) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            timeout,
            max_output,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Run `argv` in the exploration root.
    ///
    /// Never fails: spawn errors, timeouts and cancellation are all recorded in
    /// the returned [`ExecutionResult`]. A non-zero exit code is plain data.
    pub async fn run(&self, argv: &[String], cancel: &CancellationToken) -> ExecutionResult {
        let start = Instant::now();

        let Some((program, args)) = argv.split_first() else {
            return ExecutionResult {
                error: Some("empty argv".to_string()),
                ..Default::default()
            };
        };

        let mut command = Command::new(program);
        command
            .args(args)
            .current_dir(&self.root)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        own_process_group(&mut command);

        let mut child = match command.spawn() {
            Ok(child) => child,
            Err(e) => {
                tracing::warn!(program = %program, error = %e, "failed to spawn command");
                return ExecutionResult {
                    error: Some(e.to_string()),
                    duration: start.elapsed(),
                    ..Default::default()
                };
            }
        };

        let pid = child.id();
        tracing::debug!(?pid, argv = ?argv, "spawned command");

        let stdout_sink = SharedCapture::default();
        let stderr_sink = SharedCapture::default();
        let stdout_task = child
            .stdout
            .take()
            .map(|s| tokio::spawn(pump(s, Arc::clone(&stdout_sink), self.max_output)));
        let stderr_task = child
            .stderr
            .take()
            .map(|s| tokio::spawn(pump(s, Arc::clone(&stderr_sink), self.max_output)));

        let termination = tokio::select! {
            biased;
            _ = cancel.cancelled() => Termination::Cancelled,
            waited = tokio::time::timeout(self.timeout, child.wait()) => match waited {
                Ok(Ok(status)) => Termination::Exited(status),
                Ok(Err(e)) => Termination::WaitFailed(e.to_string()),
                Err(_) => Termination::TimedOut,
            },
        };

        match termination {
            Termination::TimedOut => {
                tracing::warn!(?pid, timeout = ?self.timeout, "command timed out, killing");
                terminate(&mut child, pid).await;
            }
            Termination::Cancelled => {
                tracing::info!(?pid, "batch cancelled, killing command");
                terminate(&mut child, pid).await;
            }
            Termination::WaitFailed(_) => terminate(&mut child, pid).await,
            Termination::Exited(_) => {}
        }

        let deadline = tokio::time::Instant::now() + READER_GRACE;
        let (stdout, stdout_truncated) = drain(stdout_task, &stdout_sink, deadline, pid).await;
        let (stderr, stderr_truncated) = drain(stderr_task, &stderr_sink, deadline, pid).await;

        let mut result = ExecutionResult {
            stdout,
            stderr,
            truncated: stdout_truncated || stderr_truncated,
            duration: start.elapsed(),
            ..Default::default()
        };

        match termination {
            Termination::Exited(status) => result.exit_code = status.code(),
            Termination::WaitFailed(e) => result.error = Some(e),
            Termination::TimedOut => result.timed_out = true,
            Termination::Cancelled => result.cancelled = true,
        }

        tracing::debug!(
            ?pid,
            exit_code = ?result.exit_code,
            duration_ms = result.duration.as_millis() as u64,
            bytes = result.emitted_bytes(),
            "command finished"
        );

        result
    }
}

/// Copy a stream into the shared capture, dropping bytes past `cap` while
/// still draining so the child never blocks on a full pipe
async fn pump<R: AsyncRead + Unpin>(mut reader: R, sink: SharedCapture, cap: usize) {
    let mut chunk = [0u8; READ_CHUNK];
    loop {
        match reader.read(&mut chunk).await {
            Ok(0) => break,
            Ok(n) => {
                sink.lock()
                    .unwrap_or_else(|poisoned| poisoned.into_inner())
                    .push(&chunk[..n], cap);
            }
            Err(e) => {
                tracing::debug!(error = %e, "stream read failed");
                break;
            }
        }
    }
}

/// Wait for a reader until `deadline`, then take whatever it captured.
///
/// A stream still open at the deadline is held by a leftover descendant, so
/// the group is killed before the reader is abandoned.
async fn drain(
    task: Option<JoinHandle<()>>,
    sink: &SharedCapture,
    deadline: tokio::time::Instant,
    pid: Option<u32>,
) -> (String, bool) {
    if let Some(mut task) = task {
        if tokio::time::timeout_at(deadline, &mut task).await.is_err() {
            tracing::warn!(?pid, "output stream still open after grace period, killing group");
            if let Some(pid) = pid {
                kill_process_group(pid);
            }
            task.abort();
        }
    }

    let capture = std::mem::take(&mut *sink.lock().unwrap_or_else(|p| p.into_inner()));
    capture.into_text()
}

/// Kill the child and everything it spawned
async fn terminate(child: &mut Child, pid: Option<u32>) {
    if let Some(pid) = pid {
        kill_process_group(pid);
    }
    if let Err(e) = child.kill().await {
        tracing::debug!(error = %e, "kill after group signal failed");
    }
}

#[cfg(unix)]
fn own_process_group(command: &mut Command) {
    command.process_group(0);
}

#[cfg(not(unix))]
fn own_process_group(_command: &mut Command) {}

#[cfg(unix)]
fn kill_process_group(pid: u32) {
    // SAFETY: killpg only sends a signal; the group id is the child's own pid
    // because it was spawned with process_group(0).
    let rc = unsafe { libc::killpg(pid as libc::pid_t, libc::SIGKILL) };
    if rc != 0 {
        tracing::debug!(pid, error = %std::io::Error::last_os_error(), "killpg failed");
    }
}

#[cfg(not(unix))]
fn kill_process_group(_pid: u32) {}
