//! Child process ownership: launch, line output, raw input, teardown.

use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::process::{Child, ChildStdin, ChildStdout};

#[derive(Debug, thiserror::Error)]
pub enum ProcessError {
    #[error("Failed to launch engine {path:?}: {source}")]
    Launch {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Engine has no stdin")]
    NoStdin,
    #[error("Engine has no stdout")]
    NoStdout,
    #[error("Command contains a line break: {0:?}")]
    EmbeddedNewline(String),
    #[error("Engine input is closed")]
    Closed,
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Engine binary and its arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchConfig {
    pub path: PathBuf,
    pub args: Vec<String>,
}

impl LaunchConfig {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            args: Vec::new(),
        }
    }

    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }
}

/// Line-oriented input and raw output of an engine.
///
/// Generic over the streams so the same code drives a child's pipes or an
/// in-memory transport.
#[derive(Debug)]
pub struct EngineIo<R, W> {
    reader: R,
    writer: W,
    closed: bool,
}

/// Streams of a launched child process.
pub type ProcessIo = EngineIo<ChildStdout, ChildStdin>;

impl<R, W> EngineIo<R, W>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    pub fn new(reader: R, writer: W) -> Self {
        Self {
            reader,
            writer,
            closed: false,
        }
    }

    /// Write one command line. The newline terminator is added here.
    pub async fn send(&mut self, line: &str) -> Result<(), ProcessError> {
        if line.contains(['\n', '\r']) {
            return Err(ProcessError::EmbeddedNewline(line.to_string()));
        }
        if self.closed {
            return Err(ProcessError::Closed);
        }

        tracing::trace!("UCI >> {}", line);
        let mut bytes = Vec::with_capacity(line.len() + 1);
        bytes.extend_from_slice(line.as_bytes());
        bytes.push(b'\n');

        let result = async {
            self.writer.write_all(&bytes).await?;
            self.writer.flush().await
        }
        .await;

        if let Err(e) = result {
            if e.kind() == std::io::ErrorKind::BrokenPipe {
                self.closed = true;
            }
            tracing::error!("Failed to write to engine: {}", e);
            return Err(e.into());
        }
        Ok(())
    }

    /// Wait until output is available and copy it into `buf`.
    ///
    /// Returns the number of bytes read, `0` once the engine closed its output.
    /// Cancel safe, so it can sit in a `select!` arm.
    pub async fn poll_output(&mut self, buf: &mut [u8]) -> Result<usize, ProcessError> {
        Ok(self.reader.read(buf).await?)
    }
}

/// Owned child process. Terminated exactly once, at the latest when dropped.
#[derive(Debug)]
pub struct EngineProcess {
    child: Child,
    pid: Option<u32>,
    terminated: bool,
}

impl EngineProcess {
    /// Spawn the engine with piped stdin/stdout.
    #[tracing::instrument(level = "info", fields(path = %config.path.display()))]
    pub fn launch(config: &LaunchConfig) -> Result<(Self, ProcessIo), ProcessError> {
        tracing::debug!("Spawning engine process with args {:?}", config.args);
        let mut child = tokio::process::Command::new(&config.path)
            .args(&config.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| {
                tracing::error!("Failed to spawn engine: {}", source);
                ProcessError::Launch {
                    path: config.path.clone(),
                    source,
                }
            })?;

        let stdin = child.stdin.take().ok_or(ProcessError::NoStdin)?;
        let stdout = child.stdout.take().ok_or(ProcessError::NoStdout)?;
        let pid = child.id();
        tracing::info!(?pid, "Engine process spawned");

        let process = Self {
            child,
            pid,
            terminated: false,
        };
        Ok((process, EngineIo::new(stdout, stdin)))
    }

    pub fn id(&self) -> Option<u32> {
        self.pid
    }

    pub fn is_terminated(&self) -> bool {
        self.terminated
    }

    /// Interrupt the engine, then kill it. Safe to call any number of times.
    pub fn terminate(&mut self) {
        if self.terminated {
            return;
        }
        self.terminated = true;

        if let Ok(Some(status)) = self.child.try_wait() {
            tracing::debug!("Engine already exited: {}", status);
            return;
        }

        if let Some(pid) = self.pid {
            interrupt(pid);
        }

        if let Err(e) = self.child.start_kill() {
            tracing::debug!("Failed to kill engine: {}", e);
        }
        tracing::info!(pid = ?self.pid, "Engine process terminated");
    }

    /// Wait up to `grace` for the engine to exit on its own.
    pub async fn wait_for_exit(&mut self, grace: Duration) -> bool {
        match tokio::time::timeout(grace, self.child.wait()).await {
            Ok(Ok(status)) => {
                tracing::debug!("Engine exited: {}", status);
                true
            }
            Ok(Err(e)) => {
                tracing::warn!("Failed to wait for engine: {}", e);
                false
            }
            Err(_) => false,
        }
    }
}

#[cfg(unix)]
fn interrupt(pid: u32) {
    let Ok(pid) = i32::try_from(pid) else {
        return;
    };
    // SAFETY: kill(2) only delivers a signal to the child we spawned and still
    // own; it touches no memory of this process.
    let result = unsafe { libc::kill(pid, libc::SIGINT) };
    if result != 0 {
        tracing::debug!(
            "Failed to interrupt engine {}: {}",
            pid,
            std::io::Error::last_os_error()
        );
    }
}

#[cfg(not(unix))]
fn interrupt(_pid: u32) {}

impl Drop for EngineProcess {
    fn drop(&mut self) {
        self.terminate();
    }
}
