//! One engine instance driven by a background actor task.

mod actor;
mod commands;
mod events;

pub use commands::{DriverError, DriverStatus};
pub use events::{pump, DriverEvent, EventSink, UciDirection};

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_stream::wrappers::ReceiverStream;

use crate::config::DriverConfig;
use crate::preferences::{EnginePreferences, PreferenceOutcome};
use crate::process::{EngineIo, EngineProcess, LaunchConfig};
use crate::target::AnalysisTarget;
use crate::uci::UciCommand;
use actor::DriverActor;
use commands::DriverCommand;

/// Handle to a running engine.
///
/// Dropping the handle tears the engine down: any open analysis cycle is
/// closed in the registry and the child process is terminated.
pub struct EngineDriver {
    cmd_tx: mpsc::Sender<DriverCommand>,
    events: Option<mpsc::Receiver<DriverEvent>>,
    task: Option<JoinHandle<()>>,
    pid: Option<u32>,
}

impl EngineDriver {
    /// Launch the engine binary and start the `uci` probe.
    pub async fn launch(launch: &LaunchConfig, config: DriverConfig) -> Result<Self, DriverError> {
        tracing::info!("Launching engine {}", launch.path.display());
        let (process, io) = EngineProcess::launch(launch)?;
        Self::start(io, Some(process), config).await
    }

    /// Drive an engine reachable through arbitrary streams instead of a child process.
    pub async fn attach<R, W>(reader: R, writer: W, config: DriverConfig) -> Result<Self, DriverError>
    where
        R: AsyncRead + Unpin + Send + 'static,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        Self::start(EngineIo::new(reader, writer), None, config).await
    }

    async fn start<R, W>(
        io: EngineIo<R, W>,
        process: Option<EngineProcess>,
        config: DriverConfig,
    ) -> Result<Self, DriverError>
    where
        R: AsyncRead + Unpin + Send + 'static,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let pid = process.as_ref().and_then(EngineProcess::id);
        let (cmd_tx, cmd_rx) = mpsc::channel(32);
        let (event_tx, event_rx) = mpsc::channel(config.event_capacity.max(1));

        let mut actor = DriverActor::new(io, process, &config, event_tx);
        actor.send(&UciCommand::Uci).await?;

        let task = tokio::spawn(actor.run(cmd_rx));
        Ok(Self {
            cmd_tx,
            events: Some(event_rx),
            task: Some(task),
            pid,
        })
    }

    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    /// Take the event receiver. There is exactly one consumer per driver.
    ///
    /// Until it is taken, events queue up to `event_capacity` and later ones
    /// are dropped. The channel closes once the driver has stopped.
    pub fn take_events(&mut self) -> Option<mpsc::Receiver<DriverEvent>> {
        self.events.take()
    }

    /// Take the events as a `Stream`.
    pub fn event_stream(&mut self) -> Option<ReceiverStream<DriverEvent>> {
        self.take_events().map(ReceiverStream::new)
    }

    /// Analyze `target` next. While analyzing, the current search is stopped
    /// first and restarted on the new target once the engine confirms.
    pub async fn set_target(&self, target: AnalysisTarget) -> Result<(), DriverError> {
        let (tx, rx) = oneshot::channel();
        self.send(DriverCommand::SetTarget { target, reply: tx })
            .await?;
        rx.await.map_err(|_| DriverError::Closed)?
    }

    /// Start (`go infinite`) or stop analysis of the current target.
    pub async fn set_analyzing(&self, analyzing: bool) -> Result<(), DriverError> {
        let (tx, rx) = oneshot::channel();
        self.send(DriverCommand::SetAnalyzing {
            analyzing,
            reply: tx,
        })
        .await?;
        rx.await.map_err(|_| DriverError::Closed)?
    }

    pub async fn apply_preferences(
        &self,
        preferences: EnginePreferences,
    ) -> Result<PreferenceOutcome, DriverError> {
        let (tx, rx) = oneshot::channel();
        self.send(DriverCommand::ApplyPreferences {
            preferences,
            reply: tx,
        })
        .await?;
        rx.await.map_err(|_| DriverError::Closed)?
    }

    pub async fn status(&self) -> Result<DriverStatus, DriverError> {
        let (tx, rx) = oneshot::channel();
        self.send(DriverCommand::GetStatus { reply: tx }).await?;
        rx.await.map_err(|_| DriverError::Closed)
    }

    /// Send `quit`, give the engine a moment to exit, then terminate it.
    pub async fn shutdown(mut self) -> Result<(), DriverError> {
        let (tx, rx) = oneshot::channel();
        let sent = self.send(DriverCommand::Shutdown { reply: tx }).await;
        if sent.is_ok() {
            let _ = rx.await;
        }
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                tracing::error!("Engine driver task failed: {}", e);
            }
        }
        Ok(())
    }

    async fn send(&self, cmd: DriverCommand) -> Result<(), DriverError> {
        self.cmd_tx
            .send(cmd)
            .await
            .map_err(|_| DriverError::Closed)
    }
}
