use std::time::Duration;

use smallvec::SmallVec;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::Instrument;

use super::commands::{DriverCommand, DriverError, DriverStatus};
use super::events::{DriverEvent, UciDirection};
use crate::config::DriverConfig;
use crate::controller::AnalysisController;
use crate::options::OptionsCatalog;
use crate::preferences::{EnginePreferences, PreferenceOutcome};
use crate::process::{EngineIo, EngineProcess, ProcessError};
use crate::uci::{decode, EngineEvent, LineFramer, UciCommand};

/// Everything one engine instance owns. Lives inside a single task, so no
/// field needs a lock.
pub(crate) struct DriverActor<R, W> {
    io: EngineIo<R, W>,
    process: Option<EngineProcess>,
    framer: LineFramer,
    controller: AnalysisController,
    catalog: OptionsCatalog,
    engine_name: Option<String>,
    event_tx: mpsc::Sender<DriverEvent>,
    /// Events discarded since the channel last had room.
    dropped_events: u64,
    echo_raw: bool,
    read_buffer_size: usize,
    shutdown_grace: Duration,
}

impl<R, W> DriverActor<R, W>
where
    R: AsyncRead + Unpin + Send + 'static,
    W: AsyncWrite + Unpin + Send + 'static,
{
    pub(crate) fn new(
        io: EngineIo<R, W>,
        process: Option<EngineProcess>,
        config: &DriverConfig,
        event_tx: mpsc::Sender<DriverEvent>,
    ) -> Self {
        Self {
            io,
            process,
            framer: LineFramer::new(config.framing),
            controller: AnalysisController::new(config.registry.clone()),
            catalog: OptionsCatalog::new(),
            engine_name: None,
            event_tx,
            dropped_events: 0,
            echo_raw: config.echo_raw,
            read_buffer_size: config.read_buffer_size.max(1),
            shutdown_grace: config.shutdown_grace,
        }
    }

    /// Write one command, echoing it when raw echo is on.
    pub(crate) async fn send(&mut self, cmd: &UciCommand) -> Result<(), ProcessError> {
        let line = cmd.to_string();
        self.io.send(&line).await?;
        if self.echo_raw {
            self.emit(DriverEvent::Raw {
                direction: UciDirection::ToEngine,
                line,
            });
        }
        Ok(())
    }

    /// The main driver loop.
    /// Processes caller commands and engine output sequentially until shutdown,
    /// the handle is dropped, or the engine goes away.
    pub(crate) async fn run(self, cmd_rx: mpsc::Receiver<DriverCommand>) {
        let pid = self.process.as_ref().and_then(EngineProcess::id);
        self.run_inner(cmd_rx)
            .instrument(tracing::info_span!("engine", pid = ?pid))
            .await;
    }

    async fn run_inner(mut self, mut cmd_rx: mpsc::Receiver<DriverCommand>) {
        tracing::info!("Engine driver started");
        let mut buf = vec![0u8; self.read_buffer_size];

        loop {
            tokio::select! {
                biased;

                cmd = cmd_rx.recv() => {
                    match cmd {
                        Some(DriverCommand::Shutdown { reply }) => {
                            tracing::info!("Engine driver shutting down");
                            self.shutdown().await;
                            let _ = reply.send(());
                            break;
                        }
                        None => {
                            tracing::info!("Driver handle dropped, tearing down engine");
                            self.teardown();
                            break;
                        }
                        Some(cmd) => self.handle_command(cmd).await,
                    }
                }

                read = self.io.poll_output(&mut buf) => {
                    match read {
                        Ok(0) => {
                            tracing::warn!("Engine stdout EOF - engine closed");
                            self.engine_gone();
                            break;
                        }
                        Ok(n) => self.handle_output(&buf[..n]).await,
                        Err(e) => {
                            tracing::error!("Error reading from engine stdout: {}", e);
                            self.engine_gone();
                            break;
                        }
                    }
                }
            }
        }

        tracing::info!("Engine driver exited");
    }

    async fn handle_command(&mut self, cmd: DriverCommand) {
        match cmd {
            DriverCommand::SetTarget { target, reply } => {
                let out = self.controller.set_target(target);
                let _ = reply.send(self.send_all(out).await);
            }
            DriverCommand::SetAnalyzing { analyzing, reply } => {
                if analyzing && self.controller.target().is_none() {
                    let _ = reply.send(Err(DriverError::NoTarget));
                    return;
                }
                let out = self.controller.set_analyzing(analyzing);
                let _ = reply.send(self.send_all(out).await);
            }
            DriverCommand::ApplyPreferences { preferences, reply } => {
                let result = self.apply_preferences(&preferences).await;
                let _ = reply.send(result);
            }
            DriverCommand::GetStatus { reply } => {
                let _ = reply.send(self.status());
            }
            DriverCommand::Shutdown { .. } => unreachable!(),
        }
    }

    async fn apply_preferences(
        &mut self,
        preferences: &EnginePreferences,
    ) -> Result<PreferenceOutcome, DriverError> {
        if self.controller.is_analyzing() || self.controller.cycle_pending() {
            tracing::warn!("Refusing to change engine options while analyzing");
            return Ok(PreferenceOutcome::Refused);
        }

        let commands = preferences.to_commands(&self.catalog);
        for cmd in &commands {
            tracing::info!("Setting option: {}", cmd);
            self.send(cmd).await?;
        }
        Ok(PreferenceOutcome::Applied(commands.len()))
    }

    fn status(&self) -> DriverStatus {
        DriverStatus {
            state: self.controller.state(),
            target: self.controller.target().cloned(),
            cycle_pending: self.controller.cycle_pending(),
            engine_name: self.engine_name.clone(),
            options: self.catalog.options().map(<[_]>::to_vec),
        }
    }

    async fn send_all(
        &mut self,
        commands: impl IntoIterator<Item = UciCommand>,
    ) -> Result<(), DriverError> {
        for cmd in commands {
            self.send(&cmd).await?;
        }
        Ok(())
    }

    async fn handle_output(&mut self, chunk: &[u8]) {
        let lines: SmallVec<[String; 8]> = self.framer.feed(chunk).collect();
        for line in lines {
            self.handle_line(&line).await;
        }
    }

    async fn handle_line(&mut self, line: &str) {
        tracing::trace!("UCI << {}", line);
        if self.echo_raw {
            self.emit(DriverEvent::Raw {
                direction: UciDirection::FromEngine,
                line: line.to_string(),
            });
        }

        match decode(line, self.controller.target()) {
            EngineEvent::CurrentMove { mv, number, depth } => {
                self.emit(DriverEvent::CurrentMove { mv, number, depth });
            }
            EngineEvent::PrincipalVariation(analysis) => {
                self.emit(DriverEvent::NewLine(analysis));
            }
            EngineEvent::BestMoveFound { mv, ponder } => {
                tracing::debug!("Received bestmove: {:?}", mv);
                let out = self.controller.on_best_move();
                self.emit(DriverEvent::CycleComplete {
                    best_move: mv,
                    ponder,
                });
                if let Err(e) = self.send_all(out).await {
                    tracing::error!("Failed to restart analysis: {}", e);
                }
            }
            EngineEvent::EngineIdentity { name } => {
                tracing::info!("Engine identified as {}", name);
                self.engine_name = Some(name.clone());
                self.emit(DriverEvent::EngineName { name });
            }
            EngineEvent::OptionDeclared(option) => {
                tracing::debug!("Engine declared option {}", option.name);
                self.catalog.declare(option);
            }
            EngineEvent::OptionsReady => {
                if let Some(options) = self.catalog.finish() {
                    tracing::debug!("Received uciok with {} supported options", options.len());
                    self.emit(DriverEvent::OptionsReady { options });
                }
            }
            EngineEvent::Ignored => {}
        }
    }

    /// Queue an event without waiting. A full channel drops the event so a slow
    /// or absent consumer never holds up engine commands.
    fn emit(&mut self, event: DriverEvent) {
        match self.event_tx.try_send(event) {
            Ok(()) if self.dropped_events > 0 => {
                tracing::warn!("Event channel drained, {} events were dropped", self.dropped_events);
                self.dropped_events = 0;
            }
            Ok(()) => {}
            Err(TrySendError::Full(event)) => {
                if self.dropped_events == 0 {
                    tracing::warn!("Event channel full, dropping events starting with {:?}", event);
                }
                self.dropped_events += 1;
            }
            Err(TrySendError::Closed(_)) => tracing::trace!("Event receiver dropped"),
        }
    }

    async fn shutdown(&mut self) {
        if let Err(e) = self.send(&UciCommand::Quit).await {
            tracing::debug!("Failed to send quit: {}", e);
        }
        let grace = self.shutdown_grace;
        let exited = match self.process.as_mut() {
            Some(process) => process.wait_for_exit(grace).await,
            None => true,
        };
        if !exited {
            tracing::debug!("Engine did not exit within {:?}", grace);
        }
        self.teardown();

        // Reap the killed child so it is gone once shutdown returns.
        if let (false, Some(process)) = (exited, self.process.as_mut()) {
            if !process.wait_for_exit(grace).await {
                tracing::warn!("Engine still running after kill");
            }
        }
    }

    fn engine_gone(&mut self) {
        if let Some(fragment) = self.framer.take_pending() {
            tracing::debug!("Discarding unterminated output: {}", fragment);
        }
        self.teardown();
        self.emit(DriverEvent::EngineExited);
    }

    /// Balance the registry and make sure the child is gone.
    fn teardown(&mut self) {
        self.controller.teardown();
        if let Some(process) = self.process.as_mut() {
            process.terminate();
        }
    }
}
