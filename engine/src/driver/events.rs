use serde::Serialize;
use tokio::sync::mpsc;

use crate::analysis::AnalysisLine;
use crate::options::EngineOption;

/// Events delivered by a driver, in the order the engine produced them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum DriverEvent {
    CurrentMove {
        #[serde(rename = "move")]
        mv: String,
        number: u32,
        depth: u32,
    },
    NewLine(AnalysisLine),
    EngineName {
        name: String,
    },
    /// Supported options declared during the `uci` probe. Sent once.
    OptionsReady {
        options: Vec<EngineOption>,
    },
    /// The engine acknowledged a `go` with `bestmove`.
    CycleComplete {
        best_move: Option<String>,
        ponder: Option<String>,
    },
    /// Protocol traffic, only when raw echo is enabled.
    Raw {
        direction: UciDirection,
        line: String,
    },
    /// The engine closed its output. No further events follow.
    EngineExited,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UciDirection {
    ToEngine,
    FromEngine,
}

/// Callback-style consumer of driver events.
///
/// Only the analysis callbacks are required; events without a callback are
/// skipped by [`DriverEvent::dispatch`].
pub trait EventSink {
    fn on_current_move(&mut self, mv: &str, number: u32, depth: u32);

    fn on_new_line(&mut self, line: &AnalysisLine);

    fn on_engine_name(&mut self, name: &str);

    fn on_options_ready(&mut self, _options: &[EngineOption]) {}
}

impl DriverEvent {
    pub fn dispatch<S: EventSink + ?Sized>(&self, sink: &mut S) {
        match self {
            Self::CurrentMove { mv, number, depth } => sink.on_current_move(mv, *number, *depth),
            Self::NewLine(line) => sink.on_new_line(line),
            Self::EngineName { name } => sink.on_engine_name(name),
            Self::OptionsReady { options } => sink.on_options_ready(options),
            Self::CycleComplete { .. } | Self::Raw { .. } | Self::EngineExited => {}
        }
    }
}

/// Drain a driver's event channel into `sink` until the driver stops.
pub async fn pump<S: EventSink + ?Sized>(mut events: mpsc::Receiver<DriverEvent>, sink: &mut S) {
    while let Some(event) = events.recv().await {
        event.dispatch(sink);
    }
}
