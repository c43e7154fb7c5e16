//! Analysis lifecycle: which target is analyzed and whether a `go` is in flight.
//!
//! The controller is a plain state machine. Every operation returns the
//! commands that must be written to the engine, in order; it performs no I/O.
//!
//! The protocol forbids sending `position`/`go` while an earlier `go` has not
//! been answered with `bestmove`. Requests that arrive in that window are
//! parked in a single continuation slot and replayed by [`on_best_move`].
//!
//! [`on_best_move`]: AnalysisController::on_best_move

use smallvec::{smallvec, SmallVec};

use crate::registry::{AnalysisCycle, AnalysisRegistry};
use crate::target::AnalysisTarget;
use crate::uci::UciCommand;

/// Commands produced by one controller operation.
pub type Outbound = SmallVec<[UciCommand; 2]>;

/// Logical analysis state reported to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnalysisState {
    Idle,
    Analyzing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Idle,
    Analyzing,
    /// `stop` sent, waiting for the matching `bestmove`.
    Stopping,
}

/// Work to do once the outstanding cycle has been acknowledged.
#[derive(Debug, Default)]
struct Continuation {
    target: Option<AnalysisTarget>,
    restart: bool,
}

#[derive(Debug)]
pub struct AnalysisController {
    registry: AnalysisRegistry,
    phase: Phase,
    target: Option<AnalysisTarget>,
    deferred: Option<Continuation>,
    cycle: Option<AnalysisCycle>,
}

impl AnalysisController {
    pub fn new(registry: AnalysisRegistry) -> Self {
        Self {
            registry,
            phase: Phase::Idle,
            target: None,
            deferred: None,
            cycle: None,
        }
    }

    /// `Analyzing` while a cycle runs or a target swap is about to restart one.
    ///
    /// A swap sends `stop` and parks the new target until `bestmove`. During that
    /// window the state stays `Analyzing`, since analysis resumes without any
    /// further request. A plain `set_analyzing(false)` reports `Idle` at once,
    /// even while the engine has yet to confirm the stop; use
    /// [`cycle_pending`](Self::cycle_pending) to see an unacknowledged `go`.
    pub fn state(&self) -> AnalysisState {
        let restarting = self.deferred.as_ref().is_some_and(|c| c.restart);
        match self.phase {
            Phase::Analyzing => AnalysisState::Analyzing,
            Phase::Stopping if restarting => AnalysisState::Analyzing,
            _ => AnalysisState::Idle,
        }
    }

    pub fn is_analyzing(&self) -> bool {
        self.state() == AnalysisState::Analyzing
    }

    /// Whether a `go` is still waiting for its `bestmove`.
    pub fn cycle_pending(&self) -> bool {
        self.cycle.is_some()
    }

    /// The target in effect. A target parked behind a pending stop is not
    /// reported until the engine has acknowledged the stop.
    pub fn target(&self) -> Option<&AnalysisTarget> {
        self.target.as_ref()
    }

    pub fn set_target(&mut self, target: AnalysisTarget) -> Outbound {
        match self.phase {
            Phase::Idle => {
                tracing::debug!("Target set: {}", target);
                self.target = Some(target);
                SmallVec::new()
            }
            Phase::Analyzing => {
                tracing::debug!("Swapping target to {}, stopping current analysis", target);
                self.phase = Phase::Stopping;
                self.deferred = Some(Continuation {
                    target: Some(target),
                    restart: true,
                });
                smallvec![UciCommand::Stop]
            }
            Phase::Stopping => {
                tracing::debug!("Target {} parked until the engine stops", target);
                self.deferred.get_or_insert_with(Continuation::default).target = Some(target);
                SmallVec::new()
            }
        }
    }

    /// Start or stop analysis of the current target.
    ///
    /// # Panics
    ///
    /// Starting from idle without a target is a caller bug and panics.
    pub fn set_analyzing(&mut self, analyzing: bool) -> Outbound {
        match (self.phase, analyzing) {
            (Phase::Idle, true) => self.start(),
            (Phase::Analyzing, false) => {
                tracing::debug!("Stopping analysis");
                self.phase = Phase::Stopping;
                self.deferred = None;
                smallvec![UciCommand::Stop]
            }
            (Phase::Stopping, restart) => {
                self.deferred.get_or_insert_with(Continuation::default).restart = restart;
                SmallVec::new()
            }
            _ => SmallVec::new(),
        }
    }

    /// The engine answered the outstanding `go` with `bestmove`.
    pub fn on_best_move(&mut self) -> Outbound {
        let Some(cycle) = self.cycle.take() else {
            tracing::warn!("Ignoring bestmove without an outstanding analysis cycle");
            return SmallVec::new();
        };
        drop(cycle);

        let previous = std::mem::replace(&mut self.phase, Phase::Idle);
        let Some(continuation) = self.deferred.take() else {
            tracing::debug!("Analysis cycle complete ({:?})", previous);
            return SmallVec::new();
        };

        if let Some(target) = continuation.target {
            tracing::debug!("Applying parked target: {}", target);
            self.target = Some(target);
        }
        if continuation.restart {
            self.start()
        } else {
            SmallVec::new()
        }
    }

    /// Forced teardown: close any open cycle and forget parked work.
    pub fn teardown(&mut self) {
        if self.cycle.take().is_some() {
            tracing::debug!("Closing analysis cycle on teardown");
        }
        self.phase = Phase::Idle;
        self.deferred = None;
    }

    fn start(&mut self) -> Outbound {
        let target = self
            .target
            .clone()
            .expect("analysis started without a target");
        debug_assert!(self.cycle.is_none(), "previous cycle still open");

        tracing::debug!("Starting analysis of {}", target);
        self.cycle = Some(self.registry.begin_cycle());
        self.phase = Phase::Analyzing;
        smallvec![UciCommand::Position(target), UciCommand::GoInfinite]
    }
}
