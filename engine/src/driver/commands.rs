use tokio::sync::oneshot;

use crate::controller::AnalysisState;
use crate::options::EngineOption;
use crate::preferences::{EnginePreferences, PreferenceOutcome};
use crate::process::ProcessError;
use crate::target::AnalysisTarget;

#[derive(Debug, thiserror::Error)]
pub enum DriverError {
    #[error("Engine process error: {0}")]
    Process(#[from] ProcessError),
    #[error("No analysis target set")]
    NoTarget,
    #[error("Engine driver has stopped")]
    Closed,
}

/// Point-in-time view of a driver.
#[derive(Debug, Clone)]
pub struct DriverStatus {
    pub state: AnalysisState,
    pub target: Option<AnalysisTarget>,
    /// A `go` is still waiting for its `bestmove`.
    pub cycle_pending: bool,
    pub engine_name: Option<String>,
    /// Present once the `uci` probe has finished.
    pub options: Option<Vec<EngineOption>>,
}

/// Commands sent to the driver actor. Each embeds a oneshot for the reply.
pub(crate) enum DriverCommand {
    SetTarget {
        target: AnalysisTarget,
        reply: oneshot::Sender<Result<(), DriverError>>,
    },
    SetAnalyzing {
        analyzing: bool,
        reply: oneshot::Sender<Result<(), DriverError>>,
    },
    ApplyPreferences {
        preferences: EnginePreferences,
        reply: oneshot::Sender<Result<PreferenceOutcome, DriverError>>,
    },
    GetStatus {
        reply: oneshot::Sender<DriverStatus>,
    },
    Shutdown {
        reply: oneshot::Sender<()>,
    },
}
