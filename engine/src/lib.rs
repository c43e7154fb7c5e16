//! Client-side driver for UCI chess engines.
//!
//! An [`EngineDriver`] owns one engine process, turns its output into
//! [`DriverEvent`]s and keeps a stop/go handshake so that changing the
//! analysis target never races the engine.

pub mod analysis;
pub mod config;
pub mod controller;
pub mod driver;
pub mod options;
pub mod preferences;
pub mod process;
pub mod registry;
pub mod target;
pub mod uci;

pub use analysis::{AnalysisLine, LineMove, Score, Side};
pub use config::DriverConfig;
pub use controller::{AnalysisController, AnalysisState};
pub use driver::{pump, DriverError, DriverEvent, DriverStatus, EngineDriver, EventSink, UciDirection};
pub use options::{EngineOption, OptionKind, OptionValue, OptionsCatalog};
pub use preferences::{EnginePreferences, PreferenceOutcome};
pub use process::{EngineIo, EngineProcess, LaunchConfig, ProcessError};
pub use registry::{current_analyzing_count, AnalysisCycle, AnalysisRegistry};
pub use target::{AnalysisTarget, TargetError};
pub use uci::{decode, EngineEvent, FramePolicy, LineFramer, UciCommand};
