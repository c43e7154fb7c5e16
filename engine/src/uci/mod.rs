pub mod framer;
pub mod parser;

pub use framer::{FramePolicy, FramedLines, LineFramer};
pub use parser::{decode, EngineEvent};

use crate::target::AnalysisTarget;

/// Commands sent to the engine, one per line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UciCommand {
    Uci,
    SetOption { name: String, value: Option<String> },
    Position(AnalysisTarget),
    GoInfinite,
    Stop,
    Quit,
}

impl std::fmt::Display for UciCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Uci => f.write_str("uci"),
            Self::SetOption {
                name,
                value: Some(value),
            } => write!(f, "setoption name {} value {}", name, value),
            Self::SetOption { name, value: None } => write!(f, "setoption name {}", name),
            Self::Position(target) => write!(f, "position {}", target),
            Self::GoInfinite => f.write_str("go infinite"),
            Self::Stop => f.write_str("stop"),
            Self::Quit => f.write_str("quit"),
        }
    }
}
