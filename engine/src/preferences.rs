//! User preferences turned into `setoption` commands.

use crate::options::OptionsCatalog;
use crate::uci::UciCommand;

/// Values supplied by the surrounding application. `None` leaves the engine default.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnginePreferences {
    pub threads: Option<u32>,
    pub hash_mb: Option<u32>,
    pub contempt: Option<i32>,
    pub skill_level: Option<u8>,
    pub tablebase_path: Option<String>,
}

/// Result of applying preferences.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PreferenceOutcome {
    /// Number of `setoption` commands sent.
    Applied(usize),
    /// The engine was analyzing; nothing was sent.
    Refused,
}

impl EnginePreferences {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Build the `setoption` commands, clamping numbers to the declared ranges.
    pub fn to_commands(&self, catalog: &OptionsCatalog) -> Vec<UciCommand> {
        let numeric = [
            ("Threads", self.threads.map(i64::from)),
            ("Hash", self.hash_mb.map(i64::from)),
            ("Contempt", self.contempt.map(i64::from)),
            ("Skill Level", self.skill_level.map(i64::from)),
        ];

        let mut commands = Vec::new();
        for (name, value) in numeric {
            let Some(value) = value else { continue };
            let value = match catalog.get(name) {
                Some(option) => option.clamp(value),
                None => value,
            };
            commands.push(set_option(name, value.to_string()));
        }

        if let Some(path) = &self.tablebase_path {
            if path.contains(['\n', '\r']) {
                tracing::warn!("Ignoring tablebase path with a line break");
            } else {
                commands.push(set_option("SyzygyPath", path.clone()));
            }
        }
        commands
    }
}

fn set_option(name: &str, value: String) -> UciCommand {
    UciCommand::SetOption {
        name: name.to_string(),
        value: Some(value),
    }
}
