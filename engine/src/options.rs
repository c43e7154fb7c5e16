//! Engine option declarations collected while probing with `uci`.

use serde::Serialize;

/// Option names the driver understands. Everything else an engine declares is dropped.
pub const SUPPORTED_OPTIONS: &[&str] = &["Threads", "Hash", "Contempt", "Skill Level", "SyzygyPath"];

pub fn is_supported(name: &str) -> bool {
    SUPPORTED_OPTIONS.contains(&name)
}

/// What an option controls, derived from its name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum OptionKind {
    Threads,
    Hash,
    Numeric,
    Text,
}

impl OptionKind {
    /// Classify a supported option. Returns `None` for names off the allow-list.
    pub fn classify(name: &str) -> Option<Self> {
        match name {
            "Threads" => Some(Self::Threads),
            "Hash" => Some(Self::Hash),
            "Contempt" | "Skill Level" => Some(Self::Numeric),
            "SyzygyPath" => Some(Self::Text),
            _ => None,
        }
    }
}

/// Default value as declared by the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum OptionValue {
    Integer(i64),
    Text(String),
}

impl std::fmt::Display for OptionValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Integer(v) => write!(f, "{}", v),
            Self::Text(s) => write!(f, "{}", s),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EngineOption {
    pub name: String,
    pub kind: OptionKind,
    pub default: OptionValue,
    pub min: Option<i64>,
    pub max: Option<i64>,
}

impl EngineOption {
    /// Clamp `value` into the declared range, if the engine declared one.
    pub fn clamp(&self, value: i64) -> i64 {
        let value = self.min.map_or(value, |min| value.max(min));
        self.max.map_or(value, |max| value.min(max))
    }
}

/// Collects declarations during one startup probe and releases them once on `uciok`.
#[derive(Debug, Default)]
pub struct OptionsCatalog {
    pending: Vec<EngineOption>,
    ready: Option<Vec<EngineOption>>,
}

impl OptionsCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a declaration. Ignored once the probe has completed.
    pub fn declare(&mut self, option: EngineOption) {
        if self.ready.is_some() {
            tracing::debug!("Ignoring late option declaration: {}", option.name);
            return;
        }
        if !is_supported(&option.name) {
            return;
        }
        self.pending.push(option);
    }

    /// Close the probe. Returns the collected options the first time only.
    pub fn finish(&mut self) -> Option<Vec<EngineOption>> {
        if self.ready.is_some() {
            return None;
        }
        let options = std::mem::take(&mut self.pending);
        self.ready = Some(options.clone());
        Some(options)
    }

    pub fn is_ready(&self) -> bool {
        self.ready.is_some()
    }

    /// Options delivered by [`finish`](Self::finish), once the probe is over.
    pub fn options(&self) -> Option<&[EngineOption]> {
        self.ready.as_deref()
    }

    pub fn get(&self, name: &str) -> Option<&EngineOption> {
        self.ready
            .as_deref()
            .unwrap_or(&self.pending)
            .iter()
            .find(|option| option.name == name)
    }
}
