//! Runtime tunables for an engine driver.

use std::time::Duration;

use crate::registry::AnalysisRegistry;
use crate::uci::FramePolicy;

/// Default capacity of the event channel.
const DEFAULT_EVENT_CAPACITY: usize = 256;

/// Default size of a single stdout read.
const DEFAULT_READ_BUFFER_SIZE: usize = 4096;

/// Default time the engine gets to exit after `quit` before it is killed.
const DEFAULT_SHUTDOWN_GRACE: Duration = Duration::from_secs(1);

#[derive(Debug, Clone)]
pub struct DriverConfig {
    /// Bounded. Events that find the channel full are dropped; engine commands
    /// are never held up by a slow consumer.
    pub event_capacity: usize,
    pub read_buffer_size: usize,
    pub framing: FramePolicy,
    /// Also emit every protocol line as a raw event.
    pub echo_raw: bool,
    pub shutdown_grace: Duration,
    /// Counter the driver's analysis cycles are recorded in.
    pub registry: AnalysisRegistry,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            event_capacity: DEFAULT_EVENT_CAPACITY,
            read_buffer_size: DEFAULT_READ_BUFFER_SIZE,
            framing: FramePolicy::Buffered,
            echo_raw: false,
            shutdown_grace: DEFAULT_SHUTDOWN_GRACE,
            registry: AnalysisRegistry::global().clone(),
        }
    }
}

impl DriverConfig {
    pub fn with_registry(mut self, registry: AnalysisRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn with_echo_raw(mut self, echo_raw: bool) -> Self {
        self.echo_raw = echo_raw;
        self
    }

    pub fn with_framing(mut self, framing: FramePolicy) -> Self {
        self.framing = framing;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = DriverConfig::default();
        assert_eq!(config.event_capacity, DEFAULT_EVENT_CAPACITY);
        assert_eq!(config.read_buffer_size, DEFAULT_READ_BUFFER_SIZE);
        assert_eq!(config.framing, FramePolicy::Buffered);
        assert!(!config.echo_raw);
        assert_eq!(config.shutdown_grace, Duration::from_secs(1));
    }

    #[test]
    fn test_builders() {
        let registry = AnalysisRegistry::new();
        let config = DriverConfig::default()
            .with_registry(registry.clone())
            .with_echo_raw(true)
            .with_framing(FramePolicy::ChunkAsLine);

        assert!(config.echo_raw);
        assert_eq!(config.framing, FramePolicy::ChunkAsLine);
        let cycle = registry.begin_cycle();
        assert_eq!(config.registry.current(), 1);
        drop(cycle);
    }
}
