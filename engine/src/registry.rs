//! Process-wide count of engine instances that are currently analyzing.
//!
//! The count is only ever changed through [`AnalysisCycle`] guards: taking a
//! guard increments it and dropping the guard decrements it, so increments and
//! decrements always balance, whether the cycle ends because the engine sent
//! `bestmove` or because the owning controller was torn down.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, OnceLock};

static GLOBAL: OnceLock<AnalysisRegistry> = OnceLock::new();

/// Shared atomic counter of open analysis cycles.
///
/// Cloning is cheap and every clone observes the same counter. Tests create a
/// fresh registry per case with [`AnalysisRegistry::new`]; applications use
/// [`AnalysisRegistry::global`].
#[derive(Debug, Clone, Default)]
pub struct AnalysisRegistry {
    count: Arc<AtomicI64>,
}

impl AnalysisRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The registry shared by the whole process.
    pub fn global() -> &'static AnalysisRegistry {
        GLOBAL.get_or_init(AnalysisRegistry::new)
    }

    /// Number of open analysis cycles. Never blocks.
    pub fn current(&self) -> i64 {
        self.count.load(Ordering::Acquire)
    }

    /// Open a new cycle. The count drops back when the returned guard is dropped.
    pub fn begin_cycle(&self) -> AnalysisCycle {
        let now = self.count.fetch_add(1, Ordering::AcqRel) + 1;
        tracing::trace!(count = now, "Analysis cycle opened");
        AnalysisCycle {
            registry: self.clone(),
        }
    }
}

/// Number of engine instances analyzing right now, across the whole process.
pub fn current_analyzing_count() -> i64 {
    AnalysisRegistry::global().current()
}

/// One open `go` .. `bestmove` round trip.
#[derive(Debug)]
#[must_use = "dropping the cycle immediately closes it"]
pub struct AnalysisCycle {
    registry: AnalysisRegistry,
}

impl Drop for AnalysisCycle {
    fn drop(&mut self) {
        let now = self.registry.count.fetch_sub(1, Ordering::AcqRel) - 1;
        tracing::trace!(count = now, "Analysis cycle closed");
        debug_assert!(now >= 0, "analysis registry went negative");
    }
}
