use crate::indexing::EntityId;
use crate::saturation::conclusion::Conclusion;
use std::sync::atomic::{AtomicU64, Ordering};

/// Observes the saturation without taking part in it.
///
/// Methods are called from the saturation workers, concurrently.
/// The default implementations do nothing.
pub trait SaturationListener: Send + Sync {
    /// A context has been created for `root`.
    fn context_created(&self, root: EntityId) {
        let _ = root;
    }

    /// A conclusion new to the context rooted at `root` has been inserted.
    fn context_modified(&self, root: EntityId, conclusion: &Conclusion) {
        let _ = (root, conclusion);
    }

    /// A rule applied in `origin` has produced `conclusion` for the context rooted at `target`.
    fn conclusion_produced(&self, origin: EntityId, target: EntityId, conclusion: &Conclusion) {
        let _ = (origin, target, conclusion);
    }
}

/// Counters maintained by the saturation engine.
#[derive(Debug, Default)]
pub struct SaturationStatistics {
    contexts_created: AtomicU64,
    conclusions_produced: AtomicU64,
    conclusions_inserted: AtomicU64,
    stale_conclusions: AtomicU64,
    contexts_reset: AtomicU64,
}

impl SaturationStatistics {
    pub(crate) fn context_created(&self) {
        self.contexts_created.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn conclusion_produced(&self) {
        self.conclusions_produced.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn conclusion_inserted(&self) {
        self.conclusions_inserted.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn stale_conclusion(&self) {
        self.stale_conclusions.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn contexts_reset(&self, count: usize) {
        self.contexts_reset
            .fetch_add(count.try_into().unwrap_or(u64::MAX), Ordering::Relaxed);
    }

    /// The current values of the counters.
    pub fn snapshot(&self) -> StatisticsSnapshot {
        StatisticsSnapshot {
            contexts_created: self.contexts_created.load(Ordering::Relaxed),
            conclusions_produced: self.conclusions_produced.load(Ordering::Relaxed),
            conclusions_inserted: self.conclusions_inserted.load(Ordering::Relaxed),
            stale_conclusions: self.stale_conclusions.load(Ordering::Relaxed),
            contexts_reset: self.contexts_reset.load(Ordering::Relaxed),
        }
    }
}

/// A copy of the [`SaturationStatistics`] counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatisticsSnapshot {
    pub contexts_created: u64,
    pub conclusions_produced: u64,
    /// Conclusions that were new to their context
    pub conclusions_inserted: u64,
    /// Conclusions dropped because their origin has been reset since they were produced
    pub stale_conclusions: u64,
    pub contexts_reset: u64,
}
