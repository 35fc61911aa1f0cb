use crate::indexing::{EntityId, EntityRegistry};
use crate::saturation::conclusion::{Origin, PendingConclusion};
use crate::saturation::listener::{SaturationListener, SaturationStatistics};
use crate::saturation::propagation::propagate;
use crate::saturation::state::SaturationState;
use rayon_core::{ThreadPoolBuildError, ThreadPoolBuilder};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::trace;

/// A flag to cooperatively stop a running saturation.
///
/// Clones share the same flag.
#[derive(Debug, Clone, Default)]
pub struct Interrupter(Arc<AtomicBool>);

impl Interrupter {
    /// Asks the saturation workers to stop as soon as possible.
    pub fn interrupt(&self) {
        self.0.store(true, Ordering::Release);
    }

    #[inline]
    pub fn is_interrupted(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    pub fn clear(&self) {
        self.0.store(false, Ordering::Release);
    }
}

/// How a saturation run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SaturationStatus {
    /// No context has pending conclusions anymore.
    Saturated,
    /// The run has been interrupted. The remaining work is kept for the next run.
    Interrupted,
}

/// Applies the rules of the indexed entities to the contexts of `state` until the fixpoint.
pub struct SaturationEngine<'a> {
    entities: &'a EntityRegistry,
    state: &'a SaturationState,
    listeners: &'a [Arc<dyn SaturationListener>],
    statistics: &'a SaturationStatistics,
    interrupter: &'a Interrupter,
    poll_interval: Duration,
}

impl<'a> SaturationEngine<'a> {
    pub fn new(
        entities: &'a EntityRegistry,
        state: &'a SaturationState,
        statistics: &'a SaturationStatistics,
        interrupter: &'a Interrupter,
    ) -> Self {
        Self {
            entities,
            state,
            listeners: &[],
            statistics,
            interrupter,
            poll_interval: Duration::from_millis(10),
        }
    }

    #[must_use]
    pub fn with_listeners(mut self, listeners: &'a [Arc<dyn SaturationListener>]) -> Self {
        self.listeners = listeners;
        self
    }

    /// Sets how long an idle worker waits for new work before checking the interruption flag.
    #[must_use]
    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// Creates the context of `root` if needed, so that the next run saturates it.
    pub fn schedule(&self, root: EntityId) {
        if self.state.schedule(root, self.entities.thing()) {
            self.context_created(root);
        }
    }

    /// Runs `workers` saturation workers until the fixpoint or an interruption.
    pub fn run(&self, workers: usize) -> Result<SaturationStatus, ThreadPoolBuildError> {
        let workers = workers.max(1);
        if workers == 1 {
            self.work();
        } else {
            ThreadPoolBuilder::new()
                .num_threads(workers)
                .thread_name(|i| format!("oxelk saturation worker {i}"))
                .build()?
                .scope(|s| {
                    for _ in 0..workers {
                        s.spawn(|_| self.work());
                    }
                });
        }
        Ok(
            if self.interrupter.is_interrupted() && !self.state.active().is_empty() {
                SaturationStatus::Interrupted
            } else {
                SaturationStatus::Saturated
            },
        )
    }

    fn work(&self) {
        let queue = self.state.active();
        while let Some(root) = queue.next(self.interrupter, self.poll_interval) {
            self.process(root);
            queue.release();
        }
    }

    /// Processes the pending conclusions of one context until there are none left.
    fn process(&self, root: EntityId) {
        let thing = self.entities.thing();
        let mut produced = Vec::new();
        loop {
            if self.interrupter.is_interrupted() {
                // The context is still active: it goes back in the queue for the next run
                self.state.active().push(root);
                return;
            }
            let origin = {
                let Some(mut context) = self.state.get_mut(root) else {
                    // Dropped since it was queued
                    return;
                };
                let Some(pending) = context.poll() else {
                    context.deactivate();
                    return;
                };
                let generations = self.state.generations();
                if !generations.is_current(pending.origin) {
                    self.statistics.stale_conclusion();
                    continue;
                }
                if !context.insert(&pending) {
                    continue;
                }
                self.statistics.conclusion_inserted();
                trace!("{root}: {:?}", pending.conclusion);
                for listener in self.listeners {
                    listener.context_modified(root, &pending.conclusion);
                }
                propagate(
                    &pending.conclusion,
                    &context,
                    self.entities,
                    generations,
                    &mut produced,
                );
                Origin {
                    context: root,
                    generation: generations.current(root),
                }
            };
            for (target, conclusion) in produced.drain(..) {
                self.statistics.conclusion_produced();
                for listener in self.listeners {
                    listener.conclusion_produced(root, target, &conclusion);
                }
                if self
                    .state
                    .deliver(target, PendingConclusion { conclusion, origin }, thing)
                {
                    self.context_created(target);
                }
            }
        }
    }

    fn context_created(&self, root: EntityId) {
        self.statistics.context_created();
        for listener in self.listeners {
            listener.context_created(root);
        }
    }
}
