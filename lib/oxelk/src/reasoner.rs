//! The incremental classification facade.

use crate::error::ReasonerError;
use crate::expression::{Axiom, OWL_THING};
use crate::indexing::{IndexChanges, OntologyIndex};
use crate::saturation::{
    Interrupter, SaturationEngine, SaturationListener, SaturationState, SaturationStatistics,
    SaturationStatus, StatisticsSnapshot,
};
use oxrdf::{NamedNode, NamedNodeRef};
use std::collections::VecDeque;
use std::sync::Arc;
use std::thread::available_parallelism;
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// When axiom changes reach the index.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum BufferingMode {
    /// Changes are kept until [`Reasoner::flush`] or [`Reasoner::classify`] is called.
    Buffering,
    /// Changes are applied as soon as they are made.
    #[default]
    NonBuffering,
}

/// Configuration for the reasoner.
#[derive(Debug, Clone)]
pub struct ReasonerConfig {
    /// Number of saturation workers.
    pub workers: usize,
    /// When axiom changes reach the index.
    pub buffering_mode: BufferingMode,
    /// How long an idle worker waits for work before checking for interruptions.
    pub interrupt_check_interval: Duration,
}

impl Default for ReasonerConfig {
    fn default() -> Self {
        Self {
            workers: available_parallelism().map_or(1, usize::from),
            buffering_mode: BufferingMode::default(),
            interrupt_check_interval: Duration::from_millis(10),
        }
    }
}

impl ReasonerConfig {
    #[must_use]
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    #[must_use]
    pub fn with_buffering_mode(mut self, buffering_mode: BufferingMode) -> Self {
        self.buffering_mode = buffering_mode;
        self
    }

    #[must_use]
    pub fn with_interrupt_check_interval(mut self, interval: Duration) -> Self {
        self.interrupt_check_interval = interval;
        self
    }
}

#[derive(Debug, Clone)]
enum Change {
    Addition(Axiom),
    Removal(Axiom),
}

/// An incremental and concurrent classifier for the supported EL fragment.
///
/// ```
/// use oxelk::{Axiom, Reasoner, SaturationStatus};
/// use oxrdf::NamedNodeRef;
///
/// let cat = NamedNodeRef::new("http://example.com/Cat")?;
/// let animal = NamedNodeRef::new("http://example.com/Animal")?;
/// let mut reasoner = Reasoner::new();
/// reasoner.add_axiom(&Axiom::subclass_of(cat, animal))?;
/// assert_eq!(reasoner.classify()?, SaturationStatus::Saturated);
/// assert!(reasoner.is_subsumed_by(cat, animal));
///
/// reasoner.remove_axiom(&Axiom::subclass_of(cat, animal))?;
/// reasoner.classify()?;
/// assert!(!reasoner.is_subsumed_by(cat, animal));
/// # Result::<_, Box<dyn std::error::Error>>::Ok(())
/// ```
pub struct Reasoner {
    config: ReasonerConfig,
    index: OntologyIndex,
    state: SaturationState,
    buffer: VecDeque<Change>,
    interrupter: Interrupter,
    listeners: Vec<Arc<dyn SaturationListener>>,
    statistics: SaturationStatistics,
}

impl Default for Reasoner {
    fn default() -> Self {
        Self::new()
    }
}

impl Reasoner {
    pub fn new() -> Self {
        Self::with_config(ReasonerConfig::default())
    }

    pub fn with_config(config: ReasonerConfig) -> Self {
        Self {
            config,
            index: OntologyIndex::new(),
            state: SaturationState::new(),
            buffer: VecDeque::new(),
            interrupter: Interrupter::default(),
            listeners: Vec::new(),
            statistics: SaturationStatistics::default(),
        }
    }

    #[inline]
    pub fn config(&self) -> &ReasonerConfig {
        &self.config
    }

    /// Adds one occurrence of `axiom`.
    ///
    /// In [`BufferingMode::Buffering`] the change is only applied by the next
    /// [`flush`](Self::flush).
    pub fn add_axiom(&mut self, axiom: &Axiom) -> Result<(), ReasonerError> {
        self.change(Change::Addition(axiom.clone()))
    }

    /// Removes one occurrence of `axiom`.
    ///
    /// Fails with [`IndexError::NegativeOccurrence`](crate::IndexError::NegativeOccurrence) if
    /// the axiom does not occur. In [`BufferingMode::Buffering`] this is only checked by the
    /// next [`flush`](Self::flush).
    pub fn remove_axiom(&mut self, axiom: &Axiom) -> Result<(), ReasonerError> {
        self.change(Change::Removal(axiom.clone()))
    }

    fn change(&mut self, change: Change) -> Result<(), ReasonerError> {
        self.buffer.push_back(change);
        match self.config.buffering_mode {
            BufferingMode::Buffering => Ok(()),
            BufferingMode::NonBuffering => self.flush(),
        }
    }

    /// The number of buffered changes not applied yet.
    pub fn pending_changes(&self) -> usize {
        self.buffer.len()
    }

    /// Applies the buffered changes, in order, and invalidates the affected contexts.
    ///
    /// If a change fails, it is discarded and the following ones stay buffered.
    pub fn flush(&mut self) -> Result<(), ReasonerError> {
        let mut changes = IndexChanges::default();
        let mut result = Ok(());
        while let Some(change) = self.buffer.pop_front() {
            let applied = match &change {
                Change::Addition(axiom) => self.index.add_axiom(axiom, &mut changes),
                Change::Removal(axiom) => self.index.remove_axiom(axiom, &mut changes),
            };
            if let Err(e) = applied {
                result = Err(e.into());
                break;
            }
        }
        let reset = self
            .state
            .invalidate(&changes, self.index.entities().thing());
        self.statistics.contexts_reset(reset);
        result
    }

    /// A handle to interrupt a running [`classify`](Self::classify) from another thread.
    pub fn interrupter(&self) -> Interrupter {
        self.interrupter.clone()
    }

    /// Registers a listener notified during saturation.
    pub fn add_listener(&mut self, listener: Arc<dyn SaturationListener>) {
        self.listeners.push(listener);
    }

    /// Flushes the buffered changes and saturates the contexts of every named class.
    ///
    /// When interrupted, the remaining work is kept and the next call resumes it.
    pub fn classify(&mut self) -> Result<SaturationStatus, ReasonerError> {
        self.flush()?;
        let start = Instant::now();
        let entities = self.index.entities();
        let engine = SaturationEngine::new(
            entities,
            &self.state,
            &self.statistics,
            &self.interrupter,
        )
        .with_listeners(&self.listeners)
        .with_poll_interval(self.config.interrupt_check_interval);
        for (class, _) in entities.named_classes() {
            engine.schedule(class);
        }
        info!(
            "Saturating {} contexts with {} workers",
            self.state.len(),
            self.config.workers
        );
        let status = engine.run(self.config.workers)?;
        if status == SaturationStatus::Interrupted {
            self.interrupter.clear();
        }
        info!(
            "Saturation {status:?} after {:?} with {} contexts",
            start.elapsed(),
            self.state.len()
        );
        debug!("{:?}", self.statistics.snapshot());
        Ok(status)
    }

    /// Whether `class` is satisfiable according to the last classification.
    pub fn is_satisfiable(&self, class: NamedNodeRef<'_>) -> bool {
        let entities = self.index.entities();
        let Some(id) = entities.class_id(class) else {
            return true;
        };
        if id == entities.nothing() {
            return false;
        }
        self.state
            .with_context(id, |context| !context.is_inconsistent())
            .unwrap_or(true)
    }

    /// The named classes subsuming `class` according to the last classification, sorted.
    ///
    /// They include `class` itself and `owl:Thing`. An unsatisfiable class is subsumed by
    /// every named class.
    pub fn subsumers(&self, class: NamedNodeRef<'_>) -> Vec<NamedNode> {
        let entities = self.index.entities();
        let mut named = entities
            .class_id(class)
            .and_then(|id| {
                self.state.with_context(id, |context| {
                    if context.is_inconsistent() {
                        entities
                            .named_classes()
                            .map(|(_, iri)| iri.into_owned())
                            .collect::<Vec<_>>()
                    } else {
                        entities
                            .named_classes()
                            .filter(|(id, _)| context.contains_subsumer(*id))
                            .map(|(_, iri)| iri.into_owned())
                            .collect()
                    }
                })
            })
            .unwrap_or_else(|| {
                if class == OWL_THING {
                    vec![class.into_owned()]
                } else {
                    vec![class.into_owned(), OWL_THING.into_owned()]
                }
            });
        named.sort_unstable_by(|a, b| a.as_str().cmp(b.as_str()));
        named
    }

    /// Whether `sub_class` is subsumed by `super_class` according to the last classification.
    pub fn is_subsumed_by(
        &self,
        sub_class: NamedNodeRef<'_>,
        super_class: NamedNodeRef<'_>,
    ) -> bool {
        if sub_class == super_class || super_class == OWL_THING {
            return true;
        }
        let entities = self.index.entities();
        let Some(sub) = entities.class_id(sub_class) else {
            return false;
        };
        self.state
            .with_context(sub, |context| {
                context.is_inconsistent()
                    || entities
                        .class_id(super_class)
                        .is_some_and(|sup| context.contains_subsumer(sup))
            })
            .unwrap_or(false)
    }

    /// The number of conclusions that applying again every rule would add: zero once
    /// [`classify`](Self::classify) has returned [`SaturationStatus::Saturated`].
    pub fn check_fixpoint(&self) -> usize {
        self.state.check_fixpoint(self.index.entities())
    }

    pub fn statistics(&self) -> StatisticsSnapshot {
        self.statistics.snapshot()
    }

    #[inline]
    pub fn index(&self) -> &OntologyIndex {
        &self.index
    }

    #[inline]
    pub fn state(&self) -> &SaturationState {
        &self.state
    }
}
