use crate::indexing::{AxiomId, EntityId, PropertyId};

/// A fact derived in a [`Context`](crate::saturation::Context).
///
/// The set of conclusions is closed: every consumer matches on all of them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Conclusion {
    /// The root of the context is subsumed by the entity.
    Subsumer(EntityId),
    /// The root of the context is unsatisfiable.
    Contradiction,
    /// `member`, a member of the disjointness axiom `axiom`, has been derived as a subsumer.
    ///
    /// Observing the same axiom from two different members means that two disjoint classes
    /// subsume the root.
    DisjointSubsumer { axiom: AxiomId, member: EntityId },
    /// The context `source` has `∃property.root` as a subsumer.
    BackwardLink {
        source: EntityId,
        property: PropertyId,
    },
}

/// The kind of a [`Conclusion`], without its payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConclusionKind {
    Subsumer,
    Contradiction,
    DisjointSubsumer,
    BackwardLink,
}

impl Conclusion {
    #[inline]
    pub fn kind(&self) -> ConclusionKind {
        match self {
            Self::Subsumer(_) => ConclusionKind::Subsumer,
            Self::Contradiction => ConclusionKind::Contradiction,
            Self::DisjointSubsumer { .. } => ConclusionKind::DisjointSubsumer,
            Self::BackwardLink { .. } => ConclusionKind::BackwardLink,
        }
    }
}

/// The context a conclusion has been produced in, and its generation at that time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Origin {
    pub context: EntityId,
    pub generation: u64,
}

/// A conclusion waiting in the to-do queue of its target context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct PendingConclusion {
    pub conclusion: Conclusion,
    pub origin: Origin,
}

/// The only way rules emit conclusions.
pub trait SaturationWriter {
    /// Produces `conclusion` in the context rooted at `target`.
    fn produce(&mut self, target: EntityId, conclusion: Conclusion);
}

impl SaturationWriter for Vec<(EntityId, Conclusion)> {
    #[inline]
    fn produce(&mut self, target: EntityId, conclusion: Conclusion) {
        self.push((target, conclusion));
    }
}
