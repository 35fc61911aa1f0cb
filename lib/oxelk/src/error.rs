use crate::indexing::{AxiomId, EntityId};
use crate::rules::RuleKind;
use rayon_core::ThreadPoolBuildError;
use thiserror::Error;

/// A violation of the indexing protocol.
///
/// These errors are raised when a caller removes something that was never added.
/// The operation is aborted before the index is modified.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum IndexError {
    /// An occurrence counter would become negative.
    #[error("The occurrence counter of {0} would become negative")]
    NegativeOccurrence(OccurrenceOwner),
    /// An occurrence counter would exceed its maximal value.
    #[error("The occurrence counter of {0} overflowed")]
    OccurrenceOverflow(OccurrenceOwner),
    /// A rule chain does not contain the state that is being removed.
    #[error("The {kind:?} rule of entity {entity} does not contain the state being removed")]
    MissingRule {
        /// The entity owning the chain.
        entity: EntityId,
        /// The kind of the rule.
        kind: RuleKind,
    },
    /// An entity id that is not (or no longer) in the registry.
    #[error("Unknown entity {0}")]
    UnknownEntity(EntityId),
    /// Every id of the given kind has already been allocated.
    #[error("No {0} id is left to allocate")]
    IdSpaceExhausted(&'static str),
}

/// The owner of an occurrence counter, used in [`IndexError::NegativeOccurrence`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OccurrenceOwner {
    /// An indexed class expression.
    Entity(EntityId),
    /// An indexed axiom.
    Axiom(AxiomId),
    /// An axiom that has never been indexed, rendered in functional-style syntax.
    UnindexedAxiom(String),
}

impl std::fmt::Display for OccurrenceOwner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Entity(id) => write!(f, "entity {id}"),
            Self::Axiom(id) => write!(f, "axiom {id}"),
            Self::UnindexedAxiom(axiom) => write!(f, "axiom {axiom}"),
        }
    }
}

/// An error raised by the [`Reasoner`](crate::Reasoner).
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ReasonerError {
    /// The indexing protocol has been violated.
    #[error(transparent)]
    Index(#[from] IndexError),
    /// The saturation worker pool could not be built.
    #[error("Failed to build the saturation worker pool: {0}")]
    ThreadPool(#[from] ThreadPoolBuildError),
}
