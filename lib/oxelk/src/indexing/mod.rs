//! The index of the ontology: hash-consed class expressions with their rule chains, and the
//! axioms registering rules on them.

mod axiom;
mod disjointness;
mod entity;
mod occurrence;
mod ontology;

pub use crate::indexing::axiom::{DisplayAxiom, IndexedAxiom, IndexedSubClassOfAxiom};
pub use crate::indexing::disjointness::{DisplayDisjointness, IndexedDisjointnessAxiom};
pub use crate::indexing::entity::{
    DisplayEntity, EntityRegistry, IndexedClassExpression, IndexedEntity,
};
pub use crate::indexing::occurrence::{OccurrenceCounter, OccurrenceTransition};
pub use crate::indexing::ontology::OntologyIndex;
use crate::error::IndexError;
use crate::rules::ChainableRule;
use rustc_hash::FxHashSet;
use std::fmt;
use tracing::debug;

macro_rules! index_id {
    ($(#[$attr:meta])* $name:ident) => {
        $(#[$attr])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(u32);

        impl $name {
            /// The id at position `index`, if it fits.
            #[inline]
            pub(crate) fn try_from_index(index: usize) -> Option<Self> {
                u32::try_from(index).ok().map(Self)
            }

            #[cfg(test)]
            pub(crate) fn from_index(index: usize) -> Self {
                Self(u32::try_from(index).unwrap())
            }

            #[inline]
            pub fn index(self) -> usize {
                self.0 as usize
            }
        }

        impl fmt::Display for $name {
            #[inline]
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "#{}", self.0)
            }
        }
    };
}

index_id!(
    /// The id of an [`IndexedEntity`] in the [`EntityRegistry`].
    ///
    /// Ids are never reused, even after the entity has been removed.
    EntityId
);
index_id!(
    /// The id of an object property.
    PropertyId
);
index_id!(
    /// The id of an [`IndexedAxiom`].
    AxiomId
);

/// The entities affected by a sequence of index updates.
///
/// The saturation uses them to find which contexts must be recomputed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndexChanges {
    changed_chains: FxHashSet<EntityId>,
    removed_entities: FxHashSet<EntityId>,
}

impl IndexChanges {
    /// The entities whose rule chain has changed.
    pub fn changed_chains(&self) -> impl Iterator<Item = EntityId> + '_ {
        self.changed_chains.iter().copied()
    }

    /// The entities that have been removed from the registry.
    pub fn removed_entities(&self) -> impl Iterator<Item = EntityId> + '_ {
        self.removed_entities.iter().copied()
    }

    pub fn is_empty(&self) -> bool {
        self.changed_chains.is_empty() && self.removed_entities.is_empty()
    }

    pub(crate) fn chain_changed(&mut self, entity: EntityId) {
        self.changed_chains.insert(entity);
    }

    pub(crate) fn entity_removed(&mut self, entity: EntityId) {
        self.removed_entities.insert(entity);
    }
}

/// Attaches rules to and detaches rules from the chains of the indexed entities.
///
/// Axioms register their rules through it when their occurrence counter crosses zero.
pub trait IndexUpdater {
    /// Merges `rule` into the chain of `entity`. Returns whether the chain changed.
    fn add(&mut self, entity: EntityId, rule: &ChainableRule) -> Result<bool, IndexError>;

    /// Subtracts `rule` from the chain of `entity`. Returns whether the chain changed.
    ///
    /// Fails if the chain does not contain the state of `rule`.
    fn remove(&mut self, entity: EntityId, rule: &ChainableRule) -> Result<bool, IndexError>;
}

/// Adds (or removes) every rule of `rules` to the chain of its entity, all or nothing.
///
/// If one update fails, the ones already performed are undone before returning the error.
pub(crate) fn update_all(
    updater: &mut impl IndexUpdater,
    rules: &[(EntityId, ChainableRule)],
    add: bool,
) -> Result<(), IndexError> {
    for (done, (entity, rule)) in rules.iter().enumerate() {
        let result = if add {
            updater.add(*entity, rule)
        } else {
            updater.remove(*entity, rule)
        };
        let Err(error) = result else {
            continue;
        };
        for (entity, rule) in rules[..done].iter().rev() {
            let undone = if add {
                updater.remove(*entity, rule)
            } else {
                updater.add(*entity, rule)
            };
            if let Err(e) = undone {
                debug!("Failed to undo a rule update of {entity}: {e}");
            }
        }
        return Err(error);
    }
    Ok(())
}

/// The [`IndexUpdater`] writing to an [`EntityRegistry`] and recording the changed chains.
pub struct ChainUpdater<'a> {
    entities: &'a mut EntityRegistry,
    changes: &'a mut IndexChanges,
}

impl<'a> ChainUpdater<'a> {
    pub fn new(entities: &'a mut EntityRegistry, changes: &'a mut IndexChanges) -> Self {
        Self { entities, changes }
    }
}

impl IndexUpdater for ChainUpdater<'_> {
    fn add(&mut self, entity: EntityId, rule: &ChainableRule) -> Result<bool, IndexError> {
        self.entities.add_rule(entity, rule, self.changes)
    }

    fn remove(&mut self, entity: EntityId, rule: &ChainableRule) -> Result<bool, IndexError> {
        self.entities.remove_rule(entity, rule, self.changes)
    }
}
