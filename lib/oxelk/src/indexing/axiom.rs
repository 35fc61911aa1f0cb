use crate::error::{IndexError, OccurrenceOwner};
use crate::indexing::disjointness::IndexedDisjointnessAxiom;
use crate::indexing::occurrence::{OccurrenceCounter, OccurrenceTransition};
use crate::indexing::{AxiomId, EntityId, EntityRegistry, IndexUpdater};
use crate::rules::ChainableRule;
use std::fmt;

/// An indexed `SubClassOf` axiom.
///
/// While it occurs, the super-class is a told subsumer of the sub-class.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexedSubClassOfAxiom {
    id: AxiomId,
    sub_class: EntityId,
    super_class: EntityId,
    occurrences: OccurrenceCounter,
}

impl IndexedSubClassOfAxiom {
    pub fn new(id: AxiomId, sub_class: EntityId, super_class: EntityId) -> Self {
        Self {
            id,
            sub_class,
            super_class,
            occurrences: OccurrenceCounter::default(),
        }
    }

    #[inline]
    pub fn id(&self) -> AxiomId {
        self.id
    }

    #[inline]
    pub fn sub_class(&self) -> EntityId {
        self.sub_class
    }

    #[inline]
    pub fn super_class(&self) -> EntityId {
        self.super_class
    }

    #[inline]
    pub fn occurrences(&self) -> OccurrenceCounter {
        self.occurrences
    }

    /// Changes the number of occurrences of this axiom by `increment`, attaching or detaching
    /// the told subsumer rule when it crosses zero.
    pub fn update_occurrences(
        &mut self,
        updater: &mut impl IndexUpdater,
        increment: i32,
    ) -> Result<OccurrenceTransition, IndexError> {
        let (transition, occurrences) = self
            .occurrences
            .checked_transition(increment, || OccurrenceOwner::Axiom(self.id))?;
        let rule = ChainableRule::told_subsumer(self.super_class);
        match transition {
            OccurrenceTransition::Register => {
                updater.add(self.sub_class, &rule)?;
            }
            OccurrenceTransition::Deregister => {
                updater.remove(self.sub_class, &rule)?;
            }
            OccurrenceTransition::Increment
            | OccurrenceTransition::Decrement
            | OccurrenceTransition::Unchanged => (),
        }
        self.occurrences = occurrences;
        Ok(transition)
    }
}

impl fmt::Display for IndexedSubClassOfAxiom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SubClassOf({} {})", self.sub_class, self.super_class)
    }
}

/// An axiom of the [`OntologyIndex`](crate::indexing::OntologyIndex).
///
/// `EquivalentClasses` axioms are indexed as pairs of `SubClassOf` axioms.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IndexedAxiom {
    SubClassOf(IndexedSubClassOfAxiom),
    Disjointness(IndexedDisjointnessAxiom),
}

impl IndexedAxiom {
    pub(crate) fn new(id: AxiomId, key: &AxiomKey) -> Self {
        match key {
            AxiomKey::SubClassOf {
                sub_class,
                super_class,
            } => Self::SubClassOf(IndexedSubClassOfAxiom::new(id, *sub_class, *super_class)),
            AxiomKey::Disjointness(members) => {
                Self::Disjointness(IndexedDisjointnessAxiom::new(id, members))
            }
        }
    }

    pub fn id(&self) -> AxiomId {
        match self {
            Self::SubClassOf(axiom) => axiom.id(),
            Self::Disjointness(axiom) => axiom.id(),
        }
    }

    pub fn occurrences(&self) -> OccurrenceCounter {
        match self {
            Self::SubClassOf(axiom) => axiom.occurrences(),
            Self::Disjointness(axiom) => axiom.occurrences(),
        }
    }

    pub fn update_occurrences(
        &mut self,
        updater: &mut impl IndexUpdater,
        increment: i32,
    ) -> Result<OccurrenceTransition, IndexError> {
        match self {
            Self::SubClassOf(axiom) => axiom.update_occurrences(updater, increment),
            Self::Disjointness(axiom) => axiom.update_occurrences(updater, increment),
        }
    }

    /// Renders the axiom with its entities written in functional-style syntax.
    pub fn display<'a>(&'a self, entities: &'a EntityRegistry) -> DisplayAxiom<'a> {
        DisplayAxiom {
            axiom: self,
            entities,
        }
    }
}

impl fmt::Display for IndexedAxiom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SubClassOf(axiom) => write!(f, "{axiom}"),
            Self::Disjointness(axiom) => write!(f, "{axiom}"),
        }
    }
}

pub struct DisplayAxiom<'a> {
    axiom: &'a IndexedAxiom,
    entities: &'a EntityRegistry,
}

impl fmt::Display for DisplayAxiom<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.axiom {
            IndexedAxiom::SubClassOf(axiom) => write!(
                f,
                "SubClassOf({} {})",
                self.entities.display(axiom.sub_class),
                self.entities.display(axiom.super_class)
            ),
            IndexedAxiom::Disjointness(axiom) => write!(f, "{}", axiom.display(self.entities)),
        }
    }
}

/// The structural identity of an indexed axiom.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) enum AxiomKey {
    SubClassOf {
        sub_class: EntityId,
        super_class: EntityId,
    },
    Disjointness(Vec<EntityId>),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::{RuleChain, RuleKind};

    struct SingleChain(RuleChain);

    impl IndexUpdater for SingleChain {
        fn add(&mut self, _: EntityId, rule: &ChainableRule) -> Result<bool, IndexError> {
            Ok(rule.add_to(&mut self.0))
        }

        fn remove(&mut self, entity: EntityId, rule: &ChainableRule) -> Result<bool, IndexError> {
            rule.remove_from(&mut self.0)
                .ok_or(IndexError::MissingRule {
                    entity,
                    kind: rule.kind(),
                })
        }
    }

    #[test]
    fn told_subsumer_follows_occurrences() {
        let key = AxiomKey::SubClassOf {
            sub_class: EntityId::from_index(2),
            super_class: EntityId::from_index(3),
        };
        let mut axiom = IndexedAxiom::new(AxiomId::from_index(0), &key);
        let mut updater = SingleChain(RuleChain::default());
        axiom.update_occurrences(&mut updater, 2).unwrap();
        assert_eq!(
            updater.0.find(RuleKind::ToldSubsumers),
            Some(&ChainableRule::told_subsumer(EntityId::from_index(3)))
        );
        axiom.update_occurrences(&mut updater, -1).unwrap();
        assert_eq!(updater.0.len(), 1);
        assert_eq!(
            axiom.update_occurrences(&mut updater, -1).unwrap(),
            OccurrenceTransition::Deregister
        );
        assert!(updater.0.is_empty());
        assert_eq!(axiom.to_string(), "SubClassOf(#2 #3)");
    }
}
