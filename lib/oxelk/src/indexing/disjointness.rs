use crate::error::{IndexError, OccurrenceOwner};
use crate::indexing::occurrence::{OccurrenceCounter, OccurrenceTransition};
use crate::indexing::{AxiomId, EntityId, EntityRegistry, IndexUpdater, update_all};
use crate::rules::ChainableRule;
use rustc_hash::FxHashMap;
use std::collections::hash_map::Entry;
use std::fmt;

/// An indexed `DisjointClasses` axiom.
///
/// The members are split at construction between the inconsistent members, that occur at
/// least twice and so are unsatisfiable, and the disjoint members, that occur exactly once.
/// Disjoint members keep the order in which they are first seen, inconsistent members the
/// order in which they are seen for the second time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexedDisjointnessAxiom {
    id: AxiomId,
    inconsistent_members: Vec<EntityId>,
    disjoint_members: Vec<EntityId>,
    occurrences: OccurrenceCounter,
}

impl IndexedDisjointnessAxiom {
    pub fn new(id: AxiomId, members: &[EntityId]) -> Self {
        // member -> whether it has been seen more than once
        let mut repeated = FxHashMap::<EntityId, bool>::default();
        let mut first_seen = Vec::new();
        let mut inconsistent_members = Vec::new();
        for &member in members {
            match repeated.entry(member) {
                Entry::Vacant(entry) => {
                    entry.insert(false);
                    first_seen.push(member);
                }
                Entry::Occupied(mut entry) => {
                    if !entry.insert(true) {
                        inconsistent_members.push(member);
                    }
                }
            }
        }
        let disjoint_members = first_seen
            .into_iter()
            .filter(|member| !repeated.get(member).copied().unwrap_or(false))
            .collect();
        Self {
            id,
            inconsistent_members,
            disjoint_members,
            occurrences: OccurrenceCounter::default(),
        }
    }

    #[inline]
    pub fn id(&self) -> AxiomId {
        self.id
    }

    /// The members occurring at least twice.
    #[inline]
    pub fn inconsistent_members(&self) -> &[EntityId] {
        &self.inconsistent_members
    }

    /// The members occurring exactly once.
    #[inline]
    pub fn disjoint_members(&self) -> &[EntityId] {
        &self.disjoint_members
    }

    #[inline]
    pub fn occurrences(&self) -> OccurrenceCounter {
        self.occurrences
    }

    /// Changes the number of occurrences of this axiom by `increment`.
    ///
    /// When the axiom starts occurring, a contradiction rule is attached to every inconsistent
    /// member and a composition rule for this axiom to every disjoint member. They are detached
    /// when the axiom stops occurring. On failure, neither the chains nor the counter change.
    pub fn update_occurrences(
        &mut self,
        updater: &mut impl IndexUpdater,
        increment: i32,
    ) -> Result<OccurrenceTransition, IndexError> {
        let (transition, occurrences) = self
            .occurrences
            .checked_transition(increment, || OccurrenceOwner::Axiom(self.id))?;
        match transition {
            OccurrenceTransition::Register => update_all(updater, &self.rules(), true)?,
            OccurrenceTransition::Deregister => update_all(updater, &self.rules(), false)?,
            OccurrenceTransition::Increment
            | OccurrenceTransition::Decrement
            | OccurrenceTransition::Unchanged => (),
        }
        self.occurrences = occurrences;
        Ok(transition)
    }

    /// The rules this axiom attaches to its members while it occurs.
    fn rules(&self) -> Vec<(EntityId, ChainableRule)> {
        let contradiction = ChainableRule::contradiction();
        let composition = ChainableRule::disjoint_composition(self.id);
        self.inconsistent_members
            .iter()
            .map(|member| (*member, contradiction.clone()))
            .chain(
                self.disjoint_members
                    .iter()
                    .map(|member| (*member, composition.clone())),
            )
            .collect()
    }

    /// The members as rendered: each inconsistent member twice, then each disjoint member.
    pub fn rendered_members(&self) -> impl Iterator<Item = EntityId> + '_ {
        self.inconsistent_members
            .iter()
            .flat_map(|member| [*member, *member])
            .chain(self.disjoint_members.iter().copied())
    }

    /// Renders the axiom with the members written in functional-style syntax.
    pub fn display<'a>(&'a self, entities: &'a EntityRegistry) -> DisplayDisjointness<'a> {
        DisplayDisjointness {
            axiom: self,
            entities: Some(entities),
        }
    }
}

impl fmt::Display for IndexedDisjointnessAxiom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let display = DisplayDisjointness {
            axiom: self,
            entities: None,
        };
        write!(f, "{display}")
    }
}

/// Renders an [`IndexedDisjointnessAxiom`] as `DisjointClasses(A, A, B, C)`.
pub struct DisplayDisjointness<'a> {
    axiom: &'a IndexedDisjointnessAxiom,
    entities: Option<&'a EntityRegistry>,
}

impl fmt::Display for DisplayDisjointness<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("DisjointClasses(")?;
        for (i, member) in self.axiom.rendered_members().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            match self.entities {
                Some(entities) => write!(f, "{}", entities.display(member))?,
                None => write!(f, "{member}")?,
            }
        }
        f.write_str(")")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::{RuleChain, RuleKind};

    fn ids(indexes: &[usize]) -> Vec<EntityId> {
        indexes.iter().copied().map(EntityId::from_index).collect()
    }

    /// Keeps the chains in memory and logs every call.
    #[derive(Default)]
    struct RecordingUpdater {
        chains: FxHashMap<EntityId, RuleChain>,
        added: Vec<(EntityId, RuleKind)>,
        removed: Vec<(EntityId, RuleKind)>,
        unknown: Option<EntityId>,
    }

    impl IndexUpdater for RecordingUpdater {
        fn add(&mut self, entity: EntityId, rule: &ChainableRule) -> Result<bool, IndexError> {
            if self.unknown == Some(entity) {
                return Err(IndexError::UnknownEntity(entity));
            }
            self.added.push((entity, rule.kind()));
            Ok(rule.add_to(self.chains.entry(entity).or_default()))
        }

        fn remove(&mut self, entity: EntityId, rule: &ChainableRule) -> Result<bool, IndexError> {
            self.removed.push((entity, rule.kind()));
            let chain = self.chains.entry(entity).or_default();
            rule.remove_from(chain).ok_or(IndexError::MissingRule {
                entity,
                kind: rule.kind(),
            })
        }
    }

    #[test]
    fn members_are_partitioned() {
        let axiom = IndexedDisjointnessAxiom::new(AxiomId::from_index(0), &ids(&[1, 2]));
        assert!(axiom.inconsistent_members().is_empty());
        assert_eq!(axiom.disjoint_members(), ids(&[1, 2]));

        let axiom = IndexedDisjointnessAxiom::new(AxiomId::from_index(0), &ids(&[1, 1, 2]));
        assert_eq!(axiom.inconsistent_members(), ids(&[1]));
        assert_eq!(axiom.disjoint_members(), ids(&[2]));
        assert_eq!(axiom.rendered_members().collect::<Vec<_>>(), ids(&[1, 1, 2]));

        let axiom = IndexedDisjointnessAxiom::new(AxiomId::from_index(0), &ids(&[1, 1, 1]));
        assert_eq!(axiom.inconsistent_members(), ids(&[1]));
        assert!(axiom.disjoint_members().is_empty());
    }

    #[test]
    fn inconsistent_members_never_come_back() {
        let axiom =
            IndexedDisjointnessAxiom::new(AxiomId::from_index(0), &ids(&[3, 1, 2, 1, 3, 1, 4]));
        assert_eq!(axiom.inconsistent_members(), ids(&[1, 3]));
        assert_eq!(axiom.disjoint_members(), ids(&[2, 4]));
    }

    #[test]
    fn rendering() {
        let axiom = IndexedDisjointnessAxiom::new(AxiomId::from_index(0), &ids(&[2, 1, 3, 1]));
        assert_eq!(axiom.to_string(), "DisjointClasses(#1, #1, #2, #3)");
    }

    #[test]
    fn registration_follows_zero_crossings() {
        let mut axiom = IndexedDisjointnessAxiom::new(AxiomId::from_index(0), &ids(&[1, 1, 2, 3]));
        let mut updater = RecordingUpdater::default();

        assert_eq!(
            axiom.update_occurrences(&mut updater, 1).unwrap(),
            OccurrenceTransition::Register
        );
        assert_eq!(
            updater.added,
            [
                (EntityId::from_index(1), RuleKind::Contradiction),
                (EntityId::from_index(2), RuleKind::DisjointComposition),
                (EntityId::from_index(3), RuleKind::DisjointComposition),
            ]
        );

        assert_eq!(
            axiom.update_occurrences(&mut updater, 1).unwrap(),
            OccurrenceTransition::Increment
        );
        assert_eq!(updater.added.len(), 3, "no registration while already occurring");
        assert_eq!(
            axiom.update_occurrences(&mut updater, -1).unwrap(),
            OccurrenceTransition::Decrement
        );
        assert!(updater.removed.is_empty());

        assert_eq!(
            axiom.update_occurrences(&mut updater, -1).unwrap(),
            OccurrenceTransition::Deregister
        );
        assert_eq!(updater.removed.len(), 3);
        assert!(
            updater.chains.values().all(RuleChain::is_empty),
            "chains must be erased, not zeroed"
        );
        assert!(!axiom.occurrences().occurs());
    }

    #[test]
    fn negative_occurrences_are_rejected() {
        let mut axiom = IndexedDisjointnessAxiom::new(AxiomId::from_index(7), &ids(&[1, 2]));
        let mut updater = RecordingUpdater::default();
        assert_eq!(
            axiom.update_occurrences(&mut updater, -1),
            Err(IndexError::NegativeOccurrence(OccurrenceOwner::Axiom(
                AxiomId::from_index(7)
            )))
        );
        assert!(updater.removed.is_empty());
        assert_eq!(axiom.occurrences().get(), 0);
    }

    #[test]
    fn composition_is_shared_between_axioms() {
        let shared = EntityId::from_index(1);
        let mut first = IndexedDisjointnessAxiom::new(AxiomId::from_index(0), &ids(&[1, 2]));
        let mut second = IndexedDisjointnessAxiom::new(AxiomId::from_index(1), &ids(&[1, 3]));
        let mut updater = RecordingUpdater::default();
        first.update_occurrences(&mut updater, 1).unwrap();
        second.update_occurrences(&mut updater, 1).unwrap();
        assert_eq!(
            updater.chains[&shared].find(RuleKind::DisjointComposition),
            Some(&ChainableRule::DisjointComposition {
                axioms: [AxiomId::from_index(0), AxiomId::from_index(1)]
                    .into_iter()
                    .collect()
            })
        );

        first.update_occurrences(&mut updater, -1).unwrap();
        assert_eq!(
            updater.chains[&shared].find(RuleKind::DisjointComposition),
            Some(&ChainableRule::disjoint_composition(AxiomId::from_index(1)))
        );
        second.update_occurrences(&mut updater, -1).unwrap();
        assert!(
            updater.chains[&shared]
                .find(RuleKind::DisjointComposition)
                .is_none()
        );
    }

    #[test]
    fn round_trip_restores_chains() {
        let mut updater = RecordingUpdater::default();
        let mut existing = IndexedDisjointnessAxiom::new(AxiomId::from_index(0), &ids(&[1, 2]));
        existing.update_occurrences(&mut updater, 1).unwrap();
        let before = updater.chains.clone();

        let mut axiom = IndexedDisjointnessAxiom::new(AxiomId::from_index(1), &ids(&[2, 2, 1]));
        axiom.update_occurrences(&mut updater, 1).unwrap();
        axiom.update_occurrences(&mut updater, -1).unwrap();
        assert_eq!(updater.chains, before);
    }

    #[test]
    fn failed_registration_changes_nothing() {
        let mut axiom = IndexedDisjointnessAxiom::new(AxiomId::from_index(0), &ids(&[1, 1, 2, 3]));
        let mut updater = RecordingUpdater {
            unknown: Some(EntityId::from_index(3)),
            ..RecordingUpdater::default()
        };
        assert_eq!(
            axiom.update_occurrences(&mut updater, 1),
            Err(IndexError::UnknownEntity(EntityId::from_index(3)))
        );
        assert!(updater.chains.values().all(RuleChain::is_empty));
        assert!(!axiom.occurrences().occurs());
    }

    #[test]
    fn failed_deregistration_changes_nothing() {
        let mut axiom = IndexedDisjointnessAxiom::new(AxiomId::from_index(0), &ids(&[1, 1, 2, 3]));
        let mut updater = RecordingUpdater::default();
        axiom.update_occurrences(&mut updater, 1).unwrap();
        // The composition rule of the last member is lost
        let last = EntityId::from_index(3);
        assert_eq!(
            ChainableRule::disjoint_composition(AxiomId::from_index(0))
                .remove_from(updater.chains.get_mut(&last).unwrap()),
            Some(true)
        );
        let before = updater.chains.clone();

        assert_eq!(
            axiom.update_occurrences(&mut updater, -1),
            Err(IndexError::MissingRule {
                entity: last,
                kind: RuleKind::DisjointComposition
            })
        );
        assert_eq!(updater.chains, before);
        assert_eq!(axiom.occurrences().get(), 1);
    }

    #[test]
    fn large_axioms_are_partitioned() {
        let members = (0..10_000)
            .chain([42, 9_999, 42])
            .collect::<Vec<_>>();
        let axiom = IndexedDisjointnessAxiom::new(AxiomId::from_index(0), &ids(&members));
        assert_eq!(axiom.inconsistent_members(), ids(&[42, 9_999]));
        assert_eq!(axiom.disjoint_members().len(), 9_998);
        assert_eq!(axiom.rendered_members().count(), 10_002);
    }
}
