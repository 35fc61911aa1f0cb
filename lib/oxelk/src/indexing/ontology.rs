use crate::error::{IndexError, OccurrenceOwner};
use crate::expression::{Axiom, ClassExpression};
use crate::indexing::axiom::{AxiomKey, IndexedAxiom};
use crate::indexing::occurrence::OccurrenceTransition;
use crate::indexing::{AxiomId, ChainUpdater, EntityId, EntityRegistry, IndexChanges};
use rustc_hash::FxHashMap;
use std::collections::BTreeMap;
use tracing::debug;

/// The indexed ontology: the entities with their rule chains and the axioms occurring in it.
///
/// Adding and removing axioms updates the occurrence counters of the axioms and of their
/// entities, and attaches or detaches rules when they cross zero.
#[derive(Debug, Clone, Default)]
pub struct OntologyIndex {
    entities: EntityRegistry,
    axioms: BTreeMap<AxiomId, IndexedAxiom>,
    axiom_ids: FxHashMap<AxiomKey, AxiomId>,
    next_axiom: usize,
}

/// An axiom the index knows how to register.
enum ElementaryAxiom<'a> {
    SubClassOf(&'a ClassExpression, &'a ClassExpression),
    Disjointness(&'a [ClassExpression]),
}

fn elementary_axioms(axiom: &Axiom) -> Vec<ElementaryAxiom<'_>> {
    match axiom {
        Axiom::SubClassOf {
            sub_class,
            super_class,
        } => vec![ElementaryAxiom::SubClassOf(sub_class, super_class)],
        Axiom::EquivalentClasses(classes) => {
            let Some((first, others)) = classes.split_first() else {
                return Vec::new();
            };
            others
                .iter()
                .flat_map(|other| {
                    [
                        ElementaryAxiom::SubClassOf(first, other),
                        ElementaryAxiom::SubClassOf(other, first),
                    ]
                })
                .collect()
        }
        Axiom::DisjointClasses(classes) => vec![ElementaryAxiom::Disjointness(classes)],
    }
}

impl OntologyIndex {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn entities(&self) -> &EntityRegistry {
        &self.entities
    }

    pub fn axiom(&self, id: AxiomId) -> Option<&IndexedAxiom> {
        self.axioms.get(&id)
    }

    /// The axioms currently occurring.
    pub fn axioms(&self) -> impl Iterator<Item = &IndexedAxiom> {
        self.axioms.values()
    }

    /// Adds one occurrence of `axiom`, recording the affected entities in `changes`.
    pub fn add_axiom(
        &mut self,
        axiom: &Axiom,
        changes: &mut IndexChanges,
    ) -> Result<(), IndexError> {
        let Self {
            entities,
            axioms,
            axiom_ids,
            next_axiom,
        } = self;
        for elementary in elementary_axioms(axiom) {
            let key = match elementary {
                ElementaryAxiom::SubClassOf(sub_class, super_class) => AxiomKey::SubClassOf {
                    sub_class: entities.insert(sub_class, changes)?,
                    super_class: entities.insert(super_class, changes)?,
                },
                ElementaryAxiom::Disjointness(members) => AxiomKey::Disjointness(
                    members
                        .iter()
                        .map(|member| entities.insert(member, changes))
                        .collect::<Result<_, _>>()?,
                ),
            };
            let id = match axiom_ids.get(&key) {
                Some(id) => *id,
                None => {
                    let id = AxiomId::try_from_index(*next_axiom)
                        .ok_or(IndexError::IdSpaceExhausted("axiom"))?;
                    *next_axiom += 1;
                    axioms.insert(id, IndexedAxiom::new(id, &key));
                    axiom_ids.insert(key, id);
                    id
                }
            };
            let indexed = axioms
                .get_mut(&id)
                .ok_or(IndexError::NegativeOccurrence(OccurrenceOwner::Axiom(id)))?;
            let transition =
                indexed.update_occurrences(&mut ChainUpdater::new(entities, changes), 1)?;
            if transition == OccurrenceTransition::Register {
                debug!("Registered {}", indexed.display(entities));
            }
        }
        Ok(())
    }

    /// Removes one occurrence of `axiom`, recording the affected entities in `changes`.
    ///
    /// Fails without modifying the index if `axiom` does not occur.
    pub fn remove_axiom(
        &mut self,
        axiom: &Axiom,
        changes: &mut IndexChanges,
    ) -> Result<(), IndexError> {
        let unindexed =
            || IndexError::NegativeOccurrence(OccurrenceOwner::UnindexedAxiom(axiom.to_string()));
        let Self {
            entities,
            axioms,
            axiom_ids,
            ..
        } = self;

        // Everything is resolved and checked before the first mutation
        let mut removals = Vec::new();
        let mut needed = FxHashMap::<AxiomId, u32>::default();
        let mut all_plans = Vec::new();
        for elementary in elementary_axioms(axiom) {
            let mut plan = Vec::new();
            let key = match elementary {
                ElementaryAxiom::SubClassOf(sub_class, super_class) => AxiomKey::SubClassOf {
                    sub_class: entities
                        .release_plan(sub_class, &mut plan)
                        .ok_or_else(unindexed)?,
                    super_class: entities
                        .release_plan(super_class, &mut plan)
                        .ok_or_else(unindexed)?,
                },
                ElementaryAxiom::Disjointness(members) => AxiomKey::Disjointness(
                    members
                        .iter()
                        .map(|member| entities.release_plan(member, &mut plan))
                        .collect::<Option<Vec<EntityId>>>()
                        .ok_or_else(unindexed)?,
                ),
            };
            let id = *axiom_ids.get(&key).ok_or_else(unindexed)?;
            *needed.entry(id).or_default() += 1;
            all_plans.extend_from_slice(&plan);
            removals.push((id, key, plan));
        }
        for (id, count) in needed {
            let occurrences = axioms
                .get(&id)
                .map_or(0, |axiom| axiom.occurrences().get());
            if occurrences < count {
                return Err(IndexError::NegativeOccurrence(OccurrenceOwner::Axiom(id)));
            }
        }
        entities.check_release(&all_plans)?;

        for (id, key, plan) in removals {
            let indexed = axioms
                .get_mut(&id)
                .ok_or(IndexError::NegativeOccurrence(OccurrenceOwner::Axiom(id)))?;
            let transition =
                indexed.update_occurrences(&mut ChainUpdater::new(entities, changes), -1)?;
            if transition == OccurrenceTransition::Deregister {
                debug!("Deregistered {}", indexed.display(entities));
                axiom_ids.remove(&key);
                axioms.remove(&id);
            }
            entities.release(&plan, changes)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::RuleKind;
    use oxrdf::NamedNode;

    fn class(name: &str) -> ClassExpression {
        ClassExpression::class(NamedNode::new_unchecked(format!("http://example.com/{name}")))
    }

    fn chains(index: &OntologyIndex) -> Vec<(EntityId, Vec<RuleKind>, u32)> {
        index
            .entities()
            .iter()
            .map(|(id, entity)| {
                (
                    id,
                    entity.chain().kinds().collect(),
                    entity.occurrences().get(),
                )
            })
            .collect()
    }

    #[test]
    fn equivalence_is_two_inclusions() {
        let mut index = OntologyIndex::new();
        let mut changes = IndexChanges::default();
        index
            .add_axiom(
                &Axiom::equivalent_classes([class("A"), class("B"), class("C")]),
                &mut changes,
            )
            .unwrap();
        assert_eq!(index.axioms().count(), 4);
        let a = index.entities().lookup(&class("A")).unwrap();
        assert_eq!(index.entities().get(a).unwrap().occurrences().get(), 4);
    }

    #[test]
    fn equal_axioms_share_registration() {
        let mut index = OntologyIndex::new();
        let mut changes = IndexChanges::default();
        let axiom = Axiom::disjoint_classes([class("A"), class("B")]);
        index.add_axiom(&axiom, &mut changes).unwrap();
        index.add_axiom(&axiom, &mut changes).unwrap();
        assert_eq!(index.axioms().count(), 1);
        assert_eq!(
            index.axioms().next().map(|axiom| axiom.occurrences().get()),
            Some(2)
        );
        index.remove_axiom(&axiom, &mut changes).unwrap();
        let a = index.entities().lookup(&class("A")).unwrap();
        assert!(
            index
                .entities()
                .get(a)
                .unwrap()
                .chain()
                .find(RuleKind::DisjointComposition)
                .is_some()
        );
    }

    #[test]
    fn round_trip_restores_the_index() {
        let mut index = OntologyIndex::new();
        let mut changes = IndexChanges::default();
        index
            .add_axiom(&Axiom::subclass_of(class("A"), class("B")), &mut changes)
            .unwrap();
        let before = chains(&index);

        let axiom = Axiom::subclass_of(
            class("A"),
            ClassExpression::intersection([class("B"), class("C")]),
        );
        index.add_axiom(&axiom, &mut changes).unwrap();
        assert_ne!(chains(&index), before);
        index.remove_axiom(&axiom, &mut changes).unwrap();
        assert_eq!(chains(&index), before);
        assert_eq!(index.axioms().count(), 1);
    }

    #[test]
    fn churn_does_not_grow_the_index() {
        let mut index = OntologyIndex::new();
        let mut changes = IndexChanges::default();
        index
            .add_axiom(&Axiom::subclass_of(class("A"), class("B")), &mut changes)
            .unwrap();
        let axiom = Axiom::disjoint_classes([class("B"), class("C")]);
        for _ in 0..1000 {
            index.add_axiom(&axiom, &mut changes).unwrap();
            index.remove_axiom(&axiom, &mut changes).unwrap();
        }
        assert_eq!(index.axioms.len(), 1);
        assert_eq!(index.axiom_ids.len(), 1);
        assert_eq!(index.entities().len(), 4);
    }

    #[test]
    fn removing_an_absent_axiom_fails_cleanly() {
        let mut index = OntologyIndex::new();
        let mut changes = IndexChanges::default();
        index
            .add_axiom(&Axiom::subclass_of(class("A"), class("B")), &mut changes)
            .unwrap();
        index
            .add_axiom(&Axiom::subclass_of(class("A"), class("A")), &mut changes)
            .unwrap();
        let before = chains(&index);

        let absent = Axiom::subclass_of(class("B"), class("A"));
        assert_eq!(
            index.remove_axiom(&absent, &mut changes),
            Err(IndexError::NegativeOccurrence(
                OccurrenceOwner::UnindexedAxiom(absent.to_string())
            ))
        );
        // Indexed as A ⊑ A twice while it only occurs once
        assert!(matches!(
            index.remove_axiom(
                &Axiom::equivalent_classes([class("A"), class("A")]),
                &mut changes
            ),
            Err(IndexError::NegativeOccurrence(OccurrenceOwner::Axiom(_)))
        ));
        assert_eq!(chains(&index), before);
        assert_eq!(index.axioms().count(), 2);
    }
}
