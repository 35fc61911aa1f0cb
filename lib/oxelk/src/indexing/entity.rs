use crate::error::{IndexError, OccurrenceOwner};
use crate::expression::{ClassExpression, OWL_NOTHING, OWL_THING};
use crate::indexing::occurrence::{OccurrenceCounter, OccurrenceTransition};
use crate::indexing::{EntityId, IndexChanges, PropertyId};
use crate::rules::{ChainableRule, RuleChain};
use oxrdf::{NamedNode, NamedNodeRef};
use rustc_hash::FxHashMap;
use std::collections::BTreeMap;
use std::fmt;
use tracing::trace;

/// The canonical form of a class expression, built over the ids of its sub-expressions.
///
/// Two structurally equal class expressions get the same [`EntityId`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum IndexedClassExpression {
    Class(NamedNode),
    /// A binary intersection, the smallest id first.
    Intersection(EntityId, EntityId),
    Existential {
        property: PropertyId,
        filler: EntityId,
    },
}

/// An entry of the [`EntityRegistry`].
#[derive(Debug, Clone)]
pub struct IndexedEntity {
    expression: IndexedClassExpression,
    occurrences: OccurrenceCounter,
    chain: RuleChain,
    pinned: bool,
}

impl IndexedEntity {
    #[inline]
    pub fn expression(&self) -> &IndexedClassExpression {
        &self.expression
    }

    /// How many times the entity occurs in the indexed axioms, sub-expressions included.
    #[inline]
    pub fn occurrences(&self) -> OccurrenceCounter {
        self.occurrences
    }

    #[inline]
    pub fn chain(&self) -> &RuleChain {
        &self.chain
    }
}

/// The hash-consed entities of the ontology.
///
/// An entity lives as long as it occurs in some indexed axiom, except `owl:Thing` and
/// `owl:Nothing` that are always there. Only live entities are stored.
#[derive(Debug, Clone)]
pub struct EntityRegistry {
    entities: BTreeMap<EntityId, IndexedEntity>,
    ids: FxHashMap<IndexedClassExpression, EntityId>,
    next_entity: usize,
    properties: Vec<NamedNode>,
    property_ids: FxHashMap<NamedNode, PropertyId>,
    thing: EntityId,
    nothing: EntityId,
}

impl Default for EntityRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl EntityRegistry {
    pub fn new() -> Self {
        let thing = EntityId(0);
        let nothing = EntityId(1);
        let mut registry = Self {
            entities: BTreeMap::new(),
            ids: FxHashMap::default(),
            next_entity: 2,
            properties: Vec::new(),
            property_ids: FxHashMap::default(),
            thing,
            nothing,
        };
        registry.store(thing, IndexedClassExpression::Class(OWL_THING.into_owned()), true);
        registry.store(nothing, IndexedClassExpression::Class(OWL_NOTHING.into_owned()), true);
        registry
    }

    fn allocate(&mut self, expression: IndexedClassExpression) -> Result<EntityId, IndexError> {
        let id = EntityId::try_from_index(self.next_entity)
            .ok_or(IndexError::IdSpaceExhausted("entity"))?;
        self.next_entity += 1;
        self.store(id, expression, false);
        Ok(id)
    }

    fn store(&mut self, id: EntityId, expression: IndexedClassExpression, pinned: bool) {
        self.ids.insert(expression.clone(), id);
        self.entities.insert(
            id,
            IndexedEntity {
                expression,
                occurrences: OccurrenceCounter::default(),
                chain: RuleChain::default(),
                pinned,
            },
        );
    }

    /// `owl:Thing`
    #[inline]
    pub fn thing(&self) -> EntityId {
        self.thing
    }

    /// `owl:Nothing`
    #[inline]
    pub fn nothing(&self) -> EntityId {
        self.nothing
    }

    #[inline]
    pub fn get(&self, id: EntityId) -> Option<&IndexedEntity> {
        self.entities.get(&id)
    }

    fn get_mut(&mut self, id: EntityId) -> Result<&mut IndexedEntity, IndexError> {
        self.entities
            .get_mut(&id)
            .ok_or(IndexError::UnknownEntity(id))
    }

    /// The id of a named class, if it is indexed.
    pub fn class_id(&self, class: NamedNodeRef<'_>) -> Option<EntityId> {
        self.ids
            .get(&IndexedClassExpression::Class(class.into_owned()))
            .copied()
    }

    #[inline]
    pub fn property(&self, id: PropertyId) -> Option<NamedNodeRef<'_>> {
        self.properties.get(id.index()).map(NamedNode::as_ref)
    }

    pub fn property_id(&self, property: NamedNodeRef<'_>) -> Option<PropertyId> {
        self.property_ids.get(&property.into_owned()).copied()
    }

    /// The live entities, by increasing id.
    pub fn iter(&self) -> impl Iterator<Item = (EntityId, &IndexedEntity)> {
        self.entities.iter().map(|(id, entity)| (*id, entity))
    }

    /// The live named classes, `owl:Thing` and `owl:Nothing` included.
    pub fn named_classes(&self) -> impl Iterator<Item = (EntityId, NamedNodeRef<'_>)> {
        self.iter().filter_map(|(id, entity)| match &entity.expression {
            IndexedClassExpression::Class(iri) => Some((id, iri.as_ref())),
            IndexedClassExpression::Intersection(..)
            | IndexedClassExpression::Existential { .. } => None,
        })
    }

    /// The number of live entities.
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Renders an entity in functional-style syntax.
    pub fn display(&self, id: EntityId) -> DisplayEntity<'_> {
        DisplayEntity { registry: self, id }
    }

    /// The id of an already indexed class expression.
    pub fn lookup(&self, expression: &ClassExpression) -> Option<EntityId> {
        match expression {
            ClassExpression::Class(iri) => self
                .ids
                .get(&IndexedClassExpression::Class(iri.clone()))
                .copied(),
            ClassExpression::ObjectIntersectionOf(operands) => {
                let mut result = None;
                for operand in operands {
                    let operand = self.lookup(operand)?;
                    result = Some(match result {
                        None => operand,
                        Some(previous) => self.lookup_conjunction(previous, operand)?,
                    });
                }
                Some(result.unwrap_or(self.thing))
            }
            ClassExpression::ObjectSomeValuesFrom { property, filler } => {
                let filler = self.lookup(filler)?;
                let property = self.property_id(property.as_ref())?;
                self.ids
                    .get(&IndexedClassExpression::Existential { property, filler })
                    .copied()
            }
        }
    }

    fn lookup_conjunction(&self, first: EntityId, second: EntityId) -> Option<EntityId> {
        if first == second {
            return Some(first);
        }
        self.ids
            .get(&IndexedClassExpression::Intersection(
                first.min(second),
                first.max(second),
            ))
            .copied()
    }

    /// Indexes one occurrence of `expression`, sub-expressions first.
    pub(crate) fn insert(
        &mut self,
        expression: &ClassExpression,
        changes: &mut IndexChanges,
    ) -> Result<EntityId, IndexError> {
        match expression {
            ClassExpression::Class(iri) => {
                self.occur(IndexedClassExpression::Class(iri.clone()), changes)
            }
            ClassExpression::ObjectIntersectionOf(operands) => {
                let mut result: Option<EntityId> = None;
                for operand in operands {
                    let operand = self.insert(operand, changes)?;
                    result = Some(match result {
                        None => operand,
                        Some(previous) if previous == operand => operand,
                        Some(previous) => self.occur(
                            IndexedClassExpression::Intersection(
                                previous.min(operand),
                                previous.max(operand),
                            ),
                            changes,
                        )?,
                    });
                }
                match result {
                    Some(result) => Ok(result),
                    None => self.occur(
                        IndexedClassExpression::Class(OWL_THING.into_owned()),
                        changes,
                    ),
                }
            }
            ClassExpression::ObjectSomeValuesFrom { property, filler } => {
                let filler = self.insert(filler, changes)?;
                let property = self.intern_property(property)?;
                self.occur(
                    IndexedClassExpression::Existential { property, filler },
                    changes,
                )
            }
        }
    }

    fn intern_property(&mut self, property: &NamedNode) -> Result<PropertyId, IndexError> {
        if let Some(id) = self.property_ids.get(property) {
            return Ok(*id);
        }
        let id = PropertyId::try_from_index(self.properties.len())
            .ok_or(IndexError::IdSpaceExhausted("property"))?;
        self.properties.push(property.clone());
        self.property_ids.insert(property.clone(), id);
        Ok(id)
    }

    fn occur(
        &mut self,
        expression: IndexedClassExpression,
        changes: &mut IndexChanges,
    ) -> Result<EntityId, IndexError> {
        let id = match self.ids.get(&expression) {
            Some(id) => *id,
            None => self.allocate(expression)?,
        };
        let entity = self.get_mut(id)?;
        let (transition, occurrences) = entity
            .occurrences
            .checked_transition(1, || OccurrenceOwner::Entity(id))?;
        entity.occurrences = occurrences;
        if transition == OccurrenceTransition::Register {
            for (target, rule) in self.intrinsic_rules(id)? {
                self.add_rule(target, &rule, changes)?;
            }
            trace!("Indexed {}", self.display(id));
        }
        Ok(id)
    }

    /// The rules an entity attaches to its sub-expressions for as long as it lives.
    fn intrinsic_rules(&self, id: EntityId) -> Result<Vec<(EntityId, ChainableRule)>, IndexError> {
        let entity = self.get(id).ok_or(IndexError::UnknownEntity(id))?;
        Ok(match entity.expression {
            IndexedClassExpression::Class(_) => Vec::new(),
            IndexedClassExpression::Intersection(first, second) => vec![
                (first, ChainableRule::conjunction_composition(second, id)),
                (second, ChainableRule::conjunction_composition(first, id)),
            ],
            IndexedClassExpression::Existential { property, filler } => {
                vec![(filler, ChainableRule::existential_propagation(property, id))]
            }
        })
    }

    /// Appends to `plan` the entities releasing one occurrence of `expression` decrements,
    /// every entity before its sub-expressions.
    ///
    /// Returns `None` if the expression is not indexed.
    pub(crate) fn release_plan(
        &self,
        expression: &ClassExpression,
        plan: &mut Vec<EntityId>,
    ) -> Option<EntityId> {
        match expression {
            ClassExpression::Class(_) => {
                let id = self.lookup(expression)?;
                plan.push(id);
                Some(id)
            }
            ClassExpression::ObjectIntersectionOf(operands) => {
                let mut operand_plan = Vec::new();
                let mut conjunctions = Vec::new();
                let mut result = None;
                for operand in operands {
                    let operand = self.release_plan(operand, &mut operand_plan)?;
                    result = Some(match result {
                        None => operand,
                        Some(previous) if previous == operand => operand,
                        Some(previous) => {
                            let conjunction = self.lookup_conjunction(previous, operand)?;
                            conjunctions.push(conjunction);
                            conjunction
                        }
                    });
                }
                let Some(result) = result else {
                    plan.push(self.thing);
                    return Some(self.thing);
                };
                plan.extend(conjunctions.into_iter().rev());
                plan.extend(operand_plan);
                Some(result)
            }
            ClassExpression::ObjectSomeValuesFrom { filler, .. } => {
                let id = self.lookup(expression)?;
                plan.push(id);
                self.release_plan(filler, plan)?;
                Some(id)
            }
        }
    }

    /// Checks that every entity of `plan` occurs at least as many times as it is listed.
    pub(crate) fn check_release(&self, plan: &[EntityId]) -> Result<(), IndexError> {
        let mut needed = FxHashMap::<EntityId, u32>::default();
        for id in plan {
            *needed.entry(*id).or_default() += 1;
        }
        for (id, count) in needed {
            let entity = self.get(id).ok_or(IndexError::UnknownEntity(id))?;
            if entity.occurrences.get() < count {
                return Err(IndexError::NegativeOccurrence(OccurrenceOwner::Entity(id)));
            }
        }
        Ok(())
    }

    /// Releases one occurrence of each entity of `plan`, in order, removing the entities that
    /// do not occur anymore.
    pub(crate) fn release(
        &mut self,
        plan: &[EntityId],
        changes: &mut IndexChanges,
    ) -> Result<(), IndexError> {
        for &id in plan {
            let entity = self.get_mut(id)?;
            let (transition, occurrences) = entity
                .occurrences
                .checked_transition(-1, || OccurrenceOwner::Entity(id))?;
            entity.occurrences = occurrences;
            if transition != OccurrenceTransition::Deregister || entity.pinned {
                continue;
            }
            for (target, rule) in self.intrinsic_rules(id)? {
                self.remove_rule(target, &rule, changes)?;
            }
            trace!("Removed {}", self.display(id));
            if let Some(entity) = self.entities.remove(&id) {
                debug_assert!(
                    entity.chain.is_empty(),
                    "removed entity {id} still has rules"
                );
                self.ids.remove(&entity.expression);
            }
            changes.entity_removed(id);
        }
        Ok(())
    }

    pub(crate) fn add_rule(
        &mut self,
        id: EntityId,
        rule: &ChainableRule,
        changes: &mut IndexChanges,
    ) -> Result<bool, IndexError> {
        let changed = rule.add_to(&mut self.get_mut(id)?.chain);
        if changed {
            changes.chain_changed(id);
        }
        Ok(changed)
    }

    pub(crate) fn remove_rule(
        &mut self,
        id: EntityId,
        rule: &ChainableRule,
        changes: &mut IndexChanges,
    ) -> Result<bool, IndexError> {
        let changed = rule
            .remove_from(&mut self.get_mut(id)?.chain)
            .ok_or(IndexError::MissingRule {
                entity: id,
                kind: rule.kind(),
            })?;
        if changed {
            changes.chain_changed(id);
        }
        Ok(changed)
    }
}

/// Renders an entity of an [`EntityRegistry`] in functional-style syntax.
///
/// Removed entities are rendered as their id.
#[derive(Clone, Copy)]
pub struct DisplayEntity<'a> {
    registry: &'a EntityRegistry,
    id: EntityId,
}

impl fmt::Display for DisplayEntity<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Some(entity) = self.registry.get(self.id) else {
            return write!(f, "{}", self.id);
        };
        match &entity.expression {
            IndexedClassExpression::Class(iri) => write!(f, "{iri}"),
            IndexedClassExpression::Intersection(first, second) => write!(
                f,
                "ObjectIntersectionOf({} {})",
                self.registry.display(*first),
                self.registry.display(*second)
            ),
            IndexedClassExpression::Existential { property, filler } => {
                match self.registry.property(*property) {
                    Some(iri) => write!(f, "ObjectSomeValuesFrom({iri} ")?,
                    None => write!(f, "ObjectSomeValuesFrom({property} ")?,
                }
                write!(f, "{})", self.registry.display(*filler))
            }
        }
    }
}
