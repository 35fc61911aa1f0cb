use crate::indexing::{AxiomId, EntityId, PropertyId};
use crate::saturation::conclusion::{Conclusion, Origin, PendingConclusion};
use crate::saturation::state::Generations;
use rustc_hash::{FxHashMap, FxHashSet};
use std::collections::VecDeque;

/// The derivation state of one entity, called its root.
#[derive(Debug)]
pub struct Context {
    root: EntityId,
    subsumers: FxHashSet<EntityId>,
    inconsistent: bool,
    /// For each disjointness axiom, its members derived as subsumers
    disjoint_subsumers: FxHashMap<AxiomId, FxHashSet<EntityId>>,
    /// property -> source -> generation of the source when the link was produced
    backward_links: FxHashMap<PropertyId, FxHashMap<EntityId, u64>>,
    /// Other contexts whose conclusions (links excepted) have been inserted here
    contributors: FxHashSet<EntityId>,
    todo: VecDeque<PendingConclusion>,
    active: bool,
}

impl Context {
    pub(crate) fn new(root: EntityId) -> Self {
        Self {
            root,
            subsumers: FxHashSet::default(),
            inconsistent: false,
            disjoint_subsumers: FxHashMap::default(),
            backward_links: FxHashMap::default(),
            contributors: FxHashSet::default(),
            todo: VecDeque::new(),
            active: false,
        }
    }

    #[inline]
    pub fn root(&self) -> EntityId {
        self.root
    }

    /// The entities derived as subsumers of the root.
    pub fn subsumers(&self) -> impl Iterator<Item = EntityId> + '_ {
        self.subsumers.iter().copied()
    }

    #[inline]
    pub fn contains_subsumer(&self, entity: EntityId) -> bool {
        self.subsumers.contains(&entity)
    }

    /// Whether a contradiction has been derived, i.e. the root is unsatisfiable.
    #[inline]
    pub fn is_inconsistent(&self) -> bool {
        self.inconsistent
    }

    /// The members of `axiom` derived as subsumers.
    pub fn disjoint_members(&self, axiom: AxiomId) -> impl Iterator<Item = EntityId> + '_ {
        self.disjoint_subsumers
            .get(&axiom)
            .into_iter()
            .flatten()
            .copied()
    }

    /// All the conclusions stored in this context.
    pub fn conclusions(&self) -> impl Iterator<Item = Conclusion> + '_ {
        let subsumers = self.subsumers().map(Conclusion::Subsumer);
        let contradiction = self.inconsistent.then_some(Conclusion::Contradiction);
        let disjoint = self.disjoint_subsumers.iter().flat_map(|(&axiom, members)| {
            members
                .iter()
                .map(move |&member| Conclusion::DisjointSubsumer { axiom, member })
        });
        let links = self.backward_links.iter().flat_map(|(&property, sources)| {
            sources
                .keys()
                .map(move |&source| Conclusion::BackwardLink { source, property })
        });
        subsumers.chain(contradiction).chain(disjoint).chain(links)
    }

    /// The number of conclusions waiting to be processed.
    #[inline]
    pub fn pending(&self) -> usize {
        self.todo.len()
    }

    /// The sources of the backward links over `property` whose source has not been reset since.
    pub(crate) fn live_backward_links<'a>(
        &'a self,
        property: PropertyId,
        generations: &'a Generations,
    ) -> impl Iterator<Item = EntityId> + 'a {
        self.backward_links
            .get(&property)
            .into_iter()
            .flatten()
            .filter(|(source, generation)| generations.current(**source) == **generation)
            .map(|(source, _)| *source)
    }

    pub(crate) fn all_live_backward_links<'a>(
        &'a self,
        generations: &'a Generations,
    ) -> impl Iterator<Item = (PropertyId, EntityId)> + 'a {
        self.backward_links
            .iter()
            .flat_map(|(&property, sources)| {
                sources
                    .iter()
                    .map(move |(&source, &generation)| (property, source, generation))
            })
            .filter(|(_, source, generation)| generations.current(*source) == *generation)
            .map(|(property, source, _)| (property, source))
    }

    pub(crate) fn contributors(&self) -> impl Iterator<Item = EntityId> + '_ {
        self.contributors.iter().copied()
    }

    /// Whether one of `entities` is a subsumer, derived or pending.
    pub(crate) fn mentions(&self, entities: &FxHashSet<EntityId>) -> bool {
        self.subsumers.iter().any(|subsumer| entities.contains(subsumer))
            || self.todo.iter().any(|pending| {
                matches!(pending.conclusion, Conclusion::Subsumer(subsumer) if entities.contains(&subsumer))
            })
    }

    /// Inserts the conclusion if it is not already there. Returns whether it was new.
    pub(crate) fn insert(&mut self, pending: &PendingConclusion) -> bool {
        let Origin {
            context: origin,
            generation,
        } = pending.origin;
        match pending.conclusion {
            Conclusion::BackwardLink { source, property } => {
                // links are tracked by generation instead of contributors
                self.backward_links
                    .entry(property)
                    .or_default()
                    .insert(source, generation)
                    != Some(generation)
            }
            conclusion => {
                if origin != self.root {
                    self.contributors.insert(origin);
                }
                match conclusion {
                    Conclusion::Subsumer(entity) => self.subsumers.insert(entity),
                    Conclusion::Contradiction => !std::mem::replace(&mut self.inconsistent, true),
                    Conclusion::DisjointSubsumer { axiom, member } => self
                        .disjoint_subsumers
                        .entry(axiom)
                        .or_default()
                        .insert(member),
                    Conclusion::BackwardLink { .. } => false,
                }
            }
        }
    }

    /// Whether `conclusion`, produced from `origin`, would be redundant in this context.
    pub(crate) fn contains(&self, conclusion: &Conclusion, origin: Origin) -> bool {
        match *conclusion {
            Conclusion::Subsumer(entity) => self.subsumers.contains(&entity),
            Conclusion::Contradiction => self.inconsistent,
            Conclusion::DisjointSubsumer { axiom, member } => self
                .disjoint_subsumers
                .get(&axiom)
                .is_some_and(|members| members.contains(&member)),
            Conclusion::BackwardLink { source, property } => self
                .backward_links
                .get(&property)
                .and_then(|sources| sources.get(&source))
                .is_some_and(|generation| *generation == origin.generation),
        }
    }

    pub(crate) fn push(&mut self, pending: PendingConclusion) {
        self.todo.push_back(pending);
    }

    pub(crate) fn poll(&mut self) -> Option<PendingConclusion> {
        self.todo.pop_front()
    }

    /// Marks the context as active. Returns `true` if it was not, in which case the caller must
    /// put the context in the queue of active contexts.
    pub(crate) fn activate(&mut self) -> bool {
        !std::mem::replace(&mut self.active, true)
    }

    pub(crate) fn deactivate(&mut self) {
        self.active = false;
    }

    /// Forgets the backward links and the pending conclusions coming from the `dropped`
    /// contexts.
    pub(crate) fn forget(&mut self, dropped: &FxHashSet<EntityId>) {
        for sources in self.backward_links.values_mut() {
            sources.retain(|source, _| !dropped.contains(source));
        }
        self.backward_links.retain(|_, sources| !sources.is_empty());
        self.todo
            .retain(|pending| !dropped.contains(&pending.origin.context));
    }

    /// Forgets everything derived so far except the backward links accepted by `keep_link`.
    pub(crate) fn reset(&mut self, mut keep_link: impl FnMut(EntityId, u64) -> bool) {
        self.subsumers.clear();
        self.inconsistent = false;
        self.disjoint_subsumers.clear();
        self.contributors.clear();
        self.todo.clear();
        for sources in self.backward_links.values_mut() {
            sources.retain(|source, generation| keep_link(*source, *generation));
        }
        self.backward_links.retain(|_, sources| !sources.is_empty());
    }
}
