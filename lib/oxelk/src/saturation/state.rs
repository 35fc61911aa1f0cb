use crate::indexing::{EntityId, EntityRegistry, IndexChanges};
use crate::saturation::conclusion::{Conclusion, Origin, PendingConclusion};
use crate::saturation::context::Context;
use crate::saturation::propagation::propagate;
use crate::saturation::queue::ActiveContexts;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use rustc_hash::{FxBuildHasher, FxHashMap, FxHashSet};
use tracing::debug;

/// The generation of every context, bumped each time the context is reset or dropped.
///
/// Conclusions carry the generation of the context that produced them, so that the ones
/// produced before a reset can be recognized and ignored.
#[derive(Debug, Clone, Default)]
pub struct Generations(FxHashMap<EntityId, u64>);

impl Generations {
    #[inline]
    pub fn current(&self, root: EntityId) -> u64 {
        self.0.get(&root).copied().unwrap_or(0)
    }

    pub(crate) fn bump(&mut self, root: EntityId) -> u64 {
        let generation = self.0.entry(root).or_default();
        *generation += 1;
        *generation
    }

    #[inline]
    pub(crate) fn is_current(&self, origin: Origin) -> bool {
        self.current(origin.context) == origin.generation
    }

    pub(crate) fn forget(&mut self, root: EntityId) {
        self.0.remove(&root);
    }
}

/// All the contexts, shared by the saturation workers, and the queue of the active ones.
///
/// Workers only hold one context entry at a time, and never while pushing to the queue.
#[derive(Debug, Default)]
pub struct SaturationState {
    contexts: DashMap<EntityId, Context, FxBuildHasher>,
    generations: Generations,
    active: ActiveContexts,
}

impl SaturationState {
    pub fn new() -> Self {
        Self::default()
    }

    /// The number of contexts.
    pub fn len(&self) -> usize {
        self.contexts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.contexts.is_empty()
    }

    /// Calls `f` on the context rooted at `root`, if any.
    pub fn with_context<R>(&self, root: EntityId, f: impl FnOnce(&Context) -> R) -> Option<R> {
        self.contexts.get(&root).map(|context| f(&context))
    }

    #[inline]
    pub fn generations(&self) -> &Generations {
        &self.generations
    }

    #[inline]
    pub(crate) fn active(&self) -> &ActiveContexts {
        &self.active
    }

    /// Creates the context of `root` if it does not exist yet.
    ///
    /// Returns whether the context has been created.
    pub(crate) fn schedule(&self, root: EntityId, thing: EntityId) -> bool {
        let activated = match self.contexts.entry(root) {
            Entry::Occupied(_) => return false,
            Entry::Vacant(entry) => {
                let mut context = Context::new(root);
                self.initialize(&mut context, thing);
                entry.insert(context).activate()
            }
        };
        if activated {
            self.active.push(root);
        }
        true
    }

    /// Appends `pending` to the to-do queue of the context rooted at `target`, creating the
    /// context if needed.
    ///
    /// Returns whether the context has been created.
    pub(crate) fn deliver(
        &self,
        target: EntityId,
        pending: PendingConclusion,
        thing: EntityId,
    ) -> bool {
        let mut created = false;
        let activated = {
            let mut context = match self.contexts.entry(target) {
                Entry::Occupied(entry) => entry.into_ref(),
                Entry::Vacant(entry) => {
                    created = true;
                    let mut context = Context::new(target);
                    self.initialize(&mut context, thing);
                    entry.insert(context)
                }
            };
            context.push(pending);
            context.activate()
        };
        if activated {
            self.active.push(target);
        }
        created
    }

    /// Exclusive access to the context rooted at `root`.
    pub(crate) fn get_mut(
        &self,
        root: EntityId,
    ) -> Option<impl std::ops::DerefMut<Target = Context> + '_> {
        self.contexts.get_mut(&root)
    }

    fn initialize(&self, context: &mut Context, thing: EntityId) {
        let origin = Origin {
            context: context.root(),
            generation: self.generations.current(context.root()),
        };
        for conclusion in [
            Conclusion::Subsumer(context.root()),
            Conclusion::Subsumer(thing),
        ] {
            context.push(PendingConclusion { conclusion, origin });
        }
    }

    /// Resets the contexts that may hold conclusions invalidated by `changes`.
    ///
    /// A context is reset if one of its subsumers had its rule chain changed or has been
    /// removed, or if it received conclusions from another reset context. Contexts rooted at
    /// removed entities are dropped, together with their generation and everything they left
    /// in the other contexts. Reset contexts start over from their initial conclusions.
    ///
    /// Returns the number of reset contexts.
    pub(crate) fn invalidate(&mut self, changes: &IndexChanges, thing: EntityId) -> usize {
        if changes.is_empty() {
            return 0;
        }
        let touched = changes
            .changed_chains()
            .chain(changes.removed_entities())
            .collect::<FxHashSet<_>>();

        let mut dependents = FxHashMap::<EntityId, Vec<EntityId>>::default();
        let mut to_reset = Vec::new();
        for context in self.contexts.iter() {
            for contributor in context.contributors() {
                dependents
                    .entry(contributor)
                    .or_default()
                    .push(context.root());
            }
            if context.mentions(&touched) {
                to_reset.push(context.root());
            }
        }
        to_reset.extend(changes.removed_entities());

        let mut reset = FxHashSet::default();
        while let Some(root) = to_reset.pop() {
            if reset.insert(root) {
                to_reset.extend(dependents.get(&root).into_iter().flatten().copied());
            }
        }

        // Ids are never reused: what the dropped contexts produced can be erased for good
        let removed = changes.removed_entities().collect::<FxHashSet<_>>();
        let mut dropped = 0;
        for &root in &removed {
            if self.contexts.remove(&root).is_some() {
                dropped += 1;
            }
            self.generations.forget(root);
            reset.remove(&root);
        }
        if dropped > 0 {
            for mut context in self.contexts.iter_mut() {
                context.forget(&removed);
            }
        }
        for &root in &reset {
            self.generations.bump(root);
        }

        let mut count = 0;
        for &root in &reset {
            let Some(mut context) = self.contexts.get_mut(&root) else {
                continue;
            };
            context.reset(|source, generation| self.generations.current(source) == generation);
            self.initialize(&mut context, thing);
            let activated = context.activate();
            drop(context);
            if activated {
                self.active.push(root);
            }
            count += 1;
        }
        debug!(
            "Invalidated {} chains: {count} contexts reset and {dropped} dropped",
            touched.len()
        );
        count
    }

    /// Counts the conclusions that applying again every rule to every context would add.
    ///
    /// Pending conclusions are counted too: the result is zero exactly at the fixpoint.
    pub fn check_fixpoint(&self, entities: &EntityRegistry) -> usize {
        let mut missing = 0;
        let mut produced = Vec::new();
        for context in self.contexts.iter() {
            missing += context.pending();
            let origin = Origin {
                context: context.root(),
                generation: self.generations.current(context.root()),
            };
            let mut writer = Vec::new();
            for conclusion in context.conclusions() {
                if let Conclusion::BackwardLink { source, property } = conclusion {
                    if !context
                        .live_backward_links(property, &self.generations)
                        .any(|live| live == source)
                    {
                        continue;
                    }
                }
                propagate(&conclusion, &context, entities, &self.generations, &mut writer);
            }
            produced.extend(
                writer
                    .into_iter()
                    .map(|(target, conclusion)| (origin, target, conclusion)),
            );
        }
        // Lookups must happen once the iteration locks are released
        for (origin, target, conclusion) in produced {
            if !self
                .contexts
                .get(&target)
                .is_some_and(|context| context.contains(&conclusion, origin))
            {
                missing += 1;
            }
        }
        missing
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indexing::PropertyId;

    #[test]
    fn dropped_contexts_leave_nothing_behind() {
        let mut state = SaturationState::new();
        let thing = EntityId::from_index(0);
        let dropped = EntityId::from_index(5);
        let kept = EntityId::from_index(6);
        assert!(state.schedule(dropped, thing));
        let origin = Origin {
            context: dropped,
            generation: 0,
        };
        let link = Conclusion::BackwardLink {
            source: dropped,
            property: PropertyId::from_index(0),
        };
        state.deliver(
            kept,
            PendingConclusion {
                conclusion: link,
                origin,
            },
            thing,
        );
        {
            let mut context = state.get_mut(kept).unwrap();
            while let Some(pending) = context.poll() {
                context.insert(&pending);
            }
        }
        state.deliver(
            kept,
            PendingConclusion {
                conclusion: Conclusion::Subsumer(EntityId::from_index(7)),
                origin,
            },
            thing,
        );
        state.generations.bump(dropped);

        let mut changes = IndexChanges::default();
        changes.entity_removed(dropped);
        assert_eq!(state.invalidate(&changes, thing), 0);
        assert_eq!(state.len(), 1);
        assert!(!state.generations.0.contains_key(&dropped));
        state
            .with_context(kept, |context| {
                assert!(!context.conclusions().any(|conclusion| conclusion == link));
                assert_eq!(context.pending(), 0);
            })
            .unwrap();
    }
}
