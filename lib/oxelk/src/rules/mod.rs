//! Rules attached to indexed entities.
//!
//! Every rule kind carries a mergeable state so that the contributions of several axioms
//! (or several occurrences of the same sub-expression) share one rule instance per entity.

mod chain;

pub use crate::rules::chain::RuleChain;
use crate::indexing::{AxiomId, EntityId, PropertyId};
use crate::saturation::{Conclusion, Context, Generations, SaturationWriter};
use rustc_hash::{FxHashMap, FxHashSet};
use std::hash::Hash;

/// The kinds of rules that may be attached to an entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RuleKind {
    /// Derives a contradiction: the entity occurs at least twice in a disjointness axiom.
    Contradiction,
    /// Derives the disjointness axioms the entity is a member of.
    DisjointComposition,
    /// Derives the told super-classes of the entity.
    ToldSubsumers,
    /// Derives the conjunctions of the entity with another subsumer.
    ConjunctionComposition,
    /// Derives the existential restrictions the entity is the filler of in the linked contexts.
    ExistentialPropagation,
}

impl RuleKind {
    pub const COUNT: usize = 5;

    pub const ALL: [Self; Self::COUNT] = [
        Self::Contradiction,
        Self::DisjointComposition,
        Self::ToldSubsumers,
        Self::ConjunctionComposition,
        Self::ExistentialPropagation,
    ];

    #[inline]
    pub(crate) fn index(self) -> usize {
        self as usize
    }
}

/// A rule instance together with its merge state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChainableRule {
    /// How many times the entity occurs more than once in a disjointness axiom.
    Contradiction { counter: u32 },
    /// The disjointness axioms the entity occurs exactly once in.
    DisjointComposition { axioms: FxHashSet<AxiomId> },
    /// The told super-classes of the entity, with multiplicities.
    ToldSubsumers { subsumers: FxHashMap<EntityId, u32> },
    /// The `(partner, conjunction)` pairs such that the conjunction is the entity and the partner.
    ConjunctionComposition {
        conjunctions: FxHashMap<(EntityId, EntityId), u32>,
    },
    /// The `(property, existential)` pairs such that the existential is `∃property.entity`.
    ExistentialPropagation {
        existentials: FxHashMap<(PropertyId, EntityId), u32>,
    },
}

impl ChainableRule {
    /// A rule of the given kind without any state.
    pub fn empty(kind: RuleKind) -> Self {
        match kind {
            RuleKind::Contradiction => Self::Contradiction { counter: 0 },
            RuleKind::DisjointComposition => Self::DisjointComposition {
                axioms: FxHashSet::default(),
            },
            RuleKind::ToldSubsumers => Self::ToldSubsumers {
                subsumers: FxHashMap::default(),
            },
            RuleKind::ConjunctionComposition => Self::ConjunctionComposition {
                conjunctions: FxHashMap::default(),
            },
            RuleKind::ExistentialPropagation => Self::ExistentialPropagation {
                existentials: FxHashMap::default(),
            },
        }
    }

    pub fn contradiction() -> Self {
        Self::Contradiction { counter: 1 }
    }

    pub fn disjoint_composition(axiom: AxiomId) -> Self {
        Self::DisjointComposition {
            axioms: [axiom].into_iter().collect(),
        }
    }

    pub fn told_subsumer(subsumer: EntityId) -> Self {
        Self::ToldSubsumers {
            subsumers: [(subsumer, 1)].into_iter().collect(),
        }
    }

    pub fn conjunction_composition(partner: EntityId, conjunction: EntityId) -> Self {
        Self::ConjunctionComposition {
            conjunctions: [((partner, conjunction), 1)].into_iter().collect(),
        }
    }

    pub fn existential_propagation(property: PropertyId, existential: EntityId) -> Self {
        Self::ExistentialPropagation {
            existentials: [((property, existential), 1)].into_iter().collect(),
        }
    }

    pub fn kind(&self) -> RuleKind {
        match self {
            Self::Contradiction { .. } => RuleKind::Contradiction,
            Self::DisjointComposition { .. } => RuleKind::DisjointComposition,
            Self::ToldSubsumers { .. } => RuleKind::ToldSubsumers,
            Self::ConjunctionComposition { .. } => RuleKind::ConjunctionComposition,
            Self::ExistentialPropagation { .. } => RuleKind::ExistentialPropagation,
        }
    }

    /// Whether no axiom contributes to this rule anymore.
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Contradiction { counter } => *counter == 0,
            Self::DisjointComposition { axioms } => axioms.is_empty(),
            Self::ToldSubsumers { subsumers } => subsumers.is_empty(),
            Self::ConjunctionComposition { conjunctions } => conjunctions.is_empty(),
            Self::ExistentialPropagation { existentials } => existentials.is_empty(),
        }
    }

    /// Merges this rule into the rule of the same kind of `chain`.
    ///
    /// Returns whether the chain changed.
    pub fn add_to(&self, chain: &mut RuleChain) -> bool {
        chain.get_or_create(self.kind()).merge(self)
    }

    /// Subtracts this rule from the rule of the same kind of `chain`, erasing it once empty.
    ///
    /// Returns whether the chain changed, or `None` if the chain does not contain the state
    /// being removed. In that case the chain is left untouched.
    #[must_use]
    pub fn remove_from(&self, chain: &mut RuleChain) -> Option<bool> {
        let kind = self.kind();
        let Some(rule) = chain.find_mut(kind) else {
            return self.is_empty().then_some(false);
        };
        let changed = rule.unmerge(self)?;
        if rule.is_empty() {
            chain.remove(kind);
        }
        Some(changed)
    }

    fn merge(&mut self, other: &Self) -> bool {
        match (self, other) {
            (Self::Contradiction { counter }, Self::Contradiction { counter: added }) => {
                *counter += added;
                *added != 0
            }
            (Self::DisjointComposition { axioms }, Self::DisjointComposition { axioms: added }) => {
                let before = axioms.len();
                axioms.extend(added.iter().copied());
                axioms.len() != before
            }
            (Self::ToldSubsumers { subsumers }, Self::ToldSubsumers { subsumers: added }) => {
                merge_counts(subsumers, added)
            }
            (
                Self::ConjunctionComposition { conjunctions },
                Self::ConjunctionComposition {
                    conjunctions: added,
                },
            ) => merge_counts(conjunctions, added),
            (
                Self::ExistentialPropagation { existentials },
                Self::ExistentialPropagation {
                    existentials: added,
                },
            ) => merge_counts(existentials, added),
            // The chain slot is selected by kind: both sides always have the same kind
            _ => false,
        }
    }

    fn unmerge(&mut self, other: &Self) -> Option<bool> {
        match (self, other) {
            (Self::Contradiction { counter }, Self::Contradiction { counter: removed }) => {
                *counter = counter.checked_sub(*removed)?;
                Some(*removed != 0)
            }
            (
                Self::DisjointComposition { axioms },
                Self::DisjointComposition { axioms: removed },
            ) => {
                if !removed.is_subset(axioms) {
                    return None;
                }
                axioms.retain(|axiom| !removed.contains(axiom));
                Some(!removed.is_empty())
            }
            (Self::ToldSubsumers { subsumers }, Self::ToldSubsumers { subsumers: removed }) => {
                unmerge_counts(subsumers, removed)
            }
            (
                Self::ConjunctionComposition { conjunctions },
                Self::ConjunctionComposition {
                    conjunctions: removed,
                },
            ) => unmerge_counts(conjunctions, removed),
            (
                Self::ExistentialPropagation { existentials },
                Self::ExistentialPropagation {
                    existentials: removed,
                },
            ) => unmerge_counts(existentials, removed),
            _ => None,
        }
    }

    /// Applies this rule, attached to `premise`, to a context in which `premise` has just been
    /// derived as a subsumer.
    pub(crate) fn apply(
        &self,
        premise: EntityId,
        context: &Context,
        generations: &Generations,
        writer: &mut impl SaturationWriter,
    ) {
        let root = context.root();
        match self {
            Self::Contradiction { .. } => writer.produce(root, Conclusion::Contradiction),
            Self::DisjointComposition { axioms } => {
                for &axiom in axioms {
                    writer.produce(
                        root,
                        Conclusion::DisjointSubsumer {
                            axiom,
                            member: premise,
                        },
                    );
                }
            }
            Self::ToldSubsumers { subsumers } => {
                for &subsumer in subsumers.keys() {
                    writer.produce(root, Conclusion::Subsumer(subsumer));
                }
            }
            Self::ConjunctionComposition { conjunctions } => {
                for &(partner, conjunction) in conjunctions.keys() {
                    if context.contains_subsumer(partner) {
                        writer.produce(root, Conclusion::Subsumer(conjunction));
                    }
                }
            }
            Self::ExistentialPropagation { existentials } => {
                for &(property, existential) in existentials.keys() {
                    for source in context.live_backward_links(property, generations) {
                        writer.produce(source, Conclusion::Subsumer(existential));
                    }
                }
            }
        }
    }
}

fn merge_counts<K: Copy + Eq + Hash>(
    counts: &mut FxHashMap<K, u32>,
    added: &FxHashMap<K, u32>,
) -> bool {
    let mut changed = false;
    for (&key, &count) in added {
        if count > 0 {
            *counts.entry(key).or_default() += count;
            changed = true;
        }
    }
    changed
}

fn unmerge_counts<K: Copy + Eq + Hash>(
    counts: &mut FxHashMap<K, u32>,
    removed: &FxHashMap<K, u32>,
) -> Option<bool> {
    if removed
        .iter()
        .any(|(key, &count)| counts.get(key).copied().unwrap_or(0) < count)
    {
        return None;
    }
    let mut changed = false;
    for (key, &count) in removed {
        if count == 0 {
            continue;
        }
        changed = true;
        if let Some(current) = counts.get_mut(key) {
            *current -= count;
            if *current == 0 {
                counts.remove(key);
            }
        }
    }
    Some(changed)
}
