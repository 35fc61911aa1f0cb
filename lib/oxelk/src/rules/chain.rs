use crate::rules::{ChainableRule, RuleKind};

/// The rules attached to an entity: at most one [`ChainableRule`] per [`RuleKind`].
///
/// Rules are merged into the chain with [`ChainableRule::add_to`] and subtracted with
/// [`ChainableRule::remove_from`]. A rule whose state becomes empty is erased from the chain.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RuleChain {
    rules: [Option<ChainableRule>; RuleKind::COUNT],
}

impl RuleChain {
    /// Returns the rule of the given kind, creating an empty one if needed.
    pub fn get_or_create(&mut self, kind: RuleKind) -> &mut ChainableRule {
        self.rules[kind.index()].get_or_insert_with(|| ChainableRule::empty(kind))
    }

    /// Returns the rule of the given kind if present.
    #[inline]
    pub fn find(&self, kind: RuleKind) -> Option<&ChainableRule> {
        self.rules[kind.index()].as_ref()
    }

    #[inline]
    pub(crate) fn find_mut(&mut self, kind: RuleKind) -> Option<&mut ChainableRule> {
        self.rules[kind.index()].as_mut()
    }

    /// Erases the rule of the given kind.
    ///
    /// Only rules that no longer carry any state should be erased: the index never calls this
    /// on a rule that some live axiom still contributes to.
    pub fn remove(&mut self, kind: RuleKind) -> Option<ChainableRule> {
        let removed = self.rules[kind.index()].take();
        debug_assert!(
            removed.as_ref().is_none_or(ChainableRule::is_empty),
            "a non-empty {kind:?} rule has been erased"
        );
        removed
    }

    /// Iterates over the rules of this chain, in [`RuleKind`] order.
    pub fn iter(&self) -> impl Iterator<Item = &ChainableRule> {
        self.rules.iter().flatten()
    }

    /// The kinds of the rules present in this chain.
    pub fn kinds(&self) -> impl Iterator<Item = RuleKind> + '_ {
        self.iter().map(ChainableRule::kind)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.iter().count()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.rules.iter().all(Option::is_none)
    }
}
