use crate::error::{IndexError, OccurrenceOwner};

/// How an occurrence counter moves when an axiom or an entity is added to or removed from the index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OccurrenceTransition {
    /// The counter left zero: the owner starts occurring and must register its rules.
    Register,
    /// The counter grew while already positive.
    Increment,
    /// The counter shrank but is still positive.
    Decrement,
    /// The counter reached zero: the owner must deregister its rules.
    Deregister,
    /// The increment was zero.
    Unchanged,
}

/// Counts how many times an axiom or an entity currently occurs in the ontology.
///
/// The counter never changes by itself: [`transition`](Self::transition) computes the next
/// state and the owner stores it once the side effects of the transition have been performed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct OccurrenceCounter(u32);

impl OccurrenceCounter {
    /// The current number of occurrences.
    #[inline]
    pub fn get(self) -> u32 {
        self.0
    }

    /// Whether the owner currently occurs at least once.
    #[inline]
    pub fn occurs(self) -> bool {
        self.0 > 0
    }

    /// Computes the transition caused by `increment` and the resulting counter.
    ///
    /// Returns `None` if the counter would become negative or overflow.
    #[must_use]
    pub fn transition(self, increment: i32) -> Option<(OccurrenceTransition, Self)> {
        let next = self.0.checked_add_signed(increment)?;
        let transition = match (self.0, next) {
            (before, after) if before == after => OccurrenceTransition::Unchanged,
            (0, _) => OccurrenceTransition::Register,
            (_, 0) => OccurrenceTransition::Deregister,
            (before, after) if after > before => OccurrenceTransition::Increment,
            _ => OccurrenceTransition::Decrement,
        };
        Some((transition, Self(next)))
    }

    /// Same as [`transition`](Self::transition), reporting failures as errors about `owner`.
    pub(crate) fn checked_transition(
        self,
        increment: i32,
        owner: impl FnOnce() -> OccurrenceOwner,
    ) -> Result<(OccurrenceTransition, Self), IndexError> {
        self.transition(increment).ok_or_else(|| {
            if increment < 0 {
                IndexError::NegativeOccurrence(owner())
            } else {
                IndexError::OccurrenceOverflow(owner())
            }
        })
    }
}
