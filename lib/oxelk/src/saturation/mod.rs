//! Saturation of the contexts: the concurrent fixpoint computation.
//!
//! Each entity scheduled for saturation gets a [`Context`] storing the [`Conclusion`]s derived
//! for it. Workers pull active contexts from a shared queue, insert their pending conclusions
//! and apply the rules each new conclusion triggers, possibly activating other contexts.
//! Saturation is over once no context has pending conclusions.

mod conclusion;
mod context;
mod engine;
mod listener;
mod propagation;
mod queue;
mod state;

pub use crate::saturation::conclusion::{Conclusion, ConclusionKind, Origin, SaturationWriter};
pub use crate::saturation::context::Context;
pub use crate::saturation::engine::{Interrupter, SaturationEngine, SaturationStatus};
pub use crate::saturation::listener::{
    SaturationListener, SaturationStatistics, StatisticsSnapshot,
};
pub use crate::saturation::state::{Generations, SaturationState};
