#![doc = include_str!("../README.md")]
#![deny(unsafe_code)]
#![doc(test(attr(deny(warnings))))]
#![doc(html_favicon_url = "https://raw.githubusercontent.com/oxigraph/oxigraph/main/logo.svg")]
#![doc(html_logo_url = "https://raw.githubusercontent.com/oxigraph/oxigraph/main/logo.svg")]

mod error;
mod expression;
pub mod indexing;
mod reasoner;
pub mod rules;
pub mod saturation;

pub use crate::error::{IndexError, OccurrenceOwner, ReasonerError};
pub use crate::expression::{Axiom, ClassExpression, OWL_NOTHING, OWL_THING};
pub use crate::reasoner::{BufferingMode, Reasoner, ReasonerConfig};
pub use crate::saturation::{
    Conclusion, Interrupter, SaturationListener, SaturationStatus, StatisticsSnapshot,
};
