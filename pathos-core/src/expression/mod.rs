//! Avatar expression selection
//!
//! The model is asked to pick one label from a finite candidate set; its answer is
//! validated and replaced by the set's fallback when it doesn't match.

mod catalog;
mod selector;

pub use catalog::{CandidateExpressionSet, normalize_label};
pub use selector::{ExpressionChoice, ExpressionSelector, Selection, parse_selection};
