//! Inference summaries: the standardized per-model container consumed by the
//! comparator, plus convergence diagnostics.

pub mod diagnostics;
pub mod summary;

pub use diagnostics::*;
pub use summary::*;
