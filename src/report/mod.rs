//! Reporting utilities: human-readable summaries of data and rankings.

pub mod format;

pub use format::*;
