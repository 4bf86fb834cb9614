//! Data sources other than a trial CSV.

pub mod synthetic;

pub use synthetic::*;
