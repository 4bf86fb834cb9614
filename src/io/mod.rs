//! Input/output helpers.
//!
//! - trial CSV ingest + validation (`ingest`)
//! - comparison report CSVs (`export`)

pub mod export;
pub mod ingest;

pub use export::*;
pub use ingest::*;
