//! Domain types used throughout the pipeline.
//!
//! This module defines:
//!
//! - run configuration (`RunConfig`, `RecoveryConfig`, `DataSource`)
//! - behavioral observations (`Trial`, `Dataset`)
//! - candidate identifiers (`ModelKey`, `DdmSpec`)
//! - ranking outputs (`ComparisonTable`, `ComparisonSet`)

pub mod types;

pub use types::*;
