//! `ddm-recovery` library crate.
//!
//! The binary (`recov`) is a thin wrapper around this library so that:
//!
//! - the whole fit/compare/report pipeline is testable without spawning processes
//! - alternative candidate sets can be plugged in through `fit::ModelRunner`

pub mod app;
pub mod cli;
pub mod compare;
pub mod data;
pub mod domain;
pub mod error;
pub mod fit;
pub mod inference;
pub mod io;
pub mod math;
pub mod models;
pub mod report;
