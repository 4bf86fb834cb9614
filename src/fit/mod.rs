//! Model fitting orchestration.
//!
//! Responsibilities:
//!
//! - run one MCMC chain for a compiled candidate (`sampler`)
//! - hold per-chain results and aggregate them for DIC (`fitted`)
//! - pair every `ModelKey` with its fitting routine (`registry`)
//! - fit all candidates in parallel and build inference summaries (`orchestrator`)

pub mod fitted;
pub mod orchestrator;
pub mod registry;
pub mod sampler;

pub use fitted::*;
pub use orchestrator::*;
pub use registry::*;
pub use sampler::*;
