//! Candidate drift-diffusion models.
//!
//! Each `ModelKey` names a `DdmSpec`; `CompiledModel` binds a spec to a
//! dataset and exposes the prior, likelihood and simulator the sampler and the
//! comparator need.

pub mod model;

pub use model::*;
