//! Mathematical utilities: the Wiener first-passage-time model and small
//! numeric helpers.

pub mod stats;
pub mod wiener;

pub use stats::*;
pub use wiener::*;
