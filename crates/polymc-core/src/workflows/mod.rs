//! User-facing procedures built on top of the engine.
//!
//! - [`run`] - stage, initialize, sweep and verify a system in one call,
//!   with progress reporting.
//! - [`analysis`] - standard polymer observables over committed positions.

pub mod analysis;
pub mod run;

pub use run::{RunConfig, RunReport, run};
