//! # Engine Module
//!
//! The stateful logic core of the BFM engine. It turns a staged
//! [`PolymerSystem`](crate::core::models::system::PolymerSystem) into a
//! packed, species-sorted simulation state and drives Monte-Carlo sweeps
//! over it.
//!
//! ## Architecture
//!
//! - **Configuration** ([`config`]) - box geometry, periodicity, layout
//!   alignment, coloring mode, seed, and the staging error surface.
//! - **Coloring** (`coloring`) - partitions the bond graph into species so
//!   that no two bonded monomers ever move in the same parallel substep.
//! - **Layout** (`layout`) - per-species offsets, alignment padding, and
//!   the bijection between loader order and packed order.
//! - **State** (`state`) - the packed arrays, the two occupancy lattices,
//!   and the substep orchestration.
//! - **Tasks** (`tasks`) - the three kernel phases (propose, commit,
//!   settle) and the invariant verifier.
//! - **Lifecycle** ([`simulation`]) - the embeddable staging → initialize →
//!   sweep → cleanup API.
//! - **Progress** ([`progress`]) - callback-based reporting for long runs.
//! - **Errors** ([`error`]) - the typed error surface of the engine.

pub(crate) mod coloring;
pub mod config;
pub mod error;
pub(crate) mod layout;
pub mod progress;
pub mod simulation;
pub(crate) mod state;
pub(crate) mod tasks;

pub use error::EngineError;
pub use simulation::Simulation;
pub use state::SweepStatistics;
pub use tasks::verify::InvariantError;
