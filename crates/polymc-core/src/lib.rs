//! # PolyMC Core Library
//!
//! A high-performance, data-parallel Monte-Carlo engine for the
//! bond-fluctuation model (BFM) of dense lattice polymers.
//!
//! ## Architectural Philosophy
//!
//! The library is designed with a strict three-layer architecture to ensure a
//! clear separation of concerns, making it modular, testable, and extensible.
//!
//! - **[`core`]: The Foundation.** Contains stateless data models (the
//!   staged [`PolymerSystem`](core::models::system::PolymerSystem), the
//!   allowed-bond and move-direction tables, the power-of-two occupancy
//!   [`Lattice`](core::models::lattice::Lattice)) and pure utilities such as
//!   the integer hash that drives move selection.
//!
//! - **[`engine`]: The Logic Core.** This stateful layer orchestrates the
//!   simulation. It colors the bond graph into conflict-free species, packs
//!   monomers into a sorted, padded layout, and drives the three-phase
//!   propose → commit → settle kernel pipeline that performs lockless yet
//!   correct concurrent moves on the shared lattice.
//!
//! - **[`workflows`]: The Public API.** The highest-level, user-facing layer.
//!   It ties `engine` and `core` together into complete procedures such as
//!   running an equilibration with progress reporting and periodic invariant
//!   verification, plus the standard polymer observables.

pub mod core;
pub mod engine;
pub mod workflows;
