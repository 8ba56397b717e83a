//! Stateless foundations of the BFM engine.
//!
//! Everything in this layer is a pure data model or a pure function: the
//! staged polymer system, the bond and direction tables, the occupancy
//! lattice, the position-width abstraction, and the integer hash. Nothing
//! here owns simulation state or performs orchestration.

pub mod models;
pub mod utils;
