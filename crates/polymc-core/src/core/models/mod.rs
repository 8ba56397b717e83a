//! Data models for lattice polymers.
//!
//! - [`position`] - the compile-time choice of lattice-integer width.
//! - [`bonds`] - the tabulated allowed-bond set and the six unit moves.
//! - [`lattice`] - power-of-two box geometry and byte occupancy grids.
//! - [`system`] - the staged, loader-order polymer system.

pub mod bonds;
pub mod lattice;
pub mod position;
pub mod system;
