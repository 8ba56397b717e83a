use crate::core::models::bonds::BondSetError;
use crate::core::models::lattice::{Axis, GeometryError};
use crate::core::models::system::TopologyError;
use thiserror::Error;

pub use crate::core::models::bonds::REQUIRED_ALLOWED_BONDS;
pub use crate::core::models::system::MAX_CONNECTIVITY;

/// Alignment of each species region in the packed layout, in monomers.
///
/// Species regions are padded up to a multiple of this value so that
/// warp-wide or SIMD-wide loads never straddle two species.
pub const SPECIES_ALIGNMENT: usize = 32;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error(transparent)]
    Geometry(#[from] GeometryError),

    #[error(transparent)]
    BondSet(#[from] BondSetError),

    #[error(transparent)]
    Topology(#[from] TopologyError),

    #[error(
        "requested periodicity ({requested:?}) does not match the configured one ({configured:?})"
    )]
    PeriodicityMismatch {
        requested: [bool; 3],
        configured: [bool; 3],
    },

    #[error(
        "monomer {index} sits at {value} along {axis:?}, outside the wall range [0, {extent} - 1)"
    )]
    CoordinateOutOfBox {
        index: usize,
        axis: Axis,
        value: i32,
        extent: i32,
    },

    #[error("box size must be staged before the engine can initialize")]
    BoxNotConfigured,

    #[error("monomer count has not been staged")]
    MonomerCountNotConfigured,

    #[error("species alignment must be a non-zero power of two, got {alignment}")]
    BadAlignment { alignment: usize },
}

/// Immutable run configuration, frozen at `initialize`.
///
/// Everything the kernels treat as a constant lives here: box geometry,
/// per-axis periodicity, layout alignment, the coloring mode, the seed of
/// the host-side generator, and whether the invariant verifier runs on the
/// freshly primed state.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SimulationConfig {
    /// Box edge lengths; each must be a power of two.
    pub box_size: [u32; 3],
    /// Per-axis periodicity. A non-periodic axis is bounded by hard walls.
    pub periodic: [bool; 3],
    /// Species-region alignment of the packed layout.
    pub alignment: usize,
    /// Rebalance color populations after the greedy coloring pass.
    pub uniform_coloring: bool,
    /// Run the full invariant verifier on the freshly primed state.
    pub verify_initial: bool,
    /// Seed of the host generator drawing species ids and kernel seeds.
    pub seed: u64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            box_size: [0, 0, 0],
            periodic: [true, true, true],
            alignment: SPECIES_ALIGNMENT,
            uniform_coloring: false,
            verify_initial: true,
            seed: 0,
        }
    }
}

impl SimulationConfig {
    /// Checks that the staged configuration is complete and consistent.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.box_size == [0, 0, 0] {
            return Err(ConfigError::BoxNotConfigured);
        }
        for (axis, extent) in Axis::ALL.into_iter().zip(self.box_size) {
            if !extent.is_power_of_two() {
                return Err(GeometryError::NotPowerOfTwo { axis, extent }.into());
            }
        }
        if !self.alignment.is_power_of_two() {
            return Err(ConfigError::BadAlignment {
                alignment: self.alignment,
            });
        }
        Ok(())
    }
}
