use super::lattice::Axis;
use crate::core::utils::hash::wang32;
use nalgebra::Vector3;
use thiserror::Error;

/// Number of entries in the linearized bond-difference table.
pub const BOND_TABLE_LEN: usize = 512;

/// Number of vectors that must be marked allowed before the table is usable.
///
/// The classical bond-fluctuation set contains exactly 108 vectors; any other
/// count after staging is a configuration error.
pub const REQUIRED_ALLOWED_BONDS: usize = 108;

const BASE_VECTORS: [[i32; 3]; 6] = [
    [2, 0, 0],
    [2, 1, 0],
    [2, 1, 1],
    [2, 2, 1],
    [3, 0, 0],
    [3, 1, 0],
];

const PERMUTATIONS: [[usize; 3]; 6] = [
    [0, 1, 2],
    [0, 2, 1],
    [1, 0, 2],
    [1, 2, 0],
    [2, 0, 1],
    [2, 1, 0],
];

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BondSetError {
    #[error("bond vector ({dx}, {dy}, {dz}) has a component outside [-4, 3]")]
    ComponentOutOfRange { dx: i32, dy: i32, dz: i32 },

    #[error(
        "allowed-bond table holds {found} allowed vectors, the model requires exactly {REQUIRED_ALLOWED_BONDS}"
    )]
    WrongAllowedCount { found: usize },
}

/// The tabulated allowed-bond set.
///
/// A bond-difference vector `Δ` with components in `[-4, 3]` maps to the
/// linear index `((Δz & 7) << 6) | ((Δy & 7) << 3) | (Δx & 7)`; the entry
/// says whether a bond with that difference may exist. All entries start
/// forbidden and are staged with [`BondTable::set`] before the engine
/// freezes the table.
#[derive(Debug, Clone)]
pub struct BondTable {
    allowed: [bool; BOND_TABLE_LEN],
}

impl Default for BondTable {
    fn default() -> Self {
        Self {
            allowed: [false; BOND_TABLE_LEN],
        }
    }
}

impl BondTable {
    /// Creates a table with every vector forbidden.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates the classical 108-vector bond-fluctuation set: all signed
    /// permutations of (2,0,0), (2,1,0), (2,1,1), (2,2,1), (3,0,0) and
    /// (3,1,0).
    pub fn classical() -> Self {
        let mut table = Self::new();
        for base in BASE_VECTORS {
            for perm in PERMUTATIONS {
                let v = [base[perm[0]], base[perm[1]], base[perm[2]]];
                for signs in 0..8u8 {
                    let dx = if signs & 1 != 0 { -v[0] } else { v[0] };
                    let dy = if signs & 2 != 0 { -v[1] } else { v[1] };
                    let dz = if signs & 4 != 0 { -v[2] } else { v[2] };
                    table.allowed[Self::linearize(dx, dy, dz)] = true;
                }
            }
        }
        table
    }

    #[inline]
    pub(crate) fn linearize(dx: i32, dy: i32, dz: i32) -> usize {
        (((dz & 7) << 6) | ((dy & 7) << 3) | (dx & 7)) as usize
    }

    /// Marks one bond-difference vector as allowed or forbidden.
    ///
    /// # Arguments
    ///
    /// * `dx`, `dy`, `dz` - The difference vector; each component must lie
    ///   in `[-4, 3]`.
    /// * `allowed` - Whether a bond with this difference may exist.
    ///
    /// # Errors
    ///
    /// Returns [`BondSetError::ComponentOutOfRange`] when a component falls
    /// outside the representable range.
    pub fn set(&mut self, dx: i32, dy: i32, dz: i32, allowed: bool) -> Result<(), BondSetError> {
        let in_range = |v: i32| (-4..=3).contains(&v);
        if !in_range(dx) || !in_range(dy) || !in_range(dz) {
            return Err(BondSetError::ComponentOutOfRange { dx, dy, dz });
        }
        self.allowed[Self::linearize(dx, dy, dz)] = allowed;
        Ok(())
    }

    /// Tests whether the difference vector is an allowed bond.
    ///
    /// Components are masked into the table domain; callers are expected to
    /// pass differences with `|Δ|_∞ ≤ 4`, which is guaranteed for any single
    /// unit move away from a valid bond.
    #[inline]
    pub fn is_allowed(&self, dx: i32, dy: i32, dz: i32) -> bool {
        self.allowed[Self::linearize(dx, dy, dz)]
    }

    /// Number of vectors currently marked allowed.
    pub fn allowed_count(&self) -> usize {
        self.allowed.iter().filter(|&&a| a).count()
    }

    /// Iterates the allowed difference vectors in `(dx, dy, dz)` order.
    pub fn allowed_vectors(&self) -> impl Iterator<Item = (i32, i32, i32)> + '_ {
        (-4..=3).flat_map(move |dz| {
            (-4..=3).flat_map(move |dy| {
                (-4..=3).filter_map(move |dx| self.is_allowed(dx, dy, dz).then_some((dx, dy, dz)))
            })
        })
    }

    /// Checks that the staged table holds exactly the required 108 vectors.
    pub fn validate(&self) -> Result<(), BondSetError> {
        let found = self.allowed_count();
        if found != REQUIRED_ALLOWED_BONDS {
            return Err(BondSetError::WrongAllowedCount { found });
        }
        Ok(())
    }
}

/// Read-only side table of the six canonical unit moves, indexed by
/// direction id: `-x, +x, -y, +y, -z, +z`.
pub const MOVE_VECTORS: [[i32; 3]; 6] = [
    [-1, 0, 0],
    [1, 0, 0],
    [0, -1, 0],
    [0, 1, 0],
    [0, 0, -1],
    [0, 0, 1],
];

/// One of the six face-neighbor move directions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MoveDirection(u8);

impl MoveDirection {
    pub const COUNT: u32 = 6;

    pub fn from_index(index: u8) -> Option<Self> {
        (index < 6).then_some(Self(index))
    }

    #[inline]
    pub fn index(self) -> u8 {
        self.0
    }

    /// Draws the direction for one monomer: `wang32(wang32(m) ^ seed) mod 6`.
    ///
    /// The double hash is bit-identical across runs and platforms, so a
    /// sweep's outcome depends only on the seed stream and the packed
    /// monomer order.
    #[inline]
    pub fn draw(monomer: u32, seed: u32) -> Self {
        Self((wang32(wang32(monomer) ^ seed) % Self::COUNT) as u8)
    }

    #[inline]
    pub fn axis(self) -> Axis {
        match self.0 >> 1 {
            0 => Axis::X,
            1 => Axis::Y,
            _ => Axis::Z,
        }
    }

    /// `-1` for even direction ids, `+1` for odd ones.
    #[inline]
    pub fn sign(self) -> i32 {
        if self.0 & 1 == 1 { 1 } else { -1 }
    }

    #[inline]
    pub fn vector(self) -> Vector3<i32> {
        let v = MOVE_VECTORS[self.0 as usize];
        Vector3::new(v[0], v[1], v[2])
    }

    /// Packs the direction into bits 2-4 of a move-flag byte.
    #[inline]
    pub(crate) fn pack(self) -> u8 {
        self.0 << 2
    }

    /// Recovers the direction from bits 2-4 of a move-flag byte.
    #[inline]
    pub(crate) fn unpack(flag: u8) -> Self {
        let index = (flag >> 2) & 0x07;
        debug_assert!(index < 6);
        Self(index)
    }
}
