use super::bonds::MoveDirection;
use std::sync::atomic::{AtomicU8, Ordering};
use thiserror::Error;

/// A coordinate axis of the simulation box.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Axis {
    X,
    Y,
    Z,
}

impl Axis {
    pub const ALL: [Axis; 3] = [Axis::X, Axis::Y, Axis::Z];

    #[inline]
    pub fn as_index(self) -> usize {
        match self {
            Axis::X => 0,
            Axis::Y => 1,
            Axis::Z => 2,
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GeometryError {
    #[error("box edge along {axis:?} is {extent}; every edge must be a power of two")]
    NotPowerOfTwo { axis: Axis, extent: u32 },
}

/// Edge lengths of the periodic box plus the derived bit-arithmetic
/// constants used for lattice indexing.
///
/// All edges are powers of two, so folding a (possibly negative, possibly
/// drifted) coordinate into the box is a single bitwise AND, and the linear
/// cell index is an OR of three shifted terms.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoxDimensions {
    extents: [i32; 3],
    masks: [i32; 3],
    shift_y: u32,
    shift_z: u32,
}

impl BoxDimensions {
    /// Builds the derived constants for a `bx × by × bz` box.
    ///
    /// # Errors
    ///
    /// Returns [`GeometryError::NotPowerOfTwo`] when any edge is zero or not
    /// a power of two.
    pub fn new(bx: u32, by: u32, bz: u32) -> Result<Self, GeometryError> {
        for (axis, extent) in Axis::ALL.into_iter().zip([bx, by, bz]) {
            if !extent.is_power_of_two() {
                return Err(GeometryError::NotPowerOfTwo { axis, extent });
            }
        }
        Ok(Self {
            extents: [bx as i32, by as i32, bz as i32],
            masks: [bx as i32 - 1, by as i32 - 1, bz as i32 - 1],
            shift_y: bx.trailing_zeros(),
            shift_z: bx.trailing_zeros() + by.trailing_zeros(),
        })
    }

    #[inline]
    pub fn extent(&self, axis: Axis) -> i32 {
        self.extents[axis.as_index()]
    }

    #[inline]
    pub fn volume(&self) -> usize {
        (self.extents[0] as usize) * (self.extents[1] as usize) * (self.extents[2] as usize)
    }

    /// Folds a coordinate into `[0, extent)` along one axis.
    #[inline]
    pub fn fold(&self, axis: Axis, value: i32) -> i32 {
        value & self.masks[axis.as_index()]
    }

    #[inline]
    fn term_x(&self, x: i32) -> usize {
        (x & self.masks[0]) as usize
    }

    #[inline]
    fn term_y(&self, y: i32) -> usize {
        ((y & self.masks[1]) as usize) << self.shift_y
    }

    #[inline]
    fn term_z(&self, z: i32) -> usize {
        ((z & self.masks[2]) as usize) << self.shift_z
    }

    /// Linear cell index of the (folded) coordinate.
    #[inline]
    pub fn index(&self, x: i32, y: i32, z: i32) -> usize {
        self.term_x(x) | self.term_y(y) | self.term_z(z)
    }
}

/// A byte occupancy grid over the box.
///
/// Cells hold 0 (empty) or 1 (occupied by a monomer's lower-front-left
/// corner). Writes during a kernel are idempotent stores of a constant, so
/// all accesses go through relaxed atomics; the barrier at the end of each
/// kernel phase provides the cross-worker visibility the move protocol
/// relies on.
pub struct Lattice {
    dims: BoxDimensions,
    cells: Box<[AtomicU8]>,
}

impl Lattice {
    /// Allocates an all-zero grid for the given box.
    pub fn new(dims: BoxDimensions) -> Self {
        let cells = (0..dims.volume())
            .map(|_| AtomicU8::new(0))
            .collect::<Vec<_>>()
            .into_boxed_slice();
        Self { dims, cells }
    }

    #[inline]
    pub fn dims(&self) -> &BoxDimensions {
        &self.dims
    }

    #[inline]
    pub fn cell(&self, index: usize) -> u8 {
        self.cells[index].load(Ordering::Relaxed)
    }

    #[inline]
    pub fn store(&self, index: usize, value: u8) {
        self.cells[index].store(value, Ordering::Relaxed);
    }

    /// Zeroes every cell.
    pub fn clear(&mut self) {
        for cell in self.cells.iter() {
            cell.store(0, Ordering::Relaxed);
        }
    }

    pub fn is_clear(&self) -> bool {
        self.first_occupied().is_none()
    }

    /// Index of the first non-zero cell, if any.
    pub fn first_occupied(&self) -> Option<usize> {
        self.cells
            .iter()
            .position(|c| c.load(Ordering::Relaxed) != 0)
    }

    pub fn occupied_count(&self) -> usize {
        self.cells
            .iter()
            .filter(|c| c.load(Ordering::Relaxed) != 0)
            .count()
    }

    /// Copies the grid into a plain byte vector.
    pub fn snapshot(&self) -> Vec<u8> {
        self.cells
            .iter()
            .map(|c| c.load(Ordering::Relaxed))
            .collect()
    }

    /// OR-reduces the 3×3 destination face of a move from `(x, y, z)`.
    ///
    /// The tested plane lies two lattice units from the origin along the
    /// move axis; the other two axes sweep `{-1, 0, +1}` around the origin,
    /// folded into the box. The nine linear indices are sums of three
    /// precomputed terms, so each non-motion axis is masked exactly once.
    pub fn face_occupied(&self, x: i32, y: i32, z: i32, dir: MoveDirection) -> bool {
        let d = &self.dims;
        let step = 2 * dir.sign();
        let (plane, u, v) = match dir.axis() {
            Axis::X => (
                d.term_x(x + step),
                [d.term_y(y - 1), d.term_y(y), d.term_y(y + 1)],
                [d.term_z(z - 1), d.term_z(z), d.term_z(z + 1)],
            ),
            Axis::Y => (
                d.term_y(y + step),
                [d.term_x(x - 1), d.term_x(x), d.term_x(x + 1)],
                [d.term_z(z - 1), d.term_z(z), d.term_z(z + 1)],
            ),
            Axis::Z => (
                d.term_z(z + step),
                [d.term_x(x - 1), d.term_x(x), d.term_x(x + 1)],
                [d.term_y(y - 1), d.term_y(y), d.term_y(y + 1)],
            ),
        };
        let mut occupancy = 0u8;
        for &tu in &u {
            for &tv in &v {
                occupancy |= self.cell(plane | tu | tv);
            }
        }
        occupancy != 0
    }
}

impl std::fmt::Debug for Lattice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Lattice")
            .field("dims", &self.dims)
            .field("occupied", &self.occupied_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dims8() -> BoxDimensions {
        BoxDimensions::new(8, 8, 8).unwrap()
    }

    fn dir(index: u8) -> MoveDirection {
        MoveDirection::from_index(index).unwrap()
    }

    mod geometry {
        use super::*;

        #[test]
        fn rejects_non_power_of_two_edges() {
            assert_eq!(
                BoxDimensions::new(8, 12, 8),
                Err(GeometryError::NotPowerOfTwo {
                    axis: Axis::Y,
                    extent: 12
                })
            );
            assert_eq!(
                BoxDimensions::new(0, 8, 8),
                Err(GeometryError::NotPowerOfTwo {
                    axis: Axis::X,
                    extent: 0
                })
            );
        }

        #[test]
        fn index_is_row_major_in_x_then_y_then_z() {
            let d = BoxDimensions::new(4, 8, 16).unwrap();
            assert_eq!(d.index(0, 0, 0), 0);
            assert_eq!(d.index(3, 0, 0), 3);
            assert_eq!(d.index(0, 1, 0), 4);
            assert_eq!(d.index(0, 0, 1), 32);
            assert_eq!(d.index(3, 7, 15), d.volume() - 1);
        }

        #[test]
        fn index_folds_negative_and_drifted_coordinates() {
            let d = dims8();
            assert_eq!(d.index(-1, 0, 0), d.index(7, 0, 0));
            assert_eq!(d.index(9, -3, 17), d.index(1, 5, 1));
            assert_eq!(d.fold(Axis::Z, -2), 6);
        }
    }

    mod occupancy {
        use super::*;

        #[test]
        fn store_cell_and_clear() {
            let mut lattice = Lattice::new(dims8());
            assert!(lattice.is_clear());
            let idx = lattice.dims().index(3, 4, 5);
            lattice.store(idx, 1);
            assert_eq!(lattice.cell(idx), 1);
            assert_eq!(lattice.occupied_count(), 1);
            assert_eq!(lattice.first_occupied(), Some(idx));
            lattice.clear();
            assert!(lattice.is_clear());
        }
    }

    mod face_test {
        use super::*;

        #[test]
        fn empty_lattice_has_free_faces() {
            let lattice = Lattice::new(dims8());
            for index in 0..6 {
                assert!(!lattice.face_occupied(3, 3, 3, dir(index)));
            }
        }

        #[test]
        fn detects_corner_on_the_tested_plane() {
            let lattice = Lattice::new(dims8());
            // Plane for a +x move from (3,3,3) is x = 5; lateral offsets ±1.
            lattice.store(lattice.dims().index(5, 2, 4), 1);
            assert!(lattice.face_occupied(3, 3, 3, dir(1)));
            assert!(!lattice.face_occupied(3, 3, 3, dir(0)));
            assert!(!lattice.face_occupied(3, 3, 3, dir(3)));
        }

        #[test]
        fn own_destination_corner_is_not_on_the_plane() {
            let lattice = Lattice::new(dims8());
            // A monomer moving +z to (3,3,4) marks that cell in scratch; the
            // plane it re-tests is z = 5, so its own mark must not reject it.
            lattice.store(lattice.dims().index(3, 3, 4), 1);
            assert!(!lattice.face_occupied(3, 3, 3, dir(5)));
        }

        #[test]
        fn sees_occupancy_across_the_periodic_wrap() {
            let lattice = Lattice::new(dims8());
            // Corner at (6,0,0); a -x move from the origin tests plane
            // x = -2 ≡ 6 with y,z sweeping {7,0,1}.
            lattice.store(lattice.dims().index(6, 0, 0), 1);
            assert!(lattice.face_occupied(0, 0, 0, dir(0)));
            // The +x plane from the origin is x = 2 and must stay free.
            assert!(!lattice.face_occupied(0, 0, 0, dir(1)));
        }

        #[test]
        fn sweeps_the_full_three_by_three_face() {
            let lattice = Lattice::new(dims8());
            for dy in -1..=1 {
                for dz in -1..=1 {
                    let probe = Lattice::new(dims8());
                    probe.store(probe.dims().index(5, 3 + dy, 3 + dz), 1);
                    assert!(
                        probe.face_occupied(3, 3, 3, dir(1)),
                        "offset ({dy}, {dz}) missed"
                    );
                }
            }
            // Just outside the lateral sweep.
            lattice.store(lattice.dims().index(5, 1, 3), 1);
            assert!(!lattice.face_occupied(3, 3, 3, dir(1)));
        }
    }
}
