use super::FLAG_PROPOSED;
use crate::core::models::bonds::{BondTable, MoveDirection};
use crate::core::models::lattice::{Axis, Lattice};
use crate::core::models::position::PositionValue;
use nalgebra::Point3;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Phase A: one worker per monomer of the active species draws a direction
/// and checks the move against walls, the bond table, and the committed
/// lattice.
///
/// On acceptance the worker records the direction and [`FLAG_PROPOSED`] in
/// its flag byte and scatters a 1 into the scratch lattice at the
/// destination corner. The source cell is left set; the other workers of
/// this phase still test against it. The committed lattice is never
/// written here, so the phase is a pure read of committed plus an
/// idempotent scatter to scratch.
#[allow(clippy::too_many_arguments)]
pub(crate) fn run<P: PositionValue>(
    positions: &[Point3<P>],
    tags: &[u8],
    flags: &mut [u8],
    neighbors: &[u32],
    pitch: usize,
    offset: usize,
    committed: &Lattice,
    scratch: &Lattice,
    table: &BondTable,
    periodic: [bool; 3],
    seed: u32,
) {
    let worker = |m: usize, flag: &mut u8| {
        let global = offset + m;
        let p = positions[global];
        let (x, y, z) = (p.x.to_i32(), p.y.to_i32(), p.z.to_i32());

        let dir = MoveDirection::draw(global as u32, seed);
        *flag = dir.pack();

        let step = dir.vector();
        let (nx, ny, nz) = (x + step.x, y + step.y, z + step.z);

        let dims = committed.dims();
        for axis in Axis::ALL {
            if !periodic[axis.as_index()] {
                let v = [nx, ny, nz][axis.as_index()];
                if v < 0 || v >= dims.extent(axis) - 1 {
                    return;
                }
            }
        }

        let connectivity = usize::from(tags[global] >> 5);
        for slot in 0..connectivity {
            let partner = neighbors[slot * pitch + m] as usize;
            let q = positions[partner];
            if !table.is_allowed(q.x.to_i32() - nx, q.y.to_i32() - ny, q.z.to_i32() - nz) {
                return;
            }
        }

        if committed.face_occupied(x, y, z, dir) {
            return;
        }

        *flag |= FLAG_PROPOSED;
        scratch.store(dims.index(nx, ny, nz), 1);
    };

    #[cfg(feature = "parallel")]
    flags
        .par_iter_mut()
        .enumerate()
        .for_each(|(m, flag)| worker(m, flag));

    #[cfg(not(feature = "parallel"))]
    flags
        .iter_mut()
        .enumerate()
        .for_each(|(m, flag)| worker(m, flag));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::lattice::BoxDimensions;
    use crate::core::models::system::MAX_CONNECTIVITY;
    use crate::engine::layout::NO_MONOMER;

    struct Fixture {
        positions: Vec<Point3<i32>>,
        tags: Vec<u8>,
        neighbors: Vec<u32>,
        pitch: usize,
        committed: Lattice,
        scratch: Lattice,
        table: BondTable,
    }

    impl Fixture {
        /// One species holding every monomer, pitch equal to the count.
        fn new(positions: Vec<Point3<i32>>, bonds: &[(usize, usize)]) -> Self {
            let n = positions.len();
            let mut counts = vec![0u8; n];
            let mut neighbors = vec![NO_MONOMER; n * MAX_CONNECTIVITY];
            for &(i, j) in bonds {
                for (a, b) in [(i, j), (j, i)] {
                    neighbors[usize::from(counts[a]) * n + a] = b as u32;
                    counts[a] += 1;
                }
            }
            let tags = counts.iter().map(|&k| k << 5).collect();

            let dims = BoxDimensions::new(8, 8, 8).unwrap();
            let committed = Lattice::new(dims);
            for p in &positions {
                committed.store(dims.index(p.x, p.y, p.z), 1);
            }
            Self {
                positions,
                tags,
                neighbors,
                pitch: n,
                committed,
                scratch: Lattice::new(dims),
                table: BondTable::classical(),
            }
        }

        fn propose(&mut self, seed: u32, periodic: [bool; 3]) -> Vec<u8> {
            let mut flags = vec![0u8; self.positions.len()];
            run(
                &self.positions,
                &self.tags,
                &mut flags,
                &self.neighbors,
                self.pitch,
                0,
                &self.committed,
                &self.scratch,
                &self.table,
                periodic,
                seed,
            );
            flags
        }
    }

    #[test]
    fn lone_monomer_always_moves_in_a_periodic_box() {
        let mut fixture = Fixture::new(vec![Point3::new(3, 3, 3)], &[]);
        for seed in 0..32 {
            fixture.scratch.clear();
            let flags = fixture.propose(seed, [true; 3]);
            assert_eq!(flags[0] & FLAG_PROPOSED, FLAG_PROPOSED, "seed {seed}");
            let dir = MoveDirection::unpack(flags[0]);
            let step = dir.vector();
            let dest = fixture
                .committed
                .dims()
                .index(3 + step.x, 3 + step.y, 3 + step.z);
            assert_eq!(fixture.scratch.cell(dest), 1);
        }
    }

    #[test]
    fn stretching_a_long_bond_past_the_table_is_rejected() {
        // Bond (3,0,0): any +x move of the right monomer stretches it to
        // the forbidden (4,0,0).
        let mut fixture = Fixture::new(vec![Point3::new(2, 2, 2), Point3::new(5, 2, 2)], &[(0, 1)]);
        let mut saw_stretch = false;
        for seed in 0..256 {
            fixture.scratch.clear();
            let flags = fixture.propose(seed, [true; 3]);
            let dir = MoveDirection::unpack(flags[1]);
            if dir.index() == 1 {
                saw_stretch = true;
                assert_eq!(flags[1] & FLAG_PROPOSED, 0, "seed {seed}");
            }
            let dir0 = MoveDirection::unpack(flags[0]);
            if dir0.index() == 0 {
                assert_eq!(flags[0] & FLAG_PROPOSED, 0, "seed {seed}");
            }
        }
        assert!(saw_stretch, "the +x direction never came up in 256 seeds");
    }

    #[test]
    fn walls_reject_moves_leaving_a_non_periodic_box() {
        let mut fixture = Fixture::new(vec![Point3::new(0, 3, 3)], &[]);
        for seed in 0..64 {
            fixture.scratch.clear();
            let flags = fixture.propose(seed, [false, true, true]);
            let dir = MoveDirection::unpack(flags[0]);
            if dir.index() == 0 {
                assert_eq!(flags[0] & FLAG_PROPOSED, 0, "-x leaves the box");
            } else {
                assert_eq!(flags[0] & FLAG_PROPOSED, FLAG_PROPOSED);
            }
        }

        // The +x wall: a corner at extent - 2 already touches it.
        let mut fixture = Fixture::new(vec![Point3::new(6, 3, 3)], &[]);
        for seed in 0..64 {
            fixture.scratch.clear();
            let flags = fixture.propose(seed, [false, true, true]);
            if MoveDirection::unpack(flags[0]).index() == 1 {
                assert_eq!(flags[0] & FLAG_PROPOSED, 0, "+x leaves the box");
            }
        }
    }

    #[test]
    fn excluded_volume_blocks_an_approach_below_distance_two() {
        // Corners at x = 2 and x = 4 sit at the minimum distance; a +x move
        // of the left monomer (or -x of the right one) would land them one
        // apart and must fail the 3×3 face test.
        let mut fixture = Fixture::new(vec![Point3::new(2, 2, 2), Point3::new(4, 2, 2)], &[]);
        for seed in 0..64 {
            fixture.scratch.clear();
            let flags = fixture.propose(seed, [true; 3]);
            if MoveDirection::unpack(flags[0]).index() == 1 {
                assert_eq!(flags[0] & FLAG_PROPOSED, 0, "seed {seed}");
            }
            if MoveDirection::unpack(flags[1]).index() == 0 {
                assert_eq!(flags[1] & FLAG_PROPOSED, 0, "seed {seed}");
            }
        }
    }

    #[test]
    fn excluded_volume_is_seen_across_the_periodic_wrap() {
        // Corners at x = 6 and x = 0 are two apart across the wrap; a -x
        // move from 0 would land one away from 6 and must be blocked even
        // though the occupied plane lies on the far side of the box.
        let mut fixture = Fixture::new(vec![Point3::new(6, 0, 0), Point3::new(0, 0, 0)], &[]);
        for seed in 0..64 {
            fixture.scratch.clear();
            let flags = fixture.propose(seed, [true; 3]);
            if MoveDirection::unpack(flags[1]).index() == 0 {
                assert_eq!(flags[1] & FLAG_PROPOSED, 0, "wrap overlap, seed {seed}");
            }
        }
    }
}
