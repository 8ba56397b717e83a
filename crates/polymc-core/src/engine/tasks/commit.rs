use super::{FLAG_COMMITTED, FLAG_PROPOSED};
use crate::core::models::bonds::MoveDirection;
use crate::core::models::lattice::Lattice;
use crate::core::models::position::PositionValue;
use nalgebra::Point3;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Phase B: re-tests every proposed move against the scratch lattice and
/// performs the survivors on the committed lattice.
///
/// After the phase-A barrier the scratch lattice holds the destination of
/// every proposed move of this species. A monomer whose 3×3 destination
/// face contains another proposal's destination would end up closer than
/// the excluded-volume minimum, so it withdraws. The test is mutual: both
/// members of such a pair see each other's mark and both stay put.
pub(crate) fn run<P: PositionValue>(
    positions: &[Point3<P>],
    flags: &mut [u8],
    committed: &Lattice,
    scratch: &Lattice,
) {
    let worker = |p: &Point3<P>, flag: &mut u8| {
        if *flag & FLAG_PROPOSED == 0 {
            return;
        }
        let (x, y, z) = (p.x.to_i32(), p.y.to_i32(), p.z.to_i32());
        let dir = MoveDirection::unpack(*flag);

        if scratch.face_occupied(x, y, z, dir) {
            return;
        }

        *flag |= FLAG_COMMITTED;
        let step = dir.vector();
        let dims = committed.dims();
        committed.store(dims.index(x + step.x, y + step.y, z + step.z), 1);
        committed.store(dims.index(x, y, z), 0);
    };

    #[cfg(feature = "parallel")]
    positions
        .par_iter()
        .zip(flags.par_iter_mut())
        .for_each(|(p, flag)| worker(p, flag));

    #[cfg(not(feature = "parallel"))]
    positions
        .iter()
        .zip(flags.iter_mut())
        .for_each(|(p, flag)| worker(p, flag));
}
