use super::{FLAG_COMMITTED, FLAG_PROPOSED};
use crate::core::models::bonds::MoveDirection;
use crate::core::models::lattice::Lattice;
use crate::core::models::position::PositionValue;
use nalgebra::Point3;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Phase C: clears the scratch marks left by phase A and folds committed
/// moves into the stored positions.
///
/// Every proposal cleans its own destination cell, so the scratch lattice
/// is all-zero again when the phase barrier falls; the next substep starts
/// from a clean slate. The destination is recomputed from the old position
/// before that position is advanced.
pub(crate) fn run<P: PositionValue>(positions: &mut [Point3<P>], flags: &[u8], scratch: &Lattice) {
    let worker = |p: &mut Point3<P>, flag: &u8| {
        if flag & FLAG_PROPOSED == 0 {
            return;
        }
        let dir = MoveDirection::unpack(*flag);
        let step = dir.vector();
        let (x, y, z) = (p.x.to_i32(), p.y.to_i32(), p.z.to_i32());
        scratch
            .store(scratch.dims().index(x + step.x, y + step.y, z + step.z), 0);

        if flag & FLAG_COMMITTED != 0 {
            p.x = p.x.wrapping_offset(step.x);
            p.y = p.y.wrapping_offset(step.y);
            p.z = p.z.wrapping_offset(step.z);
        }
    };

    #[cfg(feature = "parallel")]
    positions
        .par_iter_mut()
        .zip(flags.par_iter())
        .for_each(|(p, flag)| worker(p, flag));

    #[cfg(not(feature = "parallel"))]
    positions
        .iter_mut()
        .zip(flags.iter())
        .for_each(|(p, flag)| worker(p, flag));
}
