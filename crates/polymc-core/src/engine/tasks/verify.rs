use crate::core::models::position::PositionValue;
use crate::engine::layout::NO_MONOMER;
use crate::engine::state::SimulationState;
use thiserror::Error;
use tracing::{debug, instrument};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum InvariantError {
    #[error("adjacency of monomers {first} and {second} is not symmetric")]
    AdjacencyAsymmetric { first: usize, second: usize },

    #[error("bonded monomers {first} and {second} share species {species}")]
    ColoringViolation {
        first: usize,
        second: usize,
        species: usize,
    },

    #[error("bond ({first}, {second}) stretched to Δ = ({dx}, {dy}, {dz})")]
    BrokenBond {
        first: usize,
        second: usize,
        dx: i32,
        dy: i32,
        dz: i32,
    },

    #[error("bond ({first}, {second}) with Δ = ({dx}, {dy}, {dz}) is not in the allowed set")]
    ForbiddenBond {
        first: usize,
        second: usize,
        dx: i32,
        dy: i32,
        dz: i32,
    },

    #[error("monomers {first} and {second} overlap: their 2³ cubes share a lattice cell")]
    Overlap { first: usize, second: usize },

    #[error("committed lattice disagrees with monomer {monomer}: corner cell {cell} is empty")]
    LatticeMismatch { monomer: usize, cell: usize },

    #[error("committed lattice holds {found} occupied cells for {expected} monomers")]
    LatticeCount { expected: usize, found: usize },

    #[error("scratch lattice is not clear: cell {cell} is set")]
    ScratchNotClear { cell: usize },
}

/// Full O(N) invariant sweep: adjacency symmetry, coloring separation, bond
/// validity, cube exclusion, lattice consistency, scratch drainage.
///
/// Stops at the first violation and reports the offending monomers in
/// loader order.
#[instrument(skip_all, name = "invariant_check")]
pub(crate) fn run<P: PositionValue>(state: &SimulationState<P>) -> Result<(), InvariantError> {
    check_bond_graph(state)?;
    check_exclusion(state)?;
    check_lattices(state)?;
    debug!("all invariants hold");
    Ok(())
}

fn check_bond_graph<P: PositionValue>(state: &SimulationState<P>) -> Result<(), InvariantError> {
    let layout = &state.layout;
    for sorted in 0..layout.padded_len() {
        let Some(original) = layout.original_index(sorted) else {
            continue;
        };
        let species = layout.species_of_slot(sorted);
        let pitch = layout.pitch(species);
        let local = sorted - layout.offset(species);
        let base = layout.matrix_offset(species);

        let connectivity = usize::from(state.tags[sorted] >> 5);
        for slot in 0..connectivity {
            let partner = state.neighbors[base + slot * pitch + local] as usize;
            let partner_original = layout
                .original_index(partner)
                .expect("neighbor slots never reference padding");

            if !lists_neighbor(state, partner, sorted) {
                return Err(InvariantError::AdjacencyAsymmetric {
                    first: original,
                    second: partner_original,
                });
            }

            let partner_species = layout.species_of_slot(partner);
            if partner_species == species {
                return Err(InvariantError::ColoringViolation {
                    first: original,
                    second: partner_original,
                    species,
                });
            }

            // Each undirected edge is measured once.
            if original < partner_original {
                let p = state.positions[sorted];
                let q = state.positions[partner];
                let (dx, dy, dz) = (
                    q.x.to_i32() - p.x.to_i32(),
                    q.y.to_i32() - p.y.to_i32(),
                    q.z.to_i32() - p.z.to_i32(),
                );
                if dx.abs() > 3 || dy.abs() > 3 || dz.abs() > 3 {
                    return Err(InvariantError::BrokenBond {
                        first: original,
                        second: partner_original,
                        dx,
                        dy,
                        dz,
                    });
                }
                if !state.table.is_allowed(dx, dy, dz) {
                    return Err(InvariantError::ForbiddenBond {
                        first: original,
                        second: partner_original,
                        dx,
                        dy,
                        dz,
                    });
                }
            }
        }
    }
    Ok(())
}

fn lists_neighbor<P: PositionValue>(
    state: &SimulationState<P>,
    sorted: usize,
    expected: usize,
) -> bool {
    let layout = &state.layout;
    let species = layout.species_of_slot(sorted);
    let pitch = layout.pitch(species);
    let local = sorted - layout.offset(species);
    let base = layout.matrix_offset(species);
    let connectivity = usize::from(state.tags[sorted] >> 5);
    (0..connectivity).any(|slot| state.neighbors[base + slot * pitch + local] == expected as u32)
}

/// Paints all eight corners of every monomer cube into an owner map; any
/// cell claimed twice is an excluded-volume violation. Corners are folded
/// into the box, so cubes straddling the wrap are handled exactly.
fn check_exclusion<P: PositionValue>(state: &SimulationState<P>) -> Result<(), InvariantError> {
    let dims = *state.committed.dims();
    let mut owners = vec![NO_MONOMER; dims.volume()];
    for sorted in 0..state.layout.padded_len() {
        let Some(original) = state.layout.original_index(sorted) else {
            continue;
        };
        let p = state.positions[sorted];
        let (x, y, z) = (p.x.to_i32(), p.y.to_i32(), p.z.to_i32());
        for corner in 0..8 {
            let cell = dims.index(x + (corner & 1), y + ((corner >> 1) & 1), z + (corner >> 2));
            if owners[cell] != NO_MONOMER {
                return Err(InvariantError::Overlap {
                    first: owners[cell] as usize,
                    second: original,
                });
            }
            owners[cell] = original as u32;
        }
    }
    Ok(())
}

fn check_lattices<P: PositionValue>(state: &SimulationState<P>) -> Result<(), InvariantError> {
    let dims = *state.committed.dims();
    let mut monomers = 0usize;
    for sorted in 0..state.layout.padded_len() {
        let Some(original) = state.layout.original_index(sorted) else {
            continue;
        };
        monomers += 1;
        let p = state.positions[sorted];
        let cell = dims.index(p.x.to_i32(), p.y.to_i32(), p.z.to_i32());
        if state.committed.cell(cell) == 0 {
            return Err(InvariantError::LatticeMismatch {
                monomer: original,
                cell,
            });
        }
    }

    let found = state.committed.occupied_count();
    if found != monomers {
        return Err(InvariantError::LatticeCount {
            expected: monomers,
            found,
        });
    }

    if let Some(cell) = state.scratch.first_occupied() {
        return Err(InvariantError::ScratchNotClear { cell });
    }
    Ok(())
}
