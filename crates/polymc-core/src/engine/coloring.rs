use crate::core::models::position::PositionValue;
use crate::core::models::system::PolymerSystem;
use tracing::{debug, instrument};

/// A proper vertex coloring of the bond graph.
///
/// No two bonded monomers share a color, so every color class can attempt
/// moves in parallel without same-step bond-length races.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpeciesAssignment {
    pub colors: Vec<u32>,
    pub species_count: usize,
}

/// Colors the bond graph with a greedy smallest-available-color pass in
/// monomer order, optionally followed by population rebalancing.
///
/// With connectivity bounded by seven, the greedy pass needs at most eight
/// colors. The pass order is fixed, so the assignment is deterministic for
/// a given system.
#[instrument(skip_all, name = "graph_coloring", fields(monomers = system.len()))]
pub(crate) fn assign_species<P: PositionValue>(
    system: &PolymerSystem<P>,
    uniform: bool,
) -> SpeciesAssignment {
    let n = system.len();
    let mut colors = vec![0u32; n];
    let mut species_count = 0usize;

    for v in 0..n {
        let mut used = 0u16;
        for &j in system.neighbors_of(v) {
            let j = j as usize;
            if j < v {
                used |= 1 << colors[j];
            }
        }
        let color = (!used).trailing_zeros();
        colors[v] = color;
        species_count = species_count.max(color as usize + 1);
    }

    if uniform && species_count > 1 {
        rebalance(system, &mut colors, species_count);
    }

    debug!(species = species_count, "bond graph colored");
    SpeciesAssignment {
        colors,
        species_count,
    }
}

/// Evens out color populations while preserving adjacency separation.
///
/// Repeated repair passes move monomers from the most-populated color to
/// the least-populated one whenever no bonded neighbor already holds the
/// target color. Stops once the spread is at most one or a pass makes no
/// progress.
fn rebalance<P: PositionValue>(
    system: &PolymerSystem<P>,
    colors: &mut [u32],
    species_count: usize,
) {
    let mut populations = vec![0usize; species_count];
    for &c in colors.iter() {
        populations[c as usize] += 1;
    }

    for _ in 0..2 * species_count {
        let over = (0..species_count).max_by_key(|&c| populations[c]).unwrap_or(0) as u32;
        let under = (0..species_count).min_by_key(|&c| populations[c]).unwrap_or(0) as u32;
        if populations[over as usize] - populations[under as usize] <= 1 {
            break;
        }

        let mut moved = false;
        for v in 0..colors.len() {
            if populations[over as usize] - populations[under as usize] <= 1 {
                break;
            }
            if colors[v] != over {
                continue;
            }
            let blocked = system
                .neighbors_of(v)
                .iter()
                .any(|&j| colors[j as usize] == under);
            if !blocked {
                colors[v] = under;
                populations[over as usize] -= 1;
                populations[under as usize] += 1;
                moved = true;
            }
        }
        if !moved {
            break;
        }
    }
}
