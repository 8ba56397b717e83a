use super::coloring;
use super::config::SimulationConfig;
use super::error::EngineError;
use super::layout::{NO_MONOMER, SpeciesLayout};
use super::tasks::{self, FLAG_COMMITTED, FLAG_PROPOSED};
use crate::core::models::bonds::BondTable;
use crate::core::models::lattice::{BoxDimensions, Lattice};
use crate::core::models::position::PositionValue;
use crate::core::models::system::{MAX_CONNECTIVITY, PolymerSystem};
use nalgebra::Point3;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, info};

/// Move-acceptance counters accumulated over a run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SweepStatistics {
    /// Monte-Carlo steps completed.
    pub steps: u64,
    /// Substeps executed (species-level kernel pipelines).
    pub substeps: u64,
    /// Move attempts visited by the propose phase.
    pub attempted: u64,
    /// Attempts accepted against the committed lattice.
    pub proposed: u64,
    /// Attempts that also survived the scratch re-test and moved.
    pub committed: u64,
}

impl SweepStatistics {
    /// Fraction of attempts that resulted in a move.
    pub fn acceptance(&self) -> f64 {
        if self.attempted == 0 {
            0.0
        } else {
            self.committed as f64 / self.attempted as f64
        }
    }
}

/// The packed, species-sorted simulation state.
///
/// Built once by `initialize` from the staged system: monomers are permuted
/// into contiguous aligned species regions, adjacency is re-addressed into
/// the column-major per-species matrix, and the committed lattice is primed
/// from the packed positions. The staged system is left untouched; the
/// layout bijection is the only bridge back to loader order.
#[derive(Debug)]
pub(crate) struct SimulationState<P: PositionValue> {
    pub(crate) config: SimulationConfig,
    pub(crate) table: BondTable,
    pub(crate) layout: SpeciesLayout,
    /// Sorted positions, padding slots at the origin.
    pub(crate) positions: Vec<Point3<P>>,
    /// Packed tag bytes: bits 5-7 hold the neighbor count.
    pub(crate) tags: Vec<u8>,
    /// Per-substep move flags: bit 0 propose-accept, bit 1 commit-accept,
    /// bits 2-4 the drawn direction.
    pub(crate) flags: Vec<u8>,
    /// Column-major neighbor matrix in sorted numbering.
    pub(crate) neighbors: Vec<u32>,
    pub(crate) committed: Lattice,
    pub(crate) scratch: Lattice,
    rng: StdRng,
    stats: SweepStatistics,
}

impl<P: PositionValue> SimulationState<P> {
    /// Colors, packs and primes a staged system.
    ///
    /// The configuration and bond table are assumed validated. Fails when
    /// two monomer corners claim the same lattice cell, which would make
    /// the occupancy grid silently merge them.
    pub fn build(
        system: &PolymerSystem<P>,
        table: BondTable,
        config: SimulationConfig,
    ) -> Result<Self, EngineError> {
        let assignment = coloring::assign_species(system, config.uniform_coloring);
        let layout = SpeciesLayout::plan(
            &assignment.colors,
            assignment.species_count,
            config.alignment,
        );

        let origin = Point3::new(P::default(), P::default(), P::default());
        let mut positions = vec![origin; layout.padded_len()];
        let mut tags = vec![0u8; layout.padded_len()];
        let mut neighbors = vec![NO_MONOMER; layout.matrix_len()];
        for original in 0..system.len() {
            let sorted = layout.sorted_index(original);
            positions[sorted] = system.positions()[original];
            tags[sorted] = system.neighbor_count(original) << 5;

            let species = layout.species_of_slot(sorted);
            let pitch = layout.pitch(species);
            let local = sorted - layout.offset(species);
            let base = layout.matrix_offset(species);
            for (slot, &partner) in system.neighbors_of(original).iter().enumerate() {
                neighbors[base + slot * pitch + local] =
                    layout.sorted_index(partner as usize) as u32;
            }
        }

        let dims = BoxDimensions::new(
            config.box_size[0],
            config.box_size[1],
            config.box_size[2],
        )?;
        let committed = Lattice::new(dims);
        let scratch = Lattice::new(dims);
        prime_lattice(&committed, &layout, &positions)?;

        info!(
            monomers = system.len(),
            species = layout.species_count(),
            padded = layout.padded_len(),
            volume = dims.volume(),
            "simulation state packed and primed"
        );

        Ok(Self {
            rng: StdRng::seed_from_u64(config.seed),
            flags: vec![0u8; layout.padded_len()],
            config,
            table,
            layout,
            positions,
            tags,
            neighbors,
            committed,
            scratch,
            stats: SweepStatistics::default(),
        })
    }

    pub fn species_count(&self) -> usize {
        self.layout.species_count()
    }

    pub fn statistics(&self) -> SweepStatistics {
        self.stats
    }

    /// Committed position of a loader-order monomer.
    pub fn position_of_original(&self, original: usize) -> Point3<P> {
        self.positions[self.layout.sorted_index(original)]
    }

    /// Runs one Monte-Carlo step: as many randomly targeted substeps as
    /// there are species, so every monomer is proposed once on average.
    pub fn step(&mut self) {
        let species_count = self.layout.species_count();
        for _ in 0..species_count {
            let species = self.rng.gen_range(0..species_count);
            let seed: u32 = self.rng.gen();
            self.substep(species, seed);
        }
        self.stats.steps += 1;
    }

    /// Runs the three-phase kernel pipeline over one species.
    ///
    /// The end of each (parallel) phase is the barrier the move protocol
    /// requires: propose only reads committed and scatters to scratch,
    /// commit reads scratch and writes committed, settle cleans scratch and
    /// advances positions.
    pub fn substep(&mut self, species: usize, seed: u32) {
        let offset = self.layout.offset(species);
        let count = self.layout.count(species);
        self.stats.substeps += 1;
        if count == 0 {
            return;
        }
        let pitch = self.layout.pitch(species);
        let base = self.layout.matrix_offset(species);

        tasks::propose::run(
            &self.positions,
            &self.tags,
            &mut self.flags[offset..offset + count],
            &self.neighbors[base..base + pitch * MAX_CONNECTIVITY],
            pitch,
            offset,
            &self.committed,
            &self.scratch,
            &self.table,
            self.config.periodic,
            seed,
        );

        tasks::commit::run(
            &self.positions[offset..offset + count],
            &mut self.flags[offset..offset + count],
            &self.committed,
            &self.scratch,
        );

        tasks::settle::run(
            &mut self.positions[offset..offset + count],
            &self.flags[offset..offset + count],
            &self.scratch,
        );

        let active = &self.flags[offset..offset + count];
        let proposed = active.iter().filter(|&&f| f & FLAG_PROPOSED != 0).count();
        let committed = active
            .iter()
            .filter(|&&f| f & FLAG_COMMITTED != 0)
            .count();
        self.stats.attempted += count as u64;
        self.stats.proposed += proposed as u64;
        self.stats.committed += committed as u64;

        debug_assert!(self.scratch.is_clear(), "scratch must drain every substep");
        debug!(
            species,
            attempted = count,
            proposed,
            committed,
            "substep complete"
        );
    }
}

/// Sets the corner cell of every packed monomer, rejecting duplicate
/// claims.
fn prime_lattice<P: PositionValue>(
    committed: &Lattice,
    layout: &SpeciesLayout,
    positions: &[Point3<P>],
) -> Result<(), EngineError> {
    let dims = *committed.dims();
    let mut owners = vec![NO_MONOMER; dims.volume()];
    for sorted in 0..layout.padded_len() {
        let Some(original) = layout.original_index(sorted) else {
            continue;
        };
        let p = positions[sorted];
        let cell = dims.index(p.x.to_i32(), p.y.to_i32(), p.z.to_i32());
        if owners[cell] != NO_MONOMER {
            return Err(tasks::verify::InvariantError::Overlap {
                first: owners[cell] as usize,
                second: original,
            }
            .into());
        }
        owners[cell] = original as u32;
        committed.store(cell, 1);
    }
    Ok(())
}
