use super::config::{ConfigError, SimulationConfig};
use super::error::EngineError;
use super::state::{SimulationState, SweepStatistics};
use super::tasks;
use crate::core::models::bonds::BondTable;
use crate::core::models::lattice::{Axis, BoxDimensions};
use crate::core::models::position::PositionValue;
use crate::core::models::system::{PolymerSystem, TopologyError};
use nalgebra::Point3;
use tracing::{info, instrument};

/// The embeddable BFM engine.
///
/// The lifecycle is a strict two-phase cycle: stage the configuration,
/// topology and bond table, then [`initialize`](Simulation::initialize) to
/// freeze everything into the packed parallel state, sweep, read positions
/// back, and [`cleanup`](Simulation::cleanup) to return to the freshly
/// constructed state. Staging calls after `initialize`, or a second
/// `initialize` without `cleanup`, fail without touching the engine.
///
/// The position width is a compile-time choice: `Simulation::<i16>` halves
/// the monomer-store traffic, `Simulation::<i32>` (the default) stores wide
/// positions.
pub struct Simulation<P: PositionValue = i32> {
    base_config: SimulationConfig,
    config: SimulationConfig,
    table: BondTable,
    system: Option<PolymerSystem<P>>,
    state: Option<SimulationState<P>>,
}

impl<P: PositionValue> Default for Simulation<P> {
    fn default() -> Self {
        Self::with_config(SimulationConfig::default())
    }
}

impl<P: PositionValue> Simulation<P> {
    /// Creates an engine with the default configuration: periodic in all
    /// three axes, no box staged yet.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an engine from a prepared configuration. `cleanup` restores
    /// exactly this configuration.
    pub fn with_config(config: SimulationConfig) -> Self {
        Self {
            base_config: config.clone(),
            config,
            table: BondTable::new(),
            system: None,
            state: None,
        }
    }

    /// Assembles an engine from an already staged system and bond table,
    /// ready for `initialize`. This is the bulk entry point used by the
    /// workflow layer.
    pub fn from_parts(
        system: PolymerSystem<P>,
        table: BondTable,
        config: SimulationConfig,
    ) -> Self {
        let mut simulation = Self::with_config(config);
        simulation.system = Some(system);
        simulation.table = table;
        simulation
    }

    fn ensure_staging(&self, operation: &'static str) -> Result<(), EngineError> {
        if self.state.is_some() {
            return Err(EngineError::InvalidState {
                operation,
                state: "initialized",
            });
        }
        Ok(())
    }

    fn staged_system_mut(&mut self) -> Result<&mut PolymerSystem<P>, EngineError> {
        self.system
            .as_mut()
            .ok_or(EngineError::Config(ConfigError::MonomerCountNotConfigured))
    }

    /// Stages the box edge lengths; each must be a power of two.
    pub fn set_box_size(&mut self, bx: u32, by: u32, bz: u32) -> Result<(), EngineError> {
        self.ensure_staging("set_box_size")?;
        BoxDimensions::new(bx, by, bz)?;
        self.config.box_size = [bx, by, bz];
        Ok(())
    }

    /// Confirms the per-axis periodicity.
    ///
    /// Periodicity is fixed when the engine is constructed; this call only
    /// cross-checks the caller's expectation and fails on a mismatch, so an
    /// input file written for walls cannot silently run periodic.
    pub fn set_periodicity(&mut self, px: bool, py: bool, pz: bool) -> Result<(), EngineError> {
        self.ensure_staging("set_periodicity")?;
        let requested = [px, py, pz];
        if requested != self.config.periodic {
            return Err(EngineError::Config(ConfigError::PeriodicityMismatch {
                requested,
                configured: self.config.periodic,
            }));
        }
        Ok(())
    }

    /// Stages the seed of the host-side generator that draws species ids
    /// and kernel seeds.
    pub fn set_seed(&mut self, seed: u64) -> Result<(), EngineError> {
        self.ensure_staging("set_seed")?;
        self.config.seed = seed;
        Ok(())
    }

    /// Stages the monomer count, allocating the attribute and adjacency
    /// stores. Valid once per lifecycle.
    pub fn set_num_monomers(&mut self, count: usize) -> Result<(), EngineError> {
        self.ensure_staging("set_num_monomers")?;
        if self.system.is_some() {
            return Err(EngineError::InvalidState {
                operation: "set_num_monomers",
                state: "holding a staged system",
            });
        }
        self.system = Some(PolymerSystem::new(count));
        Ok(())
    }

    /// Stages the position of one monomer.
    pub fn set_position(&mut self, index: usize, x: P, y: P, z: P) -> Result<(), EngineError> {
        self.ensure_staging("set_position")?;
        self.staged_system_mut()?
            .set_position(index, Point3::new(x, y, z))?;
        Ok(())
    }

    /// Stages the caller-defined attribute tag of one monomer.
    pub fn set_attribute(&mut self, index: usize, attribute: i32) -> Result<(), EngineError> {
        self.ensure_staging("set_attribute")?;
        self.staged_system_mut()?.set_attribute(index, attribute)?;
        Ok(())
    }

    /// Stages an undirected bond between two monomers.
    pub fn add_bond(&mut self, first: usize, second: usize) -> Result<(), EngineError> {
        self.ensure_staging("add_bond")?;
        self.staged_system_mut()?.add_bond(first, second)?;
        Ok(())
    }

    /// Stages one entry of the allowed-bond table.
    pub fn set_allowed_bond(
        &mut self,
        dx: i32,
        dy: i32,
        dz: i32,
        allowed: bool,
    ) -> Result<(), EngineError> {
        self.ensure_staging("set_allowed_bond")?;
        self.table.set(dx, dy, dz, allowed)?;
        Ok(())
    }

    /// Freezes the staged configuration and builds the parallel state:
    /// validates everything, colors the bond graph, packs the sorted
    /// layout, and primes the committed lattice.
    ///
    /// With [`SimulationConfig::verify_initial`] set (the default) the full
    /// invariant verifier runs on the fresh state, so a corrupt input
    /// conformation is rejected here rather than corrupting a sweep.
    #[instrument(skip_all, name = "engine_initialize")]
    pub fn initialize(&mut self) -> Result<(), EngineError> {
        if self.state.is_some() {
            return Err(EngineError::InvalidState {
                operation: "initialize",
                state: "initialized",
            });
        }
        self.config.validate()?;
        self.table.validate()?;
        let system = self
            .system
            .as_ref()
            .ok_or(EngineError::Config(ConfigError::MonomerCountNotConfigured))?;
        self.check_wall_residency(system)?;

        let state = SimulationState::build(system, self.table.clone(), self.config.clone())?;
        if self.config.verify_initial {
            tasks::verify::run(&state)?;
        }
        info!(
            monomers = system.len(),
            species = state.species_count(),
            "engine initialized"
        );
        self.state = Some(state);
        Ok(())
    }

    fn check_wall_residency(&self, system: &PolymerSystem<P>) -> Result<(), EngineError> {
        for axis in Axis::ALL {
            if self.config.periodic[axis.as_index()] {
                continue;
            }
            let extent = self.config.box_size[axis.as_index()] as i32;
            for (index, p) in system.positions().iter().enumerate() {
                let value = [p.x.to_i32(), p.y.to_i32(), p.z.to_i32()][axis.as_index()];
                if value < 0 || value >= extent - 1 {
                    return Err(EngineError::Config(ConfigError::CoordinateOutOfBox {
                        index,
                        axis,
                        value,
                        extent,
                    }));
                }
            }
        }
        Ok(())
    }

    /// Runs `sweeps` Monte-Carlo steps; each step performs one substep per
    /// species, so every monomer attempts one move on average per step.
    #[instrument(skip(self), name = "engine_sweeps")]
    pub fn run_sweeps(&mut self, sweeps: usize) -> Result<(), EngineError> {
        let state = self.state.as_mut().ok_or(EngineError::InvalidState {
            operation: "run_sweeps",
            state: "staging",
        })?;
        for _ in 0..sweeps {
            state.step();
        }
        Ok(())
    }

    /// Committed position of a monomer, in loader order. During staging
    /// this returns the staged position.
    pub fn get_position(&self, index: usize) -> Result<Point3<P>, EngineError> {
        let system = self
            .system
            .as_ref()
            .ok_or(EngineError::Config(ConfigError::MonomerCountNotConfigured))?;
        if index >= system.len() {
            return Err(TopologyError::MonomerOutOfRange {
                index,
                count: system.len(),
            }
            .into());
        }
        Ok(match &self.state {
            Some(state) => state.position_of_original(index),
            None => system.positions()[index],
        })
    }

    /// The staged attribute tag of a monomer.
    pub fn get_attribute(&self, index: usize) -> Result<i32, EngineError> {
        let system = self
            .system
            .as_ref()
            .ok_or(EngineError::Config(ConfigError::MonomerCountNotConfigured))?;
        system.attribute(index).ok_or_else(|| {
            TopologyError::MonomerOutOfRange {
                index,
                count: system.len(),
            }
            .into()
        })
    }

    /// All staged bonds as `(low, high)` loader-order pairs.
    pub fn bonds(&self) -> &[(u32, u32)] {
        self.system.as_ref().map_or(&[], |s| s.bonds())
    }

    /// Number of staged monomers.
    pub fn monomer_count(&self) -> usize {
        self.system.as_ref().map_or(0, |s| s.len())
    }

    /// Number of species the coloring produced, once initialized.
    pub fn species_count(&self) -> Option<usize> {
        self.state.as_ref().map(|s| s.species_count())
    }

    /// Acceptance counters accumulated since `initialize`.
    pub fn statistics(&self) -> SweepStatistics {
        self.state
            .as_ref()
            .map(|s| s.statistics())
            .unwrap_or_default()
    }

    /// Runs the full O(N) invariant verifier on the current state.
    pub fn verify(&self) -> Result<(), EngineError> {
        let state = self.state.as_ref().ok_or(EngineError::InvalidState {
            operation: "verify",
            state: "staging",
        })?;
        tasks::verify::run(state)?;
        Ok(())
    }

    /// Releases the packed state and all staged data, returning the engine
    /// to its freshly constructed configuration.
    pub fn cleanup(&mut self) {
        self.state = None;
        self.system = None;
        self.table = BondTable::new();
        self.config = self.base_config.clone();
    }

    #[cfg(test)]
    pub(crate) fn state(&self) -> Option<&SimulationState<P>> {
        self.state.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::bonds::REQUIRED_ALLOWED_BONDS;

    /// Stages the classical 108-vector set through the public API.
    fn stage_classical_bonds<P: PositionValue>(simulation: &mut Simulation<P>) {
        let classical = BondTable::classical();
        let mut staged = 0;
        for (dx, dy, dz) in classical.allowed_vectors() {
            simulation.set_allowed_bond(dx, dy, dz, true).unwrap();
            staged += 1;
        }
        assert_eq!(staged, REQUIRED_ALLOWED_BONDS);
    }

    fn staged_dimer(seed: u64) -> Simulation<i32> {
        let mut simulation = Simulation::new();
        simulation.set_box_size(8, 8, 8).unwrap();
        simulation.set_periodicity(true, true, true).unwrap();
        simulation.set_seed(seed).unwrap();
        simulation.set_num_monomers(2).unwrap();
        simulation.set_position(0, 2, 2, 2).unwrap();
        simulation.set_position(1, 4, 2, 2).unwrap();
        simulation.add_bond(0, 1).unwrap();
        stage_classical_bonds(&mut simulation);
        simulation
    }

    fn squared_bond_length(simulation: &Simulation<i32>) -> i32 {
        let a = simulation.get_position(0).unwrap();
        let b = simulation.get_position(1).unwrap();
        let (dx, dy, dz) = (b.x - a.x, b.y - a.y, b.z - a.z);
        dx * dx + dy * dy + dz * dz
    }

    mod lifecycle {
        use super::*;

        #[test]
        fn staging_is_rejected_after_initialize() {
            let mut simulation = staged_dimer(7);
            simulation.initialize().unwrap();
            assert_eq!(
                simulation.set_position(0, 3, 3, 3),
                Err(EngineError::InvalidState {
                    operation: "set_position",
                    state: "initialized"
                })
            );
            assert_eq!(
                simulation.set_box_size(16, 16, 16),
                Err(EngineError::InvalidState {
                    operation: "set_box_size",
                    state: "initialized"
                })
            );
        }

        #[test]
        fn double_initialize_is_rejected() {
            let mut simulation = staged_dimer(7);
            simulation.initialize().unwrap();
            assert_eq!(
                simulation.initialize(),
                Err(EngineError::InvalidState {
                    operation: "initialize",
                    state: "initialized"
                })
            );
        }

        #[test]
        fn monomer_count_is_staged_once() {
            let mut simulation = Simulation::<i32>::new();
            simulation.set_num_monomers(2).unwrap();
            assert_eq!(
                simulation.set_num_monomers(3),
                Err(EngineError::InvalidState {
                    operation: "set_num_monomers",
                    state: "holding a staged system"
                })
            );
        }

        #[test]
        fn sweeping_and_verifying_require_initialize() {
            let mut simulation = Simulation::<i32>::new();
            assert!(matches!(
                simulation.run_sweeps(1),
                Err(EngineError::InvalidState { .. })
            ));
            assert!(matches!(
                simulation.verify(),
                Err(EngineError::InvalidState { .. })
            ));
        }

        #[test]
        fn cleanup_returns_to_the_constructed_configuration() {
            let mut simulation = staged_dimer(7);
            simulation.initialize().unwrap();
            simulation.run_sweeps(5).unwrap();
            simulation.cleanup();

            assert!(simulation.species_count().is_none());
            assert_eq!(
                simulation.get_position(0),
                Err(EngineError::Config(ConfigError::MonomerCountNotConfigured))
            );
            // The whole cycle can be staged and run again.
            let mut again = staged_dimer(7);
            again.initialize().unwrap();
            simulation.set_box_size(8, 8, 8).unwrap();
            simulation.set_num_monomers(2).unwrap();
        }
    }

    mod configuration_errors {
        use super::*;
        use crate::core::models::bonds::BondSetError;
        use crate::core::models::lattice::GeometryError;

        #[test]
        fn non_power_of_two_boxes_are_rejected_at_staging() {
            let mut simulation = Simulation::<i32>::new();
            assert_eq!(
                simulation.set_box_size(8, 12, 8),
                Err(EngineError::Config(ConfigError::Geometry(
                    GeometryError::NotPowerOfTwo {
                        axis: Axis::Y,
                        extent: 12
                    }
                )))
            );
        }

        #[test]
        fn periodicity_mismatch_is_fatal_to_the_call() {
            let mut simulation = Simulation::<i32>::new();
            assert_eq!(
                simulation.set_periodicity(true, false, true),
                Err(EngineError::Config(ConfigError::PeriodicityMismatch {
                    requested: [true, false, true],
                    configured: [true, true, true],
                }))
            );
            // The engine stays valid for retry.
            simulation.set_periodicity(true, true, true).unwrap();
        }

        #[test]
        fn initialize_rejects_an_incomplete_bond_table() {
            let mut simulation = Simulation::<i32>::new();
            simulation.set_box_size(8, 8, 8).unwrap();
            simulation.set_num_monomers(1).unwrap();
            simulation.set_position(0, 2, 2, 2).unwrap();
            simulation.set_allowed_bond(2, 0, 0, true).unwrap();
            assert_eq!(
                simulation.initialize(),
                Err(EngineError::Config(ConfigError::BondSet(
                    BondSetError::WrongAllowedCount { found: 1 }
                )))
            );
            // Nothing was frozen; staging continues to work.
            simulation.set_position(0, 3, 3, 3).unwrap();
        }

        #[test]
        fn walls_reject_out_of_box_staged_positions() {
            let config = SimulationConfig {
                periodic: [false, true, true],
                ..Default::default()
            };
            let mut simulation = Simulation::<i32>::with_config(config);
            simulation.set_box_size(8, 8, 8).unwrap();
            simulation.set_num_monomers(1).unwrap();
            // The cube spans x ∈ {7, 8}: past the wall.
            simulation.set_position(0, 7, 3, 3).unwrap();
            stage_classical_bonds(&mut simulation);
            assert_eq!(
                simulation.initialize(),
                Err(EngineError::Config(ConfigError::CoordinateOutOfBox {
                    index: 0,
                    axis: Axis::X,
                    value: 7,
                    extent: 8,
                }))
            );
        }
    }

    mod scenarios {
        use super::*;

        #[test]
        fn isolated_dimer_keeps_its_bond_inside_the_allowed_band() {
            let mut simulation = staged_dimer(1);
            simulation.initialize().unwrap();

            for _ in 0..10 {
                simulation.run_sweeps(100).unwrap();
                let d2 = squared_bond_length(&simulation);
                assert!((4..=10).contains(&d2), "bond length² left [4, 10]: {d2}");
                simulation.verify().unwrap();
            }

            let dims = *simulation.state().unwrap().committed.dims();
            for index in 0..2 {
                let p = simulation.get_position(index).unwrap();
                for axis in Axis::ALL {
                    let folded = dims.fold(axis, [p.x, p.y, p.z][axis.as_index()]);
                    assert!((0..8).contains(&folded));
                }
            }
            assert!(simulation.statistics().committed > 0, "the dimer never moved");
        }

        #[test]
        fn six_cycle_colors_into_exactly_two_species() {
            let mut simulation = Simulation::<i32>::new();
            simulation.set_box_size(16, 16, 16).unwrap();
            simulation.set_num_monomers(6).unwrap();
            // A hexagon of (2,0,0) / (0,2,0) bonds.
            let ring = [
                (2, 2, 2),
                (4, 2, 2),
                (6, 2, 2),
                (6, 4, 2),
                (4, 4, 2),
                (2, 4, 2),
            ];
            for (i, (x, y, z)) in ring.into_iter().enumerate() {
                simulation.set_position(i, x, y, z).unwrap();
            }
            for i in 0..6 {
                simulation.add_bond(i, (i + 1) % 6).unwrap();
            }
            stage_classical_bonds(&mut simulation);
            simulation.initialize().unwrap();

            assert_eq!(simulation.species_count(), Some(2));
            simulation.run_sweeps(50).unwrap();
            simulation.verify().unwrap();
        }

        #[test]
        fn zero_sweeps_is_a_no_op() {
            let mut simulation = staged_dimer(9);
            simulation.initialize().unwrap();
            let before = [
                simulation.get_position(0).unwrap(),
                simulation.get_position(1).unwrap(),
            ];
            let lattice_before = simulation.state().unwrap().committed.snapshot();

            simulation.run_sweeps(0).unwrap();

            assert_eq!(simulation.get_position(0).unwrap(), before[0]);
            assert_eq!(simulation.get_position(1).unwrap(), before[1]);
            assert_eq!(
                simulation.state().unwrap().committed.snapshot(),
                lattice_before
            );
            assert_eq!(simulation.statistics().attempted, 0);
        }

        #[test]
        fn identical_seeds_give_bit_identical_trajectories() {
            let mut first = staged_dimer(123);
            let mut second = staged_dimer(123);
            first.initialize().unwrap();
            second.initialize().unwrap();

            for _ in 0..25 {
                first.run_sweeps(2).unwrap();
                second.run_sweeps(2).unwrap();
                assert_eq!(
                    first.get_position(0).unwrap(),
                    second.get_position(0).unwrap()
                );
                assert_eq!(
                    first.get_position(1).unwrap(),
                    second.get_position(1).unwrap()
                );
            }
            assert_eq!(first.statistics(), second.statistics());
        }

        #[test]
        fn reinitializing_after_cleanup_reproduces_the_run() {
            let mut simulation = staged_dimer(77);
            simulation.initialize().unwrap();
            simulation.run_sweeps(20).unwrap();
            let reference = [
                simulation.get_position(0).unwrap(),
                simulation.get_position(1).unwrap(),
            ];

            simulation.cleanup();
            let mut simulation = staged_dimer(77);
            simulation.initialize().unwrap();
            simulation.run_sweeps(20).unwrap();

            assert_eq!(simulation.get_position(0).unwrap(), reference[0]);
            assert_eq!(simulation.get_position(1).unwrap(), reference[1]);
        }

        #[test]
        fn walls_confine_a_monomer_in_a_non_periodic_axis() {
            let config = SimulationConfig {
                periodic: [false, true, true],
                ..Default::default()
            };
            let mut simulation = Simulation::<i32>::with_config(config);
            simulation.set_box_size(8, 8, 8).unwrap();
            simulation.set_periodicity(false, true, true).unwrap();
            simulation.set_num_monomers(1).unwrap();
            simulation.set_position(0, 0, 3, 3).unwrap();
            stage_classical_bonds(&mut simulation);
            simulation.initialize().unwrap();

            for _ in 0..100 {
                simulation.run_sweeps(1).unwrap();
                let p = simulation.get_position(0).unwrap();
                assert!((0..7).contains(&p.x), "x = {} escaped the walls", p.x);
            }
            simulation.verify().unwrap();
        }

        #[test]
        fn narrow_positions_behave_like_wide_ones() {
            let mut simulation = Simulation::<i16>::new();
            simulation.set_box_size(8, 8, 8).unwrap();
            simulation.set_seed(5).unwrap();
            simulation.set_num_monomers(2).unwrap();
            simulation.set_position(0, 2, 2, 2).unwrap();
            simulation.set_position(1, 4, 2, 2).unwrap();
            simulation.add_bond(0, 1).unwrap();
            stage_classical_bonds(&mut simulation);
            simulation.initialize().unwrap();
            simulation.run_sweeps(200).unwrap();
            simulation.verify().unwrap();

            let a = simulation.get_position(0).unwrap();
            let b = simulation.get_position(1).unwrap();
            let (dx, dy, dz) = (
                i32::from(b.x - a.x),
                i32::from(b.y - a.y),
                i32::from(b.z - a.z),
            );
            assert!((4..=10).contains(&(dx * dx + dy * dy + dz * dz)));
        }

        #[test]
        fn attributes_and_bonds_survive_staging() {
            let mut simulation = staged_dimer(3);
            simulation.set_attribute(1, -7).unwrap();
            assert_eq!(simulation.get_attribute(1), Ok(-7));
            assert_eq!(simulation.bonds(), &[(0, 1)]);
            simulation.initialize().unwrap();
            assert_eq!(simulation.get_attribute(1), Ok(-7));
        }
    }
}
