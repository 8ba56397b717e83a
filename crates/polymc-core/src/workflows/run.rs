use crate::core::models::bonds::BondTable;
use crate::core::models::position::PositionValue;
use crate::core::models::system::PolymerSystem;
use crate::engine::config::SimulationConfig;
use crate::engine::error::EngineError;
use crate::engine::progress::{Progress, ProgressReporter};
use crate::engine::simulation::Simulation;
use crate::engine::state::SweepStatistics;
use nalgebra::Point3;
use tracing::{info, instrument};

/// Parameters of a complete run.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub simulation: SimulationConfig,
    /// Monte-Carlo steps to execute.
    pub sweeps: usize,
    /// Run the invariant verifier every this many sweeps. The verifier
    /// always runs once more after the final sweep.
    pub verify_interval: Option<usize>,
}

/// Result of a run: committed positions in loader order plus the
/// acceptance counters.
#[derive(Debug, Clone)]
pub struct RunReport<P: PositionValue> {
    pub positions: Vec<Point3<P>>,
    pub statistics: SweepStatistics,
}

/// Stages, initializes, sweeps and verifies a system in one call.
///
/// The sweep loop reports progress after every Monte-Carlo step and runs
/// the O(N) verifier at the configured interval, so a corrupted trajectory
/// aborts close to the step that broke it instead of at the end of the
/// run.
#[instrument(skip_all, name = "equilibration_workflow", fields(sweeps = config.sweeps))]
pub fn run<P: PositionValue>(
    system: PolymerSystem<P>,
    table: BondTable,
    config: &RunConfig,
    reporter: &ProgressReporter,
) -> Result<RunReport<P>, EngineError> {
    let mut simulation = Simulation::from_parts(system, table, config.simulation.clone());
    simulation.initialize()?;
    info!(
        monomers = simulation.monomer_count(),
        species = simulation.species_count().unwrap_or(0),
        "run initialized"
    );

    reporter.report(Progress::RunStart {
        total_sweeps: config.sweeps as u64,
    });

    for sweep in 1..=config.sweeps as u64 {
        simulation.run_sweeps(1)?;
        reporter.report(Progress::SweepFinish { completed: sweep });

        if let Some(interval) = config.verify_interval {
            if interval > 0 && sweep % interval as u64 == 0 {
                simulation.verify()?;
                reporter.report(Progress::Verified { sweep });
            }
        }
    }

    simulation.verify()?;
    reporter.report(Progress::RunFinish);

    let positions = (0..simulation.monomer_count())
        .map(|index| simulation.get_position(index))
        .collect::<Result<Vec<_>, _>>()?;
    let statistics = simulation.statistics();
    info!(
        acceptance = statistics.acceptance(),
        moves = statistics.committed,
        "run finished"
    );

    Ok(RunReport {
        positions,
        statistics,
    })
}
