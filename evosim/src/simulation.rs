//! Physics-based fitness evaluation.
//!
//! A [`PhysicsEngine`] runs one body at a time.
//! [`simulate_individual`] drives a single rollout,
//! and [`simulate_pop`] spreads a whole population over
//! a pool of workers, each owning its own engine.
mod config;
mod errors;
mod orchestrator;

pub use config::{Playback, SimulationConfig};
pub use errors::{OrchestrationError, SimulationFailure};
pub use orchestrator::{
    merge_results, simulate_multi_core, simulate_pop, worker, Evaluation, SimulationOutcome,
    SimulationTask,
};

use crate::genome::Genome;
use crate::individuals::Position;
use crate::populations::Objective;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Instant;

/// Identifies a worker and the engine it owns.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct SimulationId(pub usize);

/// A physics backend able to simulate one body at a time.
///
/// Engines are owned by a single worker and never shared.
/// Each call to `spawn` starts a fresh simulation,
/// discarding whatever the engine held before.
pub trait PhysicsEngine {
    /// Builds the body encoded by `genome` and
    /// returns its starting position.
    fn spawn(&mut self, genome: &Genome) -> Result<Position, SimulationFailure>;

    /// Advances the simulation by one timestep.
    /// `step` counts steps since the last `spawn`.
    fn step(&mut self, step: usize) -> Result<(), SimulationFailure>;

    /// Current position of the simulated body,
    /// or `None` if nothing is spawned.
    fn position(&self) -> Option<Position>;

    /// Draws the current state. Does nothing by default.
    fn render(&mut self) {}

    /// Releases the resources of the current simulation.
    ///
    /// Must be safe to call any number of times, including
    /// before anything was spawned.
    fn remove_simulation(&mut self);
}

/// Cooperative cancellation flag shared by the
/// generation loop, the orchestrator and every rollout.
#[derive(Clone, Default, Debug)]
pub struct StopSignal(Arc<AtomicBool>);

impl StopSignal {
    pub fn new() -> StopSignal {
        StopSignal::default()
    }

    /// Asks every holder of the signal to stop.
    pub fn raise(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_raised(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Result of a completed rollout.
#[derive(Clone, PartialEq, Debug)]
pub struct Rollout {
    /// Sampled positions, always including the
    /// starting and the final one.
    pub trajectory: Vec<Position>,
    /// Number of steps simulated.
    pub steps: usize,
    /// Whether the rollout ended early at the target.
    pub reached_target: bool,
}

/// Simulates `genome` on `engine` until the configured
/// duration elapses or the target is reached.
///
/// The caller remains responsible for calling
/// [`PhysicsEngine::remove_simulation`] afterwards.
///
/// # Errors
/// Fails if the engine does, if the body reaches a non-finite
/// position, if the wall-clock timeout runs out, or if `stop`
/// is raised.
pub fn simulate_individual<E: PhysicsEngine + ?Sized>(
    engine: &mut E,
    genome: &Genome,
    config: &SimulationConfig,
    stop: &StopSignal,
) -> Result<Rollout, SimulationFailure> {
    let started = Instant::now();
    let timeout = config.timeout();
    let frame_delay = config.frame_delay();
    let record_every = config.record_every.get();
    let tolerance = match config.objective {
        Objective::ReachTarget => config.target_tolerance,
        Objective::Displacement => None,
    };

    let start = engine.spawn(genome)?;
    if !start.is_finite() {
        return Err(SimulationFailure::Diverged { step: 0 });
    }
    let mut trajectory = vec![start];
    let mut last_recorded = true;
    let mut current = start;
    let mut steps = 0;
    let mut reached_target = false;

    for step in 0..config.max_steps() {
        if stop.is_raised() {
            return Err(SimulationFailure::Interrupted);
        }
        if timeout.map_or(false, |t| started.elapsed() > t) {
            return Err(SimulationFailure::Timeout { step });
        }

        engine.step(step)?;
        current = engine
            .position()
            .ok_or_else(|| SimulationFailure::Engine("simulated body vanished".into()))?;
        if !current.is_finite() {
            return Err(SimulationFailure::Diverged { step });
        }
        steps = step + 1;

        last_recorded = steps % record_every == 0;
        if last_recorded {
            trajectory.push(current);
        }
        if let Some(delay) = frame_delay {
            engine.render();
            thread::sleep(delay);
        }
        if tolerance.map_or(false, |t| current.planar_distance(&config.target) <= t) {
            reached_target = true;
            break;
        }
    }

    if !last_recorded {
        trajectory.push(current);
    }
    Ok(Rollout {
        trajectory,
        steps,
        reached_target,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{line_config, LineEngine};

    #[test]
    fn trajectory_sampling() {
        let config = SimulationConfig {
            record_every: std::num::NonZeroUsize::new(3).unwrap(),
            ..line_config(10)
        };
        let mut engine = LineEngine::new(10);
        let genome = Genome::from_genes(vec![1.0, 0.0]);
        let rollout = simulate_individual(&mut engine, &genome, &config, &StopSignal::new()).unwrap();

        assert_eq!(rollout.steps, 10);
        // Start, steps 3, 6, 9, then the unrecorded final step.
        assert_eq!(rollout.trajectory.len(), 5);
        assert_eq!(rollout.trajectory[0], Position::ORIGIN);
        assert_eq!(*rollout.trajectory.last().unwrap(), Position::new(1.0, 0.0, 0.0));
        assert!(!rollout.reached_target);
    }

    #[test]
    fn final_step_is_not_recorded_twice() {
        let config = SimulationConfig {
            record_every: std::num::NonZeroUsize::new(5).unwrap(),
            ..line_config(10)
        };
        let mut engine = LineEngine::new(10);
        let genome = Genome::from_genes(vec![1.0, 1.0]);
        let rollout = simulate_individual(&mut engine, &genome, &config, &StopSignal::new()).unwrap();
        assert_eq!(rollout.trajectory.len(), 3);
    }

    #[test]
    fn stops_early_at_target() {
        let config = SimulationConfig {
            target: Position::new(0.5, 0.0, 0.0),
            target_tolerance: Some(0.01),
            ..line_config(10)
        };
        let mut engine = LineEngine::new(10);
        let genome = Genome::from_genes(vec![1.0, 0.0]);
        let rollout = simulate_individual(&mut engine, &genome, &config, &StopSignal::new()).unwrap();
        assert!(rollout.reached_target);
        assert_eq!(rollout.steps, 5);
    }

    #[test]
    fn tolerance_is_ignored_for_displacement() {
        let config = SimulationConfig {
            objective: Objective::Displacement,
            target: Position::new(0.5, 0.0, 0.0),
            target_tolerance: Some(0.01),
            ..line_config(10)
        };
        let mut engine = LineEngine::new(10);
        let genome = Genome::from_genes(vec![1.0, 0.0]);
        let rollout = simulate_individual(&mut engine, &genome, &config, &StopSignal::new()).unwrap();
        assert!(!rollout.reached_target);
        assert_eq!(rollout.steps, 10);
    }

    #[test]
    fn divergence_and_interruption() {
        let config = line_config(10);
        let mut engine = LineEngine::new(10);
        let genome = Genome::from_genes(vec![f32::NAN, 0.0]);
        assert_eq!(
            simulate_individual(&mut engine, &genome, &config, &StopSignal::new()),
            Err(SimulationFailure::Diverged { step: 0 })
        );

        let stop = StopSignal::new();
        stop.raise();
        let genome = Genome::from_genes(vec![1.0, 0.0]);
        assert_eq!(
            simulate_individual(&mut engine, &genome, &config, &stop),
            Err(SimulationFailure::Interrupted)
        );
    }

    #[test]
    fn stop_signal_is_shared_between_clones() {
        let stop = StopSignal::new();
        let clone = stop.clone();
        assert!(!stop.is_raised());
        clone.raise();
        assert!(stop.is_raised());
    }
}
