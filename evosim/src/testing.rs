//! Fake engines and fixtures shared by unit tests.
use crate::genome::{GeneBounds, GeneSpace, Genome};
use crate::individuals::{IndividualId, Position};
use crate::populations::{GenePool, Objective};
use crate::simulation::{PhysicsEngine, SimulationConfig, SimulationFailure};

use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// First gene making [`LineEngine`] report an engine error.
pub(crate) const FAIL_MARKER: f32 = -1000.0;
/// First gene making [`LineEngine`] panic.
pub(crate) const CRASH_MARKER: f32 = -2000.0;

/// Moves a point in a straight line from the origin to
/// `(genes[0], genes[1])` over `steps` steps.
pub(crate) struct LineEngine {
    steps: usize,
    target: Option<(f32, f32)>,
    position: Option<Position>,
    removals: Option<Arc<AtomicUsize>>,
}

impl LineEngine {
    pub(crate) fn new(steps: usize) -> LineEngine {
        LineEngine {
            steps,
            target: None,
            position: None,
            removals: None,
        }
    }

    pub(crate) fn counting_removals(steps: usize, removals: Arc<AtomicUsize>) -> LineEngine {
        LineEngine {
            removals: Some(removals),
            ..LineEngine::new(steps)
        }
    }
}

impl PhysicsEngine for LineEngine {
    fn spawn(&mut self, genome: &Genome) -> Result<Position, SimulationFailure> {
        let genes = genome.genes();
        if genes.len() < 2 {
            return Err(SimulationFailure::InvalidGenome("expected two genes".into()));
        }
        self.target = Some((genes[0], genes[1]));
        self.position = Some(Position::ORIGIN);
        Ok(Position::ORIGIN)
    }

    fn step(&mut self, step: usize) -> Result<(), SimulationFailure> {
        let (x, y) = self
            .target
            .ok_or_else(|| SimulationFailure::Engine("nothing spawned".into()))?;
        if x == FAIL_MARKER {
            return Err(SimulationFailure::Engine("forced failure".into()));
        }
        if x == CRASH_MARKER {
            panic!("forced crash");
        }
        let progress = (step + 1) as f32 / self.steps as f32;
        self.position = Some(Position::new(x * progress, y * progress, 0.0));
        Ok(())
    }

    fn position(&self) -> Option<Position> {
        self.position
    }

    fn remove_simulation(&mut self) {
        self.target = None;
        self.position = None;
        if let Some(removals) = &self.removals {
            removals.fetch_add(1, Ordering::SeqCst);
        }
    }
}

/// Rollouts of exactly `steps` steps, recording every
/// step, scored on reaching the origin.
pub(crate) fn line_config(steps: usize) -> SimulationConfig {
    SimulationConfig {
        fps: NonZeroUsize::new(steps).unwrap(),
        duration_secs: 1.0,
        objective: Objective::ReachTarget,
        ..SimulationConfig::zero()
    }
}

/// Generation 0 pool of two-gene genomes.
pub(crate) fn line_pool(genes: &[[f32; 2]]) -> GenePool {
    GenePool::seeded(0, genes.iter().map(|g| Genome::from_genes(g.to_vec())).collect())
}

/// Genes in `[0, 1]`.
pub(crate) fn unit_space(len: usize) -> GeneSpace {
    GeneSpace::uniform(len, GeneBounds::new(0.0, 1.0).unwrap())
}

/// Generation 0 pool of two-gene genomes in [`unit_space`],
/// evaluated with the passed fitness values. `None` marks
/// a failed simulation.
pub(crate) fn evaluated_pool(fitness: &[Option<f32>]) -> GenePool {
    let n = fitness.len() as f32;
    let mut pool = GenePool::seeded(
        0,
        (0..fitness.len())
            .map(|i| {
                let g = (i as f32 + 1.0) / (n + 1.0);
                Genome::from_genes(vec![g, 1.0 - g])
            })
            .collect(),
    );
    for (i, value) in fitness.iter().enumerate() {
        let individual = pool.get_mut(IndividualId(0, i)).unwrap();
        match value {
            Some(f) => individual.record_success(vec![Position::ORIGIN], f.abs(), *f),
            None => individual.record_failure(vec![], SimulationFailure::Diverged { step: 0 }),
        }
    }
    pool
}
