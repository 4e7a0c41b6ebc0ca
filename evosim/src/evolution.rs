//! The generation loop: simulate, select, breed,
//! checkpoint, repeat.
mod config;
mod errors;

pub use config::EvolutionConfig;
pub use errors::{ConfigError, EvolutionError};

use crate::genome::GeneSpace;
use crate::individuals::{Individual, IndividualId};
use crate::persistence::{Persistence, PersistenceError};
use crate::populations::logging::{EvolutionLogger, Log};
use crate::populations::{crossing, fitness, selection, GenePool};
use crate::rng::EvolutionRng;
use crate::simulation::{
    simulate_multi_core, OrchestrationError, PhysicsEngine, SimulationId, StopSignal,
};
use crate::tracking::Tracker;

use tracing::{error, info, warn};

/// Where the generation loop currently is.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum LoopState {
    Initializing,
    Simulating,
    Evolving,
    Checkpointing,
    Terminated,
}

/// Outcome of one completed generation.
#[derive(Clone, Debug)]
pub struct GenerationReport {
    /// The generation that was simulated.
    pub generation: usize,
    /// Its statistics.
    pub log: Log,
    /// Its survivors, best first.
    pub survivors: Vec<IndividualId>,
}

/// Outcome of [`Evolution::run`].
#[derive(Clone, Debug)]
pub struct RunSummary {
    /// Generations completed by this call.
    pub completed: usize,
    /// Whether the run ended on the stop signal.
    pub interrupted: bool,
    /// Champion of the last completed generation.
    pub champion: Option<Individual>,
}

/// Drives populations through simulation and breeding.
///
/// The current pool only advances once a full generation has
/// been simulated, bred and (optionally) checkpointed. If any
/// of that fails, the current pool is left untouched, and stays
/// the point to resume from.
pub struct Evolution<F> {
    config: EvolutionConfig,
    space: GeneSpace,
    build_engine: F,
    pool: GenePool,
    last_evaluated: Option<GenePool>,
    logger: EvolutionLogger,
    tracker: Option<Tracker>,
    state: LoopState,
}

impl<E, F> Evolution<F>
where
    E: PhysicsEngine,
    F: Fn(SimulationId) -> E + Sync,
{
    /// Starts a new run from a random root population.
    ///
    /// # Errors
    /// Fails if the configuration does not validate, or the
    /// gene space is empty.
    pub fn new(
        config: EvolutionConfig,
        space: GeneSpace,
        build_engine: F,
    ) -> Result<Evolution<F>, EvolutionError> {
        Self::check(&config, &space)?;
        let pool = GenePool::random(
            config.population.size.get(),
            &space,
            &mut EvolutionRng::genesis(config.seed),
        );
        info!(
            size = pool.len(),
            genes = space.len(),
            seed = config.seed,
            "created root population"
        );
        Ok(Self::assemble(config, space, build_engine, pool, None, None))
    }

    /// Continues a run from a previously saved pool,
    /// statistics and tracker.
    ///
    /// # Errors
    /// Fails if the configuration does not validate, or the
    /// pool is not of the configured size or holds genomes
    /// outside the gene space.
    pub fn resume(
        config: EvolutionConfig,
        space: GeneSpace,
        pool: GenePool,
        logger: Option<EvolutionLogger>,
        tracker: Option<Tracker>,
        build_engine: F,
    ) -> Result<Evolution<F>, EvolutionError> {
        Self::check(&config, &space)?;
        if pool.len() != config.population.size.get() {
            return Err(ConfigError::PopulationSizeMismatch {
                expected: config.population.size.get(),
                found: pool.len(),
            }
            .into());
        }
        if let Some(individual) = pool.individuals().find(|i| !space.contains(i.genome())) {
            return Err(ConfigError::IncompatibleGenome {
                id: individual.id(),
            }
            .into());
        }
        info!(generation = pool.generation(), "resuming evolution");
        Ok(Self::assemble(config, space, build_engine, pool, logger, tracker))
    }

    /// Resumes from the latest generation stored in
    /// `persistence`, or starts a new run if it holds none.
    pub fn resume_from(
        config: EvolutionConfig,
        space: GeneSpace,
        persistence: &dyn Persistence,
        build_engine: F,
    ) -> Result<Evolution<F>, EvolutionError> {
        match persistence.latest_generation()? {
            None => Self::new(config, space, build_engine),
            Some(generation) => {
                let pool = persistence.load_gene_pool(generation)?;
                let logger = persistence.load_stats()?;
                let tracker = persistence.load_tracker()?;
                Self::resume(config, space, pool, logger, tracker, build_engine)
            }
        }
    }

    fn check(config: &EvolutionConfig, space: &GeneSpace) -> Result<(), ConfigError> {
        config.validate()?;
        if space.is_empty() {
            return Err(ConfigError::EmptyGeneSpace);
        }
        Ok(())
    }

    fn assemble(
        config: EvolutionConfig,
        space: GeneSpace,
        build_engine: F,
        pool: GenePool,
        logger: Option<EvolutionLogger>,
        tracker: Option<Tracker>,
    ) -> Evolution<F> {
        let logger = logger.unwrap_or_else(|| EvolutionLogger::new(config.reporting_level));
        let tracker = match (&config.tracking, tracker) {
            (None, _) => None,
            (Some(mode), Some(tracker)) if tracker.mode() == mode => Some(tracker),
            (Some(mode), _) => Some(Tracker::new(mode.clone())),
        };
        Evolution {
            config,
            space,
            build_engine,
            pool,
            last_evaluated: None,
            logger,
            tracker,
            state: LoopState::Initializing,
        }
    }

    /// Simulates the current generation, breeds the next one
    /// and checkpoints both to `persistence`, if given.
    ///
    /// # Errors
    /// Any failure leaves the current generation in place,
    /// along with its statistics, tracker and loop state.
    pub fn step<'p>(
        &mut self,
        stop: &StopSignal,
        persistence: Option<&mut (dyn Persistence + 'p)>,
    ) -> Result<GenerationReport, EvolutionError> {
        let state = self.state;
        let result = self.advance(stop, persistence);
        if result.is_err() {
            self.state = state;
        }
        result
    }

    fn advance<'p>(
        &mut self,
        stop: &StopSignal,
        persistence: Option<&mut (dyn Persistence + 'p)>,
    ) -> Result<GenerationReport, EvolutionError> {
        let generation = self.pool.generation();

        self.state = LoopState::Simulating;
        let evaluated = simulate_multi_core(
            &self.pool,
            self.config.num_cores,
            &self.config.simulation,
            &self.build_engine,
            stop,
        )?;

        self.state = LoopState::Evolving;
        let population = &self.config.population;
        let survivors = selection(&evaluated, &fitness(&evaluated), population.survival_fraction)
            .map_err(|source| EvolutionError::Selection { generation, source })?;
        let next = crossing(
            &evaluated,
            &survivors,
            population.size.get(),
            population,
            &self.space,
            &mut EvolutionRng::for_generation(self.config.seed, generation),
        )
        .map_err(|source| EvolutionError::Selection { generation, source })?;

        let log = self.logger.log(&evaluated).clone();
        if let Some(tracker) = &mut self.tracker {
            tracker.record(&evaluated);
        }

        if let Some(persistence) = persistence {
            self.state = LoopState::Checkpointing;
            if let Err(e) = self.checkpoint(persistence, &evaluated, &next) {
                self.logger.truncate(generation);
                if let Some(tracker) = &mut self.tracker {
                    tracker.forget(generation);
                }
                return Err(e.into());
            }
        }

        self.pool = next;
        self.last_evaluated = Some(evaluated);
        self.state = LoopState::Simulating;
        Ok(GenerationReport {
            generation,
            log,
            survivors,
        })
    }

    fn checkpoint<'p>(
        &self,
        persistence: &mut (dyn Persistence + 'p),
        evaluated: &GenePool,
        next: &GenePool,
    ) -> Result<(), PersistenceError> {
        persistence.save_gene_pool(evaluated)?;
        persistence.save_stats(&self.logger)?;
        if let Some(tracker) = &self.tracker {
            persistence.save_tracker(tracker)?;
        }
        // The next pool is written last: its presence
        // marks the generation as complete.
        persistence.save_gene_pool(next)
    }

    /// Runs generations until the configured count is
    /// reached or `stop` is raised.
    ///
    /// # Errors
    /// Stops at the first failing generation. Cancellation
    /// is not an error: it ends the run with `interrupted` set.
    pub fn run<'p>(
        &mut self,
        stop: &StopSignal,
        mut persistence: Option<&mut (dyn Persistence + 'p)>,
    ) -> Result<RunSummary, EvolutionError> {
        let mut completed = 0;
        let mut interrupted = false;

        while self.pool.generation() < self.config.generations {
            if stop.is_raised() {
                interrupted = true;
                break;
            }
            match self.step(stop, persistence.as_deref_mut()) {
                Ok(report) => {
                    completed += 1;
                    info!(
                        generation = report.generation,
                        champion = ?report.log.champion,
                        best_fitness = ?report.log.champion_fitness,
                        mean_distance = ?report.log.distance.map(|d| d.mean),
                        failures = report.log.failures,
                        "generation complete"
                    );
                }
                Err(EvolutionError::Orchestration(OrchestrationError::Cancelled {
                    generation,
                })) => {
                    warn!(generation, "generation cancelled, nothing was checkpointed");
                    interrupted = true;
                    break;
                }
                Err(e) => {
                    error!(generation = self.pool.generation(), error = %e, "evolution failed");
                    self.state = LoopState::Terminated;
                    return Err(e);
                }
            }
        }

        self.state = LoopState::Terminated;
        Ok(RunSummary {
            completed,
            interrupted,
            champion: self
                .last_evaluated
                .as_ref()
                .and_then(GenePool::champion)
                .cloned(),
        })
    }
}

impl<F> Evolution<F> {
    /// The next generation to be simulated.
    pub fn pool(&self) -> &GenePool {
        &self.pool
    }

    /// The most recently simulated generation, if
    /// any was simulated since construction.
    pub fn last_evaluated(&self) -> Option<&GenePool> {
        self.last_evaluated.as_ref()
    }

    pub fn generation(&self) -> usize {
        self.pool.generation()
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    pub fn logger(&self) -> &EvolutionLogger {
        &self.logger
    }

    pub fn tracker(&self) -> Option<&Tracker> {
        self.tracker.as_ref()
    }

    pub fn config(&self) -> &EvolutionConfig {
        &self.config
    }

    pub fn space(&self) -> &GeneSpace {
        &self.space
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::genome::GeneBounds;
    use crate::individuals::Position;
    use crate::logging::ReportingLevel;
    use crate::persistence::RonDirectory;
    use crate::populations::PopulationConfig;
    use crate::testing::{line_config, LineEngine, FAIL_MARKER};
    use crate::tracking::TrackMode;
    use crate::{CrossoverPolicy, MutationPolicy, ParentSampling};

    use std::io;
    use std::num::NonZeroUsize;

    fn config(generations: usize) -> EvolutionConfig {
        EvolutionConfig {
            population: PopulationConfig {
                size: NonZeroUsize::new(12).unwrap(),
                survival_fraction: 0.25,
                elitism: 1,
                crossover: CrossoverPolicy::Blend { alpha: 0.2 },
                parent_sampling: ParentSampling::RankBiased { coefficient: 1.1 },
                child_mutation_chance: 0.5,
                mutation_rate: 0.3,
                mutation: MutationPolicy::Nudge { power: 0.1 },
            },
            simulation: crate::SimulationConfig {
                target: Position::new(0.6, -0.3, 0.0),
                ..line_config(8)
            },
            generations,
            num_cores: NonZeroUsize::new(3),
            seed: 1234,
            tracking: Some(TrackMode::Champions(2)),
            reporting_level: ReportingLevel::Champion,
        }
    }

    fn space() -> GeneSpace {
        GeneSpace::uniform(2, GeneBounds::new(-1.0, 1.0).unwrap())
    }

    fn build(_: SimulationId) -> LineEngine {
        LineEngine::new(8)
    }

    /// A [`RonDirectory`] whose statistics writes
    /// can be made to fail.
    struct FlakyStore {
        inner: RonDirectory,
        broken: bool,
    }

    impl Persistence for FlakyStore {
        fn save_gene_pool(&mut self, pool: &GenePool) -> Result<(), PersistenceError> {
            self.inner.save_gene_pool(pool)
        }

        fn load_gene_pool(&self, generation: usize) -> Result<GenePool, PersistenceError> {
            self.inner.load_gene_pool(generation)
        }

        fn save_stats(&mut self, stats: &EvolutionLogger) -> Result<(), PersistenceError> {
            if self.broken {
                return Err(PersistenceError::Io {
                    path: self.inner.root().join("stats.ron"),
                    source: io::Error::new(io::ErrorKind::Other, "disk full"),
                });
            }
            self.inner.save_stats(stats)
        }

        fn load_stats(&self) -> Result<Option<EvolutionLogger>, PersistenceError> {
            self.inner.load_stats()
        }

        fn save_tracker(&mut self, tracker: &Tracker) -> Result<(), PersistenceError> {
            self.inner.save_tracker(tracker)
        }

        fn load_tracker(&self) -> Result<Option<Tracker>, PersistenceError> {
            self.inner.load_tracker()
        }

        fn latest_generation(&self) -> Result<Option<usize>, PersistenceError> {
            self.inner.latest_generation()
        }
    }

    #[test]
    fn runs_the_configured_generations() {
        let mut evolution = Evolution::new(config(5), space(), build).unwrap();
        assert_eq!(evolution.state(), LoopState::Initializing);
        let summary = evolution.run(&StopSignal::new(), None).unwrap();

        assert_eq!(summary.completed, 5);
        assert!(!summary.interrupted);
        assert_eq!(evolution.generation(), 5);
        assert_eq!(evolution.state(), LoopState::Terminated);
        assert_eq!(evolution.pool().len(), 12);
        assert_eq!(evolution.logger().iter().count(), 5);
        assert_eq!(evolution.tracker().unwrap().generations().count(), 5);
        assert!(summary.champion.is_some());
    }

    #[test]
    fn elitism_never_loses_the_best() {
        let mut evolution = Evolution::new(config(6), space(), build).unwrap();
        evolution.run(&StopSignal::new(), None).unwrap();
        let best: Vec<f32> = evolution
            .logger()
            .iter()
            .map(|log| log.champion_fitness.unwrap())
            .collect();
        assert!(best.windows(2).all(|w| w[1] >= w[0]), "{:?}", best);
    }

    #[test]
    fn identical_seeds_give_identical_runs() {
        let run = || {
            let mut evolution = Evolution::new(config(4), space(), build).unwrap();
            evolution.run(&StopSignal::new(), None).unwrap();
            ron::to_string(evolution.pool()).unwrap()
        };
        assert_eq!(run(), run());

        let mut other = Evolution::new(
            EvolutionConfig {
                seed: 99,
                ..config(4)
            },
            space(),
            build,
        )
        .unwrap();
        other.run(&StopSignal::new(), None).unwrap();
        assert_ne!(run(), ron::to_string(other.pool()).unwrap());
    }

    #[test]
    fn resumed_runs_match_uninterrupted_ones() {
        let mut uninterrupted = Evolution::new(config(4), space(), build).unwrap();
        uninterrupted.run(&StopSignal::new(), None).unwrap();

        let dir = tempfile::tempdir().unwrap();
        let mut store = RonDirectory::new(dir.path()).unwrap();
        let mut first_half = Evolution::new(config(2), space(), build).unwrap();
        first_half.run(&StopSignal::new(), Some(&mut store)).unwrap();
        assert_eq!(store.latest_generation().unwrap(), Some(2));

        let mut second_half = Evolution::resume_from(config(4), space(), &store, build).unwrap();
        assert_eq!(second_half.generation(), 2);
        let summary = second_half
            .run(&StopSignal::new(), Some(&mut store))
            .unwrap();

        assert_eq!(summary.completed, 2);
        assert_eq!(
            ron::to_string(second_half.pool()).unwrap(),
            ron::to_string(uninterrupted.pool()).unwrap()
        );
        assert_eq!(second_half.logger().iter().count(), 4);
        assert_eq!(store.latest_generation().unwrap(), Some(4));
    }

    #[test]
    fn failed_checkpoints_leave_the_generation_in_place() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = FlakyStore {
            inner: RonDirectory::new(dir.path()).unwrap(),
            broken: false,
        };
        let mut evolution = Evolution::new(config(3), space(), build).unwrap();
        evolution.step(&StopSignal::new(), Some(&mut store)).unwrap();

        let pool = ron::to_string(evolution.pool()).unwrap();
        let stats = ron::to_string(evolution.logger()).unwrap();
        let tracked: Vec<usize> = evolution.tracker().unwrap().generations().collect();
        let lineage = evolution.tracker().unwrap().lineage().len();
        let state = evolution.state();

        store.broken = true;
        let result = evolution.step(&StopSignal::new(), Some(&mut store));
        assert!(matches!(result, Err(EvolutionError::Persistence(_))));
        assert_eq!(evolution.generation(), 1);
        assert_eq!(evolution.state(), state);
        assert_eq!(ron::to_string(evolution.pool()).unwrap(), pool);
        assert_eq!(ron::to_string(evolution.logger()).unwrap(), stats);
        assert_eq!(evolution.logger().iter().count(), 1);
        let tracker = evolution.tracker().unwrap();
        assert_eq!(tracker.generations().collect::<Vec<_>>(), tracked);
        assert_eq!(tracker.lineage().len(), lineage);
        assert_eq!(store.latest_generation().unwrap(), Some(1));

        // Retrying once storage recovers matches an
        // uninterrupted run.
        store.broken = false;
        evolution.step(&StopSignal::new(), Some(&mut store)).unwrap();
        let mut uninterrupted = Evolution::new(config(2), space(), build).unwrap();
        uninterrupted.run(&StopSignal::new(), None).unwrap();
        assert_eq!(evolution.generation(), 2);
        assert_eq!(
            ron::to_string(evolution.pool()).unwrap(),
            ron::to_string(uninterrupted.pool()).unwrap()
        );
        assert_eq!(evolution.logger().iter().count(), 2);
        assert_eq!(store.latest_generation().unwrap(), Some(2));
    }

    #[test]
    fn raised_stop_interrupts_without_advancing() {
        let stop = StopSignal::new();
        stop.raise();
        let mut evolution = Evolution::new(config(3), space(), build).unwrap();
        let summary = evolution.run(&stop, None).unwrap();
        assert!(summary.interrupted);
        assert_eq!(summary.completed, 0);
        assert_eq!(evolution.generation(), 0);

        let result = evolution.step(&stop, None);
        assert!(matches!(
            result,
            Err(EvolutionError::Orchestration(OrchestrationError::Cancelled { generation: 0 }))
        ));
        assert_eq!(evolution.generation(), 0);
        assert_eq!(evolution.logger().iter().count(), 0);
    }

    #[test]
    fn invalid_configurations_are_rejected_early() {
        let bad = EvolutionConfig {
            population: PopulationConfig {
                elitism: 4,
                ..config(1).population
            },
            ..config(1)
        };
        assert!(matches!(
            Evolution::new(bad, space(), build),
            Err(EvolutionError::Config(ConfigError::ElitismExceedsSurvivors { .. }))
        ));
        assert!(matches!(
            Evolution::new(config(1), GeneSpace::new(vec![]), build),
            Err(EvolutionError::Config(ConfigError::EmptyGeneSpace))
        ));
    }

    #[test]
    fn resumed_pools_must_fit() {
        let small = GenePool::random(3, &space(), &mut EvolutionRng::genesis(0));
        assert!(matches!(
            Evolution::resume(config(2), space(), small, None, None, build),
            Err(EvolutionError::Config(ConfigError::PopulationSizeMismatch {
                expected: 12,
                found: 3
            }))
        ));
        let wide = GeneSpace::uniform(3, GeneBounds::new(-1.0, 1.0).unwrap());
        let misfit = GenePool::random(12, &wide, &mut EvolutionRng::genesis(0));
        assert!(matches!(
            Evolution::resume(config(2), space(), misfit, None, None, build),
            Err(EvolutionError::Config(ConfigError::IncompatibleGenome { .. }))
        ));
    }

    #[test]
    fn failed_individuals_do_not_stop_the_run() {
        let genomes = (0..12)
            .map(|i| {
                let x = if i == 0 { FAIL_MARKER } else { i as f32 / 12.0 };
                crate::Genome::from_genes(vec![x, 0.0])
            })
            .collect();
        let wide = GeneSpace::uniform(2, GeneBounds::new(FAIL_MARKER, 1.0).unwrap());
        let pool = GenePool::seeded(0, genomes);
        let mut evolution = Evolution::resume(config(1), wide, pool, None, None, build).unwrap();
        let report = evolution.step(&StopSignal::new(), None).unwrap();
        assert_eq!(report.log.failures, 1);
        assert!(!report.survivors.contains(&IndividualId(0, 0)));
        assert_eq!(evolution.pool().len(), 12);
    }
}
