use super::{
    simulate_individual, OrchestrationError, PhysicsEngine, SimulationConfig, SimulationFailure,
    SimulationId, StopSignal,
};
use crate::genome::Genome;
use crate::individuals::{Individual, IndividualId, Position};
use crate::populations::GenePool;

use ahash::RandomState;
use crossbeam_channel::{bounded, unbounded};
use rayon::{ThreadPool, ThreadPoolBuilder};
use tracing::{debug, warn};

use std::any::Any;
use std::collections::HashSet;
use std::num::NonZeroUsize;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

/// Tasks queued per worker before the feeder blocks.
const QUEUE_DEPTH: usize = 2;

/// One individual waiting to be simulated.
#[derive(Clone, Debug)]
pub struct SimulationTask {
    pub id: IndividualId,
    pub genome: Arc<Genome>,
}

impl From<&Individual> for SimulationTask {
    fn from(individual: &Individual) -> SimulationTask {
        SimulationTask {
            id: individual.id(),
            genome: Arc::clone(individual.shared_genome()),
        }
    }
}

/// Measured result of a successful rollout.
#[derive(Clone, PartialEq, Debug)]
pub struct Evaluation {
    pub trajectory: Vec<Position>,
    pub distance: f32,
    pub fitness: f32,
}

/// What a worker reports for one individual.
#[derive(Clone, PartialEq, Debug)]
pub struct SimulationOutcome {
    pub id: IndividualId,
    pub result: Result<Evaluation, SimulationFailure>,
}

/// Simulates every task of `subset` sequentially on an
/// engine built from `build_engine`, and returns one
/// outcome per task.
///
/// Failures, including panics, are contained to the
/// individual that caused them. After a panic the engine is
/// discarded and rebuilt. Once the stop signal is raised, the
/// remaining tasks are reported as interrupted without being
/// simulated. The engine's resources are released before
/// returning.
pub fn worker<E, F, I>(
    sim_id: SimulationId,
    subset: I,
    build_engine: &F,
    config: &SimulationConfig,
    stop: &StopSignal,
) -> Vec<SimulationOutcome>
where
    E: PhysicsEngine,
    F: Fn(SimulationId) -> E,
    I: IntoIterator<Item = SimulationTask>,
{
    let mut engine = build_engine(sim_id);
    let mut outcomes = vec![];

    for task in subset {
        if stop.is_raised() {
            outcomes.push(SimulationOutcome {
                id: task.id,
                result: Err(SimulationFailure::Interrupted),
            });
            continue;
        }

        let rollout = panic::catch_unwind(AssertUnwindSafe(|| {
            simulate_individual(&mut engine, &task.genome, config, stop)
        }));
        let result = match rollout {
            Ok(Ok(rollout)) => config
                .objective
                .distance(&rollout.trajectory, config.target)
                .map(|distance| Evaluation {
                    distance,
                    fitness: config.objective.fitness(distance),
                    trajectory: rollout.trajectory,
                })
                .map_err(|e| SimulationFailure::Engine(format!("unmeasurable trajectory: {}", e))),
            Ok(Err(failure)) => Err(failure),
            Err(payload) => {
                let _ = panic::catch_unwind(AssertUnwindSafe(|| engine.remove_simulation()));
                engine = build_engine(sim_id);
                Err(SimulationFailure::Crashed(panic_message(payload.as_ref())))
            }
        };
        engine.remove_simulation();

        match &result {
            Ok(evaluation) => debug!(
                worker = sim_id.0,
                individual = %task.id,
                fitness = evaluation.fitness,
                "individual simulated"
            ),
            Err(SimulationFailure::Interrupted) => {}
            Err(failure) => warn!(
                worker = sim_id.0,
                individual = %task.id,
                error = %failure,
                "simulation failed"
            ),
        }
        outcomes.push(SimulationOutcome {
            id: task.id,
            result,
        });
    }

    engine.remove_simulation();
    outcomes
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        msg.to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Evaluates every individual of `pool` on `num_cores`
/// parallel workers and returns the evaluated snapshot.
///
/// Individuals are fed to the workers through a bounded
/// queue, and outcomes are gathered through a result channel
/// once every worker has returned. The worker count is capped
/// at the population size. If the thread pool cannot be
/// allocated, fewer workers are tried before giving up.
///
/// # Errors
/// Fails if no worker can be allocated, if the stop signal
/// was raised, or if the gathered results do not cover the
/// population exactly once.
pub fn simulate_pop<E, F>(
    pool: &GenePool,
    num_cores: usize,
    config: &SimulationConfig,
    build_engine: &F,
    stop: &StopSignal,
) -> Result<GenePool, OrchestrationError>
where
    E: PhysicsEngine,
    F: Fn(SimulationId) -> E + Sync,
{
    if num_cores == 0 {
        return Err(OrchestrationError::ResourceExhaustion {
            requested: 0,
            reason: "no cores available".to_string(),
        });
    }
    let thread_pool = build_thread_pool(num_cores.min(pool.len()).max(1))?;
    let workers = thread_pool.current_num_threads();
    debug!(
        generation = pool.generation(),
        workers,
        individuals = pool.len(),
        "simulating generation"
    );

    let (task_tx, task_rx) = bounded(workers * QUEUE_DEPTH);
    let (result_tx, result_rx) = unbounded();

    thread_pool.in_place_scope(|scope| {
        for sim_id in 0..workers {
            let task_rx = task_rx.clone();
            let result_tx = result_tx.clone();
            scope.spawn(move |_| {
                let outcomes = worker(SimulationId(sim_id), task_rx, build_engine, config, stop);
                for outcome in outcomes {
                    // The receiver outlives the scope.
                    let _ = result_tx.send(outcome);
                }
            });
        }
        drop(task_rx);

        for individual in pool.individuals() {
            if stop.is_raised() || task_tx.send(SimulationTask::from(individual)).is_err() {
                break;
            }
        }
        drop(task_tx);
    });
    drop(result_tx);

    if stop.is_raised() {
        return Err(OrchestrationError::Cancelled {
            generation: pool.generation(),
        });
    }
    merge_results(pool, result_rx.into_iter())
}

fn build_thread_pool(requested: usize) -> Result<ThreadPool, OrchestrationError> {
    let mut threads = requested;
    loop {
        let built = ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|i| format!("evosim-worker-{}", i))
            .build();
        match built {
            Ok(pool) => return Ok(pool),
            Err(e) if threads > 1 => {
                warn!(
                    requested,
                    attempted = threads,
                    error = %e,
                    "unable to allocate workers, falling back to fewer cores"
                );
                threads /= 2;
            }
            Err(e) => {
                return Err(OrchestrationError::ResourceExhaustion {
                    requested,
                    reason: e.to_string(),
                })
            }
        }
    }
}

/// Records `outcomes` into a copy of `pool`.
///
/// The result only depends on which outcome belongs to which
/// individual, not on the order outcomes arrive in.
///
/// # Errors
/// Fails if any individual of the pool has no outcome, or
/// outcomes are duplicated or belong to unknown individuals.
pub fn merge_results(
    pool: &GenePool,
    outcomes: impl IntoIterator<Item = SimulationOutcome>,
) -> Result<GenePool, OrchestrationError> {
    let mut evaluated = pool.clone();
    let mut seen = HashSet::with_hasher(RandomState::new());
    let mut duplicated = vec![];
    let mut unknown = vec![];

    for outcome in outcomes {
        if !seen.insert(outcome.id) {
            duplicated.push(outcome.id);
            continue;
        }
        match evaluated.get_mut(outcome.id) {
            None => unknown.push(outcome.id),
            Some(individual) => match outcome.result {
                Ok(evaluation) => individual.record_success(
                    evaluation.trajectory,
                    evaluation.distance,
                    evaluation.fitness,
                ),
                Err(failure) => individual.record_failure(vec![], failure),
            },
        }
    }

    let missing: Vec<IndividualId> = pool.ids().filter(|id| !seen.contains(id)).collect();
    if missing.is_empty() && duplicated.is_empty() && unknown.is_empty() {
        Ok(evaluated)
    } else {
        duplicated.sort_unstable();
        duplicated.dedup();
        unknown.sort_unstable();
        Err(OrchestrationError::Mismatch {
            generation: pool.generation(),
            missing,
            duplicated,
            unknown,
        })
    }
}

/// Evaluates `pool` using `cores` workers, or all available
/// cores if `None`.
///
/// When the configuration requests playback, a single worker
/// is used, since only one simulation may own the display.
///
/// # Examples
/// ```
/// use evosim::{
///     simulate_multi_core, GeneBounds, GenePool, GeneSpace, Genome, PhysicsEngine, Position,
///     SimulationConfig, SimulationFailure, SimulationId, StopSignal,
/// };
/// use rand::SeedableRng;
///
/// /// Bodies teleport to the position spelled by their genes.
/// struct Teleport(Option<Position>);
///
/// impl PhysicsEngine for Teleport {
///     fn spawn(&mut self, genome: &Genome) -> Result<Position, SimulationFailure> {
///         let g = genome.genes();
///         self.0 = Some(Position::new(g[0], g[1], 0.0));
///         Ok(Position::ORIGIN)
///     }
///     fn step(&mut self, _step: usize) -> Result<(), SimulationFailure> {
///         Ok(())
///     }
///     fn position(&self) -> Option<Position> {
///         self.0
///     }
///     fn remove_simulation(&mut self) {
///         self.0 = None;
///     }
/// }
///
/// let space = GeneSpace::uniform(2, GeneBounds::new(-1.0, 1.0).unwrap());
/// let mut rng = rand::rngs::StdRng::seed_from_u64(0);
/// let pool = GenePool::random(8, &space, &mut rng);
/// let config = SimulationConfig {
///     duration_secs: 1.0,
///     ..SimulationConfig::zero()
/// };
///
/// let evaluated =
///     simulate_multi_core(&pool, None, &config, &|_: SimulationId| Teleport(None), &StopSignal::new()).unwrap();
/// assert!(evaluated.individuals().all(|i| i.fitness().is_some()));
/// ```
pub fn simulate_multi_core<E, F>(
    pool: &GenePool,
    cores: Option<NonZeroUsize>,
    config: &SimulationConfig,
    build_engine: &F,
    stop: &StopSignal,
) -> Result<GenePool, OrchestrationError>
where
    E: PhysicsEngine,
    F: Fn(SimulationId) -> E + Sync,
{
    let mut num_cores = match cores {
        Some(cores) => cores.get(),
        None => std::thread::available_parallelism()
            .map(NonZeroUsize::get)
            .map_err(|e| OrchestrationError::ResourceExhaustion {
                requested: 0,
                reason: e.to_string(),
            })?,
    };
    if config.playback.is_some() && num_cores > 1 {
        warn!(
            requested = num_cores,
            "playback requires exclusive display access, simulating on a single core"
        );
        num_cores = 1;
    }
    simulate_pop(pool, num_cores, config, build_engine, stop)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::populations::Objective;
    use crate::testing::{line_config, line_pool, LineEngine, CRASH_MARKER, FAIL_MARKER};
    use crate::Genome;

    use std::sync::atomic::{AtomicUsize, Ordering};

    fn fitness_by_id(pool: &GenePool) -> Vec<(IndividualId, Option<f32>)> {
        pool.individuals().map(|i| (i.id(), i.fitness())).collect()
    }

    #[test]
    fn every_individual_is_evaluated_once() {
        let pool = line_pool(&[[0.1, 0.2], [0.3, -0.4], [1.0, 1.0], [-0.5, 0.5], [0.0, 0.0]]);
        let config = line_config(10);
        for cores in 1..=6 {
            let evaluated =
                simulate_pop(&pool, cores, &config, &|_: SimulationId| LineEngine::new(10), &StopSignal::new())
                    .unwrap();
            assert_eq!(evaluated.len(), pool.len());
            assert!(evaluated.individuals().all(|i| i.fitness().is_some()));
            // The input snapshot is left untouched.
            assert!(pool.individuals().all(|i| !i.is_evaluated()));
        }
    }

    #[test]
    fn results_do_not_depend_on_worker_count() {
        let pool = line_pool(&[[0.1, 0.2], [0.3, -0.4], [1.0, 1.0], [-0.5, 0.5]]);
        let config = line_config(20);
        let single =
            simulate_pop(&pool, 1, &config, &|_: SimulationId| LineEngine::new(20), &StopSignal::new()).unwrap();
        let many =
            simulate_pop(&pool, 4, &config, &|_: SimulationId| LineEngine::new(20), &StopSignal::new()).unwrap();
        assert_eq!(fitness_by_id(&single), fitness_by_id(&many));
    }

    #[test]
    fn failures_are_contained() {
        let healthy = line_pool(&[[0.1, 0.2], [0.3, -0.4], [1.0, 1.0]]);
        let faulty = line_pool(&[[0.1, 0.2], [FAIL_MARKER, 0.0], [1.0, 1.0]]);
        let crashing = line_pool(&[[0.1, 0.2], [CRASH_MARKER, 0.0], [1.0, 1.0]]);
        let config = line_config(10);
        let build = |_: SimulationId| LineEngine::new(10);

        let healthy = simulate_pop(&healthy, 2, &config, &build, &StopSignal::new()).unwrap();
        for pool in [faulty, crashing] {
            let evaluated = simulate_pop(&pool, 2, &config, &build, &StopSignal::new()).unwrap();
            assert_eq!(evaluated.len(), 3);
            for (id, fitness) in fitness_by_id(&evaluated) {
                if id == IndividualId(0, 1) {
                    assert_eq!(fitness, None);
                    assert!(evaluated.get(id).unwrap().failure().is_some());
                } else {
                    assert_eq!(fitness, healthy.get(id).unwrap().fitness());
                }
            }
        }
    }

    #[test]
    fn panics_rebuild_the_engine() {
        let built = AtomicUsize::new(0);
        let build = |_: SimulationId| {
            built.fetch_add(1, Ordering::SeqCst);
            LineEngine::new(10)
        };
        let tasks = line_pool(&[[CRASH_MARKER, 0.0], [0.5, 0.5]]);
        let outcomes = worker(
            SimulationId(0),
            tasks.individuals().map(SimulationTask::from),
            &build,
            &line_config(10),
            &StopSignal::new(),
        );
        assert_eq!(built.load(Ordering::SeqCst), 2);
        assert!(matches!(outcomes[0].result, Err(SimulationFailure::Crashed(_))));
        assert!(outcomes[1].result.is_ok());
    }

    #[test]
    fn worker_releases_its_engine() {
        let removals = Arc::new(AtomicUsize::new(0));
        let build = |_: SimulationId| LineEngine::counting_removals(10, Arc::clone(&removals));
        let tasks = line_pool(&[[0.5, 0.5], [0.1, 0.1]]);
        worker(
            SimulationId(3),
            tasks.individuals().map(SimulationTask::from),
            &build,
            &line_config(10),
            &StopSignal::new(),
        );
        // Once per individual and once when the worker is done.
        assert_eq!(removals.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn remove_simulation_is_idempotent() {
        let mut engine = LineEngine::new(10);
        engine.remove_simulation();
        engine.remove_simulation();
        engine.spawn(&Genome::from_genes(vec![1.0, 0.0])).unwrap();
        engine.remove_simulation();
        engine.remove_simulation();
        assert!(engine.position().is_none());
    }

    #[test]
    fn merge_is_order_independent() {
        let pool = line_pool(&[[0.1, 0.2], [0.3, -0.4], [1.0, 1.0], [-0.5, 0.5]]);
        let config = line_config(10);
        let outcomes = worker(
            SimulationId(0),
            pool.individuals().map(SimulationTask::from),
            &|_: SimulationId| LineEngine::new(10),
            &config,
            &StopSignal::new(),
        );
        let forward = merge_results(&pool, outcomes.clone()).unwrap();
        let mut shuffled = outcomes;
        shuffled.rotate_left(1);
        shuffled.swap(0, 2);
        let backward = merge_results(&pool, shuffled.into_iter().rev()).unwrap();

        assert_eq!(fitness_by_id(&forward), fitness_by_id(&backward));
        for (a, b) in forward.individuals().zip(backward.individuals()) {
            assert_eq!(a.trajectory(), b.trajectory());
        }
    }

    #[test]
    fn merge_detects_mismatches() {
        let pool = line_pool(&[[0.1, 0.2], [0.3, -0.4], [1.0, 1.0]]);
        let outcome = |id| SimulationOutcome {
            id,
            result: Err(SimulationFailure::Interrupted),
        };
        let result = merge_results(
            &pool,
            vec![
                outcome(IndividualId(0, 0)),
                outcome(IndividualId(0, 0)),
                outcome(IndividualId(7, 7)),
            ],
        );
        assert_eq!(
            result.unwrap_err(),
            OrchestrationError::Mismatch {
                generation: 0,
                missing: vec![IndividualId(0, 1), IndividualId(0, 2)],
                duplicated: vec![IndividualId(0, 0)],
                unknown: vec![IndividualId(7, 7)],
            }
        );
    }

    #[test]
    fn zero_cores_is_fatal() {
        let pool = line_pool(&[[0.1, 0.2]]);
        let result = simulate_pop(
            &pool,
            0,
            &line_config(10),
            &|_: SimulationId| LineEngine::new(10),
            &StopSignal::new(),
        );
        assert!(matches!(
            result,
            Err(OrchestrationError::ResourceExhaustion { requested: 0, .. })
        ));
    }

    #[test]
    fn raised_stop_cancels_the_generation() {
        let pool = line_pool(&[[0.1, 0.2], [0.3, -0.4]]);
        let stop = StopSignal::new();
        stop.raise();
        let result = simulate_pop(&pool, 2, &line_config(10), &|_: SimulationId| LineEngine::new(10), &stop);
        assert_eq!(result.unwrap_err(), OrchestrationError::Cancelled { generation: 0 });
    }

    #[test]
    fn playback_runs_on_one_worker() {
        let pool = line_pool(&[[0.1, 0.2], [0.3, -0.4], [0.5, 0.5]]);
        let config = SimulationConfig {
            playback: Some(crate::Playback {
                slow_down_factor: 0.0,
            }),
            ..line_config(5)
        };
        let built = AtomicUsize::new(0);
        let build = |_: SimulationId| {
            built.fetch_add(1, Ordering::SeqCst);
            LineEngine::new(5)
        };
        let evaluated = simulate_multi_core(
            &pool,
            NonZeroUsize::new(4),
            &config,
            &build,
            &StopSignal::new(),
        )
        .unwrap();
        assert_eq!(built.load(Ordering::SeqCst), 1);
        assert_eq!(evaluated.len(), 3);
    }

    #[test]
    fn reaching_the_target_exactly_is_optimal() {
        let pool = line_pool(&[[0.75, -0.25]]);
        let config = SimulationConfig {
            target: Position::new(0.75, -0.25, 0.0),
            ..line_config(4)
        };
        let evaluated =
            simulate_pop(&pool, 1, &config, &|_: SimulationId| LineEngine::new(4), &StopSignal::new()).unwrap();
        let champion = evaluated.get(IndividualId(0, 0)).unwrap();
        assert_eq!(champion.distance(), Some(0.0));
        assert_eq!(champion.fitness(), Some(Objective::ReachTarget.optimum()));
    }
}
