//! A gene pool is one generation of individuals.
//! Evaluated pools are turned into the next
//! generation by [`selection`] and [`crossing`].
mod config;
mod errors;
pub mod logging;
mod offspring_factory;
mod selection;

pub use config::{
    CrossoverPolicy, MutationPolicy, ParentSampling, PopulationConfig, MAX_BLEND_ALPHA,
};
pub use errors::SelectionError;
pub use selection::{fitness, selection, survivor_count, WORST_FITNESS};

use crate::genome::{GeneSpace, Genome};
use crate::individuals::{get_dist, Individual, IndividualId, InvalidStateError, Origin, Position};
use crate::rng::EvolutionRng;
use offspring_factory::OffspringFactory;

use rand::Rng;
use serde::{Deserialize, Serialize};

use std::collections::BTreeMap;
use std::sync::Arc;

/// What an individual is evaluated on.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub enum Objective {
    /// Get as close as possible to the target.
    /// Fitness is `1 / (1 + distance)`, at most 1.
    ReachTarget,
    /// Travel as far as possible from the starting
    /// point. Fitness is the distance travelled.
    Displacement,
}

impl Objective {
    /// Measures the distance this objective is scored on.
    ///
    /// # Errors
    /// Fails on empty or non-finite trajectories, and
    /// non-finite targets when the target is used.
    pub fn distance(
        &self,
        trajectory: &[Position],
        target: Position,
    ) -> Result<f32, InvalidStateError> {
        match self {
            Objective::ReachTarget => get_dist(trajectory, target),
            Objective::Displacement => {
                let start = trajectory.first().ok_or(InvalidStateError::EmptyTrajectory)?;
                if !start.is_finite() {
                    return Err(InvalidStateError::NonFinitePosition);
                }
                get_dist(trajectory, *start)
            }
        }
    }

    /// Turns a distance into fitness. Higher is better.
    ///
    /// # Examples
    /// ```
    /// use evosim::Objective;
    ///
    /// assert_eq!(Objective::ReachTarget.fitness(0.0), 1.0);
    /// assert_eq!(Objective::ReachTarget.fitness(3.0), 0.25);
    /// assert_eq!(Objective::Displacement.fitness(3.0), 3.0);
    /// ```
    pub fn fitness(&self, distance: f32) -> f32 {
        match self {
            Objective::ReachTarget => 1.0 / (1.0 + distance),
            Objective::Displacement => distance,
        }
    }

    /// Best attainable fitness.
    pub fn optimum(&self) -> f32 {
        match self {
            Objective::ReachTarget => 1.0,
            Objective::Displacement => f32::INFINITY,
        }
    }
}

/// One generation of individuals, keyed by id.
///
/// Pools are snapshots: simulation and crossing
/// return new pools instead of modifying their input.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GenePool {
    generation: usize,
    individuals: BTreeMap<IndividualId, Individual>,
}

impl GenePool {
    /// Creates a root pool of `size` random individuals.
    ///
    /// # Examples
    /// ```
    /// use evosim::{GeneBounds, GenePool, GeneSpace, IndividualId};
    /// use rand::SeedableRng;
    ///
    /// let space = GeneSpace::uniform(3, GeneBounds::new(-1.0, 1.0).unwrap());
    /// let mut rng = rand::rngs::StdRng::seed_from_u64(1);
    /// let pool = GenePool::random(20, &space, &mut rng);
    ///
    /// assert_eq!(pool.len(), 20);
    /// assert_eq!(pool.generation(), 0);
    /// assert!(pool.contains(IndividualId(0, 19)));
    /// ```
    pub fn random<R: Rng + ?Sized>(size: usize, space: &GeneSpace, rng: &mut R) -> GenePool {
        GenePool {
            generation: 0,
            individuals: (0..size)
                .map(|i| {
                    let id = IndividualId(0, i);
                    (id, Individual::new(id, space.random_genome(rng), Origin::Random))
                })
                .collect(),
        }
    }

    /// Creates a pool of the passed genomes for `generation`.
    pub fn seeded(generation: usize, genomes: Vec<Genome>) -> GenePool {
        GenePool {
            generation,
            individuals: genomes
                .into_iter()
                .enumerate()
                .map(|(i, genome)| {
                    let id = IndividualId(generation, i);
                    (id, Individual::new(id, genome, Origin::Seeded))
                })
                .collect(),
        }
    }

    pub fn generation(&self) -> usize {
        self.generation
    }

    pub fn len(&self) -> usize {
        self.individuals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.individuals.is_empty()
    }

    pub fn get(&self, id: IndividualId) -> Option<&Individual> {
        self.individuals.get(&id)
    }

    pub(crate) fn get_mut(&mut self, id: IndividualId) -> Option<&mut Individual> {
        self.individuals.get_mut(&id)
    }

    pub fn contains(&self, id: IndividualId) -> bool {
        self.individuals.contains_key(&id)
    }

    /// Iterate over individuals in ascending id order.
    pub fn individuals(&self) -> impl Iterator<Item = &Individual> {
        self.individuals.values()
    }

    pub fn ids(&self) -> impl Iterator<Item = IndividualId> + '_ {
        self.individuals.keys().copied()
    }

    /// Returns the fittest successfully simulated individual,
    /// the lowest id winning ties.
    pub fn champion(&self) -> Option<&Individual> {
        self.individuals()
            .filter_map(|i| i.fitness().filter(|f| !f.is_nan()).map(|f| (i, f)))
            .max_by(|(a, fa), (b, fb)| fa.total_cmp(fb).then(b.id().cmp(&a.id())))
            .map(|(i, _)| i)
    }

    /// Returns `true` if every individual has been simulated.
    pub fn is_evaluated(&self) -> bool {
        self.individuals().all(Individual::is_evaluated)
    }
}

/// Breeds the next generation from the `survivors` of `pool`.
///
/// The first `config.elitism` survivors (survivors are expected
/// best first) are carried over unchanged. The remaining
/// individuals are children of two survivors picked according
/// to `config.parent_sampling`, recombined according to
/// `config.crossover` and mutated according to
/// `config.child_mutation_chance`, `config.mutation_rate` and
/// `config.mutation`.
///
/// The result holds exactly `target_size` individuals with ids
/// `IndividualId(g + 1, 0..target_size)`, `g` being the pool's
/// generation. All randomness is drawn from `rng`.
///
/// # Errors
/// Fails if there are no survivors, a survivor is not in the
/// pool, or a survivor's genome does not fit `space`.
///
/// # Examples
/// ```
/// use evosim::{
///     crossing, EvolutionRng, GeneBounds, GenePool, GeneSpace, IndividualId, PopulationConfig,
/// };
/// use std::num::NonZeroUsize;
///
/// let space = GeneSpace::uniform(4, GeneBounds::new(0.0, 1.0).unwrap());
/// let pool = GenePool::random(6, &space, &mut EvolutionRng::genesis(0));
/// let config = PopulationConfig {
///     size: NonZeroUsize::new(6).unwrap(),
///     survival_fraction: 0.5,
///     elitism: 1,
///     ..PopulationConfig::zero()
/// };
/// let survivors = [IndividualId(0, 2), IndividualId(0, 0), IndividualId(0, 5)];
///
/// let next = crossing(&pool, &survivors, 6, &config, &space, &mut EvolutionRng::for_generation(0, 0))
///     .unwrap();
/// assert_eq!(next.len(), 6);
/// assert_eq!(next.generation(), 1);
/// assert_eq!(
///     next.get(IndividualId(1, 0)).unwrap().genome(),
///     pool.get(IndividualId(0, 2)).unwrap().genome()
/// );
/// ```
pub fn crossing(
    pool: &GenePool,
    survivors: &[IndividualId],
    target_size: usize,
    config: &PopulationConfig,
    space: &GeneSpace,
    rng: &mut EvolutionRng,
) -> Result<GenePool, SelectionError> {
    let factory = OffspringFactory::new(pool, survivors, config, space)?;
    Ok(factory.generate_offspring(target_size, rng))
}
