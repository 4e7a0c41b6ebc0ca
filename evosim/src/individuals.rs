//! Individuals: a genome with an identity and the
//! artifacts of its simulation.
mod distance;

pub use distance::{get_dist, InvalidStateError};

use crate::genome::Genome;
use crate::simulation::SimulationFailure;

use serde::{Deserialize, Serialize};

use std::fmt;
use std::sync::Arc;

/// Identifies an individual by the generation it
/// was created in and its index within it.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Serialize, Deserialize)]
pub struct IndividualId(pub usize, pub usize);

impl IndividualId {
    /// Returns the generation the individual was born in.
    pub fn generation(&self) -> usize {
        self.0
    }

    /// Returns the index of the individual within its generation.
    pub fn index(&self) -> usize {
        self.1
    }
}

impl fmt::Display for IndividualId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.0, self.1)
    }
}

/// How an individual came to be.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub enum Origin {
    /// Randomly generated for a root population.
    Random,
    /// Supplied from outside the evolution.
    Seeded,
    /// Unchanged copy of a surviving parent.
    Elite { parent: IndividualId },
    /// Recombination of two parents.
    Offspring { parents: [IndividualId; 2] },
}

impl Origin {
    /// Returns the parents of the individual, if any.
    pub fn parents(&self) -> &[IndividualId] {
        match self {
            Origin::Random | Origin::Seeded => &[],
            Origin::Elite { parent } => std::slice::from_ref(parent),
            Origin::Offspring { parents } => parents,
        }
    }
}

/// A point in simulated space. `z` points up.
#[derive(Clone, Copy, PartialEq, Debug, Default, Serialize, Deserialize)]
pub struct Position {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Position {
    pub const ORIGIN: Position = Position::new(0.0, 0.0, 0.0);

    pub const fn new(x: f32, y: f32, z: f32) -> Position {
        Position { x, y, z }
    }

    /// Returns `true` if all coordinates are finite.
    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }

    /// Distance to `other` projected onto the ground plane.
    ///
    /// # Examples
    /// ```
    /// use evosim::Position;
    ///
    /// let a = Position::new(1.0, 1.0, 5.0);
    /// let b = Position::new(4.0, 5.0, 0.0);
    /// assert_eq!(a.planar_distance(&b), 5.0);
    /// ```
    pub fn planar_distance(&self, other: &Position) -> f32 {
        (self.x - other.x).hypot(self.y - other.y)
    }
}

/// A candidate solution: an immutable genome, its
/// identity and, once simulated, its trajectory and fitness.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Individual {
    id: IndividualId,
    genome: Arc<Genome>,
    origin: Origin,
    trajectory: Vec<Position>,
    fitness: Option<f32>,
    distance: Option<f32>,
    failure: Option<SimulationFailure>,
}

impl Individual {
    /// Creates a not yet simulated individual.
    ///
    /// # Examples
    /// ```
    /// use evosim::{Genome, Individual, IndividualId, Origin};
    ///
    /// let individual = Individual::new(
    ///     IndividualId(0, 3),
    ///     Genome::from_genes(vec![0.1, 0.2]),
    ///     Origin::Random,
    /// );
    /// assert_eq!(individual.id(), IndividualId(0, 3));
    /// assert!(individual.fitness().is_none());
    /// assert!(!individual.is_evaluated());
    /// ```
    pub fn new(id: IndividualId, genome: Genome, origin: Origin) -> Individual {
        Individual::with_shared_genome(id, Arc::new(genome), origin)
    }

    pub(crate) fn with_shared_genome(
        id: IndividualId,
        genome: Arc<Genome>,
        origin: Origin,
    ) -> Individual {
        Individual {
            id,
            genome,
            origin,
            trajectory: vec![],
            fitness: None,
            distance: None,
            failure: None,
        }
    }

    pub fn id(&self) -> IndividualId {
        self.id
    }

    pub fn genome(&self) -> &Genome {
        &self.genome
    }

    pub(crate) fn shared_genome(&self) -> &Arc<Genome> {
        &self.genome
    }

    pub fn origin(&self) -> &Origin {
        &self.origin
    }

    /// Positions sampled during the individual's
    /// simulation, in simulated-time order.
    pub fn trajectory(&self) -> &[Position] {
        &self.trajectory
    }

    /// The individual's fitness, or `None` if it has
    /// not been simulated or its simulation failed.
    pub fn fitness(&self) -> Option<f32> {
        self.fitness
    }

    /// Distance measured by the simulation's objective.
    pub fn distance(&self) -> Option<f32> {
        self.distance
    }

    /// Why the simulation failed, if it did.
    pub fn failure(&self) -> Option<&SimulationFailure> {
        self.failure.as_ref()
    }

    /// Returns `true` if the individual was simulated,
    /// successfully or not.
    pub fn is_evaluated(&self) -> bool {
        self.fitness.is_some() || self.failure.is_some()
    }

    pub(crate) fn record_success(
        &mut self,
        trajectory: Vec<Position>,
        distance: f32,
        fitness: f32,
    ) {
        self.trajectory = trajectory;
        self.distance = Some(distance);
        self.fitness = Some(fitness);
        self.failure = None;
    }

    pub(crate) fn record_failure(&mut self, trajectory: Vec<Position>, failure: SimulationFailure) {
        self.trajectory = trajectory;
        self.distance = None;
        self.fitness = None;
        self.failure = Some(failure);
    }
}

impl fmt::Display for Individual {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Individual {} ", self.id)?;
        match (&self.fitness, &self.failure) {
            (Some(fitness), _) => write!(f, "(fitness {:.4})", fitness),
            (None, Some(failure)) => write!(f, "(failed: {})", failure),
            (None, None) => write!(f, "(not simulated)"),
        }
    }
}
