use crate::individuals::{IndividualId, Position};
use crate::persistence::PersistenceError;
use crate::populations::{SelectionError, MAX_BLEND_ALPHA};
use crate::simulation::OrchestrationError;

use std::error::Error;
use std::fmt;

/// A configuration, or a resumed population, that
/// cannot be used. Raised before any simulation starts.
#[derive(Clone, PartialEq, Debug)]
pub enum ConfigError {
    /// A probability outside `[0, 1]`.
    InvalidProbability { field: &'static str, value: f32 },
    /// A survival fraction which would select no survivors,
    /// or more than the population.
    SurvivalFraction(f32),
    /// More elites than survivors.
    ElitismExceedsSurvivors { elitism: usize, survivors: usize },
    NonFiniteTarget(Position),
    /// A duration or distance that is negative, zero where
    /// it must not be, or not finite.
    InvalidDuration { field: &'static str, value: f32 },
    InvalidBlendAlpha(f32),
    InvalidMutationPower(f32),
    /// Rank-biased sampling needs a coefficient above 1.
    InvalidSelectionPressure(f32),
    /// The gene space holds no genes.
    EmptyGeneSpace,
    /// A resumed individual does not fit the gene space.
    IncompatibleGenome { id: IndividualId },
    /// A resumed population does not have the configured size.
    PopulationSizeMismatch { expected: usize, found: usize },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidProbability { field, value } => {
                write!(f, "{} must be in [0, 1], found {}", field, value)
            }
            Self::SurvivalFraction(fraction) => {
                write!(f, "survival fraction must be in (0, 1], found {}", fraction)
            }
            Self::ElitismExceedsSurvivors { elitism, survivors } => write!(
                f,
                "elitism ({}) exceeds the number of survivors ({})",
                elitism, survivors
            ),
            Self::NonFiniteTarget(target) => write!(f, "target {:?} is not finite", target),
            Self::InvalidDuration { field, value } => {
                write!(f, "{} has invalid value {}", field, value)
            }
            Self::InvalidBlendAlpha(alpha) => {
                write!(
                    f,
                    "blend alpha must be in [0, {}], found {}",
                    MAX_BLEND_ALPHA, alpha
                )
            }
            Self::InvalidMutationPower(power) => write!(
                f,
                "mutation power must be finite and non-negative, found {}",
                power
            ),
            Self::InvalidSelectionPressure(coefficient) => write!(
                f,
                "rank selection coefficient must be greater than 1, found {}",
                coefficient
            ),
            Self::EmptyGeneSpace => write!(f, "gene space holds no genes"),
            Self::IncompatibleGenome { id } => {
                write!(f, "genome of {} does not fit the gene space", id)
            }
            Self::PopulationSizeMismatch { expected, found } => write!(
                f,
                "population holds {} individuals, configured for {}",
                found, expected
            ),
        }
    }
}

impl Error for ConfigError {}

/// Errors terminating a run of the generation loop.
#[derive(Debug)]
pub enum EvolutionError {
    Config(ConfigError),
    Orchestration(OrchestrationError),
    Selection {
        generation: usize,
        source: SelectionError,
    },
    Persistence(PersistenceError),
}

impl fmt::Display for EvolutionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config(e) => write!(f, "invalid configuration: {}", e),
            Self::Orchestration(e) => write!(f, "{}", e),
            Self::Selection { generation, source } => {
                write!(f, "evolution of generation {} failed: {}", generation, source)
            }
            Self::Persistence(e) => write!(f, "checkpointing failed: {}", e),
        }
    }
}

impl Error for EvolutionError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Config(e) => Some(e),
            Self::Orchestration(e) => Some(e),
            Self::Selection { source, .. } => Some(source),
            Self::Persistence(e) => Some(e),
        }
    }
}

impl From<ConfigError> for EvolutionError {
    fn from(e: ConfigError) -> EvolutionError {
        EvolutionError::Config(e)
    }
}

impl From<OrchestrationError> for EvolutionError {
    fn from(e: OrchestrationError) -> EvolutionError {
        EvolutionError::Orchestration(e)
    }
}

impl From<PersistenceError> for EvolutionError {
    fn from(e: PersistenceError) -> EvolutionError {
        EvolutionError::Persistence(e)
    }
}
