use crate::individuals::IndividualId;

use serde::{Deserialize, Serialize};

use std::error::Error;
use std::fmt;

/// Why a single individual's simulation did not complete.
///
/// These never abort a batch: the individual is
/// recorded as failed and ranked last.
#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub enum SimulationFailure {
    /// The simulated body reached a non-finite position.
    Diverged { step: usize },
    /// The rollout exceeded its wall-clock budget.
    Timeout { step: usize },
    /// The physics backend reported an error.
    Engine(String),
    /// The rollout panicked.
    Crashed(String),
    /// The genome could not be turned into a body.
    InvalidGenome(String),
    /// The run was stopped before the rollout finished.
    Interrupted,
}

impl fmt::Display for SimulationFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Diverged { step } => write!(f, "simulation diverged at step {}", step),
            Self::Timeout { step } => write!(f, "simulation timed out at step {}", step),
            Self::Engine(msg) => write!(f, "physics engine error: {}", msg),
            Self::Crashed(msg) => write!(f, "simulation crashed: {}", msg),
            Self::InvalidGenome(msg) => write!(f, "invalid genome: {}", msg),
            Self::Interrupted => write!(f, "simulation interrupted"),
        }
    }
}

impl Error for SimulationFailure {}

/// Failures of the population-level orchestration.
#[derive(Clone, PartialEq, Debug)]
pub enum OrchestrationError {
    /// The worker pool could not be allocated, even
    /// after falling back to fewer workers.
    ResourceExhaustion { requested: usize, reason: String },
    /// Merged results did not cover the population
    /// exactly once.
    Mismatch {
        generation: usize,
        missing: Vec<IndividualId>,
        duplicated: Vec<IndividualId>,
        unknown: Vec<IndividualId>,
    },
    /// The stop signal was raised during the generation.
    Cancelled { generation: usize },
}

impl fmt::Display for OrchestrationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ResourceExhaustion { requested, reason } => write!(
                f,
                "unable to allocate workers for {} cores: {}",
                requested, reason
            ),
            Self::Mismatch {
                generation,
                missing,
                duplicated,
                unknown,
            } => write!(
                f,
                "simulation results of generation {} do not match the population \
                (missing: {:?}, duplicated: {:?}, unknown: {:?})",
                generation, missing, duplicated, unknown
            ),
            Self::Cancelled { generation } => {
                write!(f, "simulation of generation {} was cancelled", generation)
            }
        }
    }
}

impl Error for OrchestrationError {}
