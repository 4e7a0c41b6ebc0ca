use crate::individuals::IndividualId;

use std::error::Error;
use std::fmt;

/// Failures of selection and crossing.
#[derive(Clone, PartialEq, Debug)]
pub enum SelectionError {
    /// Attempted selection on a population without individuals.
    EmptyPopulation,
    /// The survival fraction is not in `(0, 1]`.
    InvalidSurvivalFraction(f32),
    /// Crossing was asked to breed from no survivors.
    NoSurvivors,
    /// A survivor is not a member of the population.
    UnknownSurvivor(IndividualId),
    /// A survivor's genome does not fit the gene space.
    GenomeLength {
        id: IndividualId,
        expected: usize,
        found: usize,
    },
}

impl fmt::Display for SelectionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyPopulation => write!(f, "attempted selection on an empty population"),
            Self::InvalidSurvivalFraction(fraction) => {
                write!(f, "survival fraction {} is not in (0, 1]", fraction)
            }
            Self::NoSurvivors => write!(f, "attempted crossing without survivors"),
            Self::UnknownSurvivor(id) => write!(f, "survivor {} is not in the population", id),
            Self::GenomeLength {
                id,
                expected,
                found,
            } => write!(
                f,
                "genome of {} has {} genes, expected {}",
                id, found, expected
            ),
        }
    }
}

impl Error for SelectionError {}
