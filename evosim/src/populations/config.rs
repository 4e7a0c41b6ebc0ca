use super::selection::survivor_count;
use crate::evolution::ConfigError;

use serde::{Deserialize, Serialize};

use std::num::NonZeroUsize;

/// Largest accepted [`CrossoverPolicy::Blend`] alpha.
pub const MAX_BLEND_ALPHA: f32 = 1000.0;

/// How two parent genomes are recombined.
#[derive(Clone, Copy, PartialEq, Debug, Serialize, Deserialize)]
pub enum CrossoverPolicy {
    /// Each gene is copied from either parent with equal chance.
    Uniform,
    /// Each gene is drawn uniformly from the interval spanned by
    /// both parents' genes, widened on each side by `alpha` times
    /// its width, then clamped into the gene's bounds.
    Blend { alpha: f32 },
}

/// How parents are picked among the survivors.
#[derive(Clone, Copy, PartialEq, Debug, Serialize, Deserialize)]
pub enum ParentSampling {
    /// Every survivor is equally likely.
    Uniform,
    /// Non-linear rank selection: better ranked survivors are
    /// picked more often. Larger coefficients increase the bias.
    RankBiased { coefficient: f32 },
}

/// How a selected gene is mutated.
#[derive(Clone, Copy, PartialEq, Debug, Serialize, Deserialize)]
pub enum MutationPolicy {
    /// Replace the gene with a fresh value from its bounds.
    Resample,
    /// Add a uniform perturbation in `[-power, power]`,
    /// clamped into the gene's bounds.
    Nudge { power: f32 },
}

/// Configuration data for population generation
/// and evolution.
///
/// # Note
/// All quantities expressing probabilities
/// should be in the range [0.0, 1.0]; [`validate`]
/// rejects anything else.
///
/// [`validate`]: PopulationConfig::validate
#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub struct PopulationConfig {
    /// Size of the population, fixed across generations.
    pub size: NonZeroUsize,
    /// Top fraction of the population which
    /// survives to breed the next generation.
    pub survival_fraction: f32,
    /// Top n survivors which are copied
    /// as-is to the next generation.
    pub elitism: usize,
    /// Recombination of parent genomes.
    pub crossover: CrossoverPolicy,
    /// Choice of parents among survivors.
    pub parent_sampling: ParentSampling,
    /// Chance that a child will be mutated at all.
    pub child_mutation_chance: f32,
    /// Chance that each gene of a mutating child is mutated.
    pub mutation_rate: f32,
    /// Mutation applied to selected genes.
    pub mutation: MutationPolicy,
}

impl PopulationConfig {
    /// Returns a "zero-valued" default configuration.
    /// All values are 0, or in the case of
    /// `NonZeroUsize`s, 1. Policies are uniform
    /// and mutations resample genes.
    ///
    /// # Note
    /// This value is not suitable for use in most experiments.
    /// It is meant as a way to abbreviate configuration
    /// instantiation, or to fill in unused values.
    ///
    /// # Examples
    /// ```
    /// use evosim::PopulationConfig;
    /// use std::num::NonZeroUsize;
    ///
    /// let cfg = PopulationConfig {
    ///     size: NonZeroUsize::new(50).unwrap(),
    ///     survival_fraction: 0.2,
    ///     ..PopulationConfig::zero()
    /// };
    /// assert!(cfg.validate().is_ok());
    /// ```
    pub const fn zero() -> PopulationConfig {
        PopulationConfig {
            // SAFETY: 1 is a valid NonZeroUsize. Replace this with
            // NonZeroUsize::new(1).unwrap() once const Option::unwrap
            // becomes stable.
            size: unsafe { NonZeroUsize::new_unchecked(1) },
            survival_fraction: 0.0,
            elitism: 0,
            crossover: CrossoverPolicy::Uniform,
            parent_sampling: ParentSampling::Uniform,
            child_mutation_chance: 0.0,
            mutation_rate: 0.0,
            mutation: MutationPolicy::Resample,
        }
    }

    /// Checks probabilities, the survival fraction,
    /// elitism and policy parameters.
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_probability("child_mutation_chance", self.child_mutation_chance)?;
        check_probability("mutation_rate", self.mutation_rate)?;
        let survivors = survivor_count(self.survival_fraction, self.size.get())
            .map_err(|_| ConfigError::SurvivalFraction(self.survival_fraction))?;
        if self.elitism > survivors {
            return Err(ConfigError::ElitismExceedsSurvivors {
                elitism: self.elitism,
                survivors,
            });
        }
        if let CrossoverPolicy::Blend { alpha } = self.crossover {
            if !(0.0..=MAX_BLEND_ALPHA).contains(&alpha) {
                return Err(ConfigError::InvalidBlendAlpha(alpha));
            }
        }
        if let ParentSampling::RankBiased { coefficient } = self.parent_sampling {
            if !(coefficient.is_finite() && coefficient > 1.0) {
                return Err(ConfigError::InvalidSelectionPressure(coefficient));
            }
        }
        if let MutationPolicy::Nudge { power } = self.mutation {
            if !(power.is_finite() && power >= 0.0) {
                return Err(ConfigError::InvalidMutationPower(power));
            }
        }
        Ok(())
    }
}

impl Default for PopulationConfig {
    fn default() -> PopulationConfig {
        PopulationConfig {
            size: NonZeroUsize::new(50).unwrap_or(NonZeroUsize::MIN),
            survival_fraction: 0.5,
            elitism: 1,
            crossover: CrossoverPolicy::Blend { alpha: 0.1 },
            parent_sampling: ParentSampling::RankBiased { coefficient: 1.1 },
            child_mutation_chance: 0.5,
            mutation_rate: 0.1,
            mutation: MutationPolicy::Resample,
        }
    }
}

fn check_probability(field: &'static str, value: f32) -> Result<(), ConfigError> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::InvalidProbability { field, value })
    }
}
