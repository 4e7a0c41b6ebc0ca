use super::ConfigError;
use crate::populations::logging::ReportingLevel;
use crate::populations::PopulationConfig;
use crate::simulation::SimulationConfig;
use crate::tracking::TrackMode;

use serde::{Deserialize, Serialize};

use std::num::NonZeroUsize;

/// Everything a run of the generation loop needs.
/// Read-only for the duration of the run.
#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub struct EvolutionConfig {
    pub population: PopulationConfig,
    pub simulation: SimulationConfig,
    /// Number of generations to simulate, counting
    /// from the root population.
    pub generations: usize,
    /// Worker count. `None` uses every available core.
    pub num_cores: Option<NonZeroUsize>,
    /// Seed of every random choice of the run.
    pub seed: u64,
    /// Which paths to record across generations, if any.
    pub tracking: Option<TrackMode>,
    /// What the per-generation statistics keep.
    pub reporting_level: ReportingLevel,
}

impl EvolutionConfig {
    /// Checks every nested configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.population.validate()?;
        self.simulation.validate()
    }
}

impl Default for EvolutionConfig {
    fn default() -> EvolutionConfig {
        EvolutionConfig {
            population: PopulationConfig::default(),
            simulation: SimulationConfig::default(),
            generations: 100,
            num_cores: None,
            seed: 0,
            tracking: Some(TrackMode::Champions(1)),
            reporting_level: ReportingLevel::Champion,
        }
    }
}
