use super::GenePool;

use crate::individuals::{Individual, IndividualId};

use serde::{Deserialize, Serialize};

use std::fmt;

/// Defines different possible reporting levels for logging.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub enum ReportingLevel {
    /// Clones the entire population.
    AllIndividuals,
    /// Clones only the population champion.
    Champion,
    /// Clones no individuals.
    NoIndividuals,
}

/// A snapshot of an evaluated population.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Log {
    pub generation_number: usize,
    pub generation_sample: GenerationMemberRecord,
    pub population_size: usize,
    pub champion: Option<IndividualId>,
    pub champion_fitness: Option<f32>,
    /// Statistics over successfully simulated individuals.
    pub fitness: Option<Stats>,
    pub distance: Option<Stats>,
    /// Number of individuals whose simulation failed.
    pub failures: usize,
}

impl fmt::Display for Log {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Log {{\n\
            \tgeneration_number: {:?}\n\
            \tpopulation_size: {:?}\n\
            \tchampion: {:?} ({:?})\n\
            \tfitness: {:?}\n\
            \tdistance: {:?}\n\
            \tfailures: {:?}\n\
            }}",
            self.generation_number,
            self.population_size,
            self.champion,
            self.champion_fitness,
            self.fitness,
            self.distance,
            self.failures,
        )
    }
}

/// A struct for reporting basic statistical data.
#[derive(Clone, Copy, PartialEq, Debug, Serialize, Deserialize)]
pub struct Stats {
    pub maximum: f32,
    pub minimum: f32,
    pub mean: f32,
    pub median: f32,
}

impl Stats {
    /// Returns statistics about the finite numbers in a
    /// sequence, or `None` if it holds none.
    ///
    /// # Examples
    /// ```
    /// use evosim::logging::Stats;
    ///
    /// let stats = Stats::from([-2.0, -1.0, 0.5, 1.0, 1.5].iter().copied()).unwrap();
    /// assert_eq!(stats.maximum, 1.5);
    /// assert_eq!(stats.minimum, -2.0);
    /// assert_eq!(stats.mean, 0.0);
    /// assert_eq!(stats.median, 0.5);
    ///
    /// assert!(Stats::from([f32::NAN].iter().copied()).is_none());
    /// ```
    pub fn from(data: impl Iterator<Item = f32>) -> Option<Stats> {
        let mut data: Vec<f32> = data.filter(|d| d.is_finite()).collect();
        if data.is_empty() {
            return None;
        }
        data.sort_unstable_by(f32::total_cmp);
        let mid = data.len() / 2;
        let median = if data.len() % 2 == 0 {
            (data[mid - 1] + data[mid]) / 2.0
        } else {
            data[mid]
        };
        Some(Stats {
            maximum: data[data.len() - 1],
            minimum: data[0],
            mean: data.iter().sum::<f32>() / data.len() as f32,
            median,
        })
    }
}

/// A reporting-level dependant store
/// of individuals from a population.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum GenerationMemberRecord {
    /// Every individual.
    Individuals(Vec<Individual>),
    /// Only the population champion.
    Champion(Individual),
    /// Empty.
    None,
}

/// A log of the evolution of a population over time.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EvolutionLogger {
    reporting_level: ReportingLevel,
    logs: Vec<Log>,
}

impl EvolutionLogger {
    /// Returns a logger with the appropiate reporting level.
    ///
    /// # Examples
    /// ```
    /// use evosim::logging::{EvolutionLogger, ReportingLevel};
    ///
    /// let logger = EvolutionLogger::new(ReportingLevel::NoIndividuals);
    /// assert_eq!(logger.iter().count(), 0);
    /// ```
    pub fn new(reporting_level: ReportingLevel) -> EvolutionLogger {
        EvolutionLogger {
            reporting_level,
            logs: vec![],
        }
    }

    /// Store a snapshot of an evaluated population
    /// and return it.
    ///
    /// Logging a generation again replaces its
    /// previous snapshot and every later one.
    pub fn log(&mut self, pool: &GenePool) -> &Log {
        let champion = pool.champion();
        let evaluated: Vec<&Individual> = pool
            .individuals()
            .filter(|i| i.fitness().is_some())
            .collect();
        let log = Log {
            generation_number: pool.generation(),
            generation_sample: match self.reporting_level {
                ReportingLevel::AllIndividuals => {
                    GenerationMemberRecord::Individuals(pool.individuals().cloned().collect())
                }
                ReportingLevel::Champion => champion
                    .cloned()
                    .map_or(GenerationMemberRecord::None, GenerationMemberRecord::Champion),
                ReportingLevel::NoIndividuals => GenerationMemberRecord::None,
            },
            population_size: pool.len(),
            champion: champion.map(Individual::id),
            champion_fitness: champion.and_then(Individual::fitness),
            fitness: Stats::from(evaluated.iter().filter_map(|i| i.fitness())),
            distance: Stats::from(evaluated.iter().filter_map(|i| i.distance())),
            failures: pool.individuals().filter(|i| i.failure().is_some()).count(),
        };

        self.logs.retain(|l| l.generation_number < log.generation_number);
        self.logs.push(log);
        &self.logs[self.logs.len() - 1]
    }

    /// Drop the snapshots of `generation` and every later one.
    pub(crate) fn truncate(&mut self, generation: usize) {
        self.logs.retain(|l| l.generation_number < generation);
    }

    pub fn reporting_level(&self) -> ReportingLevel {
        self.reporting_level
    }

    /// Iterate over all logged snapshots.
    pub fn iter(&self) -> impl Iterator<Item = &Log> {
        self.logs.iter()
    }

    /// The most recent snapshot.
    pub fn last(&self) -> Option<&Log> {
        self.logs.last()
    }
}
