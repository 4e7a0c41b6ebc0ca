use super::*;

use rand::Rng;

/// Auxiliary type for offspring generation.
/// Handles all the tasks of breeding the next
/// generation from a population's survivors
/// according to the specified config.
pub(super) struct OffspringFactory<'a> {
    /// Survivors, best first.
    survivors: Vec<&'a Individual>,
    generation: usize,
    config: &'a PopulationConfig,
    space: &'a GeneSpace,
}

impl<'a> OffspringFactory<'a> {
    pub(super) fn new(
        pool: &'a GenePool,
        survivors: &[IndividualId],
        config: &'a PopulationConfig,
        space: &'a GeneSpace,
    ) -> Result<OffspringFactory<'a>, SelectionError> {
        if survivors.is_empty() {
            return Err(SelectionError::NoSurvivors);
        }
        let survivors = survivors
            .iter()
            .map(|id| {
                let individual = pool.get(*id).ok_or(SelectionError::UnknownSurvivor(*id))?;
                if individual.genome().len() != space.len() {
                    return Err(SelectionError::GenomeLength {
                        id: *id,
                        expected: space.len(),
                        found: individual.genome().len(),
                    });
                }
                Ok(individual)
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(OffspringFactory {
            survivors,
            generation: pool.generation() + 1,
            config,
            space,
        })
    }

    /// Generate `target_size` offspring: the configured
    /// elite first, then mated children.
    pub(super) fn generate_offspring(
        &self,
        target_size: usize,
        rng: &mut EvolutionRng,
    ) -> GenePool {
        let elite = self
            .config
            .elitism
            .min(self.survivors.len())
            .min(target_size);
        let mut offspring = BTreeMap::new();

        self.add_elite(&mut offspring, elite);
        self.add_mated_offspring(&mut offspring, elite..target_size, rng);

        GenePool {
            generation: self.generation,
            individuals: offspring,
        }
    }

    /// Copy the top survivors unchanged, under new ids.
    fn add_elite(&self, offspring: &mut BTreeMap<IndividualId, Individual>, elite: usize) {
        for (index, parent) in self.survivors[..elite].iter().enumerate() {
            let id = IndividualId(self.generation, index);
            offspring.insert(
                id,
                Individual::with_shared_genome(
                    id,
                    Arc::clone(parent.shared_genome()),
                    Origin::Elite {
                        parent: parent.id(),
                    },
                ),
            );
        }
    }

    /// Choose pairs of parents, mate and mutate
    /// their children.
    fn add_mated_offspring(
        &self,
        offspring: &mut BTreeMap<IndividualId, Individual>,
        indices: std::ops::Range<usize>,
        rng: &mut EvolutionRng,
    ) {
        for index in indices {
            let (parent1, parent2) = self.choose_parents(rng);
            let mut genes = self.recombine(parent1.genome(), parent2.genome(), rng);
            self.mutate(&mut genes, rng);

            let id = IndividualId(self.generation, index);
            offspring.insert(
                id,
                Individual::new(
                    id,
                    Genome::from_genes(genes),
                    Origin::Offspring {
                        parents: [parent1.id(), parent2.id()],
                    },
                ),
            );
        }
    }

    /// Choose two parents, distinct whenever
    /// more than one survivor exists.
    fn choose_parents(&self, rng: &mut EvolutionRng) -> (&'a Individual, &'a Individual) {
        let count = self.survivors.len();
        let first = self.sample_rank(count, rng);
        if count == 1 {
            return (self.survivors[first], self.survivors[first]);
        }
        let mut second = self.sample_rank(count - 1, rng);
        if second >= first {
            second += 1;
        }
        (self.survivors[first], self.survivors[second])
    }

    /// Pick a rank in `0..count`, 0 being the best.
    fn sample_rank(&self, count: usize, rng: &mut EvolutionRng) -> usize {
        match self.config.parent_sampling {
            ParentSampling::Uniform => rng.gen_range(0..count),
            ParentSampling::RankBiased { coefficient } => {
                let n = count as f64;
                // ln(k + 1) with k = c^(n + 1) - 1, kept in log space
                // since k overflows for a few thousand survivors.
                let log_total = (n + 1.0) * f64::from(coefficient).ln();
                let k = log_total.exp_m1();
                let u: f64 = rng.gen();
                let log_scaled = if k.is_finite() {
                    (k * u).ln_1p()
                } else {
                    // ln(k * u + 1) = ln(k) + ln(u + 1 / k), with ln(k) = ln(k + 1).
                    log_total + (u + (-log_total).exp()).ln()
                };
                let rank = (n - n * log_scaled / log_total).round();
                if rank.is_nan() {
                    return 0;
                }
                (rank.max(0.0) as usize).min(count - 1)
            }
        }
    }

    fn recombine(&self, a: &Genome, b: &Genome, rng: &mut EvolutionRng) -> Vec<f32> {
        let pairs = a.genes().iter().zip(b.genes()).enumerate();
        match self.config.crossover {
            CrossoverPolicy::Uniform => pairs
                .map(|(_, (x, y))| if rng.gen::<bool>() { *x } else { *y })
                .collect(),
            CrossoverPolicy::Blend { alpha } => pairs
                .map(|(i, (x, y))| {
                    let (low, high) = if x <= y { (*x, *y) } else { (*y, *x) };
                    let spread = (high - low) * alpha;
                    let value = rng.gen_range((low - spread)..=(high + spread));
                    self.space.clamp_gene(i, value)
                })
                .collect(),
        }
    }

    fn mutate(&self, genes: &mut [f32], rng: &mut EvolutionRng) {
        if !rng.chance(self.config.child_mutation_chance) {
            return;
        }
        for (i, gene) in genes.iter_mut().enumerate() {
            if !rng.chance(self.config.mutation_rate) {
                continue;
            }
            *gene = match self.config.mutation {
                MutationPolicy::Resample => self.space.sample_gene(i, rng),
                MutationPolicy::Nudge { power } => self
                    .space
                    .clamp_gene(i, *gene + rng.gen_range(-power..=power)),
            };
        }
    }
}
