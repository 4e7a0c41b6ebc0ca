use super::{GenePool, SelectionError};
use crate::individuals::IndividualId;

use std::collections::BTreeMap;

/// Fitness assigned to individuals which were not
/// simulated, failed, or produced an undefined fitness.
pub const WORST_FITNESS: f32 = f32::NEG_INFINITY;

/// Returns the fitness of every individual in `pool`.
///
/// Missing, failed and NaN fitness values become
/// [`WORST_FITNESS`], so downstream ranking never
/// sees an undefined value.
pub fn fitness(pool: &GenePool) -> BTreeMap<IndividualId, f32> {
    pool.individuals()
        .map(|i| (i.id(), sanitize(i.fitness())))
        .collect()
}

fn sanitize(fitness: Option<f32>) -> f32 {
    fitness.filter(|f| !f.is_nan()).unwrap_or(WORST_FITNESS)
}

/// Number of survivors of a population of `population_size`:
/// `ceil(fraction * population_size)`, never zero and never
/// more than the population.
///
/// # Errors
/// Fails if the population is empty or `fraction`
/// is not in `(0, 1]`.
///
/// # Examples
/// ```
/// use evosim::survivor_count;
///
/// assert_eq!(survivor_count(0.5, 10), Ok(5));
/// assert_eq!(survivor_count(0.3, 10), Ok(3));
/// assert_eq!(survivor_count(0.25, 10), Ok(3));
/// assert_eq!(survivor_count(0.01, 10), Ok(1));
/// assert!(survivor_count(0.0, 10).is_err());
/// ```
pub fn survivor_count(fraction: f32, population_size: usize) -> Result<usize, SelectionError> {
    if population_size == 0 {
        return Err(SelectionError::EmptyPopulation);
    }
    if !(fraction > 0.0 && fraction <= 1.0) {
        return Err(SelectionError::InvalidSurvivalFraction(fraction));
    }
    // Products such as 0.3 * 10 are computed from the nearest
    // f32 to 0.3. Rounding a fraction to f32 is off by at most
    // half an ulp, so only that much is forgiven.
    let exact = f64::from(fraction) * population_size as f64;
    let nearest = exact.round();
    let slack = exact * f64::from(f32::EPSILON) / 2.0;
    let count = if (exact - nearest).abs() <= slack {
        nearest
    } else {
        exact.ceil()
    };
    Ok((count as usize).clamp(1, population_size))
}

/// Returns the ids of the survivors of `pool`, best first.
///
/// Individuals are ranked by descending fitness, with
/// ties broken by ascending id. Individuals missing from
/// `fitness` rank as [`WORST_FITNESS`].
///
/// # Errors
/// Fails if the pool is empty or the survival
/// fraction is not in `(0, 1]`.
pub fn selection(
    pool: &GenePool,
    fitness: &BTreeMap<IndividualId, f32>,
    survival_fraction: f32,
) -> Result<Vec<IndividualId>, SelectionError> {
    let count = survivor_count(survival_fraction, pool.len())?;
    let mut ranked: Vec<(IndividualId, f32)> = pool
        .ids()
        .map(|id| (id, sanitize(fitness.get(&id).copied())))
        .collect();
    ranked.sort_by(|(id_a, a), (id_b, b)| b.total_cmp(a).then(id_a.cmp(id_b)));
    Ok(ranked.into_iter().take(count).map(|(id, _)| id).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::evaluated_pool;

    #[test]
    fn failures_rank_last() {
        let pool = evaluated_pool(&[Some(1.0), None, Some(f32::NAN), Some(-3.0)]);
        let fitness = fitness(&pool);
        assert_eq!(fitness[&IndividualId(0, 1)], WORST_FITNESS);
        assert_eq!(fitness[&IndividualId(0, 2)], WORST_FITNESS);
        assert!(fitness.values().all(|f| !f.is_nan()));

        let survivors = selection(&pool, &fitness, 1.0).unwrap();
        assert_eq!(
            survivors,
            vec![
                IndividualId(0, 0),
                IndividualId(0, 3),
                IndividualId(0, 1),
                IndividualId(0, 2)
            ]
        );
    }

    #[test]
    fn selects_ceil_of_fraction() {
        let values: Vec<Option<f32>> = (0..10).map(|i| Some(i as f32)).collect();
        let pool = evaluated_pool(&values);
        let fitness = fitness(&pool);
        for (fraction, expected) in [(0.5, 5), (0.3, 3), (0.31, 4), (0.05, 1), (1.0, 10)] {
            let survivors = selection(&pool, &fitness, fraction).unwrap();
            assert_eq!(survivors.len(), expected, "fraction {}", fraction);
            assert!(survivors.iter().all(|id| pool.contains(*id)));
            let ranked: Vec<f32> = survivors.iter().map(|id| fitness[id]).collect();
            assert!(ranked.windows(2).all(|w| w[0] >= w[1]));
        }
    }

    #[test]
    fn survivor_count_keeps_small_fractional_parts() {
        assert_eq!(survivor_count(0.1, 30), Ok(3));
        assert_eq!(survivor_count(0.7, 10), Ok(7));
        assert_eq!(survivor_count(0.5, 1_000_000), Ok(500_000));
        // One ulp above 0.5.
        assert_eq!(survivor_count(0.500_000_06, 1_000_000), Ok(500_001));
        assert_eq!(survivor_count(1.0, usize::MAX >> 12), Ok(usize::MAX >> 12));
    }

    #[test]
    fn ties_broken_by_id() {
        let pool = evaluated_pool(&[Some(2.0), Some(5.0), Some(2.0), Some(5.0), Some(2.0)]);
        let survivors = selection(&pool, &fitness(&pool), 0.6).unwrap();
        assert_eq!(
            survivors,
            vec![IndividualId(0, 1), IndividualId(0, 3), IndividualId(0, 0)]
        );
    }

    #[test]
    fn rejects_bad_input() {
        let empty = GenePool::seeded(0, vec![]);
        assert_eq!(
            selection(&empty, &BTreeMap::new(), 0.5),
            Err(SelectionError::EmptyPopulation)
        );
        let pool = evaluated_pool(&[Some(1.0)]);
        assert_eq!(
            selection(&pool, &fitness(&pool), 1.5),
            Err(SelectionError::InvalidSurvivalFraction(1.5))
        );
    }
}
