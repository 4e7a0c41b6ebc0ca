//! Cross-generation records of chosen individuals.
//!
//! The [`Lineage`] map stores every individual's origin,
//! so following a line of descent is a graph traversal
//! over parent links.
use crate::individuals::{IndividualId, Origin, Position};
use crate::populations::{fitness, GenePool};

use ahash::RandomState;
use serde::{Deserialize, Serialize};

use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};

/// Which individuals have their paths recorded.
#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub enum TrackMode {
    /// Every individual of every generation.
    All,
    /// The `n` fittest individuals of each generation.
    Champions(usize),
    /// The listed individuals and all their descendants.
    Lineages(Vec<IndividualId>),
}

/// Parent links of every individual seen so far.
#[derive(Clone, Default, Debug, Serialize, Deserialize)]
pub struct Lineage {
    origins: HashMap<IndividualId, Origin, RandomState>,
}

impl Lineage {
    pub fn new() -> Lineage {
        Lineage::default()
    }

    /// Records the origin of every individual in `pool`.
    pub fn record(&mut self, pool: &GenePool) {
        self.origins
            .extend(pool.individuals().map(|i| (i.id(), *i.origin())));
    }

    /// Forgets individuals born in `generation` or later.
    pub(crate) fn truncate(&mut self, generation: usize) {
        self.origins.retain(|id, _| id.generation() < generation);
    }

    pub fn origin(&self, id: IndividualId) -> Option<&Origin> {
        self.origins.get(&id)
    }

    /// Parents of `id`; empty for roots and unknown individuals.
    pub fn parents(&self, id: IndividualId) -> &[IndividualId] {
        self.origins.get(&id).map(Origin::parents).unwrap_or(&[])
    }

    /// All known ancestors of `id`, not including itself.
    pub fn ancestors(&self, id: IndividualId) -> BTreeSet<IndividualId> {
        let mut ancestors = BTreeSet::new();
        let mut queue: VecDeque<IndividualId> = self.parents(id).iter().copied().collect();
        while let Some(current) = queue.pop_front() {
            if ancestors.insert(current) {
                queue.extend(self.parents(current));
            }
        }
        ancestors
    }

    /// Returns `true` if `ancestor` is `id` or one of its ancestors.
    ///
    /// # Examples
    /// ```
    /// use evosim::{GenePool, Genome, IndividualId, Lineage};
    ///
    /// let pool = GenePool::seeded(0, vec![Genome::from_genes(vec![0.0])]);
    /// let mut lineage = Lineage::new();
    /// lineage.record(&pool);
    ///
    /// assert!(lineage.descends_from(IndividualId(0, 0), IndividualId(0, 0)));
    /// assert!(!lineage.descends_from(IndividualId(0, 0), IndividualId(1, 0)));
    /// ```
    pub fn descends_from(&self, id: IndividualId, ancestor: IndividualId) -> bool {
        if id == ancestor {
            return true;
        }
        // Parents always belong to an earlier generation.
        let mut visited = BTreeSet::new();
        let mut queue = VecDeque::from([id]);
        while let Some(current) = queue.pop_front() {
            for parent in self.parents(current) {
                if *parent == ancestor {
                    return true;
                }
                if parent.generation() >= ancestor.generation() && visited.insert(*parent) {
                    queue.push_back(*parent);
                }
            }
        }
        false
    }

    pub fn len(&self) -> usize {
        self.origins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.origins.is_empty()
    }
}

/// Records the trajectories of tracked individuals
/// across generations, along with the lineage map.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Tracker {
    mode: TrackMode,
    lineage: Lineage,
    paths: BTreeMap<usize, BTreeMap<IndividualId, Vec<Position>>>,
}

impl Tracker {
    pub fn new(mode: TrackMode) -> Tracker {
        Tracker {
            mode,
            lineage: Lineage::new(),
            paths: BTreeMap::new(),
        }
    }

    pub fn mode(&self) -> &TrackMode {
        &self.mode
    }

    pub fn lineage(&self) -> &Lineage {
        &self.lineage
    }

    /// Records the lineage of an evaluated pool and the
    /// trajectories of its tracked individuals. Recording a
    /// generation again replaces its paths.
    pub fn record(&mut self, evaluated: &GenePool) {
        self.lineage.record(evaluated);
        let tracked: BTreeSet<IndividualId> = match &self.mode {
            TrackMode::All => evaluated.ids().collect(),
            TrackMode::Champions(n) => {
                let mut ranked: Vec<(IndividualId, f32)> = fitness(evaluated).into_iter().collect();
                ranked.sort_by(|(id_a, a), (id_b, b)| b.total_cmp(a).then(id_a.cmp(id_b)));
                ranked.into_iter().take(*n).map(|(id, _)| id).collect()
            }
            TrackMode::Lineages(roots) => evaluated
                .ids()
                .filter(|id| roots.iter().any(|root| self.lineage.descends_from(*id, *root)))
                .collect(),
        };
        let paths = evaluated
            .individuals()
            .filter(|i| tracked.contains(&i.id()))
            .map(|i| (i.id(), i.trajectory().to_vec()))
            .collect();
        self.paths.insert(evaluated.generation(), paths);
    }

    /// Undoes the recording of `generation` and
    /// every later one.
    pub(crate) fn forget(&mut self, generation: usize) {
        self.paths.split_off(&generation);
        self.lineage.truncate(generation);
    }

    /// Paths recorded for `generation`.
    pub fn generation(&self, generation: usize) -> Option<&BTreeMap<IndividualId, Vec<Position>>> {
        self.paths.get(&generation)
    }

    /// Path recorded for `id`, if it was tracked.
    pub fn path(&self, id: IndividualId) -> Option<&[Position]> {
        self.paths
            .get(&id.generation())
            .and_then(|paths| paths.get(&id))
            .map(Vec::as_slice)
    }

    /// Tracked paths along the line of descent ending in `id`,
    /// oldest first.
    pub fn ancestry_paths(&self, id: IndividualId) -> Vec<(IndividualId, &[Position])> {
        let mut line: Vec<IndividualId> = self.lineage.ancestors(id).into_iter().collect();
        line.push(id);
        line.into_iter()
            .filter_map(|i| self.path(i).map(|p| (i, p)))
            .collect()
    }

    pub fn generations(&self) -> impl Iterator<Item = usize> + '_ {
        self.paths.keys().copied()
    }
}
