use rand::Rng;
use serde::{Deserialize, Serialize};

use std::fmt;

/// An immutable, ordered sequence of real-valued genes.
///
/// Genomes are never modified after creation: genetic
/// operators always produce new genomes.
#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub struct Genome {
    genes: Vec<f32>,
}

impl Genome {
    /// Creates a genome holding the passed genes.
    ///
    /// # Examples
    /// ```
    /// use evosim::Genome;
    ///
    /// let genome = Genome::from_genes(vec![0.5, -1.0, 2.0]);
    /// assert_eq!(genome.len(), 3);
    /// assert_eq!(genome.genes(), &[0.5, -1.0, 2.0]);
    /// ```
    pub fn from_genes(genes: Vec<f32>) -> Genome {
        Genome { genes }
    }

    /// Returns the genome's genes.
    pub fn genes(&self) -> &[f32] {
        &self.genes
    }

    /// Returns the number of genes in the genome.
    pub fn len(&self) -> usize {
        self.genes.len()
    }

    /// Returns `true` if the genome holds no genes.
    pub fn is_empty(&self) -> bool {
        self.genes.is_empty()
    }
}

impl fmt::Display for Genome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Genome[")?;
        for (i, gene) in self.genes.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{:.3}", gene)?;
        }
        write!(f, "]")
    }
}

/// Closed interval a single gene may take values in.
#[derive(Clone, Copy, PartialEq, Debug, Serialize, Deserialize)]
pub struct GeneBounds {
    min: f32,
    max: f32,
}

impl GeneBounds {
    /// Returns the bounds `[min, max]`, or `None`
    /// if either bound is not finite or `min > max`.
    ///
    /// # Examples
    /// ```
    /// use evosim::GeneBounds;
    ///
    /// assert!(GeneBounds::new(-1.0, 1.0).is_some());
    /// assert!(GeneBounds::new(1.0, 1.0).is_some());
    /// assert!(GeneBounds::new(1.0, -1.0).is_none());
    /// assert!(GeneBounds::new(0.0, f32::INFINITY).is_none());
    /// ```
    pub fn new(min: f32, max: f32) -> Option<GeneBounds> {
        if min.is_finite() && max.is_finite() && min <= max {
            Some(GeneBounds { min, max })
        } else {
            None
        }
    }

    pub fn min(&self) -> f32 {
        self.min
    }

    pub fn max(&self) -> f32 {
        self.max
    }

    /// Draws a value uniformly from the bounds.
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> f32 {
        rng.gen_range(self.min..=self.max)
    }

    /// Clamps `value` into the bounds.
    pub fn clamp(&self, value: f32) -> f32 {
        value.clamp(self.min, self.max)
    }

    /// Returns whether `value` lies within the bounds.
    pub fn contains(&self, value: f32) -> bool {
        (self.min..=self.max).contains(&value)
    }
}

/// The space of valid genomes: one [`GeneBounds`] per gene.
///
/// The gene space fixes the length of every genome
/// in an evolution.
#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub struct GeneSpace {
    bounds: Vec<GeneBounds>,
}

impl GeneSpace {
    /// Creates a gene space from per-gene bounds.
    pub fn new(bounds: Vec<GeneBounds>) -> GeneSpace {
        GeneSpace { bounds }
    }

    /// Creates a gene space of `len` genes sharing the same bounds.
    ///
    /// # Examples
    /// ```
    /// use evosim::{GeneBounds, GeneSpace};
    ///
    /// let space = GeneSpace::uniform(4, GeneBounds::new(-1.0, 1.0).unwrap());
    /// assert_eq!(space.len(), 4);
    /// ```
    pub fn uniform(len: usize, bounds: GeneBounds) -> GeneSpace {
        GeneSpace {
            bounds: vec![bounds; len],
        }
    }

    /// Returns the number of genes in each genome of the space.
    pub fn len(&self) -> usize {
        self.bounds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bounds.is_empty()
    }

    /// Returns the bounds of the gene at `index`.
    pub fn bounds(&self, index: usize) -> Option<&GeneBounds> {
        self.bounds.get(index)
    }

    /// Returns a genome with every gene drawn
    /// uniformly from its bounds.
    ///
    /// # Examples
    /// ```
    /// use evosim::{GeneBounds, GeneSpace};
    /// use rand::SeedableRng;
    ///
    /// let space = GeneSpace::uniform(8, GeneBounds::new(0.0, 2.0).unwrap());
    /// let mut rng = rand::rngs::StdRng::seed_from_u64(7);
    /// let genome = space.random_genome(&mut rng);
    ///
    /// assert_eq!(genome.len(), 8);
    /// assert!(space.contains(&genome));
    /// ```
    pub fn random_genome<R: Rng + ?Sized>(&self, rng: &mut R) -> Genome {
        Genome::from_genes(self.bounds.iter().map(|b| b.sample(rng)).collect())
    }

    /// Draws a fresh value for the gene at `index`.
    ///
    /// # Panics
    /// Panics if `index` is outside the gene space.
    pub fn sample_gene<R: Rng + ?Sized>(&self, index: usize, rng: &mut R) -> f32 {
        self.bounds[index].sample(rng)
    }

    /// Clamps `value` into the bounds of the gene at `index`.
    ///
    /// # Panics
    /// Panics if `index` is outside the gene space.
    pub fn clamp_gene(&self, index: usize, value: f32) -> f32 {
        self.bounds[index].clamp(value)
    }

    /// Returns whether `genome` has the space's length
    /// and every gene lies within its bounds.
    pub fn contains(&self, genome: &Genome) -> bool {
        genome.len() == self.len()
            && genome
                .genes()
                .iter()
                .zip(&self.bounds)
                .all(|(gene, bounds)| bounds.contains(*gene))
    }
}
