use crate::BodyConfig;

use evosim::{GeneBounds, GeneSpace, Genome};
use serde::{Deserialize, Serialize};

use std::error::Error;
use std::f32::consts::PI;
use std::fmt;

/// Number of genes encoding the dimensions of a single part.
pub const GENES_PER_PART: usize = 3;

/// Box-shaped parts of a creature, in genome order.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub enum Part {
    LeftHand,
    RightHand,
    LeftFoot,
    RightFoot,
    Chest,
    Hip,
}

impl Part {
    pub const ALL: [Part; 6] = [
        Part::LeftHand,
        Part::RightHand,
        Part::LeftFoot,
        Part::RightFoot,
        Part::Chest,
        Part::Hip,
    ];

    /// Position of the part's genes in [`Part::ALL`] order.
    pub fn index(self) -> usize {
        self as usize
    }

    /// The left-side part a right-side part mirrors,
    /// if any.
    pub fn mirrored(self) -> Option<Part> {
        match self {
            Part::RightHand => Some(Part::LeftHand),
            Part::RightFoot => Some(Part::LeftFoot),
            _ => None,
        }
    }
}

/// Motorized revolute joints of a creature, in genome order.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub enum Joint {
    HipX,
    HipY,
    LeftArmY,
    LeftArmZ,
    RightArmY,
    RightArmZ,
    LeftLegY,
    LeftLegZ,
    RightLegY,
    RightLegZ,
}

impl Joint {
    pub const ALL: [Joint; 10] = [
        Joint::HipX,
        Joint::HipY,
        Joint::LeftArmY,
        Joint::LeftArmZ,
        Joint::RightArmY,
        Joint::RightArmZ,
        Joint::LeftLegY,
        Joint::LeftLegZ,
        Joint::RightLegY,
        Joint::RightLegZ,
    ];

    pub fn index(self) -> usize {
        self as usize
    }
}

/// Maps genomes to creature blueprints.
///
/// A genome holds [`GENES_PER_PART`] half-extents for each
/// [`Part`], followed by `pattern_length` target angles
/// for each [`Joint`], joint after joint.
#[derive(Clone, PartialEq, Debug)]
pub struct BodyLayout {
    pattern_length: usize,
    symmetric: bool,
    size_bounds: GeneBounds,
    angle_bounds: GeneBounds,
}

impl BodyLayout {
    /// Creates the layout described by `config`.
    ///
    /// # Errors
    /// Returns `None` if the half-extent bounds
    /// do not form an interval.
    pub fn new(config: &BodyConfig) -> Option<BodyLayout> {
        Some(BodyLayout {
            pattern_length: config.pattern_length.get(),
            symmetric: config.symmetric,
            size_bounds: GeneBounds::new(config.min_half_extent, config.max_half_extent)?,
            angle_bounds: GeneBounds::new(-PI, PI)?,
        })
    }

    pub fn pattern_length(&self) -> usize {
        self.pattern_length
    }

    /// Total number of genes of a creature genome.
    ///
    /// # Examples
    /// ```
    /// use evosim_body::{BodyConfig, BodyLayout};
    /// use std::num::NonZeroUsize;
    ///
    /// let config = BodyConfig {
    ///     pattern_length: NonZeroUsize::new(5).unwrap(),
    ///     ..BodyConfig::default()
    /// };
    /// let layout = BodyLayout::new(&config).unwrap();
    /// assert_eq!(layout.genome_len(), 6 * 3 + 10 * 5);
    /// ```
    pub fn genome_len(&self) -> usize {
        Part::ALL.len() * GENES_PER_PART + Joint::ALL.len() * self.pattern_length
    }

    /// Bounds of every gene, for use by the evolution engine.
    pub fn gene_space(&self) -> GeneSpace {
        let sizes = Part::ALL.len() * GENES_PER_PART;
        let bounds = (0..self.genome_len())
            .map(|i| {
                if i < sizes {
                    self.size_bounds
                } else {
                    self.angle_bounds
                }
            })
            .collect();
        GeneSpace::new(bounds)
    }

    /// Reads the blueprint encoded by `genome`.
    ///
    /// Sizes are clamped into their bounds, so
    /// out-of-range genes never build degenerate parts.
    pub fn decode(&self, genome: &Genome) -> Result<BodyPlan, LayoutError> {
        if genome.len() != self.genome_len() {
            return Err(LayoutError::GenomeLength {
                expected: self.genome_len(),
                found: genome.len(),
            });
        }
        let genes = genome.genes();
        if let Some(index) = genes.iter().position(|g| !g.is_finite()) {
            return Err(LayoutError::NonFiniteGene { index });
        }

        let mut half_extents = [[0.0; 3]; 6];
        for part in Part::ALL {
            let source = match part.mirrored() {
                Some(left) if self.symmetric => left,
                _ => part,
            };
            let start = source.index() * GENES_PER_PART;
            for (axis, extent) in half_extents[part.index()].iter_mut().enumerate() {
                *extent = self.size_bounds.clamp(genes[start + axis]);
            }
        }

        let patterns = genes[Part::ALL.len() * GENES_PER_PART..]
            .chunks(self.pattern_length)
            .map(|angles| angles.to_vec())
            .collect();

        Ok(BodyPlan {
            half_extents,
            patterns,
        })
    }
}

/// Dimensions and motion of a single creature.
#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub struct BodyPlan {
    half_extents: [[f32; 3]; 6],
    patterns: Vec<Vec<f32>>,
}

impl BodyPlan {
    pub fn half_extents(&self, part: Part) -> [f32; 3] {
        self.half_extents[part.index()]
    }

    /// The cyclic target angle pattern of `joint`.
    pub fn pattern(&self, joint: Joint) -> &[f32] {
        &self.patterns[joint.index()]
    }

    /// Target angle of `joint` at the passed step.
    ///
    /// # Examples
    /// ```
    /// use evosim::Genome;
    /// use evosim_body::{BodyConfig, BodyLayout, Joint};
    /// use std::num::NonZeroUsize;
    ///
    /// let layout = BodyLayout::new(&BodyConfig {
    ///     pattern_length: NonZeroUsize::new(2).unwrap(),
    ///     ..BodyConfig::default()
    /// })
    /// .unwrap();
    /// let mut genes = vec![0.3; 18];
    /// genes.extend((0..20).map(|i| i as f32 * 0.1));
    /// let plan = layout.decode(&Genome::from_genes(genes)).unwrap();
    ///
    /// assert_eq!(plan.target(Joint::HipX, 0), 0.0);
    /// assert_eq!(plan.target(Joint::HipX, 3), 0.1);
    /// assert_eq!(plan.target(Joint::HipY, 4), 0.2);
    /// ```
    pub fn target(&self, joint: Joint, step: usize) -> f32 {
        let pattern = self.pattern(joint);
        pattern[step % pattern.len()]
    }
}

/// A genome which does not encode a creature.
#[derive(Clone, PartialEq, Debug)]
pub enum LayoutError {
    GenomeLength { expected: usize, found: usize },
    NonFiniteGene { index: usize },
}

impl fmt::Display for LayoutError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::GenomeLength { expected, found } => write!(
                f,
                "creature genomes hold {} genes, found {}",
                expected, found
            ),
            Self::NonFiniteGene { index } => write!(f, "gene {} is not finite", index),
        }
    }
}

impl Error for LayoutError {}
