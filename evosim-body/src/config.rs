use serde::{Deserialize, Serialize};

use std::error::Error;
use std::fmt;
use std::num::NonZeroUsize;

/// Configuration of creature construction and actuation.
#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub struct BodyConfig {
    /// Number of target angles in each joint's cyclic pattern.
    pub pattern_length: NonZeroUsize,
    /// Whether right-side parts copy the sizes of
    /// their left-side counterparts.
    pub symmetric: bool,
    /// Smallest half-extent of a body part box.
    pub min_half_extent: f32,
    /// Largest half-extent of a body part box.
    pub max_half_extent: f32,
    /// Radius of the spheres linking body parts.
    pub joint_radius: f32,
    /// Mass of each linking sphere.
    pub joint_mass: f32,
    /// Volume of a body part weighing exactly 1.
    pub standard_volume: f32,
    /// Motor force of a weightless part.
    pub min_force: f32,
    /// Motor force approached by very heavy parts.
    pub max_force: f32,
    /// Motor stiffness towards the target angle.
    pub motor_stiffness: f32,
    /// Motor damping of the joint velocity.
    pub motor_damping: f32,
    /// Friction coefficient of the ground and every part.
    pub friction: f32,
    /// Gap between the ground and the lowest
    /// point of a freshly spawned creature.
    pub drop_height: f32,
    /// Downward gravitational acceleration.
    pub gravity: f32,
}

impl BodyConfig {
    /// Returns a "zero-valued" default configuration.
    /// All values are 0, `false`, or in the case of
    /// `NonZeroUsize`s, 1.
    ///
    /// # Note
    /// This value is not suitable for use in most experiments.
    /// It is meant as a way to fill in unused values during
    /// configuration instantiation.
    ///
    /// # Examples
    /// ```
    /// use evosim_body::BodyConfig;
    ///
    /// let config = BodyConfig {
    ///     min_half_extent: 0.2,
    ///     max_half_extent: 0.4,
    ///     ..BodyConfig::zero()
    /// };
    /// assert!(!config.symmetric);
    /// ```
    pub const fn zero() -> BodyConfig {
        BodyConfig {
            // SAFETY: 1 is a valid NonZeroUsize.
            pattern_length: unsafe { NonZeroUsize::new_unchecked(1) },
            symmetric: false,
            min_half_extent: 0.0,
            max_half_extent: 0.0,
            joint_radius: 0.0,
            joint_mass: 0.0,
            standard_volume: 0.0,
            min_force: 0.0,
            max_force: 0.0,
            motor_stiffness: 0.0,
            motor_damping: 0.0,
            friction: 0.0,
            drop_height: 0.0,
            gravity: 0.0,
        }
    }

    /// Checks that every field holds a usable value.
    pub fn validate(&self) -> Result<(), BodyConfigError> {
        let positive = [
            ("min_half_extent", self.min_half_extent),
            ("joint_radius", self.joint_radius),
            ("joint_mass", self.joint_mass),
            ("standard_volume", self.standard_volume),
        ];
        for (field, value) in positive {
            if !(value.is_finite() && value > 0.0) {
                return Err(BodyConfigError::NotPositive { field, value });
            }
        }
        let non_negative = [
            ("min_force", self.min_force),
            ("motor_stiffness", self.motor_stiffness),
            ("motor_damping", self.motor_damping),
            ("friction", self.friction),
            ("drop_height", self.drop_height),
            ("gravity", self.gravity),
        ];
        for (field, value) in non_negative {
            if !(value.is_finite() && value >= 0.0) {
                return Err(BodyConfigError::Negative { field, value });
            }
        }
        if !(self.max_half_extent.is_finite() && self.max_half_extent >= self.min_half_extent) {
            return Err(BodyConfigError::EmptyRange {
                field: "max_half_extent",
                min: self.min_half_extent,
                max: self.max_half_extent,
            });
        }
        if !(self.max_force.is_finite() && self.max_force > self.min_force) {
            return Err(BodyConfigError::EmptyRange {
                field: "max_force",
                min: self.min_force,
                max: self.max_force,
            });
        }
        Ok(())
    }
}

impl Default for BodyConfig {
    fn default() -> BodyConfig {
        BodyConfig {
            pattern_length: NonZeroUsize::new(4).unwrap_or(NonZeroUsize::MIN),
            symmetric: false,
            min_half_extent: 0.2,
            max_half_extent: 0.45,
            joint_radius: 0.12,
            joint_mass: 0.1,
            // A cube of half-extent 0.325, halfway between the bounds.
            standard_volume: 0.274_625,
            min_force: 20.0,
            max_force: 300.0,
            motor_stiffness: 60.0,
            motor_damping: 6.0,
            friction: 2.0,
            drop_height: 0.05,
            gravity: 9.81,
        }
    }
}

/// A [`BodyConfig`] field holding an unusable value.
#[derive(Clone, PartialEq, Debug)]
pub enum BodyConfigError {
    NotPositive { field: &'static str, value: f32 },
    Negative { field: &'static str, value: f32 },
    /// An upper bound below its lower bound.
    EmptyRange {
        field: &'static str,
        min: f32,
        max: f32,
    },
}

impl fmt::Display for BodyConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotPositive { field, value } => {
                write!(f, "{} must be positive and finite, found {}", field, value)
            }
            Self::Negative { field, value } => {
                write!(f, "{} must be non-negative and finite, found {}", field, value)
            }
            Self::EmptyRange { field, min, max } => {
                write!(f, "{} ({}) must exceed its lower bound ({})", field, max, min)
            }
        }
    }
}

impl Error for BodyConfigError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_valid() {
        assert_eq!(BodyConfig::default().validate(), Ok(()));
    }

    #[test]
    fn zero_is_rejected() {
        assert!(matches!(
            BodyConfig::zero().validate(),
            Err(BodyConfigError::NotPositive {
                field: "min_half_extent",
                ..
            })
        ));
    }

    #[test]
    fn inverted_ranges_are_rejected() {
        let config = BodyConfig {
            max_half_extent: 0.1,
            ..BodyConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(BodyConfigError::EmptyRange {
                field: "max_half_extent",
                ..
            })
        ));

        let config = BodyConfig {
            max_force: 10.0,
            ..BodyConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(BodyConfigError::EmptyRange {
                field: "max_force",
                ..
            })
        ));
    }

    #[test]
    fn roundtrips_through_ron() {
        let config = BodyConfig {
            symmetric: true,
            ..BodyConfig::default()
        };
        let text = ron::to_string(&config).unwrap();
        assert_eq!(ron::from_str::<BodyConfig>(&text).unwrap(), config);
    }
}
