use crate::evolution::ConfigError;
use crate::individuals::Position;
use crate::populations::Objective;

use serde::{Deserialize, Serialize};

use std::num::NonZeroUsize;
use std::time::Duration;

/// Real-time playback of a rollout.
#[derive(Clone, Copy, PartialEq, Debug, Serialize, Deserialize)]
pub struct Playback {
    /// Wall-clock seconds per simulated second.
    /// `1.0` plays in real time, larger values slow down.
    pub slow_down_factor: f32,
}

/// Configuration of individual rollouts.
#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub struct SimulationConfig {
    /// Physics steps per simulated second.
    pub fps: NonZeroUsize,
    /// Simulated seconds per rollout.
    pub duration_secs: f32,
    /// Position individuals are evaluated against.
    pub target: Position,
    /// How the final position is turned into fitness.
    pub objective: Objective,
    /// Planar distance to the target under which a rollout
    /// ends early. Only used with [`Objective::ReachTarget`].
    pub target_tolerance: Option<f32>,
    /// Wall-clock budget of a single rollout.
    pub timeout_secs: Option<f32>,
    /// Record one trajectory point every this many steps.
    pub record_every: NonZeroUsize,
    /// Render and slow down rollouts. Forces a single worker.
    pub playback: Option<Playback>,
}

impl SimulationConfig {
    /// Returns a "zero-valued" default configuration.
    /// All values are 0, empty, `None`, or in the case of
    /// `NonZeroUsize`s, 1.
    ///
    /// # Note
    /// This value does not pass validation: `duration_secs`
    /// must be set before use.
    pub const fn zero() -> SimulationConfig {
        SimulationConfig {
            // SAFETY: 1 is a valid NonZeroUsize.
            fps: unsafe { NonZeroUsize::new_unchecked(1) },
            duration_secs: 0.0,
            target: Position::ORIGIN,
            objective: Objective::ReachTarget,
            target_tolerance: None,
            timeout_secs: None,
            // SAFETY: 1 is a valid NonZeroUsize.
            record_every: unsafe { NonZeroUsize::new_unchecked(1) },
            playback: None,
        }
    }

    /// Number of physics steps in a full rollout.
    ///
    /// # Examples
    /// ```
    /// use evosim::SimulationConfig;
    /// use std::num::NonZeroUsize;
    ///
    /// let config = SimulationConfig {
    ///     fps: NonZeroUsize::new(240).unwrap(),
    ///     duration_secs: 2.5,
    ///     ..SimulationConfig::zero()
    /// };
    /// assert_eq!(config.max_steps(), 600);
    /// ```
    pub fn max_steps(&self) -> usize {
        (self.fps.get() as f32 * self.duration_secs).ceil().max(0.0) as usize
    }

    /// Simulated seconds per step.
    pub fn timestep(&self) -> f32 {
        1.0 / self.fps.get() as f32
    }

    pub(crate) fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs_f32)
    }

    pub(crate) fn frame_delay(&self) -> Option<Duration> {
        self.playback
            .map(|p| Duration::from_secs_f32(self.timestep() * p.slow_down_factor))
    }

    /// Checks that every field holds a usable value.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.duration_secs.is_finite() && self.duration_secs > 0.0) || self.max_steps() == 0 {
            return Err(ConfigError::InvalidDuration {
                field: "duration_secs",
                value: self.duration_secs,
            });
        }
        if !self.target.is_finite() {
            return Err(ConfigError::NonFiniteTarget(self.target));
        }
        if let Some(tolerance) = self.target_tolerance {
            if !(tolerance.is_finite() && tolerance >= 0.0) {
                return Err(ConfigError::InvalidDuration {
                    field: "target_tolerance",
                    value: tolerance,
                });
            }
        }
        if let Some(timeout) = self.timeout_secs {
            if !(timeout.is_finite() && timeout > 0.0) {
                return Err(ConfigError::InvalidDuration {
                    field: "timeout_secs",
                    value: timeout,
                });
            }
        }
        if let Some(playback) = self.playback {
            if !(playback.slow_down_factor.is_finite() && playback.slow_down_factor >= 0.0) {
                return Err(ConfigError::InvalidDuration {
                    field: "playback.slow_down_factor",
                    value: playback.slow_down_factor,
                });
            }
        }
        Ok(())
    }
}

impl Default for SimulationConfig {
    fn default() -> SimulationConfig {
        SimulationConfig {
            fps: NonZeroUsize::new(240).unwrap_or(NonZeroUsize::MIN),
            duration_secs: 10.0,
            target: Position::new(10.0, 0.0, 0.0),
            objective: Objective::Displacement,
            target_tolerance: None,
            timeout_secs: Some(60.0),
            record_every: NonZeroUsize::new(24).unwrap_or(NonZeroUsize::MIN),
            playback: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid() -> SimulationConfig {
        SimulationConfig {
            duration_secs: 1.0,
            ..SimulationConfig::zero()
        }
    }

    #[test]
    fn default_is_valid() {
        assert_eq!(SimulationConfig::default().validate(), Ok(()));
        assert_eq!(valid().validate(), Ok(()));
    }

    #[test]
    fn rejects_malformed_values() {
        assert!(SimulationConfig::zero().validate().is_err());
        let nan_target = SimulationConfig {
            target: Position::new(f32::NAN, 0.0, 0.0),
            ..valid()
        };
        assert!(matches!(
            nan_target.validate(),
            Err(ConfigError::NonFiniteTarget(_))
        ));
        let negative_timeout = SimulationConfig {
            timeout_secs: Some(-1.0),
            ..valid()
        };
        assert!(negative_timeout.validate().is_err());
        let infinite_duration = SimulationConfig {
            duration_secs: f32::INFINITY,
            ..valid()
        };
        assert!(infinite_duration.validate().is_err());
    }
}
