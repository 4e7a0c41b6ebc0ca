use super::Position;

use std::error::Error;
use std::fmt;

/// Invalid inputs to the distance metric.
#[derive(Clone, Copy, PartialEq, Debug)]
pub enum InvalidStateError {
    /// The trajectory holds no positions.
    EmptyTrajectory,
    /// The target has a non-finite coordinate.
    NonFiniteTarget,
    /// The final trajectory position has a non-finite coordinate.
    NonFinitePosition,
}

impl fmt::Display for InvalidStateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyTrajectory => write!(f, "trajectory is empty"),
            Self::NonFiniteTarget => write!(f, "target has non-finite coordinates"),
            Self::NonFinitePosition => write!(f, "final position has non-finite coordinates"),
        }
    }
}

impl Error for InvalidStateError {}

/// Returns the ground-plane distance between the final
/// position of `trajectory` and `target`.
///
/// The vertical (`z`) coordinate is ignored: bodies are
/// evaluated by where they end up on the ground, not by
/// how high they stand.
///
/// # Errors
/// Fails if the trajectory is empty, or either the target
/// or the final position are not finite.
///
/// # Examples
/// ```
/// use evosim::{get_dist, InvalidStateError, Position};
///
/// let trajectory = [Position::new(0.0, 0.0, 1.0), Position::new(3.0, 4.0, 0.5)];
/// assert_eq!(get_dist(&trajectory, Position::new(0.0, 0.0, 0.0)), Ok(5.0));
/// assert_eq!(get_dist(&[], Position::ORIGIN), Err(InvalidStateError::EmptyTrajectory));
/// ```
pub fn get_dist(trajectory: &[Position], target: Position) -> Result<f32, InvalidStateError> {
    if !target.is_finite() {
        return Err(InvalidStateError::NonFiniteTarget);
    }
    let last = trajectory.last().ok_or(InvalidStateError::EmptyTrajectory)?;
    if !last.is_finite() {
        return Err(InvalidStateError::NonFinitePosition);
    }
    Ok(last.planar_distance(&target))
}
