//! Physical properties derived from part dimensions.

/// Mass of a box with the passed half-extents,
/// in units of the mass of a box of `standard_volume`.
///
/// # Examples
/// ```
/// use evosim_body::compute_mass;
///
/// // A 1x1x1 box measured against a unit volume.
/// assert_eq!(compute_mass([0.5, 0.5, 0.5], 1.0), 1.0);
/// assert_eq!(compute_mass([1.0, 0.5, 0.5], 1.0), 2.0);
/// ```
pub fn compute_mass(half_extents: [f32; 3], standard_volume: f32) -> f32 {
    let [x, y, z] = half_extents;
    8.0 * x * y * z / standard_volume
}

/// Maximum motor force available to move a part of `mass`.
///
/// Grows with mass from a little above `min_force`,
/// saturating towards `max_force` for heavy parts.
pub fn compute_force(mass: f32, min_force: f32, max_force: f32) -> f32 {
    1.0 / (1.0 / (max_force - min_force) + (-3.0 * mass).exp()) + min_force
}
