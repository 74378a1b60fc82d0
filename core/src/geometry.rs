//! Planar geometry helpers shared by the sensors, policies and cost models.
//!
//! Angles are in degrees. Bearings follow the compass convention used throughout the
//! crate: 0° points along +y, 90° along +x, and values are wrapped to `[0, 360)`.

use nalgebra::Vector2;

/// Compass bearing in degrees from `from` to `to`, wrapped to `[0, 360)`.
pub fn true_bearing(from: &Vector2<f64>, to: &Vector2<f64>) -> f64 {
    let dx = to.x - from.x;
    let dy = to.y - from.y;
    wrap360(dx.atan2(dy).to_degrees())
}

/// Wrap an angle in degrees to `[0, 360)`.
pub fn wrap360(angle: f64) -> f64 {
    let wrapped = angle.rem_euclid(360.0);
    // rem_euclid can round up to exactly 360 for tiny negative inputs
    if wrapped >= 360.0 { 0.0 } else { wrapped }
}

/// Fold an angle in degrees into `(-180, 180]`.
///
/// Used to turn the difference of two bearings into the smallest signed residual,
/// e.g. `fit180(359.0 - 1.0) == -2.0`.
pub fn fit180(angle: f64) -> f64 {
    let wrapped = wrap360(angle);
    if wrapped > 180.0 { wrapped - 360.0 } else { wrapped }
}

/// Squared Euclidean distance between two points.
pub fn distance2(a: &Vector2<f64>, b: &Vector2<f64>) -> f64 {
    (a - b).norm_squared()
}

/// Gaussian probability density with zero mean.
pub fn gaussian_pdf(residual: f64, sigma: f64) -> f64 {
    let normalized = residual / sigma;
    (-0.5 * normalized * normalized).exp() / (sigma * (2.0 * std::f64::consts::PI).sqrt())
}
