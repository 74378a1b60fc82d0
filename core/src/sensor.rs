//! Observation models for the source-seeking agent.
//!
//! An observation model plays two roles. During simulation it draws a noisy
//! observation of the true target from the agent's pose. During filtering it scores
//! how likely a realized observation is for a hypothesized target position. The
//! filters only ever use the second role, and they use it in bulk: one likelihood per
//! grid cell or per particle on every update. [ObservationModel::prob_batch] is the
//! entry point for that path and [ObservationModel::prob] the single-query one.
//!
//! Two models are provided:
//! - [BearingOnlySensor]: a continuous compass bearing corrupted by Gaussian noise.
//! - [FovSensor]: a binary detector whose detection probability depends on where the
//!   target sits relative to the agent's heading and on its range.

use std::fmt::{self, Debug, Display};

use nalgebra::{DVector, Vector2};
use rand::Rng;
use rand_distr::StandardNormal;

use crate::Pose;
use crate::error::{FilterError, Result};
use crate::geometry::{distance2, fit180, gaussian_pdf, true_bearing, wrap360};

/// Generic observation model trait shared by every sensor the filters consume
pub trait ObservationModel {
    /// The type of a single realized observation
    type Observation: Copy + Debug;

    /// Draw a noisy observation of `target` as seen from `pose`.
    fn observe<R: Rng + ?Sized>(
        &self,
        target: &Vector2<f64>,
        pose: &Pose,
        rng: &mut R,
    ) -> Self::Observation;

    /// Likelihood (or density, for continuous observations) of `observation` given a
    /// target at `target` and the agent at `pose`.
    fn prob(&self, target: &Vector2<f64>, pose: &Pose, observation: Self::Observation) -> f64;

    /// Likelihood of `observation` for every hypothesized target `(xs[k], ys[k])`.
    ///
    /// The coordinate vectors must have the same length; a mismatch is reported as
    /// [FilterError::ShapeMismatch] rather than truncated.
    fn prob_batch(
        &self,
        xs: &DVector<f64>,
        ys: &DVector<f64>,
        pose: &Pose,
        observation: Self::Observation,
    ) -> Result<DVector<f64>> {
        if xs.len() != ys.len() {
            return Err(FilterError::ShapeMismatch {
                xs: xs.len(),
                ys: ys.len(),
            });
        }
        Ok(xs.zip_map(ys, |x, y| {
            self.prob(&Vector2::new(x, y), pose, observation)
        }))
    }
}

/// Bearing-only sensor: reports the compass bearing to the target plus Gaussian noise.
#[derive(Clone, Debug)]
pub struct BearingOnlySensor {
    /// Standard deviation of the bearing noise in degrees
    pub sigma: f64,
}
impl Display for BearingOnlySensor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BearingOnlySensor(sigma: {}°)", self.sigma)
    }
}
impl BearingOnlySensor {
    pub fn new(sigma: f64) -> Self {
        assert!(
            sigma > 0.0 && sigma.is_finite(),
            "Bearing noise standard deviation must be positive and finite"
        );
        BearingOnlySensor { sigma }
    }
}
impl ObservationModel for BearingOnlySensor {
    type Observation = f64;

    fn observe<R: Rng + ?Sized>(&self, target: &Vector2<f64>, pose: &Pose, rng: &mut R) -> f64 {
        let truth = true_bearing(&pose.position(), target);
        let noise: f64 = rng.sample(StandardNormal);
        wrap360(truth + self.sigma * noise)
    }

    fn prob(&self, target: &Vector2<f64>, pose: &Pose, observation: f64) -> f64 {
        let bearing = true_bearing(&pose.position(), target);
        gaussian_pdf(fit180(observation - bearing), self.sigma)
    }

    fn prob_batch(
        &self,
        xs: &DVector<f64>,
        ys: &DVector<f64>,
        pose: &Pose,
        observation: f64,
    ) -> Result<DVector<f64>> {
        if xs.len() != ys.len() {
            return Err(FilterError::ShapeMismatch {
                xs: xs.len(),
                ys: ys.len(),
            });
        }
        let dx = xs.add_scalar(-pose.x);
        let dy = ys.add_scalar(-pose.y);
        let residuals = dx.zip_map(&dy, |dx, dy| {
            fit180(observation - wrap360(dx.atan2(dy).to_degrees()))
        });
        Ok(residuals.map(|r| gaussian_pdf(r, self.sigma)))
    }
}

/// Field-of-view detector.
///
/// The detector answers "is the target in front of me?". The detection probability
/// is split into three zones by the bearing of the target relative to the heading:
/// inside the cone (`1 - alpha`), abeam (`0.5`), and behind (`alpha`). Beyond the
/// blind distance the detector is uninformative (`0.5`).
#[derive(Clone, Debug)]
pub struct FovSensor {
    /// Probability of a false detection behind the agent (and of a miss inside the cone)
    pub alpha: f64,
    /// Full width of the forward cone in degrees
    pub cone_width: f64,
    /// Range past which the detector carries no information
    pub blind_distance: f64,
}
impl Display for FovSensor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "FovSensor(alpha: {}, cone_width: {}°, blind_distance: {})",
            self.alpha, self.cone_width, self.blind_distance
        )
    }
}
impl FovSensor {
    pub fn new(alpha: f64, cone_width: f64, blind_distance: f64) -> Self {
        assert!(
            (0.0..=1.0).contains(&alpha),
            "FOV detector alpha must lie in [0, 1]"
        );
        assert!(
            cone_width > 0.0 && cone_width <= 360.0,
            "FOV cone width must lie in (0, 360] degrees"
        );
        assert!(blind_distance >= 0.0, "Blind distance must be non-negative");
        FovSensor {
            alpha,
            cone_width,
            blind_distance,
        }
    }

    /// Probability of a positive detection for a target at `target`.
    pub fn detection_probability(&self, target: &Vector2<f64>, pose: &Pose) -> f64 {
        let position = pose.position();
        if distance2(&position, target) > self.blind_distance * self.blind_distance {
            return 0.5;
        }
        let relative = fit180(pose.heading - true_bearing(&position, target)).abs();
        self.zone_probability(relative)
    }

    fn zone_probability(&self, relative_bearing: f64) -> f64 {
        let half_cone = self.cone_width / 2.0;
        if relative_bearing < half_cone {
            1.0 - self.alpha
        } else if relative_bearing < 180.0 - half_cone {
            0.5
        } else {
            self.alpha
        }
    }
}
impl ObservationModel for FovSensor {
    /// `true` when the target is detected
    type Observation = bool;

    fn observe<R: Rng + ?Sized>(&self, target: &Vector2<f64>, pose: &Pose, rng: &mut R) -> bool {
        rng.random::<f64>() < self.detection_probability(target, pose)
    }

    fn prob(&self, target: &Vector2<f64>, pose: &Pose, observation: bool) -> f64 {
        let detection = self.detection_probability(target, pose);
        if observation { detection } else { 1.0 - detection }
    }

    fn prob_batch(
        &self,
        xs: &DVector<f64>,
        ys: &DVector<f64>,
        pose: &Pose,
        observation: bool,
    ) -> Result<DVector<f64>> {
        if xs.len() != ys.len() {
            return Err(FilterError::ShapeMismatch {
                xs: xs.len(),
                ys: ys.len(),
            });
        }
        let dx = xs.add_scalar(-pose.x);
        let dy = ys.add_scalar(-pose.y);
        let range2 = dx.component_mul(&dx) + dy.component_mul(&dy);
        let relative = dx.zip_map(&dy, |dx, dy| {
            fit180(pose.heading - wrap360(dx.atan2(dy).to_degrees())).abs()
        });
        let blind2 = self.blind_distance * self.blind_distance;
        Ok(range2.zip_map(&relative, |r2, rel| {
            let detection = if r2 > blind2 {
                0.5
            } else {
                self.zone_probability(rel)
            };
            if observation { detection } else { 1.0 - detection }
        }))
    }
}
