//! Filter-based estimation of a stationary signal source
//!
//! This crate estimates the unknown 2D position of a stationary emitter (the "target") from a
//! sequence of noisy observations collected by a moving agent (the "drone"). The heart of the crate
//! is a pair of interchangeable recursive Bayesian estimators that maintain a posterior over the
//! target position:
//!
//! - [filter::DiscreteFilter]: a grid-based discrete Bayes filter. The search domain is cut into
//!   `N x N` square cells and the posterior is the probability mass of each cell.
//! - [particle::ParticleFilter]: a sequential-importance-resampling particle filter. The posterior
//!   is a set of `M` weighted point samples, moved by a motion proposal, reweighted by each
//!   observation, and resampled with stratified resampling whenever the effective sample size drops
//!   below half the particle count.
//!
//! Both implement [BeliefFilter], which is the only surface the rest of the crate (policies, cost
//! models, the episode driver) uses. Downstream code therefore never depends on which
//! representation is in use.
//!
//! ## Crate overview
//!
//! - [geometry]: bearings, angle folding and distances in the plane.
//! - [sensor]: observation models ([sensor::BearingOnlySensor], [sensor::FovSensor]).
//! - [belief]: the grid and particle representations of the posterior and their statistics.
//! - [filter]: the discrete Bayes filter.
//! - [particle]: the particle filter and stratified resampling.
//! - [domain]: the search domain and target placement.
//! - [drone]: the agent pose and its additive motion model.
//! - [policy]: the discretized action set, the greedy action policy and the particle motion proposal.
//! - [cost]: scalar cost/reward functions of the filter statistics.
//! - [sim]: simulation configuration and the episode driver.
//!
//! ## Conventions
//!
//! Positions are in the same (arbitrary) length unit as the domain side length `L`, and the domain
//! is the square `[0, L] x [0, L]`. Angles are in degrees. Bearings use the compass convention:
//! 0° points along +y, 90° along +x, and values are wrapped to `[0, 360)`. The agent heading uses
//! the same convention.
//!
//! ## Update cycle
//!
//! Every simulation step runs, in order:
//!
//! 1. The sensor draws an observation of the true target from the current drone pose.
//! 2. The filter folds the observation into its posterior with [BeliefFilter::update].
//! 3. The policy reads the filter statistics and picks an action; the drone moves.
//! 4. A cost model scores the new situation.
//!
//! An update is a pure function of the current belief and one `(pose, observation)` pair. When the
//! observation is inconsistent with every hypothesis still carrying mass, renormalization is
//! impossible and the update returns [error::FilterError::DegeneratePosterior] instead of producing
//! a meaningless belief.
pub mod belief;
pub mod cost;
pub mod domain;
pub mod drone;
pub mod error;
pub mod filter;
pub mod geometry;
pub mod particle;
pub mod policy;
pub mod sensor;
pub mod sim;

use std::fmt::{self, Debug, Display};

use nalgebra::{Matrix2, Vector2};
use serde::{Deserialize, Serialize};

use crate::belief::GridBelief;
use crate::error::Result;

/// Generic Bayesian belief filter trait shared by the grid and particle filters.
///
/// The statistics methods are the stable read surface consumed by policies and cost models. The
/// default implementations compute them from the grid view returned by [BeliefFilter::belief].
pub trait BeliefFilter {
    /// Observation type consumed by [BeliefFilter::update]
    type Observation: Copy + Debug;

    /// Fold one observation taken from `pose` into the posterior.
    fn update(&mut self, pose: &Pose, observation: Self::Observation) -> Result<()>;
    /// Grid view of the posterior.
    fn belief(&self) -> GridBelief;
    /// Posterior mean of the target position.
    fn centroid(&self) -> Vector2<f64>;
    /// Side length of one belief grid cell.
    fn cell_size(&self) -> f64;
    /// Restore the uniform prior.
    fn reset(&mut self);

    /// Posterior covariance of the target position.
    fn covariance(&self) -> Matrix2<f64> {
        self.belief().covariance()
    }
    /// Shannon entropy (nats) of the grid view.
    fn entropy(&self) -> f64 {
        self.belief().entropy()
    }
    /// Largest single-cell mass of the grid view.
    fn max_prob_bucket(&self) -> f64 {
        self.belief().max_mass()
    }
    /// Largest covariance eigenvalue, i.e. the variance along the least certain direction.
    fn max_eigenvalue(&self) -> f64 {
        self.covariance().symmetric_eigenvalues().max()
    }
}

/// Planar pose of the sensing agent.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Pose {
    pub x: f64,
    pub y: f64,
    /// Compass heading in degrees, `[0, 360)`
    pub heading: f64,
}
impl Display for Pose {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Pose(x: {:.3}, y: {:.3}, heading: {:.2}°)",
            self.x, self.y, self.heading
        )
    }
}
impl Pose {
    pub fn new(x: f64, y: f64, heading: f64) -> Self {
        Pose { x, y, heading }
    }

    pub fn position(&self) -> Vector2<f64> {
        Vector2::new(self.x, self.y)
    }
}
impl From<(f64, f64, f64)> for Pose {
    fn from(tuple: (f64, f64, f64)) -> Self {
        let (x, y, heading) = tuple;
        Pose { x, y, heading }
    }
}
