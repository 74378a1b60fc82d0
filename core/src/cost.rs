//! Scalar cost/reward functions of the belief statistics.
//!
//! Cost models only see the filter through [BeliefFilter], so every model works unchanged with
//! either the grid or the particle representation. Several models penalize the "collision mass":
//! the belief mass in cells whose center lies closer than a threshold to the drone, i.e. the
//! probability that the drone is on top of the target.

use serde::{Deserialize, Serialize};

use crate::BeliefFilter;
use crate::domain::SearchDomain;
use crate::drone::Drone;

/// Scores one step of an episode.
pub trait CostModel {
    fn cost<F: BeliefFilter + ?Sized>(&self, domain: &SearchDomain, drone: &Drone, filter: &F) -> f64;
}

/// Belief mass within `threshold` of the drone position.
pub fn collision_mass<F: BeliefFilter + ?Sized>(drone: &Drone, filter: &F, threshold: f64) -> f64 {
    filter
        .belief()
        .mass_within(&drone.pose().position(), threshold)
}

/// Catalog of the available cost models.
///
/// Serialized with an internal `type` tag so it can be selected from a configuration file.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CostFunction {
    /// A fixed per-step cost; negative values discourage long episodes.
    Constant { cost: f64 },
    /// Negative distance between the drone and the true target.
    Distance,
    /// Negative belief entropy.
    Entropy,
    /// `-(entropy + lambda * collision_mass)`
    EntropyDistance { lambda: f64, threshold: f64 },
    /// `max_prob_bucket - lambda * collision_mass`
    HighestProbDistance { lambda: f64, threshold: f64 },
    /// `-(max_eigenvalue + lambda * collision_mass)`
    MaxEigenvalDistance { lambda: f64, threshold: f64 },
    /// `-1` when the collision mass exceeds `collision_threshold`, else `1` when the largest
    /// cell mass exceeds `entropy_threshold`, else `0`.
    DiscreteProbDistance {
        distance_threshold: f64,
        entropy_threshold: f64,
        collision_threshold: f64,
    },
    /// Largest cell mass rescaled above `entropy_threshold`, minus `lambda * collision_mass`.
    ThresholdProbDistance {
        distance_threshold: f64,
        entropy_threshold: f64,
        lambda: f64,
    },
}

impl Default for CostFunction {
    fn default() -> Self {
        CostFunction::MaxEigenvalDistance {
            lambda: 0.1,
            threshold: 15.0,
        }
    }
}

impl CostModel for CostFunction {
    fn cost<F: BeliefFilter + ?Sized>(&self, domain: &SearchDomain, drone: &Drone, filter: &F) -> f64 {
        match *self {
            CostFunction::Constant { cost } => cost,
            CostFunction::Distance => {
                -(drone.pose().position() - domain.target_position()).norm()
            }
            CostFunction::Entropy => -filter.entropy(),
            CostFunction::EntropyDistance { lambda, threshold } => {
                -(filter.entropy() + lambda * collision_mass(drone, filter, threshold))
            }
            CostFunction::HighestProbDistance { lambda, threshold } => {
                filter.max_prob_bucket() - lambda * collision_mass(drone, filter, threshold)
            }
            CostFunction::MaxEigenvalDistance { lambda, threshold } => {
                -(filter.max_eigenvalue() + lambda * collision_mass(drone, filter, threshold))
            }
            CostFunction::DiscreteProbDistance {
                distance_threshold,
                entropy_threshold,
                collision_threshold,
            } => {
                if collision_mass(drone, filter, distance_threshold) > collision_threshold {
                    -1.0
                } else if filter.max_prob_bucket() > entropy_threshold {
                    1.0
                } else {
                    0.0
                }
            }
            CostFunction::ThresholdProbDistance {
                distance_threshold,
                entropy_threshold,
                lambda,
            } => {
                let belief_reward = ((filter.max_prob_bucket() - entropy_threshold)
                    / (1.0 - entropy_threshold))
                    .max(0.0);
                belief_reward - lambda * collision_mass(drone, filter, distance_threshold)
            }
        }
    }
}
