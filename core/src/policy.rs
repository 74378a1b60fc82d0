//! Discretized action set, the greedy action policy, and the particle motion proposal.
//!
//! The agent chooses among a fixed set of moves: `num_actions` evenly spaced compass
//! directions at full step length (optionally crossed with a set of heading changes) plus a
//! final stay action. The same set doubles as the motion proposal that jitters particles in the
//! particle filter's predict step.

use nalgebra::Vector2;
use rand::Rng;

use crate::BeliefFilter;
use crate::drone::{Action, Drone};
use crate::geometry::distance2;

/// Build the discretized action set.
///
/// Directions are `k * 360 / num_actions` degrees for `k = 0..num_actions`, each mapped to the
/// displacement `(max_step * sin(a), max_step * cos(a))`. When `headings` is given, every
/// direction is paired with every heading change; otherwise the heading change is zero. The stay
/// action `(0, 0, 0)` is always last.
pub fn make_action_list(max_step: f64, num_actions: usize, headings: Option<&[f64]>) -> Vec<Action> {
    let mut actions = Vec::new();
    for k in 0..num_actions {
        let angle = (k as f64 * 360.0 / num_actions as f64).to_radians();
        let dx = max_step * angle.sin();
        let dy = max_step * angle.cos();
        match headings {
            Some(headings) if !headings.is_empty() => {
                for &heading in headings {
                    actions.push(Action::new(dx, dy, heading));
                }
            }
            _ => actions.push(Action::new(dx, dy, 0.0)),
        }
    }
    actions.push(Action::stay());
    actions
}

/// Chooses the next drone action from the current belief.
pub trait Policy {
    fn action<F: BeliefFilter + ?Sized>(&self, drone: &Drone, filter: &F) -> Action;
}

/// Per-particle displacement generator for the particle filter's predict step.
pub trait MotionProposal {
    fn propose_displacements<R: Rng + ?Sized>(&self, count: usize, rng: &mut R) -> Vec<Vector2<f64>>;
}

/// Greedy policy: move to the reachable pose closest to the belief centroid.
#[derive(Clone, Debug)]
pub struct MeanPolicy {
    actions: Vec<Action>,
}
impl MeanPolicy {
    pub fn new(max_step: f64, num_actions: usize, headings: Option<&[f64]>) -> Self {
        MeanPolicy {
            actions: make_action_list(max_step, num_actions, headings),
        }
    }

    pub fn actions(&self) -> &[Action] {
        &self.actions
    }
}
impl Policy for MeanPolicy {
    fn action<F: BeliefFilter + ?Sized>(&self, drone: &Drone, filter: &F) -> Action {
        let centroid = filter.centroid();
        let mut best = Action::stay();
        let mut best_distance = f64::INFINITY;
        for action in &self.actions {
            let distance = distance2(&centroid, &drone.new_pose(action).position());
            if distance < best_distance {
                best_distance = distance;
                best = *action;
            }
        }
        best
    }
}

/// Motion proposal drawing each particle's displacement uniformly from the action set.
#[derive(Clone, Debug)]
pub struct RandomProposal {
    actions: Vec<Action>,
}
impl RandomProposal {
    pub fn new(max_step: f64, num_actions: usize) -> Self {
        RandomProposal {
            actions: make_action_list(max_step, num_actions, None),
        }
    }
}
impl MotionProposal for RandomProposal {
    fn propose_displacements<R: Rng + ?Sized>(&self, count: usize, rng: &mut R) -> Vec<Vector2<f64>> {
        (0..count)
            .map(|_| {
                let action = &self.actions[rng.random_range(0..self.actions.len())];
                Vector2::new(action.dx, action.dy)
            })
            .collect()
    }
}
