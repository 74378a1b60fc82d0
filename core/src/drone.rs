//! The sensing agent and its additive motion model.

use std::fmt::{self, Display};

use serde::{Deserialize, Serialize};

use crate::Pose;
use crate::geometry::wrap360;

/// Additive change of pose: displacement plus heading change in degrees.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Action {
    pub dx: f64,
    pub dy: f64,
    pub dheading: f64,
}
impl Action {
    pub fn new(dx: f64, dy: f64, dheading: f64) -> Self {
        Action { dx, dy, dheading }
    }

    /// The stay action
    pub fn stay() -> Self {
        Action::default()
    }
}

/// Moving agent carrying the sensor.
#[derive(Clone, Debug, PartialEq)]
pub struct Drone {
    pose: Pose,
    max_step: f64,
}
impl Display for Drone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Drone({}, max_step: {})", self.pose, self.max_step)
    }
}
impl Drone {
    pub fn new(pose: Pose, max_step: f64) -> Self {
        assert!(max_step >= 0.0, "Maximum step must be non-negative");
        Drone {
            pose: Pose {
                heading: wrap360(pose.heading),
                ..pose
            },
            max_step,
        }
    }

    pub fn pose(&self) -> Pose {
        self.pose
    }

    pub fn max_step(&self) -> f64 {
        self.max_step
    }

    /// Pose reached by taking `action` from the current pose, without moving.
    pub fn new_pose(&self, action: &Action) -> Pose {
        Pose {
            x: self.pose.x + action.dx,
            y: self.pose.y + action.dy,
            heading: wrap360(self.pose.heading + action.dheading),
        }
    }

    /// Take `action`.
    pub fn act(&mut self, action: &Action) {
        self.pose = self.new_pose(action);
    }
}
