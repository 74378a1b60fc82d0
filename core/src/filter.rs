//! Grid-based discrete Bayes filter.
//!
//! The posterior over the target position is stored as probability mass over an `N x N` grid of
//! square cells. Each update evaluates the observation likelihood at the center of every cell that
//! still carries mass, multiplies, and renormalizes:
//!
//! $$
//! b'(c) = \frac{p(z \mid c, x) \, b(c)}{\sum_{c'} p(z \mid c', x) \, b(c')}
//! $$
//!
//! Cells that reach zero mass stay at zero; they are skipped on every later update.

use std::fmt::{self, Debug};

use log::{debug, warn};
use nalgebra::{DMatrix, DVector, Matrix2, Vector2};

use crate::belief::{GridBelief, NORMALIZATION_FLOOR};
use crate::error::{FilterError, Result};
use crate::sensor::ObservationModel;
use crate::{BeliefFilter, Pose};

/// Discrete Bayes filter over a square grid.
#[derive(Clone)]
pub struct DiscreteFilter<S: ObservationModel> {
    grid: GridBelief,
    sensor: S,
    length: f64,
}
impl<S: ObservationModel> Debug for DiscreteFilter<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let centroid = self.grid.centroid();
        f.debug_struct("DiscreteFilter")
            .field("buckets", &self.grid.buckets())
            .field("cell_size", &self.grid.cell_size())
            .field("entropy", &self.grid.entropy())
            .field("max_mass", &self.grid.max_mass())
            .field(
                "centroid",
                &format_args!("({:.3}, {:.3})", centroid.x, centroid.y),
            )
            .finish()
    }
}
impl<S: ObservationModel> DiscreteFilter<S> {
    /// Create a filter with a uniform prior.
    ///
    /// # Arguments
    ///
    /// * `length` - Side length of the square search domain
    /// * `buckets` - Number of cells per side
    /// * `sensor` - Observation model used to score observations
    pub fn new(length: f64, buckets: usize, sensor: S) -> Self {
        DiscreteFilter {
            grid: GridBelief::uniform(buckets, length),
            sensor,
            length,
        }
    }

    /// Create a filter from an explicit prior grid; the grid is normalized on entry.
    pub fn with_prior(prior: GridBelief, sensor: S) -> Self {
        let total = prior.total_mass();
        assert!(
            total > 0.0 && total.is_finite(),
            "Prior grid must carry positive, finite mass"
        );
        assert!(
            prior.mass().iter().all(|&m| m >= 0.0),
            "Prior grid mass must be non-negative"
        );
        let length = prior.cell_size() * prior.buckets() as f64;
        let grid = GridBelief::from_mass(prior.mass() / total, length);
        DiscreteFilter {
            grid,
            sensor,
            length,
        }
    }

    pub fn grid(&self) -> &GridBelief {
        &self.grid
    }

    pub fn sensor(&self) -> &S {
        &self.sensor
    }

    pub fn buckets(&self) -> usize {
        self.grid.buckets()
    }

    pub fn length(&self) -> f64 {
        self.length
    }
}
impl<S: ObservationModel> BeliefFilter for DiscreteFilter<S> {
    type Observation = S::Observation;

    fn update(&mut self, pose: &Pose, observation: S::Observation) -> Result<()> {
        let mass = self.grid.mass();
        let live: Vec<(usize, usize)> = mass
            .iter()
            .enumerate()
            .filter(|&(_, &m)| m > 0.0)
            .map(|(k, _)| (k % mass.nrows(), k / mass.nrows()))
            .collect();
        let xs = DVector::from_iterator(
            live.len(),
            live.iter().map(|&(i, j)| self.grid.cell_center(i, j).x),
        );
        let ys = DVector::from_iterator(
            live.len(),
            live.iter().map(|&(i, j)| self.grid.cell_center(i, j).y),
        );
        let likelihoods = self.sensor.prob_batch(&xs, &ys, pose, observation)?;

        let mut posterior = DMatrix::zeros(mass.nrows(), mass.ncols());
        for (&(i, j), likelihood) in live.iter().zip(likelihoods.iter()) {
            posterior[(i, j)] = mass[(i, j)] * likelihood;
        }
        let total = posterior.sum();
        if !(total >= NORMALIZATION_FLOOR && total.is_finite()) {
            warn!(
                "Discrete filter update with {:?} from {} collapsed the posterior (total mass {:e})",
                observation, pose, total
            );
            return Err(FilterError::DegeneratePosterior {
                filter: "discrete",
                total,
            });
        }
        *self.grid.mass_mut() = posterior / total;
        debug!(
            "Discrete filter update with {:?} from {}: {} live cells, entropy {:.4}",
            observation,
            pose,
            live.len(),
            self.grid.entropy()
        );
        Ok(())
    }

    fn belief(&self) -> GridBelief {
        self.grid.clone()
    }

    fn centroid(&self) -> Vector2<f64> {
        self.grid.centroid()
    }

    fn cell_size(&self) -> f64 {
        self.grid.cell_size()
    }

    fn reset(&mut self) {
        self.grid = GridBelief::uniform(self.grid.buckets(), self.length);
    }

    fn covariance(&self) -> Matrix2<f64> {
        self.grid.covariance()
    }

    fn entropy(&self) -> f64 {
        self.grid.entropy()
    }

    fn max_prob_bucket(&self) -> f64 {
        self.grid.max_mass()
    }
}
