//! Belief state representations.
//!
//! The posterior over the target position is held in one of two forms:
//!
//! - [GridBelief]: probability mass over an `N x N` grid of square cells covering the
//!   `[0, L] x [0, L]` search domain. Row index `i` runs along the y-axis and column
//!   index `j` along the x-axis, so the center of cell `(i, j)` is
//!   `((j + 0.5) * cell_size, (i + 0.5) * cell_size)`.
//! - [ParticleSet]: `M` weighted point samples in the continuous domain.
//!
//! Both keep their mass (weights) non-negative and summing to one. The summary
//! statistics used downstream (centroid, covariance, entropy, maximum cell mass) are
//! defined on the grid form; a particle set is bucketed into a grid with
//! [ParticleSet::to_grid] whenever those statistics are needed.

use nalgebra::{DMatrix, DVector, Matrix2, Vector2};
use rand::Rng;

use crate::error::{FilterError, Result};

/// Added to the covariance diagonal so a belief concentrated in a single cell still
/// yields a non-singular matrix.
pub const COVARIANCE_EPSILON: f64 = 1e-200;

/// Smallest total mass that can still be renormalized.
pub const NORMALIZATION_FLOOR: f64 = f64::MIN_POSITIVE;

/// Probability mass over a square grid of cells.
#[derive(Clone, Debug, PartialEq)]
pub struct GridBelief {
    mass: DMatrix<f64>,
    cell_size: f64,
}

impl GridBelief {
    /// Uniform mass `1 / N^2` over an `N x N` grid spanning a domain of side `length`.
    pub fn uniform(buckets: usize, length: f64) -> Self {
        assert!(buckets > 0, "Grid must have at least one bucket per side");
        let total = (buckets * buckets) as f64;
        GridBelief::from_mass(DMatrix::from_element(buckets, buckets, 1.0 / total), length)
    }

    /// All-zero grid, used as an accumulator when bucketing particles.
    pub fn zeros(buckets: usize, length: f64) -> Self {
        assert!(buckets > 0, "Grid must have at least one bucket per side");
        GridBelief::from_mass(DMatrix::zeros(buckets, buckets), length)
    }

    /// Wrap an existing mass matrix. The matrix must be square and non-empty.
    pub fn from_mass(mass: DMatrix<f64>, length: f64) -> Self {
        assert!(
            mass.nrows() == mass.ncols() && mass.nrows() > 0,
            "Grid mass must be a non-empty square matrix, got {}x{}",
            mass.nrows(),
            mass.ncols()
        );
        assert!(
            length > 0.0 && length.is_finite(),
            "Domain length must be positive and finite"
        );
        let cell_size = length / mass.nrows() as f64;
        GridBelief { mass, cell_size }
    }

    pub fn buckets(&self) -> usize {
        self.mass.nrows()
    }

    pub fn cell_size(&self) -> f64 {
        self.cell_size
    }

    /// Raw mass matrix, rows along y and columns along x
    pub fn mass(&self) -> &DMatrix<f64> {
        &self.mass
    }

    pub(crate) fn mass_mut(&mut self) -> &mut DMatrix<f64> {
        &mut self.mass
    }

    /// Mass of cell `(i, j)` (row `i` along y, column `j` along x).
    pub fn get(&self, i: usize, j: usize) -> f64 {
        self.mass[(i, j)]
    }

    /// Cell-center coordinate for each index along one axis.
    pub fn cell_centers(&self) -> DVector<f64> {
        DVector::from_fn(self.buckets(), |k, _| (k as f64 + 0.5) * self.cell_size)
    }

    pub fn cell_center(&self, i: usize, j: usize) -> Vector2<f64> {
        Vector2::new(
            (j as f64 + 0.5) * self.cell_size,
            (i as f64 + 0.5) * self.cell_size,
        )
    }

    /// Cell `(i, j)` containing `point`; points on or past the far edge land in the
    /// last row/column.
    pub fn cell_index(&self, point: &Vector2<f64>) -> (usize, usize) {
        let last = self.buckets() - 1;
        // `as usize` saturates negative values to zero
        let j = ((point.x / self.cell_size).floor() as usize).min(last);
        let i = ((point.y / self.cell_size).floor() as usize).min(last);
        (i, j)
    }

    pub fn total_mass(&self) -> f64 {
        self.mass.sum()
    }

    /// Probability-weighted mean position.
    pub fn centroid(&self) -> Vector2<f64> {
        let centers = self.cell_centers();
        // row_sum collapses the rows (marginal over y, indexed by x); column_sum the columns
        let mass_x = self.mass.row_sum().transpose();
        let mass_y = self.mass.column_sum();
        Vector2::new(mass_x.dot(&centers), mass_y.dot(&centers))
    }

    /// Covariance of position under the grid mass, evaluated at cell centers.
    pub fn covariance(&self) -> Matrix2<f64> {
        let centers = self.cell_centers();
        let centers_sq = centers.component_mul(&centers);
        let mass_x = self.mass.row_sum().transpose();
        let mass_y = self.mass.column_sum();

        let mu_x = mass_x.dot(&centers);
        let mu_y = mass_y.dot(&centers);
        let c_xx = mass_x.dot(&centers_sq) - mu_x * mu_x;
        let c_yy = mass_y.dot(&centers_sq) - mu_y * mu_y;
        // sum_ij m_ij * y_i * x_j
        let e_xy = (centers.transpose() * &self.mass * &centers)[(0, 0)];
        let c_xy = e_xy - mu_x * mu_y;

        Matrix2::new(
            c_xx + COVARIANCE_EPSILON,
            c_xy,
            c_xy,
            c_yy + COVARIANCE_EPSILON,
        )
    }

    /// Shannon entropy (nats) of the flattened mass.
    ///
    /// The mass is normalized first and empty cells contribute nothing, so a uniform
    /// `N x N` grid has entropy `ln(N^2)`.
    pub fn entropy(&self) -> f64 {
        let total = self.total_mass();
        if total <= 0.0 {
            return 0.0;
        }
        self.mass
            .iter()
            .filter(|&&m| m > 0.0)
            .map(|&m| {
                let p = m / total;
                -p * p.ln()
            })
            .sum()
    }

    /// Largest single-cell mass.
    pub fn max_mass(&self) -> f64 {
        self.mass.max()
    }

    /// Total mass in cells whose center lies strictly closer than `radius` to `point`.
    pub fn mass_within(&self, point: &Vector2<f64>, radius: f64) -> f64 {
        let radius2 = radius * radius;
        let mut total = 0.0;
        for j in 0..self.buckets() {
            for i in 0..self.buckets() {
                let m = self.mass[(i, j)];
                if m > 0.0 && (self.cell_center(i, j) - point).norm_squared() < radius2 {
                    total += m;
                }
            }
        }
        total
    }
}

/// Weighted point samples of the target position.
#[derive(Clone, Debug, PartialEq)]
pub struct ParticleSet {
    xs: DVector<f64>,
    ys: DVector<f64>,
    weights: DVector<f64>,
}

impl ParticleSet {
    /// `count` particles drawn uniformly over `[0, length) x [0, length)` with equal weights.
    pub fn uniform<R: Rng + ?Sized>(count: usize, length: f64, rng: &mut R) -> Self {
        assert!(count > 0, "Number of particles must be positive");
        assert!(
            length > 0.0 && length.is_finite(),
            "Domain length must be positive and finite"
        );
        let xs = DVector::from_fn(count, |_, _| rng.random_range(0.0..length));
        let ys = DVector::from_fn(count, |_, _| rng.random_range(0.0..length));
        let weights = DVector::from_element(count, 1.0 / count as f64);
        ParticleSet { xs, ys, weights }
    }

    /// Build a particle set from parallel coordinate and weight vectors.
    ///
    /// The weights must be non-negative with a positive, finite sum; they are normalized on entry.
    pub fn from_parts(xs: DVector<f64>, ys: DVector<f64>, weights: DVector<f64>) -> Self {
        assert!(!xs.is_empty(), "Number of particles must be positive");
        assert!(
            xs.len() == ys.len() && xs.len() == weights.len(),
            "Particle coordinates and weights must have equal lengths ({}, {}, {})",
            xs.len(),
            ys.len(),
            weights.len()
        );
        assert!(
            weights.iter().all(|&w| w >= 0.0),
            "Particle weights must be non-negative"
        );
        let total = weights.sum();
        assert!(
            total > 0.0 && total.is_finite(),
            "Particle weights must have a positive, finite sum, got {}",
            total
        );
        ParticleSet {
            xs,
            ys,
            weights: weights / total,
        }
    }

    pub fn len(&self) -> usize {
        self.xs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.xs.is_empty()
    }

    pub fn xs(&self) -> &DVector<f64> {
        &self.xs
    }

    pub fn ys(&self) -> &DVector<f64> {
        &self.ys
    }

    pub fn weights(&self) -> &DVector<f64> {
        &self.weights
    }

    pub fn position(&self, k: usize) -> Vector2<f64> {
        Vector2::new(self.xs[k], self.ys[k])
    }

    /// N_eff = 1 / sum(w_i^2)
    pub fn effective_sample_size(&self) -> f64 {
        let sum_of_squares = self.weights.norm_squared();
        if sum_of_squares > 0.0 {
            1.0 / sum_of_squares
        } else {
            0.0
        }
    }

    /// Weighted mean of the particle positions.
    pub fn weighted_mean(&self) -> Vector2<f64> {
        let total = self.weights.sum();
        Vector2::new(
            self.weights.dot(&self.xs) / total,
            self.weights.dot(&self.ys) / total,
        )
    }

    /// Bucket the particles into an `N x N` grid, accumulating their weights.
    pub fn to_grid(&self, buckets: usize, length: f64) -> GridBelief {
        let mut grid = GridBelief::zeros(buckets, length);
        for k in 0..self.len() {
            let (i, j) = grid.cell_index(&self.position(k));
            grid.mass_mut()[(i, j)] += self.weights[k];
        }
        grid
    }

    /// Move every particle by its displacement and clamp to `[0, length]`.
    pub(crate) fn displace(&mut self, displacements: &[Vector2<f64>], length: f64) {
        assert_eq!(
            displacements.len(),
            self.len(),
            "One displacement is required per particle"
        );
        for (k, d) in displacements.iter().enumerate() {
            self.xs[k] = (self.xs[k] + d.x).clamp(0.0, length);
            self.ys[k] = (self.ys[k] + d.y).clamp(0.0, length);
        }
    }

    /// Multiply the weights by `likelihoods` and renormalize.
    ///
    /// On a collapsed weight sum the previous weights are kept and the error is
    /// returned to the caller.
    pub(crate) fn reweight(&mut self, likelihoods: &DVector<f64>) -> Result<()> {
        let updated = self.weights.component_mul(likelihoods);
        let total = updated.sum();
        if !(total >= NORMALIZATION_FLOOR && total.is_finite()) {
            return Err(FilterError::DegeneratePosterior {
                filter: "particle",
                total,
            });
        }
        self.weights = updated / total;
        Ok(())
    }

    /// Replace the set with copies of the particles at `indices` and reset the
    /// weights to uniform.
    pub(crate) fn select(&mut self, indices: &[usize]) {
        assert_eq!(
            indices.len(),
            self.len(),
            "Resampling must preserve the particle count"
        );
        let n = self.len();
        self.xs = DVector::from_fn(n, |k, _| self.xs[indices[k]]);
        self.ys = DVector::from_fn(n, |k, _| self.ys[indices[k]]);
        self.weights = DVector::from_element(n, 1.0 / n as f64);
    }
}
