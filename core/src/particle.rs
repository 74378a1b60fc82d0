//! Sequential-importance-resampling particle filter over the target position.
//!
//! Each update runs three strictly ordered stages:
//!
//! 1. **Predict**: every particle is displaced by a draw from the motion proposal and clamped to
//!    the domain.
//! 2. **Reweight**: every weight is multiplied by the likelihood of the realized observation at
//!    that particle, then the weights are renormalized.
//! 3. **Resample**: when the effective sample size `N_eff = 1 / sum(w_i^2)` falls below half the
//!    particle count, the set is replaced by a stratified resample with uniform weights.
//!
//! The centroid comes straight from the weighted particles. Covariance, entropy and the maximum
//! cell mass are computed on the grid histogram of the particles (see [ParticleSet::to_grid]),
//! so they share their resolution with the discrete filter's statistics.

use std::fmt::{self, Debug};

use log::{debug, warn};
use nalgebra::{DVector, Vector2};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::StandardNormal;

use crate::belief::{GridBelief, ParticleSet};
use crate::error::Result;
use crate::policy::MotionProposal;
use crate::sensor::ObservationModel;
use crate::{BeliefFilter, Pose};

/// Fraction of the particle count below which the effective sample size triggers a resample
pub const RESAMPLE_THRESHOLD: f64 = 0.5;

/// Stratified resampling.
///
/// `[0, 1)` is split into `M` equal strata and one point is drawn per stratum as
/// `(k + e_k) / M` with `e_k` standard normal. The cumulative weights are then walked with two
/// cursors to map each point to a source particle. The last particle absorbs any point beyond the
/// final cumulative sum, so floating-point shortfall in the weights cannot run the walk off the end.
///
/// Returns the selected source index for each stratum.
pub fn stratified_resample<R: Rng + ?Sized>(weights: &DVector<f64>, rng: &mut R) -> Vec<usize> {
    let n = weights.len();
    let mut cumsum = Vec::with_capacity(n);
    let mut running = 0.0;
    for &w in weights.iter() {
        running += w;
        cumsum.push(running);
    }
    let positions: Vec<f64> = (0..n)
        .map(|k| {
            let jitter: f64 = rng.sample(StandardNormal);
            (jitter + k as f64) / n as f64
        })
        .collect();

    let mut indices = vec![0usize; n];
    let (mut i, mut j) = (0, 0);
    while i < n {
        if j == n - 1 || positions[i] < cumsum[j] {
            indices[i] = j;
            i += 1;
        } else {
            j += 1;
        }
    }
    indices
}

/// Particle filter over the target position.
pub struct ParticleFilter<S: ObservationModel, P: MotionProposal> {
    particles: ParticleSet,
    sensor: S,
    proposal: P,
    length: f64,
    buckets: usize,
    rng: StdRng,
}
impl<S: ObservationModel, P: MotionProposal> Debug for ParticleFilter<S, P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mean = self.particles.weighted_mean();
        let min_weight = self.particles.weights().min();
        let max_weight = self.particles.weights().max();
        f.debug_struct("ParticleFilter")
            .field("num_particles", &self.particles.len())
            .field("effective_particles", &self.particles.effective_sample_size())
            .field(
                "weight_range",
                &format_args!("[{:.4e}, {:.4e}]", min_weight, max_weight),
            )
            .field("mean_position", &format_args!("({:.3}, {:.3})", mean.x, mean.y))
            .field("buckets", &self.buckets)
            .finish()
    }
}
impl<S: ObservationModel, P: MotionProposal> ParticleFilter<S, P> {
    /// Create a particle filter with a uniform prior and a random seed.
    ///
    /// # Arguments
    ///
    /// * `length` - Side length of the square search domain
    /// * `buckets` - Cells per side of the grid view used for statistics
    /// * `num_particles` - Number of particles
    /// * `sensor` - Observation model used to reweight particles
    /// * `proposal` - Motion proposal used in the predict step
    pub fn new(length: f64, buckets: usize, num_particles: usize, sensor: S, proposal: P) -> Self {
        Self::new_with_seed(length, buckets, num_particles, sensor, proposal, rand::random())
    }

    /// Create a particle filter with a specific random seed.
    ///
    /// The seed drives the initial particle draw, the motion proposal and resampling, so two
    /// filters built with the same seed and fed the same observations evolve identically.
    pub fn new_with_seed(
        length: f64,
        buckets: usize,
        num_particles: usize,
        sensor: S,
        proposal: P,
        seed: u64,
    ) -> Self {
        assert!(buckets > 0, "Grid must have at least one bucket per side");
        let mut rng = StdRng::seed_from_u64(seed);
        let particles = ParticleSet::uniform(num_particles, length, &mut rng);
        ParticleFilter {
            particles,
            sensor,
            proposal,
            length,
            buckets,
            rng,
        }
    }

    /// Create a particle filter from an explicit particle set.
    pub fn with_particles(
        particles: ParticleSet,
        length: f64,
        buckets: usize,
        sensor: S,
        proposal: P,
        seed: u64,
    ) -> Self {
        assert!(buckets > 0, "Grid must have at least one bucket per side");
        assert!(
            length > 0.0 && length.is_finite(),
            "Domain length must be positive and finite"
        );
        ParticleFilter {
            particles,
            sensor,
            proposal,
            length,
            buckets,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn particles(&self) -> &ParticleSet {
        &self.particles
    }

    pub fn num_particles(&self) -> usize {
        self.particles.len()
    }

    pub fn sensor(&self) -> &S {
        &self.sensor
    }

    pub fn buckets(&self) -> usize {
        self.buckets
    }

    pub fn length(&self) -> f64 {
        self.length
    }

    /// N_eff = 1 / sum(w_i^2)
    pub fn effective_sample_size(&self) -> f64 {
        self.particles.effective_sample_size()
    }

    /// Predict step: displace every particle by a proposal draw, clamped to the domain.
    pub fn predict(&mut self) {
        let moves = self
            .proposal
            .propose_displacements(self.particles.len(), &mut self.rng);
        self.particles.displace(&moves, self.length);
    }

    /// Reweight step: multiply each weight by the observation likelihood and renormalize.
    pub fn update_weights(&mut self, pose: &Pose, observation: S::Observation) -> Result<()> {
        let likelihoods =
            self.sensor
                .prob_batch(self.particles.xs(), self.particles.ys(), pose, observation)?;
        self.particles.reweight(&likelihoods).inspect_err(|e| {
            warn!("Particle filter reweight with {:?} from {}: {}", observation, pose, e)
        })
    }

    /// Resample when the effective sample size drops below half the particle count.
    ///
    /// Returns true if resampling was performed
    pub fn resample_if_needed(&mut self) -> bool {
        let n_eff = self.particles.effective_sample_size();
        let threshold = RESAMPLE_THRESHOLD * self.particles.len() as f64;
        if n_eff < threshold {
            self.resample();
            debug!(
                "Resampled {} particles (N_eff {:.1} < {:.1})",
                self.particles.len(),
                n_eff,
                threshold
            );
            true
        } else {
            false
        }
    }

    /// Stratified resample, unconditionally.
    pub fn resample(&mut self) {
        let indices = stratified_resample(self.particles.weights(), &mut self.rng);
        self.particles.select(&indices);
    }
}
impl<S: ObservationModel, P: MotionProposal> BeliefFilter for ParticleFilter<S, P> {
    type Observation = S::Observation;

    fn update(&mut self, pose: &Pose, observation: S::Observation) -> Result<()> {
        self.predict();
        self.update_weights(pose, observation)?;
        let resampled = self.resample_if_needed();
        debug!(
            "Particle filter update with {:?} from {}: N_eff {:.1}, resampled: {}",
            observation,
            pose,
            self.particles.effective_sample_size(),
            resampled
        );
        Ok(())
    }

    fn belief(&self) -> GridBelief {
        self.particles.to_grid(self.buckets, self.length)
    }

    fn centroid(&self) -> Vector2<f64> {
        self.particles.weighted_mean()
    }

    fn cell_size(&self) -> f64 {
        self.length / self.buckets as f64
    }

    fn reset(&mut self) {
        self.particles = ParticleSet::uniform(self.particles.len(), self.length, &mut self.rng);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FilterError;
    use crate::policy::RandomProposal;
    use crate::sensor::{BearingOnlySensor, FovSensor};
    use assert_approx_eq::assert_approx_eq;

    /// Proposal that leaves every particle where it is
    struct StillProposal;
    impl MotionProposal for StillProposal {
        fn propose_displacements<R: Rng + ?Sized>(
            &self,
            count: usize,
            _rng: &mut R,
        ) -> Vec<Vector2<f64>> {
            vec![Vector2::zeros(); count]
        }
    }

    fn skewed_particles(n: usize) -> ParticleSet {
        // almost all weight on the first particle
        let mut weights = DVector::from_element(n, 0.01 / (n - 1) as f64);
        weights[0] = 0.99;
        ParticleSet::from_parts(
            DVector::from_fn(n, |k, _| k as f64),
            DVector::from_fn(n, |k, _| (n - k) as f64),
            weights,
        )
    }

    #[test]
    fn test_stratified_resample_indices_in_range() {
        let mut rng = StdRng::seed_from_u64(17);
        let weights = DVector::from_vec(vec![0.1, 0.2, 0.3, 0.4]);
        for _ in 0..200 {
            let indices = stratified_resample(&weights, &mut rng);
            assert_eq!(indices.len(), 4);
            assert!(indices.iter().all(|&k| k < 4));
            assert!(indices.windows(2).all(|w| w[0] <= w[1]));
        }
    }

    #[test]
    fn test_stratified_resample_point_mass() {
        let mut rng = StdRng::seed_from_u64(2);
        let weights = DVector::from_vec(vec![0.0, 0.0, 1.0, 0.0, 0.0]);
        // every stratum inside (0, 1) maps to index 2; stray jitter can only
        // reach the first or last particle
        let indices = stratified_resample(&weights, &mut rng);
        assert!(indices.iter().all(|&k| k == 2 || k == 0 || k == 4));
        assert!(indices.contains(&2));
    }

    #[test]
    fn test_last_particle_absorbs_overrun() {
        let mut rng = StdRng::seed_from_u64(9);
        // weights that sum to slightly less than one
        let weights = DVector::from_vec(vec![0.25, 0.25, 0.25, 0.25 - 1e-9]);
        for _ in 0..100 {
            let indices = stratified_resample(&weights, &mut rng);
            assert!(indices.iter().all(|&k| k <= 3));
        }
    }

    #[test]
    fn test_resample_triggered_below_half() {
        let particles = skewed_particles(100);
        assert!(particles.effective_sample_size() < 50.0);
        let mut filter = ParticleFilter::with_particles(
            particles,
            100.0,
            10,
            BearingOnlySensor::new(5.0),
            StillProposal,
            4,
        );
        assert!(filter.resample_if_needed());
        assert_eq!(filter.num_particles(), 100);
        for &w in filter.particles().weights().iter() {
            assert_eq!(w, 1.0 / 100.0);
        }
    }

    #[test]
    fn test_unnormalized_weights_do_not_force_a_resample() {
        let particles = ParticleSet::from_parts(
            DVector::from_vec(vec![10.0, 20.0, 30.0, 40.0]),
            DVector::from_vec(vec![10.0, 20.0, 30.0, 40.0]),
            DVector::from_vec(vec![2.0, 2.0, 2.0, 1.0]),
        );
        let mut filter = ParticleFilter::with_particles(
            particles,
            100.0,
            10,
            BearingOnlySensor::new(5.0),
            StillProposal,
            4,
        );
        assert_approx_eq!(filter.particles().weights().sum(), 1.0, 1e-12);
        assert!(filter.effective_sample_size() > 3.0);
        assert!(!filter.resample_if_needed());
    }

    #[test]
    fn test_resample_skipped_above_half() {
        let n = 100;
        let mut weights = DVector::from_element(n, 1.0 / n as f64);
        weights[0] += 0.001;
        weights[1] -= 0.001;
        let particles = ParticleSet::from_parts(
            DVector::from_fn(n, |k, _| k as f64),
            DVector::from_fn(n, |k, _| k as f64),
            weights,
        );
        let before = particles.clone();
        assert!(before.effective_sample_size() >= 50.0);
        let mut filter = ParticleFilter::with_particles(
            particles,
            100.0,
            10,
            BearingOnlySensor::new(5.0),
            StillProposal,
            4,
        );
        assert!(!filter.resample_if_needed());
        assert_eq!(filter.particles(), &before);
    }

    #[test]
    fn test_update_keeps_weights_normalized() {
        let mut filter = ParticleFilter::new_with_seed(
            100.0,
            25,
            1000,
            BearingOnlySensor::new(10.0),
            RandomProposal::new(2.0, 36),
            42,
        );
        let poses = [
            Pose::new(25.0, 25.0, 60.0),
            Pose::new(27.0, 25.0, 60.0),
            Pose::new(29.0, 26.0, 60.0),
        ];
        for (pose, obs) in poses.iter().zip([45.0, 47.0, 50.0]) {
            filter.update(pose, obs).unwrap();
            assert_approx_eq!(filter.particles().weights().sum(), 1.0, 1e-10);
            assert_eq!(filter.num_particles(), 1000);
            assert!(filter.particles().xs().iter().all(|&x| (0.0..=100.0).contains(&x)));
            assert!(filter.particles().ys().iter().all(|&y| (0.0..=100.0).contains(&y)));
        }
    }

    #[test]
    fn test_uniform_prior_statistics() {
        let filter = ParticleFilter::new_with_seed(
            100.0,
            10,
            20_000,
            BearingOnlySensor::new(10.0),
            StillProposal,
            1,
        );
        // a dense uniform draw fills every cell almost evenly
        assert!((filter.entropy() - (100.0f64).ln()).abs() < 0.01);
        let centroid = filter.centroid();
        assert!((centroid.x - 50.0).abs() < 1.5);
        assert!((centroid.y - 50.0).abs() < 1.5);
        assert_approx_eq!(filter.belief().total_mass(), 1.0, 1e-9);
        assert_approx_eq!(filter.cell_size(), 10.0, 1e-12);
    }

    #[test]
    fn test_centroid_uses_raw_particles_not_grid() {
        let particles = ParticleSet::from_parts(
            DVector::from_vec(vec![1.0, 2.0]),
            DVector::from_vec(vec![1.0, 2.0]),
            DVector::from_vec(vec![0.5, 0.5]),
        );
        let filter = ParticleFilter::with_particles(
            particles,
            100.0,
            10,
            BearingOnlySensor::new(5.0),
            StillProposal,
            0,
        );
        assert_approx_eq!(filter.centroid().x, 1.5, 1e-12);
        // both particles share cell (0, 0), whose center is (5, 5)
        let grid_centroid = filter.belief().centroid();
        assert_approx_eq!(grid_centroid.x, 5.0, 1e-12);
        assert_approx_eq!(filter.entropy(), 0.0, 1e-12);
    }

    #[test]
    fn test_degenerate_reweight_is_reported() {
        let sensor = FovSensor::new(0.0, 360.0, 1000.0);
        let particles = ParticleSet::from_parts(
            DVector::from_vec(vec![10.0, 20.0, 30.0]),
            DVector::from_vec(vec![60.0, 70.0, 80.0]),
            DVector::from_element(3, 1.0 / 3.0),
        );
        let mut filter =
            ParticleFilter::with_particles(particles, 100.0, 10, sensor, StillProposal, 0);
        let before = filter.particles().clone();
        let result = filter.update(&Pose::new(50.0, 50.0, 0.0), false);
        assert!(matches!(
            result,
            Err(FilterError::DegeneratePosterior { filter: "particle", .. })
        ));
        assert_eq!(filter.particles().weights(), before.weights());
    }

    #[test]
    fn test_same_seed_same_trajectory() {
        let build = || {
            ParticleFilter::new_with_seed(
                100.0,
                25,
                300,
                BearingOnlySensor::new(10.0),
                RandomProposal::new(2.0, 36),
                1234,
            )
        };
        let mut a = build();
        let mut b = build();
        let pose = Pose::new(10.0, 10.0, 0.0);
        for obs in [30.0, 35.0, 40.0, 33.0] {
            a.update(&pose, obs).unwrap();
            b.update(&pose, obs).unwrap();
        }
        assert_eq!(a.particles(), b.particles());
    }

    #[test]
    fn test_reset_restores_uniform_weights() {
        let mut filter = ParticleFilter::with_particles(
            skewed_particles(50),
            100.0,
            10,
            BearingOnlySensor::new(5.0),
            StillProposal,
            3,
        );
        filter.reset();
        assert_eq!(filter.num_particles(), 50);
        assert_approx_eq!(filter.effective_sample_size(), 50.0, 1e-9);
    }
}
