//! End-to-end localization tests for both belief filters.
//!
//! A target sits at a fixed position and observations are drawn from the true sensor model
//! while the observer cycles through a ring of poses around the domain. The stochastic checks
//! run several seeded trials and compare averages against loose tolerances; the tolerances are
//! regression bounds observed on these seeds, not design targets.

use assert_approx_eq::assert_approx_eq;
use nalgebra::{DVector, Vector2};
use rand::SeedableRng;
use rand::rngs::StdRng;

use febol::belief::ParticleSet;
use febol::error::FilterError;
use febol::filter::DiscreteFilter;
use febol::geometry::true_bearing;
use febol::particle::ParticleFilter;
use febol::policy::RandomProposal;
use febol::sensor::{BearingOnlySensor, FovSensor, ObservationModel};
use febol::sim::{FilterType, SensorType, SimulationConfig, run_simulation};
use febol::{BeliefFilter, Pose};

const LENGTH: f64 = 100.0;
const TRIALS: u64 = 5;

fn observer_ring() -> Vec<Pose> {
    vec![
        Pose::new(10.0, 10.0, 45.0),
        Pose::new(90.0, 10.0, 315.0),
        Pose::new(90.0, 90.0, 225.0),
        Pose::new(10.0, 90.0, 135.0),
        Pose::new(50.0, 5.0, 0.0),
        Pose::new(95.0, 50.0, 270.0),
        Pose::new(50.0, 95.0, 180.0),
        Pose::new(5.0, 50.0, 90.0),
    ]
}

/// Feed `steps` observations of `target` into `filter` and return (initial, final) entropy and
/// the final centroid error.
fn run_trial<F, S>(
    filter: &mut F,
    sensor: &S,
    target: Vector2<f64>,
    steps: usize,
    seed: u64,
) -> (f64, f64, f64)
where
    F: BeliefFilter<Observation = S::Observation>,
    S: ObservationModel,
{
    let mut rng = StdRng::seed_from_u64(seed);
    let poses = observer_ring();
    let initial_entropy = filter.entropy();
    for step in 0..steps {
        let pose = poses[step % poses.len()];
        let observation = sensor.observe(&target, &pose, &mut rng);
        filter.update(&pose, observation).unwrap();
    }
    (initial_entropy, filter.entropy(), (filter.centroid() - target).norm())
}

#[test]
fn discrete_filter_concentrates_on_target() {
    let target = Vector2::new(62.0, 37.0);
    let sensor = BearingOnlySensor::new(10.0);
    let mut entropy_drop = 0.0;
    let mut centroid_error = 0.0;
    for seed in 0..TRIALS {
        let mut filter = DiscreteFilter::new(LENGTH, 25, sensor.clone());
        let (initial, last, error) = run_trial(&mut filter, &sensor, target, 48, seed);
        assert_approx_eq!(initial, (625.0f64).ln(), 1e-10);
        assert_approx_eq!(filter.grid().total_mass(), 1.0, 1e-9);
        entropy_drop += (initial - last) / TRIALS as f64;
        centroid_error += error / TRIALS as f64;
    }
    assert!(entropy_drop > 2.0, "mean entropy drop {}", entropy_drop);
    assert!(centroid_error < 8.0, "mean centroid error {}", centroid_error);
}

#[test]
fn particle_filter_concentrates_on_target() {
    let target = Vector2::new(62.0, 37.0);
    let sensor = BearingOnlySensor::new(10.0);
    let mut entropy_drop = 0.0;
    let mut centroid_error = 0.0;
    for seed in 0..TRIALS {
        let mut filter = ParticleFilter::new_with_seed(
            LENGTH,
            25,
            2000,
            sensor.clone(),
            RandomProposal::new(1.0, 36),
            seed + 100,
        );
        let (initial, last, error) = run_trial(&mut filter, &sensor, target, 48, seed);
        assert_approx_eq!(filter.particles().weights().sum(), 1.0, 1e-9);
        assert_eq!(filter.num_particles(), 2000);
        entropy_drop += (initial - last) / TRIALS as f64;
        centroid_error += error / TRIALS as f64;
    }
    assert!(entropy_drop > 1.0, "mean entropy drop {}", entropy_drop);
    assert!(centroid_error < 12.0, "mean centroid error {}", centroid_error);
}

#[test]
fn filters_agree_on_the_estimate() {
    let target = Vector2::new(30.0, 70.0);
    let sensor = BearingOnlySensor::new(8.0);
    let mut discrete = DiscreteFilter::new(LENGTH, 25, sensor.clone());
    let mut particle = ParticleFilter::new_with_seed(
        LENGTH,
        25,
        2000,
        sensor.clone(),
        RandomProposal::new(1.0, 36),
        7,
    );
    run_trial(&mut discrete, &sensor, target, 40, 3);
    run_trial(&mut particle, &sensor, target, 40, 3);
    let gap = (discrete.centroid() - particle.centroid()).norm();
    assert!(gap < 15.0, "centroid gap {}", gap);
}

#[test]
fn single_exact_bearing_raises_the_observed_cell() {
    let sensor = BearingOnlySensor::new(5.0);
    let mut filter = DiscreteFilter::new(LENGTH, 10, sensor);
    let pose = Pose::new(5.0, 5.0, 0.0);
    let (i, j) = (7, 3);
    let center = filter.grid().cell_center(i, j);
    let before = filter.grid().get(i, j);
    filter
        .update(&pose, true_bearing(&pose.position(), &center))
        .unwrap();
    assert!(filter.grid().get(i, j) > before);
    assert_approx_eq!(filter.grid().total_mass(), 1.0, 1e-12);
    assert!(filter.entropy() < (100.0f64).ln());
}

#[test]
fn fov_misses_clear_the_forward_cone() {
    let sensor = FovSensor::new(0.1, 60.0, 200.0);
    let mut filter = DiscreteFilter::new(LENGTH, 10, sensor);
    // looking north-east from the south-west corner, never seeing anything
    let pose = Pose::new(0.0, 0.0, 45.0);
    for _ in 0..10 {
        filter.update(&pose, false).unwrap();
    }
    let grid = filter.grid();
    assert_approx_eq!(grid.total_mass(), 1.0, 1e-12);
    // the diagonal lies inside the 60 degree cone, the cells hugging the axes are abeam
    assert!(grid.get(5, 5) < grid.get(0, 9));
    assert!(grid.get(5, 5) < grid.get(9, 0));
}

#[test]
fn impossible_observation_is_reported_and_leaves_the_belief_alone() {
    // a perfect detector that always sees everything
    let sensor = FovSensor::new(0.0, 360.0, 1000.0);
    let mut filter = ParticleFilter::new_with_seed(
        LENGTH,
        10,
        500,
        sensor,
        RandomProposal::new(1.0, 8),
        11,
    );
    let weights = filter.particles().weights().clone();
    let err = filter.update(&Pose::new(50.0, 50.0, 0.0), false).unwrap_err();
    assert!(matches!(
        err,
        FilterError::DegeneratePosterior {
            filter: "particle",
            ..
        }
    ));
    assert_eq!(filter.particles().weights(), &weights);
}

#[test]
fn resampling_triggers_only_on_weight_collapse() {
    let m = 200;
    let xs = DVector::from_fn(m, |k, _| (k % 100) as f64 + 0.5);
    let ys = DVector::from_fn(m, |k, _| (k / 2) as f64 * 0.5);
    let sensor = BearingOnlySensor::new(10.0);

    let mut skewed = DVector::from_element(m, 0.1 / (m - 1) as f64);
    skewed[17] = 0.9;
    let mut filter = ParticleFilter::with_particles(
        ParticleSet::from_parts(xs.clone(), ys.clone(), skewed),
        LENGTH,
        10,
        sensor.clone(),
        RandomProposal::new(1.0, 8),
        1,
    );
    assert!(filter.effective_sample_size() < m as f64 / 2.0);
    assert!(filter.resample_if_needed());
    assert_eq!(filter.num_particles(), m);
    for &w in filter.particles().weights().iter() {
        assert_eq!(w, 1.0 / m as f64);
    }

    let mut balanced = DVector::from_element(m, 1.0 / m as f64);
    balanced[0] *= 1.5;
    balanced[1] *= 0.5;
    let particles = ParticleSet::from_parts(xs, ys, balanced);
    let mut filter = ParticleFilter::with_particles(
        particles.clone(),
        LENGTH,
        10,
        sensor,
        RandomProposal::new(1.0, 8),
        1,
    );
    assert!(!filter.resample_if_needed());
    assert_eq!(filter.particles(), &particles);
}

#[test]
fn simulation_runs_every_filter_sensor_pair() {
    for filter in [FilterType::Discrete, FilterType::Particle] {
        for sensor in [SensorType::Bearing, SensorType::Fov] {
            let config = SimulationConfig {
                filter,
                sensor,
                buckets: 20,
                num_particles: 500,
                max_steps: 30,
                episodes: 2,
                seed: 5,
                ..Default::default()
            };
            let summaries = run_simulation(&config).unwrap();
            assert_eq!(summaries.len(), 2);
            for summary in &summaries {
                assert!(summary.steps <= 30);
                assert!(summary.final_entropy.is_finite());
                assert!(summary.captured || summary.steps == 30);
            }
        }
    }
}

#[test]
fn bearing_episodes_close_in_on_the_target() {
    let config = SimulationConfig {
        filter: FilterType::Discrete,
        sensor: SensorType::Bearing,
        max_steps: 150,
        episodes: 4,
        seed: 2024,
        ..Default::default()
    };
    let summaries = run_simulation(&config).unwrap();
    let mean_distance =
        summaries.iter().map(|s| s.final_distance).sum::<f64>() / summaries.len() as f64;
    assert!(mean_distance < 20.0, "mean final distance {}", mean_distance);
}
