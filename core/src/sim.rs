//! Simulation configuration and the search episode driver.
//!
//! This module provides:
//! - [SimulationConfig]: every knob of a search run, readable from and writable to JSON, YAML or
//!   TOML files
//! - [run_episode]: the observe → update → act → score loop for one episode
//! - [run_simulation]: builds the configured sensor and filter and runs a batch of seeded episodes

use std::fmt::{self, Display};
use std::fs::File;
use std::io::{self, Read, Write};
use std::path::Path;

use log::{debug, info};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::cost::{CostFunction, CostModel};
use crate::domain::SearchDomain;
use crate::drone::Drone;
use crate::error::Result;
use crate::filter::DiscreteFilter;
use crate::geometry::distance2;
use crate::particle::ParticleFilter;
use crate::policy::{MeanPolicy, Policy, RandomProposal};
use crate::sensor::{BearingOnlySensor, FovSensor, ObservationModel};
use crate::{BeliefFilter, Pose};

/// Belief representation used by the run
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum FilterType {
    /// Grid-based discrete Bayes filter
    Discrete,
    /// Particle filter with stratified resampling
    #[default]
    Particle,
}

/// Observation model used by the run
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum SensorType {
    /// Bearing-only sensor with Gaussian noise
    #[default]
    Bearing,
    /// Binary field-of-view detector
    Fov,
}

/// Parameters of both observation models; only the selected one is used.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SensorParams {
    /// Bearing noise standard deviation in degrees
    pub bearing_sigma: f64,
    /// FOV false-detection probability behind the agent
    pub fov_alpha: f64,
    /// FOV forward cone width in degrees
    pub fov_cone_width: f64,
    /// FOV range past which detections are uninformative
    pub fov_blind_distance: f64,
}
impl Default for SensorParams {
    fn default() -> Self {
        SensorParams {
            bearing_sigma: 10.0,
            fov_alpha: 0.1,
            fov_cone_width: 120.0,
            fov_blind_distance: 25.0,
        }
    }
}

/// Complete configuration of a simulation run.
///
/// Missing fields take their defaults, so a configuration file only needs to list what it
/// changes.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Side length of the square search domain
    pub domain_length: f64,
    /// Grid cells per side (discrete filter grid and particle histogram)
    pub buckets: usize,
    /// Number of particles (particle filter only)
    pub num_particles: usize,
    pub filter: FilterType,
    pub sensor: SensorType,
    pub sensor_params: SensorParams,
    /// Drone pose at the start of every episode
    pub initial_pose: Pose,
    /// Drone step length per action
    pub max_step: f64,
    /// Number of movement directions in the action set
    pub num_actions: usize,
    pub cost: CostFunction,
    /// Step limit per episode
    pub max_steps: usize,
    /// An episode ends once the drone is within this distance of the target
    pub capture_distance: f64,
    /// Number of episodes to run
    pub episodes: usize,
    /// Seed for target placement, observations and the particle filter
    pub seed: u64,
}
impl Default for SimulationConfig {
    fn default() -> Self {
        SimulationConfig {
            domain_length: 100.0,
            buckets: 25,
            num_particles: 1000,
            filter: FilterType::default(),
            sensor: SensorType::default(),
            sensor_params: SensorParams::default(),
            initial_pose: Pose::new(25.0, 25.0, 60.0),
            max_step: 2.0,
            num_actions: 36,
            cost: CostFunction::default(),
            max_steps: 100,
            capture_distance: 5f64.sqrt(),
            episodes: 1,
            seed: 42,
        }
    }
}
impl SimulationConfig {
    /// Reject configurations that cannot produce a meaningful run.
    ///
    /// Every numeric check is written so that NaN fails it.
    pub fn validate(&self) -> io::Result<()> {
        let invalid = |msg: String| Err(io::Error::new(io::ErrorKind::InvalidInput, msg));
        let non_negative = |v: f64| v >= 0.0 && v.is_finite();
        if !(self.domain_length > 0.0 && self.domain_length.is_finite()) {
            return invalid(format!("domain_length must be positive, got {}", self.domain_length));
        }
        if self.buckets == 0 {
            return invalid("buckets must be at least 1".to_string());
        }
        if self.filter == FilterType::Particle && self.num_particles == 0 {
            return invalid("num_particles must be at least 1".to_string());
        }
        if self.num_actions == 0 {
            return invalid("num_actions must be at least 1".to_string());
        }
        if !non_negative(self.max_step) {
            return invalid(format!("max_step must be non-negative, got {}", self.max_step));
        }
        if !non_negative(self.capture_distance) {
            return invalid(format!(
                "capture_distance must be non-negative, got {}",
                self.capture_distance
            ));
        }
        let pose = &self.initial_pose;
        if !(pose.x.is_finite() && pose.y.is_finite() && pose.heading.is_finite()) {
            return invalid(format!("initial_pose must be finite, got {}", pose));
        }
        let params = &self.sensor_params;
        match self.sensor {
            SensorType::Bearing
                if !(params.bearing_sigma > 0.0 && params.bearing_sigma.is_finite()) =>
            {
                invalid(format!("bearing_sigma must be positive, got {}", params.bearing_sigma))
            }
            SensorType::Fov if !(params.fov_alpha >= 0.0 && params.fov_alpha <= 1.0) => {
                invalid(format!("fov_alpha must lie in [0, 1], got {}", params.fov_alpha))
            }
            SensorType::Fov if !(params.fov_cone_width > 0.0 && params.fov_cone_width <= 360.0) => {
                invalid(format!(
                    "fov_cone_width must lie in (0, 360], got {}",
                    params.fov_cone_width
                ))
            }
            SensorType::Fov if !non_negative(params.fov_blind_distance) => invalid(format!(
                "fov_blind_distance must be non-negative, got {}",
                params.fov_blind_distance
            )),
            _ => Ok(()),
        }
    }

    /// Save the configuration as pretty-printed JSON.
    pub fn to_json<P: AsRef<Path>>(&self, path: P) -> io::Result<()> {
        let file = File::create(path)?;
        serde_json::to_writer_pretty(file, self).map_err(io::Error::other)
    }

    /// Load a configuration saved with [SimulationConfig::to_json].
    pub fn from_json<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        serde_json::from_reader(File::open(path)?).map_err(io::Error::other)
    }

    pub fn to_yaml<P: AsRef<Path>>(&self, path: P) -> io::Result<()> {
        let text = serde_yaml::to_string(self).map_err(io::Error::other)?;
        File::create(path)?.write_all(text.as_bytes())
    }

    pub fn from_yaml<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        serde_yaml::from_reader(File::open(path)?).map_err(io::Error::other)
    }

    /// Save as TOML; nested sections (`sensor_params`, `initial_pose`, `cost`) become tables.
    pub fn to_toml<P: AsRef<Path>>(&self, path: P) -> io::Result<()> {
        let text = toml::to_string(self).map_err(io::Error::other)?;
        File::create(path)?.write_all(text.as_bytes())
    }

    pub fn from_toml<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        let mut text = String::new();
        File::open(path)?.read_to_string(&mut text)?;
        toml::from_str(&text).map_err(io::Error::other)
    }

    /// Save the run configuration in the format named by the file extension
    /// (`.json`, `.yaml`/`.yml` or `.toml`).
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> io::Result<()> {
        let path = path.as_ref();
        match ConfigFormat::of(path)? {
            ConfigFormat::Json => self.to_json(path),
            ConfigFormat::Yaml => self.to_yaml(path),
            ConfigFormat::Toml => self.to_toml(path),
        }
    }

    /// Load a run configuration, picking the parser from the file extension. The result is not
    /// validated; call [SimulationConfig::validate] before building anything from it.
    pub fn from_file<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        let path = path.as_ref();
        match ConfigFormat::of(path)? {
            ConfigFormat::Json => Self::from_json(path),
            ConfigFormat::Yaml => Self::from_yaml(path),
            ConfigFormat::Toml => Self::from_toml(path),
        }
    }
}

/// Configuration file formats, keyed by extension
enum ConfigFormat {
    Json,
    Yaml,
    Toml,
}
impl ConfigFormat {
    fn of(path: &Path) -> io::Result<Self> {
        let ext = path
            .extension()
            .and_then(|s| s.to_str())
            .map(|s| s.to_lowercase());
        match ext.as_deref() {
            Some("json") => Ok(ConfigFormat::Json),
            Some("yaml") | Some("yml") => Ok(ConfigFormat::Yaml),
            Some("toml") => Ok(ConfigFormat::Toml),
            _ => Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("unsupported configuration file extension: {}", path.display()),
            )),
        }
    }
}

/// Stopping rule of an episode
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct EpisodeLimits {
    pub max_steps: usize,
    pub capture_distance: f64,
}

/// Outcome of one search episode.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EpisodeSummary {
    pub steps: usize,
    pub total_cost: f64,
    /// Distance between the drone and the target at the end of the episode
    pub final_distance: f64,
    pub final_entropy: f64,
    /// Distance between the belief centroid and the target at the end of the episode
    pub centroid_error: f64,
    /// Whether the drone came within the capture distance
    pub captured: bool,
}
impl Display for EpisodeSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "steps: {}, total cost: {:.4}, final distance: {:.3}, final entropy: {:.4}, centroid error: {:.3}, captured: {}",
            self.steps,
            self.total_cost,
            self.final_distance,
            self.final_entropy,
            self.centroid_error,
            self.captured
        )
    }
}

/// Run one search episode.
///
/// Each step: the sensor observes the target from the current pose, the filter folds the
/// observation in, the policy picks an action from the updated belief, the drone moves, and the
/// cost model scores the result. The loop stops once the drone is within
/// `limits.capture_distance` of the target or after `limits.max_steps` steps. A degenerate filter
/// update aborts the episode with its error.
#[allow(clippy::too_many_arguments)]
pub fn run_episode<S, F, P, C, R>(
    domain: &SearchDomain,
    drone: &mut Drone,
    sensor: &S,
    filter: &mut F,
    policy: &P,
    cost_model: &C,
    limits: EpisodeLimits,
    rng: &mut R,
) -> Result<EpisodeSummary>
where
    S: ObservationModel,
    F: BeliefFilter<Observation = S::Observation> + ?Sized,
    P: Policy,
    C: CostModel,
    R: Rng + ?Sized,
{
    let target = domain.target_position();
    let capture2 = limits.capture_distance * limits.capture_distance;
    let mut steps = 0;
    let mut total_cost = 0.0;

    while distance2(&drone.pose().position(), &target) > capture2 && steps < limits.max_steps {
        steps += 1;
        let pose = drone.pose();
        let observation = sensor.observe(&target, &pose, rng);
        filter.update(&pose, observation)?;

        let action = policy.action(drone, &*filter);
        drone.act(&action);

        let cost = cost_model.cost(domain, drone, &*filter);
        total_cost += cost;
        let centroid = filter.centroid();
        debug!(
            "step {}: observation {:?} from {}, centroid ({:.2}, {:.2}), entropy {:.4}, cost {:.4}",
            steps,
            observation,
            pose,
            centroid.x,
            centroid.y,
            filter.entropy(),
            cost
        );
    }

    let final_distance = (drone.pose().position() - target).norm();
    Ok(EpisodeSummary {
        steps,
        total_cost,
        final_distance,
        final_entropy: filter.entropy(),
        centroid_error: (filter.centroid() - target).norm(),
        captured: final_distance * final_distance <= capture2,
    })
}

/// Run `config.episodes` seeded episodes with the configured sensor and filter.
pub fn run_simulation(config: &SimulationConfig) -> Result<Vec<EpisodeSummary>> {
    let params = &config.sensor_params;
    match config.sensor {
        SensorType::Bearing => {
            run_with_sensor(config, BearingOnlySensor::new(params.bearing_sigma))
        }
        SensorType::Fov => run_with_sensor(
            config,
            FovSensor::new(
                params.fov_alpha,
                params.fov_cone_width,
                params.fov_blind_distance,
            ),
        ),
    }
}

/// Build the configured filter around `sensor`.
pub fn build_filter<S>(
    config: &SimulationConfig,
    sensor: S,
    seed: u64,
) -> Box<dyn BeliefFilter<Observation = S::Observation>>
where
    S: ObservationModel + 'static,
{
    match config.filter {
        FilterType::Discrete => Box::new(DiscreteFilter::new(
            config.domain_length,
            config.buckets,
            sensor,
        )),
        FilterType::Particle => Box::new(ParticleFilter::new_with_seed(
            config.domain_length,
            config.buckets,
            config.num_particles,
            sensor,
            RandomProposal::new(config.max_step, config.num_actions),
            seed,
        )),
    }
}

fn run_with_sensor<S>(config: &SimulationConfig, sensor: S) -> Result<Vec<EpisodeSummary>>
where
    S: ObservationModel + Clone + Display + 'static,
{
    let mut rng = StdRng::seed_from_u64(config.seed);
    let mut filter = build_filter(config, sensor.clone(), rng.random());
    let policy = MeanPolicy::new(config.max_step, config.num_actions, None);
    let limits = EpisodeLimits {
        max_steps: config.max_steps,
        capture_distance: config.capture_distance,
    };
    info!(
        "Running {} episode(s) with {:?} filter and {}",
        config.episodes, config.filter, sensor
    );

    let mut summaries = Vec::with_capacity(config.episodes);
    for episode in 0..config.episodes {
        if episode > 0 {
            filter.reset();
        }
        let domain = SearchDomain::new(config.domain_length, &mut rng);
        let mut drone = Drone::new(config.initial_pose, config.max_step);
        let target = domain.target_position();
        info!(
            "Episode {}: target at ({:.3}, {:.3}), start {}",
            episode,
            target.x,
            target.y,
            drone.pose()
        );
        let summary = run_episode(
            &domain,
            &mut drone,
            &sensor,
            filter.as_mut(),
            &policy,
            &config.cost,
            limits,
            &mut rng,
        )?;
        info!("Episode {} finished: {}", episode, summary);
        summaries.push(summary);
    }
    Ok(summaries)
}
