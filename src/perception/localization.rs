//! Monte Carlo localization engine
//!
//! [`ParticleFilter`] owns the population and the certainty that ties the
//! measurement and resampling steps together. [`Localizer`] drives it: every
//! tick it moves the agent and the particles, scans, weights, estimates and,
//! while the rover is moving, resamples.

use super::filters;
use super::sensors::{self, LookupTable, Scan, SensorModel};
use crate::common::Pose;
use crate::config::{FilterConfig, MclConfig, SensorConfig};
use crate::control::{Agent, Body, MotionCommand, MotionModel};
use crate::error::{LocalizationError, Result};
use crate::map::{CellCode, OccupancyGrid, ValidPositions};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::StandardNormal;
use rayon::prelude::*;
use std::f64::consts::TAU;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// A pose hypothesis and its weight
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Particle {
    pub pose: Pose,
    pub weight: f64,
}

impl Particle {
    pub fn new(pose: Pose, weight: f64) -> Self {
        Particle { pose, weight }
    }
}

impl Body for Particle {
    fn pose(&self) -> &Pose {
        &self.pose
    }

    fn pose_mut(&mut self) -> &mut Pose {
        &mut self.pose
    }
}

/// What one tick produced
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TickReport {
    pub estimate: Pose,
    /// Certainty in `[0, 1]` after this tick
    pub certainty: f64,
    /// Weighted position variance in squared units, as of the last resample
    pub variance: f64,
    pub particle_count: usize,
    pub resampled: bool,
}

/// Particle population with its certainty
#[derive(Debug)]
pub struct ParticleFilter {
    config: FilterConfig,
    min_sensor_std: f64,
    max_sensor_std: f64,
    cells_per_unit: f64,
    sensor: Arc<dyn SensorModel>,
    particles: Vec<Particle>,
    certainty: f64,
    variance: f64,
}

impl ParticleFilter {
    /// Create an empty filter reading expected scans from `sensor`
    pub fn new(
        config: FilterConfig,
        sensor_config: &SensorConfig,
        cells_per_unit: usize,
        sensor: Arc<dyn SensorModel>,
    ) -> Self {
        ParticleFilter {
            config,
            min_sensor_std: sensor_config.min_std,
            max_sensor_std: sensor_config.max_std,
            cells_per_unit: cells_per_unit as f64,
            sensor,
            particles: Vec::new(),
            certainty: 0.0,
            variance: 0.0,
        }
    }

    /// Spread `particle_count` particles uniformly over the free cells
    pub fn initialize<R: Rng + ?Sized>(&mut self, valid: &ValidPositions, rng: &mut R) -> Result<()> {
        let count = self.config.particle_count;
        let weight = 1.0 / count as f64;
        let mut particles = Vec::with_capacity(count);
        for _ in 0..count {
            let (x, y) = valid.sample(rng)?;
            particles.push(Particle::new(Pose::at_cell(x, y, rng.gen_range(0.0..TAU)), weight));
        }
        self.particles = particles;
        self.certainty = 0.0;
        self.variance = 0.0;
        info!(count, sensor = self.sensor.name(), "particles initialized");
        Ok(())
    }

    /// Replace the population; weights are taken as given
    pub fn set_particles(&mut self, particles: Vec<Particle>) {
        self.particles = particles;
    }

    pub fn particles(&self) -> &[Particle] {
        &self.particles
    }

    pub fn certainty(&self) -> f64 {
        self.certainty
    }

    /// Weighted position variance in squared units, as of the last resample
    pub fn variance(&self) -> f64 {
        self.variance
    }

    pub fn sensor(&self) -> &Arc<dyn SensorModel> {
        &self.sensor
    }

    /// Measurement noise std, narrowing as certainty grows
    pub fn sensor_std(&self) -> f64 {
        let doubt = (1.0 - self.certainty).max(0.0);
        self.min_sensor_std + (self.max_sensor_std - self.min_sensor_std) * doubt
    }

    /// Move every particle with independent noise
    pub fn predict<R: Rng + ?Sized>(
        &mut self,
        model: &MotionModel,
        command: &MotionCommand,
        dt: f64,
        grid: &OccupancyGrid,
        rng: &mut R,
    ) {
        for particle in &mut self.particles {
            model.apply(particle, command, dt, grid, rng);
        }
    }

    /// Multiply each weight by the likelihood of `observed` from its pose
    ///
    /// Every weight also gets the floor added, so the population total stays
    /// positive however badly the scan fits.
    pub fn weigh(&mut self, observed: &Scan) -> Result<()> {
        if observed.beam_count() != self.sensor.beam_count() {
            return Err(LocalizationError::InvalidConfig(format!(
                "observed scan has {} beams, particle sensor expects {}",
                observed.beam_count(),
                self.sensor.beam_count()
            )));
        }

        let std = self.sensor_std();
        let floor = self.config.weight_floor;
        let sensor = &self.sensor;
        self.particles.par_iter_mut().for_each(|particle| {
            let expected = sensor.scan(&particle.pose);
            let log_likelihood =
                filters::scan_log_likelihood(observed, expected.ranges(), std);
            particle.weight = particle.weight * log_likelihood.exp() + floor;
        });
        Ok(())
    }

    /// Normalize the weights and return the weighted mean pose
    pub fn estimate(&mut self) -> Pose {
        let mut weights: Vec<f64> = self.particles.iter().map(|p| p.weight).collect();
        let total = filters::normalize_weights(&mut weights);
        if total <= self.config.weight_floor * self.particles.len() as f64 * (1.0 + 1e-9) {
            warn!(total, "every particle is at the weight floor");
        }
        for (particle, weight) in self.particles.iter_mut().zip(weights) {
            particle.weight = weight;
        }

        filters::weighted_mean(
            self.particles.iter().map(|p| (&p.pose, p.weight)),
            self.config.heading_mean,
        )
    }

    /// Update certainty from the spread about `estimate` and draw a new population
    ///
    /// The population shrinks as certainty grows but never below
    /// `min_particle_count`. Each survivor is jittered, more so when certainty
    /// is low; a jitter that lands off the free space is undone.
    pub fn resample<R: Rng + ?Sized>(&mut self, estimate: &Pose, grid: &OccupancyGrid, rng: &mut R) {
        if self.particles.is_empty() {
            return;
        }

        let mut weights: Vec<f64> = self.particles.iter().map(|p| p.weight).collect();
        filters::normalize_weights(&mut weights);

        let variance_cells = filters::weighted_position_variance(
            self.particles.iter().zip(&weights).map(|(p, &w)| (&p.pose, w)),
            estimate,
        );
        self.variance = variance_cells / (self.cells_per_unit * self.cells_per_unit);
        self.certainty = if self.variance > 0.0 {
            (self.config.certainty_gain / self.variance).min(1.0)
        } else {
            1.0
        };

        let doubt = (1.0 - self.certainty).max(0.0);
        let count = ((self.config.particle_count as f64 * doubt).round() as usize)
            .max(self.config.min_particle_count);
        let position_std = self.config.jitter_position_min
            + (self.config.jitter_position_max - self.config.jitter_position_min) * doubt;
        let heading_std = self.config.jitter_heading_std;
        let weight = 1.0 / count as f64;

        let indices = filters::stratified_resample(&weights, count, rng);
        let resampled: Vec<Particle> = indices
            .into_iter()
            .map(|i| {
                let source = self.particles[i].pose;
                let x = source.x + gaussian(position_std, rng);
                let y = source.y + gaussian(position_std, rng);
                let theta = source.theta + gaussian(heading_std, rng);
                let pose = if grid.is_free_at(x, y) {
                    Pose::new(x, y, theta)
                } else {
                    Pose::new(source.x, source.y, theta)
                };
                Particle::new(pose, weight)
            })
            .collect();

        debug!(
            count,
            certainty = self.certainty,
            variance = self.variance,
            "resampled"
        );
        self.particles = resampled;
    }
}

fn gaussian<R: Rng + ?Sized>(std: f64, rng: &mut R) -> f64 {
    if std == 0.0 {
        return 0.0;
    }
    let z: f64 = rng.sample(StandardNormal);
    z * std
}

/// Localizer for the rover
pub struct Localizer {
    grid: Arc<OccupancyGrid>,
    valid: Arc<ValidPositions>,
    motion: MotionModel,
    agent: Agent,
    filter: ParticleFilter,
    rng: StdRng,
    estimate: Pose,
}

impl Localizer {
    /// Create a localizer with a randomly placed agent and a uniform population
    ///
    /// `table` is required when either sensor uses the lookup strategy.
    pub fn new(
        config: &MclConfig,
        grid: Arc<OccupancyGrid>,
        valid: Arc<ValidPositions>,
        table: Option<Arc<LookupTable>>,
    ) -> Result<Self> {
        config.validate()?;
        if valid.dimensions() != grid.dimensions() {
            return Err(LocalizationError::InvalidMap(
                "valid positions were built for a different grid".to_string(),
            ));
        }

        let cells_per_unit = config.map.cells_per_unit;
        let table_path = &config.lookup_table.path;
        let particle_sensor = sensors::build_sensor(
            config.filter.particle_sensor,
            &config.sensor,
            cells_per_unit,
            &grid,
            table.as_ref(),
            table_path,
        )?;
        let agent_sensor = sensors::build_sensor(
            config.filter.agent_sensor,
            &config.sensor,
            cells_per_unit,
            &grid,
            table.as_ref(),
            table_path,
        )?;

        let mut rng = match config.filter.seed {
            0 => StdRng::from_entropy(),
            seed => StdRng::seed_from_u64(seed),
        };

        let (x, y) = valid.sample(&mut rng)?;
        let agent = Agent::new(Pose::at_cell(x, y, rng.gen_range(0.0..TAU)), agent_sensor);

        let mut filter = ParticleFilter::new(
            config.filter.clone(),
            &config.sensor,
            cells_per_unit,
            particle_sensor,
        );
        filter.initialize(&valid, &mut rng)?;

        Ok(Localizer {
            grid,
            valid,
            motion: MotionModel::from_config(&config.motion),
            agent,
            filter,
            rng,
            estimate: Pose::default(),
        })
    }

    /// Latest pose estimate
    pub fn get_pose(&self) -> Pose {
        self.estimate
    }

    pub fn agent(&self) -> &Agent {
        &self.agent
    }

    pub fn particles(&self) -> &[Particle] {
        self.filter.particles()
    }

    pub fn filter(&self) -> &ParticleFilter {
        &self.filter
    }

    pub fn filter_mut(&mut self) -> &mut ParticleFilter {
        &mut self.filter
    }

    pub fn grid(&self) -> &Arc<OccupancyGrid> {
        &self.grid
    }

    pub fn valid_positions(&self) -> &Arc<ValidPositions> {
        &self.valid
    }

    /// Move the agent; it must land on a free cell
    pub fn place_agent(&mut self, pose: Pose) -> Result<()> {
        let code = self.grid.classify(pose.x.floor() as i64, pose.y.floor() as i64)?;
        if code != CellCode::Free {
            return Err(LocalizationError::InvalidConfig(format!(
                "agent cannot start on a {:?} cell at ({}, {})",
                code, pose.x, pose.y
            )));
        }
        *self.agent.pose_mut() = pose;
        Ok(())
    }

    /// Run one tick, scanning from the agent's own sensor
    pub fn tick(&mut self, command: MotionCommand, dt: f64) -> Result<TickReport> {
        self.step(command, dt, None)
    }

    /// Run one tick against a scan from the real lidar
    pub fn tick_with_scan(
        &mut self,
        command: MotionCommand,
        dt: f64,
        scan: &Scan,
    ) -> Result<TickReport> {
        self.step(command, dt, Some(scan))
    }

    fn step(&mut self, command: MotionCommand, dt: f64, scan: Option<&Scan>) -> Result<TickReport> {
        self.agent.set_command(command);
        self.motion
            .apply(&mut self.agent, &command, dt, &self.grid, &mut self.rng);
        self.filter
            .predict(&self.motion, &command, dt, &self.grid, &mut self.rng);

        let simulated;
        let observed = match scan {
            Some(scan) => scan,
            None => {
                simulated = self.agent.observe();
                &simulated
            }
        };

        self.filter.weigh(observed)?;
        let estimate = self.filter.estimate();
        self.estimate = estimate;

        let resampled = command.is_moving();
        if resampled {
            self.filter.resample(&estimate, &self.grid, &mut self.rng);
        }

        let report = TickReport {
            estimate,
            certainty: self.filter.certainty(),
            variance: self.filter.variance(),
            particle_count: self.filter.particles().len(),
            resampled,
        };
        debug!(
            x = estimate.x,
            y = estimate.y,
            theta = estimate.theta,
            certainty = report.certainty,
            particles = report.particle_count,
            "tick"
        );
        Ok(report)
    }
}
