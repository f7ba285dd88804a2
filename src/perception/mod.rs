//! Perception module: sensor models, filters and the localization engine
pub mod filters;
pub mod localization;
pub mod sensors;

use self::localization::{Localizer, Particle, TickReport};
use self::sensors::{LookupTable, Scan, SensorKind};
use crate::common::Pose;
use crate::config::MclConfig;
use crate::control::MotionCommand;
use crate::error::{LocalizationError, Result};
use crate::lifecycle::{LifecycleNode, LifecycleNodeBase, State};
use crate::map::{self, OccupancyGrid, ValidPositions};
use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;

/// Perception stack for the rover
///
/// Configuring loads the map, indexes its free cells and loads the lookup
/// table if either sensor needs it. Activating places the agent and seeds the
/// particles. Ticks are only accepted while active.
pub struct PerceptionStack {
    base: LifecycleNodeBase,
    config: MclConfig,
    preset_grid: Option<Arc<OccupancyGrid>>,
    grid: Option<Arc<OccupancyGrid>>,
    valid: Option<Arc<ValidPositions>>,
    table: Option<Arc<LookupTable>>,
    localizer: Option<Localizer>,
}

impl PerceptionStack {
    /// Create a new perception stack that loads its map from `config`
    pub fn new(config: MclConfig) -> Self {
        PerceptionStack {
            base: LifecycleNodeBase::new("perception_stack"),
            config,
            preset_grid: None,
            grid: None,
            valid: None,
            table: None,
            localizer: None,
        }
    }

    /// Create a perception stack over an already built grid
    pub fn with_grid(config: MclConfig, grid: Arc<OccupancyGrid>) -> Self {
        PerceptionStack {
            preset_grid: Some(grid),
            ..PerceptionStack::new(config)
        }
    }

    pub fn state(&self) -> State {
        self.base.get_state()
    }

    pub fn config(&self) -> &MclConfig {
        &self.config
    }

    /// Override numeric parameters; they take effect at the next configure
    pub fn set_parameters(&mut self, params: &HashMap<String, f64>) -> Result<()> {
        self.config.configure(params)
    }

    pub fn grid(&self) -> Option<&Arc<OccupancyGrid>> {
        self.grid.as_ref()
    }

    pub fn localizer(&self) -> Option<&Localizer> {
        self.localizer.as_ref()
    }

    pub fn localizer_mut(&mut self) -> Option<&mut Localizer> {
        self.localizer.as_mut()
    }

    /// Get the current pose estimate
    pub fn get_pose(&self) -> Option<Pose> {
        self.localizer.as_ref().map(Localizer::get_pose)
    }

    /// Current particle population
    pub fn particles(&self) -> &[Particle] {
        self.localizer
            .as_ref()
            .map(Localizer::particles)
            .unwrap_or(&[])
    }

    /// Run one simulated tick
    pub fn tick(&mut self, command: MotionCommand, dt: f64) -> Result<TickReport> {
        self.active_localizer()?.tick(command, dt)
    }

    /// Run one tick against a scan from the real lidar
    pub fn tick_with_scan(
        &mut self,
        command: MotionCommand,
        dt: f64,
        scan: &Scan,
    ) -> Result<TickReport> {
        self.active_localizer()?.tick_with_scan(command, dt, scan)
    }

    fn active_localizer(&mut self) -> Result<&mut Localizer> {
        if !self.base.is_active() {
            return Err(LocalizationError::NotActive(self.base.name.clone()));
        }
        self.localizer
            .as_mut()
            .ok_or_else(|| LocalizationError::NotActive(self.base.name.clone()))
    }

    fn needs_table(&self) -> bool {
        self.config.filter.particle_sensor == SensorKind::Lookup
            || self.config.filter.agent_sensor == SensorKind::Lookup
    }
}

impl LifecycleNode for PerceptionStack {
    fn on_configure(&mut self) -> Result<()> {
        info!("Configuring perception stack");
        self.config.validate()?;

        let grid = match &self.preset_grid {
            Some(grid) => Arc::clone(grid),
            None => Arc::new(map::load_map(&self.config.map)?),
        };
        let valid = ValidPositions::from_grid(&grid);
        if valid.is_empty() {
            return Err(LocalizationError::NoValidPositions);
        }

        self.table = if self.needs_table() {
            let (width, height) = grid.dimensions();
            Some(Arc::new(LookupTable::load(
                &self.config.lookup_table.path,
                width,
                height,
            )?))
        } else {
            None
        };

        self.grid = Some(grid);
        self.valid = Some(Arc::new(valid));
        self.base.set_state(State::Inactive);
        Ok(())
    }

    fn on_activate(&mut self) -> Result<()> {
        info!("Activating perception stack");
        let (grid, valid) = match (&self.grid, &self.valid) {
            (Some(grid), Some(valid)) => (Arc::clone(grid), Arc::clone(valid)),
            _ => {
                return Err(LocalizationError::InvalidConfig(
                    "perception stack must be configured before activation".to_string(),
                ))
            }
        };

        if self.localizer.is_none() {
            self.localizer = Some(Localizer::new(&self.config, grid, valid, self.table.clone())?);
        }
        self.base.set_state(State::Active);
        Ok(())
    }

    fn on_deactivate(&mut self) -> Result<()> {
        info!("Deactivating perception stack");
        self.base.set_state(State::Inactive);
        Ok(())
    }

    fn on_cleanup(&mut self) -> Result<()> {
        info!("Cleaning up perception stack");
        self.localizer = None;
        self.table = None;
        self.valid = None;
        self.grid = None;
        self.base.set_state(State::Unconfigured);
        Ok(())
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
