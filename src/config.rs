//! Configuration for the localization core
//!
//! Every section has defaults matching the reference rover: a 96 x 48 inch
//! course at 5 cells per inch, a 72-beam lidar reading 3 cm to 1.2 m, and a
//! 5000-particle filter that never drops below 1000 particles.
//!
//! Configuration is loaded from TOML; individual numeric parameters can be
//! overridden at runtime with [`MclConfig::configure`].

use crate::error::{LocalizationError, Result};
use crate::perception::filters::HeadingMean;
use crate::perception::sensors::SensorKind;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MclConfig {
    pub map: MapConfig,
    pub sensor: SensorConfig,
    pub motion: MotionConfig,
    pub filter: FilterConfig,
    pub lookup_table: LookupTableConfig,
}

/// Map source and resolution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MapConfig {
    /// Text map at one cell per unit; the built-in reference course when unset
    pub path: Option<PathBuf>,
    /// Grid cells per distance unit (pixels per inch on the reference rover)
    pub cells_per_unit: usize,
}

impl Default for MapConfig {
    fn default() -> Self {
        MapConfig {
            path: None,
            cells_per_unit: 5,
        }
    }
}

/// Ranging sensor parameters. Ranges and noise are in distance units.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SensorConfig {
    pub beam_count: usize,
    pub max_range: f64,
    pub min_range: f64,
    /// Distance from the rover's centre to the lidar along each beam
    pub origin_offset: f64,
    pub samples_per_beam: usize,
    /// Stop rays on `Boundary` cells as well as `Obstacle` cells
    pub boundary_blocks_rays: bool,
    /// Measurement noise std at full and at zero certainty
    pub min_std: f64,
    pub max_std: f64,
}

impl Default for SensorConfig {
    fn default() -> Self {
        SensorConfig {
            beam_count: 72,
            max_range: 6000.0 / 127.0,
            min_range: 3.0 / 2.54,
            origin_offset: 3.0,
            samples_per_beam: 500,
            boundary_blocks_rays: false,
            min_std: 2.5,
            max_std: 12.5,
        }
    }
}

/// Process noise, in cells per second and radians per second
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MotionConfig {
    pub forward_noise_std: f64,
    pub angular_noise_std: f64,
}

impl Default for MotionConfig {
    fn default() -> Self {
        MotionConfig {
            forward_noise_std: 0.25,
            angular_noise_std: 2.0_f64.to_radians(),
        }
    }
}

/// Particle filter parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    pub particle_count: usize,
    pub min_particle_count: usize,
    /// Certainty is `certainty_gain / variance`, saturating at 1
    pub certainty_gain: f64,
    /// Added to every weight after the measurement update
    pub weight_floor: f64,
    /// Resampling position jitter std in cells, at full and zero certainty
    pub jitter_position_min: f64,
    pub jitter_position_max: f64,
    pub jitter_heading_std: f64,
    pub heading_mean: HeadingMean,
    pub particle_sensor: SensorKind,
    pub agent_sensor: SensorKind,
    /// RNG seed, 0 draws one from the OS
    pub seed: u64,
}

impl Default for FilterConfig {
    fn default() -> Self {
        FilterConfig {
            particle_count: 5000,
            min_particle_count: 1000,
            certainty_gain: 50.0,
            weight_floor: 1e-200,
            jitter_position_min: 0.5,
            jitter_position_max: 2.5,
            jitter_heading_std: 0.1,
            heading_mean: HeadingMean::Linear,
            particle_sensor: SensorKind::Lookup,
            agent_sensor: SensorKind::RayCast,
            seed: 0,
        }
    }
}

/// Where the precomputed lookup table lives
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LookupTableConfig {
    pub path: PathBuf,
}

impl Default for LookupTableConfig {
    fn default() -> Self {
        LookupTableConfig {
            path: PathBuf::from("lidar_lookup.bin"),
        }
    }
}

impl MclConfig {
    /// Parse a TOML document; missing keys take their defaults
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: MclConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Read and parse a TOML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        Self::from_toml_str(&fs::read_to_string(path)?)
    }

    /// Check cross-field constraints
    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: &str| Err(LocalizationError::InvalidConfig(msg.to_string()));

        if self.map.cells_per_unit == 0 {
            return invalid("cells_per_unit must be positive");
        }
        if self.sensor.beam_count == 0 {
            return invalid("beam_count must be positive");
        }
        if !(self.sensor.min_range >= 0.0 && self.sensor.max_range > self.sensor.min_range) {
            return invalid("ranges must satisfy 0 <= min_range < max_range");
        }
        if self.sensor.samples_per_beam < 2 {
            return invalid("samples_per_beam must be at least 2");
        }
        if !(self.sensor.min_std > 0.0 && self.sensor.max_std >= self.sensor.min_std) {
            return invalid("sensor std must satisfy 0 < min_std <= max_std");
        }
        if self.motion.forward_noise_std < 0.0 || self.motion.angular_noise_std < 0.0 {
            return invalid("motion noise must be non-negative");
        }
        if self.filter.particle_count == 0 || self.filter.min_particle_count == 0 {
            return invalid("particle counts must be positive");
        }
        if !(self.filter.certainty_gain > 0.0) {
            return invalid("certainty_gain must be positive");
        }
        if !(self.filter.weight_floor > 0.0) {
            return invalid("weight_floor must be positive");
        }
        if self.filter.jitter_position_min < 0.0
            || self.filter.jitter_position_max < self.filter.jitter_position_min
            || self.filter.jitter_heading_std < 0.0
        {
            return invalid("jitter must satisfy 0 <= jitter_position_min <= jitter_position_max");
        }
        Ok(())
    }

    /// Override numeric parameters by name
    pub fn configure(&mut self, params: &HashMap<String, f64>) -> Result<()> {
        for (key, &value) in params {
            match key.as_str() {
                "cells_per_unit" => self.map.cells_per_unit = count(key, value)?,
                "beam_count" => self.sensor.beam_count = count(key, value)?,
                "max_range" => self.sensor.max_range = positive(key, value)?,
                "min_range" => self.sensor.min_range = non_negative(key, value)?,
                "origin_offset" => self.sensor.origin_offset = non_negative(key, value)?,
                "samples_per_beam" => self.sensor.samples_per_beam = count(key, value)?,
                "min_sensor_std" => self.sensor.min_std = positive(key, value)?,
                "max_sensor_std" => self.sensor.max_std = positive(key, value)?,
                "forward_noise_std" => self.motion.forward_noise_std = non_negative(key, value)?,
                "angular_noise_std" => self.motion.angular_noise_std = non_negative(key, value)?,
                "particle_count" => self.filter.particle_count = count(key, value)?,
                "min_particle_count" => self.filter.min_particle_count = count(key, value)?,
                "certainty_gain" => self.filter.certainty_gain = positive(key, value)?,
                "weight_floor" => self.filter.weight_floor = positive(key, value)?,
                "jitter_position_min" => self.filter.jitter_position_min = non_negative(key, value)?,
                "jitter_position_max" => self.filter.jitter_position_max = non_negative(key, value)?,
                "jitter_heading_std" => self.filter.jitter_heading_std = non_negative(key, value)?,
                "seed" => self.filter.seed = non_negative(key, value)? as u64,
                _ => {
                    return Err(LocalizationError::InvalidConfig(format!(
                        "unknown parameter '{}'",
                        key
                    )))
                }
            }
        }
        self.validate()
    }
}

fn positive(key: &str, value: f64) -> Result<f64> {
    if value > 0.0 && value.is_finite() {
        Ok(value)
    } else {
        Err(LocalizationError::InvalidConfig(format!(
            "{} must be positive, got {}",
            key, value
        )))
    }
}

fn non_negative(key: &str, value: f64) -> Result<f64> {
    if value >= 0.0 && value.is_finite() {
        Ok(value)
    } else {
        Err(LocalizationError::InvalidConfig(format!(
            "{} must be non-negative, got {}",
            key, value
        )))
    }
}

fn count(key: &str, value: f64) -> Result<usize> {
    let value = positive(key, value)?;
    if value.fract() != 0.0 {
        return Err(LocalizationError::InvalidConfig(format!(
            "{} must be a whole number, got {}",
            key, value
        )));
    }
    Ok(value as usize)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = MclConfig::default();
        config.validate().unwrap();
        assert_eq!(config.sensor.beam_count, 72);
        assert_eq!(config.filter.min_particle_count, 1000);
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = MclConfig::from_toml_str(
            r#"
            [filter]
            particle_count = 200
            min_particle_count = 50
            heading_mean = "circular"
            particle_sensor = "ray_cast"

            [lookup_table]
            path = "maps/course.lut"
            "#,
        )
        .unwrap();

        assert_eq!(config.filter.particle_count, 200);
        assert_eq!(config.filter.heading_mean, HeadingMean::Circular);
        assert_eq!(config.filter.particle_sensor, SensorKind::RayCast);
        assert_eq!(config.lookup_table.path, PathBuf::from("maps/course.lut"));
        assert_eq!(config.sensor, SensorConfig::default());
    }

    #[test]
    fn test_invalid_toml_is_rejected() {
        assert!(matches!(
            MclConfig::from_toml_str("[sensor]\nbeam_count = 0\n"),
            Err(LocalizationError::InvalidConfig(_))
        ));
        assert!(matches!(
            MclConfig::from_toml_str("[sensor\n"),
            Err(LocalizationError::ConfigParse(_))
        ));
    }

    #[test]
    fn test_configure_overrides() {
        let mut config = MclConfig::default();
        let mut params = HashMap::new();
        params.insert("beam_count".to_string(), 36.0);
        params.insert("max_sensor_std".to_string(), 4.0);
        config.configure(&params).unwrap();
        assert_eq!(config.sensor.beam_count, 36);
        assert_eq!(config.sensor.max_std, 4.0);

        let mut bad = HashMap::new();
        bad.insert("beam_count".to_string(), 2.5);
        assert!(config.configure(&bad).is_err());

        let mut unknown = HashMap::new();
        unknown.insert("inflation_radius".to_string(), 1.0);
        assert!(config.configure(&unknown).is_err());
    }

    #[test]
    fn test_configure_validates_cross_field() {
        let mut config = MclConfig::default();
        let mut params = HashMap::new();
        params.insert("min_range".to_string(), 100.0);
        assert!(config.configure(&params).is_err());
    }
}
