//! Configuration types for loading simulation settings from YAML.
//!
//! Every section and field has a default, so an empty document (or no file
//! at all) yields the stock setup: 300 N₂ molecules at 300 K in an 800×500
//! box.
//!
//! ```yaml
//! physics:
//!   speed_scale: 0.0075       # px/frame per m/s
//!   seconds_per_frame: 0.0166667
//!
//! world:
//!   canvas_width: 800
//!   canvas_height: 500
//!   wall_thickness: 50
//!   particle_radius: 5
//!   time_scale: 1.0           # displacement per tick = velocity * time_scale
//!   substeps: 2
//!   min_particles: 100
//!   max_particles: 800
//!
//! initial:
//!   temperature: 300          # K
//!   molar_mass: 28.0134       # g/mol
//!   particle_count: 300
//!   distribution: equilibrium # or single_speed, dual_speed
//!   seed: 42                  # omit for a random seed
//!
//! thermostat:
//!   enabled: true
//!   interval_ticks: 120
//!   min_scale: 0.95
//!   max_scale: 1.05
//!   dead_band: 0.001
//!
//! histogram:
//!   bin_count: 60
//!   max_factor: 4
//!   alpha: 0.3
//!   window: 15
//!   sample_interval_ticks: 1
//!
//! tracer:
//!   max_trail: 10000
//!   max_mfp_samples: 1000
//!   convergence_history: 2000
//!   free_path_bin_width: 10
//!   free_path_window: 500
//! ```

use crate::distributions::DistributionMode;
use crate::error::{Error, Result};
use crate::geometry::CanvasSize;
use crate::physics::{DEFAULT_MOLAR_MASS, DEFAULT_SECONDS_PER_FRAME, DEFAULT_SPEED_SCALE, DEFAULT_TEMPERATURE};
use serde::Deserialize;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct PhysicsConfig {
    pub speed_scale: f64,
    pub seconds_per_frame: f64,
}

impl Default for PhysicsConfig {
    fn default() -> Self {
        Self {
            speed_scale: DEFAULT_SPEED_SCALE,
            seconds_per_frame: DEFAULT_SECONDS_PER_FRAME,
        }
    }
}

/// Container and integration settings.
#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct WorldConfig {
    pub canvas_width: f64,
    pub canvas_height: f64,
    pub wall_thickness: f64,
    pub particle_radius: f64,
    pub time_scale: f64,
    pub substeps: u32,
    pub min_particles: usize,
    pub max_particles: usize,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            canvas_width: 800.0,
            canvas_height: 500.0,
            wall_thickness: 50.0,
            particle_radius: 5.0,
            time_scale: 1.0,
            substeps: 2,
            min_particles: 100,
            max_particles: 800,
        }
    }
}

/// Physical parameters the simulation starts with.
#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct InitialConfig {
    pub temperature: f64,
    pub molar_mass: f64,
    pub particle_count: usize,
    pub distribution: DistributionMode,
    pub seed: Option<u64>,
}

impl Default for InitialConfig {
    fn default() -> Self {
        Self {
            temperature: DEFAULT_TEMPERATURE,
            molar_mass: DEFAULT_MOLAR_MASS,
            particle_count: 300,
            distribution: DistributionMode::Equilibrium,
            seed: None,
        }
    }
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct ThermostatConfig {
    pub enabled: bool,
    pub interval_ticks: u64,
    pub min_scale: f64,
    pub max_scale: f64,
    /// Corrections with |s - 1| below this are skipped.
    pub dead_band: f64,
}

impl Default for ThermostatConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_ticks: 120,
            min_scale: 0.95,
            max_scale: 1.05,
            dead_band: 0.001,
        }
    }
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct HistogramConfig {
    pub bin_count: usize,
    /// Histogram range as a multiple of σ.
    pub max_factor: f64,
    /// EWMA weight of the newest frame.
    pub alpha: f64,
    /// Frames kept for smoothing.
    pub window: usize,
    pub sample_interval_ticks: u64,
}

impl Default for HistogramConfig {
    fn default() -> Self {
        Self {
            bin_count: 60,
            max_factor: 4.0,
            alpha: 0.3,
            window: 15,
            sample_interval_ticks: 1,
        }
    }
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct TracerConfig {
    pub max_trail: usize,
    pub max_mfp_samples: usize,
    pub convergence_history: usize,
    /// Pixels.
    pub free_path_bin_width: f64,
    pub free_path_window: usize,
}

impl Default for TracerConfig {
    fn default() -> Self {
        Self {
            max_trail: 10_000,
            max_mfp_samples: 1_000,
            convergence_history: 2_000,
            free_path_bin_width: 10.0,
            free_path_window: 500,
        }
    }
}

/// Top-level configuration.
#[derive(Deserialize, Debug, Clone, PartialEq, Default)]
#[serde(default)]
pub struct SimConfig {
    pub physics: PhysicsConfig,
    pub world: WorldConfig,
    pub initial: InitialConfig,
    pub thermostat: ThermostatConfig,
    pub histogram: HistogramConfig,
    pub tracer: TracerConfig,
}

impl SimConfig {
    pub fn from_yaml_reader(reader: impl Read) -> Result<Self> {
        let config: SimConfig = serde_yaml::from_reader(reader)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_yaml_str(text: &str) -> Result<Self> {
        let config: SimConfig = serde_yaml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path.as_ref())?;
        Self::from_yaml_reader(BufReader::new(file))
    }

    /// Rejects settings the engine cannot work with. Physical parameters
    /// (temperature, molar mass) are not checked here; the engine falls back
    /// to defaults for those at runtime.
    pub fn validate(&self) -> Result<()> {
        self.physics.validate()?;
        self.world.validate()?;
        self.thermostat.validate()?;
        self.histogram.validate()?;
        self.tracer.validate()
    }

    /// Replaces every section that fails validation with its default.
    pub fn sanitized(mut self) -> Self {
        fn fix<T: Default>(section: &mut T, check: fn(&T) -> Result<()>) {
            if let Err(e) = check(section) {
                log::warn!("{e}; using the default section");
                *section = T::default();
            }
        }
        fix(&mut self.physics, PhysicsConfig::validate);
        fix(&mut self.world, WorldConfig::validate);
        fix(&mut self.thermostat, ThermostatConfig::validate);
        fix(&mut self.histogram, HistogramConfig::validate);
        fix(&mut self.tracer, TracerConfig::validate);
        self
    }
}

fn positive(name: &str, v: f64) -> Result<()> {
    if v.is_finite() && v > 0.0 {
        Ok(())
    } else {
        Err(Error::InvalidConfig(format!("{name} must be finite and > 0, got {v}")))
    }
}

impl PhysicsConfig {
    pub fn validate(&self) -> Result<()> {
        positive("physics.speed_scale", self.speed_scale)?;
        positive("physics.seconds_per_frame", self.seconds_per_frame)
    }
}

impl WorldConfig {
    pub fn canvas(&self) -> CanvasSize {
        CanvasSize::new(self.canvas_width, self.canvas_height)
    }

    /// Clamps a requested particle count into `[min_particles, max_particles]`.
    /// Inverted bounds resolve to `max_particles` instead of panicking.
    pub fn clamp_count(&self, count: usize) -> usize {
        count.max(self.min_particles).min(self.max_particles)
    }

    pub fn validate(&self) -> Result<()> {
        positive("world.canvas_width", self.canvas_width)?;
        positive("world.canvas_height", self.canvas_height)?;
        positive("world.wall_thickness", self.wall_thickness)?;
        positive("world.particle_radius", self.particle_radius)?;
        positive("world.time_scale", self.time_scale)?;
        if self.substeps == 0 {
            return Err(Error::InvalidConfig("world.substeps must be >= 1".into()));
        }
        if self.min_particles == 0 || self.min_particles > self.max_particles {
            return Err(Error::InvalidConfig(format!(
                "world particle bounds [{}, {}] are empty",
                self.min_particles, self.max_particles
            )));
        }
        Ok(())
    }
}

impl ThermostatConfig {
    pub fn validate(&self) -> Result<()> {
        if self.interval_ticks == 0 {
            return Err(Error::InvalidConfig("thermostat.interval_ticks must be >= 1".into()));
        }
        if !(self.min_scale > 0.0 && self.min_scale <= 1.0 && self.max_scale >= 1.0 && self.max_scale.is_finite()) {
            return Err(Error::InvalidConfig(format!(
                "thermostat clamp [{}, {}] must contain 1",
                self.min_scale, self.max_scale
            )));
        }
        if !(self.dead_band >= 0.0 && self.dead_band.is_finite()) {
            return Err(Error::InvalidConfig(format!(
                "thermostat.dead_band must be finite and >= 0, got {}",
                self.dead_band
            )));
        }
        Ok(())
    }
}

impl HistogramConfig {
    pub fn validate(&self) -> Result<()> {
        positive("histogram.max_factor", self.max_factor)?;
        if self.bin_count == 0 || self.window == 0 || self.sample_interval_ticks == 0 {
            return Err(Error::InvalidConfig(
                "histogram.bin_count, window and sample_interval_ticks must be >= 1".into(),
            ));
        }
        if !(self.alpha > 0.0 && self.alpha <= 1.0) {
            return Err(Error::InvalidConfig(format!("histogram.alpha must be in (0, 1], got {}", self.alpha)));
        }
        Ok(())
    }
}

impl TracerConfig {
    pub fn validate(&self) -> Result<()> {
        positive("tracer.free_path_bin_width", self.free_path_bin_width)?;
        if self.max_trail == 0 || self.max_mfp_samples == 0 {
            return Err(Error::InvalidConfig("tracer caps must be >= 1".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_gives_defaults() {
        let config = SimConfig::from_yaml_str("{}").expect("defaults");
        assert_eq!(config, SimConfig::default());
        assert_eq!(config.thermostat.interval_ticks, 120);
        assert_eq!(config.histogram.bin_count, 60);
        assert_eq!(config.histogram.window, 15);
        assert_eq!(config.tracer.max_trail, 10_000);
    }

    #[test]
    fn partial_document_overrides_fields() {
        let yaml = "
initial:
  temperature: 500
  distribution: dual_speed
  seed: 9
thermostat:
  enabled: false
";
        let config = SimConfig::from_yaml_str(yaml).expect("parse");
        assert_eq!(config.initial.temperature, 500.0);
        assert_eq!(config.initial.distribution, DistributionMode::DualSpeed);
        assert_eq!(config.initial.seed, Some(9));
        assert!(!config.thermostat.enabled);
        assert_eq!(config.initial.molar_mass, DEFAULT_MOLAR_MASS);
    }

    #[test]
    fn invalid_values_are_rejected() {
        let err = SimConfig::from_yaml_str("histogram:\n  alpha: 1.5\n").unwrap_err();
        assert!(err.to_string().contains("alpha"));
        let err = SimConfig::from_yaml_str("world:\n  min_particles: 900\n").unwrap_err();
        assert!(err.to_string().contains("particle bounds"));
        assert!(SimConfig::from_yaml_str("initial:\n  distribution: bimodal\n").is_err());
    }

    #[test]
    fn bundled_config_parses() {
        let config = SimConfig::from_yaml_str(include_str!("../configs/helium_relaxation.yaml")).expect("parse");
        assert_eq!(config.initial.distribution, DistributionMode::SingleSpeed);
        assert_eq!(config.initial.particle_count, 400);
        assert_eq!(config.world.canvas_width, 800.0);
    }

    #[test]
    fn sanitized_replaces_only_broken_sections() {
        let mut config = SimConfig::default();
        config.thermostat.min_scale = 1.05;
        config.thermostat.max_scale = 0.95;
        config.world.min_particles = 900;
        config.world.particle_radius = f64::NAN;
        config.initial.temperature = 450.0;
        config.histogram.alpha = 0.5;

        let fixed = config.sanitized();
        assert_eq!(fixed.thermostat, ThermostatConfig::default());
        assert_eq!(fixed.world, WorldConfig::default());
        assert_eq!(fixed.initial.temperature, 450.0);
        assert_eq!(fixed.histogram.alpha, 0.5);
        assert!(fixed.validate().is_ok());
    }

    #[test]
    fn count_is_clamped_to_world_bounds() {
        let world = WorldConfig::default();
        assert_eq!(world.clamp_count(5), 100);
        assert_eq!(world.clamp_count(5000), 800);
        assert_eq!(world.clamp_count(300), 300);
        let inverted = WorldConfig { min_particles: 900, ..WorldConfig::default() };
        assert_eq!(inverted.clamp_count(5), 800);
    }
}
