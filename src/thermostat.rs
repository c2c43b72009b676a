//! Periodic velocity rescaling.
//!
//! This is an engineering compensator, not a physical heat bath. The
//! position-correction step that separates overlapping disks slowly bleeds
//! kinetic energy; every `interval_ticks` ticks the thermostat scales all
//! velocities back toward the baseline energy recorded at the last
//! (re)initialisation. The per-correction factor is clamped so the
//! adjustment never shows up as a visible jump.

use crate::config::ThermostatConfig;
use crate::particles::ParticleStorage;

/// Simulation-unit mass of every particle.
pub const PARTICLE_MASS: f64 = 1.0;

#[derive(Debug, Clone)]
pub struct Thermostat {
    config: ThermostatConfig,
    baseline: f64,
    ticks_since_check: u64,
}

impl Thermostat {
    /// An invalid configuration is replaced by the default one.
    pub fn new(config: ThermostatConfig) -> Self {
        let config = match config.validate() {
            Ok(()) => config,
            Err(e) => {
                log::warn!("{e}; using the default thermostat");
                ThermostatConfig::default()
            }
        };
        Self {
            config,
            baseline: 0.0,
            ticks_since_check: 0,
        }
    }

    pub fn config(&self) -> &ThermostatConfig {
        &self.config
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.config.enabled = enabled;
    }

    /// Baseline kinetic energy the thermostat steers toward.
    pub fn baseline(&self) -> f64 {
        self.baseline
    }

    /// Records a new target energy and restarts the interval.
    pub fn rebaseline(&mut self, kinetic_energy: f64) {
        self.baseline = if kinetic_energy.is_finite() { kinetic_energy } else { 0.0 };
        self.ticks_since_check = 0;
        log::debug!("thermostat baseline set to {:.4}", self.baseline);
    }

    /// Clamped rescale factor for the given current energy, or `None` when
    /// no correction applies (non-positive energies, or inside the dead band).
    pub fn scale_factor(&self, current: f64) -> Option<f64> {
        if !(self.baseline > 0.0 && current > 0.0 && current.is_finite()) {
            return None;
        }
        let s = (self.baseline / current)
            .sqrt()
            .clamp(self.config.min_scale, self.config.max_scale);
        ((s - 1.0).abs() >= self.config.dead_band).then_some(s)
    }

    /// Applies one correction immediately, regardless of the interval.
    pub fn correct(&self, particles: &mut ParticleStorage) -> Option<f64> {
        let current = particles.kinetic_energy(PARTICLE_MASS);
        let s = self.scale_factor(current)?;
        particles.scale_velocities(s);
        log::debug!(
            "thermostat: E={current:.4} target={:.4} scale={s:.5}",
            self.baseline
        );
        Some(s)
    }

    /// Advances the interval counter; corrects velocities when it elapses.
    pub fn on_tick(&mut self, particles: &mut ParticleStorage) -> Option<f64> {
        if !self.config.enabled {
            return None;
        }
        self.ticks_since_check += 1;
        if self.ticks_since_check < self.config.interval_ticks.max(1) {
            return None;
        }
        self.ticks_since_check = 0;
        self.correct(particles)
    }
}
