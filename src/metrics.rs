//! Physical readouts derived from a particle snapshot.
//!
//! Functions taking a [`ParticleStorage`] return `None` for an empty gas;
//! everything else is total over its inputs.

use crate::particles::ParticleStorage;
use crate::physics::{self, BOLTZMANN, DEFAULT_TEMPERATURE, UnitScale};
use crate::tracer::TracerRecord;
use std::f64::consts::{PI, SQRT_2};

/// Particle count at which the relative pressure reads 1 (together with
/// [`DEFAULT_TEMPERATURE`]).
pub const REFERENCE_PARTICLE_COUNT: f64 = 300.0;

/// Σ ½·m·|v|² in simulation units.
pub fn kinetic_energy(particles: &ParticleStorage, mass_per_particle: f64) -> f64 {
    particles.kinetic_energy(mass_per_particle)
}

/// Total kinetic energy in joules.
pub fn total_kinetic_energy_joules(
    particles: &ParticleStorage,
    molar_mass: f64,
    units: &UnitScale,
) -> Option<f64> {
    if particles.is_empty() {
        return None;
    }
    let m = physics::molecular_mass_kg(molar_mass);
    let sum_v2: f64 = particles
        .speeds()
        .map(|v| {
            let v = units.px_per_frame_to_mps(v);
            v * v
        })
        .sum();
    Some(0.5 * m * sum_v2)
}

/// Mean kinetic energy per particle in joules.
pub fn average_kinetic_energy_joules(
    particles: &ParticleStorage,
    molar_mass: f64,
    units: &UnitScale,
) -> Option<f64> {
    total_kinetic_energy_joules(particles, molar_mass, units).map(|e| e / particles.len() as f64)
}

/// Temperature from 2D equipartition, `⟨KE⟩ = k·T`.
pub fn effective_temperature(
    particles: &ParticleStorage,
    molar_mass: f64,
    units: &UnitScale,
) -> Option<f64> {
    average_kinetic_energy_joules(particles, molar_mass, units).map(|e| e / BOLTZMANN)
}

/// Root-mean-square speed of the gas in m/s.
pub fn simulated_vrms(particles: &ParticleStorage, units: &UnitScale) -> Option<f64> {
    if particles.is_empty() {
        return None;
    }
    let mean_v2 = particles.speeds().map(|v| v * v).sum::<f64>() / particles.len() as f64;
    Some(units.px_per_frame_to_mps(mean_v2.sqrt()))
}

/// `λ = 1/(√2·π·n·d²)` with `n = N/area` in pixels, converted to meters.
///
/// Temperature and molar mass do not enter the hard-disk formula; they are
/// accepted so callers can pass the full parameter set.
pub fn theoretical_mean_free_path(
    _temperature: f64,
    _molar_mass: f64,
    particle_count: usize,
    particle_radius: f64,
    area: f64,
    units: &UnitScale,
) -> Option<f64> {
    if particle_count == 0 || !(area > 0.0) || !(particle_radius > 0.0) {
        return None;
    }
    let n = particle_count as f64 / area;
    let d = 2.0 * particle_radius;
    let mfp_px = 1.0 / (SQRT_2 * PI * n * d * d);
    Some(units.pixels_to_meters(mfp_px))
}

/// `N·k·T` in joules.
pub fn theoretical_total_kinetic_energy(temperature: f64, particle_count: usize) -> f64 {
    particle_count as f64 * BOLTZMANN * physics::sanitize_temperature(temperature)
}

/// `k·T` in joules.
pub fn theoretical_average_kinetic_energy(temperature: f64) -> f64 {
    BOLTZMANN * physics::sanitize_temperature(temperature)
}

/// Ideal-gas pressure relative to 300 particles at 300 K.
pub fn relative_pressure(temperature: f64, particle_count: usize) -> f64 {
    particle_count as f64 * physics::sanitize_temperature(temperature)
        / (REFERENCE_PARTICLE_COUNT * DEFAULT_TEMPERATURE)
}

/// The tracer's mean free path in meters.
pub fn simulated_mean_free_path(record: &TracerRecord, units: &UnitScale) -> f64 {
    units.pixels_to_meters(record.mean_free_path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::particles::Particle;
    use crate::physics::{DEFAULT_MOLAR_MASS, characteristic_speeds, sigma_2d};
    use approx::assert_relative_eq;

    fn gas_with(velocities: &[(f64, f64)]) -> ParticleStorage {
        let mut s = ParticleStorage::default();
        for (i, &(vx, vy)) in velocities.iter().enumerate() {
            s.push(Particle { id: i as u32, x: 0.0, y: 0.0, vx, vy });
        }
        s
    }

    #[test]
    fn kinetic_energy_in_simulation_units() {
        let p = gas_with(&[(3.0, 4.0), (0.0, 2.0)]);
        assert_relative_eq!(kinetic_energy(&p, 1.0), 12.5 + 2.0);
        assert_relative_eq!(kinetic_energy(&p, 2.0), 29.0);
    }

    #[test]
    fn sigma_speed_gives_back_temperature() {
        // A particle moving at σ·√2 carries k·T, so the gas reads T.
        let units = UnitScale::default();
        let v = units.mps_to_px_per_frame(sigma_2d(300.0, DEFAULT_MOLAR_MASS) * SQRT_2);
        let p = gas_with(&[(v, 0.0), (0.0, -v)]);
        let t = effective_temperature(&p, DEFAULT_MOLAR_MASS, &units).unwrap_or_default();
        assert_relative_eq!(t, 300.0, max_relative = 1e-9);
        assert_relative_eq!(
            average_kinetic_energy_joules(&p, DEFAULT_MOLAR_MASS, &units).unwrap_or_default(),
            theoretical_average_kinetic_energy(300.0),
            max_relative = 1e-9
        );
    }

    #[test]
    fn empty_gas_has_no_readings() {
        let p = ParticleStorage::default();
        let units = UnitScale::default();
        assert_eq!(effective_temperature(&p, DEFAULT_MOLAR_MASS, &units), None);
        assert_eq!(simulated_vrms(&p, &units), None);
        assert_eq!(total_kinetic_energy_joules(&p, DEFAULT_MOLAR_MASS, &units), None);
    }

    #[test]
    fn vrms_in_meters_per_second() {
        let units = UnitScale::default();
        let p = gas_with(&[(3.0, 0.0), (0.0, 1.0)]);
        assert_relative_eq!(simulated_vrms(&p, &units).unwrap_or_default(), 5.0_f64.sqrt() / 0.0075);
        let vrms_3d = characteristic_speeds(300.0, DEFAULT_MOLAR_MASS).vrms;
        assert!(vrms_3d > 500.0);
    }

    #[test]
    fn theoretical_values() {
        let units = UnitScale::default();
        let mfp = theoretical_mean_free_path(300.0, DEFAULT_MOLAR_MASS, 300, 5.0, 800.0 * 500.0, &units)
            .unwrap_or_default();
        let expected_px = 1.0 / (SQRT_2 * PI * (300.0 / 400_000.0) * 100.0);
        assert_relative_eq!(mfp, expected_px * 0.0075, max_relative = 1e-12);
        assert_eq!(theoretical_mean_free_path(300.0, 28.0, 0, 5.0, 1.0, &units), None);

        assert_relative_eq!(relative_pressure(300.0, 300), 1.0);
        assert_relative_eq!(relative_pressure(600.0, 150), 1.0);
        assert_relative_eq!(theoretical_total_kinetic_energy(300.0, 2), 2.0 * BOLTZMANN * 300.0);
    }

    #[test]
    fn tracer_mfp_in_meters() {
        let record = TracerRecord { mean_free_path: 40.0, ..Default::default() };
        assert_relative_eq!(simulated_mean_free_path(&record, &UnitScale::default()), 0.3);
    }
}
