//! Physical constants and the conversions between SI units and the
//! simulation's pixel/frame units.
//!
//! Every velocity inside the engine is expressed in pixels per frame. The
//! mapping to metres per second is a single linear factor, the *speed
//! scale*, carried by [`UnitScale`]. Each simulation owns its own
//! `UnitScale`, so two engines with different scales can coexist.

use crate::error::{Error, Result};
use std::f64::consts::PI;

/// Boltzmann constant, J/K.
pub const BOLTZMANN: f64 = 1.380_648_52e-23;
/// Molar gas constant, J/(mol·K).
pub const GAS_CONSTANT: f64 = 8.314;
/// Avogadro constant, 1/mol.
pub const AVOGADRO: f64 = 6.022_140_76e23;

/// Fallback temperature for non-finite or negative input, K.
pub const DEFAULT_TEMPERATURE: f64 = 300.0;
/// Fallback molar mass (N₂) for non-finite or non-positive input, g/mol.
pub const DEFAULT_MOLAR_MASS: f64 = 28.0134;
/// Pixels per frame for one metre per second.
pub const DEFAULT_SPEED_SCALE: f64 = 0.0075;
/// Wall-clock duration of one frame at 60 Hz.
pub const DEFAULT_SECONDS_PER_FRAME: f64 = 1.0 / 60.0;

/// Returns `temperature` if usable, otherwise [`DEFAULT_TEMPERATURE`].
pub fn sanitize_temperature(temperature: f64) -> f64 {
    if temperature.is_finite() && temperature >= 0.0 {
        temperature
    } else {
        log::warn!("temperature {temperature} is not usable, falling back to {DEFAULT_TEMPERATURE} K");
        DEFAULT_TEMPERATURE
    }
}

/// Returns `molar_mass` if usable, otherwise [`DEFAULT_MOLAR_MASS`].
pub fn sanitize_molar_mass(molar_mass: f64) -> f64 {
    if molar_mass.is_finite() && molar_mass > 0.0 {
        molar_mass
    } else {
        log::warn!("molar mass {molar_mass} is not usable, falling back to {DEFAULT_MOLAR_MASS} g/mol");
        DEFAULT_MOLAR_MASS
    }
}

/// Mass of a single molecule in kg for a molar mass in g/mol.
#[inline]
pub fn molecular_mass_kg(molar_mass: f64) -> f64 {
    (sanitize_molar_mass(molar_mass) / 1000.0) / AVOGADRO
}

/// Scale parameter σ = sqrt(kT/m) of the 2D Rayleigh speed distribution, m/s.
///
/// This is the true equilibrium distribution of a 2D elastic gas.
pub fn sigma_2d(temperature: f64, molar_mass: f64) -> f64 {
    let t = sanitize_temperature(temperature);
    let m = molecular_mass_kg(molar_mass);
    (BOLTZMANN * t / m).sqrt()
}

/// Most-probable, mean and root-mean-square speeds, m/s.
///
/// These use the 3D Maxwell–Boltzmann formulas even though the simulated
/// gas is two dimensional; the reference curve shown next to the
/// histogram is built from them.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CharacteristicSpeeds {
    pub vp: f64,
    pub vavg: f64,
    pub vrms: f64,
}

pub fn characteristic_speeds(temperature: f64, molar_mass: f64) -> CharacteristicSpeeds {
    let t = sanitize_temperature(temperature);
    let m = sanitize_molar_mass(molar_mass) / 1000.0;
    CharacteristicSpeeds {
        vp: (2.0 * GAS_CONSTANT * t / m).sqrt(),
        vavg: (8.0 * GAS_CONSTANT * t / (PI * m)).sqrt(),
        vrms: (3.0 * GAS_CONSTANT * t / m).sqrt(),
    }
}

/// 2D Rayleigh probability density at speed `v` for scale `sigma`.
pub fn rayleigh_density(v: f64, sigma: f64) -> f64 {
    if sigma <= 0.0 || v < 0.0 {
        return 0.0;
    }
    let s2 = sigma * sigma;
    v / s2 * (-v * v / (2.0 * s2)).exp()
}

/// 3D Maxwell–Boltzmann speed density at `v` for most-probable speed `vp`.
pub fn maxwell_density_3d(v: f64, vp: f64) -> f64 {
    if vp <= 0.0 || v < 0.0 {
        return 0.0;
    }
    let x = v / vp;
    4.0 / PI.sqrt() * x * x / vp * (-x * x).exp()
}

/// Conversion context between SI units and simulation units.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UnitScale {
    speed_scale: f64,
    seconds_per_frame: f64,
}

impl Default for UnitScale {
    fn default() -> Self {
        Self {
            speed_scale: DEFAULT_SPEED_SCALE,
            seconds_per_frame: DEFAULT_SECONDS_PER_FRAME,
        }
    }
}

impl UnitScale {
    /// Builds a scale, replacing unusable values with the defaults.
    pub fn new(speed_scale: f64, seconds_per_frame: f64) -> Self {
        let mut scale = Self::default();
        scale.set_speed_scale(speed_scale);
        if seconds_per_frame.is_finite() && seconds_per_frame > 0.0 {
            scale.seconds_per_frame = seconds_per_frame;
        }
        scale
    }

    #[inline]
    pub fn speed_scale(&self) -> f64 {
        self.speed_scale
    }

    #[inline]
    pub fn seconds_per_frame(&self) -> f64 {
        self.seconds_per_frame
    }

    /// Updates the speed scale. Returns `false` and keeps the old value
    /// unless `scale` is finite and positive.
    pub fn set_speed_scale(&mut self, scale: f64) -> bool {
        if scale.is_finite() && scale > 0.0 {
            self.speed_scale = scale;
            true
        } else {
            false
        }
    }

    #[inline]
    pub fn mps_to_px_per_frame(&self, v: f64) -> f64 {
        v * self.speed_scale
    }

    #[inline]
    pub fn px_per_frame_to_mps(&self, v: f64) -> f64 {
        v / self.speed_scale
    }

    #[inline]
    pub fn pixels_to_meters(&self, d: f64) -> f64 {
        d / (1.0 / self.speed_scale)
    }

    #[inline]
    pub fn meters_to_pixels(&self, d: f64) -> f64 {
        d * (1.0 / self.speed_scale)
    }

    #[inline]
    pub fn frames_to_seconds(&self, frames: f64) -> f64 {
        frames * self.seconds_per_frame
    }

    /// σ of the 2D Rayleigh distribution in pixels per frame.
    pub fn sigma_2d_px(&self, temperature: f64, molar_mass: f64) -> f64 {
        self.mps_to_px_per_frame(sigma_2d(temperature, molar_mass))
    }

    /// Most-probable (3D formula) speed in pixels per frame.
    pub fn vp_px(&self, temperature: f64, molar_mass: f64) -> f64 {
        self.mps_to_px_per_frame(characteristic_speeds(temperature, molar_mass).vp)
    }
}

/// A selectable gas species.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Gas {
    pub name: &'static str,
    pub symbol: &'static str,
    /// g/mol
    pub molar_mass: f64,
}

pub const GASES: &[Gas] = &[
    Gas { name: "hydrogen", symbol: "H2", molar_mass: 2.016 },
    Gas { name: "helium", symbol: "He", molar_mass: 4.0026 },
    Gas { name: "nitrogen", symbol: "N2", molar_mass: 28.0134 },
    Gas { name: "oxygen", symbol: "O2", molar_mass: 31.998 },
    Gas { name: "argon", symbol: "Ar", molar_mass: 39.948 },
    Gas { name: "carbon dioxide", symbol: "CO2", molar_mass: 44.009 },
    Gas { name: "xenon", symbol: "Xe", molar_mass: 131.29 },
];

/// Looks a gas up by symbol or name, case-insensitively.
pub fn gas_by_name(name: &str) -> Result<&'static Gas> {
    let wanted = name.trim();
    GASES
        .iter()
        .find(|g| g.symbol.eq_ignore_ascii_case(wanted) || g.name.eq_ignore_ascii_case(wanted))
        .ok_or_else(|| Error::UnknownGas(name.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn sigma_for_nitrogen_at_room_temperature() {
        let expected = (1.380_648_52e-23_f64 * 300.0 / (0.028_013_4 / 6.022_140_76e23)).sqrt();
        let sigma = sigma_2d(300.0, 28.0134);
        assert_relative_eq!(sigma, expected, max_relative = 1e-12);
        assert!((sigma - 298.6).abs() < 0.5, "sigma = {sigma}");

        let px = UnitScale::default().sigma_2d_px(300.0, 28.0134);
        assert!((px - 2.24).abs() < 0.01, "sigma_px = {px}");
    }

    #[test]
    fn non_finite_inputs_fall_back_to_defaults() {
        assert_eq!(sigma_2d(f64::NAN, f64::INFINITY), sigma_2d(300.0, 28.0134));
        assert_eq!(sanitize_temperature(-5.0), DEFAULT_TEMPERATURE);
        assert_eq!(sanitize_molar_mass(0.0), DEFAULT_MOLAR_MASS);
        let a = characteristic_speeds(f64::NAN, f64::NAN);
        let b = characteristic_speeds(300.0, 28.0134);
        assert_eq!(a, b);
    }

    #[test]
    fn characteristic_speed_ordering() {
        let s = characteristic_speeds(300.0, 28.0134);
        assert!(s.vp < s.vavg && s.vavg < s.vrms);
        assert_relative_eq!(s.vp, (2.0 * 8.314 * 300.0 / 0.028_013_4_f64).sqrt());
    }

    #[test]
    fn conversions_are_inverse() {
        let units = UnitScale::default();
        let v = 421.9;
        assert_relative_eq!(units.px_per_frame_to_mps(units.mps_to_px_per_frame(v)), v);
        assert_relative_eq!(units.meters_to_pixels(units.pixels_to_meters(123.0)), 123.0);
        assert_relative_eq!(units.pixels_to_meters(100.0), 0.75);
    }

    #[test]
    fn rejected_speed_scale_keeps_previous() {
        let mut units = UnitScale::default();
        assert!(!units.set_speed_scale(f64::NAN));
        assert!(!units.set_speed_scale(-1.0));
        assert_eq!(units.speed_scale(), DEFAULT_SPEED_SCALE);
        assert!(units.set_speed_scale(0.01));
        assert_eq!(units.speed_scale(), 0.01);
    }

    #[test]
    fn densities_integrate_to_one() {
        let sigma = 2.24;
        let vp = 3.16;
        let dv = 1e-3;
        let (mut r, mut m) = (0.0, 0.0);
        let mut v = 0.0;
        while v < 40.0 {
            r += rayleigh_density(v, sigma) * dv;
            m += maxwell_density_3d(v, vp) * dv;
            v += dv;
        }
        assert!((r - 1.0).abs() < 1e-3, "rayleigh integral {r}");
        assert!((m - 1.0).abs() < 1e-3, "maxwell integral {m}");
    }

    #[test]
    fn gas_lookup() {
        assert_eq!(gas_by_name("he").map(|g| g.molar_mass).ok(), Some(4.0026));
        assert_eq!(gas_by_name("Nitrogen").map(|g| g.symbol).ok(), Some("N2"));
        assert!(gas_by_name("unobtainium").is_err());
    }
}
