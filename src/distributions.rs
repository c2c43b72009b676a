//! Initial velocity generators.
//!
//! All three modes are parameterised by the most-probable speed `vp` of the
//! 3D formula, converted to pixels per frame.

use crate::error::Error;
use crate::physics::UnitScale;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use std::fmt;
use std::str::FromStr;

/// Lower cluster of the dual-speed mode, as a fraction of vp.
pub const DUAL_SPEED_LOW: f64 = 0.6;
/// Upper cluster of the dual-speed mode, as a fraction of vp.
pub const DUAL_SPEED_HIGH: f64 = 1.6;

/// How fresh particle velocities are drawn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DistributionMode {
    /// Gaussian components, Rayleigh speeds: already at equilibrium.
    #[default]
    Equilibrium,
    /// Every particle at vp, random direction.
    SingleSpeed,
    /// Half at 0.6·vp, half at 1.6·vp, random direction.
    DualSpeed,
}

impl DistributionMode {
    pub const ALL: [DistributionMode; 3] = [
        DistributionMode::Equilibrium,
        DistributionMode::SingleSpeed,
        DistributionMode::DualSpeed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DistributionMode::Equilibrium => "equilibrium",
            DistributionMode::SingleSpeed => "single_speed",
            DistributionMode::DualSpeed => "dual_speed",
        }
    }

    /// Draws one velocity `(vx, vy)` in pixels per frame.
    pub fn sample(
        &self,
        rng: &mut impl Rng,
        temperature: f64,
        molar_mass: f64,
        units: &UnitScale,
    ) -> (f64, f64) {
        let vp = units.vp_px(temperature, molar_mass);
        match self {
            DistributionMode::Equilibrium => equilibrium_velocity(rng, vp),
            DistributionMode::SingleSpeed => single_speed_velocity(rng, vp),
            DistributionMode::DualSpeed => dual_speed_velocity(rng, vp),
        }
    }
}

impl fmt::Display for DistributionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DistributionMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "equilibrium" | "maxwell" => Ok(DistributionMode::Equilibrium),
            "single_speed" | "single" => Ok(DistributionMode::SingleSpeed),
            "dual_speed" | "dual" => Ok(DistributionMode::DualSpeed),
            _ => Err(Error::UnknownDistributionMode(s.to_string())),
        }
    }
}

/// A pair of independent standard normal samples via Box–Muller.
///
/// `u1` is drawn from (0, 1]; a zero would send `ln` to -inf.
pub fn standard_normal_pair(rng: &mut impl Rng) -> (f64, f64) {
    let mut u1: f64 = rng.random();
    while u1 <= 0.0 {
        u1 = rng.random();
    }
    let u2: f64 = rng.random();
    let r = (-2.0 * u1.ln()).sqrt();
    let theta = 2.0 * PI * u2;
    (r * theta.cos(), r * theta.sin())
}

/// Gaussian components with standard deviation vp/√2.
pub fn equilibrium_velocity(rng: &mut impl Rng, vp_px: f64) -> (f64, f64) {
    let (z1, z2) = standard_normal_pair(rng);
    let std = vp_px / 2.0_f64.sqrt();
    (z1 * std, z2 * std)
}

pub fn single_speed_velocity(rng: &mut impl Rng, vp_px: f64) -> (f64, f64) {
    polar(rng, vp_px)
}

pub fn dual_speed_velocity(rng: &mut impl Rng, vp_px: f64) -> (f64, f64) {
    let factor = if rng.random_bool(0.5) {
        DUAL_SPEED_LOW
    } else {
        DUAL_SPEED_HIGH
    };
    polar(rng, vp_px * factor)
}

fn polar(rng: &mut impl Rng, speed: f64) -> (f64, f64) {
    let angle: f64 = rng.random_range(0.0..(2.0 * PI));
    (speed * angle.cos(), speed * angle.sin())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn parse_and_display_round_trip() {
        for mode in DistributionMode::ALL {
            assert_eq!(mode.as_str().parse::<DistributionMode>().ok(), Some(mode));
        }
        assert_eq!("Dual-Speed".parse::<DistributionMode>().ok(), Some(DistributionMode::DualSpeed));
        assert!("bimodal".parse::<DistributionMode>().is_err());
    }

    /// Replays fixed `next_u64` outputs and counts the draws.
    struct Scripted {
        values: Vec<u64>,
        draws: usize,
    }

    impl rand::RngCore for Scripted {
        fn next_u32(&mut self) -> u32 {
            (self.next_u64() >> 32) as u32
        }

        fn next_u64(&mut self) -> u64 {
            let v = self.values[self.draws];
            self.draws += 1;
            v
        }

        fn fill_bytes(&mut self, dst: &mut [u8]) {
            rand::rand_core::impls::fill_bytes_via_next(self, dst)
        }
    }

    #[test]
    fn zero_u1_is_redrawn() {
        // u64 outputs map to [0, 1) as (v >> 11) * 2^-53: 0, then 0.5, then 0.25.
        let mut rng = Scripted { values: vec![0, 1 << 63, 1 << 62], draws: 0 };
        let (z1, z2) = standard_normal_pair(&mut rng);
        assert_eq!(rng.draws, 3);
        assert!(z1.is_finite() && z2.is_finite());
        // u1 = 0.5, u2 = 0.25: r = sqrt(2 ln 2), theta = pi/2
        assert_relative_eq!(z2, (2.0 * 2.0_f64.ln()).sqrt(), max_relative = 1e-12);
        assert!(z1.abs() < 1e-12);
    }

    #[test]
    fn single_speed_has_constant_magnitude() {
        let mut rng = StdRng::seed_from_u64(7);
        let units = UnitScale::default();
        let vp = units.vp_px(300.0, 28.0134);
        for _ in 0..200 {
            let (vx, vy) = DistributionMode::SingleSpeed.sample(&mut rng, 300.0, 28.0134, &units);
            assert_relative_eq!(vx.hypot(vy), vp, max_relative = 1e-12);
        }
    }

    #[test]
    fn dual_speed_hits_both_clusters() {
        let mut rng = StdRng::seed_from_u64(11);
        let vp = 3.0;
        let (mut low, mut high) = (0, 0);
        for _ in 0..1000 {
            let (vx, vy) = dual_speed_velocity(&mut rng, vp);
            let s = vx.hypot(vy);
            if (s - 0.6 * vp).abs() < 1e-9 {
                low += 1;
            } else if (s - 1.6 * vp).abs() < 1e-9 {
                high += 1;
            } else {
                panic!("unexpected speed {s}");
            }
        }
        assert!(low > 400 && high > 400, "low={low} high={high}");
    }

    #[test]
    fn equilibrium_mean_square_speed_matches_vp() {
        // <vx² + vy²> = 2 · (vp/√2)² = vp²
        let mut rng = StdRng::seed_from_u64(2024);
        let vp = 3.0;
        let n = 20_000;
        let mean_sq: f64 = (0..n)
            .map(|_| {
                let (vx, vy) = equilibrium_velocity(&mut rng, vp);
                vx * vx + vy * vy
            })
            .sum::<f64>()
            / n as f64;
        assert!((mean_sq - vp * vp).abs() / (vp * vp) < 0.05, "mean_sq={mean_sq}");
    }
}
