//! Speed histograms and their time smoothing.
//!
//! A [`HistogramFrame`] holds raw counts for one sampling tick. Bin geometry
//! follows the current temperature and molar mass: the range covers
//! `max_factor` σ of the 2D Rayleigh distribution. Frames are kept in a
//! short [`HistogramHistory`] and blended with an exponentially weighted
//! moving average into a probability density.

use crate::physics::{self, UnitScale};
use std::collections::VecDeque;

/// The histogram range never shrinks below this many pixels per frame.
pub const MIN_HISTOGRAM_RANGE: f64 = 10.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HistogramBin {
    /// Speed at the bin centre, pixels per frame.
    pub center: f64,
    pub count: usize,
}

/// Raw counts for one sampling tick.
#[derive(Debug, Clone, PartialEq)]
pub struct HistogramFrame {
    pub bin_width: f64,
    pub bins: Vec<HistogramBin>,
}

impl HistogramFrame {
    pub fn len(&self) -> usize {
        self.bins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bins.is_empty()
    }

    /// Sum of all counts.
    pub fn total(&self) -> usize {
        self.bins.iter().map(|b| b.count).sum()
    }

    /// Upper edge of the last bin.
    pub fn max_speed(&self) -> f64 {
        self.bin_width * self.bins.len() as f64
    }

    pub fn centers(&self) -> impl Iterator<Item = f64> + '_ {
        self.bins.iter().map(|b| b.center)
    }
}

/// A point of a density curve: speed in pixels per frame, density per
/// pixel-per-frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DensityPoint {
    pub speed: f64,
    pub density: f64,
}

/// Bin geometry for a temperature and molar mass: `(bin_width, max_speed)`.
pub fn bin_geometry(
    temperature: f64,
    molar_mass: f64,
    units: &UnitScale,
    bin_count: usize,
    max_factor: f64,
) -> (f64, f64) {
    let bin_count = bin_count.max(1);
    let sigma_px = units.sigma_2d_px(temperature, molar_mass);
    let max_speed = MIN_HISTOGRAM_RANGE.max(sigma_px * max_factor);
    (max_speed / bin_count as f64, max_speed)
}

/// Buckets speeds into `bin_count` equal bins. Speeds past the range land in
/// the last bin, so the counts always add up to the number of speeds.
pub fn sample_histogram(
    speeds: impl IntoIterator<Item = f64>,
    temperature: f64,
    molar_mass: f64,
    units: &UnitScale,
    bin_count: usize,
    max_factor: f64,
) -> HistogramFrame {
    let bin_count = bin_count.max(1);
    let (bin_width, _) = bin_geometry(temperature, molar_mass, units, bin_count, max_factor);
    let mut counts = vec![0usize; bin_count];
    for speed in speeds {
        // NaN casts to 0 and +inf saturates, both end up in range.
        let idx = ((speed / bin_width).floor().max(0.0) as usize).min(bin_count - 1);
        counts[idx] += 1;
    }
    HistogramFrame {
        bin_width,
        bins: counts
            .into_iter()
            .enumerate()
            .map(|(i, count)| HistogramBin {
                center: (i as f64 + 0.5) * bin_width,
                count,
            })
            .collect(),
    }
}

/// Bounded FIFO of recent frames.
#[derive(Debug, Clone)]
pub struct HistogramHistory {
    frames: VecDeque<HistogramFrame>,
    capacity: usize,
}

impl HistogramHistory {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            frames: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn push(&mut self, frame: HistogramFrame) {
        while self.frames.len() >= self.capacity {
            self.frames.pop_front();
        }
        self.frames.push_back(frame);
    }

    pub fn clear(&mut self) {
        self.frames.clear();
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn latest(&self) -> Option<&HistogramFrame> {
        self.frames.back()
    }

    /// Oldest first.
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &HistogramFrame> + ExactSizeIterator {
        self.frames.iter()
    }
}

/// EWMA of the history converted to a probability density.
///
/// Frame `f` (0 = oldest) gets weight `alpha·(1-alpha)^(frames-1-f)`, and the
/// weights are normalised to sum to one. Counts are divided by
/// `particle_count · bin_width`. Bin centres and width come from the newest
/// frame; the caller clears the history whenever the geometry changes.
pub fn smooth(history: &HistogramHistory, particle_count: usize, alpha: f64) -> Vec<DensityPoint> {
    let Some(template) = history.latest() else {
        return Vec::new();
    };
    let n_bins = template.len();
    if n_bins == 0 {
        return Vec::new();
    }
    let frames = history.len();
    let alpha = if alpha.is_finite() { alpha.clamp(f64::MIN_POSITIVE, 1.0) } else { 0.3 };

    let weights: Vec<f64> = (0..frames)
        .map(|f| alpha * (1.0 - alpha).powi((frames - 1 - f) as i32))
        .collect();
    let wsum: f64 = weights.iter().sum();

    let mut ewma = vec![0.0; n_bins];
    for (frame, &w) in history.iter().zip(&weights) {
        let wf = if wsum > 0.0 { w / wsum } else { 0.0 };
        for (acc, bin) in ewma.iter_mut().zip(&frame.bins) {
            *acc += wf * bin.count as f64;
        }
    }

    let denom = particle_count as f64 * template.bin_width;
    template
        .bins
        .iter()
        .zip(ewma)
        .map(|(bin, c)| DensityPoint {
            speed: bin.center,
            density: if denom > 0.0 { c / denom } else { 0.0 },
        })
        .collect()
}

/// Speed of the highest smoothed density, converted to m/s.
pub fn simulated_vp(smoothed: &[DensityPoint], units: &UnitScale) -> Option<f64> {
    let mut best = smoothed.first()?;
    for p in smoothed {
        if p.density > best.density {
            best = p;
        }
    }
    Some(units.px_per_frame_to_mps(best.speed))
}

/// Shannon entropy of the smoothed distribution divided by `ln(bins)`, so a
/// flat distribution scores 1.
pub fn distribution_entropy(smoothed: &[DensityPoint]) -> Option<f64> {
    if smoothed.is_empty() {
        return None;
    }
    let total: f64 = smoothed.iter().map(|p| p.density).filter(|&d| d > 0.0).sum();
    if total <= 0.0 {
        return Some(0.0);
    }
    let entropy: f64 = smoothed
        .iter()
        .filter(|p| p.density > 0.0)
        .map(|p| {
            let q = p.density / total;
            -q * q.ln()
        })
        .sum();
    let max_entropy = (smoothed.len() as f64).ln();
    Some(if max_entropy > 0.0 { entropy / max_entropy } else { 0.0 })
}

/// Theoretical 2D Rayleigh density at the given speeds.
pub fn rayleigh_curve(
    speeds: impl IntoIterator<Item = f64>,
    temperature: f64,
    molar_mass: f64,
    units: &UnitScale,
) -> Vec<DensityPoint> {
    let sigma = units.sigma_2d_px(temperature, molar_mass);
    speeds
        .into_iter()
        .map(|v| DensityPoint {
            speed: v,
            density: physics::rayleigh_density(v, sigma),
        })
        .collect()
}

/// 3D Maxwell–Boltzmann reference density at the given speeds.
pub fn maxwell_reference_curve(
    speeds: impl IntoIterator<Item = f64>,
    temperature: f64,
    molar_mass: f64,
    units: &UnitScale,
) -> Vec<DensityPoint> {
    let vp = units.vp_px(temperature, molar_mass);
    speeds
        .into_iter()
        .map(|v| DensityPoint {
            speed: v,
            density: physics::maxwell_density_3d(v, vp),
        })
        .collect()
}

/// Distribution of individual free path lengths, pixels.
#[derive(Debug, Clone, PartialEq)]
pub struct FreePathHistogram {
    pub bin_width: f64,
    pub counts: Vec<usize>,
}

impl FreePathHistogram {
    /// Lower and upper edge of bin `i`.
    pub fn bin_range(&self, i: usize) -> (f64, f64) {
        (i as f64 * self.bin_width, (i + 1) as f64 * self.bin_width)
    }

    /// Index of the bin containing `length`, clamped to the last bin.
    pub fn bin_of(&self, length: f64) -> Option<usize> {
        if self.counts.is_empty() {
            return None;
        }
        Some(((length / self.bin_width).floor().max(0.0) as usize).min(self.counts.len() - 1))
    }
}

/// Bins the newest `window` samples. The range reaches the longest sample
/// but never less than 100 px.
pub fn free_path_histogram(samples: &[f64], bin_width: f64, window: usize) -> Option<FreePathHistogram> {
    if samples.is_empty() || !(bin_width > 0.0) {
        return None;
    }
    let recent = &samples[samples.len().saturating_sub(window.max(1))..];
    let longest = recent.iter().copied().filter(|v| v.is_finite()).fold(100.0_f64, f64::max);
    let n_bins = ((longest / bin_width).ceil() as usize).max(1);
    let mut hist = FreePathHistogram {
        bin_width,
        counts: vec![0; n_bins],
    };
    for &len in recent {
        if let Some(i) = hist.bin_of(len) {
            hist.counts[i] += 1;
        }
    }
    Some(hist)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn frame_from(counts: &[usize], bin_width: f64) -> HistogramFrame {
        HistogramFrame {
            bin_width,
            bins: counts
                .iter()
                .enumerate()
                .map(|(i, &count)| HistogramBin { center: (i as f64 + 0.5) * bin_width, count })
                .collect(),
        }
    }

    #[test]
    fn nitrogen_geometry_uses_range_floor() {
        let units = UnitScale::default();
        let sigma_px = units.sigma_2d_px(300.0, 28.0134);
        assert!((sigma_px * 4.0 - 8.97).abs() < 0.02);
        // 4σ is below the 10 px/frame floor.
        let (width, max) = bin_geometry(300.0, 28.0134, &units, 60, 4.0);
        assert_eq!(max, 10.0);
        assert_relative_eq!(width, 10.0 / 60.0);
        // Helium is fast enough to lift the range above the floor.
        let (width, max) = bin_geometry(300.0, 4.0026, &units, 60, 4.0);
        assert_relative_eq!(max, units.sigma_2d_px(300.0, 4.0026) * 4.0);
        assert_relative_eq!(width, max / 60.0);
    }

    #[test]
    fn counts_add_up_and_overflow_goes_to_last_bin() {
        let units = UnitScale::default();
        let speeds = [0.0, 0.05, 5.0, 9.99, 10.0, 1e9, f64::NAN];
        let frame = sample_histogram(speeds, 300.0, 28.0134, &units, 60, 4.0);
        assert_eq!(frame.len(), 60);
        assert_eq!(frame.total(), speeds.len());
        assert_eq!(frame.bins[59].count, 3);
        assert_eq!(frame.bins[0].count, 3);
        assert_relative_eq!(frame.bins[0].center, frame.bin_width / 2.0);
    }

    #[test]
    fn history_is_bounded() {
        let mut h = HistogramHistory::new(3);
        for k in 0..5 {
            h.push(frame_from(&[k], 1.0));
        }
        assert_eq!(h.len(), 3);
        let firsts: Vec<usize> = h.iter().map(|f| f.bins[0].count).collect();
        assert_eq!(firsts, vec![2, 3, 4]);
    }

    #[test]
    fn smoothing_constant_input_gives_frame_density() {
        let mut h = HistogramHistory::new(15);
        let frame = frame_from(&[10, 30, 60], 0.5);
        for _ in 0..20 {
            h.push(frame.clone());
        }
        let out = smooth(&h, 100, 0.3);
        assert_eq!(out.len(), 3);
        for (p, expected) in out.iter().zip([10.0, 30.0, 60.0]) {
            assert_relative_eq!(p.density, expected / (100.0 * 0.5), max_relative = 1e-12);
        }
        // Densities integrate to one.
        let area: f64 = out.iter().map(|p| p.density * 0.5).sum();
        assert_relative_eq!(area, 1.0, max_relative = 1e-12);
    }

    #[test]
    fn smoothing_weights_favor_recent_frames() {
        let mut h = HistogramHistory::new(15);
        h.push(frame_from(&[0, 10], 1.0));
        h.push(frame_from(&[10, 0], 1.0));
        let out = smooth(&h, 10, 0.3);
        // weights 0.3·0.7 and 0.3, normalised: 0.7/1.7 and 1/1.7
        assert_relative_eq!(out[0].density, 1.0 / 1.7, max_relative = 1e-12);
        assert_relative_eq!(out[1].density, 0.7 / 1.7, max_relative = 1e-12);
    }

    #[test]
    fn empty_history_gives_empty_curve() {
        assert!(smooth(&HistogramHistory::new(5), 100, 0.3).is_empty());
        assert_eq!(simulated_vp(&[], &UnitScale::default()), None);
        assert_eq!(distribution_entropy(&[]), None);
    }

    #[test]
    fn peak_and_entropy() {
        let units = UnitScale::default();
        let pts = [
            DensityPoint { speed: 0.75, density: 0.1 },
            DensityPoint { speed: 2.25, density: 0.5 },
            DensityPoint { speed: 3.75, density: 0.2 },
        ];
        assert_relative_eq!(simulated_vp(&pts, &units).unwrap_or_default(), 300.0);
        let flat = [DensityPoint { speed: 0.0, density: 1.0 }; 4];
        assert_relative_eq!(distribution_entropy(&flat).unwrap_or_default(), 1.0);
        let spike = [
            DensityPoint { speed: 0.0, density: 1.0 },
            DensityPoint { speed: 1.0, density: 0.0 },
        ];
        assert_eq!(distribution_entropy(&spike), Some(0.0));
    }

    #[test]
    fn free_path_bins() {
        let samples = [5.0, 15.0, 18.0, 250.0];
        let h = free_path_histogram(&samples, 10.0, 500).expect("histogram");
        assert_eq!(h.counts.len(), 25);
        assert_eq!(h.counts[0], 1);
        assert_eq!(h.counts[1], 2);
        assert_eq!(h.counts[24], 1);
        assert_eq!(h.counts.iter().sum::<usize>(), 4);

        let windowed = free_path_histogram(&samples, 10.0, 2).expect("histogram");
        assert_eq!(windowed.counts.iter().sum::<usize>(), 2);
        assert_eq!(windowed.counts.len(), 25);
        assert!(free_path_histogram(&[], 10.0, 10).is_none());
    }
}
