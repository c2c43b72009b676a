//! Particle storage.

/// Stable identifier of a particle within one simulation.
pub type ParticleId = u32;

/// A copy of one particle's state, as handed to consumers.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Particle {
    pub id: ParticleId,
    pub x: f64,
    pub y: f64,
    pub vx: f64,
    pub vy: f64,
}

impl Particle {
    #[inline]
    pub fn speed(&self) -> f64 {
        self.vx.hypot(self.vy)
    }
}

/// Stores the particle data in a **Structure of Arrays** (SoA) layout, which
/// keeps the per-tick position update a straight zip over four slices.
///
/// All particles share the same radius and unit mass, so neither is stored
/// per particle.
#[derive(Debug, Clone, Default)]
pub struct ParticleStorage {
    pub(crate) ids: Vec<ParticleId>,
    /// Per-particle x-coordinate in pixels.
    pub(crate) x: Vec<f64>,
    /// Per-particle y-coordinate in pixels.
    pub(crate) y: Vec<f64>,
    /// Per-particle velocity in the x-direction, pixels per frame.
    pub(crate) vx: Vec<f64>,
    /// Per-particle velocity in the y-direction, pixels per frame.
    pub(crate) vy: Vec<f64>,
}

impl ParticleStorage {
    /// Constructs an empty storage with room for `n` particles.
    pub fn with_capacity(n: usize) -> Self {
        Self {
            ids: Vec::with_capacity(n),
            x: Vec::with_capacity(n),
            y: Vec::with_capacity(n),
            vx: Vec::with_capacity(n),
            vy: Vec::with_capacity(n),
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn push(&mut self, p: Particle) {
        self.ids.push(p.id);
        self.x.push(p.x);
        self.y.push(p.y);
        self.vx.push(p.vx);
        self.vy.push(p.vy);
    }

    /// Drops everything past the first `len` particles.
    pub fn truncate(&mut self, len: usize) {
        self.ids.truncate(len);
        self.x.truncate(len);
        self.y.truncate(len);
        self.vx.truncate(len);
        self.vy.truncate(len);
    }

    /// Removes the particle at `index`; the last particle takes its slot.
    pub fn swap_remove(&mut self, index: usize) -> Particle {
        Particle {
            id: self.ids.swap_remove(index),
            x: self.x.swap_remove(index),
            y: self.y.swap_remove(index),
            vx: self.vx.swap_remove(index),
            vy: self.vy.swap_remove(index),
        }
    }

    pub fn clear(&mut self) {
        self.truncate(0);
    }

    #[inline]
    pub fn get(&self, index: usize) -> Option<Particle> {
        (index < self.len()).then(|| Particle {
            id: self.ids[index],
            x: self.x[index],
            y: self.y[index],
            vx: self.vx[index],
            vy: self.vy[index],
        })
    }

    pub fn index_of(&self, id: ParticleId) -> Option<usize> {
        self.ids.iter().position(|&other| other == id)
    }

    pub fn contains(&self, id: ParticleId) -> bool {
        self.index_of(id).is_some()
    }

    pub fn by_id(&self, id: ParticleId) -> Option<Particle> {
        self.index_of(id).and_then(|i| self.get(i))
    }

    pub fn ids(&self) -> &[ParticleId] {
        &self.ids
    }

    #[inline]
    pub fn velocity(&self, index: usize) -> (f64, f64) {
        (self.vx[index], self.vy[index])
    }

    #[inline]
    pub fn position(&self, index: usize) -> (f64, f64) {
        (self.x[index], self.y[index])
    }

    #[inline]
    pub(crate) fn set_velocity(&mut self, index: usize, vx: f64, vy: f64) {
        self.vx[index] = vx;
        self.vy[index] = vy;
    }

    /// Iterates over `(vx, vy)` pairs.
    pub fn velocities(&self) -> impl ExactSizeIterator<Item = (f64, f64)> + '_ {
        self.vx.iter().copied().zip(self.vy.iter().copied())
    }

    /// Iterates over particle speeds.
    pub fn speeds(&self) -> impl ExactSizeIterator<Item = f64> + '_ {
        self.velocities().map(|(vx, vy)| vx.hypot(vy))
    }

    pub fn iter(&self) -> impl ExactSizeIterator<Item = Particle> + '_ {
        (0..self.len()).map(|i| Particle {
            id: self.ids[i],
            x: self.x[i],
            y: self.y[i],
            vx: self.vx[i],
            vy: self.vy[i],
        })
    }

    /// Multiplies every velocity by `factor`.
    pub(crate) fn scale_velocities(&mut self, factor: f64) {
        self.vx.iter_mut().for_each(|v| *v *= factor);
        self.vy.iter_mut().for_each(|v| *v *= factor);
    }

    /// Sum of ½·m·|v|² with the given per-particle mass.
    pub fn kinetic_energy(&self, mass: f64) -> f64 {
        self.velocities()
            .map(|(vx, vy)| 0.5 * mass * (vx * vx + vy * vy))
            .sum()
    }

    /// Index of the first particle whose disk of `radius` contains `(qx, qy)`,
    /// preferring the closest centre when several overlap the point.
    pub fn nearest_within(&self, qx: f64, qy: f64, radius: f64) -> Option<usize> {
        let r2 = radius * radius;
        (0..self.len())
            .map(|i| {
                let dx = self.x[i] - qx;
                let dy = self.y[i] - qy;
                (i, dx * dx + dy * dy)
            })
            .filter(|&(_, d2)| d2 <= r2)
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(i, _)| i)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn particle(id: ParticleId, x: f64, y: f64, vx: f64, vy: f64) -> Particle {
        Particle { id, x, y, vx, vy }
    }

    #[test]
    fn push_get_and_swap_remove() {
        let mut s = ParticleStorage::with_capacity(3);
        s.push(particle(1, 10.0, 10.0, 1.0, 0.0));
        s.push(particle(2, 20.0, 20.0, 0.0, 2.0));
        s.push(particle(3, 30.0, 30.0, 3.0, 4.0));
        assert_eq!(s.len(), 3);
        assert_eq!(s.by_id(3).map(|p| p.speed()), Some(5.0));

        let removed = s.swap_remove(0);
        assert_eq!(removed.id, 1);
        assert_eq!(s.ids(), &[3, 2]);
        assert!(!s.contains(1));
    }

    #[test]
    fn kinetic_energy_uses_mass() {
        let mut s = ParticleStorage::default();
        s.push(particle(0, 0.0, 0.0, 3.0, 4.0));
        s.push(particle(1, 0.0, 0.0, 1.0, 0.0));
        assert_eq!(s.kinetic_energy(1.0), 13.0);
        assert_eq!(s.kinetic_energy(2.0), 26.0);
    }

    #[test]
    fn nearest_within_picks_closest_hit() {
        let mut s = ParticleStorage::default();
        s.push(particle(0, 100.0, 100.0, 0.0, 0.0));
        s.push(particle(1, 104.0, 100.0, 0.0, 0.0));
        assert_eq!(s.nearest_within(103.0, 100.0, 5.0), Some(1));
        assert_eq!(s.nearest_within(50.0, 50.0, 5.0), None);
    }
}
