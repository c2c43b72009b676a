//! Disk–disk collision detection and elastic resolution.
//!
//! A uniform grid with cells one diameter wide limits the pair checks to
//! neighbouring cells. Each cell is compared with itself and four of its
//! eight neighbours, which visits every adjacent pair exactly once.

use crate::particles::ParticleStorage;

/// Half of the 3×3 neighbourhood; the mirrored offsets are covered when the
/// neighbour cell takes its own turn.
const NEIGHBOUR_OFFSETS: [(isize, isize); 4] = [(1, 0), (0, 1), (1, 1), (-1, 1)];

/// Uniform grid of particle indices, rebuilt every pass.
#[derive(Debug, Default)]
pub struct CollisionGrid {
    cell_size: f64,
    cols: usize,
    rows: usize,
    cell_start: Vec<usize>,
    entries: Vec<usize>,
    cell_of: Vec<usize>,
}

impl CollisionGrid {
    /// Buckets every particle by cell using a counting sort.
    pub fn rebuild(&mut self, particles: &ParticleStorage, width: f64, height: f64, cell_size: f64) {
        self.cell_size = cell_size.max(1e-6);
        self.cols = ((width / self.cell_size).ceil() as usize).max(1);
        self.rows = ((height / self.cell_size).ceil() as usize).max(1);
        let n_cells = self.cols * self.rows;

        let (cell_size, cols, rows) = (self.cell_size, self.cols, self.rows);
        self.cell_of.clear();
        self.cell_of.extend((0..particles.len()).map(|i| {
            let (x, y) = particles.position(i);
            cell_index(cell_size, cols, rows, x, y)
        }));

        self.cell_start.clear();
        self.cell_start.resize(n_cells + 1, 0);
        for &c in &self.cell_of {
            self.cell_start[c + 1] += 1;
        }
        for c in 0..n_cells {
            self.cell_start[c + 1] += self.cell_start[c];
        }

        let mut fill = self.cell_start.clone();
        self.entries.clear();
        self.entries.resize(particles.len(), 0);
        for (i, &c) in self.cell_of.iter().enumerate() {
            self.entries[fill[c]] = i;
            fill[c] += 1;
        }
    }

    fn cell(&self, c: usize) -> &[usize] {
        &self.entries[self.cell_start[c]..self.cell_start[c + 1]]
    }

    /// Candidate pairs `(i, j)` with `i` and `j` in the same or adjacent cells.
    pub fn candidate_pairs(&self) -> Vec<(usize, usize)> {
        let mut pairs = Vec::new();
        for row in 0..self.rows {
            for col in 0..self.cols {
                let here = self.cell(row * self.cols + col);
                for (a, &i) in here.iter().enumerate() {
                    for &j in &here[a + 1..] {
                        pairs.push((i, j));
                    }
                }
                for (dc, dr) in NEIGHBOUR_OFFSETS {
                    let (nc, nr) = (col as isize + dc, row as isize + dr);
                    if nc < 0 || nc >= self.cols as isize || nr >= self.rows as isize {
                        continue;
                    }
                    let there = self.cell(nr as usize * self.cols + nc as usize);
                    for &i in here {
                        for &j in there {
                            pairs.push((i, j));
                        }
                    }
                }
            }
        }
        pairs
    }
}

fn cell_index(cell_size: f64, cols: usize, rows: usize, x: f64, y: f64) -> usize {
    let clamp = |v: f64, n: usize| -> usize {
        if v.is_finite() && v > 0.0 {
            ((v / cell_size) as usize).min(n - 1)
        } else {
            0
        }
    };
    clamp(y, rows) * cols + clamp(x, cols)
}

/// Resolves every overlapping, approaching pair and returns the index pairs
/// whose velocities were exchanged.
///
/// Equal masses and radii: the normal velocity components are swapped,
/// which conserves momentum and kinetic energy exactly. Overlap is removed
/// by pushing both disks apart along the line of centres.
pub fn resolve_particle_collisions(
    particles: &mut ParticleStorage,
    grid: &mut CollisionGrid,
    radius: f64,
    width: f64,
    height: f64,
) -> Vec<(usize, usize)> {
    let diameter = radius * 2.0;
    grid.rebuild(particles, width, height, diameter);

    let mut hits = Vec::new();
    for (i, j) in grid.candidate_pairs() {
        if resolve_pair(particles, i, j, diameter) {
            hits.push((i.min(j), i.max(j)));
        }
    }
    hits
}

/// Elastic collision of two equal disks. Returns `true` if the velocities
/// changed.
pub fn resolve_pair(particles: &mut ParticleStorage, i: usize, j: usize, diameter: f64) -> bool {
    let dx = particles.x[j] - particles.x[i];
    let dy = particles.y[j] - particles.y[i];
    let dist2 = dx * dx + dy * dy;
    if !(dist2 < diameter * diameter) {
        return false; // apart, or NaN
    }
    let dist = dist2.sqrt();
    if dist == 0.0 {
        return false; // perfect overlap => no usable normal
    }

    let nx = dx / dist;
    let ny = dy / dist;

    // push them apart
    let half_overlap = 0.5 * (diameter - dist);
    particles.x[i] -= nx * half_overlap;
    particles.y[i] -= ny * half_overlap;
    particles.x[j] += nx * half_overlap;
    particles.y[j] += ny * half_overlap;

    let v1n = particles.vx[i] * nx + particles.vy[i] * ny;
    let v2n = particles.vx[j] * nx + particles.vy[j] * ny;
    if v1n - v2n <= 0.0 {
        return false; // already separating
    }

    // swap normal components
    particles.vx[i] += (v2n - v1n) * nx;
    particles.vy[i] += (v2n - v1n) * ny;
    particles.vx[j] += (v1n - v2n) * nx;
    particles.vy[j] += (v1n - v2n) * ny;
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::particles::Particle;
    use approx::assert_relative_eq;

    fn storage(ps: &[(f64, f64, f64, f64)]) -> ParticleStorage {
        let mut s = ParticleStorage::default();
        for (id, &(x, y, vx, vy)) in ps.iter().enumerate() {
            s.push(Particle { id: id as u32, x, y, vx, vy });
        }
        s
    }

    #[test]
    fn head_on_collision_swaps_velocities() {
        let mut s = storage(&[(100.0, 100.0, 2.0, 0.0), (109.0, 100.0, -1.0, 0.0)]);
        assert!(resolve_pair(&mut s, 0, 1, 10.0));
        assert_relative_eq!(s.vx[0], -1.0);
        assert_relative_eq!(s.vx[1], 2.0);
        assert_relative_eq!(s.x[1] - s.x[0], 10.0);
    }

    #[test]
    fn oblique_collision_conserves_momentum_and_energy() {
        let mut s = storage(&[(100.0, 100.0, 3.0, 1.0), (107.0, 104.0, -2.0, 0.5)]);
        let (px0, py0) = (s.vx[0] + s.vx[1], s.vy[0] + s.vy[1]);
        let e0 = s.kinetic_energy(1.0);
        assert!(resolve_pair(&mut s, 0, 1, 10.0));
        assert_relative_eq!(s.vx[0] + s.vx[1], px0, epsilon = 1e-12);
        assert_relative_eq!(s.vy[0] + s.vy[1], py0, epsilon = 1e-12);
        assert_relative_eq!(s.kinetic_energy(1.0), e0, epsilon = 1e-12);
    }

    #[test]
    fn separating_pair_keeps_velocities() {
        let mut s = storage(&[(100.0, 100.0, -1.0, 0.0), (108.0, 100.0, 1.0, 0.0)]);
        assert!(!resolve_pair(&mut s, 0, 1, 10.0));
        assert_eq!((s.vx[0], s.vx[1]), (-1.0, 1.0));
    }

    #[test]
    fn grid_finds_pairs_across_cell_borders() {
        // 9.5 and 10.5 fall in different 10 px cells.
        let mut s = storage(&[
            (9.5, 50.0, 1.0, 0.0),
            (10.5, 50.0, -1.0, 0.0),
            (300.0, 300.0, 0.0, 0.0),
        ]);
        let mut grid = CollisionGrid::default();
        let hits = resolve_particle_collisions(&mut s, &mut grid, 5.0, 400.0, 400.0);
        assert_eq!(hits, vec![(0, 1)]);
    }

    #[test]
    fn grid_matches_brute_force() {
        let mut pts = Vec::new();
        for k in 0..60 {
            let x = 5.0 + (k as f64 * 37.0) % 190.0;
            let y = 5.0 + (k as f64 * 53.0) % 190.0;
            pts.push((x, y, 0.0, 0.0));
        }
        let s = storage(&pts);
        let mut grid = CollisionGrid::default();
        grid.rebuild(&s, 200.0, 200.0, 10.0);
        let mut from_grid: Vec<(usize, usize)> = grid
            .candidate_pairs()
            .into_iter()
            .filter(|&(i, j)| {
                let (dx, dy) = (s.x[i] - s.x[j], s.y[i] - s.y[j]);
                dx * dx + dy * dy < 100.0
            })
            .map(|(i, j)| (i.min(j), i.max(j)))
            .collect();
        from_grid.sort_unstable();

        let mut brute = Vec::new();
        for i in 0..s.len() {
            for j in (i + 1)..s.len() {
                let (dx, dy) = (s.x[i] - s.x[j], s.y[i] - s.y[j]);
                if dx * dx + dy * dy < 100.0 {
                    brute.push((i, j));
                }
            }
        }
        assert_eq!(from_grid, brute);
    }
}
