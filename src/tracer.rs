//! Single-particle tracer: follows one particle, records its trail and
//! measures the mean free path from the distance covered between
//! collisions.
//!
//! Mode transitions: `Inactive → Selecting → Active → Inactive`. Entering
//! `Selecting` and leaving `Selecting` for `Active` are driven by the engine,
//! which pauses and resumes the simulation around the selection.

use crate::config::TracerConfig;
use crate::hooks::{CollisionEvent, StepObserver, TickContext};
use crate::particles::ParticleId;
use std::collections::VecDeque;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TracerMode {
    #[default]
    Inactive,
    /// Waiting for the user to pick a particle; the simulation is paused.
    Selecting,
    Active,
}

/// Statistics of the traced particle. Distances are in pixels.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TracerRecord {
    pub traced: Option<ParticleId>,
    pub collision_count: u64,
    pub total_distance: f64,
    /// `total_distance / collision_count`, or 0 before the first collision.
    pub mean_free_path: f64,
    pub distance_since_last_collision: f64,
    /// Oldest first.
    pub trail: VecDeque<(f64, f64)>,
    /// Individual free path lengths, oldest first.
    pub mfp_samples: VecDeque<f64>,
}

/// One point of the mean-free-path convergence curve.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConvergencePoint {
    pub collision_count: u64,
    /// Pixels.
    pub mean_free_path: f64,
}

/// Everything a consumer needs to draw the tracer.
#[derive(Debug, Clone, PartialEq)]
pub struct TracerSnapshot {
    pub mode: TracerMode,
    pub record: TracerRecord,
    pub convergence: Vec<ConvergencePoint>,
}

#[derive(Debug, Clone)]
pub struct Tracer {
    config: TracerConfig,
    mode: TracerMode,
    record: TracerRecord,
    last_position: Option<(f64, f64)>,
    last_collision_tick: Option<u64>,
    convergence: VecDeque<ConvergencePoint>,
}

impl Tracer {
    pub fn new(config: TracerConfig) -> Self {
        Self {
            config,
            mode: TracerMode::Inactive,
            record: TracerRecord::default(),
            last_position: None,
            last_collision_tick: None,
            convergence: VecDeque::new(),
        }
    }

    pub fn mode(&self) -> TracerMode {
        self.mode
    }

    pub fn record(&self) -> &TracerRecord {
        &self.record
    }

    pub fn traced(&self) -> Option<ParticleId> {
        match self.mode {
            TracerMode::Active => self.record.traced,
            _ => None,
        }
    }

    pub fn convergence(&self) -> impl ExactSizeIterator<Item = &ConvergencePoint> {
        self.convergence.iter()
    }

    pub fn snapshot(&self) -> TracerSnapshot {
        TracerSnapshot {
            mode: self.mode,
            record: self.record.clone(),
            convergence: self.convergence.iter().copied().collect(),
        }
    }

    pub fn begin_selection(&mut self) {
        self.clear();
        self.mode = TracerMode::Selecting;
    }

    /// Starts tracing `id`, whose current position is `position`.
    pub fn activate(&mut self, id: ParticleId, position: (f64, f64)) {
        self.clear();
        self.mode = TracerMode::Active;
        self.record.traced = Some(id);
        self.last_position = Some(position);
        log::info!("tracing particle {id}");
    }

    pub fn deactivate(&mut self) {
        self.clear();
        self.mode = TracerMode::Inactive;
    }

    /// Zeroes the statistics but keeps following the same particle from
    /// `position` on.
    pub fn reset_stats(&mut self, position: Option<(f64, f64)>) {
        let traced = self.record.traced;
        self.record = TracerRecord {
            traced,
            ..TracerRecord::default()
        };
        self.convergence.clear();
        self.last_collision_tick = None;
        self.last_position = position;
    }

    fn clear(&mut self) {
        self.record = TracerRecord::default();
        self.convergence.clear();
        self.last_position = None;
        self.last_collision_tick = None;
    }

    fn advance_to(&mut self, position: (f64, f64)) {
        if let Some((lx, ly)) = self.last_position {
            let step = (position.0 - lx).hypot(position.1 - ly);
            if step.is_finite() {
                self.record.distance_since_last_collision += step;
            }
        }
        self.last_position = Some(position);
        push_capped(&mut self.record.trail, position, self.config.max_trail);
    }

    /// Closes the current free path.
    fn record_collision(&mut self) {
        let r = &mut self.record;
        let free_path = r.distance_since_last_collision;
        push_capped(&mut r.mfp_samples, free_path, self.config.max_mfp_samples);
        r.collision_count += 1;
        r.total_distance += free_path;
        r.mean_free_path = r.total_distance / r.collision_count as f64;
        r.distance_since_last_collision = 0.0;
        push_capped(
            &mut self.convergence,
            ConvergencePoint {
                collision_count: r.collision_count,
                mean_free_path: r.mean_free_path,
            },
            self.config.convergence_history,
        );
        log::trace!(
            "tracer collision #{}: free path {free_path:.2}px, mean {:.2}px",
            r.collision_count,
            r.mean_free_path
        );
    }
}

impl StepObserver for Tracer {
    fn on_tick(&mut self, ctx: &TickContext<'_>) {
        let Some(id) = self.traced() else {
            return;
        };
        match ctx.particles.by_id(id) {
            Some(p) => self.advance_to((p.x, p.y)),
            None => {
                log::warn!("traced particle {id} no longer exists, tracer switched off");
                self.deactivate();
            }
        }
    }

    fn on_collision(&mut self, tick: u64, event: &CollisionEvent) {
        let Some(id) = self.traced() else {
            return;
        };
        if !event.involves(id) || self.last_collision_tick == Some(tick) {
            return;
        }
        self.last_collision_tick = Some(tick);
        self.record_collision();
    }
}

fn push_capped<T>(queue: &mut VecDeque<T>, value: T, cap: usize) {
    if cap == 0 {
        return;
    }
    while queue.len() >= cap {
        queue.pop_front();
    }
    queue.push_back(value);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::WallSide;
    use crate::particles::{Particle, ParticleStorage};
    use approx::assert_relative_eq;

    fn one_particle(id: ParticleId, x: f64, y: f64) -> ParticleStorage {
        let mut s = ParticleStorage::default();
        s.push(Particle { id, x, y, vx: 0.0, vy: 0.0 });
        s
    }

    fn tick(tracer: &mut Tracer, n: u64, particles: &ParticleStorage, collisions: &[CollisionEvent]) {
        let ctx = TickContext { tick: n, particles, collisions };
        tracer.on_tick(&ctx);
        for ev in collisions {
            tracer.on_collision(n, ev);
        }
    }

    #[test]
    fn mean_free_path_from_segments() {
        let mut t = Tracer::new(TracerConfig::default());
        t.activate(7, (0.0, 0.0));
        let wall = [CollisionEvent::Wall { particle: 7, side: WallSide::Left }];

        tick(&mut t, 1, &one_particle(7, 3.0, 4.0), &[]);
        tick(&mut t, 2, &one_particle(7, 6.0, 8.0), &wall);
        assert_eq!(t.record().collision_count, 1);
        assert_relative_eq!(t.record().mean_free_path, 10.0);

        tick(&mut t, 3, &one_particle(7, 6.0, 12.0), &wall);
        let r = t.record();
        assert_eq!(r.collision_count, 2);
        assert_relative_eq!(r.total_distance, 14.0);
        assert_relative_eq!(r.mean_free_path, 7.0);
        assert_eq!(r.mfp_samples, VecDeque::from(vec![10.0, 4.0]));
        assert_eq!(r.distance_since_last_collision, 0.0);
        assert_eq!(t.convergence().len(), 2);
    }

    #[test]
    fn collisions_deduplicated_within_a_tick() {
        let mut t = Tracer::new(TracerConfig::default());
        t.activate(1, (0.0, 0.0));
        let both = [
            CollisionEvent::Particles { a: 1, b: 2 },
            CollisionEvent::Wall { particle: 1, side: WallSide::Top },
            CollisionEvent::Particles { a: 3, b: 1 },
        ];
        tick(&mut t, 5, &one_particle(1, 1.0, 0.0), &both);
        assert_eq!(t.record().collision_count, 1);
    }

    #[test]
    fn unrelated_collisions_ignored() {
        let mut t = Tracer::new(TracerConfig::default());
        t.activate(1, (0.0, 0.0));
        tick(&mut t, 1, &one_particle(1, 1.0, 0.0), &[CollisionEvent::Particles { a: 2, b: 3 }]);
        assert_eq!(t.record().collision_count, 0);
        assert_eq!(t.record().mean_free_path, 0.0);
        assert_relative_eq!(t.record().distance_since_last_collision, 1.0);
    }

    #[test]
    fn lost_target_switches_off() {
        let mut t = Tracer::new(TracerConfig::default());
        t.activate(9, (0.0, 0.0));
        tick(&mut t, 1, &one_particle(4, 1.0, 1.0), &[]);
        assert_eq!(t.mode(), TracerMode::Inactive);
        assert_eq!(t.record(), &TracerRecord::default());
    }

    #[test]
    fn trail_and_samples_are_capped() {
        let config = TracerConfig { max_trail: 3, max_mfp_samples: 2, ..Default::default() };
        let mut t = Tracer::new(config);
        t.activate(0, (0.0, 0.0));
        let hit = [CollisionEvent::Wall { particle: 0, side: WallSide::Right }];
        for n in 1..=6u64 {
            tick(&mut t, n, &one_particle(0, n as f64, 0.0), &hit);
        }
        let r = t.record();
        assert_eq!(r.trail.len(), 3);
        assert_eq!(r.trail.back(), Some(&(6.0, 0.0)));
        assert_eq!(r.mfp_samples.len(), 2);
        // Totals still cover every collision, not just the retained samples.
        assert_eq!(r.collision_count, 6);
        assert_relative_eq!(r.mean_free_path, 1.0);
    }

    #[test]
    fn selection_and_reset_stats() {
        let mut t = Tracer::new(TracerConfig::default());
        t.begin_selection();
        assert_eq!(t.mode(), TracerMode::Selecting);
        assert_eq!(t.traced(), None);

        t.activate(2, (0.0, 0.0));
        tick(&mut t, 1, &one_particle(2, 5.0, 0.0), &[CollisionEvent::Wall { particle: 2, side: WallSide::Top }]);
        t.reset_stats(Some((5.0, 0.0)));
        assert_eq!(t.traced(), Some(2));
        assert_eq!(t.record().collision_count, 0);
        assert!(t.record().trail.is_empty());
    }
}
