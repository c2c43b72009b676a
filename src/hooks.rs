//! Per-tick notifications emitted by the engine.
//!
//! Components that follow the simulation (the tracer, the viewer) implement
//! [`StepObserver`] or subscribe a [`TickListener`]. The engine calls them
//! only after a tick has fully finished integrating and resolving
//! collisions, so they always see a consistent snapshot.

use crate::geometry::WallSide;
use crate::histogram::HistogramFrame;
use crate::particles::{ParticleId, ParticleStorage};

/// A collision resolved during a tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollisionEvent {
    Particles { a: ParticleId, b: ParticleId },
    Wall { particle: ParticleId, side: WallSide },
}

impl CollisionEvent {
    pub fn involves(&self, id: ParticleId) -> bool {
        match *self {
            CollisionEvent::Particles { a, b } => a == id || b == id,
            CollisionEvent::Wall { particle, .. } => particle == id,
        }
    }
}

/// Read-only view of the engine handed to observers after each tick.
#[derive(Debug, Clone, Copy)]
pub struct TickContext<'a> {
    /// Number of the tick that just completed, starting at 1.
    pub tick: u64,
    pub particles: &'a ParticleStorage,
    /// Every collision resolved during this tick, across all substeps.
    pub collisions: &'a [CollisionEvent],
}

/// Typed hook a component registers with the engine.
pub trait StepObserver {
    /// Called once per completed tick, after integration and collision
    /// resolution.
    fn on_tick(&mut self, ctx: &TickContext<'_>);

    /// Called for each collision of the tick, after [`StepObserver::on_tick`].
    fn on_collision(&mut self, tick: u64, event: &CollisionEvent);
}

/// Summary handed to external listeners at the end of a tick.
#[derive(Debug, Clone)]
pub struct TickReport {
    pub tick: u64,
    pub particle_count: usize,
    pub collision_count: usize,
    pub kinetic_energy: f64,
    /// Set on ticks where the histogram was sampled.
    pub histogram: Option<HistogramFrame>,
    /// Factor applied by the thermostat on this tick, if it fired.
    pub thermostat_scale: Option<f64>,
}

/// Callback for "tick completed" notifications.
pub type TickListener = Box<dyn FnMut(&TickReport) + Send>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn involves_matches_either_participant() {
        let pp = CollisionEvent::Particles { a: 3, b: 9 };
        assert!(pp.involves(3) && pp.involves(9) && !pp.involves(4));
        let pw = CollisionEvent::Wall { particle: 5, side: WallSide::Left };
        assert!(pw.involves(5) && !pw.involves(3));
    }
}
