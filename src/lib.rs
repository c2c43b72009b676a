//! Two-dimensional hard-disk gas for exploring the Maxwell–Boltzmann
//! speed distribution.
//!
//! The [`Simulation`] engine owns a box of equal disks, integrates them with
//! elastic wall and disk collisions, keeps the energy steady with a
//! [`Thermostat`], follows a single particle with the [`Tracer`] and turns
//! the velocities into a smoothed speed histogram.

pub mod collisions;
pub mod config;
pub mod distributions;
pub mod error;
pub mod geometry;
pub mod histogram;
pub mod hooks;
pub mod metrics;
pub mod particles;
pub mod physics;
pub mod simulation;
pub mod thermostat;
pub mod tracer;
pub mod viewer;

pub use config::SimConfig;
pub use distributions::DistributionMode;
pub use error::{Error, Result};
pub use geometry::CanvasSize;
pub use hooks::{CollisionEvent, StepObserver, TickContext, TickListener, TickReport};
pub use particles::{Particle, ParticleId, ParticleStorage};
pub use physics::UnitScale;
pub use simulation::{InitialParams, Readout, SimState, Simulation};
pub use thermostat::Thermostat;
pub use tracer::{Tracer, TracerMode, TracerRecord, TracerSnapshot};
