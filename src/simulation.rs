//! The simulation engine.
//!
//! [`Simulation`] owns the particle set and is the only thing that mutates
//! it. One tick runs `substeps` rounds of
//!
//! 1. position integration and wall reflection (parallel over particles),
//! 2. grid broad phase and elastic disk–disk resolution,
//! 3. clamping every centre back into the interior,
//!
//! then discards non-finite state, feeds the tracer, lets the thermostat
//! correct, samples the histogram and finally notifies listeners. Every
//! consumer therefore sees the state of a completed tick.

use crate::collisions::{self, CollisionGrid};
use crate::config::SimConfig;
use crate::distributions::DistributionMode;
use crate::geometry::{self, Bounds, CanvasSize, Wall, WallContact};
use crate::histogram::{self, DensityPoint, FreePathHistogram, HistogramFrame, HistogramHistory};
use crate::hooks::{CollisionEvent, StepObserver, TickContext, TickListener, TickReport};
use crate::metrics;
use crate::particles::{Particle, ParticleId, ParticleStorage};
use crate::physics::{self, UnitScale};
use crate::thermostat::{PARTICLE_MASS, Thermostat};
use crate::tracer::{Tracer, TracerMode, TracerSnapshot};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;

/// Lifecycle of the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimState {
    Uninitialized,
    Running,
    Paused,
}

/// Physical parameters for [`Simulation::init`] and [`Simulation::reset`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InitialParams {
    pub particle_count: usize,
    /// K
    pub temperature: f64,
    /// g/mol
    pub molar_mass: f64,
    pub mode: DistributionMode,
}

impl Default for InitialParams {
    fn default() -> Self {
        Self::from(&SimConfig::default())
    }
}

impl From<&SimConfig> for InitialParams {
    fn from(config: &SimConfig) -> Self {
        Self {
            particle_count: config.initial.particle_count,
            temperature: config.initial.temperature,
            molar_mass: config.initial.molar_mass,
            mode: config.initial.distribution,
        }
    }
}

/// Measured and reference values for the current state, in SI units.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Readout {
    pub tick: u64,
    pub elapsed_seconds: f64,
    pub particle_count: usize,
    /// Simulation units.
    pub kinetic_energy: f64,
    pub effective_temperature: Option<f64>,
    pub total_kinetic_energy_j: Option<f64>,
    pub average_kinetic_energy_j: Option<f64>,
    pub theoretical_total_kinetic_energy_j: f64,
    pub theoretical_average_kinetic_energy_j: f64,
    pub simulated_vp: Option<f64>,
    pub theoretical_vp: f64,
    pub simulated_vrms: Option<f64>,
    pub theoretical_vrms: f64,
    pub entropy: Option<f64>,
    pub relative_pressure: f64,
    pub simulated_mean_free_path_m: Option<f64>,
    pub theoretical_mean_free_path_m: Option<f64>,
}

pub struct Simulation {
    config: SimConfig,
    units: UnitScale,
    rng: StdRng,
    state: SimState,

    canvas: CanvasSize,
    walls: [Wall; 4],
    bounds: Bounds,
    particles: ParticleStorage,
    next_id: ParticleId,

    temperature: f64,
    molar_mass: f64,
    mode: DistributionMode,

    tick: u64,
    thermostat: Thermostat,
    tracer: Tracer,
    history: HistogramHistory,
    latest_frame: Option<HistogramFrame>,

    grid: CollisionGrid,
    events: Vec<CollisionEvent>,
    listeners: Vec<TickListener>,
}

impl std::fmt::Debug for Simulation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Simulation")
            .field("state", &self.state)
            .field("tick", &self.tick)
            .field("particles", &self.particles.len())
            .field("temperature", &self.temperature)
            .field("molar_mass", &self.molar_mass)
            .field("mode", &self.mode)
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

impl Simulation {
    /// Creates an uninitialized engine. Call [`Simulation::init`] before
    /// ticking.
    /// Sections of `config` that fail [`SimConfig::validate`] are replaced
    /// by their defaults.
    pub fn new(config: SimConfig) -> Self {
        let config = config.sanitized();
        let units = UnitScale::new(config.physics.speed_scale, config.physics.seconds_per_frame);
        let rng = match config.initial.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        let canvas = config.world.canvas().sanitized(config.world.particle_radius);
        let walls = geometry::create_walls(canvas, config.world.wall_thickness);
        let bounds = Bounds::from_walls(&walls, config.world.particle_radius);
        Self {
            units,
            rng,
            state: SimState::Uninitialized,
            canvas,
            walls,
            bounds,
            particles: ParticleStorage::with_capacity(config.world.max_particles),
            next_id: 0,
            temperature: physics::sanitize_temperature(config.initial.temperature),
            molar_mass: physics::sanitize_molar_mass(config.initial.molar_mass),
            mode: config.initial.distribution,
            tick: 0,
            thermostat: Thermostat::new(config.thermostat.clone()),
            tracer: Tracer::new(config.tracer.clone()),
            history: HistogramHistory::new(config.histogram.window),
            latest_frame: None,
            grid: CollisionGrid::default(),
            events: Vec::new(),
            listeners: Vec::new(),
            config,
        }
    }

    /// Builds the walls and the particle set, records the thermostat
    /// baseline and starts running. `on_ready` sees the fresh state.
    pub fn init(&mut self, canvas: CanvasSize, params: InitialParams, on_ready: impl FnOnce(&Simulation)) {
        self.set_canvas(canvas);
        self.mode = params.mode;
        self.rebuild(Some(params.particle_count), params.temperature, params.molar_mass);
        self.state = SimState::Running;
        log::info!(
            "simulation initialized: {} particles, T={} K, M={} g/mol, {} mode, canvas {}x{}",
            self.particles.len(),
            self.temperature,
            self.molar_mass,
            self.mode,
            self.canvas.width,
            self.canvas.height
        );
        on_ready(&*self);
    }

    /// Resumes ticking. An uninitialized engine is first set up from the
    /// configuration.
    pub fn start(&mut self) {
        match self.state {
            SimState::Running => {}
            SimState::Paused => {
                self.state = SimState::Running;
                log::debug!("simulation resumed at tick {}", self.tick);
            }
            SimState::Uninitialized => {
                let params = InitialParams::from(&self.config);
                self.init(self.canvas, params, |_| {});
            }
        }
    }

    /// Stops ticking between two ticks. Pausing twice is harmless.
    pub fn pause(&mut self) {
        if self.state == SimState::Running {
            self.state = SimState::Paused;
            log::debug!("simulation paused at tick {}", self.tick);
        }
    }

    /// Throws away all particles and recreates walls and particles at the
    /// current canvas. Unset arguments keep their current values.
    pub fn reset(&mut self, particle_count: Option<usize>, temperature: Option<f64>) {
        let walls = geometry::create_walls(self.canvas, self.config.world.wall_thickness);
        self.walls = walls;
        self.bounds = Bounds::from_walls(&self.walls, self.radius());
        let count = particle_count.or(Some(self.particles.len()).filter(|&n| n > 0));
        self.rebuild(count, temperature.unwrap_or(self.temperature), self.molar_mass);
        self.state = SimState::Running;
        log::info!(
            "simulation reset: {} particles at {} K",
            self.particles.len(),
            self.temperature
        );
    }

    /// Recreates the walls for a new canvas and pulls every particle inside.
    pub fn resize(&mut self, canvas: CanvasSize) {
        self.set_canvas(canvas);
        let bounds = self.bounds;
        let ParticleStorage { x, y, .. } = &mut self.particles;
        x.par_iter_mut().zip(y.par_iter_mut()).for_each(|(x, y)| {
            (*x, *y) = bounds.clamp(*x, *y);
        });
        log::info!("canvas resized to {}x{}", self.canvas.width, self.canvas.height);
    }

    /// Adds or removes particles to reach `count` (clamped to the configured
    /// bounds). Existing particles are untouched; removal takes the newest.
    pub fn update_particle_count(&mut self, count: usize) {
        let target = self.config.world.clamp_count(count);
        let current = self.particles.len();
        if target == current {
            return;
        }
        if target > current {
            self.spawn(target - current);
        } else {
            self.particles.truncate(target);
            self.drop_lost_tracer();
        }
        self.after_parameter_change();
        log::info!("particle count {current} -> {target}");
    }

    /// Redraws every velocity at `temperature` from the active mode.
    /// Positions are kept.
    pub fn update_particle_temperature(&mut self, temperature: f64) {
        self.temperature = physics::sanitize_temperature(temperature);
        self.resample_velocities();
        self.after_parameter_change();
        log::info!("temperature set to {} K", self.temperature);
    }

    /// Scales every velocity by `sqrt(old/new)`, which keeps the total
    /// kinetic energy in joules (and with it the temperature) fixed across a
    /// change of species. The engine adopts `new_molar_mass`.
    pub fn rescale_velocities_for_gas_change(&mut self, old_molar_mass: f64, new_molar_mass: f64) {
        let old = physics::sanitize_molar_mass(old_molar_mass);
        let new = physics::sanitize_molar_mass(new_molar_mass);
        self.molar_mass = new;
        if old == new {
            return;
        }
        let factor = (old / new).sqrt();
        self.particles.scale_velocities(factor);
        self.after_parameter_change();
        log::info!("gas changed {old} -> {new} g/mol, velocities scaled by {factor:.4}");
    }

    /// Switches species, keeping the temperature.
    pub fn set_molar_mass(&mut self, molar_mass: f64) {
        self.rescale_velocities_for_gas_change(self.molar_mass, molar_mass);
    }

    /// Selects the velocity generator and redraws every velocity with it,
    /// so the gas starts relaxing from the new initial distribution.
    pub fn update_initial_distribution_mode(&mut self, mode: DistributionMode) {
        if mode == self.mode {
            return;
        }
        self.mode = mode;
        self.resample_velocities();
        self.after_parameter_change();
        log::info!("initial distribution mode set to {mode}");
    }

    pub fn set_thermostat_enabled(&mut self, enabled: bool) {
        self.thermostat.set_enabled(enabled);
    }

    /// Runs one tick if the engine is running. Returns whether it did.
    pub fn tick(&mut self) -> bool {
        if self.state != SimState::Running {
            return false;
        }
        self.advance();
        true
    }

    /// Runs exactly one tick regardless of pause. Does nothing before
    /// initialization.
    pub fn step(&mut self) {
        if self.state != SimState::Uninitialized {
            self.advance();
        }
    }

    /// Runs up to `n` ticks, stopping early if the engine leaves the running
    /// state. Returns the number of ticks run.
    pub fn run_ticks(&mut self, n: u64) -> u64 {
        let mut done = 0;
        while done < n && self.tick() {
            done += 1;
        }
        done
    }

    /// Registers a "tick completed" listener.
    pub fn subscribe(&mut self, listener: TickListener) {
        self.listeners.push(listener);
    }

    // ---------------------------------------------------------------------
    // Queries
    // ---------------------------------------------------------------------

    pub fn state(&self) -> SimState {
        self.state
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    pub fn units(&self) -> &UnitScale {
        &self.units
    }

    pub fn particles(&self) -> &ParticleStorage {
        &self.particles
    }

    pub fn canvas(&self) -> CanvasSize {
        self.canvas
    }

    pub fn walls(&self) -> &[Wall; 4] {
        &self.walls
    }

    pub fn bounds(&self) -> Bounds {
        self.bounds
    }

    pub fn radius(&self) -> f64 {
        self.config.world.particle_radius
    }

    pub fn temperature(&self) -> f64 {
        self.temperature
    }

    pub fn molar_mass(&self) -> f64 {
        self.molar_mass
    }

    pub fn mode(&self) -> DistributionMode {
        self.mode
    }

    pub fn tick_count(&self) -> u64 {
        self.tick
    }

    pub fn thermostat(&self) -> &Thermostat {
        &self.thermostat
    }

    /// Simulated time since the last (re)initialization.
    pub fn elapsed_seconds(&self) -> f64 {
        self.units.frames_to_seconds(self.tick as f64) * self.config.world.time_scale
    }

    /// Histogram of the current velocities.
    pub fn speed_distribution_histogram(&self) -> HistogramFrame {
        let h = &self.config.histogram;
        histogram::sample_histogram(
            self.particles.speeds(),
            self.temperature,
            self.molar_mass,
            &self.units,
            h.bin_count,
            h.max_factor,
        )
    }

    /// The most recently sampled frame.
    pub fn latest_histogram(&self) -> Option<&HistogramFrame> {
        self.latest_frame.as_ref()
    }

    /// EWMA density over the recent frames; empty until the first sample.
    pub fn smoothed_histogram(&self) -> Vec<DensityPoint> {
        histogram::smooth(&self.history, self.particles.len(), self.config.histogram.alpha)
    }

    /// Theoretical 2D Rayleigh density at the current bin centres.
    pub fn rayleigh_curve(&self) -> Vec<DensityPoint> {
        let frame = self.speed_distribution_histogram();
        histogram::rayleigh_curve(frame.centers(), self.temperature, self.molar_mass, &self.units)
    }

    /// 3D Maxwell reference density at the current bin centres.
    pub fn maxwell_reference_curve(&self) -> Vec<DensityPoint> {
        let frame = self.speed_distribution_histogram();
        histogram::maxwell_reference_curve(frame.centers(), self.temperature, self.molar_mass, &self.units)
    }

    /// Total kinetic energy in simulation units.
    pub fn kinetic_energy(&self) -> f64 {
        metrics::kinetic_energy(&self.particles, PARTICLE_MASS)
    }

    pub fn effective_temperature(&self) -> Option<f64> {
        metrics::effective_temperature(&self.particles, self.molar_mass, &self.units)
    }

    pub fn readout(&self) -> Readout {
        let smoothed = self.smoothed_histogram();
        let speeds = physics::characteristic_speeds(self.temperature, self.molar_mass);
        let n = self.particles.len();
        let traced = self.tracer.mode() == TracerMode::Active;
        Readout {
            tick: self.tick,
            elapsed_seconds: self.elapsed_seconds(),
            particle_count: n,
            kinetic_energy: self.kinetic_energy(),
            effective_temperature: self.effective_temperature(),
            total_kinetic_energy_j: metrics::total_kinetic_energy_joules(&self.particles, self.molar_mass, &self.units),
            average_kinetic_energy_j: metrics::average_kinetic_energy_joules(
                &self.particles,
                self.molar_mass,
                &self.units,
            ),
            theoretical_total_kinetic_energy_j: metrics::theoretical_total_kinetic_energy(self.temperature, n),
            theoretical_average_kinetic_energy_j: metrics::theoretical_average_kinetic_energy(self.temperature),
            simulated_vp: histogram::simulated_vp(&smoothed, &self.units),
            theoretical_vp: speeds.vp,
            simulated_vrms: metrics::simulated_vrms(&self.particles, &self.units),
            theoretical_vrms: speeds.vrms,
            entropy: histogram::distribution_entropy(&smoothed),
            relative_pressure: metrics::relative_pressure(self.temperature, n),
            simulated_mean_free_path_m: traced
                .then(|| metrics::simulated_mean_free_path(self.tracer.record(), &self.units)),
            theoretical_mean_free_path_m: self.theoretical_mean_free_path(),
        }
    }

    /// Hard-disk mean free path for the current density, meters.
    pub fn theoretical_mean_free_path(&self) -> Option<f64> {
        metrics::theoretical_mean_free_path(
            self.temperature,
            self.molar_mass,
            self.particles.len(),
            self.radius(),
            self.canvas.area(),
            &self.units,
        )
    }

    // ---------------------------------------------------------------------
    // Tracer
    // ---------------------------------------------------------------------

    pub fn tracer_mode(&self) -> TracerMode {
        self.tracer.mode()
    }

    /// Inactive: pause and wait for a selection. Otherwise: stop tracing and
    /// resume.
    pub fn toggle_tracer(&mut self) {
        match self.tracer.mode() {
            TracerMode::Inactive => {
                self.tracer.begin_selection();
                self.pause();
                log::info!("tracer waiting for a particle");
            }
            TracerMode::Selecting | TracerMode::Active => {
                self.tracer.deactivate();
                self.start();
                log::info!("tracer off");
            }
        }
    }

    /// Picks the particle whose disk contains `(x, y)` while selecting.
    /// On success tracing starts and the simulation resumes.
    pub fn select_tracer_at(&mut self, x: f64, y: f64) -> Option<ParticleId> {
        if self.tracer.mode() != TracerMode::Selecting {
            return None;
        }
        let index = self.particles.nearest_within(x, y, self.radius())?;
        let p = self.particles.get(index)?;
        self.tracer.activate(p.id, (p.x, p.y));
        self.start();
        Some(p.id)
    }

    /// Traces `id` directly, or switches the tracer off with `None`.
    /// Unknown ids switch it off as well.
    pub fn set_traced_particle(&mut self, id: Option<ParticleId>) {
        let was_selecting = self.tracer.mode() == TracerMode::Selecting;
        match id.and_then(|id| self.particles.by_id(id)) {
            Some(p) => self.tracer.activate(p.id, (p.x, p.y)),
            None => {
                if let Some(id) = id {
                    log::warn!("cannot trace particle {id}: no such particle");
                }
                self.tracer.deactivate();
            }
        }
        if was_selecting {
            self.start();
        }
    }

    pub fn tracer_snapshot(&self) -> TracerSnapshot {
        self.tracer.snapshot()
    }

    /// Zeroes the tracer statistics; the same particle stays traced.
    pub fn reset_tracer_stats(&mut self) {
        let position = self
            .tracer
            .traced()
            .and_then(|id| self.particles.by_id(id))
            .map(|p| (p.x, p.y));
        self.tracer.reset_stats(position);
    }

    /// Distribution of the traced particle's recent free paths.
    pub fn free_path_histogram(&self) -> Option<FreePathHistogram> {
        let samples: Vec<f64> = self.tracer.record().mfp_samples.iter().copied().collect();
        histogram::free_path_histogram(
            &samples,
            self.config.tracer.free_path_bin_width,
            self.config.tracer.free_path_window,
        )
    }

    // ---------------------------------------------------------------------
    // Internals
    // ---------------------------------------------------------------------

    fn set_canvas(&mut self, canvas: CanvasSize) {
        self.canvas = canvas.sanitized(self.radius());
        self.walls = geometry::create_walls(self.canvas, self.config.world.wall_thickness);
        self.bounds = Bounds::from_walls(&self.walls, self.radius());
    }

    /// Fresh particle set; resets time, tracer, history and baseline.
    fn rebuild(&mut self, count: Option<usize>, temperature: f64, molar_mass: f64) {
        self.temperature = physics::sanitize_temperature(temperature);
        self.molar_mass = physics::sanitize_molar_mass(molar_mass);
        let count = self
            .config
            .world
            .clamp_count(count.unwrap_or(self.config.initial.particle_count));
        self.particles.clear();
        self.next_id = 0;
        self.spawn(count);
        self.tick = 0;
        self.tracer.deactivate();
        self.history.clear();
        self.latest_frame = None;
        self.thermostat.rebaseline(self.kinetic_energy());
    }

    fn spawn(&mut self, n: usize) {
        let b = self.bounds;
        for _ in 0..n {
            let x = if b.max_x > b.min_x { self.rng.random_range(b.min_x..b.max_x) } else { b.min_x };
            let y = if b.max_y > b.min_y { self.rng.random_range(b.min_y..b.max_y) } else { b.min_y };
            let (vx, vy) = self
                .mode
                .sample(&mut self.rng, self.temperature, self.molar_mass, &self.units);
            self.particles.push(Particle { id: self.next_id, x, y, vx, vy });
            self.next_id = self.next_id.wrapping_add(1);
        }
    }

    fn resample_velocities(&mut self) {
        for i in 0..self.particles.len() {
            let (vx, vy) = self
                .mode
                .sample(&mut self.rng, self.temperature, self.molar_mass, &self.units);
            self.particles.set_velocity(i, vx, vy);
        }
    }

    /// Common tail of every live parameter change.
    fn after_parameter_change(&mut self) {
        self.history.clear();
        self.latest_frame = None;
        self.thermostat.rebaseline(self.kinetic_energy());
    }

    fn drop_lost_tracer(&mut self) {
        if let Some(id) = self.tracer.traced() {
            if !self.particles.contains(id) {
                log::info!("traced particle {id} removed, tracer switched off");
                self.tracer.deactivate();
            }
        }
    }

    fn advance(&mut self) {
        self.events.clear();
        self.discard_non_finite();
        let substeps = self.config.world.substeps.max(1);
        let dt = self.config.world.time_scale / substeps as f64;
        for _ in 0..substeps {
            self.substep(dt);
        }
        self.discard_non_finite();
        self.tick += 1;

        let ctx = TickContext {
            tick: self.tick,
            particles: &self.particles,
            collisions: &self.events,
        };
        self.tracer.on_tick(&ctx);
        for event in &self.events {
            self.tracer.on_collision(self.tick, event);
        }

        let thermostat_scale = self.thermostat.on_tick(&mut self.particles);

        let histogram = if self.tick % self.config.histogram.sample_interval_ticks.max(1) == 0 {
            let frame = self.speed_distribution_histogram();
            self.history.push(frame.clone());
            self.latest_frame = Some(frame.clone());
            Some(frame)
        } else {
            None
        };

        log::trace!(
            "tick {}: {} collisions, E={:.4}",
            self.tick,
            self.events.len(),
            self.kinetic_energy()
        );

        if !self.listeners.is_empty() {
            let report = TickReport {
                tick: self.tick,
                particle_count: self.particles.len(),
                collision_count: self.events.len(),
                kinetic_energy: self.kinetic_energy(),
                histogram,
                thermostat_scale,
            };
            for listener in &mut self.listeners {
                listener(&report);
            }
        }
    }

    fn substep(&mut self, dt: f64) {
        let bounds = self.bounds;

        // integrate + walls, in parallel
        let contacts: Vec<(usize, WallContact)> = {
            let ParticleStorage { x, y, vx, vy, .. } = &mut self.particles;
            x.par_iter_mut()
                .zip(y.par_iter_mut())
                .zip(vx.par_iter_mut())
                .zip(vy.par_iter_mut())
                .enumerate()
                .filter_map(|(i, (((x, y), vx), vy))| {
                    *x += *vx * dt;
                    *y += *vy * dt;
                    bounds.resolve(x, y, vx, vy).map(|c| (i, c))
                })
                .collect()
        };
        for (i, contact) in contacts {
            let particle = self.particles.ids[i];
            self.events
                .extend(contact.sides().map(|side| CollisionEvent::Wall { particle, side }));
        }

        let pairs = collisions::resolve_particle_collisions(
            &mut self.particles,
            &mut self.grid,
            self.config.world.particle_radius,
            self.canvas.width,
            self.canvas.height,
        );
        for (i, j) in pairs {
            self.events.push(CollisionEvent::Particles {
                a: self.particles.ids[i],
                b: self.particles.ids[j],
            });
        }

        // separation may have pushed disks past a wall
        let ParticleStorage { x, y, .. } = &mut self.particles;
        x.par_iter_mut().zip(y.par_iter_mut()).for_each(|(x, y)| {
            (*x, *y) = bounds.clamp(*x, *y);
        });
    }

    /// Zeroes non-finite velocities and drops particles whose position is
    /// no longer finite, so a single bad value cannot poison the sums.
    fn discard_non_finite(&mut self) {
        let mut i = self.particles.len();
        while i > 0 {
            i -= 1;
            let (x, y) = self.particles.position(i);
            if !(x.is_finite() && y.is_finite()) {
                let lost = self.particles.swap_remove(i);
                log::warn!("particle {} left the finite plane and was removed", lost.id);
                continue;
            }
            let (vx, vy) = self.particles.velocity(i);
            if !(vx.is_finite() && vy.is_finite()) {
                log::warn!("particle {} had a non-finite velocity, set to rest", self.particles.ids[i]);
                self.particles.set_velocity(i, 0.0, 0.0);
            }
        }
        self.drop_lost_tracer();
    }

    #[cfg(test)]
    pub(crate) fn particles_mut(&mut self) -> &mut ParticleStorage {
        &mut self.particles
    }
}
