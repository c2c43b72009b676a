//! Interactive eframe front end.
//!
//! The viewer only drives the engine through its public operations: one
//! tick per frame while running, parameter widgets mapped onto the update
//! calls, and a click on the box to pick the traced particle. Charts are
//! rebuilt at most [`CHART_REFRESH_HZ`] times per second.

use crate::distributions::DistributionMode;
use crate::histogram::{DensityPoint, FreePathHistogram};
use crate::physics::GASES;
use crate::simulation::{Readout, SimState, Simulation};
use crate::tracer::{ConvergencePoint, TracerMode};
use eframe::egui::{self, Color32, Pos2, Sense, Stroke, Vec2};
use egui_plot::{Bar, BarChart, Legend, Line, Plot, PlotPoints};
use std::time::{Duration, Instant};

pub const CHART_REFRESH_HZ: f64 = 5.0;

const PARTICLE_COLOR: Color32 = Color32::from_rgb(90, 160, 230);
const TRACED_COLOR: Color32 = Color32::from_rgb(240, 80, 60);

/// Lets an update through at most once per `interval`.
#[derive(Debug, Clone)]
pub struct ChartThrottle {
    interval: Duration,
    last: Option<Instant>,
}

impl ChartThrottle {
    pub fn new(hz: f64) -> Self {
        let hz = if hz.is_finite() && hz > 0.0 { hz } else { CHART_REFRESH_HZ };
        Self {
            interval: Duration::from_secs_f64(1.0 / hz),
            last: None,
        }
    }

    /// `true` if enough time has passed since the last accepted call.
    pub fn ready(&mut self, now: Instant) -> bool {
        match self.last {
            Some(last) if now.saturating_duration_since(last) < self.interval => false,
            _ => {
                self.last = Some(now);
                true
            }
        }
    }

    /// Makes the next call pass.
    pub fn invalidate(&mut self) {
        self.last = None;
    }
}

/// Everything the charts draw, refreshed by the throttle.
#[derive(Default)]
struct ChartData {
    smoothed: Vec<[f64; 2]>,
    rayleigh: Vec<[f64; 2]>,
    maxwell: Vec<[f64; 2]>,
    readout: Option<Readout>,
    free_paths: Option<FreePathHistogram>,
    convergence: Vec<[f64; 2]>,
}

/// Widget values; applied to the engine when they change.
struct Controls {
    particle_count: usize,
    temperature: f64,
    gas: usize,
    mode: DistributionMode,
    thermostat: bool,
}

pub struct ViewerApp {
    sim: Simulation,
    controls: Controls,
    throttle: ChartThrottle,
    charts: ChartData,
}

impl ViewerApp {
    pub fn new(sim: Simulation) -> Self {
        let gas = GASES
            .iter()
            .position(|g| (g.molar_mass - sim.molar_mass()).abs() < 1e-9)
            .unwrap_or(2);
        let controls = Controls {
            particle_count: sim.particles().len(),
            temperature: sim.temperature(),
            gas,
            mode: sim.mode(),
            thermostat: sim.thermostat().config().enabled,
        };
        Self {
            sim,
            controls,
            throttle: ChartThrottle::new(CHART_REFRESH_HZ),
            charts: ChartData::default(),
        }
    }

    fn refresh_charts(&mut self) {
        let to_points = |pts: Vec<DensityPoint>| -> Vec<[f64; 2]> {
            pts.into_iter().map(|p| [p.speed, p.density]).collect()
        };
        self.charts.smoothed = to_points(self.sim.smoothed_histogram());
        self.charts.rayleigh = to_points(self.sim.rayleigh_curve());
        self.charts.maxwell = to_points(self.sim.maxwell_reference_curve());
        self.charts.readout = Some(self.sim.readout());
        self.charts.free_paths = self.sim.free_path_histogram();
        let units = *self.sim.units();
        self.charts.convergence = self
            .sim
            .tracer_snapshot()
            .convergence
            .iter()
            .map(|&ConvergencePoint { collision_count, mean_free_path }| {
                [collision_count as f64, units.pixels_to_meters(mean_free_path)]
            })
            .collect();
    }

    fn controls_panel(&mut self, ui: &mut egui::Ui) {
        ui.heading("Gas");
        let (min, max) = (self.sim.config().world.min_particles, self.sim.config().world.max_particles);
        let c = &mut self.controls;

        if ui
            .add(egui::Slider::new(&mut c.temperature, 50.0..=1000.0).text("Temperature (K)"))
            .drag_stopped()
        {
            self.sim.update_particle_temperature(c.temperature);
        }
        if ui
            .add(egui::Slider::new(&mut c.particle_count, min..=max).text("Particles"))
            .drag_stopped()
        {
            self.sim.update_particle_count(c.particle_count);
        }

        let previous_gas = c.gas;
        egui::ComboBox::from_label("Species")
            .selected_text(GASES[c.gas].symbol)
            .show_ui(ui, |ui| {
                for (i, gas) in GASES.iter().enumerate() {
                    ui.selectable_value(&mut c.gas, i, format!("{} ({} g/mol)", gas.symbol, gas.molar_mass));
                }
            });
        if c.gas != previous_gas {
            self.sim.set_molar_mass(GASES[c.gas].molar_mass);
        }

        let previous_mode = c.mode;
        egui::ComboBox::from_label("Initial distribution")
            .selected_text(c.mode.as_str())
            .show_ui(ui, |ui| {
                for mode in DistributionMode::ALL {
                    ui.selectable_value(&mut c.mode, mode, mode.as_str());
                }
            });
        if c.mode != previous_mode {
            self.sim.update_initial_distribution_mode(c.mode);
        }

        if ui.checkbox(&mut c.thermostat, "Thermostat").changed() {
            self.sim.set_thermostat_enabled(c.thermostat);
        }

        ui.separator();
        ui.horizontal(|ui| {
            match self.sim.state() {
                SimState::Running => {
                    if ui.button("Pause").clicked() {
                        self.sim.pause();
                    }
                }
                _ => {
                    if ui.button("Start").clicked() {
                        self.sim.start();
                    }
                }
            }
            if ui.button("Step").clicked() {
                self.sim.step();
            }
            if ui.button("Reset").clicked() {
                self.sim
                    .reset(Some(self.controls.particle_count), Some(self.controls.temperature));
                self.throttle.invalidate();
            }
        });

        ui.separator();
        ui.heading("Tracer");
        let label = match self.sim.tracer_mode() {
            TracerMode::Inactive => "Trace a particle",
            TracerMode::Selecting => "Cancel (click a particle)",
            TracerMode::Active => "Stop tracing",
        };
        ui.horizontal(|ui| {
            if ui.button(label).clicked() {
                self.sim.toggle_tracer();
            }
            if self.sim.tracer_mode() == TracerMode::Active && ui.button("Reset stats").clicked() {
                self.sim.reset_tracer_stats();
            }
        });

        ui.separator();
        if let Some(r) = &self.charts.readout {
            readout_grid(ui, r);
        }
    }

    fn box_panel(&mut self, ui: &mut egui::Ui) {
        let canvas = self.sim.canvas();
        let avail = ui.available_size();
        let scale = (avail.x as f64 / canvas.width).min(avail.y as f64 / canvas.height).max(0.01);
        let size = Vec2::new((canvas.width * scale) as f32, (canvas.height * scale) as f32);
        let (response, painter) = ui.allocate_painter(size, Sense::click());
        let origin = response.rect.min;
        let to_screen = |x: f64, y: f64| Pos2::new(origin.x + (x * scale) as f32, origin.y + (y * scale) as f32);

        painter.rect_stroke(response.rect, 0.0, Stroke::new(2.0, Color32::GRAY));

        let snapshot = self.sim.tracer_snapshot();
        if snapshot.record.trail.len() > 1 {
            let points: Vec<Pos2> = snapshot.record.trail.iter().map(|&(x, y)| to_screen(x, y)).collect();
            painter.add(egui::Shape::line(points, Stroke::new(1.0, TRACED_COLOR.gamma_multiply(0.6))));
        }

        let r = (self.sim.radius() * scale) as f32;
        let traced = snapshot.record.traced.filter(|_| snapshot.mode == TracerMode::Active);
        for p in self.sim.particles().iter() {
            let color = if Some(p.id) == traced { TRACED_COLOR } else { PARTICLE_COLOR };
            painter.circle_filled(to_screen(p.x, p.y), r, color);
        }

        if response.clicked() {
            if let Some(pos) = response.interact_pointer_pos() {
                let x = (pos.x - origin.x) as f64 / scale;
                let y = (pos.y - origin.y) as f64 / scale;
                if let Some(id) = self.sim.select_tracer_at(x, y) {
                    log::debug!("picked particle {id} at ({x:.1}, {y:.1})");
                    self.throttle.invalidate();
                }
            }
        }
    }

    fn charts_panel(&self, ui: &mut egui::Ui) {
        ui.label("Speed distribution (px/frame)");
        Plot::new("speed_distribution")
            .height(260.0)
            .legend(Legend::default())
            .allow_scroll(false)
            .show(ui, |plot_ui| {
                plot_ui.line(Line::new(PlotPoints::from(self.charts.smoothed.clone())).name("simulated"));
                plot_ui.line(Line::new(PlotPoints::from(self.charts.rayleigh.clone())).name("2D Rayleigh"));
                plot_ui.line(Line::new(PlotPoints::from(self.charts.maxwell.clone())).name("3D Maxwell"));
            });

        if let Some(h) = &self.charts.free_paths {
            ui.label("Free path lengths (px)");
            let bars: Vec<Bar> = h
                .counts
                .iter()
                .enumerate()
                .map(|(i, &n)| {
                    let (lo, hi) = h.bin_range(i);
                    Bar::new((lo + hi) / 2.0, n as f64).width(h.bin_width)
                })
                .collect();
            Plot::new("free_paths")
                .height(160.0)
                .allow_scroll(false)
                .show(ui, |plot_ui| plot_ui.bar_chart(BarChart::new(bars)));
        }

        if !self.charts.convergence.is_empty() {
            ui.label("Mean free path (m) vs collisions");
            Plot::new("mfp_convergence")
                .height(160.0)
                .allow_scroll(false)
                .show(ui, |plot_ui| {
                    plot_ui.line(Line::new(PlotPoints::from(self.charts.convergence.clone())));
                });
        }
    }
}

fn readout_grid(ui: &mut egui::Ui, r: &Readout) {
    let opt = |v: Option<f64>, digits: usize| v.map_or_else(|| "-".to_string(), |v| format!("{v:.digits$}"));
    egui::Grid::new("readout").striped(true).show(ui, |ui| {
        ui.label("Time");
        ui.label(format!("{:.1} s", r.elapsed_seconds));
        ui.end_row();
        ui.label("T effective");
        ui.label(format!("{} K", opt(r.effective_temperature, 1)));
        ui.end_row();
        ui.label("vp sim / theory");
        ui.label(format!("{} / {:.1} m/s", opt(r.simulated_vp, 1), r.theoretical_vp));
        ui.end_row();
        ui.label("vrms sim / theory");
        ui.label(format!("{} / {:.1} m/s", opt(r.simulated_vrms, 1), r.theoretical_vrms));
        ui.end_row();
        ui.label("KE avg sim / theory");
        ui.label(format!(
            "{} / {:.3e} J",
            r.average_kinetic_energy_j.map_or_else(|| "-".to_string(), |v| format!("{v:.3e}")),
            r.theoretical_average_kinetic_energy_j
        ));
        ui.end_row();
        ui.label("Entropy");
        ui.label(opt(r.entropy, 3));
        ui.end_row();
        ui.label("Relative pressure");
        ui.label(format!("{:.2}", r.relative_pressure));
        ui.end_row();
        ui.label("MFP sim / theory");
        ui.label(format!(
            "{} / {} m",
            opt(r.simulated_mean_free_path_m, 3),
            opt(r.theoretical_mean_free_path_m, 3)
        ));
        ui.end_row();
    });
}

impl eframe::App for ViewerApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.sim.tick();
        if self.throttle.ready(Instant::now()) {
            self.refresh_charts();
        }

        egui::SidePanel::left("controls").show(ctx, |ui| self.controls_panel(ui));
        egui::SidePanel::right("charts")
            .resizable(true)
            .min_width(320.0)
            .show(ctx, |ui| self.charts_panel(ui));
        egui::CentralPanel::default().show(ctx, |ui| self.box_panel(ui));

        ctx.request_repaint();
    }
}

/// Opens the window and blocks until it is closed.
pub fn run(sim: Simulation) -> eframe::Result<()> {
    let options = eframe::NativeOptions::default();
    eframe::run_native(
        "Maxwell–Boltzmann gas",
        options,
        Box::new(|_cc| Ok(Box::new(ViewerApp::new(sim)))),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn throttle_limits_refresh_rate() {
        let mut t = ChartThrottle::new(5.0);
        let t0 = Instant::now();
        assert!(t.ready(t0));
        assert!(!t.ready(t0 + Duration::from_millis(100)));
        assert!(!t.ready(t0 + Duration::from_millis(199)));
        assert!(t.ready(t0 + Duration::from_millis(200)));
        t.invalidate();
        assert!(t.ready(t0 + Duration::from_millis(201)));
    }
}
