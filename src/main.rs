use anyhow::{Context, Result};
use clap::Parser;
use maxwell_sim::physics::gas_by_name;
use maxwell_sim::{DistributionMode, InitialParams, SimConfig, Simulation, TickReport, viewer};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// 2D hard-disk gas relaxing toward the Maxwell–Boltzmann distribution.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// YAML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Run without a window and log a summary
    #[arg(long)]
    headless: bool,

    /// Ticks to run in headless mode
    #[arg(long, default_value_t = 3600)]
    ticks: u64,

    /// Temperature in K
    #[arg(short, long)]
    temperature: Option<f64>,

    /// Gas symbol or name (H2, He, N2, O2, Ar, CO2, Xe)
    #[arg(short, long)]
    gas: Option<String>,

    /// Number of particles
    #[arg(short, long)]
    particles: Option<usize>,

    /// Initial distribution: equilibrium, single_speed or dual_speed
    #[arg(short, long)]
    mode: Option<DistributionMode>,

    /// RNG seed for a reproducible run
    #[arg(long)]
    seed: Option<u64>,
}

fn load_config(args: &Args) -> Result<SimConfig> {
    let mut config = match &args.config {
        Some(path) => SimConfig::load(path).with_context(|| format!("loading {}", path.display()))?,
        None => SimConfig::default(),
    };
    if let Some(t) = args.temperature {
        config.initial.temperature = t;
    }
    if let Some(name) = &args.gas {
        config.initial.molar_mass = gas_by_name(name)?.molar_mass;
    }
    if let Some(n) = args.particles {
        config.initial.particle_count = n;
    }
    if let Some(mode) = args.mode {
        config.initial.distribution = mode;
    }
    if args.seed.is_some() {
        config.initial.seed = args.seed;
    }
    Ok(config)
}

fn run_headless(mut sim: Simulation, ticks: u64) {
    let thermostat_hits = Arc::new(AtomicU64::new(0));
    let hits = Arc::clone(&thermostat_hits);
    sim.subscribe(Box::new(move |report: &TickReport| {
        if report.thermostat_scale.is_some() {
            hits.fetch_add(1, Ordering::Relaxed);
        }
        if report.tick % 600 == 0 {
            log::info!(
                "tick {}: {} particles, {} collisions, E={:.3}",
                report.tick,
                report.particle_count,
                report.collision_count,
                report.kinetic_energy
            );
        }
    }));

    let done = sim.run_ticks(ticks);
    let r = sim.readout();
    let show = |v: Option<f64>| v.map_or_else(|| "n/a".to_string(), |v| format!("{v:.2}"));
    log::info!("ran {done} ticks ({:.1} s simulated)", r.elapsed_seconds);
    log::info!(
        "T_eff = {} K (set {} K), vp = {} m/s (theory {:.2}), vrms = {} m/s (theory {:.2})",
        show(r.effective_temperature),
        sim.temperature(),
        show(r.simulated_vp),
        r.theoretical_vp,
        show(r.simulated_vrms),
        r.theoretical_vrms
    );
    log::info!(
        "entropy = {}, relative pressure = {:.2}, thermostat corrections = {}",
        show(r.entropy),
        r.relative_pressure,
        thermostat_hits.load(Ordering::Relaxed)
    );
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();
    let config = load_config(&args)?;

    rayon::ThreadPoolBuilder::new()
        .num_threads(num_cpus::get_physical())
        .build_global()
        .context("building the rayon thread pool")?;

    let mut sim = Simulation::new(config.clone());
    sim.init(config.world.canvas(), InitialParams::from(&config), |s| {
        log::debug!("engine ready: {s:?}");
    });

    if args.headless {
        run_headless(sim, args.ticks);
        Ok(())
    } else {
        viewer::run(sim).map_err(|e| anyhow::anyhow!("viewer failed: {e}"))
    }
}
