//! # RM Control Unit
//!
//! Loads one robot's TOML configuration, performs RT setup and runs the
//! control loop until SIGINT or SIGTERM. Without a CAN backend the frames
//! go to an in-memory recording transport, which makes this binary a
//! dry-run harness for configurations.

use clap::{ArgAction, Parser};
use rm_control_unit::bus::RecordingBus;
use rm_control_unit::config::load_config;
use rm_control_unit::cycle::{ControlUnit, CycleRunner, rt_setup};
use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// RM Control Unit: multi-rate robot control loop
#[derive(Parser, Debug)]
#[command(name = "rm_control_unit")]
#[command(version)]
#[command(about = "Deterministic control loop for chassis, gimbal, shooter and arm")]
struct Args {
    /// Robot configuration TOML.
    #[arg(long, short, default_value = "config/infantry_mecanum.toml")]
    config: PathBuf,

    /// CPU core to pin the RT thread to.
    #[arg(long, default_value_t = 1)]
    cpu_core: usize,

    /// SCHED_FIFO priority.
    #[arg(long, default_value_t = 80)]
    rt_priority: i32,

    /// Stop after this many base ticks (0 = run until signalled).
    #[arg(long, default_value_t = 0)]
    cycles: u64,

    /// Raise log verbosity (-v debug, -vv trace).
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,

    /// Output logs in JSON format.
    #[arg(long)]
    json: bool,
}

fn main() {
    let args = Args::parse();

    let cfg = match load_config(&args.config) {
        Ok(cfg) => cfg,
        Err(e) => {
            setup_tracing(&args, "info");
            error!("FATAL: {e}");
            process::exit(1);
        }
    };
    setup_tracing(&args, cfg.log_level.as_directive());

    info!("RM Control Unit v{} starting...", env!("CARGO_PKG_VERSION"));

    if let Err(e) = run(&args, cfg) {
        error!("FATAL: {e}");
        process::exit(1);
    }

    info!("RM Control Unit shutdown complete");
}

fn run(
    args: &Args,
    cfg: rm_common::control_unit::config::RobotConfig,
) -> Result<(), Box<dyn std::error::Error>> {
    info!(
        robot = %cfg.name,
        chassis_ms = cfg.periods.chassis_ms,
        gimbal_ms = cfg.periods.gimbal_ms,
        arm_ms = cfg.periods.arm_ms,
        "config OK"
    );

    let unit = ControlUnit::new(cfg)?;

    rt_setup(args.cpu_core, args.rt_priority)?;
    info!(
        cpu_core = args.cpu_core,
        priority = args.rt_priority,
        rt = cfg!(feature = "rt"),
        "control thread prepared"
    );

    // SIGINT and SIGTERM end the loop at the next tick boundary.
    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();
    ctrlc::set_handler(move || {
        info!("Received shutdown signal");
        r.store(false, Ordering::SeqCst);
    })?;

    let mut runner = CycleRunner::new(unit, RecordingBus::new().discarding());
    info!("entering control loop");
    let result = runner.run(args.cycles, &running);

    let stats = runner.stats;
    info!(
        cycles = stats.cycle_count,
        min_ns = stats.min_cycle_ns,
        avg_ns = stats.avg_cycle_ns(),
        max_ns = stats.max_cycle_ns,
        overruns = stats.overruns,
        frames = runner.bus.total_sent(),
        "control loop stopped"
    );
    result.map_err(|e| Box::new(e) as Box<dyn std::error::Error>)
}

/// Verbosity flags win over the configured level; `RUST_LOG` wins over both.
fn setup_tracing(args: &Args, configured: &str) {
    let level = match args.verbose {
        0 => configured,
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    if args.json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .compact()
            .init();
    }
}
