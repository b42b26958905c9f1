//! `ironclad` – operator CLI for the Ironclad safety stack.
//!
//! This binary runs a simulated robot under the safety controller:
//!
//! 1. Loads `~/.ironclad/config.toml` (or `--config <path>`), writing the
//!    built-in demo robot there on first run.
//! 2. Registers every simulated driver's disarm with the
//!    [`SafetyController`].
//! 3. Each cycle, advances the scene and publishes new contacts on the error
//!    bus.  An environment contact is `Critical` and triggers a sweep.
//! 4. Prints per-component status whenever a sweep finishes.
//! 5. Intercepts **Ctrl-C** to publish an `EmergencyStop`, waits for the
//!    resulting sweep, and exits.

mod config;
mod scene;
mod telemetry;

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use colored::Colorize;
use ironclad_hal::{RegistryError, SimRegistry};
use ironclad_kernel::{SafetyController, SafetyControllerState, SafetyHandle, SweepReport, SweepTrigger};
use ironclad_middleware::ErrorBus;
use ironclad_types::{ComponentPath, InvalidError, RobotError, SafetyError, StateError};
use thiserror::Error;
use tokio::sync::Notify;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::{RecvError, TryRecvError};
use tokio::time::MissedTickBehavior;
use tracing::{error, info, warn};

use crate::config::{Config, ConfigError};
use crate::scene::SimulatedScene;

#[derive(Error, Debug)]
enum RunError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    State(#[from] StateError),

    #[error(transparent)]
    Path(#[from] InvalidError),

    #[error(transparent)]
    Robot(#[from] RobotError),

    #[error("Failed to start the async runtime: {0}")]
    Runtime(#[from] std::io::Error),
}

#[derive(Debug, Default, PartialEq)]
struct Args {
    config: Option<PathBuf>,
    help: bool,
}

impl Args {
    fn parse(mut raw: impl Iterator<Item = String>) -> Result<Self, String> {
        let mut args = Args::default();
        while let Some(arg) = raw.next() {
            match arg.as_str() {
                "-h" | "--help" => args.help = true,
                "-c" | "--config" => match raw.next() {
                    Some(path) => args.config = Some(PathBuf::from(path)),
                    None => return Err(format!("{arg} needs a path")),
                },
                other => return Err(format!("unknown argument {other:?}")),
            }
        }
        Ok(args)
    }
}

fn main() -> ExitCode {
    // Held for the whole process: dropping it flushes exported spans.
    let _guard = telemetry::init_tracing("ironclad");

    let args = match Args::parse(std::env::args().skip(1)) {
        Ok(args) => args,
        Err(e) => {
            eprintln!("{}: {e}", "Error".red());
            print_usage();
            return ExitCode::from(2);
        }
    };
    if args.help {
        print_usage();
        return ExitCode::SUCCESS;
    }

    print_banner();

    let result = load_config(&args).and_then(|cfg| {
        let runtime = tokio::runtime::Runtime::new()?;
        runtime.block_on(run(cfg))
    });
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "ironclad stopped");
            eprintln!("{}: {e}", "Error".red().bold());
            ExitCode::FAILURE
        }
    }
}

fn load_config(args: &Args) -> Result<Config, RunError> {
    if let Some(path) = &args.config {
        return config::load_from(path)?
            .ok_or_else(|| ConfigError::Missing { path: path.clone() }.into());
    }

    let path = config::config_path();
    if let Some(cfg) = config::load_from(&path)? {
        println!("  Config loaded from {}", path.display().to_string().bold());
        return Ok(cfg);
    }

    let mut cfg = Config::demo()?;
    config::apply_env_overrides(&mut cfg);
    match config::save_to(&cfg, &path) {
        Ok(()) => println!(
            "  {} No config found; demo robot written to {}",
            "✓".green().bold(),
            path.display().to_string().bold()
        ),
        Err(e) => warn!(error = %e, "demo config not saved; running it from memory"),
    }
    Ok(cfg)
}

async fn run(cfg: Config) -> Result<(), RunError> {
    let robot = ComponentPath::parse(&cfg.robot)?;
    let bus = ErrorBus::new(cfg.intake_capacity());
    let (controller, handle) = SafetyController::new(cfg.safety.clone(), &bus);
    let controller_task = tokio::spawn(controller.run());
    let mut sweeps = handle.subscribe_sweeps();

    let hardware = SimRegistry::from_config(&cfg.hardware).build();
    let armed = hardware.register_with(&handle, &robot).await?;
    let mut scene = SimulatedScene::new(
        robot.child("collision_monitor")?,
        &cfg.scene,
        cfg.motions.clone(),
    )?;

    info!(
        robot = %robot,
        components = armed.len(),
        pairs = cfg.scene.pairs.len(),
        cycle_ms = cfg.cycle_ms,
        "ironclad armed"
    );
    println!(
        "  {} component(s) armed under {}.  Press {} for an emergency stop.\n",
        armed.len(),
        robot.to_string().bold(),
        "Ctrl-C".bold().yellow()
    );

    let stop = Arc::new(Notify::new());
    install_ctrlc(bus.clone(), robot.clone(), Arc::clone(&stop));

    let cycle = cfg.cycle();
    let mut ticker = tokio::time::interval(cycle);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = stop.notified() => break,
            report = sweeps.recv() => match report {
                Ok(report) => {
                    scene.halt();
                    print_report(&report, &handle).await;
                }
                Err(RecvError::Lagged(missed)) => warn!(missed, "sweep reports skipped"),
                Err(RecvError::Closed) => break,
            },
            _ = ticker.tick() => {
                scene.step(cycle);
                match scene.publish_new_contacts(&bus) {
                    Ok(0) => {}
                    Ok(contacts) => info!(contacts, "new contacts published"),
                    Err(e) => warn!(error = %e, "contact record not delivered"),
                }
            }
        }
    }

    // The emergency stop is already on the bus; this joins or follows its
    // sweep.
    let outcome = handle.disarm_all().await;
    scene.halt();
    let report = match &outcome {
        Ok(report) => Some(report.clone()),
        Err(RobotError::Safety(SafetyError::DisarmFailed { .. })) => latest_report(&mut sweeps),
        Err(_) => None,
    };
    if let Some(report) = report {
        println!("\n  {}", "Final status".bold());
        print_report(&report, &handle).await;
    }

    if let Err(e) = handle.shutdown().await {
        warn!(error = %e, "safety controller already stopped");
    }
    if let Err(e) = controller_task.await {
        error!(error = %e, "safety controller task failed");
    }
    outcome?;
    println!("{}", "  ✓ Exiting Ironclad.".green());
    Ok(())
}

/// The most recent report still buffered in `sweeps`.
fn latest_report(sweeps: &mut broadcast::Receiver<SweepReport>) -> Option<SweepReport> {
    let mut latest = None;
    loop {
        match sweeps.try_recv() {
            Ok(report) => latest = Some(report),
            Err(TryRecvError::Lagged(_)) => continue,
            Err(_) => return latest,
        }
    }
}

fn install_ctrlc(bus: ErrorBus, robot: ComponentPath, stop: Arc<Notify>) {
    let requested = AtomicBool::new(false);
    let result = ctrlc::set_handler(move || {
        if requested.swap(true, Ordering::SeqCst) {
            eprintln!("{}", "  Second Ctrl-C – exiting without waiting.".red().bold());
            std::process::exit(130);
        }
        println!();
        println!("{}", "⚠  Ctrl-C received – emergency stop …".yellow().bold());

        let stop_error = SafetyError::EmergencyStop {
            reason: "operator Ctrl-C".to_string(),
        };
        match bus.raise(robot.clone(), stop_error) {
            Ok(_) => println!("{}", "  ✓ EmergencyStop published to the error bus.".green()),
            Err(e) => eprintln!("{}: {e}", "  EmergencyStop not delivered".red()),
        }
        stop.notify_one();
    });
    if let Err(e) = result {
        warn!(error = %e, "Failed to install Ctrl-C handler; emergency stop on Ctrl-C will not be available");
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Output
// ─────────────────────────────────────────────────────────────────────────────

fn describe_trigger(trigger: &SweepTrigger) -> String {
    match trigger {
        SweepTrigger::Critical { source, .. } => format!("critical error from {source}"),
        SweepTrigger::IntakeLagged { missed } => format!("{missed} unseen error record(s)"),
        SweepTrigger::Explicit => "explicit request".to_string(),
    }
}

async fn print_report(report: &SweepReport, handle: &SafetyHandle) {
    let elapsed = (report.finished_at - report.started_at).num_milliseconds();
    println!(
        "  {} {} ({}, {elapsed} ms)",
        "■ Sweep".bold().red(),
        report.id.to_string().dimmed(),
        describe_trigger(&report.trigger)
    );
    for outcome in &report.outcomes {
        match &outcome.result {
            Ok(()) => println!("    {} {:<32} {}", "✓".green(), outcome.component, "DISARMED".green()),
            Err(reason) => println!(
                "    {} {:<32} {} {}",
                "✗".red().bold(),
                outcome.component,
                "DISARM FAILED".red().bold(),
                reason
            ),
        }
    }

    match handle.snapshot().await {
        Ok(SafetyControllerState {
            armed_components, ..
        }) => {
            for component in armed_components {
                println!("    {} {:<32} {}", "•".yellow(), component, "ARMED".yellow());
            }
        }
        Err(e) => warn!(error = %e, "status snapshot unavailable"),
    }

    match report.aggregate_error() {
        None => println!("  {}\n", "All components disarmed.".green().bold()),
        Some(err) => println!(
            "  {} {}\n",
            "Manual intervention required:".red().bold(),
            err
        ),
    }
}

fn print_banner() {
    println!();
    println!("{}", r#"   ___                  _         _ "#.bold().cyan());
    println!("{}", r#"  |_ _|_ _ ___ _ _  __| |__ _ __| |"#.bold().cyan());
    println!("{}", r#"   | || '_/ _ \ ' \/ _| / _` / _` |"#.bold().cyan());
    println!("{}", r#"  |___|_| \___/_||_\__|_\__,_\__,_|"#.bold().cyan());
    println!();
    println!(
        "  {} {}",
        "Ironclad".bold(),
        format!("v{}", env!("CARGO_PKG_VERSION")).dimmed()
    );
    println!("  Robot safety controller");
    println!();
}

fn print_usage() {
    println!("Usage: ironclad [--config <path>]");
    println!();
    println!("  -c, --config <path>   Load this config instead of ~/.ironclad/config.toml");
    println!("  -h, --help            Show this help");
}
