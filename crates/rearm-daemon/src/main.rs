//! rearm daemon entry point.
//!
//! Runs a self-cancelling timer on an executor thread and a watchdog that
//! rearms it, until SIGINT/SIGTERM or an optional run duration elapses.

mod diagnostics;
mod signals;

use anyhow::{Context, Result};
use clap::Parser;
use rearm_common::config::TimerConfig;
use rearm_runtime::coordinator::Coordinator;
use rearm_runtime::stop::StopSignal;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};

use crate::diagnostics::DiagnosticsSnapshot;
use crate::signals::SignalHandler;

/// Daemon command-line arguments.
#[derive(Parser, Debug)]
#[command(
    name = "rearm-daemon",
    about = "Self-cancelling periodic timer with an independent rearming watchdog",
    version,
    long_about = None
)]
struct Args {
    /// Path to a timer configuration file (TOML).
    #[arg(long, short = 'c', value_name = "FILE")]
    config: Option<PathBuf>,

    /// Executor period, e.g. "500ms" (overrides config file).
    #[arg(long, value_name = "DURATION", value_parser = humantime::parse_duration)]
    executor_period: Option<Duration>,

    /// Watchdog period, e.g. "1s" (overrides config file).
    #[arg(long, value_name = "DURATION", value_parser = humantime::parse_duration)]
    watchdog_period: Option<Duration>,

    /// Stop after this long instead of waiting for a signal.
    #[arg(long, value_name = "DURATION", value_parser = humantime::parse_duration)]
    run_for: Option<Duration>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, short = 'l', default_value = "info")]
    log_level: String,

    /// Print the final diagnostics snapshot as JSON on stdout.
    #[arg(long)]
    json_summary: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    init_logging(&args.log_level);

    info!(version = env!("CARGO_PKG_VERSION"), "Starting rearm daemon");

    let config = resolve_config(&args)?;

    info!(
        timer = %config.name,
        executor_period = ?config.executor_period,
        watchdog_period = ?config.watchdog_period,
        "Configuration loaded"
    );

    let coordinator = Coordinator::new(config).context("Invalid timer configuration")?;
    let stop = StopSignal::new();

    let started = Instant::now();
    let status_timer = Arc::clone(coordinator.timer());
    let signal_handler = SignalHandler::install(stop.clone(), move || {
        let snapshot = DiagnosticsSnapshot::live(&status_timer, started.elapsed());
        info!(
            health = %snapshot.health,
            state = %snapshot.state,
            fires = snapshot.fires,
            rearms = snapshot.rearms,
            observed_armed = snapshot.observed_armed,
            expiry_failures = snapshot.expiry_failures,
            "Status report"
        );
    })
    .context("Failed to set up signal handlers")?;

    if let Some(run_for) = args.run_for {
        spawn_run_limit(stop.clone(), run_for).context("Failed to start run-duration timer")?;
    }

    let summary = coordinator
        .run(&stop)
        .context("Timer loops failed to run")?;

    let signal_stats = signal_handler.join();
    let snapshot = DiagnosticsSnapshot::finished(&coordinator.config().name, &summary);
    info!(
        health = %snapshot.health,
        fires = snapshot.fires,
        rearms = snapshot.rearms,
        signals = signal_stats.signal_count(),
        status_reports = signal_stats.status_requests(),
        uptime_secs = snapshot.uptime_secs,
        "Daemon shutdown complete"
    );

    if args.json_summary {
        println!(
            "{}",
            snapshot.to_json().context("Failed to render summary")?
        );
    }

    Ok(())
}

/// Initialize logging with the specified log level.
fn init_logging(level: &str) {
    let filter = format!("rearm_daemon={level},rearm_runtime={level},rearm_common={level}");

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&filter)),
        )
        .with_target(true)
        .with_thread_ids(true)
        .init();
}

/// Load configuration from file or use defaults.
///
/// Resolution priority (first existing file wins):
/// 1. Command-line `--config` argument
/// 2. `REARM_CONFIG_PATH` environment variable
/// 3. `/etc/rearm/config.toml` (system path)
/// 4. `config/default.toml` (local development)
/// 5. Built-in defaults
fn load_config(args: &Args) -> Result<TimerConfig> {
    if let Some(config_path) = &args.config {
        info!(?config_path, "Loading config from command-line argument");
        return TimerConfig::from_file(config_path)
            .with_context(|| format!("Failed to load config from {config_path:?}"));
    }

    if let Ok(env_path) = std::env::var("REARM_CONFIG_PATH") {
        let config_path = PathBuf::from(&env_path);
        if config_path.exists() {
            info!(?config_path, "Loading config from REARM_CONFIG_PATH");
            return TimerConfig::from_file(&config_path).with_context(|| {
                format!("Failed to load config from REARM_CONFIG_PATH={env_path:?}")
            });
        }
        warn!(
            path = %env_path,
            "REARM_CONFIG_PATH set but file does not exist, checking other locations"
        );
    }

    for path in ["/etc/rearm/config.toml", "config/default.toml"] {
        let config_path = PathBuf::from(path);
        if config_path.exists() {
            info!(?config_path, "Loading config file");
            return TimerConfig::from_file(&config_path)
                .with_context(|| format!("Failed to load config from {config_path:?}"));
        }
    }

    info!("No config file found, using built-in defaults");
    Ok(TimerConfig::default())
}

/// Load the configuration file, then apply the period flags on top.
fn resolve_config(args: &Args) -> Result<TimerConfig> {
    let mut config = load_config(args)?;
    if let Some(period) = args.executor_period {
        config.executor_period = period;
    }
    if let Some(period) = args.watchdog_period {
        config.watchdog_period = period;
    }
    Ok(config)
}

/// Raise `stop` once `run_for` has elapsed, unless it is raised earlier.
fn spawn_run_limit(stop: StopSignal, run_for: Duration) -> std::io::Result<()> {
    std::thread::Builder::new()
        .name("rearm-run-limit".into())
        .spawn(move || {
            if !stop.wait_timeout(run_for) {
                info!(?run_for, "Run duration elapsed, requesting shutdown");
                stop.request_stop();
            }
        })
        .map(drop)
}
