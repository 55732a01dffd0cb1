//! Clearway - emergency-vehicle traffic clearance coordinator
//!
//! CLI entry point for running scripted scenarios against the engine.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use colored::*;
use eyre::{Context, Result};
use tracing::{debug, info};

use clearway::adapter::{TracingController, spawn_signal_forwarder};
use clearway::cli::{Cli, Command, OutputFormat};
use clearway::clock::spawn_ticker;
use clearway::config::Config;
use clearway::coordinator::Coordinator;
use clearway::domain::{AlertStatus, CorridorStatus, Phase, SignalMode};
use clearway::engine::{Engine, EngineSnapshot, EngineStats};
use clearway::events::spawn_event_recorder;
use clearway::scenario::{Scenario, ScenarioReport, run_scenario, seed};

fn setup_logging(cli_log_level: Option<&str>, config_log_level: Option<&str>) -> Result<()> {
    // Logging isn't initialized yet, so nothing here can be traced
    let log_dir = dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("clearway")
        .join("logs");

    fs::create_dir_all(&log_dir).context("Failed to create log directory")?;

    // Priority: CLI --log-level > config file > INFO
    let level = match cli_log_level.or(config_log_level) {
        Some(s) => match s.to_uppercase().as_str() {
            "TRACE" => tracing::Level::TRACE,
            "DEBUG" => tracing::Level::DEBUG,
            "INFO" => tracing::Level::INFO,
            "WARN" | "WARNING" => tracing::Level::WARN,
            "ERROR" => tracing::Level::ERROR,
            _ => {
                eprintln!("Warning: Unknown log-level '{}', defaulting to INFO", s);
                tracing::Level::INFO
            }
        },
        None => tracing::Level::INFO,
    };

    let log_file = fs::File::create(log_dir.join("clearway.log")).context("Failed to create log file")?;

    tracing_subscriber::fmt()
        .with_writer(log_file)
        .with_ansi(false)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .init();

    info!("Logging initialized (level: {:?})", level);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load log level from config file early (before full config load)
    let config_log_level = Config::load_log_level(cli.config.as_ref());
    setup_logging(cli.log_level.as_deref(), config_log_level.as_deref()).context("Failed to setup logging")?;

    let config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;
    config.validate().context("Invalid configuration")?;

    debug!(command = ?cli.command, "main: dispatching command");
    match cli.command {
        Command::Simulate {
            scenario,
            ticks,
            realtime,
            events,
            format,
        } => cmd_simulate(config, &scenario, ticks, realtime, events.as_deref(), format).await,
        Command::Run {
            scenario,
            duration,
            format,
        } => cmd_run(config, &scenario, duration, format).await,
        Command::Config => cmd_config(&config),
    }
}

async fn cmd_simulate(
    config: Config,
    scenario_path: &Path,
    ticks: Option<u64>,
    realtime: bool,
    events: Option<&Path>,
    format: OutputFormat,
) -> Result<()> {
    debug!(?scenario_path, ?ticks, realtime, ?events, "cmd_simulate: called");
    let scenario = Scenario::load(scenario_path)?;
    let ticks = ticks.unwrap_or_else(|| scenario.last_action_tick() + 1);
    let timing = config.signals.timing();
    let pace = realtime.then(|| config.coordinator.tick_interval());

    let coordinator = Coordinator::new(Engine::with_defaults(config));
    let handle = coordinator.handle();
    let bus = coordinator.event_bus();
    let forwarder = spawn_signal_forwarder(bus.clone(), Arc::new(TracingController), Some(handle.clone()));
    let recorder = events.map(|path| spawn_event_recorder(bus.clone(), path)).transpose()?;
    drop(bus);
    let task = tokio::spawn(coordinator.run());

    seed(&handle, &scenario, &timing).await?;
    let report = run_scenario(&handle, &scenario, ticks, pace).await?;

    handle.shutdown().await?;
    task.await.context("Coordinator task panicked")?;
    let forwarded = forwarder.await.context("Signal forwarder panicked")?;
    info!(forwarded, "Signal commands forwarded");
    if let Some(recorder) = recorder {
        let written = recorder.await.context("Event recorder panicked")?;
        info!(written, "Events recorded");
    }

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
        OutputFormat::Text => print_report(&report),
    }
    Ok(())
}

async fn cmd_run(config: Config, scenario_path: &Path, duration: Option<u64>, format: OutputFormat) -> Result<()> {
    debug!(?scenario_path, ?duration, "cmd_run: called");
    let scenario = Scenario::load(scenario_path)?;
    let timing = config.signals.timing();
    let period = config.coordinator.tick_interval();

    let coordinator = Coordinator::new(Engine::with_defaults(config));
    let handle = coordinator.handle();
    let forwarder = spawn_signal_forwarder(
        coordinator.event_bus(),
        Arc::new(TracingController),
        Some(handle.clone()),
    );
    let task = tokio::spawn(coordinator.run());

    seed(&handle, &scenario, &timing).await?;
    let ticker = spawn_ticker(handle.clone(), period);
    println!("{} Running {} (Ctrl-C to stop)", "▶".green(), scenario.name.cyan());

    match duration {
        Some(secs) => tokio::time::sleep(Duration::from_secs(secs)).await,
        None => tokio::signal::ctrl_c().await.context("Failed to listen for Ctrl-C")?,
    }

    let snapshot = handle.snapshot().await?;
    let stats = handle.stats().await?;
    handle.shutdown().await?;
    task.await.context("Coordinator task panicked")?;
    let ticks = ticker.await.context("Ticker panicked")?;
    let forwarded = forwarder.await.context("Signal forwarder panicked")?;
    info!(ticks, forwarded, "Run finished");

    match format {
        OutputFormat::Json => println!(
            "{}",
            serde_json::to_string_pretty(&serde_json::json!({ "snapshot": snapshot, "stats": stats }))?
        ),
        OutputFormat::Text => {
            print_snapshot(&snapshot);
            print_stats(&stats);
        }
    }
    Ok(())
}

fn cmd_config(config: &Config) -> Result<()> {
    debug!("cmd_config: called");
    print!("{}", serde_yaml::to_string(config).context("Failed to render configuration")?);
    Ok(())
}

fn print_report(report: &ScenarioReport) {
    println!(
        "Scenario {} after {} ticks: {} actions applied",
        report.name.cyan(),
        report.ticks,
        report.actions_applied
    );
    for failure in &report.failures {
        println!(
            "  {} tick {} {}: {}",
            "✗".red(),
            failure.at_tick,
            failure.action.yellow(),
            failure.error
        );
    }
    println!();
    print_snapshot(&report.snapshot);
    print_stats(&report.stats);
}

fn print_snapshot(snapshot: &EngineSnapshot) {
    println!("{}", "Signals".bold());
    for signal in &snapshot.signals {
        let phase = match signal.phase {
            Phase::Green => signal.phase.to_string().green(),
            Phase::Yellow => signal.phase.to_string().yellow(),
            Phase::Red => signal.phase.to_string().red(),
        };
        let mode = match signal.mode {
            SignalMode::Normal => signal.mode.to_string().dimmed(),
            _ => signal.mode.to_string().magenta(),
        };
        let link = if signal.connected { "" } else { " offline" };
        println!(
            "  {:<8} {:<7} {:<10} {:>4}s  {}{}",
            signal.id,
            phase,
            mode,
            signal.phase_time_remaining,
            signal.location,
            link.red()
        );
    }

    let corridors = snapshot.corridors.iter().chain(snapshot.finished_corridors.iter());
    println!("{}", "Corridors".bold());
    for corridor in corridors {
        let status = match corridor.status {
            CorridorStatus::Active => corridor.status.to_string().green(),
            CorridorStatus::Clearing => corridor.status.to_string().yellow(),
            CorridorStatus::Completed => corridor.status.to_string().dimmed(),
            CorridorStatus::Aborted => corridor.status.to_string().red(),
        };
        println!(
            "  {:<12} {:<10} {:<12} {:>4}s  {}",
            corridor.id,
            status,
            corridor.vehicle_type,
            corridor.clearance_remaining,
            corridor.members.join(" > ")
        );
    }

    println!("{}", "Alerts".bold());
    for snapshot in &snapshot.alerts {
        let status = match snapshot.status {
            AlertStatus::Acknowledged => snapshot.status.to_string().green(),
            AlertStatus::Delivered => snapshot.status.to_string().yellow(),
            AlertStatus::Sent => snapshot.status.to_string().red(),
        };
        let alert = &snapshot.alert;
        println!(
            "  {:<12} {:<9} {:<12} {} {}/{} acked",
            alert.id,
            alert.class,
            status,
            alert.location,
            alert.acked_by().len(),
            alert.recipient_ids().len()
        );
    }
    println!();
}

fn print_stats(stats: &EngineStats) {
    println!("{}", "Stats".bold());
    println!("  ticks                  {}", stats.ticks);
    println!(
        "  signals                {} ({} connected, {} in override)",
        stats.total_signals, stats.connected_signals, stats.signals_in_override
    );
    println!(
        "  corridors              {} active, {} completed, {} aborted",
        stats.active_corridors, stats.completed_corridors, stats.aborted_corridors
    );
    println!("  cleared intersections  {}", stats.cleared_intersections);
    println!(
        "  alerts                 {} sent, {} acknowledged, {} units alerted",
        stats.alerts_sent, stats.alerts_acknowledged, stats.units_alerted
    );
    println!("  vehicles detected      {}", stats.vehicles_detected);
    println!("  units available        {}/{}", stats.available_units, stats.total_units);
}
