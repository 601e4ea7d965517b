//! WattGuard CLI
//!
//! Command-line interface for the WattGuard balance monitor.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use wattguard::alerting::{AnyNotifier, Notifier};
use wattguard::fetch::Fetcher;
use wattguard::monitor::{MonitorLoop, TickReport};
use wattguard::{logging, Config};

/// WattGuard - Prepaid electricity balance monitor
#[derive(Parser)]
#[command(name = "wattguard")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, global = true, env = "WATTGUARD_CONFIG")]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Default)]
enum Commands {
    /// Monitor the balance until interrupted (default)
    #[default]
    Run,

    /// Run a single balance check and print the result
    Check,

    /// Validate the configuration and print every problem found
    Validate,

    /// Send a test message through the configured notifier
    TestAlert,
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let config = match Config::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error loading configuration: {e}");
            return ExitCode::FAILURE;
        }
    };

    // Held until exit so the file writer flushes
    let _log_guard = match logging::init(&config.logging, cli.verbose) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Error initializing logging: {e}");
            return ExitCode::FAILURE;
        }
    };

    let result = match cli.command.unwrap_or_default() {
        Commands::Run => run_monitor(config).await,
        Commands::Check => run_check(config).await,
        Commands::Validate => run_validate(&config),
        Commands::TestAlert => run_test_alert(config).await,
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn build_monitor(config: &Config) -> anyhow::Result<MonitorLoop<Fetcher, AnyNotifier>> {
    config.validate()?;
    let fetcher = Fetcher::new(&config.endpoint).context("failed to build HTTP client")?;
    let notifier = AnyNotifier::from_config(config).context("failed to build notifier")?;
    Ok(MonitorLoop::new(fetcher, notifier, config))
}

async fn run_monitor(config: Config) -> anyhow::Result<()> {
    let mut monitor = build_monitor(&config)?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        endpoint = %config.endpoint.url,
        threshold = config.monitor.threshold,
        interval = %humantime::format_duration(config.monitor.interval()),
        cooldown = %humantime::format_duration(std::time::Duration::from_secs(config.alerting.cooldown_seconds)),
        channel = ?config.alerting.channel,
        "Starting WattGuard"
    );

    let cancel = CancellationToken::new();
    tokio::spawn(cancel_on_shutdown(cancel.clone()));

    monitor.run(cancel).await;
    info!("WattGuard stopped");
    Ok(())
}

async fn cancel_on_shutdown(cancel: CancellationToken) {
    shutdown_signal().await;
    info!("Shutdown signal received");
    cancel.cancel();
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
}

async fn run_check(config: Config) -> anyhow::Result<()> {
    let mut monitor = build_monitor(&config)?;

    match monitor.tick().await {
        TickReport::Healthy(reading) => {
            println!("{reading}");
            println!("Balance is above the threshold ({} kWh)", config.monitor.threshold);
        }
        TickReport::LowBalance { reading, delivered } => {
            println!("{reading}");
            println!(
                "Balance is below the threshold ({} kWh); alert {}",
                config.monitor.threshold,
                if delivered { "sent" } else { "not sent" }
            );
        }
        TickReport::FetchFailed { error, .. } => bail!("balance fetch failed: {error}"),
        TickReport::ParseFailed { error, .. } => bail!("balance response rejected: {error}"),
    }
    Ok(())
}

fn run_validate(config: &Config) -> anyhow::Result<()> {
    let problems = config.problems();
    if problems.is_empty() {
        println!("Configuration is valid");
        return Ok(());
    }

    println!("Configuration has {} problem(s):", problems.len());
    for problem in &problems {
        println!("  - {problem}");
    }
    bail!("invalid configuration")
}

async fn run_test_alert(config: Config) -> anyhow::Result<()> {
    config.validate()?;
    let notifier = AnyNotifier::from_config(&config).context("failed to build notifier")?;

    let subject = "WattGuard test alert";
    let body = format!(
        "This is a test message from WattGuard {}. Alert delivery is working.",
        env!("CARGO_PKG_VERSION")
    );

    if notifier.send(subject, &body, false).await {
        println!("Test alert sent");
        Ok(())
    } else {
        bail!("test alert could not be delivered")
    }
}
