#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! CLI entry point for the earthquake monitor.

use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};
use quake_watch_config::{Config, DedupeMode};
use quake_watch_feed::HttpFeed;
use quake_watch_monitor::console::{AlwaysOnline, ConsoleScreen, ConsoleSpeaker, TcpReachability};
use quake_watch_monitor::{Collaborators, CycleOutcome, Monitor, Network, SystemClock};
use quake_watch_notify::{Notifier, PushoverNotifier};

#[derive(Parser)]
#[command(name = "quake_watch", about = "Nearby earthquake monitor")]
struct Cli {
    /// Path to a TOML config file (overrides `QUAKE_WATCH_CONFIG`)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Poll the feed until interrupted with Ctrl-C
    Watch {
        /// Dedupe mode (`single_strongest` or `set_membership`)
        #[arg(long)]
        mode: Option<DedupeMode>,
    },
    /// Run a single polling cycle and exit
    Once,
    /// Print the effective configuration as TOML
    Config,
}

fn network_for(config: &Config) -> Box<dyn Network> {
    let timeout = Duration::from_secs(config.network.connect_timeout_secs);
    match TcpReachability::for_url(config.feed.base_url(), timeout) {
        Some(check) => {
            log::debug!("Checking network via {}", check.addr());
            Box::new(check)
        }
        None => {
            log::warn!(
                "Cannot derive a host to check from {}, assuming online",
                config.feed.base_url()
            );
            Box::new(AlwaysOnline)
        }
    }
}

fn notifier_for(config: &Config) -> Result<Option<Box<dyn Notifier>>, Box<dyn std::error::Error>> {
    if !config.notify.enabled {
        return Ok(None);
    }
    log::info!("Daily summary enabled at {}", config.notify.daily_at);
    Ok(Some(Box::new(PushoverNotifier::new(&config.notify)?)))
}

fn build_monitor(config: Config) -> Result<Monitor, Box<dyn std::error::Error>> {
    let feed = HttpFeed::new(&config.feed, &config.monitor, config.dedupe.identity)?;
    let notifier = notifier_for(&config)?;
    let collab = Collaborators {
        feed: Box::new(feed),
        screen: Box::new(ConsoleScreen::new(config.display.max_lines)),
        speaker: Box::new(ConsoleSpeaker),
        network: network_for(&config),
        clock: Box::new(SystemClock),
        notifier,
    };
    Ok(Monitor::new(config, collab))
}

async fn ctrl_c() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        log::error!("Failed to listen for Ctrl-C: {e}");
        std::future::pending::<()>().await;
    }
    log::info!("Received Ctrl-C");
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    pretty_env_logger::init();
    let cli = Cli::parse();

    let mut config = Config::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Config => {
            print!("{}", config.to_toml_string()?);
        }
        Commands::Once => {
            let mut monitor = build_monitor(config)?;
            match monitor.run_cycle().await? {
                CycleOutcome::FetchFailed { error } => {
                    return Err(format!("feed fetch failed: {error}").into());
                }
                CycleOutcome::Offline => return Err("network unreachable".into()),
                CycleOutcome::AllClear { total_found } => {
                    println!("all clear, {total_found} worldwide");
                }
                CycleOutcome::Events {
                    in_range,
                    new_events,
                    ..
                } => {
                    println!("{in_range} in range, {} new", new_events.len());
                }
            }
        }
        Commands::Watch { mode } => {
            if let Some(mode) = mode {
                config.dedupe.mode = mode;
            }
            log::info!(
                "Monitoring {} ({:.4}, {:.4}) within {}km, mode {}",
                config.monitor.name,
                config.monitor.latitude,
                config.monitor.longitude,
                config.monitor.radius_km,
                config.dedupe.mode
            );
            let mut monitor = build_monitor(config)?;
            monitor.startup().await?;
            monitor.run(ctrl_c()).await?;
        }
    }

    Ok(())
}
