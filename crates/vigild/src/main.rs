//! Vigil collection daemon.
//!
//! Fetches raw agent output from the configured hosts, caches it, and
//! prints one classified status line per host. In loop mode the cycle
//! repeats on the shortest configured check interval; one-shot mode
//! exits with the worst observed state, plugin style.

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;
use vigil_common::config::VigilConfig;
use vigild::runner;

#[derive(Parser, Debug)]
#[command(name = "vigild", version, about = "Vigil agent data collector")]
struct Args {
    /// Path to the configuration file
    #[arg(long, short, default_value = "/etc/vigil/config.toml")]
    config: PathBuf,

    /// Keep running, collecting on the shortest check interval
    #[arg(long)]
    daemon: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let config = VigilConfig::load(&args.config)?;
    info!(
        "vigild v{} starting with {} hosts",
        env!("CARGO_PKG_VERSION"),
        config.hosts.len()
    );

    if args.daemon {
        let interval = config
            .hosts
            .iter()
            .map(|h| h.check_interval())
            .min()
            .unwrap_or(Duration::from_secs(60));
        loop {
            let reports = runner::run_cycle(&config).await;
            for report in &reports {
                println!("{} {}", report.hostname, report.classification);
            }
            tokio::select! {
                _ = tokio::time::sleep(interval) => {}
                _ = tokio::signal::ctrl_c() => {
                    info!("Shutting down gracefully");
                    return Ok(());
                }
            }
        }
    }

    let reports = runner::run_cycle(&config).await;
    for report in &reports {
        println!("{} {}", report.hostname, report.classification);
    }
    std::process::exit(runner::worst_state(&reports).exit_code());
}
