//! BsqIndex CLI: serve or inspect a Bisq DAO `blocks.json` dump.
//!
//! # Commands
//! ```text
//! bsqindex run      --data-dir <dir> [--config <file.json>] [--no-price]
//! bsqindex inspect  --dump <blocks.json>
//! bsqindex info
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use serde::Deserialize;
use tokio::sync::broadcast::error::RecvError;

use bsqindex_core::{DecodePool, EngineConfig, SnapshotLoader, SnapshotStore};
use bsqindex_engine::{EngineBuilder, ReloadEvent};

mod logging;

use logging::{init_tracing, LogConfig};

#[derive(Parser)]
#[command(
    name = "bsqindex",
    about = "In-memory BSQ explorer index over a Bisq DAO dump",
    version
)]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON structured logs
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load the dump and keep it in step with the producer until Ctrl-C
    Run {
        /// Producer data directory (the dump lives at json/all/blocks.json)
        #[arg(long)]
        data_dir: Option<PathBuf>,
        /// JSON config file with engine settings and a `log` section
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Don't poll the reference price
        #[arg(long)]
        no_price: bool,
    },

    /// Parse a dump once and print its height and stats as JSON
    Inspect {
        /// Path to blocks.json
        #[arg(long)]
        dump: PathBuf,
        /// Decode worker threads
        #[arg(long, default_value_t = 4)]
        workers: usize,
    },

    /// Print version and defaults
    Info,
}

/// On-disk config: engine settings plus logging.
#[derive(Debug, Deserialize)]
struct FileConfig {
    #[serde(flatten)]
    engine: EngineConfig,
    #[serde(default)]
    log: LogConfig,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run { data_dir, config, no_price } => {
            let mut file = load_config(config.as_deref(), data_dir)?;
            apply_log_flags(&mut file.log, cli.verbose, cli.json_logs);
            init_tracing(&file.log);
            if no_price {
                file.engine.price = None;
            }
            cmd_run(file.engine).await
        }

        Commands::Inspect { dump, workers } => {
            let mut log = LogConfig::default();
            apply_log_flags(&mut log, cli.verbose, cli.json_logs);
            init_tracing(&log);
            cmd_inspect(&dump, workers).await
        }

        Commands::Info => cmd_info(),
    }
}

fn apply_log_flags(log: &mut LogConfig, verbose: bool, json: bool) {
    if verbose {
        log.level = "debug".into();
    }
    if json {
        log.json = true;
    }
}

fn load_config(path: Option<&Path>, data_dir: Option<PathBuf>) -> Result<FileConfig> {
    let mut file = match path {
        Some(path) => {
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config {}", path.display()))?;
            serde_json::from_str::<FileConfig>(&raw)
                .with_context(|| format!("Invalid config {}", path.display()))?
        }
        None => {
            let dir = data_dir
                .clone()
                .ok_or_else(|| anyhow!("either --data-dir or --config is required"))?;
            FileConfig {
                engine: EngineConfig::new(dir),
                log: LogConfig::default(),
            }
        }
    };
    if let Some(dir) = data_dir {
        file.engine.data_dir = dir;
    }
    Ok(file)
}

async fn cmd_run(config: EngineConfig) -> Result<()> {
    let engine = EngineBuilder::from_config(config)
        .start()
        .await
        .context("Failed to start engine")?;
    let query = engine.query();
    let mut reloads = engine.subscribe_reloads();

    let stats = query.stats();
    tracing::info!(
        height = query.latest_height(),
        minted = stats.minted,
        burnt = stats.burnt,
        addresses = stats.addresses,
        "Serving snapshot"
    );

    loop {
        tokio::select! {
            signal = tokio::signal::ctrl_c() => {
                signal.context("Failed to listen for Ctrl-C")?;
                tracing::info!("Shutting down");
                break;
            }
            event = reloads.recv() => match event {
                Ok(ReloadEvent::Published(summary)) => {
                    let stats = query.stats();
                    tracing::info!(
                        height = summary.latest_height,
                        blocks = summary.blocks,
                        txs = summary.transactions,
                        minted = stats.minted,
                        burnt = stats.burnt,
                        unspent_txos = stats.unspent_txos,
                        spent_txos = stats.spent_txos,
                        "Index updated"
                    );
                }
                Ok(ReloadEvent::Failed(reason)) => {
                    tracing::warn!(%reason, height = query.latest_height(), "Still serving previous snapshot");
                }
                Err(RecvError::Lagged(n)) => {
                    tracing::debug!(skipped = n, "Reload events lagged");
                }
                Err(RecvError::Closed) => break,
            },
        }
    }

    engine.stop().await;
    Ok(())
}

async fn cmd_inspect(dump: &Path, workers: usize) -> Result<()> {
    let pool = Arc::new(DecodePool::new(workers)?);
    let loader = SnapshotLoader::new(dump, pool, Arc::new(SnapshotStore::default()));
    let summary = loader
        .reload()
        .await
        .with_context(|| format!("Failed to load {}", dump.display()))?;

    let snapshot = loader.store().current();
    let report = serde_json::json!({
        "latestHeight": summary.latest_height,
        "blocks": summary.blocks,
        "nonEmptyBlocks": snapshot.non_empty_blocks().len(),
        "transactions": summary.transactions,
        "elapsedMs": summary.elapsed_ms,
        "stats": snapshot.stats(),
    });
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

fn cmd_info() -> Result<()> {
    let defaults = EngineConfig::new("<data-dir>");
    println!("BsqIndex v{}", env!("CARGO_PKG_VERSION"));
    println!();
    println!("Dump location:        <data-dir>/json/all/blocks.json");
    println!("Reload debounce:      {} ms", defaults.inner_debounce_ms);
    println!("Restart settle:       {} ms", defaults.restart_settle_ms);
    println!("Restart cooldown:     {} ms", defaults.restart_cooldown_ms);
    println!("Height tolerance:     {} blocks", defaults.height_tolerance);
    println!("Decode workers:       {}", defaults.decode_workers);
    if let Some(price) = &defaults.price {
        println!("Price source:         {}", price.trades_url);
        println!("Price poll interval:  {} s", price.poll_interval_secs);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn data_dir_flag_overrides_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bsqindex.json");
        std::fs::write(
            &path,
            r#"{"data_dir": "/from/file", "inner_debounce_ms": 500, "log": {"level": "warn"}}"#,
        )
        .unwrap();

        let cfg = load_config(Some(&path), Some(PathBuf::from("/from/flag"))).unwrap();
        assert_eq!(cfg.engine.data_dir, PathBuf::from("/from/flag"));
        assert_eq!(cfg.engine.inner_debounce_ms, 500);
        assert_eq!(cfg.engine.restart_cooldown_ms, 180_000);
        assert_eq!(cfg.log.level, "warn");
    }

    #[test]
    fn data_dir_or_config_required() {
        assert!(load_config(None, None).is_err());
        let cfg = load_config(None, Some(PathBuf::from("/data"))).unwrap();
        assert_eq!(cfg.engine.data_dir, PathBuf::from("/data"));
    }
}
