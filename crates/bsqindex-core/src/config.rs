//! Engine and price-poller configuration.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::dump::DumpLayout;
use crate::pool::DEFAULT_DECODE_WORKERS;

/// Configuration for one engine instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Producer data directory; the dump lives at `json/all/blocks.json`.
    pub data_dir: PathBuf,
    /// Quiet period after the last dump change before reloading.
    #[serde(default = "default_inner_debounce_ms")]
    pub inner_debounce_ms: u64,
    /// Quiet period on the outer directory before a producer restart is
    /// considered under way.
    #[serde(default = "default_restart_settle_ms")]
    pub restart_settle_ms: u64,
    /// How long to wait for the producer to finish rewriting its tree.
    #[serde(default = "default_restart_cooldown_ms")]
    pub restart_cooldown_ms: u64,
    /// Delay before retrying to watch a dump directory that isn't there yet.
    #[serde(default = "default_rearm_retry_ms")]
    pub rearm_retry_ms: u64,
    /// How far the ledger height may run ahead of the dump height before the
    /// watchers are assumed dead.
    #[serde(default = "default_height_tolerance")]
    pub height_tolerance: u64,
    /// Decode worker threads.
    #[serde(default = "default_decode_workers")]
    pub decode_workers: usize,
    /// Capacity of the reload event channel.
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
    /// Reference price polling; `None` disables it.
    #[serde(default = "default_price")]
    pub price: Option<PriceConfig>,
}

fn default_inner_debounce_ms() -> u64 { 2_000 }
fn default_restart_settle_ms() -> u64 { 15_000 }
fn default_restart_cooldown_ms() -> u64 { 180_000 }
fn default_rearm_retry_ms() -> u64 { 180_000 }
fn default_height_tolerance() -> u64 { 10 }
fn default_decode_workers() -> usize { DEFAULT_DECODE_WORKERS }
fn default_channel_capacity() -> usize { 64 }
fn default_price() -> Option<PriceConfig> { Some(PriceConfig::default()) }

impl EngineConfig {
    /// Defaults for a producer data directory.
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            inner_debounce_ms: default_inner_debounce_ms(),
            restart_settle_ms: default_restart_settle_ms(),
            restart_cooldown_ms: default_restart_cooldown_ms(),
            rearm_retry_ms: default_rearm_retry_ms(),
            height_tolerance: default_height_tolerance(),
            decode_workers: default_decode_workers(),
            channel_capacity: default_channel_capacity(),
            price: default_price(),
        }
    }

    pub fn layout(&self) -> DumpLayout {
        DumpLayout::new(&self.data_dir)
    }

    pub fn inner_debounce(&self) -> Duration {
        Duration::from_millis(self.inner_debounce_ms)
    }

    pub fn restart_settle(&self) -> Duration {
        Duration::from_millis(self.restart_settle_ms)
    }

    pub fn restart_cooldown(&self) -> Duration {
        Duration::from_millis(self.restart_cooldown_ms)
    }

    pub fn rearm_retry(&self) -> Duration {
        Duration::from_millis(self.rearm_retry_ms)
    }
}

/// Configuration for the reference price poller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceConfig {
    /// Endpoint returning `[{"price": "0.00004"}, ...]`.
    #[serde(default = "default_trades_url")]
    pub trades_url: String,
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
    /// Multiplier applied to each quoted price (BTC → satoshi).
    #[serde(default = "default_price_scale")]
    pub price_scale: f64,
    /// Capacity of the price broadcast channel.
    #[serde(default = "default_price_channel_capacity")]
    pub channel_capacity: usize,
}

fn default_trades_url() -> String {
    "https://bisq.markets/api/trades/?market=bsq_btc".into()
}
fn default_poll_interval_secs() -> u64 { 60 * 60 }
fn default_request_timeout_ms() -> u64 { 10_000 }
fn default_price_scale() -> f64 { 100_000_000.0 }
fn default_price_channel_capacity() -> usize { 16 }

impl Default for PriceConfig {
    fn default() -> Self {
        Self {
            trades_url: default_trades_url(),
            poll_interval_secs: default_poll_interval_secs(),
            request_timeout_ms: default_request_timeout_ms(),
            price_scale: default_price_scale(),
            channel_capacity: default_price_channel_capacity(),
        }
    }
}

impl PriceConfig {
    /// Never shorter than one second.
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs.max(1))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_producer_timing() {
        let cfg = EngineConfig::new("/var/bisq");
        assert_eq!(cfg.inner_debounce(), Duration::from_secs(2));
        assert_eq!(cfg.restart_settle(), Duration::from_secs(15));
        assert_eq!(cfg.restart_cooldown(), Duration::from_secs(180));
        assert_eq!(cfg.height_tolerance, 10);
        assert_eq!(cfg.layout().dump_file, PathBuf::from("/var/bisq/json/all/blocks.json"));
    }

    #[test]
    fn partial_json_fills_defaults() {
        let cfg: EngineConfig = serde_json::from_str(
            r#"{"data_dir": "/srv/bisq", "inner_debounce_ms": 500, "price": {"poll_interval_secs": 60}}"#,
        )
        .unwrap();
        assert_eq!(cfg.inner_debounce_ms, 500);
        assert_eq!(cfg.decode_workers, DEFAULT_DECODE_WORKERS);
        let price = cfg.price.unwrap();
        assert_eq!(price.poll_interval(), Duration::from_secs(60));
        assert_eq!(price.request_timeout(), Duration::from_secs(10));
    }

    #[test]
    fn zero_poll_interval_is_clamped() {
        let price: PriceConfig = serde_json::from_str(r#"{"poll_interval_secs": 0}"#).unwrap();
        assert_eq!(price.poll_interval(), Duration::from_secs(1));
    }

    #[test]
    fn price_can_be_disabled() {
        let cfg: EngineConfig =
            serde_json::from_str(r#"{"data_dir": "/srv/bisq", "price": null}"#).unwrap();
        assert!(cfg.price.is_none());
    }
}
