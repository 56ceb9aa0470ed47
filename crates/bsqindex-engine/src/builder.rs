//! Fluent builder API for configuring and starting an [`Engine`].
//!
//! # Example
//!
//! ```rust,no_run
//! # async fn run() -> Result<(), bsqindex_engine::EngineError> {
//! use bsqindex_engine::EngineBuilder;
//!
//! let engine = EngineBuilder::new("/var/lib/bisq/btc_mainnet/db")
//!     .inner_debounce_ms(2_000)
//!     .height_tolerance(10)
//!     .decode_workers(4)
//!     .start()
//!     .await?;
//! println!("height {}", engine.query().latest_height());
//! # Ok(())
//! # }
//! ```

use std::path::PathBuf;

use bsqindex_core::config::{EngineConfig, PriceConfig};

use crate::engine::Engine;
use crate::error::EngineError;

/// Fluent builder for [`EngineConfig`].
pub struct EngineBuilder {
    config: EngineConfig,
}

impl EngineBuilder {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            config: EngineConfig::new(data_dir),
        }
    }

    /// Start from an existing configuration.
    pub fn from_config(config: EngineConfig) -> Self {
        Self { config }
    }

    /// Quiet period after the last dump change before reloading.
    pub fn inner_debounce_ms(mut self, ms: u64) -> Self {
        self.config.inner_debounce_ms = ms;
        self
    }

    /// Quiet period on the producer's output tree before its restart is
    /// acted on.
    pub fn restart_settle_ms(mut self, ms: u64) -> Self {
        self.config.restart_settle_ms = ms;
        self
    }

    pub fn restart_cooldown_ms(mut self, ms: u64) -> Self {
        self.config.restart_cooldown_ms = ms;
        self
    }

    pub fn rearm_retry_ms(mut self, ms: u64) -> Self {
        self.config.rearm_retry_ms = ms;
        self
    }

    /// Blocks the ledger may run ahead of the dump.
    pub fn height_tolerance(mut self, blocks: u64) -> Self {
        self.config.height_tolerance = blocks;
        self
    }

    pub fn decode_workers(mut self, n: usize) -> Self {
        self.config.decode_workers = n;
        self
    }

    pub fn channel_capacity(mut self, n: usize) -> Self {
        self.config.channel_capacity = n;
        self
    }

    /// Poll the reference price with the given settings.
    pub fn price(mut self, price: PriceConfig) -> Self {
        self.config.price = Some(price);
        self
    }

    /// Don't poll a reference price.
    pub fn without_price(mut self) -> Self {
        self.config.price = None;
        self
    }

    pub fn build_config(self) -> EngineConfig {
        self.config
    }

    pub async fn start(self) -> Result<Engine, EngineError> {
        Engine::start(self.config).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_defaults() {
        let cfg = EngineBuilder::new("/data").build_config();
        assert_eq!(cfg.inner_debounce_ms, 2_000);
        assert_eq!(cfg.restart_settle_ms, 15_000);
        assert_eq!(cfg.restart_cooldown_ms, 180_000);
        assert_eq!(cfg.height_tolerance, 10);
        assert_eq!(cfg.decode_workers, 4);
        assert!(cfg.price.is_some());
    }

    #[test]
    fn builder_custom() {
        let cfg = EngineBuilder::new("/data")
            .inner_debounce_ms(50)
            .restart_settle_ms(100)
            .restart_cooldown_ms(200)
            .rearm_retry_ms(300)
            .height_tolerance(3)
            .decode_workers(2)
            .without_price()
            .build_config();

        assert_eq!(cfg.inner_debounce_ms, 50);
        assert_eq!(cfg.restart_settle_ms, 100);
        assert_eq!(cfg.restart_cooldown_ms, 200);
        assert_eq!(cfg.rearm_retry_ms, 300);
        assert_eq!(cfg.height_tolerance, 3);
        assert_eq!(cfg.decode_workers, 2);
        assert!(cfg.price.is_none());
    }

    #[test]
    fn price_settings_are_kept() {
        let cfg = EngineBuilder::new("/data")
            .price(PriceConfig {
                poll_interval_secs: 60,
                ..PriceConfig::default()
            })
            .build_config();
        assert_eq!(cfg.price.unwrap().poll_interval_secs, 60);
    }
}
