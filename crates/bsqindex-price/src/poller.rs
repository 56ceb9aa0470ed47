//! Periodic price poll: fetch trades → median → publish.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::MissedTickBehavior;

use bsqindex_core::error::PriceError;
use bsqindex_core::price::PriceFeed;

use crate::source::{Trade, TradeSource};

const MIN_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Median of an ascending-sorted slice; even lengths average the two middle
/// values. `None` for an empty slice.
pub fn median(sorted: &[f64]) -> Option<f64> {
    let n = sorted.len();
    if n == 0 {
        return None;
    }
    let mid = n / 2;
    if n % 2 == 1 {
        Some(sorted[mid])
    } else {
        Some((sorted[mid - 1] + sorted[mid]) / 2.0)
    }
}

/// Polls a [`TradeSource`] on a fixed interval and publishes the median
/// price into a [`PriceFeed`].
pub struct PricePoller<S> {
    source: S,
    feed: Arc<PriceFeed>,
    interval: Duration,
    scale: f64,
}

impl<S: TradeSource> PricePoller<S> {
    /// A zero `interval` is raised to one second.
    pub fn new(source: S, feed: Arc<PriceFeed>, interval: Duration, scale: f64) -> Self {
        Self {
            source,
            feed,
            interval: interval.max(MIN_POLL_INTERVAL),
            scale,
        }
    }

    /// Fetch once and publish. On error the feed is left untouched.
    pub async fn poll_once(&self) -> Result<f64, PriceError> {
        let trades = self.source.fetch_trades().await?;
        let price = reference_price(&trades, self.scale)?;
        self.feed.publish(price);
        tracing::debug!(price, trades = trades.len(), "Reference price updated");
        Ok(price)
    }

    /// Poll immediately, then every `interval`, until `shutdown` flips to
    /// `true` or its sender is dropped.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(e) = self.poll_once().await {
                        tracing::error!(error = %e, "Error updating BSQ market price");
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        tracing::debug!("Price poller stopping");
                        return;
                    }
                }
            }
        }
    }
}

/// Scale each quoted price, sort ascending and take the median.
/// Unparsable quotes are skipped.
pub fn reference_price(trades: &[Trade], scale: f64) -> Result<f64, PriceError> {
    let mut prices: Vec<f64> = trades
        .iter()
        .filter_map(|t| match t.price.trim().parse::<f64>() {
            Ok(p) if p.is_finite() => Some(p * scale),
            _ => {
                tracing::warn!(price = %t.price, "Skipping unparsable trade price");
                None
            }
        })
        .collect();
    prices.sort_by(f64::total_cmp);
    median(&prices).ok_or(PriceError::NoTrades)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;

    fn trades(prices: &[&str]) -> Vec<Trade> {
        prices
            .iter()
            .map(|p| Trade {
                price: p.to_string(),
                amount: None,
                trade_date: None,
            })
            .collect()
    }

    /// Returns scripted responses in order, then repeats the last one.
    struct Scripted {
        responses: Mutex<Vec<Result<Vec<Trade>, PriceError>>>,
        calls: AtomicU32,
    }

    impl Scripted {
        fn new(responses: Vec<Result<Vec<Trade>, PriceError>>) -> Self {
            Self {
                responses: Mutex::new(responses),
                calls: AtomicU32::new(0),
            }
        }
    }

    #[async_trait]
    impl TradeSource for Scripted {
        async fn fetch_trades(&self) -> Result<Vec<Trade>, PriceError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let mut r = self.responses.lock().unwrap();
            if r.len() > 1 {
                r.remove(0)
            } else {
                match &r[0] {
                    Ok(t) => Ok(t.clone()),
                    Err(_) => Err(PriceError::Http("down".into())),
                }
            }
        }
    }

    #[test]
    fn median_odd_and_even() {
        assert_eq!(median(&[100.0, 200.0, 300.0]), Some(200.0));
        assert_eq!(median(&[100.0, 200.0]), Some(150.0));
        assert_eq!(median(&[]), None);
    }

    #[test]
    fn reference_price_sorts_and_scales() {
        let t = trades(&["0.000003", "0.000001", "0.000002"]);
        let p = reference_price(&t, 100_000_000.0).unwrap();
        assert!((p - 200.0).abs() < 1e-6);
    }

    #[test]
    fn reference_price_skips_garbage() {
        let t = trades(&["abc", "100", "200"]);
        assert_eq!(reference_price(&t, 1.0).unwrap(), 150.0);
        assert!(matches!(reference_price(&trades(&["x"]), 1.0), Err(PriceError::NoTrades)));
    }

    #[tokio::test]
    async fn failed_poll_keeps_previous_price() {
        let feed = Arc::new(PriceFeed::default());
        let source = Scripted::new(vec![
            Ok(trades(&["100", "200", "300"])),
            Err(PriceError::Timeout { ms: 10_000 }),
        ]);
        let poller = PricePoller::new(source, Arc::clone(&feed), Duration::from_secs(3600), 1.0);

        assert_eq!(poller.poll_once().await.unwrap(), 200.0);
        assert!(poller.poll_once().await.unwrap_err().is_timeout());
        assert_eq!(feed.current(), Some(200.0));
    }

    #[tokio::test(start_paused = true)]
    async fn run_polls_on_interval_until_shutdown() {
        let feed = Arc::new(PriceFeed::default());
        let mut rx = feed.subscribe();
        let source = Scripted::new(vec![Ok(trades(&["100", "200"]))]);
        let poller = PricePoller::new(source, Arc::clone(&feed), Duration::from_secs(3600), 1.0);

        let (stop_tx, stop_rx) = watch::channel(false);
        let handle = tokio::spawn(poller.run(stop_rx));

        // First tick fires immediately, the second after one interval.
        assert_eq!(rx.recv().await.unwrap(), 150.0);
        tokio::time::sleep(Duration::from_secs(3601)).await;
        assert_eq!(rx.recv().await.unwrap(), 150.0);

        stop_tx.send(true).unwrap();
        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn zero_interval_runs_instead_of_panicking() {
        let feed = Arc::new(PriceFeed::default());
        let mut rx = feed.subscribe();
        let source = Scripted::new(vec![Ok(trades(&["100"]))]);
        let poller = PricePoller::new(source, Arc::clone(&feed), Duration::ZERO, 1.0);

        let (stop_tx, stop_rx) = watch::channel(false);
        let handle = tokio::spawn(poller.run(stop_rx));

        assert_eq!(rx.recv().await.unwrap(), 100.0);
        stop_tx.send(true).unwrap();
        handle.await.unwrap();
    }
}
