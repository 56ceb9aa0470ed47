//! Reference price state and its subscribers.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use tokio::sync::broadcast;

/// Callback invoked with every new reference price.
pub trait PriceListener: Send + Sync {
    fn on_price(&self, price: f64);
}

impl<F> PriceListener for F
where
    F: Fn(f64) + Send + Sync,
{
    fn on_price(&self, price: f64) {
        self(price)
    }
}

/// Current reference price plus fan-out to subscribers.
///
/// The price is stored as raw `f64` bits so a write is a single atomic store.
pub struct PriceFeed {
    bits: AtomicU64,
    has_price: AtomicBool,
    tx: broadcast::Sender<f64>,
    listeners: RwLock<Vec<Arc<dyn PriceListener>>>,
}

impl PriceFeed {
    pub fn new(channel_capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(channel_capacity.max(1));
        Self {
            bits: AtomicU64::new(0),
            has_price: AtomicBool::new(false),
            tx,
            listeners: RwLock::new(Vec::new()),
        }
    }

    /// The latest reference price, if any poll has succeeded yet.
    pub fn current(&self) -> Option<f64> {
        if self.has_price.load(Ordering::Acquire) {
            Some(f64::from_bits(self.bits.load(Ordering::Acquire)))
        } else {
            None
        }
    }

    /// Store a new price and notify every subscriber and listener.
    pub fn publish(&self, price: f64) {
        self.bits.store(price.to_bits(), Ordering::Release);
        self.has_price.store(true, Ordering::Release);

        // No receivers is fine; listeners may still be registered.
        let _ = self.tx.send(price);

        let listeners = match self.listeners.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        };
        for listener in listeners {
            listener.on_price(price);
        }
    }

    /// Receive every future price on a channel.
    pub fn subscribe(&self) -> broadcast::Receiver<f64> {
        self.tx.subscribe()
    }

    /// Register a listener; earlier listeners are kept.
    pub fn register(&self, listener: Arc<dyn PriceListener>) {
        match self.listeners.write() {
            Ok(mut guard) => guard.push(listener),
            Err(poisoned) => poisoned.into_inner().push(listener),
        }
    }

    /// Number of registered listeners.
    pub fn listener_count(&self) -> usize {
        self.listeners.read().map(|l| l.len()).unwrap_or(0)
    }
}

impl Default for PriceFeed {
    fn default() -> Self {
        Self::new(16)
    }
}

impl std::fmt::Debug for PriceFeed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PriceFeed")
            .field("current", &self.current())
            .field("listeners", &self.listener_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn no_price_before_first_publish() {
        let feed = PriceFeed::default();
        assert_eq!(feed.current(), None);
        feed.publish(4321.5);
        assert_eq!(feed.current(), Some(4321.5));
    }

    #[test]
    fn listeners_do_not_overwrite_each_other() {
        let feed = PriceFeed::default();
        let seen_a = Arc::new(Mutex::new(Vec::new()));
        let seen_b = Arc::new(Mutex::new(Vec::new()));

        let a = Arc::clone(&seen_a);
        feed.register(Arc::new(move |p: f64| a.lock().unwrap().push(p)));
        let b = Arc::clone(&seen_b);
        feed.register(Arc::new(move |p: f64| b.lock().unwrap().push(p)));

        feed.publish(150.0);
        feed.publish(200.0);

        assert_eq!(*seen_a.lock().unwrap(), vec![150.0, 200.0]);
        assert_eq!(*seen_b.lock().unwrap(), vec![150.0, 200.0]);
        assert_eq!(feed.listener_count(), 2);
    }

    #[tokio::test]
    async fn subscribers_receive_published_price() {
        let feed = PriceFeed::default();
        let mut rx = feed.subscribe();
        feed.publish(200.0);
        assert_eq!(rx.recv().await.unwrap(), 200.0);
    }
}
