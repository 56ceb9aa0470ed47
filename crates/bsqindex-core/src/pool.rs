//! Decode offload pool: a fixed set of worker threads that turn raw record
//! blobs into structured values without blocking the async runtime.
//!
//! Submissions queue inside the rayon pool when every worker is busy; the
//! submitting task is suspended on a oneshot channel until its result is ready.

use std::future::Future;

use serde::de::DeserializeOwned;
use tokio::sync::oneshot;

use crate::error::DumpError;

/// Default number of decode workers.
pub const DEFAULT_DECODE_WORKERS: usize = 4;

/// Fixed-size pool of decode workers.
pub struct DecodePool {
    pool: rayon::ThreadPool,
    size: usize,
}

impl DecodePool {
    /// Build a pool with `size` worker threads (at least one).
    pub fn new(size: usize) -> Result<Self, DumpError> {
        let size = size.max(1);
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(size)
            .thread_name(|i| format!("bsq-decode-{i}"))
            .build()
            .map_err(|e| DumpError::Pool(e.to_string()))?;
        Ok(Self { pool, size })
    }

    /// Number of worker threads.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Decode `blob` as JSON on a worker thread.
    ///
    /// The outer error is a pool failure (worker gone); the inner one is the
    /// decode error for this blob.
    pub async fn decode<T>(&self, blob: String) -> Result<Result<T, serde_json::Error>, DumpError>
    where
        T: DeserializeOwned + Send + 'static,
    {
        self.submit(blob).await
    }

    /// Queue `blob` on the pool right away and return a future for its
    /// result. Work starts whether or not the future is polled.
    pub fn submit<T>(
        &self,
        blob: String,
    ) -> impl Future<Output = Result<Result<T, serde_json::Error>, DumpError>> + Send + 'static
    where
        T: DeserializeOwned + Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        self.pool.spawn(move || {
            let decoded = serde_json::from_str::<T>(&blob);
            // Receiver gone means the load was abandoned; nothing to report.
            let _ = tx.send(decoded);
        });
        async move {
            rx.await
                .map_err(|_| DumpError::Pool("decode worker dropped its result".into()))
        }
    }
}

impl std::fmt::Debug for DecodePool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DecodePool").field("size", &self.size).finish()
    }
}
