//! bsqindex-core: in-memory index over the Bisq DAO `blocks.json` dump.
//!
//! # Architecture
//!
//! ```text
//! SnapshotLoader
//!     ├── DumpParser     (line scanner, record sentinels, header height)
//!     │     └── DecodePool   (fixed worker threads, JSON decode)
//!     ├── IndexBuilder   (hash / tx id / address indices)
//!     │     └── StatsAggregator
//!     └── SnapshotStore  (atomic publish)  ──►  QuerySurface (read-only)
//!                                              └── PriceFeed (price + subscribers)
//! ```

pub mod config;
pub mod dump;
pub mod error;
pub mod index;
pub mod loader;
pub mod pool;
pub mod price;
pub mod query;
pub mod snapshot;
pub mod stats;
pub mod types;

pub use config::{EngineConfig, PriceConfig};
pub use dump::{DumpLayout, DumpParser, ParsedDump};
pub use error::{DumpError, PriceError};
pub use index::IndexBuilder;
pub use loader::{LoadSummary, SnapshotLoader};
pub use pool::DecodePool;
pub use price::{PriceFeed, PriceListener};
pub use query::QuerySurface;
pub use snapshot::{Snapshot, SnapshotStore};
pub use stats::{Stats, StatsAggregator};
pub use types::{BlockRecord, InputRecord, OutputRecord, TransactionRecord, TxOutputType, TxType};
