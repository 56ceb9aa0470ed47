//! Streaming parser for the `blocks.json` dump.
//!
//! The dump is one big JSON document, but it is written non-atomically and is
//! too large to decode in one go. It is laid out like this:
//!
//! ```text
//! {
//!   "chainHeight": 571747,
//!   "blocks": [
//!     {
//!       "height": 571747,
//!       ...
//!     },
//!     {
//!       ...
//!     }
//!   ]
//! }
//! ```
//!
//! Every block starts with a line that is exactly `    {` and ends with a line
//! that is exactly `    },` (or `    }` for the last element). Each block is
//! handed to the [`DecodePool`] on its own; results go back into their source
//! slot so completion order never leaks into block order.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use futures::stream::{FuturesUnordered, StreamExt};
use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::error::DumpError;
use crate::pool::DecodePool;
use crate::types::BlockRecord;

/// Line that opens a block record.
pub const RECORD_START: &str = "    {";
/// Line that closes a block record followed by another one.
pub const RECORD_END: &str = "    },";
/// Line that closes the last block record of the array.
pub const RECORD_END_LAST: &str = "    }";
/// Header key carrying the ledger height.
pub const HEIGHT_KEY: &str = "\"chainHeight\":";

/// Blobs allowed in flight per decode worker before the reader waits.
const IN_FLIGHT_PER_WORKER: usize = 8;

/// Output of a successful dump scan.
#[derive(Debug, Clone)]
pub struct ParsedDump {
    /// Ledger height from the dump header (0 if absent).
    pub latest_height: u64,
    /// Blocks in dump order (oldest first).
    pub blocks: Vec<BlockRecord>,
}

/// Line-oriented dump reader backed by a decode pool.
pub struct DumpParser {
    pool: Arc<DecodePool>,
}

impl DumpParser {
    pub fn new(pool: Arc<DecodePool>) -> Self {
        Self { pool }
    }

    /// Scan `path` and decode every complete block record.
    pub async fn parse(&self, path: &Path) -> Result<ParsedDump, DumpError> {
        if !tokio::fs::try_exists(path).await.unwrap_or(false) {
            return Err(DumpError::DumpMissing {
                path: path.to_path_buf(),
            });
        }

        let start = Instant::now();
        tracing::debug!(path = %path.display(), "Processing dump");

        let file = File::open(path).await?;
        let mut lines = BufReader::new(file).lines();

        let max_in_flight = self.pool.size() * IN_FLIGHT_PER_WORKER;
        let mut in_flight = FuturesUnordered::new();
        let mut slots: Vec<Option<BlockRecord>> = Vec::new();

        let mut latest_height: Option<u64> = None;
        let mut buffer = String::new();
        let mut reading = false;
        let mut line_no = 0usize;

        while let Some(line) = lines.next_line().await? {
            line_no += 1;

            if !reading && slots.is_empty() && latest_height.is_none() {
                latest_height = parse_height(&line);
            }

            if line == RECORD_START {
                reading = true;
                buffer.clear();
            }
            if !reading {
                continue;
            }

            if line == RECORD_END || line == RECORD_END_LAST {
                buffer.push_str(RECORD_END_LAST);
                reading = false;

                let index = slots.len();
                slots.push(None);
                let blob = std::mem::take(&mut buffer);
                in_flight.push(decode_slot(&self.pool, index, line_no, blob));

                if in_flight.len() >= max_in_flight {
                    if let Some(done) = in_flight.next().await {
                        place(&mut slots, done)?;
                    }
                }
            } else {
                buffer.push_str(&line);
                buffer.push('\n');
            }
        }

        if reading {
            tracing::debug!(
                line = line_no,
                bytes = buffer.len(),
                "Dump ends inside a record, dropping it"
            );
        }

        while let Some(done) = in_flight.next().await {
            place(&mut slots, done)?;
        }

        let blocks = slots
            .into_iter()
            .enumerate()
            .map(|(i, slot)| {
                slot.ok_or_else(|| DumpError::Pool(format!("block slot {i} was never filled")))
            })
            .collect::<Result<Vec<_>, _>>()?;

        tracing::debug!(
            blocks = blocks.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Dump processed"
        );

        Ok(ParsedDump {
            latest_height: latest_height.unwrap_or(0),
            blocks,
        })
    }
}

/// Where a decoded record belongs and what it decoded to.
struct SlotResult {
    index: usize,
    line: usize,
    decoded: Result<Result<BlockRecord, serde_json::Error>, DumpError>,
}

/// Hands `blob` to the pool immediately; the returned future only waits.
fn decode_slot(
    pool: &DecodePool,
    index: usize,
    line: usize,
    blob: String,
) -> impl Future<Output = SlotResult> {
    let pending = pool.submit::<BlockRecord>(blob);
    async move {
        SlotResult {
            index,
            line,
            decoded: pending.await,
        }
    }
}

fn place(slots: &mut [Option<BlockRecord>], done: SlotResult) -> Result<(), DumpError> {
    match done.decoded? {
        Ok(block) => {
            slots[done.index] = Some(block);
            Ok(())
        }
        Err(e) => Err(DumpError::MalformedRecord {
            line: done.line,
            reason: e.to_string(),
        }),
    }
}

/// Extract the ledger height from a `"chainHeight": N,` header line.
pub fn parse_height(line: &str) -> Option<u64> {
    let rest = line.trim_start().strip_prefix(HEIGHT_KEY)?;
    rest.trim().trim_end_matches(',').trim().parse().ok()
}

/// Location of the dump inside a producer data directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DumpLayout {
    /// `<data_dir>/json`, rewritten wholesale when the producer restarts.
    pub outer_dir: PathBuf,
    /// `<data_dir>/json/all`, holds the dump we read.
    pub inner_dir: PathBuf,
    /// `<data_dir>/json/all/blocks.json`.
    pub dump_file: PathBuf,
}

impl DumpLayout {
    pub fn new(data_dir: impl AsRef<Path>) -> Self {
        let outer_dir = data_dir.as_ref().join("json");
        let inner_dir = outer_dir.join("all");
        let dump_file = inner_dir.join("blocks.json");
        Self {
            outer_dir,
            inner_dir,
            dump_file,
        }
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────────
