//! Error types for the dump → index pipeline.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while loading a dump into a snapshot.
#[derive(Debug, Error)]
pub enum DumpError {
    #[error("dump file {path} doesn't exist")]
    DumpMissing { path: PathBuf },

    #[error("I/O error reading dump: {0}")]
    Io(#[from] std::io::Error),

    #[error("unable to parse dump at line {line}: {reason}")]
    MalformedRecord { line: usize, reason: String },

    #[error("decode pool error: {0}")]
    Pool(String),
}

impl DumpError {
    /// Returns `true` if the dump file was absent (startup precondition).
    pub fn is_missing(&self) -> bool {
        matches!(self, Self::DumpMissing { .. })
    }
}

/// Errors raised while fetching or smoothing the reference price.
#[derive(Debug, Error)]
pub enum PriceError {
    #[error("HTTP error: {0}")]
    Http(String),

    #[error("price request timed out after {ms} ms")]
    Timeout { ms: u64 },

    #[error("trade feed returned no usable prices")]
    NoTrades,
}

impl PriceError {
    /// Returns `true` if the failure was a request timeout.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn malformed_record_mentions_line() {
        let err = DumpError::MalformedRecord {
            line: 42,
            reason: "expected value".into(),
        };
        assert_eq!(err.to_string(), "unable to parse dump at line 42: expected value");
        assert!(!err.is_missing());
    }

    #[test]
    fn missing_dump_is_flagged() {
        let err = DumpError::DumpMissing {
            path: PathBuf::from("/data/json/all/blocks.json"),
        };
        assert!(err.is_missing());
    }
}
