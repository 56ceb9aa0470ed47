//! Engine lifecycle errors.

use thiserror::Error;

use bsqindex_core::error::{DumpError, PriceError};

#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Dump(#[from] DumpError),

    #[error("watch error: {0}")]
    Watch(String),

    #[error("price source error: {0}")]
    Price(#[from] PriceError),

    #[error("engine has stopped")]
    Stopped,
}

impl EngineError {
    /// Returns `true` if the dump file was absent at startup.
    pub fn is_missing_dump(&self) -> bool {
        matches!(self, Self::Dump(e) if e.is_missing())
    }

    pub fn is_watch(&self) -> bool {
        matches!(self, Self::Watch(_))
    }
}
