#[cfg(test)]
mod tests;

pub mod pretty;

use serde::{Deserialize, Serialize};
use std::{io, path::PathBuf};
use thiserror::Error;

/// Logical identifier for a page within a single page file.
/// Examples:
/// - `let header_page = PageId(0);`
/// - `let third_data_page = PageId(3);`
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PageId(pub u64);

/// Stable locator for a record within one table file: `(page, slot)`.
/// Examples:
/// - `let rid = RecordId { page_id: PageId(1), slot: 0 };`
/// - `let rid = RecordId { page_id: PageId(4), slot: 12 };`
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RecordId {
    pub page_id: PageId,
    pub slot: u16,
}

/// Identifier for a B+Tree index file, scoped per-process (the source's
/// module-level globals are replaced by per-handle state; see DESIGN.md).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IndexId(pub u64);

/// Canonical error taxonomy shared across the storage engine's layers.
///
/// Each variant corresponds to one of the abstract return codes named in
/// spec §6; lookup misses (`KeyNotFound`, `NoMoreEntries`, `NoMoreTuples`)
/// are normal control-flow signals rather than logged failures, but they
/// still flow through this single enum so every layer shares one error type.
#[derive(Error, Debug)]
pub enum DbError {
    #[error("file not found: {0}")]
    FileNotFound(String),
    #[error("file handle not initialized")]
    FileHandleNotInit,
    #[error("write failed: {0}")]
    WriteFailed(String),
    #[error("read failed: {0}")]
    ReadFailed(String),
    #[error("read of non-existing page {0}")]
    ReadNonExistingPage(u64),
    #[error("destroy failed: {0}")]
    DestroyFailed(String),
    #[error("memory allocation failed: {0}")]
    MemoryAllocationFail(String),
    #[error("buffer pool full")]
    BufferPoolFull,
    #[error("buffer pool in use: {0} frame(s) still pinned")]
    BufferPoolInUse(u32),
    #[error("close failed: {0}")]
    CloseFailed(String),
    #[error("record not found: {0:?}")]
    RecordNotFound(RecordId),
    #[error("key not found")]
    KeyNotFound,
    #[error("no more entries")]
    NoMoreEntries,
    #[error("no more tuples")]
    NoMoreTuples,
    #[error("invalid header: {0}")]
    InvalidHeader(String),
    #[error("{0}")]
    GeneralError(String),
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Result alias that carries a `DbError`.
pub type DbResult<T> = Result<T, DbError>;

/// Replacement strategy tag for a buffer pool (spec §4.2). Only `Fifo` and
/// `Lru` are implemented; `Clock` and `LruK` are accepted as reserved tags
/// and rejected at `BufferPool::init` with a `GeneralError`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReplacementStrategy {
    Fifo,
    Lru,
    Clock,
    LruK,
}

/// Runtime configuration for the storage engine's layers.
///
/// # Example
/// ```
/// use common::{Config, ReplacementStrategy};
/// use std::path::PathBuf;
///
/// let config = Config::builder()
///     .data_dir(PathBuf::from("./my_db"))
///     .buffer_pool_frames(64)
///     .replacement_strategy(ReplacementStrategy::Lru)
///     .build();
/// ```
#[derive(Clone, Debug, Serialize, Deserialize, bon::Builder)]
pub struct Config {
    /// Directory where table and index files live.
    #[builder(default = PathBuf::from("./db_data"))]
    pub data_dir: PathBuf,
    /// Fixed-size page allocation in bytes. Must match `storage::PAGE_SIZE`.
    #[builder(default = 4096)]
    pub page_size: usize,
    /// Number of frames a buffer pool keeps resident.
    #[builder(default = 64)]
    pub buffer_pool_frames: usize,
    /// Eviction policy used by buffer pools opened under this config.
    #[builder(default = ReplacementStrategy::Lru)]
    pub replacement_strategy: ReplacementStrategy,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./db_data"),
            page_size: 4096,
            buffer_pool_frames: 64,
            replacement_strategy: ReplacementStrategy::Lru,
        }
    }
}

/// Convenient re-exports for downstream crates.
pub mod prelude {
    pub use crate::{Config, DbError, DbResult, IndexId, PageId, RecordId, ReplacementStrategy};
}
