//! Storage layer for staged and persisted files.
//!
//! Defines the storage interface with a filesystem-backed implementation.
//! Newly written files are staged in memory so they are readable before
//! the disk write completes; the stage is retired once the write finishes.

pub mod file_store;
pub mod handle;
pub mod key;
pub mod stage;
#[cfg(any(test, feature = "test-utils"))]
pub mod test_fixtures;

use std::path::PathBuf;

use async_trait::async_trait;
use bytes::Bytes;
pub use file_store::{FileStore, PutOptions, PutOutcome, StoreStats};
pub use handle::{AsyncReader, BlockingReader, FileHandle, ReadMode, ReadSource};
pub use key::StoreKey;

/// Storage operations over `(path, name)` addressed files.
///
/// Every backend exposes the same put/get/delete shape so consumers never
/// depend on where the bytes actually live.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Stores `data` under `(path, name)`.
    ///
    /// The data is readable through [`Storage::get`] as soon as this call
    /// starts, even before it has been persisted.
    ///
    /// # Errors
    ///
    /// - `StoreError::AlreadyExists` - If a file exists and `force` is not set
    /// - `StoreError::InvalidKey` - If path or name is malformed
    /// - `StoreError::Io` - If the destination directory cannot be created
    async fn put(
        &self,
        path: &str,
        name: &str,
        data: Bytes,
        options: PutOptions,
    ) -> Result<PutOutcome, StoreError>;

    /// Opens the file at `(path, name)` for reading in the requested mode.
    ///
    /// # Errors
    ///
    /// - `StoreError::NotFound` - If the file is neither staged nor on disk
    /// - `StoreError::InvalidKey` - If path or name is malformed
    /// - `StoreError::Io` - If the file exists but cannot be opened
    fn get(&self, path: &str, name: &str, mode: ReadMode) -> Result<FileHandle, StoreError>;

    /// Removes the file at `(path, name)` from the stage and from disk.
    ///
    /// Returns whether anything was removed.
    ///
    /// # Errors
    ///
    /// - `StoreError::InvalidKey` - If path or name is malformed
    /// - `StoreError::Io` - If removal failed for a reason other than absence
    async fn delete(&self, path: &str, name: &str) -> Result<bool, StoreError>;
}

/// Errors that occur during storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Destination already exists and the put was not forced
    #[error("File already exists: {}", path.display())]
    AlreadyExists {
        /// On-disk location that blocked the write
        path: PathBuf,
    },

    /// File is neither staged nor present on disk
    #[error("File not found: {key}")]
    NotFound {
        /// Key that was looked up
        key: StoreKey,
    },

    /// Path or name cannot be mapped safely under the base directory
    #[error("Invalid store key: {reason}")]
    InvalidKey {
        /// Why the key was rejected
        reason: String,
    },

    /// Standard I/O error occurred
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
