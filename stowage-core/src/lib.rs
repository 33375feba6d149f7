//! Stowage Core - Local file storage with a write-through stage
//!
//! This crate provides a put/get/delete file store over a base directory.
//! Newly written files are staged in memory so they can be read back before
//! the disk write completes, and retired once it does.

pub mod config;
pub mod storage;
pub mod tracing_setup;

// Re-export main types for convenient access
pub use config::{StoreConfig, StowageConfig};
pub use storage::{FileStore, PutOptions, PutOutcome, ReadMode, Storage, StoreError};

/// Errors that can bubble up from any Stowage subsystem.
#[derive(Debug, thiserror::Error)]
pub enum StowageError {
    #[error("Storage error: {0}")]
    Store(#[from] StoreError),

    #[error("Configuration error: {reason}")]
    Configuration { reason: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl StowageError {
    /// Returns a user-friendly error message suitable for display.
    pub fn user_message(&self) -> String {
        match self {
            StowageError::Store(e) => match e {
                StoreError::AlreadyExists { path } => {
                    format!("{} already exists (use --force to overwrite)", path.display())
                }
                StoreError::NotFound { key } => format!("No file stored at {key}"),
                StoreError::InvalidKey { reason } => format!("Invalid path or name: {reason}"),
                StoreError::Io(_) => "Storage error occurred".to_string(),
            },
            StowageError::Configuration { reason } => format!("Configuration error: {reason}"),
            StowageError::Io(_) => "File system error occurred".to_string(),
        }
    }

    /// Checks if this error is due to user input validation.
    pub fn is_user_error(&self) -> bool {
        matches!(
            self,
            StowageError::Configuration { .. }
                | StowageError::Store(StoreError::InvalidKey { .. })
                | StowageError::Store(StoreError::AlreadyExists { .. })
                | StowageError::Store(StoreError::NotFound { .. })
        )
    }
}

pub type Result<T> = std::result::Result<T, StowageError>;

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;

    #[test]
    fn test_user_message_for_conflict() {
        let error = StowageError::from(StoreError::AlreadyExists {
            path: PathBuf::from("/data/docs/a.txt"),
        });

        assert!(error.user_message().contains("/data/docs/a.txt"));
        assert!(error.is_user_error());
    }

    #[test]
    fn test_io_errors_are_not_user_errors() {
        let error = StowageError::from(std::io::Error::other("disk on fire"));

        assert!(!error.is_user_error());
        assert_eq!(error.user_message(), "File system error occurred");
    }
}
