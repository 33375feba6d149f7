//! Centralized configuration for Stowage.
//!
//! All tunable parameters and settings are defined here to avoid
//! hard-coded values scattered throughout the codebase.

use std::path::{Path, PathBuf};

/// Central configuration for all Stowage components.
///
/// Supports environment variable overrides for runtime customization.
#[derive(Debug, Clone, Default)]
pub struct StowageConfig {
    pub store: StoreConfig,
}

/// File store and disk I/O configuration.
///
/// Controls where files land, how they are written, and what happens to
/// the in-memory stage when a write is rejected.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Root directory every `<path>/<name>` is resolved against
    pub base_dir: PathBuf,
    /// Buffer size for writing staged data to disk
    pub copy_buffer_size: usize,
    /// Whether to fsync each file after writing it
    pub sync_on_write: bool,
    /// Whether a put rejected with `AlreadyExists` leaves its stage readable
    pub keep_rejected_stage: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            base_dir: PathBuf::from(".cache"),
            copy_buffer_size: 65536, // 64 KiB
            sync_on_write: false,
            keep_rejected_stage: true,
        }
    }
}

impl StoreConfig {
    /// Creates a configuration rooted at the given directory.
    pub fn with_base_dir(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
            ..Self::default()
        }
    }

    /// Creates a configuration for tests rooted at a temporary directory.
    pub fn for_testing(dir: &Path) -> Self {
        Self {
            base_dir: dir.join("store"),
            copy_buffer_size: 4096, // Small buffer to exercise multiple copy rounds
            sync_on_write: false,
            keep_rejected_stage: true,
        }
    }
}

impl StowageConfig {
    /// Creates configuration with environment variable overrides.
    ///
    /// Allows runtime configuration via environment variables while
    /// maintaining sensible defaults. Unparseable values are ignored.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(base_dir) = std::env::var("STOWAGE_BASE_DIR") {
            if !base_dir.is_empty() {
                config.store.base_dir = PathBuf::from(base_dir);
            }
        }

        if let Ok(size) = std::env::var("STOWAGE_COPY_BUFFER") {
            if let Ok(bytes) = size.parse::<usize>() {
                if bytes > 0 {
                    config.store.copy_buffer_size = bytes;
                }
            }
        }

        if let Ok(sync) = std::env::var("STOWAGE_SYNC_ON_WRITE") {
            if let Ok(enabled) = sync.parse::<bool>() {
                config.store.sync_on_write = enabled;
            }
        }

        if let Ok(keep) = std::env::var("STOWAGE_KEEP_REJECTED_STAGE") {
            if let Ok(enabled) = keep.parse::<bool>() {
                config.store.keep_rejected_stage = enabled;
            }
        }

        config
    }
}
