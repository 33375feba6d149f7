//! Test fixtures for storage testing.
//!
//! Provides standardized store setup and teardown for consistent
//! testing across storage-related modules.

use super::FileStore;
use crate::config::StoreConfig;

/// Creates a store rooted in a fresh temporary directory.
///
/// The base directory itself is not created; the first put creates it.
///
/// # Panics
///
/// Panics if the temporary directory cannot be created. This is acceptable
/// in test fixtures where failures indicate environment issues.
pub fn create_temp_store() -> (tempfile::TempDir, FileStore) {
    create_temp_store_with(|_| {})
}

/// Creates a temporary store after applying `configure` to its config.
///
/// # Panics
///
/// Panics if the temporary directory cannot be created.
pub fn create_temp_store_with(
    configure: impl FnOnce(&mut StoreConfig),
) -> (tempfile::TempDir, FileStore) {
    let temp_dir = tempfile::tempdir().unwrap();
    let mut config = StoreConfig::for_testing(temp_dir.path());
    configure(&mut config);

    (temp_dir, FileStore::new(config))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_temp_store_is_isolated() {
        let (temp_dir, store) = create_temp_store();

        assert!(store.base_dir().starts_with(temp_dir.path()));
        assert!(!store.base_dir().exists());
    }

    #[test]
    fn test_configure_is_applied() {
        let (_temp_dir, store) = create_temp_store_with(|config| config.sync_on_write = true);

        assert!(store.config().sync_on_write);
    }
}
