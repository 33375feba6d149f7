//! In-memory staging of files that are still being persisted.
//!
//! A put installs its bytes here before touching disk so readers see the
//! new content immediately. Each installation gets a fresh generation; only
//! the holder of the live generation may retire the entry, which keeps a
//! slow earlier write from evicting a newer one.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use bytes::Bytes;
use parking_lot::Mutex;

use super::key::StoreKey;

/// A staged file with its bookkeeping.
#[derive(Debug)]
struct StagedFile {
    data: Bytes,
    generation: u64,
    staged_at: Instant,
    opened_times: u64,
}

impl StagedFile {
    fn age(&self) -> Duration {
        self.staged_at.elapsed()
    }
}

#[derive(Debug, Default)]
struct StageInner {
    entries: Mutex<HashMap<StoreKey, StagedFile>>,
    next_generation: AtomicU64,
}

/// Shared map of staged files keyed by [`StoreKey`].
///
/// Cloning is cheap and every clone sees the same entries. The lock is
/// only held for single map operations, never across I/O.
#[derive(Debug, Clone, Default)]
pub struct StageMap {
    inner: Arc<StageInner>,
}

impl StageMap {
    /// Creates an empty stage map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Installs `data` under `key`, superseding any existing stage.
    ///
    /// The returned guard retires this installation when dropped unless it
    /// is explicitly kept.
    pub fn install(&self, key: StoreKey, data: Bytes) -> StageGuard {
        let generation = self.inner.next_generation.fetch_add(1, Ordering::Relaxed) + 1;
        let staged = StagedFile {
            data,
            generation,
            staged_at: Instant::now(),
            opened_times: 0,
        };

        let previous = self.inner.entries.lock().insert(key.clone(), staged);
        if let Some(previous) = previous {
            tracing::debug!(
                "Stage for {} superseded (generation {} -> {})",
                key,
                previous.generation,
                generation
            );
        } else {
            tracing::debug!("Staged {} (generation {})", key, generation);
        }

        StageGuard {
            stages: self.clone(),
            key,
            generation,
            armed: true,
        }
    }

    /// Returns the staged bytes for `key`, counting the access.
    pub fn open(&self, key: &StoreKey) -> Option<Bytes> {
        let mut entries = self.inner.entries.lock();
        let staged = entries.get_mut(key)?;
        staged.opened_times += 1;
        Some(staged.data.clone())
    }

    /// Removes `key` only if its live generation is `generation`.
    ///
    /// Returns whether an entry was removed.
    pub fn retire(&self, key: &StoreKey, generation: u64) -> bool {
        let mut entries = self.inner.entries.lock();
        match entries.get(key) {
            Some(staged) if staged.generation == generation => {
                let age = staged.age();
                entries.remove(key);
                tracing::debug!(
                    "Retired stage for {} (generation {}) after {:?}",
                    key,
                    generation,
                    age
                );
                true
            }
            Some(staged) => {
                tracing::debug!(
                    "Skipped retiring {} generation {}: generation {} is live",
                    key,
                    generation,
                    staged.generation
                );
                false
            }
            None => false,
        }
    }

    /// Removes `key` regardless of generation.
    pub fn remove(&self, key: &StoreKey) -> bool {
        self.inner.entries.lock().remove(key).is_some()
    }

    /// Whether `key` is currently staged.
    pub fn contains(&self, key: &StoreKey) -> bool {
        self.inner.entries.lock().contains_key(key)
    }

    /// Number of reads served from the live stage of `key`.
    pub fn opened_times(&self, key: &StoreKey) -> Option<u64> {
        self.inner.entries.lock().get(key).map(|s| s.opened_times)
    }

    /// Live generation of `key`, if staged.
    pub fn generation(&self, key: &StoreKey) -> Option<u64> {
        self.inner.entries.lock().get(key).map(|s| s.generation)
    }

    /// Number of staged entries.
    pub fn len(&self) -> usize {
        self.inner.entries.lock().len()
    }

    /// Whether nothing is staged.
    pub fn is_empty(&self) -> bool {
        self.inner.entries.lock().is_empty()
    }

    /// Total size of all staged data in bytes.
    pub fn staged_bytes(&self) -> u64 {
        self.inner
            .entries
            .lock()
            .values()
            .map(|s| s.data.len() as u64)
            .sum()
    }
}

/// Right to retire one staged generation.
///
/// Dropping an armed guard retires its generation, so a put that fails or
/// is cancelled part-way never leaves its stage behind.
#[derive(Debug)]
pub struct StageGuard {
    stages: StageMap,
    key: StoreKey,
    generation: u64,
    armed: bool,
}

impl StageGuard {
    /// Generation assigned to this installation.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Key this guard stages.
    pub fn key(&self) -> &StoreKey {
        &self.key
    }

    /// Retires the stage now if this guard still owns the live generation.
    pub fn retire(mut self) -> bool {
        self.armed = false;
        self.stages.retire(&self.key, self.generation)
    }

    /// Leaves the stage installed past the guard's lifetime.
    pub fn keep(mut self) {
        self.armed = false;
    }
}

impl Drop for StageGuard {
    fn drop(&mut self) {
        if self.armed {
            self.stages.retire(&self.key, self.generation);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(name: &str) -> StoreKey {
        StoreKey::new("docs", name).unwrap()
    }

    #[test]
    fn test_install_then_open() {
        let stages = StageMap::new();
        let _guard = stages.install(key("a.txt"), Bytes::from_static(b"hello"));

        assert_eq!(stages.open(&key("a.txt")).unwrap(), Bytes::from_static(b"hello"));
        assert_eq!(stages.opened_times(&key("a.txt")), Some(1));
        assert_eq!(stages.staged_bytes(), 5);
    }

    #[test]
    fn test_reinstall_resets_opened_times() {
        let stages = StageMap::new();
        let first = stages.install(key("a.txt"), Bytes::from_static(b"v1"));
        stages.open(&key("a.txt"));
        stages.open(&key("a.txt"));
        assert_eq!(stages.opened_times(&key("a.txt")), Some(2));

        let _second = stages.install(key("a.txt"), Bytes::from_static(b"v2"));
        assert_eq!(stages.opened_times(&key("a.txt")), Some(0));
        first.keep();
    }

    #[test]
    fn test_generations_increase() {
        let stages = StageMap::new();
        let first = stages.install(key("a"), Bytes::new());
        let second = stages.install(key("b"), Bytes::new());

        assert!(second.generation() > first.generation());
    }

    #[test]
    fn test_older_put_does_not_retire_newer_stage() {
        let stages = StageMap::new();
        let older = stages.install(key("a.txt"), Bytes::from_static(b"v1"));
        let newer = stages.install(key("a.txt"), Bytes::from_static(b"v2"));

        // Older write finishes last but no longer owns the slot
        assert!(!older.retire());
        assert_eq!(stages.open(&key("a.txt")).unwrap(), Bytes::from_static(b"v2"));

        assert!(newer.retire());
        assert!(!stages.contains(&key("a.txt")));
    }

    #[test]
    fn test_newer_retires_first_then_older_is_noop() {
        let stages = StageMap::new();
        let older = stages.install(key("a.txt"), Bytes::from_static(b"v1"));
        let newer = stages.install(key("a.txt"), Bytes::from_static(b"v2"));

        assert!(newer.retire());
        assert!(stages.is_empty());

        let latest = stages.install(key("a.txt"), Bytes::from_static(b"v3"));
        assert!(!older.retire());
        assert_eq!(stages.generation(&key("a.txt")), Some(latest.generation()));
        latest.keep();
    }

    #[test]
    fn test_dropped_guard_retires() {
        let stages = StageMap::new();
        {
            let _guard = stages.install(key("a.txt"), Bytes::from_static(b"data"));
            assert!(stages.contains(&key("a.txt")));
        }
        assert!(!stages.contains(&key("a.txt")));
    }

    #[test]
    fn test_kept_guard_leaves_stage() {
        let stages = StageMap::new();
        stages
            .install(key("a.txt"), Bytes::from_static(b"data"))
            .keep();

        assert!(stages.contains(&key("a.txt")));
    }

    #[test]
    fn test_remove_makes_retire_noop() {
        let stages = StageMap::new();
        let guard = stages.install(key("a.txt"), Bytes::from_static(b"data"));

        assert!(stages.remove(&key("a.txt")));
        assert!(!stages.remove(&key("a.txt")));
        assert!(!guard.retire());
    }

    #[test]
    fn test_readers_keep_data_after_retire() {
        let stages = StageMap::new();
        let guard = stages.install(key("a.txt"), Bytes::from_static(b"data"));
        let view = stages.open(&key("a.txt")).unwrap();

        guard.retire();
        assert_eq!(view, Bytes::from_static(b"data"));
    }
}
