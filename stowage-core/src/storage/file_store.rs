//! Filesystem-backed store with an in-memory write-through stage.
//!
//! Files are laid out as `<base_dir>/<path>/<name>`; the directory tree is
//! the only index. A put stages its bytes before any disk I/O so concurrent
//! readers see them at once, then retires the stage when the write is done.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use bytes::Bytes;
use tokio::fs;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt, BufWriter};

use super::handle::{AsyncReader, BlockingReader, FileHandle, ReadMode};
use super::key::{StoreKey, normalize_path};
use super::stage::StageMap;
use super::{Storage, StoreError};
use crate::config::StoreConfig;

/// Options controlling a single put.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PutOptions {
    /// Overwrite an existing file instead of rejecting the put
    pub force: bool,
}

impl PutOptions {
    /// Options that overwrite any existing file.
    pub fn forced() -> Self {
        Self { force: true }
    }
}

/// Result of a put that was accepted.
///
/// The data was readable from the stage either way; this reports whether
/// it also reached disk.
#[derive(Debug)]
pub enum PutOutcome {
    /// Data was fully written to `path`
    Persisted { path: PathBuf, bytes: u64 },
    /// Writing to `path` failed; the data was only ever staged
    NotPersisted { path: PathBuf, error: io::Error },
}

impl PutOutcome {
    /// Whether the data reached disk.
    pub fn is_persisted(&self) -> bool {
        matches!(self, PutOutcome::Persisted { .. })
    }

    /// On-disk destination of the put.
    pub fn path(&self) -> &Path {
        match self {
            PutOutcome::Persisted { path, .. } | PutOutcome::NotPersisted { path, .. } => path,
        }
    }

    /// Converts a failed write into an error, for callers that need durability.
    ///
    /// # Errors
    ///
    /// - `StoreError::Io` - If the data was not persisted
    pub fn into_persisted(self) -> Result<u64, StoreError> {
        match self {
            PutOutcome::Persisted { bytes, .. } => Ok(bytes),
            PutOutcome::NotPersisted { error, .. } => Err(StoreError::Io(error)),
        }
    }
}

/// Point-in-time view of store activity.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoreStats {
    pub staged_entries: usize,
    pub staged_bytes: u64,
    pub cache_reads: u64,
    pub disk_reads: u64,
    pub persisted_writes: u64,
    pub failed_writes: u64,
    pub rejected_writes: u64,
}

#[derive(Debug, Default)]
struct StoreCounters {
    cache_reads: AtomicU64,
    disk_reads: AtomicU64,
    persisted_writes: AtomicU64,
    failed_writes: AtomicU64,
    rejected_writes: AtomicU64,
}

/// Where a lookup found the file.
enum Located {
    Staged(Bytes),
    Persisted(std::fs::File),
}

/// Local file store with staged reads.
///
/// Cloning is cheap; clones share the same stage and counters. Construct
/// one per base directory at startup and hand clones to consumers.
#[derive(Debug, Clone)]
pub struct FileStore {
    config: Arc<StoreConfig>,
    stages: StageMap,
    counters: Arc<StoreCounters>,
}

impl FileStore {
    /// Creates a store rooted at `config.base_dir`.
    ///
    /// No I/O happens until the first operation; directories are created
    /// lazily by puts.
    pub fn new(config: StoreConfig) -> Self {
        Self {
            config: Arc::new(config),
            stages: StageMap::new(),
            counters: Arc::new(StoreCounters::default()),
        }
    }

    /// Root directory of the store.
    pub fn base_dir(&self) -> &Path {
        &self.config.base_dir
    }

    /// Configuration this store was built with.
    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Stages `data` under `(path, name)` and writes it to disk.
    ///
    /// The data is readable through [`FileStore::get`] from the moment this
    /// future is first polled. A failed disk write is reported through
    /// [`PutOutcome::NotPersisted`] rather than as an error.
    ///
    /// When the put is rejected with `AlreadyExists`, the stage stays
    /// readable unless `keep_rejected_stage` is disabled.
    ///
    /// # Errors
    ///
    /// - `StoreError::InvalidKey` - If path or name is malformed; nothing is staged
    /// - `StoreError::AlreadyExists` - If the file exists and `force` is not set
    /// - `StoreError::Io` - If the destination directory cannot be prepared
    pub async fn put(
        &self,
        path: &str,
        name: &str,
        data: impl Into<Bytes>,
        options: PutOptions,
    ) -> Result<PutOutcome, StoreError> {
        let key = StoreKey::new(path, name)?;
        self.put_key(key, data.into(), options).await
    }

    /// Drains `reader` into memory, then behaves as [`FileStore::put`].
    ///
    /// The reader is dropped before the write starts.
    ///
    /// # Errors
    ///
    /// - `StoreError::Io` - If reading the source fails; nothing is staged
    /// - Any error of [`FileStore::put`]
    pub async fn put_reader<R>(
        &self,
        path: &str,
        name: &str,
        mut reader: R,
        options: PutOptions,
    ) -> Result<PutOutcome, StoreError>
    where
        R: AsyncRead + Unpin,
    {
        let key = StoreKey::new(path, name)?;
        let mut buffer = Vec::new();
        reader.read_to_end(&mut buffer).await?;
        drop(reader);

        self.put_key(key, Bytes::from(buffer), options).await
    }

    async fn put_key(
        &self,
        key: StoreKey,
        data: Bytes,
        options: PutOptions,
    ) -> Result<PutOutcome, StoreError> {
        let stage = self.stages.install(key.clone(), data.clone());

        let dir = self.create_dirs(key.path()).await?;
        let file_path = dir.join(key.name());

        if !options.force && fs::try_exists(&file_path).await? {
            self.counters.rejected_writes.fetch_add(1, Ordering::Relaxed);
            if self.config.keep_rejected_stage {
                stage.keep();
            }
            return Err(StoreError::AlreadyExists { path: file_path });
        }

        let outcome = match self.write_file(&file_path, &data).await {
            Ok(bytes) => {
                self.counters
                    .persisted_writes
                    .fetch_add(1, Ordering::Relaxed);
                tracing::debug!("Persisted {} ({} bytes)", key, bytes);
                PutOutcome::Persisted {
                    path: file_path,
                    bytes,
                }
            }
            Err(error) => {
                self.counters.failed_writes.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(
                    "Failed to persist {} to {}: {}",
                    key,
                    file_path.display(),
                    error
                );
                PutOutcome::NotPersisted {
                    path: file_path,
                    error,
                }
            }
        };

        stage.retire();
        Ok(outcome)
    }

    async fn write_file(&self, file_path: &Path, data: &Bytes) -> io::Result<u64> {
        let file = fs::File::create(file_path).await?;
        let mut writer = BufWriter::with_capacity(self.config.copy_buffer_size, file);

        let mut source: &[u8] = data;
        let bytes = tokio::io::copy_buf(&mut source, &mut writer).await?;
        writer.flush().await?;

        if self.config.sync_on_write {
            writer.get_ref().sync_all().await?;
        }

        Ok(bytes)
    }

    /// Opens `(path, name)` for reading, preferring the stage.
    ///
    /// Disk files are opened synchronously, matching the blocking open of
    /// a regular file; reads on an async handle go through the runtime.
    ///
    /// # Errors
    ///
    /// - `StoreError::NotFound` - If the file is neither staged nor on disk
    /// - `StoreError::InvalidKey` - If path or name is malformed
    /// - `StoreError::Io` - If the file exists but cannot be opened
    pub fn get(&self, path: &str, name: &str, mode: ReadMode) -> Result<FileHandle, StoreError> {
        Ok(match self.locate(path, name)? {
            Located::Staged(data) => FileHandle::from_stage(data, mode),
            Located::Persisted(file) => FileHandle::from_file(file, mode),
        })
    }

    /// Opens `(path, name)` for blocking reads.
    ///
    /// # Errors
    ///
    /// Same as [`FileStore::get`].
    pub fn get_blocking(&self, path: &str, name: &str) -> Result<BlockingReader, StoreError> {
        Ok(match self.locate(path, name)? {
            Located::Staged(data) => BlockingReader::from_stage(data),
            Located::Persisted(file) => BlockingReader::from_file(file),
        })
    }

    /// Opens `(path, name)` for async reads.
    ///
    /// # Errors
    ///
    /// Same as [`FileStore::get`].
    pub fn get_async(&self, path: &str, name: &str) -> Result<AsyncReader, StoreError> {
        Ok(match self.locate(path, name)? {
            Located::Staged(data) => AsyncReader::from_stage(data),
            Located::Persisted(file) => AsyncReader::from_file(file),
        })
    }

    fn locate(&self, path: &str, name: &str) -> Result<Located, StoreError> {
        let key = StoreKey::new(path, name)?;

        if let Some(data) = self.stages.open(&key) {
            self.counters.cache_reads.fetch_add(1, Ordering::Relaxed);
            tracing::debug!("Serving {} from stage ({} bytes)", key, data.len());
            return Ok(Located::Staged(data));
        }

        let file_path = key.file_under(self.base_dir());
        let file = match std::fs::File::open(&file_path) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(StoreError::NotFound { key });
            }
            Err(e) => return Err(e.into()),
        };

        // A directory at the file's location is not a stored file
        if file.metadata()?.is_dir() {
            return Err(StoreError::NotFound { key });
        }

        self.counters.disk_reads.fetch_add(1, Ordering::Relaxed);
        tracing::debug!("Serving {} from {}", key, file_path.display());
        Ok(Located::Persisted(file))
    }

    /// Removes `(path, name)` from the stage and from disk.
    ///
    /// Returns `true` if a stage or a disk file was removed. A put still
    /// writing this key will not retire anything afterwards, but its write
    /// may still land on disk.
    ///
    /// # Errors
    ///
    /// - `StoreError::InvalidKey` - If path or name is malformed
    /// - `StoreError::Io` - If removal failed for a reason other than absence
    pub async fn delete(&self, path: &str, name: &str) -> Result<bool, StoreError> {
        let key = StoreKey::new(path, name)?;
        let unstaged = self.stages.remove(&key);

        let file_path = key.file_under(self.base_dir());
        let removed = match fs::remove_file(&file_path).await {
            Ok(()) => true,
            Err(e) if e.kind() == io::ErrorKind::NotFound => false,
            Err(e) => return Err(e.into()),
        };

        if unstaged || removed {
            tracing::info!(
                "Deleted {} (stage: {}, disk: {})",
                key,
                unstaged,
                removed
            );
        }

        Ok(unstaged || removed)
    }

    /// Ensures `<base_dir>/<path>` exists and returns it.
    ///
    /// Missing segments are created one at a time; a segment created
    /// concurrently by someone else is not an error.
    ///
    /// # Errors
    ///
    /// - `StoreError::InvalidKey` - If a path segment is `.` or `..`
    /// - `StoreError::Io` - If a directory cannot be created
    pub async fn prepare_dir(&self, path: &str) -> Result<PathBuf, StoreError> {
        let normalized = normalize_path(path)?;
        self.create_dirs(&normalized).await
    }

    async fn create_dirs(&self, normalized: &str) -> Result<PathBuf, StoreError> {
        fs::create_dir_all(self.base_dir()).await?;

        let mut current = self.base_dir().to_path_buf();
        for segment in normalized.split('/').filter(|s| !s.is_empty()) {
            current.push(segment);

            if fs::try_exists(&current).await? {
                continue;
            }

            match fs::create_dir(&current).await {
                Ok(()) => tracing::debug!("Created directory {}", current.display()),
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {}
                Err(e) => return Err(e.into()),
            }
        }

        Ok(current)
    }

    /// Whether `(path, name)` currently has a stage.
    pub fn is_staged(&self, path: &str, name: &str) -> bool {
        StoreKey::new(path, name)
            .map(|key| self.stages.contains(&key))
            .unwrap_or(false)
    }

    /// Reads served from the live stage of `(path, name)`, if staged.
    pub fn opened_times(&self, path: &str, name: &str) -> Option<u64> {
        let key = StoreKey::new(path, name).ok()?;
        self.stages.opened_times(&key)
    }

    /// Current stage occupancy and lifetime counters.
    pub fn stats(&self) -> StoreStats {
        StoreStats {
            staged_entries: self.stages.len(),
            staged_bytes: self.stages.staged_bytes(),
            cache_reads: self.counters.cache_reads.load(Ordering::Relaxed),
            disk_reads: self.counters.disk_reads.load(Ordering::Relaxed),
            persisted_writes: self.counters.persisted_writes.load(Ordering::Relaxed),
            failed_writes: self.counters.failed_writes.load(Ordering::Relaxed),
            rejected_writes: self.counters.rejected_writes.load(Ordering::Relaxed),
        }
    }
}

#[async_trait]
impl Storage for FileStore {
    async fn put(
        &self,
        path: &str,
        name: &str,
        data: Bytes,
        options: PutOptions,
    ) -> Result<PutOutcome, StoreError> {
        FileStore::put(self, path, name, data, options).await
    }

    fn get(&self, path: &str, name: &str, mode: ReadMode) -> Result<FileHandle, StoreError> {
        FileStore::get(self, path, name, mode)
    }

    async fn delete(&self, path: &str, name: &str) -> Result<bool, StoreError> {
        FileStore::delete(self, path, name).await
    }
}
