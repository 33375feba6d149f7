//! Read handles over staged or persisted files.
//!
//! Callers get the same read interface whether the bytes come from the
//! in-memory stage or from disk. Dropping a handle over staged bytes only
//! releases the handle's own view; the stage itself is unaffected.

use std::io::{self, Cursor, Read, Seek, SeekFrom};
use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::Bytes;
use tokio::io::{AsyncRead, AsyncSeek, ReadBuf};

/// How the caller intends to read a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadMode {
    /// `std::io::Read` on the calling thread
    Blocking,
    /// `tokio::io::AsyncRead` inside a runtime
    Async,
}

/// Where a handle's bytes come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadSource {
    /// In-memory stage of a file still being persisted
    Cache,
    /// Persisted file under the base directory
    Disk,
}

/// Blocking reader over a staged or persisted file.
#[derive(Debug)]
pub enum BlockingReader {
    Memory(Cursor<Bytes>),
    Disk(std::fs::File),
}

impl BlockingReader {
    pub(crate) fn from_stage(data: Bytes) -> Self {
        BlockingReader::Memory(Cursor::new(data))
    }

    pub(crate) fn from_file(file: std::fs::File) -> Self {
        BlockingReader::Disk(file)
    }

    /// Where this reader's bytes come from.
    pub fn source(&self) -> ReadSource {
        match self {
            BlockingReader::Memory(_) => ReadSource::Cache,
            BlockingReader::Disk(_) => ReadSource::Disk,
        }
    }
}

impl Read for BlockingReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            BlockingReader::Memory(cursor) => cursor.read(buf),
            BlockingReader::Disk(file) => file.read(buf),
        }
    }
}

impl Seek for BlockingReader {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        match self {
            BlockingReader::Memory(cursor) => cursor.seek(pos),
            BlockingReader::Disk(file) => file.seek(pos),
        }
    }
}

/// Non-blocking reader over a staged or persisted file.
#[derive(Debug)]
pub enum AsyncReader {
    Memory(Cursor<Bytes>),
    Disk(tokio::fs::File),
}

impl AsyncReader {
    pub(crate) fn from_stage(data: Bytes) -> Self {
        AsyncReader::Memory(Cursor::new(data))
    }

    pub(crate) fn from_file(file: std::fs::File) -> Self {
        AsyncReader::Disk(tokio::fs::File::from_std(file))
    }

    /// Where this reader's bytes come from.
    pub fn source(&self) -> ReadSource {
        match self {
            AsyncReader::Memory(_) => ReadSource::Cache,
            AsyncReader::Disk(_) => ReadSource::Disk,
        }
    }
}

impl AsyncRead for AsyncReader {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        match self.get_mut() {
            AsyncReader::Memory(cursor) => Pin::new(cursor).poll_read(cx, buf),
            AsyncReader::Disk(file) => Pin::new(file).poll_read(cx, buf),
        }
    }
}

impl AsyncSeek for AsyncReader {
    fn start_seek(self: Pin<&mut Self>, position: SeekFrom) -> io::Result<()> {
        match self.get_mut() {
            AsyncReader::Memory(cursor) => Pin::new(cursor).start_seek(position),
            AsyncReader::Disk(file) => Pin::new(file).start_seek(position),
        }
    }

    fn poll_complete(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<u64>> {
        match self.get_mut() {
            AsyncReader::Memory(cursor) => Pin::new(cursor).poll_complete(cx),
            AsyncReader::Disk(file) => Pin::new(file).poll_complete(cx),
        }
    }
}

/// Reader in the mode the caller asked for.
#[derive(Debug)]
pub enum FileHandle {
    Blocking(BlockingReader),
    Async(AsyncReader),
}

impl FileHandle {
    /// Wraps staged bytes for reading in `mode`.
    pub(crate) fn from_stage(data: Bytes, mode: ReadMode) -> Self {
        match mode {
            ReadMode::Blocking => FileHandle::Blocking(BlockingReader::from_stage(data)),
            ReadMode::Async => FileHandle::Async(AsyncReader::from_stage(data)),
        }
    }

    /// Wraps an opened file for reading in `mode`.
    pub(crate) fn from_file(file: std::fs::File, mode: ReadMode) -> Self {
        match mode {
            ReadMode::Blocking => FileHandle::Blocking(BlockingReader::from_file(file)),
            ReadMode::Async => FileHandle::Async(AsyncReader::from_file(file)),
        }
    }

    /// Mode of this handle.
    pub fn mode(&self) -> ReadMode {
        match self {
            FileHandle::Blocking(_) => ReadMode::Blocking,
            FileHandle::Async(_) => ReadMode::Async,
        }
    }

    /// Where this handle's bytes come from.
    pub fn source(&self) -> ReadSource {
        match self {
            FileHandle::Blocking(reader) => reader.source(),
            FileHandle::Async(reader) => reader.source(),
        }
    }

    /// Returns the blocking reader, if this handle is blocking.
    pub fn into_blocking(self) -> Option<BlockingReader> {
        match self {
            FileHandle::Blocking(reader) => Some(reader),
            FileHandle::Async(_) => None,
        }
    }

    /// Returns the async reader, if this handle is async.
    pub fn into_async(self) -> Option<AsyncReader> {
        match self {
            FileHandle::Async(reader) => Some(reader),
            FileHandle::Blocking(_) => None,
        }
    }
}
