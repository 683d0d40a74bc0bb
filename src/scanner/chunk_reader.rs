//! Chunked line reader
//!
//! Reads a byte source in fixed-size chunks and yields complete logical lines,
//! independent of where chunk boundaries fall.
//!
//! # Overview
//!
//! ```text
//!  chunk 0            chunk 1            chunk 2
//! [id,name\n1,al|ice\n2,bob\n3,c|arol\n]
//!               └── carry ──┘    └─ carry ─┘
//! ```
//!
//! Bytes after the last `\n` of a chunk are carried over and completed by the
//! next chunk. A line longer than `max_record_bytes` is either dropped
//! entirely or truncated and emitted once; the rest of that logical line is
//! discarded up to the next `\n`.
//!
//! # Usage
//!
//! ```rust
//! use std::io::Cursor;
//! use std::ops::ControlFlow;
//! use typed_scanner::scanner::chunk_reader::{ChunkConfig, ChunkReader, ReadOutcome};
//!
//! let mut reader = ChunkReader::new(Cursor::new("a\r\nb\nc"), ChunkConfig::default());
//! let mut lines = Vec::new();
//! let outcome = reader
//!     .for_each_line(|line| {
//!         lines.push(line.to_vec());
//!         ControlFlow::Continue(())
//!     })
//!     .unwrap();
//!
//! assert_eq!(outcome, ReadOutcome::Completed);
//! assert_eq!(lines, vec![b"a".to_vec(), b"b".to_vec(), b"c".to_vec()]);
//! assert_eq!(reader.bytes_read(), 6);
//! ```

use super::error::ScanError;
use memchr::memchr;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs::File;
use std::io::{ErrorKind, Read};
use std::ops::ControlFlow;
use std::path::{Path, PathBuf};

/// Default I/O chunk size: 512 KiB
pub const DEFAULT_CHUNK_BYTES: usize = 512 * 1024;

/// Default per-line guard: 8 MiB
pub const DEFAULT_MAX_RECORD_BYTES: usize = 8 * 1024 * 1024;

/// Configuration for [`ChunkReader`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkConfig {
    /// Bytes requested per read
    pub chunk_bytes: usize,

    /// Longest logical line accepted, excluding the `\n`
    pub max_record_bytes: usize,

    /// Trim one trailing `\r` from emitted lines
    pub strip_cr: bool,

    /// Drop oversize lines instead of truncating them
    pub drop_oversize: bool,
}

impl Default for ChunkConfig {
    fn default() -> Self {
        Self {
            chunk_bytes: DEFAULT_CHUNK_BYTES,
            max_record_bytes: DEFAULT_MAX_RECORD_BYTES,
            strip_cr: true,
            drop_oversize: true,
        }
    }
}

impl ChunkConfig {
    /// Create a new config with default values
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Configuration for small inputs (64 KiB chunks, 1 MiB guard)
    #[inline]
    pub fn small() -> Self {
        Self {
            chunk_bytes: 64 * 1024,
            max_record_bytes: 1024 * 1024,
            ..Self::default()
        }
    }

    /// Configuration for large inputs (4 MiB chunks, 64 MiB guard)
    #[inline]
    pub fn large() -> Self {
        Self {
            chunk_bytes: 4 * 1024 * 1024,
            max_record_bytes: 64 * 1024 * 1024,
            ..Self::default()
        }
    }

    /// Set the I/O chunk size
    pub fn with_chunk_bytes(mut self, bytes: usize) -> Self {
        self.chunk_bytes = bytes;
        self
    }

    /// Set the per-line guard
    pub fn with_max_record_bytes(mut self, bytes: usize) -> Self {
        self.max_record_bytes = bytes;
        self
    }

    /// Enable or disable trailing `\r` removal
    pub fn with_strip_cr(mut self, strip: bool) -> Self {
        self.strip_cr = strip;
        self
    }

    /// Drop (true) or truncate (false) oversize lines
    pub fn with_drop_oversize(mut self, drop: bool) -> Self {
        self.drop_oversize = drop;
        self
    }

    /// Check that sizes are usable
    pub fn validate(&self) -> Result<(), ScanError> {
        if self.chunk_bytes == 0 {
            return Err(ScanError::Config("chunk_bytes must be > 0".to_string()));
        }
        if self.max_record_bytes == 0 {
            return Err(ScanError::Config(
                "max_record_bytes must be > 0".to_string(),
            ));
        }
        Ok(())
    }
}

/// How [`ChunkReader::for_each_line`] finished
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadOutcome {
    /// The source was read to end of file
    Completed,
    /// The line callback asked to stop
    Cancelled,
}

/// Counters kept while reading
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReaderStats {
    /// Bytes consumed from the source, including dropped bytes
    pub bytes_read: u64,
    /// Reads that returned data
    pub chunks_read: u64,
    /// Lines passed to the callback
    pub lines_emitted: u64,
    /// Oversize lines discarded
    pub lines_dropped: u64,
    /// Oversize lines cut to the guard and emitted
    pub lines_truncated: u64,
}

/// Reassembles logical lines from a chunked byte source
pub struct ChunkReader<R> {
    source: R,
    path: PathBuf,
    config: ChunkConfig,
    stats: ReaderStats,
    last_error: Option<i32>,
    buffer: Vec<u8>,
    carry: Vec<u8>,
}

impl<R> fmt::Debug for ChunkReader<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChunkReader")
            .field("path", &self.path)
            .field("config", &self.config)
            .field("stats", &self.stats)
            .field("carry", &self.carry.len())
            .finish()
    }
}

impl ChunkReader<File> {
    /// Open a file for reading
    ///
    /// # Errors
    /// Returns [`ScanError::Io`] carrying the OS error if the file cannot be
    /// opened, or [`ScanError::Config`] for unusable sizes.
    pub fn open(path: impl AsRef<Path>, config: ChunkConfig) -> Result<Self, ScanError> {
        config.validate()?;
        let path = path.as_ref();
        let file = File::open(path).map_err(|source| ScanError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut reader = Self::new(file, config);
        reader.path = path.to_path_buf();
        Ok(reader)
    }
}

impl<R: Read> ChunkReader<R> {
    /// Wrap any byte source
    pub fn new(source: R, config: ChunkConfig) -> Self {
        Self {
            source,
            path: PathBuf::new(),
            buffer: Vec::new(),
            carry: Vec::with_capacity(256),
            config,
            stats: ReaderStats::default(),
            last_error: None,
        }
    }

    /// Feed every logical line to `on_line`
    ///
    /// The slice passed to `on_line` is only valid during the call. Returning
    /// [`ControlFlow::Break`] stops reading immediately.
    ///
    /// # Errors
    /// A read error aborts the whole pass with [`ScanError::Io`]; the OS
    /// error code is also kept in [`ChunkReader::last_error`].
    pub fn for_each_line<F>(&mut self, mut on_line: F) -> Result<ReadOutcome, ScanError>
    where
        F: FnMut(&[u8]) -> ControlFlow<()>,
    {
        let chunk_bytes = self.config.chunk_bytes.max(1);
        let max = self.config.max_record_bytes;
        self.buffer.resize(chunk_bytes, 0);

        // Discarding the remainder of an oversize line
        let mut skipping = false;

        loop {
            let n = match self.source.read(&mut self.buffer) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(source) => {
                    self.last_error = source.raw_os_error();
                    log_warn!("read failed on {}: {}", self.path.display(), source);
                    return Err(ScanError::Io {
                        path: self.path.clone(),
                        source,
                    });
                }
            };
            self.stats.bytes_read += n as u64;
            self.stats.chunks_read += 1;

            let mut block = &self.buffer[..n];
            while !block.is_empty() {
                let Some(pos) = memchr(b'\n', block) else {
                    // Unfinished line: carry it over, minding the guard
                    if skipping {
                        break;
                    }
                    if self.carry.len() + block.len() > max {
                        skipping = true;
                        if self.config.drop_oversize {
                            self.stats.lines_dropped += 1;
                            log_debug!("dropping oversize line (> {} bytes)", max);
                            self.carry.clear();
                        } else {
                            let left = max - self.carry.len();
                            self.carry.extend_from_slice(&block[..left]);
                            self.stats.lines_truncated += 1;
                            log_debug!("truncating oversize line to {} bytes", max);
                            let flow =
                                emit(&self.config, &mut self.stats, &self.carry, &mut on_line);
                            self.carry.clear();
                            if flow.is_break() {
                                return Ok(ReadOutcome::Cancelled);
                            }
                        }
                    } else {
                        self.carry.extend_from_slice(block);
                    }
                    break;
                };

                let slice = &block[..pos];
                block = &block[pos + 1..];

                if skipping {
                    skipping = false;
                    continue;
                }

                let flow = if self.carry.is_empty() {
                    emit(&self.config, &mut self.stats, slice, &mut on_line)
                } else {
                    self.carry.extend_from_slice(slice);
                    let flow = emit(&self.config, &mut self.stats, &self.carry, &mut on_line);
                    self.carry.clear();
                    flow
                };
                if flow.is_break() {
                    return Ok(ReadOutcome::Cancelled);
                }
            }
        }

        if !self.carry.is_empty() && !skipping {
            let flow = emit(&self.config, &mut self.stats, &self.carry, &mut on_line);
            self.carry.clear();
            if flow.is_break() {
                return Ok(ReadOutcome::Cancelled);
            }
        }
        self.carry.clear();

        Ok(ReadOutcome::Completed)
    }

    /// Total bytes consumed from the source
    #[inline]
    pub fn bytes_read(&self) -> u64 {
        self.stats.bytes_read
    }

    /// Counters for the lines seen so far
    #[inline]
    pub fn stats(&self) -> ReaderStats {
        self.stats
    }

    /// OS error code of the last failed read, if any
    #[inline]
    pub fn last_error(&self) -> Option<i32> {
        self.last_error
    }

    /// The reader configuration
    #[inline]
    pub fn config(&self) -> &ChunkConfig {
        &self.config
    }

    /// Source path (empty for in-memory sources)
    #[inline]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Release the underlying source
    pub fn into_inner(self) -> R {
        self.source
    }
}

/// Apply the guard and CR trimming, then hand the line to the callback
#[inline]
fn emit<F>(config: &ChunkConfig, stats: &mut ReaderStats, line: &[u8], on_line: &mut F) -> ControlFlow<()>
where
    F: FnMut(&[u8]) -> ControlFlow<()>,
{
    let mut line = line;
    if line.len() > config.max_record_bytes {
        if config.drop_oversize {
            stats.lines_dropped += 1;
            log_debug!("dropping oversize line ({} bytes)", line.len());
            return ControlFlow::Continue(());
        }
        line = &line[..config.max_record_bytes];
        stats.lines_truncated += 1;
    }
    if config.strip_cr {
        if let Some(stripped) = line.strip_suffix(b"\r") {
            line = stripped;
        }
    }
    stats.lines_emitted += 1;
    on_line(line)
}
