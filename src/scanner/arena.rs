//! Block-chained bump arena for record storage
//!
//! The arena hands out [`Span`] handles instead of raw pointers. A span names
//! a block, an offset and a length, so resolving it is O(1) and safe.
//!
//! # Growth
//!
//! Storage is a chain of fixed-size blocks. A block is never reallocated once
//! bytes have been handed out from it; when a request does not fit, a new
//! block is appended so that total capacity grows to at least
//! `max(needed, capacity + capacity / 2 + 1)`. Every span issued in the
//! current generation therefore stays byte-identical until the next reset.
//!
//! # Generations
//!
//! [`Arena::reset`] rewinds the cursor and starts a new generation. Spans
//! carry the generation that produced them, so a span kept across a reset is
//! reported as stale by [`Arena::try_get`] instead of reading recycled bytes.

use super::error::ArenaError;
use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};

/// Seed for per-arena generation stamps
static NEXT_STAMP: AtomicU32 = AtomicU32::new(1);

/// Scatter factor so that independent arenas start far apart
const STAMP_SCATTER: u32 = 0x9E37_79B9;

/// Largest single allocation (spans store 32-bit lengths)
pub const MAX_ALLOC_BYTES: usize = u32::MAX as usize;

/// Handle to bytes stored in an [`Arena`] (16 bytes, Copy)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Span {
    block: u32,
    offset: u32,
    len: u32,
    generation: u32,
}

impl Span {
    /// The empty span; resolves to `b""` in every arena and generation
    pub const EMPTY: Span = Span {
        block: 0,
        offset: 0,
        len: 0,
        generation: 0,
    };

    /// Length of the referenced bytes
    #[inline]
    pub fn len(&self) -> usize {
        self.len as usize
    }

    /// Whether the span references no bytes
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Generation of the arena that produced this span
    #[inline]
    pub fn generation(&self) -> u32 {
        self.generation
    }

    /// Narrow the span to `len` bytes from its start
    #[inline]
    pub fn prefix(self, len: usize) -> Span {
        if len == 0 {
            return Span::EMPTY;
        }
        Span {
            len: self.len.min(len as u32),
            ..self
        }
    }

    /// Sub-span `[start, end)` relative to this span, clamped to its length
    #[inline]
    pub fn slice(self, start: usize, end: usize) -> Span {
        let end = end.min(self.len as usize);
        let start = start.min(end);
        if start == end {
            return Span::EMPTY;
        }
        Span {
            offset: self.offset + start as u32,
            len: (end - start) as u32,
            ..self
        }
    }
}

impl Default for Span {
    fn default() -> Self {
        Span::EMPTY
    }
}

/// A fixed-size storage block
struct Block {
    data: Box<[u8]>,
    used: usize,
}

impl Block {
    fn new(size: usize) -> Self {
        Self {
            data: vec![0u8; size].into_boxed_slice(),
            used: 0,
        }
    }

    #[inline]
    fn remaining(&self) -> usize {
        self.data.len() - self.used
    }
}

/// Bump allocator over a chain of blocks
pub struct Arena {
    blocks: Vec<Block>,
    /// Index of the block currently being filled
    current: usize,
    /// Bytes handed out in this generation
    used: usize,
    capacity: usize,
    high_water: usize,
    generation: u32,
}

impl Default for Arena {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Arena {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Arena")
            .field("blocks", &self.blocks.len())
            .field("used", &self.used)
            .field("capacity", &self.capacity)
            .field("high_water", &self.high_water)
            .field("generation", &self.generation)
            .finish()
    }
}

impl Arena {
    /// Create an arena with no storage; the first allocation creates a block
    #[inline]
    pub fn new() -> Self {
        Self::with_capacity(0)
    }

    /// Create an arena with one block of `capacity` bytes
    pub fn with_capacity(capacity: usize) -> Self {
        let mut blocks = Vec::with_capacity(4);
        if capacity > 0 {
            blocks.push(Block::new(capacity.min(MAX_ALLOC_BYTES)));
        }
        let capacity = blocks.iter().map(|b| b.data.len()).sum();
        let stamp = NEXT_STAMP.fetch_add(1, Ordering::Relaxed);
        Self {
            blocks,
            current: 0,
            used: 0,
            capacity,
            high_water: 0,
            // Never 0, so a zeroed span is never mistaken for a live one
            generation: stamp.wrapping_mul(STAMP_SCATTER) | 1,
        }
    }

    /// Allocate `n` zeroed bytes
    ///
    /// Returns the span naming the storage and a writable view of it. The
    /// storage is exclusively owned by the caller until the next reset.
    ///
    /// # Errors
    /// Returns [`ArenaError::TooLarge`] if `n` exceeds [`MAX_ALLOC_BYTES`].
    pub fn alloc(&mut self, n: usize) -> Result<(Span, &mut [u8]), ArenaError> {
        let span = self.bump(n)?;
        if span.is_empty() {
            let empty: &mut [u8] = &mut [];
            return Ok((span, empty));
        }
        let block = &mut self.blocks[span.block as usize];
        let out = &mut block.data[span.offset as usize..(span.offset + span.len) as usize];
        out.fill(0);
        Ok((span, out))
    }

    /// Copy `bytes` into the arena
    ///
    /// Copying an empty slice returns [`Span::EMPTY`] without allocating.
    #[inline]
    pub fn copy(&mut self, bytes: &[u8]) -> Result<Span, ArenaError> {
        let span = self.bump(bytes.len())?;
        if !span.is_empty() {
            let block = &mut self.blocks[span.block as usize];
            block.data[span.offset as usize..(span.offset + span.len) as usize]
                .copy_from_slice(bytes);
        }
        Ok(span)
    }

    /// Copy several parts into one contiguous span
    pub fn copy_concat(&mut self, parts: &[&[u8]]) -> Result<Span, ArenaError> {
        let total = parts.iter().map(|p| p.len()).sum();
        let span = self.bump(total)?;
        if !span.is_empty() {
            let block = &mut self.blocks[span.block as usize];
            let mut at = span.offset as usize;
            for part in parts {
                block.data[at..at + part.len()].copy_from_slice(part);
                at += part.len();
            }
        }
        Ok(span)
    }

    /// Resolve a span to its bytes
    ///
    /// Stale or foreign spans resolve to an empty slice; use
    /// [`Arena::try_get`] to detect them.
    #[inline]
    pub fn get(&self, span: Span) -> &[u8] {
        debug_assert!(
            span.is_empty() || span.generation == self.generation,
            "span from generation {} read in generation {}",
            span.generation,
            self.generation
        );
        self.try_get(span).unwrap_or_default()
    }

    /// Resolve a span, reporting stale or out-of-range handles
    pub fn try_get(&self, span: Span) -> Result<&[u8], ArenaError> {
        if span.is_empty() {
            return Ok(&[]);
        }
        if span.generation != self.generation {
            return Err(ArenaError::StaleSpan {
                span_generation: span.generation,
                arena_generation: self.generation,
            });
        }
        let start = span.offset as usize;
        let end = start + span.len as usize;
        self.blocks
            .get(span.block as usize)
            .filter(|b| end <= b.used)
            .map(|b| &b.data[start..end])
            .ok_or(ArenaError::OutOfBounds {
                block: span.block,
                offset: span.offset,
                len: span.len,
            })
    }

    /// Resolve a span as UTF-8 text
    #[inline]
    pub fn get_str(&self, span: Span) -> Option<&str> {
        std::str::from_utf8(self.get(span)).ok()
    }

    /// Rewind to zero and start a new generation; storage is kept
    #[inline]
    pub fn reset(&mut self) {
        for block in self.blocks.iter_mut().take(self.current + 1) {
            block.used = 0;
        }
        self.current = 0;
        self.used = 0;
        self.generation = self.generation.wrapping_add(2);
    }

    /// Reset and release storage beyond `keep` bytes
    ///
    /// Blocks are kept while they fit in `keep`; if none fit, a single fresh
    /// block of `keep` bytes replaces them.
    pub fn reset_and_shrink(&mut self, keep: usize) {
        self.reset();
        let mut kept = 0;
        let mut total = 0;
        for block in &self.blocks {
            if total + block.data.len() > keep {
                break;
            }
            total += block.data.len();
            kept += 1;
        }
        self.blocks.truncate(kept);
        if self.blocks.is_empty() && keep > 0 {
            self.blocks.push(Block::new(keep.min(MAX_ALLOC_BYTES)));
        }
        self.capacity = self.blocks.iter().map(|b| b.data.len()).sum();
        self.high_water = self.high_water.min(self.capacity);
    }

    /// Bytes handed out since the last reset
    #[inline]
    pub fn used(&self) -> usize {
        self.used
    }

    /// Total bytes of storage owned
    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Largest `used()` ever observed (clamped by shrinking)
    #[inline]
    pub fn high_water(&self) -> usize {
        self.high_water
    }

    /// Number of blocks in the chain
    #[inline]
    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }

    /// Current generation stamp
    #[inline]
    pub fn generation(&self) -> u32 {
        self.generation
    }

    /// Reserve `n` bytes and return their span
    fn bump(&mut self, n: usize) -> Result<Span, ArenaError> {
        if n == 0 {
            return Ok(Span::EMPTY);
        }
        if n > MAX_ALLOC_BYTES {
            return Err(ArenaError::TooLarge { requested: n });
        }

        // Blocks kept across a reset are reused before new ones are chained
        while self.current < self.blocks.len() && self.blocks[self.current].remaining() < n {
            if self.current + 1 == self.blocks.len() {
                break;
            }
            self.current += 1;
        }

        let fits = self
            .blocks
            .get(self.current)
            .is_some_and(|b| b.remaining() >= n);
        if !fits {
            let size = n.max(self.capacity / 2 + 1).min(MAX_ALLOC_BYTES);
            self.blocks.push(Block::new(size));
            self.capacity += size;
            self.current = self.blocks.len() - 1;
        }

        let block = &mut self.blocks[self.current];
        let offset = block.used;
        block.used += n;
        self.used += n;
        self.high_water = self.high_water.max(self.used);

        Ok(Span {
            block: self.current as u32,
            offset: offset as u32,
            len: n as u32,
            generation: self.generation,
        })
    }
}
