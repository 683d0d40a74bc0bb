//! Record views over arena storage
//!
//! A [`RecordView`] pairs an optional header (spans in the long-lived header
//! arena) with the fields of one record (spans in the short-lived row arena).
//! It borrows both arenas, so the row arena cannot be reset while a view is
//! alive.

use super::arena::{Arena, Span};

/// Default initial size of the header arena: 64 KiB
pub const DEFAULT_HEADER_ARENA_BYTES: usize = 64 * 1024;

/// Default initial size of the row arena: 16 MiB
pub const DEFAULT_ROW_ARENA_BYTES: usize = 16 * 1024 * 1024;

/// The header/row arena pair owned by one tokenizer
#[derive(Debug, Default)]
pub struct ScanArenas {
    /// Column and key names; lives for the whole scan
    pub header: Arena,
    /// Per-record field values; reset frequently
    pub row: Arena,
}

impl ScanArenas {
    /// Create arenas with the given initial capacities
    pub fn with_capacity(header_bytes: usize, row_bytes: usize) -> Self {
        Self {
            header: Arena::with_capacity(header_bytes),
            row: Arena::with_capacity(row_bytes),
        }
    }

    /// Arenas sized for a typical file scan
    pub fn for_scan() -> Self {
        Self::with_capacity(DEFAULT_HEADER_ARENA_BYTES, DEFAULT_ROW_ARENA_BYTES)
    }
}

/// Read-only view of one tokenized record
#[derive(Clone, Copy)]
pub struct RecordView<'a> {
    header: Option<&'a [Span]>,
    fields: &'a [Span],
    arenas: &'a ScanArenas,
}

impl<'a> RecordView<'a> {
    /// Pair a header and fields resolved against `arenas`
    #[inline]
    pub fn new(header: Option<&'a [Span]>, fields: &'a [Span], arenas: &'a ScanArenas) -> Self {
        Self {
            header,
            fields,
            arenas,
        }
    }

    /// Number of fields
    #[inline]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Whether the record has no fields
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Field `i`, or an empty slice when out of range
    #[inline]
    pub fn at(&self, i: usize) -> &'a [u8] {
        self.fields
            .get(i)
            .map(|&s| self.arenas.row.get(s))
            .unwrap_or_default()
    }

    /// Field `i` as UTF-8 text
    #[inline]
    pub fn str_at(&self, i: usize) -> Option<&'a str> {
        std::str::from_utf8(self.at(i)).ok()
    }

    /// Column name for field `i`, or an empty slice without a header
    #[inline]
    pub fn colname(&self, i: usize) -> &'a [u8] {
        self.header
            .and_then(|h| h.get(i))
            .map(|&s| self.arenas.header.get(s))
            .unwrap_or_default()
    }

    /// Look a field up by column name
    pub fn get(&self, name: &[u8]) -> Option<&'a [u8]> {
        let header = self.header?;
        let i = header
            .iter()
            .position(|&s| self.arenas.header.get(s) == name)?;
        Some(self.at(i))
    }

    /// Header spans, if the record has a header
    #[inline]
    pub fn header(&self) -> Option<&'a [Span]> {
        self.header
    }

    /// Field spans
    #[inline]
    pub fn fields(&self) -> &'a [Span] {
        self.fields
    }

    /// Iterate over field values
    pub fn iter(&self) -> impl Iterator<Item = &'a [u8]> + 'a {
        let row = &self.arenas.row;
        self.fields.iter().map(move |&s| row.get(s))
    }

    /// Iterate over `(column name, value)` pairs; names are empty without a header
    pub fn pairs(&self) -> impl Iterator<Item = (&'a [u8], &'a [u8])> + 'a {
        let view = *self;
        (0..self.fields.len()).map(move |i| (view.colname(i), view.at(i)))
    }

    /// Copy the fields out as owned strings (lossy UTF-8)
    pub fn to_strings(&self) -> Vec<String> {
        self.iter()
            .map(|b| String::from_utf8_lossy(b).into_owned())
            .collect()
    }
}

impl std::fmt::Debug for RecordView<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.iter().map(String::from_utf8_lossy))
            .finish()
    }
}
