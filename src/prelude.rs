//! Prelude module for convenient imports
//!
//! ```
//! use typed_scanner::prelude::*;
//! ```
//!
//! # Re-exported Items
//!
//! ## Core Types
//! - [`Arena`] - Bump allocator handing out stable spans
//! - [`Span`] - Handle to arena bytes (16 bytes, Copy)
//! - [`ScanArenas`] - Header/row arena pair
//! - [`RecordView`] - Borrowed view of one record
//!
//! ## Reading and Tokenizing
//! - [`ChunkReader`] - Chunked line reader
//! - [`CsvFsm`] - CSV tokenizer
//! - [`JsonlTokenizer`] - JSONL tokenizer
//!
//! ## Scanning
//! - [`Scanner`] - Scan driver
//! - [`ScanSummary`] - Per-scan statistics
//! - [`ParsePolicy`] - Type coercion rules

// ============================================================================
// Core Types
// ============================================================================

pub use crate::scanner::{Arena, RecordView, ScanArenas, Span};

// ============================================================================
// Reading and Tokenizing
// ============================================================================

pub use crate::scanner::{
    ChunkConfig, ChunkReader, CsvConfig, CsvFsm, JsonlConfig, JsonlTokenizer, ReadOutcome,
};

// ============================================================================
// Scanning
// ============================================================================

pub use crate::scanner::{
    scan_path, scan_reader, FieldKind, FileFormat, OnError, ParsePolicy, ScanConfig, ScanSummary,
    Scanner,
};

// ============================================================================
// Errors
// ============================================================================

pub use crate::scanner::{ArenaError, ScanError, TokenizeError};
