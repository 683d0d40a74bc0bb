//! Ingestion pipeline for CSV and JSONL files
//!
//! # Module Organization
//!
//! ## Storage
//! - [`arena`] - Block-chained bump allocator with generation-checked spans
//! - [`record`] - Header/row arena pair and the borrowed [`RecordView`]
//!
//! ## Reading
//! - [`chunk_reader`] - Fixed-size chunked reads reassembled into lines
//!
//! ## Tokenizing
//! - [`csv`] - Quote-aware CSV state machine
//! - [`jsonl`] - JSON Lines flattening with a frozen header
//!
//! ## Typing
//! - [`policy`] - Number, boolean, date and null coercion
//! - [`date`] - ISO-8601 parsing to epoch milliseconds
//! - [`profile`] - Per-column kind inference and error counting
//!
//! ## Driving
//! - [`scan`] - Format detection, tokenizer dispatch and scan summaries
//! - [`error`] - Error types

// ============================================================================
// Module Declarations
// ============================================================================

pub mod arena;
pub mod chunk_reader;
pub mod csv;
pub mod date;
pub mod error;
pub mod jsonl;
pub mod policy;
pub mod profile;
pub mod record;
pub mod scan;

// ============================================================================
// Storage
// ============================================================================

pub use arena::{Arena, Span, MAX_ALLOC_BYTES};
pub use record::{RecordView, ScanArenas, DEFAULT_HEADER_ARENA_BYTES, DEFAULT_ROW_ARENA_BYTES};

// ============================================================================
// Reading
// ============================================================================

pub use chunk_reader::{
    ChunkConfig, ChunkReader, ReadOutcome, ReaderStats, DEFAULT_CHUNK_BYTES,
    DEFAULT_MAX_RECORD_BYTES,
};

// ============================================================================
// Tokenizing
// ============================================================================

pub use csv::{CsvConfig, CsvFsm};
pub use jsonl::{JsonlConfig, JsonlScratch, JsonlTokenizer, DEFAULT_CAP_NESTED_VALUE_BYTES};

// ============================================================================
// Typing
// ============================================================================

pub use date::parse_iso8601_ms;
pub use policy::{is_null_token, BoolPolicy, DateMode, DatePolicy, FieldKind, OnError, ParsePolicy};
pub use profile::{ColumnProfile, FieldProfiler, KindCounts};

// ============================================================================
// Driving
// ============================================================================

pub use error::{ArenaError, ScanError, TokenizeError};
pub use scan::{
    scan_path, scan_reader, FileFormat, ScanConfig, ScanSummary, Scanner, Tokenizer,
    DEFAULT_RESET_EVERY_ROWS,
};
