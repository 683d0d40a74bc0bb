//! Typed Scanner - arena-backed CSV and JSONL ingestion
//!
//! Reads large delimited-text and newline-delimited JSON files and turns each
//! record into a borrowed, arena-backed view with near-zero per-record heap
//! allocation. It provides:
//! - A block-chained bump arena whose spans never move
//! - A chunked line reader that reassembles lines across read boundaries
//! - A quote-aware CSV state machine
//! - A JSONL tokenizer that flattens objects onto a stable header
//! - Field type coercion (number, boolean, ISO-8601 date, null)
//! - A scan driver that profiles columns and reports throughput
//!
//! ## Quick Start
//!
//! ```rust
//! use std::io::Cursor;
//! use std::ops::ControlFlow;
//! use typed_scanner::{scan_reader, FileFormat, ScanConfig};
//!
//! let input = "id,name\n1,ada\n2,grace\n";
//! let mut names = Vec::new();
//! let summary = scan_reader(Cursor::new(input), FileFormat::Csv, &ScanConfig::default(), |rv| {
//!     names.push(String::from_utf8_lossy(rv.get(b"name").unwrap_or_default()).into_owned());
//!     ControlFlow::Continue(())
//! })
//! .unwrap();
//!
//! assert_eq!(summary.rows, 2);
//! assert_eq!(names, vec!["ada", "grace"]);
//! ```
//!
//! ## Tokenizing Lines Directly
//!
//! ```rust
//! use typed_scanner::scanner::{JsonlConfig, JsonlTokenizer, ScanArenas};
//!
//! let mut tok = JsonlTokenizer::new(JsonlConfig::default(), ScanArenas::default());
//! tok.feed(br#"{"a":1,"b":"x"}"#, |rv| assert_eq!(rv.at(1), b"x")).unwrap();
//! tok.feed(br#"{"b":"y","a":2}"#, |rv| assert_eq!(rv.at(0), b"2")).unwrap();
//! ```
//!
//! ## Feature Flags
//!
//! - `logging` - Enable debug logging using the `log` crate

// Lint configuration for production quality
#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]
#![warn(clippy::all)]
#![allow(clippy::new_without_default)]

/// Logging macros - no-op when logging feature is disabled
#[cfg(not(feature = "logging"))]
macro_rules! log_debug {
    ($($arg:tt)*) => {};
}

/// Logging macros - use log crate when logging feature is enabled
#[cfg(feature = "logging")]
macro_rules! log_debug {
    ($($arg:tt)*) => { log::debug!($($arg)*) };
}

#[cfg(not(feature = "logging"))]
macro_rules! log_warn {
    ($($arg:tt)*) => {};
}

#[cfg(feature = "logging")]
macro_rules! log_warn {
    ($($arg:tt)*) => { log::warn!($($arg)*) };
}

// Prelude module for convenient imports
pub mod prelude;

// Ingestion pipeline
pub mod scanner;

/// Re-export commonly used types for convenience
pub use scanner::{
    scan_path, scan_reader, Arena, ArenaError, ChunkConfig, ChunkReader, CsvConfig, CsvFsm,
    FileFormat, JsonlConfig, JsonlTokenizer, OnError, ParsePolicy, ReadOutcome, RecordView,
    ScanArenas, ScanConfig, ScanError, ScanSummary, Scanner, Span, TokenizeError,
};
