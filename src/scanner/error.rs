//! Error types for the ingestion pipeline
//!
//! Errors are layered by blast radius:
//!
//! - [`ArenaError`] - a span could not be issued or resolved
//! - [`TokenizeError`] - one line could not be tokenized; the caller may keep
//!   feeding subsequent lines
//! - [`ScanError`] - the scan of a whole file failed

use std::fmt;
use std::io;
use std::path::PathBuf;

/// Errors raised by [`Arena`](super::arena::Arena)
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArenaError {
    /// Allocation larger than a span can describe
    TooLarge {
        /// Requested size in bytes
        requested: usize,
    },

    /// Span issued before the last reset
    StaleSpan {
        /// Generation stored in the span
        span_generation: u32,
        /// Current generation of the arena
        arena_generation: u32,
    },

    /// Span does not name bytes handed out by this arena
    OutOfBounds {
        /// Block index
        block: u32,
        /// Offset inside the block
        offset: u32,
        /// Length in bytes
        len: u32,
    },
}

impl fmt::Display for ArenaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TooLarge { requested } => {
                write!(f, "allocation of {} bytes exceeds span limit", requested)
            }
            Self::StaleSpan {
                span_generation,
                arena_generation,
            } => write!(
                f,
                "stale span: issued in generation {}, arena is at generation {}",
                span_generation, arena_generation
            ),
            Self::OutOfBounds { block, offset, len } => write!(
                f,
                "span out of bounds: block {} offset {} len {}",
                block, offset, len
            ),
        }
    }
}

impl std::error::Error for ArenaError {}

/// Per-line tokenizer failure
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenizeError {
    /// A closing quote was followed by something other than a delimiter,
    /// end of line or a second quote
    MalformedQuote {
        /// Byte offset in the line where the bad byte was found
        column: usize,
    },

    /// The line ended inside a quoted field
    UnterminatedQuote,

    /// Strict JSONL mode saw a top-level value that is not an object
    NonObjectLine,

    /// The line is not valid JSON
    Json(String),

    /// Arena failure while storing the line
    Arena(ArenaError),
}

impl fmt::Display for TokenizeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MalformedQuote { column } => write!(
                f,
                "CSV parse error (quoted field mismatch) at byte {}",
                column
            ),
            Self::UnterminatedQuote => write!(f, "CSV parse error (unterminated quoted field)"),
            Self::NonObjectLine => write!(f, "JSONL strict mode: non-object line"),
            Self::Json(msg) => write!(f, "JSONL parse error: {}", msg),
            Self::Arena(e) => write!(f, "arena error: {}", e),
        }
    }
}

impl std::error::Error for TokenizeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Arena(e) => Some(e),
            _ => None,
        }
    }
}

impl From<ArenaError> for TokenizeError {
    fn from(e: ArenaError) -> Self {
        Self::Arena(e)
    }
}

impl From<serde_json::Error> for TokenizeError {
    fn from(e: serde_json::Error) -> Self {
        Self::Json(e.to_string())
    }
}

/// Failure of a whole file scan
#[derive(Debug)]
pub enum ScanError {
    /// Opening or reading the source failed
    Io {
        /// Source path (empty for in-memory readers)
        path: PathBuf,
        /// Underlying I/O error
        source: io::Error,
    },

    /// The file extension does not map to a supported format
    UnsupportedFormat {
        /// Rejected path
        path: PathBuf,
    },

    /// A line failed to tokenize and the scan was configured to stop
    Tokenize {
        /// 1-based logical line number
        line: u64,
        /// Tokenizer failure
        error: TokenizeError,
    },

    /// A field failed type coercion under the strict disposition
    FieldType {
        /// Column or key name
        field: String,
        /// 1-based logical line number
        line: u64,
    },

    /// Invalid configuration
    Config(String),
}

impl ScanError {
    /// OS error code for I/O failures
    pub fn raw_os_error(&self) -> Option<i32> {
        match self {
            Self::Io { source, .. } => source.raw_os_error(),
            _ => None,
        }
    }
}

impl fmt::Display for ScanError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io { path, source } => write!(f, "I/O error on {}: {}", path.display(), source),
            Self::UnsupportedFormat { path } => {
                write!(f, "unsupported file format: {}", path.display())
            }
            Self::Tokenize { line, error } => write!(f, "line {}: {}", line, error),
            Self::FieldType { field, line } => {
                write!(f, "line {}: field '{}' failed type coercion", line, field)
            }
            Self::Config(msg) => write!(f, "invalid configuration: {}", msg),
        }
    }
}

impl std::error::Error for ScanError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Tokenize { error, .. } => Some(error),
            _ => None,
        }
    }
}
