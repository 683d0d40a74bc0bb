//! CSV tokenizing state machine
//!
//! Each line is split into fields by a three-state machine:
//!
//! ```text
//!            quote                 quote
//! Unquoted ─────────▶ Quoted ─────────────▶ QuoteEscape
//!    ▲                  ▲                      │
//!    │                  └──── quote (literal) ─┤
//!    └──────── delimiter / end of line ────────┘
//! ```
//!
//! Any other byte after a closing quote is malformed, and a line that ends
//! inside a quoted field is unterminated; both fail only that line.
//!
//! The line is copied into the row arena while it is scanned. Doubled quotes
//! are collapsed during the copy, so the field `"a""b"` is stored as `a"b`.
//! Lines without a quote byte take a memchr fast path.

use super::arena::Span;
use super::error::{ScanError, TokenizeError};
use super::record::{RecordView, ScanArenas};
use memchr::{memchr, memchr_iter};
use serde::{Deserialize, Serialize};

/// CSV dialect options
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CsvConfig {
    /// Field separator byte
    pub delimiter: u8,
    /// Quote byte
    pub quote: u8,
    /// Treat the first line as the header
    pub header: bool,
}

impl Default for CsvConfig {
    fn default() -> Self {
        Self {
            delimiter: b',',
            quote: b'"',
            header: true,
        }
    }
}

impl CsvConfig {
    /// Create a new config with default values
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the delimiter byte
    pub fn with_delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = delimiter;
        self
    }

    /// Set the quote byte
    pub fn with_quote(mut self, quote: u8) -> Self {
        self.quote = quote;
        self
    }

    /// Enable or disable header capture
    pub fn with_header(mut self, header: bool) -> Self {
        self.header = header;
        self
    }

    /// Delimiter and quote must differ and must not be a line terminator
    pub fn validate(&self) -> Result<(), ScanError> {
        if self.delimiter == self.quote {
            return Err(ScanError::Config(
                "CSV delimiter and quote must differ".to_string(),
            ));
        }
        if matches!(self.delimiter, b'\n' | b'\r') || matches!(self.quote, b'\n' | b'\r') {
            return Err(ScanError::Config(
                "CSV delimiter and quote cannot be line terminators".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Unquoted,
    Quoted,
    /// Saw a quote inside a quoted field: closing quote or escape
    QuoteEscape,
}

/// Line-at-a-time CSV tokenizer
#[derive(Debug)]
pub struct CsvFsm {
    config: CsvConfig,
    arenas: ScanArenas,
    header: Vec<Span>,
    has_header: bool,
    fields: Vec<Span>,
    rows: u64,
    last_error: Option<TokenizeError>,
}

impl CsvFsm {
    /// Create a tokenizer that owns its header and row arenas
    pub fn new(config: CsvConfig, arenas: ScanArenas) -> Self {
        Self {
            config,
            arenas,
            header: Vec::new(),
            has_header: false,
            fields: Vec::with_capacity(32),
            rows: 0,
            last_error: None,
        }
    }

    /// Tokenize one line
    ///
    /// The first line is captured as the header when configured; it produces
    /// no record. Every other line produces exactly one call to `on_record`.
    ///
    /// # Errors
    /// Malformed quoting fails this line only; the tokenizer stays usable.
    pub fn feed<F>(&mut self, line: &[u8], mut on_record: F) -> Result<(), TokenizeError>
    where
        F: FnMut(&RecordView<'_>),
    {
        if let Err(e) = self.parse_line(line) {
            log_debug!("csv line rejected: {}", e);
            self.fields.clear();
            self.last_error = Some(e.clone());
            return Err(e);
        }

        if self.config.header && !self.has_header {
            self.capture_header()?;
            return Ok(());
        }

        let header = self.has_header.then_some(self.header.as_slice());
        let view = RecordView::new(header, &self.fields, &self.arenas);
        on_record(&view);
        self.rows += 1;
        Ok(())
    }

    /// Signal end of input; lines are self-contained so nothing is pending
    pub fn finish<F>(&mut self, _on_record: F) -> Result<(), TokenizeError>
    where
        F: FnMut(&RecordView<'_>),
    {
        Ok(())
    }

    /// Column names captured from the first line
    #[inline]
    pub fn header(&self) -> &[Span] {
        &self.header
    }

    /// Column names as owned strings (lossy UTF-8)
    pub fn header_names(&self) -> Vec<String> {
        self.header
            .iter()
            .map(|&s| String::from_utf8_lossy(self.arenas.header.get(s)).into_owned())
            .collect()
    }

    /// Records emitted so far
    #[inline]
    pub fn rows(&self) -> u64 {
        self.rows
    }

    /// The most recent line failure
    #[inline]
    pub fn last_error(&self) -> Option<&TokenizeError> {
        self.last_error.as_ref()
    }

    /// The tokenizer configuration
    #[inline]
    pub fn config(&self) -> &CsvConfig {
        &self.config
    }

    /// The arena pair backing records
    #[inline]
    pub fn arenas(&self) -> &ScanArenas {
        &self.arenas
    }

    /// Reset the row arena; header spans are unaffected
    #[inline]
    pub fn reset_rows(&mut self) {
        self.fields.clear();
        self.arenas.row.reset();
    }

    /// Give the arenas back for reuse
    pub fn into_arenas(self) -> ScanArenas {
        self.arenas
    }

    fn capture_header(&mut self) -> Result<(), TokenizeError> {
        let ScanArenas { header, row } = &mut self.arenas;
        self.header.clear();
        self.header.reserve(self.fields.len());
        for &span in &self.fields {
            self.header.push(header.copy(row.get(span))?);
        }
        self.has_header = true;
        self.fields.clear();
        row.reset();
        Ok(())
    }

    fn parse_line(&mut self, line: &[u8]) -> Result<(), TokenizeError> {
        let Self {
            config,
            arenas,
            fields,
            ..
        } = self;
        let delim = config.delimiter;
        let quote = config.quote;
        fields.clear();

        if memchr(quote, line).is_none() {
            let span = arenas.row.copy(line)?;
            let mut start = 0;
            for pos in memchr_iter(delim, line) {
                fields.push(span.slice(start, pos));
                start = pos + 1;
            }
            fields.push(span.slice(start, line.len()));
            return Ok(());
        }

        // Copy while scanning; `w` trails the read position because quotes
        // are never written
        let (span, buf) = arenas.row.alloc(line.len())?;
        let mut state = State::Unquoted;
        let mut field_start = 0;
        let mut w = 0;

        for (i, &c) in line.iter().enumerate() {
            match state {
                State::Unquoted => {
                    if c == delim {
                        fields.push(span.slice(field_start, w));
                        field_start = w;
                    } else if c == quote {
                        state = State::Quoted;
                        w = field_start;
                    } else {
                        buf[w] = c;
                        w += 1;
                    }
                }
                State::Quoted => {
                    if c == quote {
                        state = State::QuoteEscape;
                    } else {
                        buf[w] = c;
                        w += 1;
                    }
                }
                State::QuoteEscape => {
                    if c == quote {
                        buf[w] = quote;
                        w += 1;
                        state = State::Quoted;
                    } else if c == delim {
                        fields.push(span.slice(field_start, w));
                        field_start = w;
                        state = State::Unquoted;
                    } else {
                        return Err(TokenizeError::MalformedQuote { column: i });
                    }
                }
            }
        }

        if state == State::Quoted {
            return Err(TokenizeError::UnterminatedQuote);
        }
        fields.push(span.slice(field_start, w));
        Ok(())
    }
}
