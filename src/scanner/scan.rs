//! File scan driver
//!
//! Ties the pieces together for one source:
//!
//! ```text
//! ChunkReader ──line──▶ Tokenizer ──RecordView──▶ FieldProfiler ──▶ callback
//!                          │
//!                          └── row arena reset every `reset_every_rows` lines
//! ```
//!
//! The format is chosen once per file from its extension.

use super::chunk_reader::{ChunkConfig, ChunkReader, ReadOutcome};
use super::csv::{CsvConfig, CsvFsm};
use super::error::{ScanError, TokenizeError};
use super::jsonl::{JsonlConfig, JsonlTokenizer};
use super::policy::ParsePolicy;
use super::profile::{ColumnProfile, FieldProfiler};
use super::record::{RecordView, ScanArenas, DEFAULT_HEADER_ARENA_BYTES, DEFAULT_ROW_ARENA_BYTES};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::Read;
use std::ops::ControlFlow;
use std::path::Path;
use std::time::Instant;

/// Default number of lines between row arena resets
pub const DEFAULT_RESET_EVERY_ROWS: u64 = 10_000;

/// Supported input formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileFormat {
    /// Comma-separated values
    Csv,
    /// Newline-delimited JSON
    Jsonl,
}

impl FileFormat {
    /// Detect the format from the file extension (case-insensitive)
    ///
    /// `.csv` is CSV; `.jsonl` and `.ndjson` are JSONL.
    ///
    /// # Errors
    /// Any other extension returns [`ScanError::UnsupportedFormat`].
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ScanError> {
        let path = path.as_ref();
        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
        if ext.eq_ignore_ascii_case("csv") {
            Ok(Self::Csv)
        } else if ext.eq_ignore_ascii_case("jsonl") || ext.eq_ignore_ascii_case("ndjson") {
            Ok(Self::Jsonl)
        } else {
            Err(ScanError::UnsupportedFormat {
                path: path.to_path_buf(),
            })
        }
    }

    /// MIME type reported in summaries
    pub fn content_type(self) -> &'static str {
        match self {
            Self::Csv => "text/csv",
            Self::Jsonl => "application/x-ndjson",
        }
    }
}

/// One tokenizer per file, chosen by format
#[derive(Debug)]
pub enum Tokenizer {
    /// CSV state machine
    Csv(CsvFsm),
    /// JSONL tokenizer
    Jsonl(JsonlTokenizer),
}

impl Tokenizer {
    /// Build the tokenizer for `format` from the scan configuration
    pub fn new(format: FileFormat, config: &ScanConfig, arenas: ScanArenas) -> Self {
        match format {
            FileFormat::Csv => Self::Csv(CsvFsm::new(config.csv.clone(), arenas)),
            FileFormat::Jsonl => Self::Jsonl(JsonlTokenizer::new(config.jsonl.clone(), arenas)),
        }
    }

    /// The format this tokenizer handles
    pub fn format(&self) -> FileFormat {
        match self {
            Self::Csv(_) => FileFormat::Csv,
            Self::Jsonl(_) => FileFormat::Jsonl,
        }
    }

    /// Tokenize one line
    #[inline]
    pub fn feed<F>(&mut self, line: &[u8], on_record: F) -> Result<(), TokenizeError>
    where
        F: FnMut(&RecordView<'_>),
    {
        match self {
            Self::Csv(t) => t.feed(line, on_record),
            Self::Jsonl(t) => t.feed(line, on_record),
        }
    }

    /// Signal end of input
    pub fn finish<F>(&mut self, on_record: F) -> Result<(), TokenizeError>
    where
        F: FnMut(&RecordView<'_>),
    {
        match self {
            Self::Csv(t) => t.finish(on_record),
            Self::Jsonl(t) => t.finish(on_record),
        }
    }

    /// Reset the row arena
    #[inline]
    pub fn reset_rows(&mut self) {
        match self {
            Self::Csv(t) => t.reset_rows(),
            Self::Jsonl(t) => t.reset_rows(),
        }
    }

    /// Header names as owned strings
    pub fn header_names(&self) -> Vec<String> {
        match self {
            Self::Csv(t) => t.header_names(),
            Self::Jsonl(t) => t.header_names(),
        }
    }

    /// Records emitted so far
    pub fn rows(&self) -> u64 {
        match self {
            Self::Csv(t) => t.rows(),
            Self::Jsonl(t) => t.rows(),
        }
    }

    /// The most recent line failure
    pub fn last_error(&self) -> Option<&TokenizeError> {
        match self {
            Self::Csv(t) => t.last_error(),
            Self::Jsonl(t) => t.last_error(),
        }
    }

    /// The arena pair backing records
    pub fn arenas(&self) -> &ScanArenas {
        match self {
            Self::Csv(t) => t.arenas(),
            Self::Jsonl(t) => t.arenas(),
        }
    }
}

/// Complete configuration of a scan
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    /// Line reader settings
    pub chunk: ChunkConfig,
    /// CSV dialect
    pub csv: CsvConfig,
    /// JSONL options
    pub jsonl: JsonlConfig,
    /// Type coercion rules used by the profiler
    pub policy: ParsePolicy,
    /// Lines tokenized between row arena resets
    pub reset_every_rows: u64,
    /// Count failed lines instead of aborting
    pub continue_on_error: bool,
    /// Classify field values per column
    pub profile_fields: bool,
    /// Initial header arena size
    pub header_arena_bytes: usize,
    /// Initial row arena size
    pub row_arena_bytes: usize,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            chunk: ChunkConfig::default(),
            csv: CsvConfig::default(),
            jsonl: JsonlConfig::default(),
            policy: ParsePolicy::default(),
            reset_every_rows: DEFAULT_RESET_EVERY_ROWS,
            continue_on_error: true,
            profile_fields: true,
            header_arena_bytes: DEFAULT_HEADER_ARENA_BYTES,
            row_arena_bytes: DEFAULT_ROW_ARENA_BYTES,
        }
    }
}

impl ScanConfig {
    /// Create a new config with default values
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a config from JSON; missing fields take their defaults
    ///
    /// # Errors
    /// Returns [`ScanError::Config`] for malformed JSON or invalid values.
    pub fn from_json(json: &str) -> Result<Self, ScanError> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| ScanError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Set the reader settings
    pub fn with_chunk(mut self, chunk: ChunkConfig) -> Self {
        self.chunk = chunk;
        self
    }

    /// Set the CSV dialect
    pub fn with_csv(mut self, csv: CsvConfig) -> Self {
        self.csv = csv;
        self
    }

    /// Set the JSONL options
    pub fn with_jsonl(mut self, jsonl: JsonlConfig) -> Self {
        self.jsonl = jsonl;
        self
    }

    /// Set the coercion policy
    pub fn with_policy(mut self, policy: ParsePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Set the row arena reset interval
    pub fn with_reset_every_rows(mut self, rows: u64) -> Self {
        self.reset_every_rows = rows;
        self
    }

    /// Count failed lines instead of aborting
    pub fn with_continue_on_error(mut self, yes: bool) -> Self {
        self.continue_on_error = yes;
        self
    }

    /// Enable or disable field profiling
    pub fn with_profile_fields(mut self, yes: bool) -> Self {
        self.profile_fields = yes;
        self
    }

    /// Set initial arena sizes
    pub fn with_arena_bytes(mut self, header: usize, row: usize) -> Self {
        self.header_arena_bytes = header;
        self.row_arena_bytes = row;
        self
    }

    /// Check every nested config
    pub fn validate(&self) -> Result<(), ScanError> {
        self.chunk.validate()?;
        self.csv.validate()?;
        if self.reset_every_rows == 0 {
            return Err(ScanError::Config(
                "reset_every_rows must be > 0".to_string(),
            ));
        }
        Ok(())
    }
}

/// Result of scanning one source
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScanSummary {
    /// Source path; empty for in-memory readers
    pub filename: String,
    /// MIME type of the detected format
    pub content_type: &'static str,
    /// Size of the source file, or bytes read for readers
    pub file_size: u64,
    /// Records delivered to the callback
    pub rows: u64,
    /// Fields across all records
    pub fields: u64,
    /// Bytes consumed from the source
    pub bytes: u64,
    /// Elapsed wall time in milliseconds
    pub wall_time_ms: f64,
    /// MiB per second
    pub throughput_mb_s: f64,
    /// Records per second
    pub rows_per_sec: f64,
    /// Lines that failed to tokenize
    pub bad_lines: u64,
    /// Oversize lines dropped by the reader
    pub dropped_lines: u64,
    /// Oversize lines truncated by the reader
    pub truncated_lines: u64,
    /// Field type errors keyed by column name
    pub errors_by_field: BTreeMap<String, u64>,
    /// Header or first-object keys
    pub header: Vec<String>,
    /// Per-column type profile; empty when profiling is off
    pub columns: Vec<ColumnProfile>,
    /// Header-less records left out of a header-keyed profile
    pub unprofiled_records: u64,
    /// The record callback stopped the scan early
    pub cancelled: bool,
}

impl ScanSummary {
    /// Render as JSON
    ///
    /// # Errors
    /// Fails only if a float field cannot be represented.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Runs scans with a fixed configuration
#[derive(Debug, Clone, Default)]
pub struct Scanner {
    config: ScanConfig,
}

impl Scanner {
    /// Create a scanner
    ///
    /// # Errors
    /// Returns [`ScanError::Config`] if the configuration is invalid.
    pub fn new(config: ScanConfig) -> Result<Self, ScanError> {
        config.validate()?;
        Ok(Self { config })
    }

    /// The scan configuration
    #[inline]
    pub fn config(&self) -> &ScanConfig {
        &self.config
    }

    /// Scan a file, detecting the format from its extension
    ///
    /// `on_record` sees each record once; the view is only valid during the
    /// call. Returning [`ControlFlow::Break`] ends the scan early with a
    /// summary of what was read.
    ///
    /// # Errors
    /// Unsupported extensions are rejected before the file is opened. I/O
    /// failures, and line or field failures the configuration treats as
    /// fatal, abort the scan.
    pub fn scan_path<P, F>(&self, path: P, on_record: F) -> Result<ScanSummary, ScanError>
    where
        P: AsRef<Path>,
        F: FnMut(&RecordView<'_>) -> ControlFlow<()>,
    {
        let path = path.as_ref();
        let format = FileFormat::from_path(path)?;
        let reader = ChunkReader::open(path, self.config.chunk.clone())?;
        let file_size = std::fs::metadata(path).map(|m| m.len()).ok();
        self.run(reader, format, path.display().to_string(), file_size, on_record)
    }

    /// Scan an in-memory or streaming source of a known format
    ///
    /// # Errors
    /// See [`Scanner::scan_path`].
    pub fn scan_reader<R, F>(
        &self,
        source: R,
        format: FileFormat,
        on_record: F,
    ) -> Result<ScanSummary, ScanError>
    where
        R: Read,
        F: FnMut(&RecordView<'_>) -> ControlFlow<()>,
    {
        let reader = ChunkReader::new(source, self.config.chunk.clone());
        self.run(reader, format, String::new(), None, on_record)
    }

    fn run<R, F>(
        &self,
        mut reader: ChunkReader<R>,
        format: FileFormat,
        filename: String,
        file_size: Option<u64>,
        mut on_record: F,
    ) -> Result<ScanSummary, ScanError>
    where
        R: Read,
        F: FnMut(&RecordView<'_>) -> ControlFlow<()>,
    {
        let config = &self.config;
        let start = Instant::now();
        log_debug!("scan start: {} ({})", filename, format.content_type());

        let arenas = ScanArenas::with_capacity(config.header_arena_bytes, config.row_arena_bytes);
        let mut tokenizer = Tokenizer::new(format, config, arenas);
        let mut profiler = config
            .profile_fields
            .then(|| FieldProfiler::new(config.policy.clone()));

        let mut line_no = 0u64;
        let mut rows = 0u64;
        let mut fields = 0u64;
        let mut bad_lines = 0u64;
        let mut since_reset = 0u64;
        let mut fatal: Option<ScanError> = None;

        let outcome = reader.for_each_line(|line| {
            line_no += 1;
            let mut flow = ControlFlow::Continue(());
            let mut field_error = None;

            let fed = tokenizer.feed(line, |rv| {
                rows += 1;
                fields += rv.len() as u64;
                if let Some(profiler) = profiler.as_mut() {
                    if let Err(e) = profiler.observe(rv, line_no) {
                        field_error = Some(e);
                        return;
                    }
                }
                flow = on_record(rv);
            });

            if let Some(e) = field_error {
                fatal = Some(e);
                return ControlFlow::Break(());
            }
            if let Err(error) = fed {
                bad_lines += 1;
                if !config.continue_on_error {
                    log_warn!("line {}: {}", line_no, error);
                    fatal = Some(ScanError::Tokenize {
                        line: line_no,
                        error,
                    });
                    return ControlFlow::Break(());
                }
            }

            since_reset += 1;
            if since_reset >= config.reset_every_rows {
                tokenizer.reset_rows();
                since_reset = 0;
            }
            flow
        })?;

        if let Some(e) = fatal {
            return Err(e);
        }

        let mut cancelled = outcome == ReadOutcome::Cancelled;
        if !cancelled {
            let mut flow = ControlFlow::Continue(());
            let mut field_error = None;
            tokenizer
                .finish(|rv| {
                    if flow.is_break() || field_error.is_some() {
                        return;
                    }
                    rows += 1;
                    fields += rv.len() as u64;
                    if let Some(profiler) = profiler.as_mut() {
                        if let Err(e) = profiler.observe(rv, line_no) {
                            field_error = Some(e);
                            return;
                        }
                    }
                    flow = on_record(rv);
                })
                .map_err(|error| ScanError::Tokenize {
                    line: line_no,
                    error,
                })?;
            if let Some(e) = field_error {
                return Err(e);
            }
            cancelled = flow.is_break();
        }

        let stats = reader.stats();
        let wall_time_ms = start.elapsed().as_secs_f64() * 1000.0;
        let secs = wall_time_ms / 1000.0;
        let mib = stats.bytes_read as f64 / (1024.0 * 1024.0);
        let (throughput_mb_s, rows_per_sec) = if secs > 0.0 {
            (mib / secs, rows as f64 / secs)
        } else {
            (0.0, 0.0)
        };

        let (errors_by_field, unprofiled_records, columns) = match profiler {
            Some(p) => (p.errors_by_field(), p.unkeyed_records(), p.into_columns()),
            None => (BTreeMap::new(), 0, Vec::new()),
        };

        log_debug!(
            "scan done: {} rows, {} bad lines, {:.1} MiB/s",
            rows,
            bad_lines,
            throughput_mb_s
        );

        Ok(ScanSummary {
            filename,
            content_type: format.content_type(),
            file_size: file_size.unwrap_or(stats.bytes_read),
            rows,
            fields,
            bytes: stats.bytes_read,
            wall_time_ms,
            throughput_mb_s,
            rows_per_sec,
            bad_lines,
            dropped_lines: stats.lines_dropped,
            truncated_lines: stats.lines_truncated,
            errors_by_field,
            header: tokenizer.header_names(),
            columns,
            unprofiled_records,
            cancelled,
        })
    }
}

/// Scan a file with `config`
///
/// # Errors
/// See [`Scanner::scan_path`].
pub fn scan_path<P, F>(path: P, config: &ScanConfig, on_record: F) -> Result<ScanSummary, ScanError>
where
    P: AsRef<Path>,
    F: FnMut(&RecordView<'_>) -> ControlFlow<()>,
{
    Scanner::new(config.clone())?.scan_path(path, on_record)
}

/// Scan a reader of a known format with `config`
///
/// # Errors
/// See [`Scanner::scan_path`].
pub fn scan_reader<R, F>(
    source: R,
    format: FileFormat,
    config: &ScanConfig,
    on_record: F,
) -> Result<ScanSummary, ScanError>
where
    R: Read,
    F: FnMut(&RecordView<'_>) -> ControlFlow<()>,
{
    Scanner::new(config.clone())?.scan_reader(source, format, on_record)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn scan_str(format: FileFormat, config: ScanConfig, input: &str) -> Result<ScanSummary, ScanError> {
        scan_reader(Cursor::new(input.to_string()), format, &config, |_| {
            ControlFlow::Continue(())
        })
    }

    #[test]
    fn test_format_detection() {
        assert_eq!(FileFormat::from_path("a/b.csv").unwrap(), FileFormat::Csv);
        assert_eq!(FileFormat::from_path("B.CSV").unwrap(), FileFormat::Csv);
        assert_eq!(FileFormat::from_path("x.jsonl").unwrap(), FileFormat::Jsonl);
        assert_eq!(FileFormat::from_path("x.NDJSON").unwrap(), FileFormat::Jsonl);
        assert!(matches!(
            FileFormat::from_path("x.json"),
            Err(ScanError::UnsupportedFormat { .. })
        ));
        assert!(FileFormat::from_path("noext").is_err());
    }

    #[test]
    fn test_content_types() {
        assert_eq!(FileFormat::Csv.content_type(), "text/csv");
        assert_eq!(FileFormat::Jsonl.content_type(), "application/x-ndjson");
    }

    #[test]
    fn test_config_from_json() {
        let config = ScanConfig::from_json(
            r#"{"chunk":{"chunk_bytes":4096},"csv":{"delimiter":59},"reset_every_rows":5}"#,
        )
        .unwrap();
        assert_eq!(config.chunk.chunk_bytes, 4096);
        assert_eq!(config.csv.delimiter, b';');
        assert_eq!(config.reset_every_rows, 5);
        assert!(config.continue_on_error);

        assert!(ScanConfig::from_json(r#"{"reset_every_rows":0}"#).is_err());
        assert!(ScanConfig::from_json("not json").is_err());
    }

    #[test]
    fn test_csv_summary() {
        let summary = scan_str(FileFormat::Csv, ScanConfig::default(), "id,v\n1,a\n2,b\n").unwrap();
        assert_eq!(summary.rows, 2);
        assert_eq!(summary.fields, 4);
        assert_eq!(summary.bytes, 13);
        assert_eq!(summary.header, vec!["id", "v"]);
        assert_eq!(summary.content_type, "text/csv");
        assert!(!summary.cancelled);
    }

    #[test]
    fn test_bad_lines_counted() {
        let summary =
            scan_str(FileFormat::Csv, ScanConfig::default(), "a,b\n\"x\"y,1\n2,3\n").unwrap();
        assert_eq!(summary.rows, 1);
        assert_eq!(summary.bad_lines, 1);
    }

    #[test]
    fn test_bad_line_aborts_without_continue() {
        let config = ScanConfig::default().with_continue_on_error(false);
        let err = scan_str(FileFormat::Jsonl, config, "{\"a\":1}\n[1]\n").unwrap_err();
        match err {
            ScanError::Tokenize { line, error } => {
                assert_eq!(line, 2);
                assert_eq!(error, TokenizeError::NonObjectLine);
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_reset_interval_keeps_records_valid() {
        let mut input = String::from("n\n");
        for i in 0..50 {
            input.push_str(&format!("{}\n", i));
        }
        let config = ScanConfig::default().with_reset_every_rows(3);
        let mut seen = Vec::new();
        let summary = scan_reader(Cursor::new(input), FileFormat::Csv, &config, |rv| {
            seen.push(rv.at(0).to_vec());
            ControlFlow::Continue(())
        })
        .unwrap();

        assert_eq!(summary.rows, 50);
        assert_eq!(seen[49], b"49");
    }

    #[test]
    fn test_cancel_from_record_callback() {
        let mut count = 0;
        let summary = scan_reader(
            Cursor::new("a\n1\n2\n3\n"),
            FileFormat::Csv,
            &ScanConfig::default(),
            |_| {
                count += 1;
                if count == 2 {
                    ControlFlow::Break(())
                } else {
                    ControlFlow::Continue(())
                }
            },
        )
        .unwrap();

        assert!(summary.cancelled);
        assert_eq!(summary.rows, 2);
    }

    #[test]
    fn test_lenient_scalars_do_not_rename_columns() {
        let config = ScanConfig::default().with_jsonl(JsonlConfig::lenient());
        let summary = scan_str(
            FileFormat::Jsonl,
            config,
            "42\n{\"a\":\"x\"}\n{\"a\":\"y\"}\n7\n",
        )
        .unwrap();

        assert_eq!(summary.rows, 4);
        assert_eq!(summary.header, vec!["a"]);
        assert_eq!(summary.columns.len(), 1);
        assert_eq!(summary.columns[0].name, "a");
        assert_eq!(summary.columns[0].counts.text, 2);
        assert!(summary.errors_by_field.is_empty());
        assert_eq!(summary.unprofiled_records, 1);
    }

    #[test]
    fn test_summary_serializes() {
        let summary = scan_str(FileFormat::Jsonl, ScanConfig::default(), "{\"a\":1}\n").unwrap();
        let json = summary.to_json().unwrap();
        assert!(json.contains("\"content_type\":\"application/x-ndjson\""));
        assert!(json.contains("\"rows\":1"));
        assert!(json.contains("\"unprofiled_records\":0"));
    }
}
