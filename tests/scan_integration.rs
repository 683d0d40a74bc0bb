//! End-to-end scans of files on disk
//!
//! These tests cover:
//! - Format detection by extension
//! - Scan summaries for CSV and JSONL
//! - Field profiling and error dispositions
//! - Oversize line accounting

use std::io::Write;
use std::ops::ControlFlow;
use std::path::PathBuf;
use tempfile::TempDir;
use typed_scanner::scanner::{ChunkConfig, FieldKind, JsonlConfig};
use typed_scanner::{
    scan_path, OnError, ParsePolicy, ScanConfig, ScanError, ScanSummary, Scanner,
};

fn write_file(dir: &TempDir, name: &str, contents: &str) -> PathBuf {
    let path = dir.path().join(name);
    let mut file = std::fs::File::create(&path).unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    path
}

fn scan_all(path: &PathBuf, config: &ScanConfig) -> Result<ScanSummary, ScanError> {
    scan_path(path, config, |_| ControlFlow::Continue(()))
}

// ============================================================================
// Format Detection
// ============================================================================

#[test]
fn test_unsupported_extension_rejected_before_open() {
    // The file does not exist: detection must fail first
    let err = scan_all(&PathBuf::from("/nonexistent/data.parquet"), &ScanConfig::default())
        .unwrap_err();
    assert!(matches!(err, ScanError::UnsupportedFormat { .. }));
}

#[test]
fn test_missing_file_is_io_error() {
    let err = scan_all(&PathBuf::from("/nonexistent/data.csv"), &ScanConfig::default())
        .unwrap_err();
    assert!(matches!(err, ScanError::Io { .. }));
    assert!(err.raw_os_error().is_some());
}

// ============================================================================
// CSV Scans
// ============================================================================

#[test]
fn test_csv_scan_summary() {
    let dir = tempfile::tempdir().unwrap();
    let mut body = String::from("id,score,when,active\n");
    for i in 0..500 {
        body.push_str(&format!(
            "{},{}.5,2024-01-{:02}T00:00:00Z,{}\n",
            100 + i,
            i,
            i % 28 + 1,
            i % 2 == 0
        ));
    }
    let path = write_file(&dir, "scores.CSV", &body);

    let config = ScanConfig::default()
        .with_policy(ParsePolicy::typed())
        .with_reset_every_rows(64)
        .with_chunk(ChunkConfig::new().with_chunk_bytes(1000));
    let summary = scan_all(&path, &config).unwrap();

    assert_eq!(summary.rows, 500);
    assert_eq!(summary.fields, 2000);
    assert_eq!(summary.bytes, body.len() as u64);
    assert_eq!(summary.file_size, body.len() as u64);
    assert_eq!(summary.content_type, "text/csv");
    assert_eq!(summary.header, vec!["id", "score", "when", "active"]);
    assert!(summary.filename.ends_with("scores.CSV"));
    assert!(summary.errors_by_field.is_empty());

    let kinds: Vec<_> = summary.columns.iter().map(|c| c.kind).collect();
    assert_eq!(
        kinds,
        vec![
            Some(FieldKind::Number),
            Some(FieldKind::Number),
            Some(FieldKind::Date),
            Some(FieldKind::Bool),
        ]
    );
}

#[test]
fn test_field_errors_counted_by_name() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_file(&dir, "mixed.csv", "n,label\n1,a\nx,b\n3,c\nNA,d\ny,e\n");

    let summary = scan_all(&path, &ScanConfig::default()).unwrap();
    assert_eq!(summary.rows, 5);
    assert_eq!(summary.errors_by_field.get("n"), Some(&2));
    assert_eq!(summary.columns[0].counts.null, 3);
    assert_eq!(summary.columns[0].counts.number, 2);
}

#[test]
fn test_strict_field_error_aborts() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_file(&dir, "mixed.csv", "n\n1\n2\nthree\n4\n");
    let config =
        ScanConfig::default().with_policy(ParsePolicy::new().with_on_error(OnError::Strict));

    let mut seen = 0;
    let err = scan_path(&path, &config, |_| {
        seen += 1;
        ControlFlow::Continue(())
    })
    .unwrap_err();

    assert_eq!(seen, 2);
    match err {
        ScanError::FieldType { field, line } => {
            assert_eq!(field, "n");
            assert_eq!(line, 4);
        }
        other => panic!("unexpected error: {:?}", other),
    }
}

#[test]
fn test_oversize_lines_counted() {
    let dir = tempfile::tempdir().unwrap();
    let body = format!("a,b\n1,2\n{},3\n4,5\n", "z".repeat(5000));
    let path = write_file(&dir, "wide.csv", &body);
    let config = ScanConfig::default().with_chunk(
        ChunkConfig::new()
            .with_chunk_bytes(256)
            .with_max_record_bytes(1024),
    );

    let mut firsts = Vec::new();
    let summary = scan_path(&path, &config, |rv| {
        firsts.push(rv.at(0).to_vec());
        ControlFlow::Continue(())
    })
    .unwrap();

    assert_eq!(firsts, vec![b"1".to_vec(), b"4".to_vec()]);
    assert_eq!(summary.dropped_lines, 1);
    assert_eq!(summary.bytes, body.len() as u64);
}

// ============================================================================
// JSONL Scans
// ============================================================================

#[test]
fn test_jsonl_scan_summary() {
    let dir = tempfile::tempdir().unwrap();
    let body = concat!(
        "{\"a\":1,\"b\":\"x\"}\n",
        "\n",
        "{\"b\":\"y\",\"a\":2}\n",
        "not json\n",
        "{\"a\":3}\n",
    );
    let path = write_file(&dir, "events.ndjson", body);

    let mut rows = Vec::new();
    let summary = scan_path(&path, &ScanConfig::default(), |rv| {
        rows.push(rv.to_strings());
        ControlFlow::Continue(())
    })
    .unwrap();

    assert_eq!(summary.content_type, "application/x-ndjson");
    assert_eq!(summary.header, vec!["a", "b"]);
    assert_eq!(summary.rows, 3);
    assert_eq!(summary.bad_lines, 1);
    assert_eq!(rows, vec![vec!["1", "x"], vec!["2", "y"], vec!["3", ""]]);
}

#[test]
fn test_scanner_reuse_across_files() {
    let dir = tempfile::tempdir().unwrap();
    let first = write_file(&dir, "one.jsonl", "{\"k\":1}\n{\"k\":2}\n");
    let second = write_file(&dir, "two.jsonl", "{\"other\":true}\n");

    let scanner = Scanner::new(
        ScanConfig::default().with_jsonl(JsonlConfig::default().with_intern_keys(false)),
    )
    .unwrap();
    let a = scanner.scan_path(&first, |_| ControlFlow::Continue(())).unwrap();
    let b = scanner.scan_path(&second, |_| ControlFlow::Continue(())).unwrap();

    assert_eq!(a.header, vec!["k"]);
    assert_eq!(b.header, vec!["other"]);
    assert_eq!(b.columns[0].kind, Some(FieldKind::Text));
}

#[test]
fn test_config_loaded_from_json() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_file(&dir, "semi.csv", "a;b\n1;2\n");
    let config = ScanConfig::from_json(r#"{"csv":{"delimiter":59},"profile_fields":false}"#).unwrap();

    let summary = scan_all(&path, &config).unwrap();
    assert_eq!(summary.header, vec!["a", "b"]);
    assert!(summary.columns.is_empty());
}
