//! Integration tests for the chunked line reader
//!
//! These tests cover:
//! - Line reassembly across chunk boundaries
//! - Oversize line handling
//! - Byte accounting
//! - Reading from files on disk

use std::io::{Cursor, Write};
use std::ops::ControlFlow;
use typed_scanner::scanner::chunk_reader::{ChunkConfig, ChunkReader, ReadOutcome};
use typed_scanner::ScanError;

fn collect(input: &[u8], config: ChunkConfig) -> (Vec<Vec<u8>>, ChunkReader<Cursor<Vec<u8>>>) {
    let mut reader = ChunkReader::new(Cursor::new(input.to_vec()), config);
    let mut lines = Vec::new();
    let outcome = reader
        .for_each_line(|line| {
            lines.push(line.to_vec());
            ControlFlow::Continue(())
        })
        .unwrap();
    assert_eq!(outcome, ReadOutcome::Completed);
    (lines, reader)
}

// ============================================================================
// Reassembly
// ============================================================================

#[test]
fn test_lines_independent_of_chunk_size() {
    let input = b"id,name\n1,alice\n2,bob\n3,carol\n";
    let (expected, _) = collect(input, ChunkConfig::default());

    for chunk in 1..=input.len() + 1 {
        let (lines, reader) = collect(input, ChunkConfig::new().with_chunk_bytes(chunk));
        assert_eq!(lines, expected, "chunk size {}", chunk);
        assert_eq!(reader.bytes_read(), input.len() as u64);
    }
}

#[test]
fn test_byte_accounting() {
    let input = b"alpha\r\nbeta\ngamma\r\n\ndelta";
    let (lines, reader) = collect(input, ChunkConfig::new().with_chunk_bytes(4));

    // One newline per line except the unterminated last one, plus stripped CRs
    let payload: usize = lines.iter().map(|l| l.len() + 1).sum();
    let crs = input.iter().filter(|&&b| b == b'\r').count();
    assert_eq!(payload + crs - 1, reader.bytes_read() as usize);
    assert_eq!(reader.stats().lines_emitted, 5);
}

#[test]
fn test_crlf_kept_when_not_stripping() {
    let (lines, _) = collect(b"a\r\nb\r\n", ChunkConfig::new().with_strip_cr(false));
    assert_eq!(lines, vec![b"a\r".to_vec(), b"b\r".to_vec()]);
}

// ============================================================================
// Oversize Lines
// ============================================================================

#[test]
fn test_oversize_line_never_emitted() {
    let mut input = b"ok\n".to_vec();
    input.extend(std::iter::repeat(b'x').take(100));
    input.extend_from_slice(b"\nafter\n");

    for chunk in [3, 7, 64, 4096] {
        let config = ChunkConfig::new()
            .with_chunk_bytes(chunk)
            .with_max_record_bytes(16);
        let (lines, reader) = collect(&input, config);
        assert_eq!(lines, vec![b"ok".to_vec(), b"after".to_vec()], "chunk {}", chunk);
        assert_eq!(reader.stats().lines_dropped, 1);
        assert_eq!(reader.bytes_read(), input.len() as u64);
    }
}

#[test]
fn test_oversize_line_truncated_once() {
    let mut input = vec![b'y'; 50];
    input.extend_from_slice(b"\nz\n");

    let config = ChunkConfig::new()
        .with_chunk_bytes(8)
        .with_max_record_bytes(10)
        .with_drop_oversize(false);
    let (lines, reader) = collect(&input, config);

    assert_eq!(lines, vec![vec![b'y'; 10], b"z".to_vec()]);
    assert_eq!(reader.stats().lines_truncated, 1);
}

// ============================================================================
// Files and Cancellation
// ============================================================================

#[test]
fn test_read_from_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    for i in 0..1000 {
        writeln!(file, "{},{}", i, i * i).unwrap();
    }
    file.flush().unwrap();

    let mut reader = ChunkReader::open(file.path(), ChunkConfig::small()).unwrap();
    let mut count = 0u32;
    reader
        .for_each_line(|line| {
            assert!(line.starts_with(count.to_string().as_bytes()));
            count += 1;
            ControlFlow::Continue(())
        })
        .unwrap();

    assert_eq!(count, 1000);
    assert_eq!(reader.path(), file.path());
}

#[test]
fn test_open_missing_file() {
    let dir = tempfile::tempdir().unwrap();
    let err = ChunkReader::open(dir.path().join("nope.csv"), ChunkConfig::default())
        .err()
        .expect("open must fail");
    assert!(matches!(err, ScanError::Io { .. }));
    assert!(err.raw_os_error().is_some());
}

#[test]
fn test_cancel_stops_reading() {
    let input = b"1\n2\n3\n4\n".repeat(1000);
    let mut reader = ChunkReader::new(Cursor::new(input.clone()), ChunkConfig::new().with_chunk_bytes(16));
    let mut seen = 0;
    let outcome = reader
        .for_each_line(|_| {
            seen += 1;
            if seen == 3 {
                ControlFlow::Break(())
            } else {
                ControlFlow::Continue(())
            }
        })
        .unwrap();

    assert_eq!(outcome, ReadOutcome::Cancelled);
    assert_eq!(seen, 3);
    assert!(reader.bytes_read() < input.len() as u64);
}
