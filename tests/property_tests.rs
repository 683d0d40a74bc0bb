//! Property-based tests using proptest
//!
//! These tests check the pipeline invariants across a wide range of inputs.

use proptest::prelude::*;
use std::io::Cursor;
use std::ops::ControlFlow;
use typed_scanner::scanner::date::{days_from_civil, parse_iso8601_ms};
use typed_scanner::scanner::{
    Arena, ChunkConfig, ChunkReader, CsvConfig, CsvFsm, JsonlConfig, JsonlTokenizer, ScanArenas,
};

fn csv_no_header() -> CsvFsm {
    CsvFsm::new(CsvConfig::new().with_header(false), ScanArenas::default())
}

// =============================================================================
// Arena
// =============================================================================

proptest! {
    /// Spans stay byte-identical across any number of growth events
    #[test]
    fn test_spans_survive_growth(
        chunks in prop::collection::vec(prop::collection::vec(any::<u8>(), 0..200), 1..100),
        capacity in 1usize..64,
    ) {
        let mut arena = Arena::with_capacity(capacity);
        let spans: Vec<_> = chunks.iter().map(|c| arena.copy(c).unwrap()).collect();

        for (span, chunk) in spans.iter().zip(&chunks) {
            prop_assert_eq!(arena.get(*span), chunk.as_slice());
        }
        prop_assert!(arena.used() <= arena.capacity());
        prop_assert!(arena.high_water() >= arena.used());
    }
}

// =============================================================================
// Chunk Reader
// =============================================================================

proptest! {
    /// Emitted lines do not depend on where chunk boundaries fall
    #[test]
    fn test_lines_independent_of_chunking(
        lines in prop::collection::vec("[a-z0-9,\" ]{0,40}", 0..30),
        chunk in 1usize..64,
    ) {
        let input = lines.iter().map(|l| format!("{}\n", l)).collect::<String>();
        let mut reader = ChunkReader::new(
            Cursor::new(input.clone().into_bytes()),
            ChunkConfig::new().with_chunk_bytes(chunk),
        );
        let mut out = Vec::new();
        reader.for_each_line(|line| {
            out.push(String::from_utf8(line.to_vec()).unwrap());
            ControlFlow::Continue(())
        }).unwrap();

        prop_assert_eq!(&out, &lines);
        let payload: usize = out.iter().map(|l| l.len() + 1).sum();
        prop_assert_eq!(payload as u64, reader.bytes_read());
    }
}

// =============================================================================
// CSV
// =============================================================================

proptest! {
    /// N unquoted fields parse to exactly those N substrings
    #[test]
    fn test_unquoted_fields_split_exactly(fields in prop::collection::vec("[^,\"\r\n]{0,12}", 1..16)) {
        let line = fields.join(",");
        let mut fsm = csv_no_header();
        let mut out = Vec::new();
        fsm.feed(line.as_bytes(), |rv| out = rv.to_strings()).unwrap();
        prop_assert_eq!(out, fields);
    }

    /// Any field survives quoting with doubled quotes
    #[test]
    fn test_quoted_fields_unescape(fields in prop::collection::vec("[^\r\n]{0,12}", 1..8)) {
        let line = fields
            .iter()
            .map(|f| format!("\"{}\"", f.replace('"', "\"\"")))
            .collect::<Vec<_>>()
            .join(",");
        let mut fsm = csv_no_header();
        let mut out = Vec::new();
        fsm.feed(line.as_bytes(), |rv| out = rv.to_strings()).unwrap();
        prop_assert_eq!(out, fields);
    }

    /// Arbitrary bytes never panic the state machine
    #[test]
    fn test_csv_never_panics(line in prop::collection::vec(any::<u8>(), 0..100)) {
        let mut fsm = csv_no_header();
        let _ = fsm.feed(&line, |rv| { let _ = rv.to_strings(); });
    }
}

// =============================================================================
// JSONL
// =============================================================================

proptest! {
    /// Objects with shuffled keys align to the first object's key order
    #[test]
    fn test_jsonl_alignment(
        values in prop::collection::vec(any::<i32>(), 1..8),
        rotate in 0usize..8,
    ) {
        let keys: Vec<String> = (0..values.len()).map(|i| format!("k{}", i)).collect();
        let first = keys
            .iter()
            .zip(&values)
            .map(|(k, v)| format!("\"{}\":{}", k, v))
            .collect::<Vec<_>>()
            .join(",");
        let mut members: Vec<String> = keys
            .iter()
            .zip(&values)
            .map(|(k, v)| format!("\"{}\":{}", k, v))
            .collect();
        let len = members.len();
        members.rotate_left(rotate % len);
        let second = members.join(",");

        let mut tok = JsonlTokenizer::new(JsonlConfig::default(), ScanArenas::default());
        let mut rows = Vec::new();
        tok.feed(format!("{{{}}}", first).as_bytes(), |rv| rows.push(rv.to_strings())).unwrap();
        tok.feed(format!("{{{}}}", second).as_bytes(), |rv| rows.push(rv.to_strings())).unwrap();

        let expected: Vec<String> = values.iter().map(|v| v.to_string()).collect();
        prop_assert_eq!(&rows[0], &expected);
        prop_assert_eq!(&rows[1], &expected);
    }

    /// Arbitrary bytes never panic the tokenizer
    #[test]
    fn test_jsonl_never_panics(line in prop::collection::vec(any::<u8>(), 0..100)) {
        let mut tok = JsonlTokenizer::new(JsonlConfig::lenient(), ScanArenas::default());
        let _ = tok.feed(&line, |rv| { let _ = rv.to_strings(); });
    }
}

// =============================================================================
// Dates
// =============================================================================

proptest! {
    /// Well-formed timestamps parse to the civil-day arithmetic value
    #[test]
    fn test_iso8601_matches_civil_days(
        year in 1900i64..2100,
        month in 1u32..=12,
        day in 1u32..=31,
        hour in 0u32..24,
        minute in 0u32..60,
        second in 0u32..60,
        millis in 0u32..1000,
    ) {
        let text = format!(
            "{:04}-{:02}-{:02}T{:02}:{:02}:{:02}.{:03}Z",
            year, month, day, hour, minute, second, millis
        );
        let expected = days_from_civil(year, month, day) * 86_400_000
            + i64::from(hour * 3_600 + minute * 60 + second) * 1_000
            + i64::from(millis);
        prop_assert_eq!(parse_iso8601_ms(text.as_bytes()), Some(expected));
    }

    /// Trailing garbage is always rejected
    #[test]
    fn test_iso8601_rejects_suffix(suffix in "[a-yA-Y#!]{1,4}") {
        let text = format!("2020-06-15T12:00:00{}", suffix);
        prop_assert_eq!(parse_iso8601_ms(text.as_bytes()), None);
    }
}
