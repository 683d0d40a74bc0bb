//! JSON Lines tokenizer
//!
//! Each line holds one JSON value. Objects are flattened into an ordered
//! field list: members are visited once in source order and their values are
//! written straight into the row arena as text:
//!
//! | JSON value       | Field text                                  |
//! |------------------|---------------------------------------------|
//! | string           | unescaped contents                          |
//! | number           | shortest round-trip decimal                 |
//! | `true` / `false` | `true` / `false`                            |
//! | `null`           | empty                                       |
//! | array / object   | raw source text, capped with a `...` marker |
//!
//! The first object with at least one key fixes the header. Later objects are
//! aligned to it by key: missing keys give empty fields and unknown keys are
//! dropped, so the schema never grows.

use super::arena::{Arena, Span};
use super::error::{ArenaError, TokenizeError};
use super::record::{RecordView, ScanArenas};
use hashbrown::HashMap;
use serde::de::{self, DeserializeSeed, MapAccess, Visitor};
use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;
use serde_json::Number;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::io::Write;

/// Default cap on the text kept for a nested array or object: 32 KiB
pub const DEFAULT_CAP_NESTED_VALUE_BYTES: usize = 32 * 1024;

/// Marker appended to capped nested values
const ELLIPSIS: &[u8] = b"...";

/// JSONL tokenizer options
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct JsonlConfig {
    /// Reject lines whose top-level value is not an object
    pub strict: bool,
    /// Longest text kept for a nested array or object
    pub cap_nested_value_bytes: usize,
    /// Deduplicate keys in the header arena
    pub intern_keys: bool,
}

impl Default for JsonlConfig {
    fn default() -> Self {
        Self {
            strict: true,
            cap_nested_value_bytes: DEFAULT_CAP_NESTED_VALUE_BYTES,
            intern_keys: true,
        }
    }
}

impl JsonlConfig {
    /// Create a new config with default values
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Accept non-object lines as single-field records
    pub fn lenient() -> Self {
        Self {
            strict: false,
            ..Self::default()
        }
    }

    /// Set strict mode
    pub fn with_strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    /// Set the nested value cap
    pub fn with_cap_nested_value_bytes(mut self, cap: usize) -> Self {
        self.cap_nested_value_bytes = cap;
        self
    }

    /// Enable or disable key interning
    pub fn with_intern_keys(mut self, intern: bool) -> Self {
        self.intern_keys = intern;
        self
    }
}

/// Reusable per-line buffers
///
/// Owned by the tokenizer. A caller running many scans can move the buffers
/// from one tokenizer to the next with [`JsonlTokenizer::into_parts`] and
/// [`JsonlTokenizer::with_scratch`].
#[derive(Debug, Default)]
pub struct JsonlScratch {
    members: Vec<(MemberKey, Span)>,
    fields: Vec<Span>,
}

impl JsonlScratch {
    /// Buffers pre-sized for `n` members
    pub fn with_capacity(n: usize) -> Self {
        Self {
            members: Vec::with_capacity(n),
            fields: Vec::with_capacity(n),
        }
    }

    fn clear(&mut self) {
        self.members.clear();
        self.fields.clear();
    }
}

/// Hash-keyed key dedup over the header arena
#[derive(Debug, Default)]
struct KeyInterner {
    keys: HashMap<u64, Span>,
}

impl KeyInterner {
    fn intern(&mut self, arena: &mut Arena, key: &[u8]) -> Result<Span, ArenaError> {
        let hash = hash_key(key);
        if let Some(&span) = self.keys.get(&hash) {
            if arena.get(span) == key {
                return Ok(span);
            }
            // Hash collision: store without dedup
            return arena.copy(key);
        }
        let span = arena.copy(key)?;
        self.keys.insert(hash, span);
        Ok(span)
    }

    /// Find an already interned key without storing anything
    fn lookup(&self, arena: &Arena, key: &[u8]) -> Option<Span> {
        let span = *self.keys.get(&hash_key(key))?;
        (arena.get(span) == key).then_some(span)
    }

    fn len(&self) -> usize {
        self.keys.len()
    }
}

#[inline]
fn hash_key(key: &[u8]) -> u64 {
    let mut hasher = ahash::AHasher::default();
    key.hash(&mut hasher);
    hasher.finish()
}

/// Where a member key was stored
#[derive(Debug, Clone, Copy)]
enum MemberKey {
    /// Interned in the header arena
    Header(Span),
    /// Copied into the row arena
    Row(Span),
}

/// What the last line turned into
enum Shape {
    Blank,
    Object,
    Scalar,
}

/// Line-at-a-time JSONL tokenizer
#[derive(Debug)]
pub struct JsonlTokenizer {
    config: JsonlConfig,
    arenas: ScanArenas,
    scratch: JsonlScratch,
    interner: KeyInterner,
    header: Vec<Span>,
    has_header: bool,
    rows: u64,
    last_error: Option<TokenizeError>,
}

impl JsonlTokenizer {
    /// Create a tokenizer that owns its header and row arenas
    pub fn new(config: JsonlConfig, arenas: ScanArenas) -> Self {
        Self {
            config,
            arenas,
            scratch: JsonlScratch::with_capacity(32),
            interner: KeyInterner::default(),
            header: Vec::new(),
            has_header: false,
            rows: 0,
            last_error: None,
        }
    }

    /// Reuse scratch buffers from an earlier tokenizer
    pub fn with_scratch(mut self, mut scratch: JsonlScratch) -> Self {
        scratch.clear();
        self.scratch = scratch;
        self
    }

    /// Tokenize one line
    ///
    /// Whitespace-only lines are skipped. Every other successfully parsed
    /// line produces exactly one call to `on_record`.
    ///
    /// # Errors
    /// Invalid JSON, or a non-object line in strict mode, fails this line
    /// only; the tokenizer stays usable.
    pub fn feed<F>(&mut self, line: &[u8], mut on_record: F) -> Result<(), TokenizeError>
    where
        F: FnMut(&RecordView<'_>),
    {
        self.scratch.clear();
        let shape = match self.parse_line(line).and_then(|shape| self.shape_fields(shape)) {
            Ok(shape) => shape,
            Err(e) => {
                log_debug!("jsonl line rejected: {}", e);
                self.scratch.clear();
                self.last_error = Some(e.clone());
                return Err(e);
            }
        };

        let header = match shape {
            Shape::Blank => return Ok(()),
            Shape::Object if self.has_header => Some(self.header.as_slice()),
            Shape::Object | Shape::Scalar => None,
        };
        let view = RecordView::new(header, &self.scratch.fields, &self.arenas);
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

    /// Keys fixed by the first non-empty object
    #[inline]
    pub fn header(&self) -> &[Span] {
        &self.header
    }

    /// Header keys as owned strings
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

    /// Distinct keys stored by the interner
    #[inline]
    pub fn interned_keys(&self) -> usize {
        self.interner.len()
    }

    /// The tokenizer configuration
    #[inline]
    pub fn config(&self) -> &JsonlConfig {
        &self.config
    }

    /// The arena pair backing records
    #[inline]
    pub fn arenas(&self) -> &ScanArenas {
        &self.arenas
    }

    /// Reset the row arena; header and interned keys are unaffected
    #[inline]
    pub fn reset_rows(&mut self) {
        self.scratch.clear();
        self.arenas.row.reset();
    }

    /// Give the arenas and scratch buffers back for reuse
    pub fn into_parts(self) -> (ScanArenas, JsonlScratch) {
        (self.arenas, self.scratch)
    }

    fn parse_line(&mut self, line: &[u8]) -> Result<Shape, TokenizeError> {
        let Some(first) = line.iter().find(|b| !b.is_ascii_whitespace()) else {
            return Ok(Shape::Blank);
        };

        let mut sink = Sink {
            arenas: &mut self.arenas,
            interner: &mut self.interner,
            members: &mut self.scratch.members,
            intern_keys: self.config.intern_keys,
            frozen: self.has_header,
            cap: self.config.cap_nested_value_bytes,
        };

        if *first == b'{' {
            let mut de = serde_json::Deserializer::from_slice(line);
            ObjectSeed(&mut sink).deserialize(&mut de)?;
            de.end()?;
            return Ok(Shape::Object);
        }

        let raw: &RawValue = serde_json::from_slice(line)?;
        if self.config.strict {
            return Err(TokenizeError::NonObjectLine);
        }
        let value = sink.store_value(raw.get())?;
        self.scratch.fields.push(value);
        Ok(Shape::Scalar)
    }

    /// Turn parsed members into fields, fixing or applying the header
    fn shape_fields(&mut self, shape: Shape) -> Result<Shape, TokenizeError> {
        if !matches!(shape, Shape::Object) {
            return Ok(shape);
        }

        if !self.has_header {
            if !self.scratch.members.is_empty() {
                self.fix_header()?;
            }
            let JsonlScratch { members, fields } = &mut self.scratch;
            fields.extend(members.iter().map(|&(_, v)| v));
            return Ok(shape);
        }

        let Self {
            config,
            arenas,
            scratch: JsonlScratch { members, fields },
            header,
            ..
        } = self;
        let same_key = |k: MemberKey, h: Span| match k {
            MemberKey::Header(k) => k == h || arenas.header.get(k) == arenas.header.get(h),
            MemberKey::Row(k) => arenas.row.get(k) == arenas.header.get(h),
        };

        for (i, &h) in header.iter().enumerate() {
            // Members usually arrive in header order
            let value = match members.get(i) {
                Some(&(k, v)) if same_key(k, h) => Some(v),
                _ => members.iter().find(|&&(k, _)| same_key(k, h)).map(|&(_, v)| v),
            };
            fields.push(value.unwrap_or(Span::EMPTY));
        }
        Ok(shape)
    }

    fn fix_header(&mut self) -> Result<(), TokenizeError> {
        let ScanArenas { header, row } = &mut self.arenas;
        self.header.clear();
        for &(key, _) in &self.scratch.members {
            let span = match key {
                MemberKey::Header(span) => span,
                MemberKey::Row(span) => header.copy(row.get(span))?,
            };
            self.header.push(span);
        }
        self.has_header = true;
        log_debug!("jsonl header fixed with {} keys", self.header.len());
        Ok(())
    }
}

/// Writes keys and values of one line into the arenas
struct Sink<'s> {
    arenas: &'s mut ScanArenas,
    interner: &'s mut KeyInterner,
    members: &'s mut Vec<(MemberKey, Span)>,
    intern_keys: bool,
    /// The header is fixed; only its keys live in the header arena
    frozen: bool,
    cap: usize,
}

impl Sink<'_> {
    fn store_key(&mut self, key: &[u8]) -> Result<MemberKey, ArenaError> {
        if !self.intern_keys {
            return Ok(MemberKey::Row(self.arenas.row.copy(key)?));
        }
        if self.frozen {
            return match self.interner.lookup(&self.arenas.header, key) {
                Some(span) => Ok(MemberKey::Header(span)),
                None => Ok(MemberKey::Row(self.arenas.row.copy(key)?)),
            };
        }
        Ok(MemberKey::Header(
            self.interner.intern(&mut self.arenas.header, key)?,
        ))
    }

    /// Convert the source text of one value
    fn store_value(&mut self, raw: &str) -> Result<Span, TokenizeError> {
        let row = &mut self.arenas.row;
        let bytes = raw.as_bytes();
        match bytes.first() {
            None | Some(b'n') => Ok(Span::EMPTY),
            Some(b't') => Ok(row.copy(b"true")?),
            Some(b'f') => Ok(row.copy(b"false")?),
            Some(b'"') => {
                if memchr::memchr(b'\\', bytes).is_none() {
                    return Ok(row.copy(&bytes[1..bytes.len() - 1])?);
                }
                let mut de = serde_json::Deserializer::from_str(raw);
                Ok(StrSeed(row).deserialize(&mut de)?)
            }
            Some(b'{' | b'[') => {
                let cap = self.cap;
                if bytes.len() <= cap {
                    Ok(row.copy(bytes)?)
                } else if cap > ELLIPSIS.len() {
                    Ok(row.copy_concat(&[&bytes[..cap - ELLIPSIS.len()], ELLIPSIS])?)
                } else {
                    Ok(row.copy(&bytes[..cap])?)
                }
            }
            Some(_) => store_number(row, raw),
        }
    }
}

/// Normalize a JSON number to its shortest round-trip text
///
/// The token is already validated, so a number outside the `f64` range
/// (`1e400`) keeps its source text instead of failing the line.
fn store_number(row: &mut Arena, raw: &str) -> Result<Span, TokenizeError> {
    let Ok(number) = serde_json::from_str::<Number>(raw) else {
        return Ok(row.copy(raw.as_bytes())?);
    };
    let mut buf = [0u8; 40];
    let total = buf.len();
    let mut out = &mut buf[..];
    if write!(out, "{}", number).is_err() {
        return Ok(row.copy(raw.as_bytes())?);
    }
    let len = total - out.len();
    Ok(row.copy(&buf[..len])?)
}

struct ObjectSeed<'a, 's>(&'a mut Sink<'s>);

impl<'de> DeserializeSeed<'de> for ObjectSeed<'_, '_> {
    type Value = ();

    fn deserialize<D: de::Deserializer<'de>>(self, deserializer: D) -> Result<(), D::Error> {
        deserializer.deserialize_map(self)
    }
}

impl<'de> Visitor<'de> for ObjectSeed<'_, '_> {
    type Value = ();

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a JSON object")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<(), A::Error> {
        let sink = self.0;
        while let Some(key) = map.next_key_seed(KeySeed(&mut *sink))? {
            let raw: &'de RawValue = map.next_value()?;
            let value = sink.store_value(raw.get()).map_err(de::Error::custom)?;
            sink.members.push((key, value));
        }
        Ok(())
    }
}

struct KeySeed<'a, 's>(&'a mut Sink<'s>);

impl<'de> DeserializeSeed<'de> for KeySeed<'_, '_> {
    type Value = MemberKey;

    fn deserialize<D: de::Deserializer<'de>>(self, deserializer: D) -> Result<MemberKey, D::Error> {
        deserializer.deserialize_str(self)
    }
}

impl<'de> Visitor<'de> for KeySeed<'_, '_> {
    type Value = MemberKey;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("an object key")
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<MemberKey, E> {
        self.0.store_key(v.as_bytes()).map_err(E::custom)
    }
}

/// Unescapes a JSON string directly into the arena
struct StrSeed<'a>(&'a mut Arena);

impl<'de> DeserializeSeed<'de> for StrSeed<'_> {
    type Value = Span;

    fn deserialize<D: de::Deserializer<'de>>(self, deserializer: D) -> Result<Span, D::Error> {
        deserializer.deserialize_str(self)
    }
}

impl<'de> Visitor<'de> for StrSeed<'_> {
    type Value = Span;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a JSON string")
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Span, E> {
        self.0.copy(v.as_bytes()).map_err(E::custom)
    }
}
