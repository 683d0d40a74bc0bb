//! Field type coercion
//!
//! [`ParsePolicy`] turns raw field bytes into numbers, booleans, dates or
//! nulls. It never fails loudly: a value that does not coerce yields `None`,
//! and the caller decides what that means via [`OnError`].

use super::date::parse_iso8601_ms;
use serde::{Deserialize, Serialize};

/// What the caller should do with a value that fails coercion
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OnError {
    /// Abort the scan
    Strict,
    /// Keep the value as text
    Lenient,
    /// Treat the value as null
    #[default]
    Null,
}

/// Supported date syntaxes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DateMode {
    /// `YYYY-MM-DD[(T| )HH:MM:SS[.fff]][Z|±HH:MM]`
    #[default]
    Iso8601,
}

/// Date recognition settings
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatePolicy {
    /// Accepted syntax
    pub mode: DateMode,
}

/// Boolean recognition settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BoolPolicy {
    /// Tokens read as `true`
    pub true_tokens: Vec<String>,
    /// Tokens read as `false`
    pub false_tokens: Vec<String>,
    /// Compare tokens byte-for-byte instead of ASCII case-insensitively
    pub case_sensitive: bool,
}

impl Default for BoolPolicy {
    fn default() -> Self {
        Self {
            true_tokens: vec!["true".into(), "1".into(), "TRUE".into(), "True".into()],
            false_tokens: vec!["false".into(), "0".into(), "FALSE".into(), "False".into()],
            case_sensitive: false,
        }
    }
}

impl BoolPolicy {
    /// Use custom token sets
    pub fn with_tokens<T, F>(true_tokens: T, false_tokens: F) -> Self
    where
        T: IntoIterator,
        T::Item: Into<String>,
        F: IntoIterator,
        F::Item: Into<String>,
    {
        Self {
            true_tokens: true_tokens.into_iter().map(Into::into).collect(),
            false_tokens: false_tokens.into_iter().map(Into::into).collect(),
            case_sensitive: false,
        }
    }

    /// Require exact-case matches
    pub fn case_sensitive(mut self, yes: bool) -> Self {
        self.case_sensitive = yes;
        self
    }

    fn matches(&self, tokens: &[String], bytes: &[u8]) -> bool {
        tokens.iter().any(|t| {
            if self.case_sensitive {
                t.as_bytes() == bytes
            } else {
                t.as_bytes().eq_ignore_ascii_case(bytes)
            }
        })
    }
}

/// Classification of a single field value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldKind {
    /// Empty or a null token
    Null,
    /// Matched the boolean policy
    Bool,
    /// Parsed as a float
    Number,
    /// Parsed as a date
    Date,
    /// Anything else
    Text,
}

impl FieldKind {
    /// Lowercase name, as used in summaries
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool => "bool",
            Self::Number => "number",
            Self::Date => "date",
            Self::Text => "text",
        }
    }
}

/// Type coercion rules for field values
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParsePolicy {
    /// Disposition for values that fail their column's type
    pub on_error: OnError,
    /// Date recognition; `None` disables dates
    pub date: Option<DatePolicy>,
    /// Boolean recognition; `None` disables booleans
    pub boolean: Option<BoolPolicy>,
}

impl ParsePolicy {
    /// Numbers and nulls only
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Numbers, ISO-8601 dates and the default boolean tokens
    pub fn typed() -> Self {
        Self {
            on_error: OnError::default(),
            date: Some(DatePolicy::default()),
            boolean: Some(BoolPolicy::default()),
        }
    }

    /// Set the error disposition
    pub fn with_on_error(mut self, on_error: OnError) -> Self {
        self.on_error = on_error;
        self
    }

    /// Enable date recognition
    pub fn with_date(mut self, date: DatePolicy) -> Self {
        self.date = Some(date);
        self
    }

    /// Enable boolean recognition
    pub fn with_bool(mut self, boolean: BoolPolicy) -> Self {
        self.boolean = Some(boolean);
        self
    }

    /// Parse the whole value as a float
    ///
    /// An optional `-` must be followed by a digit or `.`, so `+1`, `inf` and
    /// `infinity` are rejected. Leading or trailing whitespace, a partial
    /// match, or invalid UTF-8 all yield `None`, regardless of [`OnError`].
    /// Magnitudes beyond `f64` saturate to infinity.
    #[inline]
    pub fn parse_number(&self, bytes: &[u8]) -> Option<f64> {
        let unsigned = bytes.strip_prefix(b"-").unwrap_or(bytes);
        if !matches!(unsigned.first(), Some(b'0'..=b'9' | b'.')) {
            return None;
        }
        std::str::from_utf8(bytes).ok()?.parse::<f64>().ok()
    }

    /// Parse a date into epoch milliseconds (UTC)
    #[inline]
    pub fn parse_date(&self, bytes: &[u8]) -> Option<i64> {
        match self.date?.mode {
            DateMode::Iso8601 => parse_iso8601_ms(bytes),
        }
    }

    /// Match the configured boolean tokens
    pub fn parse_bool(&self, bytes: &[u8]) -> Option<bool> {
        let policy = self.boolean.as_ref()?;
        if policy.matches(&policy.true_tokens, bytes) {
            Some(true)
        } else if policy.matches(&policy.false_tokens, bytes) {
            Some(false)
        } else {
            None
        }
    }

    /// Empty, `null`, `NULL`, `NaN` or `NA`
    #[inline]
    pub fn is_null_token(&self, bytes: &[u8]) -> bool {
        is_null_token(bytes)
    }

    /// Classify a value, trying null, boolean, number, then date
    ///
    /// Booleans come before numbers so `0`/`1` read as booleans when a bool
    /// policy is set.
    pub fn classify(&self, bytes: &[u8]) -> FieldKind {
        if is_null_token(bytes) {
            FieldKind::Null
        } else if self.parse_bool(bytes).is_some() {
            FieldKind::Bool
        } else if self.parse_number(bytes).is_some() {
            FieldKind::Number
        } else if self.parse_date(bytes).is_some() {
            FieldKind::Date
        } else {
            FieldKind::Text
        }
    }

    /// Whether `bytes` coerces to `kind`
    pub fn conforms(&self, kind: FieldKind, bytes: &[u8]) -> bool {
        match kind {
            FieldKind::Null => is_null_token(bytes),
            FieldKind::Bool => self.parse_bool(bytes).is_some(),
            FieldKind::Number => self.parse_number(bytes).is_some(),
            FieldKind::Date => self.parse_date(bytes).is_some(),
            FieldKind::Text => true,
        }
    }
}

/// Empty, `null`, `NULL`, `NaN` or `NA`
#[inline]
pub fn is_null_token(bytes: &[u8]) -> bool {
    matches!(bytes, b"" | b"null" | b"NULL" | b"NaN" | b"NA")
}
