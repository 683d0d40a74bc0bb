//! Per-column type profiling
//!
//! The first non-null value of a column fixes its [`FieldKind`]. A later
//! value that does not coerce to that kind is a field error, handled by the
//! policy's [`OnError`] disposition.
//!
//! Columns are keyed by header name once records carry a header. Positional
//! profiles gathered from header-less records before that point are dropped,
//! and header-less records after it are counted but not profiled.

use super::error::ScanError;
use super::policy::{FieldKind, OnError, ParsePolicy};
use super::record::RecordView;
use serde::Serialize;
use std::collections::BTreeMap;

/// Values seen per kind
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct KindCounts {
    /// Null tokens, plus errors under [`OnError::Null`]
    pub null: u64,
    /// Booleans
    pub bool: u64,
    /// Numbers
    pub number: u64,
    /// Dates
    pub date: u64,
    /// Text, plus errors under [`OnError::Lenient`]
    pub text: u64,
}

impl KindCounts {
    fn bump(&mut self, kind: FieldKind) {
        match kind {
            FieldKind::Null => self.null += 1,
            FieldKind::Bool => self.bool += 1,
            FieldKind::Number => self.number += 1,
            FieldKind::Date => self.date += 1,
            FieldKind::Text => self.text += 1,
        }
    }

    /// Sum over all kinds
    pub fn total(&self) -> u64 {
        self.null + self.bool + self.number + self.date + self.text
    }
}

/// Profile of one column
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColumnProfile {
    /// Column or key name; `column_<i>` without a header
    pub name: String,
    /// Kind fixed by the first non-null value
    pub kind: Option<FieldKind>,
    /// Values seen per kind
    pub counts: KindCounts,
    /// Values that failed the column kind
    pub errors: u64,
}

/// Accumulates [`ColumnProfile`]s over a stream of records
#[derive(Debug, Clone, Default)]
pub struct FieldProfiler {
    policy: ParsePolicy,
    columns: Vec<ColumnProfile>,
    keyed: bool,
    unkeyed: u64,
}

impl FieldProfiler {
    /// Create a profiler applying `policy`
    pub fn new(policy: ParsePolicy) -> Self {
        Self {
            policy,
            columns: Vec::new(),
            keyed: false,
            unkeyed: 0,
        }
    }

    /// Classify every field of `record`
    ///
    /// # Errors
    /// Under [`OnError::Strict`], the first field that fails its column kind
    /// returns [`ScanError::FieldType`].
    pub fn observe(&mut self, record: &RecordView<'_>, line: u64) -> Result<(), ScanError> {
        match (record.header().is_some(), self.keyed) {
            (true, false) => {
                if !self.columns.is_empty() {
                    log_debug!("profiler: header seen at line {}, dropping positional columns", line);
                    self.columns.clear();
                }
                self.keyed = true;
            }
            (false, true) => {
                self.unkeyed += 1;
                return Ok(());
            }
            _ => {}
        }

        for i in 0..record.len() {
            if i == self.columns.len() {
                let name = match record.colname(i) {
                    b"" => format!("column_{}", i),
                    name => String::from_utf8_lossy(name).into_owned(),
                };
                self.columns.push(ColumnProfile {
                    name,
                    kind: None,
                    counts: KindCounts::default(),
                    errors: 0,
                });
            }

            let bytes = record.at(i);
            let observed = self.policy.classify(bytes);
            let column = &mut self.columns[i];

            let kind = match (column.kind, observed) {
                (_, FieldKind::Null) => FieldKind::Null,
                (None, observed) => {
                    column.kind = Some(observed);
                    observed
                }
                (Some(kind), observed) if kind == observed => kind,
                (Some(kind), _) if self.policy.conforms(kind, bytes) => kind,
                (Some(_), _) => {
                    column.errors += 1;
                    match self.policy.on_error {
                        OnError::Strict => {
                            return Err(ScanError::FieldType {
                                field: column.name.clone(),
                                line,
                            })
                        }
                        OnError::Lenient => FieldKind::Text,
                        OnError::Null => FieldKind::Null,
                    }
                }
            };
            column.counts.bump(kind);
        }
        Ok(())
    }

    /// Profiles gathered so far, in column order
    #[inline]
    pub fn columns(&self) -> &[ColumnProfile] {
        &self.columns
    }

    /// Error counts for columns with at least one error
    pub fn errors_by_field(&self) -> BTreeMap<String, u64> {
        self.columns
            .iter()
            .filter(|c| c.errors > 0)
            .map(|c| (c.name.clone(), c.errors))
            .collect()
    }

    /// Header-less records skipped because columns are keyed by name
    #[inline]
    pub fn unkeyed_records(&self) -> u64 {
        self.unkeyed
    }

    /// Release the gathered profiles
    pub fn into_columns(self) -> Vec<ColumnProfile> {
        self.columns
    }
}
