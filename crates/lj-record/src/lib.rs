#![forbid(unsafe_code)]

use std::fmt;
use std::num::NonZeroUsize;
use std::ops::Range;

use memchr::memmem;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RecordError {
    #[error("delimiter must not be empty")]
    EmptyDelimiter,
    #[error("valid column values are >= 1")]
    ZeroColumn,
}

/// Field separator for one input. Splitting is plain substring matching,
/// never a pattern.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Delimiter(String);

impl Delimiter {
    pub fn new(value: impl Into<String>) -> Result<Self, RecordError> {
        let value = value.into();
        if value.is_empty() {
            return Err(RecordError::EmptyDelimiter);
        }
        Ok(Self(value))
    }

    #[must_use]
    pub fn space() -> Self {
        Self(" ".to_owned())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }
}

impl Default for Delimiter {
    fn default() -> Self {
        Self::space()
    }
}

impl TryFrom<String> for Delimiter {
    type Error = RecordError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Delimiter> for String {
    fn from(value: Delimiter) -> Self {
        value.0
    }
}

impl fmt::Display for Delimiter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// 1-based key column selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "usize", into = "usize")]
pub struct ColumnIndex(NonZeroUsize);

impl ColumnIndex {
    pub const FIRST: Self = Self(NonZeroUsize::MIN);

    pub fn new(one_based: usize) -> Result<Self, RecordError> {
        NonZeroUsize::new(one_based)
            .map(Self)
            .ok_or(RecordError::ZeroColumn)
    }

    #[must_use]
    pub fn get(self) -> usize {
        self.0.get()
    }

    /// Position of this column in a zero-based field slice.
    #[must_use]
    pub fn offset(self) -> usize {
        self.0.get() - 1
    }
}

impl Default for ColumnIndex {
    fn default() -> Self {
        Self::FIRST
    }
}

impl TryFrom<usize> for ColumnIndex {
    type Error = RecordError;

    fn try_from(value: usize) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<ColumnIndex> for usize {
    fn from(value: ColumnIndex) -> Self {
        value.get()
    }
}

impl fmt::Display for ColumnIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A line that does not reach the configured key column. Recovered locally:
/// the caller reports it and skips the line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnMissing {
    pub line_number: u64,
    pub column: ColumnIndex,
    pub field_count: usize,
}

impl ColumnMissing {
    #[must_use]
    pub fn diagnostic(&self, source_name: &str) -> String {
        format!("{source_name} line {}: column missing", self.line_number)
    }
}

/// Strips trailing `\n` / `\r` only. Leading and trailing spaces are data.
#[must_use]
pub fn trim_line_terminator(line: &[u8]) -> &[u8] {
    let kept = line
        .iter()
        .rposition(|byte| !matches!(byte, b'\n' | b'\r'))
        .map_or(0, |last| last + 1);
    &line[..kept]
}

/// One physical line split on its file's delimiter. Lines are opaque bytes;
/// no encoding is assumed. Fields are byte spans into `raw`, so the split
/// never copies and never changes after parse.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    raw: Vec<u8>,
    spans: Vec<Range<usize>>,
    line_number: u64,
}

impl Record {
    #[must_use]
    pub fn parse(line: impl Into<Vec<u8>>, delimiter: &Delimiter, line_number: u64) -> Self {
        let mut raw = line.into();
        let kept = trim_line_terminator(&raw).len();
        raw.truncate(kept);
        let spans = split_spans(&raw, delimiter.as_bytes());
        Self {
            raw,
            spans,
            line_number,
        }
    }

    #[must_use]
    pub fn raw(&self) -> &[u8] {
        &self.raw
    }

    #[must_use]
    pub fn line_number(&self) -> u64 {
        self.line_number
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.spans.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.spans.is_empty()
    }

    #[must_use]
    pub fn field(&self, offset: usize) -> Option<&[u8]> {
        self.spans.get(offset).map(|span| &self.raw[span.clone()])
    }

    pub fn fields(&self) -> impl Iterator<Item = &[u8]> + '_ {
        self.spans.iter().map(|span| &self.raw[span.clone()])
    }

    pub fn key_at(&self, column: ColumnIndex) -> Result<&[u8], ColumnMissing> {
        self.field(column.offset())
            .ok_or_else(|| self.column_missing(column))
    }

    /// Re-joins the fields with `separator`, leaving out `skip` when given.
    /// The record itself is untouched.
    #[must_use]
    pub fn rejoin(&self, separator: &[u8], skip: Option<ColumnIndex>) -> Vec<u8> {
        let skip = skip.map(ColumnIndex::offset);
        let mut out = Vec::with_capacity(self.raw.len());
        let mut first = true;
        for (offset, field) in self.fields().enumerate() {
            if Some(offset) == skip {
                continue;
            }
            if !first {
                out.extend_from_slice(separator);
            }
            out.extend_from_slice(field);
            first = false;
        }
        out
    }

    pub fn into_keyed(self, column: ColumnIndex) -> Result<KeyedRecord, ColumnMissing> {
        let key_field = column.offset();
        if key_field >= self.spans.len() {
            return Err(self.column_missing(column));
        }
        Ok(KeyedRecord {
            record: self,
            key_field,
        })
    }

    fn column_missing(&self, column: ColumnIndex) -> ColumnMissing {
        ColumnMissing {
            line_number: self.line_number,
            column,
            field_count: self.spans.len(),
        }
    }
}

/// A record whose key column is known to exist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyedRecord {
    record: Record,
    key_field: usize,
}

impl KeyedRecord {
    /// Key bytes. Merge ordering compares these bytewise.
    #[must_use]
    pub fn key(&self) -> &[u8] {
        let span = &self.record.spans[self.key_field];
        &self.record.raw[span.clone()]
    }

    #[must_use]
    pub fn record(&self) -> &Record {
        &self.record
    }

    #[must_use]
    pub fn into_record(self) -> Record {
        self.record
    }
}

fn split_spans(raw: &[u8], delimiter: &[u8]) -> Vec<Range<usize>> {
    let mut spans = Vec::new();
    let mut start = 0;
    for pos in memmem::find_iter(raw, delimiter) {
        spans.push(start..pos);
        start = pos + delimiter.len();
    }
    spans.push(start..raw.len());
    spans
}
