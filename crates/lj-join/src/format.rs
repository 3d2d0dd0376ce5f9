use std::borrow::Cow;

use lj_record::Record;
use lj_runtime::RunConfig;

/// Turns matched (or, in missing mode, unmatched) records into output text.
///
/// With an output delimiter, each side is re-joined with it; with
/// remove-duplicate, the key field is dropped from the file 2 side only.
/// Without either, lines pass through untouched.
#[derive(Debug, Clone, Copy)]
pub struct OutputFormatter<'a> {
    config: &'a RunConfig,
}

impl<'a> OutputFormatter<'a> {
    #[must_use]
    pub fn new(config: &'a RunConfig) -> Self {
        Self { config }
    }

    #[must_use]
    pub fn first<'r>(&self, record: &'r Record) -> Cow<'r, [u8]> {
        match &self.config.output_delimiter {
            Some(delimiter) => Cow::Owned(record.rejoin(delimiter.as_bytes(), None)),
            None => Cow::Borrowed(record.raw()),
        }
    }

    #[must_use]
    pub fn second<'r>(&self, record: &'r Record) -> Cow<'r, [u8]> {
        let skip = self
            .config
            .remove_duplicate
            .then_some(self.config.column2);
        match (&self.config.output_delimiter, skip) {
            (Some(delimiter), skip) => Cow::Owned(record.rejoin(delimiter.as_bytes(), skip)),
            (None, Some(column)) => {
                Cow::Owned(record.rejoin(self.config.delimiter2.as_bytes(), Some(column)))
            }
            (None, None) => Cow::Borrowed(record.raw()),
        }
    }

    #[must_use]
    pub fn joined(&self, first: &[u8], second: &[u8]) -> Vec<u8> {
        let separator = self.config.join_separator().as_bytes();
        let mut line = Vec::with_capacity(first.len() + separator.len() + second.len());
        line.extend_from_slice(first);
        line.extend_from_slice(separator);
        line.extend_from_slice(second);
        line
    }
}
