#![forbid(unsafe_code)]

use std::num::NonZeroUsize;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use lj_record::{ColumnIndex, Delimiter, RecordError};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Environment variable supplying the default delimiter for both inputs.
pub const FIELD_SEPARATOR_ENV: &str = "LINEJOIN_FS";

const DEFAULT_JOIN_SEPARATOR: &str = " ";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Strategy {
    /// Index all of file 1, stream file 2 once.
    #[default]
    Hash,
    /// Index file 1 in `chunks` byte-sized slices, re-streaming file 2 per slice.
    Chunked { chunks: NonZeroUsize },
    /// Both inputs pre-sorted ascending by key; two cursors in lockstep.
    SortedMerge,
}

impl Strategy {
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Hash => "hash",
            Self::Chunked { .. } => "chunked",
            Self::SortedMerge => "sorted_merge",
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("filter mode and missing mode cannot be combined")]
    ConflictingModes,
    #[error("missing mode is not supported by the sorted merge strategy")]
    MissingModeUnsupported,
    #[error(transparent)]
    Record(#[from] RecordError),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunConfig {
    pub column1: ColumnIndex,
    pub column2: ColumnIndex,
    pub delimiter1: Delimiter,
    pub delimiter2: Delimiter,
    pub output_delimiter: Option<String>,
    pub join_separator: Option<String>,
    pub filter_mode: bool,
    pub remove_duplicate: bool,
    pub missing_mode: bool,
    pub strategy: Strategy,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self::with_default_delimiter(Delimiter::space())
    }
}

impl RunConfig {
    #[must_use]
    pub fn with_default_delimiter(delimiter: Delimiter) -> Self {
        Self {
            column1: ColumnIndex::FIRST,
            column2: ColumnIndex::FIRST,
            delimiter1: delimiter.clone(),
            delimiter2: delimiter,
            output_delimiter: None,
            join_separator: None,
            filter_mode: false,
            remove_duplicate: false,
            missing_mode: false,
            strategy: Strategy::Hash,
        }
    }

    /// Defaults, with both delimiters taken from `LINEJOIN_FS` when it is set.
    #[must_use]
    pub fn from_env() -> Self {
        let value = std::env::var(FIELD_SEPARATOR_ENV).ok();
        Self::with_default_delimiter(default_delimiter(value))
    }

    #[must_use]
    pub fn with_columns(mut self, column1: ColumnIndex, column2: ColumnIndex) -> Self {
        self.column1 = column1;
        self.column2 = column2;
        self
    }

    #[must_use]
    pub fn with_delimiters(mut self, delimiter1: Delimiter, delimiter2: Delimiter) -> Self {
        self.delimiter1 = delimiter1;
        self.delimiter2 = delimiter2;
        self
    }

    #[must_use]
    pub fn with_output_delimiter(mut self, delimiter: impl Into<String>) -> Self {
        self.output_delimiter = Some(delimiter.into());
        self
    }

    #[must_use]
    pub fn with_join_separator(mut self, separator: impl Into<String>) -> Self {
        self.join_separator = Some(separator.into());
        self
    }

    #[must_use]
    pub fn with_filter_mode(mut self, enabled: bool) -> Self {
        self.filter_mode = enabled;
        self
    }

    #[must_use]
    pub fn with_remove_duplicate(mut self, enabled: bool) -> Self {
        self.remove_duplicate = enabled;
        self
    }

    #[must_use]
    pub fn with_missing_mode(mut self, enabled: bool) -> Self {
        self.missing_mode = enabled;
        self
    }

    #[must_use]
    pub fn with_strategy(mut self, strategy: Strategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// Explicit separator, else the output delimiter, else a single space.
    #[must_use]
    pub fn join_separator(&self) -> &str {
        self.join_separator
            .as_deref()
            .or(self.output_delimiter.as_deref())
            .unwrap_or(DEFAULT_JOIN_SEPARATOR)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.validate_for(self.strategy)
    }

    /// Checks the mode toggles against the strategy that will actually run.
    pub fn validate_for(&self, strategy: Strategy) -> Result<(), ConfigError> {
        if self.filter_mode && self.missing_mode {
            return Err(ConfigError::ConflictingModes);
        }
        if self.missing_mode && matches!(strategy, Strategy::SortedMerge) {
            return Err(ConfigError::MissingModeUnsupported);
        }
        Ok(())
    }
}

/// An unset or empty environment value falls back to a single space.
#[must_use]
pub fn default_delimiter(env_value: Option<String>) -> Delimiter {
    env_value
        .and_then(|value| Delimiter::new(value).ok())
        .unwrap_or_default()
}

/// Cooperative stop flag checked by the engine between lines.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}
