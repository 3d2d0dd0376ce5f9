#![forbid(unsafe_code)]

//! Equi-join of two line-oriented text inputs on one field each.
//!
//! Three strategies share one contract ([`JoinStrategy::run`]) and the same
//! record model and output formatting:
//!
//! - [`HashJoin`] indexes all of file 1 and streams file 2 once.
//! - [`ChunkedHashJoin`] indexes file 1 one byte-sized chunk at a time and
//!   re-streams file 2 from the start for every chunk. Output is grouped by
//!   chunk, then by file 2 order.
//! - [`SortedMergeJoin`] walks two key-sorted inputs in lockstep and holds at
//!   most one key group per side.

use std::io::{self, Write};
use std::path::Path;

use lj_io::{DiagnosticSink, Line, LineReader, LineSource, OutputSink, SinkError, SourceError};
use lj_record::{KeyedRecord, Record};
use lj_runtime::{CancellationToken, ConfigError, RunConfig, Strategy};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod chunked;
pub mod format;
pub mod hash;
pub mod index;
pub mod merge;

pub use chunked::ChunkedHashJoin;
pub use format::OutputFormatter;
pub use hash::HashJoin;
pub use index::JoinIndex;
pub use merge::SortedMergeJoin;

#[derive(Debug, Error)]
pub enum JoinError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// An input could not be opened or read. Fatal for the run.
    #[error(transparent)]
    Source(#[from] SourceError),
    #[error("error writing output: {0}")]
    Output(#[source] io::Error),
}

/// Why a strategy stopped before exhausting its inputs.
#[derive(Debug)]
pub enum Halt {
    Cancelled,
    OutputClosed,
    Failed(JoinError),
}

impl From<SourceError> for Halt {
    fn from(error: SourceError) -> Self {
        Self::Failed(JoinError::Source(error))
    }
}

impl From<SinkError> for Halt {
    fn from(error: SinkError) -> Self {
        match error {
            SinkError::Closed => Self::OutputClosed,
            SinkError::Write(error) => Self::Failed(JoinError::Output(error)),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunReport {
    pub strategy: Strategy,
    pub file1_lines: u64,
    pub file2_lines: u64,
    pub indexed_records: u64,
    pub diagnostics: u64,
    pub emitted: u64,
    pub file2_passes: u64,
    pub cancelled: bool,
    pub output_closed: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    First,
    Second,
}

/// Per-run mutable state: sinks, counters, and the borrowed immutable config.
pub struct JoinContext<'a, W: Write, D: Write> {
    config: &'a RunConfig,
    formatter: OutputFormatter<'a>,
    output: OutputSink<W>,
    diagnostics: DiagnosticSink<D>,
    cancel: &'a CancellationToken,
    report: RunReport,
}

impl<'a, W: Write, D: Write> JoinContext<'a, W, D> {
    fn new(
        config: &'a RunConfig,
        strategy: Strategy,
        output: W,
        diagnostics: D,
        cancel: &'a CancellationToken,
    ) -> Self {
        Self {
            config,
            formatter: OutputFormatter::new(config),
            output: OutputSink::new(output),
            diagnostics: DiagnosticSink::new(diagnostics),
            cancel,
            report: RunReport {
                strategy,
                ..RunReport::default()
            },
        }
    }

    #[must_use]
    pub fn config(&self) -> &RunConfig {
        self.config
    }

    pub(crate) fn checkpoint(&self) -> Result<(), Halt> {
        if self.cancel.is_cancelled() {
            return Err(Halt::Cancelled);
        }
        Ok(())
    }

    pub(crate) fn count_line(&mut self, side: Side) {
        match side {
            Side::First => self.report.file1_lines += 1,
            Side::Second => self.report.file2_lines += 1,
        }
    }

    /// Parses `line` for `side` and resolves its key. A line without the key
    /// column is reported (when `diagnose`) and dropped.
    pub(crate) fn keyed(
        &mut self,
        source_name: &str,
        side: Side,
        line: Line,
        diagnose: bool,
    ) -> Option<KeyedRecord> {
        let (delimiter, column) = match side {
            Side::First => (&self.config.delimiter1, self.config.column1),
            Side::Second => (&self.config.delimiter2, self.config.column2),
        };
        match Record::parse(line.text, delimiter, line.number).into_keyed(column) {
            Ok(keyed) => Some(keyed),
            Err(missing) => {
                if diagnose {
                    self.diagnostics.column_missing(source_name, &missing);
                }
                None
            }
        }
    }

    /// Output for one file 2 record against its matching file 1 group: the
    /// joined pair per member, or just the file 1 line in filter mode.
    pub(crate) fn emit_matches<'r>(
        &mut self,
        first_group: impl IntoIterator<Item = &'r Record>,
        second: &Record,
    ) -> Result<(), Halt> {
        let filter_mode = self.config.filter_mode;
        let second_text = (!filter_mode).then(|| self.formatter.second(second));
        for first in first_group {
            let first_text = self.formatter.first(first);
            match &second_text {
                Some(second_text) => {
                    self.output.emit(&self.formatter.joined(&first_text, second_text))?;
                }
                None => self.output.emit(&first_text)?,
            }
        }
        Ok(())
    }

    pub(crate) fn emit_missing(&mut self, second: &Record) -> Result<(), Halt> {
        let line = self.formatter.second(second);
        self.output.emit(&line)?;
        Ok(())
    }

    fn finish(mut self, outcome: Result<(), Halt>) -> Result<RunReport, JoinError> {
        match outcome {
            Ok(()) => {}
            Err(Halt::Cancelled) => self.report.cancelled = true,
            Err(Halt::OutputClosed) => self.report.output_closed = true,
            Err(Halt::Failed(error)) => return Err(error),
        }

        if !self.report.output_closed {
            match self.output.flush() {
                Ok(()) => {}
                Err(SinkError::Closed) => self.report.output_closed = true,
                Err(SinkError::Write(error)) => return Err(JoinError::Output(error)),
            }
        }

        self.report.emitted = self.output.lines_written();
        self.report.diagnostics = self.diagnostics.count();

        #[cfg(feature = "tracing")]
        tracing::debug!(
            strategy = self.report.strategy.name(),
            emitted = self.report.emitted,
            diagnostics = self.report.diagnostics,
            cancelled = self.report.cancelled,
            output_closed = self.report.output_closed,
            "join finished"
        );

        Ok(self.report)
    }
}

mod sealed {
    pub trait Sealed {}

    impl Sealed for super::HashJoin {}
    impl Sealed for super::ChunkedHashJoin {}
    impl Sealed for super::SortedMergeJoin {}
}

/// One way of running the join. Implementations own their cursor and index
/// state for the duration of a single [`run`](JoinStrategy::run).
///
/// The trait is sealed: [`HashJoin`], [`ChunkedHashJoin`] and
/// [`SortedMergeJoin`] are its only implementations, and callers outside this
/// crate go through [`run`](JoinStrategy::run) or [`join_sources`].
///
/// ```compile_fail
/// use std::io::Write;
///
/// use lj_io::LineSource;
/// use lj_join::{Halt, JoinContext, JoinStrategy};
/// use lj_runtime::Strategy;
///
/// struct Passthrough;
///
/// impl JoinStrategy for Passthrough {
///     fn kind(&self) -> Strategy {
///         Strategy::Hash
///     }
///
///     fn execute<S1, S2, W, D>(
///         &self,
///         _file1: &mut S1,
///         _file2: &mut S2,
///         _ctx: &mut JoinContext<'_, W, D>,
///     ) -> Result<(), Halt>
///     where
///         S1: LineSource,
///         S2: LineSource,
///         W: Write,
///         D: Write,
///     {
///         Ok(())
///     }
/// }
/// ```
pub trait JoinStrategy: sealed::Sealed {
    fn kind(&self) -> Strategy;

    fn execute<S1, S2, W, D>(
        &self,
        file1: &mut S1,
        file2: &mut S2,
        ctx: &mut JoinContext<'_, W, D>,
    ) -> Result<(), Halt>
    where
        S1: LineSource,
        S2: LineSource,
        W: Write,
        D: Write;

    /// Joins `file1` with `file2`, writing result lines to `output` and
    /// per-line diagnostics to `diagnostics`. A closed output stream or a
    /// cancellation ends the run early and is recorded in the report.
    fn run<S1, S2, W, D>(
        &self,
        config: &RunConfig,
        file1: &mut S1,
        file2: &mut S2,
        output: W,
        diagnostics: D,
        cancel: &CancellationToken,
    ) -> Result<RunReport, JoinError>
    where
        S1: LineSource,
        S2: LineSource,
        W: Write,
        D: Write,
    {
        config.validate_for(self.kind())?;
        let mut ctx = JoinContext::new(config, self.kind(), output, diagnostics, cancel);
        let outcome = self.execute(file1, file2, &mut ctx);
        ctx.finish(outcome)
    }
}

/// Runs the strategy selected by `config.strategy`.
pub fn join_sources<S1, S2, W, D>(
    config: &RunConfig,
    file1: &mut S1,
    file2: &mut S2,
    output: W,
    diagnostics: D,
    cancel: &CancellationToken,
) -> Result<RunReport, JoinError>
where
    S1: LineSource,
    S2: LineSource,
    W: Write,
    D: Write,
{
    match config.strategy {
        Strategy::Hash => HashJoin.run(config, file1, file2, output, diagnostics, cancel),
        Strategy::Chunked { chunks } => {
            ChunkedHashJoin::new(chunks).run(config, file1, file2, output, diagnostics, cancel)
        }
        Strategy::SortedMerge => {
            SortedMergeJoin.run(config, file1, file2, output, diagnostics, cancel)
        }
    }
}

/// Opens both paths read-only and runs [`join_sources`]. Both files are
/// closed when this returns, on every path.
pub fn join_files<W, D>(
    config: &RunConfig,
    file1: impl AsRef<Path>,
    file2: impl AsRef<Path>,
    output: W,
    diagnostics: D,
    cancel: &CancellationToken,
) -> Result<RunReport, JoinError>
where
    W: Write,
    D: Write,
{
    let mut file1 = LineReader::open(file1)?;
    let mut file2 = LineReader::open(file2)?;
    join_sources(config, &mut file1, &mut file2, output, diagnostics, cancel)
}
