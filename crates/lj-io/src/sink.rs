use std::io::{self, Write};

use lj_record::ColumnMissing;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SinkError {
    /// The downstream consumer went away (broken pipe). Not a failure of the run.
    #[error("output stream closed")]
    Closed,
    #[error("error writing output: {0}")]
    Write(#[source] io::Error),
}

impl From<io::Error> for SinkError {
    fn from(error: io::Error) -> Self {
        if error.kind() == io::ErrorKind::BrokenPipe {
            Self::Closed
        } else {
            Self::Write(error)
        }
    }
}

/// Newline-terminated line writer. Each line reaches the inner writer in a
/// single `write_all`, so a stop between lines never leaves half a line.
#[derive(Debug)]
pub struct OutputSink<W: Write> {
    inner: W,
    scratch: Vec<u8>,
    lines: u64,
}

impl<W: Write> OutputSink<W> {
    pub fn new(inner: W) -> Self {
        Self {
            inner,
            scratch: Vec::new(),
            lines: 0,
        }
    }

    pub fn emit(&mut self, line: &[u8]) -> Result<(), SinkError> {
        self.scratch.clear();
        self.scratch.extend_from_slice(line);
        self.scratch.push(b'\n');
        self.inner.write_all(&self.scratch)?;
        self.lines += 1;
        Ok(())
    }

    #[must_use]
    pub fn lines_written(&self) -> u64 {
        self.lines
    }

    pub fn flush(&mut self) -> Result<(), SinkError> {
        self.inner.flush()?;
        Ok(())
    }

    pub fn into_inner(self) -> W {
        self.inner
    }
}

/// Per-line diagnostics (`<basename> line <n>: column missing`). A failed
/// diagnostic write never stops the run.
#[derive(Debug)]
pub struct DiagnosticSink<D: Write> {
    inner: D,
    count: u64,
}

impl<D: Write> DiagnosticSink<D> {
    pub fn new(inner: D) -> Self {
        Self { inner, count: 0 }
    }

    pub fn column_missing(&mut self, source_name: &str, missing: &ColumnMissing) {
        self.count += 1;
        let message = missing.diagnostic(source_name);
        if let Err(_error) = writeln!(self.inner, "{message}") {
            #[cfg(feature = "tracing")]
            tracing::warn!(error = %_error, %message, "diagnostic write failed");
        }
    }

    #[must_use]
    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn into_inner(self) -> D {
        self.inner
    }
}
