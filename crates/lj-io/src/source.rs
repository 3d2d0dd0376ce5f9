use std::fs::File;
use std::io::{self, BufRead, BufReader, Cursor, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use lj_record::trim_line_terminator;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("error reading {}: {source}", .path.display())]
    Open { path: PathBuf, source: io::Error },
    #[error("error reading {} at line {line}: {source}", .path.display())]
    Read {
        path: PathBuf,
        line: u64,
        source: io::Error,
    },
    #[error("error rewinding {}: {source}", .path.display())]
    Seek { path: PathBuf, source: io::Error },
}

impl SourceError {
    #[must_use]
    pub fn path(&self) -> &Path {
        match self {
            Self::Open { path, .. }
            | Self::Read { path, .. }
            | Self::Seek { path, .. } => path,
        }
    }
}

/// One physical line with its terminator stripped. The bytes are passed on
/// as read, whatever their encoding. `byte_len` counts the bytes consumed
/// from the source, terminator included.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Line {
    pub number: u64,
    pub text: Vec<u8>,
    pub byte_len: u64,
}

pub trait LineSource {
    /// Basename used in diagnostics.
    fn name(&self) -> &str;

    fn path(&self) -> &Path;

    fn next_line(&mut self) -> Result<Option<Line>, SourceError>;

    /// Seeks back to the first byte and restarts line numbering.
    fn rewind(&mut self) -> Result<(), SourceError>;

    /// Total size of the source in bytes. The read position is preserved.
    fn byte_len(&mut self) -> Result<u64, SourceError>;

    /// Lines from the current position until at least `budget` bytes have
    /// been consumed. The line that crosses the budget is still returned.
    fn bounded(&mut self, budget: u64) -> Bounded<'_, Self>
    where
        Self: Sized,
    {
        Bounded {
            source: self,
            budget,
            consumed: 0,
        }
    }
}

/// Forward-only, byte-bounded view over a source; see [`LineSource::bounded`].
#[derive(Debug)]
pub struct Bounded<'a, S> {
    source: &'a mut S,
    budget: u64,
    consumed: u64,
}

impl<S: LineSource> Bounded<'_, S> {
    pub fn next_line(&mut self) -> Result<Option<Line>, SourceError> {
        if self.consumed >= self.budget {
            return Ok(None);
        }
        let line = self.source.next_line()?;
        if let Some(line) = &line {
            self.consumed = self.consumed.saturating_add(line.byte_len);
        }
        Ok(line)
    }

    #[must_use]
    pub fn consumed(&self) -> u64 {
        self.consumed
    }
}

#[derive(Debug)]
pub struct LineReader<R> {
    inner: R,
    path: PathBuf,
    name: String,
    line_number: u64,
}

impl LineReader<BufReader<File>> {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, SourceError> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|source| SourceError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self::new(path, BufReader::new(file)))
    }
}

impl LineReader<Cursor<Vec<u8>>> {
    /// In-memory source; `name` doubles as the path in error messages.
    #[must_use]
    pub fn from_bytes(name: &str, bytes: impl Into<Vec<u8>>) -> Self {
        Self::new(name, Cursor::new(bytes.into()))
    }
}

impl<R: BufRead + Seek> LineReader<R> {
    pub fn new(path: impl Into<PathBuf>, inner: R) -> Self {
        let path = path.into();
        let name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Self {
            inner,
            path,
            name,
            line_number: 0,
        }
    }

    fn seek_error(&self, source: io::Error) -> SourceError {
        SourceError::Seek {
            path: self.path.clone(),
            source,
        }
    }
}

impl<R: BufRead + Seek> LineSource for LineReader<R> {
    fn name(&self) -> &str {
        &self.name
    }

    fn path(&self) -> &Path {
        &self.path
    }

    fn next_line(&mut self) -> Result<Option<Line>, SourceError> {
        let mut buf = Vec::new();
        let read = self
            .inner
            .read_until(b'\n', &mut buf)
            .map_err(|source| SourceError::Read {
                path: self.path.clone(),
                line: self.line_number + 1,
                source,
            })?;
        if read == 0 {
            return Ok(None);
        }
        self.line_number += 1;

        let kept = trim_line_terminator(&buf).len();
        buf.truncate(kept);

        Ok(Some(Line {
            number: self.line_number,
            text: buf,
            byte_len: read as u64,
        }))
    }

    fn rewind(&mut self) -> Result<(), SourceError> {
        self.inner
            .seek(SeekFrom::Start(0))
            .map_err(|source| self.seek_error(source))?;
        self.line_number = 0;
        Ok(())
    }

    fn byte_len(&mut self) -> Result<u64, SourceError> {
        let position = self
            .inner
            .stream_position()
            .map_err(|source| self.seek_error(source))?;
        let end = self
            .inner
            .seek(SeekFrom::End(0))
            .map_err(|source| self.seek_error(source))?;
        self.inner
            .seek(SeekFrom::Start(position))
            .map_err(|source| self.seek_error(source))?;
        Ok(end)
    }
}
