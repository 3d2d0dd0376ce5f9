#![forbid(unsafe_code)]

//! Line-oriented equi-join of two text files.
//!
//! ```no_run
//! use linejoin::{CancellationToken, Delimiter, RunConfig, join_files};
//!
//! let colon = Delimiter::new(":")?;
//! let config = RunConfig::default().with_delimiters(colon.clone(), colon);
//! let stdout = std::io::stdout();
//! let report = join_files(
//!     &config,
//!     "users.txt",
//!     "orders.txt",
//!     stdout.lock(),
//!     std::io::stderr(),
//!     &CancellationToken::new(),
//! )?;
//! eprintln!("{} lines joined", report.emitted);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub use lj_io::{Bounded, Line, LineReader, LineSource, SinkError, SourceError};
pub use lj_join::{
    ChunkedHashJoin, HashJoin, JoinError, JoinIndex, JoinStrategy, OutputFormatter, RunReport,
    SortedMergeJoin, join_files, join_sources,
};
pub use lj_record::{
    ColumnIndex, ColumnMissing, Delimiter, KeyedRecord, Record, RecordError,
};
pub use lj_runtime::{
    CancellationToken, ConfigError, FIELD_SEPARATOR_ENV, RunConfig, Strategy, default_delimiter,
};

#[cfg(test)]
mod tests {
    use std::fs;
    use std::num::NonZeroUsize;

    use tempfile::tempdir;

    use super::{CancellationToken, RunConfig, Strategy, join_files};

    #[test]
    fn facade_runs_a_chunked_join_end_to_end() {
        let dir = tempdir().expect("tempdir");
        let left = dir.path().join("left");
        let right = dir.path().join("right");
        fs::write(&left, "k 1\nk 2\nq 3\n").expect("write");
        fs::write(&right, "k a\nz b\n").expect("write");

        let chunks = NonZeroUsize::new(2).expect("non-zero");
        let config = RunConfig::default().with_strategy(Strategy::Chunked { chunks });
        let mut out = Vec::new();
        let report = join_files(
            &config,
            &left,
            &right,
            &mut out,
            std::io::sink(),
            &CancellationToken::new(),
        )
        .expect("join");

        assert_eq!(String::from_utf8(out).expect("utf8"), "k 1 k a\nk 2 k a\n");
        assert_eq!(report.file2_passes, 2);
    }
}
