#![forbid(unsafe_code)]

//! Argument handling and error reporting behind the `linejoin` binary.

use std::io::{self, Write};
use std::num::NonZeroUsize;
use std::path::PathBuf;

use lj_io::SourceError;
use lj_join::{JoinError, RunReport, join_files};
use lj_record::{ColumnIndex, Delimiter};
use lj_runtime::{CancellationToken, ConfigError, RunConfig, Strategy};
use thiserror::Error;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Debug, Error)]
pub enum CliError {
    /// Malformed command line. Reported with a pointer to `--help`.
    #[error("Error: {0}")]
    Usage(String),
    #[error("Error: Valid column values are >= 1")]
    ColumnOutOfRange,
    #[error("Error: {} does not exist", .0.display())]
    NotFound(PathBuf),
    #[error("Error: {} is a directory", .0.display())]
    IsDirectory(PathBuf),
    #[error("Error: {0}")]
    Config(#[from] ConfigError),
    #[error("Error reading {}: {}", .0.path().display(), read_cause(.0))]
    Source(SourceError),
    #[error("Error writing output: {0}")]
    Output(#[source] io::Error),
}

impl CliError {
    #[must_use]
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::Usage(_) => 2,
            _ => 1,
        }
    }

    #[must_use]
    pub fn is_usage(&self) -> bool {
        matches!(self, Self::Usage(_))
    }
}

impl From<JoinError> for CliError {
    fn from(error: JoinError) -> Self {
        match error {
            JoinError::Config(error) => Self::Config(error),
            JoinError::Source(error) => Self::Source(error),
            JoinError::Output(error) => Self::Output(error),
        }
    }
}

fn read_cause(error: &SourceError) -> String {
    match error {
        SourceError::Open { source, .. } | SourceError::Seek { source, .. } => source.to_string(),
        SourceError::Read { line, source, .. } => format!("line {line}: {source}"),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Help,
    Version,
    Join(Invocation),
}

/// A fully parsed join request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub file1: PathBuf,
    pub file2: PathBuf,
    pub config: RunConfig,
    pub stats: bool,
}

/// Parses arguments (program name already stripped) on top of `defaults`.
/// `--help` and `--version` win as soon as they are seen.
pub fn parse_args<I>(args: I, defaults: RunConfig) -> Result<Command, CliError>
where
    I: IntoIterator<Item = String>,
{
    let mut config = defaults;
    let mut column1: i64 = 1;
    let mut column2: i64 = 1;
    let mut chunks: Option<NonZeroUsize> = None;
    let mut sorted = false;
    let mut stats = false;
    let mut files: Vec<PathBuf> = Vec::new();

    let mut args = args.into_iter();
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "-c1" | "--column1" => column1 = parse_column(&arg, args.next())?,
            "-c2" | "--column2" => column2 = parse_column(&arg, args.next())?,
            "-d1" | "--delimiter1" => config.delimiter1 = parse_delimiter(&arg, args.next())?,
            "-d2" | "--delimiter2" => config.delimiter2 = parse_delimiter(&arg, args.next())?,
            "-o" | "--output-delimiter" => {
                config.output_delimiter = Some(required(&arg, args.next())?);
            }
            "-s" | "--join-separator" => {
                config.join_separator = Some(required(&arg, args.next())?);
            }
            "-f" | "--filter-mode" => config.filter_mode = true,
            "-r" | "--remove-duplicate" => config.remove_duplicate = true,
            "-m" | "--missing-mode" => config.missing_mode = true,
            "--chunks" => {
                let value = required(&arg, args.next())?;
                let parsed = value
                    .parse::<usize>()
                    .ok()
                    .and_then(NonZeroUsize::new)
                    .ok_or_else(|| {
                        CliError::Usage(format!("--chunks expects a positive integer, got '{value}'"))
                    })?;
                chunks = Some(parsed);
            }
            "--sorted" => sorted = true,
            "--stats" => stats = true,
            "-h" | "--help" => return Ok(Command::Help),
            "-v" | "--version" => return Ok(Command::Version),
            "--" => {
                files.extend(args.by_ref().map(PathBuf::from));
                break;
            }
            other if other.len() > 1 && other.starts_with('-') => {
                return Err(CliError::Usage(format!("unknown argument: {other}")));
            }
            _ => files.push(PathBuf::from(&arg)),
        }
    }

    let [file1, file2]: [PathBuf; 2] = files.try_into().map_err(|files: Vec<PathBuf>| {
        CliError::Usage(format!(
            "expected FILE1 and FILE2, got {} path argument(s)",
            files.len()
        ))
    })?;

    config.strategy = match (chunks, sorted) {
        (Some(_), true) => {
            return Err(CliError::Usage(
                "--chunks and --sorted cannot be combined".to_owned(),
            ));
        }
        (Some(chunks), false) => Strategy::Chunked { chunks },
        (None, true) => Strategy::SortedMerge,
        (None, false) => Strategy::Hash,
    };

    config.column1 = to_column(column1)?;
    config.column2 = to_column(column2)?;
    config.validate()?;

    Ok(Command::Join(Invocation {
        file1,
        file2,
        config,
        stats,
    }))
}

fn required(flag: &str, value: Option<String>) -> Result<String, CliError> {
    value.ok_or_else(|| CliError::Usage(format!("{flag} requires a value")))
}

fn parse_column(flag: &str, value: Option<String>) -> Result<i64, CliError> {
    let value = required(flag, value)?;
    value
        .parse::<i64>()
        .map_err(|_| CliError::Usage(format!("{flag} expects an integer, got '{value}'")))
}

fn to_column(value: i64) -> Result<ColumnIndex, CliError> {
    usize::try_from(value)
        .ok()
        .and_then(|value| ColumnIndex::new(value).ok())
        .ok_or(CliError::ColumnOutOfRange)
}

fn parse_delimiter(flag: &str, value: Option<String>) -> Result<Delimiter, CliError> {
    let value = required(flag, value)?;
    Delimiter::new(value).map_err(|error| CliError::Config(ConfigError::Record(error)))
}

/// File 1 first, then file 2; the first problem found is the one reported.
pub fn check_inputs(invocation: &Invocation) -> Result<(), CliError> {
    for path in [&invocation.file1, &invocation.file2] {
        if !path.exists() {
            return Err(CliError::NotFound(path.clone()));
        }
        if path.is_dir() {
            return Err(CliError::IsDirectory(path.clone()));
        }
    }
    Ok(())
}

/// Validates the inputs, then runs the join. A closed output stream is not
/// an error; it shows up as `output_closed` in the report.
pub fn execute<W, D>(
    invocation: &Invocation,
    output: W,
    diagnostics: D,
    cancel: &CancellationToken,
) -> Result<RunReport, CliError>
where
    W: Write,
    D: Write,
{
    check_inputs(invocation)?;

    tracing::debug!(
        file1 = %invocation.file1.display(),
        file2 = %invocation.file2.display(),
        strategy = invocation.config.strategy.name(),
        "starting join"
    );

    let report = join_files(
        &invocation.config,
        &invocation.file1,
        &invocation.file2,
        output,
        diagnostics,
        cancel,
    )?;
    Ok(report)
}

#[must_use]
pub fn version_text() -> String {
    format!("linejoin {VERSION}")
}

#[must_use]
pub fn help_text() -> String {
    format!(
        "linejoin {VERSION}\n\
         Join two line-oriented files on one field each.\n\
         \n\
         Usage:\n\
         \tlinejoin [OPTIONS] FILE1 FILE2\n\
         \n\
         Options:\n\
         \t-c1, --column1 <n>            Key column in file 1 (default: 1)\n\
         \t-c2, --column2 <n>            Key column in file 2 (default: 1)\n\
         \t-d1, --delimiter1 <s>         Delimiter for file 1 (default: $LINEJOIN_FS or \" \")\n\
         \t-d2, --delimiter2 <s>         Delimiter for file 2 (default: $LINEJOIN_FS or \" \")\n\
         \t-o, --output-delimiter <s>    Re-join output fields with <s> (default: keep each file's delimiter)\n\
         \t-s, --join-separator <s>      Between the file 1 and file 2 parts (default: -o, else \" \")\n\
         \t-f, --filter-mode             Only output the matching lines of file 1\n\
         \t-r, --remove-duplicate        Drop the key column from the file 2 part\n\
         \t-m, --missing-mode            Only output file 2 lines with no match in file 1\n\
         \t--chunks <n>                  Index file 1 in <n> chunks, re-reading file 2 per chunk\n\
         \t--sorted                      Merge join; both files must be sorted by key\n\
         \t--stats                       Print a JSON run report on stderr\n\
         \t-v, --version                 Show version\n\
         \t-h, --help                    Show this help\n\
         \n\
         Environment:\n\
         \tLINEJOIN_FS                   Default delimiter for both files\n\
         \tLINEJOIN_LOG                  Log filter (default: warn)"
    )
}

#[cfg(test)]
mod tests {
    use std::num::NonZeroUsize;
    use std::path::PathBuf;

    use lj_record::{ColumnIndex, Delimiter};
    use lj_runtime::{ConfigError, RunConfig, Strategy};

    use super::{CliError, Command, Invocation, parse_args};

    fn parse(args: &[&str]) -> Result<Command, CliError> {
        parse_args(args.iter().map(|arg| (*arg).to_owned()), RunConfig::default())
    }

    fn invocation(args: &[&str]) -> Invocation {
        match parse(args).expect("parse") {
            Command::Join(invocation) => invocation,
            other => panic!("expected a join, got {other:?}"),
        }
    }

    #[test]
    fn defaults_are_a_plain_hash_join_on_column_one() {
        let parsed = invocation(&["a.txt", "b.txt"]);
        assert_eq!(parsed.file1, PathBuf::from("a.txt"));
        assert_eq!(parsed.file2, PathBuf::from("b.txt"));
        assert_eq!(parsed.config, RunConfig::default());
        assert!(!parsed.stats);
    }

    #[test]
    fn short_and_long_flags_fill_the_config() {
        let parsed = invocation(&[
            "-c1", "2", "--column2", "3", "-d1", ",", "--delimiter2", "\t", "-o", ";", "-r",
            "--stats", "left", "right",
        ]);
        let expected = RunConfig::default()
            .with_columns(
                ColumnIndex::new(2).expect("column"),
                ColumnIndex::new(3).expect("column"),
            )
            .with_delimiters(
                Delimiter::new(",").expect("delimiter"),
                Delimiter::new("\t").expect("delimiter"),
            )
            .with_output_delimiter(";")
            .with_remove_duplicate(true);
        assert_eq!(parsed.config, expected);
        assert_eq!(parsed.config.join_separator(), ";");
        assert!(parsed.stats);
    }

    #[test]
    fn strategy_flags_select_the_algorithm() {
        let chunked = invocation(&["--chunks", "4", "a", "b"]);
        let four = NonZeroUsize::new(4).expect("non-zero");
        assert_eq!(chunked.config.strategy, Strategy::Chunked { chunks: four });

        let sorted = invocation(&["a", "--sorted", "b"]);
        assert_eq!(sorted.config.strategy, Strategy::SortedMerge);

        let both = parse(&["--chunks", "2", "--sorted", "a", "b"]).expect_err("exclusive");
        assert!(both.is_usage());
        let zero = parse(&["--chunks", "0", "a", "b"]).expect_err("zero chunks");
        assert!(zero.is_usage());
    }

    #[test]
    fn column_values_below_one_are_rejected_after_parsing() {
        for value in ["0", "-1"] {
            let err = parse(&["-c2", value, "a", "b"]).expect_err("column < 1");
            assert_eq!(err.to_string(), "Error: Valid column values are >= 1");
            assert_eq!(err.exit_code(), 1);
        }
        let err = parse(&["-c1", "one", "a", "b"]).expect_err("not a number");
        assert!(err.is_usage());
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn mode_conflicts_surface_as_config_errors() {
        let err = parse(&["-f", "-m", "a", "b"]).expect_err("filter + missing");
        assert!(matches!(err, CliError::Config(ConfigError::ConflictingModes)));

        let err = parse(&["--sorted", "-m", "a", "b"]).expect_err("merge + missing");
        assert!(matches!(
            err,
            CliError::Config(ConfigError::MissingModeUnsupported)
        ));

        let err = parse(&["-d1", "", "a", "b"]).expect_err("empty delimiter");
        assert!(matches!(err, CliError::Config(ConfigError::Record(_))));
    }

    #[test]
    fn help_and_version_short_circuit() {
        assert_eq!(parse(&["-h"]).expect("help"), Command::Help);
        assert_eq!(parse(&["a", "--version", "--bogus"]).expect("version"), Command::Version);
        assert!(super::version_text().starts_with("linejoin "));
    }

    #[test]
    fn wrong_arity_and_unknown_flags_are_usage_errors() {
        assert!(parse(&["only-one"]).expect_err("arity").is_usage());
        assert!(parse(&["a", "b", "c"]).expect_err("arity").is_usage());
        assert!(parse(&["--nope", "a", "b"]).expect_err("unknown").is_usage());
        assert!(parse(&["-c1"]).expect_err("missing value").is_usage());

        // After `--`, dash-prefixed names are paths.
        let parsed = invocation(&["--", "-a", "-"]);
        assert_eq!(parsed.file1, PathBuf::from("-a"));
        assert_eq!(parsed.file2, PathBuf::from("-"));
    }
}
