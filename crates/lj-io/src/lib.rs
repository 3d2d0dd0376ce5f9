#![forbid(unsafe_code)]

pub mod sink;
pub mod source;

pub use sink::{DiagnosticSink, OutputSink, SinkError};
pub use source::{Bounded, Line, LineReader, LineSource, SourceError};
