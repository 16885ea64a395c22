use std::io;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by the VCF/BCF codecs.
///
/// An error unwinds out of the current record operation; partial record
/// state is never observable afterwards. Header mutations that already
/// happened (e.g. an auto-inserted INFO entry) remain.
#[derive(Debug, Error)]
pub enum Error {
    /// The bytes violate the BCF/VCF grammar (bad magic, wrong version,
    /// impossible descriptor, zero-size or truncated record, descriptor
    /// that contradicts the header).
    #[error("format error{}: {msg}", at("record", .record))]
    Format { msg: String, record: Option<u64> },

    /// Malformed numeric literal or key=value pair in VCF text.
    #[error("parse error{}: {msg}", at("line", .line))]
    Parse { msg: String, line: Option<u64> },

    /// A writer was asked to emit without a header set, or a reader could
    /// not find the `##fileformat` line.
    #[error("missing header: {0}")]
    MissingHeader(String),

    /// EOF in the middle of the stream header or a record frame.
    #[error("unexpected end of input: {0}")]
    UnexpectedEndOfInput(String),

    /// The input is compressed with a format this build cannot open.
    #[error("unhandled compression format: {0}")]
    UnhandledExtension(String),

    #[error("failed to open {path}: {source}")]
    FileOpen { path: String, source: io::Error },

    #[error(transparent)]
    Io(#[from] io::Error),
}

impl Error {
    pub(crate) fn format(msg: impl Into<String>) -> Self {
        Error::Format {
            msg: msg.into(),
            record: None,
        }
    }

    pub(crate) fn format_at(msg: impl Into<String>, record: u64) -> Self {
        Error::Format {
            msg: msg.into(),
            record: Some(record),
        }
    }

    pub(crate) fn parse(msg: impl Into<String>) -> Self {
        Error::Parse {
            msg: msg.into(),
            line: None,
        }
    }

    pub(crate) fn parse_at(msg: impl Into<String>, line: u64) -> Self {
        Error::Parse {
            msg: msg.into(),
            line: Some(line),
        }
    }

    /// Attach a record number to a format error that does not carry one yet.
    pub(crate) fn with_record(self, record: u64) -> Self {
        match self {
            Error::Format { msg, record: None } => Error::Format {
                msg,
                record: Some(record),
            },
            other => other,
        }
    }

    /// Attach a line number to a parse error that does not carry one yet.
    pub(crate) fn with_line(self, line: u64) -> Self {
        match self {
            Error::Parse { msg, line: None } => Error::Parse {
                msg,
                line: Some(line),
            },
            other => other,
        }
    }
}

impl From<niffler::Error> for Error {
    fn from(e: niffler::Error) -> Self {
        match e {
            niffler::Error::IOError(io) => Error::Io(io),
            other => Error::UnhandledExtension(other.to_string()),
        }
    }
}

fn at(what: &str, pos: &Option<u64>) -> String {
    match pos {
        Some(n) => format!(" in {} {}", what, n),
        None => String::new(),
    }
}
