use std::{io, path::PathBuf};

use sdp_common::PortRangeError;
use thiserror::Error;

/// Engine errors.
///
/// Everything but [Conversion](Error::Conversion) is raised while loading and
/// leaves no engine behind.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum Error {
    /// The rules file was configured but couldn't be read.
    #[error("unable to read rules file {}: {source}", .path.display())]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    /// A rule line is malformed.
    #[error("line {line}: {reason} in '{content}'")]
    Parse {
        line: usize,
        content: String,
        reason: ParseErrorKind,
    },
    /// A rule names a host that doesn't resolve.
    #[error("line {line}: unable to resolve '{host}' in '{content}': {source}")]
    HostResolution {
        line: usize,
        content: String,
        host: String,
        #[source]
        source: io::Error,
    },
    /// Prefix length doesn't fit the address family.
    #[error("prefix length {prefix} is invalid, must be between 1 and {max}")]
    InvalidPrefix { prefix: u8, max: u8 },
    /// The converter failed on the socket.
    #[error("socket conversion failed: {0}")]
    Conversion(#[source] io::Error),
}

/// What was wrong with a rule line.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseErrorKind {
    #[error("expected 3 fields, found {0}")]
    FieldCount(usize),
    #[error("unknown action '{0}'")]
    Action(String),
    #[error("malformed prefix '{0}'")]
    Prefix(String),
    #[error(transparent)]
    Port(#[from] PortRangeError),
}
