//! # Error Taxonomy
//!
//! Every fallible operation in this crate returns [`Result`] with a typed
//! [`Error`]. The four variants map to the four failure classes the codec
//! distinguishes:
//!
//! - [`Error::Io`] - the operating system refused an open/read/write/seek.
//!   Never retried internally.
//! - [`Error::Corrupt`] - an on-disk structure failed validation before the
//!   codec trusted a size or count derived from it. Carries the byte offset
//!   where validation failed.
//! - [`Error::Schema`] - a field-table violation: zero record length, header
//!   too large, unknown field, bad permutation.
//! - [`Error::Usage`] - the caller misused the API: shape type mismatch on
//!   write, cached read without release, out-of-range record index.
//!
//! Partial failures do not roll back on-disk state; a schema rewrite that
//! aborts mid-scan leaves the file as the scan left it. The format has no
//! transaction log and this crate does not add one.

use std::fmt;
use std::io;

pub type Result<T> = std::result::Result<T, Error>;

/// Failure classes surfaced by the geometry and attribute engines.
#[derive(Debug)]
pub enum Error {
    /// An I/O call failed at the OS boundary.
    Io {
        context: &'static str,
        source: io::Error,
    },
    /// An on-disk structure failed validation.
    Corrupt { offset: u64, detail: String },
    /// A field-table constraint was violated.
    Schema(String),
    /// The API was called in a way its contract forbids.
    Usage(String),
}

impl Error {
    pub(crate) fn io(context: &'static str, source: io::Error) -> Self {
        Error::Io { context, source }
    }

    pub(crate) fn corrupt(offset: u64, detail: impl Into<String>) -> Self {
        Error::Corrupt {
            offset,
            detail: detail.into(),
        }
    }

    pub(crate) fn schema(detail: impl Into<String>) -> Self {
        Error::Schema(detail.into())
    }

    pub(crate) fn usage(detail: impl Into<String>) -> Self {
        Error::Usage(detail.into())
    }

    /// True when the error came from the OS rather than file content.
    pub fn is_io(&self) -> bool {
        matches!(self, Error::Io { .. })
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Io { context, source } => write!(f, "{context}: {source}"),
            Error::Corrupt { offset, detail } => {
                write!(f, "corrupt file at byte {offset}: {detail}")
            }
            Error::Schema(detail) => write!(f, "schema error: {detail}"),
            Error::Usage(detail) => write!(f, "usage error: {detail}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl From<io::Error> for Error {
    fn from(source: io::Error) -> Self {
        Error::Io {
            context: "i/o error",
            source,
        }
    }
}
