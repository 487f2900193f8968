//! Crate-wide error type.
//!
//! Replaces the original C library's process-wide last-error string with an
//! ordinary `Result`-carrying error enum. Every variant still renders with a
//! source-location suffix, so the on-the-wire message format callers used to
//! scrape out of `big_file_get_error_message()` is preserved even though the
//! channel is now a return value instead of global state.

use std::fmt;
use std::path::PathBuf;

pub type Result<T> = std::result::Result<T, BigFileError>;

#[derive(Debug, thiserror::Error)]
pub enum BigFileError {
    #[error("block not found at {path} ({loc})")]
    BlockNotFound { path: PathBuf, loc: Location },

    #[error("malformed header in {path}: {reason} ({loc})")]
    HeaderMalformed {
        path: PathBuf,
        reason: String,
        loc: Location,
    },

    #[error("seek past end of block: offset {offset} > size {size} ({loc})")]
    Eof {
        offset: i64,
        size: u64,
        loc: Location,
    },

    #[error("attribute {name:?} not found ({loc})")]
    AttrMissing { name: String, loc: Location },

    #[error("attr {name:?} nmemb mismatch: stored {stored}, requested {requested} ({loc})")]
    AttrNmembMismatch {
        name: String,
        stored: usize,
        requested: usize,
        loc: Location,
    },

    #[error("unsupported dtype string {dtype:?} ({loc})")]
    UnsupportedDtype { dtype: String, loc: Location },

    #[error("I/O error on {path}: {source} ({loc})")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
        loc: Location,
    },

    #[error("failed to create directory {path}: {source} ({loc})")]
    Mkdir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
        loc: Location,
    },

    /// A collective operation failed at the root peer. The `Group` trait
    /// only transports bytes between peers, so the root's original typed
    /// error is flattened to its message before being rebroadcast — every
    /// peer still observes the same failure, just not the same enum shape.
    #[error("collective operation failed at root: {message} ({loc})")]
    Collective { message: String, loc: Location },
}

/// `file:line` of the call site that raised the error, mirroring the
/// `(%s:%d)` suffix the original library appended to its error string.
#[derive(Debug, Clone, Copy)]
pub struct Location {
    pub file: &'static str,
    pub line: u32,
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.file, self.line)
    }
}

#[macro_export]
macro_rules! here {
    () => {
        $crate::error::Location {
            file: file!(),
            line: line!(),
        }
    };
}

impl BigFileError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error, loc: Location) -> Self {
        BigFileError::Io {
            path: path.into(),
            source,
            loc,
        }
    }
}
