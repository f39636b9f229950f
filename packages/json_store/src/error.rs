//! Error types for the JSON store.

use std::io;
use std::path::PathBuf;
use std::time::Duration;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Series(#[from] locfs_series::Error),

    /// The document could not be read or written and was put back from its
    /// backup. The operation failed but the document is usable; retrying is
    /// reasonable.
    #[error("document {path:?} failed and was restored from backup: {message}")]
    DocumentRestored { path: PathBuf, message: String },

    /// The document could not be read or written and there was no backup.
    #[error("document {path:?} is corrupt and has no backup: {message}")]
    DocumentCorrupt { path: PathBuf, message: String },

    #[error("document {path:?} has a non-object value at '{key}'")]
    NotAnObject { path: PathBuf, key: String },

    #[error("failed to encode entry in {path:?}: {message}")]
    Encode { path: PathBuf, message: String },

    #[error("failed to decode entry in {path:?}: {message}")]
    Decode { path: PathBuf, message: String },

    #[error("gave up waiting for {marker:?} after {waited:?}")]
    LockTimeout { marker: PathBuf, waited: Duration },

    #[error("I/O error on {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl From<locfs_locator::Error> for Error {
    fn from(e: locfs_locator::Error) -> Self {
        Error::Series(e.into())
    }
}

impl Error {
    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Error::Io {
            path: path.into(),
            source,
        }
    }

    /// Failures after which the document is known to be intact.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Error::DocumentRestored { .. } | Error::LockTimeout { .. }
        )
    }

    pub fn is_invalid_locator(&self) -> bool {
        matches!(self, Error::Series(e) if e.is_invalid_locator())
    }
}
