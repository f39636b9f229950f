//! Error types for directory layers and data files.

use std::io;
use std::path::PathBuf;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Locator(#[from] locfs_locator::Error),

    #[error("{path:?} is not removable")]
    NotRemovable { path: PathBuf },

    #[error("file {path:?} does not exist")]
    MissingFile { path: PathBuf },

    #[error("directory {path:?} does not exist")]
    MissingDirectory { path: PathBuf },

    #[error("layer at {prefix:?} has no locator record file, cannot enumerate")]
    NoLocatorRecord { prefix: PathBuf },

    #[error("failed to encode {path:?}: {message}")]
    Encode { path: PathBuf, message: String },

    #[error("failed to decode {path:?}: {message}")]
    Decode { path: PathBuf, message: String },

    #[error("no file bound as '{name}' with the requested type")]
    UnknownBinding { name: String },

    #[error("I/O error on {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl Error {
    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Error::Io {
            path: path.into(),
            source,
        }
    }

    /// True if a file was read but its content could not be decoded.
    /// Failures to read the file at all are not bad records.
    pub fn is_bad_record(&self) -> bool {
        matches!(self, Error::Decode { .. })
    }

    /// True if the caller passed locators of the wrong shape or type.
    pub fn is_invalid_locator(&self) -> bool {
        matches!(self, Error::Locator(e) if e.is_invalid_locator())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn locator_errors_pass_through() {
        let e = Error::from(locfs_locator::Error::ArityMismatch {
            expected: 1,
            actual: 0,
        });
        assert!(e.is_invalid_locator());
        assert_eq!(format!("{}", e), "expected 1 locators, got 0");
    }

    #[test]
    fn io_display_names_path() {
        let e = Error::io(
            "/tmp/x/dir.json",
            io::Error::new(io::ErrorKind::PermissionDenied, "denied"),
        );
        assert!(!e.is_invalid_locator());
        assert!(format!("{}", e).contains("dir.json"));
    }
}
