//! # locfs-series
//!
//! Directory layers addressed by locator vectors, and the files kept in
//! them.
//!
//! - [`DataSeries`] - one layer of a tree: maps locators to a directory,
//!   creates it (ancestors first), removes it, and enumerates what exists
//! - [`DataFile`] - a named file with a [`FileCodec`] for its content
//! - [`SeriesFile`] - a `DataFile` bound to a layer, addressed by locators
//! - [`FileSet`] - a layer's files by logical name
//!
//! There is no in-process locking. Two processes touching the same
//! directory tree coordinate only through the filesystem; plain file
//! writes are whole-file and last-write-wins.

mod codec;
mod data_file;
mod error;
mod file_set;
mod series;

pub use codec::{
    CodecError, FileCodec, FnCodec, JsonCodec, LocatorRecordCodec, ScalarCodec, TextCodec,
};
pub use data_file::{DataFile, SeriesFile};
pub use error::Error;
pub use file_set::FileSet;
pub use series::DataSeries;

/// Name of the per-root JSON document.
pub const DEFAULT_DOCUMENT_NAME: &str = "db.json";

/// Name of the locator record written into each layer directory.
pub const DEFAULT_RECORD_NAME: &str = "dir.json";
