//! # locfs
//!
//! Locator-addressed directory storage.
//!
//! Computed artifacts are filed under a tree of directories chosen by the
//! typed key tuple ("locator vector") that identifies them. Each level of
//! the tree is a [`DataSeries`] whose [`LocatorCodec`] turns its share of
//! the locators into a fixed number of directory names, and writes a small
//! locator record so the tree can later be enumerated back into locators.
//! Large payloads go into [`DataFile`]s in those directories; small values
//! go into a JSON document per root directory via [`JsonObject`].
//!
//! ```rust
//! use std::sync::Arc;
//! use locfs::{locators, DataFile, DataSeries, Field, Format, LocatorCodec, Segment};
//!
//! let tmp = tempfile::tempdir().unwrap();
//! let species = Arc::new(DataSeries::new(
//!     tmp.path(),
//!     LocatorCodec::new(vec![Field::text("smiles")], vec![Segment::of(0, Format::ShortHash { len: 8, fold_case: false })]),
//! ));
//! let energy = DataFile::<f64>::scalar("ene").bind(&species);
//!
//! let locs = locators!["O"];
//! species.create(&locs).unwrap();
//! energy.write(&-75.0061, &locs).unwrap();
//! assert_eq!(energy.read(&locs).unwrap(), -75.0061);
//! assert_eq!(species.existing(&[], false).unwrap(), vec![locs]);
//! ```
//!
//! Nothing here locks in-process. Separate processes sharing a tree
//! coordinate through the filesystem only: directory creation is
//! idempotent, data file writes replace whole files, and JSON documents are
//! guarded by an advisory marker file.

mod layer;

pub use layer::Layer;

pub use locfs_json_store::{
    EntryCodec, JsonDocument, JsonEntry, JsonObject, LockPolicy, SerdeEntry, Sleeper, TextEntry,
    ThreadSleeper,
};
pub use locfs_locator::{
    generate_identifier, is_identifier, locators, Field, FieldKind, Format, Locator,
    LocatorCodec, Locators, Segment, Validation,
};
pub use locfs_series::{
    CodecError, DataFile, DataSeries, FileCodec, FileSet, FnCodec, JsonCodec, ScalarCodec,
    SeriesFile, TextCodec, DEFAULT_DOCUMENT_NAME, DEFAULT_RECORD_NAME,
};

/// The error type for every operation, from locator validation up to the
/// JSON store.
pub use locfs_json_store::Error;

/// Crate-level modules for callers that want the full API of one layer.
pub mod locator {
    pub use locfs_locator::*;
}

pub mod series {
    pub use locfs_series::*;
}

pub mod json_store {
    pub use locfs_json_store::*;
}
