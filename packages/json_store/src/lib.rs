//! # locfs-json-store
//!
//! Small per-artifact values (energies, statuses, short strings) kept in
//! one JSON document per root directory instead of one file each.
//!
//! - [`JsonDocument`] - a document on disk and the marker-file protocol
//!   that serializes writers across processes
//! - [`JsonObject`] - a named field under a key path, with its [`EntryCodec`]
//! - [`JsonEntry`] - a `JsonObject` bound to a layer, addressed by locators
//!
//! A missing document or key reads as `None`. A document that fails to
//! parse is restored from its backup when there is one
//! ([`Error::DocumentRestored`]) and reported as corrupt when there is not
//! ([`Error::DocumentCorrupt`]).

mod document;
mod entry;
mod error;
mod object;
mod tree;

pub use document::{backup_path, marker_path, JsonDocument, LockPolicy, Sleeper, ThreadSleeper};
pub use entry::JsonEntry;
pub use error::Error;
pub use object::{EntryCodec, JsonObject, SerdeEntry, TextEntry};
