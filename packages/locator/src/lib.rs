//! # locfs-locator
//!
//! Locator values and the codecs that turn them into directory paths.
//!
//! A *locator vector* is the ordered tuple of typed values identifying one
//! artifact, e.g. `["InChI=1S/O", 0, 3]` for a species and its charge and
//! spin multiplicity. A [`LocatorCodec`] validates the slice of that vector
//! owned by one directory layer and maps it to:
//!
//! - a relative directory path of fixed depth (possibly lossy, e.g. hashed)
//! - a *locator record*, a small JSON document that is exactly invertible
//!
//! The record is written into the directory on creation so that walking the
//! tree later recovers the real locators instead of guessing them from
//! directory names.
//!
//! This crate does no I/O. Directory trees live in `locfs-series`.

mod codec;
mod error;
mod hash;
mod ident;
mod value;

pub use codec::{check_path, Field, FieldKind, Format, LocatorCodec, Piece, Segment, Validation};
pub use error::Error;
pub use hash::{digest_hex, hash_slice, short_hash, DIGEST_HEX_LEN};
pub use ident::{generate_identifier, identifier_pattern, is_identifier, IDENTIFIER_LEN};
pub use value::{Locator, Locators};
