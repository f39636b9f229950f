//! Content hashes for lossy directory names.

use crate::{Error, Locator};

/// Length of a full hex digest.
pub const DIGEST_HEX_LEN: usize = 64;

/// Hex BLAKE3 digest of a locator.
///
/// Strings hash their raw text, everything else hashes its canonical JSON
/// rendering. With `fold_case`, the text is lower-cased first so that
/// `B3LYP` and `b3lyp` land in the same directory.
pub fn digest_hex(locator: &Locator, fold_case: bool) -> Result<String, Error> {
    let text = match locator {
        Locator::String(s) => s.clone(),
        other => other.canonical()?,
    };
    let text = if fold_case {
        text.to_lowercase()
    } else {
        text
    };
    Ok(blake3::hash(text.as_bytes()).to_hex().to_string())
}

/// The first `len` hex characters of the digest.
pub fn short_hash(locator: &Locator, len: usize, fold_case: bool) -> Result<String, Error> {
    hash_slice(locator, 0, len, fold_case)
}

/// Hex characters `start..start + len` of the digest.
///
/// Two slices of one digest give a two-level fan-out: a short first
/// directory, then a longer leaf directory beneath it.
pub fn hash_slice(
    locator: &Locator,
    start: usize,
    len: usize,
    fold_case: bool,
) -> Result<String, Error> {
    let end = start + len;
    if len == 0 || end > DIGEST_HEX_LEN {
        return Err(Error::PathInvariantViolation {
            path: Default::default(),
            message: format!(
                "hash slice {}..{} is outside the {}-character digest",
                start, end, DIGEST_HEX_LEN
            ),
        });
    }
    let digest = digest_hex(locator, fold_case)?;
    Ok(digest[start..end].to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_hash_is_stable_prefix() {
        let method = Locator::from("b3lyp");
        let full = digest_hex(&method, false).unwrap();
        assert_eq!(full.len(), DIGEST_HEX_LEN);
        assert_eq!(short_hash(&method, 8, false).unwrap(), full[..8]);
    }

    #[test]
    fn fold_case_merges_spellings() {
        let a = short_hash(&Locator::from("B3LYP"), 8, true).unwrap();
        let b = short_hash(&Locator::from("b3lyp"), 8, true).unwrap();
        let c = short_hash(&Locator::from("B3LYP"), 8, false).unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn slices_partition_the_digest() {
        let key = Locator::from("InChI=1S/C2H6/c1-2/h1-2H3");
        let full = digest_hex(&key, false).unwrap();
        let first = hash_slice(&key, 0, 4, false).unwrap();
        let second = hash_slice(&key, 4, 16, false).unwrap();
        assert_eq!(format!("{}{}", first, second), full[..20]);
    }

    #[test]
    fn slice_past_end_fails() {
        let key = Locator::from("x");
        assert!(matches!(
            hash_slice(&key, 60, 8, false),
            Err(Error::PathInvariantViolation { .. })
        ));
    }
}
