//! Random string identifiers for open-ended locators (conformers, samples).

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use lazy_static::lazy_static;
use regex::Regex;

/// Characters after the prefix.
pub const IDENTIFIER_LEN: usize = 11;

lazy_static! {
    static ref IDENTIFIER_BODY: Regex = Regex::new(r"^[A-Za-z0-9_-]{11}$").unwrap();
}

/// A fresh identifier: `prefix` followed by 11 URL-safe characters.
pub fn generate_identifier(prefix: char) -> String {
    let encoded = URL_SAFE_NO_PAD.encode(uuid::Uuid::new_v4().as_bytes());
    let mut id = String::with_capacity(IDENTIFIER_LEN + 1);
    id.push(prefix);
    id.push_str(&encoded[..IDENTIFIER_LEN]);
    id
}

/// Whether `s` looks like something `generate_identifier(prefix)` made.
pub fn is_identifier(prefix: char, s: &str) -> bool {
    let mut chars = s.chars();
    chars.next() == Some(prefix) && IDENTIFIER_BODY.is_match(chars.as_str())
}

/// Pattern matching identifiers with the given prefix.
pub fn identifier_pattern(prefix: char) -> Regex {
    let escaped = regex::escape(&prefix.to_string());
    Regex::new(&format!(r"^{}[A-Za-z0-9_-]{{{}}}$", escaped, IDENTIFIER_LEN))
        .expect("identifier pattern is statically valid")
}
