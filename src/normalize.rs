//! Text normalization for name matching and offline embeddings.
//!
//! - Unicode NFD decomposition with combining marks removed ("García" → "garcia")
//! - Lowercase conversion
//! - Whitespace collapsing

use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

/// Strip diacritics, keeping base letters.
pub fn fold_diacritics(s: &str) -> String {
    s.nfd().filter(|c| !is_combining_mark(*c)).collect()
}

/// Canonical form of a name fragment: folded, lowercased, single-spaced.
///
/// ```
/// use cv_harness::normalize::normalize_name;
///
/// assert_eq!(normalize_name("  Ana  GARCÍA "), "ana garcia");
/// assert_eq!(normalize_name("Muñoz"), "munoz");
/// ```
pub fn normalize_name(s: &str) -> String {
    fold_diacritics(s)
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Lowercased, folded alphanumeric tokens.
pub fn tokens(s: &str) -> Vec<String> {
    fold_diacritics(&s.to_lowercase())
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(|t| t.to_string())
        .collect()
}
