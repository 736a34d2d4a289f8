// src/classify/normalize.rs
//! Pre-classification text normalization. Pure and total: any string in,
//! a lowercase letters-and-whitespace string out.

use once_cell::sync::Lazy;
use regex::Regex;

static RE_URL: Lazy<Regex> = Lazy::new(|| Regex::new(r"http\S+").expect("url regex"));

/// Lowercase, strip URL-ish substrings (`http` followed by non-whitespace),
/// then drop everything that is not a lowercase ASCII letter or whitespace.
pub fn normalize(text: &str) -> String {
    let lowered = text.to_lowercase();
    let stripped = RE_URL.replace_all(&lowered, "");
    stripped
        .chars()
        .filter(|c| c.is_ascii_lowercase() || c.is_whitespace())
        .collect()
}
