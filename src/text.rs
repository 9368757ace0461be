//! Small text helpers for the keyword heuristics.

use rand::RngExt;

/// Whether lowercased `text` mentions `keyword`.
///
/// ASCII keywords must match a whole word ("hi" does not match "this").
/// Other keywords are Korean stems and match anywhere ("슬프" matches "슬프다").
pub fn mentions(text: &str, keyword: &str) -> bool {
    if keyword.is_ascii() && keyword.chars().all(|c| c.is_ascii_alphanumeric()) {
        text.split(|c: char| !c.is_alphanumeric())
            .any(|word| word == keyword)
    } else {
        text.contains(keyword)
    }
}

/// Whether lowercased `text` mentions any of `keywords`.
pub fn mentions_any(text: &str, keywords: &[&str]) -> bool {
    keywords.iter().any(|k| mentions(text, k))
}

/// Number of `keywords` mentioned in lowercased `text`.
pub fn count_mentions(text: &str, keywords: &[&str]) -> usize {
    keywords.iter().filter(|k| mentions(text, k)).count()
}

/// Pick one phrase at random; empty slices yield "".
pub fn pick<'a>(phrases: &[&'a str]) -> &'a str {
    if phrases.is_empty() {
        return "";
    }
    let idx = rand::rng().random_range(0..phrases.len());
    phrases[idx]
}
