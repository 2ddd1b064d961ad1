//! Headline tokenization and Jaccard similarity.

use std::collections::HashSet;

const PUNCTUATION: [char; 12] = [',', '.', ':', ';', '!', '?', '(', ')', '\'', '"', '-', '_'];

/// Lowercase, strip punctuation, split on whitespace, and drop tokens of
/// two characters or fewer.
pub fn tokenize(s: &str) -> Vec<String> {
    let normalized: String = s
        .to_lowercase()
        .chars()
        .map(|c| if PUNCTUATION.contains(&c) { ' ' } else { c })
        .collect();
    normalized
        .split_whitespace()
        .filter(|t| t.chars().count() > 2)
        .map(str::to_string)
        .collect()
}

/// Jaccard similarity over the token sets of two strings. Zero when either
/// token set is empty.
pub fn similarity(a: &str, b: &str) -> f64 {
    let tokens_a: HashSet<String> = tokenize(a).into_iter().collect();
    let tokens_b: HashSet<String> = tokenize(b).into_iter().collect();
    if tokens_a.is_empty() || tokens_b.is_empty() {
        return 0.0;
    }
    let intersection = tokens_a.intersection(&tokens_b).count();
    let union = tokens_a.len() + tokens_b.len() - intersection;
    if union == 0 {
        return 0.0;
    }
    intersection as f64 / union as f64
}

/// Case-insensitive non-empty intersection of two string lists.
pub fn shares_token(a: &[String], b: &[String]) -> bool {
    if a.is_empty() || b.is_empty() {
        return false;
    }
    let set: HashSet<String> = a.iter().map(|v| v.to_uppercase()).collect();
    b.iter().any(|v| set.contains(&v.to_uppercase()))
}
