// src/matching/normalize.rs - Name canonicalization and key-term extraction
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;

use crate::models::NormalizedName;

/// Leading generic prefixes stripped from canonical names.
const GENERIC_PREFIXES: [&str; 2] = ["the ", "a "];

/// Trailing legal-entity suffixes stripped from canonical names. Longer
/// forms are listed first so "corporation" is consumed before "corp".
const LEGAL_SUFFIXES: [&str; 7] = [
    "corporation",
    "company",
    "corp",
    "inc",
    "llc",
    "ltd",
    "co",
];

pub const MIN_KEY_TERM_LENGTH: usize = 3;

const STOPWORDS: [&str; 24] = [
    "a", "an", "the", "and", "or", "of", "for", "in", "on", "at", "by", "to", "with", "from",
    "as", "group", "holdings", "enterprises", "international", "global", "national", "services",
    "solutions", "systems",
];

static STOPWORD_SET: Lazy<HashSet<&'static str>> =
    Lazy::new(|| STOPWORDS.iter().copied().collect());

static SUFFIX_SET: Lazy<HashSet<&'static str>> =
    Lazy::new(|| LEGAL_SUFFIXES.iter().copied().collect());

/// Trailing parenthetical segments ("Acme Corp (Seattle)") carry location or
/// campus noise, not identity; they are dropped before character filtering.
static TRAILING_PAREN_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s*\((.*?)\)\s*$").unwrap());

/// Canonicalize a raw name for comparison.
///
/// Pure and total: all-punctuation input yields an empty canonical rather
/// than an error. The canonical field is idempotent under re-normalization.
pub fn normalize(raw: &str) -> NormalizedName {
    let mut normalized = raw.to_lowercase();

    normalized = TRAILING_PAREN_RE.replace(&normalized, "").trim().to_string();

    normalized = normalized.replace('&', " and ");
    normalized = normalized
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect();
    normalized = normalized.split_whitespace().collect::<Vec<_>>().join(" ");

    // Prefix and suffix stripping loop until stable so that e.g.
    // "acme co ltd" reduces all the way to "acme" in one normalize call.
    loop {
        let before = normalized.len();
        for prefix in &GENERIC_PREFIXES {
            if let Some(rest) = normalized.strip_prefix(prefix) {
                normalized = rest.trim_start().to_string();
            }
        }
        for suffix in &LEGAL_SUFFIXES {
            if normalized == *suffix {
                normalized.clear();
                continue;
            }
            let with_space = format!(" {}", suffix);
            if let Some(rest) = normalized.strip_suffix(&with_space) {
                normalized = rest.trim_end().to_string();
            }
        }
        if normalized.len() == before {
            break;
        }
    }

    let key_terms = extract_key_terms(&normalized);
    let abbreviation_candidate = extract_abbreviation(&normalized);

    NormalizedName {
        raw: raw.to_string(),
        canonical: normalized,
        key_terms,
        abbreviation_candidate,
    }
}

/// Significant tokens of a canonical name, in order: stop-words, legal
/// suffixes and tokens shorter than [`MIN_KEY_TERM_LENGTH`] are removed.
pub fn extract_key_terms(canonical: &str) -> Vec<String> {
    canonical
        .split_whitespace()
        .filter(|t| {
            t.len() >= MIN_KEY_TERM_LENGTH
                && !STOPWORD_SET.contains(t)
                && !SUFFIX_SET.contains(t)
        })
        .map(|t| t.to_string())
        .collect()
}

/// Candidate acronym from the leading letters of the non-suffix tokens.
///
/// Names with fewer than two qualifying tokens are not abbreviable; a
/// single-character "acronym" is never produced.
pub fn extract_abbreviation(canonical: &str) -> Option<String> {
    let letters: Vec<char> = canonical
        .split_whitespace()
        .filter(|t| !SUFFIX_SET.contains(t))
        .filter_map(|t| t.chars().next())
        .collect();

    if letters.len() < 2 {
        return None;
    }
    Some(letters.into_iter().collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canonical_strips_suffix_and_punctuation() {
        assert_eq!(normalize("Acme Corporation").canonical, "acme");
        assert_eq!(normalize("Acme, Corp.").canonical, "acme");
        assert_eq!(normalize("The Acme Company").canonical, "acme");
        assert_eq!(normalize("Veran Medical Technologies, Inc.").canonical, "veran medical technologies");
    }

    #[test]
    fn test_ampersand_becomes_and() {
        assert_eq!(normalize("Johnson & Johnson").canonical, "johnson and johnson");
    }

    #[test]
    fn test_all_punctuation_yields_empty_canonical() {
        assert_eq!(normalize("!!! --- ...").canonical, "");
        assert_eq!(normalize("").canonical, "");
    }

    #[test]
    fn test_cascading_suffixes_strip_in_one_pass() {
        assert_eq!(normalize("Banana Co Ltd").canonical, "banana");
    }

    #[test]
    fn test_trailing_parenthetical_dropped() {
        assert_eq!(normalize("Acme Corp (Seattle)").canonical, "acme");
    }

    #[test]
    fn test_canonical_is_idempotent() {
        for raw in [
            "Acme Corporation",
            "The First National Bank, Inc.",
            "Johnson & Johnson",
            "Banana Co Ltd",
            "A Better Mousetrap LLC",
            "!!!",
        ] {
            let first = normalize(raw);
            let second = normalize(&first.canonical);
            assert_eq!(first.canonical, second.canonical, "not idempotent for {:?}", raw);
        }
    }

    #[test]
    fn test_key_terms_exclude_stopwords_and_short_tokens() {
        let n = normalize("Bank of America");
        assert_eq!(n.key_terms, vec!["bank", "america"]);

        let n = normalize("AB Food Services of Ohio");
        assert_eq!(n.key_terms, vec!["food", "ohio"]);
    }

    #[test]
    fn test_abbreviation_candidate() {
        assert_eq!(
            normalize("International Business Machines Corp").abbreviation_candidate,
            Some("ibm".to_string())
        );
        // Single significant token: non-abbreviable by design.
        assert_eq!(normalize("Apple Inc").abbreviation_candidate, None);
        assert_eq!(normalize("").abbreviation_candidate, None);
    }
}
