// src/matching/phonetic.rs - Phonetic codes and keyboard-distance typo detection
use once_cell::sync::Lazy;
use rphonetic::{Encoder, Metaphone, Soundex};
use std::collections::HashMap;

/// Grid distance charged for characters that are not on the keyboard map.
const NON_KEY_PENALTY: u32 = 3;

/// Per-character distance normalizer for [`detect_keyboard_typos`]: one
/// adjacent-key substitution per three characters still scores near zero.
const KEYBOARD_DISTANCE_SCALE: f64 = 3.0;

const PHONETIC_MATCH_BOTH: f64 = 0.9;
const PHONETIC_MATCH_SINGLE: f64 = 0.7;

const PHONETIC_DETECTION_THRESHOLD: f64 = 0.7;
const KEYBOARD_DETECTION_THRESHOLD: f64 = 0.85;
const PATTERN_DETECTION_CONFIDENCE: f64 = 0.95;

/// Frequent misspellings corrected before any other signal is computed.
/// Keys double as the rule names reported in `TypoCorrection::corrections`.
const COMMON_TYPOS: [(&str, &str); 12] = [
    ("compnay", "company"),
    ("comapny", "company"),
    ("coporation", "corporation"),
    ("corparation", "corporation"),
    ("serivces", "services"),
    ("servies", "services"),
    ("technolgies", "technologies"),
    ("techonology", "technology"),
    ("univeristy", "university"),
    ("medcial", "medical"),
    ("finacial", "financial"),
    ("assocaition", "association"),
];

static TYPO_DICTIONARY: Lazy<HashMap<&'static str, &'static str>> =
    Lazy::new(|| COMMON_TYPOS.iter().copied().collect());

/// Physical key coordinates on a standard QWERTY layout, (column, row).
static KEY_POSITIONS: Lazy<HashMap<char, (i32, i32)>> = Lazy::new(|| {
    let rows = ["1234567890", "qwertyuiop", "asdfghjkl", "zxcvbnm"];
    let mut map = HashMap::new();
    for (y, row) in rows.iter().enumerate() {
        for (x, c) in row.chars().enumerate() {
            map.insert(c, (x as i32, y as i32));
        }
    }
    map
});

#[derive(Debug, Clone, PartialEq)]
pub struct TypoCorrection {
    pub corrected: String,
    /// Names of the dictionary rules that fired, in token order.
    pub corrections: Vec<&'static str>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetectionMethod {
    Pattern,
    Phonetic,
    Keyboard,
    None,
}

#[derive(Debug, Clone)]
pub struct TypoDetection {
    pub detection_method: DetectionMethod,
    pub matched_name: Option<String>,
    pub confidence: f64,
}

impl TypoDetection {
    fn none() -> Self {
        Self {
            detection_method: DetectionMethod::None,
            matched_name: None,
            confidence: 0.0,
        }
    }
}

fn letters_only(s: &str) -> String {
    s.chars()
        .filter(|c| c.is_ascii_alphabetic())
        .collect::<String>()
        .to_lowercase()
}

/// American Soundex code ("Robert" -> "R163"). Empty for non-letter input.
pub fn soundex(s: &str) -> String {
    let cleaned = letters_only(s);
    if cleaned.is_empty() {
        return String::new();
    }
    Soundex::default().encode(&cleaned)
}

/// Metaphone code. Empty for non-letter input.
pub fn metaphone(s: &str) -> String {
    let cleaned = letters_only(s);
    if cleaned.is_empty() {
        return String::new();
    }
    Metaphone::default().encode(&cleaned)
}

/// Total physical key distance between two strings on a QWERTY grid.
///
/// Characters are compared position by position (Chebyshev distance between
/// key coordinates); length differences and off-keyboard characters are
/// charged [`NON_KEY_PENALTY`] each.
pub fn keyboard_distance(a: &str, b: &str) -> u32 {
    let a_chars: Vec<char> = a.to_lowercase().chars().collect();
    let b_chars: Vec<char> = b.to_lowercase().chars().collect();
    let common = a_chars.len().min(b_chars.len());

    let mut total = 0u32;
    for i in 0..common {
        let (ca, cb) = (a_chars[i], b_chars[i]);
        if ca == cb {
            continue;
        }
        total += match (KEY_POSITIONS.get(&ca), KEY_POSITIONS.get(&cb)) {
            (Some(&(xa, ya)), Some(&(xb, yb))) => {
                (xa - xb).abs().max((ya - yb).abs()) as u32
            }
            _ => NON_KEY_PENALTY,
        };
    }
    total + (a_chars.len().abs_diff(b_chars.len()) as u32) * NON_KEY_PENALTY
}

/// Likelihood that `b` is a keyboard slip of `a`: 1.0 for identical
/// strings, 0.0 when lengths differ, otherwise decreasing in the total key
/// distance per character.
pub fn detect_keyboard_typos(a: &str, b: &str) -> f64 {
    let a_lower = a.to_lowercase();
    let b_lower = b.to_lowercase();
    if a_lower == b_lower {
        return 1.0;
    }
    if a_lower.chars().count() != b_lower.chars().count() {
        return 0.0;
    }
    let len = a_lower.chars().count();
    if len == 0 {
        return 1.0;
    }
    let avg_distance = keyboard_distance(&a_lower, &b_lower) as f64 / len as f64;
    (1.0 - avg_distance / KEYBOARD_DISTANCE_SCALE).max(0.0)
}

/// Phonetic agreement score: 0.0 unless the Soundex or Metaphone codes
/// agree, a higher score when both do.
pub fn phonetic_similarity(a: &str, b: &str) -> f64 {
    let (sa, sb) = (soundex(a), soundex(b));
    let (ma, mb) = (metaphone(a), metaphone(b));

    let soundex_match = !sa.is_empty() && sa == sb;
    let metaphone_match = !ma.is_empty() && ma == mb;

    match (soundex_match, metaphone_match) {
        (true, true) => PHONETIC_MATCH_BOTH,
        (true, false) | (false, true) => PHONETIC_MATCH_SINGLE,
        (false, false) => 0.0,
    }
}

/// Apply the fixed misspelling dictionary token by token.
pub fn correct_common_typos(s: &str) -> TypoCorrection {
    let mut corrections = Vec::new();
    let corrected: Vec<String> = s
        .split_whitespace()
        .map(|token| {
            let lower = token.to_lowercase();
            match TYPO_DICTIONARY.get_key_value(lower.as_str()) {
                Some((rule, fixed)) => {
                    corrections.push(*rule);
                    (*fixed).to_string()
                }
                None => lower,
            }
        })
        .collect();

    TypoCorrection {
        corrected: corrected.join(" "),
        corrections,
    }
}

/// Decide whether `candidate` is a recognizable slip of one of
/// `known_names`, trying detection methods from cheapest to broadest:
/// dictionary patterns, then phonetic codes, then keyboard distance. The
/// first method that clears its own threshold wins.
pub fn detect_typo(candidate: &str, known_names: &[String]) -> TypoDetection {
    let correction = correct_common_typos(candidate);
    if !correction.corrections.is_empty() {
        for known in known_names {
            if correction.corrected.eq_ignore_ascii_case(known) {
                return TypoDetection {
                    detection_method: DetectionMethod::Pattern,
                    matched_name: Some(known.clone()),
                    confidence: PATTERN_DETECTION_CONFIDENCE,
                };
            }
        }
    }

    let mut best_phonetic: Option<(&String, f64)> = None;
    for known in known_names {
        let score = phonetic_similarity(candidate, known);
        if score >= PHONETIC_DETECTION_THRESHOLD
            && best_phonetic.map_or(true, |(_, best)| score > best)
        {
            best_phonetic = Some((known, score));
        }
    }
    if let Some((name, score)) = best_phonetic {
        return TypoDetection {
            detection_method: DetectionMethod::Phonetic,
            matched_name: Some(name.clone()),
            confidence: score,
        };
    }

    let mut best_keyboard: Option<(&String, f64)> = None;
    for known in known_names {
        let score = detect_keyboard_typos(candidate, known);
        if score >= KEYBOARD_DETECTION_THRESHOLD
            && best_keyboard.map_or(true, |(_, best)| score > best)
        {
            best_keyboard = Some((known, score));
        }
    }
    if let Some((name, score)) = best_keyboard {
        return TypoDetection {
            detection_method: DetectionMethod::Keyboard,
            matched_name: Some(name.clone()),
            confidence: score,
        };
    }

    TypoDetection::none()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_soundex_codes_agree_for_sound_alikes() {
        assert_eq!(soundex("Robert"), "R163");
        assert_eq!(soundex("Rupert"), "R163");
        assert_eq!(soundex("Smith"), soundex("Smythe"));
        assert_eq!(soundex(""), "");
        assert_eq!(soundex("123"), "");
    }

    #[test]
    fn test_keyboard_distance_adjacent_keys() {
        // q and w are neighbours, one grid step apart.
        assert_eq!(keyboard_distance("qat", "wat"), 1);
        assert_eq!(keyboard_distance("same", "same"), 0);
        // Length difference charged per extra character.
        assert_eq!(keyboard_distance("ab", "abc"), NON_KEY_PENALTY);
    }

    #[test]
    fn test_detect_keyboard_typos_bounds() {
        assert_eq!(detect_keyboard_typos("acme", "acme"), 1.0);
        assert_eq!(detect_keyboard_typos("acme", "acmes"), 0.0);
        let slip = detect_keyboard_typos("microsoft", "micrisoft"); // o -> i slip
        assert!(slip > 0.9, "adjacent-key slip scored {}", slip);
        let unrelated = detect_keyboard_typos("abcdefg", "zpqmxyw");
        assert!(unrelated < 0.5);
    }

    #[test]
    fn test_phonetic_similarity_gate() {
        assert!(phonetic_similarity("Smith", "Smythe") > 0.0);
        assert_eq!(phonetic_similarity("Microsoft", "Acme"), 0.0);
    }

    #[test]
    fn test_correct_common_typos_reports_rules() {
        let result = correct_common_typos("Acme Compnay Serivces");
        assert_eq!(result.corrected, "acme company services");
        assert_eq!(result.corrections, vec!["compnay", "serivces"]);

        let clean = correct_common_typos("acme company");
        assert!(clean.corrections.is_empty());
    }

    #[test]
    fn test_detect_typo_prefers_pattern_then_phonetic_then_keyboard() {
        let known = vec!["acme company".to_string(), "microsoft".to_string()];

        let pattern = detect_typo("acme compnay", &known);
        assert_eq!(pattern.detection_method, DetectionMethod::Pattern);
        assert_eq!(pattern.matched_name.as_deref(), Some("acme company"));

        let keyboard = detect_typo("micrisoft", &known);
        assert!(matches!(
            keyboard.detection_method,
            DetectionMethod::Phonetic | DetectionMethod::Keyboard
        ));

        let none = detect_typo("zzzzzz", &known);
        assert_eq!(none.detection_method, DetectionMethod::None);
        assert_eq!(none.confidence, 0.0);
    }
}
