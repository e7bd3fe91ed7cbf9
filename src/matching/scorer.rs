// src/matching/scorer.rs - Per-candidate signal computation
use crate::matching::confidence::{aggregate, context_match, QueryContext, WeightTable};
use crate::matching::phonetic::detect_typo;
use crate::matching::similarity::{character_similarity, is_potential_abbreviation, token_overlap};
use crate::matching::normalize::normalize;
use crate::models::{Candidate, ConfidenceFactors, NormalizedName};

const CHARACTER_WEIGHT: f64 = 0.55;
const TOKEN_WEIGHT: f64 = 0.30;
const TYPO_BOOST_WEIGHT: f64 = 0.15;

/// Similarity credited to a recognized abbreviation pair; the strings share
/// almost no characters, so the character-level blend would undersell them.
const ABBREVIATION_SIMILARITY: f64 = 0.9;

/// One candidate with its computed signals and aggregated confidence.
#[derive(Debug, Clone)]
pub struct CandidateScore {
    pub candidate: Candidate,
    pub factors: ConfidenceFactors,
    pub is_abbreviation: bool,
    pub confidence: f64,
}

/// Compute the search-tier signals for one (query, candidate) pair and
/// aggregate them. The AI factor stays absent here; only the escalation
/// tiers may fill it in.
pub fn score_candidate(
    query: &NormalizedName,
    candidate: &Candidate,
    context: &QueryContext,
    weights: &WeightTable,
) -> CandidateScore {
    let candidate_norm = normalize(&candidate.display_name);

    let is_abbreviation = is_potential_abbreviation(&query.raw, &candidate.display_name)
        || is_potential_abbreviation(&candidate.display_name, &query.raw);

    let string_similarity = string_similarity(query, &candidate_norm, is_abbreviation);

    let factors = ConfidenceFactors {
        search_relevance: Some(candidate.relevance),
        string_similarity: Some(string_similarity),
        ai_confidence: None,
        context_match: if context.is_empty() {
            None
        } else {
            Some(context_match(candidate, context))
        },
    };

    let confidence = aggregate(&factors, weights);

    CandidateScore {
        candidate: candidate.clone(),
        factors,
        is_abbreviation,
        confidence,
    }
}

/// Blend of character-level similarity, key-term overlap, and a phonetic /
/// keyboard typo boost over the canonical forms.
fn string_similarity(query: &NormalizedName, candidate: &NormalizedName, is_abbreviation: bool) -> f64 {
    if query.canonical.is_empty() || candidate.canonical.is_empty() {
        return 0.0;
    }
    if query.canonical == candidate.canonical {
        return 1.0;
    }

    let char_score = character_similarity(&query.canonical, &candidate.canonical);
    let token_score = token_overlap(&query.key_terms, &candidate.key_terms);
    let typo_score = detect_typo(
        &query.canonical,
        std::slice::from_ref(&candidate.canonical),
    )
    .confidence;

    let blended = char_score * CHARACTER_WEIGHT
        + token_score * TOKEN_WEIGHT
        + typo_score * TYPO_BOOST_WEIGHT;

    if is_abbreviation {
        blended.max(ABBREVIATION_SIMILARITY)
    } else {
        blended
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matching::confidence::WeightRegistry;

    fn candidate(name: &str, relevance: f64) -> Candidate {
        Candidate {
            entity_id: "e1".to_string(),
            display_name: name.to_string(),
            relevance,
            industry: None,
            region: None,
        }
    }

    fn weights() -> WeightTable {
        WeightRegistry::builtin().get("standard").unwrap().clone()
    }

    #[test]
    fn test_suffix_variants_score_as_identical() {
        let query = normalize("Acme Corp");
        let score = score_candidate(&query, &candidate("Acme Corporation", 0.95), &QueryContext::default(), &weights());
        assert_eq!(score.factors.string_similarity, Some(1.0));
        assert!(score.confidence > 0.95);
    }

    #[test]
    fn test_abbreviation_pair_is_flagged_and_boosted() {
        let query = normalize("IBM");
        let score = score_candidate(
            &query,
            &candidate("International Business Machines Corp", 0.8),
            &QueryContext::default(),
            &weights(),
        );
        assert!(score.is_abbreviation);
        assert!(score.factors.string_similarity.unwrap() >= 0.9);
    }

    #[test]
    fn test_unrelated_names_score_low() {
        let query = normalize("XYZ");
        let score = score_candidate(&query, &candidate("Microsoft", 0.2), &QueryContext::default(), &weights());
        assert!(score.confidence < 0.3, "got {}", score.confidence);
        assert!(!score.is_abbreviation);
    }

    #[test]
    fn test_ai_factor_stays_absent_at_search_tier() {
        let query = normalize("Acme");
        let score = score_candidate(&query, &candidate("Acme Holdings", 0.7), &QueryContext::default(), &weights());
        assert!(score.factors.ai_confidence.is_none());
    }
}
