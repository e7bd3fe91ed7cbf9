// src/models/matching.rs
use serde::{Deserialize, Serialize};

/// How the matched pair of names relate to each other.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchType {
    Exact,
    Abbreviation,
    Variation,
    Semantic,
    Fuzzy,
    None,
}

impl MatchType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchType::Exact => "exact",
            MatchType::Abbreviation => "abbreviation",
            MatchType::Variation => "variation",
            MatchType::Semantic => "semantic",
            MatchType::Fuzzy => "fuzzy",
            MatchType::None => "none",
        }
    }
}

/// The most expensive verification tier that contributed to a decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchTier {
    Cache,
    Search,
    Ai,
    WebEvidence,
}

impl MatchTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchTier::Cache => "cache",
            MatchTier::Search => "search",
            MatchTier::Ai => "ai",
            MatchTier::WebEvidence => "web_evidence",
        }
    }
}

/// Terminal outcome of one resolution attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Disposition {
    Matched,
    Review,
    NoMatch,
}

/// Independently-sourced signals for one (query, candidate) pair.
///
/// An absent factor means its tier never ran; it is excluded from
/// aggregation rather than scored as zero.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ConfidenceFactors {
    pub search_relevance: Option<f64>,
    pub string_similarity: Option<f64>,
    pub ai_confidence: Option<f64>,
    pub context_match: Option<f64>,
}

impl ConfidenceFactors {
    pub fn present_count(&self) -> usize {
        [
            self.search_relevance,
            self.string_similarity,
            self.ai_confidence,
            self.context_match,
        ]
        .iter()
        .filter(|f| f.is_some())
        .count()
    }
}

/// Output of one matching attempt. Constructed once, immutable, returned
/// to the caller; only its confirmation is promoted into the cache.
#[derive(Debug, Clone, Serialize)]
pub struct MatchDecision {
    pub query: String,
    pub matched_entity_id: Option<String>,
    pub confidence: f64,
    pub match_type: MatchType,
    pub tier_reached: MatchTier,
    pub disposition: Disposition,
    pub evidence: Option<String>,
}

impl MatchDecision {
    /// A terminal no-match decision at the given tier.
    pub fn no_match(query: &str, tier: MatchTier) -> Self {
        Self {
            query: query.to_string(),
            matched_entity_id: None,
            confidence: 0.0,
            match_type: MatchType::None,
            tier_reached: tier,
            disposition: Disposition::NoMatch,
            evidence: None,
        }
    }
}
