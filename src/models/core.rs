// src/models/core.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::matching::MatchType;

/// A candidate entity returned by the search collaborator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Candidate {
    pub entity_id: String,
    pub display_name: String,
    /// Base relevance score from the index, 0.0..=1.0.
    pub relevance: f64,
    /// Optional context enrichment the search collaborator may supply.
    #[serde(default)]
    pub industry: Option<String>,
    #[serde(default)]
    pub region: Option<String>,
}

/// Derived, immutable view of a raw name used for all comparisons.
/// Never persisted independently; rebuilt on demand from the raw string.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedName {
    pub raw: String,
    /// Lowercased, punctuation-collapsed, legal-suffix-stripped form.
    pub canonical: String,
    /// Significant tokens in order, stop-words and suffixes removed.
    pub key_terms: Vec<String>,
    /// Acronym built from the leading letters of the key terms, when the
    /// name has at least two of them.
    pub abbreviation_candidate: Option<String>,
}

/// One confirmed query -> entity mapping owned by a single entity record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    pub query: String,
    pub normalized_query: String,
    pub confidence: f64,
    pub match_count: u32,
    pub last_matched_at: DateTime<Utc>,
    #[serde(default)]
    pub match_type: Option<MatchType>,
    /// Hash of the query context the confirmation was made under, when any.
    #[serde(default)]
    pub context_hash: Option<String>,
}

impl CacheEntry {
    pub fn new(
        query: &str,
        normalized_query: &str,
        confidence: f64,
        match_type: Option<MatchType>,
        context_hash: Option<String>,
    ) -> Self {
        Self {
            query: query.to_string(),
            normalized_query: normalized_query.to_string(),
            confidence,
            match_count: 1,
            last_matched_at: Utc::now(),
            match_type,
            context_hash,
        }
    }
}

/// Point-in-time copy of the cache's process-lifetime counters.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct CacheStatsSnapshot {
    pub lookups: u64,
    pub hits: u64,
    pub misses: u64,
    pub updates: u64,
}

impl CacheStatsSnapshot {
    pub fn hit_rate(&self) -> f64 {
        if self.lookups == 0 {
            0.0
        } else {
            self.hits as f64 / self.lookups as f64
        }
    }
}
