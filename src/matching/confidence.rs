// src/matching/confidence.rs - Signal aggregation, escalation policy, match classification
use anyhow::{anyhow, Result};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::models::{Candidate, ConfidenceFactors, MatchType};

const WEIGHT_SUM_TOLERANCE: f64 = 1e-6;

const ABBREVIATION_CONFIDENCE_THRESHOLD: f64 = 0.7;
const VARIATION_CONFIDENCE_THRESHOLD: f64 = 0.85;
const SEMANTIC_CONFIDENCE_THRESHOLD: f64 = 0.6;

const AMBIGUITY_TOP_THRESHOLD: f64 = 0.8;

/// Recognized child -> parent industry relationships for partial context
/// credit. Checked in both directions.
const INDUSTRY_PARENTS: [(&str, &str); 8] = [
    ("biotech", "healthcare"),
    ("pharmaceuticals", "healthcare"),
    ("medical devices", "healthcare"),
    ("software", "technology"),
    ("semiconductors", "technology"),
    ("banking", "finance"),
    ("insurance", "finance"),
    ("logistics", "transportation"),
];

static INDUSTRY_PARENT_SET: Lazy<HashMap<&'static str, &'static str>> =
    Lazy::new(|| INDUSTRY_PARENTS.iter().copied().collect());

/// Caller-supplied disambiguation context for a query.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryContext {
    pub industry: Option<String>,
    pub region: Option<String>,
}

impl QueryContext {
    pub fn is_empty(&self) -> bool {
        self.industry.is_none() && self.region.is_none()
    }

    /// Stable text form used for cache context hashing.
    pub fn canonical_string(&self) -> String {
        format!(
            "industry={};region={}",
            self.industry.as_deref().unwrap_or("").to_lowercase(),
            self.region.as_deref().unwrap_or("").to_lowercase(),
        )
    }
}

/// A named, versioned weight table for confidence aggregation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeightTable {
    pub name: String,
    pub version: u32,
    pub search_relevance: f64,
    pub string_similarity: f64,
    pub ai_confidence: f64,
    pub context_match: f64,
}

impl WeightTable {
    /// Weight tables must sum to 1.0; a malformed table is a configuration
    /// error caught at load time, never at scoring time.
    pub fn validate(&self) -> Result<()> {
        let sum =
            self.search_relevance + self.string_similarity + self.ai_confidence + self.context_match;
        if (sum - 1.0).abs() > WEIGHT_SUM_TOLERANCE {
            return Err(anyhow!(
                "weight table '{}' v{} sums to {} (expected 1.0)",
                self.name,
                self.version,
                sum
            ));
        }
        Ok(())
    }
}

/// Registry of weight profiles keyed by name. Two built-in profiles ship,
/// one per reference interpretation of tier weighting; deployments select
/// one by name and may register more.
#[derive(Debug, Clone)]
pub struct WeightRegistry {
    profiles: HashMap<String, WeightTable>,
}

impl WeightRegistry {
    pub fn builtin() -> Self {
        let mut registry = Self {
            profiles: HashMap::new(),
        };
        registry
            .register(WeightTable {
                name: "standard".to_string(),
                version: 1,
                search_relevance: 0.20,
                string_similarity: 0.35,
                ai_confidence: 0.35,
                context_match: 0.10,
            })
            .expect("builtin 'standard' profile is valid");
        registry
            .register(WeightTable {
                name: "ai-led".to_string(),
                version: 1,
                search_relevance: 0.15,
                string_similarity: 0.25,
                ai_confidence: 0.50,
                context_match: 0.10,
            })
            .expect("builtin 'ai-led' profile is valid");
        registry
    }

    pub fn register(&mut self, table: WeightTable) -> Result<()> {
        table.validate()?;
        self.profiles.insert(table.name.clone(), table);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&WeightTable> {
        self.profiles.get(name)
    }

    pub fn names(&self) -> Vec<&str> {
        self.profiles.keys().map(|k| k.as_str()).collect()
    }
}

fn clamp01(value: f64) -> f64 {
    value.clamp(0.0, 1.0)
}

/// Weighted mean over the factors that are present; absent factors are
/// excluded rather than scored as zero. Out-of-range inputs are clamped so
/// a collaborator reporting 1.5 cannot push the result past 1.0.
pub fn aggregate(factors: &ConfidenceFactors, weights: &WeightTable) -> f64 {
    let contributions = [
        (factors.search_relevance, weights.search_relevance),
        (factors.string_similarity, weights.string_similarity),
        (factors.ai_confidence, weights.ai_confidence),
        (factors.context_match, weights.context_match),
    ];

    let mut weighted_sum = 0.0;
    let mut weight_total = 0.0;
    for (factor, weight) in contributions {
        if let Some(value) = factor {
            weighted_sum += clamp01(value) * weight;
            weight_total += weight;
        }
    }

    if weight_total == 0.0 {
        return 0.0;
    }
    clamp01(weighted_sum / weight_total)
}

/// Escalation bounds for the AI tier.
#[derive(Debug, Clone, Copy)]
pub struct EscalationBand {
    pub low: f64,
    pub high: f64,
}

impl Default for EscalationBand {
    fn default() -> Self {
        Self { low: 0.3, high: 0.95 }
    }
}

/// Whether an AI call is worth its cost. Ambiguity always escalates; a
/// conclusive accept (>= band high) or reject (<= band low) never does,
/// except that user-supplied context makes a low-confidence result worth
/// one AI look (the context may rescue a match plain scoring missed).
pub fn should_use_ai(
    confidence: f64,
    has_ambiguity: bool,
    has_user_context: bool,
    band: EscalationBand,
) -> bool {
    if has_ambiguity {
        return true;
    }
    if confidence >= band.high {
        return false;
    }
    if confidence <= band.low {
        return has_user_context;
    }
    true
}

/// True when the top two scores are both high and close together, meaning
/// the ranking is not decisive. False for zero or one candidates.
pub fn has_ambiguous_matches(scores: &[f64], gap: f64) -> bool {
    if scores.len() < 2 {
        return false;
    }
    let mut sorted = scores.to_vec();
    sorted.sort_by(|a, b| b.partial_cmp(a).unwrap_or(std::cmp::Ordering::Equal));

    sorted[0] >= AMBIGUITY_TOP_THRESHOLD && (sorted[0] - sorted[1]) <= gap
}

/// Classify how two names relate given the final confidence.
pub fn determine_match_type(a: &str, b: &str, confidence: f64, is_abbreviation: bool) -> MatchType {
    if a.to_lowercase() == b.to_lowercase() {
        return MatchType::Exact;
    }
    if is_abbreviation && confidence >= ABBREVIATION_CONFIDENCE_THRESHOLD {
        return MatchType::Abbreviation;
    }
    if confidence >= VARIATION_CONFIDENCE_THRESHOLD {
        return MatchType::Variation;
    }
    if confidence >= SEMANTIC_CONFIDENCE_THRESHOLD {
        return MatchType::Semantic;
    }
    MatchType::Fuzzy
}

/// Context agreement between a candidate entity and the caller's context,
/// averaged over the fields the caller supplied. Exact field match scores
/// 1.0, a recognized parent-category relationship 0.5, anything else 0.
pub fn context_match(candidate: &Candidate, context: &QueryContext) -> f64 {
    if context.is_empty() {
        return 0.0;
    }

    let mut total = 0.0;
    let mut fields = 0;

    if let Some(wanted) = &context.industry {
        fields += 1;
        if let Some(actual) = &candidate.industry {
            let wanted = wanted.to_lowercase();
            let actual = actual.to_lowercase();
            if wanted == actual {
                total += 1.0;
            } else if industries_related(&wanted, &actual) {
                total += 0.5;
            }
        }
    }

    if let Some(wanted) = &context.region {
        fields += 1;
        if let Some(actual) = &candidate.region {
            if wanted.to_lowercase() == actual.to_lowercase() {
                total += 1.0;
            }
        }
    }

    if fields == 0 {
        0.0
    } else {
        total / fields as f64
    }
}

fn industries_related(a: &str, b: &str) -> bool {
    INDUSTRY_PARENT_SET.get(a).is_some_and(|p| *p == b)
        || INDUSTRY_PARENT_SET.get(b).is_some_and(|p| *p == a)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn standard() -> WeightTable {
        WeightRegistry::builtin().get("standard").unwrap().clone()
    }

    #[test]
    fn test_aggregate_stays_in_bounds_with_out_of_range_inputs() {
        let weights = standard();
        let factors = ConfidenceFactors {
            search_relevance: Some(1.5),
            string_similarity: Some(-0.5),
            ai_confidence: None,
            context_match: None,
        };
        let confidence = aggregate(&factors, &weights);
        assert!((0.0..=1.0).contains(&confidence));

        let all_high = ConfidenceFactors {
            search_relevance: Some(2.0),
            string_similarity: Some(2.0),
            ai_confidence: Some(2.0),
            context_match: Some(2.0),
        };
        assert_eq!(aggregate(&all_high, &weights), 1.0);
    }

    #[test]
    fn test_aggregate_excludes_absent_factors() {
        let weights = standard();
        let factors = ConfidenceFactors {
            search_relevance: None,
            string_similarity: Some(0.8),
            ai_confidence: None,
            context_match: None,
        };
        // The only present factor is the whole mean, not diluted by zeros.
        assert!((aggregate(&factors, &weights) - 0.8).abs() < 1e-9);

        assert_eq!(aggregate(&ConfidenceFactors::default(), &weights), 0.0);
    }

    #[test]
    fn test_aggregate_differs_between_profiles() {
        let registry = WeightRegistry::builtin();
        let factors = ConfidenceFactors {
            search_relevance: Some(0.9),
            string_similarity: Some(0.5),
            ai_confidence: Some(1.0),
            context_match: None,
        };
        let standard = aggregate(&factors, registry.get("standard").unwrap());
        let ai_led = aggregate(&factors, registry.get("ai-led").unwrap());
        assert!(ai_led > standard, "ai-led profile should weight the AI verdict harder");
    }

    #[test]
    fn test_weight_table_validation() {
        let mut registry = WeightRegistry::builtin();
        let bad = WeightTable {
            name: "broken".to_string(),
            version: 1,
            search_relevance: 0.5,
            string_similarity: 0.5,
            ai_confidence: 0.5,
            context_match: 0.0,
        };
        assert!(registry.register(bad).is_err());
        assert!(registry.get("broken").is_none());
    }

    #[test]
    fn test_should_use_ai_band() {
        let band = EscalationBand::default();
        assert!(!should_use_ai(0.96, false, false, band));
        assert!(should_use_ai(0.75, false, false, band));
        assert!(should_use_ai(0.5, true, false, band));
        // Fast reject unless the caller supplied context worth checking.
        assert!(!should_use_ai(0.1, false, false, band));
        assert!(should_use_ai(0.1, false, true, band));
        // Ambiguity escalates even above the accept bar.
        assert!(should_use_ai(0.97, true, false, band));
    }

    #[test]
    fn test_has_ambiguous_matches() {
        assert!(has_ambiguous_matches(&[0.85, 0.82, 0.7], 0.05));
        assert!(!has_ambiguous_matches(&[0.95, 0.7, 0.5], 0.05));
        assert!(!has_ambiguous_matches(&[], 0.05));
        assert!(!has_ambiguous_matches(&[0.9], 0.05));
        // Close together but neither is high.
        assert!(!has_ambiguous_matches(&[0.5, 0.49], 0.05));
    }

    #[test]
    fn test_determine_match_type() {
        assert_eq!(determine_match_type("Acme", "ACME", 1.0, false), MatchType::Exact);
        assert_eq!(
            determine_match_type("IBM", "International Business Machines", 0.8, true),
            MatchType::Abbreviation
        );
        assert_eq!(
            determine_match_type("Veran Medical Technologies Inc", "Veran Medical Technologies, Inc.", 0.87, false),
            MatchType::Variation
        );
        assert_eq!(determine_match_type("a", "b", 0.7, false), MatchType::Semantic);
        assert_eq!(determine_match_type("a", "b", 0.4, false), MatchType::Fuzzy);
    }

    #[test]
    fn test_context_match_scoring() {
        let candidate = Candidate {
            entity_id: "e1".to_string(),
            display_name: "Acme Biotech".to_string(),
            relevance: 0.9,
            industry: Some("biotech".to_string()),
            region: Some("US".to_string()),
        };

        let exact = QueryContext {
            industry: Some("Biotech".to_string()),
            region: None,
        };
        assert_eq!(context_match(&candidate, &exact), 1.0);

        let parent = QueryContext {
            industry: Some("healthcare".to_string()),
            region: None,
        };
        assert_eq!(context_match(&candidate, &parent), 0.5);

        let mismatch = QueryContext {
            industry: Some("finance".to_string()),
            region: None,
        };
        assert_eq!(context_match(&candidate, &mismatch), 0.0);

        assert_eq!(context_match(&candidate, &QueryContext::default()), 0.0);
    }
}
