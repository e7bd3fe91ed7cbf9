// src/utils/config.rs - Matcher configuration from environment variables
use log::info;
use std::env;

use crate::matching::confidence::EscalationBand;

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|s| s.parse::<T>().ok())
        .unwrap_or(default)
}

/// Recognized tuning options for the resolution pipeline.
#[derive(Debug, Clone)]
pub struct MatcherConfig {
    /// The bar for "matched" vs "review" at the terminal tier.
    pub decision_threshold: f64,
    pub cache_enabled: bool,
    pub cache_min_confidence: f64,
    pub cache_max_entries_per_entity: usize,
    pub ai_band: EscalationBand,
    pub ambiguity_gap: f64,
    pub search_limit: usize,
    pub search_timeout_ms: u64,
    pub ai_timeout_ms: u64,
    pub web_timeout_ms: u64,
    pub max_query_length: usize,
    pub weight_profile: String,
}

impl Default for MatcherConfig {
    fn default() -> Self {
        Self {
            decision_threshold: 0.9,
            cache_enabled: true,
            cache_min_confidence: 0.9,
            cache_max_entries_per_entity: 50,
            ai_band: EscalationBand::default(),
            ambiguity_gap: 0.05,
            search_limit: 10,
            search_timeout_ms: 2_000,
            ai_timeout_ms: 8_000,
            web_timeout_ms: 8_000,
            max_query_length: 512,
            weight_profile: "standard".to_string(),
        }
    }
}

impl MatcherConfig {
    /// Create configuration from environment variables
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            decision_threshold: env_parse("RESOLUTION_DECISION_THRESHOLD", defaults.decision_threshold),
            cache_enabled: env_parse("RESOLUTION_CACHE_ENABLED", defaults.cache_enabled),
            cache_min_confidence: env_parse("RESOLUTION_CACHE_MIN_CONFIDENCE", defaults.cache_min_confidence),
            cache_max_entries_per_entity: env_parse("RESOLUTION_CACHE_MAX_ENTRIES", defaults.cache_max_entries_per_entity),
            ai_band: EscalationBand {
                low: env_parse("RESOLUTION_AI_BAND_LOW", defaults.ai_band.low),
                high: env_parse("RESOLUTION_AI_BAND_HIGH", defaults.ai_band.high),
            },
            ambiguity_gap: env_parse("RESOLUTION_AMBIGUITY_GAP", defaults.ambiguity_gap),
            search_limit: env_parse("RESOLUTION_SEARCH_LIMIT", defaults.search_limit),
            search_timeout_ms: env_parse("RESOLUTION_SEARCH_TIMEOUT_MS", defaults.search_timeout_ms),
            ai_timeout_ms: env_parse("RESOLUTION_AI_TIMEOUT_MS", defaults.ai_timeout_ms),
            web_timeout_ms: env_parse("RESOLUTION_WEB_TIMEOUT_MS", defaults.web_timeout_ms),
            max_query_length: env_parse("RESOLUTION_MAX_QUERY_LENGTH", defaults.max_query_length),
            weight_profile: env::var("RESOLUTION_WEIGHT_PROFILE")
                .unwrap_or(defaults.weight_profile),
        }
    }

    /// Log the current configuration
    pub fn log_config(&self) {
        info!("⚙️  Resolution configuration:");
        info!("   Decision threshold: {}", self.decision_threshold);
        info!(
            "   Cache: enabled={}, min_confidence={}, max_entries_per_entity={}",
            self.cache_enabled, self.cache_min_confidence, self.cache_max_entries_per_entity
        );
        info!(
            "   AI escalation band: [{}, {}), ambiguity gap: {}",
            self.ai_band.low, self.ai_band.high, self.ambiguity_gap
        );
        info!(
            "   Collaborator timeouts (ms): search={}, ai={}, web={}",
            self.search_timeout_ms, self.ai_timeout_ms, self.web_timeout_ms
        );
        info!("   Weight profile: {}", self.weight_profile);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = MatcherConfig::default();
        assert_eq!(config.decision_threshold, 0.9);
        assert!(config.cache_enabled);
        assert_eq!(config.cache_max_entries_per_entity, 50);
        assert_eq!(config.ai_band.low, 0.3);
        assert_eq!(config.ai_band.high, 0.95);
        assert_eq!(config.weight_profile, "standard");
    }

    #[test]
    fn test_env_overrides() {
        std::env::set_var("RESOLUTION_DECISION_THRESHOLD", "0.8");
        std::env::set_var("RESOLUTION_CACHE_ENABLED", "false");
        std::env::set_var("RESOLUTION_CACHE_MAX_ENTRIES", "10");

        let config = MatcherConfig::from_env();
        assert_eq!(config.decision_threshold, 0.8);
        assert!(!config.cache_enabled);
        assert_eq!(config.cache_max_entries_per_entity, 10);

        std::env::remove_var("RESOLUTION_DECISION_THRESHOLD");
        std::env::remove_var("RESOLUTION_CACHE_ENABLED");
        std::env::remove_var("RESOLUTION_CACHE_MAX_ENTRIES");
    }

    #[test]
    fn test_malformed_env_falls_back_to_default() {
        std::env::set_var("RESOLUTION_AMBIGUITY_GAP", "not-a-number");
        let config = MatcherConfig::from_env();
        assert_eq!(config.ambiguity_gap, 0.05);
        std::env::remove_var("RESOLUTION_AMBIGUITY_GAP");
    }
}
