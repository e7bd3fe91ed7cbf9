// src/utils/logging.rs - Logging helpers for the resolution pipeline
use log::{info, warn};
use std::time::Instant;

use crate::models::MatchTier;

#[derive(Clone)]
pub struct ResolutionLogger {
    start_time: Instant,
}

impl ResolutionLogger {
    pub fn new() -> Self {
        Self {
            start_time: Instant::now(),
        }
    }

    pub fn log_start(&self, query_count: usize, max_concurrent: usize) {
        info!(
            "[RESOLVE] 🚀 Starting resolution of {} queries ({} concurrent)",
            query_count, max_concurrent
        );
    }

    pub fn log_phase(&self, phase: &str, details: Option<&str>) {
        let elapsed = self.start_time.elapsed();
        match details {
            Some(details) => info!(
                "[RESOLVE] 🔄 Phase: {} - {} [+{:.1}s]",
                phase,
                details,
                elapsed.as_secs_f32()
            ),
            None => info!(
                "[RESOLVE] 🔄 Phase: {} [+{:.1}s]",
                phase,
                elapsed.as_secs_f32()
            ),
        }
    }

    pub fn log_tier(&self, query: &str, tier: MatchTier, confidence: f64) {
        info!(
            "[RESOLVE] {} Tier {} reached for {:?} (confidence {:.3})",
            tier_emoji(tier),
            tier.as_str(),
            query,
            confidence
        );
    }

    pub fn log_degraded(&self, collaborator: &str, detail: &str) {
        warn!(
            "[RESOLVE] ⚠️  {} degraded: {} - continuing with remaining signals",
            collaborator, detail
        );
    }

    pub fn log_completion(&self, matched: usize, review: usize, no_match: usize, avg_confidence: f64) {
        info!(
            "[RESOLVE] ✅ Completed in {:.1}s: {} matched, {} queued for review, {} no-match (avg confidence {:.3})",
            self.start_time.elapsed().as_secs_f32(),
            matched,
            review,
            no_match,
            avg_confidence
        );
    }
}

impl Default for ResolutionLogger {
    fn default() -> Self {
        Self::new()
    }
}

fn tier_emoji(tier: MatchTier) -> &'static str {
    match tier {
        MatchTier::Cache => "📦",
        MatchTier::Search => "🔎",
        MatchTier::Ai => "🤖",
        MatchTier::WebEvidence => "🌐",
    }
}
