// src/matching/orchestrator.rs - Tier state machine: cache, search, AI, web evidence
use futures::future::join_all;
use log::{debug, info, warn};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;

use crate::cache::ExactMatchCache;
use crate::collaborators::response_cache::{AiResponseCache, SharedAiResponseCache};
use crate::collaborators::{AiDisambiguator, AiVerdict, CandidateSearch, WebEvidence};
use crate::errors::MatchError;
use crate::matching::confidence::{
    aggregate, determine_match_type, has_ambiguous_matches, should_use_ai, QueryContext,
    WeightTable,
};
use crate::matching::normalize::normalize;
use crate::matching::phonetic::correct_common_typos;
use crate::matching::scorer::{score_candidate, CandidateScore};
use crate::models::{Disposition, MatchDecision, MatchTier, MatchType};
use crate::review::ReviewQueue;
use crate::utils::config::MatcherConfig;

/// Fixed weight of the web-evidence signal when it is folded into the
/// confidence carried out of the AI tier.
const WEB_EVIDENCE_WEIGHT: f64 = 0.3;

/// Number of top candidates sent to the AI tier when the ranking is
/// ambiguous.
const AI_CANDIDATES_ON_AMBIGUITY: usize = 2;

/// Sequences one query through the verification tiers, escalating only
/// while the accumulated confidence is inconclusive.
///
/// Requests are independent; an orchestrator instance is shared across
/// worker tasks by reference. Collaborator calls are the only suspension
/// points, each bounded by its configured timeout; a failing collaborator
/// costs its signal, never the request.
pub struct MatchOrchestrator {
    search: Arc<dyn CandidateSearch>,
    ai: Arc<dyn AiDisambiguator>,
    web_evidence: Arc<dyn WebEvidence>,
    pub cache: Arc<ExactMatchCache>,
    pub review_queue: Arc<ReviewQueue>,
    ai_response_cache: Option<SharedAiResponseCache>,
    config: MatcherConfig,
    weights: WeightTable,
}

impl MatchOrchestrator {
    pub fn new(
        search: Arc<dyn CandidateSearch>,
        ai: Arc<dyn AiDisambiguator>,
        web_evidence: Arc<dyn WebEvidence>,
        cache: Arc<ExactMatchCache>,
        review_queue: Arc<ReviewQueue>,
        config: MatcherConfig,
        weights: WeightTable,
    ) -> Self {
        Self {
            search,
            ai,
            web_evidence,
            cache,
            review_queue,
            ai_response_cache: None,
            config,
            weights,
        }
    }

    /// Set the shared AI verdict cache used to skip repeat evaluations.
    pub fn set_ai_response_cache(&mut self, cache: SharedAiResponseCache) {
        info!("Setting AI response cache for MatchOrchestrator");
        self.ai_response_cache = Some(cache);
    }

    /// Resolve one query against the candidate set.
    ///
    /// Only `MatchError::Validation` is returned to the caller; every other
    /// failure mode degrades inside the pipeline and still produces a
    /// decision.
    pub async fn resolve(
        &self,
        query: &str,
        context: &QueryContext,
    ) -> Result<MatchDecision, MatchError> {
        let trimmed = query.trim();
        if trimmed.is_empty() {
            return Err(MatchError::Validation("query is empty".to_string()));
        }
        if trimmed.chars().count() > self.config.max_query_length {
            return Err(MatchError::Validation(format!(
                "query exceeds {} characters",
                self.config.max_query_length
            )));
        }

        // Tier: cache.
        let lookup = self.cache.lookup(trimmed, context).await;
        if let (true, Some(entity_id), Some(entry)) = (lookup.hit, lookup.entity_id, lookup.entry) {
            return Ok(MatchDecision {
                query: trimmed.to_string(),
                matched_entity_id: Some(entity_id),
                confidence: entry.confidence,
                match_type: entry.match_type.unwrap_or(MatchType::Exact),
                tier_reached: MatchTier::Cache,
                disposition: Disposition::Matched,
                evidence: Some(format!(
                    "cached confirmation, seen {} time(s)",
                    entry.match_count
                )),
            });
        }

        // The misspelling dictionary runs before any other signal.
        let correction = correct_common_typos(trimmed);
        let effective_query = if correction.corrections.is_empty() {
            trimmed.to_string()
        } else {
            debug!(
                "Applied typo corrections {:?} to query {:?}",
                correction.corrections, trimmed
            );
            correction.corrected
        };

        // Tier: candidate search.
        let candidates = match timeout(
            Duration::from_millis(self.config.search_timeout_ms),
            self.search.search(&effective_query, self.config.search_limit),
        )
        .await
        {
            Ok(Ok(candidates)) => candidates,
            Ok(Err(e)) => {
                warn!("Search collaborator failed for {:?}: {}", trimmed, e);
                Vec::new()
            }
            Err(_) => {
                warn!(
                    "{}",
                    MatchError::CollaboratorTimeout {
                        collaborator: "search",
                        timeout_ms: self.config.search_timeout_ms,
                    }
                );
                Vec::new()
            }
        };

        if candidates.is_empty() {
            debug!("No candidates for {:?}, terminal no-match", trimmed);
            return Ok(MatchDecision::no_match(trimmed, MatchTier::Search));
        }

        // Tier: scoring.
        let query_norm = normalize(&effective_query);
        let mut scored: Vec<CandidateScore> = candidates
            .iter()
            .map(|candidate| score_candidate(&query_norm, candidate, context, &self.weights))
            .collect();
        scored.sort_by(|a, b| {
            b.confidence
                .partial_cmp(&a.confidence)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        let scores: Vec<f64> = scored.iter().map(|s| s.confidence).collect();
        let ambiguous = has_ambiguous_matches(&scores, self.config.ambiguity_gap);
        let has_context = !context.is_empty();

        if !should_use_ai(scored[0].confidence, ambiguous, has_context, self.config.ai_band) {
            if scored[0].confidence >= self.config.ai_band.high {
                return Ok(self
                    .accept(trimmed, &scored[0], scored[0].confidence, MatchTier::Search, context, None)
                    .await);
            }
            debug!(
                "Confidence {:.3} below floor for {:?}, terminal no-match",
                scored[0].confidence, trimmed
            );
            return Ok(MatchDecision::no_match(trimmed, MatchTier::Search));
        }

        // Tier: AI disambiguation over the top candidate(s).
        let ai_count = if ambiguous {
            AI_CANDIDATES_ON_AMBIGUITY.min(scored.len())
        } else {
            1
        };
        let verdicts = join_all((0..ai_count).map(|i| {
            self.evaluate_with_ai(&effective_query, &scored[i].candidate.display_name, context)
        }))
        .await;

        let mut rationales: Vec<Option<String>> = vec![None; scored.len()];
        for (i, verdict) in verdicts.into_iter().enumerate() {
            if let Some(verdict) = verdict {
                scored[i].factors.ai_confidence = Some(verdict.confidence);
                scored[i].confidence = aggregate(&scored[i].factors, &self.weights);
                rationales[i] = Some(verdict.rationale);
            }
        }

        let best_idx = (0..scored.len())
            .max_by(|&a, &b| {
                scored[a]
                    .confidence
                    .partial_cmp(&scored[b].confidence)
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
            .unwrap_or(0);
        let best = &scored[best_idx];
        let ai_evidence = rationales[best_idx].clone();

        if best.confidence >= self.config.decision_threshold {
            return Ok(self
                .accept(trimmed, best, best.confidence, MatchTier::Ai, context, ai_evidence)
                .await);
        }
        if best.confidence <= self.config.ai_band.low {
            debug!(
                "AI tier left {:?} below floor ({:.3}), terminal no-match",
                trimmed, best.confidence
            );
            let mut decision = MatchDecision::no_match(trimmed, MatchTier::Ai);
            decision.evidence = ai_evidence;
            return Ok(decision);
        }

        // Tier: web evidence. Terminal either way.
        let mut final_confidence = best.confidence;
        let mut evidence = ai_evidence;
        match timeout(
            Duration::from_millis(self.config.web_timeout_ms),
            self.web_evidence
                .verify(&effective_query, &best.candidate.display_name),
        )
        .await
        {
            Ok(Ok(verdict)) => {
                final_confidence = ((1.0 - WEB_EVIDENCE_WEIGHT) * best.confidence
                    + WEB_EVIDENCE_WEIGHT * verdict.confidence.clamp(0.0, 1.0))
                .clamp(0.0, 1.0);
                evidence = Some(verdict.evidence);
            }
            Ok(Err(e)) => {
                warn!("Web evidence collaborator failed for {:?}: {}", trimmed, e);
            }
            Err(_) => {
                warn!(
                    "{}",
                    MatchError::CollaboratorTimeout {
                        collaborator: "web_evidence",
                        timeout_ms: self.config.web_timeout_ms,
                    }
                );
            }
        }

        if final_confidence >= self.config.decision_threshold {
            return Ok(self
                .accept(trimmed, best, final_confidence, MatchTier::WebEvidence, context, evidence)
                .await);
        }

        // All tiers exhausted and still inconclusive: surface for a human,
        // never guess.
        let match_type = determine_match_type(
            trimmed,
            &best.candidate.display_name,
            final_confidence,
            best.is_abbreviation,
        );
        let decision = MatchDecision {
            query: trimmed.to_string(),
            matched_entity_id: Some(best.candidate.entity_id.clone()),
            confidence: final_confidence,
            match_type,
            tier_reached: MatchTier::WebEvidence,
            disposition: Disposition::Review,
            evidence,
        };
        self.review_queue.push(decision.clone()).await;
        Ok(decision)
    }

    async fn accept(
        &self,
        query: &str,
        score: &CandidateScore,
        confidence: f64,
        tier: MatchTier,
        context: &QueryContext,
        evidence: Option<String>,
    ) -> MatchDecision {
        let match_type = determine_match_type(
            query,
            &score.candidate.display_name,
            confidence,
            score.is_abbreviation,
        );
        let decision = MatchDecision {
            query: query.to_string(),
            matched_entity_id: Some(score.candidate.entity_id.clone()),
            confidence,
            match_type,
            tier_reached: tier,
            disposition: Disposition::Matched,
            evidence,
        };

        if confidence >= self.config.cache_min_confidence {
            self.cache
                .update(
                    &score.candidate.entity_id,
                    query,
                    confidence,
                    Some(match_type),
                    context,
                )
                .await;
        }
        decision
    }

    /// One AI evaluation, memoized and bounded. Returns `None` on timeout or
    /// collaborator error so the factor stays absent.
    async fn evaluate_with_ai(
        &self,
        query: &str,
        candidate_name: &str,
        context: &QueryContext,
    ) -> Option<AiVerdict> {
        let context_hash = ExactMatchCache::context_hash(context);
        let key = AiResponseCache::pair_key(query, candidate_name, context_hash.as_deref());

        if let Some(shared) = &self.ai_response_cache {
            if let Some(verdict) = shared.lock().await.get(&key) {
                debug!("AI response cache hit for {:?} vs {:?}", query, candidate_name);
                return Some(verdict);
            }
        }

        let context_opt = if context.is_empty() { None } else { Some(context) };
        match timeout(
            Duration::from_millis(self.config.ai_timeout_ms),
            self.ai.evaluate(query, candidate_name, context_opt),
        )
        .await
        {
            Ok(Ok(verdict)) => {
                if let Some(shared) = &self.ai_response_cache {
                    shared.lock().await.put(key, verdict.clone());
                }
                Some(verdict)
            }
            Ok(Err(e)) => {
                warn!("AI collaborator failed for {:?} vs {:?}: {}", query, candidate_name, e);
                None
            }
            Err(_) => {
                warn!(
                    "{}",
                    MatchError::CollaboratorTimeout {
                        collaborator: "ai",
                        timeout_ms: self.config.ai_timeout_ms,
                    }
                );
                None
            }
        }
    }
}
