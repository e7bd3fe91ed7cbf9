// src/matching/manager.rs - Concurrent batch resolution coordination
use anyhow::Result;
use futures::future::join_all;
use indicatif::{ProgressBar, ProgressStyle};
use log::warn;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Semaphore;

use crate::errors::MatchError;
use crate::matching::confidence::QueryContext;
use crate::matching::orchestrator::MatchOrchestrator;
use crate::models::{Disposition, MatchDecision};
use crate::utils::logging::ResolutionLogger;

/// Aggregate outcome of one batch run.
#[derive(Debug, Clone, Default)]
pub struct BatchStats {
    pub total: usize,
    pub matched: usize,
    pub review: usize,
    pub no_match: usize,
    pub rejected: usize,
    pub avg_confidence: f64,
    pub elapsed_secs: f64,
}

/// Resolve many independent queries concurrently.
///
/// Queries have no ordering requirement between them, so they fan out under
/// a semaphore; each query's pipeline stays strictly sequential inside the
/// orchestrator. A query rejected by validation is counted, logged, and does
/// not abort the batch.
pub async fn run_batch_resolution(
    orchestrator: Arc<MatchOrchestrator>,
    queries: Vec<String>,
    context: QueryContext,
    max_concurrent: usize,
) -> Result<(Vec<MatchDecision>, BatchStats)> {
    let logger = ResolutionLogger::new();
    let start = Instant::now();
    logger.log_start(queries.len(), max_concurrent);

    let pb = ProgressBar::new(queries.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("  🔎 [{elapsed_precise}] {bar:30.green/blue} {pos}/{len} Resolving queries...")
            .unwrap()
            .progress_chars("█▉▊▋▌▍▎▏  "),
    );

    let semaphore = Arc::new(Semaphore::new(max_concurrent.max(1)));
    let mut handles = Vec::with_capacity(queries.len());

    for query in queries {
        let orchestrator = Arc::clone(&orchestrator);
        let semaphore = Arc::clone(&semaphore);
        let context = context.clone();
        let pb = pb.clone();

        handles.push(tokio::spawn(async move {
            let _permit = semaphore
                .acquire()
                .await
                .expect("semaphore is never closed");
            let result = orchestrator.resolve(&query, &context).await;
            pb.inc(1);
            (query, result)
        }));
    }

    let mut decisions = Vec::new();
    let mut stats = BatchStats::default();
    let mut confidence_sum = 0.0;

    for handle in join_all(handles).await {
        let (query, result) = match handle {
            Ok(output) => output,
            Err(e) => {
                warn!("Resolution task panicked: {}", e);
                continue;
            }
        };
        stats.total += 1;

        match result {
            Ok(decision) => {
                match decision.disposition {
                    Disposition::Matched => stats.matched += 1,
                    Disposition::Review => stats.review += 1,
                    Disposition::NoMatch => stats.no_match += 1,
                }
                confidence_sum += decision.confidence;
                decisions.push(decision);
            }
            Err(MatchError::Validation(reason)) => {
                warn!("Rejected query {:?}: {}", query, reason);
                stats.rejected += 1;
            }
            Err(e) => {
                // The orchestrator degrades every non-validation failure
                // internally; reaching here means a contract was broken.
                warn!("Unexpected resolution error for {:?}: {}", query, e);
                stats.rejected += 1;
            }
        }
    }

    pb.finish_with_message("Batch resolution complete");

    let resolved = decisions.len();
    stats.avg_confidence = if resolved > 0 {
        confidence_sum / resolved as f64
    } else {
        0.0
    };
    stats.elapsed_secs = start.elapsed().as_secs_f64();

    logger.log_completion(stats.matched, stats.review, stats.no_match, stats.avg_confidence);
    Ok((decisions, stats))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::store::InMemoryEntryStore;
    use crate::cache::ExactMatchCache;
    use crate::collaborators::{
        AiDisambiguator, AiVerdict, CandidateSearch, EvidenceVerdict, WebEvidence,
    };
    use crate::matching::confidence::WeightRegistry;
    use crate::models::Candidate;
    use crate::review::ReviewQueue;
    use crate::utils::config::MatcherConfig;
    use anyhow::anyhow;
    use async_trait::async_trait;

    struct PrefixSearch;

    #[async_trait]
    impl CandidateSearch for PrefixSearch {
        async fn search(&self, query: &str, _limit: usize) -> Result<Vec<Candidate>, MatchError> {
            if query.to_lowercase().starts_with("acme") {
                Ok(vec![Candidate {
                    entity_id: "acme-1".to_string(),
                    display_name: "Acme Corporation".to_string(),
                    relevance: 0.95,
                    industry: None,
                    region: None,
                }])
            } else {
                Ok(Vec::new())
            }
        }
    }

    struct NoAi;

    #[async_trait]
    impl AiDisambiguator for NoAi {
        async fn evaluate(
            &self,
            _name_a: &str,
            _name_b: &str,
            _context: Option<&QueryContext>,
        ) -> Result<AiVerdict, MatchError> {
            Err(MatchError::unavailable("ai", anyhow!("disabled in test")))
        }
    }

    struct NoWeb;

    #[async_trait]
    impl WebEvidence for NoWeb {
        async fn verify(&self, _name_a: &str, _name_b: &str) -> Result<EvidenceVerdict, MatchError> {
            Err(MatchError::unavailable("web_evidence", anyhow!("disabled in test")))
        }
    }

    #[tokio::test]
    async fn test_batch_counts_dispositions_and_rejections() {
        let config = MatcherConfig::default();
        let cache = Arc::new(ExactMatchCache::new(
            Arc::new(InMemoryEntryStore::new()),
            config.cache_enabled,
            config.cache_min_confidence,
            config.cache_max_entries_per_entity,
        ));
        let orchestrator = Arc::new(MatchOrchestrator::new(
            Arc::new(PrefixSearch),
            Arc::new(NoAi),
            Arc::new(NoWeb),
            cache,
            Arc::new(ReviewQueue::new()),
            config,
            WeightRegistry::builtin().get("standard").unwrap().clone(),
        ));

        let queries = vec![
            "Acme Corp".to_string(),
            "Unknown Entity".to_string(),
            "   ".to_string(),
        ];
        let (decisions, stats) =
            run_batch_resolution(orchestrator, queries, QueryContext::default(), 4)
                .await
                .unwrap();

        assert_eq!(stats.total, 3);
        assert_eq!(stats.matched, 1);
        assert_eq!(stats.no_match, 1);
        assert_eq!(stats.rejected, 1);
        assert_eq!(decisions.len(), 2);
        assert!(stats.avg_confidence > 0.0);
    }
}
