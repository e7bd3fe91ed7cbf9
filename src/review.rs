// src/review.rs - Queue for decisions that exhausted every tier inconclusively
use chrono::{DateTime, Utc};
use log::info;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::models::MatchDecision;

/// One decision awaiting a human verdict.
#[derive(Debug, Clone)]
pub struct ReviewItem {
    pub id: Uuid,
    pub decision: MatchDecision,
    pub queued_at: DateTime<Utc>,
}

/// In-process queue of `Review` decisions. Every inconclusive decision
/// lands here; nothing is silently resolved to a guess or dropped.
#[derive(Default)]
pub struct ReviewQueue {
    items: Mutex<Vec<ReviewItem>>,
}

impl ReviewQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn push(&self, decision: MatchDecision) -> Uuid {
        let item = ReviewItem {
            id: Uuid::new_v4(),
            decision,
            queued_at: Utc::now(),
        };
        let id = item.id;
        let mut items = self.items.lock().await;
        items.push(item);
        info!(
            "Queued decision for human review (queue depth now {})",
            items.len()
        );
        id
    }

    /// Hand the queued items to the operator, emptying the queue.
    pub async fn drain(&self) -> Vec<ReviewItem> {
        let mut items = self.items.lock().await;
        std::mem::take(&mut *items)
    }

    pub async fn len(&self) -> usize {
        self.items.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.items.lock().await.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Disposition, MatchTier, MatchType};

    fn review_decision(query: &str) -> MatchDecision {
        MatchDecision {
            query: query.to_string(),
            matched_entity_id: Some("e1".to_string()),
            confidence: 0.7,
            match_type: MatchType::Semantic,
            tier_reached: MatchTier::WebEvidence,
            disposition: Disposition::Review,
            evidence: None,
        }
    }

    #[tokio::test]
    async fn test_push_and_drain() {
        let queue = ReviewQueue::new();
        assert!(queue.is_empty().await);

        queue.push(review_decision("acme")).await;
        queue.push(review_decision("apex")).await;
        assert_eq!(queue.len().await, 2);

        let drained = queue.drain().await;
        assert_eq!(drained.len(), 2);
        assert_eq!(drained[0].decision.query, "acme");
        assert!(queue.is_empty().await);
    }
}
