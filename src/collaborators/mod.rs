// src/collaborators/mod.rs - Narrow interfaces to the external verification services
pub mod http;
pub mod response_cache;

use async_trait::async_trait;
use serde::Deserialize;

use crate::errors::MatchError;
use crate::matching::confidence::QueryContext;
use crate::models::Candidate;

/// Text-index search over the candidate entity set.
#[async_trait]
pub trait CandidateSearch: Send + Sync {
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<Candidate>, MatchError>;
}

/// Verdict from the AI disambiguation service for one name pair.
#[derive(Debug, Clone, Deserialize)]
pub struct AiVerdict {
    pub confidence: f64,
    pub rationale: String,
    #[serde(default)]
    pub token_usage: Option<u32>,
}

/// Expensive, possibly unreliable remote judgement of whether two names
/// denote one entity. Must be callable with a timeout and fail closed: on
/// error the caller treats the factor as absent.
#[async_trait]
pub trait AiDisambiguator: Send + Sync {
    async fn evaluate(
        &self,
        name_a: &str,
        name_b: &str,
        context: Option<&QueryContext>,
    ) -> Result<AiVerdict, MatchError>;
}

/// Verdict from the web-evidence service.
#[derive(Debug, Clone, Deserialize)]
pub struct EvidenceVerdict {
    pub confidence: f64,
    pub evidence: String,
}

/// External verification against canonical web sources. Same failure
/// contract as the AI collaborator.
#[async_trait]
pub trait WebEvidence: Send + Sync {
    async fn verify(&self, name_a: &str, name_b: &str) -> Result<EvidenceVerdict, MatchError>;
}
