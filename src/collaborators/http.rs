// src/collaborators/http.rs - reqwest-backed collaborator clients
use async_trait::async_trait;
use log::debug;
use serde::Serialize;
use std::time::Duration;
use url::Url;

use crate::collaborators::{AiDisambiguator, AiVerdict, CandidateSearch, EvidenceVerdict, WebEvidence};
use crate::errors::MatchError;
use crate::matching::confidence::QueryContext;
use crate::models::Candidate;

fn map_reqwest_error(collaborator: &'static str, timeout: Duration, e: reqwest::Error) -> MatchError {
    if e.is_timeout() {
        MatchError::CollaboratorTimeout {
            collaborator,
            timeout_ms: timeout.as_millis() as u64,
        }
    } else {
        MatchError::unavailable(collaborator, e)
    }
}

/// Client for the candidate search service.
pub struct HttpCandidateSearch {
    client: reqwest::Client,
    endpoint: Url,
    timeout: Duration,
}

impl HttpCandidateSearch {
    pub fn new(endpoint: Url, timeout: Duration) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint,
            timeout,
        }
    }
}

#[derive(Serialize)]
struct SearchRequest<'a> {
    query: &'a str,
    limit: usize,
}

#[async_trait]
impl CandidateSearch for HttpCandidateSearch {
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<Candidate>, MatchError> {
        debug!("Search request: {:?} (limit {})", query, limit);
        let response = self
            .client
            .post(self.endpoint.clone())
            .timeout(self.timeout)
            .json(&SearchRequest { query, limit })
            .send()
            .await
            .map_err(|e| map_reqwest_error("search", self.timeout, e))?
            .error_for_status()
            .map_err(|e| MatchError::unavailable("search", e))?;

        response
            .json::<Vec<Candidate>>()
            .await
            .map_err(|e| MatchError::unavailable("search", e))
    }
}

/// Client for the AI disambiguation service.
pub struct HttpAiDisambiguator {
    client: reqwest::Client,
    endpoint: Url,
    timeout: Duration,
}

impl HttpAiDisambiguator {
    pub fn new(endpoint: Url, timeout: Duration) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint,
            timeout,
        }
    }
}

#[derive(Serialize)]
struct EvaluateRequest<'a> {
    name_a: &'a str,
    name_b: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    industry: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    region: Option<&'a str>,
}

#[async_trait]
impl AiDisambiguator for HttpAiDisambiguator {
    async fn evaluate(
        &self,
        name_a: &str,
        name_b: &str,
        context: Option<&QueryContext>,
    ) -> Result<AiVerdict, MatchError> {
        debug!("AI evaluate request: {:?} vs {:?}", name_a, name_b);
        let request = EvaluateRequest {
            name_a,
            name_b,
            industry: context.and_then(|c| c.industry.as_deref()),
            region: context.and_then(|c| c.region.as_deref()),
        };

        let response = self
            .client
            .post(self.endpoint.clone())
            .timeout(self.timeout)
            .json(&request)
            .send()
            .await
            .map_err(|e| map_reqwest_error("ai", self.timeout, e))?
            .error_for_status()
            .map_err(|e| MatchError::unavailable("ai", e))?;

        response
            .json::<AiVerdict>()
            .await
            .map_err(|e| MatchError::unavailable("ai", e))
    }
}

/// Client for the web-evidence verification service.
pub struct HttpWebEvidence {
    client: reqwest::Client,
    endpoint: Url,
    timeout: Duration,
}

impl HttpWebEvidence {
    pub fn new(endpoint: Url, timeout: Duration) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint,
            timeout,
        }
    }
}

#[derive(Serialize)]
struct VerifyRequest<'a> {
    name_a: &'a str,
    name_b: &'a str,
}

#[async_trait]
impl WebEvidence for HttpWebEvidence {
    async fn verify(&self, name_a: &str, name_b: &str) -> Result<EvidenceVerdict, MatchError> {
        debug!("Web evidence request: {:?} vs {:?}", name_a, name_b);
        let response = self
            .client
            .post(self.endpoint.clone())
            .timeout(self.timeout)
            .json(&VerifyRequest { name_a, name_b })
            .send()
            .await
            .map_err(|e| map_reqwest_error("web_evidence", self.timeout, e))?
            .error_for_status()
            .map_err(|e| MatchError::unavailable("web_evidence", e))?;

        response
            .json::<EvidenceVerdict>()
            .await
            .map_err(|e| MatchError::unavailable("web_evidence", e))
    }
}
