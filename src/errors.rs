// src/errors.rs
use thiserror::Error;

/// Error taxonomy for the resolution pipeline.
///
/// Only `Validation` is surfaced to the caller as a rejected request. The
/// collaborator and cache variants exist so call sites can log the concrete
/// failure and then degrade: the affected tier's signal is treated as absent
/// and the pipeline continues with whatever confidence the remaining signals
/// yield.
#[derive(Debug, Error)]
pub enum MatchError {
    #[error("invalid query: {0}")]
    Validation(String),

    #[error("{collaborator} call timed out after {timeout_ms}ms")]
    CollaboratorTimeout {
        collaborator: &'static str,
        timeout_ms: u64,
    },

    #[error("{collaborator} unavailable: {source}")]
    CollaboratorUnavailable {
        collaborator: &'static str,
        #[source]
        source: anyhow::Error,
    },

    #[error("cache store unavailable: {0}")]
    CacheUnavailable(#[source] anyhow::Error),
}

impl MatchError {
    pub fn unavailable(collaborator: &'static str, source: impl Into<anyhow::Error>) -> Self {
        MatchError::CollaboratorUnavailable {
            collaborator,
            source: source.into(),
        }
    }
}
