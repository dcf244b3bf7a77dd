//! Visit analysis pipeline: retrieval, generation, translation, extraction,
//! analysis, triage and follow-up, chained over injected collaborators.
//!
//! Stages run strictly in sequence on the calling thread. Each stage has a
//! [`FaultPolicy`], applied by [`Stage::settle`]: best-effort stages degrade
//! to a fixed result on failure, fail-fast stages propagate their error.

pub mod analysis;
pub mod chat;
pub mod extraction;
pub mod follow_up;
pub mod indexer;
pub mod json;
pub mod llm;
pub mod orchestrator;
pub mod prompt;
pub mod retrieval;
pub mod translate;
pub mod triage;
pub mod vectordb;

#[cfg(test)]
pub mod testing;

pub use orchestrator::*;

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use thiserror::Error;

use crate::db::DatabaseError;
use llm::{EmbeddingModel, LlmClient, LlmError, TranslationClient};
use vectordb::{VectorStore, VectorStoreError};

/// Message returned when follow-up is requested for a visit never saved.
pub const NO_PREVIOUS_VISIT: &str = "No previous visit found for this patient.";

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("{stage} failed: {source}")]
    Collaborator {
        stage: Stage,
        #[source]
        source: LlmError,
    },

    #[error("Structured extraction failed: {0}")]
    Extraction(String),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("{0}")]
    VectorStore(#[from] VectorStoreError),

    #[error("{0}")]
    NotFound(String),

    #[error("Deadline expired before {stage}")]
    Cancelled { stage: Stage },

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

/// How a stage reacts to collaborator failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultPolicy {
    /// Log and return a degraded result.
    BestEffort,
    /// Propagate the error to the caller.
    FailFast,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Retrieval,
    Indexing,
    Generation,
    Translation,
    Extraction,
    Analysis,
    Triage,
    FollowUp,
}

impl Stage {
    pub fn policy(self) -> FaultPolicy {
        match self {
            Self::Retrieval | Self::Translation | Self::Triage => FaultPolicy::BestEffort,
            // Single chunks are skipped by the indexer; the stage as a whole
            // still reports deadline expiry.
            Self::Indexing
            | Self::Generation
            | Self::Extraction
            | Self::Analysis
            | Self::FollowUp => FaultPolicy::FailFast,
        }
    }

    /// Apply this stage's policy to a stage result. Best-effort stages log
    /// the error and substitute `fallback`; fail-fast stages propagate it.
    pub fn settle<T>(
        self,
        result: Result<T, PipelineError>,
        fallback: impl FnOnce(&PipelineError) -> T,
    ) -> Result<T, PipelineError> {
        match (result, self.policy()) {
            (Ok(value), _) => Ok(value),
            (Err(e), FaultPolicy::BestEffort) => {
                tracing::warn!(stage = %self, error = %e, "Stage failed, continuing with fallback");
                Ok(fallback(&e))
            }
            (Err(e), FaultPolicy::FailFast) => Err(e),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Retrieval => "retrieval",
            Self::Indexing => "indexing",
            Self::Generation => "generation",
            Self::Translation => "translation",
            Self::Extraction => "extraction",
            Self::Analysis => "analysis",
            Self::Triage => "triage",
            Self::FollowUp => "follow-up",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Overall time budget of one pipeline call.
///
/// Checked before every collaborator invocation; per-request HTTP timeouts
/// live on the adapters themselves.
#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    expires_at: Instant,
}

impl Deadline {
    pub fn after(budget: Duration) -> Self {
        Self {
            expires_at: Instant::now() + budget,
        }
    }

    /// A deadline that has already passed.
    pub fn expired() -> Self {
        Self {
            expires_at: Instant::now(),
        }
    }

    pub fn is_expired(&self) -> bool {
        Instant::now() >= self.expires_at
    }

    /// Gate a collaborator call for `stage`.
    pub fn check(&self, stage: Stage) -> Result<(), PipelineError> {
        if self.is_expired() {
            tracing::warn!(stage = %stage, policy = ?stage.policy(), "Pipeline deadline expired");
            Err(PipelineError::Cancelled { stage })
        } else {
            Ok(())
        }
    }
}

/// External services the pipeline calls, injected at construction.
#[derive(Clone)]
pub struct Collaborators {
    pub llm: Arc<dyn LlmClient>,
    pub embedder: Arc<dyn EmbeddingModel>,
    pub vectors: Arc<dyn VectorStore>,
    pub translator: Arc<dyn TranslationClient>,
}
