//! Error taxonomy of a reconciliation run and its retry classification.

use std::fmt;

use odg_api::ApiError;

use crate::extractor::ExtractError;
use crate::payload::PayloadError;

/// HTTP status codes from the remote service which are not worth retrying.
pub const NON_RETRYABLE_STATUS_CODES: &[u16] = &[500];

/// Whether a failed run should be retried by the scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Retry {
    Retryable,
    SkipRetry,
}

impl fmt::Display for Retry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Retryable => f.write_str("retryable"),
            Self::SkipRetry => f.write_str("skip-retry"),
        }
    }
}

/// Step of a run in which a remote call failed or the run was cancelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Extracting,
    QueryingFindings,
    DeletingFindings,
    QueryingRuntimeArtefacts,
    DeletingRuntimeArtefacts,
    SubmittingFindings,
    SubmittingRuntimeArtefacts,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Extracting => "extracting",
            Self::QueryingFindings => "querying findings",
            Self::DeletingFindings => "deleting findings",
            Self::QueryingRuntimeArtefacts => "querying runtime artefacts",
            Self::DeletingRuntimeArtefacts => "deleting runtime artefacts",
            Self::SubmittingFindings => "submitting findings",
            Self::SubmittingRuntimeArtefacts => "submitting runtime artefacts",
        };
        f.write_str(name)
    }
}

/// Errors aborting a reconciliation run.
#[derive(Debug, thiserror::Error)]
pub enum ReconcileError {
    #[error("invalid payload: {0}")]
    Validation(#[from] PayloadError),

    #[error("extraction failed: {0}")]
    Extraction(#[from] ExtractError),

    #[error("remote call failed while {stage}: {source}")]
    Remote {
        stage: Stage,
        #[source]
        source: ApiError,
    },

    #[error("cancelled while {stage}")]
    Cancelled { stage: Stage },
}

impl ReconcileError {
    /// Creates a new `Remote` error.
    #[must_use]
    pub fn remote(stage: Stage, source: ApiError) -> Self {
        Self::Remote { stage, source }
    }

    /// Creates a new `Cancelled` error.
    #[must_use]
    pub fn cancelled(stage: Stage) -> Self {
        Self::Cancelled { stage }
    }

    /// Classifies the error for the scheduler.
    pub fn retry(&self) -> Retry {
        match self {
            Self::Validation(_) => Retry::SkipRetry,
            Self::Extraction(e) if e.is_permanent() => Retry::SkipRetry,
            Self::Extraction(_) => Retry::Retryable,
            Self::Remote { source, .. } => classify_api_error(source),
            Self::Cancelled { .. } => Retry::Retryable,
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.retry() == Retry::Retryable
    }
}

/// Classifies a remote failure. Only denylisted status codes skip retries.
pub fn classify_api_error(err: &ApiError) -> Retry {
    match err.status_code() {
        Some(code) if NON_RETRYABLE_STATUS_CODES.contains(&code) => Retry::SkipRetry,
        _ => Retry::Retryable,
    }
}
