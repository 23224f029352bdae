//! API request and response types.

use serde::{Deserialize, Serialize};

use crate::agent::{ErrorClass, InvestigationOutcome};

/// Request to investigate a query.
#[derive(Debug, Clone, Deserialize)]
pub struct InvestigateRequest {
    /// The user's question. Missing is treated as empty.
    #[serde(default)]
    pub query: Option<String>,
}

/// Response to an investigation: an answer or an error, never both.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum InvestigateResponse {
    /// The synthesized answer
    Ok { answer: String },
    /// Processing failed or the query was rejected
    Error { error: ErrorBody },
}

/// Structured error details.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ErrorBody {
    /// Human-readable message
    pub message: String,

    /// `empty_query` or `processing_error`
    pub class: ErrorClass,

    /// Terminal condition, e.g. `iteration_limit_exceeded`
    pub kind: String,
}

impl From<InvestigationOutcome> for InvestigateResponse {
    fn from(outcome: InvestigationOutcome) -> Self {
        match outcome {
            InvestigationOutcome::Answer { text } => Self::Ok { answer: text },
            InvestigationOutcome::Error {
                message,
                class,
                kind,
            } => Self::Error {
                error: ErrorBody {
                    message,
                    class,
                    kind: kind.to_string(),
                },
            },
        }
    }
}

/// Health check response.
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// Service status
    pub status: String,

    /// Service version
    pub version: String,

    /// Model identifier in use
    pub model: String,
}
