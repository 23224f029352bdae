//! Fault taxonomy and the per-query failure boundary.
//!
//! Recoverable faults ([`StepFault`]) become observations and never leave the
//! loop. Terminal faults ([`AgentError`]) end the query and are converted to a
//! structured [`InvestigationOutcome::Error`] at the boundary.

use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use crate::llm::LlmError;

use super::agent_loop::Investigation;

/// Terminal conditions for one query.
#[derive(Debug, Error)]
pub enum AgentError {
    #[error("The query is empty")]
    EmptyQuery,

    #[error("No final answer after {iterations} iterations")]
    IterationLimitExceeded { iterations: usize },

    #[error("The reasoning loop finished without a final answer")]
    MissingFinalAnswer,

    #[error("Language model unavailable: {0}")]
    ModelUnavailable(#[from] LlmError),

    #[error("The investigation was cancelled")]
    Cancelled,
}

impl AgentError {
    /// Caller-facing error class.
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::EmptyQuery => ErrorClass::EmptyQuery,
            _ => ErrorClass::ProcessingError,
        }
    }

    /// Machine-readable name of the terminal condition.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::EmptyQuery => "empty_query",
            Self::IterationLimitExceeded { .. } => "iteration_limit_exceeded",
            Self::MissingFinalAnswer => "missing_final_answer",
            Self::ModelUnavailable(_) => "model_unavailable",
            Self::Cancelled => "cancelled",
        }
    }
}

/// Whether the caller's input or the processing was at fault.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorClass {
    EmptyQuery,
    ProcessingError,
}

/// Result of `investigate`: an answer or a structured error, never both.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvestigationOutcome {
    Answer {
        text: String,
    },
    Error {
        message: String,
        class: ErrorClass,
        kind: &'static str,
    },
}

impl InvestigationOutcome {
    pub fn is_answer(&self) -> bool {
        matches!(self, Self::Answer { .. })
    }

    pub fn from_error(err: &AgentError) -> Self {
        Self::Error {
            message: err.to_string(),
            class: err.class(),
            kind: err.kind(),
        }
    }
}

/// Recoverable faults inside one iteration.
#[derive(Debug, Error)]
pub enum StepFault {
    #[error("{name} is not a valid tool, try one of [{available}].")]
    UnknownTool { name: String, available: String },

    #[error("Invalid Format: {reason}. Please follow the Thought/Action/Action Input grammar, or give a Final Answer.")]
    MalformedStep { reason: String },

    #[error("Tool {tool} failed: {message}")]
    ToolInvocation { tool: String, message: String },

    #[error("Tool {tool} timed out after {secs} seconds")]
    ToolTimeout { tool: String, secs: u64 },
}

impl StepFault {
    /// Observation text fed back to the model.
    pub fn observation(&self) -> String {
        let text = self.to_string();
        tracing::warn!("Recoverable step fault: {}", text);
        text
    }
}

/// Convert a finished run into the caller-facing outcome, logging failures.
pub(crate) fn into_outcome(
    id: Uuid,
    result: Result<Investigation, AgentError>,
) -> InvestigationOutcome {
    match result {
        Ok(investigation) => {
            tracing::info!(
                "Investigation {} answered after {} iterations ({} tool steps)",
                id,
                investigation.iterations,
                investigation.state.tool_steps()
            );
            InvestigationOutcome::Answer {
                text: investigation.answer.into_string(),
            }
        }
        Err(AgentError::EmptyQuery) => {
            tracing::info!("Investigation {} rejected: empty query", id);
            InvestigationOutcome::from_error(&AgentError::EmptyQuery)
        }
        Err(err) => {
            tracing::error!("Investigation {} failed ({}): {}", id, err.kind(), err);
            InvestigationOutcome::from_error(&err)
        }
    }
}
