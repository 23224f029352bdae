//! Extraction of the final answer from a terminal reasoning state.

use std::fmt;

use super::failure::AgentError;
use super::state::AgentState;

/// The synthesized answer returned to the caller. Never empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FinalAnswer(String);

impl FinalAnswer {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for FinalAnswer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Read the finish payload of the latest step.
///
/// # Errors
///
/// `AgentError::MissingFinalAnswer` when the latest step is not a finish step
/// or its payload is blank.
pub fn extract(state: &AgentState) -> Result<FinalAnswer, AgentError> {
    state
        .last()
        .filter(|step| step.is_finish())
        .map(|step| step.action_input.trim())
        .filter(|answer| !answer.is_empty())
        .map(|answer| FinalAnswer(answer.to_string()))
        .ok_or(AgentError::MissingFinalAnswer)
}
