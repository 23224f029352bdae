//! Per-query reasoning state.

use std::fmt;

/// What a reasoning step did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepAction {
    /// Invoked (or tried to invoke) the named tool.
    Tool(String),
    /// Produced the final answer.
    Finish,
    /// The model output did not follow the grammar.
    Invalid,
}

impl fmt::Display for StepAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Tool(name) => write!(f, "{}", name),
            Self::Finish => write!(f, "Final Answer"),
            Self::Invalid => write!(f, "_Invalid"),
        }
    }
}

/// One think/act/observe cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReasoningStep {
    /// Free-text rationale; the raw model output for invalid steps.
    pub thought: String,
    pub action: StepAction,
    /// Tool input, or the answer text for a finish step.
    pub action_input: String,
    /// Tool output or a description of what went wrong. Empty for finish steps.
    pub observation: String,
}

impl ReasoningStep {
    pub fn tool(
        thought: impl Into<String>,
        tool: impl Into<String>,
        input: impl Into<String>,
        observation: impl Into<String>,
    ) -> Self {
        Self {
            thought: thought.into(),
            action: StepAction::Tool(tool.into()),
            action_input: input.into(),
            observation: observation.into(),
        }
    }

    pub fn finish(thought: impl Into<String>, answer: impl Into<String>) -> Self {
        Self {
            thought: thought.into(),
            action: StepAction::Finish,
            action_input: answer.into(),
            observation: String::new(),
        }
    }

    pub fn invalid(raw_output: impl Into<String>, observation: impl Into<String>) -> Self {
        Self {
            thought: raw_output.into(),
            action: StepAction::Invalid,
            action_input: String::new(),
            observation: observation.into(),
        }
    }

    pub fn is_finish(&self) -> bool {
        self.action == StepAction::Finish
    }

    /// Render the step in the grammar the model writes.
    fn write_to(&self, out: &mut String) {
        out.push_str("Thought: ");
        out.push_str(self.thought.trim());
        out.push('\n');
        match &self.action {
            StepAction::Tool(name) => {
                out.push_str("Action: ");
                out.push_str(name);
                out.push_str("\nAction Input: ");
                out.push_str(&self.action_input);
                out.push('\n');
            }
            StepAction::Finish => {
                out.push_str("Final Answer: ");
                out.push_str(&self.action_input);
                out.push('\n');
                return;
            }
            StepAction::Invalid => {}
        }
        out.push_str("Observation: ");
        out.push_str(self.observation.trim());
        out.push('\n');
    }
}

/// Append-only log of the steps taken for one query.
#[derive(Debug, Clone, Default)]
pub struct AgentState {
    steps: Vec<ReasoningStep>,
}

impl AgentState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, step: ReasoningStep) {
        self.steps.push(step);
    }

    pub fn steps(&self) -> &[ReasoningStep] {
        &self.steps
    }

    pub fn last(&self) -> Option<&ReasoningStep> {
        self.steps.last()
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Whether the latest step produced the final answer.
    pub fn is_finished(&self) -> bool {
        self.last().is_some_and(ReasoningStep::is_finish)
    }

    /// Number of steps that invoked (or tried to invoke) a tool.
    pub fn tool_steps(&self) -> usize {
        self.steps
            .iter()
            .filter(|s| matches!(s.action, StepAction::Tool(_)))
            .count()
    }

    /// Serialize the steps for the `{agent_scratchpad}` slot.
    pub fn scratchpad(&self) -> String {
        let mut out = String::new();
        for step in &self.steps {
            step.write_to(&mut out);
        }
        out
    }
}
