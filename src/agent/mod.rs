//! Agent module - the reasoning-loop controller.
//!
//! The agent follows a "think, act, observe" pattern:
//! 1. Render the composed prompt with the query and the steps so far
//! 2. Call the model and parse its output against the reasoning grammar
//! 3. If the model picked a tool, run it and record the observation
//! 4. Repeat until the model gives a final answer or the iteration cap is hit

mod agent_loop;
mod failure;
mod parser;
mod prompt;
mod state;
mod synthesizer;

pub use agent_loop::{Agent, AgentOptions, Investigation};
pub use failure::{AgentError, ErrorClass, InvestigationOutcome, StepFault};
pub use parser::{parse_step, ParsedStep};
pub use prompt::{
    build_research_prompt, compose, persona_rules, ComposedPrompt, REASONING_FORMAT,
    TERM_EXPANSIONS,
};
pub use state::{AgentState, ReasoningStep, StepAction};
pub use synthesizer::{extract, FinalAnswer};
