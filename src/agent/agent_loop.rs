//! Core reasoning loop implementation.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::Instrument;
use uuid::Uuid;

use crate::config::{Config, DEFAULT_MAX_ITERATIONS};
use crate::llm::{GeminiClient, LlmClient, LlmError};
use crate::tools::{ToolLookup, ToolRegistry};

use super::failure::{into_outcome, AgentError, InvestigationOutcome, StepFault};
use super::parser::{parse_step, ParsedStep};
use super::prompt::{build_research_prompt, ComposedPrompt};
use super::state::{AgentState, ReasoningStep};
use super::synthesizer::{self, FinalAnswer};

/// Limits applied to every investigation.
#[derive(Debug, Clone)]
pub struct AgentOptions {
    /// Maximum number of model calls per query.
    pub max_iterations: usize,
    /// Timeout for a single model call.
    pub model_timeout: Duration,
    /// Timeout for a single tool call.
    pub tool_timeout: Duration,
}

impl Default for AgentOptions {
    fn default() -> Self {
        Self {
            max_iterations: DEFAULT_MAX_ITERATIONS,
            model_timeout: Duration::from_secs(120),
            tool_timeout: Duration::from_secs(30),
        }
    }
}

impl From<&Config> for AgentOptions {
    fn from(config: &Config) -> Self {
        Self {
            max_iterations: config.max_iterations,
            model_timeout: config.model_timeout,
            tool_timeout: config.tool_timeout,
        }
    }
}

/// A successful run: the answer plus the trace that produced it.
#[derive(Debug, Clone)]
pub struct Investigation {
    pub id: Uuid,
    pub answer: FinalAnswer,
    pub state: AgentState,
    /// Number of model calls made.
    pub iterations: usize,
}

enum LoopState {
    Thinking,
    Acting {
        thought: String,
        tool: String,
        input: String,
    },
    Observing(ReasoningStep),
    Finishing {
        thought: String,
        answer: String,
    },
    Done(FinalAnswer),
    Failed(AgentError),
}

/// The research agent.
///
/// Immutable after construction: the prompt is composed once and the agent is
/// shared across concurrent queries, each of which owns its own state.
pub struct Agent {
    llm: Arc<dyn LlmClient>,
    tools: ToolRegistry,
    prompt: ComposedPrompt,
    options: AgentOptions,
}

impl Agent {
    /// Create an agent with the research persona over `tools`.
    pub fn new(llm: Arc<dyn LlmClient>, tools: ToolRegistry, options: AgentOptions) -> Self {
        let prompt = build_research_prompt(&tools);
        Self::with_prompt(llm, tools, prompt, options)
    }

    /// Create an agent with a pre-composed prompt.
    pub fn with_prompt(
        llm: Arc<dyn LlmClient>,
        tools: ToolRegistry,
        prompt: ComposedPrompt,
        options: AgentOptions,
    ) -> Self {
        Self {
            llm,
            tools,
            prompt,
            options,
        }
    }

    /// Build the production agent: Gemini plus the default research tools.
    pub fn from_config(config: &Config) -> Result<Self, LlmError> {
        let llm = Arc::new(GeminiClient::new(config.llm.clone())?);
        let tools = ToolRegistry::research_defaults(&config.search);
        Ok(Self::new(llm, tools, AgentOptions::from(config)))
    }

    pub fn prompt(&self) -> &ComposedPrompt {
        &self.prompt
    }

    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    pub fn options(&self) -> &AgentOptions {
        &self.options
    }

    pub fn model_name(&self) -> &str {
        self.llm.model_name()
    }

    /// Answer `query`, converting every failure into a structured error.
    pub async fn investigate(&self, query: &str) -> InvestigationOutcome {
        self.investigate_with_cancel(query, &CancellationToken::new())
            .await
    }

    /// Like [`Agent::investigate`], stopping between iterations once `cancel` fires.
    pub async fn investigate_with_cancel(
        &self,
        query: &str,
        cancel: &CancellationToken,
    ) -> InvestigationOutcome {
        let id = Uuid::new_v4();
        let span = tracing::info_span!("investigation", %id, query_len = query.len());
        async move { into_outcome(id, self.execute(id, query, cancel).await) }
            .instrument(span)
            .await
    }

    /// Run the loop and return the full trace on success.
    pub async fn run(
        &self,
        query: &str,
        cancel: &CancellationToken,
    ) -> Result<Investigation, AgentError> {
        let id = Uuid::new_v4();
        let span = tracing::info_span!("investigation", %id, query_len = query.len());
        self.execute(id, query, cancel).instrument(span).await
    }

    async fn execute(
        &self,
        id: Uuid,
        query: &str,
        cancel: &CancellationToken,
    ) -> Result<Investigation, AgentError> {
        let query = query.trim();
        if query.is_empty() {
            return Err(AgentError::EmptyQuery);
        }

        tracing::info!("Starting investigation with {} tools", self.tools.len());

        let mut state = AgentState::new();
        let mut iterations = 0;
        let mut current = LoopState::Thinking;

        loop {
            current = match current {
                LoopState::Thinking => {
                    if cancel.is_cancelled() {
                        LoopState::Failed(AgentError::Cancelled)
                    } else if iterations >= self.options.max_iterations {
                        LoopState::Failed(AgentError::IterationLimitExceeded { iterations })
                    } else {
                        iterations += 1;
                        tracing::debug!("Iteration {}", iterations);
                        self.think(query, &state).await
                    }
                }
                LoopState::Acting {
                    thought,
                    tool,
                    input,
                } => LoopState::Observing(self.act(thought, tool, input).await),
                LoopState::Observing(step) => {
                    state.push(step);
                    LoopState::Thinking
                }
                LoopState::Finishing { thought, answer } => {
                    state.push(ReasoningStep::finish(thought, answer));
                    match synthesizer::extract(&state) {
                        Ok(answer) => LoopState::Done(answer),
                        Err(e) => LoopState::Failed(e),
                    }
                }
                LoopState::Done(answer) => {
                    return Ok(Investigation {
                        id,
                        answer,
                        state,
                        iterations,
                    });
                }
                LoopState::Failed(e) => return Err(e),
            };
        }
    }

    /// Call the model and classify its output.
    async fn think(&self, query: &str, state: &AgentState) -> LoopState {
        let prompt = self.prompt.render(query, &state.scratchpad());

        let output = match tokio::time::timeout(
            self.options.model_timeout,
            self.llm.complete(&prompt),
        )
        .await
        {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => return LoopState::Failed(AgentError::ModelUnavailable(e)),
            Err(_) => {
                return LoopState::Failed(AgentError::ModelUnavailable(LlmError::Timeout(
                    self.options.model_timeout,
                )))
            }
        };

        match parse_step(&output) {
            ParsedStep::Act {
                thought,
                tool,
                input,
            } => LoopState::Acting {
                thought,
                tool,
                input,
            },
            ParsedStep::Finish { thought, answer } => LoopState::Finishing { thought, answer },
            ParsedStep::Think { thought } => {
                let fault = StepFault::MalformedStep {
                    reason: "Missing 'Action:' after 'Thought:'".to_string(),
                };
                LoopState::Observing(ReasoningStep::invalid(thought, fault.observation()))
            }
            ParsedStep::Malformed { raw, reason } => {
                let fault = StepFault::MalformedStep { reason };
                LoopState::Observing(ReasoningStep::invalid(raw, fault.observation()))
            }
        }
    }

    /// Invoke the selected tool; every failure becomes the observation.
    async fn act(&self, thought: String, tool: String, input: String) -> ReasoningStep {
        let observation = match self.tools.lookup(&tool) {
            ToolLookup::NotFound => StepFault::UnknownTool {
                name: tool.clone(),
                available: self.tools.names(),
            }
            .observation(),
            ToolLookup::Found(found) => {
                tracing::info!("Calling tool {} with input: {}", found.name(), input);
                match tokio::time::timeout(self.options.tool_timeout, found.execute(&input)).await
                {
                    Ok(Ok(output)) if output.trim().is_empty() => {
                        "The tool returned no output.".to_string()
                    }
                    Ok(Ok(output)) => output,
                    Ok(Err(e)) => StepFault::ToolInvocation {
                        tool: found.name().to_string(),
                        message: e.to_string(),
                    }
                    .observation(),
                    Err(_) => StepFault::ToolTimeout {
                        tool: found.name().to_string(),
                        secs: self.options.tool_timeout.as_secs(),
                    }
                    .observation(),
                }
            }
        };

        tracing::debug!("Observation: {}", truncate_for_log(&observation, 500));
        ReasoningStep::tool(thought, tool, input, observation)
    }
}

/// Truncate a string for logging purposes.
fn truncate_for_log(s: &str, max_len: usize) -> String {
    match s.char_indices().nth(max_len) {
        Some((idx, _)) => format!("{}... [truncated]", &s[..idx]),
        None => s.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;

    use super::*;
    use crate::agent::failure::ErrorClass;
    use crate::agent::state::StepAction;
    use crate::llm::ScriptedLlm;
    use crate::tools::Tool;

    /// Tool that counts calls and either echoes or fails.
    struct CountingTool {
        name: &'static str,
        fail: bool,
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl Tool for CountingTool {
        fn name(&self) -> &str {
            self.name
        }

        fn description(&self) -> &str {
            "counting stub"
        }

        async fn execute(&self, input: &str) -> anyhow::Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                Err(anyhow::anyhow!("upstream returned 502"))
            } else {
                Ok(format!("Fuente: DANE. Resultado para {}", input))
            }
        }
    }

    struct SlowTool;

    #[async_trait]
    impl Tool for SlowTool {
        fn name(&self) -> &str {
            "slow_search"
        }

        fn description(&self) -> &str {
            "never answers in time"
        }

        async fn execute(&self, _input: &str) -> anyhow::Result<String> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok("late".to_string())
        }
    }

    fn registry_with(tool: &'static str, fail: bool) -> (ToolRegistry, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut tools = ToolRegistry::new();
        tools
            .register(Arc::new(CountingTool {
                name: tool,
                fail,
                calls: calls.clone(),
            }))
            .unwrap();
        (tools, calls)
    }

    fn options(max_iterations: usize) -> AgentOptions {
        AgentOptions {
            max_iterations,
            ..AgentOptions::default()
        }
    }

    #[tokio::test]
    async fn empty_queries_are_rejected_before_any_call() {
        let llm = Arc::new(ScriptedLlm::repeating("Final Answer: 42"));
        let (tools, tool_calls) = registry_with("web_search", false);
        let agent = Agent::new(llm.clone(), tools, AgentOptions::default());

        for query in ["", "   ", "\n\t"] {
            let outcome = agent.investigate(query).await;
            assert_eq!(
                outcome,
                InvestigationOutcome::Error {
                    message: "The query is empty".into(),
                    class: ErrorClass::EmptyQuery,
                    kind: "empty_query",
                }
            );
        }
        assert_eq!(llm.calls(), 0);
        assert_eq!(tool_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn immediate_finish_answers_in_one_iteration() {
        let llm = Arc::new(ScriptedLlm::repeating(
            "Thought: I now know the final answer\nFinal Answer: 42",
        ));
        let (tools, _) = registry_with("web_search", false);
        let agent = Agent::new(llm.clone(), tools, AgentOptions::default());

        let run = agent
            .run("¿Cuánto es?", &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(run.answer.as_str(), "42");
        assert_eq!(run.iterations, 1);
        assert_eq!(llm.calls(), 1);

        let outcome = agent.investigate("¿Cuánto es?").await;
        assert_eq!(outcome, InvestigationOutcome::Answer { text: "42".into() });
    }

    #[tokio::test]
    async fn unknown_tool_forever_hits_the_cap() {
        let llm = Arc::new(ScriptedLlm::repeating(
            "Thought: try it\nAction: crystal_ball\nAction Input: Gini Lima 2010",
        ));
        let (tools, tool_calls) = registry_with("web_search", false);
        let agent = Agent::new(llm.clone(), tools, options(4));

        let err = agent
            .run("Gini de Lima", &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            AgentError::IterationLimitExceeded { iterations: 4 }
        ));
        assert_eq!(llm.calls(), 4);
        assert_eq!(tool_calls.load(Ordering::SeqCst), 0);

        // The model saw the correction on the following turn.
        let prompts = llm.prompts();
        assert!(prompts[1].contains(
            "Observation: crystal_ball is not a valid tool, try one of [web_search]."
        ));

        let outcome = agent.investigate("Gini de Lima").await;
        match outcome {
            InvestigationOutcome::Error { class, kind, .. } => {
                assert_eq!(class, ErrorClass::ProcessingError);
                assert_eq!(kind, "iteration_limit_exceeded");
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[tokio::test]
    async fn failing_tool_becomes_observation_and_loop_continues() {
        let llm = Arc::new(ScriptedLlm::new([
            "Thought: search\nAction: web_search\nAction Input: pobreza Quito 2015",
            "Thought: nothing found\nFinal Answer: No se encontraron datos.",
        ]));
        let (tools, tool_calls) = registry_with("web_search", true);
        let agent = Agent::new(llm.clone(), tools, AgentOptions::default());

        let run = agent
            .run("pobreza en Quito", &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(tool_calls.load(Ordering::SeqCst), 1);
        assert_eq!(run.state.tool_steps(), 1);
        assert_eq!(run.state.len(), 2);

        let step = &run.state.steps()[0];
        assert_eq!(step.action, StepAction::Tool("web_search".into()));
        assert_eq!(step.action_input, "pobreza Quito 2015");
        assert_eq!(step.observation, "Tool web_search failed: upstream returned 502");
        assert_eq!(run.answer.as_str(), "No se encontraron datos.");
    }

    #[tokio::test]
    async fn tool_output_reaches_next_prompt() {
        let llm = Arc::new(ScriptedLlm::new([
            "Thought: search\nAction: Web Search\nAction Input: \"Gini Bogotá 2012\"",
            "Final Answer: Según DANE, 0,497.",
        ]));
        let (tools, _) = registry_with("web_search", false);
        let agent = Agent::new(llm.clone(), tools, AgentOptions::default());

        let run = agent
            .run("Gini Bogotá", &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(run.iterations, 2);

        let prompts = llm.prompts();
        assert!(prompts[0].contains("Question: Gini Bogotá\nThought:"));
        assert!(prompts[1].contains(
            "Action Input: Gini Bogotá 2012\nObservation: Fuente: DANE. Resultado para Gini Bogotá 2012\nThought:"
        ));
    }

    #[tokio::test]
    async fn malformed_output_is_corrected_within_the_loop() {
        let llm = Arc::new(ScriptedLlm::new([
            "I think the answer involves housing.",
            "Action: web_search",
            "Final Answer: 7%",
        ]));
        let (tools, _) = registry_with("web_search", false);
        let agent = Agent::new(llm.clone(), tools, AgentOptions::default());

        let run = agent
            .run("déficit habitacional", &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(run.answer.as_str(), "7%");
        assert_eq!(run.iterations, 3);
        let actions: Vec<_> = run.state.steps().iter().map(|s| s.action.clone()).collect();
        assert_eq!(
            actions,
            vec![StepAction::Invalid, StepAction::Invalid, StepAction::Finish]
        );
        assert!(llm.prompts()[2].contains("Invalid Format: Missing 'Action Input:' after 'Action:'"));
    }

    #[tokio::test]
    async fn model_failure_is_terminal() {
        let llm = Arc::new(ScriptedLlm::from_results([Err(LlmError::AuthFailed {
            provider: "gemini".into(),
        })]));
        let (tools, _) = registry_with("web_search", false);
        let agent = Agent::new(llm, tools, AgentOptions::default());

        match agent.investigate("vivienda en Cali").await {
            InvestigationOutcome::Error { class, kind, message } => {
                assert_eq!(class, ErrorClass::ProcessingError);
                assert_eq!(kind, "model_unavailable");
                assert!(message.contains("Authentication failed"));
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn slow_tool_times_out_into_observation() {
        let llm = Arc::new(ScriptedLlm::new([
            "Action: slow_search\nAction Input: empleo Rosario",
            "Final Answer: sin datos",
        ]));
        let mut tools = ToolRegistry::new();
        tools.register(Arc::new(SlowTool)).unwrap();
        let agent = Agent::new(
            llm,
            tools,
            AgentOptions {
                tool_timeout: Duration::from_secs(2),
                ..AgentOptions::default()
            },
        );

        let run = agent
            .run("empleo en Rosario", &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(
            run.state.steps()[0].observation,
            "Tool slow_search timed out after 2 seconds"
        );
    }

    #[tokio::test]
    async fn cancelled_token_stops_before_the_model_is_called() {
        let llm = Arc::new(ScriptedLlm::repeating("Final Answer: 1"));
        let (tools, _) = registry_with("web_search", false);
        let agent = Agent::new(llm.clone(), tools, AgentOptions::default());

        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = agent.run("Gini", &cancel).await.unwrap_err();
        assert!(matches!(err, AgentError::Cancelled));
        assert_eq!(llm.calls(), 0);
    }

    /// Searches for whatever the question asks, then answers with it.
    struct EchoLlm {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl LlmClient for EchoLlm {
        async fn complete(&self, prompt: &str) -> Result<String, LlmError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::task::yield_now().await;

            let tail = prompt.rsplit("Question: ").next().unwrap_or_default();
            let question = tail.lines().next().unwrap_or_default();
            if tail.contains("Observation:") {
                Ok(format!("Final Answer: {}", question))
            } else {
                Ok(format!("Action: web_search\nAction Input: {}", question))
            }
        }

        fn model_name(&self) -> &str {
            "echo"
        }
    }

    #[tokio::test]
    async fn concurrent_queries_keep_separate_state() {
        let llm = Arc::new(EchoLlm {
            calls: AtomicUsize::new(0),
        });
        let (tools, tool_calls) = registry_with("web_search", false);
        let agent = Arc::new(Agent::new(llm.clone(), tools, AgentOptions::default()));

        let queries = ["desigualdad Quito", "pobreza Lima"];
        let handles: Vec<_> = queries
            .iter()
            .map(|query| {
                let agent = agent.clone();
                let query = query.to_string();
                tokio::spawn(async move { agent.run(&query, &CancellationToken::new()).await })
            })
            .collect();

        let mut runs = Vec::new();
        for handle in handles {
            runs.push(handle.await.unwrap().unwrap());
        }

        for (run, (own, other)) in runs
            .iter()
            .zip([(queries[0], queries[1]), (queries[1], queries[0])])
        {
            assert_eq!(run.answer.as_str(), own);
            assert_eq!(run.iterations, 2);
            assert_eq!(run.state.len(), 2);

            let step = &run.state.steps()[0];
            assert_eq!(step.action_input, own);
            assert!(step.observation.contains(own));
            assert!(!step.observation.contains(other));
            assert!(!run.state.scratchpad().contains(other));
        }
        assert_ne!(runs[0].id, runs[1].id);
        assert_ne!(runs[0].state.scratchpad(), runs[1].state.scratchpad());
        assert_eq!(llm.calls.load(Ordering::SeqCst), 4);
        assert_eq!(tool_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn invented_observation_in_malformed_output_never_reaches_the_prompt() {
        let llm = Arc::new(ScriptedLlm::new([
            "Thought: hmm\nAction: web_search\nObservation: Fuente: INE, Gini 0.61",
            "Final Answer: No se encontraron datos.",
        ]));
        let (tools, tool_calls) = registry_with("web_search", false);
        let agent = Agent::new(llm.clone(), tools, AgentOptions::default());

        let run = agent
            .run("Gini de Montevideo", &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(tool_calls.load(Ordering::SeqCst), 0);
        assert_eq!(run.state.steps()[0].action, StepAction::Invalid);

        let prompts = llm.prompts();
        let tail = prompts[1]
            .rsplit("Question: ")
            .next()
            .unwrap_or_default();
        assert!(!tail.contains("Gini 0.61"), "{tail}");
        assert!(!tail.contains("Thought: Thought:"), "{tail}");
        assert!(tail.contains(
            "Thought: hmm\nAction: web_search\nObservation: Invalid Format: Missing 'Action Input:' after 'Action:'"
        ));
    }

    #[test]
    fn truncate_for_log_marks_cut() {
        assert_eq!(truncate_for_log("short", 10), "short");
        assert_eq!(truncate_for_log("ñandú largo", 5), "ñandú... [truncated]");
    }
}
