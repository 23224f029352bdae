//! Tool system for the research agent.
//!
//! Tools take the model's free-text `Action Input` and return free text that
//! becomes the next observation. A failing tool never crashes the loop: the
//! built-in tools degrade transport faults to text themselves, and the loop
//! converts any remaining error into an observation.

mod academic;
mod web;

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::config::SearchConfig;

pub use academic::{AcademicSearch, NO_ARTICLES_FOUND};
pub use web::WebSearch;

/// Errors surfaced by the registry.
#[derive(Debug, Error)]
pub enum ToolError {
    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    #[error("Tool already registered: {0}")]
    DuplicateTool(String),

    #[error("Tool {tool} failed: {message}")]
    Invocation { tool: String, message: String },
}

/// A capability the model can invoke by name.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Name the model uses in `Action:` lines.
    fn name(&self) -> &str;

    /// Natural-language guidance for when to use the tool.
    fn description(&self) -> &str;

    /// Run the tool on the model's input text.
    async fn execute(&self, input: &str) -> anyhow::Result<String>;
}

/// Result of resolving a tool name.
pub enum ToolLookup<'a> {
    Found(&'a Arc<dyn Tool>),
    NotFound,
}

impl ToolLookup<'_> {
    pub fn is_found(&self) -> bool {
        matches!(self, Self::Found(_))
    }
}

/// Ordered, immutable-after-startup set of tools.
#[derive(Clone, Default)]
pub struct ToolRegistry {
    tools: Vec<Arc<dyn Tool>>,
}

impl ToolRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self { tools: Vec::new() }
    }

    /// Registry with the research tools: general search first, then academic search.
    pub fn research_defaults(config: &SearchConfig) -> Self {
        let web: Arc<dyn Tool> = Arc::new(WebSearch::new(&config.web_search_url));
        let academic: Arc<dyn Tool> = Arc::new(AcademicSearch::new(
            &config.openalex_base_url,
            config.openalex_mailto.clone(),
        ));
        Self {
            tools: vec![web, academic],
        }
    }

    /// Add a tool. Names must be unique.
    pub fn register(&mut self, tool: Arc<dyn Tool>) -> Result<(), ToolError> {
        if self.tools.iter().any(|t| t.name() == tool.name()) {
            return Err(ToolError::DuplicateTool(tool.name().to_string()));
        }
        self.tools.push(tool);
        Ok(())
    }

    /// All tools in registration order.
    pub fn list(&self) -> &[Arc<dyn Tool>] {
        &self.tools
    }

    /// Comma-separated tool names in registration order.
    pub fn names(&self) -> String {
        self.tools
            .iter()
            .map(|t| t.name())
            .collect::<Vec<_>>()
            .join(", ")
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Resolve a tool name as written by the model.
    ///
    /// An exact match wins. Otherwise names are compared after normalization
    /// (quotes stripped, case folded, spaces and hyphens as underscores) and
    /// the earliest registered match is returned.
    pub fn lookup(&self, name: &str) -> ToolLookup<'_> {
        if let Some(tool) = self.tools.iter().find(|t| t.name() == name) {
            return ToolLookup::Found(tool);
        }

        let wanted = normalize_tool_name(name);
        if wanted.is_empty() {
            return ToolLookup::NotFound;
        }
        match self
            .tools
            .iter()
            .find(|t| normalize_tool_name(t.name()) == wanted)
        {
            Some(tool) => ToolLookup::Found(tool),
            None => ToolLookup::NotFound,
        }
    }

    /// Invoke a tool by name.
    pub async fn invoke(&self, name: &str, input: &str) -> Result<String, ToolError> {
        match self.lookup(name) {
            ToolLookup::Found(tool) => {
                tool.execute(input)
                    .await
                    .map_err(|e| ToolError::Invocation {
                        tool: tool.name().to_string(),
                        message: e.to_string(),
                    })
            }
            ToolLookup::NotFound => Err(ToolError::UnknownTool(name.to_string())),
        }
    }
}

fn normalize_tool_name(name: &str) -> String {
    name.trim()
        .trim_matches(|c| c == '"' || c == '\'' || c == '`' || c == '*')
        .trim()
        .to_lowercase()
        .chars()
        .map(|c| if c == ' ' || c == '-' { '_' } else { c })
        .collect()
}

/// Truncate `s` to at most `max_chars` characters, appending `...` when cut.
pub(crate) fn truncate_chars(s: &str, max_chars: usize) -> String {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", s[..idx].trim_end()),
        None => s.to_string(),
    }
}
