//! Deterministic model client that replays canned completions.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use super::{LlmClient, LlmError};

/// Replays a fixed script of completions, one per call.
///
/// Once the script is exhausted the last entry is repeated, so a single-entry
/// script behaves like a model that always says the same thing. Every prompt
/// received is kept for inspection.
pub struct ScriptedLlm {
    script: Mutex<VecDeque<Result<String, LlmError>>>,
    last: Mutex<Option<Result<String, LlmError>>>,
    prompts: Mutex<Vec<String>>,
    calls: AtomicUsize,
}

impl ScriptedLlm {
    /// Replay `completions` in order.
    pub fn new<I, S>(completions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::from_results(completions.into_iter().map(|c| Ok(c.into())))
    }

    /// Replay a script that may contain failures.
    pub fn from_results<I>(results: I) -> Self
    where
        I: IntoIterator<Item = Result<String, LlmError>>,
    {
        Self {
            script: Mutex::new(results.into_iter().collect()),
            last: Mutex::new(None),
            prompts: Mutex::new(Vec::new()),
            calls: AtomicUsize::new(0),
        }
    }

    /// Always answer with `completion`.
    pub fn repeating(completion: impl Into<String>) -> Self {
        Self::new([completion.into()])
    }

    /// Number of `complete` calls made so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Prompts received so far, oldest first.
    pub fn prompts(&self) -> Vec<String> {
        self.prompts
            .lock()
            .map(|p| p.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl LlmClient for ScriptedLlm {
    async fn complete(&self, prompt: &str) -> Result<String, LlmError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut prompts) = self.prompts.lock() {
            prompts.push(prompt.to_string());
        }

        let next = self.script.lock().ok().and_then(|mut s| s.pop_front());
        let mut last = self.last.lock().map_err(|_| LlmError::InvalidResponse {
            provider: "scripted".to_string(),
            reason: "script lock poisoned".to_string(),
        })?;

        match next {
            Some(entry) => {
                *last = Some(entry.clone());
                entry
            }
            None => last.clone().unwrap_or_else(|| {
                Err(LlmError::InvalidResponse {
                    provider: "scripted".to_string(),
                    reason: "script is empty".to_string(),
                })
            }),
        }
    }

    fn model_name(&self) -> &str {
        "scripted"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn replays_in_order_then_repeats_last() {
        let llm = ScriptedLlm::new(["first", "second"]);
        assert_eq!(llm.complete("a").await.unwrap(), "first");
        assert_eq!(llm.complete("b").await.unwrap(), "second");
        assert_eq!(llm.complete("c").await.unwrap(), "second");
        assert_eq!(llm.calls(), 3);
        assert_eq!(llm.prompts(), vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn empty_script_is_an_error() {
        let llm = ScriptedLlm::new(Vec::<String>::new());
        assert!(llm.complete("a").await.is_err());
    }

    #[tokio::test]
    async fn replays_failures() {
        let llm = ScriptedLlm::from_results([Err(LlmError::Timeout(
            std::time::Duration::from_secs(1),
        ))]);
        assert!(matches!(
            llm.complete("a").await,
            Err(LlmError::Timeout(_))
        ));
    }
}
