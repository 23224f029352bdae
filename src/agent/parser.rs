//! Strict matcher for the Thought/Action/Action Input/Final Answer grammar.
//!
//! Model output is free text. Anything that does not fit the grammar comes
//! back as [`ParsedStep::Malformed`] (or [`ParsedStep::Think`] for a bare
//! thought) so the loop can ask the model to correct itself.

use std::sync::OnceLock;

use regex::Regex;

const FINAL_ANSWER: &str = "Final Answer:";

/// One model turn, classified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedStep {
    /// Reasoning with no action and no answer.
    Think { thought: String },
    /// A tool invocation.
    Act {
        thought: String,
        tool: String,
        input: String,
    },
    /// The final answer.
    Finish { thought: String, answer: String },
    /// Output that does not follow the grammar.
    Malformed { raw: String, reason: String },
}

fn action_regex() -> &'static Regex {
    static ACTION: OnceLock<Regex> = OnceLock::new();
    ACTION.get_or_init(|| {
        Regex::new(
            r"(?ms)^[ \t]*Action[ \t]*\d*[ \t]*:[ \t]*(.*?)\s*^[ \t]*Action[ \t]*\d*[ \t]*Input[ \t]*\d*[ \t]*:\s*(.*)",
        )
        .expect("action pattern is valid")
    })
}

fn action_only_regex() -> &'static Regex {
    static ACTION_ONLY: OnceLock<Regex> = OnceLock::new();
    ACTION_ONLY.get_or_init(|| {
        Regex::new(r"(?m)^[ \t]*Action[ \t]*\d*[ \t]*:").expect("action pattern is valid")
    })
}

fn observation_regex() -> &'static Regex {
    static OBSERVATION: OnceLock<Regex> = OnceLock::new();
    OBSERVATION
        .get_or_init(|| Regex::new(r"(?m)^\s*Observation\s*:").expect("observation pattern is valid"))
}

/// Classify one model completion.
pub fn parse_step(output: &str) -> ParsedStep {
    // Anything from an invented observation onwards is discarded.
    let text = match observation_regex().find(output) {
        Some(m) => &output[..m.start()],
        None => output,
    };
    let text = text.trim();

    if text.is_empty() {
        return malformed(text, "the response was empty");
    }

    let final_idx = text.find(FINAL_ANSWER);

    if let Some(caps) = action_regex().captures(text) {
        if final_idx.is_some() {
            return malformed(
                text,
                "the response contains both a Final Answer and an Action",
            );
        }

        let start = caps.get(0).map(|m| m.start()).unwrap_or(0);
        let tool = caps
            .get(1)
            .map(|m| clean_tool_name(m.as_str()))
            .unwrap_or_default();
        let input = caps
            .get(2)
            .map(|m| strip_quotes(m.as_str().trim()))
            .unwrap_or_default();

        if tool.is_empty() {
            return malformed(text, "'Action:' does not name a tool");
        }

        return ParsedStep::Act {
            thought: clean_thought(&text[..start]),
            tool,
            input,
        };
    }

    if let Some(idx) = final_idx {
        let answer = text[idx + FINAL_ANSWER.len()..].trim();
        if answer.is_empty() {
            return malformed(text, "'Final Answer:' is empty");
        }
        return ParsedStep::Finish {
            thought: clean_thought(&text[..idx]),
            answer: answer.to_string(),
        };
    }

    if action_only_regex().is_match(text) {
        return malformed(text, "Missing 'Action Input:' after 'Action:'");
    }

    ParsedStep::Think {
        thought: clean_thought(text),
    }
}

/// `text` is the output already cut at any invented observation.
fn malformed(text: &str, reason: &str) -> ParsedStep {
    ParsedStep::Malformed {
        raw: clean_thought(text),
        reason: reason.to_string(),
    }
}

fn clean_thought(text: &str) -> String {
    let text = text.trim();
    text.strip_prefix("Thought:")
        .unwrap_or(text)
        .trim()
        .to_string()
}

/// Tool name is the first line after `Action:`, without markdown decoration.
fn clean_tool_name(raw: &str) -> String {
    raw.lines()
        .next()
        .unwrap_or("")
        .trim()
        .trim_matches(|c| c == '`' || c == '*')
        .trim()
        .to_string()
}

fn strip_quotes(s: &str) -> String {
    let stripped = s
        .strip_prefix('"')
        .and_then(|rest| rest.strip_suffix('"'))
        .unwrap_or(s);
    stripped.to_string()
}
