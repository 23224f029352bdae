//! Prompt templates for the research agent.
//!
//! The composed prompt is the only channel through which the persona reaches
//! the model. It is built once at startup and rendered per query by filling
//! the `{input}` and `{agent_scratchpad}` slots.

use crate::tools::ToolRegistry;

/// Slot for the user's query.
pub const INPUT_SLOT: &str = "{input}";

/// Slot for the serialized reasoning steps so far.
pub const SCRATCHPAD_SLOT: &str = "{agent_scratchpad}";

const TOOLS_SLOT: &str = "{tools}";
const TOOL_NAMES_SLOT: &str = "{tool_names}";

/// Domain terms and the technical terms they are expanded to before searching.
pub const TERM_EXPANSIONS: &[(&str, &[&str])] = &[
    (
        "desigualdad / inequality",
        &[
            "coeficiente de Gini",
            "distribución del ingreso",
            "brecha de ingresos",
            "pobreza multidimensional",
            "segregación socioespacial",
        ],
    ),
    (
        "pobreza / poverty",
        &[
            "pobreza monetaria",
            "línea de pobreza",
            "necesidades básicas insatisfechas",
            "índice de pobreza multidimensional",
        ],
    ),
    (
        "empleo / employment",
        &[
            "tasa de desempleo",
            "informalidad laboral",
            "tasa de ocupación",
            "población económicamente activa",
        ],
    ),
    (
        "vivienda / housing",
        &[
            "déficit habitacional",
            "asentamientos informales",
            "hacinamiento",
            "acceso a servicios básicos",
        ],
    ),
];

const PERSONA_HEADER: &str = r#"You are a research assistant specialised in socioeconomic data about specific cities and time periods. Users ask about indicators such as inequality, poverty, employment or housing for a city and a range of years. You answer with concrete figures taken from the observations your tools return.

## Rules

1. **Language** - Always write the Final Answer in Spanish, whatever the language of the question or of the sources.

2. **Cite every datum** - Every figure, date or fact in the Final Answer must name its source (institution, publication or website title) exactly as it appears in an Observation. Never cite a source that did not appear in an Observation.

3. **Synthesize, don't refuse** - Combine partial evidence from several sources. Do not refuse to answer because no single source covers the whole question.

4. **Date ranges are inclusive** - When the user gives a range of years (for example 2010-2015), any datum dated inside that range, including its endpoints, is valid evidence. You do not need one comprehensive source for the whole period.

5. **Expand domain terms before searching** - Before using a tool, expand the user's domain terms into the related technical terms below and search for them too:"#;

const PERSONA_FOOTER: &str = r#"6. **When no data exists** - If after exhausting the tools you found no quantitative datum, say so explicitly in the Final Answer and suggest where the user could look instead: restricted-access academic databases (for example JSTOR or Scopus), physical archives (national statistics offices, municipal archives, university libraries) and public-records or transparency requests to the relevant authorities."#;

/// Reasoning-format template defining the Thought/Action/Observation grammar.
pub const REASONING_FORMAT: &str = r#"Answer the following question as best you can. You have access to the following tools:

{tools}

Use the following format:

Question: the input question you must answer
Thought: you should always think about what to do
Action: the action to take, should be one of [{tool_names}]
Action Input: the input to the action
Observation: the result of the action
... (this Thought/Action/Action Input/Observation can repeat N times)
Thought: I now know the final answer
Final Answer: the final answer to the original input question

Begin!

Question: {input}
{agent_scratchpad}Thought:"#;

/// Persona and domain rules, with the term-expansion table rendered in.
pub fn persona_rules() -> String {
    let expansions = TERM_EXPANSIONS
        .iter()
        .map(|(term, related)| format!("   - {}: {}", term, related.join(", ")))
        .collect::<Vec<_>>()
        .join("\n");

    format!("{}\n{}\n\n{}", PERSONA_HEADER, expansions, PERSONA_FOOTER)
}

/// An instruction block with the per-query slots still open.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComposedPrompt {
    text: String,
}

impl ComposedPrompt {
    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// Fill the query and scratchpad slots in a single pass.
    ///
    /// Slot markers inside `query` or `scratchpad` are left as-is. A slot the
    /// template does not define is appended at the end instead.
    pub fn render(&self, query: &str, scratchpad: &str) -> String {
        let mut out = String::with_capacity(self.text.len() + query.len() + scratchpad.len());

        let (head, tail) = match self.text.rfind(SCRATCHPAD_SLOT) {
            Some(idx) => (&self.text[..idx], Some(&self.text[idx + SCRATCHPAD_SLOT.len()..])),
            None => (self.text.as_str(), None),
        };

        match head.rfind(INPUT_SLOT) {
            Some(idx) => {
                out.push_str(&head[..idx]);
                out.push_str(query);
                out.push_str(&head[idx + INPUT_SLOT.len()..]);
            }
            None => {
                out.push_str(head);
                out.push_str("\n\nQuestion: ");
                out.push_str(query);
                out.push('\n');
            }
        }

        out.push_str(scratchpad);
        if let Some(tail) = tail {
            out.push_str(tail);
        }
        out
    }
}

/// Compose persona rules, the reasoning template and the tool list.
///
/// Deterministic: identical inputs give byte-identical output. Tool lines
/// follow registration order.
pub fn compose(persona: &str, template: &str, tools: &ToolRegistry) -> ComposedPrompt {
    let tool_descriptions = tools
        .list()
        .iter()
        .map(|t| format!("{}: {}", t.name(), t.description()))
        .collect::<Vec<_>>()
        .join("\n");

    let body = template
        .replace(TOOLS_SLOT, &tool_descriptions)
        .replace(TOOL_NAMES_SLOT, &tools.names());

    ComposedPrompt {
        text: format!("{}\n\n{}", persona.trim_end(), body),
    }
}

/// The research persona composed with the standard reasoning format.
pub fn build_research_prompt(tools: &ToolRegistry) -> ComposedPrompt {
    compose(&persona_rules(), REASONING_FORMAT, tools)
}
