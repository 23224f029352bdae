//! Scholarly works search against the OpenAlex API.
//!
//! OpenAlex ships abstracts as an inverted index (`word -> [positions]`),
//! so the abstract text is rebuilt by position before truncation.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use super::{truncate_chars, Tool};

/// Maximum number of works returned to the model.
pub const MAX_WORKS: usize = 5;

/// Maximum abstract length (characters) fed back into the loop.
pub const MAX_ABSTRACT_CHARS: usize = 500;

/// Observation returned when the search matched nothing.
pub const NO_ARTICLES_FOUND: &str = "No academic articles found for this query.";

/// Keyword search over scholarly works.
pub struct AcademicSearch {
    base_url: String,
    mailto: Option<String>,
}

impl AcademicSearch {
    pub fn new(base_url: &str, mailto: Option<String>) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            mailto,
        }
    }

    async fn search(&self, query: &str) -> anyhow::Result<Vec<Work>> {
        let mut url = format!(
            "{}/works?search={}&per-page={}",
            self.base_url,
            urlencoding::encode(query),
            MAX_WORKS
        );
        if let Some(mailto) = &self.mailto {
            url.push_str("&mailto=");
            url.push_str(&urlencoding::encode(mailto));
        }

        let client = reqwest::Client::builder()
            .user_agent(concat!("research-agent/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(20))
            .build()?;

        let response = client.get(&url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(anyhow::anyhow!("HTTP error: {}", status));
        }

        let body: WorksResponse = response.json().await?;
        Ok(body.results)
    }
}

#[async_trait]
impl Tool for AcademicSearch {
    fn name(&self) -> &str {
        "academic_search"
    }

    fn description(&self) -> &str {
        "Searches scholarly articles by keyword and returns up to 5 titles with abstracts. Useful when general search finds no quantitative data, or to find studies that measure a socioeconomic indicator for a city and period. Input is a short keyword query."
    }

    async fn execute(&self, input: &str) -> anyhow::Result<String> {
        let query = input.trim();
        if query.is_empty() {
            return Ok("Academic search needs a non-empty keyword query.".to_string());
        }

        tracing::info!("Academic search: {}", query);

        match self.search(query).await {
            Ok(works) => Ok(format_works(&works)),
            Err(e) => {
                tracing::warn!("Academic search failed: {}", e);
                Ok(format!("Academic search failed: {}", e))
            }
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct WorksResponse {
    #[serde(default)]
    results: Vec<Work>,
}

#[derive(Debug, Default, Deserialize)]
struct Work {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    display_name: Option<String>,
    #[serde(default)]
    abstract_inverted_index: Option<HashMap<String, Vec<usize>>>,
}

impl Work {
    fn title(&self) -> &str {
        self.title
            .as_deref()
            .or(self.display_name.as_deref())
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .unwrap_or("Untitled")
    }

    fn abstract_text(&self) -> Option<String> {
        self.abstract_inverted_index
            .as_ref()
            .map(rebuild_abstract)
            .filter(|a| !a.is_empty())
    }
}

/// Rebuild abstract text from an inverted index.
fn rebuild_abstract(index: &HashMap<String, Vec<usize>>) -> String {
    let mut positioned: Vec<(usize, &str)> = index
        .iter()
        .flat_map(|(word, positions)| positions.iter().map(move |&p| (p, word.as_str())))
        .collect();
    positioned.sort_unstable();
    positioned
        .into_iter()
        .map(|(_, word)| word)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Format works as one observation block.
fn format_works(works: &[Work]) -> String {
    if works.is_empty() {
        return NO_ARTICLES_FOUND.to_string();
    }

    works
        .iter()
        .take(MAX_WORKS)
        .map(|work| {
            let abstract_text = work
                .abstract_text()
                .map(|a| truncate_chars(&a, MAX_ABSTRACT_CHARS))
                .unwrap_or_else(|| "No abstract available.".to_string());
            format!("Title: {}\nAbstract: {}", work.title(), abstract_text)
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}
