//! General web search over DuckDuckGo's HTML endpoint.

use std::time::Duration;

use async_trait::async_trait;

use super::Tool;

const MAX_RESULTS: usize = 5;

/// Broad, unstructured web lookup. The first resort for any question.
pub struct WebSearch {
    endpoint: String,
}

impl WebSearch {
    pub fn new(endpoint: &str) -> Self {
        Self {
            endpoint: endpoint.to_string(),
        }
    }

    async fn search(&self, query: &str) -> anyhow::Result<Vec<String>> {
        let url = format!(
            "{}?q={}",
            self.endpoint.trim_end_matches('?'),
            urlencoding::encode(query)
        );

        let client = reqwest::Client::builder()
            .user_agent("Mozilla/5.0 (compatible; ResearchAgent/1.0)")
            .timeout(Duration::from_secs(20))
            .build()?;

        let response = client.get(&url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(anyhow::anyhow!("HTTP error: {}", status));
        }

        let html = response.text().await?;
        Ok(extract_ddg_results(&html))
    }
}

#[async_trait]
impl Tool for WebSearch {
    fn name(&self) -> &str {
        "web_search"
    }

    fn description(&self) -> &str {
        "General web search. Useful for questions about current events, official statistics, news coverage and the current state of a city. Input is a plain-text search query. Use this first."
    }

    async fn execute(&self, input: &str) -> anyhow::Result<String> {
        let query = input.trim();
        if query.is_empty() {
            return Ok("Web search needs a non-empty search query.".to_string());
        }

        tracing::info!("Web search: {}", query);

        match self.search(query).await {
            Ok(results) if results.is_empty() => Ok(format!("No results found for: {}", query)),
            Ok(results) => Ok(results.join("\n\n")),
            Err(e) => {
                tracing::warn!("Web search failed: {}", e);
                Ok(format!("Web search failed: {}", e))
            }
        }
    }
}

/// Extract search results from DuckDuckGo HTML.
fn extract_ddg_results(html: &str) -> Vec<String> {
    let mut results = Vec::new();

    for chunk in html.split("class=\"result__body\"").skip(1) {
        if results.len() == MAX_RESULTS {
            break;
        }

        let title = field_text(chunk, "class=\"result__a\"").unwrap_or("");
        let snippet = field_text(chunk, "class=\"result__snippet\"").unwrap_or("No snippet");
        let url = field_text(chunk, "class=\"result__url\"")
            .map(str::trim)
            .unwrap_or("");

        if !title.trim().is_empty() {
            results.push(format!(
                "**{}**\n{}\nURL: {}",
                html_decode(title.trim()),
                html_decode(snippet.trim()),
                url
            ));
        }
    }

    results
}

/// Text between the tag carrying `marker` and the next tag.
fn field_text<'a>(chunk: &'a str, marker: &str) -> Option<&'a str> {
    chunk
        .split(marker)
        .nth(1)
        .and_then(|s| s.split('>').nth(1))
        .and_then(|s| s.split('<').next())
}

/// Basic HTML entity decoding.
fn html_decode(s: &str) -> String {
    s.replace("&amp;", "&")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&#x27;", "'")
        .replace("&nbsp;", " ")
}
