//! Configuration management for the research agent.
//!
//! Configuration can be set via environment variables (a `.env` file in the
//! working directory is loaded first by the binary):
//! - `GEMINI_API_KEY` - Required. API key for the Gemini model endpoint.
//! - `DEFAULT_MODEL` - Optional. Model identifier. Defaults to `gemini-2.0-flash`.
//! - `LLM_BASE_URL` - Optional. OpenAI-compatible base URL for the model endpoint.
//! - `LLM_TEMPERATURE` - Optional. Sampling temperature. Defaults to `0.0`.
//! - `LLM_MAX_RETRIES` - Optional. Retries for rate-limited/5xx model calls. Defaults to `2`.
//! - `HOST` - Optional. Server host. Defaults to `127.0.0.1`.
//! - `PORT` - Optional. Server port. Defaults to `5000`.
//! - `MAX_ITERATIONS` - Optional. Reasoning loop iteration cap. Defaults to `15`.
//! - `MODEL_TIMEOUT_SECS` - Optional. Per model call timeout. Defaults to `120`.
//! - `TOOL_TIMEOUT_SECS` - Optional. Per tool call timeout. Defaults to `30`.
//! - `OPENALEX_BASE_URL` - Optional. Scholarly works API. Defaults to `https://api.openalex.org`.
//! - `OPENALEX_MAILTO` - Optional. Contact address for the OpenAlex polite pool.
//! - `WEB_SEARCH_URL` - Optional. DuckDuckGo HTML endpoint.

use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

pub const DEFAULT_MODEL: &str = "gemini-2.0-flash";
pub const DEFAULT_LLM_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta/openai";
pub const DEFAULT_OPENALEX_BASE_URL: &str = "https://api.openalex.org";
pub const DEFAULT_WEB_SEARCH_URL: &str = "https://html.duckduckgo.com/html/";
pub const DEFAULT_MAX_ITERATIONS: usize = 15;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),
}

/// Language model endpoint configuration.
#[derive(Debug, Clone)]
pub struct LlmConfig {
    /// API key sent as a bearer token
    pub api_key: String,

    /// Model identifier
    pub model: String,

    /// OpenAI-compatible base URL (without `/chat/completions`)
    pub base_url: String,

    /// Sampling temperature
    pub temperature: f32,

    /// Retries on rate limiting or server errors
    pub max_retries: u32,
}

/// External search backends.
#[derive(Debug, Clone)]
pub struct SearchConfig {
    /// OpenAlex API base URL
    pub openalex_base_url: String,

    /// Contact address for the OpenAlex polite pool
    pub openalex_mailto: Option<String>,

    /// DuckDuckGo HTML search endpoint
    pub web_search_url: String,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            openalex_base_url: DEFAULT_OPENALEX_BASE_URL.to_string(),
            openalex_mailto: None,
            web_search_url: DEFAULT_WEB_SEARCH_URL.to_string(),
        }
    }
}

/// Service configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Model endpoint
    pub llm: LlmConfig,

    /// Search backends
    pub search: SearchConfig,

    /// Server host
    pub host: String,

    /// Server port
    pub port: u16,

    /// Maximum iterations for the reasoning loop
    pub max_iterations: usize,

    /// Timeout for a single model call
    pub model_timeout: Duration,

    /// Timeout for a single tool call
    pub tool_timeout: Duration,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::MissingEnvVar` if `GEMINI_API_KEY` is not set, and
    /// `ConfigError::InvalidValue` for unparsable numbers or URLs.
    pub fn from_env() -> Result<Self, ConfigError> {
        let api_key = std::env::var("GEMINI_API_KEY")
            .ok()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| ConfigError::MissingEnvVar("GEMINI_API_KEY".to_string()))?;

        let llm = LlmConfig {
            api_key,
            model: std::env::var("DEFAULT_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string()),
            base_url: env_url("LLM_BASE_URL", DEFAULT_LLM_BASE_URL)?,
            temperature: env_parse("LLM_TEMPERATURE", 0.0)?,
            max_retries: env_parse("LLM_MAX_RETRIES", 2)?,
        };

        let search = SearchConfig {
            openalex_base_url: env_url("OPENALEX_BASE_URL", DEFAULT_OPENALEX_BASE_URL)?,
            openalex_mailto: std::env::var("OPENALEX_MAILTO").ok(),
            web_search_url: env_url("WEB_SEARCH_URL", DEFAULT_WEB_SEARCH_URL)?,
        };

        let host = std::env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env_parse("PORT", 5000u16)?;

        let max_iterations = env_parse("MAX_ITERATIONS", DEFAULT_MAX_ITERATIONS)?;
        if max_iterations == 0 {
            return Err(ConfigError::InvalidValue(
                "MAX_ITERATIONS".to_string(),
                "must be at least 1".to_string(),
            ));
        }

        let model_timeout = Duration::from_secs(env_parse("MODEL_TIMEOUT_SECS", 120u64)?);
        let tool_timeout = Duration::from_secs(env_parse("TOOL_TIMEOUT_SECS", 30u64)?);

        Ok(Self {
            llm,
            search,
            host,
            port,
            max_iterations,
            model_timeout,
            tool_timeout,
        })
    }

    /// Create a config with default values (useful for testing).
    pub fn new(api_key: String) -> Self {
        Self {
            llm: LlmConfig {
                api_key,
                model: DEFAULT_MODEL.to_string(),
                base_url: DEFAULT_LLM_BASE_URL.to_string(),
                temperature: 0.0,
                max_retries: 2,
            },
            search: SearchConfig::default(),
            host: "127.0.0.1".to_string(),
            port: 5000,
            max_iterations: DEFAULT_MAX_ITERATIONS,
            model_timeout: Duration::from_secs(120),
            tool_timeout: Duration::from_secs(30),
        }
    }

    /// Socket address string the server binds to.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn env_parse<T>(key: &str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) => parse_value(key, &raw),
        Err(_) => Ok(default),
    }
}

fn parse_value<T>(key: &str, raw: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim()
        .parse()
        .map_err(|e: T::Err| ConfigError::InvalidValue(key.to_string(), format!("{}", e)))
}

fn env_url(key: &str, default: &str) -> Result<String, ConfigError> {
    let raw = std::env::var(key).unwrap_or_else(|_| default.to_string());
    validate_url(key, &raw)
}

fn validate_url(key: &str, raw: &str) -> Result<String, ConfigError> {
    let parsed = url::Url::parse(raw.trim())
        .map_err(|e| ConfigError::InvalidValue(key.to_string(), format!("{}", e)))?;
    match parsed.scheme() {
        "http" | "https" => Ok(raw.trim().to_string()),
        other => Err(ConfigError::InvalidValue(
            key.to_string(),
            format!("unsupported scheme: {}", other),
        )),
    }
}
