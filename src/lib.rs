//! # Research Agent
//!
//! A self-hosted research assistant for city-level socioeconomic data.
//!
//! This library provides:
//! - A ReAct reasoning loop that answers one free-text query at a time
//! - Web and academic search tools the loop can call
//! - A Gemini client reached through its OpenAI-compatible endpoint
//! - An HTTP API and a landing page for submitting queries
//!
//! ## Example
//!
//! ```rust,ignore
//! use research_agent::{agent::Agent, config::Config};
//!
//! let config = Config::from_env()?;
//! let agent = Agent::from_config(&config)?;
//! let outcome = agent.investigate("¿Cuál fue el Gini de Medellín en 2015?").await;
//! ```

pub mod agent;
pub mod api;
pub mod config;
pub mod llm;
pub mod tools;

pub use config::Config;
