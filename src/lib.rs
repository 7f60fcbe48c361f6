//! # Reagent
//!
//! A local reasoning-agent loop: answers a question by alternating
//! model-generated reasoning, tool invocation, and evaluation of the
//! results, until it produces a final answer or exhausts its step budget.
//!
//! ## Features
//!
//! - **State machine sessions**: THINK -> ACT -> OBSERVE -> REFLECT cycles
//!   ending in a single ANSWER step
//! - **Tool registry**: capabilities registered by name and dispatched only
//!   through the registry
//! - **Loop prevention**: no (tool, arguments) pair ever executes twice in
//!   one session
//! - **Confidence scoring**: every observation is rated for relevance in
//!   [0, 1] with a short rationale
//! - **Persistent memory**: an append-only recall log feeding later
//!   sessions, and an append-only trace log for offline analysis
//! - **Degraded answers**: budget exhaustion and endpoint failures produce
//!   an explicitly flagged answer instead of an error
//!
//! ## Architecture
//!
//! ```text
//! CLI -> Orchestrator -> Completion endpoint (HTTP)
//!             |-> Tool Registry (search, summarize, echo)
//!             |-> Confidence Scorer
//!             `-> Memory Store (SQLite: recall log + trace log)
//! ```
//!
//! ## Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use reagent::completion::{CompletionOptions, HttpCompletionClient};
//! use reagent::memory::SqliteMemory;
//! use reagent::policy::LlmPolicy;
//! use reagent::tools::ToolRegistry;
//! use reagent::{Config, Orchestrator};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::from_env()?;
//!     let memory = Arc::new(SqliteMemory::new(&config.database).await?);
//!     let client = Arc::new(HttpCompletionClient::new(&config.completion, &config.request)?);
//!     let options = CompletionOptions::new(config.completion.temperature, config.completion.max_tokens);
//!     let tools = Arc::new(ToolRegistry::builtin(client.clone()));
//!     let policy = Arc::new(LlmPolicy::new(client.clone(), options.clone()));
//!     let orchestrator = Orchestrator::new(
//!         client, policy, tools, memory, options,
//!         config.reasoning.clone(), config.request.clone(),
//!     );
//!     let outcome = orchestrator.answer("What is the boiling point of water?").await?;
//!     println!("{}", outcome.answer);
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]

/// Completion client for OpenAI-compatible endpoints.
pub mod completion;
/// Configuration management.
pub mod config;
/// Error types and result aliases for the application.
pub mod error;
/// Persistent recall and trace logs.
pub mod memory;
/// The reasoning loop state machine.
pub mod orchestrator;
/// Pluggable THINK decision policy.
pub mod policy;
/// Prompt templates sent to the completion endpoint.
pub mod prompts;
/// Relevance scoring of observations.
pub mod scorer;
/// Session and step data model.
pub mod session;
/// Tool contract and registry.
pub mod tools;

pub use config::Config;
pub use error::{AppError, AppResult};
pub use orchestrator::{Orchestrator, SessionOutcome};
