//! Completion client for OpenAI-compatible chat endpoints.
//!
//! The orchestrator, scorer, policy, and summarize tool all go through the
//! [`CompletionClient`] trait; [`HttpCompletionClient`] is the bundled
//! implementation targeting a local LM Studio style server.

mod client;
mod types;

pub use client::{CompletionClient, HttpCompletionClient};
pub use types::{
    ChatChoice, ChatCompletionRequest, ChatCompletionResponse, ChatMessage, ChoiceMessage,
    CompletionOptions, MessageRole, Usage,
};
