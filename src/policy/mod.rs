//! Decision policy for the THINK state.
//!
//! The state machine stays deterministic by confining the model's
//! open-ended output to a closed set of structured decisions: call a tool,
//! or answer. [`LlmPolicy`] is the default implementation; tests substitute
//! their own [`DecisionPolicy`].

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use crate::completion::{CompletionClient, CompletionOptions};
use crate::error::CompletionResult;
use crate::memory::MemoryRecord;
use crate::prompts::decision_prompt;
use crate::session::{Step, ToolArgs};
use crate::tools::ToolSpec;

/// Everything the policy may consult when deciding the next transition
pub struct PolicyContext<'a> {
    /// The user's question.
    pub question: &'a str,
    /// Steps recorded so far, including scored observations.
    pub steps: &'a [Step],
    /// Recall-log records surfaced at session start.
    pub recalled: &'a [MemoryRecord],
    /// Catalog of registered tools.
    pub tools: &'a [ToolSpec],
    /// Set when the previous decision repeated an attempted action.
    pub repeat_note: Option<&'a str>,
}

/// Structured outcome of one THINK transition
#[derive(Debug, Clone, PartialEq)]
pub enum Decision {
    /// Invoke a tool with the given arguments.
    CallTool {
        thought: String,
        tool: String,
        arguments: ToolArgs,
    },
    /// Stop reasoning and answer.
    Answer { thought: String, draft: String },
}

/// Pluggable THINK decision function
#[async_trait]
pub trait DecisionPolicy: Send + Sync {
    /// Produce the next decision for the session.
    async fn decide(&self, ctx: &PolicyContext<'_>) -> CompletionResult<Decision>;
}

/// Default policy: ask the completion endpoint for a tagged JSON decision
pub struct LlmPolicy {
    client: Arc<dyn CompletionClient>,
    options: CompletionOptions,
}

impl LlmPolicy {
    /// Create a policy over the given completion client
    pub fn new(client: Arc<dyn CompletionClient>, options: CompletionOptions) -> Self {
        Self { client, options }
    }
}

#[async_trait]
impl DecisionPolicy for LlmPolicy {
    async fn decide(&self, ctx: &PolicyContext<'_>) -> CompletionResult<Decision> {
        let prompt = decision_prompt(
            ctx.question,
            ctx.tools,
            ctx.recalled,
            ctx.steps,
            ctx.repeat_note,
        );

        let raw = self.client.complete(&prompt, &self.options).await?;
        let decision = parse_decision(&raw);
        debug!(?decision, "Decision parsed");
        Ok(decision)
    }
}

#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum RawDecision {
    Action {
        #[serde(default)]
        thought: String,
        tool: String,
        #[serde(default)]
        arguments: ToolArgs,
    },
    Final {
        #[serde(default)]
        thought: String,
        #[serde(default)]
        answer: String,
    },
}

impl From<RawDecision> for Decision {
    fn from(raw: RawDecision) -> Self {
        match raw {
            RawDecision::Action {
                thought,
                tool,
                arguments,
            } => Decision::CallTool {
                thought,
                tool,
                arguments,
            },
            RawDecision::Final { thought, answer } => Decision::Answer {
                thought,
                draft: answer,
            },
        }
    }
}

/// Parse model output into a [`Decision`].
///
/// Accepts the tagged JSON object directly or embedded in prose; output
/// that parses as neither degrades to an Answer decision carrying the raw
/// text, so a confused model ends the session instead of wedging it.
pub fn parse_decision(raw: &str) -> Decision {
    if let Ok(parsed) = serde_json::from_str::<RawDecision>(raw.trim()) {
        return parsed.into();
    }

    if let (Some(start), Some(end)) = (raw.find('{'), raw.rfind('}')) {
        if end > start {
            if let Ok(parsed) = serde_json::from_str::<RawDecision>(&raw[start..=end]) {
                return parsed.into();
            }
        }
    }

    Decision::Answer {
        thought: "decision output was not valid JSON".to_string(),
        draft: raw.trim().to_string(),
    }
}
