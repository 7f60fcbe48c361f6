//! Condensation tool delegating to the completion endpoint.

use std::sync::Arc;

use async_trait::async_trait;

use super::{require_arg, Tool};
use crate::completion::{CompletionClient, CompletionOptions};
use crate::error::ToolError;
use crate::prompts::summarize_prompt;
use crate::session::ToolArgs;

/// Condensation tool: long text -> 3-5 bullet points
pub struct SummarizeTool {
    client: Arc<dyn CompletionClient>,
    options: CompletionOptions,
}

impl SummarizeTool {
    /// Create a summarize tool over the given completion client
    pub fn new(client: Arc<dyn CompletionClient>) -> Self {
        Self {
            client,
            options: CompletionOptions::default(),
        }
    }
}

#[async_trait]
impl Tool for SummarizeTool {
    fn name(&self) -> &str {
        "summarize"
    }

    fn description(&self) -> &str {
        "Summarize a given text into 3-5 bullet points (arguments: text)"
    }

    async fn invoke(&self, arguments: &ToolArgs) -> Result<String, ToolError> {
        let text = require_arg(self.name(), arguments, "text")?;

        self.client
            .complete(&summarize_prompt(text), &self.options)
            .await
            .map_err(|e| ToolError::Invocation {
                name: self.name().to_string(),
                message: e.to_string(),
            })
    }
}
