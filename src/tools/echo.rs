//! Echo tool, kept as a dispatch smoke test.

use async_trait::async_trait;

use super::{require_arg, Tool};
use crate::error::ToolError;
use crate::session::ToolArgs;

/// Returns its input verbatim
pub struct EchoTool;

#[async_trait]
impl Tool for EchoTool {
    fn name(&self) -> &str {
        "echo"
    }

    fn description(&self) -> &str {
        "Echo back the input text (arguments: text)"
    }

    async fn invoke(&self, arguments: &ToolArgs) -> Result<String, ToolError> {
        let text = require_arg(self.name(), arguments, "text")?;
        Ok(format!("Echo: {}", text))
    }
}
