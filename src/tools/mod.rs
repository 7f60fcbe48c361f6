//! Tool contract and registry.
//!
//! Every external capability the agent can take is a [`Tool`] registered by
//! name in a [`ToolRegistry`]. The orchestrator never dispatches a tool any
//! other way, so new tools are added at startup without touching the loop.

mod echo;
mod search;
mod summarize;

pub use echo::EchoTool;
pub use search::SearchTool;
pub use summarize::SummarizeTool;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use crate::completion::CompletionClient;
use crate::error::ToolError;
use crate::session::ToolArgs;

/// An invocable external capability
#[async_trait]
pub trait Tool: Send + Sync {
    /// Unique tool name used for dispatch
    fn name(&self) -> &str;

    /// One-line description shown to the decision policy, including the
    /// expected argument keys
    fn description(&self) -> &str;

    /// Invoke the tool with string-to-string arguments
    async fn invoke(&self, arguments: &ToolArgs) -> Result<String, ToolError>;
}

/// Name and description of a registered tool, as listed to the policy
#[derive(Debug, Clone)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
}

/// Registry mapping tool names to invocable capabilities
#[derive(Default)]
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool. Re-registering a name replaces the previous entry.
    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        self.tools.insert(tool.name().to_string(), tool);
    }

    /// Look up a tool by name
    pub fn get(&self, name: &str) -> Result<Arc<dyn Tool>, ToolError> {
        self.tools
            .get(name)
            .cloned()
            .ok_or_else(|| ToolError::NotFound {
                name: name.to_string(),
            })
    }

    /// Whether a tool with this name is registered
    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// Number of registered tools
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Whether the registry is empty
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Sorted listing of available tools for the decision policy
    pub fn catalog(&self) -> Vec<ToolSpec> {
        let mut specs: Vec<ToolSpec> = self
            .tools
            .values()
            .map(|t| ToolSpec {
                name: t.name().to_string(),
                description: t.description().to_string(),
            })
            .collect();
        specs.sort_by(|a, b| a.name.cmp(&b.name));
        specs
    }

    /// Registry pre-populated with the built-in tools
    pub fn builtin(client: Arc<dyn CompletionClient>) -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(SearchTool::new()));
        registry.register(Arc::new(SummarizeTool::new(client)));
        registry.register(Arc::new(EchoTool));
        registry
    }
}

/// Fetch a required argument or fail with [`ToolError::MissingArgument`]
pub(crate) fn require_arg<'a>(
    tool: &str,
    arguments: &'a ToolArgs,
    key: &str,
) -> Result<&'a str, ToolError> {
    arguments
        .get(key)
        .map(|s| s.as_str())
        .filter(|s| !s.trim().is_empty())
        .ok_or_else(|| ToolError::MissingArgument {
            name: tool.to_string(),
            argument: key.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedTool {
        name: &'static str,
        reply: &'static str,
    }

    #[async_trait]
    impl Tool for FixedTool {
        fn name(&self) -> &str {
            self.name
        }

        fn description(&self) -> &str {
            "fixed reply (arguments: none)"
        }

        async fn invoke(&self, _arguments: &ToolArgs) -> Result<String, ToolError> {
            Ok(self.reply.to_string())
        }
    }

    #[test]
    fn test_lookup_unknown_tool_fails() {
        let registry = ToolRegistry::new();
        let err = registry.get("missing").err().unwrap();
        assert!(matches!(err, ToolError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_register_and_invoke() {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(FixedTool {
            name: "fixed",
            reply: "hello",
        }));

        let tool = registry.get("fixed").unwrap();
        let out = tool.invoke(&ToolArgs::new()).await.unwrap();
        assert_eq!(out, "hello");
    }

    #[tokio::test]
    async fn test_reregistration_replaces_previous_entry() {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(FixedTool {
            name: "fixed",
            reply: "first",
        }));
        registry.register(Arc::new(FixedTool {
            name: "fixed",
            reply: "second",
        }));

        assert_eq!(registry.len(), 1);
        let out = registry
            .get("fixed")
            .unwrap()
            .invoke(&ToolArgs::new())
            .await
            .unwrap();
        assert_eq!(out, "second");
    }

    #[test]
    fn test_catalog_is_sorted_by_name() {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(FixedTool {
            name: "zeta",
            reply: "",
        }));
        registry.register(Arc::new(FixedTool {
            name: "alpha",
            reply: "",
        }));

        let names: Vec<String> = registry.catalog().into_iter().map(|s| s.name).collect();
        assert_eq!(names, vec!["alpha", "zeta"]);
    }

    #[test]
    fn test_require_arg() {
        let mut args = ToolArgs::new();
        args.insert("query".to_string(), "rust".to_string());

        assert_eq!(require_arg("search", &args, "query").unwrap(), "rust");

        let err = require_arg("search", &args, "missing").unwrap_err();
        assert!(matches!(err, ToolError::MissingArgument { .. }));

        args.insert("blank".to_string(), "   ".to_string());
        let err = require_arg("search", &args, "blank").unwrap_err();
        assert!(matches!(err, ToolError::MissingArgument { .. }));
    }
}
