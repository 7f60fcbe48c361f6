//! Web retrieval tool backed by the DuckDuckGo HTML results page.

use async_trait::async_trait;

use super::{require_arg, Tool};
use crate::error::ToolError;
use crate::session::ToolArgs;

const MAX_RESULTS: usize = 5;

/// Retrieval tool: query -> top result snippets joined to text
pub struct SearchTool {
    client: reqwest::Client,
}

impl SearchTool {
    /// Create a search tool with its own HTTP client
    pub fn new() -> Self {
        let client = reqwest::Client::builder()
            .user_agent("Mozilla/5.0 (compatible; reagent/0.1)")
            .build()
            .unwrap_or_default();
        Self { client }
    }
}

impl Default for SearchTool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Tool for SearchTool {
    fn name(&self) -> &str {
        "search"
    }

    fn description(&self) -> &str {
        "Search the web and return the top result snippets (arguments: query)"
    }

    async fn invoke(&self, arguments: &ToolArgs) -> Result<String, ToolError> {
        let query = require_arg(self.name(), arguments, "query")?;

        let url = format!(
            "https://html.duckduckgo.com/html/?q={}",
            urlencoding::encode(query.trim())
        );

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| ToolError::Invocation {
                name: self.name().to_string(),
                message: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(ToolError::Invocation {
                name: self.name().to_string(),
                message: format!("search endpoint returned HTTP {}", status),
            });
        }

        let html = response.text().await.map_err(|e| ToolError::Invocation {
            name: self.name().to_string(),
            message: e.to_string(),
        })?;

        let results = extract_results(&html);
        if results.is_empty() {
            Ok(format!("No results found for: {}", query))
        } else {
            Ok(results.join("\n"))
        }
    }
}

/// Extract "- title: snippet (url)" lines from a DuckDuckGo HTML results page.
fn extract_results(html: &str) -> Vec<String> {
    let mut results = Vec::new();

    for chunk in html.split("class=\"result__body\"").skip(1) {
        if results.len() >= MAX_RESULTS {
            break;
        }

        let title = chunk
            .split("class=\"result__a\"")
            .nth(1)
            .and_then(|s| s.split('>').nth(1))
            .and_then(|s| s.split('<').next())
            .map(str::trim)
            .unwrap_or("");

        let snippet = chunk
            .split("class=\"result__snippet\"")
            .nth(1)
            .and_then(|s| s.split('>').nth(1))
            .and_then(|s| s.split('<').next())
            .map(str::trim)
            .unwrap_or("");

        let url = chunk
            .split("class=\"result__url\"")
            .nth(1)
            .and_then(|s| s.split('>').nth(1))
            .and_then(|s| s.split('<').next())
            .map(str::trim)
            .unwrap_or("");

        if title.is_empty() {
            continue;
        }

        let mut line = format!("- {}", html_decode(title));
        if !snippet.is_empty() {
            line.push_str(&format!(": {}", html_decode(snippet)));
        }
        if !url.is_empty() {
            line.push_str(&format!(" ({})", url));
        }
        results.push(line);
    }

    results
}

/// Basic HTML entity decoding.
fn html_decode(s: &str) -> String {
    s.replace("&amp;", "&")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&nbsp;", " ")
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r##"
        <div class="result__body">
          <a class="result__a" href="https://example.com">Boiling point of water</a>
          <a class="result__snippet" href="#">Water boils at 100&#176;C at sea level</a>
          <a class="result__url" href="#"> example.com </a>
        </div>
        <div class="result__body">
          <a class="result__a" href="https://other.example">Second &amp; result</a>
        </div>
    "##;

    #[test]
    fn test_extract_results_parses_title_snippet_url() {
        let results = extract_results(SAMPLE);
        assert_eq!(results.len(), 2);
        assert!(results[0].starts_with("- Boiling point of water:"));
        assert!(results[0].contains("(example.com)"));
        assert_eq!(results[1], "- Second & result");
    }

    #[test]
    fn test_extract_results_empty_page() {
        assert!(extract_results("<html><body>nothing</body></html>").is_empty());
    }

    #[test]
    fn test_html_decode() {
        assert_eq!(html_decode("a &amp; b &lt;c&gt;"), "a & b <c>");
    }

    #[tokio::test]
    async fn test_missing_query_argument() {
        let tool = SearchTool::new();
        let err = tool.invoke(&ToolArgs::new()).await.unwrap_err();
        assert!(matches!(err, ToolError::MissingArgument { .. }));
    }
}
