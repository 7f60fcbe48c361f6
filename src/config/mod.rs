use std::env;
use std::path::PathBuf;

use crate::error::AppError;

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    pub completion: CompletionEndpointConfig,
    pub database: DatabaseConfig,
    pub logging: LoggingConfig,
    pub request: RequestConfig,
    pub reasoning: LoopConfig,
}

/// OpenAI-compatible completion endpoint configuration
#[derive(Debug, Clone)]
pub struct CompletionEndpointConfig {
    pub base_url: String,
    pub api_key: String,
    pub model: String,
    pub temperature: f64,
    pub max_tokens: u32,
}

/// Database configuration
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub path: PathBuf,
    pub max_connections: u32,
}

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

/// Log output format
#[derive(Debug, Clone, PartialEq)]
pub enum LogFormat {
    Pretty,
    Json,
}

/// Suspension-point timeouts and retry backoff
#[derive(Debug, Clone)]
pub struct RequestConfig {
    pub timeout_ms: u64,
    pub tool_timeout_ms: u64,
    pub retry_backoff_ms: u64,
}

/// Reasoning loop policy knobs.
///
/// The relevance threshold and step budget are deliberately configuration
/// rather than constants; deployments tune them per model quality.
#[derive(Debug, Clone)]
pub struct LoopConfig {
    /// Hard bound on recorded steps before the session is forced to answer.
    pub max_steps: usize,
    /// Minimum observation relevance score considered sufficient evidence.
    pub relevance_threshold: f64,
    /// Completed tool calls required before a high score can end the session.
    pub min_tool_calls: usize,
    /// Most-recent memory records surfaced to the first THINK step.
    pub recall_limit: usize,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, AppError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let completion = CompletionEndpointConfig {
            base_url: env::var("COMPLETION_BASE_URL")
                .unwrap_or_else(|_| "http://localhost:1234/v1".to_string()),
            api_key: env::var("COMPLETION_API_KEY").unwrap_or_else(|_| "lm-studio".to_string()),
            model: env::var("COMPLETION_MODEL")
                .unwrap_or_else(|_| "tinyllama-1.1b-chat-v1.0".to_string()),
            temperature: env::var("COMPLETION_TEMPERATURE")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(0.6),
            max_tokens: env::var("COMPLETION_MAX_TOKENS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(800),
        };

        let database = DatabaseConfig {
            path: PathBuf::from(
                env::var("DATABASE_PATH").unwrap_or_else(|_| "./data/reagent.db".to_string()),
            ),
            max_connections: env::var("DATABASE_MAX_CONNECTIONS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(5),
        };

        let logging = LoggingConfig {
            level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            format: match env::var("LOG_FORMAT")
                .unwrap_or_else(|_| "pretty".to_string())
                .to_lowercase()
                .as_str()
            {
                "json" => LogFormat::Json,
                _ => LogFormat::Pretty,
            },
        };

        let request = RequestConfig {
            timeout_ms: env::var("REQUEST_TIMEOUT_MS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(30000),
            tool_timeout_ms: env::var("TOOL_TIMEOUT_MS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(30000),
            retry_backoff_ms: env::var("RETRY_BACKOFF_MS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(500),
        };

        let reasoning = LoopConfig {
            max_steps: env::var("MAX_STEPS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(6),
            relevance_threshold: env::var("RELEVANCE_THRESHOLD")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(0.6),
            min_tool_calls: env::var("MIN_TOOL_CALLS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(2),
            recall_limit: env::var("RECALL_LIMIT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(3),
        };

        if reasoning.max_steps == 0 {
            return Err(AppError::Config {
                message: "MAX_STEPS must be at least 1".to_string(),
            });
        }

        if !(0.0..=1.0).contains(&reasoning.relevance_threshold) {
            return Err(AppError::Config {
                message: format!(
                    "RELEVANCE_THRESHOLD must be within [0.0, 1.0], got {}",
                    reasoning.relevance_threshold
                ),
            });
        }

        Ok(Config {
            completion,
            database,
            logging,
            request,
            reasoning,
        })
    }
}

impl Default for RequestConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 30000,
            tool_timeout_ms: 30000,
            retry_backoff_ms: 500,
        }
    }
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            max_steps: 6,
            relevance_threshold: 0.6,
            min_tool_calls: 2,
            recall_limit: 3,
        }
    }
}
