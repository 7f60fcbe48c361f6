use thiserror::Error;

/// Application-level errors
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Completion error: {0}")]
    Completion(#[from] CompletionError),

    #[error("Tool error: {0}")]
    Tool(#[from] ToolError),

    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    #[error("Internal error: {message}")]
    Internal { message: String },
}

/// Storage layer errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database connection failed: {message}")]
    Connection { message: String },

    #[error("Query failed: {message}")]
    Query { message: String },

    #[error("Migration failed: {message}")]
    Migration { message: String },

    #[error("SQLx error: {0}")]
    Sqlx(#[from] sqlx::Error),
}

/// Completion endpoint errors
#[derive(Debug, Error)]
pub enum CompletionError {
    #[error("Completion endpoint unreachable: {message}")]
    Unreachable { message: String },

    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    #[error("Invalid response: {message}")]
    InvalidResponse { message: String },

    #[error("Request timeout after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Tool dispatch and invocation errors
#[derive(Debug, Error)]
pub enum ToolError {
    #[error("Tool not found: {name}")]
    NotFound { name: String },

    #[error("Tool {name} missing argument: {argument}")]
    MissingArgument { name: String, argument: String },

    #[error("Tool {name} failed: {message}")]
    Invocation { name: String, message: String },

    #[error("Tool {name} timed out after {timeout_ms}ms")]
    Timeout { name: String, timeout_ms: u64 },
}

/// Session invariant violations.
///
/// These are defensive checks. The orchestrator is written so that none of
/// them can trigger; seeing one at runtime means an orchestrator bug, not a
/// recoverable condition.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("loop prevention violated in session {session_id}: {attempt} already executed")]
    LoopPrevention { session_id: String, attempt: String },

    #[error("step appended to terminal session {session_id}")]
    TerminalSession { session_id: String },

    #[error("invalid step transition in session {session_id}: {from} -> {to}")]
    InvalidTransition {
        session_id: String,
        from: String,
        to: String,
    },
}

/// Result type alias for application errors
pub type AppResult<T> = Result<T, AppError>;

/// Result type alias for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Result type alias for completion operations
pub type CompletionResult<T> = Result<T, CompletionError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_app_error_display() {
        let err = AppError::Config {
            message: "missing key".to_string(),
        };
        assert_eq!(err.to_string(), "Configuration error: missing key");

        let err = AppError::Internal {
            message: "unexpected".to_string(),
        };
        assert_eq!(err.to_string(), "Internal error: unexpected");
    }

    #[test]
    fn test_storage_error_display() {
        let err = StorageError::Connection {
            message: "failed to connect".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Database connection failed: failed to connect"
        );

        let err = StorageError::Query {
            message: "syntax error".to_string(),
        };
        assert_eq!(err.to_string(), "Query failed: syntax error");

        let err = StorageError::Migration {
            message: "version mismatch".to_string(),
        };
        assert_eq!(err.to_string(), "Migration failed: version mismatch");
    }

    #[test]
    fn test_completion_error_display() {
        let err = CompletionError::Unreachable {
            message: "connection refused".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Completion endpoint unreachable: connection refused"
        );

        let err = CompletionError::Api {
            status: 401,
            message: "unauthorized".to_string(),
        };
        assert_eq!(err.to_string(), "API error: 401 - unauthorized");

        let err = CompletionError::InvalidResponse {
            message: "no choices".to_string(),
        };
        assert_eq!(err.to_string(), "Invalid response: no choices");

        let err = CompletionError::Timeout { timeout_ms: 5000 };
        assert_eq!(err.to_string(), "Request timeout after 5000ms");
    }

    #[test]
    fn test_tool_error_display() {
        let err = ToolError::NotFound {
            name: "nonexistent".to_string(),
        };
        assert_eq!(err.to_string(), "Tool not found: nonexistent");

        let err = ToolError::MissingArgument {
            name: "search".to_string(),
            argument: "query".to_string(),
        };
        assert_eq!(err.to_string(), "Tool search missing argument: query");

        let err = ToolError::Invocation {
            name: "search".to_string(),
            message: "network down".to_string(),
        };
        assert_eq!(err.to_string(), "Tool search failed: network down");

        let err = ToolError::Timeout {
            name: "search".to_string(),
            timeout_ms: 3000,
        };
        assert_eq!(err.to_string(), "Tool search timed out after 3000ms");
    }

    #[test]
    fn test_session_error_display() {
        let err = SessionError::LoopPrevention {
            session_id: "sess-123".to_string(),
            attempt: "search(query=rust)".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "loop prevention violated in session sess-123: search(query=rust) already executed"
        );

        let err = SessionError::TerminalSession {
            session_id: "sess-123".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "step appended to terminal session sess-123"
        );
    }

    #[test]
    fn test_tool_error_conversion_to_app_error() {
        let tool_err = ToolError::NotFound {
            name: "missing".to_string(),
        };
        let app_err: AppError = tool_err.into();
        assert!(matches!(app_err, AppError::Tool(_)));
        assert!(app_err.to_string().contains("Tool not found"));
    }

    #[test]
    fn test_completion_error_conversion_to_app_error() {
        let err = CompletionError::Timeout { timeout_ms: 1000 };
        let app_err: AppError = err.into();
        assert!(matches!(app_err, AppError::Completion(_)));
    }

    #[test]
    fn test_storage_error_conversion_to_app_error() {
        let err = StorageError::Query {
            message: "bad".to_string(),
        };
        let app_err: AppError = err.into();
        assert!(matches!(app_err, AppError::Storage(_)));
    }
}
