//! Persistent memory: short-term recall log and full trace log.
//!
//! Two independent append-only record streams with different retention
//! semantics. The recall log feeds (question, answer) pairs back into the
//! first THINK step of later sessions; the trace log captures every step of
//! every session for offline retraining and debugging, and is never read
//! back into a live session.

mod sqlite;

pub use sqlite::SqliteMemory;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::StorageResult;
use crate::session::{Session, SessionState, Step};

/// One persisted (question, answer) pair in the recall log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryRecord {
    /// Insertion-order key, assigned by the store on append.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    /// When the record was appended.
    pub created_at: DateTime<Utc>,
    /// The question as asked.
    pub question: String,
    /// The final answer text.
    pub answer: String,
}

impl MemoryRecord {
    /// Create a new record for a finished question
    pub fn new(question: impl Into<String>, answer: impl Into<String>) -> Self {
        Self {
            id: None,
            created_at: Utc::now(),
            question: question.into(),
            answer: answer.into(),
        }
    }
}

/// One fully serialized session in the trace log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraceRecord {
    /// Insertion-order key, assigned by the store on append.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    /// When the record was appended.
    pub created_at: DateTime<Utc>,
    /// The question the session answered.
    pub question: String,
    /// Terminal outcome of the session.
    pub outcome: SessionState,
    /// The session's complete ordered step sequence.
    pub steps: Vec<Step>,
}

impl TraceRecord {
    /// Serialize a terminal session into a trace record
    pub fn from_session(session: &Session) -> Self {
        Self {
            id: None,
            created_at: Utc::now(),
            question: session.question().to_string(),
            outcome: session.state(),
            steps: session.steps().to_vec(),
        }
    }
}

/// Append-only memory store backing recall and tracing.
///
/// Implementations must tolerate concurrent appenders without losing or
/// truncating prior entries, and must skip (not abort on) malformed records
/// encountered during reads.
#[async_trait]
pub trait MemoryStore: Send + Sync {
    /// Append a (question, answer) pair to the recall log.
    async fn append_recall(&self, record: &MemoryRecord) -> StorageResult<()>;

    /// Fetch at most `limit` recall records: most-recent records matching
    /// `question` first, backfilled with the most recent overall.
    async fn recall(&self, question: &str, limit: usize) -> StorageResult<Vec<MemoryRecord>>;

    /// Append a terminal session's trace to the trace log.
    async fn append_trace(&self, record: &TraceRecord) -> StorageResult<()>;

    /// Fetch the most recent `limit` traces, newest first. Offline use only.
    async fn recent_traces(&self, limit: usize) -> StorageResult<Vec<TraceRecord>>;
}
