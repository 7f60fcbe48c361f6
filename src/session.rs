//! Session and step data model for one reasoning attempt.
//!
//! A [`Session`] owns the ordered step record of a single question. All
//! mutation goes through the `append_*` methods, which enforce the
//! structural invariants: contiguous step indices, ACT always paired with a
//! following OBSERVE, no step after the terminal ANSWER, and no repeated
//! (tool, arguments) execution.

use std::collections::{BTreeMap, HashSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::SessionError;

/// Tool invocation arguments.
///
/// A BTreeMap keeps key order canonical, so two invocations with the same
/// arguments always produce the same [`attempt_key`].
pub type ToolArgs = BTreeMap<String, String>;

/// Canonical identity of one (tool, arguments) invocation, used for loop
/// prevention.
pub fn attempt_key(tool: &str, arguments: &ToolArgs) -> String {
    let args: Vec<String> = arguments
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect();
    format!("{}({})", tool, args.join(","))
}

/// Kind of a recorded state-machine transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepKind {
    /// Reasoning fragment plus a decision about what to do next.
    Think,
    /// A tool was selected and invoked.
    Act,
    /// The tool result, wrapped and scored.
    Observe,
    /// Decision whether the evidence suffices.
    Reflect,
    /// Terminal step carrying the final answer text.
    Answer,
}

impl std::fmt::Display for StepKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StepKind::Think => write!(f, "think"),
            StepKind::Act => write!(f, "act"),
            StepKind::Observe => write!(f, "observe"),
            StepKind::Reflect => write!(f, "reflect"),
            StepKind::Answer => write!(f, "answer"),
        }
    }
}

impl std::str::FromStr for StepKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "think" => Ok(StepKind::Think),
            "act" => Ok(StepKind::Act),
            "observe" => Ok(StepKind::Observe),
            "reflect" => Ok(StepKind::Reflect),
            "answer" => Ok(StepKind::Answer),
            _ => Err(format!("Unknown step kind: {}", s)),
        }
    }
}

/// Terminal state of a session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// Still reasoning.
    #[default]
    Pending,
    /// Answered normally.
    Answered,
    /// Forced to a degraded answer (budget exhausted or completion failure).
    Aborted,
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionState::Pending => write!(f, "pending"),
            SessionState::Answered => write!(f, "answered"),
            SessionState::Aborted => write!(f, "aborted"),
        }
    }
}

impl std::str::FromStr for SessionState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(SessionState::Pending),
            "answered" => Ok(SessionState::Answered),
            "aborted" => Ok(SessionState::Aborted),
            _ => Err(format!("Unknown session state: {}", s)),
        }
    }
}

/// Output of one tool invocation, scored after observation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolResult {
    /// Raw text returned by the tool, or the failure note.
    pub result: String,
    /// Relevance score in [0.0, 1.0] assigned by the confidence scorer.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
    /// One-line scorer rationale.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rationale: Option<String>,
}

impl ToolResult {
    /// Create an unscored result from raw tool output
    pub fn new(result: impl Into<String>) -> Self {
        Self {
            result: result.into(),
            score: None,
            rationale: None,
        }
    }

    /// Attach the relevance score and rationale
    pub fn with_score(mut self, score: f64, rationale: impl Into<String>) -> Self {
        self.score = Some(score.clamp(0.0, 1.0));
        self.rationale = Some(rationale.into());
        self
    }
}

/// One immutable state-machine transition within a session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Step {
    /// Position in the session, contiguous from 0.
    pub index: u32,
    /// Transition kind.
    pub state: StepKind,
    /// Reasoning fragment or tool output.
    pub content: String,
    /// Tool name, for act/observe steps.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool: Option<String>,
    /// Tool arguments, for act/observe steps.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub arguments: Option<ToolArgs>,
    /// Raw tool result text, for observe steps.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,
    /// Relevance score, for observe steps.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
    /// Scorer rationale, for observe steps.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rationale: Option<String>,
}

impl Step {
    /// View an observe step's fields as a [`ToolResult`]
    pub fn tool_result(&self) -> Option<ToolResult> {
        self.result.as_ref().map(|result| ToolResult {
            result: result.clone(),
            score: self.score,
            rationale: self.rationale.clone(),
        })
    }
}

/// One end-to-end answer attempt for a single question.
#[derive(Debug, Clone)]
pub struct Session {
    id: String,
    question: String,
    created_at: DateTime<Utc>,
    steps: Vec<Step>,
    attempted: HashSet<String>,
    state: SessionState,
}

impl Session {
    /// Start a new pending session for a question
    pub fn new(question: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            question: question.into(),
            created_at: Utc::now(),
            steps: Vec::new(),
            attempted: HashSet::new(),
            state: SessionState::Pending,
        }
    }

    /// Session identifier
    pub fn id(&self) -> &str {
        &self.id
    }

    /// The question this session answers
    pub fn question(&self) -> &str {
        &self.question
    }

    /// When the session was created
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Current terminal state
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Whether a terminal answer step has been recorded
    pub fn is_terminal(&self) -> bool {
        self.state != SessionState::Pending
    }

    /// Recorded steps, in order
    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    /// Number of recorded steps
    pub fn step_count(&self) -> usize {
        self.steps.len()
    }

    /// Number of completed tool calls
    pub fn act_count(&self) -> usize {
        self.steps
            .iter()
            .filter(|s| s.state == StepKind::Act)
            .count()
    }

    /// Whether this (tool, arguments) pair has already been executed
    pub fn already_attempted(&self, tool: &str, arguments: &ToolArgs) -> bool {
        self.attempted.contains(&attempt_key(tool, arguments))
    }

    /// The highest-scored observation so far, if any
    pub fn best_observation(&self) -> Option<&Step> {
        self.steps
            .iter()
            .filter(|s| s.state == StepKind::Observe)
            .max_by(|a, b| {
                let sa = a.score.unwrap_or(0.0);
                let sb = b.score.unwrap_or(0.0);
                sa.total_cmp(&sb)
            })
    }

    /// Append a THINK step
    pub fn append_think(&mut self, content: impl Into<String>) -> Result<&Step, SessionError> {
        self.push(StepKind::Think, content.into(), None, None, None)
    }

    /// Append an ACT step, registering the attempt for loop prevention
    pub fn append_act(&mut self, tool: &str, arguments: &ToolArgs) -> Result<&Step, SessionError> {
        let key = attempt_key(tool, arguments);
        if !self.attempted.insert(key.clone()) {
            return Err(SessionError::LoopPrevention {
                session_id: self.id.clone(),
                attempt: key,
            });
        }
        self.push(
            StepKind::Act,
            key,
            Some(tool.to_string()),
            Some(arguments.clone()),
            None,
        )
    }

    /// Append an OBSERVE step wrapping a scored tool result
    pub fn append_observe(
        &mut self,
        tool: &str,
        arguments: &ToolArgs,
        result: ToolResult,
    ) -> Result<&Step, SessionError> {
        self.push(
            StepKind::Observe,
            result.result.clone(),
            Some(tool.to_string()),
            Some(arguments.clone()),
            Some(result),
        )
    }

    /// Append a REFLECT step
    pub fn append_reflect(&mut self, content: impl Into<String>) -> Result<&Step, SessionError> {
        self.push(StepKind::Reflect, content.into(), None, None, None)
    }

    /// Append the terminal ANSWER step and mark the session terminal.
    ///
    /// `state` must be `Answered` or `Aborted`.
    pub fn append_answer(
        &mut self,
        content: impl Into<String>,
        state: SessionState,
    ) -> Result<&Step, SessionError> {
        debug_assert_ne!(state, SessionState::Pending);
        self.push(StepKind::Answer, content.into(), None, None, None)?;
        self.state = state;
        Ok(&self.steps[self.steps.len() - 1])
    }

    fn push(
        &mut self,
        kind: StepKind,
        content: String,
        tool: Option<String>,
        arguments: Option<ToolArgs>,
        result: Option<ToolResult>,
    ) -> Result<&Step, SessionError> {
        let (result, score, rationale) = match result {
            Some(r) => (Some(r.result), r.score, r.rationale),
            None => (None, None, None),
        };

        if self.is_terminal() {
            return Err(SessionError::TerminalSession {
                session_id: self.id.clone(),
            });
        }

        // An ACT step must be resolved by exactly one OBSERVE before anything
        // else is recorded, and OBSERVE is only valid directly after ACT.
        let last = self.steps.last().map(|s| s.state);
        let after_act = last == Some(StepKind::Act);
        if after_act != (kind == StepKind::Observe) {
            return Err(SessionError::InvalidTransition {
                session_id: self.id.clone(),
                from: last.map_or_else(|| "start".to_string(), |k| k.to_string()),
                to: kind.to_string(),
            });
        }

        let index = self.steps.len();
        self.steps.push(Step {
            index: index as u32,
            state: kind,
            content,
            tool,
            arguments,
            result,
            score,
            rationale,
        });
        Ok(&self.steps[index])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(pairs: &[(&str, &str)]) -> ToolArgs {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_attempt_key_is_canonical() {
        let mut a = ToolArgs::new();
        a.insert("query".to_string(), "rust".to_string());
        a.insert("limit".to_string(), "5".to_string());

        let mut b = ToolArgs::new();
        b.insert("limit".to_string(), "5".to_string());
        b.insert("query".to_string(), "rust".to_string());

        assert_eq!(attempt_key("search", &a), attempt_key("search", &b));
        assert_eq!(attempt_key("search", &a), "search(limit=5,query=rust)");
    }

    #[test]
    fn test_step_indices_are_contiguous() {
        let mut session = Session::new("q");
        session.append_think("first").unwrap();
        session
            .append_act("echo", &args(&[("text", "hi")]))
            .unwrap();
        session
            .append_observe("echo", &args(&[("text", "hi")]), ToolResult::new("Echo: hi"))
            .unwrap();
        session.append_reflect("continue").unwrap();

        let indices: Vec<u32> = session.steps().iter().map(|s| s.index).collect();
        assert_eq!(indices, vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_repeated_attempt_is_rejected() {
        let mut session = Session::new("q");
        let a = args(&[("query", "rust")]);

        session.append_think("t").unwrap();
        session.append_act("search", &a).unwrap();
        session
            .append_observe("search", &a, ToolResult::new("results"))
            .unwrap();

        assert!(session.already_attempted("search", &a));
        let err = session.append_act("search", &a).unwrap_err();
        assert!(matches!(err, SessionError::LoopPrevention { .. }));
    }

    #[test]
    fn test_same_tool_different_arguments_is_allowed() {
        let mut session = Session::new("q");
        session.append_think("t").unwrap();
        session.append_act("search", &args(&[("query", "a")])).unwrap();
        session
            .append_observe("search", &args(&[("query", "a")]), ToolResult::new("r"))
            .unwrap();
        session.append_reflect("continue").unwrap();

        assert!(session.append_act("search", &args(&[("query", "b")])).is_ok());
    }

    #[test]
    fn test_act_must_be_followed_by_observe() {
        let mut session = Session::new("q");
        session.append_think("t").unwrap();
        session.append_act("echo", &args(&[("text", "x")])).unwrap();

        let err = session.append_think("again").unwrap_err();
        assert!(matches!(err, SessionError::InvalidTransition { .. }));
    }

    #[test]
    fn test_observe_requires_preceding_act() {
        let mut session = Session::new("q");
        session.append_think("t").unwrap();

        let err = session
            .append_observe("echo", &args(&[]), ToolResult::new("r"))
            .unwrap_err();
        assert!(matches!(err, SessionError::InvalidTransition { .. }));
    }

    #[test]
    fn test_answer_makes_session_terminal() {
        let mut session = Session::new("q");
        session.append_think("ready").unwrap();
        session
            .append_answer("42", SessionState::Answered)
            .unwrap();

        assert!(session.is_terminal());
        assert_eq!(session.state(), SessionState::Answered);

        let err = session.append_think("more").unwrap_err();
        assert!(matches!(err, SessionError::TerminalSession { .. }));
    }

    #[test]
    fn test_tool_result_score_is_clamped() {
        let r = ToolResult::new("text").with_score(1.7, "high");
        assert_eq!(r.score, Some(1.0));

        let r = ToolResult::new("text").with_score(-0.2, "low");
        assert_eq!(r.score, Some(0.0));
    }

    #[test]
    fn test_best_observation_picks_highest_score() {
        let mut session = Session::new("q");
        session.append_think("t").unwrap();
        session.append_act("a", &args(&[("x", "1")])).unwrap();
        session
            .append_observe(
                "a",
                &args(&[("x", "1")]),
                ToolResult::new("weak").with_score(0.2, "weak"),
            )
            .unwrap();
        session.append_reflect("continue").unwrap();
        session.append_act("a", &args(&[("x", "2")])).unwrap();
        session
            .append_observe(
                "a",
                &args(&[("x", "2")]),
                ToolResult::new("strong").with_score(0.9, "strong"),
            )
            .unwrap();

        let best = session.best_observation().unwrap();
        assert_eq!(best.content, "strong");
    }

    #[test]
    fn test_observe_step_serializes_scored_fields() {
        let mut session = Session::new("q");
        session.append_think("t").unwrap();
        session.append_act("echo", &args(&[("text", "hi")])).unwrap();
        session
            .append_observe(
                "echo",
                &args(&[("text", "hi")]),
                ToolResult::new("Echo: hi").with_score(0.5, "neutral"),
            )
            .unwrap();

        let json = serde_json::to_value(&session.steps()[2]).unwrap();
        assert_eq!(json["state"], "observe");
        assert_eq!(json["result"], "Echo: hi");
        assert_eq!(json["score"], 0.5);
        assert_eq!(json["rationale"], "neutral");
    }
}
