//! Reasoning loop orchestrator.
//!
//! Drives the THINK -> ACT -> OBSERVE -> REFLECT state machine for one
//! session until an ANSWER is produced or the step budget runs out. The
//! orchestrator owns the two safety invariants: the step budget and the
//! attempted-action set, both of which hold regardless of what the decision
//! policy returns.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::mpsc::UnboundedSender;
use tracing::{error, info, warn};

use crate::completion::{CompletionClient, CompletionOptions};
use crate::config::{LoopConfig, RequestConfig};
use crate::error::{AppResult, CompletionResult, ToolError};
use crate::memory::{MemoryRecord, MemoryStore, TraceRecord};
use crate::policy::{Decision, DecisionPolicy, PolicyContext};
use crate::prompts::synthesis_prompt;
use crate::scorer::ConfidenceScorer;
use crate::session::{attempt_key, Session, SessionState, Step, ToolArgs, ToolResult};
use crate::tools::ToolRegistry;

/// Terminal result of one session
#[derive(Debug, Clone)]
pub struct SessionOutcome {
    /// Session identifier.
    pub session_id: String,
    /// The question asked.
    pub question: String,
    /// Final answer text. Always present, even for degraded outcomes.
    pub answer: String,
    /// Terminal state: `Answered`, or `Aborted` for degraded outcomes.
    pub state: SessionState,
    /// The complete recorded step sequence.
    pub steps: Vec<Step>,
}

impl SessionOutcome {
    /// Whether the answer was produced under degraded conditions
    pub fn is_degraded(&self) -> bool {
        self.state == SessionState::Aborted
    }
}

/// Why the loop is ending.
enum Finish {
    /// Evidence suffices or the policy declared readiness.
    Ready { draft: Option<String> },
    /// Step budget exhausted; answer from whatever evidence exists.
    BudgetExhausted,
    /// The completion endpoint failed twice in a row.
    CompletionFailed(String),
}

/// Drives reasoning sessions over the registry, scorer, and memory store
pub struct Orchestrator {
    client: Arc<dyn CompletionClient>,
    policy: Arc<dyn DecisionPolicy>,
    scorer: ConfidenceScorer,
    tools: Arc<ToolRegistry>,
    memory: Arc<dyn MemoryStore>,
    options: CompletionOptions,
    loop_config: LoopConfig,
    request_config: RequestConfig,
    step_tx: Option<UnboundedSender<Step>>,
}

impl Orchestrator {
    /// Create an orchestrator from its collaborators
    pub fn new(
        client: Arc<dyn CompletionClient>,
        policy: Arc<dyn DecisionPolicy>,
        tools: Arc<ToolRegistry>,
        memory: Arc<dyn MemoryStore>,
        options: CompletionOptions,
        loop_config: LoopConfig,
        request_config: RequestConfig,
    ) -> Self {
        Self {
            scorer: ConfidenceScorer::new(client.clone()),
            client,
            policy,
            tools,
            memory,
            options,
            loop_config,
            request_config,
            step_tx: None,
        }
    }

    /// Stream every recorded step to the given channel (for a front-end).
    /// A closed receiver is ignored.
    pub fn with_step_listener(mut self, tx: UnboundedSender<Step>) -> Self {
        self.step_tx = Some(tx);
        self
    }

    /// Run one full session for a question and return its terminal outcome
    pub async fn answer(&self, question: &str) -> AppResult<SessionOutcome> {
        let mut session = Session::new(question);
        info!(session_id = %session.id(), question, "Session started");

        let recalled = match self
            .memory
            .recall(question, self.loop_config.recall_limit)
            .await
        {
            Ok(records) => records,
            Err(e) => {
                warn!(error = %e, "Recall log unavailable, continuing without memory");
                Vec::new()
            }
        };
        let catalog = self.tools.catalog();
        let mut repeat_note: Option<String> = None;

        loop {
            if session.step_count() >= self.loop_config.max_steps {
                warn!(
                    session_id = %session.id(),
                    steps = session.step_count(),
                    "Step budget exhausted"
                );
                return self.finish(session, Finish::BudgetExhausted).await;
            }

            // THINK
            let decision = {
                let ctx = PolicyContext {
                    question,
                    steps: session.steps(),
                    recalled: &recalled,
                    tools: &catalog,
                    repeat_note: repeat_note.as_deref(),
                };
                self.decide_with_retry(&ctx).await
            };
            repeat_note = None;

            let decision = match decision {
                Ok(decision) => decision,
                Err(e) => {
                    error!(session_id = %session.id(), error = %e, "Decision failed after retry");
                    return self
                        .finish(session, Finish::CompletionFailed(e.to_string()))
                        .await;
                }
            };

            match decision {
                Decision::Answer { thought, draft } => {
                    let content = if thought.trim().is_empty() {
                        "ready to answer".to_string()
                    } else {
                        thought
                    };
                    let step = session.append_think(content)?;
                    self.emit(step);

                    let draft = Some(draft).filter(|d| !d.trim().is_empty());
                    return self.finish(session, Finish::Ready { draft }).await;
                }
                Decision::CallTool {
                    thought,
                    tool,
                    arguments,
                } => {
                    let content = if thought.trim().is_empty() {
                        format!("call {}", tool)
                    } else {
                        thought
                    };
                    let step = session.append_think(content)?;
                    self.emit(step);

                    // Loop prevention: an identical attempt never executes
                    // twice. The decision is rejected and THINK re-entered
                    // with a note forcing a different choice.
                    if session.already_attempted(&tool, &arguments) {
                        let key = attempt_key(&tool, &arguments);
                        warn!(session_id = %session.id(), attempt = %key, "Repeated action rejected");
                        repeat_note = Some(format!(
                            "The action {} was already attempted in this session. \
                             Choose a different tool or different arguments, or answer.",
                            key
                        ));
                        continue;
                    }

                    // ACT and its paired OBSERVE must both fit in the budget.
                    if session.step_count() + 2 > self.loop_config.max_steps {
                        return self.finish(session, Finish::BudgetExhausted).await;
                    }

                    // ACT
                    let step = session.append_act(&tool, &arguments)?;
                    self.emit(step);

                    let raw = self.invoke_tool(&tool, &arguments).await;

                    // OBSERVE, always scored
                    let relevance = self.scorer.score(question, &raw).await;
                    let result =
                        ToolResult::new(raw).with_score(relevance.score, relevance.rationale);
                    let step = session.append_observe(&tool, &arguments, result)?;
                    self.emit(step);

                    // REFLECT
                    if session.step_count() >= self.loop_config.max_steps {
                        return self.finish(session, Finish::BudgetExhausted).await;
                    }

                    if relevance.score >= self.loop_config.relevance_threshold
                        && session.act_count() >= self.loop_config.min_tool_calls
                    {
                        let step = session.append_reflect(format!(
                            "evidence sufficient (relevance {:.2} >= {:.2})",
                            relevance.score, self.loop_config.relevance_threshold
                        ))?;
                        self.emit(step);
                        return self.finish(session, Finish::Ready { draft: None }).await;
                    }

                    let step = session.append_reflect(format!(
                        "evidence insufficient (relevance {:.2}); continuing",
                        relevance.score
                    ))?;
                    self.emit(step);
                }
            }
        }
    }

    /// Append the terminal ANSWER step and persist both memory logs.
    async fn finish(&self, mut session: Session, how: Finish) -> AppResult<SessionOutcome> {
        let (answer, state) = match how {
            Finish::Ready { draft } => match self.synthesize_with_retry(&session, false).await {
                Ok(text) => (text, SessionState::Answered),
                Err(e) => {
                    error!(session_id = %session.id(), error = %e, "Synthesis failed after retry");
                    (
                        self.degraded_answer(&session, &e.to_string(), draft.as_deref()),
                        SessionState::Aborted,
                    )
                }
            },
            Finish::BudgetExhausted => match self.synthesize_with_retry(&session, true).await {
                Ok(text) => (text, SessionState::Aborted),
                Err(e) => {
                    error!(session_id = %session.id(), error = %e, "Synthesis failed after retry");
                    (
                        self.degraded_answer(&session, &e.to_string(), None),
                        SessionState::Aborted,
                    )
                }
            },
            Finish::CompletionFailed(reason) => (
                self.degraded_answer(&session, &reason, None),
                SessionState::Aborted,
            ),
        };

        let step = session.append_answer(answer.clone(), state)?;
        self.emit(step);

        info!(
            session_id = %session.id(),
            outcome = %state,
            steps = session.step_count(),
            "Session finished"
        );

        // Write-after-complete: both logs always record the terminal
        // outcome. A failing store costs the record, not the answer.
        let record = MemoryRecord::new(session.question(), &answer);
        if let Err(e) = self.memory.append_recall(&record).await {
            error!(session_id = %session.id(), error = %e, "Failed to append recall record");
        }

        let trace = TraceRecord::from_session(&session);
        if let Err(e) = self.memory.append_trace(&trace).await {
            error!(session_id = %session.id(), error = %e, "Failed to append trace record");
        }

        Ok(SessionOutcome {
            session_id: session.id().to_string(),
            question: session.question().to_string(),
            answer,
            state,
            steps: session.steps().to_vec(),
        })
    }

    /// Invoke a tool through the registry, folding every failure mode into
    /// the observation text so the loop can route around it.
    async fn invoke_tool(&self, name: &str, arguments: &ToolArgs) -> String {
        let tool = match self.tools.get(name) {
            Ok(tool) => tool,
            Err(e) => {
                warn!(tool = name, error = %e, "Tool lookup failed");
                return format!("[tool error] {}", e);
            }
        };

        let timeout = Duration::from_millis(self.request_config.tool_timeout_ms);
        let started = Instant::now();

        match tokio::time::timeout(timeout, tool.invoke(arguments)).await {
            Ok(Ok(text)) => {
                info!(
                    tool = name,
                    latency_ms = started.elapsed().as_millis() as u64,
                    "Tool invocation succeeded"
                );
                if text.trim().is_empty() {
                    "(no data returned)".to_string()
                } else {
                    text
                }
            }
            Ok(Err(e)) => {
                warn!(
                    tool = name,
                    latency_ms = started.elapsed().as_millis() as u64,
                    error = %e,
                    "Tool invocation failed"
                );
                format!("[tool error] {}", e)
            }
            Err(_) => {
                let e = ToolError::Timeout {
                    name: name.to_string(),
                    timeout_ms: self.request_config.tool_timeout_ms,
                };
                warn!(tool = name, error = %e, "Tool invocation timed out");
                format!("[tool error] {}", e)
            }
        }
    }

    async fn decide_with_retry(&self, ctx: &PolicyContext<'_>) -> CompletionResult<Decision> {
        match self.policy.decide(ctx).await {
            Ok(decision) => Ok(decision),
            Err(first) => {
                warn!(
                    error = %first,
                    backoff_ms = self.request_config.retry_backoff_ms,
                    "Decision completion failed, retrying once"
                );
                tokio::time::sleep(Duration::from_millis(self.request_config.retry_backoff_ms))
                    .await;
                self.policy.decide(ctx).await
            }
        }
    }

    async fn synthesize_with_retry(
        &self,
        session: &Session,
        degraded: bool,
    ) -> CompletionResult<String> {
        let prompt = synthesis_prompt(session.question(), session.steps(), degraded);

        match self.client.complete(&prompt, &self.options).await {
            Ok(text) => Ok(text),
            Err(first) => {
                warn!(
                    error = %first,
                    backoff_ms = self.request_config.retry_backoff_ms,
                    "Synthesis completion failed, retrying once"
                );
                tokio::time::sleep(Duration::from_millis(self.request_config.retry_backoff_ms))
                    .await;
                self.client.complete(&prompt, &self.options).await
            }
        }
    }

    /// Build the canned degraded answer used when the model cannot help.
    fn degraded_answer(&self, session: &Session, reason: &str, draft: Option<&str>) -> String {
        let mut answer = format!(
            "Reasoning could not complete ({}); this answer is degraded.",
            reason
        );
        if let Some(draft) = draft {
            answer.push_str(&format!(" Partial answer: {}", draft));
        } else if let Some(best) = session.best_observation() {
            answer.push_str(&format!(
                " Best available evidence: {}",
                truncate(&best.content, 400)
            ));
        }
        answer
    }

    fn emit(&self, step: &Step) {
        if let Some(tx) = &self.step_tx {
            let _ = tx.send(step.clone());
        }
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        text.to_string()
    } else {
        let cut: String = text.chars().take(max_chars).collect();
        format!("{}...", cut)
    }
}
