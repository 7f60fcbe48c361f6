//! Centralized prompt definitions for the reasoning loop
//!
//! This module contains every prompt the core sends to the completion
//! endpoint. Centralizing them makes the model contract easy to audit and
//! version.

use crate::memory::MemoryRecord;
use crate::session::{Step, StepKind};
use crate::tools::ToolSpec;

/// System message sent with every completion request.
pub const AGENT_SYSTEM_PROMPT: &str = "You are a concise, helpful AI agent.";

/// Response contract appended to every decision prompt.
const DECISION_FORMAT: &str = r#"Respond ONLY with JSON in one of these formats:

1) To call a tool:
{"type": "action", "thought": "<why this tool>", "tool": "<tool name>", "arguments": {"<key>": "<value>"}}

2) To answer:
{"type": "final", "thought": "<why you are ready>", "answer": "<your answer>"}"#;

/// Build the THINK decision prompt.
///
/// Carries the tool catalog, recalled memory, the step history so far, and
/// an optional repeated-action note forcing a different choice. The
/// search-before-summarize ordering below is advisory; the model may answer
/// directly when no retrieval is needed.
pub fn decision_prompt(
    question: &str,
    tools: &[ToolSpec],
    recalled: &[MemoryRecord],
    steps: &[Step],
    repeat_note: Option<&str>,
) -> String {
    let mut prompt = String::from("You are a reasoning agent that can THINK and ACT.\n\n");

    prompt.push_str("Available tools:\n");
    for tool in tools {
        prompt.push_str(&format!("- {}: {}\n", tool.name, tool.description));
    }

    prompt.push_str(
        "\nWhen the question needs outside information or up-to-date facts, \
         call the search tool first. When gathered evidence is long, condense \
         it with the summarize tool before answering. Never repeat a tool \
         call you have already made with the same arguments.\n\n",
    );

    prompt.push_str(&format!("Recent memory:\n{}\n\n", render_recalled(recalled)));
    prompt.push_str(&format!("Steps so far:\n{}\n\n", render_steps(steps)));

    if let Some(note) = repeat_note {
        prompt.push_str(&format!("IMPORTANT: {}\n\n", note));
    }

    prompt.push_str(&format!("User question: {}\n\n", question));
    prompt.push_str(DECISION_FORMAT);
    prompt
}

/// Build the relevance evaluation prompt for one observation.
pub fn relevance_prompt(question: &str, observation: &str) -> String {
    format!(
        "Rate how relevant the following observation is for answering the \
         user's question.\n\nQuestion: {}\n\nObservation:\n{}\n\nRespond ONLY \
         with JSON: {{\"score\": <number between 0.0 and 1.0>, \"rationale\": \
         \"<one short sentence>\"}}",
        question, observation
    )
}

/// Build the final answer synthesis prompt.
///
/// When `degraded` is set the model is told reasoning was cut short and the
/// answer must say so.
pub fn synthesis_prompt(question: &str, steps: &[Step], degraded: bool) -> String {
    let caveat = if degraded {
        "Reasoning was cut short before the evidence was conclusive. Open \
         your answer by saying it is incomplete, then give the best answer \
         the evidence supports.\n\n"
    } else {
        ""
    };

    format!(
        "Synthesize a single final answer to the user's question from the \
         recorded reasoning steps and observations below. Answer directly; do \
         not mention the steps themselves.\n\n{}Question: {}\n\nRecorded \
         steps:\n{}\n\nFinal answer:",
        caveat,
        question,
        render_steps(steps)
    )
}

/// Build the condensation prompt used by the summarize tool.
pub fn summarize_prompt(text: &str) -> String {
    format!(
        "Summarize the following text in 3-5 concise bullet points.\n\n\
         TEXT:\n{}\n\nReturn plain text bullets, no JSON.",
        text
    )
}

fn render_recalled(recalled: &[MemoryRecord]) -> String {
    if recalled.is_empty() {
        return "(no prior questions)".to_string();
    }
    recalled
        .iter()
        .map(|r| format!("Q: {}\nA: {}", r.question, r.answer))
        .collect::<Vec<_>>()
        .join("\n---\n")
}

fn render_steps(steps: &[Step]) -> String {
    if steps.is_empty() {
        return "(none yet)".to_string();
    }
    steps
        .iter()
        .map(|s| match s.state {
            StepKind::Observe => {
                let score = s
                    .score
                    .map(|v| format!(" [relevance {:.2}]", v))
                    .unwrap_or_default();
                format!("{}. {}{}: {}", s.index, s.state, score, s.content)
            }
            _ => format!("{}. {}: {}", s.index, s.state, s.content),
        })
        .collect::<Vec<_>>()
        .join("\n")
}
