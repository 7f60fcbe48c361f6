//! Relevance scoring of tool observations.
//!
//! The scorer asks the completion endpoint to rate an observation against
//! the current question. It never fails: anything the model returns is
//! clamped into [0.0, 1.0], and unusable output (or an endpoint failure)
//! falls back to a neutral 0.5 with rationale "unscoreable".

use std::sync::Arc;

use serde::Deserialize;
use tracing::{debug, warn};

use crate::completion::{CompletionClient, CompletionOptions};
use crate::prompts::relevance_prompt;

/// Neutral rationale used whenever the model output cannot be scored.
pub const UNSCOREABLE: &str = "unscoreable";

/// Relevance verdict for one observation
#[derive(Debug, Clone, PartialEq)]
pub struct RelevanceScore {
    /// Score in [0.0, 1.0].
    pub score: f64,
    /// One-line justification.
    pub rationale: String,
}

impl RelevanceScore {
    fn neutral() -> Self {
        Self {
            score: 0.5,
            rationale: UNSCOREABLE.to_string(),
        }
    }
}

#[derive(Deserialize)]
struct RawScore {
    score: f64,
    #[serde(default)]
    rationale: Option<String>,
}

/// Scores observation relevance by delegating to the completion client
pub struct ConfidenceScorer {
    client: Arc<dyn CompletionClient>,
    options: CompletionOptions,
}

impl ConfidenceScorer {
    /// Create a scorer over the given completion client
    pub fn new(client: Arc<dyn CompletionClient>) -> Self {
        Self {
            client,
            // Evaluation wants determinism, not creativity.
            options: CompletionOptions::deterministic(200),
        }
    }

    /// Rate how relevant `observation` is to `question`. Always succeeds.
    pub async fn score(&self, question: &str, observation: &str) -> RelevanceScore {
        let prompt = relevance_prompt(question, observation);

        match self.client.complete(&prompt, &self.options).await {
            Ok(raw) => {
                let parsed = parse_score(&raw);
                debug!(score = parsed.score, "Observation scored");
                parsed
            }
            Err(e) => {
                warn!(error = %e, "Scoring completion failed, using neutral score");
                RelevanceScore::neutral()
            }
        }
    }
}

/// Parse model output into a relevance score.
///
/// Accepts a JSON object, a JSON object embedded in prose, or a bare
/// number; everything else is neutral.
pub fn parse_score(raw: &str) -> RelevanceScore {
    if let Some(parsed) = try_json(raw.trim()) {
        return parsed;
    }

    if let Some(object) = extract_object(raw) {
        if let Some(parsed) = try_json(object) {
            return parsed;
        }
    }

    if let Ok(value) = raw.trim().parse::<f64>() {
        return clamp_score(value, None);
    }

    RelevanceScore::neutral()
}

fn try_json(text: &str) -> Option<RelevanceScore> {
    serde_json::from_str::<RawScore>(text)
        .ok()
        .map(|r| clamp_score(r.score, r.rationale))
}

fn clamp_score(value: f64, rationale: Option<String>) -> RelevanceScore {
    if value.is_nan() {
        return RelevanceScore::neutral();
    }
    RelevanceScore {
        score: value.clamp(0.0, 1.0),
        rationale: rationale
            .filter(|r| !r.trim().is_empty())
            .unwrap_or_else(|| UNSCOREABLE.to_string()),
    }
}

fn extract_object(raw: &str) -> Option<&str> {
    let start = raw.find('{')?;
    let end = raw.rfind('}')?;
    (end > start).then(|| &raw[start..=end])
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use crate::error::{CompletionError, CompletionResult};

    #[test]
    fn test_parse_well_formed_json() {
        let parsed = parse_score(r#"{"score": 0.85, "rationale": "direct answer"}"#);
        assert_eq!(parsed.score, 0.85);
        assert_eq!(parsed.rationale, "direct answer");
    }

    #[test]
    fn test_parse_json_embedded_in_prose() {
        let parsed = parse_score(
            "Here is my rating: {\"score\": 0.3, \"rationale\": \"tangential\"} hope that helps",
        );
        assert_eq!(parsed.score, 0.3);
        assert_eq!(parsed.rationale, "tangential");
    }

    #[test]
    fn test_parse_bare_number() {
        let parsed = parse_score("0.7");
        assert_eq!(parsed.score, 0.7);
        assert_eq!(parsed.rationale, UNSCOREABLE);
    }

    #[test]
    fn test_out_of_range_scores_are_clamped() {
        assert_eq!(parse_score(r#"{"score": 1.8}"#).score, 1.0);
        assert_eq!(parse_score(r#"{"score": -0.4}"#).score, 0.0);
        assert_eq!(parse_score("42").score, 1.0);
    }

    #[test]
    fn test_malformed_output_is_neutral() {
        let parsed = parse_score("I cannot rate this, sorry.");
        assert_eq!(parsed.score, 0.5);
        assert_eq!(parsed.rationale, UNSCOREABLE);
    }

    #[test]
    fn test_nan_is_neutral() {
        let parsed = parse_score("NaN");
        assert_eq!(parsed.score, 0.5);
        assert_eq!(parsed.rationale, UNSCOREABLE);
    }

    #[test]
    fn test_empty_rationale_becomes_unscoreable() {
        let parsed = parse_score(r#"{"score": 0.6, "rationale": "  "}"#);
        assert_eq!(parsed.score, 0.6);
        assert_eq!(parsed.rationale, UNSCOREABLE);
    }

    struct FailingClient;

    #[async_trait]
    impl CompletionClient for FailingClient {
        async fn complete(
            &self,
            _prompt: &str,
            _options: &CompletionOptions,
        ) -> CompletionResult<String> {
            Err(CompletionError::Unreachable {
                message: "down".to_string(),
            })
        }
    }

    #[tokio::test]
    async fn test_completion_failure_is_absorbed() {
        let scorer = ConfidenceScorer::new(std::sync::Arc::new(FailingClient));
        let parsed = scorer.score("q", "obs").await;
        assert_eq!(parsed.score, 0.5);
        assert_eq!(parsed.rationale, UNSCOREABLE);
    }
}
