//! LLM-as-judge scoring of generated answers against expected ones.

use crate::brain::LlmProvider;
use crate::config::EvalConfig;
use crate::error::{JudgmentError, Result, ServiceError};
use crate::types::{CompletionRequest, Message};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Rubric given to the judge model.
pub const JUDGE_SYSTEM_PROMPT: &str = "You are an evaluation judge. Compare the actual answer to the expected answer. Score as follows:
- CORRECT: The actual answer conveys the same essential information as expected.
- PARTIALLY_CORRECT: The answer is relevant but missing key details or adds inaccuracies.
- INCORRECT: The answer is wrong, hallucinated, or unrelated.

Respond with ONLY a JSON object: {\"score\": \"CORRECT|PARTIALLY_CORRECT|INCORRECT\", \"reasoning\": \"brief explanation\"}";

/// The judge's classification of an answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Judgment {
    Correct,
    PartiallyCorrect,
    Incorrect,
}

impl Judgment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Judgment::Correct => "CORRECT",
            Judgment::PartiallyCorrect => "PARTIALLY_CORRECT",
            Judgment::Incorrect => "INCORRECT",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "CORRECT" => Some(Judgment::Correct),
            "PARTIALLY_CORRECT" => Some(Judgment::PartiallyCorrect),
            "INCORRECT" => Some(Judgment::Incorrect),
            _ => None,
        }
    }
}

impl std::fmt::Display for Judgment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A decoded judge response.
#[derive(Debug, Clone, PartialEq)]
pub struct JudgeVerdict {
    pub judgment: Judgment,
    pub reasoning: String,
}

#[derive(Deserialize)]
struct RawVerdict {
    score: String,
    reasoning: String,
}

/// Decode the judge's reply, tolerating a surrounding markdown code fence.
pub fn parse_verdict(text: &str) -> std::result::Result<JudgeVerdict, JudgmentError> {
    let cleaned = text.replace("```json", "").replace("```", "");
    let cleaned = cleaned.trim();
    if cleaned.is_empty() {
        return Err(JudgmentError::EmptyResponse);
    }
    let unparseable = |message: String| JudgmentError::Unparseable {
        raw: text.to_string(),
        message,
    };
    let raw: RawVerdict = serde_json::from_str(cleaned).map_err(|e| unparseable(e.to_string()))?;
    let judgment = Judgment::parse(&raw.score)
        .ok_or_else(|| unparseable(format!("unknown score '{}'", raw.score)))?;
    Ok(JudgeVerdict {
        judgment,
        reasoning: raw.reasoning,
    })
}

/// Scores answers with a second chat call.
pub struct LlmJudge {
    provider: Arc<dyn LlmProvider>,
    model: String,
    temperature: f32,
    timeout_secs: u64,
}

impl LlmJudge {
    pub fn new(provider: Arc<dyn LlmProvider>, config: &EvalConfig, timeout_secs: u64) -> Self {
        Self {
            provider,
            model: config.judge_model.clone(),
            temperature: config.judge_temperature,
            timeout_secs,
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Classify `actual` against `expected` for `question`.
    pub async fn judge(&self, question: &str, expected: &str, actual: &str) -> Result<JudgeVerdict> {
        let request = CompletionRequest {
            messages: vec![
                Message::system(JUDGE_SYSTEM_PROMPT),
                Message::user(format!(
                    "Question: {question}\nExpected answer: {expected}\nActual answer: {actual}"
                )),
            ],
            temperature: Some(self.temperature),
            model: Some(self.model.clone()),
            ..Default::default()
        };

        let response = tokio::time::timeout(
            Duration::from_secs(self.timeout_secs),
            self.provider.complete(request),
        )
        .await
        .map_err(|_| ServiceError::Timeout {
            timeout_secs: self.timeout_secs,
        })??;

        let text = response.message.content.joined_text();
        let verdict = parse_verdict(&text)?;
        debug!(judgment = %verdict.judgment, "Judge verdict");
        Ok(verdict)
    }
}
