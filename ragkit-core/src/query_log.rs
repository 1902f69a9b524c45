//! Interaction log: one JSON line per answered question.

use crate::config::LoggingConfig;
use crate::error::Result;
use crate::persistence::append_jsonl;
use crate::rag::answer::AnswerResult;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;

pub const QUERY_LOG_FILE: &str = "queries.jsonl";

/// One logged interaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    pub timestamp: DateTime<Utc>,
    pub question: String,
    pub retrieved_docs: Vec<String>,
    pub prompt_version: String,
    pub latency_ms: f64,
    pub model: String,
    pub result: AnswerResult,
}

/// Build the log record for an answered question.
pub fn build_log_entry(question: &str, result: &AnswerResult) -> LogEntry {
    LogEntry {
        timestamp: Utc::now(),
        question: question.to_string(),
        retrieved_docs: result.retrieved_docs.clone(),
        prompt_version: result.prompt_version.clone(),
        latency_ms: result.latency_ms,
        model: result.model.clone(),
        result: result.clone(),
    }
}

/// Appends entries to `{dir}/queries.jsonl`.
#[derive(Debug, Clone)]
pub struct QueryLogger {
    path: PathBuf,
    enabled: bool,
}

impl QueryLogger {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            path: dir.as_ref().join(QUERY_LOG_FILE),
            enabled: true,
        }
    }

    pub fn from_config(config: &LoggingConfig) -> Self {
        Self {
            enabled: config.log_queries,
            ..Self::new(&config.query_log_dir)
        }
    }

    /// A logger that drops every entry.
    pub fn disabled() -> Self {
        Self {
            path: PathBuf::new(),
            enabled: false,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn log_query(&self, entry: &LogEntry) -> Result<()> {
        if !self.enabled {
            return Ok(());
        }
        info!(
            question = %entry.question,
            model = %entry.model,
            prompt_version = %entry.prompt_version,
            latency_ms = entry.latency_ms,
            confidence = %entry.result.confidence,
            "Query answered"
        );
        append_jsonl(&self.path, entry)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rag::answer::{Confidence, FormattedAnswer};
    use tempfile::TempDir;

    fn sample_result() -> AnswerResult {
        AnswerResult::new(
            FormattedAnswer {
                answer: "The Pro plan costs $129 per month.".into(),
                sources_used: vec!["Pricing".into()],
                confidence: Confidence::High,
                follow_up_suggestion: None,
            },
            vec!["Pricing".into(), "Plans".into()],
            "gpt-4o-mini".into(),
            "1.1".into(),
            420.0,
        )
    }

    #[test]
    fn test_build_log_entry_copies_fields() {
        let result = sample_result();
        let entry = build_log_entry("How much is Pro?", &result);
        assert_eq!(entry.question, "How much is Pro?");
        assert_eq!(entry.retrieved_docs, vec!["Pricing", "Plans"]);
        assert_eq!(entry.prompt_version, "1.1");
        assert_eq!(entry.model, "gpt-4o-mini");
        assert_eq!(entry.latency_ms, 420.0);
        assert_eq!(entry.result, result);
    }

    #[test]
    fn test_log_query_appends_lines() {
        let dir = TempDir::new().unwrap();
        let logger = QueryLogger::new(dir.path().join("logs"));
        let entry = build_log_entry("q", &sample_result());
        logger.log_query(&entry).unwrap();
        logger.log_query(&entry).unwrap();

        let content = std::fs::read_to_string(logger.path()).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2);
        let parsed: LogEntry = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(parsed.question, "q");
        assert_eq!(parsed.result.confidence, Confidence::High);
    }

    #[test]
    fn test_disabled_logger_writes_nothing() {
        let dir = TempDir::new().unwrap();
        let config = LoggingConfig {
            query_log_dir: dir.path().to_path_buf(),
            log_queries: false,
        };
        let logger = QueryLogger::from_config(&config);
        logger
            .log_query(&build_log_entry("q", &sample_result()))
            .unwrap();
        assert!(!logger.path().exists());
        QueryLogger::disabled()
            .log_query(&build_log_entry("q", &sample_result()))
            .unwrap();
    }
}
