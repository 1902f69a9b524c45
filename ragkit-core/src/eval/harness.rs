//! Runs an evaluation suite through the pipeline and the judge, then
//! persists the scored run.

use super::llm_judge::{Judgment, LlmJudge};
use super::suite::{EvalCase, default_suite};
use crate::config::RagConfig;
use crate::error::Result;
use crate::persistence::atomic_write_json;
use crate::rag::answer::Confidence;
use crate::rag::pipeline::RagPipeline;
use chrono::{DateTime, Local};
use futures::stream::{self, StreamExt, TryStreamExt};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

/// The scored outcome of one case.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvalResult {
    pub question: String,
    pub category: String,
    pub expected: String,
    pub actual: String,
    pub confidence: Confidence,
    pub sources_used: Vec<String>,
    pub judgment: Judgment,
    pub reasoning: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvalSummary {
    pub total: usize,
    pub correct: usize,
    pub partially_correct: usize,
    pub incorrect: usize,
    /// `correct / total`, or 0.0 for an empty run.
    pub accuracy: f64,
}

impl EvalSummary {
    pub fn from_results(results: &[EvalResult]) -> Self {
        let count = |j: Judgment| results.iter().filter(|r| r.judgment == j).count();
        let total = results.len();
        let correct = count(Judgment::Correct);
        Self {
            total,
            correct,
            partially_correct: count(Judgment::PartiallyCorrect),
            incorrect: count(Judgment::Incorrect),
            accuracy: if total == 0 {
                0.0
            } else {
                correct as f64 / total as f64
            },
        }
    }
}

/// A complete run, as written to disk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvalRun {
    pub run_timestamp: DateTime<Local>,
    pub summary: EvalSummary,
    pub results: Vec<EvalResult>,
}

impl EvalRun {
    /// `eval_YYYYmmdd_HHMMSS.json`, from the run's start time.
    pub fn file_name(&self) -> String {
        format!("eval_{}.json", self.run_timestamp.format("%Y%m%d_%H%M%S"))
    }
}

pub struct EvalHarness {
    pipeline: Arc<RagPipeline>,
    judge: LlmJudge,
    results_dir: PathBuf,
    concurrency: usize,
}

impl EvalHarness {
    pub fn new(
        pipeline: Arc<RagPipeline>,
        judge: LlmJudge,
        results_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            pipeline,
            judge,
            results_dir: results_dir.into(),
            concurrency: 1,
        }
    }

    /// Judge with the configured provider and judge model.
    pub fn from_config(pipeline: Arc<RagPipeline>, config: &RagConfig) -> Result<Self> {
        let provider = crate::providers::create_provider(&config.llm)?;
        let judge = LlmJudge::new(provider, &config.eval, config.llm.request_timeout_secs);
        Ok(Self::new(pipeline, judge, &config.eval.results_dir)
            .with_concurrency(config.eval.concurrency))
    }

    /// Cases in flight at once; 0 is treated as 1.
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn results_dir(&self) -> &Path {
        &self.results_dir
    }

    async fn evaluate_case(&self, index: usize, total: usize, case: &EvalCase) -> Result<EvalResult> {
        let answer = self
            .pipeline
            .generate_answer(&case.question, None, None)
            .await?;
        let verdict = self
            .judge
            .judge(&case.question, &case.expected, &answer.answer)
            .await?;
        info!(
            case = index + 1,
            total,
            question = %case.question,
            judgment = %verdict.judgment,
            confidence = %answer.confidence,
            "Case judged"
        );
        Ok(EvalResult {
            question: case.question.clone(),
            category: case.category.clone(),
            expected: case.expected.clone(),
            actual: answer.answer,
            confidence: answer.confidence,
            sources_used: answer.sources_used,
            judgment: verdict.judgment,
            reasoning: verdict.reasoning,
        })
    }

    /// Score `cases` without writing a report. Results keep suite order and
    /// the first failing case aborts the run.
    pub async fn evaluate(&self, cases: &[EvalCase]) -> Result<EvalRun> {
        let run_timestamp = Local::now();
        let total = cases.len();
        let results: Vec<EvalResult> = stream::iter(cases.iter().enumerate())
            .map(|(i, case)| self.evaluate_case(i, total, case))
            .buffered(self.concurrency)
            .try_collect()
            .await?;
        let summary = EvalSummary::from_results(&results);
        info!(
            total = summary.total,
            correct = summary.correct,
            accuracy = summary.accuracy,
            "Evaluation finished"
        );
        Ok(EvalRun {
            run_timestamp,
            summary,
            results,
        })
    }

    /// Write `run` under the results directory and return the file path.
    pub fn save(&self, run: &EvalRun) -> Result<PathBuf> {
        let path = self.results_dir.join(run.file_name());
        atomic_write_json(&path, run)?;
        info!(path = %path.display(), "Evaluation results saved");
        Ok(path)
    }

    /// Score and persist `cases`.
    pub async fn run(&self, cases: &[EvalCase]) -> Result<EvalRun> {
        let run = self.evaluate(cases).await?;
        self.save(&run)?;
        Ok(run)
    }

    /// Score and persist the built-in suite.
    pub async fn run_evals(&self) -> Result<EvalRun> {
        self.run(&default_suite()).await
    }
}
