//! Evaluation: LLM-as-judge scoring of the pipeline over a fixed suite.

pub mod harness;
pub mod llm_judge;
pub mod suite;

pub use harness::{EvalHarness, EvalResult, EvalRun, EvalSummary};
pub use llm_judge::{JudgeVerdict, Judgment, LlmJudge};
pub use suite::{EvalCase, default_suite};
