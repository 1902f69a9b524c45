//! # RagKit Core
//!
//! Core library for the RagKit retrieval-augmented Q&A pipeline.
//! Provides corpus ingestion into a vector store, versioned prompts,
//! structured answer generation with source attribution, an interaction
//! log, and an LLM-judged evaluation harness.

pub mod brain;
pub mod config;
pub mod embeddings;
pub mod error;
pub mod eval;
pub mod persistence;
pub mod prompts;
pub mod providers;
pub mod query_log;
pub mod rag;
pub mod store;
pub mod types;

// Re-export commonly used types at the crate root.
pub use brain::{LlmProvider, MockLlmProvider};
pub use config::{RagConfig, load_config};
pub use embeddings::{Embedder, LocalEmbedder, OpenAiEmbedder, create_embedder};
pub use error::{ErrorKind, RagError, Result};
pub use eval::{EvalCase, EvalHarness, EvalRun, EvalSummary, Judgment, LlmJudge};
pub use prompts::{PromptDefinition, PromptRegistry};
pub use query_log::{LogEntry, QueryLogger};
pub use rag::{AnswerResult, Confidence, Document, Ingestor, RagPipeline, RetrievedPassage, Retriever};
pub use store::{DistanceMetric, InMemoryVectorStore, SqliteVectorStore, VectorStore, create_store};
pub use types::{
    CompletionRequest, CompletionResponse, Content, Message, Role, TokenUsage, ToolDefinition,
};
