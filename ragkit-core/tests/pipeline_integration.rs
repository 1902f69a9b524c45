//! Integration tests for the RagKit pipeline.
//!
//! These tests run the bundled corpus and prompts end-to-end with the local
//! embedder, a scripted chat provider, and both store backends: ingest, then
//! retrieve, answer, log, and evaluate.

use ragkit_core::brain::MockLlmProvider;
use ragkit_core::config::{RagConfig, StoreBackend};
use ragkit_core::embeddings::{Embedder, LocalEmbedder};
use ragkit_core::error::ErrorKind;
use ragkit_core::eval::{EvalHarness, EvalRun, Judgment, LlmJudge, default_suite};
use ragkit_core::query_log::LogEntry;
use ragkit_core::rag::{Confidence, Ingestor, RagPipeline};
use ragkit_core::store::{SqliteVectorStore, VectorStore, create_store};
use serde_json::json;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;

fn repo_root() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("..")
}

/// Config pointing at the bundled corpus and prompts with outputs in `dir`.
fn test_config(dir: &Path) -> RagConfig {
    let mut config = RagConfig::default();
    config.corpus.path = repo_root().join("data/sample_docs.json");
    config.prompts.dir = repo_root().join("prompts");
    config.store.path = dir.join("vector_store/ragkit.db");
    config.logging.query_log_dir = dir.join("logs");
    config.eval.results_dir = dir.join("evaluation_results");
    config
}

async fn ingest(config: &RagConfig, embedder: Arc<dyn Embedder>) -> Arc<dyn VectorStore> {
    let store = create_store(&config.store).unwrap();
    let report = Ingestor::new(embedder, store.clone(), config.store.collection.clone())
        .ingest(&config.corpus.path)
        .await
        .unwrap();
    assert_eq!(report.documents, 6);
    store
}

fn format_answer(answer: &str, sources: &[&str], confidence: &str) -> serde_json::Value {
    json!({
        "answer": answer,
        "sources_used": sources,
        "confidence": confidence,
        "follow_up_suggestion": "Would you like to compare plans?"
    })
}

#[tokio::test]
async fn test_ask_pro_price_end_to_end() {
    let dir = TempDir::new().unwrap();
    let config = test_config(dir.path());
    let embedder: Arc<dyn Embedder> = Arc::new(LocalEmbedder::new(256));
    let store = ingest(&config, embedder.clone()).await;

    let provider = Arc::new(MockLlmProvider::new());
    provider.queue_response(MockLlmProvider::tool_call_response(
        "format_answer",
        format_answer("The Pro plan costs $129 per month.", &["Pricing Plans"], "high"),
    ));
    let pipeline = RagPipeline::new(provider.clone(), embedder, store, &config);

    let result = pipeline
        .generate_answer("How much does the Pro plan cost per month?", None, None)
        .await
        .unwrap();

    assert!(result.answer.contains("$129"));
    assert_eq!(result.confidence, Confidence::High);
    assert_eq!(result.prompt_version, "1.1");
    assert_eq!(result.model, "gpt-4o-mini");
    assert_eq!(result.retrieved_docs.len(), 2);
    assert!(result.retrieved_docs.contains(&"Pricing Plans".to_string()));
    assert!(result.unsupported_sources().is_empty());

    let request = &provider.requests()[0];
    let user = request.messages[1].content.as_text().unwrap();
    assert!(user.starts_with("Context:\n[Source: "));
    assert!(user.contains("$129 per month"));
    assert!(user.ends_with("\n\nQuestion: How much does the Pro plan cost per month?"));

    let log = std::fs::read_to_string(dir.path().join("logs/queries.jsonl")).unwrap();
    let entries: Vec<LogEntry> = log
        .lines()
        .map(|l| serde_json::from_str(l).unwrap())
        .collect();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].result, result);
    assert_eq!(entries[0].retrieved_docs, result.retrieved_docs);
}

#[tokio::test]
async fn test_pinned_prompt_version_and_model() {
    let dir = TempDir::new().unwrap();
    let config = test_config(dir.path());
    let embedder: Arc<dyn Embedder> = Arc::new(LocalEmbedder::new(256));
    let store = ingest(&config, embedder.clone()).await;

    let provider = Arc::new(MockLlmProvider::new());
    provider.queue_response(MockLlmProvider::tool_call_response(
        "format_answer",
        format_answer("Data is kept for 90 days.", &["Data Retention Policy"], "high"),
    ));
    let pipeline = RagPipeline::new(provider.clone(), embedder, store, &config);
    let result = pipeline
        .generate_answer(
            "How long is data retained after cancellation?",
            Some("1.0"),
            Some("gpt-4o"),
        )
        .await
        .unwrap();
    assert_eq!(result.prompt_version, "1.0");
    assert_eq!(result.model, "gpt-4o");
    assert_eq!(provider.requests()[0].model.as_deref(), Some("gpt-4o"));
    assert!(
        provider.requests()[0].messages[0]
            .content
            .as_text()
            .unwrap()
            .starts_with("You are a helpful customer support assistant for Acme Analytics.")
    );

    let err = pipeline
        .generate_answer("anything", Some("9.9"), None)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
    assert!(err.to_string().contains("1.0"));
    assert!(err.to_string().contains("1.1"));
    assert_eq!(provider.request_count(), 1);
}

#[tokio::test]
async fn test_out_of_scope_question_low_confidence() {
    let dir = TempDir::new().unwrap();
    let config = test_config(dir.path());
    let embedder: Arc<dyn Embedder> = Arc::new(LocalEmbedder::new(256));
    let store = ingest(&config, embedder.clone()).await;

    let provider = Arc::new(MockLlmProvider::new());
    provider.queue_response(MockLlmProvider::tool_call_response(
        "format_answer",
        json!({
            "answer": "This information is not available in the knowledge base.",
            "sources_used": [],
            "confidence": "low"
        }),
    ));
    let pipeline = RagPipeline::new(provider, embedder, store, &config);
    let result = pipeline
        .generate_answer("What is the CEO's favorite color?", None, None)
        .await
        .unwrap();
    assert_eq!(result.confidence, Confidence::Low);
    assert!(result.sources_used.is_empty());
    assert_eq!(result.follow_up_suggestion, None);
    assert_eq!(result.retrieved_docs.len(), 2);
}

#[tokio::test]
async fn test_reingest_replaces_collection_on_disk() {
    let dir = TempDir::new().unwrap();
    let config = test_config(dir.path());
    assert_eq!(config.store.backend, StoreBackend::Sqlite);
    let embedder: Arc<dyn Embedder> = Arc::new(LocalEmbedder::new(64));

    ingest(&config, embedder.clone()).await;
    ingest(&config, embedder).await;

    let reopened = SqliteVectorStore::open(&config.store.path).unwrap();
    assert_eq!(reopened.count(&config.store.collection).unwrap(), 6);
}

#[tokio::test]
async fn test_eval_suite_end_to_end() {
    let dir = TempDir::new().unwrap();
    let config = test_config(dir.path());
    let embedder: Arc<dyn Embedder> = Arc::new(LocalEmbedder::new(256));
    let store = ingest(&config, embedder.clone()).await;

    let answerer = Arc::new(MockLlmProvider::new());
    let judge = Arc::new(MockLlmProvider::new());
    let suite = default_suite();
    for (i, case) in suite.iter().enumerate() {
        answerer.queue_response(MockLlmProvider::tool_call_response(
            "format_answer",
            format_answer(&case.expected, &[], "medium"),
        ));
        let score = if i == 4 { "PARTIALLY_CORRECT" } else { "CORRECT" };
        judge.queue_response(MockLlmProvider::text_response(&format!(
            r#"{{"score": "{score}", "reasoning": "checked"}}"#
        )));
    }

    let pipeline = Arc::new(RagPipeline::new(answerer, embedder, store, &config));
    let harness = EvalHarness::new(
        pipeline,
        LlmJudge::new(judge.clone(), &config.eval, 30),
        &config.eval.results_dir,
    );
    let run = harness.run_evals().await.unwrap();

    assert_eq!(run.summary.total, 5);
    assert_eq!(run.summary.correct, 4);
    assert_eq!(run.summary.partially_correct, 1);
    assert_eq!(run.summary.incorrect, 0);
    assert!((run.summary.accuracy - 0.8).abs() < 1e-9);
    assert_eq!(run.results[4].judgment, Judgment::PartiallyCorrect);
    assert_eq!(run.results[4].category, "out_of_scope");
    assert_eq!(judge.request_count(), 5);

    let files: Vec<_> = std::fs::read_dir(&config.eval.results_dir)
        .unwrap()
        .map(|e| e.unwrap().path())
        .collect();
    assert_eq!(files.len(), 1);
    let name = files[0].file_name().unwrap().to_string_lossy().to_string();
    assert!(name.starts_with("eval_") && name.ends_with(".json"));
    let saved: EvalRun = serde_json::from_str(&std::fs::read_to_string(&files[0]).unwrap()).unwrap();
    assert_eq!(saved.summary, run.summary);
}
