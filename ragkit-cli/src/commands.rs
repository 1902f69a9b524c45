//! CLI subcommand handlers.

use crate::{Commands, ConfigAction};
use ragkit_core::config::{RagConfig, workspace_config_path};
use ragkit_core::embeddings::create_embedder;
use ragkit_core::eval::{EvalHarness, EvalRun, default_suite};
use ragkit_core::prompts::PromptRegistry;
use ragkit_core::providers::openai_compat::OpenAiCompatibleProvider;
use ragkit_core::rag::{Ingestor, RagPipeline, RetrievedPassage, Retriever};
use ragkit_core::store::create_store;
use std::path::Path;
use std::sync::Arc;

/// Handle a CLI subcommand.
pub async fn handle_command(
    command: Commands,
    mut config: RagConfig,
    workspace: &Path,
) -> anyhow::Result<()> {
    match command {
        Commands::Ingest { corpus } => {
            if let Some(corpus) = corpus {
                config.corpus.path = corpus;
            }
            handle_ingest(&config).await
        }
        Commands::Eval { concurrency } => {
            if let Some(n) = concurrency {
                config.eval.concurrency = n;
            }
            handle_eval(&config).await
        }
        Commands::Ask {
            question,
            prompt_version,
            model,
        } => handle_ask(&config, &question, prompt_version.as_deref(), model.as_deref()).await,
        Commands::Retrieve { query, n_results } => {
            handle_retrieve(&config, &query, n_results.unwrap_or(config.retrieval.n_results)).await
        }
        Commands::Prompts => handle_prompts(&config),
        Commands::Check => handle_check(&config).await,
        Commands::Config { action } => handle_config(action, &config, workspace),
    }
}

async fn handle_ingest(config: &RagConfig) -> anyhow::Result<()> {
    println!("Ingesting documents from {}...\n", config.corpus.path.display());
    let embedder = create_embedder(&config.embedding)?;
    let store = create_store(&config.store)?;
    let report = Ingestor::new(embedder, store, config.store.collection.clone())
        .ingest(&config.corpus.path)
        .await?;
    println!(
        "Ingested {} documents at {} dimensions into '{}'.",
        report.documents, report.dimensions, report.collection
    );
    Ok(())
}

async fn handle_eval(config: &RagConfig) -> anyhow::Result<()> {
    let rule = "=".repeat(50);
    println!("{rule}\nRunning Evaluation Suite\n{rule}\n");

    let pipeline = Arc::new(RagPipeline::from_config(config)?);
    let harness = EvalHarness::from_config(pipeline, config)?;
    let run = harness.evaluate(&default_suite()).await?;
    print!("{}", render_eval_run(&run));

    let path = harness.save(&run)?;
    println!("Saved to {}", path.display());
    Ok(())
}

/// Per-case lines followed by the summary line.
fn render_eval_run(run: &EvalRun) -> String {
    let mut out = String::new();
    let total = run.results.len();
    for (i, result) in run.results.iter().enumerate() {
        out.push_str(&format!("[{}/{}] {}\n", i + 1, total, result.question));
        out.push_str(&format!(
            "  → {} ({} confidence)\n",
            result.judgment, result.confidence
        ));
    }
    let rule = "=".repeat(50);
    out.push_str(&format!(
        "\n{rule}\nRESULTS: {}/{} correct ({:.0}% accuracy)\n{rule}\n",
        run.summary.correct,
        run.summary.total,
        run.summary.accuracy * 100.0
    ));
    out
}

async fn handle_ask(
    config: &RagConfig,
    question: &str,
    prompt_version: Option<&str>,
    model: Option<&str>,
) -> anyhow::Result<()> {
    let pipeline = RagPipeline::from_config(config)?;
    let result = pipeline
        .generate_answer(question, prompt_version, model)
        .await?;
    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}

async fn handle_retrieve(config: &RagConfig, query: &str, n_results: usize) -> anyhow::Result<()> {
    let retriever = Retriever::new(
        create_embedder(&config.embedding)?,
        create_store(&config.store)?,
        config.store.collection.clone(),
    );
    let passages = retriever.retrieve(query, n_results).await?;
    print!("{}", render_passages(&passages));
    Ok(())
}

fn render_passages(passages: &[RetrievedPassage]) -> String {
    let mut out = String::new();
    for (rank, passage) in passages.iter().enumerate() {
        let distance = passage
            .distance
            .map(|d| format!("{d:.4}"))
            .unwrap_or_else(|| "-".to_string());
        out.push_str(&format!(
            "{}. {} (distance: {})\n   {}\n\n",
            rank + 1,
            passage.title,
            distance,
            passage.content
        ));
    }
    out
}

fn handle_prompts(config: &RagConfig) -> anyhow::Result<()> {
    let registry = PromptRegistry::new(&config.prompts.dir);
    let prompts = registry.list_prompts()?;
    if prompts.is_empty() {
        println!("No prompts found in {}", registry.dir().display());
        return Ok(());
    }
    println!("Available prompts:");
    for (name, versions) in &prompts {
        for v in versions {
            println!("  {} v{}: {}", name, v.version, v.description);
        }
    }
    Ok(())
}

async fn handle_check(config: &RagConfig) -> anyhow::Result<()> {
    let Some(key) = config.llm.resolved_api_key() else {
        anyhow::bail!(
            "No API key found. Set {} or llm.api_key.",
            config.llm.api_key_env
        );
    };
    let prefix: String = key.chars().take(5).collect();
    println!("API key loaded (starts with: {prefix}...)");

    let provider = OpenAiCompatibleProvider::new_with_key(&config.llm, key)?;
    let models = provider
        .list_models()
        .await
        .map_err(|e| anyhow::anyhow!("Connection failed: {}", e))?;
    println!(
        "Connection successful! Key is active ({} models available).",
        models.len()
    );
    Ok(())
}

fn handle_config(action: ConfigAction, config: &RagConfig, workspace: &Path) -> anyhow::Result<()> {
    match action {
        ConfigAction::Init => {
            let config_path = workspace_config_path(workspace);
            if config_path.exists() {
                println!(
                    "Configuration file already exists at: {}",
                    config_path.display()
                );
                return Ok(());
            }
            if let Some(parent) = config_path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            let toml_str = toml::to_string_pretty(&RagConfig::default())?;
            std::fs::write(&config_path, &toml_str)?;
            println!(
                "Created default configuration at: {}",
                config_path.display()
            );
            Ok(())
        }
        ConfigAction::Show => {
            println!("{}", toml::to_string_pretty(config)?);
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use ragkit_core::eval::{EvalResult, EvalSummary, Judgment};
    use ragkit_core::rag::Confidence;

    #[test]
    fn test_render_eval_run() {
        let results = vec![
            EvalResult {
                question: "How much does the Pro plan cost?".into(),
                category: "factual_retrieval".into(),
                expected: "$129".into(),
                actual: "$129 per month".into(),
                confidence: Confidence::High,
                sources_used: vec!["Pricing Plans".into()],
                judgment: Judgment::Correct,
                reasoning: "match".into(),
            },
            EvalResult {
                question: "What is the CEO's favorite color?".into(),
                category: "out_of_scope".into(),
                expected: "n/a".into(),
                actual: "Blue".into(),
                confidence: Confidence::Low,
                sources_used: vec![],
                judgment: Judgment::Incorrect,
                reasoning: "made up".into(),
            },
        ];
        let run = EvalRun {
            run_timestamp: chrono::Local::now(),
            summary: EvalSummary::from_results(&results),
            results,
        };
        let text = render_eval_run(&run);
        assert!(text.starts_with(
            "[1/2] How much does the Pro plan cost?\n  → CORRECT (high confidence)\n"
        ));
        assert!(text.contains("[2/2] What is the CEO's favorite color?\n  → INCORRECT (low confidence)\n"));
        assert!(text.contains("RESULTS: 1/2 correct (50% accuracy)"));
    }

    #[test]
    fn test_render_passages() {
        let passages = vec![RetrievedPassage {
            id: "doc5".into(),
            title: "Refund Policy".into(),
            content: "Annual plans may be refunded.".into(),
            distance: Some(0.12345),
        }];
        assert_eq!(
            render_passages(&passages),
            "1. Refund Policy (distance: 0.1235)\n   Annual plans may be refunded.\n\n"
        );
    }
}
