//! End-to-end answer generation.
//!
//! prompt lookup -> retrieval -> context assembly -> one forced
//! `format_answer` chat call -> schema decode -> query log.

use crate::brain::LlmProvider;
use crate::config::RagConfig;
use crate::embeddings::{Embedder, create_embedder};
use crate::error::{RagError, Result, SchemaError, ServiceError};
use crate::prompts::PromptRegistry;
use crate::providers::create_provider;
use crate::query_log::{QueryLogger, build_log_entry};
use crate::rag::answer::{AnswerResult, FORMAT_ANSWER_TOOL, FormattedAnswer, format_answer_tool};
use crate::rag::context;
use crate::rag::retriever::Retriever;
use crate::store::{VectorStore, create_store};
use crate::types::{CompletionRequest, Message};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Generation settings taken from [`RagConfig`].
#[derive(Debug, Clone)]
struct GenerationSettings {
    prompt_name: String,
    n_results: usize,
    model: String,
    temperature: Option<f32>,
    max_tokens: Option<usize>,
    timeout_secs: u64,
}

/// Answers questions over an ingested collection.
///
/// Every collaborator is injected, so tests can swap in a scripted chat
/// provider, the local embedder, and the in-memory store.
pub struct RagPipeline {
    provider: Arc<dyn LlmProvider>,
    retriever: Retriever,
    prompts: PromptRegistry,
    logger: QueryLogger,
    settings: GenerationSettings,
}

impl RagPipeline {
    pub fn new(
        provider: Arc<dyn LlmProvider>,
        embedder: Arc<dyn Embedder>,
        store: Arc<dyn VectorStore>,
        config: &RagConfig,
    ) -> Self {
        Self {
            provider,
            retriever: Retriever::new(embedder, store, config.store.collection.clone()),
            prompts: PromptRegistry::new(&config.prompts.dir),
            logger: QueryLogger::from_config(&config.logging),
            settings: GenerationSettings {
                prompt_name: config.prompts.name.clone(),
                n_results: config.retrieval.n_results,
                model: config.llm.model.clone(),
                temperature: config.llm.temperature,
                max_tokens: config.llm.max_tokens,
                timeout_secs: config.llm.request_timeout_secs,
            },
        }
    }

    /// Build the pipeline with the providers and store named in `config`.
    pub fn from_config(config: &RagConfig) -> Result<Self> {
        let provider = create_provider(&config.llm)?;
        let embedder = create_embedder(&config.embedding)?;
        let store = create_store(&config.store)?;
        Ok(Self::new(provider, embedder, store, config))
    }

    pub fn with_logger(mut self, logger: QueryLogger) -> Self {
        self.logger = logger;
        self
    }

    pub fn retriever(&self) -> &Retriever {
        &self.retriever
    }

    pub fn prompts(&self) -> &PromptRegistry {
        &self.prompts
    }

    pub fn n_results(&self) -> usize {
        self.settings.n_results
    }

    /// Answer `question` with a source-attributed, confidence-rated result.
    ///
    /// `prompt_version` defaults to the latest registered version and `model`
    /// to the configured one. A failed log write is reported but never fails
    /// the answer.
    pub async fn generate_answer(
        &self,
        question: &str,
        prompt_version: Option<&str>,
        model: Option<&str>,
    ) -> Result<AnswerResult> {
        if question.trim().is_empty() {
            return Err(RagError::invalid_input("question must not be empty"));
        }
        let started = Instant::now();

        let prompt = self
            .prompts
            .get_prompt(&self.settings.prompt_name, prompt_version)?;
        let passages = self
            .retriever
            .retrieve(question, self.settings.n_results)
            .await?;
        let context = context::assemble(&passages);

        let model = model.unwrap_or(&self.settings.model).to_string();
        let request = CompletionRequest {
            messages: vec![
                Message::system(prompt.system_prompt.clone()),
                Message::user(context::user_message(&context, question)),
            ],
            tools: Some(vec![format_answer_tool()]),
            tool_choice: Some(FORMAT_ANSWER_TOOL.to_string()),
            temperature: self.settings.temperature,
            max_tokens: self.settings.max_tokens,
            model: Some(model.clone()),
        };

        debug!(
            model = %model,
            prompt_version = %prompt.version,
            passages = passages.len(),
            "Requesting structured answer"
        );
        let response = tokio::time::timeout(
            Duration::from_secs(self.settings.timeout_secs),
            self.provider.complete(request),
        )
        .await
        .map_err(|_| ServiceError::Timeout {
            timeout_secs: self.settings.timeout_secs,
        })??;
        debug!(tokens = response.usage.total(), "Completion received");

        let arguments = response
            .message
            .content
            .find_tool_call(FORMAT_ANSWER_TOOL)
            .ok_or_else(|| SchemaError::MissingToolCall {
                tool: FORMAT_ANSWER_TOOL.to_string(),
            })?;
        let formatted = FormattedAnswer::from_arguments(arguments)?;
        let latency_ms = started.elapsed().as_secs_f64() * 1000.0;

        let result = AnswerResult::new(
            formatted,
            context.titles,
            model,
            prompt.version,
            latency_ms,
        );

        let unsupported = result.unsupported_sources();
        if !unsupported.is_empty() {
            warn!(
                sources = ?unsupported,
                retrieved = ?result.retrieved_docs,
                "Answer cites sources that were not retrieved"
            );
        }

        if let Err(e) = self.logger.log_query(&build_log_entry(question, &result)) {
            warn!(error = %e, path = %self.logger.path().display(), "Failed to write query log");
        }
        Ok(result)
    }
}
