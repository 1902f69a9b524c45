//! Pluggable embedding providers.
//!
//! Provides a trait-based abstraction over embedding models, with a local
//! hashed term-frequency embedder (always available, used offline and in
//! tests) and the OpenAI `/embeddings` API.

use crate::config::EmbeddingConfig;
use crate::error::{ConfigError, RagError, Result, ServiceError};
use crate::providers::openai_compat::{
    DEFAULT_BASE_URL, http_client, map_http_error, map_send_error, resolve_api_key,
};
use async_trait::async_trait;
use serde_json::{Value, json};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Trait for embedding providers.
///
/// The same embedder must be used for ingestion and retrieval of a
/// collection; vectors from different models are not comparable.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Generate an embedding for a single non-empty text.
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Return the dimensionality of embeddings.
    fn dimensions(&self) -> usize;

    /// Return the provider name.
    fn provider_name(&self) -> &str;
}

fn ensure_non_empty(text: &str) -> Result<()> {
    if text.trim().is_empty() {
        return Err(RagError::invalid_input("cannot embed empty text"));
    }
    Ok(())
}

/// Local hashed term-frequency embedder.
///
/// Deterministic and offline; texts sharing words land close together, which
/// is enough for small corpora and for tests.
#[derive(Debug, Clone)]
pub struct LocalEmbedder {
    dimensions: usize,
}

impl LocalEmbedder {
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions: dimensions.max(1),
        }
    }

    fn embed_terms(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimensions];

        let lowered = text.to_lowercase();
        let mut tf: HashMap<&str, usize> = HashMap::new();
        for word in lowered
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
        {
            *tf.entry(word).or_insert(0) += 1;
        }

        for (term, count) in &tf {
            let idx = simple_hash(term) % self.dimensions;
            vector[idx] += *count as f32;
        }

        let norm: f32 = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in &mut vector {
                *v /= norm;
            }
        }
        vector
    }
}

/// djb2
fn simple_hash(s: &str) -> usize {
    let mut hash: usize = 5381;
    for b in s.bytes() {
        hash = hash.wrapping_mul(33).wrapping_add(b as usize);
    }
    hash
}

#[async_trait]
impl Embedder for LocalEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        ensure_non_empty(text)?;
        Ok(self.embed_terms(text))
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn provider_name(&self) -> &str {
        "local"
    }
}

/// OpenAI API embedder (text-embedding-3-small by default).
pub struct OpenAiEmbedder {
    client: reqwest::Client,
    api_key: String,
    model: String,
    dims: usize,
    base_url: String,
    timeout_secs: u64,
}

impl OpenAiEmbedder {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let api_key = resolve_api_key(None, &config.api_key_env, config.base_url.as_deref())?;
        Ok(Self {
            client: http_client(config.request_timeout_secs)?,
            api_key,
            model: config.model.clone(),
            dims: config.dimensions,
            base_url: config
                .base_url
                .as_deref()
                .unwrap_or(DEFAULT_BASE_URL)
                .trim_end_matches('/')
                .to_string(),
            timeout_secs: config.request_timeout_secs,
        })
    }

    async fn request(&self, input: Value, expected: usize) -> Result<Vec<Vec<f32>>> {
        let url = format!("{}/embeddings", self.base_url);
        let body = json!({
            "model": self.model,
            "input": input,
            "dimensions": self.dims,
        });
        debug!(url = %url, model = %self.model, count = expected, "Requesting embeddings");

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&body)
            .send()
            .await
            .map_err(|e| map_send_error(e, self.timeout_secs))?;

        let status = response.status();
        let text = response.text().await.map_err(|e| ServiceError::ApiRequest {
            message: format!("Failed to read response body: {e}"),
        })?;
        if !status.is_success() {
            return Err(map_http_error(status, &text).into());
        }
        let json: Value = serde_json::from_str(&text).map_err(|e| ServiceError::ResponseParse {
            message: format!("Invalid JSON: {e}"),
        })?;
        let vectors = parse_embeddings(&json)?;
        if vectors.len() != expected {
            return Err(ServiceError::ResponseParse {
                message: format!("expected {expected} embeddings, got {}", vectors.len()),
            }
            .into());
        }
        if let Some(bad) = vectors.iter().find(|v| v.len() != self.dims) {
            return Err(ServiceError::ResponseParse {
                message: format!(
                    "embedding has {} dimensions, configured {}",
                    bad.len(),
                    self.dims
                ),
            }
            .into());
        }
        Ok(vectors)
    }
}

/// Extract `data[*].embedding`, ordered by each item's `index`.
fn parse_embeddings(body: &Value) -> std::result::Result<Vec<Vec<f32>>, ServiceError> {
    let data = body
        .get("data")
        .and_then(|d| d.as_array())
        .ok_or_else(|| ServiceError::ResponseParse {
            message: "No data in embeddings response".to_string(),
        })?;

    let mut indexed = Vec::with_capacity(data.len());
    for (pos, item) in data.iter().enumerate() {
        let index = item
            .get("index")
            .and_then(|i| i.as_u64())
            .map(|i| i as usize)
            .unwrap_or(pos);
        let vector = item
            .get("embedding")
            .and_then(|e| e.as_array())
            .ok_or_else(|| ServiceError::ResponseParse {
                message: format!("Missing embedding at position {pos}"),
            })?
            .iter()
            .map(|v| {
                v.as_f64()
                    .map(|f| f as f32)
                    .ok_or_else(|| ServiceError::ResponseParse {
                        message: "Non-numeric embedding value".to_string(),
                    })
            })
            .collect::<std::result::Result<Vec<f32>, _>>()?;
        indexed.push((index, vector));
    }
    indexed.sort_by_key(|(index, _)| *index);
    Ok(indexed.into_iter().map(|(_, v)| v).collect())
}

#[async_trait]
impl Embedder for OpenAiEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        ensure_non_empty(text)?;
        let mut vectors = self.request(json!(text), 1).await?;
        vectors.pop().ok_or_else(|| {
            ServiceError::ResponseParse {
                message: "Empty embeddings response".to_string(),
            }
            .into()
        })
    }

    fn dimensions(&self) -> usize {
        self.dims
    }

    fn provider_name(&self) -> &str {
        "openai"
    }
}

/// Create an embedder from configuration.
pub fn create_embedder(config: &EmbeddingConfig) -> Result<Arc<dyn Embedder>> {
    match config.provider.as_str() {
        "local" => Ok(Arc::new(LocalEmbedder::new(config.dimensions))),
        "openai" => Ok(Arc::new(OpenAiEmbedder::new(config)?)),
        other => Err(ConfigError::Invalid {
            message: format!("Unsupported embedding provider: '{other}'"),
        }
        .into()),
    }
}

/// Cosine similarity between two vectors. Zero-norm inputs score 0.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}
