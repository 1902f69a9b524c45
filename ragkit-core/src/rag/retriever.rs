//! Query-time retrieval over an ingested collection.

use crate::embeddings::Embedder;
use crate::error::{RagError, Result};
use crate::store::VectorStore;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

/// A retrieved passage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievedPassage {
    pub id: String,
    pub title: String,
    pub content: String,
    pub distance: Option<f32>,
}

/// Embeds a query and returns the nearest documents.
pub struct Retriever {
    embedder: Arc<dyn Embedder>,
    store: Arc<dyn VectorStore>,
    collection: String,
}

impl Retriever {
    pub fn new(
        embedder: Arc<dyn Embedder>,
        store: Arc<dyn VectorStore>,
        collection: impl Into<String>,
    ) -> Self {
        Self {
            embedder,
            store,
            collection: collection.into(),
        }
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    pub fn store(&self) -> &Arc<dyn VectorStore> {
        &self.store
    }

    /// Up to `n_results` passages, nearest first.
    pub async fn retrieve(&self, query: &str, n_results: usize) -> Result<Vec<RetrievedPassage>> {
        if query.trim().is_empty() {
            return Err(RagError::invalid_input("query must not be empty"));
        }
        if n_results == 0 {
            return Err(RagError::invalid_input("n_results must be at least 1"));
        }
        // Fail on a missing collection before paying for an embedding call.
        if !self.store.has_collection(&self.collection)? {
            return Err(crate::error::NotFoundError::Collection {
                name: self.collection.clone(),
            }
            .into());
        }

        let embedding = self.embedder.embed(query).await?;
        let hits = self.store.query(&self.collection, &embedding, n_results)?;
        debug!(
            collection = %self.collection,
            requested = n_results,
            returned = hits.len(),
            "Retrieved passages"
        );

        Ok(hits
            .into_iter()
            .map(|hit| RetrievedPassage {
                title: hit
                    .metadata
                    .get("title")
                    .cloned()
                    .unwrap_or_else(|| hit.id.clone()),
                id: hit.id,
                content: hit.document,
                distance: Some(hit.distance),
            })
            .collect())
    }
}
