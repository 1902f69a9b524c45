//! Corpus ingestion.
//!
//! Loads a JSON array of documents, embeds each one, and writes it into a
//! freshly replaced collection. Re-running ingestion is idempotent.

use crate::embeddings::Embedder;
use crate::error::{ConfigError, Result};
use crate::store::{DistanceMetric, VectorRecord, VectorStore};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use std::sync::Arc;
use tracing::info;

/// A corpus document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub title: String,
    pub content: String,
}

/// Outcome of a completed ingestion run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IngestReport {
    pub collection: String,
    pub documents: usize,
    pub dimensions: usize,
}

/// Read and validate a corpus file.
///
/// Ids must be unique and every document needs non-empty content.
pub async fn load_documents(path: &Path) -> Result<Vec<Document>> {
    let raw = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| ConfigError::CorpusUnreadable {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
    let malformed = |message: String| ConfigError::MalformedCorpus {
        path: path.to_path_buf(),
        message,
    };
    let docs: Vec<Document> = serde_json::from_str(&raw).map_err(|e| malformed(e.to_string()))?;

    let mut seen = HashSet::new();
    for doc in &docs {
        if !seen.insert(doc.id.as_str()) {
            return Err(malformed(format!("duplicate document id '{}'", doc.id)).into());
        }
        if doc.content.trim().is_empty() {
            return Err(malformed(format!("document '{}' has empty content", doc.id)).into());
        }
    }
    Ok(docs)
}

/// Writes a corpus into the vector store.
pub struct Ingestor {
    embedder: Arc<dyn Embedder>,
    store: Arc<dyn VectorStore>,
    collection: String,
}

impl Ingestor {
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

    /// Load the corpus at `path` and ingest it.
    pub async fn ingest(&self, path: &Path) -> Result<IngestReport> {
        let docs = load_documents(path).await?;
        self.ingest_documents(&docs).await
    }

    /// Replace the collection with `docs`, one embedding call per document.
    ///
    /// A failure part-way leaves the documents already written in place.
    pub async fn ingest_documents(&self, docs: &[Document]) -> Result<IngestReport> {
        self.store
            .replace_collection(&self.collection, DistanceMetric::Cosine)?;
        info!(
            collection = %self.collection,
            provider = self.embedder.provider_name(),
            "Replaced collection"
        );

        for doc in docs {
            let embedding = self.embedder.embed(&doc.content).await?;
            self.store.upsert(
                &self.collection,
                &[VectorRecord {
                    id: doc.id.clone(),
                    embedding,
                    metadata: BTreeMap::from([("title".to_string(), doc.title.clone())]),
                    document: doc.content.clone(),
                }],
            )?;
            info!(id = %doc.id, title = %doc.title, "Ingested document");
        }

        info!(
            collection = %self.collection,
            documents = docs.len(),
            "Ingestion complete"
        );
        Ok(IngestReport {
            collection: self.collection.clone(),
            documents: docs.len(),
            dimensions: self.embedder.dimensions(),
        })
    }
}
