//! Vector store abstraction.
//!
//! Named collections of embeddings with nearest-neighbor queries by exact
//! (brute-force) distance. Two backends: [`SqliteVectorStore`] for a
//! persistent file and [`InMemoryVectorStore`] for tests and throwaway runs.

pub mod memory;
pub mod sqlite;

use crate::config::{StoreBackend, StoreConfig};
use crate::error::{RagError, Result, ServiceError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

pub use memory::InMemoryVectorStore;
pub use sqlite::SqliteVectorStore;

/// Distance function a collection is ranked by.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DistanceMetric {
    /// 1 − cosine similarity.
    #[default]
    Cosine,
    /// Squared Euclidean distance.
    L2,
    /// 1 − dot product.
    InnerProduct,
}

impl DistanceMetric {
    pub fn as_str(&self) -> &'static str {
        match self {
            DistanceMetric::Cosine => "cosine",
            DistanceMetric::L2 => "l2",
            DistanceMetric::InnerProduct => "inner_product",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "cosine" => Some(DistanceMetric::Cosine),
            "l2" => Some(DistanceMetric::L2),
            "inner_product" | "ip" => Some(DistanceMetric::InnerProduct),
            _ => None,
        }
    }

    /// Distance between two equal-length vectors; smaller is nearer.
    pub fn distance(&self, a: &[f32], b: &[f32]) -> f32 {
        match self {
            DistanceMetric::Cosine => 1.0 - crate::embeddings::cosine_similarity(a, b),
            DistanceMetric::L2 => a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum(),
            DistanceMetric::InnerProduct => 1.0 - a.iter().zip(b).map(|(x, y)| x * y).sum::<f32>(),
        }
    }
}

impl std::fmt::Display for DistanceMetric {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One entry to write into a collection.
#[derive(Debug, Clone, PartialEq)]
pub struct VectorRecord {
    pub id: String,
    pub embedding: Vec<f32>,
    pub metadata: BTreeMap<String, String>,
    pub document: String,
}

/// One ranked query result.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryHit {
    pub id: String,
    pub document: String,
    pub metadata: BTreeMap<String, String>,
    pub distance: f32,
}

/// Storage backend for embeddings.
///
/// Operations on a collection that does not exist fail with `NOT_FOUND`. The
/// first upsert fixes a collection's dimensionality.
pub trait VectorStore: Send + Sync {
    /// Create an empty collection. Fails if it already exists.
    fn create_collection(&self, name: &str, metric: DistanceMetric) -> Result<()>;

    /// Drop a collection and all its records. Returns false if it did not exist.
    fn delete_collection(&self, name: &str) -> Result<bool>;

    /// Drop (if present) and recreate a collection.
    fn replace_collection(&self, name: &str, metric: DistanceMetric) -> Result<()> {
        self.delete_collection(name)?;
        self.create_collection(name, metric)
    }

    fn has_collection(&self, name: &str) -> Result<bool>;

    /// Number of records in a collection.
    fn count(&self, name: &str) -> Result<usize>;

    /// Insert or overwrite records by id.
    fn upsert(&self, name: &str, records: &[VectorRecord]) -> Result<()>;

    /// The `top_k` nearest records, nearest first.
    fn query(&self, name: &str, embedding: &[f32], top_k: usize) -> Result<Vec<QueryHit>>;
}

/// Open the backend selected in config.
pub fn create_store(config: &StoreConfig) -> Result<Arc<dyn VectorStore>> {
    match config.backend {
        StoreBackend::Sqlite => Ok(Arc::new(SqliteVectorStore::open(&config.path)?)),
        StoreBackend::Memory => Ok(Arc::new(InMemoryVectorStore::new())),
    }
}

pub(crate) fn check_top_k(top_k: usize) -> Result<()> {
    if top_k == 0 {
        return Err(RagError::invalid_input("top_k must be at least 1"));
    }
    Ok(())
}

pub(crate) fn check_dimensions(collection: &str, expected: usize, got: usize) -> Result<()> {
    if expected != got {
        return Err(ServiceError::store(format!(
            "collection '{collection}' holds {expected}-dimensional embeddings, got {got}"
        ))
        .into());
    }
    Ok(())
}

/// Score every candidate, then keep the `top_k` nearest. Ties break by id.
pub(crate) fn rank<I>(
    metric: DistanceMetric,
    query: &[f32],
    candidates: I,
    top_k: usize,
) -> Vec<QueryHit>
where
    I: IntoIterator<Item = (String, Vec<f32>, BTreeMap<String, String>, String)>,
{
    let mut hits: Vec<QueryHit> = candidates
        .into_iter()
        .map(|(id, embedding, metadata, document)| QueryHit {
            distance: metric.distance(query, &embedding),
            id,
            document,
            metadata,
        })
        .collect();
    // NaN distances rank after every real one
    hits.sort_by(|a, b| {
        a.distance
            .is_nan()
            .cmp(&b.distance.is_nan())
            .then_with(|| a.distance.total_cmp(&b.distance))
            .then_with(|| a.id.cmp(&b.id))
    });
    hits.truncate(top_k);
    hits
}
