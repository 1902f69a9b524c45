//! In-memory vector store.

use super::{
    DistanceMetric, QueryHit, VectorRecord, VectorStore, check_dimensions, check_top_k, rank,
};
use crate::error::{NotFoundError, RagError, Result, ServiceError};
use std::collections::{BTreeMap, HashMap};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

#[derive(Debug, Default)]
struct Collection {
    metric: DistanceMetric,
    dimensions: Option<usize>,
    records: BTreeMap<String, VectorRecord>,
}

/// A vector store that lives only as long as the process.
#[derive(Debug, Default)]
pub struct InMemoryVectorStore {
    collections: RwLock<HashMap<String, Collection>>,
}

impl InMemoryVectorStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, Collection>> {
        self.collections
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, Collection>> {
        self.collections
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn missing(name: &str) -> RagError {
    NotFoundError::Collection {
        name: name.to_string(),
    }
    .into()
}

impl VectorStore for InMemoryVectorStore {
    fn create_collection(&self, name: &str, metric: DistanceMetric) -> Result<()> {
        let mut collections = self.write();
        if collections.contains_key(name) {
            return Err(ServiceError::store(format!("collection '{name}' already exists")).into());
        }
        collections.insert(
            name.to_string(),
            Collection {
                metric,
                ..Default::default()
            },
        );
        Ok(())
    }

    fn delete_collection(&self, name: &str) -> Result<bool> {
        Ok(self.write().remove(name).is_some())
    }

    fn has_collection(&self, name: &str) -> Result<bool> {
        Ok(self.read().contains_key(name))
    }

    fn count(&self, name: &str) -> Result<usize> {
        self.read()
            .get(name)
            .map(|c| c.records.len())
            .ok_or_else(|| missing(name))
    }

    fn upsert(&self, name: &str, records: &[VectorRecord]) -> Result<()> {
        let mut collections = self.write();
        let collection = collections.get_mut(name).ok_or_else(|| missing(name))?;

        // Validate the whole batch before touching anything.
        let mut dims = collection.dimensions;
        for record in records {
            match dims {
                Some(d) => check_dimensions(name, d, record.embedding.len())?,
                None => dims = Some(record.embedding.len()),
            }
        }
        collection.dimensions = dims;
        for record in records {
            collection.records.insert(record.id.clone(), record.clone());
        }
        Ok(())
    }

    fn query(&self, name: &str, embedding: &[f32], top_k: usize) -> Result<Vec<QueryHit>> {
        check_top_k(top_k)?;
        let collections = self.read();
        let collection = collections.get(name).ok_or_else(|| missing(name))?;
        if let Some(d) = collection.dimensions {
            check_dimensions(name, d, embedding.len())?;
        }
        let candidates = collection.records.values().map(|r| {
            (
                r.id.clone(),
                r.embedding.clone(),
                r.metadata.clone(),
                r.document.clone(),
            )
        });
        Ok(rank(collection.metric, embedding, candidates, top_k))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn record(id: &str, embedding: Vec<f32>) -> VectorRecord {
        VectorRecord {
            id: id.to_string(),
            embedding,
            metadata: BTreeMap::from([("title".to_string(), id.to_uppercase())]),
            document: format!("{id} body"),
        }
    }

    #[test]
    fn test_collection_lifecycle() {
        let store = InMemoryVectorStore::new();
        store
            .create_collection("kb", DistanceMetric::Cosine)
            .unwrap();
        assert!(store.has_collection("kb").unwrap());
        assert!(store.create_collection("kb", DistanceMetric::Cosine).is_err());
        assert!(store.delete_collection("kb").unwrap());
        assert!(!store.delete_collection("kb").unwrap());
    }

    #[test]
    fn test_upsert_overwrites_same_id() {
        let store = InMemoryVectorStore::new();
        store.create_collection("kb", DistanceMetric::Cosine).unwrap();
        store.upsert("kb", &[record("a", vec![1.0, 0.0])]).unwrap();
        store.upsert("kb", &[record("a", vec![0.0, 1.0])]).unwrap();
        assert_eq!(store.count("kb").unwrap(), 1);
        let hits = store.query("kb", &[0.0, 1.0], 1).unwrap();
        assert!(hits[0].distance.abs() < 1e-6);
    }

    #[test]
    fn test_query_nearest_first() {
        let store = InMemoryVectorStore::new();
        store.create_collection("kb", DistanceMetric::Cosine).unwrap();
        store
            .upsert(
                "kb",
                &[
                    record("far", vec![0.0, 1.0]),
                    record("near", vec![1.0, 0.1]),
                    record("mid", vec![1.0, 1.0]),
                ],
            )
            .unwrap();
        let hits = store.query("kb", &[1.0, 0.0], 10).unwrap();
        let ids: Vec<&str> = hits.iter().map(|h| h.id.as_str()).collect();
        assert_eq!(ids, vec!["near", "mid", "far"]);
        assert_eq!(hits[0].metadata["title"], "NEAR");
        assert_eq!(hits[0].document, "near body");
    }

    #[test]
    fn test_missing_collection_is_not_found() {
        let store = InMemoryVectorStore::new();
        assert_eq!(store.count("nope").unwrap_err().kind(), ErrorKind::NotFound);
        assert_eq!(
            store.query("nope", &[1.0], 1).unwrap_err().kind(),
            ErrorKind::NotFound
        );
    }

    #[test]
    fn test_dimension_mismatch_rejected() {
        let store = InMemoryVectorStore::new();
        store.create_collection("kb", DistanceMetric::Cosine).unwrap();
        store.upsert("kb", &[record("a", vec![1.0, 0.0])]).unwrap();
        let err = store
            .upsert("kb", &[record("b", vec![1.0, 0.0, 0.0])])
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Service);
        assert_eq!(store.count("kb").unwrap(), 1);
        assert!(store.query("kb", &[1.0], 1).is_err());
    }

    #[test]
    fn test_replace_collection_clears_records() {
        let store = InMemoryVectorStore::new();
        store.create_collection("kb", DistanceMetric::Cosine).unwrap();
        store.upsert("kb", &[record("a", vec![1.0])]).unwrap();
        store.replace_collection("kb", DistanceMetric::Cosine).unwrap();
        assert_eq!(store.count("kb").unwrap(), 0);
    }
}
