//! SQLite-backed vector store.
//!
//! Embeddings are stored as little-endian `f32` blobs next to their document
//! text and JSON-encoded metadata. Queries scan the whole collection and rank
//! in process, which is fine for corpora of a few thousand documents.

use super::{
    DistanceMetric, QueryHit, VectorRecord, VectorStore, check_dimensions, check_top_k, rank,
};
use crate::error::{NotFoundError, RagError, Result, ServiceError};
use rusqlite::{Connection, OptionalExtension, params};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use tracing::debug;

const SCHEMA_SQL: &str = "
CREATE TABLE IF NOT EXISTS collections (
    name        TEXT PRIMARY KEY,
    metric      TEXT NOT NULL,
    dimensions  INTEGER
);
CREATE TABLE IF NOT EXISTS records (
    collection  TEXT NOT NULL REFERENCES collections(name) ON DELETE CASCADE,
    id          TEXT NOT NULL,
    embedding   BLOB NOT NULL,
    metadata    TEXT NOT NULL,
    document    TEXT NOT NULL,
    PRIMARY KEY (collection, id)
);
";

/// A persistent vector store in a single SQLite file.
pub struct SqliteVectorStore {
    conn: Mutex<Connection>,
}

impl SqliteVectorStore {
    /// Open (or create) the database at `path`, creating parent directories.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        debug!(path = %path.display(), "Opening vector store");
        Self::init(Connection::open(path)?)
    }

    /// A private in-memory database.
    pub fn open_in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.pragma_update(None, "foreign_keys", 1)?;
        conn.execute_batch(SCHEMA_SQL)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Metric and fixed dimensionality of a collection, if it exists.
fn collection_info(
    conn: &Connection,
    name: &str,
) -> Result<Option<(DistanceMetric, Option<usize>)>> {
    let row: Option<(String, Option<i64>)> = conn
        .query_row(
            "SELECT metric, dimensions FROM collections WHERE name = ?1",
            params![name],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .optional()?;
    let Some((metric, dims)) = row else {
        return Ok(None);
    };
    let metric = DistanceMetric::parse(&metric)
        .ok_or_else(|| ServiceError::store(format!("unknown metric '{metric}' in database")))?;
    Ok(Some((metric, dims.map(|d| d as usize))))
}

fn require_collection(conn: &Connection, name: &str) -> Result<(DistanceMetric, Option<usize>)> {
    collection_info(conn, name)?.ok_or_else(|| {
        RagError::from(NotFoundError::Collection {
            name: name.to_string(),
        })
    })
}

fn encode_embedding(vector: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(std::mem::size_of_val(vector));
    for &value in vector {
        bytes.extend_from_slice(&value.to_le_bytes());
    }
    bytes
}

fn decode_embedding(blob: &[u8]) -> Result<Vec<f32>> {
    if blob.len() % 4 != 0 {
        return Err(ServiceError::store(format!(
            "invalid embedding byte length {}",
            blob.len()
        ))
        .into());
    }
    Ok(blob
        .chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect())
}

impl VectorStore for SqliteVectorStore {
    fn create_collection(&self, name: &str, metric: DistanceMetric) -> Result<()> {
        let conn = self.conn();
        if collection_info(&conn, name)?.is_some() {
            return Err(ServiceError::store(format!("collection '{name}' already exists")).into());
        }
        conn.execute(
            "INSERT INTO collections (name, metric, dimensions) VALUES (?1, ?2, NULL)",
            params![name, metric.as_str()],
        )?;
        Ok(())
    }

    fn delete_collection(&self, name: &str) -> Result<bool> {
        let deleted = self
            .conn()
            .execute("DELETE FROM collections WHERE name = ?1", params![name])?;
        Ok(deleted > 0)
    }

    fn has_collection(&self, name: &str) -> Result<bool> {
        Ok(collection_info(&self.conn(), name)?.is_some())
    }

    fn count(&self, name: &str) -> Result<usize> {
        let conn = self.conn();
        require_collection(&conn, name)?;
        let n: i64 = conn.query_row(
            "SELECT COUNT(*) FROM records WHERE collection = ?1",
            params![name],
            |row| row.get(0),
        )?;
        Ok(n as usize)
    }

    fn upsert(&self, name: &str, records: &[VectorRecord]) -> Result<()> {
        let mut conn = self.conn();
        let (_, mut dims) = require_collection(&conn, name)?;
        for record in records {
            match dims {
                Some(d) => check_dimensions(name, d, record.embedding.len())?,
                None => dims = Some(record.embedding.len()),
            }
        }

        let tx = conn.transaction()?;
        if let Some(d) = dims {
            tx.execute(
                "UPDATE collections SET dimensions = ?1 WHERE name = ?2",
                params![d as i64, name],
            )?;
        }
        {
            let mut stmt = tx.prepare(
                "INSERT INTO records (collection, id, embedding, metadata, document)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT(collection, id) DO UPDATE SET
                    embedding = excluded.embedding,
                    metadata = excluded.metadata,
                    document = excluded.document",
            )?;
            for record in records {
                stmt.execute(params![
                    name,
                    record.id,
                    encode_embedding(&record.embedding),
                    serde_json::to_string(&record.metadata)?,
                    record.document,
                ])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    fn query(&self, name: &str, embedding: &[f32], top_k: usize) -> Result<Vec<QueryHit>> {
        check_top_k(top_k)?;
        let conn = self.conn();
        let (metric, dims) = require_collection(&conn, name)?;
        if let Some(d) = dims {
            check_dimensions(name, d, embedding.len())?;
        }

        let mut stmt = conn.prepare(
            "SELECT id, embedding, metadata, document FROM records WHERE collection = ?1",
        )?;
        let rows = stmt.query_map(params![name], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, Vec<u8>>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
            ))
        })?;

        let mut candidates = Vec::new();
        for row in rows {
            let (id, blob, metadata, document) = row?;
            let metadata: BTreeMap<String, String> = serde_json::from_str(&metadata)?;
            candidates.push((id, decode_embedding(&blob)?, metadata, document));
        }
        Ok(rank(metric, embedding, candidates, top_k))
    }
}
