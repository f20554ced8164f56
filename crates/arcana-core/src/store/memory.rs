//! In-memory [`KnowledgeStore`] implementation for testing and WASM targets.
//!
//! Uses `Vec`s behind `std::sync::RwLock`. Similarity search is brute-force
//! cosine similarity over every embedded chunk.

use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use crate::embedding::cosine_similarity;
use crate::models::{
    KnowledgeChunk, KnowledgeSource, NewChunk, NewSource, RetrievedChunk, SourceSummary,
};

use super::KnowledgeStore;

#[derive(Default)]
struct Inner {
    /// Insertion order; the last element is the newest source.
    sources: Vec<KnowledgeSource>,
    chunks: Vec<KnowledgeChunk>,
}

/// In-memory knowledge store.
#[derive(Default)]
pub struct InMemoryStore {
    inner: RwLock<Inner>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Inner>> {
        self.inner
            .read()
            .map_err(|_| anyhow!("in-memory store lock poisoned"))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Inner>> {
        self.inner
            .write()
            .map_err(|_| anyhow!("in-memory store lock poisoned"))
    }
}

impl Inner {
    fn source_name(&self, source_id: &str) -> String {
        self.sources
            .iter()
            .find(|s| s.id == source_id)
            .map(|s| s.name.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl KnowledgeStore for InMemoryStore {
    async fn create_source(&self, source: &NewSource) -> Result<KnowledgeSource> {
        let created = KnowledgeSource {
            id: Uuid::new_v4().to_string(),
            name: source.name.clone(),
            description: source.description.clone(),
            source_type: source.source_type.clone(),
            created_at: Utc::now(),
        };
        self.write()?.sources.push(created.clone());
        Ok(created)
    }

    async fn insert_chunks(&self, source_id: &str, chunks: &[NewChunk]) -> Result<()> {
        let mut inner = self.write()?;
        if !inner.sources.iter().any(|s| s.id == source_id) {
            bail!("unknown knowledge source: {}", source_id);
        }
        for chunk in chunks {
            inner.chunks.push(KnowledgeChunk {
                id: Uuid::new_v4().to_string(),
                source_id: source_id.to_string(),
                content: chunk.content.clone(),
                embedded: chunk.embedding.is_some(),
                embedding: chunk.embedding.clone(),
                chunk_index: chunk.chunk_index,
                metadata: chunk.metadata.clone(),
            });
        }
        Ok(())
    }

    async fn delete_source(&self, id: &str) -> Result<bool> {
        let mut inner = self.write()?;
        let before = inner.sources.len();
        inner.sources.retain(|s| s.id != id);
        inner.chunks.retain(|c| c.source_id != id);
        Ok(inner.sources.len() != before)
    }

    async fn get_source(&self, id: &str) -> Result<Option<KnowledgeSource>> {
        Ok(self.read()?.sources.iter().find(|s| s.id == id).cloned())
    }

    async fn list_sources(&self) -> Result<Vec<SourceSummary>> {
        let inner = self.read()?;
        Ok(inner
            .sources
            .iter()
            .rev()
            .map(|s| {
                let owned = inner.chunks.iter().filter(|c| c.source_id == s.id);
                SourceSummary {
                    source: s.clone(),
                    chunk_count: owned.clone().count() as i64,
                    embedded_count: owned.filter(|c| c.embedded).count() as i64,
                }
            })
            .collect())
    }

    async fn list_chunks_for_source(&self, id: &str) -> Result<Vec<KnowledgeChunk>> {
        let inner = self.read()?;
        let mut chunks: Vec<KnowledgeChunk> = inner
            .chunks
            .iter()
            .filter(|c| c.source_id == id)
            .cloned()
            .collect();
        chunks.sort_by_key(|c| c.chunk_index);
        Ok(chunks)
    }

    async fn similarity_search(
        &self,
        query: &[f32],
        threshold: f64,
        limit: usize,
    ) -> Result<Vec<RetrievedChunk>> {
        let inner = self.read()?;
        let mut hits: Vec<RetrievedChunk> = inner
            .chunks
            .iter()
            .filter_map(|c| {
                let vector = c.embedding.as_ref()?;
                let sim = cosine_similarity(query, vector) as f64;
                (sim > threshold).then(|| RetrievedChunk {
                    content: c.content.clone(),
                    source_name: inner.source_name(&c.source_id),
                    similarity: Some(sim),
                })
            })
            .collect();
        hits.sort_by(|a, b| {
            b.similarity
                .partial_cmp(&a.similarity)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        hits.truncate(limit);
        Ok(hits)
    }

    async fn recent_chunks(&self, limit: usize) -> Result<Vec<RetrievedChunk>> {
        let inner = self.read()?;
        let mut out = Vec::new();
        for source in inner.sources.iter().rev() {
            let mut owned: Vec<&KnowledgeChunk> = inner
                .chunks
                .iter()
                .filter(|c| c.source_id == source.id)
                .collect();
            owned.sort_by_key(|c| c.chunk_index);
            for chunk in owned {
                if out.len() >= limit {
                    return Ok(out);
                }
                out.push(RetrievedChunk {
                    content: chunk.content.clone(),
                    source_name: source.name.clone(),
                    similarity: None,
                });
            }
        }
        Ok(out)
    }
}
