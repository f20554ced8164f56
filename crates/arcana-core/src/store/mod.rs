//! Knowledge store abstraction.
//!
//! The [`KnowledgeStore`] trait defines every storage operation the
//! ingestion and retrieval pipelines need, so the same algorithms run
//! against SQLite in the app and against [`memory::InMemoryStore`] in
//! tests.
//!
//! # Operations
//!
//! | Method | Purpose |
//! |--------|---------|
//! | [`create_source`](KnowledgeStore::create_source) | Register a new source |
//! | [`insert_chunks`](KnowledgeStore::insert_chunks) | Batch-write all chunks of a source |
//! | [`delete_source`](KnowledgeStore::delete_source) | Delete a source and its chunks |
//! | [`get_source`](KnowledgeStore::get_source) | Fetch one source |
//! | [`list_sources`](KnowledgeStore::list_sources) | Sources with chunk counts |
//! | [`list_chunks_for_source`](KnowledgeStore::list_chunks_for_source) | Chunks in index order |
//! | [`similarity_search`](KnowledgeStore::similarity_search) | Ranked vector search |
//! | [`recent_chunks`](KnowledgeStore::recent_chunks) | Unranked candidates for text matching |
//!
//! # Atomicity
//!
//! Implementations are not required to offer multi-statement transactions
//! across calls. A caller that creates a source and then fails to insert
//! its chunks must delete the source itself.

pub mod memory;

use anyhow::Result;
use async_trait::async_trait;

use crate::models::{KnowledgeChunk, KnowledgeSource, NewChunk, NewSource, RetrievedChunk, SourceSummary};

/// Abstract storage backend for the knowledge base.
#[async_trait]
pub trait KnowledgeStore: Send + Sync {
    /// Create a source and return it with its generated id and timestamp.
    async fn create_source(&self, source: &NewSource) -> Result<KnowledgeSource>;

    /// Insert all chunks for a source as a single batch.
    ///
    /// Either every chunk is written or none is.
    async fn insert_chunks(&self, source_id: &str, chunks: &[NewChunk]) -> Result<()>;

    /// Delete a source and all of its chunks.
    ///
    /// Returns `false` when no source had that id.
    async fn delete_source(&self, id: &str) -> Result<bool>;

    async fn get_source(&self, id: &str) -> Result<Option<KnowledgeSource>>;

    /// All sources, newest first, with chunk and embedding counts.
    async fn list_sources(&self) -> Result<Vec<SourceSummary>>;

    /// Chunks of one source ordered by `chunk_index`.
    async fn list_chunks_for_source(&self, id: &str) -> Result<Vec<KnowledgeChunk>>;

    /// Chunks whose embedding has cosine similarity strictly greater than
    /// `threshold` with `query`, best first, at most `limit`.
    ///
    /// Chunks without an embedding never match.
    async fn similarity_search(
        &self,
        query: &[f32],
        threshold: f64,
        limit: usize,
    ) -> Result<Vec<RetrievedChunk>>;

    /// Up to `limit` chunks in store order (newest source first, then
    /// chunk index), with no similarity attached.
    async fn recent_chunks(&self, limit: usize) -> Result<Vec<RetrievedChunk>>;
}
