//! Ingestion pipeline tests against the SQLite store.

use anyhow::{bail, Result};
use async_trait::async_trait;
use sqlx::SqlitePool;
use std::sync::Arc;
use tempfile::TempDir;

use arcana::config::{ChunkingConfig, Config};
use arcana::ingest::{ingest_document, IngestError, IngestRequest};
use arcana::sqlite_store::SqliteStore;
use arcana::{db, migrate};
use arcana_core::embedding::{normalize, Embedder};
use arcana_core::models::{
    KnowledgeChunk, KnowledgeSource, NewChunk, NewSource, RetrievedChunk, SourceSummary,
};
use arcana_core::retrieve::{retrieve, RetrievalPath, RetrievalRequest};
use arcana_core::store::KnowledgeStore;

const DOCUMENT: &str = "The Hermit walks alone with a lantern. He seeks truth in solitude. \
The Star pours water under the sky. It promises hope after the storm.";

/// Maps text onto three axes by keyword; refuses anything mentioning "storm".
struct KeywordEmbedder;

#[async_trait]
impl Embedder for KeywordEmbedder {
    fn model_name(&self) -> &str {
        "keyword-test"
    }

    fn dims(&self) -> usize {
        3
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let text = text.to_lowercase();
        if text.contains("storm") {
            bail!("upstream rejected input");
        }
        let v = if text.contains("hermit") {
            vec![1.0, 0.0, 0.0]
        } else if text.contains("star") {
            vec![0.0, 1.0, 0.0]
        } else {
            vec![0.0, 0.0, 1.0]
        };
        Ok(normalize(v))
    }
}

/// Delegates to SQLite but fails every chunk insert.
struct FailingChunkStore {
    inner: SqliteStore,
}

#[async_trait]
impl KnowledgeStore for FailingChunkStore {
    async fn create_source(&self, source: &NewSource) -> Result<KnowledgeSource> {
        self.inner.create_source(source).await
    }

    async fn insert_chunks(&self, _source_id: &str, _chunks: &[NewChunk]) -> Result<()> {
        bail!("disk I/O error")
    }

    async fn delete_source(&self, id: &str) -> Result<bool> {
        self.inner.delete_source(id).await
    }

    async fn get_source(&self, id: &str) -> Result<Option<KnowledgeSource>> {
        self.inner.get_source(id).await
    }

    async fn list_sources(&self) -> Result<Vec<SourceSummary>> {
        self.inner.list_sources().await
    }

    async fn list_chunks_for_source(&self, id: &str) -> Result<Vec<KnowledgeChunk>> {
        self.inner.list_chunks_for_source(id).await
    }

    async fn similarity_search(
        &self,
        query: &[f32],
        threshold: f64,
        limit: usize,
    ) -> Result<Vec<RetrievedChunk>> {
        self.inner.similarity_search(query, threshold, limit).await
    }

    async fn recent_chunks(&self, limit: usize) -> Result<Vec<RetrievedChunk>> {
        self.inner.recent_chunks(limit).await
    }
}

async fn test_pool(tmp: &TempDir) -> SqlitePool {
    let config: Config = toml::from_str(&format!(
        "[db]\npath = \"{}\"\n\n[server]\nbind = \"127.0.0.1:0\"\n",
        tmp.path().join("kb.sqlite").display()
    ))
    .unwrap();
    let pool = db::connect(&config).await.unwrap();
    migrate::apply(&pool).await.unwrap();
    pool
}

fn small_chunks() -> ChunkingConfig {
    ChunkingConfig {
        target_size: 40,
        overlap: 0,
    }
}

fn request(name: &str, content: &str) -> IngestRequest {
    IngestRequest {
        name: name.to_string(),
        description: "Reference notes".to_string(),
        content: content.to_string(),
        source_type: "manual".to_string(),
    }
}

#[tokio::test]
async fn test_ingest_stores_ordered_chunks_with_embeddings() {
    let tmp = TempDir::new().unwrap();
    let store = SqliteStore::new(test_pool(&tmp).await);
    let embedder: Arc<dyn Embedder> = Arc::new(KeywordEmbedder);

    let outcome = ingest_document(
        &store,
        Some(embedder.clone()),
        &small_chunks(),
        2,
        &request("Major Arcana", DOCUMENT),
    )
    .await
    .unwrap();

    assert!(outcome.chunks_created >= 2);
    // Exactly one chunk mentions the storm, and its embedding fails.
    assert_eq!(outcome.chunks_embedded, outcome.chunks_created - 1);

    let chunks = store.list_chunks_for_source(&outcome.source_id).await.unwrap();
    assert_eq!(chunks.len(), outcome.chunks_created);
    for (i, chunk) in chunks.iter().enumerate() {
        assert_eq!(chunk.chunk_index, i as i64);
        assert_eq!(chunk.embedded, !chunk.content.contains("storm"));
    }

    let sources = store.list_sources().await.unwrap();
    assert_eq!(sources.len(), 1);
    assert_eq!(sources[0].source.name, "Major Arcana");
    assert_eq!(sources[0].chunk_count, outcome.chunks_created as i64);
    assert_eq!(sources[0].embedded_count, outcome.chunks_embedded as i64);
}

#[tokio::test]
async fn test_ingested_chunks_are_retrievable_by_vector() {
    let tmp = TempDir::new().unwrap();
    let store = SqliteStore::new(test_pool(&tmp).await);
    let embedder: Arc<dyn Embedder> = Arc::new(KeywordEmbedder);

    ingest_document(
        &store,
        Some(embedder.clone()),
        &small_chunks(),
        4,
        &request("Major Arcana", DOCUMENT),
    )
    .await
    .unwrap();

    let retrieval = retrieve(
        &store,
        Some(embedder.as_ref()),
        &RetrievalRequest::new("the hermit", &[], 5),
    )
    .await;

    assert_eq!(retrieval.path, RetrievalPath::Vector);
    assert!(!retrieval.chunks.is_empty());
    for chunk in &retrieval.chunks {
        assert!(chunk.content.contains("Hermit"));
        assert_eq!(chunk.source_name, "Major Arcana");
        assert!(chunk.similarity.unwrap() > 0.99);
    }
}

#[tokio::test]
async fn test_ingest_without_embedder_uses_text_search() {
    let tmp = TempDir::new().unwrap();
    let store = SqliteStore::new(test_pool(&tmp).await);

    let outcome = ingest_document(&store, None, &small_chunks(), 4, &request("Notes", DOCUMENT))
        .await
        .unwrap();
    assert_eq!(outcome.chunks_embedded, 0);

    let retrieval = retrieve(&store, None, &RetrievalRequest::new("solitude", &[], 10)).await;
    assert_eq!(retrieval.path, RetrievalPath::TextMatch);
    assert_eq!(retrieval.chunks.len(), 1);
    assert!(retrieval.chunks[0].content.contains("solitude"));
    assert!(retrieval.chunks[0].similarity.is_none());
}

#[tokio::test]
async fn test_failed_chunk_insert_removes_source() {
    let tmp = TempDir::new().unwrap();
    let pool = test_pool(&tmp).await;
    let store = FailingChunkStore {
        inner: SqliteStore::new(pool.clone()),
    };

    let err = ingest_document(&store, None, &small_chunks(), 4, &request("Doomed", DOCUMENT))
        .await
        .unwrap_err();

    assert!(matches!(err, IngestError::CreateChunks(_)));
    assert_eq!(err.to_string(), "Failed to create chunks");
    assert!(store.list_sources().await.unwrap().is_empty());

    let chunk_rows: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM knowledge_chunks")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(chunk_rows, 0);
}

#[tokio::test]
async fn test_missing_fields_create_nothing() {
    let tmp = TempDir::new().unwrap();
    let store = SqliteStore::new(test_pool(&tmp).await);

    let err = ingest_document(&store, None, &small_chunks(), 4, &request("Empty", "   \n "))
        .await
        .unwrap_err();
    assert!(matches!(err, IngestError::MissingFields));
    assert!(store.list_sources().await.unwrap().is_empty());
}
