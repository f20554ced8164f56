//! Knowledge ingestion pipeline.
//!
//! Coordinates one document's flow: validation → chunking → embedding →
//! storage. Used by `POST /knowledge/ingest` and `arcana kb ingest`.
//!
//! # Algorithm
//!
//! 1. Reject the request when `name` or `content` is blank.
//! 2. Split the content with [`split_into_chunks`] and assign contiguous
//!    indices with [`build_chunks`].
//! 3. Embed every chunk concurrently (at most `concurrency` requests in
//!    flight). A failed embedding leaves that chunk without a vector; the
//!    chunk is still stored and reachable through text matching.
//! 4. Create the source, then write all chunks in one batch. If the batch
//!    fails the source is deleted again, so a source never exists without
//!    its chunks.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use arcana_core::chunk::{build_chunks, split_into_chunks};
use arcana_core::embedding::Embedder;
use arcana_core::models::NewSource;
use arcana_core::store::KnowledgeStore;

use crate::config::{ChunkingConfig, Config};
use crate::db;
use crate::embedding::create_embedder;
use crate::sqlite_store::SqliteStore;

/// A document to add to the knowledge base.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub content: String,
    #[serde(default = "default_source_type")]
    pub source_type: String,
}

fn default_source_type() -> String {
    "manual".to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestOutcome {
    pub source_id: String,
    pub chunks_created: usize,
    pub chunks_embedded: usize,
}

#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    #[error("Name and content are required")]
    MissingFields,
    #[error("Failed to create source")]
    CreateSource(anyhow::Error),
    #[error("Failed to create chunks")]
    CreateChunks(anyhow::Error),
}

/// Embed `pieces` concurrently, returning one slot per piece in input order.
pub async fn embed_all(
    embedder: Arc<dyn Embedder>,
    pieces: &[String],
    concurrency: usize,
) -> Vec<Option<Vec<f32>>> {
    let semaphore = Arc::new(Semaphore::new(concurrency.max(1)));
    let mut set = JoinSet::new();

    for (index, text) in pieces.iter().enumerate() {
        let embedder = embedder.clone();
        let semaphore = semaphore.clone();
        let text = text.clone();
        set.spawn(async move {
            let _permit = semaphore.acquire_owned().await;
            (index, embedder.embed(&text).await)
        });
    }

    let mut vectors = vec![None; pieces.len()];
    while let Some(joined) = set.join_next().await {
        match joined {
            Ok((index, Ok(vector))) => vectors[index] = Some(vector),
            Ok((index, Err(e))) => {
                tracing::warn!(chunk_index = index, error = %e, "embedding failed, storing chunk without vector");
            }
            Err(e) => tracing::warn!(error = %e, "embedding task failed"),
        }
    }
    vectors
}

/// Run the ingestion pipeline for one document.
pub async fn ingest_document(
    store: &dyn KnowledgeStore,
    embedder: Option<Arc<dyn Embedder>>,
    chunking: &ChunkingConfig,
    concurrency: usize,
    request: &IngestRequest,
) -> Result<IngestOutcome, IngestError> {
    let name = request.name.trim();
    if name.is_empty() || request.content.trim().is_empty() {
        return Err(IngestError::MissingFields);
    }

    let pieces = split_into_chunks(&request.content, chunking.target_size, chunking.overlap);

    let vectors = match embedder {
        Some(embedder) => embed_all(embedder, &pieces, concurrency).await,
        None => vec![None; pieces.len()],
    };

    let mut chunks = build_chunks(pieces);
    for (chunk, vector) in chunks.iter_mut().zip(vectors) {
        chunk.embedding = vector;
    }
    let chunks_embedded = chunks.iter().filter(|c| c.embedding.is_some()).count();

    let source = store
        .create_source(&NewSource {
            name: name.to_string(),
            description: request.description.trim().to_string(),
            source_type: request.source_type.clone(),
        })
        .await
        .map_err(IngestError::CreateSource)?;

    if let Err(e) = store.insert_chunks(&source.id, &chunks).await {
        tracing::error!(source_id = %source.id, error = %e, "chunk insert failed, removing source");
        if let Err(cleanup) = store.delete_source(&source.id).await {
            tracing::error!(source_id = %source.id, error = %cleanup, "failed to remove source after chunk insert failure");
        }
        return Err(IngestError::CreateChunks(e));
    }

    tracing::info!(
        source_id = %source.id,
        name,
        chunks = chunks.len(),
        embedded = chunks_embedded,
        "knowledge source ingested"
    );

    Ok(IngestOutcome {
        source_id: source.id,
        chunks_created: chunks.len(),
        chunks_embedded,
    })
}

/// `arcana kb ingest`: read a file and ingest it.
pub async fn run_ingest(
    config: &Config,
    path: &Path,
    name: Option<String>,
    description: Option<String>,
    source_type: String,
) -> Result<()> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let name = name.unwrap_or_else(|| {
        path.file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string())
    });

    let pool = db::connect(config).await?;
    let store = SqliteStore::new(pool.clone());
    let embedder = create_embedder(&config.embedding)?;

    let request = IngestRequest {
        name,
        description: description.unwrap_or_default(),
        content,
        source_type,
    };
    let outcome = ingest_document(
        &store,
        embedder,
        &config.chunking,
        config.embedding.concurrency,
        &request,
    )
    .await?;

    println!("ingest {}", request.name);
    println!("  source: {}", outcome.source_id);
    println!("  chunks written: {}", outcome.chunks_created);
    if config.embedding.is_enabled() {
        println!("  embeddings written: {}", outcome.chunks_embedded);
    }
    println!("ok");

    pool.close().await;
    Ok(())
}
