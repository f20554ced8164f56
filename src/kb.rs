//! `arcana kb` commands: inspect and query the knowledge base from the
//! command line.

use anyhow::{bail, Result};

use arcana_core::retrieve::{retrieve, RetrievalPath, RetrievalRequest};
use arcana_core::store::KnowledgeStore;

use crate::config::Config;
use crate::db;
use crate::embedding::create_embedder;
use crate::sqlite_store::SqliteStore;

/// Longest content preview printed per chunk.
const PREVIEW_CHARS: usize = 160;

fn preview(text: &str) -> String {
    let flat = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.chars().count() <= PREVIEW_CHARS {
        flat
    } else {
        let cut: String = flat.chars().take(PREVIEW_CHARS).collect();
        format!("{}...", cut)
    }
}

pub async fn run_list(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;
    let store = SqliteStore::new(pool.clone());
    let sources = store.list_sources().await?;

    if sources.is_empty() {
        println!("No knowledge sources.");
    } else {
        println!(
            "{:<38} {:<28} {:>7} {:>9}  {}",
            "ID", "NAME", "CHUNKS", "EMBEDDED", "CREATED"
        );
        for s in &sources {
            println!(
                "{:<38} {:<28} {:>7} {:>9}  {}",
                s.source.id,
                s.source.name,
                s.chunk_count,
                s.embedded_count,
                s.source.created_at.format("%Y-%m-%d %H:%M")
            );
        }
    }

    pool.close().await;
    Ok(())
}

pub async fn run_chunks(config: &Config, source_id: &str) -> Result<()> {
    let pool = db::connect(config).await?;
    let store = SqliteStore::new(pool.clone());

    let Some(source) = store.get_source(source_id).await? else {
        bail!("Source not found: {}", source_id);
    };
    let chunks = store.list_chunks_for_source(source_id).await?;

    println!("{} ({} chunks)", source.name, chunks.len());
    for chunk in &chunks {
        let marker = if chunk.embedded { "*" } else { " " };
        println!("  [{}]{} {}", chunk.chunk_index, marker, preview(&chunk.content));
    }

    pool.close().await;
    Ok(())
}

pub async fn run_delete(config: &Config, source_id: &str) -> Result<()> {
    let pool = db::connect(config).await?;
    let store = SqliteStore::new(pool.clone());

    if !store.delete_source(source_id).await? {
        bail!("Source not found: {}", source_id);
    }
    println!("deleted {}", source_id);

    pool.close().await;
    Ok(())
}

pub async fn run_query(
    config: &Config,
    query: &str,
    cards: Vec<String>,
    limit: Option<usize>,
) -> Result<()> {
    if query.trim().is_empty() {
        println!("No results.");
        return Ok(());
    }

    let pool = db::connect(config).await?;
    let store = SqliteStore::new(pool.clone());
    let embedder = create_embedder(&config.embedding)?;
    let limit = limit
        .unwrap_or(config.retrieval.default_limit)
        .clamp(1, config.retrieval.max_limit);

    let retrieval = retrieve(
        &store,
        embedder.as_deref(),
        &RetrievalRequest {
            query: query.trim(),
            context_terms: &cards,
            limit,
            threshold: config.retrieval.match_threshold,
        },
    )
    .await;

    if retrieval.chunks.is_empty() {
        println!("No results.");
    } else {
        let path = match retrieval.path {
            RetrievalPath::Vector => "vector",
            RetrievalPath::TextMatch => "text match",
        };
        println!("{} result(s) via {} for \"{}\"", retrieval.chunks.len(), path, retrieval.query);
        for (i, chunk) in retrieval.chunks.iter().enumerate() {
            let score = chunk
                .similarity
                .map(|s| format!("{:.3}", s))
                .unwrap_or_else(|| "-".to_string());
            println!();
            println!("{}. [{}] {}", i + 1, score, chunk.source_name);
            println!("   {}", preview(&chunk.content));
        }
    }

    pool.close().await;
    Ok(())
}
