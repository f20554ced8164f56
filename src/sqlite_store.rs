//! SQLite-backed [`KnowledgeStore`] implementation.
//!
//! Similarity search is brute force: every embedded chunk is decoded and
//! scored in process. Knowledge bases here are small (hand-curated reference
//! texts), so no vector index is kept.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use arcana_core::embedding::{blob_to_vec, cosine_similarity, vec_to_blob};
use arcana_core::models::{
    KnowledgeChunk, KnowledgeSource, NewChunk, NewSource, RetrievedChunk, SourceSummary,
};
use arcana_core::store::KnowledgeStore;

/// SQLite implementation of the [`KnowledgeStore`] trait.
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

pub(crate) fn from_ts(ts: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(ts, 0).unwrap_or_default()
}

fn source_from_row(row: &SqliteRow) -> KnowledgeSource {
    KnowledgeSource {
        id: row.get("id"),
        name: row.get("name"),
        description: row.get("description"),
        source_type: row.get("source_type"),
        created_at: from_ts(row.get("created_at")),
    }
}

#[async_trait]
impl KnowledgeStore for SqliteStore {
    async fn create_source(&self, source: &NewSource) -> Result<KnowledgeSource> {
        let created = KnowledgeSource {
            id: Uuid::new_v4().to_string(),
            name: source.name.clone(),
            description: source.description.clone(),
            source_type: source.source_type.clone(),
            created_at: from_ts(Utc::now().timestamp()),
        };

        sqlx::query(
            "INSERT INTO knowledge_sources (id, name, description, source_type, created_at) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&created.id)
        .bind(&created.name)
        .bind(&created.description)
        .bind(&created.source_type)
        .bind(created.created_at.timestamp())
        .execute(&self.pool)
        .await?;

        Ok(created)
    }

    async fn insert_chunks(&self, source_id: &str, chunks: &[NewChunk]) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        for chunk in chunks {
            let blob = chunk.embedding.as_deref().map(vec_to_blob);
            sqlx::query(
                r#"
                INSERT INTO knowledge_chunks (id, source_id, content, embedding, chunk_index, metadata_json)
                VALUES (?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(Uuid::new_v4().to_string())
            .bind(source_id)
            .bind(&chunk.content)
            .bind(blob)
            .bind(chunk.chunk_index)
            .bind(chunk.metadata.to_string())
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn delete_source(&self, id: &str) -> Result<bool> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM knowledge_chunks WHERE source_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        let result = sqlx::query("DELETE FROM knowledge_sources WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(result.rows_affected() > 0)
    }

    async fn get_source(&self, id: &str) -> Result<Option<KnowledgeSource>> {
        let row = sqlx::query(
            "SELECT id, name, description, source_type, created_at FROM knowledge_sources WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.as_ref().map(source_from_row))
    }

    async fn list_sources(&self) -> Result<Vec<SourceSummary>> {
        let rows = sqlx::query(
            r#"
            SELECT
                s.id, s.name, s.description, s.source_type, s.created_at,
                COUNT(c.id) AS chunk_count,
                COUNT(c.embedding) AS embedded_count
            FROM knowledge_sources s
            LEFT JOIN knowledge_chunks c ON c.source_id = s.id
            GROUP BY s.id
            ORDER BY s.created_at DESC, s.rowid DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(|row| SourceSummary {
                source: source_from_row(row),
                chunk_count: row.get("chunk_count"),
                embedded_count: row.get("embedded_count"),
            })
            .collect())
    }

    async fn list_chunks_for_source(&self, id: &str) -> Result<Vec<KnowledgeChunk>> {
        let rows = sqlx::query(
            r#"
            SELECT id, source_id, content, embedding, chunk_index, metadata_json
            FROM knowledge_chunks
            WHERE source_id = ?
            ORDER BY chunk_index ASC
            "#,
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await?;

        let mut chunks = Vec::with_capacity(rows.len());
        for row in rows {
            let blob: Option<Vec<u8>> = row.get("embedding");
            let metadata: String = row.get("metadata_json");
            let embedding = blob.map(|b| blob_to_vec(&b));
            chunks.push(KnowledgeChunk {
                id: row.get("id"),
                source_id: row.get("source_id"),
                content: row.get("content"),
                embedded: embedding.is_some(),
                embedding,
                chunk_index: row.get("chunk_index"),
                metadata: serde_json::from_str(&metadata).unwrap_or(serde_json::Value::Null),
            });
        }
        Ok(chunks)
    }

    async fn similarity_search(
        &self,
        query: &[f32],
        threshold: f64,
        limit: usize,
    ) -> Result<Vec<RetrievedChunk>> {
        let rows = sqlx::query(
            r#"
            SELECT c.content, c.embedding, s.name AS source_name
            FROM knowledge_chunks c
            JOIN knowledge_sources s ON s.id = c.source_id
            WHERE c.embedding IS NOT NULL
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        let mut hits: Vec<RetrievedChunk> = rows
            .iter()
            .filter_map(|row| {
                let blob: Vec<u8> = row.get("embedding");
                let sim = cosine_similarity(query, &blob_to_vec(&blob)) as f64;
                (sim > threshold).then(|| RetrievedChunk {
                    content: row.get("content"),
                    source_name: row.get("source_name"),
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
        let rows = sqlx::query(
            r#"
            SELECT c.content, s.name AS source_name
            FROM knowledge_chunks c
            JOIN knowledge_sources s ON s.id = c.source_id
            ORDER BY s.created_at DESC, s.rowid DESC, c.chunk_index ASC
            LIMIT ?
            "#,
        )
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(|row| RetrievedChunk {
                content: row.get("content"),
                source_name: row.get("source_name"),
                similarity: None,
            })
            .collect())
    }
}
