//! Knowledge retrieval with a text-match fallback.
//!
//! The retriever operates entirely through the [`KnowledgeStore`] and
//! [`Embedder`] traits. It never returns an error: a failing embedder or
//! store degrades the result instead of failing the request.
//!
//! # Algorithm
//!
//! 1. Build the search query: the query text followed by the context terms
//!    (card names), space-joined.
//! 2. Embed the search query. On success, run a similarity search with
//!    [`MATCH_THRESHOLD`]. Any hits are the final, ranked result.
//! 3. Otherwise (no embedder, embedding error, store error, or no hits),
//!    lowercase the search query, split it on spaces, drop tokens of three
//!    characters or fewer, fetch up to `limit` chunks in store order, and
//!    keep those containing at least one token. These carry no similarity.

use serde::Serialize;

use crate::embedding::Embedder;
use crate::models::RetrievedChunk;
use crate::store::KnowledgeStore;

/// Minimum cosine similarity for a chunk to count as relevant.
pub const MATCH_THRESHOLD: f64 = 0.3;

/// Default number of chunks returned.
pub const DEFAULT_LIMIT: usize = 5;

/// Tokens this short or shorter are ignored by the text-match fallback.
const MAX_IGNORED_TERM_LEN: usize = 3;

/// Inputs for a single retrieval.
#[derive(Debug, Clone)]
pub struct RetrievalRequest<'a> {
    pub query: &'a str,
    /// Extra terms appended to the query (typically the drawn card names).
    pub context_terms: &'a [String],
    pub limit: usize,
    pub threshold: f64,
}

impl<'a> RetrievalRequest<'a> {
    pub fn new(query: &'a str, context_terms: &'a [String], limit: usize) -> Self {
        Self {
            query,
            context_terms,
            limit,
            threshold: MATCH_THRESHOLD,
        }
    }
}

/// Which path produced a [`Retrieval`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RetrievalPath {
    Vector,
    TextMatch,
}

/// Result of [`retrieve`].
#[derive(Debug, Clone, Serialize)]
pub struct Retrieval {
    pub chunks: Vec<RetrievedChunk>,
    /// The search query actually used (query plus context terms).
    pub query: String,
    #[serde(skip)]
    pub path: RetrievalPath,
}

/// Join the query and context terms into the search query.
pub fn build_search_query(query: &str, context_terms: &[String]) -> String {
    if context_terms.is_empty() {
        query.to_string()
    } else {
        format!("{} {}", query, context_terms.join(" "))
    }
}

/// Lowercased tokens used by the text-match fallback.
pub fn search_terms(search_query: &str) -> Vec<String> {
    search_query
        .to_lowercase()
        .split(' ')
        .filter(|t| t.chars().count() > MAX_IGNORED_TERM_LEN)
        .map(str::to_string)
        .collect()
}

/// Retrieve the chunks most relevant to a query.
pub async fn retrieve<S>(
    store: &S,
    embedder: Option<&dyn Embedder>,
    req: &RetrievalRequest<'_>,
) -> Retrieval
where
    S: KnowledgeStore + ?Sized,
{
    let search_query = build_search_query(req.query, req.context_terms);

    if let Some(chunks) = vector_search(store, embedder, &search_query, req).await {
        return Retrieval {
            chunks,
            query: search_query,
            path: RetrievalPath::Vector,
        };
    }

    let chunks = text_match(store, &search_query, req.limit).await;
    Retrieval {
        chunks,
        query: search_query,
        path: RetrievalPath::TextMatch,
    }
}

/// Vector path. `None` means "fall back to text matching".
async fn vector_search<S>(
    store: &S,
    embedder: Option<&dyn Embedder>,
    search_query: &str,
    req: &RetrievalRequest<'_>,
) -> Option<Vec<RetrievedChunk>>
where
    S: KnowledgeStore + ?Sized,
{
    let embedder = embedder?;
    let vector = match embedder.embed(search_query).await {
        Ok(v) => v,
        Err(e) => {
            tracing::warn!(error = %e, "query embedding failed, falling back to text search");
            return None;
        }
    };

    match store
        .similarity_search(&vector, req.threshold, req.limit)
        .await
    {
        Ok(hits) if !hits.is_empty() => Some(hits),
        Ok(_) => {
            tracing::debug!("no chunks above similarity threshold, falling back to text search");
            None
        }
        Err(e) => {
            tracing::warn!(error = %e, "similarity search failed, falling back to text search");
            None
        }
    }
}

async fn text_match<S>(store: &S, search_query: &str, limit: usize) -> Vec<RetrievedChunk>
where
    S: KnowledgeStore + ?Sized,
{
    let terms = search_terms(search_query);
    let candidates = match store.recent_chunks(limit).await {
        Ok(c) => c,
        Err(e) => {
            tracing::warn!(error = %e, "text search candidates unavailable");
            return Vec::new();
        }
    };

    candidates
        .into_iter()
        .filter(|c| {
            let content = c.content.to_lowercase();
            terms.iter().any(|t| content.contains(t.as_str()))
        })
        .map(|c| RetrievedChunk {
            similarity: None,
            ..c
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_search_query() {
        assert_eq!(build_search_query("career change", &[]), "career change");
        let cards = vec!["The Tower".to_string(), "Death".to_string()];
        assert_eq!(
            build_search_query("career change", &cards),
            "career change The Tower Death"
        );
    }

    #[test]
    fn test_search_terms_drop_short_tokens() {
        assert_eq!(
            search_terms("Should I quit my JOB for art"),
            vec!["should".to_string(), "quit".to_string()]
        );
    }

    #[test]
    fn test_search_terms_all_short() {
        assert!(search_terms("is it me").is_empty());
    }
}
