//! Core data models shared by the ingestion, retrieval, and interpretation
//! pipelines.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A document registered in the knowledge base.
///
/// Created once per ingestion request and never mutated afterwards.
/// Deleting a source deletes all of its chunks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnowledgeSource {
    pub id: String,
    pub name: String,
    pub description: String,
    pub source_type: String,
    pub created_at: DateTime<Utc>,
}

/// Input for [`KnowledgeStore::create_source`](crate::store::KnowledgeStore::create_source).
#[derive(Debug, Clone)]
pub struct NewSource {
    pub name: String,
    pub description: String,
    pub source_type: String,
}

/// A stored slice of a source document.
#[derive(Debug, Clone, Serialize)]
pub struct KnowledgeChunk {
    pub id: String,
    pub source_id: String,
    pub content: String,
    /// Unit-length embedding, absent when the embedder failed or is disabled.
    #[serde(skip_serializing)]
    pub embedding: Option<Vec<f32>>,
    /// Whether `embedding` is present; serialized in place of the vector.
    pub embedded: bool,
    pub chunk_index: i64,
    pub metadata: serde_json::Value,
}

/// A chunk ready to be written by
/// [`KnowledgeStore::insert_chunks`](crate::store::KnowledgeStore::insert_chunks).
#[derive(Debug, Clone)]
pub struct NewChunk {
    pub content: String,
    pub embedding: Option<Vec<f32>>,
    pub chunk_index: i64,
    pub metadata: serde_json::Value,
}

/// A source together with its chunk counts, for admin listings.
#[derive(Debug, Clone, Serialize)]
pub struct SourceSummary {
    #[serde(flatten)]
    pub source: KnowledgeSource,
    pub chunk_count: i64,
    pub embedded_count: i64,
}

/// A retrieval hit.
///
/// `similarity` is only set on the vector path; text-match hits carry none.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievedChunk {
    pub content: String,
    pub source_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub similarity: Option<f64>,
}

/// A card produced by the draw step, consumed by the interpretation composer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DrawnCard {
    pub card_name: String,
    pub position_name: String,
    #[serde(default)]
    pub is_reversed: bool,
    #[serde(default)]
    pub meaning: String,
    #[serde(default)]
    pub keywords: Vec<String>,
}

/// Response style for interpretations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tone {
    #[default]
    Soft,
    Pragmatic,
    Spiritual,
    Direct,
}

impl Tone {
    /// Parse a tone name, defaulting to [`Tone::Soft`] for anything unknown.
    pub fn parse_lossy(s: &str) -> Tone {
        match s.trim().to_ascii_lowercase().as_str() {
            "pragmatic" => Tone::Pragmatic,
            "spiritual" => Tone::Spiritual,
            "direct" => Tone::Direct,
            _ => Tone::Soft,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Tone::Soft => "soft",
            Tone::Pragmatic => "pragmatic",
            Tone::Spiritual => "spiritual",
            Tone::Direct => "direct",
        }
    }
}

/// Interpretation language. Only English and Italian are produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Language {
    #[default]
    #[serde(rename = "EN")]
    English,
    #[serde(rename = "IT")]
    Italian,
}

impl Language {
    /// `"IT"` (any case) selects Italian; everything else is English.
    pub fn parse_lossy(s: &str) -> Language {
        if s.trim().eq_ignore_ascii_case("it") {
            Language::Italian
        } else {
            Language::English
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Language::English => "EN",
            Language::Italian => "IT",
        }
    }
}

/// A generated reading interpretation.
///
/// Model-produced and fallback interpretations share this exact shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Interpretation {
    pub overall: String,
    /// Position name → interpretation text.
    pub cards: BTreeMap<String, String>,
    pub synthesis: String,
    pub tone: Tone,
    pub generated_at: DateTime<Utc>,
}
