//! Interpretation entry point: wire parsing plus knowledge grounding.
//!
//! Wraps [`arcana_core::interpret::generate`] with the parts that need the
//! app's configuration: turning a loosely-typed request body into an
//! [`InterpretationRequest`], resolving drawn cards against the catalog,
//! and retrieving knowledge-base excerpts for the prompt.

use anyhow::{bail, Context, Result};
use serde::Deserialize;

use arcana_core::deck::Deck;
use arcana_core::embedding::Embedder;
use arcana_core::interpret::{generate, ChatModel, Generated, InterpretationRequest};
use arcana_core::models::{DrawnCard, Language, RetrievedChunk, Tone};
use arcana_core::retrieve::{retrieve, RetrievalRequest};
use arcana_core::spread::SpreadType;
use arcana_core::store::KnowledgeStore;

use crate::cards;
use crate::config::Config;
use crate::db;
use crate::embedding::create_embedder;
use crate::llm::create_chat_model;
use crate::preferences::Preferences;
use crate::sqlite_store::SqliteStore;

/// `POST /interpretation` body.
///
/// Tone and language are lenient: unknown values fall back to `soft` and
/// English. The spread type is not. Empty tone, language and focus areas
/// can be filled from the caller's [`Preferences`].
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InterpretationBody {
    #[serde(default)]
    pub question: String,
    #[serde(default)]
    pub spread_type: String,
    #[serde(default)]
    pub drawn_cards: Vec<DrawnCard>,
    #[serde(default)]
    pub tone: String,
    #[serde(default)]
    pub language: String,
    #[serde(default)]
    pub focus_areas: Vec<String>,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum RequestError {
    #[error("Question is required")]
    MissingQuestion,
    #[error("Unknown spread type: {0}")]
    UnknownSpread(String),
    #[error("At least one drawn card is required")]
    NoCards,
    #[error("Unknown card: {0}")]
    UnknownCard(String),
}

impl InterpretationBody {
    /// Fill whatever the client left empty from stored preferences.
    pub fn with_preferences(mut self, prefs: &Preferences) -> Self {
        if self.tone.trim().is_empty() {
            self.tone = prefs.reading_tone.as_str().to_string();
        }
        if self.language.trim().is_empty() {
            self.language = prefs.language.as_str().to_string();
        }
        if self.focus_areas.is_empty() {
            self.focus_areas = prefs.focus_area_names();
        }
        self
    }

    pub fn into_request(self) -> Result<InterpretationRequest, RequestError> {
        let question = self.question.trim().to_string();
        if question.is_empty() {
            return Err(RequestError::MissingQuestion);
        }
        let spread = SpreadType::parse(&self.spread_type)
            .ok_or_else(|| RequestError::UnknownSpread(self.spread_type.clone()))?;
        if self.drawn_cards.is_empty() {
            return Err(RequestError::NoCards);
        }

        Ok(InterpretationRequest {
            question,
            spread,
            drawn_cards: self.drawn_cards,
            tone: Tone::parse_lossy(&self.tone),
            language: Language::parse_lossy(&self.language),
            focus_areas: self
                .focus_areas
                .into_iter()
                .map(|f| f.trim().to_string())
                .filter(|f| !f.is_empty())
                .collect(),
        })
    }
}

/// Replace each drawn card's name, meaning and keywords with the catalog's
/// text in `language`.
pub fn resolve_cards(
    deck: &Deck,
    cards: &[DrawnCard],
    language: Language,
) -> Result<Vec<DrawnCard>, RequestError> {
    cards
        .iter()
        .map(|card| {
            deck.resolve(card, language)
                .ok_or_else(|| RequestError::UnknownCard(card.card_name.clone()))
        })
        .collect()
}

/// Knowledge-base excerpts for a reading: the question, searched together
/// with the drawn card names.
pub async fn knowledge_context(
    store: &dyn KnowledgeStore,
    embedder: Option<&dyn Embedder>,
    config: &Config,
    req: &InterpretationRequest,
) -> Vec<RetrievedChunk> {
    if !config.interpretation.use_knowledge || config.retrieval.context_limit == 0 {
        return Vec::new();
    }

    let card_names: Vec<String> = req.drawn_cards.iter().map(|c| c.card_name.clone()).collect();
    let retrieval = retrieve(
        store,
        embedder,
        &RetrievalRequest {
            query: &req.question,
            context_terms: &card_names,
            limit: config.retrieval.context_limit,
            threshold: config.retrieval.match_threshold,
        },
    )
    .await;

    tracing::debug!(
        path = ?retrieval.path,
        chunks = retrieval.chunks.len(),
        "knowledge context retrieved"
    );
    retrieval.chunks
}

/// Ground and generate an interpretation.
pub async fn interpret(
    store: &dyn KnowledgeStore,
    embedder: Option<&dyn Embedder>,
    chat: Option<&dyn ChatModel>,
    config: &Config,
    req: &InterpretationRequest,
) -> Generated {
    let context = knowledge_context(store, embedder, config, req).await;
    let generated = generate(chat, req, &context).await;

    tracing::info!(
        spread = req.spread.as_str(),
        cards = req.drawn_cards.len(),
        context = context.len(),
        provenance = generated.provenance.as_str(),
        "interpretation generated"
    );
    generated
}

/// Parse a CLI card argument: `"The Tower"` or `"The Tower:reversed"`.
fn parse_card_arg(arg: &str) -> (String, bool) {
    match arg.rsplit_once(':') {
        Some((name, flag)) if flag.trim().eq_ignore_ascii_case("reversed") => {
            (name.trim().to_string(), true)
        }
        _ => (arg.trim().to_string(), false),
    }
}

/// `arcana interpret`: generate an interpretation and print it as JSON.
pub async fn run_interpret(
    config: &Config,
    question: String,
    spread: String,
    cards: Vec<String>,
    tone: String,
    language: String,
) -> Result<()> {
    let Some(spread_type) = SpreadType::parse(&spread) else {
        bail!(
            "Unknown spread type: '{}'. Available: single, three_card, celtic_cross",
            spread
        );
    };
    let lang = Language::parse_lossy(&language);
    let positions = spread_type.positions(lang);
    if cards.len() != positions.len() {
        bail!(
            "{} needs {} cards, got {}",
            spread_type.as_str(),
            positions.len(),
            cards.len()
        );
    }

    let drawn_cards = cards
        .iter()
        .zip(positions)
        .map(|(arg, position)| {
            let (card_name, is_reversed) = parse_card_arg(arg);
            DrawnCard {
                card_name,
                position_name: position.to_string(),
                is_reversed,
                meaning: String::new(),
                keywords: Vec::new(),
            }
        })
        .collect();

    let body = InterpretationBody {
        question,
        spread_type: spread,
        drawn_cards,
        tone,
        language,
        focus_areas: Vec::new(),
    };
    let mut req = body.into_request()?;

    let pool = db::connect(config).await?;
    let deck = cards::load_deck(&pool)
        .await
        .context("Failed to load the card catalog (run `arcana init`)")?;
    req.drawn_cards = resolve_cards(&deck, &req.drawn_cards, req.language)?;

    let store = SqliteStore::new(pool.clone());
    let embedder = create_embedder(&config.embedding)?;
    let chat = create_chat_model(&config.llm)?;

    let generated = interpret(&store, embedder.as_deref(), chat.as_deref(), config, &req).await;

    println!("{}", serde_json::to_string_pretty(&generated.interpretation)?);
    eprintln!("provenance: {}", generated.provenance.as_str());

    pool.close().await;
    Ok(())
}
