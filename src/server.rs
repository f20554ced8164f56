//! HTTP API.
//!
//! Serves the reading flow (knowledge query, interpretation, readings,
//! credits), the payment webhook, and the admin surface over JSON.
//!
//! # Endpoints
//!
//! | Method | Path | Auth | Description |
//! |--------|------|------|-------------|
//! | `GET`  | `/health` | none | Status and version |
//! | `POST` | `/knowledge/ingest` | admin | Chunk, embed and store a document |
//! | `POST` | `/knowledge/query` | user | Retrieve knowledge excerpts |
//! | `GET`  | `/cards` | none | The tarot card catalog |
//! | `GET`  | `/cards/{id}` | none | One catalog card |
//! | `GET`/`PUT` | `/preferences` | user | Reading preferences |
//! | `POST` | `/interpretation` | user | Generate an interpretation |
//! | `GET`  | `/credits` | user | Balance and recent ledger entries |
//! | `POST` | `/readings` | user | Save a reading (costs credits) |
//! | `GET`  | `/readings` | user | The caller's readings |
//! | `GET`/`DELETE` | `/readings/{id}` | owner | Fetch / delete a reading |
//! | `PUT`  | `/readings/{id}/journal` | owner | Update notes and mood |
//! | `PUT`  | `/readings/{id}/interpretation` | owner | Replace the interpretation |
//! | `POST` | `/payments/webhook` | signature | Credit purchases |
//! | `GET`  | `/admin/stats` | admin | Aggregate statistics |
//! | `GET`  | `/admin/users` | admin | Users with balances |
//! | `POST` | `/admin/users/{id}/credits` | admin | Grant or remove credits |
//! | `GET`  | `/admin/readings` | admin | All readings |
//! | `DELETE` | `/admin/readings/{id}` | admin | Delete any reading |
//! | `GET`  | `/admin/knowledge` | admin | Sources with chunk counts |
//! | `GET`  | `/admin/knowledge/{id}/chunks` | admin | A source's chunks |
//! | `DELETE` | `/admin/knowledge/{id}` | admin | Delete a source and its chunks |
//!
//! Errors use the [`ApiError`] body. All origins, methods, and headers are
//! permitted. Drawn cards are resolved against the catalog by name, so a
//! reading always carries the catalog's meanings in its own language.

use anyhow::{anyhow, Result};
use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    routing::{delete, get, post, put},
    Json, Router,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use arcana_core::deck::{Deck, TarotCard};
use arcana_core::embedding::Embedder;
use arcana_core::interpret::ChatModel;
use arcana_core::models::{DrawnCard, Interpretation, KnowledgeChunk, Language, SourceSummary};
use arcana_core::retrieve::{retrieve, Retrieval, RetrievalRequest};
use arcana_core::spread::SpreadType;
use arcana_core::store::KnowledgeStore;

use crate::auth::{AdminUser, AuthUser};
use crate::cards;
use crate::config::Config;
use crate::credits::{self, LedgerEntry};
use crate::db;
use crate::embedding::create_embedder;
use crate::error::{ApiError, ApiJson};
use crate::ingest::{ingest_document, IngestRequest};
use crate::interpret::{interpret, resolve_cards, InterpretationBody, RequestError};
use crate::llm::create_chat_model;
use crate::migrate;
use crate::payments::{self, Event};
use crate::preferences::{self, Preferences, PreferencesUpdate};
use crate::readings::{self, NewReading, NewReadingCard, Reading};
use crate::sqlite_store::SqliteStore;
use crate::stats::{self, AdminStats, UserOverview};

/// Ledger entries returned by `GET /credits`.
const CREDIT_HISTORY_LIMIT: i64 = 50;
/// Default page for `GET /admin/readings`.
const ADMIN_READINGS_LIMIT: i64 = 100;

/// Shared application state passed to all route handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub pool: SqlitePool,
    pub store: Arc<dyn KnowledgeStore>,
    pub embedder: Option<Arc<dyn Embedder>>,
    pub chat: Option<Arc<dyn ChatModel>>,
    /// Card catalog loaded at startup.
    pub deck: Arc<Deck>,
    /// Resolved `auth.jwt_secret`.
    pub jwt_secret: String,
}

/// Connect, migrate, and build every collaborator the handlers need.
///
/// Fails when no JWT secret is configured: without it no request could
/// ever authenticate.
pub async fn build_state(config: &Config) -> Result<AppState> {
    let jwt_secret = config.auth.jwt_secret.clone().ok_or_else(|| {
        anyhow!(
            "No JWT secret configured: set auth.jwt_secret or ${}",
            config.auth.jwt_secret_env
        )
    })?;

    let pool = db::connect(config).await?;
    migrate::apply(&pool).await?;
    let deck = cards::load_deck(&pool).await?;

    let embedder = create_embedder(&config.embedding)?;
    let chat = create_chat_model(&config.llm)?;

    Ok(AppState {
        config: Arc::new(config.clone()),
        store: Arc::new(SqliteStore::new(pool.clone())),
        pool,
        embedder,
        chat,
        deck: Arc::new(deck),
        jwt_secret,
    })
}

pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handle_health))
        .route("/knowledge/ingest", post(handle_ingest))
        .route("/knowledge/query", post(handle_query))
        .route("/cards", get(handle_list_cards))
        .route("/cards/{id}", get(handle_get_card))
        .route(
            "/preferences",
            get(handle_get_preferences).put(handle_update_preferences),
        )
        .route("/interpretation", post(handle_interpretation))
        .route("/credits", get(handle_credits))
        .route("/readings", get(handle_list_readings).post(handle_create_reading))
        .route(
            "/readings/{id}",
            get(handle_get_reading).delete(handle_delete_reading),
        )
        .route("/readings/{id}/journal", put(handle_update_journal))
        .route(
            "/readings/{id}/interpretation",
            put(handle_replace_interpretation),
        )
        .route("/payments/webhook", post(handle_webhook))
        .route("/admin/stats", get(handle_admin_stats))
        .route("/admin/users", get(handle_admin_users))
        .route("/admin/users/{id}/credits", post(handle_admin_grant))
        .route("/admin/readings", get(handle_admin_readings))
        .route("/admin/readings/{id}", delete(handle_admin_delete_reading))
        .route("/admin/knowledge", get(handle_admin_sources))
        .route("/admin/knowledge/{id}/chunks", get(handle_admin_chunks))
        .route("/admin/knowledge/{id}", delete(handle_admin_delete_source))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Starts the HTTP server on `[server].bind` and runs until the process is
/// terminated.
pub async fn run_server(config: &Config) -> Result<()> {
    let state = build_state(config).await?;

    tracing::info!(
        embeddings = ?state.embedder.as_ref().map(|e| e.model_name().to_string()),
        llm = ?state.chat.as_ref().map(|c| c.model_name().to_string()),
        "collaborators ready"
    );

    let listener = tokio::net::TcpListener::bind(&config.server.bind).await?;
    tracing::info!(bind = %config.server.bind, "arcana listening");
    axum::serve(listener, router(state)).await?;

    Ok(())
}

#[derive(Serialize)]
struct Deleted {
    deleted: bool,
}

fn not_found(what: &str) -> ApiError {
    ApiError::NotFound(format!("{} not found", what))
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ============ Knowledge ============

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct IngestResponse {
    success: bool,
    source_id: String,
    chunks_created: usize,
    chunks_embedded: usize,
}

async fn handle_ingest(
    State(state): State<AppState>,
    _admin: AdminUser,
    ApiJson(request): ApiJson<IngestRequest>,
) -> Result<Json<IngestResponse>, ApiError> {
    let outcome = ingest_document(
        state.store.as_ref(),
        state.embedder.clone(),
        &state.config.chunking,
        state.config.embedding.concurrency,
        &request,
    )
    .await?;

    Ok(Json(IngestResponse {
        success: true,
        source_id: outcome.source_id,
        chunks_created: outcome.chunks_created,
        chunks_embedded: outcome.chunks_embedded,
    }))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct QueryBody {
    #[serde(default)]
    query: String,
    #[serde(default)]
    card_names: Vec<String>,
    #[serde(default)]
    limit: Option<usize>,
}

async fn handle_query(
    State(state): State<AppState>,
    _user: AuthUser,
    ApiJson(body): ApiJson<QueryBody>,
) -> Result<Json<Retrieval>, ApiError> {
    let query = body.query.trim();
    if query.is_empty() {
        return Err(ApiError::BadRequest("Query is required".to_string()));
    }

    let retrieval_config = &state.config.retrieval;
    let limit = body
        .limit
        .unwrap_or(retrieval_config.default_limit)
        .clamp(1, retrieval_config.max_limit);

    let retrieval = retrieve(
        state.store.as_ref(),
        state.embedder.as_deref(),
        &RetrievalRequest {
            query,
            context_terms: &body.card_names,
            limit,
            threshold: retrieval_config.match_threshold,
        },
    )
    .await;

    Ok(Json(retrieval))
}

// ============ Cards ============

async fn handle_list_cards(State(state): State<AppState>) -> Json<Vec<TarotCard>> {
    Json(state.deck.cards().to_vec())
}

async fn handle_get_card(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<TarotCard>, ApiError> {
    state
        .deck
        .get(id)
        .cloned()
        .map(Json)
        .ok_or_else(|| not_found("Card"))
}

// ============ Preferences ============

async fn handle_get_preferences(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<Preferences>, ApiError> {
    Ok(Json(preferences::get_preferences(&state.pool, &user.user_id).await?))
}

async fn handle_update_preferences(
    State(state): State<AppState>,
    user: AuthUser,
    ApiJson(update): ApiJson<PreferencesUpdate>,
) -> Result<Json<Preferences>, ApiError> {
    Ok(Json(preferences::update_preferences(&state.pool, &user.user_id, &update).await?))
}

// ============ POST /interpretation ============

async fn handle_interpretation(
    State(state): State<AppState>,
    user: AuthUser,
    ApiJson(body): ApiJson<InterpretationBody>,
) -> Result<Json<Interpretation>, ApiError> {
    let prefs = preferences::get_preferences(&state.pool, &user.user_id).await?;
    let mut request = body.with_preferences(&prefs).into_request()?;
    request.drawn_cards = resolve_cards(&state.deck, &request.drawn_cards, request.language)?;
    let generated = interpret(
        state.store.as_ref(),
        state.embedder.as_deref(),
        state.chat.as_deref(),
        &state.config,
        &request,
    )
    .await;
    Ok(Json(generated.interpretation))
}

// ============ GET /credits ============

#[derive(Serialize)]
struct CreditsResponse {
    balance: i64,
    entries: Vec<LedgerEntry>,
}

async fn handle_credits(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<CreditsResponse>, ApiError> {
    let balance = credits::balance(&state.pool, &user.user_id).await?;
    let entries = credits::history(&state.pool, &user.user_id, CREDIT_HISTORY_LIMIT).await?;
    Ok(Json(CreditsResponse { balance, entries }))
}

// ============ Readings ============

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateReadingBody {
    #[serde(default)]
    question: String,
    #[serde(default)]
    spread_type: String,
    #[serde(default)]
    language: String,
    #[serde(default, alias = "drawnCards")]
    cards: Vec<DrawnCard>,
    #[serde(default)]
    interpretation: Option<Interpretation>,
}

async fn handle_create_reading(
    State(state): State<AppState>,
    user: AuthUser,
    ApiJson(body): ApiJson<CreateReadingBody>,
) -> Result<(StatusCode, Json<Reading>), ApiError> {
    let spread_type = SpreadType::parse(&body.spread_type)
        .ok_or_else(|| ApiError::BadRequest(format!("Unknown spread type: {}", body.spread_type)))?;

    let language = if body.language.trim().is_empty() {
        preferences::get_preferences(&state.pool, &user.user_id)
            .await?
            .language
    } else {
        Language::parse_lossy(&body.language)
    };

    let cards = body
        .cards
        .into_iter()
        .map(|drawn| {
            let card = state
                .deck
                .find(&drawn.card_name)
                .ok_or_else(|| RequestError::UnknownCard(drawn.card_name.clone()))?;
            Ok(NewReadingCard {
                position_name: drawn.position_name,
                card_name: card.name(language).to_string(),
                card_id: Some(card.id),
                is_reversed: drawn.is_reversed,
            })
        })
        .collect::<Result<Vec<_>, RequestError>>()?;

    let draft = NewReading {
        question: body.question,
        spread_type,
        language,
        cards,
        interpretation: body.interpretation,
    };

    let reading = readings::create_reading(
        &state.pool,
        &user.user_id,
        &draft,
        state.config.credits.reading_cost,
    )
    .await?;
    Ok((StatusCode::CREATED, Json(reading)))
}

async fn handle_list_readings(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<Vec<Reading>>, ApiError> {
    Ok(Json(readings::list_readings(&state.pool, &user.user_id).await?))
}

async fn handle_get_reading(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
) -> Result<Json<Reading>, ApiError> {
    readings::get_reading(&state.pool, &id, Some(&user.user_id))
        .await?
        .map(Json)
        .ok_or_else(|| not_found("Reading"))
}

async fn handle_delete_reading(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
) -> Result<Json<Deleted>, ApiError> {
    if !readings::delete_reading(&state.pool, &id, Some(&user.user_id)).await? {
        return Err(not_found("Reading"));
    }
    Ok(Json(Deleted { deleted: true }))
}

#[derive(Deserialize)]
struct JournalBody {
    #[serde(default)]
    notes: String,
    #[serde(default)]
    mood: Option<i64>,
}

async fn handle_update_journal(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
    ApiJson(body): ApiJson<JournalBody>,
) -> Result<Json<Reading>, ApiError> {
    readings::update_journal(&state.pool, &id, &user.user_id, &body.notes, body.mood)
        .await?
        .map(Json)
        .ok_or_else(|| not_found("Reading"))
}

async fn handle_replace_interpretation(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
    ApiJson(interpretation): ApiJson<Interpretation>,
) -> Result<Json<Reading>, ApiError> {
    readings::replace_interpretation(&state.pool, &id, &user.user_id, &interpretation)
        .await?
        .map(Json)
        .ok_or_else(|| not_found("Reading"))
}

// ============ POST /payments/webhook ============

#[derive(Serialize)]
struct WebhookResponse {
    received: bool,
}

async fn handle_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<WebhookResponse>, ApiError> {
    let payments_config = &state.config.payments;
    let Some(secret) = payments_config.webhook_secret.as_deref() else {
        return Err(ApiError::Unavailable("Stripe not configured".to_string()));
    };

    let signature = headers
        .get("stripe-signature")
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| ApiError::BadRequest("No signature".to_string()))?;

    payments::verify_signature(
        secret,
        signature,
        &body,
        Utc::now().timestamp(),
        payments_config.tolerance_secs,
    )
    .map_err(|e| {
        tracing::warn!(error = %e, "rejected webhook delivery");
        ApiError::BadRequest(format!("Webhook signature verification failed: {}", e))
    })?;

    let event = Event::parse(&body)
        .map_err(|e| ApiError::BadRequest(format!("Invalid event payload: {}", e)))?;

    let outcome = payments::apply_event(&state.pool, &event).await?;
    tracing::debug!(event_id = %event.id, ?outcome, "webhook processed");
    Ok(Json(WebhookResponse { received: true }))
}

// ============ Admin ============

async fn handle_admin_stats(
    State(state): State<AppState>,
    _admin: AdminUser,
) -> Result<Json<AdminStats>, ApiError> {
    Ok(Json(stats::collect_stats(&state.pool).await?))
}

async fn handle_admin_users(
    State(state): State<AppState>,
    _admin: AdminUser,
) -> Result<Json<Vec<UserOverview>>, ApiError> {
    Ok(Json(stats::list_users(&state.pool).await?))
}

#[derive(Deserialize)]
struct GrantBody {
    amount: i64,
    #[serde(default)]
    description: Option<String>,
}

async fn handle_admin_grant(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Path(user_id): Path<String>,
    ApiJson(body): ApiJson<GrantBody>,
) -> Result<Json<LedgerEntry>, ApiError> {
    let description = body
        .description
        .as_deref()
        .map(str::trim)
        .filter(|d| !d.is_empty());
    let entry = credits::grant(&state.pool, &user_id, body.amount, description).await?;
    tracing::info!(admin = %admin.user_id, user_id = %user_id, amount = body.amount, "admin credit adjustment");
    Ok(Json(entry))
}

#[derive(Deserialize)]
struct ListParams {
    #[serde(default)]
    limit: Option<i64>,
}

async fn handle_admin_readings(
    State(state): State<AppState>,
    _admin: AdminUser,
    Query(params): Query<ListParams>,
) -> Result<Json<Vec<Reading>>, ApiError> {
    let limit = params.limit.unwrap_or(ADMIN_READINGS_LIMIT).max(1);
    Ok(Json(readings::list_all_readings(&state.pool, limit).await?))
}

async fn handle_admin_delete_reading(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(id): Path<String>,
) -> Result<Json<Deleted>, ApiError> {
    if !readings::delete_reading(&state.pool, &id, None).await? {
        return Err(not_found("Reading"));
    }
    Ok(Json(Deleted { deleted: true }))
}

async fn handle_admin_sources(
    State(state): State<AppState>,
    _admin: AdminUser,
) -> Result<Json<Vec<SourceSummary>>, ApiError> {
    Ok(Json(state.store.list_sources().await?))
}

async fn handle_admin_chunks(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(id): Path<String>,
) -> Result<Json<Vec<KnowledgeChunk>>, ApiError> {
    if state.store.get_source(&id).await?.is_none() {
        return Err(not_found("Source"));
    }
    Ok(Json(state.store.list_chunks_for_source(&id).await?))
}

async fn handle_admin_delete_source(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(id): Path<String>,
) -> Result<Json<Deleted>, ApiError> {
    if !state.store.delete_source(&id).await? {
        return Err(not_found("Source"));
    }
    tracing::info!(source_id = %id, "knowledge source deleted");
    Ok(Json(Deleted { deleted: true }))
}
