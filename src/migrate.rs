//! Idempotent schema creation.
//!
//! Timestamps are stored as INTEGER unix seconds; embeddings as BLOBs of
//! little-endian `f32`.

use anyhow::Result;
use sqlx::SqlitePool;

use crate::cards;
use crate::config::Config;
use crate::db;

const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS knowledge_sources (
        id TEXT PRIMARY KEY,
        name TEXT NOT NULL,
        description TEXT NOT NULL DEFAULT '',
        source_type TEXT NOT NULL DEFAULT 'manual',
        created_at INTEGER NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS knowledge_chunks (
        id TEXT PRIMARY KEY,
        source_id TEXT NOT NULL,
        content TEXT NOT NULL,
        embedding BLOB,
        chunk_index INTEGER NOT NULL,
        metadata_json TEXT NOT NULL DEFAULT '{}',
        UNIQUE(source_id, chunk_index),
        FOREIGN KEY (source_id) REFERENCES knowledge_sources(id) ON DELETE CASCADE
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS admin_users (
        user_id TEXT PRIMARY KEY,
        created_at INTEGER NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS credits_ledger (
        id TEXT PRIMARY KEY,
        user_id TEXT NOT NULL,
        amount INTEGER NOT NULL,
        transaction_type TEXT NOT NULL,
        description TEXT NOT NULL DEFAULT '',
        reference_id TEXT,
        balance_after INTEGER NOT NULL CHECK (balance_after >= 0),
        created_at INTEGER NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS readings (
        id TEXT PRIMARY KEY,
        user_id TEXT NOT NULL,
        question TEXT NOT NULL,
        spread_type TEXT NOT NULL,
        language TEXT NOT NULL DEFAULT 'EN',
        interpretation_json TEXT,
        notes TEXT NOT NULL DEFAULT '',
        mood INTEGER CHECK (mood IS NULL OR (mood BETWEEN 1 AND 5)),
        created_at INTEGER NOT NULL,
        updated_at INTEGER NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS reading_cards (
        reading_id TEXT NOT NULL,
        position INTEGER NOT NULL,
        position_name TEXT NOT NULL,
        card_name TEXT NOT NULL,
        card_id INTEGER,
        is_reversed INTEGER NOT NULL DEFAULT 0,
        PRIMARY KEY (reading_id, position),
        FOREIGN KEY (reading_id) REFERENCES readings(id) ON DELETE CASCADE,
        FOREIGN KEY (card_id) REFERENCES tarot_cards(id)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS tarot_cards (
        id INTEGER PRIMARY KEY,
        name_en TEXT NOT NULL UNIQUE,
        name_it TEXT NOT NULL UNIQUE,
        arcana TEXT NOT NULL,
        suit TEXT,
        number INTEGER,
        court TEXT,
        keywords_en_json TEXT NOT NULL DEFAULT '[]',
        keywords_it_json TEXT NOT NULL DEFAULT '[]',
        upright_meaning_en TEXT NOT NULL,
        upright_meaning_it TEXT NOT NULL,
        reversed_meaning_en TEXT NOT NULL,
        reversed_meaning_it TEXT NOT NULL,
        image_url TEXT
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS user_preferences (
        user_id TEXT PRIMARY KEY,
        language TEXT NOT NULL DEFAULT 'EN',
        reading_tone TEXT NOT NULL DEFAULT 'soft',
        focus_areas_json TEXT NOT NULL DEFAULT '[]',
        experience_level TEXT NOT NULL DEFAULT 'beginner',
        created_at INTEGER NOT NULL,
        updated_at INTEGER NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_chunks_source_id ON knowledge_chunks(source_id)",
    "CREATE INDEX IF NOT EXISTS idx_sources_created_at ON knowledge_sources(created_at DESC)",
    "CREATE INDEX IF NOT EXISTS idx_ledger_user ON credits_ledger(user_id, created_at DESC)",
    // A payment reference is credited at most once.
    r#"
    CREATE UNIQUE INDEX IF NOT EXISTS idx_ledger_purchase_reference
        ON credits_ledger(reference_id) WHERE transaction_type = 'purchase'
    "#,
    // One signup bonus per user.
    r#"
    CREATE UNIQUE INDEX IF NOT EXISTS idx_ledger_signup_user
        ON credits_ledger(user_id) WHERE transaction_type = 'signup'
    "#,
    "CREATE INDEX IF NOT EXISTS idx_readings_user ON readings(user_id, created_at DESC)",
];

/// Create every table and index on an open pool, then seed the card catalog.
pub async fn apply(pool: &SqlitePool) -> Result<()> {
    for statement in SCHEMA {
        sqlx::query(statement).execute(pool).await?;
    }
    cards::seed_deck(pool).await?;
    Ok(())
}

/// Connect to the configured database and create the schema.
pub async fn run_migrations(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;
    apply(&pool).await?;
    pool.close().await;
    Ok(())
}
