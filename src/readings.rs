//! Saved readings and their journal entries.
//!
//! A reading is written together with its cards and the usage debit in one
//! transaction: if the user cannot pay, nothing is stored. Every other
//! mutation is scoped to the owning user; an admin path passes no owner.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use arcana_core::models::{Interpretation, Language};
use arcana_core::spread::SpreadType;

use crate::credits::{self, LedgerError};
use crate::sqlite_store::from_ts;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadingCard {
    pub position: i64,
    pub position_name: String,
    pub card_name: String,
    /// Catalog id, when the card was resolved against the deck.
    pub card_id: Option<i64>,
    pub is_reversed: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Reading {
    pub id: String,
    pub user_id: String,
    pub question: String,
    pub spread_type: SpreadType,
    pub language: Language,
    pub cards: Vec<ReadingCard>,
    pub interpretation: Option<Interpretation>,
    pub notes: String,
    pub mood: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewReadingCard {
    pub position_name: String,
    pub card_name: String,
    pub card_id: Option<i64>,
    pub is_reversed: bool,
}

/// A reading as submitted at the end of the draw.
#[derive(Debug, Clone)]
pub struct NewReading {
    pub question: String,
    pub spread_type: SpreadType,
    pub language: Language,
    /// Cards in layout order.
    pub cards: Vec<NewReadingCard>,
    pub interpretation: Option<Interpretation>,
}

#[derive(Debug, thiserror::Error)]
pub enum ReadingError {
    #[error("Question is required")]
    EmptyQuestion,
    #[error("Spread {spread} needs {expected} cards, got {got}")]
    CardCount {
        spread: &'static str,
        expected: usize,
        got: usize,
    },
    #[error("Mood must be between 1 and 5")]
    InvalidMood,
    #[error("Stored reading {0} is unreadable")]
    Corrupt(String),
    #[error(transparent)]
    Ledger(#[from] LedgerError),
    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

fn usage_description(language: Language) -> &'static str {
    match language {
        Language::English => "Tarot reading",
        Language::Italian => "Lettura dei tarocchi",
    }
}

/// Validate, charge and store a reading.
pub async fn create_reading(
    pool: &SqlitePool,
    user_id: &str,
    reading: &NewReading,
    cost: i64,
) -> Result<Reading, ReadingError> {
    let question = reading.question.trim();
    if question.is_empty() {
        return Err(ReadingError::EmptyQuestion);
    }
    let expected = reading.spread_type.card_count();
    if reading.cards.len() != expected {
        return Err(ReadingError::CardCount {
            spread: reading.spread_type.as_str(),
            expected,
            got: reading.cards.len(),
        });
    }

    let id = Uuid::new_v4().to_string();
    let now = Utc::now().timestamp();
    let interpretation_json = reading
        .interpretation
        .as_ref()
        .map(serde_json::to_string)
        .transpose()
        .map_err(|e| ReadingError::Corrupt(e.to_string()))?;

    let mut tx = pool.begin().await?;

    if cost > 0 {
        credits::debit_usage(
            &mut tx,
            user_id,
            cost,
            usage_description(reading.language),
            &id,
        )
        .await?;
    }

    sqlx::query(
        r#"
        INSERT INTO readings
            (id, user_id, question, spread_type, language, interpretation_json, notes, mood, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, '', NULL, ?, ?)
        "#,
    )
    .bind(&id)
    .bind(user_id)
    .bind(question)
    .bind(reading.spread_type.as_str())
    .bind(reading.language.as_str())
    .bind(&interpretation_json)
    .bind(now)
    .bind(now)
    .execute(&mut *tx)
    .await?;

    let mut cards = Vec::with_capacity(reading.cards.len());
    for (position, drawn) in reading.cards.iter().enumerate() {
        let card = ReadingCard {
            position: position as i64,
            position_name: drawn.position_name.clone(),
            card_name: drawn.card_name.clone(),
            card_id: drawn.card_id,
            is_reversed: drawn.is_reversed,
        };
        sqlx::query(
            "INSERT INTO reading_cards (reading_id, position, position_name, card_name, card_id, is_reversed) VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&id)
        .bind(card.position)
        .bind(&card.position_name)
        .bind(&card.card_name)
        .bind(card.card_id)
        .bind(card.is_reversed)
        .execute(&mut *tx)
        .await?;
        cards.push(card);
    }

    tx.commit().await?;

    tracing::info!(reading_id = %id, user_id, spread = reading.spread_type.as_str(), "reading saved");

    Ok(Reading {
        id,
        user_id: user_id.to_string(),
        question: question.to_string(),
        spread_type: reading.spread_type,
        language: reading.language,
        cards,
        interpretation: reading.interpretation.clone(),
        notes: String::new(),
        mood: None,
        created_at: from_ts(now),
        updated_at: from_ts(now),
    })
}

const READING_COLUMNS: &str = "id, user_id, question, spread_type, language, interpretation_json, notes, mood, created_at, updated_at";

async fn load_cards(pool: &SqlitePool, reading_id: &str) -> Result<Vec<ReadingCard>, sqlx::Error> {
    let rows = sqlx::query(
        "SELECT position, position_name, card_name, card_id, is_reversed FROM reading_cards WHERE reading_id = ? ORDER BY position ASC",
    )
    .bind(reading_id)
    .fetch_all(pool)
    .await?;

    Ok(rows
        .iter()
        .map(|row| ReadingCard {
            position: row.get("position"),
            position_name: row.get("position_name"),
            card_name: row.get("card_name"),
            card_id: row.get("card_id"),
            is_reversed: row.get("is_reversed"),
        })
        .collect())
}

async fn reading_from_row(pool: &SqlitePool, row: &SqliteRow) -> Result<Reading, ReadingError> {
    let id: String = row.get("id");
    let spread: String = row.get("spread_type");
    let spread_type = SpreadType::parse(&spread).ok_or_else(|| ReadingError::Corrupt(id.clone()))?;
    let language: String = row.get("language");
    let interpretation = row
        .get::<Option<String>, _>("interpretation_json")
        .map(|json| serde_json::from_str::<Interpretation>(&json))
        .transpose()
        .map_err(|_| ReadingError::Corrupt(id.clone()))?;
    let cards = load_cards(pool, &id).await?;

    Ok(Reading {
        user_id: row.get("user_id"),
        question: row.get("question"),
        spread_type,
        language: Language::parse_lossy(&language),
        cards,
        interpretation,
        notes: row.get("notes"),
        mood: row.get("mood"),
        created_at: from_ts(row.get("created_at")),
        updated_at: from_ts(row.get("updated_at")),
        id,
    })
}

async fn readings_from_rows(
    pool: &SqlitePool,
    rows: &[SqliteRow],
) -> Result<Vec<Reading>, ReadingError> {
    let mut readings = Vec::with_capacity(rows.len());
    for row in rows {
        readings.push(reading_from_row(pool, row).await?);
    }
    Ok(readings)
}

/// Fetch a reading, optionally restricted to one owner.
pub async fn get_reading(
    pool: &SqlitePool,
    id: &str,
    owner: Option<&str>,
) -> Result<Option<Reading>, ReadingError> {
    let row = sqlx::query(&format!("SELECT {} FROM readings WHERE id = ?", READING_COLUMNS))
        .bind(id)
        .fetch_optional(pool)
        .await?;

    let Some(row) = row else {
        return Ok(None);
    };
    let reading = reading_from_row(pool, &row).await?;
    if owner.is_some_and(|o| o != reading.user_id) {
        return Ok(None);
    }
    Ok(Some(reading))
}

/// A user's readings, newest first.
pub async fn list_readings(pool: &SqlitePool, user_id: &str) -> Result<Vec<Reading>, ReadingError> {
    let rows = sqlx::query(&format!(
        "SELECT {} FROM readings WHERE user_id = ? ORDER BY created_at DESC, rowid DESC",
        READING_COLUMNS
    ))
    .bind(user_id)
    .fetch_all(pool)
    .await?;
    readings_from_rows(pool, &rows).await
}

/// Every user's readings, newest first.
pub async fn list_all_readings(
    pool: &SqlitePool,
    limit: i64,
) -> Result<Vec<Reading>, ReadingError> {
    let rows = sqlx::query(&format!(
        "SELECT {} FROM readings ORDER BY created_at DESC, rowid DESC LIMIT ?",
        READING_COLUMNS
    ))
    .bind(limit)
    .fetch_all(pool)
    .await?;
    readings_from_rows(pool, &rows).await
}

/// Replace the journal notes and mood of an owned reading.
pub async fn update_journal(
    pool: &SqlitePool,
    id: &str,
    owner: &str,
    notes: &str,
    mood: Option<i64>,
) -> Result<Option<Reading>, ReadingError> {
    if mood.is_some_and(|m| !(1..=5).contains(&m)) {
        return Err(ReadingError::InvalidMood);
    }

    let result = sqlx::query(
        "UPDATE readings SET notes = ?, mood = ?, updated_at = ? WHERE id = ? AND user_id = ?",
    )
    .bind(notes)
    .bind(mood)
    .bind(Utc::now().timestamp())
    .bind(id)
    .bind(owner)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Ok(None);
    }
    get_reading(pool, id, Some(owner)).await
}

/// Store a regenerated interpretation, replacing the previous one.
pub async fn replace_interpretation(
    pool: &SqlitePool,
    id: &str,
    owner: &str,
    interpretation: &Interpretation,
) -> Result<Option<Reading>, ReadingError> {
    let json =
        serde_json::to_string(interpretation).map_err(|e| ReadingError::Corrupt(e.to_string()))?;

    let result = sqlx::query(
        "UPDATE readings SET interpretation_json = ?, updated_at = ? WHERE id = ? AND user_id = ?",
    )
    .bind(&json)
    .bind(Utc::now().timestamp())
    .bind(id)
    .bind(owner)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Ok(None);
    }
    get_reading(pool, id, Some(owner)).await
}

/// Delete a reading. `owner = None` deletes regardless of owner.
///
/// The usage debit stays in the ledger.
pub async fn delete_reading(
    pool: &SqlitePool,
    id: &str,
    owner: Option<&str>,
) -> Result<bool, sqlx::Error> {
    let result = match owner {
        Some(owner) => {
            sqlx::query("DELETE FROM readings WHERE id = ? AND user_id = ?")
                .bind(id)
                .bind(owner)
                .execute(pool)
                .await?
        }
        None => {
            sqlx::query("DELETE FROM readings WHERE id = ?")
                .bind(id)
                .execute(pool)
                .await?
        }
    };
    Ok(result.rows_affected() > 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::migrate;
    use arcana_core::models::Tone;
    use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
    use std::collections::BTreeMap;
    use std::str::FromStr;
    use tempfile::TempDir;

    async fn test_pool() -> (TempDir, SqlitePool) {
        let tmp = TempDir::new().unwrap();
        let url = format!("sqlite:{}", tmp.path().join("readings.sqlite").display());
        let options = SqliteConnectOptions::from_str(&url)
            .unwrap()
            .create_if_missing(true)
            .foreign_keys(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .unwrap();
        migrate::apply(&pool).await.unwrap();
        (tmp, pool)
    }

    fn card(position: &str, name: &str, id: i64, reversed: bool) -> NewReadingCard {
        NewReadingCard {
            position_name: position.to_string(),
            card_name: name.to_string(),
            card_id: Some(id),
            is_reversed: reversed,
        }
    }

    fn three_card() -> NewReading {
        NewReading {
            question: "What should I focus on?".to_string(),
            spread_type: SpreadType::ThreeCard,
            language: Language::English,
            cards: vec![
                card("Past", "The Fool", 0, false),
                card("Present", "The Tower", 16, true),
                card("Future", "The Star", 17, false),
            ],
            interpretation: None,
        }
    }

    #[tokio::test]
    async fn test_create_debits_and_stores_cards() {
        let (_tmp, pool) = test_pool().await;
        credits::ensure_signup_bonus(&pool, "u1", 3).await.unwrap();

        let reading = create_reading(&pool, "u1", &three_card(), 1).await.unwrap();
        assert_eq!(credits::balance(&pool, "u1").await.unwrap(), 2);

        let loaded = get_reading(&pool, &reading.id, Some("u1"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(loaded.cards.len(), 3);
        assert_eq!(loaded.cards[1].card_name, "The Tower");
        assert_eq!(loaded.cards[1].card_id, Some(16));
        assert!(loaded.cards[1].is_reversed);

        let usage = &credits::history(&pool, "u1", 1).await.unwrap()[0];
        assert_eq!(usage.amount, -1);
        assert_eq!(usage.reference_id.as_deref(), Some(reading.id.as_str()));
    }

    #[tokio::test]
    async fn test_insufficient_credits_stores_nothing() {
        let (_tmp, pool) = test_pool().await;
        let err = create_reading(&pool, "broke", &three_card(), 1)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ReadingError::Ledger(LedgerError::InsufficientCredits { .. })
        ));
        assert!(list_readings(&pool, "broke").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_card_count_must_match_spread() {
        let (_tmp, pool) = test_pool().await;
        let mut reading = three_card();
        reading.spread_type = SpreadType::CelticCross;
        let err = create_reading(&pool, "u1", &reading, 0).await.unwrap_err();
        assert!(matches!(
            err,
            ReadingError::CardCount {
                expected: 10,
                got: 3,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_journal_and_interpretation_updates() {
        let (_tmp, pool) = test_pool().await;
        let reading = create_reading(&pool, "u1", &three_card(), 0).await.unwrap();

        assert!(matches!(
            update_journal(&pool, &reading.id, "u1", "notes", Some(6)).await,
            Err(ReadingError::InvalidMood)
        ));
        let updated = update_journal(&pool, &reading.id, "u1", "felt calm", Some(4))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.notes, "felt calm");
        assert_eq!(updated.mood, Some(4));

        // Someone else's reading is invisible.
        assert!(update_journal(&pool, &reading.id, "u2", "x", None)
            .await
            .unwrap()
            .is_none());

        let interpretation = Interpretation {
            overall: "o".to_string(),
            cards: BTreeMap::from([("Past".to_string(), "p".to_string())]),
            synthesis: "s".to_string(),
            tone: Tone::Direct,
            generated_at: from_ts(1_700_000_000),
        };
        let replaced = replace_interpretation(&pool, &reading.id, "u1", &interpretation)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(replaced.interpretation, Some(interpretation));
    }

    #[tokio::test]
    async fn test_delete_scoped_to_owner() {
        let (_tmp, pool) = test_pool().await;
        let reading = create_reading(&pool, "u1", &three_card(), 0).await.unwrap();
        assert!(!delete_reading(&pool, &reading.id, Some("u2")).await.unwrap());
        assert!(delete_reading(&pool, &reading.id, None).await.unwrap());
        assert!(get_reading(&pool, &reading.id, None).await.unwrap().is_none());
    }
}
