//! The seeded tarot card catalog.
//!
//! [`seed_deck`] runs with every migration and inserts any card of
//! [`standard_deck`] that is missing; edited rows are left alone.

use anyhow::{Context, Result};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

use arcana_core::deck::{standard_deck, Arcana, Court, Deck, Suit, TarotCard};

const CARD_COLUMNS: &str = "id, name_en, name_it, arcana, suit, number, court, keywords_en_json, keywords_it_json, upright_meaning_en, upright_meaning_it, reversed_meaning_en, reversed_meaning_it, image_url";

/// Insert the standard deck, skipping ids that already exist.
pub async fn seed_deck(pool: &SqlitePool) -> Result<()> {
    let mut tx = pool.begin().await?;
    let mut inserted = 0u64;
    for card in standard_deck() {
        let result = sqlx::query(&format!(
            "INSERT OR IGNORE INTO tarot_cards ({}) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            CARD_COLUMNS
        ))
        .bind(card.id)
        .bind(&card.name_en)
        .bind(&card.name_it)
        .bind(card.arcana.as_str())
        .bind(card.suit.map(|s| s.as_str()))
        .bind(card.number)
        .bind(card.court.map(|c| c.as_str()))
        .bind(serde_json::to_string(&card.keywords_en)?)
        .bind(serde_json::to_string(&card.keywords_it)?)
        .bind(&card.upright_meaning_en)
        .bind(&card.upright_meaning_it)
        .bind(&card.reversed_meaning_en)
        .bind(&card.reversed_meaning_it)
        .bind(&card.image_url)
        .execute(&mut *tx)
        .await?;
        inserted += result.rows_affected();
    }
    tx.commit().await?;

    if inserted > 0 {
        tracing::info!(inserted, "seeded tarot card catalog");
    }
    Ok(())
}

fn card_from_row(row: &SqliteRow) -> Result<TarotCard> {
    let id: i64 = row.get("id");
    let arcana: String = row.get("arcana");
    let keywords_en: String = row.get("keywords_en_json");
    let keywords_it: String = row.get("keywords_it_json");

    Ok(TarotCard {
        id,
        name_en: row.get("name_en"),
        name_it: row.get("name_it"),
        arcana: Arcana::parse(&arcana)
            .with_context(|| format!("card {} has unknown arcana {:?}", id, arcana))?,
        suit: row.get::<Option<String>, _>("suit").as_deref().and_then(Suit::parse),
        number: row.get("number"),
        court: row.get::<Option<String>, _>("court").as_deref().and_then(Court::parse),
        keywords_en: serde_json::from_str(&keywords_en)
            .with_context(|| format!("card {} has malformed keywords_en_json", id))?,
        keywords_it: serde_json::from_str(&keywords_it)
            .with_context(|| format!("card {} has malformed keywords_it_json", id))?,
        upright_meaning_en: row.get("upright_meaning_en"),
        upright_meaning_it: row.get("upright_meaning_it"),
        reversed_meaning_en: row.get("reversed_meaning_en"),
        reversed_meaning_it: row.get("reversed_meaning_it"),
        image_url: row.get("image_url"),
    })
}

/// Every catalog card, ordered by id.
pub async fn list_cards(pool: &SqlitePool) -> Result<Vec<TarotCard>> {
    let rows = sqlx::query(&format!("SELECT {} FROM tarot_cards ORDER BY id ASC", CARD_COLUMNS))
        .fetch_all(pool)
        .await?;
    rows.iter().map(card_from_row).collect()
}

pub async fn get_card(pool: &SqlitePool, id: i64) -> Result<Option<TarotCard>> {
    let row = sqlx::query(&format!("SELECT {} FROM tarot_cards WHERE id = ?", CARD_COLUMNS))
        .bind(id)
        .fetch_optional(pool)
        .await?;
    row.as_ref().map(card_from_row).transpose()
}

/// Load the stored catalog for name resolution.
pub async fn load_deck(pool: &SqlitePool) -> Result<Deck> {
    Ok(Deck::new(list_cards(pool).await?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::migrate;
    use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
    use std::str::FromStr;
    use tempfile::TempDir;

    async fn test_pool() -> (TempDir, SqlitePool) {
        let tmp = TempDir::new().unwrap();
        let url = format!("sqlite:{}", tmp.path().join("cards.sqlite").display());
        let options = SqliteConnectOptions::from_str(&url)
            .unwrap()
            .create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .unwrap();
        migrate::apply(&pool).await.unwrap();
        (tmp, pool)
    }

    #[tokio::test]
    async fn test_seeded_catalog_matches_standard_deck() {
        let (_tmp, pool) = test_pool().await;
        let cards = list_cards(&pool).await.unwrap();
        assert_eq!(cards, standard_deck());
    }

    #[tokio::test]
    async fn test_reseeding_keeps_edits() {
        let (_tmp, pool) = test_pool().await;
        sqlx::query("UPDATE tarot_cards SET image_url = 'https://cdn.test/fool.png' WHERE id = 0")
            .execute(&pool)
            .await
            .unwrap();

        migrate::apply(&pool).await.unwrap();

        let fool = get_card(&pool, 0).await.unwrap().unwrap();
        assert_eq!(fool.image_url.as_deref(), Some("https://cdn.test/fool.png"));
        assert_eq!(list_cards(&pool).await.unwrap().len(), 78);
        assert!(get_card(&pool, 78).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_loaded_deck_finds_cards() {
        let (_tmp, pool) = test_pool().await;
        let deck = load_deck(&pool).await.unwrap();
        assert_eq!(deck.find("Tre di Spade").unwrap().name_en, "Three of Swords");
    }
}
