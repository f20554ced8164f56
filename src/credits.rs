//! Append-only credit ledger.
//!
//! A user's balance is the `balance_after` of their newest entry, or 0 when
//! they have none. Every write reads that balance and appends the next entry
//! inside one transaction, and refuses any entry that would leave the
//! balance negative.
//!
//! | Type | Written by |
//! |------|-----------|
//! | `signup` | first authenticated request ([`ensure_signup_bonus`]) |
//! | `usage` | saving a reading ([`debit_usage`]) |
//! | `purchase` | payment webhook ([`record_purchase`]), once per reference |
//! | `bonus` | admin grants ([`grant`]) |
//! | `refund` | admin corrections ([`grant`] with a negative amount) |

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection, SqlitePool};
use uuid::Uuid;

use crate::sqlite_store::from_ts;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionType {
    Signup,
    Purchase,
    Usage,
    Bonus,
    Refund,
}

impl TransactionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionType::Signup => "signup",
            TransactionType::Purchase => "purchase",
            TransactionType::Usage => "usage",
            TransactionType::Bonus => "bonus",
            TransactionType::Refund => "refund",
        }
    }

    pub fn parse(s: &str) -> Option<TransactionType> {
        match s {
            "signup" => Some(TransactionType::Signup),
            "purchase" => Some(TransactionType::Purchase),
            "usage" => Some(TransactionType::Usage),
            "bonus" => Some(TransactionType::Bonus),
            "refund" => Some(TransactionType::Refund),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LedgerEntry {
    pub id: String,
    pub user_id: String,
    pub amount: i64,
    pub transaction_type: TransactionType,
    pub description: String,
    pub reference_id: Option<String>,
    pub balance_after: i64,
    pub created_at: DateTime<Utc>,
}

/// An entry to append.
#[derive(Debug, Clone)]
pub struct NewEntry<'a> {
    pub user_id: &'a str,
    pub amount: i64,
    pub transaction_type: TransactionType,
    pub description: &'a str,
    pub reference_id: Option<&'a str>,
}

#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("Insufficient credits: balance {balance}, required {required}")]
    InsufficientCredits { balance: i64, required: i64 },
    #[error("Credit amount must not be zero")]
    ZeroAmount,
    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

fn entry_from_row(row: &SqliteRow) -> LedgerEntry {
    let kind: String = row.get("transaction_type");
    LedgerEntry {
        id: row.get("id"),
        user_id: row.get("user_id"),
        amount: row.get("amount"),
        // Rows are only ever written through `append_entry_in`.
        transaction_type: TransactionType::parse(&kind).unwrap_or(TransactionType::Bonus),
        description: row.get("description"),
        reference_id: row.get("reference_id"),
        balance_after: row.get("balance_after"),
        created_at: from_ts(row.get("created_at")),
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.is_unique_violation())
}

async fn balance_in(conn: &mut SqliteConnection, user_id: &str) -> Result<i64, sqlx::Error> {
    let balance: Option<i64> = sqlx::query_scalar(
        "SELECT balance_after FROM credits_ledger WHERE user_id = ? ORDER BY created_at DESC, rowid DESC LIMIT 1",
    )
    .bind(user_id)
    .fetch_optional(&mut *conn)
    .await?;
    Ok(balance.unwrap_or(0))
}

/// Current balance of a user.
pub async fn balance(pool: &SqlitePool, user_id: &str) -> Result<i64, sqlx::Error> {
    let mut conn = pool.acquire().await?;
    balance_in(&mut conn, user_id).await
}

/// Append an entry on an open connection or transaction.
pub async fn append_entry_in(
    conn: &mut SqliteConnection,
    entry: &NewEntry<'_>,
) -> Result<LedgerEntry, LedgerError> {
    if entry.amount == 0 {
        return Err(LedgerError::ZeroAmount);
    }

    let balance = balance_in(conn, entry.user_id).await?;
    let balance_after = balance + entry.amount;
    if balance_after < 0 {
        return Err(LedgerError::InsufficientCredits {
            balance,
            required: -entry.amount,
        });
    }

    let created = LedgerEntry {
        id: Uuid::new_v4().to_string(),
        user_id: entry.user_id.to_string(),
        amount: entry.amount,
        transaction_type: entry.transaction_type,
        description: entry.description.to_string(),
        reference_id: entry.reference_id.map(str::to_string),
        balance_after,
        created_at: from_ts(Utc::now().timestamp()),
    };

    sqlx::query(
        r#"
        INSERT INTO credits_ledger
            (id, user_id, amount, transaction_type, description, reference_id, balance_after, created_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&created.id)
    .bind(&created.user_id)
    .bind(created.amount)
    .bind(created.transaction_type.as_str())
    .bind(&created.description)
    .bind(&created.reference_id)
    .bind(created.balance_after)
    .bind(created.created_at.timestamp())
    .execute(&mut *conn)
    .await?;

    Ok(created)
}

/// Append an entry in its own transaction.
pub async fn append_entry(
    pool: &SqlitePool,
    entry: &NewEntry<'_>,
) -> Result<LedgerEntry, LedgerError> {
    let mut tx = pool.begin().await?;
    let created = append_entry_in(&mut tx, entry).await?;
    tx.commit().await?;
    Ok(created)
}

/// Grant the signup bonus unless the user already received it.
///
/// Returns the new entry, or `None` when nothing was granted.
pub async fn ensure_signup_bonus(
    pool: &SqlitePool,
    user_id: &str,
    bonus: i64,
) -> Result<Option<LedgerEntry>, LedgerError> {
    if bonus <= 0 {
        return Ok(None);
    }

    let already: Option<String> = sqlx::query_scalar(
        "SELECT id FROM credits_ledger WHERE user_id = ? AND transaction_type = 'signup' LIMIT 1",
    )
    .bind(user_id)
    .fetch_optional(pool)
    .await?;
    if already.is_some() {
        return Ok(None);
    }

    let entry = NewEntry {
        user_id,
        amount: bonus,
        transaction_type: TransactionType::Signup,
        description: "Welcome bonus credits",
        reference_id: None,
    };
    match append_entry(pool, &entry).await {
        Ok(created) => {
            tracing::info!(user_id, bonus, "granted signup bonus");
            Ok(Some(created))
        }
        // A concurrent first request won the race.
        Err(LedgerError::Database(e)) if is_unique_violation(&e) => Ok(None),
        Err(e) => Err(e),
    }
}

/// Debit `cost` credits for a reading on an open transaction.
pub async fn debit_usage(
    conn: &mut SqliteConnection,
    user_id: &str,
    cost: i64,
    description: &str,
    reference_id: &str,
) -> Result<LedgerEntry, LedgerError> {
    append_entry_in(
        conn,
        &NewEntry {
            user_id,
            amount: -cost,
            transaction_type: TransactionType::Usage,
            description,
            reference_id: Some(reference_id),
        },
    )
    .await
}

/// Credit a purchase once per payment reference.
///
/// Returns `None` when the reference was already credited.
pub async fn record_purchase(
    pool: &SqlitePool,
    user_id: &str,
    credits: i64,
    reference_id: &str,
) -> Result<Option<LedgerEntry>, LedgerError> {
    let mut tx = pool.begin().await?;

    let existing: Option<String> = sqlx::query_scalar(
        "SELECT id FROM credits_ledger WHERE reference_id = ? AND transaction_type = 'purchase'",
    )
    .bind(reference_id)
    .fetch_optional(&mut *tx)
    .await?;
    if existing.is_some() {
        return Ok(None);
    }

    let description = format!("Purchased {} credits", credits);
    let result = append_entry_in(
        &mut tx,
        &NewEntry {
            user_id,
            amount: credits,
            transaction_type: TransactionType::Purchase,
            description: &description,
            reference_id: Some(reference_id),
        },
    )
    .await;

    match result {
        Ok(created) => {
            tx.commit().await?;
            Ok(Some(created))
        }
        Err(LedgerError::Database(e)) if is_unique_violation(&e) => Ok(None),
        Err(e) => Err(e),
    }
}

/// Admin adjustment: positive amounts are bonuses, negative ones refunds.
pub async fn grant(
    pool: &SqlitePool,
    user_id: &str,
    amount: i64,
    description: Option<&str>,
) -> Result<LedgerEntry, LedgerError> {
    let (transaction_type, default_description) = if amount >= 0 {
        (TransactionType::Bonus, "Admin granted credits")
    } else {
        (TransactionType::Refund, "Admin credit adjustment")
    };
    append_entry(
        pool,
        &NewEntry {
            user_id,
            amount,
            transaction_type,
            description: description.unwrap_or(default_description),
            reference_id: None,
        },
    )
    .await
}

/// The newest `limit` entries of a user, newest first.
pub async fn history(
    pool: &SqlitePool,
    user_id: &str,
    limit: i64,
) -> Result<Vec<LedgerEntry>, sqlx::Error> {
    let rows = sqlx::query(
        r#"
        SELECT id, user_id, amount, transaction_type, description, reference_id, balance_after, created_at
        FROM credits_ledger
        WHERE user_id = ?
        ORDER BY created_at DESC, rowid DESC
        LIMIT ?
        "#,
    )
    .bind(user_id)
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(rows.iter().map(entry_from_row).collect())
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
        let url = format!("sqlite:{}", tmp.path().join("ledger.sqlite").display());
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
    async fn test_new_user_has_zero_balance() {
        let (_tmp, pool) = test_pool().await;
        assert_eq!(balance(&pool, "nobody").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_signup_bonus_granted_once() {
        let (_tmp, pool) = test_pool().await;
        assert!(ensure_signup_bonus(&pool, "u1", 3).await.unwrap().is_some());
        assert!(ensure_signup_bonus(&pool, "u1", 3).await.unwrap().is_none());
        assert_eq!(balance(&pool, "u1").await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_debit_rejected_when_insufficient() {
        let (_tmp, pool) = test_pool().await;
        ensure_signup_bonus(&pool, "u1", 1).await.unwrap();

        let mut conn = pool.acquire().await.unwrap();
        debit_usage(&mut conn, "u1", 1, "Tarot reading", "r1").await.unwrap();
        let err = debit_usage(&mut conn, "u1", 1, "Tarot reading", "r2")
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            LedgerError::InsufficientCredits {
                balance: 0,
                required: 1
            }
        ));
        drop(conn);
        assert_eq!(balance(&pool, "u1").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_purchase_is_idempotent() {
        let (_tmp, pool) = test_pool().await;
        let first = record_purchase(&pool, "u1", 10, "cs_test_1").await.unwrap();
        assert_eq!(first.unwrap().balance_after, 10);
        assert!(record_purchase(&pool, "u1", 10, "cs_test_1")
            .await
            .unwrap()
            .is_none());
        assert_eq!(balance(&pool, "u1").await.unwrap(), 10);
    }

    #[tokio::test]
    async fn test_history_newest_first() {
        let (_tmp, pool) = test_pool().await;
        ensure_signup_bonus(&pool, "u1", 3).await.unwrap();
        grant(&pool, "u1", 2, None).await.unwrap();
        let refund = grant(&pool, "u1", -4, Some("correction")).await.unwrap();
        assert_eq!(refund.transaction_type, TransactionType::Refund);
        assert_eq!(refund.balance_after, 1);

        let entries = history(&pool, "u1", 10).await.unwrap();
        let kinds: Vec<TransactionType> = entries.iter().map(|e| e.transaction_type).collect();
        assert_eq!(
            kinds,
            vec![
                TransactionType::Refund,
                TransactionType::Bonus,
                TransactionType::Signup
            ]
        );
        assert!(grant(&pool, "u1", -5, None).await.is_err());
        assert!(matches!(
            grant(&pool, "u1", 0, None).await,
            Err(LedgerError::ZeroAmount)
        ));
    }
}
