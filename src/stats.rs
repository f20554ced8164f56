//! Admin statistics and user overview.
//!
//! There is no users table: a user exists once they appear in the ledger,
//! in readings, or in `admin_users`. "First seen" is the earliest of those
//! rows. Used by `GET /admin/stats`, `GET /admin/users` and `arcana stats`.

use anyhow::Result;
use chrono::{Duration, Utc};
use serde::Serialize;
use sqlx::{Row, SqlitePool};

use crate::config::Config;
use crate::db;

const USERS_CTE: &str = r#"
    WITH seen AS (
        SELECT user_id, created_at FROM credits_ledger
        UNION ALL SELECT user_id, created_at FROM readings
        UNION ALL SELECT user_id, created_at FROM admin_users
    ),
    users AS (
        SELECT user_id, MIN(created_at) AS first_seen FROM seen GROUP BY user_id
    )
"#;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminStats {
    pub total_users: i64,
    pub total_readings: i64,
    /// Sum of all usage debits, as a positive number.
    pub credits_used: i64,
    pub knowledge_sources: i64,
    pub knowledge_chunks: i64,
    pub embedded_chunks: i64,
    pub readings_today: i64,
    pub new_users_this_week: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserOverview {
    pub user_id: String,
    pub balance: i64,
    pub reading_count: i64,
    pub is_admin: bool,
    pub first_seen: chrono::DateTime<Utc>,
}

async fn count(pool: &SqlitePool, sql: &str) -> Result<i64> {
    Ok(sqlx::query_scalar(sql).fetch_one(pool).await?)
}

pub async fn collect_stats(pool: &SqlitePool) -> Result<AdminStats> {
    let now = Utc::now();
    let start_of_day = now
        .date_naive()
        .and_hms_opt(0, 0, 0)
        .map(|dt| dt.and_utc().timestamp())
        .unwrap_or_else(|| now.timestamp());
    let week_ago = (now - Duration::days(7)).timestamp();

    let row = sqlx::query(&format!(
        "{} SELECT COUNT(*) AS total, COALESCE(SUM(CASE WHEN first_seen >= ? THEN 1 ELSE 0 END), 0) AS new_this_week FROM users",
        USERS_CTE
    ))
    .bind(week_ago)
    .fetch_one(pool)
    .await?;

    let readings_today: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM readings WHERE created_at >= ?")
            .bind(start_of_day)
            .fetch_one(pool)
            .await?;

    Ok(AdminStats {
        total_users: row.get("total"),
        total_readings: count(pool, "SELECT COUNT(*) FROM readings").await?,
        credits_used: count(
            pool,
            "SELECT COALESCE(-SUM(amount), 0) FROM credits_ledger WHERE transaction_type = 'usage'",
        )
        .await?,
        knowledge_sources: count(pool, "SELECT COUNT(*) FROM knowledge_sources").await?,
        knowledge_chunks: count(pool, "SELECT COUNT(*) FROM knowledge_chunks").await?,
        embedded_chunks: count(
            pool,
            "SELECT COUNT(*) FROM knowledge_chunks WHERE embedding IS NOT NULL",
        )
        .await?,
        readings_today,
        new_users_this_week: row.get("new_this_week"),
    })
}

/// Every known user, most recently seen first.
pub async fn list_users(pool: &SqlitePool) -> Result<Vec<UserOverview>> {
    let rows = sqlx::query(&format!(
        r#"
        {}
        SELECT
            u.user_id,
            u.first_seen,
            COALESCE((
                SELECT l.balance_after FROM credits_ledger l
                WHERE l.user_id = u.user_id
                ORDER BY l.created_at DESC, l.rowid DESC LIMIT 1
            ), 0) AS balance,
            (SELECT COUNT(*) FROM readings r WHERE r.user_id = u.user_id) AS reading_count,
            EXISTS(SELECT 1 FROM admin_users a WHERE a.user_id = u.user_id) AS is_admin
        FROM users u
        ORDER BY u.first_seen DESC, u.user_id ASC
        "#,
        USERS_CTE
    ))
    .fetch_all(pool)
    .await?;

    Ok(rows
        .iter()
        .map(|row| UserOverview {
            user_id: row.get("user_id"),
            balance: row.get("balance"),
            reading_count: row.get("reading_count"),
            is_admin: row.get::<i64, _>("is_admin") != 0,
            first_seen: crate::sqlite_store::from_ts(row.get("first_seen")),
        })
        .collect())
}

/// Run the stats command: query the database and print a summary.
pub async fn run_stats(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;
    let stats = collect_stats(&pool).await?;
    let users = list_users(&pool).await?;

    let db_size = std::fs::metadata(&config.db.path)
        .map(|m| m.len())
        .unwrap_or(0);

    println!("Arcana Database Stats");
    println!("=====================");
    println!();
    println!("  Database:    {}", config.db.path.display());
    println!("  Size:        {}", format_bytes(db_size));
    println!();
    println!(
        "  Users:       {} ({} new this week)",
        stats.total_users, stats.new_users_this_week
    );
    println!(
        "  Readings:    {} ({} today)",
        stats.total_readings, stats.readings_today
    );
    println!("  Credits used: {}", stats.credits_used);
    println!();
    println!("  Sources:     {}", stats.knowledge_sources);
    println!("  Chunks:      {}", stats.knowledge_chunks);
    println!(
        "  Embedded:    {} / {} ({}%)",
        stats.embedded_chunks,
        stats.knowledge_chunks,
        if stats.knowledge_chunks > 0 {
            (stats.embedded_chunks * 100) / stats.knowledge_chunks
        } else {
            0
        }
    );

    if !users.is_empty() {
        println!();
        println!("  Users:");
        println!(
            "  {:<38} {:>8} {:>9} {:>6}   {}",
            "USER", "BALANCE", "READINGS", "ADMIN", "FIRST SEEN"
        );
        println!("  {}", "-".repeat(80));
        for u in &users {
            println!(
                "  {:<38} {:>8} {:>9} {:>6}   {}",
                u.user_id,
                u.balance,
                u.reading_count,
                if u.is_admin { "yes" } else { "" },
                format_ts_relative(u.first_seen.timestamp())
            );
        }
    }

    println!();

    pool.close().await;
    Ok(())
}

/// Format a byte count as a human-readable string.
fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    }
}

/// Format a Unix timestamp as a relative time string (e.g. "3 days ago").
fn format_ts_relative(ts: i64) -> String {
    let delta = Utc::now().timestamp() - ts;

    if delta < 0 {
        return format_ts_iso(ts);
    }

    if delta < 3600 {
        "just now".to_string()
    } else if delta < 86400 {
        let hours = delta / 3600;
        format!("{} hour{} ago", hours, if hours == 1 { "" } else { "s" })
    } else if delta < 86400 * 30 {
        let days = delta / 86400;
        format!("{} day{} ago", days, if days == 1 { "" } else { "s" })
    } else {
        format_ts_iso(ts)
    }
}

fn format_ts_iso(ts: i64) -> String {
    chrono::DateTime::from_timestamp(ts, 0)
        .map(|dt| dt.format("%Y-%m-%d").to_string())
        .unwrap_or_else(|| ts.to_string())
}
