//! Operator commands: admin membership, credit adjustments, and dev tokens.

use anyhow::{bail, Result};
use chrono::{Duration, Utc};

use crate::auth::{self, sign_token, Claims};
use crate::config::Config;
use crate::credits;
use crate::db;

pub async fn run_admin_add(config: &Config, user_id: &str) -> Result<()> {
    let pool = db::connect(config).await?;
    if auth::grant_admin(&pool, user_id).await? {
        println!("{} is now an admin", user_id);
    } else {
        println!("{} was already an admin", user_id);
    }
    pool.close().await;
    Ok(())
}

pub async fn run_admin_remove(config: &Config, user_id: &str) -> Result<()> {
    let pool = db::connect(config).await?;
    if auth::revoke_admin(&pool, user_id).await? {
        println!("{} is no longer an admin", user_id);
    } else {
        println!("{} was not an admin", user_id);
    }
    pool.close().await;
    Ok(())
}

pub async fn run_credits_grant(
    config: &Config,
    user_id: &str,
    amount: i64,
    description: Option<&str>,
) -> Result<()> {
    let pool = db::connect(config).await?;
    let entry = credits::grant(&pool, user_id, amount, description).await?;
    println!(
        "{} {:+} credits ({}), balance {}",
        user_id,
        entry.amount,
        entry.transaction_type.as_str(),
        entry.balance_after
    );
    pool.close().await;
    Ok(())
}

pub async fn run_credits_balance(config: &Config, user_id: &str, limit: i64) -> Result<()> {
    let pool = db::connect(config).await?;
    let balance = credits::balance(&pool, user_id).await?;
    let entries = credits::history(&pool, user_id, limit).await?;

    println!("{}: {} credits", user_id, balance);
    for e in &entries {
        println!(
            "  {}  {:>+5}  {:<9} {:>5}  {}",
            e.created_at.format("%Y-%m-%d %H:%M"),
            e.amount,
            e.transaction_type.as_str(),
            e.balance_after,
            e.description
        );
    }

    pool.close().await;
    Ok(())
}

/// Sign a token for local testing with the configured secret.
pub fn run_token(config: &Config, user_id: &str, ttl_hours: i64) -> Result<()> {
    let Some(secret) = config.auth.jwt_secret.as_deref() else {
        bail!(
            "No JWT secret configured: set auth.jwt_secret or ${}",
            config.auth.jwt_secret_env
        );
    };
    if ttl_hours <= 0 {
        bail!("--ttl-hours must be positive");
    }

    let claims = Claims {
        sub: user_id.to_string(),
        exp: (Utc::now() + Duration::hours(ttl_hours)).timestamp(),
        email: None,
    };
    println!("{}", sign_token(secret.as_bytes(), &claims)?);
    Ok(())
}
