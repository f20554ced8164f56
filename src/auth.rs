//! Bearer-token authentication and admin membership.
//!
//! Tokens are HS256 JWTs issued by the identity provider and verified
//! locally with the shared secret (`auth.jwt_secret`). Only `sub` and `exp`
//! are required; other claims are ignored. Admin rights come from the
//! `admin_users` table, never from the token.
//!
//! Handlers take [`AuthUser`] or [`AdminUser`] as an extractor:
//!
//! | Extractor | Missing/invalid token | Not an admin |
//! |-----------|----------------------|--------------|
//! | [`AuthUser`] | 401 | n/a |
//! | [`AdminUser`] | 401 | 403 |

use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use chrono::Utc;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use sqlx::SqlitePool;

use crate::credits;
use crate::error::ApiError;
use crate::server::AppState;

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    /// User id.
    pub sub: String,
    /// Expiry, unix seconds.
    pub exp: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum AuthError {
    #[error("No authorization header")]
    MissingToken,
    #[error("Malformed token")]
    Malformed,
    #[error("Unsupported token algorithm")]
    UnsupportedAlgorithm,
    #[error("Invalid token signature")]
    BadSignature,
    #[error("Token expired")]
    Expired,
}

#[derive(Serialize, Deserialize)]
struct Header {
    alg: String,
    #[serde(default)]
    typ: Option<String>,
}

fn mac(secret: &[u8]) -> Result<HmacSha256, AuthError> {
    HmacSha256::new_from_slice(secret).map_err(|_| AuthError::BadSignature)
}

fn encode_part<T: Serialize>(value: &T) -> String {
    URL_SAFE_NO_PAD.encode(serde_json::to_vec(value).unwrap_or_default())
}

/// Sign `claims` as an HS256 JWT.
pub fn sign_token(secret: &[u8], claims: &Claims) -> Result<String, AuthError> {
    let header = Header {
        alg: "HS256".to_string(),
        typ: Some("JWT".to_string()),
    };
    let signing_input = format!("{}.{}", encode_part(&header), encode_part(claims));
    let mut m = mac(secret)?;
    m.update(signing_input.as_bytes());
    let signature = URL_SAFE_NO_PAD.encode(m.finalize().into_bytes());
    Ok(format!("{}.{}", signing_input, signature))
}

/// Verify an HS256 JWT and return its claims.
///
/// `now` is unix seconds; a token whose `exp` is at or before `now` is
/// rejected.
pub fn verify_token(secret: &[u8], token: &str, now: i64) -> Result<Claims, AuthError> {
    let mut parts = token.split('.');
    let (Some(header_b64), Some(claims_b64), Some(sig_b64), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return Err(AuthError::Malformed);
    };

    let header: Header = URL_SAFE_NO_PAD
        .decode(header_b64)
        .ok()
        .and_then(|b| serde_json::from_slice(&b).ok())
        .ok_or(AuthError::Malformed)?;
    if header.alg != "HS256" {
        return Err(AuthError::UnsupportedAlgorithm);
    }

    let signature = URL_SAFE_NO_PAD
        .decode(sig_b64)
        .map_err(|_| AuthError::Malformed)?;
    let mut m = mac(secret)?;
    m.update(header_b64.as_bytes());
    m.update(b".");
    m.update(claims_b64.as_bytes());
    m.verify_slice(&signature)
        .map_err(|_| AuthError::BadSignature)?;

    let claims: Claims = URL_SAFE_NO_PAD
        .decode(claims_b64)
        .ok()
        .and_then(|b| serde_json::from_slice(&b).ok())
        .ok_or(AuthError::Malformed)?;
    if claims.exp <= now {
        return Err(AuthError::Expired);
    }
    Ok(claims)
}

// ============ Admin membership ============

pub async fn is_admin(pool: &SqlitePool, user_id: &str) -> Result<bool, sqlx::Error> {
    let found: Option<String> =
        sqlx::query_scalar("SELECT user_id FROM admin_users WHERE user_id = ?")
            .bind(user_id)
            .fetch_optional(pool)
            .await?;
    Ok(found.is_some())
}

/// Grant admin rights. Returns `false` when the user already had them.
pub async fn grant_admin(pool: &SqlitePool, user_id: &str) -> Result<bool, sqlx::Error> {
    let result =
        sqlx::query("INSERT OR IGNORE INTO admin_users (user_id, created_at) VALUES (?, ?)")
            .bind(user_id)
            .bind(Utc::now().timestamp())
            .execute(pool)
            .await?;
    Ok(result.rows_affected() > 0)
}

/// Revoke admin rights. Returns `false` when the user was not an admin.
pub async fn revoke_admin(pool: &SqlitePool, user_id: &str) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM admin_users WHERE user_id = ?")
        .bind(user_id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

// ============ Extractors ============

/// An authenticated caller.
///
/// Extraction also grants the signup bonus on a user's first request.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: String,
    pub is_admin: bool,
}

/// An authenticated caller with admin rights.
#[derive(Debug, Clone)]
pub struct AdminUser(pub AuthUser);

fn bearer_token(parts: &Parts) -> Result<&str, AuthError> {
    let value = parts
        .headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or(AuthError::MissingToken)?;
    value
        .strip_prefix("Bearer ")
        .or_else(|| value.strip_prefix("bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or(AuthError::Malformed)
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, ApiError> {
        let token = bearer_token(parts)?;
        let claims = verify_token(state.jwt_secret.as_bytes(), token, Utc::now().timestamp())?;

        credits::ensure_signup_bonus(&state.pool, &claims.sub, state.config.credits.signup_bonus)
            .await?;
        let is_admin = is_admin(&state.pool, &claims.sub).await?;

        Ok(AuthUser {
            user_id: claims.sub,
            is_admin,
        })
    }
}

impl FromRequestParts<AppState> for AdminUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, ApiError> {
        let user = AuthUser::from_request_parts(parts, state).await?;
        if !user.is_admin {
            return Err(ApiError::Forbidden("Admin access required".to_string()));
        }
        Ok(AdminUser(user))
    }
}
