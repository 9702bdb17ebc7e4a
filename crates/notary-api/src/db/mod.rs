//! # Database Persistence Layer
//!
//! Optional Postgres write-through via SQLx.
//!
//! When `DATABASE_URL` is set, documents, versions, signatures and identity
//! claims are written to PostgreSQL after each in-memory commit and loaded
//! back on startup. When absent, the API runs in-memory only.

pub mod claims;
pub mod documents;

use notary_core::{ContentDigest, Timestamp, UserId};
use sqlx::postgres::{PgPool, PgPoolOptions};

/// Connect to `url` and run migrations.
///
/// Returns `None` when no URL is configured (in-memory-only mode).
/// Returns `Err` if the URL is set but the connection or migration fails.
pub async fn init_pool(url: Option<&str>) -> Result<Option<PgPool>, sqlx::Error> {
    let Some(url) = url else {
        tracing::warn!(
            "DATABASE_URL not set, running in-memory only mode. \
             State will not survive restarts."
        );
        return Ok(None);
    };

    let pool = PgPoolOptions::new()
        .max_connections(20)
        .min_connections(2)
        .acquire_timeout(std::time::Duration::from_secs(5))
        .connect(url)
        .await?;

    tracing::info!("Connected to PostgreSQL");

    sqlx::migrate!("./migrations").run(&pool).await?;
    tracing::info!("Database migrations applied");

    Ok(Some(pool))
}

// ─── Column Codecs ───────────────────────────────────────────────────

pub(crate) fn to_json<T: serde::Serialize>(
    value: &T,
    what: &str,
) -> Result<serde_json::Value, sqlx::Error> {
    serde_json::to_value(value).map_err(|e| {
        tracing::error!(error = %e, column = what, "failed to serialize column");
        sqlx::Error::Encode(Box::new(e))
    })
}

pub(crate) fn from_json<T: serde::de::DeserializeOwned>(
    value: serde_json::Value,
    what: &str,
) -> Result<T, sqlx::Error> {
    serde_json::from_value(value)
        .map_err(|e| sqlx::Error::Protocol(format!("invalid {what} column: {e}")))
}

pub(crate) fn digest_column(hex: &str, what: &str) -> Result<ContentDigest, sqlx::Error> {
    ContentDigest::from_hex(hex).map_err(|e| sqlx::Error::Protocol(format!("invalid {what}: {e}")))
}

pub(crate) fn user_column(raw: String, what: &str) -> Result<UserId, sqlx::Error> {
    UserId::new(raw).map_err(|e| sqlx::Error::Protocol(format!("invalid {what}: {e}")))
}

pub(crate) fn ts(value: Timestamp) -> chrono::DateTime<chrono::Utc> {
    *value.as_datetime()
}
