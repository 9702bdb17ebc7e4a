//! Identity claim persistence.

use chrono::{DateTime, Utc};
use notary_core::{ClaimReference, Timestamp};
use notary_state::{ClaimStatus, IdentityClaim, Metadata};
use sqlx::PgPool;

use super::{from_json, to_json, ts, user_column};

/// Insert a new claim.
pub async fn insert(pool: &PgPool, claim: &IdentityClaim) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO identity_claims (reference, user_id, authority_id, claim_type, claim_value,
                                      signature, expiration, metadata, status, issued_at)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)",
    )
    .bind(claim.reference.as_str())
    .bind(claim.user_id.as_str())
    .bind(&claim.authority_id)
    .bind(&claim.claim_type)
    .bind(&claim.claim_value)
    .bind(&claim.signature)
    .bind(ts(claim.expiration))
    .bind(to_json(&claim.metadata, "metadata")?)
    .bind(claim.status.as_str())
    .bind(ts(claim.issued_at))
    .execute(pool)
    .await?;
    Ok(())
}

/// Update a claim's status.
pub async fn update_status(
    pool: &PgPool,
    reference: &ClaimReference,
    status: ClaimStatus,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("UPDATE identity_claims SET status = $1 WHERE reference = $2")
        .bind(status.as_str())
        .bind(reference.as_str())
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

/// Load every stored claim.
pub async fn load_all(pool: &PgPool) -> Result<Vec<IdentityClaim>, sqlx::Error> {
    let rows = sqlx::query_as::<_, ClaimRow>(
        "SELECT reference, user_id, authority_id, claim_type, claim_value,
                signature, expiration, metadata, status, issued_at
         FROM identity_claims ORDER BY issued_at",
    )
    .fetch_all(pool)
    .await?;

    rows.into_iter().map(ClaimRow::into_claim).collect()
}

#[derive(sqlx::FromRow)]
struct ClaimRow {
    reference: String,
    user_id: String,
    authority_id: String,
    claim_type: String,
    claim_value: String,
    signature: String,
    expiration: DateTime<Utc>,
    metadata: serde_json::Value,
    status: String,
    issued_at: DateTime<Utc>,
}

impl ClaimRow {
    fn into_claim(self) -> Result<IdentityClaim, sqlx::Error> {
        let status = match self.status.as_str() {
            "VALID" => ClaimStatus::Valid,
            "REVOKED" => ClaimStatus::Revoked,
            other => {
                return Err(sqlx::Error::Protocol(format!(
                    "unknown claim status {other:?} for {}",
                    self.reference
                )))
            }
        };
        Ok(IdentityClaim {
            reference: ClaimReference::new(self.reference)
                .map_err(|e| sqlx::Error::Protocol(format!("invalid claim reference: {e}")))?,
            user_id: user_column(self.user_id, "user_id")?,
            authority_id: self.authority_id,
            claim_type: self.claim_type,
            claim_value: self.claim_value,
            signature: self.signature,
            expiration: Timestamp::from_utc(self.expiration),
            metadata: from_json::<Metadata>(self.metadata, "metadata")?,
            status,
            issued_at: Timestamp::from_utc(self.issued_at),
        })
    }
}
