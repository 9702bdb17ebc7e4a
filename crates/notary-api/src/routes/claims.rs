//! # Identity Claim Endpoints
//!
//! - `POST /v1/claims`: record a claim issued by the calling authority.
//! - `POST /v1/claims/:id/revoke`: revoke a claim the caller issued.
//! - `GET  /v1/claims/user/:user_id`: claims held by a user.
//!
//! Recording and revoking need [`Role::ClaimAuthority`]. A claim is always
//! recorded under the caller's id, and nobody records a claim for
//! themselves.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use notary_core::{ClaimReference, NotaryError, Timestamp, UserId};
use notary_state::{ClaimStatus, IdentityClaim, IdentityClaimSource, Metadata};
use serde::Deserialize;
use uuid::Uuid;

use crate::auth::{require_role, CallerIdentity, Role};
use crate::error::AppError;
use crate::extractors::{extract_validated_json, Validate};
use crate::state::AppState;

/// Request to record an identity claim.
#[derive(Debug, Deserialize)]
pub struct IssueClaimRequest {
    /// Claim identifier. Generated when absent.
    #[serde(default)]
    pub reference: Option<String>,
    /// Holder.
    pub user_id: String,
    /// Issuing authority. Must be the caller when given.
    #[serde(default)]
    pub authority_id: Option<String>,
    /// Attribute kind.
    pub claim_type: String,
    /// Attribute value.
    pub claim_value: String,
    /// Authority signature over the claim.
    pub signature: String,
    /// RFC 3339 UTC instant the claim stops being valid.
    pub expiration: String,
    /// Free-form metadata.
    #[serde(default)]
    pub metadata: Metadata,
}

impl Validate for IssueClaimRequest {
    fn validate(&self) -> Result<(), String> {
        for (name, value) in [
            ("claim_type", &self.claim_type),
            ("claim_value", &self.claim_value),
        ] {
            if value.trim().is_empty() {
                return Err(format!("{name} must not be empty"));
            }
        }
        Ok(())
    }
}

/// Build the claims router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/v1/claims", post(issue_claim))
        .route("/v1/claims/:id/revoke", post(revoke_claim))
        .route("/v1/claims/user/:user_id", get(list_claims))
}

/// POST /v1/claims: Record an identity claim.
async fn issue_claim(
    State(state): State<AppState>,
    caller: CallerIdentity,
    body: Result<Json<IssueClaimRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<IdentityClaim>), AppError> {
    require_role(&caller, Role::ClaimAuthority)?;
    let req = extract_validated_json(body)?;
    let holder = UserId::new(req.user_id)?;
    if holder == caller.user_id {
        return Err(NotaryError::Unauthorized(format!(
            "{} may not record a claim for themselves",
            caller.user_id
        ))
        .into());
    }
    if let Some(authority) = req.authority_id.as_deref() {
        if authority != caller.user_id.as_str() {
            return Err(NotaryError::Unauthorized(format!(
                "{} may not record claims on behalf of {authority}",
                caller.user_id
            ))
            .into());
        }
    }
    let reference = match req.reference {
        Some(r) => ClaimReference::new(r)?,
        None => ClaimReference::new(Uuid::new_v4().to_string())?,
    };
    let claim = IdentityClaim {
        reference,
        user_id: holder,
        authority_id: caller.user_id.to_string(),
        claim_type: req.claim_type,
        claim_value: req.claim_value,
        signature: req.signature,
        expiration: Timestamp::parse(&req.expiration)?,
        metadata: req.metadata,
        status: ClaimStatus::Valid,
        issued_at: Timestamp::now(),
    };

    state.claims.issue(claim.clone())?;
    tracing::info!(claim = %claim.reference, recorded_by = %caller.user_id, "identity claim recorded");

    if let Some(pool) = &state.db_pool {
        if let Err(e) = crate::db::claims::insert(pool, &claim).await {
            tracing::error!(claim = %claim.reference, error = %e, "failed to persist identity claim");
            return Err(AppError::Internal(
                "claim recorded in-memory but database persist failed".to_string(),
            ));
        }
    }

    Ok((StatusCode::CREATED, Json(claim)))
}

/// POST /v1/claims/:id/revoke: Revoke a claim.
async fn revoke_claim(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(id): Path<String>,
) -> Result<Json<IdentityClaim>, AppError> {
    require_role(&caller, Role::ClaimAuthority)?;
    let reference = ClaimReference::new(id)?;
    let issued = state
        .claims
        .get_claim(&reference)
        .ok_or_else(|| NotaryError::NotFound {
            kind: "claim",
            id: reference.to_string(),
        })?;
    if issued.authority_id != caller.user_id.as_str() {
        return Err(NotaryError::Unauthorized(format!(
            "claim {reference} was issued by {}, not {}",
            issued.authority_id, caller.user_id
        ))
        .into());
    }
    let claim = state.claims.revoke(&reference)?;
    tracing::info!(claim = %reference, revoked_by = %caller.user_id, "identity claim revoked");

    if let Some(pool) = &state.db_pool {
        if let Err(e) = crate::db::claims::update_status(pool, &reference, claim.status).await {
            tracing::error!(claim = %reference, error = %e, "failed to persist claim revocation");
            return Err(AppError::Internal(
                "claim revoked in-memory but database persist failed".to_string(),
            ));
        }
    }

    Ok(Json(claim))
}

/// GET /v1/claims/user/:user_id: Claims held by a user.
async fn list_claims(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<Vec<IdentityClaim>>, AppError> {
    let user = UserId::new(user_id)?;
    Ok(Json(state.claims.list_for_user(&user)))
}
