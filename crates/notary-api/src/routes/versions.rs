//! # Version Endpoints
//!
//! - `GET  /v1/versions/:hash`: a version and its document root.
//! - `POST /v1/versions/:hash/signatures`: sign a specific version.
//! - `POST /v1/versions/:hash/reject`: reject, by a required signer.
//! - `POST /v1/versions/:hash/expire`: deadline hook for an external
//!   scheduler; needs [`Role::Operator`].

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use notary_core::{ClaimReference, ContentDigest};
use notary_state::Version;
use serde::{Deserialize, Serialize};

use crate::auth::{require_role, CallerIdentity, Role};
use crate::error::AppError;
use crate::extractors::{extract_validated_json, parse_hash, Validate};
use crate::routes::documents::signature_status;
use crate::routes::SignRequest;
use crate::service::{SignatureResult, TransitionResult};
use crate::state::AppState;

/// Longest accepted reason, in bytes.
const MAX_REASON_LEN: usize = 1024;

/// Body for reject and expire.
#[derive(Debug, Deserialize)]
pub struct FinalizeRequest {
    /// Why the version is being closed.
    pub reason: String,
}

impl Validate for FinalizeRequest {
    fn validate(&self) -> Result<(), String> {
        if self.reason.trim().is_empty() {
            return Err("reason must not be empty".to_string());
        }
        if self.reason.len() > MAX_REASON_LEN {
            return Err(format!("reason must not exceed {MAX_REASON_LEN} bytes"));
        }
        Ok(())
    }
}

/// A version with the document it belongs to.
#[derive(Debug, Serialize)]
pub struct VersionView {
    /// Document identifier.
    pub root_hash: ContentDigest,
    /// The version.
    pub version: Version,
}

/// Build the versions router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/v1/versions/:hash", get(get_version))
        .route("/v1/versions/:hash/signatures", post(submit_signature))
        .route("/v1/versions/:hash/reject", post(reject_version))
        .route("/v1/versions/:hash/expire", post(expire_version))
}

/// GET /v1/versions/:hash: Get a version.
async fn get_version(
    State(state): State<AppState>,
    Path(hash): Path<String>,
) -> Result<Json<VersionView>, AppError> {
    let hash = parse_hash(&hash)?;
    let (root_hash, version) = state.service.get_version(&hash)?;
    Ok(Json(VersionView { root_hash, version }))
}

/// POST /v1/versions/:hash/signatures: Sign a version.
async fn submit_signature(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(hash): Path<String>,
    body: Result<Json<SignRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<SignatureResult>), AppError> {
    let hash = parse_hash(&hash)?;
    let req = extract_validated_json(body)?;
    let claim = ClaimReference::new(req.claim_reference)?;
    let result = state
        .service
        .submit_signature(&caller.user_id, &hash, req.signature_data, claim)
        .await?;
    Ok((signature_status(&result), Json(result)))
}

/// POST /v1/versions/:hash/reject: Reject a pending version.
async fn reject_version(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(hash): Path<String>,
    body: Result<Json<FinalizeRequest>, JsonRejection>,
) -> Result<Json<TransitionResult>, AppError> {
    let hash = parse_hash(&hash)?;
    let req = extract_validated_json(body)?;
    let result = state
        .service
        .reject_version(&caller.user_id, &hash, &req.reason)
        .await?;
    Ok(Json(result))
}

/// POST /v1/versions/:hash/expire: Expire a pending version.
async fn expire_version(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(hash): Path<String>,
    body: Result<Json<FinalizeRequest>, JsonRejection>,
) -> Result<Json<TransitionResult>, AppError> {
    require_role(&caller, Role::Operator)?;
    let hash = parse_hash(&hash)?;
    let req = extract_validated_json(body)?;
    tracing::info!(version = %hash, requested_by = %caller.user_id, "expiry requested");
    let result = state.service.expire_version(&hash, &req.reason).await?;
    Ok(Json(result))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use notary_core::UserId;
    use tower::ServiceExt;

    fn test_app(user: &str) -> Router {
        app_as(CallerIdentity::new(UserId::new(user).unwrap()), AppState::new())
    }

    fn app_as(caller: CallerIdentity, state: AppState) -> Router {
        router().layer(axum::Extension(caller)).with_state(state)
    }

    fn expire(hash: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(format!("/v1/versions/{hash}/expire"))
            .header("content-type", "application/json")
            .body(Body::from(r#"{"reason":"deadline passed"}"#))
            .unwrap()
    }

    async fn seeded_version(state: &AppState) -> String {
        state
            .claims
            .issue(notary_state::IdentityClaim {
                reference: ClaimReference::new("claim-alice").unwrap(),
                user_id: UserId::new("alice").unwrap(),
                authority_id: "registry".into(),
                claim_type: "kyc".into(),
                claim_value: "verified".into(),
                signature: "sig".into(),
                expiration: notary_core::Timestamp::now().plus_secs(3600),
                metadata: notary_state::Metadata::new(),
                status: notary_state::ClaimStatus::Valid,
                issued_at: notary_core::Timestamp::now(),
            })
            .unwrap();
        let created = state
            .service
            .create_document(
                &UserId::new("alice").unwrap(),
                b"deadline",
                "Deed",
                [UserId::new("alice").unwrap()].into(),
                notary_state::Metadata::new(),
                None,
            )
            .await
            .unwrap();
        created.root_hash.to_hex()
    }

    #[tokio::test]
    async fn expire_needs_the_operator_role() {
        let state = AppState::new();
        let hash = seeded_version(&state).await;

        let eve = CallerIdentity::new(UserId::new("eve").unwrap());
        let resp = app_as(eve, state.clone()).oneshot(expire(&hash)).await.unwrap();
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);
        let (_, version) = state.service.get_version(&parse_hash(&hash).unwrap()).unwrap();
        assert_eq!(version.status, notary_state::VersionStatus::Pending);

        let cron = CallerIdentity::new(UserId::new("cron").unwrap()).with_role(Role::Operator);
        let resp = app_as(cron, state).oneshot(expire(&hash)).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["event"]["to"], "EXPIRED");
    }

    #[tokio::test]
    async fn unknown_version_is_not_found() {
        let resp = test_app("alice")
            .oneshot(
                Request::builder()
                    .uri(format!("/v1/versions/{}", "ab".repeat(32)))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["error"]["code"], "NOT_FOUND");
    }

    #[tokio::test]
    async fn blank_reason_is_rejected_before_lookup() {
        let resp = test_app("alice")
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri(format!("/v1/versions/{}/reject", "ab".repeat(32)))
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"reason":"  "}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn sign_without_identity_is_unauthenticated() {
        let app = router().with_state(AppState::new());
        let resp = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri(format!("/v1/versions/{}/signatures", "ab".repeat(32)))
                    .header("content-type", "application/json")
                    .body(Body::from(
                        r#"{"signature_data":"sig","claim_reference":"c-1"}"#,
                    ))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }
}
