//! # Document Endpoints
//!
//! - `POST /v1/documents`: create a document from base64 content.
//! - `POST /v1/documents/:hash/versions`: append a version.
//! - `POST /v1/documents/:hash/signatures`: sign the current version.
//! - `GET  /v1/documents/:hash/history`: versions plus ledger records.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use notary_core::ClaimReference;
use notary_state::{Metadata, UploadInfo, MAX_TITLE_LEN};
use serde::Deserialize;

use crate::auth::CallerIdentity;
use crate::error::AppError;
use crate::extractors::{decode_content, extract_validated_json, parse_hash, parse_signers, Validate};
use crate::routes::SignRequest;
use crate::service::{AppendedVersion, CreatedDocument, History, SignatureResult};
use crate::state::AppState;

/// Request to create a document.
#[derive(Debug, Deserialize)]
pub struct CreateDocumentRequest {
    /// Base64-encoded root content.
    pub content: String,
    /// Document title.
    pub title: String,
    /// Users whose signatures every version requires.
    pub signers: Vec<String>,
    /// Descriptive metadata. Never hashed.
    #[serde(default)]
    pub metadata: Metadata,
    /// Original file name, if uploaded from a file.
    #[serde(default)]
    pub file_name: Option<String>,
    /// MIME type reported by the uploader.
    #[serde(default)]
    pub mime_type: Option<String>,
}

impl Validate for CreateDocumentRequest {
    fn validate(&self) -> Result<(), String> {
        if self.content.is_empty() {
            return Err("content must not be empty".to_string());
        }
        if self.title.trim().is_empty() {
            return Err("title must not be empty".to_string());
        }
        if self.title.len() > MAX_TITLE_LEN {
            return Err(format!("title must not exceed {MAX_TITLE_LEN} bytes"));
        }
        if self.signers.is_empty() {
            return Err("signers must not be empty".to_string());
        }
        Ok(())
    }
}

/// Request to append a version.
#[derive(Debug, Deserialize)]
pub struct AppendVersionRequest {
    /// Base64-encoded content.
    pub content: String,
    /// Version title.
    pub title: String,
    /// Descriptive metadata. Never hashed.
    #[serde(default)]
    pub metadata: Metadata,
    /// Hash the caller believes is current; the append fails with 409 if
    /// the chain has moved on.
    #[serde(default)]
    pub expected_current: Option<String>,
}

impl Validate for AppendVersionRequest {
    fn validate(&self) -> Result<(), String> {
        if self.content.is_empty() {
            return Err("content must not be empty".to_string());
        }
        if self.title.trim().is_empty() {
            return Err("title must not be empty".to_string());
        }
        if self.title.len() > MAX_TITLE_LEN {
            return Err(format!("title must not exceed {MAX_TITLE_LEN} bytes"));
        }
        Ok(())
    }
}

/// Build the documents router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/v1/documents", post(create_document))
        .route("/v1/documents/:hash/versions", post(append_version))
        .route("/v1/documents/:hash/signatures", post(sign_current))
        .route("/v1/documents/:hash/history", get(history))
}

/// POST /v1/documents: Create a document and its root version.
async fn create_document(
    State(state): State<AppState>,
    caller: CallerIdentity,
    body: Result<Json<CreateDocumentRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<CreatedDocument>), AppError> {
    let req = extract_validated_json(body)?;
    let bytes = decode_content(&req.content, state.config.max_content_bytes)?;
    let signers = parse_signers(&req.signers)?;
    let upload = req.file_name.map(|file_name| UploadInfo {
        file_name,
        file_size: bytes.len() as u64,
        mime_type: req
            .mime_type
            .unwrap_or_else(|| "application/octet-stream".to_string()),
    });

    let created = state
        .service
        .create_document(
            &caller.user_id,
            &bytes,
            &req.title,
            signers,
            req.metadata,
            upload,
        )
        .await?;
    Ok((StatusCode::CREATED, Json(created)))
}

/// POST /v1/documents/:hash/versions: Append a version.
async fn append_version(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(hash): Path<String>,
    body: Result<Json<AppendVersionRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<AppendedVersion>), AppError> {
    let root = parse_hash(&hash)?;
    let req = extract_validated_json(body)?;
    let bytes = decode_content(&req.content, state.config.max_content_bytes)?;
    let expected = req
        .expected_current
        .as_deref()
        .map(parse_hash)
        .transpose()?;

    let appended = state
        .service
        .append_version(
            &caller.user_id,
            &root,
            &bytes,
            &req.title,
            req.metadata,
            expected.as_ref(),
        )
        .await?;
    Ok((StatusCode::CREATED, Json(appended)))
}

/// POST /v1/documents/:hash/signatures: Sign the current version.
async fn sign_current(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(hash): Path<String>,
    body: Result<Json<SignRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<SignatureResult>), AppError> {
    let root = parse_hash(&hash)?;
    let req = extract_validated_json(body)?;
    let claim = ClaimReference::new(req.claim_reference)?;
    let result = state
        .service
        .sign_current_version(&caller.user_id, &root, req.signature_data, claim)
        .await?;
    Ok((signature_status(&result), Json(result)))
}

/// GET /v1/documents/:hash/history: Versions and ledger records.
async fn history(
    State(state): State<AppState>,
    Path(hash): Path<String>,
) -> Result<Json<History>, AppError> {
    let root = parse_hash(&hash)?;
    Ok(Json(state.service.history(&root).await?))
}

/// 201 for a newly recorded signature, 200 for a repeat.
pub(crate) fn signature_status(result: &SignatureResult) -> StatusCode {
    if result.accepted {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    use http_body_util::BodyExt;
    use notary_core::{Timestamp, UserId};
    use notary_state::{ClaimStatus, IdentityClaim};
    use tower::ServiceExt;

    fn issue_claim(state: &AppState, user: &str) {
        state
            .claims
            .issue(IdentityClaim {
                reference: ClaimReference::new(format!("claim-{user}")).unwrap(),
                user_id: UserId::new(user).unwrap(),
                authority_id: "registry".into(),
                claim_type: "kyc".into(),
                claim_value: "verified".into(),
                signature: "sig".into(),
                expiration: Timestamp::now().plus_secs(3600),
                metadata: Metadata::new(),
                status: ClaimStatus::Valid,
                issued_at: Timestamp::now(),
            })
            .unwrap();
    }

    /// Router with the caller identity injected directly.
    fn test_app(state: AppState, user: &str) -> Router {
        router()
            .layer(axum::Extension(CallerIdentity::new(UserId::new(user).unwrap())))
            .with_state(state)
    }

    async fn body_json(resp: axum::response::Response) -> serde_json::Value {
        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn post_json(uri: &str, body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn create_returns_root_hash_and_anchor() {
        let state = AppState::new();
        issue_claim(&state, "alice");
        let app = test_app(state, "alice");

        let resp = app
            .oneshot(post_json(
                "/v1/documents",
                serde_json::json!({
                    "content": STANDARD.encode(b"contract v1"),
                    "title": "Lease",
                    "signers": ["alice", "bob"],
                    "file_name": "lease.pdf",
                }),
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::CREATED);
        let body = body_json(resp).await;
        assert_eq!(
            body["root_hash"],
            notary_core::content_hash(b"contract v1").to_hex()
        );
        assert_eq!(body["version"]["status"], "PENDING");
        assert_eq!(body["anchor"]["state"], "anchored");
    }

    #[tokio::test]
    async fn create_without_claim_is_forbidden() {
        let app = test_app(AppState::new(), "alice");
        let resp = app
            .oneshot(post_json(
                "/v1/documents",
                serde_json::json!({
                    "content": STANDARD.encode(b"x"),
                    "title": "T",
                    "signers": ["alice"],
                }),
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);
        let body = body_json(resp).await;
        assert_eq!(body["error"]["code"], "UNAUTHORIZED");
    }

    #[tokio::test]
    async fn create_with_empty_signers_is_unprocessable() {
        let state = AppState::new();
        issue_claim(&state, "alice");
        let resp = test_app(state, "alice")
            .oneshot(post_json(
                "/v1/documents",
                serde_json::json!({
                    "content": STANDARD.encode(b"x"),
                    "title": "T",
                    "signers": [],
                }),
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn malformed_json_is_bad_request() {
        let resp = test_app(AppState::new(), "alice")
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/v1/documents")
                    .header("content-type", "application/json")
                    .body(Body::from("{not json"))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn history_of_unknown_document_is_not_found() {
        let resp = test_app(AppState::new(), "alice")
            .oneshot(
                Request::builder()
                    .uri(format!("/v1/documents/{}/history", "00".repeat(32)))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn bad_hash_in_path_is_unprocessable() {
        let resp = test_app(AppState::new(), "alice")
            .oneshot(
                Request::builder()
                    .uri("/v1/documents/zzz/history")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }
}
