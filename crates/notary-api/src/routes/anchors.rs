//! # Anchor Repair Endpoints
//!
//! - `GET  /v1/anchors/pending`: events whose ledger anchor is missing.
//! - `POST /v1/anchors/retry`: resubmit them now.

use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use notary_anchor::JournalEntry;
use serde::Serialize;

use crate::service::RepairReport;
use crate::state::AppState;

/// Pending anchors with the ledger they target.
#[derive(Debug, Serialize)]
pub struct PendingAnchors {
    /// Ledger network.
    pub network: String,
    /// Journal entries not yet anchored, oldest first.
    pub pending: Vec<JournalEntry>,
}

/// Build the anchors router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/v1/anchors/pending", get(pending))
        .route("/v1/anchors/retry", post(retry))
}

/// GET /v1/anchors/pending: List unanchored events.
async fn pending(State(state): State<AppState>) -> Json<PendingAnchors> {
    Json(PendingAnchors {
        network: state.service.anchorer().network().to_string(),
        pending: state.service.pending_anchors(),
    })
}

/// POST /v1/anchors/retry: Resubmit every pending anchor.
async fn retry(State(state): State<AppState>) -> Json<RepairReport> {
    Json(state.service.retry_pending_anchors().await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    #[tokio::test]
    async fn empty_journal_has_nothing_pending() {
        let app = router().with_state(AppState::new());
        let resp = app
            .oneshot(
                Request::builder()
                    .uri("/v1/anchors/pending")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["network"], "local");
        assert_eq!(body["pending"].as_array().unwrap().len(), 0);
    }

    #[tokio::test]
    async fn retry_on_empty_journal_reports_zero() {
        let app = router().with_state(AppState::new());
        let resp = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/v1/anchors/retry")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        let report: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(report["attempted"], 0);
    }
}
