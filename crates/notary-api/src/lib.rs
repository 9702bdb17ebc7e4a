//! # notary-api — Axum API for the DocChain Notary
//!
//! HTTP surface over the version chain, the signature collector and the
//! ledger anchorer. Every mutation commits in memory first, is written
//! through to Postgres when configured, and is then anchored. Anchoring
//! failures never roll back a commit; they are journaled and repaired by
//! the background sweep or `POST /v1/anchors/retry`.
//!
//! ## API Surface
//!
//! | Prefix                 | Module                  | Domain                 |
//! |------------------------|-------------------------|------------------------|
//! | `/v1/documents/*`      | [`routes::documents`]   | Create, append, sign   |
//! | `/v1/versions/*`       | [`routes::versions`]    | Sign, reject, expire   |
//! | `/v1/claims/*`         | [`routes::claims`]      | Identity claims        |
//! | `/v1/users/*`          | [`routes::users`]       | Documents per user     |
//! | `/v1/anchors/*`        | [`routes::anchors`]     | Anchor repair          |
//! | `/health/*`            | this module             | Probes (no auth)       |
//!
//! ## Middleware Stack (execution order)
//!
//! ```text
//! TraceLayer → BodyLimit → AuthMiddleware → Handler
//! ```

pub mod auth;
pub mod db;
pub mod error;
pub mod extractors;
pub mod repository;
pub mod routes;
pub mod service;
pub mod state;

use axum::extract::DefaultBodyLimit;
use axum::middleware::from_fn;
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::auth::AuthConfig;
use crate::state::AppState;

/// Headroom for base64 expansion and the JSON envelope around content.
fn body_limit(max_content_bytes: usize) -> usize {
    max_content_bytes
        .saturating_mul(4)
        .div_ceil(3)
        .saturating_add(64 * 1024)
}

/// Assemble the full application router with all routes and middleware.
///
/// Health probes (`/health/*`) are mounted outside the auth middleware
/// so they remain accessible without credentials.
pub fn app(state: AppState) -> Router {
    let auth_config = AuthConfig {
        token: state.config.auth_token.clone(),
        authorities: state.config.authority_ids.clone(),
        operators: state.config.operator_ids.clone(),
    };
    let limit = body_limit(state.config.max_content_bytes);

    // Authenticated API routes.
    let api = Router::new()
        .merge(routes::documents::router())
        .merge(routes::versions::router())
        .merge(routes::claims::router())
        .merge(routes::users::router())
        .merge(routes::anchors::router())
        .layer(from_fn(auth::auth_middleware))
        .layer(DefaultBodyLimit::max(limit))
        .layer(TraceLayer::new_for_http())
        .layer(axum::Extension(auth_config))
        .with_state(state);

    // Unauthenticated health probes.
    let health = Router::new()
        .route("/health/liveness", axum::routing::get(liveness))
        .route("/health/readiness", axum::routing::get(readiness));

    Router::new().merge(health).merge(api)
}

/// Liveness probe.
async fn liveness() -> &'static str {
    "ok"
}

/// Readiness probe.
async fn readiness() -> &'static str {
    "ready"
}
