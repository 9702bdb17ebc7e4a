//! # User Endpoints
//!
//! - `GET /v1/users/:user_id/documents`: documents the user created or
//!   must sign. Readable by the user and by operators.

use axum::extract::{Path, State};
use axum::routing::get;
use axum::{Json, Router};
use notary_core::{NotaryError, UserId};
use serde::Serialize;

use crate::auth::{CallerIdentity, Role};
use crate::error::AppError;
use crate::service::DocumentSummary;
use crate::state::AppState;

/// A user's documents.
#[derive(Debug, Serialize)]
pub struct UserDocuments {
    pub user_id: UserId,
    pub documents: Vec<DocumentSummary>,
}

/// Build the users router.
pub fn router() -> Router<AppState> {
    Router::new().route("/v1/users/:user_id/documents", get(list_documents))
}

/// GET /v1/users/:user_id/documents: Documents a user is part of.
async fn list_documents(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(user_id): Path<String>,
) -> Result<Json<UserDocuments>, AppError> {
    let user_id = UserId::new(user_id)?;
    if caller.user_id != user_id && !caller.has_role(Role::Operator) {
        return Err(NotaryError::Unauthorized(format!(
            "{} may not list documents of {user_id}",
            caller.user_id
        ))
        .into());
    }
    let documents = state.service.documents_for_user(&user_id);
    Ok(Json(UserDocuments {
        user_id,
        documents,
    }))
}
