//! # Caller Authentication
//!
//! Bearer token middleware that establishes who is calling.
//!
//! ## Token Format
//!
//! ```text
//! Bearer {user_id}:{secret}    AUTH_TOKEN configured
//! Bearer {user_id}             development mode (no AUTH_TOKEN)
//! ```
//!
//! The secret is compared in constant time. The resulting [`CallerIdentity`]
//! is injected into request extensions; handlers extract it via its
//! `FromRequestParts` impl.
//!
//! ## Roles
//!
//! Document participation (who may sign, append, reject) is decided by the
//! domain. Two duties sit outside any document and are granted by
//! configuration instead:
//!
//! | Role                      | Granted by       | Allows                          |
//! |---------------------------|------------------|---------------------------------|
//! | [`Role::ClaimAuthority`]  | `AUTHORITY_IDS`  | Recording and revoking claims   |
//! | [`Role::Operator`]        | `OPERATOR_IDS`   | Expiring versions on deadline   |

use std::collections::BTreeSet;

use axum::extract::Request;
use axum::http::request::Parts;
use axum::http::{header, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;
use notary_core::{NotaryError, UserId};
use subtle::ConstantTimeEq;

use crate::error::{AppError, ErrorBody, ErrorDetail};

// ─── Caller ──────────────────────────────────────────────────────────

/// A duty granted by configuration rather than by document membership.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Role {
    /// Records and revokes identity claims for other users.
    ClaimAuthority,
    /// Closes pending versions whose deadline has passed.
    Operator,
}

impl Role {
    /// Stable string form.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ClaimAuthority => "claim_authority",
            Self::Operator => "operator",
        }
    }
}

/// The authenticated caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallerIdentity {
    /// Who is calling.
    pub user_id: UserId,
    /// Configured duties.
    pub roles: BTreeSet<Role>,
}

impl CallerIdentity {
    /// A caller with no configured duties.
    pub fn new(user_id: UserId) -> Self {
        Self {
            user_id,
            roles: BTreeSet::new(),
        }
    }

    /// Grant `role`.
    pub fn with_role(mut self, role: Role) -> Self {
        self.roles.insert(role);
        self
    }

    pub fn has_role(&self, role: Role) -> bool {
        self.roles.contains(&role)
    }
}

/// 403 unless the caller holds `role`.
pub fn require_role(caller: &CallerIdentity, role: Role) -> Result<(), AppError> {
    if caller.has_role(role) {
        return Ok(());
    }
    Err(NotaryError::Unauthorized(format!(
        "{} does not hold role '{}'",
        caller.user_id,
        role.as_str()
    ))
    .into())
}

/// Pulls the caller out of request extensions; 401 when the middleware
/// did not run or found no identity.
#[axum::async_trait]
impl<S: Send + Sync> axum::extract::FromRequestParts<S> for CallerIdentity {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<CallerIdentity>()
            .cloned()
            .ok_or_else(|| AppError::Unauthenticated("no caller identity in request context".into()))
    }
}

// ─── Configuration ───────────────────────────────────────────────────

/// Shared secret and role grants, placed in request extensions for the
/// middleware.
///
/// Custom `Debug` redacts the token value.
#[derive(Clone, Default)]
pub struct AuthConfig {
    pub token: Option<String>,
    pub authorities: BTreeSet<UserId>,
    pub operators: BTreeSet<UserId>,
}

impl AuthConfig {
    /// Roles configured for `user`.
    pub fn roles_of(&self, user: &UserId) -> BTreeSet<Role> {
        let mut roles = BTreeSet::new();
        if self.authorities.contains(user) {
            roles.insert(Role::ClaimAuthority);
        }
        if self.operators.contains(user) {
            roles.insert(Role::Operator);
        }
        roles
    }
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("token", &self.token.as_ref().map(|_| "[REDACTED]"))
            .field("authorities", &self.authorities)
            .field("operators", &self.operators)
            .finish()
    }
}

// ─── Tokens ──────────────────────────────────────────────────────────

/// Constant-time comparison of bearer secrets.
fn constant_time_token_eq(provided: &str, expected: &str) -> bool {
    let provided = provided.as_bytes();
    let expected = expected.as_bytes();
    if provided.len() != expected.len() {
        let _ = expected.ct_eq(expected);
        return false;
    }
    provided.ct_eq(expected).into()
}

/// Parse a bearer token into a caller identity with no roles.
///
/// With `expected_secret`, the token must be `{user_id}:{secret}`. Without
/// one, the whole token is the user id.
pub fn parse_bearer_token(
    provided: &str,
    expected_secret: Option<&str>,
) -> Result<CallerIdentity, String> {
    let user = match expected_secret {
        Some(expected) => {
            let (user, secret) = provided
                .split_once(':')
                .ok_or_else(|| "invalid token format, expected {user_id}:{secret}".to_string())?;
            if !constant_time_token_eq(secret, expected) {
                return Err("secret does not match".into());
            }
            user
        }
        None => provided,
    };
    let user_id = UserId::new(user).map_err(|e| format!("invalid user id: {e}"))?;
    Ok(CallerIdentity::new(user_id))
}

// ─── Middleware ──────────────────────────────────────────────────────

/// Validate the `Authorization` header and inject [`CallerIdentity`].
pub async fn auth_middleware(mut request: Request, next: Next) -> Response {
    let config = request
        .extensions()
        .get::<AuthConfig>()
        .cloned()
        .unwrap_or_default();

    let auth_header = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok());

    match auth_header {
        Some(header_value) if header_value.starts_with("Bearer ") => {
            let provided = &header_value["Bearer ".len()..];
            match parse_bearer_token(provided, config.token.as_deref()) {
                Ok(mut identity) => {
                    identity.roles = config.roles_of(&identity.user_id);
                    request.extensions_mut().insert(identity);
                    next.run(request).await
                }
                Err(msg) => {
                    tracing::warn!(reason = %msg, "rejected caller token");
                    reject_unauthenticated(&msg)
                }
            }
        }
        Some(_) => {
            tracing::warn!("rejected non-bearer authorization");
            reject_unauthenticated("authorization header must use Bearer scheme")
        }
        None => {
            tracing::warn!("request without authorization header");
            reject_unauthenticated("missing authorization header")
        }
    }
}

fn reject_unauthenticated(message: &str) -> Response {
    let body = ErrorBody {
        error: ErrorDetail {
            code: "UNAUTHENTICATED".to_string(),
            message: message.to_string(),
        },
    };
    (StatusCode::UNAUTHORIZED, Json(body)).into_response()
}
