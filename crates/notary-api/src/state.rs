//! # Application State
//!
//! Configuration and the shared state passed to all route handlers via
//! the `State` extractor.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use notary_anchor::{Anchorer, InMemoryLedger, LedgerAnchor, RetryPolicy};
use notary_core::UserId;
use notary_state::{Document, IdentityClaimValidator, InMemoryClaimRegistry};
use sqlx::PgPool;
use thiserror::Error;

use crate::repository::InMemoryRepository;
use crate::service::NotaryService;

// -- Configuration ------------------------------------------------------------

/// A configuration value could not be used.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// The variable is set but does not parse.
    #[error("invalid value for {name}: {value:?} ({reason})")]
    Invalid {
        /// Variable name.
        name: &'static str,
        /// Raw value.
        value: String,
        /// Why it was rejected.
        reason: String,
    },
}

/// Application configuration.
///
/// Custom `Debug` redacts the `auth_token` and the database URL.
#[derive(Clone)]
pub struct AppConfig {
    /// Port to bind the HTTP server to.
    pub port: u16,
    /// Shared bearer secret. `None` means development mode.
    pub auth_token: Option<String>,
    /// Users who may record and revoke identity claims.
    pub authority_ids: BTreeSet<UserId>,
    /// Users who may drive deadline expiry.
    pub operator_ids: BTreeSet<UserId>,
    /// Name of the in-process ledger network.
    pub ledger_network: String,
    /// Ledger retries after the first attempt.
    pub anchor_max_retries: u32,
    /// Delay before the first retry, in milliseconds; doubles per retry.
    pub anchor_base_delay_ms: u64,
    /// Per-attempt ledger timeout, in seconds.
    pub anchor_timeout_secs: u64,
    /// Bound on the single anchor attempt made while a request waits, in
    /// milliseconds.
    pub anchor_inline_timeout_ms: u64,
    /// Interval between background anchor repair sweeps, in seconds.
    pub anchor_sweep_interval_secs: u64,
    /// Largest accepted decoded content, in bytes.
    pub max_content_bytes: usize,
    /// Postgres URL. `None` means in-memory only.
    pub database_url: Option<String>,
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("port", &self.port)
            .field("auth_token", &self.auth_token.as_ref().map(|_| "[REDACTED]"))
            .field("authority_ids", &self.authority_ids)
            .field("operator_ids", &self.operator_ids)
            .field("ledger_network", &self.ledger_network)
            .field("anchor_max_retries", &self.anchor_max_retries)
            .field("anchor_base_delay_ms", &self.anchor_base_delay_ms)
            .field("anchor_timeout_secs", &self.anchor_timeout_secs)
            .field("anchor_inline_timeout_ms", &self.anchor_inline_timeout_ms)
            .field("anchor_sweep_interval_secs", &self.anchor_sweep_interval_secs)
            .field("max_content_bytes", &self.max_content_bytes)
            .field("database_url", &self.database_url.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            auth_token: None,
            authority_ids: BTreeSet::new(),
            operator_ids: BTreeSet::new(),
            ledger_network: "local".to_string(),
            anchor_max_retries: 3,
            anchor_base_delay_ms: 200,
            anchor_timeout_secs: 30,
            anchor_inline_timeout_ms: 2000,
            anchor_sweep_interval_secs: 60,
            max_content_bytes: 10 * 1024 * 1024,
            database_url: None,
        }
    }
}

fn parsed<T>(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &'static str,
    default: T,
) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(name) {
        None => Ok(default),
        Some(value) => value.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
            name,
            reason: e.to_string(),
            value,
        }),
    }
}

fn user_list(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &'static str,
) -> Result<BTreeSet<UserId>, ConfigError> {
    let Some(raw) = lookup(name) else {
        return Ok(BTreeSet::new());
    };
    raw.split(',')
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(|id| {
            UserId::new(id).map_err(|e| ConfigError::Invalid {
                name,
                value: raw.clone(),
                reason: e.to_string(),
            })
        })
        .collect()
}

fn non_empty(lookup: &impl Fn(&str) -> Option<String>, name: &str) -> Option<String> {
    lookup(name).filter(|v| !v.trim().is_empty())
}

impl AppConfig {
    /// Read configuration from the process environment.
    ///
    /// # Errors
    ///
    /// [`ConfigError`] for a variable that is set but unusable.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Read configuration through `lookup`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let d = Self::default();
        let config = Self {
            port: parsed(&lookup, "PORT", d.port)?,
            auth_token: non_empty(&lookup, "AUTH_TOKEN"),
            authority_ids: user_list(&lookup, "AUTHORITY_IDS")?,
            operator_ids: user_list(&lookup, "OPERATOR_IDS")?,
            ledger_network: non_empty(&lookup, "LEDGER_NETWORK").unwrap_or(d.ledger_network),
            anchor_max_retries: parsed(&lookup, "ANCHOR_MAX_RETRIES", d.anchor_max_retries)?,
            anchor_base_delay_ms: parsed(&lookup, "ANCHOR_BASE_DELAY_MS", d.anchor_base_delay_ms)?,
            anchor_timeout_secs: parsed(&lookup, "ANCHOR_TIMEOUT_SECS", d.anchor_timeout_secs)?,
            anchor_inline_timeout_ms: parsed(
                &lookup,
                "ANCHOR_INLINE_TIMEOUT_MS",
                d.anchor_inline_timeout_ms,
            )?,
            anchor_sweep_interval_secs: parsed(
                &lookup,
                "ANCHOR_SWEEP_INTERVAL_SECS",
                d.anchor_sweep_interval_secs,
            )?,
            max_content_bytes: parsed(&lookup, "MAX_CONTENT_BYTES", d.max_content_bytes)?,
            database_url: non_empty(&lookup, "DATABASE_URL"),
        };
        for (name, value) in [
            ("ANCHOR_TIMEOUT_SECS", config.anchor_timeout_secs),
            ("ANCHOR_INLINE_TIMEOUT_MS", config.anchor_inline_timeout_ms),
            ("ANCHOR_SWEEP_INTERVAL_SECS", config.anchor_sweep_interval_secs),
        ] {
            if value == 0 {
                return Err(ConfigError::Invalid {
                    name,
                    value: "0".to_string(),
                    reason: "must be positive".to_string(),
                });
            }
        }
        Ok(config)
    }

    /// Ledger retry policy.
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.anchor_max_retries,
            base_delay: Duration::from_millis(self.anchor_base_delay_ms),
            timeout: Duration::from_secs(self.anchor_timeout_secs),
        }
    }

    /// Bound on the anchor attempt made inside a request.
    pub fn inline_anchor_timeout(&self) -> Duration {
        Duration::from_millis(self.anchor_inline_timeout_ms)
    }

    /// Interval between repair sweeps.
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.anchor_sweep_interval_secs)
    }
}

// -- Application State --------------------------------------------------------

/// Shared application state.
#[derive(Debug, Clone)]
pub struct AppState {
    /// The notary service.
    pub service: Arc<NotaryService>,
    /// Authoritative document store.
    pub repository: Arc<InMemoryRepository>,
    /// Identity claim registry.
    pub claims: Arc<InMemoryClaimRegistry>,
    /// Optional Postgres pool.
    pub db_pool: Option<PgPool>,
    /// Configuration.
    pub config: AppConfig,
}

impl AppState {
    /// In-memory state with default configuration and a local ledger.
    pub fn new() -> Self {
        let config = AppConfig::default();
        let ledger = Arc::new(InMemoryLedger::new(config.ledger_network.clone()));
        Self::with_ledger(config, ledger, None)
    }

    /// State over an explicit ledger and optional database pool.
    pub fn with_ledger(
        config: AppConfig,
        ledger: Arc<dyn LedgerAnchor>,
        db_pool: Option<PgPool>,
    ) -> Self {
        let repository = Arc::new(InMemoryRepository::new());
        let claims = Arc::new(InMemoryClaimRegistry::new());
        let anchorer = Arc::new(
            Anchorer::new(ledger, config.retry_policy())
                .with_inline_timeout(config.inline_anchor_timeout()),
        );
        let service = NotaryService::new(
            repository.clone(),
            IdentityClaimValidator::new(claims.clone()),
            anchorer,
        )
        .with_db(db_pool.clone());
        Self {
            service: Arc::new(service),
            repository,
            claims,
            db_pool,
            config,
        }
    }

    /// Load documents and claims from the database into memory and queue
    /// every unanchored event for the repair sweep.
    ///
    /// Called once on startup. A stored history that fails chain
    /// verification aborts startup.
    pub async fn hydrate_from_db(&self) -> Result<(), String> {
        let pool = match &self.db_pool {
            Some(pool) => pool,
            None => return Ok(()),
        };

        let claims = crate::db::claims::load_all(pool)
            .await
            .map_err(|e| format!("failed to load identity claims: {e}"))?;
        let claim_count = claims.len();
        for claim in claims {
            self.claims.restore(claim);
        }

        let records = crate::db::documents::load_all(pool)
            .await
            .map_err(|e| format!("failed to load documents: {e}"))?;
        let document_count = records.len();
        let mut queued = 0;
        for record in records {
            let root = record.root_hash;
            let document = Document::from_record(record)
                .map_err(|e| format!("stored document {root} is invalid: {e}"))?;
            queued += self.service.journal_unanchored(&document);
            self.repository.restore(document);
        }

        tracing::info!(
            documents = document_count,
            identity_claims = claim_count,
            unanchored = queued,
            "Hydrated in-memory stores from database"
        );
        Ok(())
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn defaults_apply_when_unset() {
        let config = AppConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.port, 8080);
        assert!(config.auth_token.is_none());
        assert_eq!(config.ledger_network, "local");
        assert_eq!(config.anchor_max_retries, 3);
        assert_eq!(config.max_content_bytes, 10 * 1024 * 1024);
        assert!(config.database_url.is_none());
        let policy = config.retry_policy();
        assert_eq!(policy.base_delay, Duration::from_millis(200));
        assert_eq!(policy.timeout, Duration::from_secs(30));
        assert_eq!(config.inline_anchor_timeout(), Duration::from_secs(2));
        assert!(config.authority_ids.is_empty());
        assert!(config.operator_ids.is_empty());
    }

    #[test]
    fn role_lists_are_comma_separated() {
        let config = AppConfig::from_lookup(lookup(&[
            ("AUTHORITY_IDS", "registry, kyc-desk ,"),
            ("OPERATOR_IDS", "scheduler"),
        ]))
        .unwrap();
        let authorities: Vec<&str> = config.authority_ids.iter().map(UserId::as_str).collect();
        assert_eq!(authorities, vec!["kyc-desk", "registry"]);
        assert!(config.operator_ids.contains(&UserId::new("scheduler").unwrap()));

        let err = AppConfig::from_lookup(lookup(&[("OPERATOR_IDS", "ok,has space")])).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { name: "OPERATOR_IDS", .. }));
    }

    #[test]
    fn values_are_read() {
        let config = AppConfig::from_lookup(lookup(&[
            ("PORT", "9000"),
            ("AUTH_TOKEN", "t0k"),
            ("LEDGER_NETWORK", "testnet"),
            ("ANCHOR_MAX_RETRIES", "5"),
            ("MAX_CONTENT_BYTES", "1024"),
            ("DATABASE_URL", "postgres://localhost/notary"),
        ]))
        .unwrap();
        assert_eq!(config.port, 9000);
        assert_eq!(config.auth_token.as_deref(), Some("t0k"));
        assert_eq!(config.ledger_network, "testnet");
        assert_eq!(config.anchor_max_retries, 5);
        assert_eq!(config.max_content_bytes, 1024);
        assert!(config.database_url.is_some());
    }

    #[test]
    fn bad_values_are_errors() {
        let err = AppConfig::from_lookup(lookup(&[("PORT", "eighty")])).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { name: "PORT", .. }));
        let err = AppConfig::from_lookup(lookup(&[("ANCHOR_TIMEOUT_SECS", "0")])).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Invalid {
                name: "ANCHOR_TIMEOUT_SECS",
                ..
            }
        ));
    }

    #[test]
    fn blank_token_means_development_mode() {
        let config = AppConfig::from_lookup(lookup(&[("AUTH_TOKEN", "  ")])).unwrap();
        assert!(config.auth_token.is_none());
    }

    #[test]
    fn debug_redacts_secrets() {
        let config = AppConfig {
            auth_token: Some("super-secret".into()),
            database_url: Some("postgres://user:pw@host/db".into()),
            ..AppConfig::default()
        };
        let dbg = format!("{config:?}");
        assert!(!dbg.contains("super-secret"));
        assert!(!dbg.contains("pw@host"));
    }

    #[tokio::test]
    async fn hydrate_without_database_is_noop() {
        let state = AppState::new();
        state.hydrate_from_db().await.unwrap();
        assert!(state.repository.is_empty());
    }
}
