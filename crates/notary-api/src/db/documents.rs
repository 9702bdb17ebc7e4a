//! Document, version and signature persistence.
//!
//! All functions take a `&PgPool`. Chain and approval rules are enforced by
//! the in-memory repository before anything is written here; stored
//! histories are re-verified by `Document::from_record` when loaded.
//!
//! Writes from concurrent requests reach Postgres in no particular order,
//! so no write replays a whole version snapshot. Signatures are inserted
//! row by row, and status moves out of `PENDING` exactly once through a
//! guarded update that a late, staler write cannot undo.

use std::collections::{BTreeSet, HashMap};

use chrono::{DateTime, Utc};
use notary_anchor::{AnchorCommitment, AnchorKind, AnchorRef};
use notary_core::{ClaimReference, ContentDigest, Timestamp, UserId};
use notary_state::{
    DocumentRecord, Metadata, Signature, StatusTransitionRecord, UploadInfo, Version,
    VersionStatus,
};
use sqlx::PgPool;

use super::{digest_column, from_json, to_json, ts, user_column};

fn position(index: usize) -> Result<i32, sqlx::Error> {
    i32::try_from(index).map_err(|e| sqlx::Error::Encode(Box::new(e)))
}

async fn insert_version_row(
    conn: &mut sqlx::PgConnection,
    root: &ContentDigest,
    index: usize,
    version: &Version,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO versions (hash, document_root, position, parent_hash, title, metadata,
                               creator_id, created_at, required_signers, status, transitions, anchor_ref)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)",
    )
    .bind(version.hash.to_hex())
    .bind(root.to_hex())
    .bind(position(index)?)
    .bind(version.parent_hash.map(|p| p.to_hex()))
    .bind(&version.title)
    .bind(to_json(&version.metadata, "metadata")?)
    .bind(version.creator_id.as_str())
    .bind(ts(version.created_at))
    .bind(to_json(&version.required_signers, "required_signers")?)
    .bind(version.status.as_str())
    .bind(to_json(&version.transitions, "transitions")?)
    .bind(version.anchor_ref.as_ref().map(|a| to_json(a, "anchor_ref")).transpose()?)
    .execute(conn)
    .await?;
    Ok(())
}

/// Insert a new document with its root version.
pub async fn insert_document(pool: &PgPool, record: &DocumentRecord) -> Result<(), sqlx::Error> {
    let upload = record.upload.as_ref();
    let file_size = upload
        .map(|u| i64::try_from(u.file_size))
        .transpose()
        .map_err(|e| sqlx::Error::Encode(Box::new(e)))?;

    let mut tx = pool.begin().await?;
    sqlx::query(
        "INSERT INTO documents (root_hash, title, signers, creator_id, created_at,
                                file_name, file_size, mime_type, current_version)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
    )
    .bind(record.root_hash.to_hex())
    .bind(&record.title)
    .bind(to_json(&record.signers, "signers")?)
    .bind(record.creator_id.as_str())
    .bind(ts(record.created_at))
    .bind(upload.map(|u| u.file_name.clone()))
    .bind(file_size)
    .bind(upload.map(|u| u.mime_type.clone()))
    .bind(record.current_version.to_hex())
    .execute(&mut *tx)
    .await?;

    for (index, version) in record.versions.iter().enumerate() {
        insert_version_row(&mut *tx, &record.root_hash, index, version).await?;
    }
    tx.commit().await?;
    Ok(())
}

/// Append a version at `index` and move the document's current pointer.
pub async fn insert_version(
    pool: &PgPool,
    root: &ContentDigest,
    index: usize,
    version: &Version,
) -> Result<(), sqlx::Error> {
    let mut tx = pool.begin().await?;
    insert_version_row(&mut *tx, root, index, version).await?;
    sqlx::query("UPDATE documents SET current_version = $1 WHERE root_hash = $2")
        .bind(version.hash.to_hex())
        .bind(root.to_hex())
        .execute(&mut *tx)
        .await?;
    tx.commit().await?;
    Ok(())
}

/// Moves a version out of `PENDING`. Matches nothing once the status has
/// been written, so only the first terminal write lands.
const FINALIZE_STATUS: &str =
    "UPDATE versions SET status = $1, transitions = $2 WHERE hash = $3 AND status = 'PENDING'";

/// Stores transition anchors. Waits for the status write it belongs to.
const SAVE_TRANSITIONS: &str =
    "UPDATE versions SET transitions = $1 WHERE hash = $2 AND status = $3";

/// Insert the signature at `index` of `version`. With `finalized`, the
/// signature completed the version and its terminal status is written in
/// the same transaction.
pub async fn insert_signature(
    pool: &PgPool,
    version: &Version,
    index: usize,
    finalized: bool,
) -> Result<(), sqlx::Error> {
    let Some(sig) = version.signatures.get(index) else {
        return Err(sqlx::Error::Protocol(format!(
            "version {} has no signature at {index}",
            version.hash
        )));
    };
    let mut tx = pool.begin().await?;
    sqlx::query(
        "INSERT INTO signatures (version_hash, signer_id, position, signed_at,
                                 signature_data, claim_reference, anchor_ref)
         VALUES ($1, $2, $3, $4, $5, $6, $7)
         ON CONFLICT (version_hash, signer_id) DO NOTHING",
    )
    .bind(version.hash.to_hex())
    .bind(sig.signer_id.as_str())
    .bind(position(index)?)
    .bind(ts(sig.timestamp))
    .bind(&sig.signature_data)
    .bind(sig.claim_reference.as_str())
    .bind(sig.anchor_ref.as_ref().map(|a| to_json(a, "anchor_ref")).transpose()?)
    .execute(&mut *tx)
    .await?;
    if finalized {
        finalize_status_in(&mut *tx, version).await?;
    }
    tx.commit().await?;
    Ok(())
}

async fn finalize_status_in(
    conn: &mut sqlx::PgConnection,
    version: &Version,
) -> Result<bool, sqlx::Error> {
    if !version.status.is_terminal() {
        return Ok(false);
    }
    let result = sqlx::query(FINALIZE_STATUS)
        .bind(version.status.as_str())
        .bind(to_json(&version.transitions, "transitions")?)
        .bind(version.hash.to_hex())
        .execute(conn)
        .await?;
    if result.rows_affected() == 0 {
        tracing::warn!(version = %version.hash, status = %version.status, "stored version already left PENDING");
    }
    Ok(result.rows_affected() > 0)
}

/// Persist a version's move to a terminal status. Returns `false` when the
/// stored version had already left `PENDING` or `version` has not.
pub async fn finalize_status(pool: &PgPool, version: &Version) -> Result<bool, sqlx::Error> {
    let mut conn = pool.acquire().await?;
    finalize_status_in(&mut *conn, version).await
}

/// Persist the ledger reference for `commitment`, read from `version`.
/// Stored references are never overwritten.
pub async fn save_anchor(
    pool: &PgPool,
    commitment: &AnchorCommitment,
    version: &Version,
) -> Result<bool, sqlx::Error> {
    let result = match (commitment.kind, &commitment.signer) {
        (AnchorKind::DocumentCreated | AnchorKind::VersionAppended, _) => {
            let Some(anchor) = &version.anchor_ref else {
                return Ok(false);
            };
            sqlx::query(
                "UPDATE versions SET anchor_ref = $1 WHERE hash = $2 AND anchor_ref IS NULL",
            )
            .bind(to_json(anchor, "anchor_ref")?)
            .bind(version.hash.to_hex())
            .execute(pool)
            .await?
        }
        (AnchorKind::SignatureAccepted, Some(signer)) => {
            let Some(anchor) = version.signature_of(signer).and_then(|s| s.anchor_ref.as_ref())
            else {
                return Ok(false);
            };
            sqlx::query(
                "UPDATE signatures SET anchor_ref = $1
                 WHERE version_hash = $2 AND signer_id = $3 AND anchor_ref IS NULL",
            )
            .bind(to_json(anchor, "anchor_ref")?)
            .bind(version.hash.to_hex())
            .bind(signer.as_str())
            .execute(pool)
            .await?
        }
        (AnchorKind::SignatureAccepted, None) => return Ok(false),
        _ => {
            sqlx::query(SAVE_TRANSITIONS)
                .bind(to_json(&version.transitions, "transitions")?)
                .bind(version.hash.to_hex())
                .bind(version.status.as_str())
                .execute(pool)
                .await?
        }
    };
    Ok(result.rows_affected() > 0)
}

/// Load every stored document, versions in chain order.
pub async fn load_all(pool: &PgPool) -> Result<Vec<DocumentRecord>, sqlx::Error> {
    let documents = sqlx::query_as::<_, DocumentRow>(
        "SELECT root_hash, title, signers, creator_id, created_at,
                file_name, file_size, mime_type, current_version
         FROM documents ORDER BY created_at",
    )
    .fetch_all(pool)
    .await?;

    let versions = sqlx::query_as::<_, VersionRow>(
        "SELECT hash, document_root, parent_hash, title, metadata, creator_id, created_at,
                required_signers, status, transitions, anchor_ref
         FROM versions ORDER BY document_root, position",
    )
    .fetch_all(pool)
    .await?;

    let signatures = sqlx::query_as::<_, SignatureRow>(
        "SELECT version_hash, signer_id, signed_at, signature_data, claim_reference, anchor_ref
         FROM signatures ORDER BY version_hash, position",
    )
    .fetch_all(pool)
    .await?;

    let mut sigs_by_version: HashMap<String, Vec<Signature>> = HashMap::new();
    for row in signatures {
        let key = row.version_hash.clone();
        sigs_by_version.entry(key).or_default().push(row.into_signature()?);
    }

    let mut versions_by_doc: HashMap<String, Vec<Version>> = HashMap::new();
    for row in versions {
        let sigs = sigs_by_version.remove(&row.hash).unwrap_or_default();
        let key = row.document_root.clone();
        versions_by_doc
            .entry(key)
            .or_default()
            .push(row.into_version(sigs)?);
    }

    documents
        .into_iter()
        .map(|row| {
            let versions = versions_by_doc.remove(&row.root_hash).unwrap_or_default();
            row.into_record(versions)
        })
        .collect()
}

// ─── Rows ────────────────────────────────────────────────────────────

#[derive(sqlx::FromRow)]
struct DocumentRow {
    root_hash: String,
    title: String,
    signers: serde_json::Value,
    creator_id: String,
    created_at: DateTime<Utc>,
    file_name: Option<String>,
    file_size: Option<i64>,
    mime_type: Option<String>,
    current_version: String,
}

impl DocumentRow {
    fn into_record(self, versions: Vec<Version>) -> Result<DocumentRecord, sqlx::Error> {
        let upload = match (self.file_name, self.file_size, self.mime_type) {
            (Some(file_name), Some(size), Some(mime_type)) => Some(UploadInfo {
                file_name,
                file_size: u64::try_from(size)
                    .map_err(|e| sqlx::Error::Protocol(format!("invalid file_size: {e}")))?,
                mime_type,
            }),
            _ => None,
        };
        Ok(DocumentRecord {
            root_hash: digest_column(&self.root_hash, "root_hash")?,
            title: self.title,
            signers: from_json::<BTreeSet<UserId>>(self.signers, "signers")?,
            creator_id: user_column(self.creator_id, "creator_id")?,
            created_at: Timestamp::from_utc(self.created_at),
            upload,
            versions,
            current_version: digest_column(&self.current_version, "current_version")?,
        })
    }
}

#[derive(sqlx::FromRow)]
struct VersionRow {
    hash: String,
    document_root: String,
    parent_hash: Option<String>,
    title: String,
    metadata: serde_json::Value,
    creator_id: String,
    created_at: DateTime<Utc>,
    required_signers: serde_json::Value,
    status: String,
    transitions: serde_json::Value,
    anchor_ref: Option<serde_json::Value>,
}

impl VersionRow {
    fn into_version(self, signatures: Vec<Signature>) -> Result<Version, sqlx::Error> {
        let status = VersionStatus::parse(&self.status).ok_or_else(|| {
            sqlx::Error::Protocol(format!(
                "unknown version status {:?} for {}",
                self.status, self.hash
            ))
        })?;
        Ok(Version {
            hash: digest_column(&self.hash, "hash")?,
            parent_hash: self
                .parent_hash
                .as_deref()
                .map(|p| digest_column(p, "parent_hash"))
                .transpose()?,
            title: self.title,
            metadata: from_json::<Metadata>(self.metadata, "metadata")?,
            creator_id: user_column(self.creator_id, "creator_id")?,
            created_at: Timestamp::from_utc(self.created_at),
            required_signers: from_json(self.required_signers, "required_signers")?,
            signatures,
            status,
            transitions: from_json::<Vec<StatusTransitionRecord>>(
                self.transitions,
                "transitions",
            )?,
            anchor_ref: self
                .anchor_ref
                .map(|a| from_json::<AnchorRef>(a, "anchor_ref"))
                .transpose()?,
        })
    }
}

#[derive(sqlx::FromRow)]
struct SignatureRow {
    version_hash: String,
    signer_id: String,
    signed_at: DateTime<Utc>,
    signature_data: String,
    claim_reference: String,
    anchor_ref: Option<serde_json::Value>,
}

impl SignatureRow {
    fn into_signature(self) -> Result<Signature, sqlx::Error> {
        Ok(Signature {
            signer_id: user_column(self.signer_id, "signer_id")?,
            timestamp: Timestamp::from_utc(self.signed_at),
            signature_data: self.signature_data,
            claim_reference: ClaimReference::new(self.claim_reference)
                .map_err(|e| sqlx::Error::Protocol(format!("invalid claim_reference: {e}")))?,
            anchor_ref: self
                .anchor_ref
                .map(|a| from_json::<AnchorRef>(a, "anchor_ref"))
                .transpose()?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_leaves_pending_at_most_once() {
        assert!(FINALIZE_STATUS.ends_with("AND status = 'PENDING'"));
        assert!(FINALIZE_STATUS.starts_with("UPDATE versions SET status"));
    }

    #[test]
    fn transition_anchors_match_the_stored_status() {
        assert!(SAVE_TRANSITIONS.ends_with("AND status = $3"));
        assert!(!SAVE_TRANSITIONS.contains("SET status"));
    }
}
