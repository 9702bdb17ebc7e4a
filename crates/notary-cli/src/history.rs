//! # Verify History — Offline check of an exported document history.
//!
//! Accepts the body of `GET /v1/documents/:hash/history` (`{ "document",
//! "ledger" }`) or a bare document record. Checks, in order:
//!
//! 1. chain linkage, signer sets and signature/status agreement;
//! 2. the status log: at most one transition, out of `PENDING`, matching
//!    the final status;
//! 3. every anchor reference carries the document's ledger label and, when
//!    ledger records are included, appears among them.
//!
//! All findings are reported, not just the first.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Args;
use notary_anchor::{document_label, AnchorRef};
use notary_state::{verify_versions, DocumentRecord, Version, VersionStatus};
use serde::Deserialize;

use crate::EXIT_INVALID;

/// Arguments for `notary verify-history`.
#[derive(Args, Debug)]
pub struct VerifyHistoryArgs {
    /// History JSON file.
    pub file: PathBuf,
}

/// A history export.
#[derive(Debug, Clone, Deserialize)]
pub struct HistoryExport {
    /// The document with every version.
    pub document: DocumentRecord,
    /// Ledger records for the document. Empty when not exported.
    #[serde(default)]
    pub ledger: Vec<AnchorRef>,
}

/// Load a history export from `path`.
pub fn load_history(path: &Path) -> Result<HistoryExport> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    parse_history(&text).with_context(|| format!("failed to parse {}", path.display()))
}

/// Parse a history export, or a bare document record.
pub fn parse_history(text: &str) -> Result<HistoryExport> {
    let value: serde_json::Value = serde_json::from_str(text).context("invalid JSON")?;
    if value.get("document").is_some() {
        Ok(serde_json::from_value(value).context("not a history export")?)
    } else {
        let document: DocumentRecord =
            serde_json::from_value(value).context("not a document record")?;
        Ok(HistoryExport {
            document,
            ledger: Vec::new(),
        })
    }
}

/// Outcome of verifying one export.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VerifyReport {
    /// Versions examined.
    pub versions: usize,
    /// Anchor references examined.
    pub anchors: usize,
    /// Everything wrong, in discovery order.
    pub problems: Vec<String>,
}

impl VerifyReport {
    /// Whether nothing was wrong.
    pub fn is_valid(&self) -> bool {
        self.problems.is_empty()
    }
}

/// Run every check against `export`.
pub fn verify(export: &HistoryExport) -> VerifyReport {
    let doc = &export.document;
    let mut report = VerifyReport {
        versions: doc.versions.len(),
        ..VerifyReport::default()
    };

    if let Err(violation) = verify_versions(
        &doc.root_hash,
        &doc.current_version,
        &doc.signers,
        &doc.versions,
    ) {
        report.problems.push(violation.to_string());
    }

    for version in &doc.versions {
        check_status_log(version, &mut report.problems);
    }

    let label = document_label(&doc.root_hash);
    let ledger_ids: HashSet<&str> = export
        .ledger
        .iter()
        .map(|a| a.transaction_id.as_str())
        .collect();
    for (what, anchor) in anchor_refs(&doc.versions) {
        report.anchors += 1;
        if anchor.label != label {
            report.problems.push(format!(
                "{what} is anchored under {:?}, expected {label:?}",
                anchor.label
            ));
        }
        if !export.ledger.is_empty() && !ledger_ids.contains(anchor.transaction_id.as_str()) {
            report.problems.push(format!(
                "{what} cites transaction {} which the ledger records do not contain",
                anchor.transaction_id
            ));
        }
    }
    report
}

fn check_status_log(version: &Version, problems: &mut Vec<String>) {
    let short = version.hash.short();
    match version.transitions.as_slice() {
        [] if version.status == VersionStatus::Pending => {}
        [] => problems.push(format!(
            "version {short} is {} without a recorded transition",
            version.status
        )),
        [only] => {
            if only.from != VersionStatus::Pending || !only.to.is_terminal() {
                problems.push(format!(
                    "version {short} records transition {} -> {}",
                    only.from, only.to
                ));
            }
            if only.to != version.status {
                problems.push(format!(
                    "version {short} is {} but its transition ends in {}",
                    version.status, only.to
                ));
            }
        }
        many => problems.push(format!(
            "version {short} records {} transitions",
            many.len()
        )),
    }
}

fn anchor_refs(versions: &[Version]) -> Vec<(String, &AnchorRef)> {
    let mut out = Vec::new();
    for version in versions {
        let short = version.hash.short();
        if let Some(a) = &version.anchor_ref {
            out.push((format!("version {short}"), a));
        }
        for sig in &version.signatures {
            if let Some(a) = &sig.anchor_ref {
                out.push((format!("signature by {} on {short}", sig.signer_id), a));
            }
        }
        for t in &version.transitions {
            if let Some(a) = &t.anchor_ref {
                out.push((format!("transition to {} on {short}", t.to), a));
            }
        }
    }
    out
}

/// Execute `notary verify-history`.
pub fn run_verify_history(args: &VerifyHistoryArgs) -> Result<u8> {
    let export = load_history(&args.file)?;
    let report = verify(&export);
    let root = export.document.root_hash;

    if report.is_valid() {
        println!(
            "OK  document {} ({} versions, {} anchors checked)",
            root.to_hex(),
            report.versions,
            report.anchors
        );
        return Ok(0);
    }

    tracing::warn!(document = %root, problems = report.problems.len(), "history failed verification");
    println!("INVALID  document {}", root.to_hex());
    for problem in &report.problems {
        println!("  - {problem}");
    }
    Ok(EXIT_INVALID)
}
