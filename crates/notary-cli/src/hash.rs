//! # Hash — Content hash of a file.
//!
//! Prints the SHA-256 hex digest the notary would assign to the file's
//! bytes. With `--history`, also reports which version of the exported
//! document those bytes are.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Args;
use notary_core::{content_hash, ContentDigest};

use crate::history::load_history;
use crate::EXIT_INVALID;

/// Arguments for `notary hash`.
#[derive(Args, Debug)]
pub struct HashArgs {
    /// File to hash.
    pub file: PathBuf,

    /// Exported history to look the hash up in.
    #[arg(long)]
    pub history: Option<PathBuf>,
}

/// Hash the bytes of `path`.
pub fn hash_file(path: &Path) -> Result<ContentDigest> {
    let bytes =
        std::fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
    tracing::debug!(file = %path.display(), bytes = bytes.len(), "hashing file");
    Ok(content_hash(&bytes))
}

/// Execute `notary hash`.
pub fn run_hash(args: &HashArgs) -> Result<u8> {
    let digest = hash_file(&args.file)?;
    println!("{}  {}", digest.to_hex(), args.file.display());

    let Some(history_path) = &args.history else {
        return Ok(0);
    };
    let export = load_history(history_path)?;
    let document = &export.document;
    match document.versions.iter().position(|v| v.hash == digest) {
        Some(index) => {
            let version = &document.versions[index];
            println!(
                "version {} of {} in document {} ({}, {}/{} signatures)",
                index + 1,
                document.versions.len(),
                document.root_hash.short(),
                version.status,
                version.signatures.len(),
                version.required_signers.len(),
            );
            Ok(0)
        }
        None => {
            println!(
                "not a version of document {}",
                document.root_hash.short()
            );
            Ok(EXIT_INVALID)
        }
    }
}
