//! # notary-cli — CLI Tool for the DocChain Notary
//!
//! Offline companions to the API:
//!
//! - `notary hash`: content hash of a file, optionally located in an
//!   exported history.
//! - `notary verify-history`: re-check an exported history's chain
//!   linkage, signature sets, status log and anchor references.
//!
//! ```bash
//! notary hash contract.pdf
//! notary hash contract.pdf --history history.json
//! notary verify-history history.json
//! ```
//!
//! Subcommands return a process exit code: `0` on success, `2` when the
//! input is well-formed but fails verification. I/O and parse failures
//! surface as errors and exit `1`.

pub mod hash;
pub mod history;

/// Exit code for a check that ran and failed.
pub const EXIT_INVALID: u8 = 2;
