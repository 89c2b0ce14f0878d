//! Error types for the fda-label-harvest library.
//!
//! Two tiers reflect two distinct failure scopes:
//!
//! * [`HarvestError`]: **Fatal** to the current command: the harvester cannot
//!   be built or the crawl plan is malformed. Returned from constructors and
//!   [`crate::schedule::run_crawl`] before any network traffic happens.
//!
//! * [`AttemptError`]: **Non-fatal**: one code × category attempt did not
//!   yield an artifact. The scheduler logs it and moves on to the next
//!   category or code; nothing in this tier aborts a run.
//!
//! [`ParseServiceError`] and [`StoreError`] are raised by the pluggable
//! backends and folded into an [`AttemptError`] by the harvester.

use std::path::PathBuf;
use thiserror::Error;

/// Fatal errors returned by the fda-label-harvest library.
#[derive(Debug, Error)]
pub enum HarvestError {
    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder or crawl-plan validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// The parsing-service credential pool is empty.
    #[error("No parsing-service credentials configured.\nSet LLAMA_CLOUD_API_KEYS to a comma-separated list of keys.")]
    NoCredentials,

    /// A pinned credential index is outside the pool.
    #[error("Credential index {index} is out of range (pool has {size} keys)")]
    CredentialOutOfRange { index: usize, size: usize },

    // ── Backend setup errors ──────────────────────────────────────────────
    /// The HTTP client could not be constructed.
    #[error("Failed to build HTTP client: {0}")]
    HttpClient(String),

    /// Could not bind to a pdfium library.
    #[error(
        "Failed to bind to pdfium library: {0}\n\
Set PDFIUM_LIB_PATH=/path/to/libpdfium or place the platform library next to the binary."
    )]
    PdfiumBindingFailed(String),

    /// Could not create the archive root directory.
    #[error("Failed to prepare output directory '{path}': {source}")]
    OutputDirFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A non-fatal failure of one code × category attempt.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AttemptError {
    /// The source redirected to its generic landing page.
    #[error("{label}: no record at this code/category")]
    RecordNotFound { label: String },

    /// The record exists but its licence has been revoked.
    #[error("{label}: record is cancelled ({status})")]
    RecordCancelled { label: String, status: String },

    /// The record exists but exposes no downloadable document.
    #[error("{label}: no document rendition found")]
    NoRenditionFound { label: String },

    /// A rendition could not be downloaded (non-200 or network error).
    #[error("Rendition download failed for '{url}': {reason}")]
    DownloadFailure { url: String, reason: String },

    /// Every rendition was image-only, unreadable, or failed to download.
    #[error("{label}: none of {candidates} renditions contain extractable text")]
    NoTextRenditionFound { label: String, candidates: usize },

    /// The parsing service could not convert the winning rendition.
    #[error("{label}: parsing failed after {attempts} attempts: {detail}")]
    ParseFailure {
        label: String,
        attempts: u32,
        detail: String,
    },

    /// The metadata page itself could not be fetched.
    #[error("Failed to fetch '{url}': {reason}")]
    PageFetchFailed { url: String, reason: String },

    /// The artifact could not be written or renamed.
    #[error("{label}: failed to store artifact: {detail}")]
    StoreFailed { label: String, detail: String },
}

impl AttemptError {
    /// Whether this outcome ends the fallback chain for the current code.
    pub fn is_terminal(&self) -> bool {
        matches!(self, AttemptError::RecordCancelled { .. })
    }

    /// Whether the source simply had nothing at this code/category.
    pub fn is_not_found(&self) -> bool {
        matches!(self, AttemptError::RecordNotFound { .. })
    }
}

/// Raised by a [`crate::pipeline::parse::DocumentParser`] backend for one call.
#[derive(Debug, Error)]
pub enum ParseServiceError {
    #[error("HTTP error talking to the parsing service: {0}")]
    Http(String),

    /// The service accepted the job but reported a failure.
    #[error("Parsing job {job_id} ended with status {status}")]
    JobFailed { job_id: String, status: String },

    #[error("Parsing job {job_id} did not finish within {secs}s")]
    JobTimeout { job_id: String, secs: u64 },

    #[error("Could not read document '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The service returned no text at all.
    #[error("Parsing service returned no text")]
    Empty,
}

impl From<reqwest::Error> for ParseServiceError {
    fn from(e: reqwest::Error) -> Self {
        ParseServiceError::Http(e.to_string())
    }
}

/// Blob-store I/O failure.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Failed to write '{path}': {source}")]
    WriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to rename '{from}' to '{to}': {source}")]
    RenameFailed {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to read '{path}': {source}")]
    ReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_cancelled_is_terminal() {
        let cancelled = AttemptError::RecordCancelled {
            label: "衛部藥製第000001號".into(),
            status: "已註銷".into(),
        };
        assert!(cancelled.is_terminal());

        let missing = AttemptError::RecordNotFound {
            label: "衛部藥製第000001號".into(),
        };
        assert!(!missing.is_terminal());
        assert!(missing.is_not_found());
    }

    #[test]
    fn parse_failure_display() {
        let e = AttemptError::ParseFailure {
            label: "衛署藥輸第012345號".into(),
            attempts: 3,
            detail: "job timed out".into(),
        };
        let msg = e.to_string();
        assert!(msg.contains("3 attempts"), "got: {msg}");
        assert!(msg.contains("job timed out"));
    }

    #[test]
    fn no_text_display_mentions_candidate_count() {
        let e = AttemptError::NoTextRenditionFound {
            label: "衛部藥輸第000123號".into(),
            candidates: 2,
        };
        assert!(e.to_string().contains("none of 2 renditions"));
    }

    #[test]
    fn credential_range_display() {
        let e = HarvestError::CredentialOutOfRange { index: 9, size: 3 };
        assert!(e.to_string().contains("index 9"));
        assert!(e.to_string().contains("3 keys"));
    }
}
