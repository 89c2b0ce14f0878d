//! # fda-label-harvest
//!
//! Collect drug-label documents from the Taiwan FDA licence registry and
//! archive them as normalised Markdown.
//!
//! A licence is identified by a [`LicenseCategory`] and a six-digit
//! [`LicenseCode`]. The registry often lists several PDF renditions for one
//! licence, some of them image-only scans, so the crate picks the first
//! rendition with a text layer, sends it to a remote parsing service, cleans
//! the result and files it under a name derived from the licence and its
//! indication.
//!
//! ## Pipeline Overview
//!
//! ```text
//! code × category
//!  │
//!  ├─ 1. Fetch     detail page (redirect to the landing page = not found)
//!  ├─ 2. Extract   labelled fields, cancellation status, rendition links
//!  ├─ 3. Resolve   download all renditions, keep the first with text (pdfium)
//!  ├─ 4. Parse     remote parsing service, key rotation + fixed-delay retry
//!  ├─ 5. Polish    blank-line collapse, indication capture
//!  └─ 6. Archive   write provisional file, rename to {code}-{name}[-{indication}].md
//! ```
//!
//! Electronic labels ([`LabelKind::Electronic`]) skip steps 3–4 and render
//! the HTML label sections locally.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use fda_label_harvest::{run_crawl, ApiCredential, CrawlPlan, HarvestConfig, Harvester};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = HarvestConfig::builder()
//!         .output_dir("archive")
//!         .credentials(vec![ApiCredential::new("llx-...")])
//!         .request_delay_ms(1000)
//!         .build()?;
//!     let plan = CrawlPlan::for_config(&config, 1, 50, None)?;
//!     let mut harvester = Harvester::from_config(config)?;
//!     let summary = run_crawl(&mut harvester, &plan, None).await?;
//!     eprintln!("{} saved, {} failed", summary.saved, summary.failed);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `label-harvest` binary (clap + anyhow + tracing-subscriber + rustyline) |

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod error;
pub mod harvest;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod schedule;
pub mod store;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{
    HarvestConfig, HarvestConfigBuilder, LabelKind, LicenseCategory, LicenseCode, RotationMode,
};
pub use error::{AttemptError, HarvestError, ParseServiceError, StoreError};
pub use harvest::Harvester;
pub use output::{
    CrawlSummary, DocumentRecord, LabelSection, OutputArtifact, ParsedText, RenditionCandidate,
};
pub use pipeline::fetch::{FetchedPage, LabelSource};
pub use pipeline::parse::{ApiCredential, CredentialRotator, DocumentParser};
pub use pipeline::resolve::{ProbeError, TextProbe};
pub use progress::{CrawlProgressCallback, NoopProgressCallback};
pub use schedule::{run_crawl, CrawlPlan};
pub use store::{BlobKey, BlobStore, FsBlobStore};
