//! Rendition selection: pick the first document that carries a text layer.
//!
//! Registry records often list several PDFs, some of which are image-only
//! scans. Only a text-bearing rendition is worth sending to the parsing
//! service, so every candidate is downloaded up front and then probed page by
//! page in listed order.
//!
//! Probing goes through pdfium, which is blocking and not async-safe, so the
//! scan runs inside `tokio::task::spawn_blocking`.

use crate::error::HarvestError;
use crate::output::RenditionCandidate;
use crate::pipeline::fetch::LabelSource;
use pdfium_render::prelude::*;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

/// A rendition could not be opened as a paginated document.
#[derive(Debug, Error)]
#[error("{0}")]
pub struct ProbeError(pub String);

/// Answers whether a binary document has extractable text on any page.
pub trait TextProbe: Send + Sync {
    fn has_text(&self, bytes: &[u8]) -> Result<bool, ProbeError>;
}

/// The winning rendition and its downloaded bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub index: usize,
    pub bytes: Vec<u8>,
}

/// Downloads candidates and selects the first text-bearing one.
pub struct CandidateResolver<'a> {
    source: &'a dyn LabelSource,
    probe: Arc<dyn TextProbe>,
}

impl<'a> CandidateResolver<'a> {
    pub fn new(source: &'a dyn LabelSource, probe: Arc<dyn TextProbe>) -> Self {
        Self { source, probe }
    }

    /// Index and bytes of the first candidate whose any page yields
    /// non-whitespace text, or `None` when no candidate does.
    ///
    /// Failed downloads and unreadable binaries are skipped.
    pub async fn resolve(&self, candidates: &[RenditionCandidate]) -> Option<Resolution> {
        let downloads = self.download_all(candidates).await;
        let probe = Arc::clone(&self.probe);

        let (winner, mut downloads) = tokio::task::spawn_blocking(move || {
            let winner = first_text_bearing(probe.as_ref(), &downloads);
            (winner, downloads)
        })
        .await
        .map_err(|e| warn!("Probe task panicked: {}", e))
        .ok()?;

        let index = winner?;
        info!(
            "Rendition {}/{} has a text layer: {}",
            index + 1,
            candidates.len(),
            candidates[index].url
        );
        let bytes = downloads.get_mut(index)?.take()?;
        Some(Resolution { index, bytes })
    }

    /// Fetch every candidate in order; failures become `None` slots.
    async fn download_all(&self, candidates: &[RenditionCandidate]) -> Vec<Option<Vec<u8>>> {
        let mut downloads = Vec::with_capacity(candidates.len());
        for candidate in candidates {
            match self.source.fetch_binary(&candidate.url).await {
                Ok(bytes) => downloads.push(Some(bytes)),
                Err(e) => {
                    warn!("Skipping rendition: {}", e);
                    downloads.push(None);
                }
            }
        }
        downloads
    }
}

/// Position of the first download that the probe reports as text-bearing.
pub fn first_text_bearing(probe: &dyn TextProbe, downloads: &[Option<Vec<u8>>]) -> Option<usize> {
    downloads.iter().enumerate().find_map(|(index, slot)| {
        let bytes = slot.as_deref()?;
        match probe.has_text(bytes) {
            Ok(true) => Some(index),
            Ok(false) => {
                debug!("Rendition {} has no text layer", index + 1);
                None
            }
            Err(e) => {
                warn!("Rendition {} is unreadable: {}", index + 1, e);
                None
            }
        }
    })
}

// ── pdfium-backed probe ──────────────────────────────────────────────────

/// [`TextProbe`] backed by the pdfium library.
#[derive(Debug, Clone, Default)]
pub struct PdfiumProbe {
    lib_path: Option<PathBuf>,
}

impl PdfiumProbe {
    /// Use the library at `lib_path`, or search next to the binary and then
    /// the system library path when `None`.
    pub fn new(lib_path: Option<PathBuf>) -> Self {
        Self { lib_path }
    }

    fn bind(&self) -> Result<Pdfium, HarvestError> {
        let bindings = match &self.lib_path {
            Some(path) => Pdfium::bind_to_library(path),
            None => Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path("./"))
                .or_else(|_| Pdfium::bind_to_system_library()),
        }
        .map_err(|e| HarvestError::PdfiumBindingFailed(format!("{:?}", e)))?;
        Ok(Pdfium::new(bindings))
    }

    /// Fail fast at startup when no pdfium library can be loaded.
    pub fn check_binding(&self) -> Result<(), HarvestError> {
        self.bind().map(|_| ())
    }
}

impl TextProbe for PdfiumProbe {
    fn has_text(&self, bytes: &[u8]) -> Result<bool, ProbeError> {
        let pdfium = self.bind().map_err(|e| ProbeError(e.to_string()))?;
        let document = pdfium
            .load_pdf_from_byte_slice(bytes, None)
            .map_err(|e| ProbeError(format!("{:?}", e)))?;

        for (number, page) in document.pages().iter().enumerate() {
            let text = page
                .text()
                .map_err(|e| ProbeError(format!("page {}: {:?}", number + 1, e)))?;
            if !text.all().trim().is_empty() {
                return Ok(true);
            }
        }
        Ok(false)
    }
}
