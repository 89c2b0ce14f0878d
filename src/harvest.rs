//! One code × category attempt, end to end.
//!
//! [`Harvester::harvest`] fetches the detail page, extracts the record and
//! then runs the pipeline for the configured [`LabelKind`]. Every outcome
//! short of a written artifact is an [`AttemptError`]; nothing here aborts a
//! crawl.

use crate::config::{HarvestConfig, LabelKind, LicenseCategory, LicenseCode};
use crate::error::{AttemptError, HarvestError};
use crate::output::{DocumentRecord, LabelSection, OutputArtifact, RenditionCandidate};
use crate::pipeline::extract;
use crate::pipeline::fetch::{FetchedPage, HttpLabelSource, LabelSource};
use crate::pipeline::llama::LlamaParseClient;
use crate::pipeline::naming::{base_stem, binary_name_for, excerpt_suffix, name_for};
use crate::pipeline::parse::{CredentialRotator, DocumentParser, RemoteParseClient};
use crate::pipeline::postprocess::normalize;
use crate::pipeline::resolve::{CandidateResolver, PdfiumProbe, Resolution, TextProbe};
use crate::store::{BlobKey, BlobStore, FsBlobStore};
use scraper::Html;
use std::io::Write;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Section titles whose body is used as the electronic-label indication.
const INDICATION_TITLES: &[&str] = &["適應症", "用途"];

/// Runs single attempts against the registry and archives the result.
pub struct Harvester {
    config: HarvestConfig,
    source: Arc<dyn LabelSource>,
    probe: Arc<dyn TextProbe>,
    parser: Option<RemoteParseClient>,
    store: Arc<dyn BlobStore>,
}

impl Harvester {
    /// Assemble a harvester from explicit backends.
    ///
    /// The PDF pipeline needs a non-empty credential pool; the electronic
    /// pipeline never calls the parser.
    pub fn new(
        config: HarvestConfig,
        source: Arc<dyn LabelSource>,
        probe: Arc<dyn TextProbe>,
        parser: Arc<dyn DocumentParser>,
        store: Arc<dyn BlobStore>,
    ) -> Result<Self, HarvestError> {
        let parser = match config.label_kind {
            LabelKind::Pdf => Some(RemoteParseClient::new(parser, &config)?),
            LabelKind::Electronic => None,
        };
        Ok(Self {
            config,
            source,
            probe,
            parser,
            store,
        })
    }

    /// Wire up the production backends: HTTP registry, pdfium probe,
    /// LlamaParse and a directory-backed archive under `output_dir`.
    pub fn from_config(config: HarvestConfig) -> Result<Self, HarvestError> {
        std::fs::create_dir_all(&config.output_dir).map_err(|source| {
            HarvestError::OutputDirFailed {
                path: config.output_dir.clone(),
                source,
            }
        })?;

        let probe = PdfiumProbe::new(config.pdfium_lib_path.clone());
        if config.label_kind == LabelKind::Pdf {
            probe.check_binding()?;
        }
        let source = Arc::new(HttpLabelSource::new(&config)?);
        let parser = Arc::new(LlamaParseClient::new(&config)?);
        let store = Arc::new(FsBlobStore::new(config.output_dir.clone()));

        Self::new(config, source, Arc::new(probe), parser, store)
    }

    pub fn config(&self) -> &HarvestConfig {
        &self.config
    }

    /// Credential cursor of the PDF pipeline, if it has one.
    pub fn rotator(&self) -> Option<&CredentialRotator> {
        self.parser.as_ref().map(RemoteParseClient::rotator)
    }

    /// Try one code under one category.
    pub async fn harvest(
        &mut self,
        code: LicenseCode,
        category: LicenseCategory,
    ) -> Result<OutputArtifact, AttemptError> {
        let label = attempt_label(category, code);
        let url = self.config.detail_url(category, code);
        debug!("{}: fetching {}", label, url);

        let html = match self.source.fetch_page(&url).await? {
            FetchedPage::NotFound => return Err(AttemptError::RecordNotFound { label }),
            FetchedPage::Found(html) => html,
        };

        match self.config.label_kind {
            LabelKind::Pdf => self.harvest_pdf(code, category, &label, &html).await,
            LabelKind::Electronic => self.harvest_electronic(code, category, &label, &html).await,
        }
    }

    async fn harvest_pdf(
        &mut self,
        code: LicenseCode,
        category: LicenseCategory,
        label: &str,
        html: &str,
    ) -> Result<OutputArtifact, AttemptError> {
        // `Html` is not `Send`; keep it out of scope across awaits.
        let (record, candidates): (DocumentRecord, Vec<RenditionCandidate>) = {
            let document = Html::parse_document(html);
            (
                extract::extract(&document),
                extract::renditions(&document, &self.config),
            )
        };
        check_record(&record, label)?;

        if candidates.is_empty() {
            return Err(AttemptError::NoRenditionFound {
                label: label.to_string(),
            });
        }
        info!("{}: {} rendition(s) listed", label, candidates.len());

        let resolver = CandidateResolver::new(self.source.as_ref(), Arc::clone(&self.probe));
        let Some(Resolution { index, bytes }) = resolver.resolve(&candidates).await else {
            return Err(AttemptError::NoTextRenditionFound {
                label: label.to_string(),
                candidates: candidates.len(),
            });
        };
        debug!("{}: using '{}'", label, candidates[index].link_text);

        let fallback = code.to_string();
        let binary_key = self.key_for(category, binary_name_for(&record, &fallback));
        self.store
            .write(&binary_key, &bytes)
            .await
            .map_err(|e| store_failed(label, e))?;

        let spool = spool_to_tempfile(&bytes).map_err(|e| AttemptError::ParseFailure {
            label: label.to_string(),
            attempts: 0,
            detail: format!("tempfile: {e}"),
        })?;
        let parser = self.parser.as_mut().ok_or_else(|| AttemptError::ParseFailure {
            label: label.to_string(),
            attempts: 0,
            detail: "no parsing client configured".into(),
        })?;
        let segments = parser.parse_with_retry(spool.path(), label).await?;
        drop(spool);

        let normalized = normalize(&segments, self.config.max_excerpt_chars);
        let content = if self.config.include_metadata {
            format!("{}\n{}", record.to_markdown(), normalized.text)
        } else {
            normalized.text
        };

        self.persist(
            code,
            category,
            label,
            record,
            content,
            normalized.indication,
            Some(binary_key),
        )
        .await
    }

    async fn harvest_electronic(
        &self,
        code: LicenseCode,
        category: LicenseCategory,
        label: &str,
        html: &str,
    ) -> Result<OutputArtifact, AttemptError> {
        let (record, sections): (DocumentRecord, Vec<LabelSection>) = {
            let document = Html::parse_document(html);
            (extract::extract(&document), extract::sections(&document))
        };
        check_record(&record, label)?;

        if sections.is_empty() {
            return Err(AttemptError::NoRenditionFound {
                label: label.to_string(),
            });
        }

        let indication = sections
            .iter()
            .find(|s| INDICATION_TITLES.iter().any(|t| s.title.contains(t)))
            .and_then(|s| excerpt_suffix(&s.body, self.config.max_excerpt_chars));

        let mut content = record.to_markdown();
        for section in &sections {
            content.push_str(&format!("\n## {}\n{}\n", section.title, section.body));
        }

        self.persist(code, category, label, record, content, indication, None)
            .await
    }

    /// Write under a provisional name, then rename to the content-derived one.
    #[allow(clippy::too_many_arguments)]
    async fn persist(
        &self,
        code: LicenseCode,
        category: LicenseCategory,
        label: &str,
        record: DocumentRecord,
        content: String,
        indication: Option<String>,
        binary_key: Option<BlobKey>,
    ) -> Result<OutputArtifact, AttemptError> {
        let fallback = code.to_string();
        let provisional = self.key_for(category, format!("{}.md.partial", base_stem(&record, &fallback)));
        self.store
            .write(&provisional, content.as_bytes())
            .await
            .map_err(|e| store_failed(label, e))?;

        let key = provisional.with_filename(name_for(&record, indication.as_deref(), &fallback));
        if let Err(e) = self.store.rename(&provisional, &key).await {
            warn!("{}: rename failed, provisional file left at {}", label, provisional);
            return Err(store_failed(label, e));
        }
        info!("{}: saved {}", label, key);

        Ok(OutputArtifact {
            code,
            category,
            key,
            content,
            record,
            indication,
            binary_key,
        })
    }

    fn key_for(&self, category: LicenseCategory, filename: String) -> BlobKey {
        BlobKey::new(self.config.collection(), category.label(), filename)
    }
}

/// Human-readable attempt label, e.g. `衛部藥製第012345號`.
pub fn attempt_label(category: LicenseCategory, code: LicenseCode) -> String {
    format!("{category}第{code}號")
}

fn check_record(record: &DocumentRecord, label: &str) -> Result<(), AttemptError> {
    if !record.is_usable() {
        return Err(AttemptError::RecordNotFound {
            label: label.to_string(),
        });
    }
    if record.is_cancelled() {
        return Err(AttemptError::RecordCancelled {
            label: label.to_string(),
            status: record.expiry_status.clone(),
        });
    }
    Ok(())
}

fn store_failed(label: &str, e: crate::error::StoreError) -> AttemptError {
    AttemptError::StoreFailed {
        label: label.to_string(),
        detail: e.to_string(),
    }
}

/// The parser reads from disk; hand it a managed temp copy of the rendition.
fn spool_to_tempfile(bytes: &[u8]) -> std::io::Result<tempfile::NamedTempFile> {
    let mut tmp = tempfile::Builder::new().suffix(".pdf").tempfile()?;
    tmp.write_all(bytes)?;
    tmp.flush()?;
    Ok(tmp)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attempt_label_pads_code() {
        let category = LicenseCategory::by_number(2).unwrap();
        let code = LicenseCode::new(12345).unwrap();
        assert_eq!(attempt_label(category, code), "衛部藥製第012345號");
    }

    #[test]
    fn unusable_record_reads_as_not_found() {
        let err = check_record(&DocumentRecord::default(), "x").unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn cancelled_record_is_terminal() {
        let record = DocumentRecord {
            license_code: "衛署藥製字第000001號".into(),
            zh_name: "測試".into(),
            expiry_status: "已註銷 2010/01/01".into(),
            ..Default::default()
        };
        let err = check_record(&record, "x").unwrap_err();
        assert!(err.is_terminal());
    }

    #[test]
    fn spooled_copy_matches_bytes() {
        let tmp = spool_to_tempfile(b"%PDF-1.4").unwrap();
        assert_eq!(std::fs::read(tmp.path()).unwrap(), b"%PDF-1.4");
        assert!(tmp.path().to_string_lossy().ends_with(".pdf"));
    }
}
