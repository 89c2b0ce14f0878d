//! Data produced along the harvesting pipeline.

use crate::config::{LicenseCategory, LicenseCode};
use crate::store::BlobKey;
use serde::{Deserialize, Serialize};

/// Status text the registry uses for a revoked licence.
pub const CANCELLATION_MARKER: &str = "已註銷";

/// Metadata scraped from one licence's detail page.
///
/// Missing fields are empty strings, never errors.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentRecord {
    /// 中文品名, already sanitized for use as a path segment.
    pub zh_name: String,
    /// 英文品名
    pub en_name: String,
    /// 許可證號 as printed on the page, e.g. `衛部藥製字第012345號`.
    pub license_code: String,
    /// 藥品類別
    pub drug_category: String,
    /// 劑型
    pub dosage_form: String,
    /// 有效日期, whitespace-normalised. Carries the cancellation marker when revoked.
    pub expiry_status: String,
    /// 申請商名稱
    pub applicant_name: String,
    /// 申請商地址
    pub applicant_address: String,
}

impl DocumentRecord {
    /// A record needs a canonical code and a display name to be archived.
    pub fn is_usable(&self) -> bool {
        !self.license_code.is_empty() && !self.zh_name.is_empty()
    }

    pub fn is_cancelled(&self) -> bool {
        self.expiry_status.contains(CANCELLATION_MARKER)
    }

    /// Render the metadata block that heads every archived label.
    pub fn to_markdown(&self) -> String {
        let mut md = String::from("\n");
        let mut field = |title: &str, value: &str| {
            md.push_str("## ");
            md.push_str(title);
            md.push('\n');
            md.push_str(value);
            md.push('\n');
        };
        field("中文品名", &self.zh_name);
        field("英文品名", &self.en_name);
        field("許可證號", &self.license_code);
        field("藥品類別", &self.drug_category);
        field("劑型", &self.dosage_form);
        field("有效日期", &self.expiry_status);
        if !self.applicant_name.is_empty() {
            field("申請商名稱", &self.applicant_name);
        }
        if !self.applicant_address.is_empty() {
            field("申請商地址", &self.applicant_address);
        }
        md
    }
}

/// One downloadable document link on a detail page.
///
/// Position in the candidate list follows document order and breaks ties.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenditionCandidate {
    /// Absolute URL.
    pub url: String,
    /// Link text as shown on the page, e.g. `仿單.pdf`.
    pub link_text: String,
}

/// One ordered text segment returned by the parsing service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedText {
    pub text: String,
}

impl ParsedText {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

/// One collapsible section of an electronic label, rendered to Markdown.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelSection {
    pub title: String,
    pub body: String,
}

/// A written archive entry. Never mutated after creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputArtifact {
    pub code: LicenseCode,
    pub category: LicenseCategory,
    /// Where the text artifact ended up.
    pub key: BlobKey,
    /// Normalised Markdown written under `key`.
    pub content: String,
    pub record: DocumentRecord,
    /// Indication excerpt used as filename suffix, if one was found.
    pub indication: Option<String>,
    /// Key of the rendition binary stored alongside, PDF pipeline only.
    pub binary_key: Option<BlobKey>,
}

impl OutputArtifact {
    pub fn filename(&self) -> &str {
        &self.key.filename
    }
}

/// Totals for one scheduler run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CrawlSummary {
    /// Codes visited.
    pub codes: usize,
    /// Code × category attempts made.
    pub attempts: usize,
    /// Codes that produced an artifact.
    pub saved: usize,
    /// Codes whose record was cancelled.
    pub cancelled: usize,
    /// Attempts where the registry had no record.
    pub not_found: usize,
    /// Attempts that failed for any other reason.
    pub failed: usize,
    /// Filenames written, in crawl order.
    pub artifacts: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> DocumentRecord {
        DocumentRecord {
            zh_name: "測試藥品".into(),
            license_code: "012345".into(),
            expiry_status: "2030/01/01".into(),
            ..Default::default()
        }
    }

    #[test]
    fn usable_needs_code_and_name() {
        assert!(record().is_usable());
        let mut r = record();
        r.zh_name.clear();
        assert!(!r.is_usable());
        let mut r = record();
        r.license_code.clear();
        assert!(!r.is_usable());
    }

    #[test]
    fn cancellation_marker_detected_anywhere_in_status() {
        let mut r = record();
        assert!(!r.is_cancelled());
        r.expiry_status = "2019/05/01 已註銷".into();
        assert!(r.is_cancelled());
    }

    #[test]
    fn metadata_block_lists_fields_as_headings() {
        let md = record().to_markdown();
        assert!(md.contains("## 中文品名\n測試藥品\n"));
        assert!(md.contains("## 許可證號\n012345\n"));
        assert!(!md.contains("申請商名稱"));
    }
}
