//! Configuration types for label harvesting.
//!
//! All harvesting behaviour is controlled through [`HarvestConfig`], built via
//! its [`HarvestConfigBuilder`]. The identifiers the crawl is keyed on,
//! [`LicenseCode`] and [`LicenseCategory`], also live here.

use crate::error::HarvestError;
use crate::pipeline::parse::ApiCredential;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Configuration for a harvesting run.
///
/// Built via [`HarvestConfig::builder()`] or using [`HarvestConfig::default()`].
///
/// # Example
/// ```rust
/// use fda_label_harvest::{HarvestConfig, LabelKind};
///
/// let config = HarvestConfig::builder()
///     .output_dir("archive")
///     .label_kind(LabelKind::Electronic)
///     .request_delay_ms(1500)
///     .build()
///     .unwrap();
/// assert_eq!(config.max_retries, 3);
/// ```
#[derive(Clone)]
pub struct HarvestConfig {
    /// Origin of the label registry. Default: `https://mcp.fda.gov.tw`.
    pub base_url: String,

    /// Root directory of the archive. Default: current directory.
    pub output_dir: PathBuf,

    /// Collection folder for the PDF pipeline. Default: `一般仿單`.
    pub pdf_collection: String,

    /// Collection folder for the electronic-label pipeline. Default: `電子仿單`.
    pub electronic_collection: String,

    /// Which label pipeline to run. Default: [`LabelKind::Pdf`].
    pub label_kind: LabelKind,

    /// Total parse attempts per rendition (not retries after the first). Default: 3.
    pub max_retries: u32,

    /// Fixed pause between parse attempts in milliseconds. Default: 2000.
    ///
    /// The back-off does not grow: the parsing service either recovers within
    /// a couple of seconds or the rendition is reported and skipped.
    pub retry_backoff_ms: u64,

    /// TCP connect timeout for registry requests. Default: 10.
    pub connect_timeout_secs: u64,

    /// Whole-request timeout for registry requests. Default: 30.
    pub read_timeout_secs: u64,

    /// Language hint passed to the parsing service. Default: `ch_tra`.
    pub parse_language: String,

    /// Parsing service base endpoint.
    pub parse_endpoint: String,

    /// Interval between job-status polls in milliseconds. Default: 1000.
    pub parse_poll_interval_ms: u64,

    /// Give up on a single parsing job after this many seconds. Default: 600.
    pub parse_timeout_secs: u64,

    /// Parsing-service credential pool. Required by the PDF pipeline.
    pub credentials: Vec<ApiCredential>,

    /// How the credential pool is consumed. Default: [`RotationMode::Rotate`].
    pub rotation: RotationMode,

    /// Categories tried in order for each code when no single category is
    /// requested. Default: the first four known categories.
    pub fallback_categories: Vec<LicenseCategory>,

    /// Pause after every attempt, in milliseconds. Default: 0.
    pub request_delay_ms: u64,

    /// Prepend the metadata block to PDF-pipeline artifacts. Default: false.
    pub include_metadata: bool,

    /// Upper bound on the indication excerpt in characters. Default: 40.
    pub max_excerpt_chars: usize,

    /// Explicit pdfium shared library path. Default: none.
    pub pdfium_lib_path: Option<PathBuf>,
}

impl Default for HarvestConfig {
    fn default() -> Self {
        Self {
            base_url: "https://mcp.fda.gov.tw".to_string(),
            output_dir: PathBuf::from("."),
            pdf_collection: "一般仿單".to_string(),
            electronic_collection: "電子仿單".to_string(),
            label_kind: LabelKind::default(),
            max_retries: 3,
            retry_backoff_ms: 2000,
            connect_timeout_secs: 10,
            read_timeout_secs: 30,
            parse_language: "ch_tra".to_string(),
            parse_endpoint: "https://api.cloud.llamaindex.ai/api/parsing".to_string(),
            parse_poll_interval_ms: 1000,
            parse_timeout_secs: 600,
            credentials: Vec::new(),
            rotation: RotationMode::default(),
            fallback_categories: LicenseCategory::ALL[..4].to_vec(),
            request_delay_ms: 0,
            include_metadata: false,
            max_excerpt_chars: 40,
            pdfium_lib_path: None,
        }
    }
}

impl fmt::Debug for HarvestConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HarvestConfig")
            .field("base_url", &self.base_url)
            .field("output_dir", &self.output_dir)
            .field("label_kind", &self.label_kind)
            .field("max_retries", &self.max_retries)
            .field("retry_backoff_ms", &self.retry_backoff_ms)
            .field("parse_language", &self.parse_language)
            .field("credentials", &format!("<{} keys>", self.credentials.len()))
            .field("rotation", &self.rotation)
            .field("fallback_categories", &self.fallback_categories)
            .field("request_delay_ms", &self.request_delay_ms)
            .finish()
    }
}

impl HarvestConfig {
    /// Create a new builder for `HarvestConfig`.
    pub fn builder() -> HarvestConfigBuilder {
        HarvestConfigBuilder {
            config: Self::default(),
        }
    }

    /// The inter-attempt pause as a [`Duration`].
    pub fn request_delay(&self) -> Duration {
        Duration::from_millis(self.request_delay_ms)
    }

    /// Collection folder for the configured pipeline.
    pub fn collection(&self) -> &str {
        match self.label_kind {
            LabelKind::Pdf => &self.pdf_collection,
            LabelKind::Electronic => &self.electronic_collection,
        }
    }

    /// Landing page the registry redirects to when a record is absent.
    pub fn not_found_url(&self) -> String {
        format!("{}/im", self.base_url.trim_end_matches('/'))
    }

    /// Metadata page URL for one code × category.
    pub fn detail_url(&self, category: LicenseCategory, code: LicenseCode) -> String {
        let base = self.base_url.trim_end_matches('/');
        match self.label_kind {
            LabelKind::Pdf => format!("{base}/im_detail_pdf/{category}第{code}號/"),
            LabelKind::Electronic => format!("{base}/im_detail_1/{category}字第{code}號/"),
        }
    }

    /// Absolute URL for a rendition link found on a metadata page.
    pub fn absolute_url(&self, href: &str) -> String {
        if href.starts_with("http://") || href.starts_with("https://") {
            href.to_string()
        } else {
            let base = self.base_url.trim_end_matches('/');
            if href.starts_with('/') {
                format!("{base}{href}")
            } else {
                format!("{base}/{href}")
            }
        }
    }
}

/// Builder for [`HarvestConfig`].
#[derive(Debug)]
pub struct HarvestConfigBuilder {
    config: HarvestConfig,
}

impl HarvestConfigBuilder {
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.config.base_url = url.into();
        self
    }

    pub fn output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.output_dir = dir.into();
        self
    }

    pub fn label_kind(mut self, kind: LabelKind) -> Self {
        self.config.label_kind = kind;
        self
    }

    pub fn max_retries(mut self, n: u32) -> Self {
        self.config.max_retries = n;
        self
    }

    pub fn retry_backoff_ms(mut self, ms: u64) -> Self {
        self.config.retry_backoff_ms = ms;
        self
    }

    pub fn connect_timeout_secs(mut self, secs: u64) -> Self {
        self.config.connect_timeout_secs = secs;
        self
    }

    pub fn read_timeout_secs(mut self, secs: u64) -> Self {
        self.config.read_timeout_secs = secs;
        self
    }

    pub fn parse_language(mut self, lang: impl Into<String>) -> Self {
        self.config.parse_language = lang.into();
        self
    }

    pub fn parse_endpoint(mut self, url: impl Into<String>) -> Self {
        self.config.parse_endpoint = url.into();
        self
    }

    pub fn parse_poll_interval_ms(mut self, ms: u64) -> Self {
        self.config.parse_poll_interval_ms = ms.max(1);
        self
    }

    pub fn parse_timeout_secs(mut self, secs: u64) -> Self {
        self.config.parse_timeout_secs = secs;
        self
    }

    pub fn credentials(mut self, keys: Vec<ApiCredential>) -> Self {
        self.config.credentials = keys;
        self
    }

    pub fn rotation(mut self, mode: RotationMode) -> Self {
        self.config.rotation = mode;
        self
    }

    pub fn fallback_categories(mut self, categories: Vec<LicenseCategory>) -> Self {
        self.config.fallback_categories = categories;
        self
    }

    pub fn request_delay_ms(mut self, ms: u64) -> Self {
        self.config.request_delay_ms = ms;
        self
    }

    pub fn include_metadata(mut self, v: bool) -> Self {
        self.config.include_metadata = v;
        self
    }

    pub fn max_excerpt_chars(mut self, n: usize) -> Self {
        self.config.max_excerpt_chars = n;
        self
    }

    pub fn pdfium_lib_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.pdfium_lib_path = Some(path.into());
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<HarvestConfig, HarvestError> {
        let c = &self.config;
        if c.max_retries == 0 {
            return Err(HarvestError::InvalidConfig(
                "max_retries must be ≥ 1 (it counts total attempts)".into(),
            ));
        }
        if c.fallback_categories.is_empty() {
            return Err(HarvestError::InvalidConfig(
                "at least one fallback category is required".into(),
            ));
        }
        if !(c.base_url.starts_with("http://") || c.base_url.starts_with("https://")) {
            return Err(HarvestError::InvalidConfig(format!(
                "base_url must be an HTTP(S) URL, got '{}'",
                c.base_url
            )));
        }
        if c.max_excerpt_chars == 0 {
            return Err(HarvestError::InvalidConfig(
                "max_excerpt_chars must be ≥ 1".into(),
            ));
        }
        if let RotationMode::Pinned(index) = c.rotation {
            if !c.credentials.is_empty() && index >= c.credentials.len() {
                return Err(HarvestError::CredentialOutOfRange {
                    index,
                    size: c.credentials.len(),
                });
            }
        }
        Ok(self.config)
    }
}

// ── Enums ────────────────────────────────────────────────────────────────

/// Which registry rendition a run collects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum LabelKind {
    /// Scanned/printed PDF inserts, converted by the parsing service. (default)
    #[default]
    Pdf,
    /// HTML "electronic label" pages, converted locally.
    Electronic,
}

/// How the credential pool is consumed across parse calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RotationMode {
    /// Advance to the next key after every successful parse. (default)
    #[default]
    Rotate,
    /// Use the key at this index for the whole run.
    Pinned(usize),
}

// ── Identifiers ──────────────────────────────────────────────────────────

/// A six-digit licence number, zero-padded on display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct LicenseCode(u32);

impl LicenseCode {
    pub const MAX: u32 = 999_999;

    /// Wrap a numeric code, rejecting values wider than six digits.
    pub fn new(value: u32) -> Option<Self> {
        (value <= Self::MAX).then_some(Self(value))
    }

    pub fn value(self) -> u32 {
        self.0
    }
}

impl fmt::Display for LicenseCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:06}", self.0)
    }
}

impl FromStr for LicenseCode {
    type Err = HarvestError;

    /// Accepts exactly six ASCII digits.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.len() != 6 || !s.bytes().all(|b| b.is_ascii_digit()) {
            return Err(HarvestError::InvalidConfig(format!(
                "licence code must be six digits, got '{s}'"
            )));
        }
        s.parse::<u32>()
            .map(Self)
            .map_err(|e| HarvestError::InvalidConfig(e.to_string()))
    }
}

/// Issuing scheme and document type of a licence, e.g. `衛部藥製`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LicenseCategory(&'static str);

impl LicenseCategory {
    /// Every category the registry knows, in operator-menu order (1-based).
    pub const ALL: [LicenseCategory; 27] = [
        LicenseCategory("衛署藥製"),
        LicenseCategory("衛部藥製"),
        LicenseCategory("衛署藥輸"),
        LicenseCategory("衛部藥輸"),
        LicenseCategory("衛署成製"),
        LicenseCategory("衛部成製"),
        LicenseCategory("衛署菌疫製"),
        LicenseCategory("衛部菌疫製"),
        LicenseCategory("衛署菌疫輸"),
        LicenseCategory("衛部菌疫輸"),
        LicenseCategory("衛署成輸"),
        LicenseCategory("衛部成輸"),
        LicenseCategory("衛署罕藥輸"),
        LicenseCategory("衛部罕藥輸"),
        LicenseCategory("衛署罕藥製"),
        LicenseCategory("衛部罕藥製"),
        LicenseCategory("衛署罕菌疫製"),
        LicenseCategory("衛部罕菌疫製"),
        LicenseCategory("衛部罕菌疫輸"),
        LicenseCategory("衛署罕菌疫輸"),
        LicenseCategory("衛署藥陸輸"),
        LicenseCategory("衛部藥陸輸"),
        LicenseCategory("內衛藥製"),
        LicenseCategory("內衛藥輸"),
        LicenseCategory("內衛成製"),
        LicenseCategory("內衛菌疫製"),
        LicenseCategory("內衛菌疫輸"),
    ];

    /// Look up a category by its 1-based menu number.
    pub fn by_number(n: usize) -> Option<Self> {
        n.checked_sub(1).and_then(|i| Self::ALL.get(i)).copied()
    }

    /// 1-based menu number of this category.
    pub fn number(self) -> usize {
        Self::ALL
            .iter()
            .position(|c| *c == self)
            .map(|i| i + 1)
            .unwrap_or(0)
    }

    pub fn label(self) -> &'static str {
        self.0
    }
}

impl fmt::Display for LicenseCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}

impl FromStr for LicenseCategory {
    type Err = HarvestError;

    /// Accepts either a menu number (`"2"`) or the label itself (`"衛部藥製"`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if let Ok(n) = s.parse::<usize>() {
            return Self::by_number(n).ok_or_else(|| {
                HarvestError::InvalidConfig(format!("category number must be 1–27, got {n}"))
            });
        }
        Self::ALL
            .iter()
            .copied()
            .find(|c| c.0 == s)
            .ok_or_else(|| HarvestError::InvalidConfig(format!("unknown licence category '{s}'")))
    }
}

impl Serialize for LicenseCategory {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.0)
    }
}

impl<'de> Deserialize<'de> for LicenseCategory {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn code_pads_to_six_digits() {
        assert_eq!(LicenseCode::new(12345).unwrap().to_string(), "012345");
        assert_eq!(LicenseCode::new(0).unwrap().to_string(), "000000");
        assert!(LicenseCode::new(1_000_000).is_none());
    }

    #[test]
    fn code_parse_requires_six_digits() {
        assert_eq!("012345".parse::<LicenseCode>().unwrap().value(), 12345);
        assert!("12345".parse::<LicenseCode>().is_err());
        assert!("01234a".parse::<LicenseCode>().is_err());
        assert!("0123456".parse::<LicenseCode>().is_err());
    }

    #[test]
    fn category_menu_numbers_round_trip() {
        assert_eq!(LicenseCategory::ALL.len(), 27);
        assert_eq!(LicenseCategory::by_number(1).unwrap().label(), "衛署藥製");
        assert_eq!(LicenseCategory::by_number(27).unwrap().label(), "內衛菌疫輸");
        assert!(LicenseCategory::by_number(0).is_none());
        assert!(LicenseCategory::by_number(28).is_none());
        for (i, c) in LicenseCategory::ALL.iter().enumerate() {
            assert_eq!(c.number(), i + 1);
        }
    }

    #[test]
    fn category_parses_label_or_number() {
        assert_eq!("2".parse::<LicenseCategory>().unwrap().label(), "衛部藥製");
        assert_eq!(
            "衛部罕藥製".parse::<LicenseCategory>().unwrap().number(),
            16
        );
        assert!("衛部".parse::<LicenseCategory>().is_err());
    }

    #[test]
    fn default_fallback_chain_is_first_four() {
        let config = HarvestConfig::default();
        let labels: Vec<_> = config.fallback_categories.iter().map(|c| c.label()).collect();
        assert_eq!(labels, ["衛署藥製", "衛部藥製", "衛署藥輸", "衛部藥輸"]);
    }

    #[test]
    fn detail_urls_follow_label_kind() {
        let code = LicenseCode::new(42).unwrap();
        let category = LicenseCategory::by_number(2).unwrap();

        let pdf = HarvestConfig::default();
        assert_eq!(
            pdf.detail_url(category, code),
            "https://mcp.fda.gov.tw/im_detail_pdf/衛部藥製第000042號/"
        );

        let electronic = HarvestConfig::builder()
            .label_kind(LabelKind::Electronic)
            .build()
            .unwrap();
        assert_eq!(
            electronic.detail_url(category, code),
            "https://mcp.fda.gov.tw/im_detail_1/衛部藥製字第000042號/"
        );
        assert_eq!(electronic.collection(), "電子仿單");
    }

    #[test]
    fn absolute_url_joins_relative_links() {
        let config = HarvestConfig::default();
        assert_eq!(
            config.absolute_url("/files/a.pdf"),
            "https://mcp.fda.gov.tw/files/a.pdf"
        );
        assert_eq!(
            config.absolute_url("https://cdn.example.org/a.pdf"),
            "https://cdn.example.org/a.pdf"
        );
    }

    #[test]
    fn build_rejects_zero_attempts() {
        assert!(HarvestConfig::builder().max_retries(0).build().is_err());
    }

    #[test]
    fn build_rejects_pinned_index_outside_pool() {
        let err = HarvestConfig::builder()
            .credentials(vec![ApiCredential::new("k1"), ApiCredential::new("k2")])
            .rotation(RotationMode::Pinned(5))
            .build()
            .unwrap_err();
        assert!(matches!(
            err,
            HarvestError::CredentialOutOfRange { index: 5, size: 2 }
        ));
    }
}
