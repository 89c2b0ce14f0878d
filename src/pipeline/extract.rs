//! Field extraction from registry detail pages.
//!
//! Detail pages lay metadata out as `<label>中文品名</label><span>…</span>`
//! pairs. Each field is looked up by exact label text and read from the first
//! `<span>` sibling after it. A missing label yields an empty string.

use crate::config::HarvestConfig;
use crate::output::{DocumentRecord, LabelSection, RenditionCandidate};
use crate::pipeline::markup;
use crate::pipeline::naming::sanitize_segment;
use crate::pipeline::postprocess::clean_table_markdown;
use once_cell::sync::Lazy;
use scraper::{ElementRef, Html, Selector};

static LABEL: Lazy<Selector> = Lazy::new(|| Selector::parse("label").unwrap());
static ANCHOR: Lazy<Selector> = Lazy::new(|| Selector::parse("a[href]").unwrap());
static TOGGLE: Lazy<Selector> =
    Lazy::new(|| Selector::parse("div.toggle-all div.toggle").unwrap());
static TOGGLE_TITLE: Lazy<Selector> = Lazy::new(|| Selector::parse("span.title-name").unwrap());
static TOGGLE_BODY: Lazy<Selector> =
    Lazy::new(|| Selector::parse("div.toggle-inner > div").unwrap());

/// Extract the licence metadata from a parsed detail page.
pub fn extract(document: &Html) -> DocumentRecord {
    DocumentRecord {
        zh_name: sanitize_segment(&field(document, "中文品名")),
        en_name: field(document, "英文品名"),
        license_code: field(document, "許可證號"),
        drug_category: field(document, "藥品類別"),
        dosage_form: field(document, "劑型"),
        expiry_status: collapse_whitespace(&field(document, "有效日期")),
        applicant_name: collapse_whitespace(&field(document, "申請商名稱")),
        applicant_address: field(document, "申請商地址"),
    }
}

/// Convenience wrapper over [`extract`] for raw HTML.
pub fn extract_html(html: &str) -> DocumentRecord {
    extract(&Html::parse_document(html))
}

/// Value of the first `<span>` following the `<label>` whose text is `label`.
pub fn field(document: &Html, label: &str) -> String {
    document
        .select(&LABEL)
        .find(|el| el.text().collect::<String>().trim() == label)
        .and_then(|el| {
            el.next_siblings()
                .filter_map(ElementRef::wrap)
                .find(|sib| sib.value().name() == "span")
        })
        .map(|span| span.text().collect::<String>().trim().to_string())
        .unwrap_or_default()
}

/// Rendition links, in document order: anchors whose text ends with `.pdf`.
pub fn renditions(document: &Html, config: &HarvestConfig) -> Vec<RenditionCandidate> {
    document
        .select(&ANCHOR)
        .filter_map(|a| {
            let text = a.text().collect::<String>().trim().to_string();
            if !text.to_lowercase().ends_with(".pdf") {
                return None;
            }
            let href = a.value().attr("href")?.trim();
            if href.is_empty() {
                return None;
            }
            Some(RenditionCandidate {
                url: config.absolute_url(href),
                link_text: text,
            })
        })
        .collect()
}

/// Collapsible sections of an electronic label, rendered and cleaned.
///
/// An empty result means the page carries no label body.
pub fn sections(document: &Html) -> Vec<LabelSection> {
    document
        .select(&TOGGLE)
        .filter_map(|toggle| {
            let title = toggle
                .select(&TOGGLE_TITLE)
                .next()?
                .text()
                .collect::<String>()
                .trim()
                .to_string();
            if title.is_empty() {
                return None;
            }
            let raw: String = toggle
                .select(&TOGGLE_BODY)
                .map(markup::to_markdown)
                .collect::<Vec<_>>()
                .join("\n");
            let body = clean_table_markdown(raw.replace('\u{a0}', " ").trim());
            Some(LabelSection { title, body })
        })
        .collect()
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}
