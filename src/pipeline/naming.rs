//! Archive filenames: `{code}-{name}[-{indication}].md`.
//!
//! Every component is sanitized to a single safe path segment. A later run
//! with the same code and category overwrites the earlier artifact; there is
//! no versioning.

use crate::output::DocumentRecord;

/// Characters no archive filename may contain on any supported filesystem.
const RESERVED: &[char] = &['/', '\\', ':', '*', '?', '"', '<', '>', '|'];

/// Windows device names that cannot be used as a filename stem.
const RESERVED_NAMES: &[&str] = &[
    "CON", "PRN", "AUX", "NUL", "COM1", "COM2", "COM3", "COM4", "COM5", "COM6", "COM7", "COM8",
    "COM9", "LPT1", "LPT2", "LPT3", "LPT4", "LPT5", "LPT6", "LPT7", "LPT8", "LPT9",
];

/// Strip reserved and control characters so `input` is a safe path segment.
///
/// Leading/trailing whitespace and trailing dots are removed. Returns an
/// empty string when nothing usable remains.
pub fn sanitize_segment(input: &str) -> String {
    let cleaned: String = input
        .chars()
        .filter(|c| !RESERVED.contains(c) && !c.is_control())
        .collect();
    let cleaned = cleaned.trim().trim_end_matches('.').trim_end();

    if cleaned == "." || cleaned == ".." {
        return String::new();
    }
    if RESERVED_NAMES
        .iter()
        .any(|n| n.eq_ignore_ascii_case(cleaned))
    {
        return format!("_{cleaned}");
    }
    cleaned.to_string()
}

/// Reduce captured indication text to a filename suffix.
///
/// Keeps text up to the first newline or sentence terminator, drops
/// filename-unsafe characters plus spaces, `|` and `-`, then keeps at most
/// `max_chars` characters.
pub fn excerpt_suffix(text: &str, max_chars: usize) -> Option<String> {
    let first = text
        .split(['\n', '。', '！', '？'])
        .next()
        .unwrap_or("");
    let kept: String = first
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '-' && *c != '|')
        .collect();
    let safe = sanitize_segment(&kept);
    let truncated: String = safe.chars().take(max_chars).collect();
    let truncated = sanitize_segment(&truncated);
    (!truncated.is_empty()).then_some(truncated)
}

/// Stem shared by the text and binary artifacts: `{code}-{name}`.
///
/// Falls back to `fallback_code` alone when sanitization leaves nothing.
pub fn base_stem(record: &DocumentRecord, fallback_code: &str) -> String {
    let code = sanitize_segment(&record.license_code);
    let name = sanitize_segment(&record.zh_name);
    match (code.is_empty(), name.is_empty()) {
        (false, false) => format!("{code}-{name}"),
        _ => fallback_code.to_string(),
    }
}

/// Final Markdown filename for a record and optional indication excerpt.
pub fn name_for(record: &DocumentRecord, indication: Option<&str>, fallback_code: &str) -> String {
    let stem = base_stem(record, fallback_code);
    match indication.map(sanitize_segment).filter(|s| !s.is_empty()) {
        Some(excerpt) => format!("{stem}-{excerpt}.md"),
        None => format!("{stem}.md"),
    }
}

/// Filename for the rendition binary kept next to the text artifact.
pub fn binary_name_for(record: &DocumentRecord, fallback_code: &str) -> String {
    format!("{}.pdf", base_stem(record, fallback_code))
}
