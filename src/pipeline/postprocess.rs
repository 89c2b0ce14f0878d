//! Post-processing: deterministic cleanup of converted label text.
//!
//! The parsing service emits Markdown where every heading is followed by a
//! blank line, and the electronic-label tables come out with empty filler
//! rows and one header separator per sub-table. The rules here fix those
//! artefacts without touching content, and pull the indication line out for
//! the archive filename.
//!
//! ## Rule Order
//!
//! Line endings are normalised first so heading detection sees clean lines;
//! the final-newline pass runs last. Every rule is a pure `&str → String`
//! function and the whole of [`clean_text`] is idempotent.

use crate::output::ParsedText;
use crate::pipeline::naming::excerpt_suffix;
use once_cell::sync::Lazy;
use regex::Regex;

/// Normalised text plus the filename excerpt derived from it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Normalized {
    pub text: String,
    pub indication: Option<String>,
}

/// Concatenate parser segments in order and clean the result.
///
/// The indication excerpt is taken from the first indication heading in the
/// cleaned text and reduced by [`excerpt_suffix`].
pub fn normalize(segments: &[ParsedText], max_excerpt_chars: usize) -> Normalized {
    let joined = segments
        .iter()
        .map(|s| s.text.as_str())
        .collect::<Vec<_>>()
        .join("\n");
    let text = clean_text(&joined);
    let indication = extract_indication(&text).and_then(|raw| excerpt_suffix(&raw, max_excerpt_chars));
    Normalized { text, indication }
}

/// Apply all text rules in order:
/// 1. Normalise line endings (CRLF → LF)
/// 2. Strip invisible Unicode (zero-width spaces, BOM, soft hyphens)
/// 3. Drop blank lines directly after headings, except label-prompt headings
///    that end in a colon
/// 4. Ensure the text ends with exactly one newline
pub fn clean_text(input: &str) -> String {
    let s = normalise_line_endings(input);
    let s = remove_invisible_chars(&s);
    let s = collapse_blank_after_headings(&s);
    ensure_final_newline(&s)
}

// ── Rule 1: Normalise line endings ───────────────────────────────────────────

fn normalise_line_endings(input: &str) -> String {
    input.replace("\r\n", "\n").replace('\r', "\n")
}

// ── Rule 2: Remove invisible Unicode characters ─────────────────────────────

fn remove_invisible_chars(input: &str) -> String {
    input.replace(
        [
            '\u{200B}', '\u{FEFF}', '\u{00AD}', '\u{200C}', '\u{200D}', '\u{2060}',
        ],
        "",
    )
}

// ── Rule 3: Collapse blank lines after headings ─────────────────────────────

fn is_heading(line: &str) -> bool {
    line.starts_with('#')
}

/// A heading such as `## 注意事項:` introduces a prompt whose following
/// blank line is meaningful.
fn is_label_prompt(line: &str) -> bool {
    let t = line.trim_end();
    t.ends_with(':') || t.ends_with('：')
}

fn collapse_blank_after_headings(input: &str) -> String {
    let mut result: Vec<&str> = Vec::new();
    let mut skip_blank = false;

    for line in input.lines() {
        if is_heading(line) && !is_label_prompt(line) {
            result.push(line);
            skip_blank = true;
        } else if line.trim().is_empty() && skip_blank {
            continue;
        } else {
            result.push(line);
            skip_blank = false;
        }
    }

    result.join("\n")
}

// ── Rule 4: Ensure file ends with single newline ─────────────────────────────

fn ensure_final_newline(input: &str) -> String {
    let trimmed = input.trim_end();
    if trimmed.is_empty() {
        String::from("\n")
    } else {
        format!("{}\n", trimmed)
    }
}

// ── Indication capture ───────────────────────────────────────────────────────

static RE_INDICATION: Lazy<Regex> = Lazy::new(|| Regex::new(r"適\s*應\s*症").unwrap());

const PROMPT_PUNCTUATION: &[char] = &[':', '：', '(', ')', '（', '）', '【', '】', '[', ']'];

/// Text following the first "indications" heading.
///
/// Returns the remainder of the heading line when it carries text, otherwise
/// the next non-empty line. Nothing is captured when that line is itself a
/// heading.
pub fn extract_indication(text: &str) -> Option<String> {
    let mut lines = text.lines();

    while let Some(line) = lines.next() {
        if !line.trim_start().starts_with('#') {
            continue;
        }
        let Some(m) = RE_INDICATION.find(line) else {
            continue;
        };

        let tail = line[m.end()..]
            .trim()
            .trim_start_matches(PROMPT_PUNCTUATION)
            .trim_end_matches(PROMPT_PUNCTUATION)
            .trim();
        if !tail.is_empty() {
            return Some(tail.to_string());
        }

        let next = lines.find(|l| !l.trim().is_empty())?;
        if next.trim_start().starts_with('#') {
            return None;
        }
        return Some(next.trim().to_string());
    }

    None
}

// ── Table cleanup (electronic-label sections) ────────────────────────────────

/// Clean a Markdown section rendered from label HTML:
/// 1. Drop rows made only of pipes (empty filler rows)
/// 2. Merge blank-line runs into a single line break
/// 3. Keep only the first header-separator row of the section
pub fn clean_table_markdown(input: &str) -> String {
    let mut seen_separator = false;
    input
        .lines()
        .filter(|line| !is_pipe_only_row(line))
        .filter(|line| !line.trim().is_empty())
        .filter(|line| {
            if is_separator_row(line) {
                let first = !seen_separator;
                seen_separator = true;
                first
            } else {
                true
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn is_pipe_only_row(line: &str) -> bool {
    let trimmed = line.trim();
    trimmed.starts_with('|')
        && trimmed.matches('|').count() >= 2
        && trimmed.chars().all(|c| c == '|' || c.is_whitespace())
}

fn is_separator_row(line: &str) -> bool {
    let trimmed = line.trim();
    if !trimmed.starts_with('|') || !trimmed.contains("---") {
        return false;
    }
    // A separator row contains only |, -, :, and whitespace
    trimmed
        .chars()
        .all(|c| c == '|' || c == '-' || c == ':' || c == ' ')
}

// ── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn segs(parts: &[&str]) -> Vec<ParsedText> {
        parts.iter().map(|p| ParsedText::new(*p)).collect()
    }

    #[test]
    fn test_blank_lines_after_heading_removed() {
        let input = "# 藥品名稱\n\n\n測試藥品\n\n段落";
        assert_eq!(clean_text(input), "# 藥品名稱\n測試藥品\n\n段落\n");
    }

    #[test]
    fn test_label_prompt_heading_keeps_blank_line() {
        let input = "## 注意事項:\n\n請遵醫囑\n## 保存條件：\n\n室溫";
        assert_eq!(clean_text(input), input.to_string() + "\n");
    }

    #[test]
    fn test_whitespace_only_lines_count_as_blank() {
        assert_eq!(clean_text("# A\n   \n\t\nbody"), "# A\nbody\n");
    }

    #[test]
    fn test_normalise_line_endings() {
        assert_eq!(normalise_line_endings("a\r\nb\rc"), "a\nb\nc");
    }

    #[test]
    fn test_remove_invisible() {
        let input = "緩解\u{200B}疼痛\u{FEFF}";
        assert_eq!(remove_invisible_chars(input), "緩解疼痛");
    }

    #[test]
    fn test_ensure_final_newline() {
        assert_eq!(ensure_final_newline("hello"), "hello\n");
        assert_eq!(ensure_final_newline("hello\n\n\n"), "hello\n");
        assert_eq!(ensure_final_newline(""), "\n");
    }

    #[test]
    fn test_normalize_is_idempotent() {
        let samples = [
            "# 標題\n\n\n內容\r\n## 適應症\n\n緩解疼痛。\n\n\n\n## 用法:\n\n每日一次\n",
            "",
            "\n\n\n",
            "# only heading",
            "text\n\n# h\n\n\n# h2\n\n",
            "# a\n\u{200B}\n b",
        ];
        for sample in samples {
            let once = normalize(&segs(&[sample]), 40);
            let twice = normalize(&segs(&[&once.text]), 40);
            assert_eq!(once, twice, "not idempotent for {sample:?}");
        }
    }

    #[test]
    fn test_segments_are_concatenated_in_order() {
        let out = normalize(&segs(&["# 第一頁\n\n內容一", "內容二"]), 40);
        assert_eq!(out.text, "# 第一頁\n內容一\n內容二\n");
    }

    #[test]
    fn test_blank_after_heading_at_segment_boundary() {
        let out = normalize(&segs(&["前言\n# 第二章", "\n正文"]), 40);
        assert_eq!(out.text, "前言\n# 第二章\n正文\n");
    }

    #[test]
    fn test_indication_on_next_line() {
        let text = "# 說明\n## 適應症\n\n緩解頭痛、牙痛。其他\n## 用法";
        assert_eq!(extract_indication(text).as_deref(), Some("緩解頭痛、牙痛。其他"));
        let out = normalize(&segs(&[text]), 40);
        assert_eq!(out.indication.as_deref(), Some("緩解頭痛、牙痛"));
    }

    #[test]
    fn test_indication_on_heading_line() {
        let text = "### 【適應症】：緩解疼痛\n其他";
        assert_eq!(extract_indication(text).as_deref(), Some("緩解疼痛"));
    }

    #[test]
    fn test_indication_with_spaced_token() {
        let text = "# 適 應 症\n治療高血壓";
        assert_eq!(extract_indication(text).as_deref(), Some("治療高血壓"));
    }

    #[test]
    fn test_indication_ignores_body_mentions() {
        assert_eq!(extract_indication("本品適應症請見說明\n# 用法\n口服"), None);
    }

    #[test]
    fn test_indication_followed_by_heading_is_absent() {
        assert_eq!(extract_indication("## 適應症\n\n## 用法\n口服"), None);
    }

    #[test]
    fn test_excerpt_is_bounded() {
        let long = format!("# 適應症\n{}", "緩解疼痛".repeat(30));
        let out = normalize(&segs(&[&long]), 40);
        let excerpt = out.indication.unwrap();
        assert_eq!(excerpt.chars().count(), 40);
    }

    #[test]
    fn test_no_indication_heading() {
        let out = normalize(&segs(&["# 成分\n每錠含 500mg"]), 40);
        assert_eq!(out.indication, None);
    }

    #[test]
    fn test_pipe_only_rows_removed() {
        let input = "| 年齡 | 劑量 |\n| --- | --- |\n|  |  |\n| 成人 | 1 錠 |";
        assert_eq!(
            clean_table_markdown(input),
            "| 年齡 | 劑量 |\n| --- | --- |\n| 成人 | 1 錠 |"
        );
    }

    #[test]
    fn test_repeated_separators_collapse_to_first() {
        let input = "| A | B |\n| --- | --- |\n| 1 | 2 |\n\n| C | D |\n| --- | --- |\n| 3 | 4 |";
        let result = clean_table_markdown(input);
        let sep_count = result.lines().filter(|l| is_separator_row(l)).count();
        assert_eq!(sep_count, 1, "Only one separator should remain");
        assert_eq!(result.lines().nth(1), Some("| --- | --- |"));
        assert!(result.contains("| 3 | 4 |"), "Data rows should remain");
    }

    #[test]
    fn test_blank_runs_merged() {
        assert_eq!(clean_table_markdown("甲\n\n \n\n乙"), "甲\n乙");
    }
}
