//! HTML fragment → Markdown for electronic-label sections.
//!
//! Label bodies are mostly paragraphs, line breaks, lists and dosage tables.
//! Tables become GFM rows where a cell spanning N columns is followed by N
//! pipes, so merged header cells keep the column count aligned. A separator
//! row is emitted after the first row of every table; the section cleanup in
//! [`crate::pipeline::postprocess::clean_table_markdown`] collapses repeats.

use once_cell::sync::Lazy;
use scraper::node::Node;
use scraper::{ElementRef, Selector};

static ROW: Lazy<Selector> = Lazy::new(|| Selector::parse("tr").unwrap());

const BLOCKS: &[&str] = &[
    "p", "div", "section", "article", "ul", "ol", "blockquote", "pre", "dl", "dt", "dd",
];

/// Render the contents of `element` as Markdown.
pub fn to_markdown(element: ElementRef<'_>) -> String {
    let mut out = String::new();
    render_children(element, &mut out);
    tidy(&out)
}

fn render_children(element: ElementRef<'_>, out: &mut String) {
    for child in element.children() {
        match child.value() {
            Node::Text(text) => push_inline(out, text),
            Node::Element(_) => {
                if let Some(el) = ElementRef::wrap(child) {
                    render_element(el, out);
                }
            }
            _ => {}
        }
    }
}

fn render_element(el: ElementRef<'_>, out: &mut String) {
    let name = el.value().name();
    match name {
        "script" | "style" | "head" => {}
        "br" => out.push('\n'),
        "table" => {
            block_break(out);
            out.push_str(&render_table(el));
            block_break(out);
        }
        "li" => {
            line_break(out);
            out.push_str("- ");
            render_children(el, out);
            line_break(out);
        }
        "h1" | "h2" | "h3" | "h4" | "h5" | "h6" => {
            let level = name[1..].parse::<usize>().unwrap_or(1);
            block_break(out);
            out.push_str(&"#".repeat(level));
            out.push(' ');
            render_children(el, out);
            block_break(out);
        }
        _ if BLOCKS.contains(&name) => {
            block_break(out);
            render_children(el, out);
            block_break(out);
        }
        _ => render_children(el, out),
    }
}

/// Render one `<table>`, honouring `colspan`.
fn render_table(table: ElementRef<'_>) -> String {
    let mut lines: Vec<String> = Vec::new();

    for row in table.select(&ROW) {
        let mut line = String::from("|");
        let mut columns = 0usize;

        for cell in row
            .children()
            .filter_map(ElementRef::wrap)
            .filter(|c| matches!(c.value().name(), "td" | "th"))
        {
            let span = cell
                .value()
                .attr("colspan")
                .and_then(|v| v.trim().parse::<usize>().ok())
                .unwrap_or(1)
                .max(1);
            line.push(' ');
            line.push_str(&cell_text(cell));
            line.push_str(&" |".repeat(span));
            columns += span;
        }

        if columns == 0 {
            continue;
        }
        lines.push(line);
        if lines.len() == 1 {
            lines.push(format!("|{}", " --- |".repeat(columns)));
        }
    }

    lines.join("\n")
}

fn cell_text(cell: ElementRef<'_>) -> String {
    let raw: String = cell.text().collect::<Vec<_>>().join(" ");
    collapse(&raw).trim().to_string()
}

/// Append text with HTML whitespace semantics: runs collapse to one space.
fn push_inline(out: &mut String, text: &str) {
    let collapsed = collapse(text);
    if collapsed.is_empty() {
        return;
    }
    let at_line_start = out.is_empty() || out.ends_with('\n');
    let collapsed = if at_line_start || out.ends_with(' ') {
        collapsed.trim_start()
    } else {
        collapsed.as_str()
    };
    out.push_str(collapsed);
}

fn collapse(text: &str) -> String {
    let mut result = String::with_capacity(text.len());
    let mut in_space = false;
    for c in text.chars() {
        if matches!(c, ' ' | '\t' | '\n' | '\r') {
            if !in_space {
                result.push(' ');
                in_space = true;
            }
        } else {
            result.push(c);
            in_space = false;
        }
    }
    result
}

fn line_break(out: &mut String) {
    trim_trailing_spaces(out);
    if !out.is_empty() && !out.ends_with('\n') {
        out.push('\n');
    }
}

fn block_break(out: &mut String) {
    line_break(out);
    if !out.is_empty() && !out.ends_with("\n\n") {
        out.push('\n');
    }
}

fn trim_trailing_spaces(out: &mut String) {
    let trimmed = out.trim_end_matches(' ').len();
    out.truncate(trimmed);
}

fn tidy(out: &str) -> String {
    let mut result: Vec<&str> = Vec::new();
    let mut blank_run = 0;
    for line in out.lines().map(str::trim_end) {
        if line.is_empty() {
            blank_run += 1;
            if blank_run > 1 {
                continue;
            }
        } else {
            blank_run = 0;
        }
        result.push(line);
    }
    result.join("\n").trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use scraper::Html;

    fn render(fragment: &str) -> String {
        let doc = Html::parse_fragment(&format!("<div id=\"root\">{fragment}</div>"));
        let root = Selector::parse("#root").unwrap();
        to_markdown(doc.select(&root).next().unwrap())
    }

    #[test]
    fn paragraphs_and_breaks() {
        assert_eq!(render("<p>第一段</p><p>第二  段<br>續行</p>"), "第一段\n\n第二 段\n續行");
    }

    #[test]
    fn list_items_become_bullets() {
        assert_eq!(render("<ul><li>頭痛</li><li>發燒</li></ul>"), "- 頭痛\n- 發燒");
    }

    #[test]
    fn table_with_header_separator() {
        let md = render("<table><tr><th>年齡</th><th>劑量</th></tr><tr><td>成人</td><td>1 錠</td></tr></table>");
        assert_eq!(md, "| 年齡 | 劑量 |\n| --- | --- |\n| 成人 | 1 錠 |");
    }

    #[test]
    fn colspan_repeats_pipes() {
        let md = render("<table><tr><td colspan=\"2\">用量</td></tr><tr><td>a</td><td>b</td></tr></table>");
        let lines: Vec<&str> = md.lines().collect();
        assert_eq!(lines[0], "| 用量 | |");
        assert_eq!(lines[1], "| --- | --- |");
        assert_eq!(lines[2], "| a | b |");
    }

    #[test]
    fn empty_cells_render_as_pipe_only_rows() {
        let md = render("<table><tr><td>x</td><td>y</td></tr><tr><td></td><td> </td></tr></table>");
        assert!(md.ends_with("|  |  |"), "got: {md:?}");
    }

    #[test]
    fn scripts_are_skipped() {
        assert_eq!(render("<p>可見</p><script>var x = 1;</script>"), "可見");
    }
}
