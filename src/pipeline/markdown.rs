//! Markdown normalisation for text fields, and the pipe-table grammar.
//!
//! Report sections are written as light markdown. Slides cannot show
//! headings or links, so those are reduced to their text; emphasis markers
//! are left in place because [`crate::pipeline::richtext`] turns them into
//! bold runs.
//!
//! ## Rule Order
//!
//! Line endings are normalised first so every later rule sees `\n` only.
//! Lines are trimmed before heading markers are stripped, so indented
//! headings are recognised, and before blank runs are collapsed, so lines of
//! stray spaces count as blank.

use once_cell::sync::Lazy;
use regex::Regex;

/// Reduce markdown to slide-ready text with emphasis markers intact.
///
/// Rules (applied in order):
/// 1. Normalise line endings (CRLF/CR → LF)
/// 2. Trim whitespace on every line
/// 3. Strip `#`–`######` heading markers, keeping the heading text
/// 4. Replace `[text](url)` links (and images) with their text
/// 5. Collapse runs of two or more blank lines to a single blank line
/// 6. Trim leading and trailing blank lines
pub fn normalize_text(input: &str) -> String {
    if input.trim().is_empty() {
        return String::new();
    }
    let s = normalise_line_endings(input);
    let s = trim_lines(&s);
    let s = strip_headings(&s);
    let s = strip_links(&s);
    let s = collapse_blank_lines(&s);
    s.trim_matches('\n').to_string()
}

// ── Rule 1: Normalise line endings ───────────────────────────────────────

fn normalise_line_endings(input: &str) -> String {
    input.replace("\r\n", "\n").replace('\r', "\n")
}

// ── Rule 2: Trim each line ───────────────────────────────────────────────

fn trim_lines(input: &str) -> String {
    input.split('\n').map(str::trim).collect::<Vec<_>>().join("\n")
}

// ── Rule 3: Heading markers ──────────────────────────────────────────────

static RE_HEADING: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)^#{1,6}[ \t]*(.+)$").unwrap());

fn strip_headings(input: &str) -> String {
    RE_HEADING.replace_all(input, "$1").into_owned()
}

// ── Rule 4: Links ────────────────────────────────────────────────────────

static RE_LINK: Lazy<Regex> = Lazy::new(|| Regex::new(r"!?\[([^\]]+)\]\([^)]*\)").unwrap());

fn strip_links(input: &str) -> String {
    RE_LINK.replace_all(input, "$1").into_owned()
}

// ── Rule 5: Blank-line runs ──────────────────────────────────────────────

static RE_BLANK_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{3,}").unwrap());

fn collapse_blank_lines(input: &str) -> String {
    RE_BLANK_RUN.replace_all(input, "\n\n").into_owned()
}

// ── Pipe tables ──────────────────────────────────────────────────────────

/// `true` when the text contains at least one pipe-table row.
pub fn looks_like_pipe_table(text: &str) -> bool {
    !parse_pipe_table(text).is_empty()
}

/// Parse GitHub-style pipe rows into cells.
///
/// Any line containing `|` is a row unless it is blank or a separator (it
/// contains `---`). Cells are trimmed, and the empty cell produced by an outer
/// pipe at either end is dropped. Row 0 is simply the first qualifying line.
/// Literal pipes cannot be escaped.
pub fn parse_pipe_table(text: &str) -> Vec<Vec<String>> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && line.contains('|') && !line.contains("---"))
        .filter_map(|line| {
            let mut cells: Vec<String> = line.split('|').map(|c| c.trim().to_string()).collect();
            if line.ends_with('|') && cells.last().is_some_and(String::is_empty) {
                cells.pop();
            }
            if line.starts_with('|') && cells.first().is_some_and(String::is_empty) {
                cells.remove(0);
            }
            (!cells.is_empty()).then_some(cells)
        })
        .collect()
}

/// Render rows as a pipe table with a separator under the first row.
pub fn render_table_as_markdown(rows: &[Vec<String>]) -> String {
    let mut lines = Vec::with_capacity(rows.len() + 1);
    for (i, row) in rows.iter().enumerate() {
        lines.push(format!("| {} |", row.join(" | ")));
        if i == 0 {
            let sep = vec!["---"; row.len().max(1)].join(" | ");
            lines.push(format!("| {sep} |"));
        }
    }
    lines.join("\n")
}
