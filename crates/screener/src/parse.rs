//! HTML table and number parsing for Screener.in company pages.

use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};

static SEL_SECTION: Lazy<Selector> = Lazy::new(|| Selector::parse("section").unwrap());
static SEL_DATA_TABLE: Lazy<Selector> = Lazy::new(|| Selector::parse("table.data-table").unwrap());
static SEL_TABLE: Lazy<Selector> = Lazy::new(|| Selector::parse("table").unwrap());
static SEL_HEADER: Lazy<Selector> = Lazy::new(|| Selector::parse("thead th").unwrap());
static SEL_BODY_ROW: Lazy<Selector> = Lazy::new(|| Selector::parse("tbody tr").unwrap());
static SEL_CELL: Lazy<Selector> = Lazy::new(|| Selector::parse("td").unwrap());

static RE_YEAR: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\d{4})").unwrap());

/// Parse a displayed figure: strips `₹`, `,`, `%` and `Cr.`; `--` and
/// anything else non-numeric is `None`.
pub fn parse_number(text: &str) -> Option<f64> {
    let cleaned = text
        .trim()
        .replace(['₹', ',', '%'], "")
        .replace("Cr.", "");
    let cleaned = cleaned.trim();
    if cleaned.is_empty() || cleaned == "--" {
        return None;
    }
    cleaned.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Column header → key suffix: `Mar 2024` → `fy24`, `TTM` → `ttm`.
pub fn year_key(header: &str) -> Option<String> {
    let header = header.trim();
    if let Some(caps) = RE_YEAR.captures(header) {
        let year = &caps[1];
        return Some(format!("fy{}", &year[2..]));
    }
    header.contains("TTM").then(|| "ttm".to_string())
}

/// Text content with each text node trimmed and joined without separators.
pub(crate) fn text_of(el: ElementRef<'_>) -> String {
    el.text().map(str::trim).collect::<Vec<_>>().concat()
}

/// One `data-table` from a page section.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SectionTable {
    /// Column headers, first (row-label) header removed.
    pub headers: Vec<String>,
    /// Row label and its parsed values, in page order.
    pub rows: Vec<(String, Vec<Option<f64>>)>,
}

impl SectionTable {
    /// The row whose label matches one of `names`.
    ///
    /// Exact labels are tried first, then labels with the trailing `+` of an
    /// expandable row removed.
    pub fn find_row(&self, names: &[&str]) -> Option<&[Option<f64>]> {
        let exact = names
            .iter()
            .find_map(|n| self.rows.iter().find(|(label, _)| label == n));
        let row = exact.or_else(|| {
            self.rows.iter().find(|(label, _)| {
                let label = clean_label(label);
                names.iter().any(|n| clean_label(n) == label)
            })
        })?;
        Some(row.1.as_slice())
    }

    /// `key suffix → column index`, e.g. `fy24 → 3`.
    pub fn year_columns(&self) -> Vec<(String, usize)> {
        self.headers
            .iter()
            .enumerate()
            .filter_map(|(i, h)| year_key(h).map(|k| (k, i)))
            .collect()
    }
}

fn clean_label(label: &str) -> &str {
    label.trim().trim_end_matches('+').trim()
}

/// Parse the table in `<section id="{section_id}">`; empty when absent.
pub fn parse_table(doc: &Html, section_id: &str) -> SectionTable {
    let Some(section) = doc
        .select(&SEL_SECTION)
        .find(|s| s.value().id() == Some(section_id))
    else {
        return SectionTable::default();
    };
    let Some(table) = section
        .select(&SEL_DATA_TABLE)
        .next()
        .or_else(|| section.select(&SEL_TABLE).next())
    else {
        return SectionTable::default();
    };

    let headers = table.select(&SEL_HEADER).map(text_of).skip(1).collect();
    let rows = table
        .select(&SEL_BODY_ROW)
        .filter_map(|tr| {
            let mut cells = tr.select(&SEL_CELL);
            let label = text_of(cells.next()?);
            let values = cells.map(|td| parse_number(&text_of(td))).collect();
            Some((label, values))
        })
        .collect();
    SectionTable { headers, rows }
}
