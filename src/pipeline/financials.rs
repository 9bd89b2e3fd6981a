//! Financial summary synthesis.
//!
//! Records carry sparse per-year figures under inconsistent names:
//! `revenue_fy24`, `sales_fy2025`, `pat_fy26e`. This module reads them
//! tolerantly, derives growth and margin, and lays out the fixed summary grid
//! the template expects. Nothing here fails: an unavailable figure is `"-"`.

use crate::config::FiscalWindow;
use crate::pipeline::markdown::parse_pipe_table;
use crate::record::ReportRecord;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

/// Placeholder for an unavailable cell.
pub const UNAVAILABLE: &str = "-";

/// A metric row source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Metric {
    Sales,
    Ebitda,
    Pat,
    Eps,
    Pe,
    Pb,
}

impl Metric {
    /// Key prefixes, in lookup order.
    pub fn prefixes(self) -> &'static [&'static str] {
        match self {
            Metric::Sales => &["revenue", "sales"],
            Metric::Ebitda => &["ebitda"],
            Metric::Pat => &["pat"],
            Metric::Eps => &["eps"],
            Metric::Pe => &["pe"],
            Metric::Pb => &["pb"],
        }
    }

    /// Prefix used for derived keys such as `revenue_growth_fy25`.
    fn canonical(self) -> &'static str {
        self.prefixes()[0]
    }
}

/// The key spellings accepted for one prefix and two-digit year.
fn year_keys(prefix: &str, year: u32) -> [String; 4] {
    [
        format!("{prefix}_fy{year:02}"),
        format!("{prefix}_fy{year:02}e"),
        format!("{prefix}_fy20{year:02}"),
        format!("{prefix}_fy20{year:02}e"),
    ]
}

/// The metric's value for a fiscal year, trying every prefix and spelling.
pub fn metric_value(record: &ReportRecord, metric: Metric, year: u32) -> Option<f64> {
    metric.prefixes().iter().find_map(|prefix| {
        let keys = year_keys(prefix, year);
        record.number_any(keys.iter().map(String::as_str))
    })
}

fn derived_value(record: &ReportRecord, prefix: &str, year: u32) -> Option<f64> {
    let keys = year_keys(prefix, year);
    record.number_any(keys.iter().map(String::as_str))
}

// ── Formatting ───────────────────────────────────────────────────────────

/// Thousands separators, no decimals: `12345.6` → `12,346`.
pub fn format_amount(value: f64) -> String {
    let fixed = format!("{value:.0}");
    let (sign, digits) = match fixed.strip_prefix('-') {
        Some(d) => (if d == "0" { "" } else { "-" }, d),
        None => ("", fixed.as_str()),
    };
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    format!("{sign}{grouped}")
}

/// One decimal place: `21` → `21.0`.
pub fn format_ratio(value: f64) -> String {
    let s = format!("{value:.1}");
    if s == "-0.0" {
        "0.0".to_string()
    } else {
        s
    }
}

fn or_dash(value: Option<f64>, format: fn(f64) -> String) -> String {
    value.map_or_else(|| UNAVAILABLE.to_string(), format)
}

// ── Derivations ──────────────────────────────────────────────────────────

/// Year-over-year growth in percent. `None` when either side is missing or
/// the previous value is zero.
pub fn growth(current: Option<f64>, previous: Option<f64>) -> Option<f64> {
    match (current, previous) {
        (Some(c), Some(p)) if p != 0.0 => Some((c - p) / p.abs() * 100.0),
        _ => None,
    }
}

/// EBITDA margin in percent. `None` when either side is missing or sales are zero.
pub fn margin(ebitda: Option<f64>, sales: Option<f64>) -> Option<f64> {
    match (ebitda, sales) {
        (Some(e), Some(s)) if s != 0.0 => Some(e / s * 100.0),
        _ => None,
    }
}

/// Computed growth, falling back to a stated `{prefix}_growth_fy{yy}` figure.
fn growth_for(record: &ReportRecord, metric: Metric, year: u32) -> Option<f64> {
    let computed = growth(
        metric_value(record, metric, year),
        year.checked_sub(1).and_then(|prev| metric_value(record, metric, prev)),
    );
    computed.or_else(|| {
        metric
            .prefixes()
            .iter()
            .find_map(|p| derived_value(record, &format!("{p}_growth"), year))
    })
}

fn margin_for(record: &ReportRecord, year: u32) -> Option<f64> {
    margin(
        metric_value(record, Metric::Ebitda, year),
        metric_value(record, Metric::Sales, year),
    )
    .or_else(|| derived_value(record, "ebitda_margin", year))
}

// ── Grid ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GridSource {
    /// Taken verbatim from a markdown table in the record.
    Markdown,
    /// Synthesised from per-year metric fields.
    Computed,
}

/// The financial summary: a header row followed by data rows.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FinancialGrid {
    pub rows: Vec<Vec<String>>,
    pub source: GridSource,
}

impl FinancialGrid {
    /// Cell text; `None` outside the grid.
    pub fn cell(&self, row: usize, col: usize) -> Option<&str> {
        self.rows.get(row).and_then(|r| r.get(col)).map(String::as_str)
    }

    /// Data row by its first-column label (first match).
    pub fn row(&self, label: &str) -> Option<&[String]> {
        self.rows
            .iter()
            .find(|r| r.first().is_some_and(|c| c == label))
            .map(Vec::as_slice)
    }
}

/// Row labels of the synthesised grid, after the header.
pub const ROW_LABELS: [&str; 8] = [
    "Sales",
    "YoY% growth",
    "EBITDA",
    "% Margin",
    "PAT",
    "YoY% growth",
    "P/E",
    "P/B",
];

/// Field whose pipe-table content, when present, is used verbatim.
pub const MARKDOWN_FIELD: &str = "financial_performance";

/// Build the summary grid.
///
/// A pipe table in `financial_performance` wins outright. Otherwise the
/// grid is computed over `window`: header plus the eight [`ROW_LABELS`] rows,
/// each `1 + window.len` cells wide.
pub fn build_financial_grid(record: &ReportRecord, window: &FiscalWindow) -> FinancialGrid {
    if let Some(text) = record.text(MARKDOWN_FIELD).filter(|t| t.contains('|')) {
        let rows = parse_pipe_table(&text);
        if !rows.is_empty() {
            return FinancialGrid {
                rows,
                source: GridSource::Markdown,
            };
        }
    }

    let years: Vec<u32> = window.years().collect();
    let amount = |m: Metric| move |y: u32| or_dash(metric_value(record, m, y), format_amount);
    let yoy = |m: Metric| move |y: u32| or_dash(growth_for(record, m, y), format_ratio);
    let ratio = |m: Metric| move |y: u32| or_dash(metric_value(record, m, y), format_ratio);
    let margin_cell = |y: u32| or_dash(margin_for(record, y), format_ratio);

    let rows = vec![
        labelled_row("Particulars", &years, |y| window.label(y)),
        labelled_row(ROW_LABELS[0], &years, amount(Metric::Sales)),
        labelled_row(ROW_LABELS[1], &years, yoy(Metric::Sales)),
        labelled_row(ROW_LABELS[2], &years, amount(Metric::Ebitda)),
        labelled_row(ROW_LABELS[3], &years, margin_cell),
        labelled_row(ROW_LABELS[4], &years, amount(Metric::Pat)),
        labelled_row(ROW_LABELS[5], &years, yoy(Metric::Pat)),
        labelled_row(ROW_LABELS[6], &years, ratio(Metric::Pe)),
        labelled_row(ROW_LABELS[7], &years, ratio(Metric::Pb)),
    ];
    FinancialGrid {
        rows,
        source: GridSource::Computed,
    }
}

fn labelled_row(label: &str, years: &[u32], cell: impl Fn(u32) -> String) -> Vec<String> {
    std::iter::once(label.to_string())
        .chain(years.iter().map(|&y| cell(y)))
        .collect()
}

// ── Dynamic metric tokens ────────────────────────────────────────────────

static RE_METRIC_KEY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(revenue|sales|ebitda|pat|eps|pe|pb)_(?:(margin|growth)_)?fy(\d{2}|\d{4})(e?)$").unwrap()
});

/// `true` when the record holds at least one numeric metric/year field.
pub fn has_metric_fields(record: &ReportRecord) -> bool {
    record
        .keys()
        .any(|k| RE_METRIC_KEY.is_match(k) && record.number(k).is_some())
}

/// Every numeric metric/year field as a `(token, formatted value)` pair.
///
/// Growth and margin figures, and any value under 100 in magnitude, get one
/// decimal place; larger values get thousands separators.
pub fn dynamic_fields(record: &ReportRecord) -> Vec<(String, String)> {
    record
        .keys()
        .filter_map(|key| {
            let caps = RE_METRIC_KEY.captures(key)?;
            let value = record.number(key)?;
            let percent_like = caps.get(2).is_some();
            let text = if percent_like || value.abs() < 100.0 {
                format_ratio(value)
            } else {
                format_amount(value)
            };
            Some((key.to_string(), text))
        })
        .collect()
}

/// A copy of `record` with growth and margin fields added where they can be
/// computed and are not already present. The input is never modified.
pub fn enrich(record: &ReportRecord, window: &FiscalWindow) -> ReportRecord {
    let mut out = record.clone();
    for year in window.years() {
        for metric in [Metric::Sales, Metric::Ebitda, Metric::Pat, Metric::Eps] {
            let key = format!("{}_growth_fy{year:02}", metric.canonical());
            if out.has(&key) {
                continue;
            }
            let prev = year.checked_sub(1).and_then(|p| metric_value(record, metric, p));
            if let Some(g) = growth(metric_value(record, metric, year), prev) {
                out.set_number(key, round1(g));
            }
        }
        let key = format!("ebitda_margin_fy{year:02}");
        if !out.has(&key) {
            let m = margin(
                metric_value(record, Metric::Ebitda, year),
                metric_value(record, Metric::Sales, year),
            );
            if let Some(m) = m {
                out.set_number(key, round1(m));
            }
        }
    }
    out
}

fn round1(v: f64) -> f64 {
    (v * 10.0).round() / 10.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn rec(v: serde_json::Value) -> ReportRecord {
        ReportRecord::from_value(v).unwrap()
    }

    fn grid(v: serde_json::Value) -> FinancialGrid {
        build_financial_grid(&rec(v), &FiscalWindow::default())
    }

    #[test]
    fn amounts_get_separators() {
        assert_eq!(format_amount(1234567.4), "1,234,567");
        assert_eq!(format_amount(999.0), "999");
        assert_eq!(format_amount(-12345.0), "-12,345");
        assert_eq!(format_amount(-0.2), "0");
    }

    #[test]
    fn growth_ten_percent() {
        let g = grid(json!({"revenue_fy24": 100, "revenue_fy25": 110}));
        assert_eq!(g.cell(2, 2), Some("10.0"));
    }

    #[test]
    fn growth_with_zero_previous_is_dash() {
        let g = grid(json!({"revenue_fy24": 0, "revenue_fy25": 110}));
        assert_eq!(g.cell(2, 2), Some("-"));
    }

    #[test]
    fn first_year_growth_uses_prior_actual() {
        let g = grid(json!({"revenue_fy23": 80, "revenue_fy24": 100}));
        assert_eq!(g.cell(2, 1), Some("25.0"));
        let g = grid(json!({"revenue_fy24": 100}));
        assert_eq!(g.cell(2, 1), Some("-"));
    }

    #[test]
    fn margin_thirty_percent_and_zero_sales() {
        let g = grid(json!({"ebitda_fy24": 30, "revenue_fy24": 100, "ebitda_fy25": 5, "revenue_fy25": 0}));
        assert_eq!(g.row("% Margin").unwrap()[1], "30.0");
        assert_eq!(g.row("% Margin").unwrap()[2], "-");
    }

    #[test]
    fn grid_shape_is_fixed() {
        let g = grid(json!({}));
        assert_eq!(g.source, GridSource::Computed);
        assert_eq!(g.rows.len(), 9);
        assert!(g.rows.iter().all(|r| r.len() == 6));
        assert_eq!(g.rows[0], ["Particulars", "FY24A", "FY25A", "FY26E", "FY27E", "FY28E"]);
        assert!(g.rows[1..].iter().all(|r| r[1..].iter().all(|c| c == "-")));
    }

    #[test]
    fn key_variants_and_string_numbers() {
        let g = grid(json!({
            "sales_fy2026e": "1,500", "pat_fy27e": 210.4, "pe_fy26": "22.54", "pb_fy28": "abc"
        }));
        assert_eq!(g.row("Sales").unwrap()[3], "1,500");
        assert_eq!(g.row("PAT").unwrap()[4], "210");
        assert_eq!(g.row("P/E").unwrap()[3], "22.5");
        assert_eq!(g.row("P/B").unwrap()[5], "-");
    }

    #[test]
    fn stated_growth_used_when_not_computable() {
        let g = grid(json!({"pat_fy26": 10, "pat_growth_fy26": 12.34}));
        // PAT YoY is the second "YoY% growth" row.
        assert_eq!(g.rows[6][3], "12.3");
    }

    #[test]
    fn markdown_table_wins() {
        let g = grid(json!({
            "financial_performance": "| Particulars | FY24 |\n|---|---|\n| Sales | 9 |",
            "revenue_fy24": 100
        }));
        assert_eq!(g.source, GridSource::Markdown);
        assert_eq!(g.rows, vec![vec!["Particulars", "FY24"], vec!["Sales", "9"]]);
    }

    #[test]
    fn enrich_adds_without_touching_input() {
        let original = rec(json!({
            "revenue_fy24": 100, "revenue_fy25": 121, "ebitda_fy25": 30.25, "ebitda_margin_fy24": 5
        }));
        let enriched = enrich(&original, &FiscalWindow::default());
        assert_eq!(enriched.number("revenue_growth_fy25"), Some(21.0));
        assert_eq!(enriched.number("ebitda_margin_fy25"), Some(25.0));
        assert_eq!(enriched.number("ebitda_margin_fy24"), Some(5.0));
        assert!(!original.has("revenue_growth_fy25"));
        // Idempotent on its own output.
        assert_eq!(enrich(&enriched, &FiscalWindow::default()), enriched);
    }

    #[test]
    fn dynamic_tokens_formatting() {
        let r = rec(json!({
            "revenue_fy25": 12345.6, "eps_fy26e": 45.678, "ebitda_growth_fy25": 150.0,
            "company_name": "Acme", "pe_fy26": null
        }));
        let mut fields = dynamic_fields(&r);
        fields.sort();
        assert_eq!(
            fields,
            vec![
                ("ebitda_growth_fy25".to_string(), "150.0".to_string()),
                ("eps_fy26e".to_string(), "45.7".to_string()),
                ("revenue_fy25".to_string(), "12,346".to_string()),
            ]
        );
        assert!(has_metric_fields(&r));
        assert!(!has_metric_fields(&rec(json!({"company_name": "Acme"}))));
    }
}
