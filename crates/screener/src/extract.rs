//! Company page → flat metrics.
//!
//! Each section of the page feeds its own step; a missing section or row
//! simply leaves its keys out.

use crate::estimates::{cagr, project_estimates};
use crate::metrics::{round_to, Metrics};
use crate::parse::{parse_number, parse_table, text_of, SectionTable};
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{Html, Selector};

static SEL_TOP_RATIOS: Lazy<Selector> = Lazy::new(|| Selector::parse("#top-ratios li").unwrap());
static SEL_NAME: Lazy<Selector> = Lazy::new(|| Selector::parse("span.name").unwrap());
static SEL_NUMBER: Lazy<Selector> = Lazy::new(|| Selector::parse("span.number").unwrap());
static SEL_PEER_LINKS: Lazy<Selector> =
    Lazy::new(|| Selector::parse("section#peers a[href]").unwrap());
static RE_FIGURE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d+\.?\d*").unwrap());

const TOP_RATIOS: &[(&str, &str)] = &[
    ("Market Cap", "market_cap"),
    ("Current Price", "current_price"),
    ("Stock P/E", "pe_ttm"),
    ("Book Value", "book_value"),
    ("Dividend Yield", "dividend_yield"),
    ("ROCE", "roce"),
    ("ROE", "roe"),
    ("Face Value", "face_value"),
];

const SALES: &[&str] = &["Sales", "Revenue", "Net Sales", "Income"];
const OPERATING_PROFIT: &[&str] = &["Operating Profit", "EBITDA"];
const NET_PROFIT: &[&str] = &["Net Profit", "Profit after tax", "PAT"];
const EPS: &[&str] = &["EPS in Rs", "EPS in Rs.", "EPS (Rs)", "EPS"];

/// Extract every metric the page offers, then project forward estimates.
pub fn extract(html: &str) -> Metrics {
    let doc = Html::parse_document(html);
    let mut m = Metrics::new();

    top_ratios(&doc, &mut m);
    sector(&doc, &mut m);
    quarters(&parse_table(&doc, "quarters"), &mut m);
    profit_loss(&parse_table(&doc, "profit-loss"), &mut m);
    balance_sheet(&parse_table(&doc, "balance-sheet"), &mut m);
    ratios(&parse_table(&doc, "ratios"), &mut m);
    shareholding(&parse_table(&doc, "shareholding"), &mut m);
    m
}

/// Last cell of a row, if the row exists and the cell parsed.
fn last(row: Option<&[Option<f64>]>) -> Option<f64> {
    row.and_then(|r| r.last().copied().flatten())
}

/// Cell `back` places from the end (1 = last).
fn from_end(row: Option<&[Option<f64>]>, back: usize) -> Option<f64> {
    row.and_then(|r| r.len().checked_sub(back).and_then(|i| r[i]))
}

/// Percentage change of `now` over `before`; `None` when `before` is zero.
fn change_pct(now: f64, before: f64) -> Option<f64> {
    (before != 0.0).then(|| round_to((now - before) / before.abs() * 100.0, 2))
}

fn positive(row: &[Option<f64>]) -> Vec<f64> {
    row.iter().flatten().copied().filter(|v| *v > 0.0).collect()
}

// ── Top ratios ───────────────────────────────────────────────────────────

fn top_ratios(doc: &Html, m: &mut Metrics) {
    for li in doc.select(&SEL_TOP_RATIOS) {
        let Some(name) = li.select(&SEL_NAME).next().map(text_of) else {
            continue;
        };
        if name.contains("High") && name.contains("Low") {
            let text: String = li.text().collect::<String>().replace(['₹', ','], "");
            let figures: Vec<f64> = RE_FIGURE
                .find_iter(&text)
                .filter_map(|f| f.as_str().parse::<f64>().ok())
                .filter(|v| *v > 10.0)
                .collect();
            if let [high, low, ..] = figures.as_slice() {
                m.set("high_52_week", *high);
                m.set("low_52_week", *low);
            }
        } else if let Some(value) = li
            .select(&SEL_NUMBER)
            .next()
            .and_then(|el| parse_number(&text_of(el)))
        {
            if let Some((_, key)) = TOP_RATIOS.iter().find(|(label, _)| *label == name) {
                m.set(*key, value);
            }
        }
    }

    if let Some(price) = m.nonzero("current_price") {
        if let Some(high) = m.get("high_52_week").filter(|h| *h > 0.0) {
            m.set_rounded("return_down_from_52w_high", (price - high) / high * 100.0, 2);
        }
        if let Some(low) = m.get("low_52_week").filter(|l| *l > 0.0) {
            m.set_rounded("return_up_from_52w_low", (price - low) / low * 100.0, 2);
        }
    }
}

/// Market links in the peers section: sector, then industry, broad to narrow.
fn sector(doc: &Html, m: &mut Metrics) {
    let links: Vec<String> = doc
        .select(&SEL_PEER_LINKS)
        .filter(|a| a.value().attr("href").is_some_and(|h| h.contains("/market/")))
        .map(text_of)
        .filter(|t| !t.is_empty())
        .collect();
    for (key, text) in ["broad_sector", "sector", "broad_industry", "industry"]
        .into_iter()
        .zip(links)
    {
        m.set_text(key, text);
    }
}

// ── Quarterly results ────────────────────────────────────────────────────

fn quarters(t: &SectionTable, m: &mut Metrics) {
    let sales = t.find_row(SALES);
    let op = t.find_row(OPERATING_PROFIT);
    let pat = t.find_row(NET_PROFIT);

    m.set_opt("sales_latest_qtr", last(sales));
    m.set_opt("op_profit_latest_qtr", last(op));
    m.set_opt("pat_latest_qtr", last(pat));
    m.set_opt("ebitda_margin_latest_qtr", last(t.find_row(&["OPM %", "OPM"])));
    if let (Some(s), Some(p)) = (m.nonzero("sales_latest_qtr"), m.nonzero("pat_latest_qtr")) {
        if s > 0.0 {
            m.set_rounded("pat_margin_latest_qtr", p / s * 100.0, 2);
        }
    }

    m.set_opt("sales_preceding_qtr", from_end(sales, 2));
    m.set_opt("op_profit_preceding_qtr", from_end(op, 2));
    m.set_opt("pat_preceding_qtr", from_end(pat, 2));

    for (growth, latest, preceding) in [
        ("revenue_growth_qoq", "sales_latest_qtr", "sales_preceding_qtr"),
        ("ebitda_growth_qoq", "op_profit_latest_qtr", "op_profit_preceding_qtr"),
    ] {
        if let (Some(a), Some(b)) = (m.nonzero(latest), m.nonzero(preceding)) {
            m.set_opt(growth, change_pct(a, b));
        }
    }
    // A zero latest profit is still a valid QoQ reading.
    if let (Some(a), Some(b)) = (m.get("pat_latest_qtr"), m.get("pat_preceding_qtr")) {
        m.set_opt("pat_growth_qoq", change_pct(a, b));
    }

    if let (Some(a), Some(b)) = (from_end(sales, 1), from_end(sales, 5)) {
        m.set_opt("sales_growth_yoy_qtr", change_pct(a, b));
    }
    if let (Some(a), Some(b)) = (from_end(pat, 1), from_end(pat, 5)) {
        m.set_opt("profit_growth_yoy_qtr", change_pct(a, b));
    }
}

// ── Profit & loss ────────────────────────────────────────────────────────

fn profit_loss(t: &SectionTable, m: &mut Metrics) {
    let years = t.year_columns();
    let per_year = |m: &mut Metrics, prefix: &str, row: &[Option<f64>]| {
        for (suffix, idx) in &years {
            if let Some(Some(v)) = row.get(*idx) {
                m.set(format!("{prefix}_{suffix}"), *v);
            }
        }
        let pos = positive(row);
        if pos.len() >= 3 {
            m.set_opt(
                &format!("{prefix}_cagr_hist_2yr"),
                cagr(pos[pos.len() - 3], pos[pos.len() - 1], 2.0),
            );
        }
    };

    if let Some(row) = t.find_row(SALES).filter(|r| !r.is_empty()) {
        per_year(m, "revenue", row);
        m.set_opt("sales_ttm_screener", last(Some(row)));
        m.set_opt("revenue_ttm", last(Some(row)));
    }
    if let Some(row) = t.find_row(OPERATING_PROFIT).filter(|r| !r.is_empty()) {
        per_year(m, "ebitda", row);
        m.set_opt("op_profit_ttm", last(Some(row)));
    }
    if let Some(row) = t.find_row(NET_PROFIT).filter(|r| !r.is_empty()) {
        per_year(m, "pat", row);
        m.set_opt("pat_ttm_screener", last(Some(row)));
        m.set_opt("pat_ttm", last(Some(row)));
    }
    let eps = t.find_row(EPS).filter(|r| !r.is_empty());
    if let Some(row) = eps {
        per_year(m, "eps", row);
        m.set_opt("eps_ttm", last(Some(row)));
        m.set_opt("eps_ttm_actual", last(Some(row)));
    }

    project_estimates(m);

    if let (Some(cap), Some(rev)) = (m.nonzero("market_cap"), m.get("revenue_ttm")) {
        if rev > 0.0 {
            m.set_rounded("ps_ttm", cap / rev, 2);
        }
    }

    // Average of the three fiscal-year EPS figures before TTM.
    if let (Some(row), Some(price)) = (eps, m.nonzero("current_price")) {
        if row.len() >= 4 {
            let fy = positive(&row[row.len() - 4..row.len() - 1]);
            if !fy.is_empty() {
                let avg = fy.iter().sum::<f64>() / fy.len() as f64;
                m.set_rounded("pe_avg_3yr", price / avg, 2);
            }
        }
    }
}

// ── Balance sheet ────────────────────────────────────────────────────────

fn balance_sheet(t: &SectionTable, m: &mut Metrics) {
    m.set_opt("debt", last(t.find_row(&["Borrowings", "Total Debt"])));

    let equity = last(t.find_row(&["Equity Capital"]));
    if let (Some(eq), Some(res)) = (equity, last(t.find_row(&["Reserves"]))) {
        m.set_rounded("net_worth", eq + res, 2);
    }
    if let (Some(eq), Some(fv)) = (equity.filter(|e| *e != 0.0), m.get("face_value")) {
        if fv > 0.0 {
            m.set_rounded("num_equity_shares", eq / fv, 2);
        }
    }

    m.set_opt("cwip", last(t.find_row(&["CWIP"])));
    m.set_opt("net_block", last(t.find_row(&["Fixed Assets", "Net Block"])));
    if let (Some(cwip), Some(nb)) = (m.nonzero("cwip"), m.get("net_block")) {
        if nb > 0.0 {
            m.set_rounded("cwip_to_net_block_ratio", cwip / nb * 100.0, 2);
        }
    }

    // Cash is approximated from investments and a share of other assets.
    let investments = last(t.find_row(&["Investments"]));
    let other_assets = last(t.find_row(&["Other Assets"]));
    let cash = match (investments, other_assets) {
        (Some(inv), Some(oa)) => Some(inv + oa * 0.3),
        (Some(inv), None) => Some(inv),
        (None, Some(oa)) => Some(oa * 0.4),
        (None, None) => None,
    };
    if let Some(cash) = cash {
        m.set_rounded("cash_equivalents", cash, 2);
    }

    if let Some(debt) = m.get("debt") {
        let cash = m.get("cash_equivalents").unwrap_or(0.0);
        m.set_rounded("net_debt", debt - cash, 2);
    }
    if let (Some(cap), Some(net_debt)) = (m.nonzero("market_cap"), m.get("net_debt")) {
        m.set_rounded("enterprise_value", cap + net_debt, 2);
    }
    if let (Some(ev), Some(op)) = (m.nonzero("enterprise_value"), m.get("op_profit_ttm")) {
        if op > 0.0 {
            m.set_rounded("ev_ebitda_ttm", ev / op, 2);
        }
    }
}

// ── Ratios ───────────────────────────────────────────────────────────────

fn ratios(t: &SectionTable, m: &mut Metrics) {
    if let Some(days) = last(t.find_row(&["Working Capital Days"])) {
        m.set_rounded("working_capital_to_sales_ratio", days / 365.0, 4);
    }
    m.set_opt("roce", last(t.find_row(&["ROCE %", "ROCE"])));
    m.set_opt("roe", last(t.find_row(&["ROE %", "ROE", "Return on Equity"])));
    m.set_opt(
        "asset_turnover_ratio",
        last(t.find_row(&["Asset Turnover", "Asset Turnover Ratio"])),
    );

    if let Some(roic) = last(t.find_row(&["ROIC", "ROIC %", "Return on Invested Capital"])) {
        m.set("roic", roic);
    } else if let (Some(op), Some(nw), Some(debt)) = (
        m.nonzero("op_profit_ttm"),
        m.nonzero("net_worth"),
        m.nonzero("debt"),
    ) {
        // NOPAT at a flat 25% tax.
        let invested = nw + debt;
        if invested > 0.0 {
            m.set_rounded("roic", op * 0.75 / invested * 100.0, 2);
        }
    }
}

// ── Shareholding ─────────────────────────────────────────────────────────

fn shareholding(t: &SectionTable, m: &mut Metrics) {
    let latest = |names: &[&str]| {
        t.find_row(names)
            .and_then(|r| r.iter().rev().find_map(|v| *v))
    };
    let Some(promoters) =
        latest(&["Promoters", "Promoter & Promoter Group", "Promoter"])
    else {
        return;
    };
    m.set("promoter_holding_pct", promoters);
    if promoters == 0.0 {
        return;
    }
    match latest(&["Pledged", "Pledged %", "Shares Pledged"]) {
        Some(pledged) => m.set_rounded(
            "unpledged_promoter_holding_pct",
            promoters * (1.0 - pledged / 100.0),
            2,
        ),
        None => m.set("unpledged_promoter_holding_pct", promoters),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r##"
    <html><body>
    <div id="top-ratios"><ul>
      <li><span class="name">Market Cap</span><span class="nowrap value">₹ <span class="number">2,50,000</span> Cr.</span></li>
      <li><span class="name">Current Price</span><span class="nowrap value">₹ <span class="number">480</span></span></li>
      <li><span class="name">High / Low</span><span class="nowrap value">₹ <span class="number">600</span> / <span class="number">400</span></span></li>
      <li><span class="name">Stock P/E</span><span class="nowrap value"><span class="number">24.0</span></span></li>
      <li><span class="name">Face Value</span><span class="nowrap value">₹ <span class="number">2.00</span></span></li>
    </ul></div>
    <section id="peers">
      <a href="/market/IN07/">Information Technology</a>
      <a href="/market/IN07/IN0701/">IT - Software</a>
      <a href="/company/TCS/">TCS</a>
    </section>
    <section id="quarters"><table class="data-table">
      <thead><tr><th></th><th>Q1</th><th>Q2</th><th>Q3</th><th>Q4</th><th>Q5</th></tr></thead>
      <tbody>
        <tr><td>Sales +</td><td>200</td><td>210</td><td>220</td><td>200</td><td>250</td></tr>
        <tr><td>Net Profit +</td><td>20</td><td>22</td><td>24</td><td>25</td><td>30</td></tr>
      </tbody>
    </table></section>
    <section id="profit-loss"><table class="data-table">
      <thead><tr><th></th><th>Mar 2022</th><th>Mar 2023</th><th>Mar 2024</th><th>Mar 2025</th><th>TTM</th></tr></thead>
      <tbody>
        <tr><td>Sales +</td><td>800</td><td>900</td><td>1000</td><td>1000</td><td>1210</td></tr>
        <tr><td>Operating Profit</td><td>160</td><td>180</td><td>200</td><td>220</td><td>240</td></tr>
        <tr><td>EPS in Rs</td><td>8</td><td>10</td><td>12</td><td>14</td><td>15</td></tr>
      </tbody>
    </table></section>
    <section id="balance-sheet"><table class="data-table">
      <thead><tr><th></th><th>Mar 2024</th><th>Mar 2025</th></tr></thead>
      <tbody>
        <tr><td>Equity Capital</td><td>100</td><td>100</td></tr>
        <tr><td>Reserves</td><td>900</td><td>1100</td></tr>
        <tr><td>Borrowings +</td><td>300</td><td>200</td></tr>
        <tr><td>Investments</td><td>50</td><td>100</td></tr>
      </tbody>
    </table></section>
    <section id="shareholding"><table class="data-table">
      <thead><tr><th></th><th>Dec 2024</th><th>Mar 2025</th></tr></thead>
      <tbody>
        <tr><td>Promoters +</td><td>60.00</td><td>55.50</td></tr>
      </tbody>
    </table></section>
    </body></html>"##;

    #[test]
    fn top_ratios_and_52_week_range() {
        let m = extract(PAGE);
        assert_eq!(m.get("market_cap"), Some(250000.0));
        assert_eq!(m.get("current_price"), Some(480.0));
        assert_eq!(m.get("pe_ttm"), Some(24.0));
        assert_eq!(m.get("high_52_week"), Some(600.0));
        assert_eq!(m.get("low_52_week"), Some(400.0));
        assert_eq!(m.get("return_down_from_52w_high"), Some(-20.0));
        assert_eq!(m.get("return_up_from_52w_low"), Some(20.0));
    }

    #[test]
    fn sector_links_only_from_market_pages() {
        let m = extract(PAGE);
        assert_eq!(m.as_map()["broad_sector"], "Information Technology");
        assert_eq!(m.as_map()["sector"], "IT - Software");
        assert!(!m.contains("broad_industry"));
    }

    #[test]
    fn quarterly_growth() {
        let m = extract(PAGE);
        assert_eq!(m.get("sales_latest_qtr"), Some(250.0));
        assert_eq!(m.get("revenue_growth_qoq"), Some(25.0));
        assert_eq!(m.get("sales_growth_yoy_qtr"), Some(25.0));
        assert_eq!(m.get("profit_growth_yoy_qtr"), Some(50.0));
        assert_eq!(m.get("pat_margin_latest_qtr"), Some(12.0));
    }

    #[test]
    fn yearly_keys_and_estimates() {
        let m = extract(PAGE);
        assert_eq!(m.get("revenue_fy24"), Some(1000.0));
        assert_eq!(m.get("revenue_ttm"), Some(1210.0));
        assert_eq!(m.get("ebitda_fy25"), Some(220.0));
        // 1000 → 1210 over two years of positive values
        assert_eq!(m.get("revenue_cagr_hist_2yr"), Some(10.0));
        assert_eq!(m.get("revenue_fy26"), Some(1100.0));
        assert_eq!(m.get("ps_ttm"), Some(206.61));
        // EPS 10, 12, 14 → average 12
        assert_eq!(m.get("pe_avg_3yr"), Some(40.0));
    }

    #[test]
    fn balance_sheet_derivations() {
        let m = extract(PAGE);
        assert_eq!(m.get("net_worth"), Some(1200.0));
        assert_eq!(m.get("num_equity_shares"), Some(50.0));
        assert_eq!(m.get("debt"), Some(200.0));
        assert_eq!(m.get("cash_equivalents"), Some(100.0));
        assert_eq!(m.get("net_debt"), Some(100.0));
        assert_eq!(m.get("enterprise_value"), Some(250100.0));
        assert_eq!(m.get("ev_ebitda_ttm"), Some(1042.08));
        assert_eq!(m.get("roic"), Some(12.86));
    }

    #[test]
    fn promoter_holding_without_pledge_is_unpledged() {
        let m = extract(PAGE);
        assert_eq!(m.get("promoter_holding_pct"), Some(55.5));
        assert_eq!(m.get("unpledged_promoter_holding_pct"), Some(55.5));
    }

    #[test]
    fn empty_page_has_no_metrics() {
        assert!(extract("<html><body></body></html>").is_empty());
    }
}
