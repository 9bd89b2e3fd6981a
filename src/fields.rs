//! The canonical field → placeholder mapping.
//!
//! Template revisions renamed several fields over time (`rating` vs
//! `recommendation`, `industry_risks` vs `industry_risk`, the `prize_chart`
//! typo). Each entry below names one canonical record key and the older
//! spellings that are still read, so old payloads keep working against the
//! current template.

use crate::config::TextDefaults;
use crate::pipeline::markdown::{looks_like_pipe_table, normalize_text};
use crate::record::ReportRecord;
use chrono::{DateTime, Local};

/// How the font size of a text field is chosen.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Sizing {
    /// [`TextDefaults::title_pt`].
    Title,
    /// [`TextDefaults::detail_pt`].
    Detail,
    /// Bold, [`TextDefaults::heading_pt`].
    Heading,
    /// Shrinks as the text grows; see [`font_size_for`].
    ByLength,
}

/// Value used when the record has none.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Fallback {
    None,
    Literal(&'static str),
    /// The generation date, `%Y-%m-%d`.
    Today,
}

/// One text placeholder and where its value comes from.
#[derive(Debug, Clone, Copy)]
pub struct TextField {
    /// Placeholder name in the template.
    pub token: &'static str,
    /// Record keys, canonical first.
    pub keys: &'static [&'static str],
    pub sizing: Sizing,
    pub fallback: Fallback,
}

const fn field(token: &'static str, keys: &'static [&'static str], sizing: Sizing) -> TextField {
    TextField {
        token,
        keys,
        sizing,
        fallback: Fallback::None,
    }
}

const fn section(token: &'static str, keys: &'static [&'static str]) -> TextField {
    field(token, keys, Sizing::ByLength)
}

const fn heading(token: &'static str) -> TextField {
    TextField {
        token,
        keys: &[],
        sizing: Sizing::Heading,
        fallback: Fallback::None,
    }
}

/// Text fields, in substitution order. `bom_code` is resolved separately.
pub const TEXT_FIELDS: &[TextField] = &[
    field("company_name", &["company_name"], Sizing::Title),
    field("nse_symbol", &["nse_symbol", "symbol"], Sizing::Detail),
    field("bom_code", &["bom_code"], Sizing::Detail),
    TextField {
        token: "recommendation",
        keys: &["rating", "recommendation"],
        sizing: Sizing::Detail,
        fallback: Fallback::Literal("N/A"),
    },
    TextField {
        token: "today_date",
        keys: &["today_date"],
        sizing: Sizing::Detail,
        fallback: Fallback::Today,
    },
    section("company_background", &["company_background"]),
    section("business_model", &["business_model"]),
    section("management_analysis", &["management_analysis"]),
    section("industry_overview", &["industry_overview"]),
    section("industry_tailwinds", &["industry_tailwinds", "key_industry"]),
    section("demand_drivers", &["demand_drivers"]),
    section("industry_risk", &["industry_risks", "industry_risk"]),
    section("market_positioning", &["market_positioning"]),
    section("financial_performance", &["financial_performance"]),
    section("growth_outlook", &["growth_outlook"]),
    section("valuation_recommendation", &["valuation_recommendation"]),
    section("key_risks", &["key_risks"]),
    section("company_insider", &["company_insider"]),
    section("podcast_script", &["podcast_script"]),
    section("video_script", &["video_script"]),
    heading("cs_masterheading"),
    heading("cs_marketing_positioning"),
    heading("cs_financial_performance"),
    heading("cs_grow_outlook"),
    heading("cs_value_and_recommendation"),
    heading("cs_key_risks"),
    heading("cs_company_insider"),
    heading("company_background_h"),
    heading("business_model_h"),
    heading("management_analysis_h"),
    heading("industry_overview_h"),
    heading("industry_tailwinds_h"),
    heading("demand_drivers_h"),
    heading("industry_risks_h"),
    heading("market_positioning_h"),
    heading("growth_outlook_h"),
    heading("valuation_recommendation_h"),
    heading("key_risks_h"),
    heading("company_insider_h"),
];

impl TextField {
    /// The record keys to read; headings read their own token name.
    pub fn source_keys(&self) -> Vec<&'static str> {
        if self.keys.is_empty() {
            vec![self.token]
        } else {
            self.keys.to_vec()
        }
    }

    /// The value to substitute, normalised, or `None` when there is nothing
    /// to write.
    ///
    /// `financial_performance` holding a pipe table is left to the grid and
    /// yields `None` here.
    pub fn value(&self, record: &ReportRecord, now: DateTime<Local>) -> Option<String> {
        let raw = record.text_any(&self.source_keys());
        if self.token == crate::pipeline::financials::MARKDOWN_FIELD
            && raw.as_deref().is_some_and(looks_like_pipe_table)
        {
            return None;
        }
        let text = raw
            .map(|t| normalize_text(&t))
            .filter(|t| !t.is_empty())
            .or_else(|| match self.fallback {
                Fallback::None => None,
                Fallback::Literal(s) => Some(s.to_string()),
                Fallback::Today => Some(now.format("%Y-%m-%d").to_string()),
            })?;
        Some(text)
    }

    /// Font size in points for `text`.
    pub fn size_for(&self, text: &str, defaults: &TextDefaults) -> f32 {
        match self.sizing {
            Sizing::Title => defaults.title_pt,
            Sizing::Detail => defaults.detail_pt,
            Sizing::Heading => defaults.heading_pt,
            Sizing::ByLength => font_size_for(text.chars().count()),
        }
    }

    pub fn is_bold(&self) -> bool {
        self.sizing == Sizing::Heading
    }
}

/// Body font size for a section of `len` characters.
pub fn font_size_for(len: usize) -> f32 {
    match len {
        0..=499 => 11.0,
        500..=999 => 10.5,
        1000..=1499 => 10.0,
        1500..=1999 => 9.0,
        2000..=2999 => 8.0,
        _ => 7.0,
    }
}

// ── Images ───────────────────────────────────────────────────────────────

/// One image placeholder.
#[derive(Debug, Clone, Copy)]
pub struct ImageField {
    /// Record key holding the URL; also the slot name and primary token.
    pub key: &'static str,
    /// Older token spellings also searched in the template.
    pub token_aliases: &'static [&'static str],
}

impl ImageField {
    pub fn tokens(&self) -> impl Iterator<Item = &'static str> {
        std::iter::once(self.key).chain(self.token_aliases.iter().copied())
    }
}

const fn image(key: &'static str) -> ImageField {
    ImageField {
        key,
        token_aliases: &[],
    }
}

pub const IMAGE_FIELDS: &[ImageField] = &[
    image("chart_profit_loss"),
    image("chart_balance_sheet"),
    image("chart_cash_flow"),
    image("chart_ratio_analysis"),
    image("summary_table"),
    image("chart_custom"),
    ImageField {
        key: "price_chart",
        token_aliases: &["prize_chart"],
    },
];

/// The image URL for `key`, if it is a usable http(s) URL.
///
/// Null-like strings (`"null"`, `"[null]"`, `"none"`) count as absent.
pub fn image_url(record: &ReportRecord, key: &str) -> Option<String> {
    record
        .text(key)
        .map(|u| u.trim().to_string())
        .filter(|u| !u.is_empty() && !matches!(u.to_ascii_lowercase().as_str(), "null" | "[null]" | "none"))
}

/// `true` for a BSE scrip code: non-empty and all digits.
pub fn is_bse_code(code: &str) -> bool {
    let code = code.trim();
    !code.is_empty() && code.bytes().all(|b| b.is_ascii_digit())
}
