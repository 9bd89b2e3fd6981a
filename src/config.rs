//! Configuration types for deck generation.
//!
//! All generation behaviour is controlled through [`GenerationConfig`], built
//! via its [`GenerationConfigBuilder`]. The config is immutable once built and
//! cheap to clone (collaborators are behind `Arc`), so the server builds one at
//! startup and hands a reference to every request.
//!
//! # Slot table
//! Fixed image coordinates are template-specific. They live in an immutable
//! [`SlotTable`] handed to the placement engine with each pass, never in
//! process-wide state.

use crate::deck::{Crop, Rect, Rgb, EMU_PER_INCH};
use crate::error::DeckError;
use crate::pipeline::images::ImageFetcher;
use crate::progress::ProgressCallback;
use crate::sources::FinancialSource;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

/// Configuration for a deck generation pass.
///
/// Built via [`GenerationConfig::builder()`] or using
/// [`GenerationConfig::default()`].
///
/// # Example
/// ```rust
/// use research_deck::GenerationConfig;
///
/// let config = GenerationConfig::builder()
///     .template("templates/master_template.pptx")
///     .output_dir("/tmp/decks")
///     .download_timeout_secs(10)
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct GenerationConfig {
    /// Template path or http(s) URL. Default: `master_template.pptx`.
    ///
    /// Opened fresh for every pass; a pass never shares its in-memory copy.
    pub template: String,

    /// Directory written by [`crate::generate_to_dir`]. Default: `./output`.
    pub output_dir: PathBuf,

    /// Timeout for each image download (and a template URL). Default: 30.
    ///
    /// Chart hosts occasionally stall. A timeout is recorded as a field
    /// failure and the pass continues, so this bounds the worst-case latency
    /// of one report at roughly `images × timeout`.
    pub download_timeout_secs: u64,

    /// Fixed image slots for legacy fields. Default: [`SlotTable::default`].
    pub slots: SlotTable,

    /// Fiscal years shown in the financial grid. Default: FY24A–FY28E.
    pub fiscal_window: FiscalWindow,

    /// Font face and sizes applied to substituted text.
    pub text: TextDefaults,

    /// Token in a table's top-left cell that marks the financial grid.
    /// Default: `financial_table`.
    pub financial_table_token: String,

    /// Expose every metric×year key in the record as its own token. Default: true.
    pub dynamic_fields: bool,

    /// Image downloader. `None` uses [`crate::HttpImageFetcher`] with
    /// `download_timeout_secs`.
    pub image_fetcher: Option<Arc<dyn ImageFetcher>>,

    /// Optional source of financial metrics and exchange codes, consulted
    /// only for keys the record does not already carry.
    pub financial_source: Option<Arc<dyn FinancialSource>>,

    /// Per-field progress events.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            template: "master_template.pptx".to_string(),
            output_dir: PathBuf::from("./output"),
            download_timeout_secs: 30,
            slots: SlotTable::default(),
            fiscal_window: FiscalWindow::default(),
            text: TextDefaults::default(),
            financial_table_token: "financial_table".to_string(),
            dynamic_fields: true,
            image_fetcher: None,
            financial_source: None,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for GenerationConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GenerationConfig")
            .field("template", &self.template)
            .field("output_dir", &self.output_dir)
            .field("download_timeout_secs", &self.download_timeout_secs)
            .field("slots", &self.slots.len())
            .field("fiscal_window", &self.fiscal_window)
            .field("text", &self.text)
            .field("financial_table_token", &self.financial_table_token)
            .field("dynamic_fields", &self.dynamic_fields)
            .field("image_fetcher", &self.image_fetcher.as_ref().map(|_| "<dyn ImageFetcher>"))
            .field(
                "financial_source",
                &self.financial_source.as_ref().map(|_| "<dyn FinancialSource>"),
            )
            .field("progress_callback", &self.progress_callback.is_some())
            .finish()
    }
}

impl GenerationConfig {
    /// Create a new builder for `GenerationConfig`.
    pub fn builder() -> GenerationConfigBuilder {
        GenerationConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`GenerationConfig`].
#[derive(Debug)]
pub struct GenerationConfigBuilder {
    config: GenerationConfig,
}

impl GenerationConfigBuilder {
    pub fn template(mut self, template: impl Into<String>) -> Self {
        self.config.template = template.into();
        self
    }

    pub fn output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.output_dir = dir.into();
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs.clamp(1, 600);
        self
    }

    pub fn slots(mut self, slots: SlotTable) -> Self {
        self.config.slots = slots;
        self
    }

    /// Add or replace a single slot.
    pub fn slot(mut self, field: impl Into<String>, slot: ImageSlot) -> Self {
        self.config.slots.insert(field, slot);
        self
    }

    pub fn fiscal_window(mut self, window: FiscalWindow) -> Self {
        self.config.fiscal_window = window;
        self
    }

    pub fn text(mut self, text: TextDefaults) -> Self {
        self.config.text = text;
        self
    }

    pub fn financial_table_token(mut self, token: impl Into<String>) -> Self {
        self.config.financial_table_token = token.into();
        self
    }

    pub fn dynamic_fields(mut self, enabled: bool) -> Self {
        self.config.dynamic_fields = enabled;
        self
    }

    pub fn image_fetcher(mut self, fetcher: Arc<dyn ImageFetcher>) -> Self {
        self.config.image_fetcher = Some(fetcher);
        self
    }

    pub fn financial_source(mut self, source: Arc<dyn FinancialSource>) -> Self {
        self.config.financial_source = Some(source);
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<GenerationConfig, DeckError> {
        let c = &self.config;
        if c.template.trim().is_empty() {
            return Err(DeckError::InvalidConfig("template must not be empty".into()));
        }
        let token_ok = !c.financial_table_token.is_empty()
            && c
                .financial_table_token
                .chars()
                .all(|ch| ch.is_ascii_alphanumeric() || matches!(ch, '_' | '.' | '-'));
        if !token_ok {
            return Err(DeckError::InvalidConfig(format!(
                "financial_table_token '{}' must be non-empty and use only [A-Za-z0-9_.-]",
                c.financial_table_token
            )));
        }
        c.fiscal_window.validate()?;
        c.text.validate()?;
        for (name, slot) in c.slots.iter() {
            slot.validate(name)?;
        }
        Ok(self.config)
    }
}

// ── Image slots ──────────────────────────────────────────────────────────

/// A fixed image position: slide index plus a rectangle in inches.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ImageSlot {
    /// 0-based slide index.
    pub slide: usize,
    pub left_in: f64,
    pub top_in: f64,
    pub width_in: f64,
    /// `None` keeps the image's aspect ratio at `width_in`.
    #[serde(default)]
    pub height_in: Option<f64>,
    #[serde(default)]
    pub crop: Option<Crop>,
}

impl ImageSlot {
    pub const fn new(slide: usize, left_in: f64, top_in: f64, width_in: f64, height_in: f64) -> Self {
        Self {
            slide,
            left_in,
            top_in,
            width_in,
            height_in: Some(height_in),
            crop: None,
        }
    }

    /// A slot whose height follows the image's aspect ratio.
    pub const fn width_only(slide: usize, left_in: f64, top_in: f64, width_in: f64) -> Self {
        Self {
            slide,
            left_in,
            top_in,
            width_in,
            height_in: None,
            crop: None,
        }
    }

    pub fn with_crop(mut self, crop: Crop) -> Self {
        self.crop = Some(crop);
        self
    }

    /// Target rectangle in EMU. `aspect` is the image's height / width.
    pub fn rect(&self, aspect: f64) -> Rect {
        let height = self.height_in.unwrap_or(self.width_in * aspect);
        Rect::from_inches(self.left_in, self.top_in, self.width_in, height)
    }

    fn validate(&self, name: &str) -> Result<(), DeckError> {
        let positive = |v: f64| v.is_finite() && v > 0.0;
        if !positive(self.width_in) || self.height_in.is_some_and(|h| !positive(h)) {
            return Err(DeckError::InvalidConfig(format!(
                "slot '{name}' must have a positive width and height"
            )));
        }
        if !self.left_in.is_finite() || !self.top_in.is_finite() {
            return Err(DeckError::InvalidConfig(format!("slot '{name}' has a non-finite offset")));
        }
        if self.crop.is_some_and(|c| !c.is_valid()) {
            return Err(DeckError::InvalidConfig(format!(
                "slot '{name}' crop fractions must be within 0–1 and leave a visible area"
            )));
        }
        Ok(())
    }
}

/// Field name → fixed slot. Immutable once the config is built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SlotTable {
    slots: BTreeMap<String, ImageSlot>,
}

impl Default for SlotTable {
    /// Chart positions of the standard research template.
    fn default() -> Self {
        let mut t = Self::empty();
        t.insert("chart_profit_loss", ImageSlot::new(8, 0.16, 1.4, 4.8, 2.2));
        t.insert("chart_balance_sheet", ImageSlot::new(8, 5.15, 1.4, 4.8, 2.2));
        t.insert("chart_cash_flow", ImageSlot::new(8, 0.10, 4.3, 4.8, 2.2));
        t.insert("chart_ratio_analysis", ImageSlot::new(8, 5.10, 4.3, 4.8, 2.2));
        t.insert("summary_table", ImageSlot::new(8, 0.5, 0.75, 9.0, 4.5));
        t.insert("chart_custom", ImageSlot::new(9, 0.5, 0.75, 9.0, 4.5));
        t.insert("price_chart", ImageSlot::new(0, 7.0, 2.0, 3.0, 2.0));
        t
    }
}

impl SlotTable {
    pub fn empty() -> Self {
        Self {
            slots: BTreeMap::new(),
        }
    }

    /// Parse a JSON object of `field → slot`.
    pub fn from_json(text: &str) -> Result<Self, DeckError> {
        serde_json::from_str(text)
            .map_err(|e| DeckError::InvalidConfig(format!("slot table: {e}")))
    }

    pub fn get(&self, field: &str) -> Option<&ImageSlot> {
        self.slots.get(field)
    }

    pub fn insert(&mut self, field: impl Into<String>, slot: ImageSlot) {
        self.slots.insert(field.into(), slot);
    }

    /// Overlay `other` onto this table.
    pub fn merge(mut self, other: SlotTable) -> Self {
        self.slots.extend(other.slots);
        self
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ImageSlot)> {
        self.slots.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

// ── Text ─────────────────────────────────────────────────────────────────

/// Font defaults for substituted text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TextDefaults {
    pub typeface: String,
    /// Company name and other title tokens.
    pub title_pt: f32,
    /// Short identity fields (symbol, code, rating, date).
    pub detail_pt: f32,
    /// Section headings.
    pub heading_pt: f32,
    /// Financial grid cells.
    pub table_pt: f32,
    /// `None` keeps the template's colour.
    pub color: Option<Rgb>,
}

impl Default for TextDefaults {
    fn default() -> Self {
        Self {
            typeface: "Arial".to_string(),
            title_pt: 24.0,
            detail_pt: 14.0,
            heading_pt: 14.0,
            table_pt: 10.0,
            color: None,
        }
    }
}

impl TextDefaults {
    fn validate(&self) -> Result<(), DeckError> {
        for (name, pt) in [
            ("title_pt", self.title_pt),
            ("detail_pt", self.detail_pt),
            ("heading_pt", self.heading_pt),
            ("table_pt", self.table_pt),
        ] {
            if !(1.0..=400.0).contains(&pt) {
                return Err(DeckError::InvalidConfig(format!("{name} must be 1–400 pt, got {pt}")));
            }
        }
        Ok(())
    }
}

// ── Fiscal window ────────────────────────────────────────────────────────

/// The span of fiscal years in the financial grid.
///
/// Years are two-digit (`24` = FY2024). The first `actual_years` columns are
/// reported figures (suffix `A`), the rest are estimates (suffix `E`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FiscalWindow {
    pub first_year: u32,
    pub actual_years: usize,
    pub len: usize,
}

impl Default for FiscalWindow {
    fn default() -> Self {
        Self {
            first_year: 24,
            actual_years: 2,
            len: 5,
        }
    }
}

impl FiscalWindow {
    pub fn years(&self) -> impl Iterator<Item = u32> {
        let first = self.first_year;
        (0..self.len as u32).map(move |i| first + i)
    }

    pub fn is_actual(&self, year: u32) -> bool {
        year < self.first_year + self.actual_years as u32
    }

    /// Column header, e.g. `FY24A` or `FY27E`.
    pub fn label(&self, year: u32) -> String {
        format!("FY{year:02}{}", if self.is_actual(year) { 'A' } else { 'E' })
    }

    fn validate(&self) -> Result<(), DeckError> {
        if self.len == 0 || self.actual_years > self.len {
            return Err(DeckError::InvalidConfig(format!(
                "fiscal window needs 1+ years with actual_years ≤ len (got {} of {})",
                self.actual_years, self.len
            )));
        }
        if self.first_year == 0 || self.first_year as usize + self.len > 100 {
            return Err(DeckError::InvalidConfig(format!(
                "fiscal window FY{:02}+{} leaves the two-digit year range",
                self.first_year, self.len
            )));
        }
        Ok(())
    }
}

/// EMU → inches, for log lines.
pub(crate) fn emu_to_inches(emu: i64) -> f64 {
    emu as f64 / EMU_PER_INCH as f64
}
