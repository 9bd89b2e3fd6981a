//! Generation entry points: one record in, one populated deck out.
//!
//! A pass opens its own copy of the template, applies every field in a fixed
//! order, and serialises once at the end. Field problems are recorded in the
//! [`PopulationResult`] and never abort the pass; only a missing or corrupt
//! template, or an unwritable output, is returned as an error.
//!
//! ## Field order
//!
//! 1. Gaps in the record are filled from the [`crate::FinancialSource`]
//! 2. Growth and margin figures are derived (on a copy)
//! 3. The financial grid goes into its table
//! 4. Text fields from [`crate::fields::TEXT_FIELDS`]
//! 5. Metric×year tokens such as `{{pe_fy26e}}`
//! 6. Images: token placement first, fixed slot as fallback

use crate::config::GenerationConfig;
use crate::deck::Presentation;
use crate::error::DeckError;
use crate::fields::{image_url, is_bse_code, IMAGE_FIELDS, TEXT_FIELDS};
use crate::output::{FieldOutcome, GenerationOutput, GenerationStats, PopulationResult};
use crate::pipeline::encode::prepare_image;
use crate::pipeline::financials::{
    build_financial_grid, dynamic_fields, enrich, has_metric_fields, GridSource, MARKDOWN_FIELD,
};
use crate::pipeline::images::{
    place_prepared, replace_placeholder_with_image, HttpImageFetcher, ImageFetcher,
};
use crate::pipeline::input;
use crate::pipeline::locate::{find_shapes_containing, find_table_with_token, list_placeholders, shape_at_mut, PlaceholderSite};
use crate::pipeline::markdown::looks_like_pipe_table;
use crate::pipeline::richtext::{clear_placeholder, render, replace_placeholder, TextStyle};
use crate::progress::ProgressCallback;
use crate::record::ReportRecord;
use chrono::{DateTime, Local};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Generate a deck for `record` and return its bytes.
///
/// # Errors
/// Returns `Err(DeckError)` only for fatal errors:
/// - template not found, unreadable, or not a `.pptx`
/// - template parts malformed
///
/// Individual field failures are in `output.results`.
pub async fn generate(record: &ReportRecord, config: &GenerationConfig) -> Result<GenerationOutput, DeckError> {
    let start = Instant::now();
    info!("Generating deck from template: {}", config.template);

    // ── Step 1: Load template ────────────────────────────────────────────
    let bytes = input::load_template(&config.template, config.download_timeout_secs).await?;

    // ── Step 2: Parse package ────────────────────────────────────────────
    let mut pres = Presentation::from_bytes(&bytes)?;
    info!("Template has {} slides", pres.slide_count());

    // ── Step 3: Populate ─────────────────────────────────────────────────
    let pass = run_pass(&mut pres, record, config).await?;

    // ── Step 4: Serialise ────────────────────────────────────────────────
    let bytes = pres.to_bytes()?;

    // ── Step 5: Stats ────────────────────────────────────────────────────
    let mut stats = GenerationStats {
        images_downloaded: pass.images_downloaded,
        slide_count: pres.slide_count(),
        duration_ms: start.elapsed().as_millis() as u64,
        ..GenerationStats::default()
    };
    stats.tally(&pass.results);

    info!(
        "Generation complete: {}/{} fields applied, {} bytes, {}ms",
        stats.applied,
        pass.results.len(),
        bytes.len(),
        stats.duration_ms
    );
    if let Some(ref cb) = config.progress_callback {
        cb.on_generation_complete(stats.applied, pass.results.len());
    }

    Ok(GenerationOutput {
        bytes,
        file_name: output_file_name(record, Local::now()),
        results: pass.results,
        stats,
    })
}

/// Generate a deck and write it into `config.output_dir`.
///
/// Uses atomic write (temp file + rename) so a reader never sees a partial
/// deck. Returns the written path alongside the output.
pub async fn generate_to_dir(
    record: &ReportRecord,
    config: &GenerationConfig,
) -> Result<(PathBuf, GenerationOutput), DeckError> {
    let output = generate(record, config).await?;
    let dir = &config.output_dir;
    let path = dir.join(&output.file_name);
    let write_failed = |source| DeckError::OutputWriteFailed {
        path: path.clone(),
        source,
    };

    tokio::fs::create_dir_all(dir).await.map_err(write_failed)?;
    let tmp_path = path.with_extension("pptx.tmp");
    tokio::fs::write(&tmp_path, &output.bytes)
        .await
        .map_err(write_failed)?;
    tokio::fs::rename(&tmp_path, &path)
        .await
        .map_err(write_failed)?;

    info!("Saved {}", path.display());
    Ok((path, output))
}

/// Synchronous wrapper around [`generate`].
///
/// Creates a temporary tokio runtime internally.
pub fn generate_sync(record: &ReportRecord, config: &GenerationConfig) -> Result<GenerationOutput, DeckError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| DeckError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(generate(record, config))
}

/// Apply `record` to an already-open presentation.
///
/// This is the whole field pass without loading or saving, for callers that
/// manage the document themselves.
pub async fn populate(
    pres: &mut Presentation,
    record: &ReportRecord,
    config: &GenerationConfig,
) -> Result<PopulationResult, DeckError> {
    Ok(run_pass(pres, record, config).await?.results)
}

/// What a template offers, without generating anything.
#[derive(Debug, Clone, Serialize)]
pub struct TemplateReport {
    pub template: String,
    pub slide_count: usize,
    pub placeholders: Vec<PlaceholderSite>,
}

/// List every placeholder in the configured template.
pub async fn inspect_template(config: &GenerationConfig) -> Result<TemplateReport, DeckError> {
    let bytes = input::load_template(&config.template, config.download_timeout_secs).await?;
    let pres = Presentation::from_bytes(&bytes)?;
    Ok(TemplateReport {
        template: config.template.clone(),
        slide_count: pres.slide_count(),
        placeholders: list_placeholders(&pres),
    })
}

/// `{symbol}_{report_id[..8]}_{YYYYmmdd_HHMMSS}.pptx`, restricted to
/// `[A-Za-z0-9._-]`.
pub fn output_file_name(record: &ReportRecord, now: DateTime<Local>) -> String {
    let symbol = record
        .text_any(&["symbol", "nse_symbol"])
        .unwrap_or_else(|| "report".to_string());
    let report_id: String = record
        .text("report_id")
        .map(|id| id.chars().take(8).collect())
        .unwrap_or_else(|| "unknown".to_string());
    let name = format!("{symbol}_{report_id}_{}.pptx", now.format("%Y%m%d_%H%M%S"));
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

// ── Internal helpers ─────────────────────────────────────────────────────

struct Pass {
    results: PopulationResult,
    images_downloaded: usize,
}

/// Records outcomes, logs them, and forwards them to the progress callback.
struct Recorder<'c> {
    results: PopulationResult,
    callback: Option<&'c ProgressCallback>,
}

impl Recorder<'_> {
    fn start(&self, field: &str) {
        if let Some(cb) = self.callback {
            cb.on_field_start(field);
        }
    }

    fn finish(&mut self, field: &str, outcome: FieldOutcome) {
        match &outcome {
            FieldOutcome::Applied { .. } => info!("  {field}: {outcome}"),
            FieldOutcome::NotFound | FieldOutcome::Skipped => debug!("  {field}: {outcome}"),
            FieldOutcome::Failed { .. } => warn!("  {field}: {outcome}"),
        }
        if let Some(cb) = self.callback {
            cb.on_field_complete(field, &outcome);
        }
        self.results.record(field, outcome);
    }
}

async fn run_pass(pres: &mut Presentation, record: &ReportRecord, config: &GenerationConfig) -> Result<Pass, DeckError> {
    let fetcher = resolve_fetcher(config)?;
    let mut rec = Recorder {
        results: PopulationResult::new(),
        callback: config.progress_callback.as_ref(),
    };
    if let Some(cb) = rec.callback {
        cb.on_generation_start(TEXT_FIELDS.len() + IMAGE_FIELDS.len() + 1, pres.slide_count());
    }

    let mut working = record.clone();
    fill_from_source(&mut working, config).await;
    let working = enrich(&working, &config.fiscal_window);

    apply_grid(pres, &working, config, &mut rec);
    apply_text_fields(pres, &working, config, &mut rec);
    if config.dynamic_fields {
        apply_dynamic_fields(pres, &working, config, &mut rec);
    }
    let images_downloaded = apply_images(pres, &working, config, fetcher.as_ref(), &mut rec).await;

    Ok(Pass {
        results: rec.results,
        images_downloaded,
    })
}

fn resolve_fetcher(config: &GenerationConfig) -> Result<Arc<dyn ImageFetcher>, DeckError> {
    match config.image_fetcher {
        Some(ref fetcher) => Ok(Arc::clone(fetcher)),
        None => Ok(Arc::new(HttpImageFetcher::new(config.download_timeout_secs)?)),
    }
}

fn text_style(config: &GenerationConfig, size_pt: f32) -> TextStyle {
    TextStyle::sized(size_pt)
        .typeface(config.text.typeface.clone())
        .color(config.text.color)
}

/// Metrics the record lacks, and a BSE code when `bom_code` is not numeric.
async fn fill_from_source(record: &mut ReportRecord, config: &GenerationConfig) {
    let code_ok = record.text("bom_code").is_some_and(|c| is_bse_code(&c));
    if !code_ok && record.has("bom_code") {
        debug!("bom_code {:?} is not numeric; dropped", record.text("bom_code"));
        record.set("bom_code", serde_json::Value::Null);
    }

    let Some(ref source) = config.financial_source else {
        return;
    };
    let symbol = record.text_any(&["nse_symbol", "symbol"]).unwrap_or_default();
    if symbol.is_empty() {
        return;
    }

    match source.metrics(&symbol).await {
        Ok(metrics) => {
            let mut added = 0;
            for (key, value) in metrics.as_map() {
                if record.set_if_absent(key, value.clone()) {
                    added += 1;
                }
            }
            info!("Financial source added {added} fields for {symbol}");
        }
        Err(e) => warn!("Financial source failed for {symbol}: {e}"),
    }

    if !code_ok {
        let company = record.text("company_name").unwrap_or_default();
        if let Some(code) = source.bse_code(&symbol, &company).await {
            info!("BSE code for {symbol}: {code}");
            record.set("bom_code", code);
        }
    }
}

fn apply_grid(pres: &mut Presentation, record: &ReportRecord, config: &GenerationConfig, rec: &mut Recorder<'_>) {
    let token = config.financial_table_token.as_str();
    rec.start(token);

    let has_markdown = record.text(MARKDOWN_FIELD).is_some_and(|t| looks_like_pipe_table(&t));
    if !has_markdown && !has_metric_fields(record) {
        rec.finish(token, FieldOutcome::Skipped);
        return;
    }

    let grid = build_financial_grid(record, &config.fiscal_window);
    debug!(
        "Financial grid: {} rows from {}",
        grid.rows.len(),
        if grid.source == GridSource::Markdown { "markdown" } else { "metrics" }
    );
    let style = text_style(config, config.text.table_pt);

    let outcome = if let Some(at) = find_table_with_token(pres, token) {
        match shape_at_mut(pres, at).and_then(|s| s.table_mut()) {
            Some(table) => {
                let (rows, cols) = (table.row_count(), table.column_count());
                for (r, row) in grid.rows.iter().enumerate() {
                    for (c, value) in row.iter().enumerate() {
                        match table.cell_mut(r, c) {
                            Some(cell) => render(&mut cell.frame, value, &style),
                            None => debug!("Grid cell ({r},{c}) outside the {rows}×{cols} table"),
                        }
                    }
                }
                FieldOutcome::Applied { locations: 1 }
            }
            None => FieldOutcome::NotFound,
        }
    } else {
        let text = grid
            .rows
            .iter()
            .map(|row| row.join(" | "))
            .collect::<Vec<_>>()
            .join("\n");
        FieldOutcome::from_count(replace_placeholder(pres, token, &text, &style))
    };
    rec.finish(token, outcome);
}

fn apply_text_fields(pres: &mut Presentation, record: &ReportRecord, config: &GenerationConfig, rec: &mut Recorder<'_>) {
    let now = Local::now();
    for field in TEXT_FIELDS {
        rec.start(field.token);
        let outcome = match field.value(record, now) {
            None => FieldOutcome::Skipped,
            Some(value) => {
                let style = text_style(config, field.size_for(&value, &config.text)).bold(field.is_bold());
                FieldOutcome::from_count(replace_placeholder(pres, field.token, &value, &style))
            }
        };
        rec.finish(field.token, outcome);
    }
}

/// Only tokens the template actually holds are recorded.
fn apply_dynamic_fields(pres: &mut Presentation, record: &ReportRecord, config: &GenerationConfig, rec: &mut Recorder<'_>) {
    let style = text_style(config, config.text.table_pt);
    for (token, value) in dynamic_fields(record) {
        let count = replace_placeholder(pres, &token, &value, &style);
        if count > 0 {
            rec.finish(&token, FieldOutcome::Applied { locations: count });
        }
    }
}

/// Returns the number of images fetched.
async fn apply_images(
    pres: &mut Presentation,
    record: &ReportRecord,
    config: &GenerationConfig,
    fetcher: &dyn ImageFetcher,
    rec: &mut Recorder<'_>,
) -> usize {
    let mut downloaded = 0;
    for field in IMAGE_FIELDS {
        let key = field.key;
        rec.start(key);

        let clear_tokens = |pres: &mut Presentation| {
            for token in field.tokens() {
                clear_placeholder(pres, token);
            }
        };

        let Some(url) = image_url(record, key) else {
            clear_tokens(pres);
            rec.finish(key, FieldOutcome::Skipped);
            continue;
        };
        let slot = config.slots.get(key);
        let has_token = field.tokens().any(|t| !find_shapes_containing(pres, t).is_empty());
        if !has_token && slot.is_none() {
            rec.finish(key, FieldOutcome::NotFound);
            continue;
        }

        let bytes = match fetcher.fetch(&url).await {
            Ok(bytes) => {
                downloaded += 1;
                bytes
            }
            Err(e) => {
                clear_tokens(pres);
                rec.finish(key, FieldOutcome::Failed { error: e.for_field(key) });
                continue;
            }
        };
        let image = match prepare_image(&bytes) {
            Ok(image) => image,
            Err(detail) => {
                clear_tokens(pres);
                let error = crate::error::FieldError::UndecodableImage {
                    field: key.to_string(),
                    detail,
                };
                rec.finish(key, FieldOutcome::Failed { error });
                continue;
            }
        };

        let crop = slot.and_then(|s| s.crop);
        let mut placed = 0;
        let mut token_error = None;
        for token in field.tokens() {
            match replace_placeholder_with_image(pres, token, &image, crop) {
                Ok(n) => placed += n,
                Err(e) => token_error = Some(e.for_field(key)),
            }
        }

        let outcome = if placed > 0 {
            FieldOutcome::Applied { locations: placed }
        } else if let Some(slot) = slot {
            match place_prepared(pres, slot, &image) {
                Ok(at) => {
                    debug!("{key} placed in slot on slide {}", at.slide + 1);
                    FieldOutcome::Applied { locations: 1 }
                }
                Err(e) => FieldOutcome::Failed { error: e.for_field(key) },
            }
        } else if let Some(error) = token_error {
            FieldOutcome::Failed { error }
        } else {
            FieldOutcome::NotFound
        };
        rec.finish(key, outcome);
    }
    downloaded
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn at() -> DateTime<Local> {
        Local.with_ymd_and_hms(2026, 2, 7, 9, 5, 3).unwrap()
    }

    #[test]
    fn file_name_uses_symbol_and_short_id() {
        let r = ReportRecord::from_value(json!({"nse_symbol": "WIPRO", "report_id": "a1b2c3d4-e5f6"})).unwrap();
        assert_eq!(output_file_name(&r, at()), "WIPRO_a1b2c3d4_20260207_090503.pptx");
    }

    #[test]
    fn file_name_defaults() {
        let r = ReportRecord::new();
        assert_eq!(output_file_name(&r, at()), "report_unknown_20260207_090503.pptx");
    }

    #[test]
    fn file_name_is_sanitised() {
        let r = ReportRecord::from_value(json!({"symbol": "M&M/..", "report_id": "x y"})).unwrap();
        assert_eq!(output_file_name(&r, at()), "M_M_.._x_y_20260207_090503.pptx");
    }
}
