//! End-to-end tests for research-deck.
//!
//! Templates are built in memory (see `common`), so these run offline. Image
//! downloads go through a stub [`ImageFetcher`]. The one live test, against
//! Screener.in, is gated behind `E2E_ENABLED`.
//!
//! Run with:
//!   cargo test --test e2e -- --nocapture

mod common;

use common::{png, part_names, Box4, DeckBuilder};
use futures::future::BoxFuture;
use research_deck::{
    generate, generate_to_dir, inspect_template, populate, DeckError, FieldError, FieldOutcome,
    GenerationConfig, GenerationProgressCallback, ImageFetcher, ImageSlot, Presentation,
    ReportRecord, SlotTable,
};
use serde_json::json;
use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

// ── Test helpers ─────────────────────────────────────────────────────────────

/// Serves fixed bytes per URL; unknown URLs fail like a 404.
#[derive(Default)]
struct StubFetcher {
    images: HashMap<String, Vec<u8>>,
    calls: AtomicUsize,
}

impl StubFetcher {
    fn with(mut self, url: &str, bytes: Vec<u8>) -> Self {
        self.images.insert(url.to_string(), bytes);
        self
    }
}

impl ImageFetcher for StubFetcher {
    fn fetch<'a>(&'a self, url: &'a str) -> BoxFuture<'a, Result<Vec<u8>, FieldError>> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        let result = self.images.get(url).cloned().ok_or_else(|| FieldError::HttpStatus {
            field: String::new(),
            url: url.to_string(),
            status: 404,
        });
        Box::pin(async move { result })
    }
}

fn cover_deck() -> DeckBuilder {
    DeckBuilder::new()
        .slide()
        .text("Title", "{{company_name}}", Box4(0.5, 0.4, 9.0, 0.8))
        .text("Rating", "Rating: {{recommendation}}", Box4(0.5, 1.3, 4.0, 0.4))
        .text("Revenue", "{{revenue_fy25}}", Box4(5.0, 1.3, 2.0, 0.4))
        .slide()
        .table("Financials", 9, 6, "{{financial_table}}", Box4(0.5, 0.5, 9.0, 4.0))
        .slide()
        .text("Chart", "{{chart_custom}}", Box4(1.0, 1.0, 6.0, 3.0))
}

fn acme() -> ReportRecord {
    ReportRecord::from_value(json!({
        "report_id": "a1b2c3d4-0000-4000-8000-000000000000",
        "company_name": "Acme Corp",
        "nse_symbol": "ACME",
        "rating": "BUY",
        "revenue_fy24": 100,
        "revenue_fy25": 121,
        "ebitda_fy25": 30.25
    }))
    .unwrap()
}

fn config_for(template: &Path, fetcher: Arc<StubFetcher>) -> GenerationConfig {
    GenerationConfig::builder()
        .template(template.to_string_lossy())
        .slots(SlotTable::empty())
        .image_fetcher(fetcher)
        .build()
        .unwrap()
}

fn shape_text(pres: &Presentation, slide: usize, name: &str) -> String {
    pres.slide(slide)
        .and_then(|s| s.shapes().iter().find(|sh| sh.name == name))
        .and_then(|sh| sh.text_frame())
        .map(|f| f.text())
        .unwrap_or_default()
}

// ── Text and grid ────────────────────────────────────────────────────────────

#[tokio::test]
async fn acme_deck_is_populated() {
    let dir = tempfile::tempdir().unwrap();
    let template = cover_deck().write_to(dir.path(), "template.pptx");
    let config = config_for(&template, Arc::new(StubFetcher::default()));

    let output = generate(&acme(), &config).await.unwrap();

    assert_eq!(
        output.results.get("company_name"),
        Some(&FieldOutcome::Applied { locations: 1 })
    );
    assert_eq!(
        output.results.get("financial_table"),
        Some(&FieldOutcome::Applied { locations: 1 })
    );
    assert_eq!(
        output.results.get("revenue_fy25"),
        Some(&FieldOutcome::Applied { locations: 1 })
    );
    assert_eq!(output.results.get("chart_custom"), Some(&FieldOutcome::Skipped));
    assert_eq!(output.stats.slide_count, 3);

    // Re-open what was written.
    let pres = Presentation::from_bytes(&output.bytes).unwrap();
    assert_eq!(shape_text(&pres, 0, "Title"), "Acme Corp");
    assert_eq!(shape_text(&pres, 0, "Rating"), "Rating: BUY");
    assert_eq!(shape_text(&pres, 0, "Revenue"), "121");

    let table = pres.slide(1).unwrap().shapes()[0].table().unwrap();
    assert_eq!(table.cell_text(0, 0).as_deref(), Some("Particulars"));
    assert_eq!(table.cell_text(0, 1).as_deref(), Some("FY24A"));
    assert_eq!(table.cell_text(1, 0).as_deref(), Some("Sales"));
    assert_eq!(table.cell_text(1, 2).as_deref(), Some("121"));
    assert_eq!(table.cell_text(2, 2).as_deref(), Some("21.0"));
    assert_eq!(table.cell_text(4, 2).as_deref(), Some("25.0"));
    assert_eq!(table.cell_text(1, 3).as_deref(), Some("-"));

    // The cleared image token leaves no braces behind.
    assert!(!shape_text(&pres, 2, "Chart").contains("{{"));
}

#[tokio::test]
async fn input_record_is_not_modified() {
    let dir = tempfile::tempdir().unwrap();
    let template = cover_deck().write_to(dir.path(), "template.pptx");
    let config = config_for(&template, Arc::new(StubFetcher::default()));
    let record = acme();
    let before = record.clone();

    generate(&record, &config).await.unwrap();
    assert_eq!(record, before);
    assert!(!record.has("revenue_growth_fy25"));
}

#[tokio::test]
async fn absent_tokens_are_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let template = DeckBuilder::new()
        .slide()
        .text("Title", "{{company_name}}", Box4(0.5, 0.4, 9.0, 0.8))
        .write_to(dir.path(), "template.pptx");
    let config = config_for(&template, Arc::new(StubFetcher::default()));

    let output = generate(&acme(), &config).await.unwrap();
    assert_eq!(output.results.get("company_background"), Some(&FieldOutcome::Skipped));
    assert_eq!(output.results.get("nse_symbol"), Some(&FieldOutcome::NotFound));
    // Dynamic tokens are only reported where the template has them.
    assert!(output.results.get("revenue_fy25").is_none());
}

#[tokio::test]
async fn grid_falls_back_to_text_shape() {
    let dir = tempfile::tempdir().unwrap();
    let template = DeckBuilder::new()
        .slide()
        .text("Grid", "{{financial_table}}", Box4(0.5, 0.5, 9.0, 4.0))
        .write_to(dir.path(), "template.pptx");
    let config = config_for(&template, Arc::new(StubFetcher::default()));

    let output = generate(&acme(), &config).await.unwrap();
    assert_eq!(
        output.results.get("financial_table"),
        Some(&FieldOutcome::Applied { locations: 1 })
    );
    let pres = Presentation::from_bytes(&output.bytes).unwrap();
    let text = shape_text(&pres, 0, "Grid");
    assert!(text.starts_with("Particulars | FY24A | FY25A"), "got {text:?}");
    assert!(text.contains("Sales | 100 | 121 | - | - | -"), "got {text:?}");
}

// ── Images ───────────────────────────────────────────────────────────────────

#[tokio::test]
async fn chart_replaces_token_shape() {
    let dir = tempfile::tempdir().unwrap();
    let template = cover_deck().write_to(dir.path(), "template.pptx");
    let url = "https://charts.example.com/custom.png";
    let fetcher = Arc::new(StubFetcher::default().with(url, png(40, 20)));
    let config = config_for(&template, Arc::clone(&fetcher));

    let mut record = acme();
    record.set("chart_custom", url);
    let output = generate(&record, &config).await.unwrap();

    assert_eq!(
        output.results.get("chart_custom"),
        Some(&FieldOutcome::Applied { locations: 1 })
    );
    assert_eq!(output.stats.images_downloaded, 1);
    assert_eq!(fetcher.calls.load(Ordering::Relaxed), 1);

    let parts = part_names(&output.bytes);
    assert!(parts.iter().any(|p| p.starts_with("ppt/media/") && p.ends_with(".png")));
    let pres = Presentation::from_bytes(&output.bytes).unwrap();
    let slide = pres.slide(2).unwrap();
    assert!(slide.shapes().iter().any(|s| s.has_picture()));
    assert_eq!(shape_text(&pres, 2, "Chart"), "");
}

#[tokio::test]
async fn chart_goes_to_slot_without_token() {
    let dir = tempfile::tempdir().unwrap();
    let template = DeckBuilder::new()
        .slide()
        .text("Title", "{{company_name}}", Box4(0.5, 0.4, 9.0, 0.8))
        .write_to(dir.path(), "template.pptx");
    let url = "https://charts.example.com/pl.png";
    let fetcher = Arc::new(StubFetcher::default().with(url, png(100, 50)));
    let config = GenerationConfig::builder()
        .template(template.to_string_lossy())
        .slots(SlotTable::empty())
        .slot("chart_profit_loss", ImageSlot::width_only(0, 0.5, 1.5, 4.0))
        .image_fetcher(fetcher)
        .build()
        .unwrap();

    let mut record = acme();
    record.set("chart_profit_loss", url);
    let output = generate(&record, &config).await.unwrap();

    assert_eq!(
        output.results.get("chart_profit_loss"),
        Some(&FieldOutcome::Applied { locations: 1 })
    );
    let pres = Presentation::from_bytes(&output.bytes).unwrap();
    let pic = pres.slide(0).unwrap().shapes().iter().find(|s| s.has_picture()).unwrap();
    let rect = pic.rect.unwrap();
    // 4in wide, height from the 2:1 image.
    assert_eq!(rect.width, 4 * 914_400);
    assert_eq!(rect.height, 2 * 914_400);
}

#[tokio::test]
async fn failed_download_is_recorded_and_pass_continues() {
    let dir = tempfile::tempdir().unwrap();
    let template = cover_deck().write_to(dir.path(), "template.pptx");
    let config = config_for(&template, Arc::new(StubFetcher::default()));

    let mut record = acme();
    record.set("chart_custom", "https://charts.example.com/missing.png");
    let output = generate(&record, &config).await.unwrap();

    match output.results.get("chart_custom") {
        Some(FieldOutcome::Failed { error: FieldError::HttpStatus { field, status, .. } }) => {
            assert_eq!(field, "chart_custom");
            assert_eq!(*status, 404);
        }
        other => panic!("unexpected outcome: {other:?}"),
    }
    assert_eq!(output.stats.failed, 1);
    // Later fields were still applied.
    let pres = Presentation::from_bytes(&output.bytes).unwrap();
    assert_eq!(shape_text(&pres, 0, "Title"), "Acme Corp");
    assert_eq!(shape_text(&pres, 2, "Chart"), "");
}

#[tokio::test]
async fn slot_beyond_last_slide_fails_the_field() {
    let dir = tempfile::tempdir().unwrap();
    let template = cover_deck().write_to(dir.path(), "template.pptx");
    let url = "https://charts.example.com/bs.png";
    let config = GenerationConfig::builder()
        .template(template.to_string_lossy())
        .slots(SlotTable::empty())
        .slot("chart_balance_sheet", ImageSlot::new(8, 0.5, 0.5, 4.0, 2.0))
        .image_fetcher(Arc::new(StubFetcher::default().with(url, png(10, 10))))
        .build()
        .unwrap();

    let mut record = acme();
    record.set("chart_balance_sheet", url);
    let output = generate(&record, &config).await.unwrap();
    assert!(matches!(
        output.results.get("chart_balance_sheet"),
        Some(FieldOutcome::Failed {
            error: FieldError::SlideOutOfRange { slide: 8, total: 3, .. }
        })
    ));
}

#[tokio::test]
async fn undecodable_image_fails_the_field() {
    let dir = tempfile::tempdir().unwrap();
    let template = cover_deck().write_to(dir.path(), "template.pptx");
    let url = "https://charts.example.com/broken.png";
    let fetcher = Arc::new(StubFetcher::default().with(url, b"<html>not an image</html>".to_vec()));
    let config = config_for(&template, fetcher);

    let mut record = acme();
    record.set("chart_custom", url);
    let output = generate(&record, &config).await.unwrap();
    assert!(matches!(
        output.results.get("chart_custom"),
        Some(FieldOutcome::Failed { error: FieldError::UndecodableImage { .. } })
    ));
}

// ── Output and inspection ────────────────────────────────────────────────────

#[tokio::test]
async fn deck_is_written_atomically_to_output_dir() {
    let dir = tempfile::tempdir().unwrap();
    let template = cover_deck().write_to(dir.path(), "template.pptx");
    let out_dir = dir.path().join("out");
    let config = GenerationConfig::builder()
        .template(template.to_string_lossy())
        .output_dir(&out_dir)
        .slots(SlotTable::empty())
        .image_fetcher(Arc::new(StubFetcher::default()))
        .build()
        .unwrap();

    let (path, output) = generate_to_dir(&acme(), &config).await.unwrap();
    assert!(path.starts_with(&out_dir));
    let name = path.file_name().unwrap().to_string_lossy().into_owned();
    assert!(name.starts_with("ACME_a1b2c3d4_"), "got {name}");
    assert!(name.ends_with(".pptx"));
    assert_eq!(std::fs::read(&path).unwrap(), output.bytes);

    let leftovers: Vec<_> = std::fs::read_dir(&out_dir)
        .unwrap()
        .filter_map(Result::ok)
        .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
        .collect();
    assert!(leftovers.is_empty());
}

#[tokio::test]
async fn untouched_template_parts_survive() {
    let dir = tempfile::tempdir().unwrap();
    let template = cover_deck().write_to(dir.path(), "template.pptx");
    let config = config_for(&template, Arc::new(StubFetcher::default()));

    let output = generate(&acme(), &config).await.unwrap();
    let before = part_names(&std::fs::read(&template).unwrap());
    let after = part_names(&output.bytes);
    assert!(before.iter().all(|p| after.contains(p)));
}

#[tokio::test]
async fn populate_works_on_an_open_deck() {
    let mut pres = Presentation::from_bytes(&cover_deck().build()).unwrap();
    let config = GenerationConfig::builder()
        .slots(SlotTable::empty())
        .image_fetcher(Arc::new(StubFetcher::default()))
        .build()
        .unwrap();

    let results = populate(&mut pres, &acme(), &config).await.unwrap();
    assert!(results.get("company_name").is_some_and(FieldOutcome::is_applied));
    assert_eq!(shape_text(&pres, 0, "Title"), "Acme Corp");
}

#[tokio::test]
async fn inspect_lists_every_token() {
    let dir = tempfile::tempdir().unwrap();
    let template = cover_deck().write_to(dir.path(), "template.pptx");
    let config = config_for(&template, Arc::new(StubFetcher::default()));

    let report = inspect_template(&config).await.unwrap();
    assert_eq!(report.slide_count, 3);
    let tokens: Vec<&str> = report.placeholders.iter().map(|p| p.token.as_str()).collect();
    assert_eq!(
        tokens,
        ["company_name", "recommendation", "revenue_fy25", "financial_table", "chart_custom"]
    );
    let rating = &report.placeholders[1];
    assert!(!rating.standalone);
    assert_eq!(rating.shape_name, "Rating");
}

#[tokio::test]
async fn missing_template_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let config = config_for(&dir.path().join("absent.pptx"), Arc::new(StubFetcher::default()));
    let err = generate(&acme(), &config).await.unwrap_err();
    assert!(matches!(err, DeckError::TemplateNotFound { .. }));
}

#[tokio::test]
async fn non_zip_template_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("template.pptx");
    std::fs::write(&path, b"%PDF-1.7 not a deck").unwrap();
    let config = config_for(&path, Arc::new(StubFetcher::default()));
    let err = generate(&acme(), &config).await.unwrap_err();
    assert!(matches!(err, DeckError::NotAPresentation { .. }));
}

// ── Progress ─────────────────────────────────────────────────────────────────

#[derive(Default)]
struct Recording {
    completed: Mutex<Vec<String>>,
    totals: Mutex<Option<(usize, usize)>>,
}

impl GenerationProgressCallback for Recording {
    fn on_field_complete(&self, field: &str, _outcome: &FieldOutcome) {
        self.completed.lock().unwrap().push(field.to_string());
    }

    fn on_generation_complete(&self, applied: usize, total: usize) {
        *self.totals.lock().unwrap() = Some((applied, total));
    }
}

#[tokio::test]
async fn progress_sees_every_outcome() {
    let dir = tempfile::tempdir().unwrap();
    let template = cover_deck().write_to(dir.path(), "template.pptx");
    let progress = Arc::new(Recording::default());
    let config = GenerationConfig::builder()
        .template(template.to_string_lossy())
        .slots(SlotTable::empty())
        .image_fetcher(Arc::new(StubFetcher::default()))
        .progress_callback(progress.clone())
        .build()
        .unwrap();

    let output = generate(&acme(), &config).await.unwrap();
    let completed = progress.completed.lock().unwrap();
    assert_eq!(completed.len(), output.results.len());
    assert_eq!(
        *progress.totals.lock().unwrap(),
        Some((output.stats.applied, output.results.len()))
    );
}

// ── Live ─────────────────────────────────────────────────────────────────────

/// Fetches real data from Screener.in and Yahoo Finance.
#[cfg(feature = "screener")]
#[tokio::test]
async fn live_screener_enrichment() {
    if std::env::var("E2E_ENABLED").is_err() {
        println!("SKIP — set E2E_ENABLED=1 to run live tests");
        return;
    }
    let _ = tracing_subscriber::fmt()
        .with_env_filter("research_deck=debug,screener_client=debug")
        .with_test_writer()
        .try_init();

    let dir = tempfile::tempdir().unwrap();
    let template = cover_deck().write_to(dir.path(), "template.pptx");
    let source = research_deck::ScreenerSource::new(30).unwrap();
    let config = GenerationConfig::builder()
        .template(template.to_string_lossy())
        .slots(SlotTable::empty())
        .financial_source(Arc::new(source))
        .build()
        .unwrap();

    let record = ReportRecord::from_value(json!({
        "report_id": "live-0001",
        "company_name": "Wipro",
        "nse_symbol": "WIPRO"
    }))
    .unwrap();
    let output = generate(&record, &config).await.unwrap();
    println!("{:#?}", output.results);
    assert_eq!(
        output.results.get("financial_table"),
        Some(&FieldOutcome::Applied { locations: 1 })
    );
}
