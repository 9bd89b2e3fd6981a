//! # research-deck
//!
//! Fill a PowerPoint template with an equity research report.
//!
//! ## Why this crate?
//!
//! Research reports arrive as flat JSON records: identity fields, long
//! markdown sections, sparse per-year financials, and chart URLs. Analysts
//! want them as a branded slide deck. Instead of generating slides from
//! scratch, this crate keeps the design in a hand-made `.pptx` template and
//! substitutes `{{placeholder}}` tokens in place, synthesising the financial
//! summary grid and dropping chart images where the template marks them.
//!
//! ## Pipeline Overview
//!
//! ```text
//! record (JSON)
//!  │
//!  ├─ 1. Input    read template from path or URL, check zip magic
//!  ├─ 2. Parse    OPC zip → slides → shapes (text / table / picture)
//!  ├─ 3. Enrich   fill gaps from a FinancialSource; derive growth, margins
//!  ├─ 4. Grid     8-row financial summary into the {{financial_table}} table
//!  ├─ 5. Text     markdown-normalised sections, emphasis → bold runs
//!  ├─ 6. Images   fetch charts; place at token boxes or fixed slots
//!  └─ 7. Output   splice edited XML back into the package, per-field results
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use research_deck::{generate, GenerationConfig, ReportRecord};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let record = ReportRecord::from_json(r#"{
//!         "company_name": "Acme Corp",
//!         "revenue_fy24": 100,
//!         "revenue_fy25": 121
//!     }"#)?;
//!     let config = GenerationConfig::builder()
//!         .template("master_template.pptx")
//!         .build()?;
//!     let output = generate(&record, &config).await?;
//!     std::fs::write(&output.file_name, &output.bytes)?;
//!     eprintln!("{}/{} fields applied", output.stats.applied, output.results.len());
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature    | Default | Description |
//! |------------|---------|-------------|
//! | `cli`      | on      | Enables the `deckgen` binary (clap + anyhow + indicatif + tracing-subscriber) |
//! | `server`   | on      | Webhook HTTP server (axum + tower-http) |
//! | `screener` | off     | [`ScreenerSource`] financial data from Screener.in and Yahoo |
//!
//! Disable the defaults when using only the library:
//! ```toml
//! research-deck = { version = "0.5", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod deck;
pub mod error;
pub mod fields;
pub mod generate;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod record;
#[cfg(feature = "server")]
pub mod server;
pub mod sources;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{FiscalWindow, GenerationConfig, GenerationConfigBuilder, ImageSlot, SlotTable, TextDefaults};
pub use deck::Presentation;
pub use error::{DeckError, FieldError};
pub use generate::{generate, generate_sync, generate_to_dir, inspect_template, output_file_name, populate, TemplateReport};
pub use output::{FieldOutcome, GenerationOutput, GenerationStats, PopulationResult};
pub use pipeline::images::{HttpImageFetcher, ImageFetcher};
pub use progress::{GenerationProgressCallback, NoopProgressCallback, ProgressCallback};
pub use record::ReportRecord;
#[cfg(feature = "screener")]
pub use sources::ScreenerSource;
pub use sources::FinancialSource;
