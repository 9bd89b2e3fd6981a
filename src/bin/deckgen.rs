//! CLI binary for research-deck.
//!
//! A thin shim over the library crate that maps CLI flags to
//! `GenerationConfig`, generates one deck, and prints the per-field results.
//! `--serve` runs the webhook server instead.

use anyhow::{bail, Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use research_deck::{
    generate_to_dir, inspect_template, FieldOutcome, GenerationConfig, GenerationProgressCallback,
    ProgressCallback, ReportRecord, SlotTable,
};
use std::io::{self, Read};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn yellow(s: &str) -> String {
    format!("\x1b[33m{s}\x1b[0m")
}

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress callback: one bar over the field list, with a log line
/// for every field that failed.
struct CliProgressCallback {
    bar: ProgressBar,
    failures: AtomicUsize,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner());
        bar.set_style(spinner_style);
        bar.set_prefix("Preparing");
        bar.set_message("Opening template…");
        bar.enable_steady_tick(Duration::from_millis(80));
        Arc::new(Self {
            bar,
            failures: AtomicUsize::new(0),
        })
    }
}

impl GenerationProgressCallback for CliProgressCallback {
    fn on_generation_start(&self, total_fields: usize, slide_count: usize) {
        let style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  [{bar:42.green/238}] {pos:>3}/{len} fields  {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ");
        self.bar.set_length(total_fields as u64);
        self.bar.set_style(style);
        self.bar.set_prefix("Populating");
        self.bar.println(format!(
            "{} {}",
            bold("◆"),
            bold(&format!("Template has {slide_count} slides"))
        ));
    }

    fn on_field_start(&self, field: &str) {
        self.bar.set_message(field.to_string());
    }

    fn on_field_complete(&self, field: &str, outcome: &FieldOutcome) {
        if let FieldOutcome::Failed { error } = outcome {
            self.failures.fetch_add(1, Ordering::Relaxed);
            self.bar.println(format!("{} {field}: {error}", red("✘")));
        }
        self.bar.inc(1);
    }

    fn on_generation_complete(&self, applied: usize, total: usize) {
        self.bar.finish_and_clear();
        let failed = self.failures.load(Ordering::Relaxed);
        eprintln!(
            "{} {}/{} fields applied{}",
            if failed == 0 { green("✔") } else { yellow("⚠") },
            bold(&applied.to_string()),
            total,
            if failed == 0 {
                String::new()
            } else {
                format!("  ({} failed)", red(&failed.to_string()))
            }
        );
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Generate a deck from a record file
  deckgen report.json --template master_template.pptx -o ./output

  # Read the record from stdin
  cat report.json | deckgen -

  # List every placeholder in a template
  deckgen --inspect-only --template master_template.pptx

  # Override chart slots
  deckgen report.json --slots slots.json

  # Run the webhook server
  deckgen --serve 0.0.0.0:5000

SLOT FILE FORMAT:
  { "chart_custom": { "slide": 9, "left_in": 0.5, "top_in": 0.75,
                      "width_in": 9.0, "height_in": 4.5 } }
  Omit height_in to keep the image's aspect ratio.

ENVIRONMENT VARIABLES:
  DECKGEN_TEMPLATE          Template path or URL
  DECKGEN_OUTPUT_DIR        Output directory
  DECKGEN_DOWNLOAD_TIMEOUT  Image download timeout (seconds)
  RUST_LOG                  Log filter, e.g. research_deck=debug
"#;

/// Fill a PowerPoint template with an equity research record.
#[derive(Parser, Debug)]
#[command(
    name = "deckgen",
    version,
    about = "Fill a PowerPoint template with an equity research record",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Record JSON file, or `-` for stdin.
    record: Option<String>,

    /// Template path or HTTP/HTTPS URL.
    #[arg(short, long, env = "DECKGEN_TEMPLATE", default_value = "master_template.pptx")]
    template: String,

    /// Directory for generated decks.
    #[arg(short, long, env = "DECKGEN_OUTPUT_DIR", default_value = "./output")]
    output_dir: PathBuf,

    /// JSON file of image slots merged over the built-in table.
    #[arg(long, env = "DECKGEN_SLOTS")]
    slots: Option<PathBuf>,

    /// Do not expose metric×year tokens such as {{pe_fy26e}}.
    #[arg(long)]
    no_dynamic_fields: bool,

    /// Fill missing financials from Screener.in (feature `screener`).
    #[arg(long, env = "DECKGEN_SCREENER")]
    screener: bool,

    /// Print the placeholder inventory and exit.
    #[arg(long)]
    inspect_only: bool,

    /// Run the webhook server on this address instead.
    #[arg(long, value_name = "ADDR", env = "DECKGEN_SERVE")]
    serve: Option<String>,

    /// Output structured JSON instead of a field table.
    #[arg(long, env = "DECKGEN_JSON")]
    json: bool,

    /// Disable progress bar.
    #[arg(long, env = "DECKGEN_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "DECKGEN_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "DECKGEN_QUIET")]
    quiet: bool,

    /// Image and template download timeout in seconds.
    #[arg(long, env = "DECKGEN_DOWNLOAD_TIMEOUT", default_value_t = 30)]
    download_timeout: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json && cli.serve.is_none();
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .with_writer(io::stderr)
        .init();

    let progress_cb: Option<ProgressCallback> = if show_progress && !cli.inspect_only {
        Some(CliProgressCallback::new() as Arc<dyn GenerationProgressCallback>)
    } else {
        None
    };
    let config = build_config(&cli, progress_cb).await?;

    // ── Server mode ──────────────────────────────────────────────────────
    if let Some(ref addr) = cli.serve {
        #[cfg(feature = "server")]
        {
            research_deck::server::serve(addr, config)
                .await
                .context("Server failed")?;
            return Ok(());
        }
        #[cfg(not(feature = "server"))]
        bail!("--serve {addr} requires the `server` feature");
    }

    // ── Inspect-only mode ────────────────────────────────────────────────
    if cli.inspect_only {
        let report = inspect_template(&config)
            .await
            .context("Failed to inspect template")?;
        if cli.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&report).context("Failed to serialize report")?
            );
        } else {
            println!("Template:     {}", report.template);
            println!("Slides:       {}", report.slide_count);
            println!("Placeholders: {}", report.placeholders.len());
            for site in &report.placeholders {
                println!(
                    "  slide {:>2}  {:<28} {}{}",
                    site.slide + 1,
                    site.token,
                    dim(&site.shape_name),
                    if site.standalone { "" } else { "  (inline)" }
                );
            }
        }
        return Ok(());
    }

    // ── Run generation ───────────────────────────────────────────────────
    let Some(ref source) = cli.record else {
        bail!("A record file (or `-` for stdin) is required");
    };
    let record = read_record(source).await?;
    let (path, output) = generate_to_dir(&record, &config)
        .await
        .context("Generation failed")?;

    if cli.json {
        let body = serde_json::json!({
            "path": path,
            "file_name": output.file_name,
            "results": output.results,
            "stats": output.stats,
        });
        println!(
            "{}",
            serde_json::to_string_pretty(&body).context("Failed to serialise output")?
        );
        return Ok(());
    }

    if !cli.quiet {
        for (field, outcome) in output.results.iter() {
            let mark = match outcome {
                FieldOutcome::Applied { .. } => green("✔"),
                FieldOutcome::Failed { .. } => red("✘"),
                FieldOutcome::NotFound | FieldOutcome::Skipped => dim("·"),
            };
            eprintln!("  {mark} {field:<32} {}", dim(&outcome.to_string()));
        }
        eprintln!(
            "{}  {}/{} fields  {} images  {}ms  →  {}",
            if output.stats.failed == 0 { green("✔") } else { yellow("⚠") },
            output.stats.applied,
            output.results.len(),
            output.stats.images_downloaded,
            output.stats.duration_ms,
            bold(&path.display().to_string()),
        );
    }
    Ok(())
}

/// Map CLI args to `GenerationConfig`.
async fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<GenerationConfig> {
    let mut builder = GenerationConfig::builder()
        .template(cli.template.clone())
        .output_dir(cli.output_dir.clone())
        .download_timeout_secs(cli.download_timeout)
        .dynamic_fields(!cli.no_dynamic_fields);

    if let Some(ref path) = cli.slots {
        let text = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read slots from {:?}", path))?;
        let overrides = SlotTable::from_json(&text).context("Invalid slot file")?;
        builder = builder.slots(SlotTable::default().merge(overrides));
    }

    if cli.screener {
        #[cfg(feature = "screener")]
        {
            let source = research_deck::ScreenerSource::new(cli.download_timeout)
                .context("Failed to create Screener client")?;
            builder = builder.financial_source(Arc::new(source));
        }
        #[cfg(not(feature = "screener"))]
        bail!("--screener requires the `screener` feature");
    }

    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

async fn read_record(source: &str) -> Result<ReportRecord> {
    let text = if source == "-" {
        tokio::task::spawn_blocking(|| {
            let mut buf = String::new();
            io::stdin().read_to_string(&mut buf).map(|_| buf)
        })
        .await
        .context("stdin reader panicked")?
        .context("Failed to read record from stdin")?
    } else {
        tokio::fs::read_to_string(source)
            .await
            .with_context(|| format!("Failed to read record from {source}"))?
    };
    ReportRecord::from_json(&text).context("Invalid record")
}
