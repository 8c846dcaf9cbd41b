//! CLI binary for scribeme.
//!
//! A thin shim over the library crate that maps CLI flags
//! to `ExtractionConfig` and prints results.

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use scribeme::{
    describe_images, ingest, inspect, write_atomic, ExtractionConfig, ExtractionProgressCallback,
    Language, ProgressCallback, UnitSeparator,
};
use std::collections::HashMap;
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
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
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Live progress bar with one log line per unit. Units finish out of order,
/// so start times are tracked per index.
struct CliProgressCallback {
    bar: ProgressBar,
    start_times: Mutex<HashMap<usize, Instant>>,
    errors: AtomicUsize,
}

impl CliProgressCallback {
    /// Spinner until `on_run_start` tells us the unit count.
    fn new_dynamic() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(TICKS);

        bar.set_style(spinner_style);
        bar.set_prefix("Preparing");
        bar.set_message("Opening document…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            start_times: Mutex::new(HashMap::new()),
            errors: AtomicUsize::new(0),
        })
    }

    fn activate_bar(&self, total: usize) {
        let progress_style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} units  \
             ⏱ {elapsed_precise}  ETA {eta_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS);

        self.bar.set_length(total as u64);
        self.bar.set_style(progress_style);
        self.bar.set_prefix("Extracting");
        self.bar.reset_eta();
    }

    fn elapsed_secs(&self, index: usize) -> f64 {
        self.start_times
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&index)
            .map(|t| t.elapsed().as_secs_f64())
            .unwrap_or(0.0)
    }
}

impl ExtractionProgressCallback for CliProgressCallback {
    fn on_run_start(&self, total_units: usize) {
        self.activate_bar(total_units);
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Extracting {total_units} units…"))
        ));
    }

    fn on_unit_start(&self, index: usize, _total: usize) {
        self.start_times
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(index, Instant::now());
        self.bar.set_message(format!("unit {index}"));
    }

    fn on_unit_complete(&self, index: usize, total: usize, enrichment_count: usize) {
        let secs = self.elapsed_secs(index);
        self.bar.println(format!(
            "  {} Unit {:>3}/{:<3}  {:<14}  {}",
            green("✓"),
            index,
            total,
            dim(&format!("{enrichment_count:>2} described")),
            dim(&format!("{secs:.1}s")),
        ));
        self.bar.inc(1);
    }

    fn on_unit_error(&self, index: usize, total: usize, error: &str) {
        let secs = self.elapsed_secs(index);
        self.errors.fetch_add(1, Ordering::SeqCst);

        let msg = match error.char_indices().nth(79) {
            Some((cut, _)) => format!("{}\u{2026}", &error[..cut]),
            None => error.to_string(),
        };

        self.bar.println(format!(
            "  {} Unit {:>3}/{:<3}  {}  {}",
            red("✗"),
            index,
            total,
            red(&msg),
            dim(&format!("{secs:.1}s")),
        ));
        self.bar.inc(1);
    }

    fn on_run_complete(&self, total_units: usize, total_enrichment_count: usize) {
        self.bar.finish_and_clear();
        let failed = self.errors.load(Ordering::SeqCst);

        if failed == 0 {
            eprintln!(
                "{} {} units extracted, {} images described",
                green("✔"),
                bold(&total_units.to_string()),
                bold(&total_enrichment_count.to_string())
            );
        } else {
            eprintln!(
                "{} {} units extracted ({} with errors), {} images described",
                cyan("⚠"),
                bold(&total_units.to_string()),
                red(&failed.to_string()),
                total_enrichment_count
            );
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Plain text extraction (stdout)
  scribeme report.pdf

  # Describe up to 10 images in Spanish, write to a file
  scribeme --describe --budget 10 --language spanish slides.pptx -o slides.txt

  # OCR every image (no budget), Arabic
  scribeme --ocr --language ar scan.pdf

  # Legacy PowerPoint (needs LibreOffice)
  scribeme --describe old-deck.ppt

  # Describe loose images (same budget and language rules)
  scribeme --images chart.png photo.jpg --language spanish

  # Count units and images without any API key
  scribeme --inspect-only deck.pptx

  # Structured JSON output
  scribeme --json --describe report.pdf > report.json

LANGUAGES:
  english (default), arabic, spanish. Anything else falls back to English.

ENVIRONMENT VARIABLES:
  OPENAI_API_KEY          OpenAI API key
  ANTHROPIC_API_KEY       Anthropic API key
  GEMINI_API_KEY          Google Gemini API key
  EDGEQUAKE_LLM_PROVIDER  Override provider (openai, anthropic, gemini, ollama)
  EDGEQUAKE_MODEL         Override model ID
  PDFIUM_LIB_PATH         Directory containing libpdfium
"#;

/// Extract text and images from PDFs and slide decks.
#[derive(Parser, Debug)]
#[command(
    name = "scribeme",
    version,
    about = "Extract text and images from PDFs and slide decks, with budgeted OCR and vision descriptions",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Local file path (.pdf, .pptx, .ppt) or HTTP/HTTPS URL.
    #[arg(required_unless_present = "images")]
    input: Option<String>,

    /// Describe these image files or URLs instead of extracting a document.
    #[arg(long, num_args = 1.., value_name = "IMAGE", conflicts_with_all = ["input", "inspect_only", "ocr"])]
    images: Vec<String>,

    /// Write output to this file instead of stdout.
    #[arg(short, long, env = "SCRIBEME_OUTPUT")]
    output: Option<PathBuf>,

    /// Run OCR on every embedded image (not budget-limited).
    #[arg(long, env = "SCRIBEME_OCR")]
    ocr: bool,

    /// Describe embedded images with a vision model, up to --budget.
    #[arg(long, env = "SCRIBEME_DESCRIBE")]
    describe: bool,

    /// Language for OCR and descriptions: english, arabic, spanish.
    #[arg(short, long, env = "SCRIBEME_LANGUAGE", default_value = "english")]
    language: String,

    /// Maximum number of images described in this run.
    #[arg(short, long, env = "SCRIBEME_BUDGET", default_value_t = 25)]
    budget: usize,

    /// Number of units processed concurrently.
    #[arg(short, long, env = "SCRIBEME_CONCURRENCY", default_value_t = 10)]
    concurrency: usize,

    /// Vision model ID (default: gpt-4o).
    #[arg(long, env = "EDGEQUAKE_MODEL")]
    model: Option<String>,

    /// LLM provider: openai, anthropic, gemini, ollama, azure.
    #[arg(long, env = "EDGEQUAKE_PROVIDER")]
    provider: Option<String>,

    /// Path to a text file with a custom description prompt.
    #[arg(long, env = "SCRIBEME_PROMPT")]
    prompt: Option<PathBuf>,

    /// PDF user password for encrypted documents.
    #[arg(long, env = "SCRIBEME_PASSWORD")]
    password: Option<String>,

    /// Unit separator: blank, hr, comment, or custom string.
    #[arg(long, env = "SCRIBEME_SEPARATOR", default_value = "blank")]
    separator: String,

    /// Tesseract executable.
    #[arg(long, env = "SCRIBEME_TESSERACT", default_value = "tesseract")]
    tesseract: String,

    /// LibreOffice executable for .ppt conversion.
    #[arg(long, env = "SCRIBEME_SOFFICE", default_value = "soffice")]
    soffice: String,

    /// Max output tokens per description.
    #[arg(long, env = "SCRIBEME_MAX_TOKENS", default_value_t = 325)]
    max_tokens: usize,

    /// Retries per description on failure.
    #[arg(long, env = "SCRIBEME_MAX_RETRIES", default_value_t = 2)]
    max_retries: u32,

    /// Output structured JSON instead of text.
    #[arg(long, env = "SCRIBEME_JSON")]
    json: bool,

    /// Disable progress bar.
    #[arg(long, env = "SCRIBEME_NO_PROGRESS")]
    no_progress: bool,

    /// Print unit and image counts only.
    #[arg(long)]
    inspect_only: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "SCRIBEME_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "SCRIBEME_QUIET")]
    quiet: bool,

    /// HTTP download timeout in seconds.
    #[arg(long, env = "SCRIBEME_DOWNLOAD_TIMEOUT", default_value_t = 120)]
    download_timeout: u64,

    /// Per-description timeout in seconds.
    #[arg(long, env = "SCRIBEME_API_TIMEOUT", default_value_t = 60)]
    api_timeout: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar replaces INFO logs; --verbose always wins.
    let show_progress = !cli.quiet
        && !cli.no_progress
        && !cli.json
        && !cli.inspect_only
        && cli.images.is_empty();
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    // ── Ctrl-C stops units that have not started ─────────────────────────
    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                eprintln!("{}", red("Interrupted: finishing units already in progress…"));
                cancel.cancel();
            }
        });
    }

    let progress_cb: Option<ProgressCallback> = if show_progress {
        Some(CliProgressCallback::new_dynamic() as Arc<dyn ExtractionProgressCallback>)
    } else {
        None
    };

    let config = build_config(&cli, progress_cb, cancel).await?;

    // ── Image-description mode ───────────────────────────────────────────
    if !cli.images.is_empty() {
        let descriptions = describe_images(&cli.images, &config)
            .await
            .context("Image description failed")?;

        let rendered = if cli.json {
            serde_json::to_string_pretty(&descriptions)
                .context("Failed to serialise descriptions")?
        } else {
            descriptions
                .iter()
                .map(|d| d.to_string())
                .collect::<Vec<_>>()
                .join("\n\n")
        };
        return emit(&cli, &rendered).await;
    }

    let input = cli
        .input
        .as_deref()
        .context("An input document or --images is required")?;

    // ── Inspect-only mode ────────────────────────────────────────────────
    if cli.inspect_only {
        let summary = inspect(input, &config)
            .await
            .context("Failed to inspect document")?;

        if cli.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&summary).context("Failed to serialise summary")?
            );
        } else {
            println!("File:     {}", summary.name);
            println!("Format:   {}", summary.format);
            println!("{}s:  {}", summary.kind.title(), summary.units);
            println!("Images:   {}", summary.images);
        }
        return Ok(());
    }

    // ── Run extraction ───────────────────────────────────────────────────
    let output = ingest(input, &config)
        .await
        .context("Extraction failed")?;

    let rendered = if cli.json {
        serde_json::to_string_pretty(&output).context("Failed to serialise output")?
    } else {
        output.result.render_text(&config.unit_separator)
    };

    emit(&cli, &rendered).await?;

    // The progress callback already printed a summary.
    if !cli.quiet && !show_progress {
        let stats = &output.result.stats;
        eprintln!(
            "Extracted {} units, described {} images in {}ms{}",
            stats.total_units,
            output.result.total_enrichment_count,
            stats.duration_ms,
            if stats.units_with_errors > 0 {
                format!("  ({} with errors)", stats.units_with_errors)
            } else {
                String::new()
            }
        );
        if let Some(ref path) = cli.output {
            eprintln!("   →  {}", bold(&path.display().to_string()));
        }
    } else if !cli.quiet && output.result.stats.cancelled_units > 0 {
        eprintln!(
            "   {}",
            dim(&format!(
                "{} units cancelled before starting",
                output.result.stats.cancelled_units
            ))
        );
    }

    Ok(())
}

/// Write the rendered output to `--output` (atomically) or stdout.
async fn emit(cli: &Cli, rendered: &str) -> Result<()> {
    if let Some(ref path) = cli.output {
        write_atomic(path, rendered.as_bytes())
            .await
            .with_context(|| format!("Failed to write {}", path.display()))?;
    } else {
        let stdout = io::stdout();
        let mut handle = stdout.lock();
        handle
            .write_all(rendered.as_bytes())
            .context("Failed to write to stdout")?;
        if !rendered.ends_with('\n') {
            handle.write_all(b"\n").ok();
        }
    }
    Ok(())
}

/// Map CLI args to `ExtractionConfig`.
async fn build_config(
    cli: &Cli,
    progress: Option<ProgressCallback>,
    cancel: CancellationToken,
) -> Result<ExtractionConfig> {
    let mut builder = ExtractionConfig::builder()
        .ocr(cli.ocr)
        .describe(cli.describe)
        .language(Language::parse(&cli.language))
        .initial_budget(cli.budget)
        .concurrency(cli.concurrency)
        .unit_separator(parse_separator(&cli.separator))
        .tesseract_cmd(cli.tesseract.clone())
        .soffice_cmd(cli.soffice.clone())
        .max_tokens(cli.max_tokens)
        .max_retries(cli.max_retries)
        .download_timeout_secs(cli.download_timeout)
        .api_timeout_secs(cli.api_timeout)
        .cancel_token(cancel);

    if let Some(ref path) = cli.prompt {
        let prompt = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read prompt from {:?}", path))?;
        builder = builder.description_prompt(prompt.trim());
    }
    if let Some(ref model) = cli.model {
        builder = builder.model(model.clone());
    }
    if let Some(ref provider) = cli.provider {
        builder = builder.provider_name(provider.clone());
    }
    if let Some(ref password) = cli.password {
        builder = builder.password(password.clone());
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

/// Parse `--separator` into a `UnitSeparator`.
fn parse_separator(s: &str) -> UnitSeparator {
    match s.to_lowercase().as_str() {
        "blank" | "none" => UnitSeparator::Blank,
        "hr" | "---" => UnitSeparator::HorizontalRule,
        "comment" => UnitSeparator::Comment,
        _ => UnitSeparator::Custom(s.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn images_mode_needs_no_document() {
        let cli = Cli::try_parse_from(["scribeme", "--images", "a.png", "b.jpg"]).unwrap();
        assert!(cli.input.is_none());
        assert_eq!(cli.images, vec!["a.png", "b.jpg"]);
    }

    #[test]
    fn images_and_document_are_exclusive() {
        assert!(Cli::try_parse_from(["scribeme", "deck.pptx", "--images", "a.png"]).is_err());
        assert!(Cli::try_parse_from(["scribeme"]).is_err());
    }
}
