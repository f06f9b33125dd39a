//! CLI binary for email-slicer.
//!
//! A thin shim over the library crate that maps CLI flags
//! to `SliceConfig` and prints slice plans.

use anyhow::{Context, Result};
use clap::Parser;
use email_slicer::{
    analyze, analyze_stream, analyze_to_file, AnalysisProgressCallback, BoundarySource, FooterRules, OcrSource,
    ProgressCallback, Repair, SliceAnalysis, SliceConfig, Stage, VisualCutParams,
};
use futures::StreamExt;
use indicatif::{ProgressBar, ProgressStyle};
use std::io;
use std::path::{Path, PathBuf};
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
fn yellow(s: &str) -> String {
    format!("\x1b[33m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress: one bar over the screenshots, the message showing the
/// stage each one is in. Screenshots may finish out of order.
struct CliProgressCallback {
    bar: ProgressBar,
    errors: AtomicUsize,
}

impl CliProgressCallback {
    fn new(total: usize) -> Arc<Self> {
        let style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  [{bar:32.green/238}] {pos:>3}/{len}  {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);

        let bar = ProgressBar::new(total as u64);
        bar.set_style(style);
        bar.set_prefix("Slicing");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            errors: AtomicUsize::new(0),
        })
    }
}

impl AnalysisProgressCallback for CliProgressCallback {
    fn on_stage_start(&self, input: &str, stage: Stage) {
        self.bar.set_message(format!("{}  {}", short_name(input), dim(&stage.to_string())));
    }

    fn on_stage_error(&self, input: &str, stage: Stage, error: &str) {
        let msg = if error.chars().count() > 80 {
            format!("{}\u{2026}", error.chars().take(79).collect::<String>())
        } else {
            error.to_string()
        };
        if stage == Stage::Propose {
            // Non-fatal: the analysis carries on without a proposal.
            self.bar
                .println(format!("  {} {}  {}", yellow("⚠"), short_name(input), yellow(&msg)));
        } else {
            self.errors.fetch_add(1, Ordering::SeqCst);
            self.bar
                .println(format!("  {} {}  {}", red("✗"), short_name(input), red(&msg)));
            self.bar.inc(1);
        }
    }

    fn on_analysis_complete(&self, input: &str, slice_count: usize) {
        self.bar.println(format!(
            "  {} {}  {}",
            green("✓"),
            short_name(input),
            dim(&format!("{slice_count} slices"))
        ));
        self.bar.inc(1);
    }
}

fn short_name(input: &str) -> &str {
    input.rsplit(['/', '\\']).next().unwrap_or(input)
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Footer detection and a single slice, OCR via Google Vision
  mailslice campaign.png

  # Repair hand-picked cut positions
  mailslice campaign.png --boundaries 400,1180,2050

  # Let a vision LLM propose the sections
  mailslice campaign.png --llm --model gpt-4.1-mini

  # Re-run on a saved OCR response (no network)
  mailslice campaign.png --ocr-json campaign.vision.json --boundaries 400,1180

  # Full JSON plan to a file
  mailslice campaign.png --llm -o campaign.slices.json

  # Batch: one JSON per screenshot into a directory
  mailslice shots/*.png --llm -o plans/

ENVIRONMENT VARIABLES:
  GOOGLE_VISION_API_KEY   Google Cloud Vision API key (OCR)
  OPENAI_API_KEY          OpenAI API key (--llm)
  ANTHROPIC_API_KEY       Anthropic API key (--llm)
  GEMINI_API_KEY          Google Gemini API key (--llm)
  EDGEQUAKE_LLM_PROVIDER  Override provider (openai, anthropic, gemini, ollama)
  EDGEQUAKE_MODEL         Override model ID
  RUST_LOG                Log filter, e.g. email_slicer=debug
"#;

/// Plan where to slice email screenshots without cutting through text.
#[derive(Parser, Debug)]
#[command(
    name = "mailslice",
    version,
    about = "Plan where to slice email screenshots without cutting through text",
    long_about = "Reads text geometry from OCR, detects the email footer, and repairs a proposed \
set of horizontal cut positions (hand-written or suggested by a vision LLM) into slices that \
never cross a line of text.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Screenshot file paths or HTTP/HTTPS URLs.
    #[arg(required = true)]
    inputs: Vec<String>,

    /// Write JSON to this file (one input) or directory (several inputs).
    #[arg(short, long, env = "MAILSLICE_OUTPUT")]
    output: Option<PathBuf>,

    /// Print the full analysis as JSON instead of a summary.
    #[arg(long, env = "MAILSLICE_JSON")]
    json: bool,

    /// Use a saved Google Vision response instead of calling the API.
    #[arg(long, env = "MAILSLICE_OCR_JSON")]
    ocr_json: Option<PathBuf>,

    /// Google Vision API key.
    #[arg(long, env = "GOOGLE_VISION_API_KEY", hide_env_values = true)]
    vision_key: Option<String>,

    /// Fixed boundary proposal, comma-separated y positions.
    #[arg(long, value_delimiter = ',', allow_hyphen_values = true, conflicts_with = "llm")]
    boundaries: Option<Vec<i64>>,

    /// Ask a vision LLM for section boundaries.
    #[arg(long, env = "MAILSLICE_LLM")]
    llm: bool,

    /// LLM model ID (e.g. gpt-4.1-nano, gpt-4.1-mini, claude-sonnet-4-20250514).
    #[arg(long, env = "EDGEQUAKE_MODEL")]
    model: Option<String>,

    /// LLM provider: openai, anthropic, gemini, ollama, azure.
    #[arg(long, env = "EDGEQUAKE_PROVIDER")]
    provider: Option<String>,

    /// Padding around text boxes in pixels.
    #[arg(long, env = "MAILSLICE_PADDING", default_value_t = 4)]
    padding: u32,

    /// Candidate grid spacing in pixels.
    #[arg(long, env = "MAILSLICE_STEP", default_value_t = 10,
          value_parser = clap::value_parser!(u32).range(1..))]
    step: u32,

    /// Low-risk band spacing as a multiple of --step.
    #[arg(long, env = "MAILSLICE_LOW_RISK_MULTIPLE", default_value_t = 5)]
    low_risk_multiple: u32,

    /// Minimum slice height in pixels.
    #[arg(long, env = "MAILSLICE_MIN_SLICE_HEIGHT", default_value_t = 20)]
    min_slice_height: u32,

    /// Footer search region: fraction of the height where it starts (0–1).
    #[arg(long, env = "MAILSLICE_FOOTER_REGION", default_value_t = 0.6)]
    footer_region: f64,

    /// Footer start when nothing is detected, as a fraction of the height (0–1).
    #[arg(long, env = "MAILSLICE_FOOTER_FALLBACK", default_value_t = 0.95)]
    footer_fallback: f64,

    /// Use only the uniform grid; skip pixel analysis.
    #[arg(long, env = "MAILSLICE_NO_VISUAL_CUTS")]
    no_visual_cuts: bool,

    /// Screenshots analysed at once.
    #[arg(short, long, env = "MAILSLICE_CONCURRENCY", default_value_t = 4)]
    concurrency: usize,

    /// Path to a text file containing a custom proposer system prompt.
    #[arg(long, env = "MAILSLICE_SYSTEM_PROMPT")]
    system_prompt: Option<PathBuf>,

    /// Max LLM output tokens.
    #[arg(long, env = "MAILSLICE_MAX_TOKENS", default_value_t = 1024)]
    max_tokens: usize,

    /// LLM temperature (0.0–2.0).
    #[arg(long, env = "MAILSLICE_TEMPERATURE", default_value_t = 0.0)]
    temperature: f32,

    /// Retries on LLM failure.
    #[arg(long, env = "MAILSLICE_MAX_RETRIES", default_value_t = 3)]
    max_retries: u32,

    /// Disable progress bar.
    #[arg(long, env = "MAILSLICE_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "MAILSLICE_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "MAILSLICE_QUIET")]
    quiet: bool,

    /// HTTP download timeout in seconds.
    #[arg(long, env = "MAILSLICE_DOWNLOAD_TIMEOUT", default_value_t = 120)]
    download_timeout: u64,

    /// OCR / LLM call timeout in seconds.
    #[arg(long, env = "MAILSLICE_API_TIMEOUT", default_value_t = 60)]
    api_timeout: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar replaces INFO logs; verbose always wins.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json;
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

    let cli_progress = show_progress.then(|| CliProgressCallback::new(cli.inputs.len()));
    let progress_cb: Option<ProgressCallback> = cli_progress
        .clone()
        .map(|cb| cb as Arc<dyn AnalysisProgressCallback>);

    let config = build_config(&cli, progress_cb).await?;

    let failures = if let [input] = cli.inputs.as_slice() {
        run_single(&cli, input, &config).await.map(|_| 0)?
    } else {
        run_batch(&cli, &config).await?
    };

    if let Some(p) = cli_progress {
        p.bar.finish_and_clear();
        let errors = p.errors.load(Ordering::SeqCst);
        if errors == 0 && !cli.quiet {
            eprintln!("{} {} analysed", green("✔"), bold(&cli.inputs.len().to_string()));
        }
    }

    if failures > 0 {
        anyhow::bail!("{failures} of {} screenshots failed", cli.inputs.len());
    }
    Ok(())
}

async fn run_single(cli: &Cli, input: &str, config: &SliceConfig) -> Result<()> {
    let analysis = match cli.output {
        Some(ref path) => analyze_to_file(input, path, config).await,
        None => analyze(input, config).await,
    }
    .with_context(|| format!("Analysis of '{input}' failed"))?;

    emit(cli, &analysis)?;
    if let (Some(path), false) = (&cli.output, cli.quiet) {
        eprintln!("{}  →  {}", green("✔"), bold(&path.display().to_string()));
    }
    Ok(())
}

async fn run_batch(cli: &Cli, config: &SliceConfig) -> Result<usize> {
    if let Some(ref dir) = cli.output {
        tokio::fs::create_dir_all(dir)
            .await
            .with_context(|| format!("Failed to create output directory {}", dir.display()))?;
    }

    let mut stream = analyze_stream(cli.inputs.clone(), config).context("Invalid configuration")?;
    let mut failures = 0usize;

    while let Some(item) = stream.next().await {
        match item.result {
            Ok(analysis) => {
                if let Some(ref dir) = cli.output {
                    let path = dir.join(json_name(&item.input));
                    let json = serde_json::to_vec_pretty(&analysis).context("Failed to serialise analysis")?;
                    tokio::fs::write(&path, json)
                        .await
                        .with_context(|| format!("Failed to write {}", path.display()))?;
                }
                emit(cli, &analysis)?;
            }
            Err(e) => {
                failures += 1;
                if config.progress_callback.is_none() {
                    eprintln!("{} {}: {}", red("✗"), item.input, e);
                }
            }
        }
    }

    Ok(failures)
}

/// Print one analysis to stdout, as JSON or as a summary.
fn emit(cli: &Cli, analysis: &SliceAnalysis) -> Result<()> {
    if cli.json {
        println!(
            "{}",
            serde_json::to_string_pretty(analysis).context("Failed to serialise analysis")?
        );
    } else if cli.output.is_none() && !cli.quiet {
        print_summary(analysis);
    }
    Ok(())
}

fn print_summary(a: &SliceAnalysis) {
    let footer = &a.plan.footer;
    println!(
        "{}  {}×{} {}",
        bold(&a.source),
        a.image.width,
        a.image.height,
        dim(&a.image.format)
    );
    println!(
        "  footer   y={}  {}",
        footer.start_y,
        dim(&format!(
            "{:?}, {} matches{}",
            footer.confidence,
            footer.matched_blocks,
            if footer.dense_small_text { ", small print" } else { "" }
        ))
    );
    println!("  slices   {}", a.slices().len());
    for (i, s) in a.slices().iter().enumerate() {
        println!("    {:>2}  {:>5} → {:<5}  {}", i + 1, s.y_top, s.y_bottom, dim(&format!("{} px", s.height())));
    }
    let repairs = &a.plan.layout.repairs;
    if !repairs.is_empty() {
        println!("  repairs  {}", repairs.len());
        for r in repairs {
            println!("    {}", dim(&describe_repair(r)));
        }
    }
    for w in &a.warnings {
        println!("  {} {}", yellow("⚠"), w);
    }
}

fn describe_repair(r: &Repair) -> String {
    match *r {
        Repair::DuplicateRemoved { y } => format!("duplicate {y} removed"),
        Repair::ZeroInserted => "0 inserted".into(),
        Repair::BeyondFooterDropped { y } => format!("{y} dropped (below footer)"),
        Repair::FooterAppended => "footer appended".into(),
        Repair::OutOfRangeDropped { y } => format!("{y} dropped (out of range)"),
        Repair::SnappedToCandidate { from, to } => format!("{from} → {to} (candidate line)"),
        Repair::SnappedToLowRiskBand { from, to } => format!("{from} → {to} (low-risk band)"),
        Repair::UnsnappableDropped { y } => format!("{y} dropped (no safe position)"),
        Repair::TooCloseDropped { y } => format!("{y} dropped (slice too short)"),
        Repair::ShortFinalSliceMerged { y } => format!("{y} dropped (short last slice)"),
    }
}

/// `shots/welcome.png` → `welcome.json`.
fn json_name(input: &str) -> String {
    let name = short_name(input.split(['?', '#']).next().unwrap_or(input));
    let stem = Path::new(name)
        .file_stem()
        .and_then(|s| s.to_str())
        .filter(|s| !s.is_empty())
        .unwrap_or("screenshot");
    format!("{stem}.json")
}

/// Map CLI args to `SliceConfig`.
async fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<SliceConfig> {
    let system_prompt = if let Some(ref path) = cli.system_prompt {
        Some(
            tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("Failed to read system prompt from {:?}", path))?,
        )
    } else {
        None
    };

    let ocr = match cli.ocr_json {
        Some(ref path) => OcrSource::File(path.clone()),
        None => OcrSource::GoogleVision {
            api_key: cli.vision_key.clone(),
        },
    };

    let boundaries = match (&cli.boundaries, cli.llm) {
        (Some(b), _) => BoundarySource::Fixed(b.clone()),
        (None, true) => BoundarySource::Llm,
        (None, false) => BoundarySource::None,
    };

    let footer = FooterRules {
        bottom_region_ratio: cli.footer_region,
        fallback_ratio: cli.footer_fallback,
        ..FooterRules::default()
    };

    let mut builder = SliceConfig::builder()
        .padding(cli.padding)
        .step(cli.step)
        .low_risk_multiple(cli.low_risk_multiple)
        .min_slice_height(cli.min_slice_height)
        .footer_rules(footer)
        .visual_cuts((!cli.no_visual_cuts).then(VisualCutParams::default))
        .boundaries(boundaries)
        .ocr(ocr)
        .concurrency(cli.concurrency)
        .max_tokens(cli.max_tokens)
        .temperature(cli.temperature)
        .max_retries(cli.max_retries)
        .download_timeout_secs(cli.download_timeout)
        .api_timeout_secs(cli.api_timeout);

    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    let mut config = builder.build().context("Invalid configuration")?;

    config.model = cli.model.clone();
    config.provider_name = cli.provider.clone();
    config.system_prompt = system_prompt;

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_name_uses_file_stem() {
        assert_eq!(json_name("shots/welcome.png"), "welcome.json");
        assert_eq!(json_name("https://cdn.example.com/a/promo.jpg?v=3"), "promo.json");
        assert_eq!(json_name("https://cdn.example.com/"), "screenshot.json");
    }

    #[test]
    fn boundaries_flag_parses_list() {
        let cli = Cli::try_parse_from(["mailslice", "a.png", "--boundaries=-5,120,340"]).unwrap();
        assert_eq!(cli.boundaries, Some(vec![-5, 120, 340]));
    }

    #[test]
    fn boundaries_conflict_with_llm() {
        assert!(Cli::try_parse_from(["mailslice", "a.png", "--llm", "--boundaries", "1"]).is_err());
    }
}
