//! CLI binary for edgequake-earnings.
//!
//! A thin shim over the library crate that maps CLI flags to
//! `AnalysisConfig`, runs one analysis and prints the result JSON.

use anyhow::{Context, Result};
use clap::Parser;
use edgequake_earnings::pipeline::input::resolve_input;
use edgequake_earnings::{
    AnalysisConfig, AnalysisPipeline, AnalysisProgressCallback, ProgressCallback, Stage,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::io::{self, Write};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers ──────────────────────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Spinner that shows the stage the request is in.
struct CliProgressCallback {
    bar: ProgressBar,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new_spinner();
        let style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}  {elapsed:.dim}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);
        bar.set_style(style);
        bar.set_prefix("Analysing");
        bar.set_message("Reading PDF…");
        bar.enable_steady_tick(Duration::from_millis(80));
        Arc::new(Self { bar })
    }
}

impl AnalysisProgressCallback for CliProgressCallback {
    fn on_stage(&self, stage: Stage) {
        match stage {
            Stage::Received => self.bar.set_message("Checking upload…"),
            Stage::Extracting => self.bar.set_message("Extracting text…"),
            Stage::Prompting => self.bar.set_message("Building prompt…"),
            Stage::Invoking => self.bar.set_message("Waiting for the model…"),
            Stage::Validating => self.bar.set_message("Validating answer…"),
            Stage::Completed => {
                self.bar.finish_and_clear();
                eprintln!("{} Analysis complete", green("✔"));
            }
            Stage::Failed(kind) => {
                self.bar.finish_and_clear();
                eprintln!("{} Analysis failed ({kind} error)", red("✘"));
            }
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Analyse a local transcript
  earnings q3-call.pdf

  # Analyse from URL, compact JSON for piping
  earnings --compact https://example.com/ir/q3-call.pdf | jq .managementTone

  # Use a different Gemini model and allow two retries
  earnings --model gemini-2.5-pro --max-retries 2 q3-call.pdf

ENVIRONMENT VARIABLES:
  GEMINI_API_KEY       Google Gemini API key (default provider)
  EARNINGS_MODEL       Override model ID
  EARNINGS_PROVIDER    Override provider (gemini, openai, anthropic, ollama, ...)
  RUST_LOG             Override the log filter
"#;

/// Analyse earnings-call transcript PDFs with an LLM.
#[derive(Parser, Debug)]
#[command(
    name = "earnings",
    version,
    about = "Analyse earnings-call transcript PDFs with an LLM",
    long_about = "Extract the text of an earnings-call transcript or management commentary PDF \
(local file or URL), send it to a generative model with a fixed analyst prompt, and print the \
validated structured analysis as JSON.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Local PDF file path or HTTP/HTTPS URL.
    input: String,

    /// LLM model ID.
    #[arg(long, env = "EARNINGS_MODEL", default_value = edgequake_earnings::config::DEFAULT_MODEL)]
    model: String,

    /// LLM provider: gemini, openai, anthropic, ollama, ...
    #[arg(long, env = "EARNINGS_PROVIDER", default_value = edgequake_earnings::config::DEFAULT_PROVIDER)]
    provider: String,

    /// LLM temperature (0.0–2.0).
    #[arg(long, env = "EARNINGS_TEMPERATURE", default_value_t = 0.2)]
    temperature: f32,

    /// Max LLM output tokens.
    #[arg(long, env = "EARNINGS_MAX_TOKENS", default_value_t = 8192)]
    max_tokens: usize,

    /// Retries on transient model failures (0 = fail fast).
    #[arg(long, env = "EARNINGS_MAX_RETRIES", default_value_t = 0)]
    max_retries: u32,

    /// Model call timeout in seconds.
    #[arg(long, env = "EARNINGS_API_TIMEOUT", default_value_t = 120)]
    api_timeout: u64,

    /// HTTP download timeout in seconds.
    #[arg(long, env = "EARNINGS_DOWNLOAD_TIMEOUT", default_value_t = 120)]
    download_timeout: u64,

    /// Print the full output (result + stats) instead of the result alone.
    #[arg(long)]
    stats: bool,

    /// Single-line JSON.
    #[arg(long)]
    compact: bool,

    /// Disable the progress spinner.
    #[arg(long, env = "EARNINGS_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long)]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long)]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The spinner replaces INFO logs unless -v asks for them.
    let show_progress = !cli.quiet && !cli.no_progress;
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

    let config = build_config(&cli)?;

    let document = resolve_input(&cli.input, &config)
        .await
        .with_context(|| format!("Failed to read '{}'", cli.input))?;

    let mut pipeline = AnalysisPipeline::from_config(config).context("Failed to set up the model")?;
    if show_progress {
        let cb: ProgressCallback = CliProgressCallback::new();
        pipeline = pipeline.with_progress(cb);
    }

    let output = pipeline.analyze(document).await.context("Analysis failed")?;

    let json = match (cli.stats, cli.compact) {
        (true, true) => serde_json::to_string(&output),
        (true, false) => serde_json::to_string_pretty(&output),
        (false, true) => serde_json::to_string(&output.result),
        (false, false) => serde_json::to_string_pretty(&output.result),
    }
    .context("Failed to serialise output")?;

    let stdout = io::stdout();
    let mut handle = stdout.lock();
    writeln!(handle, "{json}").context("Failed to write to stdout")?;

    if !cli.quiet {
        let s = &output.stats;
        eprintln!(
            "   {} pages  /  {} chars  /  {} tokens in  /  {} tokens out  /  {}ms total",
            s.page_count,
            s.extracted_chars,
            dim(&s.prompt_tokens.to_string()),
            dim(&s.completion_tokens.to_string()),
            s.total_duration_ms,
        );
    }

    Ok(())
}

/// Map CLI args to `AnalysisConfig`.
fn build_config(cli: &Cli) -> Result<AnalysisConfig> {
    AnalysisConfig::builder()
        .model(&cli.model)
        .provider_name(&cli.provider)
        .temperature(cli.temperature)
        .max_tokens(cli.max_tokens)
        .max_retries(cli.max_retries)
        .api_timeout_secs(cli.api_timeout)
        .download_timeout_secs(cli.download_timeout)
        .build()
        .context("Invalid configuration")
}
