//! HTTP server binary for edgequake-earnings.
//!
//! Serves `POST /api/analyze`. Configuration comes from flags, the
//! environment and an optional `.env` file.

use anyhow::{Context, Result};
use clap::Parser;
use edgequake_earnings::server;
use edgequake_earnings::{AnalysisConfig, AnalysisPipeline};
use std::io;
use std::net::SocketAddr;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Earnings-call analysis HTTP server.
#[derive(Parser, Debug)]
#[command(name = "earnings-server", version, about = "Earnings-call analysis HTTP server")]
struct Args {
    /// Port to listen on.
    #[arg(long, env = "PORT", default_value_t = 5000)]
    port: u16,

    /// The single origin allowed by CORS.
    #[arg(long, env = "ALLOWED_ORIGIN", default_value = "http://localhost:5173")]
    allowed_origin: String,

    /// LLM model ID.
    #[arg(long, env = "EARNINGS_MODEL", default_value = edgequake_earnings::config::DEFAULT_MODEL)]
    model: String,

    /// LLM provider.
    #[arg(long, env = "EARNINGS_PROVIDER", default_value = edgequake_earnings::config::DEFAULT_PROVIDER)]
    provider: String,

    /// Retries on transient model failures (0 = fail fast).
    #[arg(long, env = "EARNINGS_MAX_RETRIES", default_value_t = 0)]
    max_retries: u32,

    /// Model call timeout in seconds.
    #[arg(long, env = "EARNINGS_API_TIMEOUT", default_value_t = 120)]
    api_timeout: u64,

    /// Maximum accepted upload size in bytes.
    #[arg(long, env = "EARNINGS_MAX_UPLOAD_BYTES", default_value_t = edgequake_earnings::config::DEFAULT_MAX_UPLOAD_BYTES)]
    max_upload_bytes: u64,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();

    let filter = if args.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    if args.provider.eq_ignore_ascii_case("gemini") {
        match std::env::var("GEMINI_API_KEY") {
            Ok(key) if !key.trim().is_empty() => {}
            _ => anyhow::bail!("GEMINI_API_KEY is not set (environment or .env)"),
        }
    }

    let config = AnalysisConfig::builder()
        .model(&args.model)
        .provider_name(&args.provider)
        .max_retries(args.max_retries)
        .api_timeout_secs(args.api_timeout)
        .max_upload_bytes(args.max_upload_bytes)
        .build()
        .context("Invalid configuration")?;

    let pipeline = AnalysisPipeline::from_config(config).context("Failed to set up the model")?;
    let app = server::router(pipeline, &args.allowed_origin).context("Failed to build router")?;

    let addr = SocketAddr::from(([0, 0, 0, 0], args.port));
    info!("Server running on http://{addr} (CORS origin {})", args.allowed_origin);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    axum::serve(listener, app).await.context("Server error")?;

    Ok(())
}
