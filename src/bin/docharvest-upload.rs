//! CLI binary for the upload stage.
//!
//! Reads the ledger written by `docharvest-crawl` and sends every file it
//! lists to an OpenAI vector store, tagged with its source URL.

use anyhow::{Context, Result};
use clap::Parser;
use docharvest::logging::init_tracing;
use docharvest::{run_upload, UploadConfig};
use std::path::PathBuf;

/// Upload crawled files to a vector store.
#[derive(Parser, Debug)]
#[command(
    name = "docharvest-upload",
    version,
    about = "Upload the files listed in the crawl ledger to an OpenAI vector store",
    color = clap::ColorChoice::Auto
)]
struct Cli {
    /// Ledger written by the crawl stage.
    #[arg(long, env = "DOCHARVEST_LEDGER", default_value = "downloaded_files.csv")]
    ledger: PathBuf,

    /// Directory holding the produced files.
    #[arg(long, env = "DOCHARVEST_OUTPUT_DIR", default_value = "nedlastede_filer")]
    output_dir: PathBuf,

    /// API key (usually read from the environment or .env).
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true, default_value = "")]
    api_key: String,

    /// Target vector store id.
    #[arg(long, env = "VECTOR_STORE_ID", default_value = "")]
    vector_store_id: String,

    /// API base URL.
    #[arg(long, env = "OPENAI_BASE_URL", default_value = "https://api.openai.com/v1")]
    api_base: String,

    /// Per-request timeout in seconds.
    #[arg(long, env = "DOCHARVEST_REQUEST_TIMEOUT", default_value_t = 120)]
    request_timeout: u64,

    /// Print the upload report as JSON on stdout.
    #[arg(long, env = "DOCHARVEST_JSON")]
    json: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "DOCHARVEST_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "DOCHARVEST_QUIET")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.quiet, false);

    let config = UploadConfig::builder()
        .ledger_path(&cli.ledger)
        .output_dir(&cli.output_dir)
        .api_key(&cli.api_key)
        .vector_store_id(&cli.vector_store_id)
        .api_base(&cli.api_base)
        .request_timeout_secs(cli.request_timeout)
        .build()
        .context("Upload is not configured")?;

    let report = run_upload(&config).await.context("Upload failed")?;

    if cli.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&report).context("Failed to serialise upload report")?
        );
    } else if !cli.quiet {
        eprintln!(
            "Upload complete: {} uploaded, {} missing, {} failed of {} ledger entries ({:.1}s)",
            report.uploaded.len(),
            report.missing.len(),
            report.errors.len(),
            report.total_entries,
            report.duration_ms as f64 / 1000.0
        );
        for e in &report.errors {
            eprintln!("  ✗ {}", e);
        }
    }
    Ok(())
}
