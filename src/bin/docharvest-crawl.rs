//! CLI binary for the crawl stage.
//!
//! A thin shim over the library crate that maps CLI flags to `CrawlConfig`,
//! shows progress and prints the run summary.

use anyhow::{Context, Result};
use clap::Parser;
use docharvest::logging::init_tracing;
use docharvest::{run_crawl, CrawlConfig, HarvestProgressCallback, ProgressCallback, RunReport, DEFAULT_USER_AGENT};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

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

// ── CLI progress callback using indicatif ────────────────────────────────────

/// One bar for the reference list plus a log line per reference.
struct CliProgressCallback {
    bar: ProgressBar,
    errors: AtomicUsize,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        bar.set_style(
            ProgressStyle::with_template(
                "{spinner:.cyan} {prefix:.bold}  [{bar:42.green/238}] {pos:>3}/{len} references  \
                 ⏱ {elapsed_precise}  {msg}",
            )
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("█▉▊▋▌▍▎▏  "),
        );
        bar.set_prefix("Crawling");
        bar.enable_steady_tick(Duration::from_millis(80));
        Arc::new(Self {
            bar,
            errors: AtomicUsize::new(0),
        })
    }
}

impl HarvestProgressCallback for CliProgressCallback {
    fn on_run_start(&self, total_references: usize) {
        self.bar.set_length(total_references as u64);
        self.bar.reset_eta();
    }

    fn on_reference_start(&self, _sequence: usize, url: &str) {
        self.bar.set_message(dim(url));
    }

    fn on_reference_complete(&self, sequence: usize, saved: &str) {
        self.bar
            .println(format!("  {} {:03}  {}", green("✓"), sequence, saved));
        self.bar.inc(1);
    }

    fn on_reference_error(&self, sequence: usize, url: &str, error: &str) {
        self.errors.fetch_add(1, Ordering::Relaxed);
        self.bar
            .println(format!("  {} {:03}  {}  {}", red("✗"), sequence, url, dim(error)));
        self.bar.inc(1);
    }

    fn on_run_complete(&self, _report: &RunReport) {
        let errors = self.errors.load(Ordering::Relaxed);
        let msg = if errors == 0 {
            green("done")
        } else {
            red(&format!("{errors} failed"))
        };
        self.bar.finish_with_message(msg);
    }
}

// ── CLI definition ───────────────────────────────────────────────────────────

/// Crawl reference pages and their linked documents.
#[derive(Parser, Debug)]
#[command(
    name = "docharvest-crawl",
    version,
    about = "Crawl reference pages and linked documents into normalized HTML and text",
    long_about = "Reads reference URLs from an ISO-8859-1 CSV, renders each page in a headless \
browser, saves the cleaned HTML, downloads linked .pdf/.docx/.pptx/.xlsx/.xsd files, converts \
office formats to HTML or text, and records every produced file in a Filename,URL ledger.",
    color = clap::ColorChoice::Auto
)]
struct Cli {
    /// Reference spreadsheet (columns referanse_url, referanse_lenketekst).
    #[arg(long, env = "DOCHARVEST_REFERENCES", default_value = "download-regulation-reports.csv")]
    references: PathBuf,

    /// Ledger of produced files, read at start and rewritten at the end.
    #[arg(long, env = "DOCHARVEST_LEDGER", default_value = "downloaded_files.csv")]
    ledger: PathBuf,

    /// Directory receiving every produced file.
    #[arg(long, env = "DOCHARVEST_OUTPUT_DIR", default_value = "nedlastede_filer")]
    output_dir: PathBuf,

    /// Process only this reference URL (sequence numbers are kept).
    #[arg(long, env = "DOCHARVEST_ONLY_URL")]
    only_url: Option<String>,

    /// Maximum characters of a sanitized label or file stem (10–200).
    #[arg(long, env = "DOCHARVEST_MAX_FILENAME_LENGTH", default_value_t = 100)]
    max_filename_length: usize,

    /// User agent for the browser and the fetch program.
    #[arg(long, env = "DOCHARVEST_USER_AGENT", default_value = DEFAULT_USER_AGENT)]
    user_agent: String,

    /// Upper bound on navigation plus DOM settling, in seconds.
    #[arg(long, env = "DOCHARVEST_RENDER_TIMEOUT", default_value_t = 30)]
    render_timeout: u64,

    /// Interval between DOM-idle checks, in milliseconds.
    #[arg(long, env = "DOCHARVEST_SETTLE_POLL_MS", default_value_t = 500)]
    settle_poll_ms: u64,

    /// CSS selector of the main-content container.
    #[arg(long, env = "DOCHARVEST_MAIN_CONTENT_SELECTOR", default_value = "div#root")]
    main_content_selector: String,

    /// curl-compatible program used to fetch linked files.
    #[arg(long, env = "DOCHARVEST_FETCH_PROGRAM", default_value = "curl")]
    fetch_program: String,

    /// Print the run report as JSON on stdout.
    #[arg(long, env = "DOCHARVEST_JSON")]
    json: bool,

    /// Disable progress bar.
    #[arg(long, env = "DOCHARVEST_NO_PROGRESS")]
    no_progress: bool,

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

    // ── Logging setup ────────────────────────────────────────────────────
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json;
    init_tracing(cli.verbose, cli.quiet, show_progress);

    // ── Build config ─────────────────────────────────────────────────────
    let mut builder = CrawlConfig::builder()
        .references_path(&cli.references)
        .ledger_path(&cli.ledger)
        .output_dir(&cli.output_dir)
        .max_filename_length(cli.max_filename_length)
        .user_agent(&cli.user_agent)
        .render_timeout_secs(cli.render_timeout)
        .settle_poll_ms(cli.settle_poll_ms)
        .main_content_selector(&cli.main_content_selector)
        .fetch_program(&cli.fetch_program);
    if let Some(ref url) = cli.only_url {
        builder = builder.only_url(url);
    }
    if show_progress {
        builder = builder.progress_callback(CliProgressCallback::new() as ProgressCallback);
    }
    let config = builder.build().context("Invalid crawl configuration")?;

    // ── Run ──────────────────────────────────────────────────────────────
    let report = run_crawl(&config).await.context("Crawl failed")?;

    // ── Output ───────────────────────────────────────────────────────────
    if cli.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&report).context("Failed to serialise run report")?
        );
    } else if !cli.quiet {
        print_summary(&report, &config);
    }
    Ok(())
}

fn print_summary(report: &RunReport, config: &CrawlConfig) {
    eprintln!();
    eprintln!(
        "{}  {} saved, {} failed, {} skipped  ·  {} linked files ({} failed)  ·  {:.1}s",
        bold("Crawl complete"),
        report.saved,
        report.failed,
        report.skipped,
        report.subdocuments_fetched,
        report.subdocuments_failed,
        report.duration_ms as f64 / 1000.0
    );
    if report.conversions_failed > 0 {
        eprintln!(
            "  {} {} file(s) kept in their downloaded format",
            red("!"),
            report.conversions_failed
        );
    }
    for outcome in report.outcomes.iter().filter(|o| o.error.is_some()) {
        if let Some(ref e) = outcome.error {
            eprintln!("  {} {:03}  {}", red("✗"), outcome.sequence, e);
        }
    }
    eprintln!(
        "  {} {} rows in {}",
        dim("ledger"),
        report.ledger_entries,
        config.ledger_path.display()
    );
}
