//! Crawl stage entry points.
//!
//! A crawl walks the de-duplicated reference list strictly in order. Each
//! reference is classified and then takes one of two paths:
//!
//! * **Page**: render in the browser, clean the markup, fetch and normalize
//!   every linked document not already in the ledger, save the cleaned page
//!   as `NNN_<label>.html`.
//! * **File**: fetch the URL directly to `NNN_<label><ext>` and normalize it.
//!
//! Failures of one reference or one linked document are logged, stored in
//! the [`RunReport`] and never stop the run. The ledger is read once before
//! the loop and written once after it.

use crate::config::CrawlConfig;
use crate::error::{HarvestError, UnitError};
use crate::ledger::{Ledger, LedgerEntry};
use crate::output::{ReferenceOutcome, RunReport};
use crate::pipeline::classify::{classify, path_extension, url_path, ContentKind};
use crate::pipeline::clean::clean_page;
use crate::pipeline::fetch::FileFetcher;
use crate::pipeline::links::{candidate_filename, linked_document, LinkedDocument};
use crate::pipeline::naming::{output_filename, split_extension};
use crate::pipeline::normalize::normalize;
use crate::pipeline::render::PageRenderer;
use crate::references::{load_references, ReferenceEntry};
use scraper::Selector;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info, warn};

/// Run the crawl stage with the headless browser and `curl`.
///
/// The reference list is loaded before the browser is launched, so a bad
/// path fails fast. A browser that cannot be started is fatal.
#[cfg(feature = "browser")]
pub async fn run_crawl(config: &CrawlConfig) -> Result<RunReport, HarvestError> {
    use crate::pipeline::fetch::CurlFetcher;
    use crate::pipeline::render::ChromeRenderer;

    let references = load_references(&config.references_path)?;
    let renderer = ChromeRenderer::launch(config).await?;
    let fetcher = CurlFetcher::new(&config.fetch_program, &config.user_agent);
    crawl_references(config, &references, &renderer, &fetcher).await
}

/// Run the crawl stage with caller-supplied rendering and fetching.
///
/// This is the seam tests and alternative front-ends use: anything that can
/// render a page and fetch a file can drive the full pipeline.
pub async fn run_crawl_with(
    config: &CrawlConfig,
    renderer: &dyn PageRenderer,
    fetcher: &dyn FileFetcher,
) -> Result<RunReport, HarvestError> {
    let references = load_references(&config.references_path)?;
    crawl_references(config, &references, renderer, fetcher).await
}

/// Load the ledger, create the output directory and parse the main-content
/// selector.
async fn prepare(config: &CrawlConfig) -> Result<(Ledger, Selector), HarvestError> {
    let ledger = Ledger::load(&config.ledger_path)?;
    tokio::fs::create_dir_all(&config.output_dir)
        .await
        .map_err(|source| HarvestError::OutputDirFailed {
            path: config.output_dir.clone(),
            source,
        })?;
    let main_content = Selector::parse(&config.main_content_selector).map_err(|e| {
        HarvestError::InvalidConfig(format!(
            "Main-content selector '{}' is not valid CSS: {}",
            config.main_content_selector, e
        ))
    })?;
    Ok((ledger, main_content))
}

/// Process an already-loaded reference list.
///
/// The renderer is shut down before returning, including when the ledger or
/// output directory cannot be prepared.
pub async fn crawl_references(
    config: &CrawlConfig,
    references: &[ReferenceEntry],
    renderer: &dyn PageRenderer,
    fetcher: &dyn FileFetcher,
) -> Result<RunReport, HarvestError> {
    let run_start = Instant::now();

    // ── Step 1: Prepare ledger, output directory and selector ────────────
    let (mut ledger, main_content) = match prepare(config).await {
        Ok(prepared) => prepared,
        Err(e) => {
            renderer.shutdown().await;
            return Err(e);
        }
    };

    let selected = references
        .iter()
        .filter(|r| is_selected(config, r))
        .count();
    if let Some(only) = &config.only_url {
        if selected == 0 {
            warn!("--only-url {} is not in the reference list", only);
        }
    }
    info!(
        "Crawling {} of {} references into {}",
        selected,
        references.len(),
        config.output_dir.display()
    );
    if let Some(ref cb) = config.progress_callback {
        cb.on_run_start(selected);
    }

    // ── Step 2: Process references in list order ─────────────────────────
    let ctx = CrawlContext {
        config,
        renderer,
        fetcher,
        main_content,
    };
    let mut attempted: HashSet<String> = HashSet::new();
    let mut report = RunReport {
        total_references: references.len(),
        ..RunReport::default()
    };

    for (index, reference) in references.iter().enumerate() {
        // sequence numbers follow list position, filtered or not
        let sequence = index + 1;
        if !is_selected(config, reference) {
            report.skipped += 1;
            continue;
        }

        if let Some(ref cb) = config.progress_callback {
            cb.on_reference_start(sequence, &reference.url);
        }

        let outcome = ctx
            .process_reference(sequence, reference, &mut ledger, &mut attempted)
            .await;

        if let Some(ref cb) = config.progress_callback {
            match (&outcome.error, &outcome.saved) {
                (Some(e), _) => cb.on_reference_error(sequence, &reference.url, &e.to_string()),
                (None, Some(saved)) => cb.on_reference_complete(sequence, saved),
                (None, None) => {}
            }
        }
        report.record(outcome);
    }

    // ── Step 3: Release the browser, persist the ledger ──────────────────
    renderer.shutdown().await;
    ledger.save(&config.ledger_path)?;

    report.ledger_entries = ledger.len();
    report.duration_ms = run_start.elapsed().as_millis() as u64;
    info!(
        "Crawl complete: {} saved, {} failed, {} linked documents, {} ledger rows, {}ms",
        report.saved,
        report.failed,
        report.subdocuments_fetched,
        report.ledger_entries,
        report.duration_ms
    );

    if let Some(ref cb) = config.progress_callback {
        cb.on_run_complete(&report);
    }
    Ok(report)
}

fn is_selected(config: &CrawlConfig, reference: &ReferenceEntry) -> bool {
    config
        .only_url
        .as_deref()
        .map_or(true, |only| only == reference.url)
}

/// Ledger key for a produced file: its path as written.
fn ledger_key(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

struct CrawlContext<'a> {
    config: &'a CrawlConfig,
    renderer: &'a dyn PageRenderer,
    fetcher: &'a dyn FileFetcher,
    main_content: Selector,
}

impl CrawlContext<'_> {
    async fn process_reference(
        &self,
        sequence: usize,
        reference: &ReferenceEntry,
        ledger: &mut Ledger,
        attempted: &mut HashSet<String>,
    ) -> ReferenceOutcome {
        let started = Instant::now();
        let kind = classify(&reference.url);
        info!("[{:03}] Processing {} ({:?})", sequence, reference.url, kind);

        let mut outcome = ReferenceOutcome::new(sequence, &reference.url, &reference.label, kind);
        match kind {
            ContentKind::Page => {
                self.crawl_page(sequence, reference, ledger, attempted, &mut outcome)
                    .await
            }
            ContentKind::File => self.download_reference(sequence, reference, ledger, &mut outcome).await,
        }

        if let Some(ref e) = outcome.error {
            warn!("[{:03}] Could not process {}: {}", sequence, reference.url, e);
        }
        outcome.duration_ms = started.elapsed().as_millis() as u64;
        outcome
    }

    /// Page path: render, clean, fetch linked documents, save.
    async fn crawl_page(
        &self,
        sequence: usize,
        reference: &ReferenceEntry,
        ledger: &mut Ledger,
        attempted: &mut HashSet<String>,
        outcome: &mut ReferenceOutcome,
    ) {
        let rendered = match self.renderer.render(&reference.url).await {
            Ok(html) => html,
            Err(e) => {
                outcome.error = Some(e);
                return;
            }
        };

        let cleaned = clean_page(&rendered, &reference.url, &self.main_content);
        drop(rendered);
        debug!(
            "Cleaned page: {} bytes, {} links, main content {}",
            cleaned.html.len(),
            cleaned.links.len(),
            if cleaned.main_content_found { "found" } else { "not found" }
        );

        for link in &cleaned.links {
            let Some(document) = linked_document(link) else {
                continue;
            };
            if ledger.contains_url(&document.canonical_url) {
                debug!("Already in ledger: {}", document.canonical_url);
                continue;
            }
            if !attempted.insert(document.canonical_url.clone()) {
                debug!("Already attempted in this run: {}", document.canonical_url);
                continue;
            }
            self.fetch_linked(sequence, &document, ledger, outcome).await;
        }

        let filename = output_filename(
            sequence,
            &reference.label,
            self.config.max_filename_length,
            ".html",
        );
        let path = self.config.output_dir.join(filename);
        if let Err(e) = tokio::fs::write(&path, cleaned.html.as_bytes()).await {
            outcome.error = Some(UnitError::OutputWriteFailed {
                path,
                detail: e.to_string(),
            });
            return;
        }

        let key = ledger_key(&path);
        ledger.insert(key.clone(), reference.url.clone());
        info!("Saved {}", key);
        outcome.saved = Some(key);
    }

    async fn fetch_linked(
        &self,
        sequence: usize,
        document: &LinkedDocument,
        ledger: &mut Ledger,
        outcome: &mut ReferenceOutcome,
    ) {
        let (stem, _) = split_extension(&document.candidate_filename);
        let filename = output_filename(
            sequence,
            stem,
            self.config.max_filename_length,
            &document.extension,
        );
        let destination = self.config.output_dir.join(filename);

        if let Err(e) = self.fetcher.fetch(&document.url, &destination).await {
            warn!("Failed to download linked file {}: {}", document.url, e);
            outcome.subdocument_errors.push(e);
            return;
        }

        let normalized = normalize(&destination).await;
        if let Some(e) = normalized.error {
            outcome.subdocument_errors.push(e);
        }

        let entry = LedgerEntry {
            filename: ledger_key(&normalized.path),
            source_url: document.canonical_url.clone(),
        };
        info!("Downloaded linked file {}", entry.filename);
        ledger.record(&entry);
        outcome.subdocuments.push(entry);
    }

    /// File path: fetch the reference itself and normalize it.
    async fn download_reference(
        &self,
        sequence: usize,
        reference: &ReferenceEntry,
        ledger: &mut Ledger,
        outcome: &mut ReferenceOutcome,
    ) {
        let filename = output_filename(
            sequence,
            &reference.label,
            self.config.max_filename_length,
            &reference_extension(&reference.url),
        );
        let destination: PathBuf = self.config.output_dir.join(filename);

        if let Err(e) = self.fetcher.fetch(&reference.url, &destination).await {
            outcome.error = Some(e);
            return;
        }

        let normalized = normalize(&destination).await;
        outcome.conversion_error = normalized.error;

        let key = ledger_key(&normalized.path);
        ledger.insert(key.clone(), reference.url.clone());
        info!("Downloaded file {}", key);
        outcome.saved = Some(key);
    }
}

/// Extension for a directly downloaded reference: the path's, else the one
/// of a `filename` query parameter (`download?filename=report.pdf`).
fn reference_extension(url: &str) -> String {
    let from_path = path_extension(&url_path(url));
    if !from_path.is_empty() {
        return from_path;
    }
    url::Url::parse(url)
        .map(|parsed| path_extension(&candidate_filename(&parsed)))
        .unwrap_or_default()
}
