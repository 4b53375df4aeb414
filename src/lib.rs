//! # docharvest
//!
//! Collect the documents behind a list of reference URLs and feed them to a
//! vector store.
//!
//! ## Pipeline Overview
//!
//! ```text
//! references.csv (ISO-8859-1)
//!  │
//!  ├─ crawl stage
//!  │   ├─ 1. Classify   page or direct file, from the URL alone
//!  │   ├─ 2. Render     headless Chromium, bounded DOM-idle wait
//!  │   ├─ 3. Clean      drop scripts/styles/attributes, keep absolute hrefs
//!  │   ├─ 4. Fetch      linked .pdf/.docx/.pptx/.xlsx/.xsd via curl
//!  │   ├─ 5. Normalize  docx → html, xlsx/pptx → txt, xsd → .xsd.txt
//!  │   └─ 6. Ledger     Filename,URL rows in downloaded_files.csv
//!  │
//!  └─ upload stage
//!      └─ every ledger file → /files → /vector_stores/{id}/files
//! ```
//!
//! Both stages are sequential and tolerate per-item failure: a page that
//! does not render or a file that does not fetch is logged and recorded in
//! the run report, and the run goes on. Re-running the crawl with the same
//! ledger skips linked documents that are already recorded.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use docharvest::{run_crawl, run_upload, CrawlConfig, UploadConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let report = run_crawl(&CrawlConfig::default()).await?;
//!     eprintln!("{} saved, {} failed", report.saved, report.failed);
//!
//!     let upload = UploadConfig::builder()
//!         .api_key(std::env::var("OPENAI_API_KEY")?)
//!         .vector_store_id(std::env::var("VECTOR_STORE_ID")?)
//!         .build()?;
//!     let uploaded = run_upload(&upload).await?;
//!     eprintln!("{} uploaded", uploaded.uploaded.len());
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature   | Default | Description |
//! |-----------|---------|-------------|
//! | `cli`     | on      | The `docharvest-crawl` and `docharvest-upload` binaries (clap, indicatif, tracing-subscriber) |
//! | `browser` | on      | [`ChromeRenderer`] and [`run_crawl`] via chromiumoxide |
//!
//! Without `browser`, drive the crawl through [`run_crawl_with`] and your own
//! [`PageRenderer`].

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod crawl;
pub mod error;
pub mod ledger;
#[cfg(feature = "cli")]
pub mod logging;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod references;
pub mod upload;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{CrawlConfig, CrawlConfigBuilder, UploadConfig, UploadConfigBuilder, DEFAULT_USER_AGENT};
#[cfg(feature = "browser")]
pub use crawl::run_crawl;
pub use crawl::{crawl_references, run_crawl_with};
pub use error::{HarvestError, UnitError};
pub use ledger::{Ledger, LedgerEntry};
pub use output::{ReferenceOutcome, RunReport, UploadReport, UploadedFile};
pub use pipeline::classify::ContentKind;
pub use pipeline::fetch::{CurlFetcher, FileFetcher};
#[cfg(feature = "browser")]
pub use pipeline::render::ChromeRenderer;
pub use pipeline::render::PageRenderer;
pub use progress::{HarvestProgressCallback, NoopProgressCallback, ProgressCallback};
pub use references::{load_references, ReferenceEntry};
pub use upload::{run_upload, upload_with, OpenAiVectorStore, VectorStore};
