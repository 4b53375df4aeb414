//! Progress-callback trait for per-reference crawl events.
//!
//! Inject an [`Arc<dyn HarvestProgressCallback>`] via
//! [`crate::config::CrawlConfigBuilder::progress_callback`] to receive events
//! as the crawl works through the reference list.
//!
//! # Example
//!
//! ```rust
//! use docharvest::{CrawlConfig, HarvestProgressCallback};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingCallback {
//!     saved: Arc<AtomicUsize>,
//! }
//!
//! impl HarvestProgressCallback for CountingCallback {
//!     fn on_reference_complete(&self, sequence: usize, saved: &str) {
//!         self.saved.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("{sequence:03} -> {saved}");
//!     }
//! }
//!
//! let counter = Arc::new(CountingCallback {
//!     saved: Arc::new(AtomicUsize::new(0)),
//! });
//!
//! let config = CrawlConfig::builder()
//!     .progress_callback(counter as Arc<dyn HarvestProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use crate::output::RunReport;
use std::sync::Arc;

/// Called by the crawl loop as it processes each reference.
///
/// All methods have default no-op implementations so callers only override
/// what they care about. The crawl is sequential, but the trait is
/// `Send + Sync` so a callback can be shared with other tasks.
pub trait HarvestProgressCallback: Send + Sync {
    /// Called once after the reference list is loaded.
    ///
    /// # Arguments
    /// * `total_references`: references that will be attempted (after the `only_url` filter)
    fn on_run_start(&self, total_references: usize) {
        let _ = total_references;
    }

    /// Called before a reference is classified and processed.
    fn on_reference_start(&self, sequence: usize, url: &str) {
        let _ = (sequence, url);
    }

    /// Called when a reference produced a file.
    ///
    /// # Arguments
    /// * `sequence`: position in the reference list (1-indexed)
    /// * `saved`   : path recorded in the ledger for the reference itself
    fn on_reference_complete(&self, sequence: usize, saved: &str) {
        let _ = (sequence, saved);
    }

    /// Called when a reference was abandoned.
    fn on_reference_error(&self, sequence: usize, url: &str, error: &str) {
        let _ = (sequence, url, error);
    }

    /// Called once after the ledger has been saved.
    fn on_run_complete(&self, report: &RunReport) {
        let _ = report;
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl HarvestProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::CrawlConfig`].
pub type ProgressCallback = Arc<dyn HarvestProgressCallback>;
