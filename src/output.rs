//! Run reports returned by the crawl and upload stages.

use crate::error::UnitError;
use crate::ledger::LedgerEntry;
use crate::pipeline::classify::ContentKind;
use serde::{Deserialize, Serialize};

/// What happened to one reference of the list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReferenceOutcome {
    /// 1-indexed position in the de-duplicated reference list.
    pub sequence: usize,
    pub url: String,
    pub label: String,
    /// Classifier verdict that chose the crawl or direct-download path.
    pub kind: ContentKind,
    /// Ledger key of the file produced for the reference itself.
    pub saved: Option<String>,
    /// Set when the reference's own file was kept unconverted.
    pub conversion_error: Option<UnitError>,
    /// Linked documents fetched while crawling the page.
    pub subdocuments: Vec<LedgerEntry>,
    /// Linked documents that failed to fetch or convert.
    pub subdocument_errors: Vec<UnitError>,
    /// Set when the reference was abandoned.
    pub error: Option<UnitError>,
    pub duration_ms: u64,
}

impl ReferenceOutcome {
    pub fn new(sequence: usize, url: &str, label: &str, kind: ContentKind) -> Self {
        Self {
            sequence,
            url: url.to_string(),
            label: label.to_string(),
            kind,
            saved: None,
            conversion_error: None,
            subdocuments: Vec::new(),
            subdocument_errors: Vec::new(),
            error: None,
            duration_ms: 0,
        }
    }
}

/// Aggregate statistics for a crawl run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunReport {
    /// References in the de-duplicated list.
    pub total_references: usize,
    /// References skipped by the `only_url` filter.
    pub skipped: usize,
    /// References that produced their own file.
    pub saved: usize,
    /// References abandoned after a unit error.
    pub failed: usize,
    /// Files kept in their downloaded format because conversion failed.
    pub conversions_failed: usize,
    pub subdocuments_fetched: usize,
    pub subdocuments_failed: usize,
    /// Rows written to the ledger file.
    pub ledger_entries: usize,
    pub duration_ms: u64,
    pub outcomes: Vec<ReferenceOutcome>,
}

impl RunReport {
    /// Fold one reference outcome into the counters.
    pub fn record(&mut self, outcome: ReferenceOutcome) {
        if outcome.error.is_some() {
            self.failed += 1;
        } else if outcome.saved.is_some() {
            self.saved += 1;
        }
        if outcome.conversion_error.is_some() {
            self.conversions_failed += 1;
        }
        self.subdocuments_fetched += outcome.subdocuments.len();
        self.subdocuments_failed += outcome.subdocument_errors.len();
        self.outcomes.push(outcome);
    }
}

/// A file accepted by the vector store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadedFile {
    pub path: String,
    pub file_id: String,
    pub source_url: String,
}

/// Aggregate statistics for an upload run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UploadReport {
    /// Ledger rows considered.
    pub total_entries: usize,
    pub uploaded: Vec<UploadedFile>,
    /// Ledger rows whose file is not on disk.
    pub missing: Vec<String>,
    pub errors: Vec<UnitError>,
    pub duration_ms: u64,
}
