//! The ledger: which local file came from which URL.
//!
//! The ledger is loaded once at the start of a crawl, mutated in memory while
//! references are processed, and written back once at the end. It serves two
//! purposes: provenance for the upload stage, and the "already fetched" check
//! that keeps a re-run from downloading linked documents again.
//!
//! On disk it is a two-column CSV (`Filename`, `URL`, header mandatory, UTF-8).
//! Rows are written in filename order; the three-digit sequence prefix keeps
//! that close to processing order.

use crate::error::HarvestError;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use tracing::{debug, info};

/// One ledger row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    #[serde(rename = "Filename")]
    pub filename: String,
    #[serde(rename = "URL")]
    pub source_url: String,
}

/// In-memory ledger with an O(1) index of recorded source URLs.
#[derive(Debug, Clone, Default)]
pub struct Ledger {
    entries: BTreeMap<String, String>,
    // url -> number of filenames currently mapped to it
    urls: HashMap<String, usize>,
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load the ledger at `path`; a missing file yields an empty ledger.
    ///
    /// When a filename occurs more than once, the first row wins.
    pub fn load(path: &Path) -> Result<Self, HarvestError> {
        if !path.exists() {
            debug!("No ledger at {}, starting empty", path.display());
            return Ok(Self::new());
        }
        let ledger = Self::load_existing(path)?;
        info!("Read {} files from ledger {}", ledger.len(), path.display());
        Ok(ledger)
    }

    /// Load the ledger at `path`, failing if it does not exist.
    pub fn load_existing(path: &Path) -> Result<Self, HarvestError> {
        if !path.exists() {
            return Err(HarvestError::LedgerNotFound {
                path: path.to_path_buf(),
            });
        }
        let unreadable = |detail: String| HarvestError::LedgerUnreadable {
            path: path.to_path_buf(),
            detail,
        };

        let mut reader = csv::Reader::from_path(path).map_err(|e| unreadable(e.to_string()))?;
        let mut ledger = Self::new();
        for row in reader.deserialize::<LedgerEntry>() {
            let entry = row.map_err(|e| unreadable(e.to_string()))?;
            if ledger.contains_file(&entry.filename) {
                debug!("Duplicate ledger row for {}, keeping the first", entry.filename);
                continue;
            }
            ledger.insert(entry.filename, entry.source_url);
        }
        Ok(ledger)
    }

    /// Write the whole ledger to `path`, replacing any previous file.
    ///
    /// The rows go to a sibling temp file first, which is then renamed over
    /// `path`, so an interrupted save never leaves a truncated ledger.
    pub fn save(&self, path: &Path) -> Result<(), HarvestError> {
        let write_failed = |source: std::io::Error| HarvestError::LedgerWriteFailed {
            path: path.to_path_buf(),
            source,
        };

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(write_failed)?;
            }
        }

        let mut tmp_name = path.as_os_str().to_owned();
        tmp_name.push(".tmp");
        let tmp_path = Path::new(&tmp_name);

        {
            let mut writer = csv::Writer::from_path(tmp_path).map_err(|e| write_failed(e.into()))?;
            // The header must be present even for an empty ledger, and
            // `serialize` only emits it alongside the first row.
            writer
                .write_record(["Filename", "URL"])
                .map_err(|e| write_failed(e.into()))?;
            for (filename, url) in &self.entries {
                writer
                    .write_record([filename.as_str(), url.as_str()])
                    .map_err(|e| write_failed(e.into()))?;
            }
            writer.flush().map_err(write_failed)?;
        }

        std::fs::rename(tmp_path, path).map_err(write_failed)?;
        info!("Wrote {} rows to ledger {}", self.len(), path.display());
        Ok(())
    }

    /// Record `filename -> source_url`; a recurring filename is overwritten.
    pub fn insert(&mut self, filename: impl Into<String>, source_url: impl Into<String>) {
        let filename = filename.into();
        let source_url = source_url.into();

        *self.urls.entry(source_url.clone()).or_insert(0) += 1;
        if let Some(previous) = self.entries.insert(filename, source_url) {
            self.release_url(&previous);
        }
    }

    /// Record a ledger entry.
    pub fn record(&mut self, entry: &LedgerEntry) {
        self.insert(entry.filename.clone(), entry.source_url.clone());
    }

    /// True if some file was recorded with this source URL.
    pub fn contains_url(&self, url: &str) -> bool {
        self.urls.contains_key(url)
    }

    pub fn contains_file(&self, filename: &str) -> bool {
        self.entries.contains_key(filename)
    }

    pub fn get(&self, filename: &str) -> Option<&str> {
        self.entries.get(filename).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate `(filename, source_url)` pairs in filename order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(f, u)| (f.as_str(), u.as_str()))
    }

    fn release_url(&mut self, url: &str) {
        if let Some(count) = self.urls.get_mut(url) {
            *count -= 1;
            if *count == 0 {
                self.urls.remove(url);
            }
        }
    }
}
