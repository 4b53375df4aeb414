//! Reference list loading.
//!
//! The reference spreadsheet is a CSV export in ISO-8859-1 with (at least)
//! the columns `referanse_url` and `referanse_lenketekst`. Many rows point at
//! the same URL; the list is de-duplicated by URL and the first label seen
//! for a URL is kept.

use crate::error::HarvestError;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use tracing::{debug, info};

/// One reference to crawl: a URL and the display text used to name its output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferenceEntry {
    pub url: String,
    pub label: String,
}

#[derive(Debug, Deserialize)]
struct ReferenceRow {
    referanse_url: Option<String>,
    referanse_lenketekst: Option<String>,
}

/// Load and de-duplicate the reference list at `path`.
pub fn load_references(path: &Path) -> Result<Vec<ReferenceEntry>, HarvestError> {
    let bytes = match std::fs::read(path) {
        Ok(b) => b,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(HarvestError::ReferencesNotFound {
                path: path.to_path_buf(),
            });
        }
        Err(e) => {
            return Err(HarvestError::ReferencesUnreadable {
                path: path.to_path_buf(),
                detail: e.to_string(),
            });
        }
    };

    let references = parse_references(&bytes).map_err(|detail| HarvestError::ReferencesUnreadable {
        path: path.to_path_buf(),
        detail,
    })?;
    info!(
        "Loaded {} unique references from {}",
        references.len(),
        path.display()
    );
    Ok(references)
}

/// Parse ISO-8859-1 CSV bytes into a de-duplicated reference list.
///
/// Every byte maps to the code point of the same value, so 0x80..=0x9F are
/// C1 controls and not the `windows-1252` punctuation. Rows with an empty URL
/// are skipped.
pub fn parse_references(bytes: &[u8]) -> Result<Vec<ReferenceEntry>, String> {
    let text = encoding_rs::mem::decode_latin1(bytes);

    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_reader(text.as_bytes());

    // url -> index into `references`
    let mut seen: HashMap<String, usize> = HashMap::new();
    let mut references: Vec<ReferenceEntry> = Vec::new();

    for row in reader.deserialize::<ReferenceRow>() {
        let row = row.map_err(|e| e.to_string())?;
        let Some(url) = row.referanse_url.map(|u| u.trim().to_string()) else {
            continue;
        };
        if url.is_empty() {
            continue;
        }
        let label = row.referanse_lenketekst.unwrap_or_default();

        if let Some(&idx) = seen.get(&url) {
            let first = &references[idx];
            if first.label != label {
                debug!(
                    "Reference {} listed again with label '{}', keeping '{}'",
                    url, label, first.label
                );
            }
            continue;
        }
        seen.insert(url.clone(), references.len());
        references.push(ReferenceEntry { url, label });
    }

    Ok(references)
}
