//! Format normalization: turn downloaded office files into formats a vector
//! store ingests well.
//!
//! | Extension | Result | Original |
//! |---|---|---|
//! | `.docx` | HTML sibling (`.html`) | deleted |
//! | `.xlsx` | tab-separated text (`.txt`) | deleted |
//! | `.pptx` | slide text (`.txt`) | deleted |
//! | `.xsd`  | renamed to `<name>.xsd.txt` | n/a |
//! | anything else | unchanged | kept |
//!
//! Extensions are matched case-insensitively. Conversion is CPU and disk
//! bound, so [`normalize`] runs it on the blocking thread pool. A failed
//! conversion is logged and leaves the original file in place; the caller
//! records the original path instead.

mod docx;
mod pptx;
mod xlsx;

use crate::error::UnitError;
use quick_xml::escape::unescape;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader as XmlReader;
use std::collections::HashMap;
use std::io::{Read, Seek};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};
use zip::ZipArchive;

pub use docx::docx_to_html;
pub use pptx::pptx_to_text;
pub use xlsx::xlsx_to_text;

/// Result of normalizing one file.
#[derive(Debug, Clone)]
pub struct Normalized {
    /// Path to record in the ledger: the converted file, or the original
    /// when conversion failed or was not needed.
    pub path: PathBuf,
    /// Set when a conversion was attempted and failed.
    pub error: Option<UnitError>,
}

impl Normalized {
    fn unchanged(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
            error: None,
        }
    }
}

/// Why an office document could not be converted.
#[derive(Debug, Error)]
pub enum ConvertError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("not a valid OOXML package: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("malformed XML in '{part}': {detail}")]
    Xml { part: String, detail: String },

    #[error("spreadsheet error: {0}")]
    Sheet(#[from] calamine::XlsxError),

    #[error("package has no '{0}' part")]
    MissingPart(String),
}

/// Normalize the file at `path`, returning the path to record.
///
/// Idempotent: paths that are already normalized (`.html`, `.txt`, `.pdf`,
/// ...) come back unchanged.
pub async fn normalize(path: &Path) -> Normalized {
    if conversion_for(path).is_none() {
        return Normalized::unchanged(path);
    }
    let owned = path.to_path_buf();
    match tokio::task::spawn_blocking(move || normalize_blocking(&owned)).await {
        Ok(normalized) => normalized,
        Err(e) => Normalized {
            path: path.to_path_buf(),
            error: Some(UnitError::ConversionFailed {
                path: path.to_path_buf(),
                detail: format!("conversion task panicked: {e}"),
            }),
        },
    }
}

/// Conversion selected by a file's extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Conversion {
    DocxToHtml,
    XlsxToText,
    PptxToText,
    XsdToText,
}

fn conversion_for(path: &Path) -> Option<Conversion> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)?;
    match ext.as_str() {
        "docx" => Some(Conversion::DocxToHtml),
        "xlsx" => Some(Conversion::XlsxToText),
        "pptx" => Some(Conversion::PptxToText),
        "xsd" => Some(Conversion::XsdToText),
        _ => None,
    }
}

/// Blocking body of [`normalize`].
pub fn normalize_blocking(path: &Path) -> Normalized {
    let Some(conversion) = conversion_for(path) else {
        return Normalized::unchanged(path);
    };

    let converted = match conversion {
        Conversion::DocxToHtml => docx_to_html(path).and_then(|html| replace_with(path, "html", html)),
        Conversion::XlsxToText => xlsx_to_text(path).and_then(|text| replace_with(path, "txt", text)),
        Conversion::PptxToText => pptx_to_text(path).and_then(|text| replace_with(path, "txt", text)),
        Conversion::XsdToText => rename_to_text(path),
    };

    match converted {
        Ok(new_path) => Normalized {
            path: new_path,
            error: None,
        },
        Err(e) => {
            let error = UnitError::ConversionFailed {
                path: path.to_path_buf(),
                detail: e.to_string(),
            };
            warn!("{}", error);
            Normalized {
                path: path.to_path_buf(),
                error: Some(error),
            }
        }
    }
}

fn rename_to_text(path: &Path) -> Result<PathBuf, ConvertError> {
    let mut renamed = path.as_os_str().to_owned();
    renamed.push(".txt");
    let renamed = PathBuf::from(renamed);
    std::fs::rename(path, &renamed)?;
    info!("Renamed {} to {}", path.display(), renamed.display());
    Ok(renamed)
}

/// Write `content` next to `path` with extension `new_ext`, then delete `path`.
fn replace_with(path: &Path, new_ext: &str, content: String) -> Result<PathBuf, ConvertError> {
    let new_path = path.with_extension(new_ext);
    std::fs::write(&new_path, content)?;
    info!("Converted {} to {}", path.display(), new_path.display());

    if let Err(e) = std::fs::remove_file(path) {
        warn!("Could not remove original {}: {}", path.display(), e);
    } else {
        debug!("Removed original {}", path.display());
    }
    Ok(new_path)
}

// ── OOXML package helpers ───────────────────────────────────────────────────

/// Read a part of an OOXML package; `Ok(None)` if the part does not exist.
pub(crate) fn read_part<R: Read + Seek>(
    archive: &mut ZipArchive<R>,
    name: &str,
) -> Result<Option<Vec<u8>>, ConvertError> {
    let mut entry = match archive.by_name(name) {
        Ok(entry) => entry,
        Err(zip::result::ZipError::FileNotFound) => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    let mut buf = Vec::new();
    entry.read_to_end(&mut buf)?;
    Ok(Some(buf))
}

/// Parse a `.rels` part into `Id -> Target`.
pub(crate) fn read_relationships(xml: &[u8], part: &str) -> Result<HashMap<String, String>, ConvertError> {
    let mut reader = XmlReader::from_reader(xml);
    let mut buf = Vec::new();
    let mut rels = HashMap::new();
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) | Ok(Event::Empty(ref e))
                if e.local_name().as_ref() == b"Relationship" =>
            {
                if let (Some(id), Some(target)) = (attr(e, b"Id"), attr(e, b"Target")) {
                    rels.insert(id, target);
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(xml_error(part, e)),
            _ => {}
        }
        buf.clear();
    }
    Ok(rels)
}

/// Value of the attribute whose local name is `key`, unescaped.
pub(crate) fn attr(element: &BytesStart<'_>, key: &[u8]) -> Option<String> {
    element
        .attributes()
        .with_checks(false)
        .filter_map(Result::ok)
        .find(|a| a.key.local_name().as_ref() == key)
        .and_then(|a| {
            let raw = String::from_utf8_lossy(&a.value);
            unescape(&raw).ok().map(|v| v.into_owned())
        })
}

pub(crate) fn xml_error(part: &str, e: quick_xml::Error) -> ConvertError {
    ConvertError::Xml {
        part: part.to_string(),
        detail: e.to_string(),
    }
}
