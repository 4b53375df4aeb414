//! Error types for the docharvest library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`HarvestError`]: **Fatal**: a stage cannot run at all (reference list
//!   unreadable, ledger cannot be written, browser cannot be launched,
//!   credentials missing). Returned as `Err(HarvestError)` from
//!   [`crate::crawl::run_crawl`] and [`crate::upload::run_upload`].
//!
//! * [`UnitError`]: **Non-fatal**: one reference, one linked file or one
//!   upload failed. It is logged, stored in the run report, and the loop moves
//!   on to the next unit of work. Re-running the stage is the only recovery.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the docharvest library.
///
/// Per-reference and per-file failures use [`UnitError`] and are stored in
/// [`crate::output::ReferenceOutcome`] rather than propagated here.
#[derive(Debug, Error)]
pub enum HarvestError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// The reference spreadsheet does not exist.
    #[error("Reference list not found: '{path}'\nCheck the path exists and is readable.")]
    ReferencesNotFound { path: PathBuf },

    /// The reference spreadsheet exists but could not be read or parsed.
    #[error("Failed to read reference list '{path}': {detail}")]
    ReferencesUnreadable { path: PathBuf, detail: String },

    // ── Ledger errors ─────────────────────────────────────────────────────
    /// The ledger file is required (upload stage) but missing.
    #[error("Ledger file not found: '{path}'\nRun the crawl stage first.")]
    LedgerNotFound { path: PathBuf },

    /// The ledger file exists but could not be parsed.
    #[error("Failed to read ledger '{path}': {detail}")]
    LedgerUnreadable { path: PathBuf, detail: String },

    /// The ledger could not be written at the end of the run.
    #[error("Failed to write ledger '{path}': {source}")]
    LedgerWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Output errors ─────────────────────────────────────────────────────
    /// The output directory could not be created.
    #[error("Failed to create output directory '{path}': {source}")]
    OutputDirFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Renderer errors ───────────────────────────────────────────────────
    /// The headless browser could not be started.
    #[error(
        "Failed to launch headless browser: {0}\n\n\
A Chromium or Chrome executable must be installed and discoverable.\n\
Set CHROME=/path/to/chrome if it is not on PATH.\n"
    )]
    BrowserLaunchFailed(String),

    // ── Upload errors ─────────────────────────────────────────────────────
    /// API key or vector-store id is missing.
    #[error("Vector store upload is not configured.\n{hint}")]
    UploadNotConfigured { hint: String },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A non-fatal error for a single unit of work (a reference, a linked file, an upload).
///
/// The run continues with the next unit; the error is logged and kept in the
/// run report so callers can list what needs a re-run.
#[derive(Debug, Clone, Error, serde::Serialize, serde::Deserialize)]
pub enum UnitError {
    /// The page could not be rendered; the whole reference is abandoned.
    #[error("Rendering '{url}' failed: {detail}")]
    RenderFailed { url: String, detail: String },

    /// The fetch program reported failure.
    #[error("Fetching '{url}' failed: {detail}")]
    FetchFailed { url: String, detail: String },

    /// A format conversion raised; the original file is kept.
    #[error("Converting '{path}' failed: {detail}")]
    ConversionFailed { path: PathBuf, detail: String },

    /// The cleaned page could not be written to the output directory.
    #[error("Writing '{path}' failed: {detail}")]
    OutputWriteFailed { path: PathBuf, detail: String },

    /// The vector-store API rejected or failed a request.
    #[error("Uploading '{path}' failed: {detail}")]
    UploadFailed { path: PathBuf, detail: String },
}
