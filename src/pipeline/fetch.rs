//! File fetching: download a URL to a local path.
//!
//! The crawler only needs "fetch this URL to that file, tell me whether it
//! worked", expressed by [`FileFetcher`]. The production implementation,
//! [`CurlFetcher`], shells out to `curl` with redirect following; tests
//! substitute in-memory fetchers.
//!
//! There is no retry and no cleanup: a failed fetch may leave a partial file
//! behind, which is simply not recorded in the ledger.

use crate::error::UnitError;
use async_trait::async_trait;
use std::path::Path;
use tracing::{debug, warn};

/// Fetch a URL into a file.
#[async_trait]
pub trait FileFetcher: Send + Sync {
    /// Download `url` to `destination`, overwriting it.
    ///
    /// Returns `Err(UnitError::FetchFailed)` when the download did not
    /// complete; the caller logs it and moves on.
    async fn fetch(&self, url: &str, destination: &Path) -> Result<(), UnitError>;
}

/// [`FileFetcher`] backed by an external `curl`-compatible program.
#[derive(Debug, Clone)]
pub struct CurlFetcher {
    program: String,
    user_agent: String,
}

impl CurlFetcher {
    pub fn new(program: impl Into<String>, user_agent: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            user_agent: user_agent.into(),
        }
    }

    /// Arguments passed to the program for one download.
    fn args(&self, url: &str, destination: &Path) -> Vec<std::ffi::OsString> {
        vec![
            "-L".into(),
            "-sS".into(),
            "-o".into(),
            destination.as_os_str().to_owned(),
            "-H".into(),
            format!("User-Agent: {}", self.user_agent).into(),
            url.into(),
        ]
    }
}

#[async_trait]
impl FileFetcher for CurlFetcher {
    async fn fetch(&self, url: &str, destination: &Path) -> Result<(), UnitError> {
        debug!("{} -> {}", url, destination.display());

        let output = tokio::process::Command::new(&self.program)
            .args(self.args(url, destination))
            .stdin(std::process::Stdio::null())
            .output()
            .await
            .map_err(|e| UnitError::FetchFailed {
                url: url.to_string(),
                detail: format!("could not run '{}': {}", self.program, e),
            })?;

        if output.status.success() {
            return Ok(());
        }

        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        let detail = if stderr.is_empty() {
            output.status.to_string()
        } else {
            format!("{}: {}", output.status, stderr)
        };
        warn!("{} failed to download {}: {}", self.program, url, detail);
        Err(UnitError::FetchFailed {
            url: url.to_string(),
            detail,
        })
    }
}
