//! Upload stage: push every ledger file to a vector store.
//!
//! Each ledger row is resolved to `<output_dir>/<basename>`. Files that are
//! not on disk are skipped with a log line. Everything else goes through the
//! [`VectorStore`] one file at a time; a failure is logged and recorded in
//! the [`UploadReport`] and the batch moves on.

use crate::config::UploadConfig;
use crate::error::{HarvestError, UnitError};
use crate::ledger::Ledger;
use crate::output::{UploadReport, UploadedFile};
use async_trait::async_trait;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// A destination that accepts a file plus its source URL.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Store the file at `path`, tagged with `source_url`, and return the
    /// identifier the store assigned to it.
    async fn add_file(&self, path: &Path, source_url: &str) -> Result<String, UnitError>;
}

/// OpenAI files + vector-store API client.
///
/// Adding a file is two requests: a multipart upload to `/files`, then an
/// attach to `/vector_stores/{id}/files` carrying `source_url` as a file
/// attribute.
pub struct OpenAiVectorStore {
    client: reqwest::Client,
    api_base: String,
    api_key: String,
    vector_store_id: String,
}

#[derive(Debug, Deserialize)]
struct FileObject {
    id: String,
}

impl OpenAiVectorStore {
    pub fn new(config: &UploadConfig) -> Result<Self, HarvestError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| HarvestError::Internal(format!("HTTP client: {}", e)))?;
        Ok(Self {
            client,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            vector_store_id: config.vector_store_id.clone(),
        })
    }

    async fn upload(&self, path: &Path) -> Result<String, UnitError> {
        let failed = |detail: String| UnitError::UploadFailed {
            path: path.to_path_buf(),
            detail,
        };

        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| failed(format!("read: {}", e)))?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "upload".to_string());
        let mime = mime_guess::from_path(path).first_or_octet_stream();
        let part = reqwest::multipart::Part::bytes(bytes)
            .file_name(file_name)
            .mime_str(mime.essence_str())
            .map_err(|e| failed(e.to_string()))?;
        let form = reqwest::multipart::Form::new()
            .text("purpose", "assistants")
            .part("file", part);

        let response = self
            .client
            .post(format!("{}/files", self.api_base))
            .bearer_auth(&self.api_key)
            .multipart(form)
            .send()
            .await
            .map_err(|e| failed(e.to_string()))?;
        let file: FileObject = parse_response(response).await.map_err(failed)?;
        Ok(file.id)
    }

    async fn attach(&self, path: &Path, file_id: &str, source_url: &str) -> Result<(), UnitError> {
        let body = serde_json::json!({
            "file_id": file_id,
            "attributes": { "source_url": source_url },
        });
        let response = self
            .client
            .post(format!(
                "{}/vector_stores/{}/files",
                self.api_base, self.vector_store_id
            ))
            .bearer_auth(&self.api_key)
            .header("OpenAI-Beta", "assistants=v2")
            .json(&body)
            .send()
            .await
            .map_err(|e| UnitError::UploadFailed {
                path: path.to_path_buf(),
                detail: e.to_string(),
            })?;
        parse_response::<serde_json::Value>(response)
            .await
            .map_err(|detail| UnitError::UploadFailed {
                path: path.to_path_buf(),
                detail: format!("attach {}: {}", file_id, detail),
            })?;
        Ok(())
    }
}

#[async_trait]
impl VectorStore for OpenAiVectorStore {
    async fn add_file(&self, path: &Path, source_url: &str) -> Result<String, UnitError> {
        let file_id = self.upload(path).await?;
        info!("Uploaded {} as {}", path.display(), file_id);
        self.attach(path, &file_id, source_url).await?;
        info!("Attached {} to vector store {}", file_id, self.vector_store_id);
        Ok(file_id)
    }
}

/// Decode a JSON body, turning non-2xx statuses into an error string that
/// carries the API's own message.
async fn parse_response<T: serde::de::DeserializeOwned>(
    response: reqwest::Response,
) -> Result<T, String> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(format!("HTTP {}: {}", status, body.trim()));
    }
    response.json::<T>().await.map_err(|e| e.to_string())
}

/// Run the upload stage against the configured OpenAI vector store.
///
/// A missing ledger file is fatal; missing or failing files are not.
pub async fn run_upload(config: &UploadConfig) -> Result<UploadReport, HarvestError> {
    let ledger = Ledger::load_existing(&config.ledger_path)?;
    info!(
        "Read {} ledger entries from {}",
        ledger.len(),
        config.ledger_path.display()
    );
    let store = OpenAiVectorStore::new(config)?;
    Ok(upload_with(&store, &ledger, &config.output_dir).await)
}

/// Upload every ledger file found under `output_dir` to `store`.
pub async fn upload_with(store: &dyn VectorStore, ledger: &Ledger, output_dir: &Path) -> UploadReport {
    let started = Instant::now();
    let mut report = UploadReport {
        total_entries: ledger.len(),
        ..UploadReport::default()
    };

    for (filename, source_url) in ledger.iter() {
        let path = local_path(output_dir, filename);
        if !path.is_file() {
            info!("File {} does not exist, skipping", path.display());
            report.missing.push(path.to_string_lossy().into_owned());
            continue;
        }

        info!("Uploading {}", path.display());
        match store.add_file(&path, source_url).await {
            Ok(file_id) => report.uploaded.push(UploadedFile {
                path: path.to_string_lossy().into_owned(),
                file_id,
                source_url: source_url.to_string(),
            }),
            Err(e) => {
                warn!("{}", e);
                report.errors.push(e);
            }
        }
    }

    report.duration_ms = started.elapsed().as_millis() as u64;
    info!(
        "Upload complete: {} uploaded, {} missing, {} failed, {}ms",
        report.uploaded.len(),
        report.missing.len(),
        report.errors.len(),
        report.duration_ms
    );
    report
}

/// Ledger keys may carry the crawl's output directory; only the basename
/// is trusted so the upload can run from a different working directory.
fn local_path(output_dir: &Path, filename: &str) -> PathBuf {
    let basename = Path::new(filename)
        .file_name()
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(filename));
    output_dir.join(basename)
}
