//! Configuration types for the crawl and upload stages.
//!
//! Each stage is controlled through one struct: [`CrawlConfig`] and
//! [`UploadConfig`], both built via a builder so callers set only what they
//! care about and rely on documented defaults for the rest. The binaries map
//! CLI flags and environment variables onto these builders.

use crate::error::HarvestError;
use crate::progress::ProgressCallback;
use std::fmt;
use std::path::PathBuf;

/// User agent presented by the browser and by the fetch program.
pub const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/115.0 Safari/537.36";

/// Configuration for a crawl run.
///
/// Built via [`CrawlConfig::builder()`] or using [`CrawlConfig::default()`].
///
/// # Example
/// ```rust
/// use docharvest::CrawlConfig;
///
/// let config = CrawlConfig::builder()
///     .output_dir("out")
///     .only_url("https://example.org/doc")
///     .render_timeout_secs(20)
///     .build()
///     .unwrap();
/// assert_eq!(config.max_filename_length, 100);
/// ```
#[derive(Clone)]
pub struct CrawlConfig {
    /// Reference spreadsheet (CSV, ISO-8859-1). Default: `download-regulation-reports.csv`.
    pub references_path: PathBuf,

    /// Ledger of produced files. Default: `downloaded_files.csv`.
    pub ledger_path: PathBuf,

    /// Flat directory receiving every produced file. Default: `nedlastede_filer`.
    pub output_dir: PathBuf,

    /// Restrict the run to this single reference URL. Default: None (all references).
    ///
    /// Sequence numbers still follow the full reference list, so a re-run of
    /// one failed entry produces the same file names as the full run.
    pub only_url: Option<String>,

    /// Maximum length, in characters, of the sanitized label or file stem. Default: 100.
    pub max_filename_length: usize,

    /// User agent for the browser and the fetch program.
    pub user_agent: String,

    /// Upper bound on navigation plus DOM settling, in seconds. Default: 30.
    pub render_timeout_secs: u64,

    /// Interval between DOM-idle checks, in milliseconds. Default: 500.
    pub settle_poll_ms: u64,

    /// CSS selector of the main-content container. Default: `div#root`.
    pub main_content_selector: String,

    /// External program used to fetch linked files. Default: `curl`.
    pub fetch_program: String,

    /// Optional progress callback.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            references_path: PathBuf::from("download-regulation-reports.csv"),
            ledger_path: PathBuf::from("downloaded_files.csv"),
            output_dir: PathBuf::from("nedlastede_filer"),
            only_url: None,
            max_filename_length: 100,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            render_timeout_secs: 30,
            settle_poll_ms: 500,
            main_content_selector: "div#root".to_string(),
            fetch_program: "curl".to_string(),
            progress_callback: None,
        }
    }
}

impl fmt::Debug for CrawlConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CrawlConfig")
            .field("references_path", &self.references_path)
            .field("ledger_path", &self.ledger_path)
            .field("output_dir", &self.output_dir)
            .field("only_url", &self.only_url)
            .field("max_filename_length", &self.max_filename_length)
            .field("user_agent", &self.user_agent)
            .field("render_timeout_secs", &self.render_timeout_secs)
            .field("settle_poll_ms", &self.settle_poll_ms)
            .field("main_content_selector", &self.main_content_selector)
            .field("fetch_program", &self.fetch_program)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn HarvestProgressCallback>"),
            )
            .finish()
    }
}

impl CrawlConfig {
    /// Create a new builder for `CrawlConfig`.
    pub fn builder() -> CrawlConfigBuilder {
        CrawlConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`CrawlConfig`].
#[derive(Debug)]
pub struct CrawlConfigBuilder {
    config: CrawlConfig,
}

impl CrawlConfigBuilder {
    pub fn references_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.references_path = path.into();
        self
    }

    pub fn ledger_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.ledger_path = path.into();
        self
    }

    pub fn output_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.output_dir = path.into();
        self
    }

    pub fn only_url(mut self, url: impl Into<String>) -> Self {
        self.config.only_url = Some(url.into());
        self
    }

    pub fn max_filename_length(mut self, n: usize) -> Self {
        self.config.max_filename_length = n.clamp(10, 200);
        self
    }

    pub fn user_agent(mut self, ua: impl Into<String>) -> Self {
        self.config.user_agent = ua.into();
        self
    }

    pub fn render_timeout_secs(mut self, secs: u64) -> Self {
        self.config.render_timeout_secs = secs.max(1);
        self
    }

    pub fn settle_poll_ms(mut self, ms: u64) -> Self {
        self.config.settle_poll_ms = ms.max(50);
        self
    }

    pub fn main_content_selector(mut self, selector: impl Into<String>) -> Self {
        self.config.main_content_selector = selector.into();
        self
    }

    pub fn fetch_program(mut self, program: impl Into<String>) -> Self {
        self.config.fetch_program = program.into();
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<CrawlConfig, HarvestError> {
        let c = &self.config;
        if c.output_dir.as_os_str().is_empty() {
            return Err(HarvestError::InvalidConfig(
                "Output directory must not be empty".into(),
            ));
        }
        if c.fetch_program.trim().is_empty() {
            return Err(HarvestError::InvalidConfig(
                "Fetch program must not be empty".into(),
            ));
        }
        if scraper::Selector::parse(&c.main_content_selector).is_err() {
            return Err(HarvestError::InvalidConfig(format!(
                "Main-content selector is not valid CSS: '{}'",
                c.main_content_selector
            )));
        }
        Ok(self.config)
    }
}

// ── Upload stage ─────────────────────────────────────────────────────────

/// Configuration for the upload stage.
///
/// `api_key` and `vector_store_id` have no defaults; [`UploadConfigBuilder::build`]
/// rejects a config without them.
#[derive(Clone)]
pub struct UploadConfig {
    /// Ledger produced by the crawl stage. Default: `downloaded_files.csv`.
    pub ledger_path: PathBuf,

    /// Directory holding the produced files. Default: `nedlastede_filer`.
    pub output_dir: PathBuf,

    /// Bearer token for the vector-store API.
    pub api_key: String,

    /// Identifier of the target vector store.
    pub vector_store_id: String,

    /// API base URL. Default: `https://api.openai.com/v1`.
    pub api_base: String,

    /// Per-request timeout in seconds. Default: 120.
    pub request_timeout_secs: u64,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            ledger_path: PathBuf::from("downloaded_files.csv"),
            output_dir: PathBuf::from("nedlastede_filer"),
            api_key: String::new(),
            vector_store_id: String::new(),
            api_base: "https://api.openai.com/v1".to_string(),
            request_timeout_secs: 120,
        }
    }
}

impl fmt::Debug for UploadConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UploadConfig")
            .field("ledger_path", &self.ledger_path)
            .field("output_dir", &self.output_dir)
            .field("api_key", &"<redacted>")
            .field("vector_store_id", &self.vector_store_id)
            .field("api_base", &self.api_base)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .finish()
    }
}

impl UploadConfig {
    /// Create a new builder for `UploadConfig`.
    pub fn builder() -> UploadConfigBuilder {
        UploadConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`UploadConfig`].
#[derive(Debug)]
pub struct UploadConfigBuilder {
    config: UploadConfig,
}

impl UploadConfigBuilder {
    pub fn ledger_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.ledger_path = path.into();
        self
    }

    pub fn output_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.output_dir = path.into();
        self
    }

    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.config.api_key = key.into();
        self
    }

    pub fn vector_store_id(mut self, id: impl Into<String>) -> Self {
        self.config.vector_store_id = id.into();
        self
    }

    pub fn api_base(mut self, base: impl Into<String>) -> Self {
        self.config.api_base = base.into().trim_end_matches('/').to_string();
        self
    }

    pub fn request_timeout_secs(mut self, secs: u64) -> Self {
        self.config.request_timeout_secs = secs.max(1);
        self
    }

    /// Build the configuration, validating that credentials are present.
    pub fn build(self) -> Result<UploadConfig, HarvestError> {
        let c = &self.config;
        if c.api_key.trim().is_empty() {
            return Err(HarvestError::UploadNotConfigured {
                hint: "Set OPENAI_API_KEY in the environment or a .env file.".into(),
            });
        }
        if c.vector_store_id.trim().is_empty() {
            return Err(HarvestError::UploadNotConfigured {
                hint: "Set VECTOR_STORE_ID in the environment or a .env file.".into(),
            });
        }
        if !(c.api_base.starts_with("http://") || c.api_base.starts_with("https://")) {
            return Err(HarvestError::InvalidConfig(format!(
                "API base must be an HTTP(S) URL, got '{}'",
                c.api_base
            )));
        }
        Ok(self.config)
    }
}
