//! Shared fakes and fixtures for the integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use docharvest::{CrawlConfig, FileFetcher, PageRenderer, UnitError};
use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use tempfile::TempDir;

/// Renderer serving canned HTML per URL; unknown URLs fail to render.
#[derive(Default)]
pub struct FakeRenderer {
    pages: HashMap<String, String>,
    pub rendered: Mutex<Vec<String>>,
    pub shut_down: AtomicBool,
}

impl FakeRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn page(mut self, url: &str, html: &str) -> Self {
        self.pages.insert(url.to_string(), html.to_string());
        self
    }

    pub fn was_shut_down(&self) -> bool {
        self.shut_down.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PageRenderer for FakeRenderer {
    async fn render(&self, url: &str) -> Result<String, UnitError> {
        self.rendered.lock().unwrap().push(url.to_string());
        self.pages
            .get(url)
            .cloned()
            .ok_or_else(|| UnitError::RenderFailed {
                url: url.to_string(),
                detail: "navigation timed out".into(),
            })
    }

    async fn shutdown(&self) {
        self.shut_down.store(true, Ordering::SeqCst);
    }
}

/// Fetcher writing canned bytes per URL; unknown URLs fail like a nonzero
/// curl exit.
#[derive(Default)]
pub struct FakeFetcher {
    files: HashMap<String, Vec<u8>>,
    pub fetched: Mutex<Vec<String>>,
}

impl FakeFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn file(mut self, url: &str, bytes: impl Into<Vec<u8>>) -> Self {
        self.files.insert(url.to_string(), bytes.into());
        self
    }

    pub fn fetched(&self) -> Vec<String> {
        self.fetched.lock().unwrap().clone()
    }
}

#[async_trait]
impl FileFetcher for FakeFetcher {
    async fn fetch(&self, url: &str, destination: &Path) -> Result<(), UnitError> {
        self.fetched.lock().unwrap().push(url.to_string());
        match self.files.get(url) {
            Some(bytes) => tokio::fs::write(destination, bytes)
                .await
                .map_err(|e| UnitError::FetchFailed {
                    url: url.to_string(),
                    detail: e.to_string(),
                }),
            None => Err(UnitError::FetchFailed {
                url: url.to_string(),
                detail: "exit status: 22".into(),
            }),
        }
    }
}

/// A temp workspace with the reference list, ledger and output paths the
/// crawl uses by default, rooted in a fresh directory.
pub struct Workspace {
    pub dir: TempDir,
}

impl Workspace {
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().unwrap(),
        }
    }

    pub fn references(&self) -> PathBuf {
        self.dir.path().join("references.csv")
    }

    pub fn ledger(&self) -> PathBuf {
        self.dir.path().join("downloaded_files.csv")
    }

    pub fn output_dir(&self) -> PathBuf {
        self.dir.path().join("nedlastede_filer")
    }

    /// Write the reference list as ISO-8859-1 CSV.
    pub fn write_references(&self, rows: &[(&str, &str)]) {
        let mut text = String::from("referanse_id,referanse_url,referanse_lenketekst\n");
        for (i, (url, label)) in rows.iter().enumerate() {
            text.push_str(&format!("{},{},\"{}\"\n", i + 1, url, label));
        }
        let (bytes, _, _) = encoding_rs::WINDOWS_1252.encode(&text);
        std::fs::write(self.references(), bytes).unwrap();
    }

    pub fn config(&self) -> docharvest::CrawlConfigBuilder {
        CrawlConfig::builder()
            .references_path(self.references())
            .ledger_path(self.ledger())
            .output_dir(self.output_dir())
    }

    /// Ledger rows as written on disk, header excluded.
    pub fn ledger_rows(&self) -> Vec<(String, String)> {
        let mut reader = csv::Reader::from_path(self.ledger()).unwrap();
        let headers = reader.headers().unwrap().clone();
        assert_eq!(headers.iter().collect::<Vec<_>>(), vec!["Filename", "URL"]);
        reader
            .records()
            .map(|r| {
                let r = r.unwrap();
                (r[0].to_string(), r[1].to_string())
            })
            .collect()
    }

    pub fn output_key(&self, name: &str) -> String {
        self.output_dir().join(name).to_string_lossy().into_owned()
    }
}

/// Bytes of a minimal `.docx` whose body is one paragraph.
pub fn docx_bytes(paragraph: &str) -> Vec<u8> {
    let document = format!(
        r#"<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:body><w:p><w:r><w:t>{paragraph}</w:t></w:r></w:p></w:body></w:document>"#
    );
    let mut buf = std::io::Cursor::new(Vec::new());
    {
        let mut zip = zip::ZipWriter::new(&mut buf);
        zip.start_file("word/document.xml", zip::write::SimpleFileOptions::default())
            .unwrap();
        zip.write_all(document.as_bytes()).unwrap();
        zip.finish().unwrap();
    }
    buf.into_inner()
}

/// A rendered page whose main content links to `hrefs`.
pub fn page_with_links(title: &str, hrefs: &[&str]) -> String {
    let links: String = hrefs
        .iter()
        .map(|h| format!(r#"<li><a class="dl" href="{h}">{h}</a></li>"#))
        .collect();
    format!(
        r#"<!DOCTYPE html><html><head><title>{title}</title><script>var x = 1;</script></head><body><nav>menu</nav><div id="root"><h1>{title}</h1><ul>{links}</ul></div></body></html>"#
    )
}
