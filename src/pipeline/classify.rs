//! Content classification: does a URL designate a page or a file?
//!
//! Pages go through the browser and the HTML cleaner; files are fetched
//! directly. The decision is made from the URL string alone, with no network
//! access, so it is cheap and deterministic.

use serde::{Deserialize, Serialize};

/// Extensions treated as downloadable files when no MIME type is known.
const NON_HTML_EXTENSIONS: &[&str] = &[
    ".txt", ".pdf", ".xml", ".xsd", ".xls", ".doc", ".ppt", ".xlsx", ".docx", ".pptx",
];

/// Server-side page extensions the MIME table maps to script types.
const DYNAMIC_PAGE_EXTENSIONS: &[&str] =
    &[".php", ".asp", ".aspx", ".jsp", ".jspx", ".cfm", ".shtml"];

/// Which path a reference takes through the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ContentKind {
    /// Render in the browser, clean, and save as `.html`.
    Page,
    /// Fetch directly and normalize.
    File,
}

/// Classify `url` as a page or a file.
///
/// The MIME type is guessed from the URL's apparent extension, which takes
/// the query string into account (`download?filename=a.pdf` looks like a
/// PDF). When that yields nothing, the extension of the path alone decides.
/// Total: an unparseable URL is classified from its raw text.
pub fn classify(url: &str) -> ContentKind {
    let path = url_path(url);
    let ext = path_extension(&path);

    if DYNAMIC_PAGE_EXTENSIONS.contains(&ext.as_str()) {
        return ContentKind::Page;
    }

    let apparent_ext = path_extension(&apparent_path(url));
    let guessed = apparent_ext
        .strip_prefix('.')
        .and_then(|e| mime_guess::from_ext(e).first());

    match guessed {
        Some(mime) => {
            if is_html_mime(mime.essence_str()) {
                ContentKind::Page
            } else {
                ContentKind::File
            }
        }
        None if NON_HTML_EXTENSIONS.contains(&ext.as_str()) => ContentKind::File,
        None => ContentKind::Page,
    }
}

fn is_html_mime(essence: &str) -> bool {
    essence == "text/html" || essence == "application/xhtml+xml"
}

/// The path component of `url`, or the whole string if it does not parse.
pub(crate) fn url_path(url: &str) -> String {
    match url::Url::parse(url) {
        Ok(parsed) => parsed.path().to_string(),
        Err(_) => url.split(['?', '#']).next().unwrap_or_default().to_string(),
    }
}

/// Path plus query string, without scheme, host and fragment.
fn apparent_path(url: &str) -> String {
    match url::Url::parse(url) {
        Ok(parsed) => match parsed.query() {
            Some(q) => format!("{}?{}", parsed.path(), q),
            None => parsed.path().to_string(),
        },
        Err(_) => url.split('#').next().unwrap_or_default().to_string(),
    }
}

/// Lowercased extension of the last path segment, including the dot.
///
/// Leading dots of the segment do not start an extension (`/.well-known`
/// has none), matching the usual "split extension" rule.
pub(crate) fn path_extension(path: &str) -> String {
    let segment = path.rsplit('/').next().unwrap_or_default();
    let stem_start = segment.len() - segment.trim_start_matches('.').len();
    match segment[stem_start..].rfind('.') {
        Some(dot) => segment[stem_start + dot..].to_lowercase(),
        None => String::new(),
    }
}
