//! Link rewriting and linked-document discovery.
//!
//! Every `href` of a rendered page is rewritten to an absolute URL joined
//! against the page's origin (`scheme://host[:port]`), not the page's own
//! path. Links whose path ends in a downloadable extension become
//! [`LinkedDocument`]s that the crawler fetches next to the page.

use crate::pipeline::classify::path_extension;
use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use url::Url;

/// Extensions of linked documents that are downloaded alongside a page.
pub const DOWNLOADABLE_EXTENSIONS: &[&str] = &[".pdf", ".docx", ".pptx", ".xlsx", ".xsd"];

/// Everything except ASCII alphanumerics and `-_.~:/` is escaped in a
/// canonical URL.
const CANONICAL_ESCAPE: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~')
    .remove(b':')
    .remove(b'/');

/// A downloadable document linked from a page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkedDocument {
    /// Absolute URL as written into the cleaned page.
    pub url: String,
    /// Decoded-then-re-encoded form used as the ledger value.
    pub canonical_url: String,
    /// Percent-decoded name from the `filename` query parameter or the last
    /// path segment.
    pub candidate_filename: String,
    /// Lowercased path extension, one of [`DOWNLOADABLE_EXTENSIONS`].
    pub extension: String,
}

/// The origin of `page_url` as a base for joining, or `None` if the URL
/// cannot be parsed or has no host.
pub fn site_base(page_url: &str) -> Option<Url> {
    let parsed = Url::parse(page_url).ok()?;
    let host = parsed.host_str()?;
    let origin = match parsed.port() {
        Some(port) => format!("{}://{}:{}/", parsed.scheme(), host, port),
        None => format!("{}://{}/", parsed.scheme(), host),
    };
    Url::parse(&origin).ok()
}

/// Resolve `href` against `base`. Without a base, or when joining fails,
/// the href is returned unchanged.
pub fn absolutize(base: Option<&Url>, href: &str) -> String {
    match base.map(|b| b.join(href.trim())) {
        Some(Ok(joined)) => joined.to_string(),
        _ => href.to_string(),
    }
}

/// Return the linked document behind `absolute_url`, if its path extension
/// is downloadable.
pub fn linked_document(absolute_url: &str) -> Option<LinkedDocument> {
    let parsed = Url::parse(absolute_url).ok()?;
    let extension = path_extension(parsed.path());
    if !DOWNLOADABLE_EXTENSIONS.contains(&extension.as_str()) {
        return None;
    }
    Some(LinkedDocument {
        url: absolute_url.to_string(),
        canonical_url: canonical_url(absolute_url),
        candidate_filename: candidate_filename(&parsed),
        extension,
    })
}

/// Name a linked file: the first non-empty `filename` query parameter if
/// present, else the last path segment, percent-decoded.
///
/// The query value is decoded once more after form decoding, so names that
/// were escaped twice come out readable.
pub fn candidate_filename(url: &Url) -> String {
    let raw = url
        .query_pairs()
        .find(|(k, v)| k == "filename" && !v.is_empty())
        .map(|(_, v)| v.into_owned())
        .unwrap_or_else(|| {
            url.path()
                .rsplit('/')
                .next()
                .unwrap_or_default()
                .to_string()
        });
    percent_decode_str(&raw).decode_utf8_lossy().into_owned()
}

/// Percent-decode `url`, then re-encode everything outside
/// `A-Za-z0-9-_.~:/`.
///
/// Equal documents linked with different escaping map to the same key.
pub fn canonical_url(url: &str) -> String {
    let decoded = percent_decode_str(url).decode_utf8_lossy();
    utf8_percent_encode(&decoded, CANONICAL_ESCAPE).to_string()
}
