//! Markup cleanup for rendered pages.
//!
//! A rendered DOM carries a lot that is useless for retrieval: scripts,
//! styling, navigation chrome, images, form controls and every attribute the
//! front-end framework sprinkled on its nodes. [`clean_page`] re-serializes
//! the document without them:
//!
//! * `script, style, header, footer, nav, aside, img, button, input` are
//!   dropped together with their descendants
//! * all attributes are dropped, except `href` on `a`, which is rewritten to
//!   an absolute URL joined against the page's origin
//! * the main-content container is kept if present, else the whole document
//!
//! Links are collected from the whole cleaned document (not only the main
//! container) so linked documents in side panels are still found.

use crate::pipeline::links::{absolutize, site_base};
use scraper::{ElementRef, Html, Node, Selector};
use url::Url;

/// Elements removed together with their subtree.
pub const STRIPPED_ELEMENTS: &[&str] = &[
    "script", "style", "header", "footer", "nav", "aside", "img", "button", "input",
];

const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param", "source",
    "track", "wbr",
];

/// Result of cleaning one rendered page.
#[derive(Debug, Clone, Default)]
pub struct CleanedPage {
    /// Serialized main content (or whole document).
    pub html: String,
    /// Rewritten absolute `href` values in document order, duplicates kept.
    pub links: Vec<String>,
    /// Whether the main-content selector matched.
    pub main_content_found: bool,
}

/// Clean `raw_html` rendered from `page_url`.
pub fn clean_page(raw_html: &str, page_url: &str, main_content: &Selector) -> CleanedPage {
    let document = Html::parse_document(raw_html);
    let base = site_base(page_url);

    let mut links = Vec::new();
    let mut full = String::with_capacity(raw_html.len() / 2);
    for child in document.tree.root().children() {
        match child.value() {
            Node::Doctype(doctype) => {
                full.push_str("<!DOCTYPE ");
                full.push_str(doctype.name());
                full.push('>');
            }
            Node::Comment(comment) => push_comment(&mut full, comment),
            Node::Element(_) => {
                if let Some(element) = ElementRef::wrap(child) {
                    write_element(element, base.as_ref(), &mut full, &mut links);
                }
            }
            _ => {}
        }
    }

    let main = document.select(main_content).find(|el| !is_stripped(*el));
    match main {
        Some(element) => {
            let mut html = String::new();
            // links were already collected from the whole document
            write_element(element, base.as_ref(), &mut html, &mut Vec::new());
            CleanedPage {
                html,
                links,
                main_content_found: true,
            }
        }
        None => CleanedPage {
            html: full,
            links,
            main_content_found: false,
        },
    }
}

/// True if `element` or one of its ancestors is removed by cleaning.
fn is_stripped(element: ElementRef<'_>) -> bool {
    STRIPPED_ELEMENTS.contains(&element.value().name())
        || element.ancestors().any(|node| {
            node.value()
                .as_element()
                .is_some_and(|e| STRIPPED_ELEMENTS.contains(&e.name()))
        })
}

fn write_element(
    element: ElementRef<'_>,
    base: Option<&Url>,
    out: &mut String,
    links: &mut Vec<String>,
) {
    let name = element.value().name();
    if STRIPPED_ELEMENTS.contains(&name) {
        return;
    }

    out.push('<');
    out.push_str(name);
    if name == "a" {
        if let Some(href) = element.value().attr("href") {
            let absolute = absolutize(base, href);
            out.push_str(" href=\"");
            push_escaped(out, &absolute, true);
            out.push('"');
            links.push(absolute);
        }
    }
    out.push('>');

    if VOID_ELEMENTS.contains(&name) {
        return;
    }

    write_children(element, name == "noscript", base, out, links);

    out.push_str("</");
    out.push_str(name);
    out.push('>');
}

/// Serialize the children of `element`.
///
/// The parser runs with scripting enabled, so `<noscript>` content arrives as
/// one raw text node. That text is parsed again as a fragment so the same
/// stripping and link collection apply to it.
fn write_children(
    element: ElementRef<'_>,
    raw_text_is_markup: bool,
    base: Option<&Url>,
    out: &mut String,
    links: &mut Vec<String>,
) {
    for child in element.children() {
        match child.value() {
            Node::Text(text) if raw_text_is_markup => {
                let fragment = Html::parse_fragment(text);
                write_children(fragment.root_element(), false, base, out, links);
            }
            Node::Text(text) => push_escaped(out, text, false),
            Node::Comment(comment) => push_comment(out, comment),
            Node::Element(_) => {
                if let Some(child_element) = ElementRef::wrap(child) {
                    write_element(child_element, base, out, links);
                }
            }
            _ => {}
        }
    }
}

fn push_comment(out: &mut String, comment: &str) {
    out.push_str("<!--");
    out.push_str(comment);
    out.push_str("-->");
}

fn push_escaped(out: &mut String, text: &str, attribute: bool) {
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '\u{a0}' => out.push_str("&nbsp;"),
            '"' if attribute => out.push_str("&quot;"),
            '<' if !attribute => out.push_str("&lt;"),
            '>' if !attribute => out.push_str("&gt;"),
            _ => out.push(c),
        }
    }
}
