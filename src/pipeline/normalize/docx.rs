//! `.docx` to HTML.
//!
//! Produces an HTML fragment (no `<html>`/`<body>` wrapper) that keeps the
//! document's structure: headings from heading and title styles, `<p>`
//! paragraphs, bold and italic runs, line breaks, hyperlinks, nested
//! bullet/numbered lists and tables. Empty paragraphs are dropped. Styles
//! are resolved through `styles.xml`, so localized style ids such as
//! `Overskrift1` still map to headings.

use super::{attr, read_part, read_relationships, xml_error, ConvertError};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader as XmlReader;
use std::collections::HashMap;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use zip::ZipArchive;

const DOCUMENT_PART: &str = "word/document.xml";
const DOCUMENT_RELS_PART: &str = "word/_rels/document.xml.rels";
const STYLES_PART: &str = "word/styles.xml";
const NUMBERING_PART: &str = "word/numbering.xml";

/// Convert the `.docx` at `path` to an HTML fragment.
pub fn docx_to_html(path: &Path) -> Result<String, ConvertError> {
    let mut archive = ZipArchive::new(BufReader::new(File::open(path)?))?;

    let document = read_part(&mut archive, DOCUMENT_PART)?
        .ok_or_else(|| ConvertError::MissingPart(DOCUMENT_PART.into()))?;
    let links = match read_part(&mut archive, DOCUMENT_RELS_PART)? {
        Some(xml) => read_relationships(&xml, DOCUMENT_RELS_PART)?,
        None => HashMap::new(),
    };
    let style_names = match read_part(&mut archive, STYLES_PART)? {
        Some(xml) => read_style_names(&xml)?,
        None => HashMap::new(),
    };
    let numbering = match read_part(&mut archive, NUMBERING_PART)? {
        Some(xml) => Numbering::parse(&xml)?,
        None => Numbering::default(),
    };

    let context = DocumentContext {
        links,
        style_names,
        numbering,
    };
    let blocks = BodyParser::new(&context).parse(&document)?;

    let mut html = String::new();
    render_blocks(&blocks, &mut html);
    Ok(html)
}

// ── Document model ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
enum Block {
    Paragraph { kind: ParagraphKind, html: String },
    Table(Vec<Vec<Vec<Block>>>),
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum ParagraphKind {
    Normal,
    Heading(u8),
    ListItem { ordered: bool, level: usize },
}

struct DocumentContext {
    /// Relationship id -> target, for hyperlinks.
    links: HashMap<String, String>,
    /// Style id -> display name.
    style_names: HashMap<String, String>,
    numbering: Numbering,
}

impl DocumentContext {
    fn heading_level(&self, style_id: &str) -> Option<u8> {
        let name = self
            .style_names
            .get(style_id)
            .map(String::as_str)
            .unwrap_or(style_id)
            .to_ascii_lowercase();
        if name == "title" {
            return Some(1);
        }
        let level: u8 = name.strip_prefix("heading")?.trim().parse().ok()?;
        (1..=6).contains(&level).then_some(level)
    }
}

/// List formats from `numbering.xml`.
#[derive(Debug, Default)]
struct Numbering {
    /// numId -> abstractNumId
    instances: HashMap<String, String>,
    /// (abstractNumId, ilvl) -> numFmt
    formats: HashMap<(String, usize), String>,
}

impl Numbering {
    fn parse(xml: &[u8]) -> Result<Self, ConvertError> {
        let mut reader = XmlReader::from_reader(xml);
        let mut buf = Vec::new();
        let mut numbering = Self::default();

        let mut abstract_id: Option<String> = None;
        let mut level: Option<usize> = None;
        let mut num_id: Option<String> = None;

        loop {
            let event = reader
                .read_event_into(&mut buf)
                .map_err(|e| xml_error(NUMBERING_PART, e))?;
            match event {
                Event::Start(ref e) | Event::Empty(ref e) => match e.local_name().as_ref() {
                    b"abstractNum" => abstract_id = attr(e, b"abstractNumId"),
                    b"lvl" => level = attr(e, b"ilvl").and_then(|v| v.parse().ok()),
                    b"numFmt" => {
                        if let (Some(a), Some(l), Some(fmt)) = (&abstract_id, level, attr(e, b"val")) {
                            numbering.formats.insert((a.clone(), l), fmt);
                        }
                    }
                    b"num" => num_id = attr(e, b"numId"),
                    b"abstractNumId" => {
                        if let (Some(n), Some(a)) = (&num_id, attr(e, b"val")) {
                            numbering.instances.insert(n.clone(), a);
                        }
                    }
                    _ => {}
                },
                Event::End(ref e) => match e.local_name().as_ref() {
                    b"abstractNum" => abstract_id = None,
                    b"lvl" => level = None,
                    b"num" => num_id = None,
                    _ => {}
                },
                Event::Eof => break,
                _ => {}
            }
            buf.clear();
        }
        Ok(numbering)
    }

    /// Numbered (`<ol>`) unless the level's format is a bullet or unknown.
    fn is_ordered(&self, num_id: &str, level: usize) -> bool {
        self.instances
            .get(num_id)
            .and_then(|a| self.formats.get(&(a.clone(), level)))
            .is_some_and(|fmt| fmt != "bullet" && fmt != "none")
    }
}

fn read_style_names(xml: &[u8]) -> Result<HashMap<String, String>, ConvertError> {
    let mut reader = XmlReader::from_reader(xml);
    let mut buf = Vec::new();
    let mut names = HashMap::new();
    let mut current: Option<String> = None;

    loop {
        let event = reader
            .read_event_into(&mut buf)
            .map_err(|e| xml_error(STYLES_PART, e))?;
        match event {
            Event::Start(ref e) | Event::Empty(ref e) => match e.local_name().as_ref() {
                b"style" => current = attr(e, b"styleId"),
                b"name" => {
                    if let (Some(id), Some(name)) = (&current, attr(e, b"val")) {
                        names.insert(id.clone(), name);
                    }
                }
                _ => {}
            },
            Event::End(ref e) if e.local_name().as_ref() == b"style" => current = None,
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }
    Ok(names)
}

// ── Body parsing ────────────────────────────────────────────────────────────

#[derive(Default)]
struct ParagraphBuilder {
    style: Option<String>,
    num_id: Option<String>,
    level: usize,
    html: String,
}

#[derive(Default)]
struct RunBuilder {
    bold: bool,
    italic: bool,
    html: String,
}

type Table = Vec<Vec<Vec<Block>>>;

struct BodyParser<'a> {
    context: &'a DocumentContext,
    body: Vec<Block>,
    tables: Vec<Table>,
    paragraphs: Vec<ParagraphBuilder>,
    run: Option<RunBuilder>,
    // one entry per open w:hyperlink: whether an <a> was emitted for it
    hyperlinks: Vec<bool>,
    in_paragraph_props: bool,
    in_run_props: bool,
    in_text: bool,
    // depth inside an mc:Fallback subtree, whose content duplicates mc:Choice
    skip_depth: usize,
}

impl<'a> BodyParser<'a> {
    fn new(context: &'a DocumentContext) -> Self {
        Self {
            context,
            body: Vec::new(),
            tables: Vec::new(),
            paragraphs: Vec::new(),
            run: None,
            hyperlinks: Vec::new(),
            in_paragraph_props: false,
            in_run_props: false,
            in_text: false,
            skip_depth: 0,
        }
    }

    fn parse(mut self, xml: &[u8]) -> Result<Vec<Block>, ConvertError> {
        let mut reader = XmlReader::from_reader(xml);
        let mut buf = Vec::new();

        loop {
            let event = reader
                .read_event_into(&mut buf)
                .map_err(|e| xml_error(DOCUMENT_PART, e))?;

            if self.skip_depth > 0 {
                match event {
                    Event::Start(_) => self.skip_depth += 1,
                    Event::End(_) => self.skip_depth -= 1,
                    Event::Eof => break,
                    _ => {}
                }
                buf.clear();
                continue;
            }

            match event {
                Event::Start(ref e) => self.start(e),
                Event::Empty(ref e) => self.empty(e),
                Event::Text(ref t) if self.in_text => {
                    let text = t.unescape().map_err(|e| xml_error(DOCUMENT_PART, e))?;
                    if let Some(run) = self.run.as_mut() {
                        push_escaped(&mut run.html, &text);
                    }
                }
                Event::End(ref e) => self.end(e.local_name().as_ref()),
                Event::Eof => break,
                _ => {}
            }
            buf.clear();
        }

        Ok(self.body)
    }

    fn start(&mut self, e: &BytesStart<'_>) {
        match e.local_name().as_ref() {
            b"Fallback" => self.skip_depth = 1,
            b"p" => self.paragraphs.push(ParagraphBuilder::default()),
            b"pPr" => self.in_paragraph_props = true,
            b"rPr" if self.run.is_some() => self.in_run_props = true,
            b"r" => self.run = Some(RunBuilder::default()),
            b"t" if self.run.is_some() => self.in_text = true,
            b"hyperlink" => self.open_hyperlink(e),
            b"tbl" => self.tables.push(Vec::new()),
            b"tr" => {
                if let Some(table) = self.tables.last_mut() {
                    table.push(Vec::new());
                }
            }
            b"tc" => {
                if let Some(row) = self.tables.last_mut().and_then(|t| t.last_mut()) {
                    row.push(Vec::new());
                }
            }
            _ => self.property(e),
        }
    }

    fn empty(&mut self, e: &BytesStart<'_>) {
        match e.local_name().as_ref() {
            b"br" => {
                let kind = attr(e, b"type");
                if matches!(kind.as_deref(), None | Some("textWrapping")) {
                    self.push_run_html("<br />");
                }
            }
            b"cr" => self.push_run_html("<br />"),
            b"tab" if !self.in_run_props && !self.in_paragraph_props => self.push_run_html("\t"),
            _ => self.property(e),
        }
    }

    fn end(&mut self, local: &[u8]) {
        match local {
            b"t" => self.in_text = false,
            b"pPr" => self.in_paragraph_props = false,
            b"rPr" => self.in_run_props = false,
            b"r" => self.close_run(),
            b"hyperlink" => {
                if self.hyperlinks.pop() == Some(true) {
                    self.push_paragraph_html("</a>");
                }
            }
            b"p" => self.close_paragraph(),
            b"tbl" => {
                if let Some(table) = self.tables.pop() {
                    self.push_block(Block::Table(table));
                }
            }
            _ => {}
        }
    }

    /// Paragraph and run properties, which may come as start or empty tags.
    fn property(&mut self, e: &BytesStart<'_>) {
        let local = e.local_name();
        if self.in_paragraph_props && !self.in_run_props {
            if let Some(paragraph) = self.paragraphs.last_mut() {
                match local.as_ref() {
                    b"pStyle" => paragraph.style = attr(e, b"val"),
                    b"numId" => paragraph.num_id = attr(e, b"val"),
                    b"ilvl" => {
                        paragraph.level = attr(e, b"val").and_then(|v| v.parse().ok()).unwrap_or(0)
                    }
                    _ => {}
                }
            }
        } else if self.in_run_props {
            if let Some(run) = self.run.as_mut() {
                match local.as_ref() {
                    b"b" => run.bold = toggle_is_on(e),
                    b"i" => run.italic = toggle_is_on(e),
                    _ => {}
                }
            }
        }
    }

    fn open_hyperlink(&mut self, e: &BytesStart<'_>) {
        let href = attr(e, b"id")
            .and_then(|id| self.context.links.get(&id).cloned())
            .or_else(|| attr(e, b"anchor").map(|a| format!("#{a}")));
        match href {
            Some(href) => {
                let mut tag = String::from("<a href=\"");
                push_escaped_attr(&mut tag, &href);
                tag.push_str("\">");
                self.push_paragraph_html(&tag);
                self.hyperlinks.push(true);
            }
            None => self.hyperlinks.push(false),
        }
    }

    fn push_run_html(&mut self, html: &str) {
        if let Some(run) = self.run.as_mut() {
            run.html.push_str(html);
        }
    }

    fn push_paragraph_html(&mut self, html: &str) {
        if let Some(paragraph) = self.paragraphs.last_mut() {
            paragraph.html.push_str(html);
        }
    }

    fn close_run(&mut self) {
        self.in_run_props = false;
        self.in_text = false;
        let Some(run) = self.run.take() else {
            return;
        };
        if run.html.is_empty() {
            return;
        }
        let mut html = run.html;
        if run.italic {
            html = format!("<em>{html}</em>");
        }
        if run.bold {
            html = format!("<strong>{html}</strong>");
        }
        self.push_paragraph_html(&html);
    }

    fn close_paragraph(&mut self) {
        self.in_paragraph_props = false;
        let Some(paragraph) = self.paragraphs.pop() else {
            return;
        };
        if paragraph.html.trim().is_empty() {
            return;
        }

        let heading = paragraph
            .style
            .as_deref()
            .and_then(|s| self.context.heading_level(s));
        let kind = match (heading, paragraph.num_id.as_deref()) {
            (Some(level), _) => ParagraphKind::Heading(level),
            (None, Some(num_id)) if num_id != "0" => ParagraphKind::ListItem {
                ordered: self.context.numbering.is_ordered(num_id, paragraph.level),
                level: paragraph.level,
            },
            _ => ParagraphKind::Normal,
        };

        self.push_block(Block::Paragraph {
            kind,
            html: paragraph.html,
        });
    }

    fn push_block(&mut self, block: Block) {
        match self
            .tables
            .last_mut()
            .and_then(|t| t.last_mut())
            .and_then(|r| r.last_mut())
        {
            Some(cell) => cell.push(block),
            None => self.body.push(block),
        }
    }
}

/// `<w:b/>` is on; `w:val` of `0`, `false` or `off` turns it off.
fn toggle_is_on(e: &BytesStart<'_>) -> bool {
    !matches!(attr(e, b"val").as_deref(), Some("0" | "false" | "off"))
}

// ── Rendering ───────────────────────────────────────────────────────────────

fn render_blocks(blocks: &[Block], out: &mut String) {
    // one entry per open list: true for <ol>
    let mut lists: Vec<bool> = Vec::new();

    for block in blocks {
        match block {
            Block::Paragraph {
                kind: ParagraphKind::ListItem { ordered, level },
                html,
            } => {
                open_list_item(&mut lists, *ordered, level + 1, out);
                out.push_str(html);
            }
            Block::Paragraph { kind, html } => {
                close_lists(&mut lists, out);
                match kind {
                    ParagraphKind::Heading(n) => {
                        out.push_str(&format!("<h{n}>{html}</h{n}>"));
                    }
                    _ => {
                        out.push_str("<p>");
                        out.push_str(html);
                        out.push_str("</p>");
                    }
                }
            }
            Block::Table(rows) => {
                close_lists(&mut lists, out);
                out.push_str("<table>");
                for row in rows {
                    out.push_str("<tr>");
                    for cell in row {
                        out.push_str("<td>");
                        render_blocks(cell, out);
                        out.push_str("</td>");
                    }
                    out.push_str("</tr>");
                }
                out.push_str("</table>");
            }
        }
    }
    close_lists(&mut lists, out);
}

fn list_tag(ordered: bool) -> &'static str {
    if ordered {
        "ol"
    } else {
        "ul"
    }
}

/// Open a `<li>` at `depth` (1-based), closing or opening lists as needed.
fn open_list_item(lists: &mut Vec<bool>, ordered: bool, depth: usize, out: &mut String) {
    while lists.len() > depth {
        close_one_list(lists, out);
    }
    if lists.len() == depth {
        out.push_str("</li>");
    }
    while lists.len() < depth {
        out.push('<');
        out.push_str(list_tag(ordered));
        out.push('>');
        lists.push(ordered);
        if lists.len() < depth {
            out.push_str("<li>");
        }
    }
    out.push_str("<li>");
}

fn close_one_list(lists: &mut Vec<bool>, out: &mut String) {
    if let Some(ordered) = lists.pop() {
        out.push_str("</li></");
        out.push_str(list_tag(ordered));
        out.push('>');
    }
}

fn close_lists(lists: &mut Vec<bool>, out: &mut String) {
    while !lists.is_empty() {
        close_one_list(lists, out);
    }
}

fn push_escaped(out: &mut String, text: &str) {
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(c),
        }
    }
}

fn push_escaped_attr(out: &mut String, value: &str) {
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '"' => out.push_str("&quot;"),
            '<' => out.push_str("&lt;"),
            _ => out.push(c),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::normalize::tests::write_package;
    use tempfile::TempDir;

    const W: &str = r#"xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships""#;

    fn document(body: &str) -> String {
        format!(r#"<?xml version="1.0" encoding="UTF-8"?><w:document {W}><w:body>{body}</w:body></w:document>"#)
    }

    fn convert(parts: &[(&str, &str)]) -> String {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("doc.docx");
        write_package(&path, parts);
        docx_to_html(&path).unwrap()
    }

    fn convert_body(body: &str) -> String {
        convert(&[("word/document.xml", &document(body))])
    }

    #[test]
    fn paragraphs_and_runs() {
        let html = convert_body(
            r#"<w:p><w:r><w:t xml:space="preserve">Plain </w:t></w:r><w:r><w:rPr><w:b/></w:rPr><w:t>bold</w:t></w:r><w:r><w:rPr><w:i/><w:b w:val="0"/></w:rPr><w:t> italic</w:t></w:r></w:p>"#,
        );
        assert_eq!(html, "<p>Plain <strong>bold</strong><em> italic</em></p>");
    }

    #[test]
    fn empty_paragraphs_are_dropped() {
        let html = convert_body(
            r#"<w:p/><w:p><w:pPr><w:pStyle w:val="Normal"/></w:pPr></w:p><w:p><w:r><w:t>x</w:t></w:r></w:p>"#,
        );
        assert_eq!(html, "<p>x</p>");
    }

    #[test]
    fn text_is_escaped_and_breaks_kept() {
        let html = convert_body(
            r#"<w:p><w:r><w:t>a &lt; b &amp; c</w:t><w:br/><w:t>next</w:t><w:br w:type="page"/></w:r></w:p>"#,
        );
        assert_eq!(html, "<p>a &lt; b &amp; c<br />next</p>");
    }

    #[test]
    fn headings_resolve_through_styles() {
        let styles = format!(
            r#"<w:styles {W}><w:style w:type="paragraph" w:styleId="Overskrift1"><w:name w:val="heading 1"/></w:style><w:style w:type="paragraph" w:styleId="Tittel"><w:name w:val="Title"/></w:style></w:styles>"#
        );
        let body = r#"<w:p><w:pPr><w:pStyle w:val="Tittel"/></w:pPr><w:r><w:t>Doc</w:t></w:r></w:p><w:p><w:pPr><w:pStyle w:val="Overskrift1"/></w:pPr><w:r><w:t>Intro</w:t></w:r></w:p><w:p><w:pPr><w:pStyle w:val="Heading3"/></w:pPr><w:r><w:t>Deep</w:t></w:r></w:p>"#;
        let html = convert(&[
            ("word/document.xml", &document(body)),
            ("word/styles.xml", &styles),
        ]);
        assert_eq!(html, "<h1>Doc</h1><h1>Intro</h1><h3>Deep</h3>");
    }

    #[test]
    fn hyperlinks_use_relationships() {
        let rels = r#"<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId9" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/hyperlink" Target="https://example.org/a?x=1&amp;y=2" TargetMode="External"/></Relationships>"#;
        let body = r#"<w:p><w:r><w:t xml:space="preserve">See </w:t></w:r><w:hyperlink r:id="rId9"><w:r><w:t>this</w:t></w:r></w:hyperlink><w:hyperlink w:anchor="sec2"><w:r><w:t>, below</w:t></w:r></w:hyperlink></w:p>"#;
        let html = convert(&[
            ("word/document.xml", &document(body)),
            ("word/_rels/document.xml.rels", rels),
        ]);
        assert_eq!(
            html,
            r##"<p>See <a href="https://example.org/a?x=1&amp;y=2">this</a><a href="#sec2">, below</a></p>"##
        );
    }

    #[test]
    fn lists_nest_and_use_numbering_formats() {
        let numbering = format!(
            r#"<w:numbering {W}><w:abstractNum w:abstractNumId="0"><w:lvl w:ilvl="0"><w:numFmt w:val="bullet"/></w:lvl><w:lvl w:ilvl="1"><w:numFmt w:val="decimal"/></w:lvl></w:abstractNum><w:num w:numId="1"><w:abstractNumId w:val="0"/></w:num></w:numbering>"#
        );
        let item = |level: usize, text: &str| {
            format!(
                r#"<w:p><w:pPr><w:numPr><w:ilvl w:val="{level}"/><w:numId w:val="1"/></w:numPr></w:pPr><w:r><w:t>{text}</w:t></w:r></w:p>"#
            )
        };
        let body = format!(
            "{}{}{}{}<w:p><w:r><w:t>after</w:t></w:r></w:p>",
            item(0, "a"),
            item(1, "a1"),
            item(1, "a2"),
            item(0, "b")
        );
        let html = convert(&[
            ("word/document.xml", &document(&body)),
            ("word/numbering.xml", &numbering),
        ]);
        assert_eq!(
            html,
            "<ul><li>a<ol><li>a1</li><li>a2</li></ol></li><li>b</li></ul><p>after</p>"
        );
    }

    #[test]
    fn unknown_numbering_is_a_bullet_list() {
        let body = r#"<w:p><w:pPr><w:numPr><w:ilvl w:val="0"/><w:numId w:val="7"/></w:numPr></w:pPr><w:r><w:t>x</w:t></w:r></w:p><w:p><w:pPr><w:numPr><w:numId w:val="0"/></w:numPr></w:pPr><w:r><w:t>not a list</w:t></w:r></w:p>"#;
        assert_eq!(convert_body(body), "<ul><li>x</li></ul><p>not a list</p>");
    }

    #[test]
    fn tables_become_html_tables() {
        let body = r#"<w:tbl><w:tblPr/><w:tr><w:tc><w:tcPr/><w:p><w:r><w:t>A1</w:t></w:r></w:p></w:tc><w:tc><w:p><w:r><w:t>B1</w:t></w:r></w:p></w:tc></w:tr><w:tr><w:tc><w:p/></w:tc><w:tc><w:p><w:r><w:t>B2</w:t></w:r></w:p><w:p><w:r><w:t>more</w:t></w:r></w:p></w:tc></w:tr></w:tbl><w:p><w:r><w:t>end</w:t></w:r></w:p>"#;
        assert_eq!(
            convert_body(body),
            "<table><tr><td><p>A1</p></td><td><p>B1</p></td></tr><tr><td></td><td><p>B2</p><p>more</p></td></tr></table><p>end</p>"
        );
    }

    #[test]
    fn fallback_content_is_not_duplicated() {
        let body = r#"<w:p><w:r><mc:AlternateContent xmlns:mc="http://schemas.openxmlformats.org/markup-compatibility/2006"><mc:Choice Requires="wps"><w:t>once</w:t></mc:Choice><mc:Fallback><w:t>twice</w:t></mc:Fallback></mc:AlternateContent></w:r></w:p>"#;
        assert_eq!(convert_body(body), "<p>once</p>");
    }

    #[test]
    fn missing_document_part_is_an_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("empty.docx");
        write_package(&path, &[("[Content_Types].xml", "<Types/>")]);
        let err = docx_to_html(&path).unwrap_err();
        assert!(matches!(err, ConvertError::MissingPart(_)));
    }
}
