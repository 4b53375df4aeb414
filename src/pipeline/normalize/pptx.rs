//! `.pptx` to plain text.

use super::{read_part, read_relationships, xml_error, ConvertError};
use quick_xml::escape::unescape;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader as XmlReader;
use std::fs::File;
use std::io::{BufReader, Read, Seek};
use std::path::Path;
use zip::ZipArchive;

const PRESENTATION_PART: &str = "ppt/presentation.xml";
const PRESENTATION_RELS_PART: &str = "ppt/_rels/presentation.xml.rels";
const SLIDE_PREFIX: &str = "ppt/slides/slide";

/// Convert the presentation at `path` to text.
///
/// Output per slide, in presentation order:
///
/// ```text
/// Slide 1
/// <text of shape 1>
/// <text of shape 2>
///
/// Slide 2
/// ...
/// ```
///
/// Only shapes with a text body contribute; shapes whose text is empty are
/// skipped. Paragraphs inside a shape are separated by newlines.
pub fn pptx_to_text(path: &Path) -> Result<String, ConvertError> {
    let mut archive = ZipArchive::new(BufReader::new(File::open(path)?))?;
    let slides = slide_parts(&mut archive)?;

    let mut out = String::new();
    for (index, part) in slides.iter().enumerate() {
        let xml = read_part(&mut archive, part)?
            .ok_or_else(|| ConvertError::MissingPart(part.clone()))?;
        out.push_str(&format!("Slide {}\n", index + 1));
        for text in shape_texts(&xml, part)? {
            out.push_str(&text);
            out.push('\n');
        }
        out.push('\n');
    }
    Ok(out)
}

/// Slide part names in presentation order.
///
/// The order comes from `p:sldIdLst` resolved through the presentation's
/// relationships. Packages without that information fall back to the
/// numeric order of `ppt/slides/slideN.xml`.
fn slide_parts<R: Read + Seek>(archive: &mut ZipArchive<R>) -> Result<Vec<String>, ConvertError> {
    let presentation = read_part(archive, PRESENTATION_PART)?;
    let rels = read_part(archive, PRESENTATION_RELS_PART)?;

    if let (Some(presentation), Some(rels)) = (presentation, rels) {
        let rels = read_relationships(&rels, PRESENTATION_RELS_PART)?;
        let ordered: Vec<String> = slide_ids(&presentation)?
            .into_iter()
            .filter_map(|id| rels.get(&id))
            .map(|target| resolve_target(target))
            .collect();
        if !ordered.is_empty() {
            return Ok(ordered);
        }
    }

    let mut numbered: Vec<(u32, String)> = archive
        .file_names()
        .filter_map(|name| {
            let n = name.strip_prefix(SLIDE_PREFIX)?.strip_suffix(".xml")?.parse().ok()?;
            Some((n, name.to_string()))
        })
        .collect();
    numbered.sort();
    Ok(numbered.into_iter().map(|(_, name)| name).collect())
}

/// Relationship ids of `p:sldId` entries, in document order.
fn slide_ids(xml: &[u8]) -> Result<Vec<String>, ConvertError> {
    let mut reader = XmlReader::from_reader(xml);
    let mut buf = Vec::new();
    let mut ids = Vec::new();
    loop {
        match reader
            .read_event_into(&mut buf)
            .map_err(|e| xml_error(PRESENTATION_PART, e))?
        {
            Event::Start(ref e) | Event::Empty(ref e) if e.local_name().as_ref() == b"sldId" => {
                if let Some(id) = relationship_id(e) {
                    ids.push(id);
                }
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }
    Ok(ids)
}

/// The namespaced `r:id` attribute; `p:sldId` also has a plain numeric `id`.
fn relationship_id(element: &BytesStart<'_>) -> Option<String> {
    element
        .attributes()
        .with_checks(false)
        .filter_map(Result::ok)
        .find(|a| a.key.prefix().is_some() && a.key.local_name().as_ref() == b"id")
        .and_then(|a| {
            let raw = String::from_utf8_lossy(&a.value);
            unescape(&raw).ok().map(|v| v.into_owned())
        })
}

/// Resolve a relationship target relative to `ppt/`.
fn resolve_target(target: &str) -> String {
    match target.strip_prefix('/') {
        Some(absolute) => absolute.to_string(),
        None => format!("ppt/{}", target.trim_start_matches("./")),
    }
}

/// Text of every text-bearing shape on a slide, in document order.
fn shape_texts(xml: &[u8], part: &str) -> Result<Vec<String>, ConvertError> {
    let mut reader = XmlReader::from_reader(xml);
    let mut buf = Vec::new();
    let mut texts = Vec::new();

    let mut in_shape = false;
    let mut in_text_body = false;
    let mut in_text = false;
    let mut paragraphs: Vec<String> = Vec::new();
    let mut current = String::new();

    loop {
        let event = reader.read_event_into(&mut buf).map_err(|e| xml_error(part, e))?;
        match event {
            Event::Start(ref e) => match e.local_name().as_ref() {
                b"sp" => {
                    in_shape = true;
                    paragraphs.clear();
                }
                b"txBody" if in_shape => in_text_body = true,
                b"p" if in_text_body => current.clear(),
                b"t" if in_text_body => in_text = true,
                _ => {}
            },
            Event::Empty(ref e) => {
                if in_text_body && e.local_name().as_ref() == b"br" {
                    current.push('\n');
                }
            }
            Event::Text(ref t) if in_text => {
                let text = t.unescape().map_err(|e| xml_error(part, e))?;
                current.push_str(&text);
            }
            Event::End(ref e) => match e.local_name().as_ref() {
                b"t" => in_text = false,
                b"p" if in_text_body => paragraphs.push(std::mem::take(&mut current)),
                b"txBody" => in_text_body = false,
                b"sp" => {
                    in_shape = false;
                    let text = paragraphs.join("\n");
                    if !text.trim().is_empty() {
                        texts.push(text);
                    }
                    paragraphs.clear();
                }
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }
    Ok(texts)
}
