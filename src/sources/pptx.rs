//! Presentation slides from a `.pptx` container.
//!
//! A PPTX file is a ZIP archive of Open XML parts:
//! - `ppt/slides/slideN.xml` holds the shapes of slide N
//! - `ppt/slides/_rels/slideN.xml.rels` maps relationship ids to parts
//! - `ppt/media/*` holds the embedded pictures
//! - `ppt/presentation.xml` lists the slides in display order
//!
//! Text comes from the `a:t` runs of each `a:p` paragraph. Pictures are
//! `a:blip` elements whose `r:embed` id is resolved through the slide's
//! relationships to a media part.

use crate::capability::DocumentSource;
use crate::document::{Document, ImageBytes, MemoryUnit, UnitKind};
use crate::error::{ExtractionError, ScribeError};
use crate::pipeline::input::read_zip_entry;
use async_trait::async_trait;
use quick_xml::events::Event;
use quick_xml::Reader;
use std::collections::HashMap;
use std::io::Cursor;
use tracing::{debug, info, warn};
use zip::ZipArchive;

const SLIDE_PREFIX: &str = "ppt/slides/slide";
const PRESENTATION_PART: &str = "ppt/presentation.xml";

/// Opens `.pptx` presentations.
#[derive(Debug, Clone, Default)]
pub struct PptxSource {
    name: String,
}

impl PptxSource {
    /// `name` is only used in error messages.
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

#[async_trait]
impl DocumentSource for PptxSource {
    async fn open(&self, bytes: Vec<u8>) -> Result<Document, ScribeError> {
        let name = self.name.clone();
        tokio::task::spawn_blocking(move || open_blocking(&bytes, &name))
            .await
            .map_err(|e| ScribeError::Internal(format!("PPTX open task panicked: {}", e)))?
    }
}

fn open_blocking(bytes: &[u8], name: &str) -> Result<Document, ScribeError> {
    let mut archive =
        ZipArchive::new(Cursor::new(bytes)).map_err(|e| ScribeError::CorruptDocument {
            name: name.to_string(),
            detail: e.to_string(),
        })?;

    let slides = slide_parts(&mut archive);
    info!("Presentation loaded: {} slides", slides.len());

    let units = slides
        .iter()
        .enumerate()
        .map(|(i, part)| read_slide(&mut archive, i + 1, part))
        .collect();

    Ok(Document::from_memory(UnitKind::Slide, units))
}

/// Slide part paths in presentation order.
///
/// The order is the `p:sldIdLst` of `ppt/presentation.xml`, which is what a
/// viewer shows after slides have been moved around. Part numbers only
/// decide the order when that list is missing or empty.
fn slide_parts(archive: &mut ZipArchive<Cursor<&[u8]>>) -> Vec<String> {
    match listed_slide_parts(archive) {
        Ok(parts) if !parts.is_empty() => parts,
        Ok(_) => {
            debug!("Presentation lists no slides, using part numbers");
            numbered_slide_parts(archive)
        }
        Err(detail) => {
            debug!("No usable slide list ({}), using part numbers", detail);
            numbered_slide_parts(archive)
        }
    }
}

fn listed_slide_parts(archive: &mut ZipArchive<Cursor<&[u8]>>) -> Result<Vec<String>, String> {
    let ids = read_zip_entry(archive, PRESENTATION_PART).and_then(|xml| parse_slide_id_list(&xml))?;
    if ids.is_empty() {
        return Ok(Vec::new());
    }

    let rels = read_zip_entry(archive, &rels_path_for(PRESENTATION_PART))
        .and_then(|xml| parse_relationships(&xml))?;
    let (base_dir, _) = split_part_path(PRESENTATION_PART);

    ids.iter()
        .map(|id| {
            rels.get(id)
                .map(|target| resolve_part_path(base_dir, target))
                .ok_or_else(|| format!("slide relationship {} not found", id))
        })
        .collect()
}

/// Slide parts ordered by the number N in `ppt/slides/slideN.xml`.
fn numbered_slide_parts(archive: &ZipArchive<Cursor<&[u8]>>) -> Vec<String> {
    let mut numbers: Vec<usize> = archive
        .file_names()
        .filter_map(|n| n.strip_prefix(SLIDE_PREFIX)?.strip_suffix(".xml")?.parse().ok())
        .collect();
    numbers.sort_unstable();
    numbers.dedup();
    numbers
        .into_iter()
        .map(|n| format!("{}{}.xml", SLIDE_PREFIX, n))
        .collect()
}

/// Relationship ids (`r:id`) of the `p:sldId` entries, in list order.
fn parse_slide_id_list(xml: &[u8]) -> Result<Vec<String>, String> {
    let mut reader = Reader::from_reader(xml);
    let mut buf = Vec::new();
    let mut ids = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Empty(ref e)) | Ok(Event::Start(ref e))
                if e.local_name().as_ref() == b"sldId" =>
            {
                // `id` is the numeric slide id; the prefixed `r:id` is the
                // relationship to the slide part.
                let rel = e.attributes().flatten().find(|a| {
                    a.key.prefix().is_some() && a.key.local_name().as_ref() == b"id"
                });
                if let Some(attr) = rel {
                    ids.push(String::from_utf8_lossy(&attr.value).into_owned());
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(format!("malformed presentation XML: {}", e)),
            _ => {}
        }
        buf.clear();
    }

    Ok(ids)
}

/// Read slide part `part` as unit `index`.
fn read_slide(archive: &mut ZipArchive<Cursor<&[u8]>>, index: usize, part: &str) -> MemoryUnit {
    let parsed = read_zip_entry(archive, part).and_then(|xml| parse_slide_xml(&xml));
    let (paragraphs, embeds) = match parsed {
        Ok(p) => p,
        Err(detail) => {
            return MemoryUnit::from_parts(
                index,
                Err(ExtractionError::text(detail.clone())),
                Err(ExtractionError::images(detail)),
            )
        }
    };

    debug!(
        "Slide {} ({}): {} paragraphs, {} pictures",
        index,
        part,
        paragraphs.len(),
        embeds.len()
    );

    if embeds.is_empty() {
        return MemoryUnit::from_parts(index, Ok(paragraphs), Ok(Vec::new()));
    }

    match resolve_images(archive, part, &embeds) {
        Ok((images, missing)) => MemoryUnit::from_parts(index, Ok(paragraphs), Ok(images))
            .with_image_errors(missing),
        Err(detail) => MemoryUnit::from_parts(
            index,
            Ok(paragraphs),
            Err(ExtractionError::images(detail)),
        ),
    }
}

/// Paragraph texts and picture relationship ids, both in document order.
fn parse_slide_xml(xml: &[u8]) -> Result<(Vec<String>, Vec<String>), String> {
    let mut reader = Reader::from_reader(xml);
    let mut buf = Vec::new();

    let mut paragraphs = Vec::new();
    let mut embeds = Vec::new();
    let mut current = String::new();
    let mut in_text = false;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => match e.local_name().as_ref() {
                b"p" => current.clear(),
                b"t" => in_text = true,
                b"blip" => embeds.extend(blip_embed(e)),
                _ => {}
            },
            Ok(Event::Empty(ref e)) => {
                if e.local_name().as_ref() == b"blip" {
                    embeds.extend(blip_embed(e));
                }
            }
            Ok(Event::End(ref e)) => match e.local_name().as_ref() {
                b"t" => in_text = false,
                b"p" => {
                    if !current.is_empty() {
                        paragraphs.push(std::mem::take(&mut current));
                    }
                }
                _ => {}
            },
            Ok(Event::Text(e)) if in_text => {
                let text = e.unescape().map_err(|e| e.to_string())?;
                current.push_str(&text);
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(format!(
                    "malformed slide XML at byte {}: {}",
                    reader.buffer_position(),
                    e
                ))
            }
            _ => {}
        }
        buf.clear();
    }

    Ok((paragraphs, embeds))
}

fn blip_embed(e: &quick_xml::events::BytesStart<'_>) -> Option<String> {
    e.attributes()
        .flatten()
        .find(|a| a.key.local_name().as_ref() == b"embed")
        .map(|a| String::from_utf8_lossy(&a.value).into_owned())
}

/// Resolve relationship ids to media bytes, in the order given.
///
/// Only an unreadable relationships part fails the whole list. A picture
/// whose media part is missing is reported on its own and its siblings kept.
fn resolve_images(
    archive: &mut ZipArchive<Cursor<&[u8]>>,
    part: &str,
    embeds: &[String],
) -> Result<(Vec<ImageBytes>, Vec<ExtractionError>), String> {
    let rels_path = rels_path_for(part);
    let rels = read_zip_entry(archive, &rels_path).and_then(|xml| parse_relationships(&xml))?;
    let (base_dir, _) = split_part_path(part);

    let mut images = Vec::new();
    let mut missing = Vec::new();
    for id in embeds {
        let media = rels
            .get(id)
            .ok_or_else(|| format!("relationship {} not found in {}", id, rels_path))
            .and_then(|target| read_zip_entry(archive, &resolve_part_path(base_dir, target)));
        match media {
            Ok(bytes) => images.push(ImageBytes::from(bytes)),
            Err(detail) => {
                warn!("{}: skipping picture {}: {}", part, id, detail);
                missing.push(ExtractionError::images(detail));
            }
        }
    }

    Ok((images, missing))
}

/// `ppt/slides/slide1.xml` → (`ppt/slides`, `slide1.xml`).
fn split_part_path(part: &str) -> (&str, &str) {
    part.rsplit_once('/').unwrap_or(("", part))
}

/// `ppt/slides/slide1.xml` → `ppt/slides/_rels/slide1.xml.rels`.
fn rels_path_for(part: &str) -> String {
    match split_part_path(part) {
        ("", file) => format!("_rels/{}.rels", file),
        (dir, file) => format!("{}/_rels/{}.rels", dir, file),
    }
}

/// Internal relationship targets keyed by id.
fn parse_relationships(xml: &[u8]) -> Result<HashMap<String, String>, String> {
    let mut reader = Reader::from_reader(xml);
    let mut buf = Vec::new();
    let mut rels = HashMap::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Empty(ref e)) | Ok(Event::Start(ref e))
                if e.local_name().as_ref() == b"Relationship" =>
            {
                let mut id = None;
                let mut target = None;
                let mut external = false;
                for attr in e.attributes().flatten() {
                    let value = String::from_utf8_lossy(&attr.value).into_owned();
                    match attr.key.local_name().as_ref() {
                        b"Id" => id = Some(value),
                        b"Target" => target = Some(value),
                        b"TargetMode" => external = value == "External",
                        _ => {}
                    }
                }
                if let (Some(id), Some(target), false) = (id, target, external) {
                    rels.insert(id, target);
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(format!("malformed relationships XML: {}", e)),
            _ => {}
        }
        buf.clear();
    }

    Ok(rels)
}

/// Join a relationship target onto the directory of its source part.
///
/// `("ppt/slides", "../media/image1.png")` → `"ppt/media/image1.png"`;
/// absolute targets (`/ppt/media/x.png`) are taken from the package root.
fn resolve_part_path(base_dir: &str, target: &str) -> String {
    let mut parts: Vec<&str> = match target.strip_prefix('/') {
        Some(_) => Vec::new(),
        None => base_dir.split('/').filter(|s| !s.is_empty()).collect(),
    };

    for segment in target.trim_start_matches('/').split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                parts.pop();
            }
            s => parts.push(s),
        }
    }

    parts.join("/")
}
