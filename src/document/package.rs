/*!
 * Presentation container access.
 *
 * A `.pptx` file is a zip archive of XML parts tied together by
 * relationship files. This module reads the archive into memory, resolves
 * the relationships needed to find slides, notes and charts in
 * presentation order, and writes archives back deterministically.
 */

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::collections::HashMap;
use std::io::{Cursor, Read, Write};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::errors::{ExtractionError, JobError};

/// Main presentation part
pub const PRESENTATION_PART: &str = "ppt/presentation.xml";

/// Relationships of the main presentation part
pub const PRESENTATION_RELS: &str = "ppt/_rels/presentation.xml.rels";

/// Largest decompressed size accepted for one part
pub const MAX_PART_BYTES: u64 = 256 * 1024 * 1024;

/// Largest decompressed size accepted for the whole archive
pub const MAX_PACKAGE_BYTES: u64 = 1024 * 1024 * 1024;

const NOTES_REL_SUFFIX: &str = "/notesSlide";
const CHART_REL_SUFFIX: &str = "/chart";

/// One archive entry, kept verbatim
#[derive(Debug, Clone)]
pub struct PackageEntry {
    /// Path inside the archive
    pub name: String,
    /// Compression method used by the original archive
    pub compression: CompressionMethod,
    /// Directory entries carry no data
    pub is_dir: bool,
    /// Uncompressed bytes
    pub data: Vec<u8>,
}

/// A declared relationship from one part to another
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Relationship {
    pub id: String,
    pub rel_type: String,
    pub target: String,
    pub external: bool,
}

/// The parts that make up one slide, in traversal order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlideParts {
    pub slide: String,
    pub notes: Option<String>,
    pub charts: Vec<String>,
}

/// In-memory presentation archive
#[derive(Debug, Clone)]
pub struct Package {
    entries: Vec<PackageEntry>,
    index: HashMap<String, usize>,
}

impl Package {
    /// Read every entry of the archive, in archive order
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ExtractionError> {
        Self::from_bytes_limited(bytes, MAX_PART_BYTES, MAX_PACKAGE_BYTES)
    }

    /// Read the archive, refusing parts or totals that decompress beyond
    /// the given sizes. Header sizes are not trusted; reads are capped.
    pub fn from_bytes_limited(bytes: &[u8], max_part: u64, max_total: u64) -> Result<Self, ExtractionError> {
        let mut archive = ZipArchive::new(Cursor::new(bytes))
            .map_err(|e| ExtractionError::Archive(e.to_string()))?;

        let mut entries = Vec::with_capacity(archive.len());
        let mut total: u64 = 0;
        for i in 0..archive.len() {
            let mut file = archive
                .by_index(i)
                .map_err(|e| ExtractionError::Archive(e.to_string()))?;
            let name = file.name().to_string();
            if file.size() > max_part {
                return Err(too_large(&name, max_part));
            }

            let mut data = Vec::with_capacity(file.size() as usize);
            (&mut file)
                .take(max_part + 1)
                .read_to_end(&mut data)
                .map_err(|e| ExtractionError::Archive(format!("{}: {}", name, e)))?;
            if data.len() as u64 > max_part {
                return Err(too_large(&name, max_part));
            }
            total += data.len() as u64;
            if total > max_total {
                return Err(too_large("archive", max_total));
            }

            entries.push(PackageEntry {
                name,
                compression: file.compression(),
                is_dir: file.is_dir(),
                data,
            });
        }

        let package = Self::from_entries(entries);
        package.require(PRESENTATION_PART)?;
        package.require(PRESENTATION_RELS)?;
        Ok(package)
    }

    /// Build a package from already-read entries
    pub fn from_entries(entries: Vec<PackageEntry>) -> Self {
        let index = entries
            .iter()
            .enumerate()
            .map(|(i, e)| (e.name.clone(), i))
            .collect();
        Self { entries, index }
    }

    pub fn entries(&self) -> &[PackageEntry] {
        &self.entries
    }

    pub fn into_entries(self) -> Vec<PackageEntry> {
        self.entries
    }

    /// Write the package back out unchanged
    pub fn to_bytes(&self) -> Result<Vec<u8>, JobError> {
        write_archive(self.entries.iter().map(|e| (e, e.data.as_slice())))
    }

    /// Bytes of a part, if present
    pub fn part(&self, name: &str) -> Option<&[u8]> {
        self.index.get(name).map(|&i| self.entries[i].data.as_slice())
    }

    /// Bytes of a part the format cannot do without
    pub fn require(&self, name: &str) -> Result<&[u8], ExtractionError> {
        self.part(name)
            .ok_or_else(|| ExtractionError::MissingPart(name.to_string()))
    }

    /// Relationships declared by `part`; a part without a rels file has none
    pub fn relationships(&self, part: &str) -> Result<Vec<Relationship>, ExtractionError> {
        let rels_name = rels_path_for(part);
        match self.part(&rels_name) {
            Some(bytes) => parse_relationships(&rels_name, bytes),
            None => Ok(Vec::new()),
        }
    }

    /// Slides in presentation order with their notes and chart parts
    pub fn slide_parts(&self) -> Result<Vec<SlideParts>, ExtractionError> {
        let presentation = self.require(PRESENTATION_PART)?;
        let slide_rel_ids = parse_slide_id_list(presentation)?;
        let rels = self.relationships(PRESENTATION_PART)?;

        let mut slides = Vec::with_capacity(slide_rel_ids.len());
        for rel_id in slide_rel_ids {
            let rel = rels.iter().find(|r| r.id == rel_id).ok_or_else(|| {
                ExtractionError::BrokenRelationship {
                    part: PRESENTATION_PART.to_string(),
                    id: rel_id.clone(),
                }
            })?;
            let slide = resolve_target(PRESENTATION_PART, &rel.target);
            self.require(&slide)?;

            let mut notes = None;
            let mut charts = Vec::new();
            for rel in self.relationships(&slide)? {
                if rel.external {
                    continue;
                }
                let target = resolve_target(&slide, &rel.target);
                if rel.rel_type.ends_with(NOTES_REL_SUFFIX) {
                    if self.part(&target).is_some() {
                        notes = Some(target);
                    }
                } else if rel.rel_type.ends_with(CHART_REL_SUFFIX) && self.part(&target).is_some() {
                    charts.push(target);
                }
            }

            slides.push(SlideParts { slide, notes, charts });
        }

        Ok(slides)
    }
}

/// Write entries back into a zip archive.
///
/// Entry order and compression method are preserved and every entry gets the
/// same fixed timestamp, so equal inputs give byte-identical archives.
pub fn write_archive<'a, I>(entries: I) -> Result<Vec<u8>, JobError>
where
    I: IntoIterator<Item = (&'a PackageEntry, &'a [u8])>,
{
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));

    for (entry, data) in entries {
        let method = match entry.compression {
            CompressionMethod::Stored => CompressionMethod::Stored,
            _ => CompressionMethod::Deflated,
        };
        let options = SimpleFileOptions::default()
            .compression_method(method)
            .last_modified_time(zip::DateTime::default());

        if entry.is_dir {
            writer
                .add_directory(entry.name.clone(), options)
                .map_err(|e| JobError::Write(e.to_string()))?;
            continue;
        }

        writer
            .start_file(entry.name.clone(), options)
            .map_err(|e| JobError::Write(e.to_string()))?;
        writer
            .write_all(data)
            .map_err(|e| JobError::Write(e.to_string()))?;
    }

    let cursor = writer.finish().map_err(|e| JobError::Write(e.to_string()))?;
    Ok(cursor.into_inner())
}

/// `ppt/slides/slide1.xml` -> `ppt/slides/_rels/slide1.xml.rels`
pub fn rels_path_for(part: &str) -> String {
    match part.rsplit_once('/') {
        Some((dir, file)) => format!("{}/_rels/{}.rels", dir, file),
        None => format!("_rels/{}.rels", part),
    }
}

/// Resolve a relationship target against the directory of its source part
pub fn resolve_target(source_part: &str, target: &str) -> String {
    if let Some(absolute) = target.strip_prefix('/') {
        return normalize_path(absolute);
    }
    let base_dir = source_part.rsplit_once('/').map(|(dir, _)| dir).unwrap_or("");
    if base_dir.is_empty() {
        normalize_path(target)
    } else {
        normalize_path(&format!("{}/{}", base_dir, target))
    }
}

fn normalize_path(path: &str) -> String {
    let mut segments: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            other => segments.push(other),
        }
    }
    segments.join("/")
}

fn too_large(what: &str, limit: u64) -> ExtractionError {
    ExtractionError::Archive(format!("{} decompresses to more than {} bytes", what, limit))
}

fn xml_error(part: &str, e: impl std::fmt::Display) -> ExtractionError {
    ExtractionError::Xml {
        part: part.to_string(),
        message: e.to_string(),
    }
}

fn attribute(part: &str, element: &BytesStart<'_>, local: &[u8], prefixed: bool) -> Result<Option<String>, ExtractionError> {
    for attr in element.attributes() {
        let attr = attr.map_err(|e| xml_error(part, e))?;
        if attr.key.local_name().as_ref() == local && attr.key.prefix().is_some() == prefixed {
            let value = attr.unescape_value().map_err(|e| xml_error(part, e))?;
            return Ok(Some(value.into_owned()));
        }
    }
    Ok(None)
}

fn parse_relationships(rels_name: &str, bytes: &[u8]) -> Result<Vec<Relationship>, ExtractionError> {
    let mut reader = Reader::from_reader(bytes);
    let mut rels = Vec::new();

    loop {
        match reader.read_event().map_err(|e| xml_error(rels_name, e))? {
            Event::Start(e) | Event::Empty(e) if e.local_name().as_ref() == b"Relationship" => {
                let id = attribute(rels_name, &e, b"Id", false)?.unwrap_or_default();
                let rel_type = attribute(rels_name, &e, b"Type", false)?.unwrap_or_default();
                let target = attribute(rels_name, &e, b"Target", false)?.unwrap_or_default();
                let external = attribute(rels_name, &e, b"TargetMode", false)?
                    .is_some_and(|mode| mode.eq_ignore_ascii_case("External"));
                rels.push(Relationship {
                    id,
                    rel_type,
                    target,
                    external,
                });
            }
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(rels)
}

fn parse_slide_id_list(presentation: &[u8]) -> Result<Vec<String>, ExtractionError> {
    let mut reader = Reader::from_reader(presentation);
    let mut ids = Vec::new();

    loop {
        match reader.read_event().map_err(|e| xml_error(PRESENTATION_PART, e))? {
            Event::Start(e) | Event::Empty(e) if e.local_name().as_ref() == b"sldId" => {
                if let Some(rel_id) = attribute(PRESENTATION_PART, &e, b"id", true)? {
                    ids.push(rel_id);
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(ids)
}
