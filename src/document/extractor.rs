/*!
 * Text extraction.
 *
 * Walks every text-bearing part of a presentation in document order
 * (slide, then its notes, then its charts; inside a part shape -> paragraph
 * -> run, or table row -> cell -> paragraph -> run) and produces the ordered
 * list of `TextUnit`s plus the `Skeleton`: the same document with each text
 * slot replaced by a placeholder carrying its structural address.
 */

use log::debug;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::collections::{HashMap, HashSet};

use crate::errors::ExtractionError;

use super::package::{Package, PackageEntry};
use super::unit::{RunFormatting, Scope, StructuralAddress, TextUnit, UnitId};
use super::walker::{AddressWalker, Position};

/// Which optional parts are visited
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExtractOptions {
    /// Speaker notes
    pub include_notes: bool,
    /// Chart titles and axis labels
    pub include_charts: bool,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self {
            include_notes: true,
            include_charts: true,
        }
    }
}

/// One node of a text-bearing part
#[derive(Debug, Clone, PartialEq)]
pub enum SkeletonNode {
    /// Markup kept exactly as read
    Markup(Event<'static>),
    /// Where a unit's text goes back
    Slot(StructuralAddress),
}

/// Body of one archive entry in the skeleton
#[derive(Debug, Clone)]
pub enum PartBody {
    /// Untouched bytes (images, layouts, themes, parts without text)
    Raw(Vec<u8>),
    /// Parsed part with text slots
    Markup(Vec<SkeletonNode>),
}

/// An archive entry of the skeleton
#[derive(Debug, Clone)]
pub struct SkeletonEntry {
    /// Name, compression and directory flag; `data` is empty for markup parts
    pub meta: PackageEntry,
    pub body: PartBody,
}

/// The document with all text removed and every non-text structure intact
#[derive(Debug, Clone)]
pub struct Skeleton {
    entries: Vec<SkeletonEntry>,
    /// Indices of the markup entries in the order they were extracted
    traversal: Vec<usize>,
}

impl Skeleton {
    pub fn entries(&self) -> &[SkeletonEntry] {
        &self.entries
    }

    /// Entry indices of the text-bearing parts in extraction order, which
    /// need not match archive order
    pub fn traversal(&self) -> &[usize] {
        &self.traversal
    }

    /// Slot addresses in traversal order
    pub fn slot_addresses(&self) -> Vec<&StructuralAddress> {
        let mut addresses: Vec<&StructuralAddress> = Vec::new();
        for &i in &self.traversal {
            if let PartBody::Markup(nodes) = &self.entries[i].body {
                for node in nodes {
                    if let SkeletonNode::Slot(address) = node {
                        addresses.push(address);
                    }
                }
            }
        }
        addresses
    }

    pub fn slot_count(&self) -> usize {
        self.entries
            .iter()
            .map(|e| match &e.body {
                PartBody::Markup(nodes) => nodes
                    .iter()
                    .filter(|n| matches!(n, SkeletonNode::Slot(_)))
                    .count(),
                PartBody::Raw(_) => 0,
            })
            .sum()
    }

    /// Names of the parts holding text slots, in archive order
    pub fn text_parts(&self) -> Vec<&str> {
        self.entries
            .iter()
            .filter(|e| matches!(e.body, PartBody::Markup(_)))
            .map(|e| e.meta.name.as_str())
            .collect()
    }
}

/// Result of extraction: the skeleton and its unit list belong together
#[derive(Debug, Clone)]
pub struct ExtractedDocument {
    pub skeleton: Skeleton,
    pub units: Vec<TextUnit>,
}

impl ExtractedDocument {
    /// Units that still need the model
    pub fn pending_count(&self) -> usize {
        self.units.iter().filter(|u| u.is_pending()).count()
    }
}

/// Extracts text units from presentation bytes
#[derive(Debug, Clone, Default)]
pub struct Extractor {
    options: ExtractOptions,
}

impl Extractor {
    pub fn new(options: ExtractOptions) -> Self {
        Self { options }
    }

    /// Produce the skeleton and the ordered unit list
    pub fn extract(&self, bytes: &[u8]) -> Result<ExtractedDocument, ExtractionError> {
        let package = Package::from_bytes(bytes)?;
        let slides = package.slide_parts()?;

        let mut next_id = 0u64;
        let mut units = Vec::new();
        let mut visited: HashSet<String> = HashSet::new();
        let mut parsed: HashMap<String, Vec<SkeletonNode>> = HashMap::new();
        let mut order: Vec<String> = Vec::new();

        for (slide_index, parts) in slides.iter().enumerate() {
            let mut plan: Vec<(&str, Scope)> = vec![(parts.slide.as_str(), Scope::Slide)];
            if self.options.include_notes {
                if let Some(notes) = &parts.notes {
                    plan.push((notes.as_str(), Scope::Notes));
                }
            }
            if self.options.include_charts {
                for (n, chart) in parts.charts.iter().enumerate() {
                    plan.push((chart.as_str(), Scope::Chart(n)));
                }
            }

            for (part_name, scope) in plan {
                // A chart shared by two slides is addressed by its first owner only
                if !visited.insert(part_name.to_string()) {
                    continue;
                }
                let data = package.require(part_name)?;
                let nodes = extract_part(part_name, data, slide_index, scope, &mut next_id, &mut units)?;
                parsed.insert(part_name.to_string(), nodes);
                order.push(part_name.to_string());
            }
        }

        let entries: Vec<SkeletonEntry> = package
            .into_entries()
            .into_iter()
            .map(|mut meta| match parsed.remove(&meta.name) {
                Some(nodes) => {
                    meta.data = Vec::new();
                    SkeletonEntry {
                        meta,
                        body: PartBody::Markup(nodes),
                    }
                }
                None => {
                    let data = std::mem::take(&mut meta.data);
                    SkeletonEntry {
                        meta,
                        body: PartBody::Raw(data),
                    }
                }
            })
            .collect();

        debug!(
            "Extracted {} units from {} slides ({} pending)",
            units.len(),
            slides.len(),
            units.iter().filter(|u| u.is_pending()).count()
        );

        let position: HashMap<&str, usize> = entries
            .iter()
            .enumerate()
            .map(|(i, e)| (e.meta.name.as_str(), i))
            .collect();
        let traversal = order
            .iter()
            .filter_map(|name| position.get(name.as_str()).copied())
            .collect();

        Ok(ExtractedDocument {
            skeleton: Skeleton { entries, traversal },
            units,
        })
    }
}

fn xml_error(part: &str, e: impl std::fmt::Display) -> ExtractionError {
    ExtractionError::Xml {
        part: part.to_string(),
        message: e.to_string(),
    }
}

fn run_properties(part: &str, element: &BytesStart<'_>) -> Result<Vec<(String, String)>, ExtractionError> {
    let mut attributes = Vec::new();
    for attr in element.attributes() {
        let attr = attr.map_err(|e| xml_error(part, e))?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let value = attr.unescape_value().map_err(|e| xml_error(part, e))?.into_owned();
        attributes.push((key, value));
    }
    Ok(attributes)
}

/// Text captured inside an `a:t` that has not been closed yet
struct OpenSlot {
    address: StructuralAddress,
    text: String,
}

/// Turn one part into skeleton nodes, appending its units in document order
pub fn extract_part(
    part_name: &str,
    data: &[u8],
    slide: usize,
    scope: Scope,
    next_id: &mut u64,
    units: &mut Vec<TextUnit>,
) -> Result<Vec<SkeletonNode>, ExtractionError> {
    let mut reader = Reader::from_reader(data);
    let mut walker = AddressWalker::new(slide, scope);
    let mut nodes = Vec::new();
    let mut formatting = RunFormatting::default();
    let mut open_slot: Option<OpenSlot> = None;

    loop {
        let event = reader.read_event().map_err(|e| xml_error(part_name, e))?;

        if let Some(slot) = open_slot.as_mut() {
            match event {
                Event::Text(text) => {
                    let text = text.unescape().map_err(|e| xml_error(part_name, e))?;
                    slot.text.push_str(&text);
                    continue;
                }
                Event::CData(cdata) => {
                    slot.text.push_str(&String::from_utf8_lossy(&cdata));
                    continue;
                }
                Event::End(end) => {
                    walker.end();
                    if let Some(slot) = open_slot.take() {
                        units.push(TextUnit::new(
                            UnitId(*next_id),
                            slot.address.clone(),
                            slot.text,
                            formatting.clone(),
                        ));
                        *next_id += 1;
                        nodes.push(SkeletonNode::Slot(slot.address));
                    }
                    nodes.push(SkeletonNode::Markup(Event::End(end.into_owned())));
                    continue;
                }
                Event::Eof => {
                    return Err(xml_error(part_name, "document ended inside a text element"));
                }
                // Comments and processing instructions inside a:t carry no text
                _ => continue,
            }
        }

        match event {
            Event::Start(start) => {
                match walker.start(start.local_name().as_ref()) {
                    Position::RunStart => formatting = RunFormatting::default(),
                    Position::RunProperties => formatting.attributes = run_properties(part_name, &start)?,
                    Position::TextSlot => {
                        open_slot = Some(OpenSlot {
                            address: walker.address(),
                            text: String::new(),
                        });
                    }
                    Position::Other => {
                        if start.local_name().as_ref() == b"hlinkClick" && walker.inside_run() {
                            formatting.hyperlink = true;
                        }
                    }
                }
                nodes.push(SkeletonNode::Markup(Event::Start(start.into_owned())));
            }
            Event::Empty(empty) => {
                match walker.empty(empty.local_name().as_ref()) {
                    Position::RunProperties => formatting.attributes = run_properties(part_name, &empty)?,
                    Position::TextSlot => {
                        // `<a:t/>` becomes an open/close pair so the slot can hold text
                        let address = walker.address();
                        units.push(TextUnit::new(
                            UnitId(*next_id),
                            address.clone(),
                            String::new(),
                            formatting.clone(),
                        ));
                        *next_id += 1;
                        let end = empty.to_end().into_owned();
                        nodes.push(SkeletonNode::Markup(Event::Start(empty.into_owned())));
                        nodes.push(SkeletonNode::Slot(address));
                        nodes.push(SkeletonNode::Markup(Event::End(end)));
                        continue;
                    }
                    Position::Other | Position::RunStart => {
                        if empty.local_name().as_ref() == b"hlinkClick" && walker.inside_run() {
                            formatting.hyperlink = true;
                        }
                    }
                }
                nodes.push(SkeletonNode::Markup(Event::Empty(empty.into_owned())));
            }
            Event::End(end) => {
                walker.end();
                nodes.push(SkeletonNode::Markup(Event::End(end.into_owned())));
            }
            Event::Eof => {
                if walker.depth() != 0 {
                    return Err(xml_error(part_name, "document ended with unclosed elements"));
                }
                break;
            }
            other => nodes.push(SkeletonNode::Markup(other.into_owned())),
        }
    }

    Ok(nodes)
}
