/*!
 * Common test utilities for the slidelingo test suite
 */

#![allow(dead_code)]

use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Result;
use tempfile::TempDir;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use slidelingo::jobs::{JobService, JobStore};
use slidelingo::providers::mock::MockModel;
use slidelingo::translation::{AcceleratorGate, BatchPlanner, BatchScheduler, DocumentPipeline, SchedulerConfig};

const NS: &str = r#"xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships" xmlns:p="http://schemas.openxmlformats.org/presentationml/2006/main""#;
const REL_NS: &str = "http://schemas.openxmlformats.org/package/2006/relationships";
const REL_SLIDE: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships/slide";
const REL_NOTES: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships/notesSlide";
const REL_IMAGE: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships/image";
const REL_CHART: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships/chart";
const CHART_NS: &str = "http://schemas.openxmlformats.org/drawingml/2006/chart";

/// Bytes of a tiny "image" kept verbatim by every round trip
pub const MEDIA_BYTES: &[u8] = b"\x89PNG\r\n\x1a\nnot really an image";

/// Runs grouped by paragraph, grouped by shape
#[derive(Debug, Clone, Default)]
pub struct TestSlide {
    pub shapes: Vec<Vec<Vec<String>>>,
    pub notes: Option<Vec<String>>,
    /// Tables after the shapes; one run per cell
    pub tables: Vec<Vec<Vec<String>>>,
    /// Indices into the builder's charts, placed after the tables
    pub charts: Vec<usize>,
}

impl TestSlide {
    /// One shape with one paragraph per entry of `paragraphs`
    pub fn text(paragraphs: &[&[&str]]) -> Self {
        Self {
            shapes: vec![paragraphs
                .iter()
                .map(|runs| runs.iter().map(|r| r.to_string()).collect())
                .collect()],
            ..Self::default()
        }
    }

    pub fn with_table(mut self, rows: &[&[&str]]) -> Self {
        self.tables
            .push(rows.iter().map(|cells| cells.iter().map(|c| c.to_string()).collect()).collect());
        self
    }

    /// Reference the chart returned by `DeckBuilder::chart_index`
    pub fn with_chart(mut self, chart: usize) -> Self {
        self.charts.push(chart);
        self
    }

    pub fn with_notes(mut self, runs: &[&str]) -> Self {
        self.notes = Some(runs.iter().map(|r| r.to_string()).collect());
        self
    }
}

/// Builds small but well-formed presentations in memory
#[derive(Debug, Clone, Default)]
pub struct DeckBuilder {
    slides: Vec<TestSlide>,
    /// Title of every chart part
    charts: Vec<String>,
    slides_reversed_in_archive: bool,
}

impl DeckBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn slide(mut self, slide: TestSlide) -> Self {
        self.slides.push(slide);
        self
    }

    /// Add a chart part titled `title`; slides reference it by its index
    pub fn chart(mut self, title: &str) -> Self {
        self.charts.push(title.to_string());
        self
    }

    /// Index the next call to `chart` will get
    pub fn chart_index(&self) -> usize {
        self.charts.len()
    }

    /// Store slide parts in reverse order inside the archive; presentation
    /// order stays as added
    pub fn slides_reversed_in_archive(mut self) -> Self {
        self.slides_reversed_in_archive = true;
        self
    }

    pub fn build(&self) -> Vec<u8> {
        let mut parts: Vec<(String, Vec<u8>, CompressionMethod)> = vec![
            ("[Content_Types].xml".to_string(), content_types().into_bytes(), CompressionMethod::Deflated),
            ("ppt/presentation.xml".to_string(), self.presentation().into_bytes(), CompressionMethod::Deflated),
            (
                "ppt/_rels/presentation.xml.rels".to_string(),
                self.presentation_rels().into_bytes(),
                CompressionMethod::Deflated,
            ),
        ];

        let mut slide_parts = Vec::new();
        for (i, slide) in self.slides.iter().enumerate() {
            let n = i + 1;
            let mut group = vec![
                (format!("ppt/slides/slide{}.xml", n), slide_xml(slide).into_bytes(), CompressionMethod::Deflated),
                (
                    format!("ppt/slides/_rels/slide{}.xml.rels", n),
                    slide_rels(n, slide.notes.is_some(), &slide.charts).into_bytes(),
                    CompressionMethod::Deflated,
                ),
            ];
            if let Some(notes) = &slide.notes {
                group.push((
                    format!("ppt/notesSlides/notesSlide{}.xml", n),
                    notes_xml(notes).into_bytes(),
                    CompressionMethod::Deflated,
                ));
            }
            slide_parts.push(group);
        }
        if self.slides_reversed_in_archive {
            slide_parts.reverse();
        }
        parts.extend(slide_parts.into_iter().flatten());
        for (i, title) in self.charts.iter().enumerate() {
            parts.push((
                format!("ppt/charts/chart{}.xml", i + 1),
                chart_xml(title).into_bytes(),
                CompressionMethod::Deflated,
            ));
        }
        parts.push(("ppt/media/image1.png".to_string(), MEDIA_BYTES.to_vec(), CompressionMethod::Stored));

        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        for (name, data, method) in parts {
            let options = SimpleFileOptions::default().compression_method(method);
            writer.start_file(name, options).unwrap();
            writer.write_all(&data).unwrap();
        }
        writer.finish().unwrap().into_inner()
    }

    fn presentation(&self) -> String {
        let ids: String = (0..self.slides.len())
            .map(|i| format!(r#"<p:sldId id="{}" r:id="rId{}"/>"#, 256 + i, i + 1))
            .collect();
        format!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<p:presentation {}><p:sldIdLst>{}</p:sldIdLst><p:sldSz cx="9144000" cy="6858000"/></p:presentation>"#,
            NS, ids
        )
    }

    fn presentation_rels(&self) -> String {
        let rels: String = (0..self.slides.len())
            .map(|i| {
                format!(
                    r#"<Relationship Id="rId{}" Type="{}" Target="slides/slide{}.xml"/>"#,
                    i + 1,
                    REL_SLIDE,
                    i + 1
                )
            })
            .collect();
        format!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="{}">{}</Relationships>"#,
            REL_NS, rels
        )
    }
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}

fn paragraphs_xml(paragraphs: &[Vec<String>]) -> String {
    paragraphs
        .iter()
        .map(|runs| {
            let runs: String = runs
                .iter()
                .map(|text| format!(r#"<a:r><a:rPr lang="en-US" sz="2400" b="1"/><a:t>{}</a:t></a:r>"#, escape(text)))
                .collect();
            format!(r#"<a:p><a:pPr algn="ctr"/>{}<a:endParaRPr lang="en-US"/></a:p>"#, runs)
        })
        .collect()
}

fn table_xml(id: usize, rows: &[Vec<String>]) -> String {
    let rows: String = rows
        .iter()
        .map(|cells| {
            let cells: String = cells
                .iter()
                .map(|text| {
                    format!(
                        r#"<a:tc><a:txBody><a:bodyPr/><a:lstStyle/><a:p><a:r><a:rPr lang="en-US" sz="1400"/><a:t>{}</a:t></a:r></a:p></a:txBody><a:tcPr/></a:tc>"#,
                        escape(text)
                    )
                })
                .collect();
            format!(r#"<a:tr h="370840">{}</a:tr>"#, cells)
        })
        .collect();
    format!(
        r#"<p:graphicFrame><p:nvGraphicFramePr><p:cNvPr id="{}" name="Table {}"/><p:cNvGraphicFramePr/><p:nvPr/></p:nvGraphicFramePr><p:xfrm/><a:graphic><a:graphicData uri="http://schemas.openxmlformats.org/drawingml/2006/table"><a:tbl><a:tblGrid/>{}</a:tbl></a:graphicData></a:graphic></p:graphicFrame>"#,
        id, id, rows
    )
}

fn chart_frame_xml(id: usize, rel: usize) -> String {
    format!(
        r#"<p:graphicFrame><p:nvGraphicFramePr><p:cNvPr id="{}" name="Chart {}"/><p:cNvGraphicFramePr/><p:nvPr/></p:nvGraphicFramePr><p:xfrm/><a:graphic><a:graphicData uri="{}"><c:chart xmlns:c="{}" r:id="rId{}"/></a:graphicData></a:graphic></p:graphicFrame>"#,
        id, id, CHART_NS, CHART_NS, rel
    )
}

fn chart_xml(title: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<c:chartSpace xmlns:c="{}" {}><c:chart><c:title><c:tx><c:rich><a:bodyPr/><a:p><a:r><a:rPr lang="en-US" b="1"/><a:t>{}</a:t></a:r></a:p></c:rich></c:tx></c:title><c:plotArea/></c:chart></c:chartSpace>"#,
        CHART_NS,
        NS,
        escape(title)
    )
}

fn slide_xml(slide: &TestSlide) -> String {
    let mut shapes: String = slide
        .shapes
        .iter()
        .enumerate()
        .map(|(i, paragraphs)| {
            format!(
                r#"<p:sp><p:nvSpPr><p:cNvPr id="{}" name="Shape {}"/><p:cNvSpPr/><p:nvPr/></p:nvSpPr><p:spPr/><p:txBody><a:bodyPr/><a:lstStyle/>{}</p:txBody></p:sp>"#,
                i + 2,
                i,
                paragraphs_xml(paragraphs)
            )
        })
        .collect();
    let mut next_id = slide.shapes.len() + 2;
    for rows in &slide.tables {
        shapes.push_str(&table_xml(next_id, rows));
        next_id += 1;
    }
    for j in 0..slide.charts.len() {
        shapes.push_str(&chart_frame_xml(next_id, CHART_REL_BASE + j));
        next_id += 1;
    }
    format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<p:sld {}><p:cSld><p:spTree><p:nvGrpSpPr><p:cNvPr id="1" name=""/><p:cNvGrpSpPr/><p:nvPr/></p:nvGrpSpPr><p:grpSpPr/>{}</p:spTree></p:cSld></p:sld>"#,
        NS, shapes
    )
}

fn notes_xml(runs: &[String]) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<p:notes {}><p:cSld><p:spTree><p:sp><p:txBody><a:bodyPr/>{}</p:txBody></p:sp></p:spTree></p:cSld></p:notes>"#,
        NS,
        paragraphs_xml(&[runs.to_vec()])
    )
}

/// First relationship id used for chart references
const CHART_REL_BASE: usize = 10;

fn slide_rels(n: usize, has_notes: bool, charts: &[usize]) -> String {
    let mut rels = format!(r#"<Relationship Id="rId1" Type="{}" Target="../media/image1.png"/>"#, REL_IMAGE);
    if has_notes {
        rels.push_str(&format!(
            r#"<Relationship Id="rId2" Type="{}" Target="../notesSlides/notesSlide{}.xml"/>"#,
            REL_NOTES, n
        ));
    }
    for (j, chart) in charts.iter().enumerate() {
        rels.push_str(&format!(
            r#"<Relationship Id="rId{}" Type="{}" Target="../charts/chart{}.xml"/>"#,
            CHART_REL_BASE + j,
            REL_CHART,
            chart + 1
        ));
    }
    format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="{}">{}</Relationships>"#,
        REL_NS, rels
    )
}

fn content_types() -> String {
    r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="xml" ContentType="application/xml"/><Default Extension="png" ContentType="image/png"/></Types>"#
        .to_string()
}

/// Three slides, five runs: three with text, two empty
pub fn three_slide_deck() -> Vec<u8> {
    DeckBuilder::new()
        .slide(TestSlide::text(&[&["Quarterly results", ""]]))
        .slide(TestSlide::text(&[&["Revenue grew"], &[""]]))
        .slide(TestSlide::text(&[&["Thank you"]]))
        .build()
}

/// A deck with enough runs to need several batches
pub fn long_deck(slides: usize, runs_per_slide: usize) -> Vec<u8> {
    let mut builder = DeckBuilder::new();
    for s in 0..slides {
        let runs: Vec<String> = (0..runs_per_slide).map(|r| format!("Slide {} line {}", s, r)).collect();
        let run_refs: Vec<&str> = runs.iter().map(String::as_str).collect();
        builder = builder.slide(TestSlide::text(&[&run_refs]).with_notes(&[&format!("Notes for slide {}", s)]));
    }
    builder.build()
}

/// Scheduler, pipeline and service around a mock model
pub struct TestHarness {
    pub model: MockModel,
    pub gate: Arc<AcceleratorGate>,
    pub service: JobService,
}

impl TestHarness {
    pub fn new(model: MockModel, max_chars: usize, max_units: usize) -> Self {
        Self::with_config(model, max_chars, max_units, SchedulerConfig::default())
    }

    pub fn with_config(model: MockModel, max_chars: usize, max_units: usize, config: SchedulerConfig) -> Self {
        let gate = Arc::new(AcceleratorGate::new());
        let scheduler = BatchScheduler::start(Arc::new(model.clone()), gate.clone(), config);
        let pipeline = DocumentPipeline::new(scheduler, BatchPlanner::new(max_chars, max_units));
        let service = JobService::new(pipeline, Arc::new(JobStore::new()), "en");
        Self { model, gate, service }
    }
}

/// Creates a temporary directory for test files
pub fn create_temp_dir() -> Result<TempDir> {
    Ok(TempDir::new()?)
}

/// Writes bytes into `dir/filename`
pub fn create_test_file(dir: &Path, filename: &str, content: &[u8]) -> Result<PathBuf> {
    let file_path = dir.join(filename);
    std::fs::write(&file_path, content)?;
    Ok(file_path)
}
