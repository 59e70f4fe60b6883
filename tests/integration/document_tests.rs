/*!
 * Integration tests for extraction and reinsertion of whole presentations.
 */

use slidelingo::document::{ExtractOptions, Extractor, Package, Reinserter, Scope, Step, UnitState};
use slidelingo::errors::{ExtractionError, JobError};

use crate::common::{three_slide_deck, DeckBuilder, TestSlide, MEDIA_BYTES};

fn translate_all(units: &mut [slidelingo::TextUnit], prefix: &str) {
    for unit in units.iter_mut().filter(|u| u.is_pending()) {
        unit.admit().unwrap();
        let text = format!("{}{}", prefix, unit.source_text());
        unit.complete(text).unwrap();
    }
}

#[test]
fn test_extract_three_slide_deck_should_order_units_by_slide() {
    let document = Extractor::default().extract(&three_slide_deck()).unwrap();
    let units = &document.units;

    assert_eq!(units.len(), 5);
    assert_eq!(document.pending_count(), 3);
    assert_eq!(document.skeleton.slot_count(), 5);

    let texts: Vec<&str> = units.iter().map(|u| u.source_text()).collect();
    assert_eq!(texts, vec!["Quarterly results", "", "Revenue grew", "", "Thank you"]);

    let slides: Vec<usize> = units.iter().map(|u| u.address().slide).collect();
    assert_eq!(slides, vec![0, 0, 1, 1, 2]);

    for (i, unit) in units.iter().enumerate() {
        assert_eq!(unit.id().0, i as u64);
    }

    assert_eq!(units[1].address().steps, vec![Step::Shape(0), Step::Paragraph(0), Step::Run(1)]);
    assert_eq!(units[3].address().steps, vec![Step::Shape(0), Step::Paragraph(1), Step::Run(0)]);
    assert_eq!(units[3].state(), &UnitState::Translated(String::new()));
    assert_eq!(units[0].formatting().attributes.len(), 3);
}

#[test]
fn test_reinsert_without_translations_should_reproduce_the_archive() {
    let input = three_slide_deck();
    let document = Extractor::default().extract(&input).unwrap();
    let mut units = document.units.clone();
    for unit in units.iter_mut().filter(|u| u.is_pending()) {
        unit.admit().unwrap();
        unit.fail("model unavailable").unwrap();
    }

    let output = Reinserter::reinsert(&document.skeleton, &units).unwrap();
    let expected = Package::from_bytes(&input).unwrap().to_bytes().unwrap();
    assert_eq!(output, expected);

    let original = Package::from_bytes(&input).unwrap();
    let written = Package::from_bytes(&output).unwrap();
    for entry in original.entries() {
        assert_eq!(written.part(&entry.name), Some(entry.data.as_slice()), "{} changed", entry.name);
    }
}

#[test]
fn test_reinsert_should_keep_formatting_and_be_repeatable() {
    let input = three_slide_deck();
    let document = Extractor::default().extract(&input).unwrap();
    let mut units = document.units.clone();
    translate_all(&mut units, "FR: ");

    let first = Reinserter::reinsert(&document.skeleton, &units).unwrap();
    let second = Reinserter::reinsert(&document.skeleton, &units).unwrap();
    assert_eq!(first, second);

    let package = Package::from_bytes(&first).unwrap();
    let slide = String::from_utf8(package.part("ppt/slides/slide1.xml").unwrap().to_vec()).unwrap();
    assert!(slide.contains(r#"<a:rPr lang="en-US" sz="2400" b="1"/><a:t>FR: Quarterly results</a:t>"#));
    assert!(slide.contains(r#"<a:pPr algn="ctr"/>"#));
    assert_eq!(package.part("ppt/media/image1.png"), Some(MEDIA_BYTES));

    let again = Extractor::default().extract(&first).unwrap();
    let texts: Vec<&str> = again.units.iter().map(|u| u.source_text()).collect();
    assert_eq!(texts, vec!["FR: Quarterly results", "", "FR: Revenue grew", "", "FR: Thank you"]);
}

#[test]
fn test_reinsert_should_escape_markup_characters() {
    let input = DeckBuilder::new().slide(TestSlide::text(&[&["R&D <draft>"]])).build();
    let document = Extractor::default().extract(&input).unwrap();
    assert_eq!(document.units[0].source_text(), "R&D <draft>");

    let mut units = document.units.clone();
    units[0].admit().unwrap();
    units[0].complete("R&D <brouillon>".to_string()).unwrap();
    let output = Reinserter::reinsert(&document.skeleton, &units).unwrap();

    let package = Package::from_bytes(&output).unwrap();
    let slide = String::from_utf8(package.part("ppt/slides/slide1.xml").unwrap().to_vec()).unwrap();
    assert!(slide.contains("<a:t>R&amp;D &lt;brouillon&gt;</a:t>"));
}

#[test]
fn test_reinsert_with_pending_unit_should_fail() {
    let document = Extractor::default().extract(&three_slide_deck()).unwrap();
    let err = Reinserter::reinsert(&document.skeleton, &document.units).unwrap_err();
    assert!(matches!(err, JobError::AddressMismatch(_)));
}

#[test]
fn test_reinsert_with_foreign_unit_list_should_report_mismatch() {
    let document = Extractor::default().extract(&three_slide_deck()).unwrap();
    let other = Extractor::default()
        .extract(&DeckBuilder::new().slide(TestSlide::text(&[&["Only one"]])).build())
        .unwrap();
    let mut units = other.units.clone();
    translate_all(&mut units, "");

    let err = Reinserter::reinsert(&document.skeleton, &units).unwrap_err();
    assert!(matches!(err, JobError::AddressMismatch(_)));
}

#[test]
fn test_extract_should_follow_presentation_order_not_archive_order() {
    let input = DeckBuilder::new()
        .slide(TestSlide::text(&[&["First"]]).with_notes(&["Speaker one"]))
        .slide(TestSlide::text(&[&["Second"]]))
        .slides_reversed_in_archive()
        .build();

    let document = Extractor::default().extract(&input).unwrap();
    let texts: Vec<&str> = document.units.iter().map(|u| u.source_text()).collect();
    assert_eq!(texts, vec!["First", "Speaker one", "Second"]);
    assert_eq!(document.units[1].address().scope, Scope::Notes);

    let mut units = document.units.clone();
    translate_all(&mut units, "> ");
    let output = Reinserter::reinsert(&document.skeleton, &units).unwrap();
    let again = Extractor::default().extract(&output).unwrap();
    let texts: Vec<&str> = again.units.iter().map(|u| u.source_text()).collect();
    assert_eq!(texts, vec!["> First", "> Speaker one", "> Second"]);
}

#[test]
fn test_extract_without_notes_should_leave_notes_untouched() {
    let input = DeckBuilder::new()
        .slide(TestSlide::text(&[&["Title"]]).with_notes(&["Remember the demo"]))
        .build();
    let extractor = Extractor::new(ExtractOptions {
        include_notes: false,
        include_charts: true,
    });

    let document = extractor.extract(&input).unwrap();
    assert_eq!(document.units.len(), 1);
    assert!(!document.skeleton.text_parts().contains(&"ppt/notesSlides/notesSlide1.xml"));
}

#[test]
fn test_extract_plain_text_should_fail_with_extraction_error() {
    let err = Extractor::default().extract(b"This is not a presentation").unwrap_err();
    assert!(matches!(err, ExtractionError::Archive(_)));
}

#[test]
fn test_extract_zip_without_presentation_should_report_missing_part() {
    use std::io::{Cursor, Write};
    use zip::write::SimpleFileOptions;

    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
    writer.start_file("word/document.xml", SimpleFileOptions::default()).unwrap();
    writer.write_all(b"<w:document/>").unwrap();
    let bytes = writer.finish().unwrap().into_inner();

    let err = Extractor::default().extract(&bytes).unwrap_err();
    assert!(matches!(err, ExtractionError::MissingPart(part) if part == "ppt/presentation.xml"));
}

#[test]
fn test_table_cells_should_round_trip_with_row_and_cell_addresses() {
    let input = DeckBuilder::new()
        .slide(TestSlide::text(&[&["Results"]]).with_table(&[&["Region", "Sales"], &["North", "42"]]))
        .build();

    let document = Extractor::default().extract(&input).unwrap();
    let texts: Vec<&str> = document.units.iter().map(|u| u.source_text()).collect();
    assert_eq!(texts, vec!["Results", "Region", "Sales", "North", "42"]);
    assert_eq!(
        document.units[3].address().steps,
        vec![Step::Shape(1), Step::Row(1), Step::Cell(0), Step::Paragraph(0), Step::Run(0)]
    );
    assert_eq!(document.units[3].address().to_string(), "slide 0 / shape 1 / row 1 / cell 0 / para 0 / run 0");

    let mut units = document.units.clone();
    translate_all(&mut units, "ES: ");
    let output = Reinserter::reinsert(&document.skeleton, &units).unwrap();

    let package = Package::from_bytes(&output).unwrap();
    let slide = String::from_utf8(package.part("ppt/slides/slide1.xml").unwrap().to_vec()).unwrap();
    assert!(slide.contains(r#"<a:rPr lang="en-US" sz="1400"/><a:t>ES: North</a:t>"#));
    assert!(slide.contains(r#"<a:tr h="370840">"#));

    let again = Extractor::default().extract(&output).unwrap();
    let texts: Vec<&str> = again.units.iter().map(|u| u.source_text()).collect();
    assert_eq!(texts, vec!["ES: Results", "ES: Region", "ES: Sales", "ES: North", "ES: 42"]);
}

#[test]
fn test_chart_shared_by_two_slides_should_be_addressed_once() {
    let input = DeckBuilder::new()
        .chart("Revenue by region")
        .slide(TestSlide::text(&[&["Overview"]]).with_chart(0))
        .slide(TestSlide::text(&[&["Details"]]).with_chart(0))
        .build();

    let document = Extractor::default().extract(&input).unwrap();
    let texts: Vec<&str> = document.units.iter().map(|u| u.source_text()).collect();
    assert_eq!(texts, vec!["Overview", "Revenue by region", "Details"]);

    let chart = document.units[1].address();
    assert_eq!(chart.slide, 0);
    assert_eq!(chart.scope, Scope::Chart(0));
    assert_eq!(chart.steps, vec![Step::Paragraph(0), Step::Run(0)]);
    assert!(document.skeleton.text_parts().contains(&"ppt/charts/chart1.xml"));

    let mut units = document.units.clone();
    translate_all(&mut units, "DE: ");
    let output = Reinserter::reinsert(&document.skeleton, &units).unwrap();

    let package = Package::from_bytes(&output).unwrap();
    let chart_xml = String::from_utf8(package.part("ppt/charts/chart1.xml").unwrap().to_vec()).unwrap();
    assert!(chart_xml.contains(r#"<a:rPr lang="en-US" b="1"/><a:t>DE: Revenue by region</a:t>"#));
    assert_eq!(chart_xml.matches("DE: ").count(), 1);
}

#[test]
fn test_extract_without_charts_should_leave_chart_parts_untouched() {
    let input = DeckBuilder::new()
        .chart("Headcount")
        .slide(TestSlide::text(&[&["Team"]]).with_chart(0))
        .build();
    let extractor = Extractor::new(ExtractOptions {
        include_notes: true,
        include_charts: false,
    });

    let document = extractor.extract(&input).unwrap();
    assert_eq!(document.units.len(), 1);

    let mut units = document.units.clone();
    translate_all(&mut units, "IT: ");
    let output = Reinserter::reinsert(&document.skeleton, &units).unwrap();
    let original = Package::from_bytes(&input).unwrap();
    let written = Package::from_bytes(&output).unwrap();
    assert_eq!(written.part("ppt/charts/chart1.xml"), original.part("ppt/charts/chart1.xml"));
}
