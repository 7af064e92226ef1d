//! End-to-end conversion tests.

use std::fs;
use std::io::{Cursor, Read, Write};
use std::sync::Arc;

use docvert::archive::{crc32, ArchiveReader, CompressionMethod};
use docvert::convert::MemoryHistory;
use docvert::scanner::{DocxScanner, RtfScanner};
use docvert::{
    CancellationToken, ContentModel, ContentScanner, ConversionState, ConvertOptions, Converter,
    DocumentFormat, Error, FormatTable, Paragraph, Run, SourceHint, Table, TableRow,
};

const HELLO_DOCUMENT: &str = concat!(
    r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
    "\n",
    r#"<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main">"#,
    "\n<w:body>\n",
    r#"<w:p><w:r><w:t xml:space="preserve">Hello </w:t></w:r><w:r><w:rPr><w:b/></w:rPr><w:t>world</w:t></w:r></w:p>"#,
    "\n<w:p/>\n",
    "</w:body>\n</w:document>\n",
);

/// Builds a minimal DOCX around `document_xml` with an independent zip writer.
fn docx_with(document_xml: &str) -> Vec<u8> {
    let mut zip = zip::ZipWriter::new(Cursor::new(Vec::new()));
    let options = zip::write::SimpleFileOptions::default()
        .compression_method(zip::CompressionMethod::Deflated);
    zip.start_file("[Content_Types].xml", options).unwrap();
    zip.write_all(br#"<?xml version="1.0"?><Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"/>"#)
        .unwrap();
    zip.start_file("word/document.xml", options).unwrap();
    zip.write_all(document_xml.as_bytes()).unwrap();
    zip.finish().unwrap().into_inner()
}

fn converter_into(dir: &std::path::Path) -> Converter {
    Converter::new(FormatTable::new(), ConvertOptions::new().with_output_dir(dir))
}

fn docx_hint() -> SourceHint {
    SourceHint::new().with_file_name("hello.docx")
}

fn read_zip_entry(path: &std::path::Path, name: &str) -> String {
    let mut zip = zip::ZipArchive::new(fs::File::open(path).unwrap()).unwrap();
    let mut text = String::new();
    zip.by_name(name).unwrap().read_to_string(&mut text).unwrap();
    text
}

#[test]
fn test_docx_to_text() {
    let temp = tempfile::tempdir().unwrap();
    let result = converter_into(temp.path())
        .convert_bytes(&docx_with(HELLO_DOCUMENT), &docx_hint(), DocumentFormat::Txt)
        .unwrap();

    assert_eq!(result.source_format, DocumentFormat::Docx);
    assert_eq!(result.file_name(), "hello.txt");
    assert_eq!(fs::read_to_string(&result.output_path).unwrap(), "Hello world\n\n");
    assert_eq!(result.stats.paragraph_count, 2);
    assert_eq!(result.stats.empty_paragraph_count, 1);
}

#[test]
fn test_docx_to_rtf_keeps_bold_and_empty_paragraph() {
    let temp = tempfile::tempdir().unwrap();
    let result = converter_into(temp.path())
        .convert_bytes(&docx_with(HELLO_DOCUMENT), &docx_hint(), DocumentFormat::Rtf)
        .unwrap();

    let rtf = fs::read_to_string(&result.output_path).unwrap();
    assert!(rtf.starts_with("{\\rtf1"));
    assert!(rtf.contains("{\\b world}"));
    assert!(rtf.contains("\\pard\\ql \\par"));
    assert!(rtf.trim_end().ends_with('}'));
}

#[test]
fn test_docx_to_odt_paragraphs() {
    let temp = tempfile::tempdir().unwrap();
    let result = converter_into(temp.path())
        .convert_bytes(&docx_with(HELLO_DOCUMENT), &docx_hint(), DocumentFormat::Odt)
        .unwrap();

    let content = read_zip_entry(&result.output_path, "content.xml");
    assert_eq!(content.matches("<text:p").count(), 2);
    assert!(content.contains("<text:p/>"));
    assert!(content.contains("world"));
}

#[test]
fn test_odt_mimetype_entry_first_and_stored() {
    let temp = tempfile::tempdir().unwrap();
    let result = converter_into(temp.path())
        .convert_bytes(b"Some text\n", &SourceHint::new().with_format(DocumentFormat::Txt), DocumentFormat::Odt)
        .unwrap();
    let bytes = fs::read(&result.output_path).unwrap();

    // Local header of the first entry: no extra field, so the name starts at 30.
    assert_eq!(&bytes[0..4], b"PK\x03\x04");
    assert_eq!(u16::from_le_bytes([bytes[8], bytes[9]]), 0);
    assert_eq!(&bytes[30..38], b"mimetype");
    assert_eq!(&bytes[38..77], b"application/vnd.oasis.opendocument.text");

    let mut zip = zip::ZipArchive::new(Cursor::new(&bytes)).unwrap();
    let first = zip.by_index(0).unwrap();
    assert_eq!(first.name(), "mimetype");
    assert_eq!(first.compression(), zip::CompressionMethod::Stored);
    assert_eq!(first.crc32(), crc32(b"application/vnd.oasis.opendocument.text"));
}

#[test]
fn test_archive_reader_reads_foreign_zip() {
    let reader = ArchiveReader::new(Cursor::new(docx_with(HELLO_DOCUMENT))).unwrap();
    let entries: Vec<_> = reader.map(|entry| entry.unwrap()).collect();

    assert_eq!(entries.len(), 2);
    assert_eq!(entries[1].name, "word/document.xml");
    assert_eq!(entries[1].method, CompressionMethod::Deflated);
    assert_eq!(entries[1].bytes(), HELLO_DOCUMENT.as_bytes());
}

#[test]
fn test_text_odt_text_round_trip() {
    let temp = tempfile::tempdir().unwrap();
    let converter = converter_into(temp.path());
    let original = "First line\n\nThird  line with\ttab\n";

    let odt = converter
        .convert_bytes(original.as_bytes(), &SourceHint::new().with_file_name("notes.txt"), DocumentFormat::Odt)
        .unwrap();
    assert_eq!(odt.file_name(), "notes.odt");

    let text = converter
        .extract_text(fs::File::open(&odt.output_path).unwrap(), &SourceHint::from_path(&odt.output_path))
        .unwrap();
    assert_eq!(text, original);
}

#[test]
fn test_rtf_escaping_applied_once() {
    let temp = tempfile::tempdir().unwrap();
    let converter = converter_into(temp.path());
    let result = converter
        .convert_bytes(
            br"C:\path {x}",
            &SourceHint::new().with_file_name("path.txt"),
            DocumentFormat::Rtf,
        )
        .unwrap();

    let rtf = fs::read_to_string(&result.output_path).unwrap();
    assert!(rtf.contains(r"C:\\path \{x\}"));
    assert!(!rtf.contains(r"\\\\"));

    let mut source = Cursor::new(rtf.into_bytes());
    let model = RtfScanner::new()
        .scan(&mut source, &CancellationToken::new())
        .unwrap();
    assert_eq!(model.plain_text(), "C:\\path {x}\n");
}

#[test]
fn test_non_zip_docx_fails_without_output() {
    let temp = tempfile::tempdir().unwrap();
    let history = Arc::new(MemoryHistory::new());
    let converter = converter_into(temp.path()).with_history(history.clone());

    let result = converter.convert_bytes(
        b"this is not a zip archive at all",
        &SourceHint::new().with_format(DocumentFormat::Docx),
        DocumentFormat::Pdf,
    );

    assert!(matches!(result, Err(Error::ArchiveCorrupt(_))));
    assert_eq!(fs::read_dir(temp.path()).unwrap().count(), 0);
    assert!(history.records().is_empty());
}

#[test]
fn test_run_count_matches_text_elements() {
    let xml = docvert::render::DocxEncoder::new().document_xml(&sample_model(), &Default::default());
    let non_empty_texts = xml
        .match_indices("<w:t")
        .filter(|(i, _)| {
            let rest = &xml[*i..];
            rest.starts_with("<w:t>") || rest.starts_with("<w:t ")
        })
        .filter(|(i, _)| {
            let rest = &xml[*i..];
            let open_end = rest.find('>').unwrap();
            !rest[open_end + 1..].starts_with("</w:t>")
        })
        .count();

    let model = DocxScanner::new()
        .scan_document(&xml, &CancellationToken::new())
        .unwrap();
    assert_eq!(model.run_count(), non_empty_texts);
    assert_eq!(non_empty_texts, 9);

    let sample = sample_model();
    assert_eq!(model.paragraphs[..4], sample.paragraphs[..]);
    assert_eq!(model.tables, sample.tables);
}

#[test]
fn test_every_target_from_docx() {
    let temp = tempfile::tempdir().unwrap();
    let converter = converter_into(temp.path());
    let docx = docx_with(HELLO_DOCUMENT);

    for target in DocumentFormat::ALL {
        let result = converter.convert_bytes(&docx, &docx_hint(), target).unwrap();
        assert_eq!(result.target_format, target);
        assert_eq!(result.mime_type, target.mime_type());
        assert_eq!(fs::metadata(&result.output_path).unwrap().len(), result.bytes_written);
        assert_eq!(result.states.last(), Some(&ConversionState::Done));
    }
    assert_eq!(fs::read_dir(temp.path()).unwrap().count(), DocumentFormat::ALL.len());
}

#[test]
fn test_cancelled_before_start() {
    let temp = tempfile::tempdir().unwrap();
    let cancel = CancellationToken::new();
    cancel.cancel();
    let converter = Converter::new(
        FormatTable::new(),
        ConvertOptions::new()
            .with_output_dir(temp.path())
            .with_cancellation(cancel),
    );

    let result = converter.convert_bytes(&docx_with(HELLO_DOCUMENT), &docx_hint(), DocumentFormat::Odt);
    assert!(matches!(result, Err(Error::Cancelled)));
    assert_eq!(fs::read_dir(temp.path()).unwrap().count(), 0);
}

fn sample_model() -> ContentModel {
    let mut model = ContentModel::new();
    model.add_paragraph(Paragraph::heading("Agenda", 1));
    let mut p = Paragraph::new();
    p.add_run(Run::new("Plain start, "));
    p.add_run(Run::bold("bold"));
    p.add_run(Run::new(" & "));
    p.add_run(Run::italic("<italic>"));
    model.add_paragraph(p);
    model.add_paragraph(Paragraph::new());
    model.add_paragraph(Paragraph::with_text("Closing"));
    let mut table = Table::new();
    table.add_row(TableRow::from_strings(["Item", "Owner"]));
    table.add_row(TableRow::from_strings(["Budget", ""]));
    model.add_table(table);
    model
}
