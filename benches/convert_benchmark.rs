//! Benchmarks for docvert scanning and encoding.
//!
//! Run with: cargo bench
//!
//! Inputs are synthetic: a generated model, and a DOCX produced from it.

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use docvert::render::DocxEncoder;
use docvert::scanner::DocxScanner;
use docvert::{
    CancellationToken, ContentModel, DocumentFormat, Encoder, EncoderRegistry, Paragraph,
    RenderOptions, Run,
};

/// Creates a model with the given number of paragraphs of mixed styling.
fn create_test_model(paragraphs: usize) -> ContentModel {
    let mut model = ContentModel::new();
    for i in 0..paragraphs {
        if i % 20 == 0 {
            model.add_paragraph(Paragraph::heading(format!("Section {}", i / 20 + 1), 1));
            continue;
        }
        let mut p = Paragraph::new();
        p.add_run(Run::new(format!("Paragraph {} has some plain text, ", i)));
        p.add_run(Run::bold("a bold part"));
        p.add_run(Run::new(" and an "));
        p.add_run(Run::italic("italic <tail> & more."));
        model.add_paragraph(p);
    }
    model
}

/// Benchmark format detection.
fn bench_format_detection(c: &mut Criterion) {
    let docx = DocxEncoder::new()
        .encode_to_vec(&create_test_model(1), &RenderOptions::default())
        .unwrap();
    let text = b"Just some plain text content, nothing else";

    c.bench_function("detect_docx", |b| {
        b.iter(|| docvert::detect_format_from_bytes(black_box(&docx)).unwrap());
    });

    c.bench_function("detect_text", |b| {
        b.iter(|| docvert::detect_format_from_bytes(black_box(text)).unwrap());
    });
}

/// Benchmark the DOCX scanner at various sizes.
fn bench_docx_scanning(c: &mut Criterion) {
    let mut group = c.benchmark_group("docx_scanning");
    let scanner = DocxScanner::new();
    let cancel = CancellationToken::new();

    for paragraphs in [10, 100, 1000].iter() {
        let xml = DocxEncoder::new().document_xml(&create_test_model(*paragraphs), &RenderOptions::default());

        group.bench_function(format!("{}_paragraphs", paragraphs), |b| {
            b.iter(|| scanner.scan_document(black_box(&xml), &cancel).unwrap());
        });
    }

    group.finish();
}

/// Benchmark every encoder on the same model.
fn bench_encoding(c: &mut Criterion) {
    let mut group = c.benchmark_group("encoding");
    let model = create_test_model(200);
    let options = RenderOptions::default();
    let registry = EncoderRegistry::with_defaults();

    for format in DocumentFormat::ALL {
        let encoder = registry.require(format).unwrap();
        group.bench_function(format.extension(), |b| {
            b.iter(|| encoder.encode_to_vec(black_box(&model), &options).unwrap());
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_format_detection,
    bench_docx_scanning,
    bench_encoding,
);
criterion_main!(benches);
