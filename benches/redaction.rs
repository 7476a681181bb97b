/// Benchmarks for the redaction pipeline
///
/// Run with: cargo bench
use criterion::{Criterion, Throughput, black_box, criterion_group, criterion_main};
use pdf_redact::core::font::resolve_fonts;
use pdf_redact::core::interpreter::interpret;
use pdf_redact::{FontDict, Rect, RedactionRequest, redact_page};
use rustc_hash::FxHashMap;

/// Builds a synthetic page: a grid of text lines plus some vector content.
fn synthetic_page(lines: usize) -> Vec<u8> {
    let mut content = Vec::new();
    for i in 0..lines {
        let y = 760 - (i % 60) * 12;
        content.extend_from_slice(
            format!(
                "BT /F1 10 Tf 72 {} Td (Line {} with some sample text to lay out) Tj ET\n",
                y, i
            )
            .as_bytes(),
        );
    }
    content.extend_from_slice(b"q 0.5 w 72 100 450 2 re f Q\n");
    content
}

fn fonts() -> FxHashMap<String, FontDict> {
    let mut fonts = FxHashMap::default();
    fonts.insert(
        "F1".to_string(),
        FontDict {
            subtype: "Type1".to_string(),
            base_font: "Helvetica".to_string(),
            ..Default::default()
        },
    );
    fonts
}

/// Benchmark interpreting a content stream into positioned operations
fn benchmark_interpret(c: &mut Criterion) {
    let mut group = c.benchmark_group("interpret");
    let content = synthetic_page(200);
    let resolved = resolve_fonts(&fonts());

    group.throughput(Throughput::Bytes(content.len() as u64));
    group.bench_function("200_lines", |b| {
        b.iter(|| interpret(black_box(&content), &resolved));
    });
    group.finish();
}

/// Benchmark the full redaction pipeline
fn benchmark_redact_page(c: &mut Criterion) {
    let mut group = c.benchmark_group("redact_page");
    let content = synthetic_page(200);

    let request = RedactionRequest {
        content,
        page_height: 792.0,
        fonts: fonts(),
        rects: vec![Rect::new(100.0, 500.0, 300.0, 560.0)],
        terms: vec!["sample".to_string()],
        letter_boxes: None,
        images: FxHashMap::default(),
    };

    group.bench_function("200_lines_one_rect", |b| {
        b.iter(|| redact_page(black_box(&request)));
    });
    group.finish();
}

criterion_group!(benches, benchmark_interpret, benchmark_redact_page);
criterion_main!(benches);
