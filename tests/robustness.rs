//! Robustness: hostile and malformed content streams.
//!
//! The engine is the last thing standing between a broken PDF generator
//! and a leaked document, so nothing in here may panic, hang, or abort a
//! page. Every case feeds garbage through the full pipeline and only
//! requires that an output comes back.

use pdf_redact::core::font::resolve_fonts;
use pdf_redact::core::interpreter::interpret;
use pdf_redact::core::ops::PageOp;
use pdf_redact::{FontDict, Rect, RedactionRequest, redact_page};
use rustc_hash::FxHashMap;

fn run(content: &[u8]) -> Vec<u8> {
    let mut fonts = FxHashMap::default();
    fonts.insert(
        "F1".to_string(),
        FontDict {
            subtype: "Type1".to_string(),
            ..Default::default()
        },
    );
    let request = RedactionRequest {
        content: content.to_vec(),
        page_height: 792.0,
        fonts,
        rects: vec![Rect::new(50.0, 50.0, 400.0, 400.0)],
        terms: vec!["secret".to_string()],
        letter_boxes: None,
        images: FxHashMap::default(),
    };
    redact_page(&request).expect("redaction must not fail on malformed input").content
}

#[test]
fn test_pure_garbage() {
    run(b"\x00\x01\x02\xFF\xFE garbage ((( >>> ]]] \x80\x90");
}

#[test]
fn test_unbalanced_bt() {
    let out = run(b"BT /F1 12 Tf 100 100 Td (secret text) Tj");
    // The rebuilt block closes itself
    let text = String::from_utf8_lossy(&out);
    assert_eq!(
        text.lines().filter(|l| l.trim() == "BT").count(),
        text.lines().filter(|l| l.trim() == "ET").count()
    );
}

#[test]
fn test_unbalanced_restore() {
    run(b"Q Q Q 10 10 m 20 20 l S q");
}

#[test]
fn test_unterminated_string() {
    run(b"BT /F1 12 Tf (never closed");
}

#[test]
fn test_unterminated_hex_string() {
    run(b"BT /F1 12 Tf <48656C ET");
}

#[test]
fn test_operator_with_wrong_operands() {
    run(b"(text) (more) cm /Name 12 34 re f BT 1 2 3 Tf (x) Tj ET");
}

#[test]
fn test_dangling_operands_at_eof() {
    run(b"1 2 3 4 5 6");
}

#[test]
fn test_deeply_nested_arrays() {
    let mut content = Vec::new();
    for _ in 0..200 {
        content.push(b'[');
    }
    content.extend_from_slice(b"1");
    for _ in 0..200 {
        content.push(b']');
    }
    content.extend_from_slice(b" 0 d S");
    run(&content);
}

#[test]
fn test_inline_image_without_terminator() {
    run(b"q BI /W 4 /H 4 ID \x01\x02\x03\x04 and it never ends");
}

#[test]
fn test_huge_and_weird_numbers() {
    run(b"99999999999999999999 0.00000000001 --5 -. +. 4. .5 1 2 m l S");
}

#[test]
fn test_tj_with_junk_elements() {
    run(b"BT /F1 12 Tf [(a) /Name << /K 1 >> true null (b) -100] TJ ET");
}

#[test]
fn test_show_without_font() {
    let out = run(b"BT 100 100 Td (secret data here) Tj ET");
    // Redacted region overlapped: verification must have passed (no panic,
    // and the rebuilt block carries a synthesized Tf)
    let text = String::from_utf8_lossy(&out);
    if text.contains("Tj") {
        assert!(text.contains("Tf"));
    }
}

#[test]
fn test_zero_area_rects_are_dropped() {
    let mut fonts = FxHashMap::default();
    fonts.insert("F1".to_string(), FontDict::default());
    let request = RedactionRequest {
        content: b"BT /F1 12 Tf 100 100 Td (hello) Tj ET".to_vec(),
        page_height: 792.0,
        fonts,
        rects: vec![Rect::new(10.0, 10.0, 10.0, 10.0)],
        terms: Vec::new(),
        letter_boxes: None,
        images: FxHashMap::default(),
    };
    let outcome = redact_page(&request).unwrap();
    assert!(outcome.actions.is_empty());
}

#[test]
fn test_reparse_stability() {
    // A well-formed stream parses, serializes, and re-parses to the same
    // operation count even when nothing is redacted.
    let content: &[u8] = b"q 0.9 0 0 0.9 20 20 cm \
BT /F1 11 Tf 1.5 Tc 72 720 Td (first) Tj 0 -14 Td (second) Tj ET \
72 600 100 50 re f \
0.2 0.4 0.6 rg 72 500 m 172 500 l 172 550 l h B Q";

    let mut fonts = FxHashMap::default();
    fonts.insert("F1".to_string(), FontDict::default());
    let resolved = resolve_fonts(&fonts);

    let request = RedactionRequest {
        content: content.to_vec(),
        page_height: 792.0,
        fonts,
        rects: vec![Rect::new(500.0, 10.0, 550.0, 20.0)],
        terms: Vec::new(),
        letter_boxes: None,
        images: FxHashMap::default(),
    };
    let outcome = redact_page(&request).unwrap();

    let before = interpret(content, &resolved).len();
    let after = interpret(&outcome.content, &resolved).len();
    assert_eq!(before, after);
}

#[test]
fn test_fuzzed_streams_do_not_panic() {
    // Deterministic pseudo-random byte soup, heavy on delimiter bytes
    let alphabet: &[u8] = b"()<>[]{}/% \n0123456789.-+BTETqQTjTfmlrecf\\\x00\xFF\x80";
    let mut seed: u64 = 0x2545F4914F6CDD1D;
    for _ in 0..64 {
        let mut content = Vec::with_capacity(256);
        for _ in 0..256 {
            seed ^= seed << 13;
            seed ^= seed >> 7;
            seed ^= seed << 17;
            content.push(alphabet[(seed % alphabet.len() as u64) as usize]);
        }
        run(&content);
    }
}

#[test]
fn test_output_never_contains_redacted_glyph_bytes() {
    // Whatever the input shape, redacted glyphs' bytes must be gone from
    // every show operator that still intersects the area.
    let out = run(b"BT /F1 12 Tf 60 60 Td (secret) Tj ET");
    let mut fonts = FxHashMap::default();
    fonts.insert("F1".to_string(), FontDict::default());
    let resolved = resolve_fonts(&fonts);
    for op in interpret(&out, &resolved) {
        if let PageOp::TextShow(show) = op {
            assert!(!show.text.contains("secret"));
        }
    }
}
