//! Basic Redaction Example
//!
//! Redacts a rectangle out of a decompressed content stream and shows the
//! extracted text before and after.
//!
//! Run with: cargo run --example redact_basic [content-stream-file]

use pdf_redact::core::font::resolve_fonts;
use pdf_redact::core::interpreter::interpret;
use pdf_redact::core::ops::PageOp;
use pdf_redact::{FontDict, Rect, RedactionRequest, redact_page};
use rustc_hash::FxHashMap;
use std::env;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = env::args().collect();

    let content: Vec<u8> = if args.len() > 1 {
        std::fs::read(&args[1])?
    } else {
        eprintln!("No file provided, using a built-in sample stream...");
        b"BT /F1 12 Tf 72 720 Td (Employee: Jane Doe) Tj 0 -16 Td (SSN: 123-45-6789) Tj ET"
            .to_vec()
    };

    let mut fonts = FxHashMap::default();
    fonts.insert(
        "F1".to_string(),
        FontDict {
            subtype: "Type1".to_string(),
            base_font: "Helvetica".to_string(),
            ..Default::default()
        },
    );

    // Cover the second line (the SSN)
    let rects = vec![Rect::new(70.0, 700.0, 300.0, 716.0)];

    let request = RedactionRequest {
        content,
        page_height: 792.0,
        fonts,
        rects,
        terms: vec!["123-45-6789".to_string()],
        letter_boxes: None,
        images: FxHashMap::default(),
    };

    let resolved = resolve_fonts(&request.fonts);
    println!("Text before redaction:");
    for line in extracted(&request.content, &resolved) {
        println!("  {}", line);
    }

    let outcome = redact_page(&request)?;

    println!("\nText after redaction:");
    for line in extracted(&outcome.content, &resolved) {
        println!("  {}", line);
    }

    println!("\nActions:");
    for action in &outcome.actions {
        println!(
            "  {:?} at ({:.1}, {:.1})-({:.1}, {:.1}): {}",
            action.kind,
            action.bbox.left,
            action.bbox.bottom,
            action.bbox.right,
            action.bbox.top,
            action.detail
        );
    }
    println!("\nVerification: {:?}", outcome.verification);

    Ok(())
}

fn extracted(
    content: &[u8],
    fonts: &FxHashMap<String, std::sync::Arc<pdf_redact::FontInfo>>,
) -> Vec<String> {
    interpret(content, fonts)
        .iter()
        .filter_map(|op| match op {
            PageOp::TextShow(show) if !show.text.is_empty() => Some(show.text.clone()),
            _ => None,
        })
        .collect()
}
