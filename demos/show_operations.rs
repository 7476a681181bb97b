//! Operation Inspector
//!
//! Parses a decompressed content stream and prints the typed operation
//! list with stream positions and page-space bounding boxes. Useful for
//! choosing redaction rectangles by hand.
//!
//! Run with: cargo run --example show_operations <content-stream-file>

use pdf_redact::core::font::resolve_fonts;
use pdf_redact::core::interpreter::interpret;
use pdf_redact::core::ops::PageOp;
use rustc_hash::FxHashMap;
use std::env;
use std::process;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        eprintln!("Usage: cargo run --example show_operations <content-stream-file>");
        process::exit(1);
    }

    let content = std::fs::read(&args[1])?;
    let fonts = resolve_fonts(&FxHashMap::default());
    let ops = interpret(&content, &fonts);

    println!("{} operations\n", ops.len());
    for op in &ops {
        match op {
            PageOp::State(state) => {
                println!("{:>5}  state      {}", state.pos, state.operator);
            }
            PageOp::TextState(text_state) => {
                println!("{:>5}  text-state {}", text_state.pos, text_state.operator);
            }
            PageOp::TextShow(show) => {
                println!(
                    "{:>5}  text       {} {:?} at ({:.1}, {:.1})-({:.1}, {:.1}), {} glyph(s)",
                    show.pos,
                    show.operator,
                    show.text,
                    show.bbox.left,
                    show.bbox.bottom,
                    show.bbox.right,
                    show.bbox.top,
                    show.glyphs.len()
                );
            }
            PageOp::Path(path) => match path.bbox {
                Some(bbox) => println!(
                    "{:>5}  path       {} (path {}) at ({:.1}, {:.1})-({:.1}, {:.1})",
                    path.pos,
                    path.operator,
                    path.path_id,
                    bbox.left,
                    bbox.bottom,
                    bbox.right,
                    bbox.top
                ),
                None => println!(
                    "{:>5}  path       {} (path {})",
                    path.pos, path.operator, path.path_id
                ),
            },
            PageOp::Image(image) => {
                let label = image.xobject_name().unwrap_or("inline");
                println!(
                    "{:>5}  image      {} at ({:.1}, {:.1})-({:.1}, {:.1})",
                    image.pos,
                    label,
                    image.bbox.left,
                    image.bbox.bottom,
                    image.bbox.right,
                    image.bbox.top
                );
            }
        }
    }

    Ok(())
}
