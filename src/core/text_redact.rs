//! Glyph removal and text-block reconstruction.
//!
//! A flagged `BT ... ET` block is rewritten as a whole: text state threads
//! from operator to operator inside a block, so surgically editing one
//! `Tj` would corrupt the positions of everything after it. The rebuild
//! keeps the block's non-positioning state operators, places every
//! surviving glyph run with an absolute `Tm`, and re-emits the run's exact
//! source bytes.
//!
//! Glyph policy: a glyph is redacted when the center of its box lies
//! inside any redaction rectangle; a center exactly on the edge counts as
//! inside. When raster-accurate letter boxes are supplied they take
//! precedence over the computed boxes.

use super::geometry::{Matrix, Rect};
use super::ops::{GlyphPos, PageOp, TextShowOp};
use super::parser::Operand;
use super::serializer::EmitOp;

/// A raster-accurate glyph box supplied by the caller.
#[derive(Debug, Clone)]
pub struct LetterBox {
    pub unicode: char,
    pub bbox: Rect,
}

/// Summary of the text removed from one show operator.
#[derive(Debug, Clone)]
pub struct RemovedText {
    /// Union of the removed glyph boxes
    pub bbox: Rect,

    /// Number of glyphs removed
    pub glyphs: usize,
}

/// Result of rebuilding one block.
#[derive(Debug, Default)]
pub struct BlockRebuild {
    /// Replacement operators, all sharing the block's base position
    pub emit: Vec<EmitOp>,

    /// Removal records for the action log
    pub removed: Vec<RemovedText>,
}

/// True when the glyph must be removed.
fn glyph_redacted(glyph: &GlyphPos, rects: &[Rect], letter_boxes: Option<&[LetterBox]>) -> bool {
    let bbox = letter_box_for(glyph, letter_boxes).unwrap_or(glyph.bbox);
    let (cx, cy) = bbox.center();
    rects.iter().any(|r| r.contains_point(cx, cy))
}

/// Finds a caller-supplied letter box for this glyph: same character,
/// overlapping the computed box.
fn letter_box_for(glyph: &GlyphPos, letter_boxes: Option<&[LetterBox]>) -> Option<Rect> {
    letter_boxes?
        .iter()
        .find(|lb| lb.unicode == glyph.unicode && lb.bbox.intersects(&glyph.bbox))
        .map(|lb| lb.bbox)
}

/// A maximal run of surviving glyphs from one show operator.
struct Segment<'a> {
    glyphs: Vec<&'a GlyphPos>,
}

/// Splits the glyphs of one show operator into surviving segments and
/// removal records.
fn split_segments<'a>(
    show: &'a TextShowOp,
    rects: &[Rect],
    letter_boxes: Option<&[LetterBox]>,
) -> (Vec<Segment<'a>>, Option<RemovedText>) {
    let mut segments: Vec<Segment<'a>> = Vec::new();
    let mut current: Vec<&'a GlyphPos> = Vec::new();
    let mut removed_bbox = Rect::empty();
    let mut removed_count = 0usize;

    for glyph in &show.glyphs {
        if glyph_redacted(glyph, rects, letter_boxes) {
            removed_bbox = if removed_count == 0 {
                glyph.bbox
            } else {
                removed_bbox.union(&glyph.bbox)
            };
            removed_count += 1;
            if !current.is_empty() {
                segments.push(Segment {
                    glyphs: std::mem::take(&mut current),
                });
            }
        } else {
            current.push(glyph);
        }
    }
    if !current.is_empty() {
        segments.push(Segment { glyphs: current });
    }

    let removed = (removed_count > 0).then_some(RemovedText {
        bbox: removed_bbox,
        glyphs: removed_count,
    });
    (segments, removed)
}

/// Serialization form for a segment's bytes: hex for composite fonts and
/// for byte runs a literal string could not carry cleanly.
fn segment_operand(segment: &Segment<'_>) -> Operand {
    let bytes: Vec<u8> = segment
        .glyphs
        .iter()
        .flat_map(|g| g.bytes.iter().copied())
        .collect();
    let is_cid = segment.glyphs.iter().any(|g| g.is_cid);
    let was_hex = segment.glyphs.iter().any(|g| g.was_hex);
    let non_printable = bytes.iter().any(|&b| !(0x20..=0x7E).contains(&b));
    Operand::String {
        bytes,
        hex: is_cid || was_hex || non_printable,
    }
}

/// Rebuilds a flagged block.
///
/// `block_ops` are the block's operations in original order (the `BT` and
/// `ET` included when present). Every emitted operator carries `base_pos`,
/// the position of the block's first operator. Interior plain state
/// operators (colors, `gs`) are not the rebuilder's concern: they keep
/// their own positions and sort after the rebuilt text.
pub fn rebuild_block(
    block_ops: &[&PageOp],
    rects: &[Rect],
    letter_boxes: Option<&[LetterBox]>,
    base_pos: u32,
) -> BlockRebuild {
    let mut out = BlockRebuild::default();

    out.emit.push(EmitOp::op(base_pos, "BT", vec![]));

    let mut emitted_any_text = false;
    for op in block_ops {
        match op {
            PageOp::TextState(text_state) => {
                if matches!(text_state.operator.as_str(), "BT" | "ET") {
                    continue;
                }
                if text_state.is_positioning() {
                    // Every surviving run is placed absolutely
                    continue;
                }
                out.emit.push(EmitOp::op(
                    base_pos,
                    &text_state.operator,
                    text_state.operands.to_vec(),
                ));
            }
            PageOp::TextShow(show) => {
                emitted_any_text |=
                    rebuild_show(show, rects, letter_boxes, base_pos, &mut out);
            }
            _ => {}
        }
    }

    out.emit.push(EmitOp::op(base_pos, "ET", vec![]));

    if !emitted_any_text {
        // Everything was redacted: the block shrinks to a bare BT/ET pair,
        // with no stray text state left behind.
        out.emit
            .retain(|op| op.operator == "BT" || op.operator == "ET");
    }

    out
}

/// Emits the surviving segments of one show operator. Returns true when
/// any glyph survived.
fn rebuild_show(
    show: &TextShowOp,
    rects: &[Rect],
    letter_boxes: Option<&[LetterBox]>,
    base_pos: u32,
    out: &mut BlockRebuild,
) -> bool {
    // `"` sets word and character spacing before showing; those updates
    // persist, so they are re-emitted explicitly.
    if show.operator == "\"" && show.operands.len() >= 2 {
        if let (Some(aw), Some(ac)) = (show.operands[0].as_number(), show.operands[1].as_number())
        {
            out.emit
                .push(EmitOp::op(base_pos, "Tw", vec![Operand::Number(aw)]));
            out.emit
                .push(EmitOp::op(base_pos, "Tc", vec![Operand::Number(ac)]));
        }
    }

    let (segments, removed) = split_segments(show, rects, letter_boxes);
    if let Some(removed) = removed {
        out.removed.push(removed);
    }

    let mut survived = false;
    for segment in &segments {
        let first = match segment.glyphs.first() {
            Some(g) => g,
            None => continue,
        };
        survived = true;

        // Absolute placement: translate the operator's original text matrix
        // to the segment start (text space, so no CTM inversion is needed).
        let tm = Matrix::translate(first.tx, 0.0).multiply(&show.text_matrix);
        let values = tm.to_values();
        out.emit.push(EmitOp::op(
            base_pos,
            "Tm",
            values.iter().map(|&v| Operand::Number(v)).collect(),
        ));
        out.emit
            .push(EmitOp::op(base_pos, "Tj", vec![segment_operand(segment)]));
    }
    survived
}
