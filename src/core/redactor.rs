//! Page redaction orchestration.
//!
//! [`redact_page`] runs the whole pipeline over one page: interpret the
//! content stream, classify intersections, rewrite flagged text blocks,
//! paths, and images, serialize, and verify. The page's operations that
//! nothing touched pass through with their original operands, so their
//! bytes survive semantically (and, for strings, byte-for-byte).
//!
//! Failure policy: everything recoverable stays on the page (a failed
//! image decode drops the image, a failed clip drops the path, both leak
//! nothing); only the final verification can report a redaction-level
//! failure, and the caller decides what to do with the output.

use rustc_hash::{FxHashMap, FxHashSet};

use super::classify::{Classification, classify};
use super::error::RedactResult;
use super::font::{FontDict, resolve_fonts};
use super::geometry::Rect;
use super::image_redact::{
    ReplacementImage, XObjectImage, redact_inline_image, redact_xobject_image,
};
use super::interpreter::interpret;
use super::ops::{ImageOp, ImageSource, PageOp, PathOp, PathOpKind};
use super::parser::Operand;
use super::path_clip::{clip_path, rebuild_path_ops};
use super::serializer::{EmitOp, serialize};
use super::text_redact::{LetterBox, rebuild_block};
use super::verifier::{VerificationResult, verify};

/// Everything the engine needs to redact one page.
#[derive(Debug, Default)]
pub struct RedactionRequest {
    /// Decompressed content-stream bytes
    pub content: Vec<u8>,

    /// Page height in points (used to sanity-clamp rectangles); 0 disables
    /// clamping
    pub page_height: f64,

    /// Page font table, name -> font dictionary entries
    pub fonts: FxHashMap<String, FontDict>,

    /// Redaction rectangles in page coordinates
    pub rects: Vec<Rect>,

    /// Target terms for post-redaction verification
    pub terms: Vec<String>,

    /// Optional raster-accurate glyph boxes
    pub letter_boxes: Option<Vec<LetterBox>>,

    /// Image XObjects by resource name, for pixel-level redaction
    pub images: FxHashMap<String, XObjectImage>,
}

/// What kind of content a redaction action touched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RedactActionKind {
    Text,
    Path,
    Image,
}

/// One applied change, for the caller's report.
#[derive(Debug, Clone)]
pub struct RedactAction {
    pub kind: RedactActionKind,
    pub bbox: Rect,
    pub detail: String,
}

/// The redacted page.
#[derive(Debug)]
pub struct RedactionOutcome {
    /// Replacement content-stream bytes
    pub content: Vec<u8>,

    /// Applied changes
    pub actions: Vec<RedactAction>,

    /// Verification result over the emitted bytes
    pub verification: VerificationResult,

    /// Replacement XObject stream data, keyed by resource name. The caller
    /// writes these back (Deflate filter, DeviceRGB, 8bpc) and clears any
    /// `/SMask` where flagged.
    pub replacement_images: FxHashMap<String, ReplacementImage>,
}

/// Redacts a single page.
pub fn redact_page(request: &RedactionRequest) -> RedactResult<RedactionOutcome> {
    let rects = clamp_rects(&request.rects, request.page_height);
    let fonts = resolve_fonts(&request.fonts);
    let ops = interpret(&request.content, &fonts);
    let classification = classify(&ops, &rects);

    let mut rewriter = Rewriter {
        request,
        rects: &rects,
        classification: &classification,
        emit: Vec::new(),
        actions: Vec::new(),
        replacement_images: FxHashMap::default(),
        rebuilt_blocks: FxHashMap::default(),
        path_base_pos: FxHashMap::default(),
        path_clip_op: FxHashMap::default(),
    };
    rewriter.prepare(&ops);
    rewriter.rewrite(&ops);

    let Rewriter {
        mut emit,
        actions,
        replacement_images,
        ..
    } = rewriter;

    let content = serialize(&mut emit);
    let verification = verify(&content, &fonts, &rects, &request.terms);

    Ok(RedactionOutcome {
        content,
        actions,
        verification,
        replacement_images,
    })
}

/// Clamps rectangles to the vertical page extent and drops empty ones.
fn clamp_rects(rects: &[Rect], page_height: f64) -> Vec<Rect> {
    rects
        .iter()
        .filter_map(|r| {
            let clamped = if page_height > 0.0 {
                Rect {
                    left: r.left,
                    right: r.right,
                    bottom: r.bottom.max(0.0),
                    top: r.top.min(page_height),
                }
            } else {
                *r
            };
            if clamped.is_empty() {
                log::warn!("dropping empty redaction rectangle {:?}", r);
                None
            } else {
                Some(clamped)
            }
        })
        .collect()
}

struct Rewriter<'a> {
    request: &'a RedactionRequest,
    rects: &'a [Rect],
    classification: &'a Classification,
    emit: Vec<EmitOp>,
    actions: Vec<RedactAction>,
    replacement_images: FxHashMap<String, ReplacementImage>,

    /// Block id -> base position; inserted when the block's first op is met
    rebuilt_blocks: FxHashMap<u32, u32>,

    /// Path id -> position of its first operator
    path_base_pos: FxHashMap<u32, u32>,

    /// Path id -> clip operator (`W` / `W*`) seen inside the path
    path_clip_op: FxHashMap<u32, String>,
}

impl<'a> Rewriter<'a> {
    /// Pre-pass: base positions for flagged blocks and paths.
    fn prepare(&mut self, ops: &[PageOp]) {
        for op in ops {
            if let Some(block) = op.block() {
                if self.classification.redacted_blocks.contains(&block) {
                    self.rebuilt_blocks.entry(block).or_insert(op.pos());
                }
            }
            if let PageOp::Path(path) = op {
                if self.classification.clipped_paths.contains(&path.path_id) {
                    self.path_base_pos.entry(path.path_id).or_insert(path.pos);
                    if path.kind == PathOpKind::Clip {
                        self.path_clip_op
                            .insert(path.path_id, path.operator.clone());
                    }
                }
            }
        }
    }

    fn rewrite(&mut self, ops: &[PageOp]) {
        let mut emitted_blocks: FxHashSet<u32> = FxHashSet::default();

        for op in ops {
            // Flagged text blocks: rebuild once at the block's first op;
            // interior plain state ops keep their own positions.
            if let Some(block) = op.block() {
                let base_pos = self.rebuilt_blocks.get(&block).copied();
                if let Some(base_pos) = base_pos {
                    if emitted_blocks.insert(block) {
                        self.rebuild_text_block(ops, block, base_pos);
                    }
                    if let PageOp::State(state) = op {
                        self.emit.push(EmitOp::op(
                            state.pos,
                            &state.operator,
                            state.operands.to_vec(),
                        ));
                    }
                    continue;
                }
            }

            match op {
                PageOp::State(state) => {
                    self.emit
                        .push(EmitOp::op(state.pos, &state.operator, state.operands.to_vec()));
                }
                PageOp::TextState(text_state) => {
                    self.emit.push(EmitOp::op(
                        text_state.pos,
                        &text_state.operator,
                        text_state.operands.to_vec(),
                    ));
                }
                PageOp::TextShow(show) => {
                    self.emit
                        .push(EmitOp::op(show.pos, &show.operator, show.operands.to_vec()));
                }
                PageOp::Path(path) => self.rewrite_path(path),
                PageOp::Image(image) => self.rewrite_image(image),
            }
        }
    }

    fn rebuild_text_block(&mut self, ops: &[PageOp], block: u32, base_pos: u32) {
        let members: Vec<&PageOp> = ops
            .iter()
            .filter(|op| op.block() == Some(block))
            .collect();
        let rebuild = rebuild_block(
            &members,
            self.rects,
            self.request.letter_boxes.as_deref(),
            base_pos,
        );
        for removed in &rebuild.removed {
            self.actions.push(RedactAction {
                kind: RedactActionKind::Text,
                bbox: removed.bbox,
                detail: format!("{} glyph(s) removed", removed.glyphs),
            });
        }
        self.emit.extend(rebuild.emit);
    }

    fn rewrite_path(&mut self, path: &PathOp) {
        if !self.classification.clipped_paths.contains(&path.path_id) {
            // Untouched: pass the original operators through
            self.emit.push(EmitOp::op(
                path.pos,
                &path.operator,
                path.operands
                    .iter()
                    .map(|&v| Operand::Number(v))
                    .collect(),
            ));
            return;
        }

        // Construction and clip markers of a flagged path are replaced by
        // the rebuilt polygon; only the painting operator triggers it.
        if path.kind != PathOpKind::Paint {
            return;
        }

        let base_pos = self
            .path_base_pos
            .get(&path.path_id)
            .copied()
            .unwrap_or(path.pos);
        let bbox = path.bbox.unwrap_or_else(Rect::empty);

        let collected = match &path.path {
            Some(collected) => collected,
            None => return,
        };

        match clip_path(collected, self.rects) {
            Ok(polygons) if polygons.is_empty() => {
                self.actions.push(RedactAction {
                    kind: RedactActionKind::Path,
                    bbox,
                    detail: "path dropped".to_string(),
                });
            }
            Ok(polygons) => {
                let mut rebuilt = rebuild_path_ops(&polygons, &path.operator, base_pos);
                if let Some(clip_operator) = self.path_clip_op.get(&path.path_id) {
                    let paint = rebuilt.pop();
                    rebuilt.push(EmitOp::op(base_pos, clip_operator, vec![]));
                    if let Some(paint) = paint {
                        rebuilt.push(paint);
                    }
                }
                self.emit.extend(rebuilt);
                self.actions.push(RedactAction {
                    kind: RedactActionKind::Path,
                    bbox,
                    detail: format!("path clipped to {} polygon(s)", polygons.len()),
                });
            }
            Err(e) => {
                log::warn!("path clip failed ({}), dropping path", e);
                self.actions.push(RedactAction {
                    kind: RedactActionKind::Path,
                    bbox,
                    detail: "path dropped (clip failed)".to_string(),
                });
            }
        }
    }

    fn rewrite_image(&mut self, image: &ImageOp) {
        let flagged = self.classification.redacted_images.contains(&image.pos);

        match &image.source {
            ImageSource::XObject { name } => {
                if !flagged {
                    self.emit.push(EmitOp::op(
                        image.pos,
                        "Do",
                        vec![Operand::Name(name.clone())],
                    ));
                    return;
                }
                let data = self.request.images.get(name);
                let result = data.map(|xobject| {
                    redact_xobject_image(xobject, &image.bbox, self.rects)
                });
                match result {
                    Some(Ok(replacement)) => {
                        self.replacement_images
                            .insert(name.clone(), replacement);
                        self.emit.push(EmitOp::op(
                            image.pos,
                            "Do",
                            vec![Operand::Name(name.clone())],
                        ));
                        self.actions.push(RedactAction {
                            kind: RedactActionKind::Image,
                            bbox: image.bbox,
                            detail: format!("image '{}' region blacked out", name),
                        });
                    }
                    Some(Err(e)) => {
                        log::warn!("image redaction failed ({}), dropping '{}'", e, name);
                        self.actions.push(RedactAction {
                            kind: RedactActionKind::Image,
                            bbox: image.bbox,
                            detail: format!("image '{}' dropped (decode failed)", name),
                        });
                    }
                    None => {
                        log::warn!("no stream data for image '{}', dropping it", name);
                        self.actions.push(RedactAction {
                            kind: RedactActionKind::Image,
                            bbox: image.bbox,
                            detail: format!("image '{}' dropped (no data)", name),
                        });
                    }
                }
            }
            ImageSource::Inline(inline) => {
                if !flagged {
                    self.emit.push(EmitOp::raw(image.pos, inline.raw.clone()));
                    return;
                }
                match redact_inline_image(inline, &image.bbox, self.rects) {
                    Ok(raw) => {
                        self.emit.push(EmitOp::raw(image.pos, raw));
                        self.actions.push(RedactAction {
                            kind: RedactActionKind::Image,
                            bbox: image.bbox,
                            detail: "inline image region blacked out".to_string(),
                        });
                    }
                    Err(e) => {
                        log::warn!("inline image redaction failed ({}), dropping it", e);
                        self.actions.push(RedactAction {
                            kind: RedactActionKind::Image,
                            bbox: image.bbox,
                            detail: "inline image dropped (decode failed)".to_string(),
                        });
                    }
                }
            }
        }
    }
}
