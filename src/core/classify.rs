//! Intersection classification.
//!
//! Decides what the rewrite stages must touch: text blocks whose show
//! operators hit a redaction rectangle are reconstructed as a whole
//! (text state threads through a block, so partial rewrites are unsound),
//! while paths and images are flagged individually. State operators are
//! never flagged.

use rustc_hash::FxHashSet;

use super::geometry::Rect;
use super::ops::{PageOp, PathOpKind};

/// What the redaction stages must rewrite.
#[derive(Debug, Default)]
pub struct Classification {
    /// Blocks (`BT ... ET`) containing at least one intersecting show op
    pub redacted_blocks: FxHashSet<u32>,

    /// Paths whose painted bounding box intersects a rectangle
    pub clipped_paths: FxHashSet<u32>,

    /// Stream positions of intersecting image operations
    pub redacted_images: FxHashSet<u32>,
}

impl Classification {
    /// True when nothing on the page is affected.
    pub fn is_empty(&self) -> bool {
        self.redacted_blocks.is_empty()
            && self.clipped_paths.is_empty()
            && self.redacted_images.is_empty()
    }
}

/// Classifies the operation list against the redaction rectangles.
pub fn classify(ops: &[PageOp], rects: &[Rect]) -> Classification {
    let mut out = Classification::default();
    if rects.is_empty() {
        return out;
    }

    for op in ops {
        match op {
            PageOp::TextShow(show) => {
                if intersects_any(&show.bbox, rects) {
                    if let Some(block) = show.block {
                        out.redacted_blocks.insert(block);
                    }
                }
            }
            PageOp::Path(path) => {
                if path.kind == PathOpKind::Paint {
                    if let Some(bbox) = path.bbox {
                        if intersects_any(&bbox, rects) {
                            out.clipped_paths.insert(path.path_id);
                        }
                    }
                }
            }
            PageOp::Image(image) => {
                if intersects_any(&image.bbox, rects) {
                    out.redacted_images.insert(image.pos);
                }
            }
            PageOp::State(_) | PageOp::TextState(_) => {}
        }
    }

    out
}

fn intersects_any(bbox: &Rect, rects: &[Rect]) -> bool {
    rects.iter().any(|r| bbox.intersects(r))
}
