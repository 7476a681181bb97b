//! Typed page operations.
//!
//! The interpreter turns raw `(operator, operands)` tuples into a tagged
//! operation list. Dispatch everywhere downstream is by variant: state
//! operations are never redacted, text-show operations carry per-glyph
//! positions, path operations are grouped into complete paths, and image
//! operations carry the placement rectangle of the drawn unit square.
//!
//! Every operation keeps the stream position assigned by the parser;
//! reconstructed operations inherit the position of the first operator of
//! the text block or path they replace.

use smallvec::SmallVec;

use super::geometry::{Matrix, Rect};
use super::parser::{Operands, RawInlineImage};

/// One positioned glyph of a text-show operator.
#[derive(Debug, Clone)]
pub struct GlyphPos {
    /// Decoded character (first scalar of the code's Unicode mapping)
    pub unicode: char,

    /// Glyph box in page coordinates
    pub bbox: Rect,

    /// Index of the containing string within a `TJ` array (0 for `Tj`)
    pub array_index: usize,

    /// Index of the code within its string, counted in codes
    pub string_index: usize,

    /// Exact source bytes of the code
    pub bytes: SmallVec<[u8; 2]>,

    /// Integer character code (CID for composite fonts)
    pub cid: u32,

    /// True when the glyph came from a composite font
    pub is_cid: bool,

    /// True when the source string used hex syntax
    pub was_hex: bool,

    /// Glyph start offset in unscaled text space, relative to the text
    /// matrix in force at the start of the operator
    pub tx: f64,

    /// Glyph advance in unscaled text space (spacing included)
    pub advance: f64,
}

/// Pass-through operation that only mutates graphics state
/// (`q`, `Q`, `cm`, `w`, `gs`, color operators, ...). Never intersects.
#[derive(Debug, Clone)]
pub struct StateOp {
    pub pos: u32,
    pub operator: String,
    pub operands: Operands,

    /// Enclosing text block, when the operator sits inside `BT ... ET`
    pub block: Option<u32>,
}

/// Text-object and text-state operation
/// (`BT`, `ET`, `Tf`, `Td`, `TD`, `Tm`, `T*`, `Tc`, `Tw`, `Tz`, `TL`,
/// `Tr`, `Ts`). Never intersects.
#[derive(Debug, Clone)]
pub struct TextStateOp {
    pub pos: u32,
    pub operator: String,
    pub operands: Operands,
    pub block: Option<u32>,
}

impl TextStateOp {
    /// True for the operators that move the text cursor. Reconstructed
    /// blocks position every segment absolutely, so these are not
    /// re-emitted.
    pub fn is_positioning(&self) -> bool {
        matches!(self.operator.as_str(), "Td" | "TD" | "Tm" | "T*")
    }
}

/// Text-showing operation (`Tj`, `TJ`, `'`, `"`).
#[derive(Debug, Clone)]
pub struct TextShowOp {
    pub pos: u32,
    pub operator: String,
    pub operands: Operands,
    pub block: Option<u32>,

    /// Decoded Unicode text of the whole operator
    pub text: String,

    /// Per-glyph positions, in drawing order
    pub glyphs: Vec<GlyphPos>,

    /// Font resource name in force (without slash)
    pub font_name: String,

    /// Raw `Tf` size in force
    pub font_size_raw: f64,

    /// Effective font size (raw size x text-matrix Y-scale)
    pub effective_size: f64,

    /// Text matrix at the start of the operator (pre-CTM)
    pub text_matrix: Matrix,

    /// True when the font is composite (two-byte codes)
    pub is_cid: bool,

    /// True when the (first) string operand used hex syntax
    pub was_hex: bool,

    /// Union of the glyph boxes, page coordinates
    pub bbox: Rect,
}

/// Role of a path operator within its path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathOpKind {
    /// `m`, `l`, `c`, `v`, `y`, `re`, `h`
    Construct,

    /// `W`, `W*` (clip markers between construction and paint)
    Clip,

    /// `S`, `s`, `f`, `F`, `f*`, `B`, `B*`, `b`, `b*`, `n`
    Paint,
}

/// One closed polyline of a collected path, in page coordinates.
#[derive(Debug, Clone)]
pub struct Subpath {
    pub points: Vec<(f64, f64)>,
    pub closed: bool,
}

/// A complete path, attached to its painting operator: every subpath
/// flattened to page-space polylines, plus the CTM needed to map clipper
/// output back to user space.
#[derive(Debug, Clone)]
pub struct CollectedPath {
    pub subpaths: Vec<Subpath>,
    pub ctm: Matrix,
}

/// Path construction or painting operation.
#[derive(Debug, Clone)]
pub struct PathOp {
    pub pos: u32,
    pub operator: String,

    /// Numeric operands (path operands are always numbers)
    pub operands: SmallVec<[f64; 6]>,

    pub kind: PathOpKind,

    /// Identifier shared by every operator of one path
    pub path_id: u32,

    /// Union bounding box of the completed path (painting operators only)
    pub bbox: Option<Rect>,

    /// Flattened page-space geometry (painting operators only)
    pub path: Option<CollectedPath>,
}

/// Source of a drawn image.
#[derive(Debug, Clone)]
pub enum ImageSource {
    /// `Do` of an image XObject
    XObject { name: String },

    /// `BI ... ID ... EI` captured as one unit
    Inline(RawInlineImage),
}

/// Image drawing operation.
#[derive(Debug, Clone)]
pub struct ImageOp {
    pub pos: u32,
    pub source: ImageSource,

    /// The unit square mapped through the CTM in force
    pub bbox: Rect,

    /// CTM at draw time
    pub ctm: Matrix,
}

impl ImageOp {
    /// XObject name, when this image is an XObject invocation.
    pub fn xobject_name(&self) -> Option<&str> {
        match &self.source {
            ImageSource::XObject { name } => Some(name),
            ImageSource::Inline(_) => None,
        }
    }
}

/// A parsed page operation.
#[derive(Debug, Clone)]
pub enum PageOp {
    State(StateOp),
    TextState(TextStateOp),
    TextShow(TextShowOp),
    Path(PathOp),
    Image(ImageOp),
}

impl PageOp {
    /// Stream position.
    pub fn pos(&self) -> u32 {
        match self {
            PageOp::State(op) => op.pos,
            PageOp::TextState(op) => op.pos,
            PageOp::TextShow(op) => op.pos,
            PageOp::Path(op) => op.pos,
            PageOp::Image(op) => op.pos,
        }
    }

    /// Enclosing text block, if any.
    pub fn block(&self) -> Option<u32> {
        match self {
            PageOp::State(op) => op.block,
            PageOp::TextState(op) => op.block,
            PageOp::TextShow(op) => op.block,
            PageOp::Path(_) | PageOp::Image(_) => None,
        }
    }

    /// Bounding box for intersection tests. State and text-state
    /// operations never intersect.
    pub fn bbox(&self) -> Option<Rect> {
        match self {
            PageOp::State(_) | PageOp::TextState(_) => None,
            PageOp::TextShow(op) => Some(op.bbox),
            PageOp::Path(op) => op.bbox,
            PageOp::Image(op) => Some(op.bbox),
        }
    }
}
