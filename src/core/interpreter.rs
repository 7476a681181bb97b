//! Operator interpretation.
//!
//! Walks the parsed operator list with a live [`StateStack`] and produces
//! the typed operation list the redaction stages work on. Text-show
//! operators get per-glyph positions, completed paths get flattened
//! page-space geometry, and image invocations get the CTM image of the
//! unit square.
//!
//! The interpreter is as tolerant as the parser: an operator with the
//! wrong operand shape is passed through untyped (so nothing is lost) and
//! logged, never fatal.

use std::sync::Arc;

use rustc_hash::FxHashMap;
use smallvec::SmallVec;

use super::font::{self, FontInfo};
use super::geometry::{Matrix, Rect};
use super::ops::{
    CollectedPath, GlyphPos, ImageOp, ImageSource, PageOp, PathOp, PathOpKind, StateOp, Subpath,
    TextShowOp, TextStateOp,
};
use super::parser::{ContentParser, Operand, RawContent, RawOp};
use super::path_clip::flatten_cubic;
use super::state::StateStack;

/// Graphics-state operators passed through untouched.
const STATE_OPERATORS: [&str; 32] = [
    "q", "Q", "cm", "w", "J", "j", "M", "d", "ri", "i", "gs", "g", "G", "rg", "RG", "k", "K",
    "cs", "CS", "sc", "scn", "SC", "SCN", "sh", "BMC", "BDC", "EMC", "MP", "DP", "d0", "BX",
    "EX",
];

/// Text-state operators (`BT`/`ET` included).
const TEXT_STATE_OPERATORS: [&str; 13] = [
    "BT", "ET", "Tf", "Td", "TD", "Tm", "T*", "Tc", "Tw", "Tz", "TL", "Tr", "Ts",
];

/// Path construction operators.
const PATH_CONSTRUCT_OPERATORS: [&str; 7] = ["m", "l", "c", "v", "y", "re", "h"];

/// Path painting operators.
const PATH_PAINT_OPERATORS: [&str; 10] = ["S", "s", "f", "F", "f*", "B", "B*", "b", "b*", "n"];

/// A path being built, in user space. Transformed to page space when the
/// painting operator closes it.
#[derive(Debug, Default)]
struct PathAccum {
    finished: Vec<Subpath>,
    current: Vec<(f64, f64)>,
    current_closed: bool,
    subpath_start: Option<(f64, f64)>,
}

impl PathAccum {
    fn reset(&mut self) {
        self.finished.clear();
        self.current.clear();
        self.current_closed = false;
        self.subpath_start = None;
    }

    fn flush_current(&mut self) {
        if !self.current.is_empty() {
            self.finished.push(Subpath {
                points: std::mem::take(&mut self.current),
                closed: self.current_closed,
            });
        }
        self.current_closed = false;
    }

    fn move_to(&mut self, x: f64, y: f64) {
        self.flush_current();
        self.current.push((x, y));
        self.subpath_start = Some((x, y));
    }

    fn line_to(&mut self, x: f64, y: f64) {
        if self.current.is_empty() {
            self.move_to(x, y);
            return;
        }
        self.current.push((x, y));
    }

    fn current_point(&self) -> Option<(f64, f64)> {
        self.current.last().copied().or(self.subpath_start)
    }

    fn curve_to(&mut self, c1: (f64, f64), c2: (f64, f64), end: (f64, f64)) {
        let start = match self.current_point() {
            Some(p) => p,
            None => {
                self.move_to(end.0, end.1);
                return;
            }
        };
        flatten_cubic(start, c1, c2, end, &mut self.current);
    }

    fn rect(&mut self, x: f64, y: f64, w: f64, h: f64) {
        self.flush_current();
        self.finished.push(Subpath {
            points: vec![(x, y), (x + w, y), (x + w, y + h), (x, y + h)],
            closed: true,
        });
        self.subpath_start = Some((x, y));
    }

    fn close(&mut self) {
        if !self.current.is_empty() {
            self.current_closed = true;
            self.flush_current();
        }
    }

    /// Finalizes the path into page space under `ctm`.
    fn collect(&mut self, ctm: &Matrix) -> (Option<Rect>, Option<CollectedPath>) {
        self.flush_current();
        if self.finished.is_empty() {
            self.reset();
            return (None, None);
        }

        let subpaths: Vec<Subpath> = self
            .finished
            .drain(..)
            .map(|sp| Subpath {
                points: sp
                    .points
                    .iter()
                    .map(|&(x, y)| ctm.transform_point(x, y))
                    .collect(),
                closed: sp.closed,
            })
            .collect();

        let mut bbox = Rect::empty();
        let mut any = false;
        for sp in &subpaths {
            if let Some(sub_box) = Rect::bounding(&sp.points) {
                bbox = if any { bbox.union(&sub_box) } else { sub_box };
                any = true;
            }
        }

        let collected = CollectedPath {
            subpaths,
            ctm: *ctm,
        };
        self.reset();
        (any.then_some(bbox), Some(collected))
    }
}

/// Interprets a content stream into the typed operation list.
pub fn interpret(content: &[u8], fonts: &FxHashMap<String, Arc<FontInfo>>) -> Vec<PageOp> {
    Interpreter::new(fonts).run(content)
}

struct Interpreter<'a> {
    fonts: &'a FxHashMap<String, Arc<FontInfo>>,
    fallback_fonts: FxHashMap<String, Arc<FontInfo>>,
    states: StateStack,
    ops: Vec<PageOp>,
    block_stack: Vec<u32>,
    next_block: u32,
    next_path: u32,
    path: PathAccum,
}

impl<'a> Interpreter<'a> {
    fn new(fonts: &'a FxHashMap<String, Arc<FontInfo>>) -> Self {
        Interpreter {
            fonts,
            fallback_fonts: FxHashMap::default(),
            states: StateStack::new(),
            ops: Vec::new(),
            block_stack: Vec::new(),
            next_block: 0,
            next_path: 0,
            path: PathAccum::default(),
        }
    }

    fn run(mut self, content: &[u8]) -> Vec<PageOp> {
        let mut parser = ContentParser::new(content);
        while let Some(item) = parser.next_content() {
            match item {
                RawContent::Op(raw) => self.handle_op(raw),
                RawContent::InlineImage(img) => {
                    let bbox = self
                        .states
                        .state()
                        .ctm
                        .transform_rect(&Rect::new(0.0, 0.0, 1.0, 1.0));
                    self.ops.push(PageOp::Image(ImageOp {
                        pos: img.pos,
                        bbox,
                        ctm: self.states.state().ctm,
                        source: ImageSource::Inline(img),
                    }));
                }
            }
        }
        self.ops
    }

    fn current_block(&self) -> Option<u32> {
        self.block_stack.last().copied()
    }

    fn handle_op(&mut self, raw: RawOp) {
        let operator = raw.operator.as_str();

        if TEXT_STATE_OPERATORS.contains(&operator) {
            self.handle_text_state(raw);
        } else if matches!(operator, "Tj" | "TJ" | "'" | "\"") {
            self.handle_text_show(raw);
        } else if PATH_CONSTRUCT_OPERATORS.contains(&operator) {
            self.handle_path_construct(raw);
        } else if matches!(operator, "W" | "W*") {
            self.ops.push(PageOp::Path(PathOp {
                pos: raw.pos,
                operator: raw.operator,
                operands: SmallVec::new(),
                kind: PathOpKind::Clip,
                path_id: self.next_path,
                bbox: None,
                path: None,
            }));
        } else if PATH_PAINT_OPERATORS.contains(&operator) {
            self.handle_path_paint(raw);
        } else if operator == "Do" {
            self.handle_xobject(raw);
        } else {
            if !STATE_OPERATORS.contains(&operator) && operator != "d1" {
                log::debug!("passing through unknown operator '{}'", operator);
            }
            match operator {
                "q" => self.states.save(),
                "Q" => self.states.restore(),
                "cm" => {
                    if let Some(v) = trailing_numbers(&raw, 6) {
                        self.states.concat_ctm(&Matrix::from_values(
                            v[0], v[1], v[2], v[3], v[4], v[5],
                        ));
                    } else {
                        log::warn!("cm with bad operands at position {}", raw.pos);
                    }
                }
                _ => {}
            }
            self.ops.push(PageOp::State(StateOp {
                pos: raw.pos,
                operator: raw.operator,
                operands: raw.operands,
                block: self.current_block(),
            }));
        }
    }

    fn handle_text_state(&mut self, raw: RawOp) {
        let operator = raw.operator.clone();
        match operator.as_str() {
            "BT" => {
                self.states.begin_text();
                self.block_stack.push(self.next_block);
                self.next_block += 1;
            }
            "ET" => {
                self.states.end_text();
            }
            "Tf" => {
                let name = raw
                    .operands
                    .iter()
                    .rev()
                    .find_map(|operand| operand.as_name());
                let size = raw
                    .operands
                    .iter()
                    .rev()
                    .find_map(|operand| operand.as_number());
                match (name, size) {
                    (Some(name), Some(size)) => {
                        let name = name.to_string();
                        self.states.set_font(&name, size);
                    }
                    _ => log::warn!("Tf with bad operands at position {}", raw.pos),
                }
            }
            "Td" => {
                if let Some(v) = trailing_numbers(&raw, 2) {
                    self.states.move_text(v[0], v[1]);
                }
            }
            "TD" => {
                if let Some(v) = trailing_numbers(&raw, 2) {
                    self.states.move_text_set_leading(v[0], v[1]);
                }
            }
            "Tm" => {
                if let Some(v) = trailing_numbers(&raw, 6) {
                    self.states
                        .set_text_matrix(Matrix::from_values(v[0], v[1], v[2], v[3], v[4], v[5]));
                }
            }
            "T*" => self.states.next_line(),
            "Tc" => {
                if let Some(v) = trailing_numbers(&raw, 1) {
                    self.states.state_mut().char_spacing = v[0];
                }
            }
            "Tw" => {
                if let Some(v) = trailing_numbers(&raw, 1) {
                    self.states.state_mut().word_spacing = v[0];
                }
            }
            "Tz" => {
                if let Some(v) = trailing_numbers(&raw, 1) {
                    self.states.state_mut().horizontal_scaling = v[0];
                }
            }
            "TL" => {
                if let Some(v) = trailing_numbers(&raw, 1) {
                    self.states.state_mut().leading = v[0];
                }
            }
            "Tr" => {
                if let Some(v) = trailing_numbers(&raw, 1) {
                    self.states.state_mut().render_mode = v[0] as i32;
                }
            }
            "Ts" => {
                if let Some(v) = trailing_numbers(&raw, 1) {
                    self.states.state_mut().rise = v[0];
                }
            }
            _ => {}
        }

        // Block attribution: ET still belongs to the block it closes.
        let block = self.current_block();
        self.ops.push(PageOp::TextState(TextStateOp {
            pos: raw.pos,
            operator: raw.operator,
            operands: raw.operands,
            block,
        }));
        if operator == "ET" {
            self.block_stack.pop();
        }
    }

    fn font_in_force(&mut self) -> Arc<FontInfo> {
        let name = self
            .states
            .state()
            .font_name
            .clone()
            .unwrap_or_else(|| "F0".to_string());
        if let Some(found) = self.fonts.get(&name) {
            return Arc::clone(found);
        }
        if let Some(found) = self.fallback_fonts.get(&name) {
            return Arc::clone(found);
        }
        log::warn!("font '{}' not in resource table, using fallback", name);
        let fallback = Arc::new(FontInfo::fallback(&name));
        self.fallback_fonts
            .insert(name.clone(), Arc::clone(&fallback));
        fallback
    }

    fn handle_text_show(&mut self, raw: RawOp) {
        let operator = raw.operator.as_str();

        // `'` and `"` move to the next line first; `"` also sets spacing.
        if operator == "'" {
            self.states.next_line();
        } else if operator == "\"" {
            if let Some(v) = leading_numbers(&raw, 2) {
                self.states.state_mut().word_spacing = v[0];
                self.states.state_mut().char_spacing = v[1];
            }
            self.states.next_line();
        }

        // Standalone show operator outside any BT: give it its own block so
        // reconstruction can still wrap it.
        let block = match self.current_block() {
            Some(b) => b,
            None => {
                let b = self.next_block;
                self.next_block += 1;
                b
            }
        };

        let font = self.font_in_force();
        let state = self.states.state().clone();
        let trm = state.text_rendering_matrix();
        let scale = trm.d.abs();
        let effective = state.font_size * scale;
        let h = state.horizontal_scaling / 100.0;
        let (start_x, start_y) = (trm.e, trm.f);

        let mut glyphs: Vec<GlyphPos> = Vec::new();
        let mut text = String::new();
        let mut cursor = 0.0f64; // text-space offset from the op start
        let mut was_hex = false;
        let mut saw_string = false;

        let items: Vec<(usize, &Operand)> = match operator {
            "TJ" => match raw.operands.last().and_then(|operand| operand.as_array()) {
                Some(array) => array.iter().enumerate().collect(),
                None => {
                    log::warn!("TJ without array operand at position {}", raw.pos);
                    Vec::new()
                }
            },
            _ => match raw.operands.last() {
                Some(operand @ Operand::String { .. }) => vec![(0, operand)],
                _ => {
                    log::warn!(
                        "{} without string operand at position {}",
                        operator,
                        raw.pos
                    );
                    Vec::new()
                }
            },
        };

        for (array_index, item) in items {
            match item {
                Operand::Number(v) => {
                    cursor -= v / 1000.0 * state.font_size * h;
                }
                Operand::String { bytes, hex } => {
                    if !saw_string {
                        was_hex = *hex;
                        saw_string = true;
                    }
                    for (string_index, code) in font.decode_glyphs(bytes).into_iter().enumerate()
                    {
                        let wf = font::width_factor(&code.text);
                        let width_text = state.font_size * wf * h;
                        let is_space = code.code == 32 || code.text == " ";
                        let mut advance = width_text + state.char_spacing * h;
                        if is_space {
                            advance += state.word_spacing * h;
                        }

                        let x0 = start_x + cursor * scale;
                        let bbox = Rect::new(x0, start_y, x0 + width_text * scale, start_y + effective);

                        text.push_str(&code.text);
                        glyphs.push(GlyphPos {
                            unicode: code.text.chars().next().unwrap_or('\u{FFFD}'),
                            bbox,
                            array_index,
                            string_index,
                            bytes: code.bytes,
                            cid: code.code,
                            is_cid: font.is_cid,
                            was_hex: *hex,
                            tx: cursor,
                            advance,
                        });
                        cursor += advance;
                    }
                }
                _ => {}
            }
        }

        let mut bbox = Rect::empty();
        for (i, glyph) in glyphs.iter().enumerate() {
            bbox = if i == 0 {
                glyph.bbox
            } else {
                bbox.union(&glyph.bbox)
            };
        }

        self.states.advance_text(cursor);

        self.ops.push(PageOp::TextShow(TextShowOp {
            pos: raw.pos,
            operator: raw.operator,
            operands: raw.operands,
            block: Some(block),
            text,
            glyphs,
            font_name: font.name.clone(),
            font_size_raw: state.font_size,
            effective_size: effective,
            text_matrix: state.text_matrix,
            is_cid: font.is_cid,
            was_hex,
            bbox,
        }));
    }

    fn handle_path_construct(&mut self, raw: RawOp) {
        let operator = raw.operator.as_str();
        let arity = match operator {
            "m" | "l" => 2,
            "c" => 6,
            "v" | "y" => 4,
            "re" => 4,
            "h" => 0,
            _ => 0,
        };
        let values = match trailing_numbers(&raw, arity) {
            Some(v) => v,
            None => {
                log::warn!(
                    "path operator '{}' with bad operands at position {}",
                    operator,
                    raw.pos
                );
                return;
            }
        };

        match operator {
            "m" => self.path.move_to(values[0], values[1]),
            "l" => self.path.line_to(values[0], values[1]),
            "c" => self.path.curve_to(
                (values[0], values[1]),
                (values[2], values[3]),
                (values[4], values[5]),
            ),
            "v" => {
                let start = self.path.current_point().unwrap_or((values[0], values[1]));
                self.path.curve_to(start, (values[0], values[1]), (values[2], values[3]));
            }
            "y" => self.path.curve_to(
                (values[0], values[1]),
                (values[2], values[3]),
                (values[2], values[3]),
            ),
            "re" => self.path.rect(values[0], values[1], values[2], values[3]),
            "h" => self.path.close(),
            _ => {}
        }

        self.ops.push(PageOp::Path(PathOp {
            pos: raw.pos,
            operator: raw.operator,
            operands: SmallVec::from_vec(values),
            kind: PathOpKind::Construct,
            path_id: self.next_path,
            bbox: None,
            path: None,
        }));
    }

    fn handle_path_paint(&mut self, raw: RawOp) {
        let ctm = self.states.state().ctm;
        let (bbox, path) = self.path.collect(&ctm);
        self.ops.push(PageOp::Path(PathOp {
            pos: raw.pos,
            operator: raw.operator,
            operands: SmallVec::new(),
            kind: PathOpKind::Paint,
            path_id: self.next_path,
            bbox,
            path,
        }));
        self.next_path += 1;
    }

    fn handle_xobject(&mut self, raw: RawOp) {
        let name = raw
            .operands
            .iter()
            .rev()
            .find_map(|operand| operand.as_name());
        let name = match name {
            Some(n) => n.trim_start_matches('/').to_string(),
            None => {
                log::warn!("Do without a name operand at position {}", raw.pos);
                // Keep it as inert state so nothing silently disappears
                self.ops.push(PageOp::State(StateOp {
                    pos: raw.pos,
                    operator: raw.operator,
                    operands: raw.operands,
                    block: self.current_block(),
                }));
                return;
            }
        };

        let ctm = self.states.state().ctm;
        let bbox = ctm.transform_rect(&Rect::new(0.0, 0.0, 1.0, 1.0));
        self.ops.push(PageOp::Image(ImageOp {
            pos: raw.pos,
            source: ImageSource::XObject { name },
            bbox,
            ctm,
        }));
    }
}

/// Takes the last `n` operands as numbers; None when the shape is wrong.
fn trailing_numbers(raw: &RawOp, n: usize) -> Option<Vec<f64>> {
    if raw.operands.len() < n {
        return None;
    }
    let slice = &raw.operands[raw.operands.len() - n..];
    slice.iter().map(|operand| operand.as_number()).collect()
}

/// Takes the first `n` operands as numbers.
fn leading_numbers(raw: &RawOp, n: usize) -> Option<Vec<f64>> {
    if raw.operands.len() < n {
        return None;
    }
    raw.operands[..n]
        .iter()
        .map(|operand| operand.as_number())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::font::FontDict;

    fn no_fonts() -> FxHashMap<String, Arc<FontInfo>> {
        FxHashMap::default()
    }

    fn simple_fonts() -> FxHashMap<String, Arc<FontInfo>> {
        let mut table = FxHashMap::default();
        table.insert(
            "F1".to_string(),
            FontDict {
                subtype: "Type1".to_string(),
                base_font: "Helvetica".to_string(),
                ..Default::default()
            },
        );
        font::resolve_fonts(&table)
    }

    fn shows(ops: &[PageOp]) -> Vec<&TextShowOp> {
        ops.iter()
            .filter_map(|op| match op {
                PageOp::TextShow(s) => Some(s),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_simple_text_layout() {
        let fonts = simple_fonts();
        let ops = interpret(b"BT /F1 12 Tf 100 700 Td (Hi) Tj ET", &fonts);
        let show = shows(&ops)[0];

        assert_eq!(show.text, "Hi");
        assert_eq!(show.font_name, "F1");
        assert_eq!(show.font_size_raw, 12.0);
        assert_eq!(show.effective_size, 12.0);
        assert_eq!(show.glyphs.len(), 2);

        // First glyph starts at the Td position; width = 12 * 0.6 = 7.2
        let g0 = &show.glyphs[0];
        assert!((g0.bbox.left - 100.0).abs() < 1e-9);
        assert!((g0.bbox.bottom - 700.0).abs() < 1e-9);
        assert!((g0.bbox.right - 107.2).abs() < 1e-9);
        assert!((g0.bbox.top - 712.0).abs() < 1e-9);

        let g1 = &show.glyphs[1];
        assert!((g1.bbox.left - 107.2).abs() < 1e-9);

        // Operator bbox is the union
        assert!((show.bbox.left - 100.0).abs() < 1e-9);
        assert!((show.bbox.right - 114.4).abs() < 1e-9);
    }

    #[test]
    fn test_glyph_bytes_round_trip() {
        let fonts = simple_fonts();
        let ops = interpret(b"BT /F1 12 Tf (A\\222B) Tj ET", &fonts);
        let show = shows(&ops)[0];
        assert_eq!(show.text, "A\u{2019}B");
        assert_eq!(show.glyphs[1].bytes.as_slice(), &[0x92]);
    }

    #[test]
    fn test_tm_scale_effective_size() {
        let fonts = simple_fonts();
        let ops = interpret(b"BT /F1 12 Tf 2 0 0 2 50 50 Tm (X) Tj ET", &fonts);
        let show = shows(&ops)[0];
        assert_eq!(show.font_size_raw, 12.0);
        assert_eq!(show.effective_size, 24.0);
        let g = &show.glyphs[0];
        assert!((g.bbox.left - 50.0).abs() < 1e-9);
        assert!((g.bbox.top - 74.0).abs() < 1e-9);
        // Width = effective 24 * 0.6 = 14.4
        assert!((g.bbox.right - 64.4).abs() < 1e-9);
    }

    #[test]
    fn test_ctm_affects_layout() {
        let fonts = simple_fonts();
        let ops = interpret(b"q 2 0 0 2 0 0 cm BT /F1 10 Tf 10 10 Td (X) Tj ET Q", &fonts);
        let show = shows(&ops)[0];
        assert_eq!(show.effective_size, 20.0);
        assert!((show.glyphs[0].bbox.left - 20.0).abs() < 1e-9);
        assert!((show.glyphs[0].bbox.bottom - 20.0).abs() < 1e-9);
    }

    #[test]
    fn test_tj_adjustment_moves_cursor() {
        let fonts = simple_fonts();
        // -1000 adds exactly one font size of space
        let ops = interpret(b"BT /F1 10 Tf [(A) -1000 (B)] TJ ET", &fonts);
        let show = shows(&ops)[0];
        assert_eq!(show.glyphs.len(), 2);
        let a = &show.glyphs[0];
        let b = &show.glyphs[1];
        // A advances 6 (0.6 em); the adjustment opens 10 more
        assert!((b.bbox.left - (a.bbox.left + 6.0 + 10.0)).abs() < 1e-9);
        assert_eq!(b.array_index, 2);

        // A positive adjustment tightens
        let ops = interpret(b"BT /F1 10 Tf [(A) 500 (B)] TJ ET", &fonts);
        let show = shows(&ops)[0];
        let a = &show.glyphs[0];
        let b = &show.glyphs[1];
        assert!((b.bbox.left - (a.bbox.left + 6.0 - 5.0)).abs() < 1e-9);
    }

    #[test]
    fn test_text_matrix_advances_between_shows() {
        let fonts = simple_fonts();
        let ops = interpret(b"BT /F1 10 Tf 0 0 Td (AB) Tj (C) Tj ET", &fonts);
        let all = shows(&ops);
        let second = all[1];
        // AB advanced 2 * 6 = 12
        assert!((second.glyphs[0].bbox.left - 12.0).abs() < 1e-9);
    }

    #[test]
    fn test_char_and_word_spacing() {
        let fonts = simple_fonts();
        let ops = interpret(b"BT /F1 10 Tf 2 Tc 5 Tw 0 0 Td (a b) Tj ET", &fonts);
        let show = shows(&ops)[0];
        let glyph_a = &show.glyphs[0];
        let space = &show.glyphs[1];
        let glyph_b = &show.glyphs[2];
        // a: width 6 + Tc 2 = 8
        assert!((space.bbox.left - 8.0).abs() < 1e-9);
        // space: width 6 + Tc 2 + Tw 5 = 13
        assert!((glyph_b.bbox.left - 21.0).abs() < 1e-9);
        assert!((glyph_a.advance - 8.0).abs() < 1e-9);
        assert!((space.advance - 13.0).abs() < 1e-9);
    }

    #[test]
    fn test_quote_operator_next_line() {
        let fonts = simple_fonts();
        let ops = interpret(b"BT /F1 10 Tf 14 TL 100 700 Td (one) Tj (two) ' ET", &fonts);
        let all = shows(&ops);
        assert_eq!(all.len(), 2);
        assert_eq!(all[1].operator, "'");
        // Next line drops by the leading from the line start
        assert!((all[1].glyphs[0].bbox.left - 100.0).abs() < 1e-9);
        assert!((all[1].glyphs[0].bbox.bottom - 686.0).abs() < 1e-9);
    }

    #[test]
    fn test_double_quote_sets_spacing() {
        let fonts = simple_fonts();
        let ops = interpret(b"BT /F1 10 Tf 12 TL 0 100 Td 3 1 (ab) \" ET", &fonts);
        let show = shows(&ops)[0];
        assert_eq!(show.operator, "\"");
        // Char spacing 1 applies between the glyphs
        assert!((show.glyphs[1].bbox.left - 7.0).abs() < 1e-9);
        assert!((show.glyphs[0].bbox.bottom - 88.0).abs() < 1e-9);
    }

    #[test]
    fn test_path_collection_rect() {
        let ops = interpret(b"100 200 50 30 re f", &no_fonts());
        let paint = ops
            .iter()
            .find_map(|op| match op {
                PageOp::Path(p) if p.kind == PathOpKind::Paint => Some(p),
                _ => None,
            })
            .unwrap();
        assert_eq!(paint.operator, "f");
        assert_eq!(paint.bbox.unwrap(), Rect::new(100.0, 200.0, 150.0, 230.0));
        let path = paint.path.as_ref().unwrap();
        assert_eq!(path.subpaths.len(), 1);
        assert_eq!(path.subpaths[0].points.len(), 4);
        assert!(path.subpaths[0].closed);
    }

    #[test]
    fn test_path_under_ctm() {
        let ops = interpret(b"q 2 0 0 2 0 0 cm 50 50 25 25 re S Q", &no_fonts());
        let paint = ops
            .iter()
            .find_map(|op| match op {
                PageOp::Path(p) if p.kind == PathOpKind::Paint => Some(p),
                _ => None,
            })
            .unwrap();
        assert_eq!(paint.bbox.unwrap(), Rect::new(100.0, 100.0, 150.0, 150.0));
    }

    #[test]
    fn test_multiple_paths_get_distinct_ids() {
        let ops = interpret(b"0 0 10 10 re f 20 20 5 5 re f", &no_fonts());
        let ids: Vec<u32> = ops
            .iter()
            .filter_map(|op| match op {
                PageOp::Path(p) => Some(p.path_id),
                _ => None,
            })
            .collect();
        assert_eq!(ids, vec![0, 0, 1, 1]);
    }

    #[test]
    fn test_curve_is_flattened() {
        let ops = interpret(b"0 0 m 0 10 10 10 10 0 c S", &no_fonts());
        let paint = ops
            .iter()
            .find_map(|op| match op {
                PageOp::Path(p) if p.kind == PathOpKind::Paint => Some(p),
                _ => None,
            })
            .unwrap();
        let sp = &paint.path.as_ref().unwrap().subpaths[0];
        // Flattening must insert intermediate points and end at (10, 0)
        assert!(sp.points.len() > 2);
        let last = *sp.points.last().unwrap();
        assert!((last.0 - 10.0).abs() < 1e-9);
        assert!(last.1.abs() < 1e-9);
    }

    #[test]
    fn test_xobject_bbox_is_ctm_unit_square() {
        let ops = interpret(b"q 200 0 0 100 50 50 cm /Im0 Do Q", &no_fonts());
        let image = ops
            .iter()
            .find_map(|op| match op {
                PageOp::Image(op) => Some(op),
                _ => None,
            })
            .unwrap();
        assert_eq!(image.xobject_name(), Some("Im0"));
        assert_eq!(image.bbox, Rect::new(50.0, 50.0, 250.0, 150.0));
    }

    #[test]
    fn test_inline_image_bbox() {
        let ops = interpret(
            b"q 10 0 0 10 5 5 cm BI /W 1 /H 1 /CS /G /BPC 8 ID \xAA EI Q",
            &no_fonts(),
        );
        let image = ops
            .iter()
            .find_map(|op| match op {
                PageOp::Image(op) => Some(op),
                _ => None,
            })
            .unwrap();
        assert_eq!(image.bbox, Rect::new(5.0, 5.0, 15.0, 15.0));
        match &image.source {
            ImageSource::Inline(inline) => assert_eq!(inline.data, vec![0xAA]),
            _ => panic!("expected inline image"),
        }
    }

    #[test]
    fn test_blocks_are_tracked() {
        let fonts = simple_fonts();
        let ops = interpret(
            b"BT /F1 10 Tf (a) Tj ET BT /F1 10 Tf (b) Tj ET",
            &fonts,
        );
        let all = shows(&ops);
        assert_eq!(all[0].block, Some(0));
        assert_eq!(all[1].block, Some(1));
        // BT/ET carry their block ids too
        let bt_blocks: Vec<Option<u32>> = ops
            .iter()
            .filter_map(|op| match op {
                PageOp::TextState(t) if t.operator == "BT" => Some(t.block),
                _ => None,
            })
            .collect();
        assert_eq!(bt_blocks, vec![Some(0), Some(1)]);
    }

    #[test]
    fn test_nested_bt_tolerated() {
        let fonts = simple_fonts();
        let ops = interpret(b"BT BT /F1 10 Tf (x) Tj ET ET", &fonts);
        let show = shows(&ops)[0];
        assert_eq!(show.block, Some(1));
    }

    #[test]
    fn test_unknown_operator_passes_through() {
        let ops = interpret(b"1 2 zz", &no_fonts());
        assert_eq!(ops.len(), 1);
        match &ops[0] {
            PageOp::State(s) => assert_eq!(s.operator, "zz"),
            other => panic!("expected state op, got {:?}", other),
        }
    }

    #[test]
    fn test_missing_font_falls_back() {
        let ops = interpret(b"BT /Nope 10 Tf (ok) Tj ET", &no_fonts());
        let show = shows(&ops)[0];
        assert_eq!(show.text, "ok");
        assert!(!show.is_cid);
    }

    #[test]
    fn test_show_outside_bt_gets_own_block() {
        let fonts = simple_fonts();
        let ops = interpret(b"/F1 10 Tf (loose) Tj", &fonts);
        let show = shows(&ops)[0];
        assert!(show.block.is_some());
    }
}
