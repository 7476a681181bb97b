//! Graphics and text state tracking.
//!
//! One [`PageState`] holds everything the interpreter needs to place a
//! glyph or a path point in page coordinates: the CTM, the two text
//! matrices, and the scalar text parameters. A stack of full snapshots
//! backs `q`/`Q`; an unbalanced `Q` is ignored rather than treated as an
//! error.

use super::geometry::Matrix;

/// Complete per-page interpreter state.
#[derive(Debug, Clone)]
pub struct PageState {
    /// Current transformation matrix
    pub ctm: Matrix,

    /// Text matrix (valid inside `BT ... ET`)
    pub text_matrix: Matrix,

    /// Text line matrix (valid inside `BT ... ET`)
    pub text_line_matrix: Matrix,

    /// Current font resource name (without slash)
    pub font_name: Option<String>,

    /// Raw `Tf` size, independent of any matrix scaling
    pub font_size: f64,

    /// `Tc` character spacing
    pub char_spacing: f64,

    /// `Tw` word spacing
    pub word_spacing: f64,

    /// `Tz` horizontal scaling in percent (default 100)
    pub horizontal_scaling: f64,

    /// `TL` text leading
    pub leading: f64,

    /// `Tr` text rendering mode
    pub render_mode: i32,

    /// `Ts` text rise
    pub rise: f64,

    /// True between `BT` and `ET`
    pub in_text_object: bool,
}

impl Default for PageState {
    fn default() -> Self {
        PageState {
            ctm: Matrix::identity(),
            text_matrix: Matrix::identity(),
            text_line_matrix: Matrix::identity(),
            font_name: None,
            font_size: 0.0,
            char_spacing: 0.0,
            word_spacing: 0.0,
            horizontal_scaling: 100.0,
            leading: 0.0,
            render_mode: 0,
            rise: 0.0,
            in_text_object: false,
        }
    }
}

impl PageState {
    /// Text rendering matrix: `Tm · CTM`. Glyph layout happens in the space
    /// this matrix maps into.
    pub fn text_rendering_matrix(&self) -> Matrix {
        self.text_matrix.multiply(&self.ctm)
    }

    /// Effective font size: raw `Tf` size scaled by the text matrix Y-scale.
    ///
    /// Layout uses this value; serialization must never use it in a
    /// synthesized `Tf`.
    pub fn effective_font_size(&self) -> f64 {
        self.font_size * self.text_rendering_matrix().d.abs()
    }
}

/// The interpreter's state plus the `q`/`Q` snapshot stack.
#[derive(Debug, Default)]
pub struct StateStack {
    current: PageState,
    saved: Vec<PageState>,
}

impl StateStack {
    /// Fresh state with identity matrices.
    pub fn new() -> Self {
        StateStack::default()
    }

    /// Current state, read-only.
    pub fn state(&self) -> &PageState {
        &self.current
    }

    /// Current state, mutable.
    pub fn state_mut(&mut self) -> &mut PageState {
        &mut self.current
    }

    /// `q`: push a snapshot.
    pub fn save(&mut self) {
        self.saved.push(self.current.clone());
    }

    /// `Q`: restore the last snapshot. An unbalanced restore is ignored.
    pub fn restore(&mut self) {
        if let Some(saved) = self.saved.pop() {
            self.current = saved;
        }
    }

    /// Current nesting depth.
    pub fn depth(&self) -> usize {
        self.saved.len()
    }

    /// `cm`: prepend a matrix to the CTM.
    pub fn concat_ctm(&mut self, m: &Matrix) {
        self.current.ctm = m.multiply(&self.current.ctm);
    }

    /// `BT`: enter a text object and reset both text matrices.
    pub fn begin_text(&mut self) {
        self.current.in_text_object = true;
        self.current.text_matrix = Matrix::identity();
        self.current.text_line_matrix = Matrix::identity();
    }

    /// `ET`: leave the text object.
    pub fn end_text(&mut self) {
        self.current.in_text_object = false;
    }

    /// `Tf`: set the font name and raw size.
    pub fn set_font(&mut self, name: &str, size: f64) {
        self.current.font_name = Some(name.trim_start_matches('/').to_string());
        self.current.font_size = size;
    }

    /// `Td`: translate the line matrix and copy it into the text matrix.
    pub fn move_text(&mut self, tx: f64, ty: f64) {
        self.current.text_line_matrix =
            Matrix::translate(tx, ty).multiply(&self.current.text_line_matrix);
        self.current.text_matrix = self.current.text_line_matrix;
    }

    /// `TD`: as `Td`, and set leading to `-ty`.
    pub fn move_text_set_leading(&mut self, tx: f64, ty: f64) {
        self.current.leading = -ty;
        self.move_text(tx, ty);
    }

    /// `Tm`: set both text matrices.
    pub fn set_text_matrix(&mut self, m: Matrix) {
        self.current.text_matrix = m;
        self.current.text_line_matrix = m;
    }

    /// `T*`: next line using the current leading.
    pub fn next_line(&mut self) {
        self.move_text(0.0, -self.current.leading);
    }

    /// Advances the text matrix after a show operator.
    pub fn advance_text(&mut self, tx: f64) {
        self.current.text_matrix =
            Matrix::translate(tx, 0.0).multiply(&self.current.text_matrix);
    }
}
