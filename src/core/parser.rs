//! Operator parsing for content streams.
//!
//! Drives the lexer to build `(operator, operands...)` tuples. Every emitted
//! operation carries a monotonically increasing stream position starting at
//! zero; that integer is the sole sort key the serializer uses, so parse
//! order fully determines output order.
//!
//! The parser is deliberately tolerant: malformed tokens or operand shapes
//! are logged and skipped so one broken operator never loses a page.

use super::error::{RedactError, RedactResult};
use super::lexer::{self, Lexer, Token};
use rustc_hash::FxHashMap;
use smallvec::SmallVec;

/// A single operand of a content-stream operator.
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    /// Numeric operand (integers and reals)
    Number(f64),

    /// String operand; `hex` records whether the source syntax was `<...>`
    String { bytes: Vec<u8>, hex: bool },

    /// Name operand (`/F1`)
    Name(String),

    /// Boolean operand
    Boolean(bool),

    /// Null operand
    Null,

    /// Array operand (`TJ` arrays, dash patterns)
    Array(Vec<Operand>),

    /// Dictionary operand (`BDC` property lists, inline-image parameters)
    Dict(FxHashMap<String, Operand>),
}

impl Operand {
    /// Numeric value, if this operand is a number.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Operand::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Name value, if this operand is a name.
    pub fn as_name(&self) -> Option<&str> {
        match self {
            Operand::Name(n) => Some(n),
            _ => None,
        }
    }

    /// String bytes, if this operand is a (literal or hex) string.
    pub fn as_string(&self) -> Option<&[u8]> {
        match self {
            Operand::String { bytes, .. } => Some(bytes),
            _ => None,
        }
    }

    /// Array elements, if this operand is an array.
    pub fn as_array(&self) -> Option<&[Operand]> {
        match self {
            Operand::Array(items) => Some(items),
            _ => None,
        }
    }
}

/// Operand list; nearly every operator takes six or fewer.
pub type Operands = SmallVec<[Operand; 6]>;

/// A parsed `(operator, operands...)` tuple with its stream position.
#[derive(Debug, Clone)]
pub struct RawOp {
    /// Operator keyword exactly as written (`q`, `Tj`, `f*`, ...)
    pub operator: String,

    /// Operands read before the operator
    pub operands: Operands,

    /// Monotonically increasing position assigned at parse time
    pub pos: u32,
}

/// An inline image captured as one unit: the parameter dictionary, the raw
/// data bytes between `ID` and `EI`, and the full `BI ... EI` source span.
#[derive(Debug, Clone)]
pub struct RawInlineImage {
    /// Parameter entries between `BI` and `ID` (keys without the slash)
    pub params: FxHashMap<String, Operand>,

    /// Raw (still filtered) image data between `ID` and `EI`
    pub data: Vec<u8>,

    /// The complete source bytes from `BI` through `EI`
    pub raw: Vec<u8>,

    /// Stream position of the whole image
    pub pos: u32,
}

/// One item of parsed content: an operator tuple or an inline image.
#[derive(Debug, Clone)]
pub enum RawContent {
    Op(RawOp),
    InlineImage(RawInlineImage),
}

impl RawContent {
    /// Stream position of this item.
    pub fn pos(&self) -> u32 {
        match self {
            RawContent::Op(op) => op.pos,
            RawContent::InlineImage(img) => img.pos,
        }
    }
}

/// Streaming operator parser over a decompressed content stream.
pub struct ContentParser<'a> {
    lexer: Lexer<'a>,
    next_pos: u32,
}

impl<'a> ContentParser<'a> {
    /// Creates a parser over content-stream bytes.
    pub fn new(data: &'a [u8]) -> Self {
        ContentParser {
            lexer: Lexer::new(data),
            next_pos: 0,
        }
    }

    /// Parses the entire stream into a content list.
    pub fn parse_all(data: &'a [u8]) -> Vec<RawContent> {
        let mut parser = ContentParser::new(data);
        let mut out = Vec::new();
        while let Some(item) = parser.next_content() {
            out.push(item);
        }
        out
    }

    /// Reads the next operation, skipping anything malformed.
    ///
    /// Returns `None` at end of stream.
    pub fn next_content(&mut self) -> Option<RawContent> {
        let mut operands: Operands = SmallVec::new();

        loop {
            let before = self.lexer.offset();
            let token = match self.lexer.next_token() {
                Ok(t) => t,
                Err(e) => {
                    log::warn!("skipping malformed token: {}", e);
                    operands.clear();
                    continue;
                }
            };

            match token {
                Token::Eof => {
                    if !operands.is_empty() {
                        log::warn!(
                            "content stream ended with {} dangling operand(s)",
                            operands.len()
                        );
                    }
                    return None;
                }
                Token::Keyword(op) => {
                    if op == "BI" {
                        match self.parse_inline_image(before) {
                            Ok(img) => return Some(RawContent::InlineImage(img)),
                            Err(e) => {
                                log::warn!("skipping malformed inline image: {}", e);
                                operands.clear();
                                continue;
                            }
                        }
                    }
                    let pos = self.take_pos();
                    return Some(RawContent::Op(RawOp {
                        operator: op,
                        operands,
                        pos,
                    }));
                }
                Token::ArrayEnd | Token::DictEnd => {
                    log::warn!("stray closing delimiter at byte {}", before);
                    operands.clear();
                }
                other => match self.parse_value(other, 0) {
                    Ok(value) => operands.push(value),
                    Err(e) => {
                        log::warn!("skipping malformed operand: {}", e);
                        operands.clear();
                    }
                },
            }
        }
    }

    fn take_pos(&mut self) -> u32 {
        let pos = self.next_pos;
        self.next_pos += 1;
        pos
    }

    /// Converts a token into an operand, recursing into arrays and
    /// dictionaries. Nesting is bounded so a hostile stream cannot blow the
    /// stack.
    fn parse_value(&mut self, token: Token, depth: usize) -> RedactResult<Operand> {
        const MAX_NESTING: usize = 32;
        if depth > MAX_NESTING {
            return Err(RedactError::parse(
                self.lexer.offset(),
                "operand nesting too deep",
            ));
        }
        match token {
            Token::Number(n) => Ok(Operand::Number(n)),
            Token::String(bytes) => Ok(Operand::String { bytes, hex: false }),
            Token::HexString(bytes) => Ok(Operand::String { bytes, hex: true }),
            Token::Name(name) => Ok(Operand::Name(name)),
            Token::Boolean(b) => Ok(Operand::Boolean(b)),
            Token::Null => Ok(Operand::Null),
            Token::ArrayStart => self.parse_array(depth + 1),
            Token::DictStart => self.parse_dict(depth + 1).map(Operand::Dict),
            other => Err(RedactError::parse(
                self.lexer.offset(),
                format!("unexpected token {:?} in operand position", other),
            )),
        }
    }

    fn parse_array(&mut self, depth: usize) -> RedactResult<Operand> {
        let mut items = Vec::new();
        loop {
            let token = self.lexer.next_token()?;
            match token {
                Token::ArrayEnd => return Ok(Operand::Array(items)),
                Token::Eof => {
                    return Err(RedactError::parse(
                        self.lexer.offset(),
                        "unterminated array",
                    ));
                }
                other => items.push(self.parse_value(other, depth)?),
            }
        }
    }

    fn parse_dict(&mut self, depth: usize) -> RedactResult<FxHashMap<String, Operand>> {
        let mut dict = FxHashMap::default();
        loop {
            let token = self.lexer.next_token()?;
            let key = match token {
                Token::DictEnd => return Ok(dict),
                Token::Eof => {
                    return Err(RedactError::parse(
                        self.lexer.offset(),
                        "unterminated dictionary",
                    ));
                }
                Token::Name(name) => name,
                other => {
                    return Err(RedactError::parse(
                        self.lexer.offset(),
                        format!("dictionary key must be a name, got {:?}", other),
                    ));
                }
            };

            let value_token = self.lexer.next_token()?;
            if value_token == Token::DictEnd {
                dict.insert(key, Operand::Null);
                return Ok(dict);
            }
            let value = self.parse_value(value_token, depth)?;
            dict.insert(key, value);
        }
    }

    /// Parses `BI <params> ID <data> EI` into one inline-image item.
    ///
    /// `bi_offset` is the byte offset just before the `BI` keyword (possibly
    /// pointing at leading whitespace, which is trimmed from the raw span).
    fn parse_inline_image(&mut self, bi_offset: usize) -> RedactResult<RawInlineImage> {
        let mut params = FxHashMap::default();

        loop {
            let token = self.lexer.next_token()?;
            let key = match token {
                Token::Keyword(ref k) if k == "ID" => break,
                Token::Name(name) => name,
                Token::Eof => {
                    return Err(RedactError::parse(
                        self.lexer.offset(),
                        "inline image without ID marker",
                    ));
                }
                other => {
                    return Err(RedactError::parse(
                        self.lexer.offset(),
                        format!("inline image parameter key must be a name, got {:?}", other),
                    ));
                }
            };

            let value_token = self.lexer.next_token()?;
            let value = self.parse_value(value_token, 0)?;
            params.insert(key, value);
        }

        let (data_start, data_end) = self.lexer.take_inline_data()?;
        let data = self.lexer.data()[data_start..data_end].to_vec();

        let stream = self.lexer.data();
        let mut raw_start = bi_offset;
        while raw_start < stream.len() && lexer::is_whitespace(stream[raw_start]) {
            raw_start += 1;
        }
        let raw = stream[raw_start..self.lexer.offset()].to_vec();

        Ok(RawInlineImage {
            params,
            data,
            raw,
            pos: self.take_pos(),
        })
    }
}
