pub mod classify;
pub mod cmap;
pub mod encoding;
pub mod error;
pub mod font;
pub mod geometry;
pub mod image_redact;
pub mod interpreter;
pub mod lexer;
pub mod ops;
pub mod parser;
pub mod path_clip;
pub mod redactor;
pub mod serializer;
pub mod state;
pub mod text_redact;
pub mod verifier;

pub use cmap::CMap;
pub use encoding::ByteEncoding;
pub use error::{RedactError, RedactResult};
pub use font::{FontDict, FontInfo};
pub use geometry::{Matrix, Rect};
pub use image_redact::{ReplacementImage, XObjectImage};
pub use lexer::{Lexer, Token};
pub use ops::PageOp;
pub use parser::{ContentParser, Operand, RawContent, RawOp};
pub use redactor::{
    RedactAction, RedactActionKind, RedactionOutcome, RedactionRequest, redact_page,
};
pub use text_redact::LetterBox;
pub use verifier::VerificationResult;
