//! Content-level PDF redaction.
//!
//! This crate rewrites decompressed PDF page content streams so that text,
//! vector shapes, and image regions covered by redaction rectangles are
//! irreversibly removed, not merely painted over. The entry point is
//! [`core::redact_page`]; the outer PDF reader/writer (object parsing,
//! stream decompression, file output) lives with the caller.

pub mod core;

// Re-export main types for convenience
pub use core::{
    FontDict, FontInfo, LetterBox, Matrix, Rect, RedactAction, RedactActionKind, RedactError,
    RedactResult, RedactionOutcome, RedactionRequest, ReplacementImage, VerificationResult,
    XObjectImage, redact_page,
};
