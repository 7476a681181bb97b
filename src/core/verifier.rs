//! Post-redaction verification.
//!
//! The only proof that redaction worked is the output itself: the verifier
//! re-runs the lexer, parser, and interpreter on the emitted bytes with the
//! same font table and asserts that no decodable text containing a target
//! term still sits inside a redaction rectangle. A failure here is the one
//! redaction-level error the caller must observe.

use std::sync::Arc;

use rustc_hash::FxHashMap;

use super::font::FontInfo;
use super::geometry::Rect;
use super::interpreter::interpret;
use super::ops::PageOp;

/// Outcome of verifying an emitted content stream.
#[derive(Debug, Clone, PartialEq)]
pub enum VerificationResult {
    /// Every target term is gone from every redaction rectangle
    Verified,

    /// No redaction rectangles were supplied; nothing to verify
    NoRedactionsRequested,

    /// A term is still extractable inside a redaction rectangle
    TermStillExtractable { term: String, bbox: Rect },
}

impl VerificationResult {
    /// True unless a term survived.
    pub fn is_ok(&self) -> bool {
        !matches!(self, VerificationResult::TermStillExtractable { .. })
    }
}

/// Re-parses `content` and checks every target term against the redaction
/// rectangles.
pub fn verify(
    content: &[u8],
    fonts: &FxHashMap<String, Arc<FontInfo>>,
    rects: &[Rect],
    terms: &[String],
) -> VerificationResult {
    if rects.is_empty() {
        return VerificationResult::NoRedactionsRequested;
    }

    let ops = interpret(content, fonts);
    for op in &ops {
        let show = match op {
            PageOp::TextShow(show) => show,
            _ => continue,
        };
        if !rects.iter().any(|r| show.bbox.intersects(r)) {
            continue;
        }
        for term in terms {
            if !term.is_empty() && show.text.contains(term.as_str()) {
                return VerificationResult::TermStillExtractable {
                    term: term.clone(),
                    bbox: show.bbox,
                };
            }
        }
    }

    VerificationResult::Verified
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::font::{FontDict, resolve_fonts};

    fn fonts() -> FxHashMap<String, Arc<FontInfo>> {
        let mut table = FxHashMap::default();
        table.insert(
            "F1".to_string(),
            FontDict {
                subtype: "Type1".to_string(),
                ..Default::default()
            },
        );
        resolve_fonts(&table)
    }

    #[test]
    fn test_no_rects_is_no_redactions_requested() {
        let result = verify(b"BT /F1 12 Tf (secret) Tj ET", &fonts(), &[], &["secret".into()]);
        assert_eq!(result, VerificationResult::NoRedactionsRequested);
    }

    #[test]
    fn test_clean_stream_verifies() {
        let result = verify(
            b"BT /F1 12 Tf 100 700 Td (Hello) Tj ET",
            &fonts(),
            &[Rect::new(300.0, 300.0, 400.0, 400.0)],
            &["secret".into()],
        );
        assert_eq!(result, VerificationResult::Verified);
    }

    #[test]
    fn test_surviving_term_is_reported() {
        let result = verify(
            b"BT /F1 12 Tf 100 700 Td (top secret data) Tj ET",
            &fonts(),
            &[Rect::new(90.0, 690.0, 300.0, 720.0)],
            &["secret".into()],
        );
        match &result {
            VerificationResult::TermStillExtractable { term, bbox } => {
                assert_eq!(term, "secret");
                assert!(bbox.intersects(&Rect::new(90.0, 690.0, 300.0, 720.0)));
            }
            other => panic!("expected failure, got {:?}", other),
        }
        assert!(!result.is_ok());
    }

    #[test]
    fn test_term_outside_rect_is_fine() {
        // The term exists but sits outside every rectangle
        let result = verify(
            b"BT /F1 12 Tf 100 700 Td (secret) Tj ET",
            &fonts(),
            &[Rect::new(0.0, 0.0, 50.0, 50.0)],
            &["secret".into()],
        );
        assert_eq!(result, VerificationResult::Verified);
    }

    #[test]
    fn test_empty_terms_verify() {
        let result = verify(
            b"BT /F1 12 Tf 100 700 Td (anything) Tj ET",
            &fonts(),
            &[Rect::new(90.0, 690.0, 300.0, 720.0)],
            &[],
        );
        assert_eq!(result, VerificationResult::Verified);
    }

    #[test]
    fn test_empty_stream_with_rects_verifies() {
        let result = verify(b"", &fonts(), &[Rect::new(0.0, 0.0, 10.0, 10.0)], &["x".into()]);
        assert_eq!(result, VerificationResult::Verified);
    }
}
