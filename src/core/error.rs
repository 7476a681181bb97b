use std::fmt;

use super::geometry::Rect;

/// Universal error type for redaction operations.
///
/// Covers every failure the engine can hit, from lexing a content stream
/// to verifying the rewritten output. Most kinds are recoverable inside the
/// pipeline (the offending operator, path, or image is skipped or dropped);
/// only `VerificationFailed` must reach the caller as a redaction-level
/// failure.
#[derive(Debug, Clone, PartialEq)]
pub enum RedactError {
    /// Malformed token in the content stream
    Lex { position: usize, reason: String },

    /// Unexpected operand shape for an operator
    Parse { position: usize, reason: String },

    /// Decoding or re-encoding a byte string failed beyond fallback
    Encoding { font: String },

    /// Polygon operation produced no valid output
    PathClip,

    /// Image data could not be decoded
    ImageDecode { name: String },

    /// A target term is still extractable inside a redaction rectangle
    VerificationFailed { term: String, bbox: Rect },

    /// Feature not supported by this engine
    Unsupported { feature: String },

    /// Generic error with message
    Generic(String),
}

impl fmt::Display for RedactError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RedactError::Lex { position, reason } => {
                write!(f, "Lex error at byte {}: {}", position, reason)
            }
            RedactError::Parse { position, reason } => {
                write!(f, "Parse error at byte {}: {}", position, reason)
            }
            RedactError::Encoding { font } => {
                write!(f, "Encoding error for font '{}'", font)
            }
            RedactError::PathClip => {
                write!(f, "Path clipping produced no valid output")
            }
            RedactError::ImageDecode { name } => {
                write!(f, "Image decode failed for '{}'", name)
            }
            RedactError::VerificationFailed { term, bbox } => {
                write!(
                    f,
                    "Verification failed: term '{}' still extractable at ({:.2}, {:.2})-({:.2}, {:.2})",
                    term, bbox.left, bbox.bottom, bbox.right, bbox.top
                )
            }
            RedactError::Unsupported { feature } => {
                write!(f, "Unsupported feature: {}", feature)
            }
            RedactError::Generic(msg) => {
                write!(f, "{}", msg)
            }
        }
    }
}

impl RedactError {
    /// Creates a lex error.
    pub fn lex<S: Into<String>>(position: usize, reason: S) -> Self {
        RedactError::Lex {
            position,
            reason: reason.into(),
        }
    }

    /// Creates a parse error.
    pub fn parse<S: Into<String>>(position: usize, reason: S) -> Self {
        RedactError::Parse {
            position,
            reason: reason.into(),
        }
    }

    /// Creates an encoding error.
    pub fn encoding<S: Into<String>>(font: S) -> Self {
        RedactError::Encoding { font: font.into() }
    }

    /// Creates an image decode error.
    pub fn image_decode<S: Into<String>>(name: S) -> Self {
        RedactError::ImageDecode { name: name.into() }
    }

    /// Creates a verification failure.
    pub fn verification_failed<S: Into<String>>(term: S, bbox: Rect) -> Self {
        RedactError::VerificationFailed {
            term: term.into(),
            bbox,
        }
    }

    /// Creates an unsupported feature error.
    pub fn unsupported<S: Into<String>>(feature: S) -> Self {
        RedactError::Unsupported {
            feature: feature.into(),
        }
    }

    /// Returns true if this error is recoverable inside the pipeline.
    ///
    /// Recoverable errors cause the offending operation to be skipped or
    /// dropped; only verification failures must abort the redaction.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, RedactError::VerificationFailed { .. })
    }
}

impl std::error::Error for RedactError {}

/// Result type alias for redaction operations
pub type RedactResult<T> = Result<T, RedactError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = RedactError::lex(42, "unterminated string");
        assert_eq!(format!("{}", err), "Lex error at byte 42: unterminated string");

        let err = RedactError::parse(7, "operator expects numbers");
        assert_eq!(format!("{}", err), "Parse error at byte 7: operator expects numbers");

        let err = RedactError::encoding("F1");
        assert_eq!(format!("{}", err), "Encoding error for font 'F1'");

        let err = RedactError::image_decode("Im0");
        assert_eq!(format!("{}", err), "Image decode failed for 'Im0'");

        let err = RedactError::unsupported("JBIG2 inline images");
        assert_eq!(format!("{}", err), "Unsupported feature: JBIG2 inline images");
    }

    #[test]
    fn test_error_creation_methods() {
        let err = RedactError::lex(10, "bad hex digit");
        match err {
            RedactError::Lex { position, reason } => {
                assert_eq!(position, 10);
                assert_eq!(reason, "bad hex digit");
            }
            _ => panic!("Expected Lex"),
        }

        let err = RedactError::verification_failed("SSN", Rect::new(0.0, 0.0, 10.0, 10.0));
        match err {
            RedactError::VerificationFailed { term, bbox } => {
                assert_eq!(term, "SSN");
                assert_eq!(bbox.right, 10.0);
            }
            _ => panic!("Expected VerificationFailed"),
        }
    }

    #[test]
    fn test_recoverability() {
        assert!(RedactError::PathClip.is_recoverable());
        assert!(RedactError::image_decode("Im1").is_recoverable());
        assert!(RedactError::lex(0, "x").is_recoverable());
        assert!(
            !RedactError::verification_failed("x", Rect::new(0.0, 0.0, 1.0, 1.0)).is_recoverable()
        );
    }

    #[test]
    fn test_error_chain_compatibility() {
        let err = RedactError::Generic("boom".to_string());
        let _dyn_err: &dyn std::error::Error = &err;

        let result: RedactResult<()> = Err(err);
        assert!(result.is_err());
    }
}
