//! Errors raised while parsing or validating envelope metadata.

use thiserror::Error;

/// Envelope-layer error type.
///
/// These are protocol failures and are surfaced to the caller immediately.
/// None of them is ever downgraded to a default value:
/// - [`EnvelopeError::UnknownAlgorithm`] never falls back to "treat as plaintext".
/// - [`EnvelopeError::MissingField`] never substitutes an empty value.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EnvelopeError {
    /// An algorithm name outside the closed enumeration.
    #[error("unknown algorithm: {0}")]
    UnknownAlgorithm(String),

    /// The serialized map is not a flat JSON object of string values.
    #[error("malformed envelope map: {0}")]
    MalformedMap(String),

    /// A required envelope header is absent.
    #[error("missing envelope field: {0}")]
    MissingField(&'static str),

    /// An envelope header is present but its value cannot be decoded.
    #[error("invalid envelope field {field}: {reason}")]
    InvalidField {
        /// Header name of the offending field.
        field: &'static str,
        /// Why the value was rejected.
        reason: String,
    },

    /// The body of an instruction object is unreadable or incomplete.
    #[error("malformed instruction file: {0}")]
    MalformedInstructionFile(String),
}

impl EnvelopeError {
    /// Returns `true` for errors caused by an algorithm name the reader does not know.
    ///
    /// Callers that collapse parsing errors into a coarser kind must keep these distinct.
    pub fn is_unknown_algorithm(&self) -> bool {
        matches!(self, EnvelopeError::UnknownAlgorithm(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_detail() {
        let e = EnvelopeError::UnknownAlgorithm("AES/XTS".into());
        assert!(e.to_string().contains("AES/XTS"));

        let e = EnvelopeError::InvalidField {
            field: "x-amz-iv",
            reason: "bad base64".into(),
        };
        let s = e.to_string();
        assert!(s.contains("x-amz-iv"));
        assert!(s.contains("bad base64"));
    }

    #[test]
    fn unknown_algorithm_is_distinguished() {
        assert!(EnvelopeError::UnknownAlgorithm("x".into()).is_unknown_algorithm());
        assert!(!EnvelopeError::MissingField("x-amz-key-v2").is_unknown_algorithm());
        assert!(!EnvelopeError::MalformedInstructionFile("x".into()).is_unknown_algorithm());
    }
}
