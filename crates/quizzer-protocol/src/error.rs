//! Error types for the protocol layer.
//!
//! Each crate in Quizzer defines its own error enum. A `ProtocolError`
//! always means the input itself was malformed: a bad chat command, a
//! question with no matching correct label, a JSON document of the wrong
//! shape. Nothing here ever touches round or session state.

/// Errors that can occur while parsing or validating protocol values.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// A JSON document could not be decoded into the expected type.
    ///
    /// Common causes: a question file with a missing `correct` field,
    /// or a credential snapshot written by hand with a typo.
    #[cfg(feature = "json")]
    #[error("decode failed: {0}")]
    Decode(serde_json::Error),

    /// A value could not be encoded to JSON.
    #[cfg(feature = "json")]
    #[error("encode failed: {0}")]
    Encode(serde_json::Error),

    /// A recognised command was given the wrong arguments.
    ///
    /// The payload is the usage line, ready to be sent back to the
    /// requester as a notice.
    #[error("usage: {0}")]
    Usage(&'static str),

    /// An identity string was empty or contained whitespace.
    #[error("invalid identity: {0:?}")]
    InvalidIdentity(String),

    /// A question failed validation (no answers, unknown correct label,
    /// duplicate labels after case folding).
    #[error("invalid question: {0}")]
    InvalidQuestion(String),
}
