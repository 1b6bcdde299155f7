//! Error types for the round layer.

use crate::RoundState;

/// Errors that can occur during round operations.
#[derive(Debug, thiserror::Error)]
pub enum RoundError {
    /// The category is unknown or has no questions.
    #[error("category {0:?} not found")]
    UnknownCategory(String),

    /// A round is already recruiting or running.
    #[error("a round is already {0}")]
    NotIdle(RoundState),

    /// There is no round to act on.
    #[error("no round is running (state: {0})")]
    NotRunning(RoundState),

    /// The score store failed.
    #[error("score storage failed: {0}")]
    Persistence(String),

    /// A question file could not be parsed.
    #[error("invalid question data: {0}")]
    QuestionData(#[from] serde_json::Error),

    /// A question file could not be read.
    #[error("could not read question file: {0}")]
    Io(#[from] std::io::Error),
}
