//! Unified error type for Quizzer.

use std::path::PathBuf;

use quizzer_protocol::ProtocolError;
use quizzer_round::RoundError;
use quizzer_session::{CredentialError, SessionError};
use quizzer_transport::TransportError;

/// Configuration problems found before the bot starts.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("could not read configuration: {0}")]
    Read(#[from] std::io::Error),

    #[error("could not parse configuration: {0}")]
    Parse(#[from] serde_json::Error),

    /// The configuration parsed but cannot run.
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Broad class of a failure, used to decide how it is reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed input. Reported to the requester, no state change.
    Validation,
    /// Not an admin, no session, or locked out. Reported generically.
    Authorization,
    /// Wrong round state, duplicate account and the like. Benign.
    Conflict,
    /// Score or credential storage failed. Logged for the operator.
    Persistence,
    /// Startup cannot continue.
    Fatal,
}

/// Top-level error that wraps all crate-specific errors.
///
/// The `#[from]` attribute on each wrapped variant lets `?` convert
/// sub-crate errors automatically.
#[derive(Debug, thiserror::Error)]
pub enum QuizzerError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error(transparent)]
    Credential(#[from] CredentialError),

    #[error(transparent)]
    Round(#[from] RoundError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Verification failed. Deliberately says nothing more.
    #[error("not authorized")]
    Unauthorized,

    #[error("locked out for {remaining_secs} more seconds")]
    LockedOut { remaining_secs: u64 },

    /// A credential change is in effect but its file was not rewritten.
    #[error("could not save credentials to {}: {source}", path.display())]
    CredentialsSave {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl QuizzerError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Protocol(_) => ErrorKind::Validation,
            Self::Unauthorized | Self::LockedOut { .. } => ErrorKind::Authorization,
            Self::Session(SessionError::RegistrarFailed(_)) => ErrorKind::Authorization,
            Self::Session(SessionError::RegistrarUnavailable) => ErrorKind::Fatal,
            Self::Credential(e) => match e {
                CredentialError::NotAdmin(_) => ErrorKind::Authorization,
                CredentialError::UnknownAccount(_) | CredentialError::InvalidPattern(_) => {
                    ErrorKind::Validation
                }
                CredentialError::AlreadyExists(_) | CredentialError::CannotRemoveSelf => {
                    ErrorKind::Conflict
                }
                CredentialError::Snapshot(_) => ErrorKind::Persistence,
                CredentialError::Hashing(_) => ErrorKind::Fatal,
            },
            Self::Round(e) => match e {
                RoundError::UnknownCategory(_) => ErrorKind::Validation,
                RoundError::NotIdle(_) | RoundError::NotRunning(_) => ErrorKind::Conflict,
                RoundError::Persistence(_) => ErrorKind::Persistence,
                RoundError::QuestionData(_) | RoundError::Io(_) => ErrorKind::Fatal,
            },
            Self::CredentialsSave { .. } => ErrorKind::Persistence,
            Self::Transport(_) | Self::Config(_) => ErrorKind::Fatal,
        }
    }
}
