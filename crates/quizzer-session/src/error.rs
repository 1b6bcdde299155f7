//! Error types for the session layer.

use quizzer_protocol::Identity;

/// Errors raised while talking to verification collaborators.
///
/// Verification outcomes themselves are not errors; they are reported as
/// [`VerifyOutcome`](crate::VerifyOutcome) values so the caller can turn
/// them into the single generic failure message.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// No external identity service is configured.
    #[error("external identity service unavailable")]
    RegistrarUnavailable,

    /// The identity service could not be asked.
    #[error("external verification request failed: {0}")]
    RegistrarFailed(String),
}

/// Errors from credential management.
///
/// Messages name the account because they are only ever shown to an
/// already-authorized admin. Authentication failures never use this type.
#[derive(Debug, thiserror::Error)]
pub enum CredentialError {
    /// The caller is not a recognized admin account.
    #[error("{0} is not an admin")]
    NotAdmin(Identity),

    /// The target account does not exist.
    #[error("no admin account for {0}")]
    UnknownAccount(Identity),

    /// The target account already exists.
    #[error("{0} is already an admin")]
    AlreadyExists(Identity),

    /// An admin tried to remove their own account.
    #[error("an admin cannot remove their own account")]
    CannotRemoveSelf,

    /// A hostmask pattern does not have the `nick!user@host` shape.
    #[error("invalid hostmask pattern {0:?}")]
    InvalidPattern(String),

    /// Password hashing failed or its parameters were rejected.
    #[error("password hashing failed: {0}")]
    Hashing(String),

    /// A credential snapshot could not be read or written.
    #[error("credential snapshot: {0}")]
    Snapshot(#[from] serde_json::Error),
}
