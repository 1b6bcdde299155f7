//! Verification strategies.
//!
//! Each configured [`VerificationMethod`] maps onto one concrete strategy.
//! All of them implement [`Verifier`], so the session manager only ever
//! calls `verify(identity, evidence)` and reacts to the [`VerifyOutcome`].

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use quizzer_protocol::{Hostmask, Identity};

use crate::{CredentialStore, LockoutTracker, SessionError, SessionTable};

// ---------------------------------------------------------------------------
// Method, evidence and outcome
// ---------------------------------------------------------------------------

/// How admins prove who they are.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerificationMethod {
    /// A per-account password, exchanged for a timed session.
    Password,
    /// The sender's `nick!user@host` must match an allowed pattern.
    Hostmask,
    /// The network's identity service (e.g. NickServ) vouches for the nick.
    #[default]
    #[serde(alias = "nickserv")]
    ExternalRegistrar,
    /// Session, then password, then hostmask.
    Combined,
}

impl VerificationMethod {
    /// Whether this method ever looks at passwords.
    pub fn uses_passwords(self) -> bool {
        matches!(self, Self::Password | Self::Combined)
    }

    pub fn uses_hostmasks(self) -> bool {
        matches!(self, Self::Hostmask | Self::Combined)
    }
}

/// Whatever the caller presented alongside a request.
#[derive(Debug, Clone, Default)]
pub struct Evidence {
    pub password: Option<String>,
    pub hostmask: Option<Hostmask>,
}

impl Evidence {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn password(password: impl Into<String>) -> Self {
        Self {
            password: Some(password.into()),
            hostmask: None,
        }
    }

    pub fn hostmask(mask: Hostmask) -> Self {
        Self {
            password: None,
            hostmask: Some(mask),
        }
    }
}

/// Result of one verification attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerifyOutcome {
    Verified,
    /// Generic failure. Never says whether the account exists.
    Rejected,
    /// Password attempts are suspended for this many more seconds.
    LockedOut { remaining_secs: u64 },
    /// An external confirmation has been requested.
    Pending,
}

impl VerifyOutcome {
    pub fn is_verified(self) -> bool {
        matches!(self, Self::Verified)
    }
}

/// A verification strategy.
pub trait Verifier: Send + Sync {
    fn verify(
        &self,
        identity: &Identity,
        evidence: &Evidence,
    ) -> impl std::future::Future<Output = VerifyOutcome> + Send;
}

/// Asks the chat network's identity service to confirm a nick.
///
/// The answer arrives later through
/// [`SessionManager::on_external_verification_result`](crate::SessionManager::on_external_verification_result).
pub trait IdentityService: Send + Sync + 'static {
    fn request_verification(
        &self,
        identity: &Identity,
    ) -> impl std::future::Future<Output = Result<(), SessionError>> + Send;
}

/// Identity service for deployments that never use the registrar.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoRegistrar;

impl IdentityService for NoRegistrar {
    async fn request_verification(&self, _identity: &Identity) -> Result<(), SessionError> {
        Err(SessionError::RegistrarUnavailable)
    }
}

// ---------------------------------------------------------------------------
// Password
// ---------------------------------------------------------------------------

/// Session first; otherwise a lockout-gated password check.
pub struct PasswordVerifier {
    credentials: Arc<CredentialStore>,
    lockouts: Arc<LockoutTracker>,
    sessions: Arc<SessionTable>,
}

impl PasswordVerifier {
    pub fn new(
        credentials: Arc<CredentialStore>,
        lockouts: Arc<LockoutTracker>,
        sessions: Arc<SessionTable>,
    ) -> Self {
        Self {
            credentials,
            lockouts,
            sessions,
        }
    }

    /// The password exchange itself, ignoring any live session.
    ///
    /// A locked-out identity is rejected before the credential store is
    /// consulted. Failures are counted for unknown identities too, so the
    /// reply never reveals whether an account exists.
    pub async fn check_password(&self, identity: &Identity, password: &str) -> VerifyOutcome {
        if let Some(remaining_secs) = self.lockouts.is_locked_out(identity).await {
            return VerifyOutcome::LockedOut { remaining_secs };
        }

        if self.credentials.verify_password(identity, password).await {
            self.lockouts.record_success(identity).await;
            self.sessions.issue(identity).await;
            VerifyOutcome::Verified
        } else {
            self.lockouts.record_failure(identity).await;
            tracing::warn!(%identity, "password verification failed");
            VerifyOutcome::Rejected
        }
    }
}

impl Verifier for PasswordVerifier {
    async fn verify(&self, identity: &Identity, evidence: &Evidence) -> VerifyOutcome {
        if self.sessions.is_valid(identity).await {
            if self.credentials.is_account(identity).await {
                return VerifyOutcome::Verified;
            }
            self.sessions.invalidate(identity).await;
            tracing::warn!(%identity, "session of a removed account discarded");
        }
        match &evidence.password {
            Some(password) => self.check_password(identity, password).await,
            None => VerifyOutcome::Rejected,
        }
    }
}

// ---------------------------------------------------------------------------
// Hostmask
// ---------------------------------------------------------------------------

/// Stateless pattern check. No session, no lockout.
pub struct HostmaskVerifier {
    credentials: Arc<CredentialStore>,
}

impl HostmaskVerifier {
    pub fn new(credentials: Arc<CredentialStore>) -> Self {
        Self { credentials }
    }
}

impl Verifier for HostmaskVerifier {
    async fn verify(&self, identity: &Identity, evidence: &Evidence) -> VerifyOutcome {
        match &evidence.hostmask {
            Some(mask) if self.credentials.verify_hostmask(identity, mask).await => {
                VerifyOutcome::Verified
            }
            _ => VerifyOutcome::Rejected,
        }
    }
}

// ---------------------------------------------------------------------------
// External registrar
// ---------------------------------------------------------------------------

/// Hands the identity to the external service and reports `Pending`.
pub struct RegistrarVerifier<I> {
    credentials: Arc<CredentialStore>,
    service: Arc<I>,
}

impl<I: IdentityService> RegistrarVerifier<I> {
    pub fn new(credentials: Arc<CredentialStore>, service: Arc<I>) -> Self {
        Self {
            credentials,
            service,
        }
    }
}

impl<I: IdentityService> Verifier for RegistrarVerifier<I> {
    async fn verify(&self, identity: &Identity, _evidence: &Evidence) -> VerifyOutcome {
        if !self.credentials.is_account(identity).await {
            return VerifyOutcome::Rejected;
        }
        match self.service.request_verification(identity).await {
            Ok(()) => VerifyOutcome::Pending,
            Err(e) => {
                tracing::warn!(%identity, error = %e, "could not request external verification");
                VerifyOutcome::Rejected
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Combined
// ---------------------------------------------------------------------------

/// Session, then password, then hostmask. The first success wins.
///
/// A lockout on the password path does not stop a matching hostmask; it is
/// only reported when the hostmask check fails as well.
pub struct CombinedVerifier {
    password: PasswordVerifier,
    hostmask: HostmaskVerifier,
}

impl CombinedVerifier {
    pub fn new(password: PasswordVerifier, hostmask: HostmaskVerifier) -> Self {
        Self { password, hostmask }
    }
}

impl Verifier for CombinedVerifier {
    async fn verify(&self, identity: &Identity, evidence: &Evidence) -> VerifyOutcome {
        let by_password = self.password.verify(identity, evidence).await;
        if by_password.is_verified() {
            return by_password;
        }
        if self.hostmask.verify(identity, evidence).await.is_verified() {
            return VerifyOutcome::Verified;
        }
        by_password
    }
}

// ---------------------------------------------------------------------------
// Strategy
// ---------------------------------------------------------------------------

/// The strategy selected by configuration.
pub enum Strategy<I> {
    Password(PasswordVerifier),
    Hostmask(HostmaskVerifier),
    ExternalRegistrar(RegistrarVerifier<I>),
    Combined(CombinedVerifier),
}

impl<I: IdentityService> Strategy<I> {
    pub fn method(&self) -> VerificationMethod {
        match self {
            Self::Password(_) => VerificationMethod::Password,
            Self::Hostmask(_) => VerificationMethod::Hostmask,
            Self::ExternalRegistrar(_) => VerificationMethod::ExternalRegistrar,
            Self::Combined(_) => VerificationMethod::Combined,
        }
    }
}

impl<I: IdentityService> Verifier for Strategy<I> {
    async fn verify(&self, identity: &Identity, evidence: &Evidence) -> VerifyOutcome {
        match self {
            Self::Password(v) => v.verify(identity, evidence).await,
            Self::Hostmask(v) => v.verify(identity, evidence).await,
            Self::ExternalRegistrar(v) => v.verify(identity, evidence).await,
            Self::Combined(v) => v.verify(identity, evidence).await,
        }
    }
}
