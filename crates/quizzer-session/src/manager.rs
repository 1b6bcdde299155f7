//! The session manager: decides whether an admin request may proceed.
//!
//! This is the central piece of the session layer. It's responsible for:
//! - Running the configured verification strategy
//! - Issuing, checking and expiring sessions
//! - Parking actions that wait on an external confirmation
//!
//! # Deferred actions
//!
//! With the external-registrar method, verification finishes later, when
//! the network's identity service answers. The manager keeps at most one
//! parked action per identity. A newer request from the same identity
//! replaces the older one, so the last action asked for is the one that
//! runs.
//!
//! ```text
//! authorize() ──→ Granted(action)                      (verified now)
//!      │
//!      ├──────→ Deferred ──→ on_external_verification_result()
//!      │                           │
//!      │                           ▼
//!      │                     Some(action) / None
//!      │
//!      └──────→ Denied(outcome)                        (rejected / locked out)
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;

use quizzer_protocol::Identity;

use crate::strategy::{
    CombinedVerifier, HostmaskVerifier, PasswordVerifier, RegistrarVerifier, Strategy,
};
use crate::{
    AuthConfig, CredentialStore, Evidence, IdentityService, LockoutTracker, SessionTable,
    VerificationMethod, Verifier, VerifyOutcome,
};

/// What [`SessionManager::authorize`] decided.
#[derive(Debug, PartialEq, Eq)]
pub enum Authorization<A> {
    /// Verified; run the action now.
    Granted(A),
    /// Parked until the identity service answers.
    Deferred,
    /// Not verified. The outcome tells a lockout apart from a plain
    /// rejection; nothing tells an unknown identity apart from a wrong
    /// credential.
    Denied(VerifyOutcome),
}

/// Gatekeeper for admin actions of type `A`.
pub struct SessionManager<A, I> {
    config: AuthConfig,
    strategy: Strategy<I>,
    credentials: Arc<CredentialStore>,
    lockouts: Arc<LockoutTracker>,
    sessions: Arc<SessionTable>,
    pending: Mutex<HashMap<Identity, A>>,
}

impl<A, I> SessionManager<A, I>
where
    A: Send + 'static,
    I: IdentityService,
{
    /// Builds the manager and the strategy for `method`.
    pub fn new(
        method: VerificationMethod,
        config: AuthConfig,
        credentials: Arc<CredentialStore>,
        registrar: I,
    ) -> Self {
        let lockouts = Arc::new(LockoutTracker::new(
            config.max_failed_attempts,
            config.lockout_duration(),
        ));
        let sessions = Arc::new(SessionTable::new(config.session_timeout()));
        let password = || {
            PasswordVerifier::new(
                Arc::clone(&credentials),
                Arc::clone(&lockouts),
                Arc::clone(&sessions),
            )
        };

        let strategy = match method {
            VerificationMethod::Password => Strategy::Password(password()),
            VerificationMethod::Hostmask => {
                Strategy::Hostmask(HostmaskVerifier::new(Arc::clone(&credentials)))
            }
            VerificationMethod::ExternalRegistrar => Strategy::ExternalRegistrar(
                RegistrarVerifier::new(Arc::clone(&credentials), Arc::new(registrar)),
            ),
            VerificationMethod::Combined => Strategy::Combined(CombinedVerifier::new(
                password(),
                HostmaskVerifier::new(Arc::clone(&credentials)),
            )),
        };

        tracing::info!(?method, "session manager ready");
        Self {
            config,
            strategy,
            credentials,
            lockouts,
            sessions,
            pending: Mutex::new(HashMap::new()),
        }
    }

    pub fn method(&self) -> VerificationMethod {
        self.strategy.method()
    }

    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    pub fn credentials(&self) -> &Arc<CredentialStore> {
        &self.credentials
    }

    pub fn lockouts(&self) -> &Arc<LockoutTracker> {
        &self.lockouts
    }

    /// Runs the configured strategy once.
    pub async fn verify(&self, identity: &Identity, evidence: &Evidence) -> VerifyOutcome {
        self.strategy.verify(identity, evidence).await
    }

    /// Decides whether `identity` may run `action`.
    ///
    /// For the external-registrar method the action is parked (replacing
    /// any earlier one from the same identity) before the identity service
    /// is asked, and the lock is released before that request goes out.
    pub async fn authorize(&self, identity: &Identity, evidence: &Evidence, action: A) -> Authorization<A> {
        if self.method() == VerificationMethod::ExternalRegistrar {
            if !self.credentials.is_account(identity).await {
                return Authorization::Denied(VerifyOutcome::Rejected);
            }
            let replaced = self
                .pending
                .lock()
                .await
                .insert(identity.clone(), action)
                .is_some();
            if replaced {
                tracing::debug!(%identity, "pending admin action replaced");
            }

            return match self.verify(identity, evidence).await {
                VerifyOutcome::Pending => Authorization::Deferred,
                VerifyOutcome::Verified => match self.pending.lock().await.remove(identity) {
                    Some(action) => Authorization::Granted(action),
                    None => Authorization::Deferred,
                },
                outcome => {
                    self.pending.lock().await.remove(identity);
                    Authorization::Denied(outcome)
                }
            };
        }

        match self.verify(identity, evidence).await {
            VerifyOutcome::Verified => Authorization::Granted(action),
            outcome => {
                tracing::warn!(%identity, ?outcome, "admin action denied");
                Authorization::Denied(outcome)
            }
        }
    }

    /// Resolves a parked action.
    ///
    /// Returns the action to run when the service confirmed the identity
    /// and an action was waiting. A confirmation does not create a
    /// session: every later admin action asks the service again.
    pub async fn on_external_verification_result(&self, identity: &Identity, confirmed: bool) -> Option<A> {
        let action = self.pending.lock().await.remove(identity);
        match (action, confirmed) {
            (Some(_), true) if !self.credentials.is_account(identity).await => {
                tracing::warn!(%identity, "confirmed identity is no longer an admin");
                None
            }
            (Some(action), true) => {
                tracing::info!(%identity, "external verification confirmed");
                Some(action)
            }
            (Some(_), false) => {
                tracing::warn!(%identity, "external verification refused");
                None
            }
            (None, _) => {
                tracing::debug!(%identity, "external verification result with nothing pending");
                None
            }
        }
    }

    /// Whether an action is parked for `identity`.
    pub async fn has_pending(&self, identity: &Identity) -> bool {
        self.pending.lock().await.contains_key(identity)
    }

    /// Explicit password login, regardless of any live session.
    ///
    /// Meaningful for the password and combined methods; the caller checks
    /// [`VerificationMethod::uses_passwords`] first.
    pub async fn login(&self, identity: &Identity, password: &str) -> VerifyOutcome {
        let verifier = PasswordVerifier::new(
            Arc::clone(&self.credentials),
            Arc::clone(&self.lockouts),
            Arc::clone(&self.sessions),
        );
        verifier.check_password(identity, password).await
    }

    /// Ends a session early. Returns whether there was one.
    pub async fn logout(&self, identity: &Identity) -> bool {
        let had = self.sessions.invalidate(identity).await;
        if had {
            tracing::info!(%identity, "session ended by logout");
        }
        had
    }

    pub async fn has_valid_session(&self, identity: &Identity) -> bool {
        self.sessions.is_valid(identity).await
    }

    /// Drops the session and any parked action of `identity`.
    ///
    /// Called when an account is removed, so its rights end at once.
    /// Returns whether anything was dropped.
    pub async fn revoke(&self, identity: &Identity) -> bool {
        let had_session = self.sessions.invalidate(identity).await;
        let had_pending = self.pending.lock().await.remove(identity).is_some();
        if had_session || had_pending {
            tracing::info!(%identity, had_session, had_pending, "admin rights revoked");
        }
        had_session || had_pending
    }

    /// Sweeps every expired session.
    pub async fn expire_stale(&self) -> Vec<Identity> {
        self.sessions.expire_stale().await
    }

    /// Session lifetime in whole minutes, for user-facing replies.
    pub fn session_minutes(&self) -> u64 {
        self.config.session_timeout_secs / 60
    }
}
