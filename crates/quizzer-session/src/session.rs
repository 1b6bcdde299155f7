//! Session types: proof that an identity recently verified.
//!
//! A session records WHO verified, WHEN that proof runs out, and an opaque
//! token. There is at most one session per identity; verifying again
//! replaces it.
//!
//! ```text
//!   Unauthenticated ──(verify ok)──→ Authenticated
//!         ↑                               │
//!         └────(expiry or logout)─────────┘
//! ```

use std::collections::HashMap;
use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tokio::time::Instant;

use quizzer_protocol::Identity;

// ---------------------------------------------------------------------------
// AuthConfig
// ---------------------------------------------------------------------------

/// Timeouts and limits for admin authentication.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// How long a session stays valid after verification.
    ///
    /// Default: 3600 seconds.
    pub session_timeout_secs: u64,

    /// Failed password attempts before the identity is locked out.
    ///
    /// Default: 3.
    pub max_failed_attempts: u32,

    /// How long a lockout lasts.
    ///
    /// Default: 300 seconds.
    pub lockout_duration_secs: u64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            session_timeout_secs: 3600,
            max_failed_attempts: 3,
            lockout_duration_secs: 300,
        }
    }
}

impl AuthConfig {
    pub fn session_timeout(&self) -> Duration {
        Duration::from_secs(self.session_timeout_secs)
    }

    pub fn lockout_duration(&self) -> Duration {
        Duration::from_secs(self.lockout_duration_secs)
    }
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// One identity's live authorization.
#[derive(Debug, Clone)]
pub struct Session {
    pub identity: Identity,
    pub expires_at: Instant,
    /// 32 hex characters (128 bits of randomness).
    pub token: String,
}

impl Session {
    pub fn is_expired_at(&self, now: Instant) -> bool {
        now >= self.expires_at
    }
}

// ---------------------------------------------------------------------------
// SessionTable
// ---------------------------------------------------------------------------

/// All live sessions behind one mutex.
pub struct SessionTable {
    timeout: Duration,
    sessions: Mutex<HashMap<Identity, Session>>,
}

impl SessionTable {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    /// Issues a fresh session, overwriting any previous one.
    pub async fn issue(&self, identity: &Identity) -> Session {
        let session = Session {
            identity: identity.clone(),
            expires_at: Instant::now() + self.timeout,
            token: generate_token(),
        };
        self.sessions
            .lock()
            .await
            .insert(identity.clone(), session.clone());
        tracing::info!(%identity, timeout_secs = self.timeout.as_secs(), "session issued");
        session
    }

    /// Whether `identity` has an unexpired session. An expired one is
    /// deleted on the way.
    pub async fn is_valid(&self, identity: &Identity) -> bool {
        let now = Instant::now();
        let mut sessions = self.sessions.lock().await;
        match sessions.get(identity) {
            Some(session) if !session.is_expired_at(now) => true,
            Some(_) => {
                sessions.remove(identity);
                tracing::debug!(%identity, "session expired");
                false
            }
            None => false,
        }
    }

    /// Removes a session. Returns whether one existed.
    pub async fn invalidate(&self, identity: &Identity) -> bool {
        self.sessions.lock().await.remove(identity).is_some()
    }

    /// Drops every expired session and returns whose they were.
    pub async fn expire_stale(&self) -> Vec<Identity> {
        let now = Instant::now();
        let mut expired = Vec::new();
        self.sessions.lock().await.retain(|identity, session| {
            if session.is_expired_at(now) {
                expired.push(identity.clone());
                false
            } else {
                true
            }
        });
        for identity in &expired {
            tracing::info!(%identity, "session expired");
        }
        expired
    }

    pub async fn get(&self, identity: &Identity) -> Option<Session> {
        self.sessions.lock().await.get(identity).cloned()
    }

    pub async fn len(&self) -> usize {
        self.sessions.lock().await.len()
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

/// Generates a random 32-character hex string (128 bits of entropy).
fn generate_token() -> String {
    let mut rng = rand::rng();
    let bytes: [u8; 16] = rng.random();
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}
