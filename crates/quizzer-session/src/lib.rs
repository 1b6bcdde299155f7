//! Admin authentication and authorization for Quizzer.
//!
//! This crate answers one question: may this identity run this admin
//! action right now? It is built from small pieces:
//!
//! 1. **Throttling** ([`RateLimiter`], [`LockoutTracker`]): per-identity
//!    cooldowns and failed-attempt lockouts
//! 2. **Credentials** ([`CredentialStore`]): password hashes and hostmask
//!    allow-lists, behind a pluggable [`PasswordScheme`]
//! 3. **Strategies** ([`Verifier`] implementations, one per
//!    [`VerificationMethod`])
//! 4. **Sessions** ([`SessionManager`]): timed sessions and actions
//!    parked on an external confirmation
//!
//! # How it fits in the stack
//!
//! ```text
//! Controller (above)  ← asks SessionManager before running admin actions
//!     ↕
//! Session Layer (this crate)
//!     ↕
//! Protocol Layer (below)  ← provides Identity, Hostmask
//! ```
//!
//! The round crate reuses [`RateLimiter`] for answer cooldowns.

mod credentials;
mod error;
mod hash;
mod hostmask;
mod limiter;
mod manager;
mod session;
mod strategy;

pub use credentials::{AccountRecord, AdminAccount, CredentialSnapshot, CredentialStore};
pub use error::{CredentialError, SessionError};
pub use hash::{Argon2Scheme, HashCheck, PasswordScheme, legacy_sha256_hex};
pub use hostmask::{HostmaskPattern, mask_matches};
pub use limiter::{LockoutTracker, RateLimiter};
pub use manager::{Authorization, SessionManager};
pub use session::{AuthConfig, Session, SessionTable};
pub use strategy::{
    CombinedVerifier, Evidence, HostmaskVerifier, IdentityService, NoRegistrar, PasswordVerifier,
    RegistrarVerifier, Strategy, VerificationMethod, Verifier, VerifyOutcome,
};
