//! Password hashing schemes.
//!
//! A [`PasswordScheme`] is chosen when the credential store is built and
//! never changes at runtime. The default, [`Argon2Scheme`], writes Argon2id
//! PHC strings and can still verify one legacy format: an unsalted
//! lower-case SHA-256 hex digest. A legacy match is reported separately so
//! the store can flag the account for a password reset; the stored hash is
//! never rewritten behind the admin's back.
//!
//! Any other stored format (for instance a bcrypt `$2b$` string) fails
//! closed.

use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::{Algorithm, Argon2, Params, Version};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

use crate::CredentialError;

/// Result of checking a plaintext against a stored hash.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HashCheck {
    /// Matched a hash in the scheme's current format.
    Match,
    /// Matched a legacy hash; the account should re-enter its password.
    MatchLegacy,
    Mismatch,
    /// The stored hash is in a format this scheme does not understand.
    Unrecognized,
}

impl HashCheck {
    pub fn is_match(self) -> bool {
        matches!(self, Self::Match | Self::MatchLegacy)
    }
}

/// A password hashing strategy.
///
/// Implementations do CPU-heavy work and are called from a blocking
/// thread, never while a state lock is held.
pub trait PasswordScheme: Send + Sync + 'static {
    /// Hashes a new password.
    fn hash(&self, plaintext: &str) -> Result<String, CredentialError>;

    /// Checks `plaintext` against a stored hash.
    fn verify(&self, plaintext: &str, stored: &str) -> HashCheck;

    /// Whether `stored` is in a legacy format that needs upgrading.
    fn is_legacy(&self, stored: &str) -> bool;
}

/// Argon2id hashing with legacy SHA-256 verification.
#[derive(Clone, Default)]
pub struct Argon2Scheme {
    argon2: Argon2<'static>,
}

impl Argon2Scheme {
    /// Builds a scheme with explicit cost parameters.
    ///
    /// `memory_kib` is the memory cost in KiB. Verification always uses
    /// the parameters recorded in the stored hash, so changing these only
    /// affects newly hashed passwords.
    pub fn with_params(memory_kib: u32, iterations: u32, lanes: u32) -> Result<Self, CredentialError> {
        let params = Params::new(memory_kib, iterations, lanes, None)
            .map_err(|e| CredentialError::Hashing(e.to_string()))?;
        Ok(Self {
            argon2: Argon2::new(Algorithm::Argon2id, Version::V0x13, params),
        })
    }
}

impl PasswordScheme for Argon2Scheme {
    fn hash(&self, plaintext: &str) -> Result<String, CredentialError> {
        let salt = SaltString::generate(&mut OsRng);
        Ok(self
            .argon2
            .hash_password(plaintext.as_bytes(), &salt)
            .map_err(|e| CredentialError::Hashing(e.to_string()))?
            .to_string())
    }

    fn verify(&self, plaintext: &str, stored: &str) -> HashCheck {
        if stored.starts_with("$argon2") {
            let Ok(parsed) = PasswordHash::new(stored) else {
                return HashCheck::Unrecognized;
            };
            return if self
                .argon2
                .verify_password(plaintext.as_bytes(), &parsed)
                .is_ok()
            {
                HashCheck::Match
            } else {
                HashCheck::Mismatch
            };
        }

        if let Some(expected) = legacy_digest(stored) {
            let actual = Sha256::digest(plaintext.as_bytes());
            return if bool::from(actual.as_slice().ct_eq(&expected)) {
                HashCheck::MatchLegacy
            } else {
                HashCheck::Mismatch
            };
        }

        HashCheck::Unrecognized
    }

    fn is_legacy(&self, stored: &str) -> bool {
        legacy_digest(stored).is_some()
    }
}

/// Decodes a 64-character hex SHA-256 digest.
fn legacy_digest(stored: &str) -> Option<Vec<u8>> {
    if stored.len() != 64 {
        return None;
    }
    hex::decode(stored).ok()
}

/// Produces a legacy digest for a plaintext.
///
/// Only used to build fixtures for accounts imported from older
/// deployments; new passwords always go through [`PasswordScheme::hash`].
pub fn legacy_sha256_hex(plaintext: &str) -> String {
    hex::encode(Sha256::digest(plaintext.as_bytes()))
}
