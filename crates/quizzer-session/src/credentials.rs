//! Admin accounts: password hashes and hostmask allow-lists.
//!
//! The store owns every [`AdminAccount`]. Lookups copy what they need out
//! of the map and drop the lock before any hashing happens, so a slow
//! Argon2 check for one admin never blocks another admin's lookup.
//!
//! Management operations take a `caller` and refuse to run unless the
//! caller is itself a recognized account. Whether the caller also holds a
//! live session is the session manager's business, not the store's.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use quizzer_protocol::{Hostmask, Identity};

use crate::hash::{HashCheck, PasswordScheme};
use crate::hostmask::HostmaskPattern;
use crate::CredentialError;

/// One admin account.
#[derive(Debug, Clone, Default)]
pub struct AdminAccount {
    pub password_hash: Option<String>,
    pub hostmasks: Vec<HostmaskPattern>,
}

/// Persisted form of an account, keyed by lower-cased identity in a
/// snapshot map.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password_hash: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub hostmasks: Vec<HostmaskPattern>,
}

/// Serializable credential map.
pub type CredentialSnapshot = BTreeMap<String, AccountRecord>;

struct StoreState {
    accounts: HashMap<Identity, AdminAccount>,
    needs_upgrade: HashSet<Identity>,
}

/// Thread-safe registry of admin credentials.
pub struct CredentialStore {
    state: Mutex<StoreState>,
    scheme: Arc<dyn PasswordScheme>,
}

impl CredentialStore {
    pub fn with_scheme(scheme: Arc<dyn PasswordScheme>) -> Self {
        Self {
            state: Mutex::new(StoreState {
                accounts: HashMap::new(),
                needs_upgrade: HashSet::new(),
            }),
            scheme,
        }
    }

    /// Builds a store from a snapshot. Keys that are not valid identities
    /// are skipped with a warning.
    pub fn from_records(records: CredentialSnapshot, scheme: Arc<dyn PasswordScheme>) -> Self {
        let mut accounts = HashMap::new();
        for (key, record) in records {
            let Ok(identity) = Identity::new(&key) else {
                tracing::warn!(key = %key, "skipping credential record with invalid identity");
                continue;
            };
            if record
                .password_hash
                .as_deref()
                .is_some_and(|stored| scheme.is_legacy(stored))
            {
                tracing::warn!(identity = %identity, "stored password hash is in a legacy format");
            }
            accounts.insert(
                identity,
                AdminAccount {
                    password_hash: record.password_hash,
                    hostmasks: record.hostmasks,
                },
            );
        }
        Self {
            state: Mutex::new(StoreState {
                accounts,
                needs_upgrade: HashSet::new(),
            }),
            scheme,
        }
    }

    /// Parses a JSON snapshot.
    pub fn from_json(json: &str, scheme: Arc<dyn PasswordScheme>) -> Result<Self, CredentialError> {
        let records: CredentialSnapshot = serde_json::from_str(json)?;
        Ok(Self::from_records(records, scheme))
    }

    /// Copies every account into a serializable map.
    pub async fn snapshot(&self) -> CredentialSnapshot {
        let state = self.state.lock().await;
        state
            .accounts
            .iter()
            .map(|(id, account)| {
                (
                    id.as_str().to_string(),
                    AccountRecord {
                        password_hash: account.password_hash.clone(),
                        hostmasks: account.hostmasks.clone(),
                    },
                )
            })
            .collect()
    }

    pub async fn to_json(&self) -> Result<String, CredentialError> {
        Ok(serde_json::to_string_pretty(&self.snapshot().await)?)
    }

    pub async fn is_account(&self, identity: &Identity) -> bool {
        self.state.lock().await.accounts.contains_key(identity)
    }

    // -- Verification -----------------------------------------------------

    /// Checks a password. Fails closed when there is no account or no hash.
    ///
    /// A match against a legacy hash succeeds but flags the account; see
    /// [`accounts_needing_upgrade`](Self::accounts_needing_upgrade).
    pub async fn verify_password(&self, identity: &Identity, plaintext: &str) -> bool {
        let stored = {
            let state = self.state.lock().await;
            state
                .accounts
                .get(identity)
                .and_then(|a| a.password_hash.clone())
        };
        let Some(stored) = stored else {
            return false;
        };

        let scheme = Arc::clone(&self.scheme);
        let plaintext = plaintext.to_string();
        let check = match tokio::task::spawn_blocking(move || scheme.verify(&plaintext, &stored)).await {
            Ok(check) => check,
            Err(e) => {
                tracing::warn!(identity = %identity, error = %e, "password check task failed");
                return false;
            }
        };

        match check {
            HashCheck::MatchLegacy => {
                tracing::warn!(identity = %identity, "password matched a legacy hash, reset required");
                self.state.lock().await.needs_upgrade.insert(identity.clone());
            }
            HashCheck::Unrecognized => {
                tracing::warn!(identity = %identity, "stored password hash has an unsupported format");
            }
            HashCheck::Match | HashCheck::Mismatch => {}
        }
        check.is_match()
    }

    /// Checks a presented mask against the account's patterns.
    pub async fn verify_hostmask(&self, identity: &Identity, presented: &Hostmask) -> bool {
        let state = self.state.lock().await;
        let Some(account) = state.accounts.get(identity) else {
            return false;
        };
        let matched = account.hostmasks.iter().find(|p| p.matches(presented));
        if let Some(pattern) = matched {
            tracing::info!(identity = %identity, pattern = %pattern, "hostmask verified");
        }
        matched.is_some()
    }

    /// Identities that verified against a legacy hash since their
    /// password was last set.
    pub async fn accounts_needing_upgrade(&self) -> Vec<Identity> {
        let state = self.state.lock().await;
        let mut ids: Vec<Identity> = state.needs_upgrade.iter().cloned().collect();
        ids.sort();
        ids
    }

    // -- Management -------------------------------------------------------

    /// Inserts an account without a caller check. Used to seed the store
    /// from configuration at startup.
    pub async fn seed(&self, identity: Identity, account: AdminAccount) {
        self.state.lock().await.accounts.insert(identity, account);
    }

    /// Adds a new admin, optionally with a password.
    pub async fn add_account(
        &self,
        caller: &Identity,
        identity: &Identity,
        password: Option<&str>,
    ) -> Result<(), CredentialError> {
        self.require_admin(caller).await?;
        if self.is_account(identity).await {
            return Err(CredentialError::AlreadyExists(identity.clone()));
        }

        let password_hash = match password {
            Some(p) => Some(self.hash(p).await?),
            None => None,
        };

        let mut state = self.state.lock().await;
        if state.accounts.contains_key(identity) {
            return Err(CredentialError::AlreadyExists(identity.clone()));
        }
        state.accounts.insert(
            identity.clone(),
            AdminAccount {
                password_hash,
                hostmasks: Vec::new(),
            },
        );
        tracing::info!(%caller, %identity, "admin account added");
        Ok(())
    }

    /// Removes an admin. An account can never remove itself.
    pub async fn remove_account(&self, caller: &Identity, identity: &Identity) -> Result<(), CredentialError> {
        if caller == identity {
            return Err(CredentialError::CannotRemoveSelf);
        }
        let mut state = self.state.lock().await;
        if !state.accounts.contains_key(caller) {
            return Err(CredentialError::NotAdmin(caller.clone()));
        }
        if state.accounts.remove(identity).is_none() {
            return Err(CredentialError::UnknownAccount(identity.clone()));
        }
        state.needs_upgrade.remove(identity);
        tracing::info!(%caller, %identity, "admin account removed");
        Ok(())
    }

    /// Every account identity, sorted.
    pub async fn list_accounts(&self, caller: &Identity) -> Result<Vec<Identity>, CredentialError> {
        let state = self.state.lock().await;
        if !state.accounts.contains_key(caller) {
            return Err(CredentialError::NotAdmin(caller.clone()));
        }
        let mut ids: Vec<Identity> = state.accounts.keys().cloned().collect();
        ids.sort();
        Ok(ids)
    }

    /// Rehashes and replaces a password. Clears any upgrade flag.
    pub async fn set_password(
        &self,
        caller: &Identity,
        identity: &Identity,
        plaintext: &str,
    ) -> Result<(), CredentialError> {
        self.require_admin(caller).await?;
        if !self.is_account(identity).await {
            return Err(CredentialError::UnknownAccount(identity.clone()));
        }

        let hashed = self.hash(plaintext).await?;

        let mut state = self.state.lock().await;
        let account = state
            .accounts
            .get_mut(identity)
            .ok_or_else(|| CredentialError::UnknownAccount(identity.clone()))?;
        account.password_hash = Some(hashed);
        state.needs_upgrade.remove(identity);
        tracing::info!(%caller, %identity, "password updated");
        Ok(())
    }

    /// Replaces an account's hostmask patterns. Order is preserved.
    pub async fn set_hostmasks(
        &self,
        caller: &Identity,
        identity: &Identity,
        patterns: &[String],
    ) -> Result<(), CredentialError> {
        let parsed = patterns
            .iter()
            .map(|p| HostmaskPattern::parse(p))
            .collect::<Result<Vec<_>, _>>()?;

        let mut state = self.state.lock().await;
        if !state.accounts.contains_key(caller) {
            return Err(CredentialError::NotAdmin(caller.clone()));
        }
        let account = state
            .accounts
            .get_mut(identity)
            .ok_or_else(|| CredentialError::UnknownAccount(identity.clone()))?;
        account.hostmasks = parsed;
        tracing::info!(%caller, %identity, count = patterns.len(), "hostmasks updated");
        Ok(())
    }

    pub async fn len(&self) -> usize {
        self.state.lock().await.accounts.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    async fn require_admin(&self, caller: &Identity) -> Result<(), CredentialError> {
        if self.is_account(caller).await {
            Ok(())
        } else {
            Err(CredentialError::NotAdmin(caller.clone()))
        }
    }

    async fn hash(&self, plaintext: &str) -> Result<String, CredentialError> {
        let scheme = Arc::clone(&self.scheme);
        let plaintext = plaintext.to_string();
        tokio::task::spawn_blocking(move || scheme.hash(&plaintext))
            .await
            .map_err(|e| CredentialError::Hashing(e.to_string()))?
    }
}

// =========================================================================
// Tests
// =========================================================================
