//! Bot configuration.
//!
//! One [`QuizzerConfig`] is read at startup, checked with
//! [`QuizzerConfig::validated`] and then handed by value to the builder.
//! Every field has a default, so a config file only lists what differs.
//!
//! ```json
//! {
//!   "channel": "#quiz",
//!   "verification_method": "password",
//!   "auth": { "session_timeout_secs": 1800 },
//!   "round": { "questions_per_round": 5 },
//!   "admins": [
//!     { "identity": "alice", "password_hash": "$argon2id$..." },
//!     { "identity": "bob", "hostmasks": ["bob!*@*.example.org"] }
//!   ]
//! }
//! ```
//!
//! With `credentials_path` set, admin accounts live in that file and every
//! management command rewrites it. An existing file replaces `admins`;
//! a missing one is created from `admins` on the first change.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use quizzer_protocol::Identity;
use quizzer_round::RoundConfig;
use quizzer_session::{AdminAccount, AuthConfig, HostmaskPattern, VerificationMethod};
use serde::{Deserialize, Serialize};

use crate::ConfigError;

/// An admin account created at startup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdminSeed {
    pub identity: Identity,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password_hash: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub hostmasks: Vec<HostmaskPattern>,
}

impl AdminSeed {
    pub fn account(&self) -> AdminAccount {
        AdminAccount {
            password_hash: self.password_hash.clone(),
            hostmasks: self.hostmasks.clone(),
        }
    }
}

/// Everything the bot core needs to run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QuizzerConfig {
    /// The quiz channel, used for announcements and `msg` targets.
    pub channel: String,
    pub verification_method: VerificationMethod,
    /// Nick of the network identity service that confirms admins.
    pub registrar_service: String,
    pub auth: AuthConfig,
    pub round: RoundConfig,
    pub admins: Vec<AdminSeed>,
    /// JSON file holding the admin accounts across restarts.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub credentials_path: Option<PathBuf>,
}

impl Default for QuizzerConfig {
    fn default() -> Self {
        Self {
            channel: "#quiz".to_string(),
            verification_method: VerificationMethod::default(),
            registrar_service: "NickServ".to_string(),
            auth: AuthConfig::default(),
            round: RoundConfig::default(),
            admins: Vec::new(),
            credentials_path: None,
        }
    }
}

impl QuizzerConfig {
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Reads a JSON config file. The result is not validated yet.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = tokio::fs::read_to_string(path.as_ref()).await?;
        Self::from_json_str(&raw)
    }

    /// Rejects settings the bot cannot run with.
    pub fn validated(self) -> Result<Self, ConfigError> {
        let invalid = |msg: &str| Err(ConfigError::Invalid(msg.to_string()));

        if !self.channel.starts_with('#') {
            return invalid("channel must start with '#'");
        }
        if self.round.questions_per_round == 0 {
            return invalid("round.questions_per_round must be at least 1");
        }
        if self.round.answer_deadline_secs == 0 {
            return invalid("round.answer_deadline_secs must be at least 1");
        }
        if self.auth.max_failed_attempts == 0 {
            return invalid("auth.max_failed_attempts must be at least 1");
        }
        if self.auth.session_timeout_secs == 0 {
            return invalid("auth.session_timeout_secs must be at least 1");
        }

        let mut seen = HashSet::new();
        for admin in &self.admins {
            if !seen.insert(admin.identity.clone()) {
                return Err(ConfigError::Invalid(format!(
                    "admin {} is listed twice",
                    admin.identity
                )));
            }
        }

        let method = self.verification_method;
        if method == VerificationMethod::ExternalRegistrar && self.registrar_service.trim().is_empty() {
            return invalid("registrar_service must name the identity service");
        }
        // The credentials file may supply what the seeds lack.
        if self.credentials_path.is_some() {
            return Ok(self);
        }
        if method.uses_passwords() && !self.admins.iter().any(|a| a.password_hash.is_some()) {
            return Err(ConfigError::Invalid(format!(
                "verification method {method:?} needs at least one admin with a password_hash"
            )));
        }
        if method == VerificationMethod::Hostmask
            && !self.admins.iter().any(|a| !a.hostmasks.is_empty())
        {
            return invalid("verification method Hostmask needs at least one admin with hostmasks");
        }
        Ok(self)
    }
}
