//! `QuizzerBuilder`: wires a validated configuration into a
//! [`GameController`].
//!
//! This is the entry point for embedding the bot core. It ties together
//! all the layers: credentials → sessions → round → controller.

use std::io::ErrorKind;
use std::path::Path;
use std::sync::Arc;

use quizzer_protocol::{AdminAction, Identity};
use quizzer_round::{QuestionSource, QuizRound, ScoreStore};
use quizzer_session::{
    Argon2Scheme, CredentialStore, IdentityService, PasswordScheme, SessionManager,
    VerificationMethod,
};
use quizzer_transport::Outbox;

use crate::{ConfigError, GameController, OutboxRegistrar, QuizzerConfig, QuizzerError};

/// Builder for configuring a Quizzer controller.
///
/// # Example
///
/// ```rust,ignore
/// use quizzer::prelude::*;
///
/// let controller = QuizzerBuilder::new()
///     .config(QuizzerConfig::load("quizzer.json").await?)
///     .build_with_outbox_registrar(outbox, Arc::new(bank), Arc::new(MemoryScores::new()))
///     .await?;
/// ```
pub struct QuizzerBuilder {
    config: QuizzerConfig,
    scheme: Option<Arc<dyn PasswordScheme>>,
}

impl QuizzerBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self {
            config: QuizzerConfig::default(),
            scheme: None,
        }
    }

    pub fn config(mut self, config: QuizzerConfig) -> Self {
        self.config = config;
        self
    }

    /// Overrides the configured verification method.
    pub fn verification_method(mut self, method: VerificationMethod) -> Self {
        self.config.verification_method = method;
        self
    }

    /// Replaces the default Argon2id scheme, e.g. with cheaper parameters
    /// in tests.
    pub fn password_scheme(mut self, scheme: Arc<dyn PasswordScheme>) -> Self {
        self.scheme = Some(scheme);
        self
    }

    /// Validates the configuration, seeds the admin accounts and builds the
    /// controller around `registrar`.
    pub async fn build<O, Q, S, I>(
        self,
        outbox: Arc<O>,
        questions: Arc<Q>,
        scores: Arc<S>,
        registrar: I,
    ) -> Result<GameController<O, Q, S, I>, QuizzerError>
    where
        O: Outbox,
        Q: QuestionSource,
        S: ScoreStore,
        I: IdentityService,
    {
        let config = self.config.validated()?;

        let scheme: Arc<dyn PasswordScheme> = match self.scheme {
            Some(scheme) => scheme,
            None => Arc::new(Argon2Scheme::default()),
        };
        let credentials = match &config.credentials_path {
            Some(path) => load_credentials(path, Arc::clone(&scheme)).await?,
            None => None,
        };
        let credentials = Arc::new(match credentials {
            Some(store) => store,
            None => {
                let store = CredentialStore::with_scheme(scheme);
                for admin in &config.admins {
                    store.seed(admin.identity.clone(), admin.account()).await;
                }
                store
            }
        });
        let admins = credentials.len().await;

        let sessions: SessionManager<AdminAction, I> = SessionManager::new(
            config.verification_method,
            config.auth.clone(),
            credentials,
            registrar,
        );
        let round = QuizRound::new(config.round.clone(), Arc::clone(&outbox), questions, scores);

        tracing::info!(
            channel = %config.channel,
            method = ?config.verification_method,
            admins,
            "quizzer ready"
        );
        let mut controller = GameController::new(config.channel, outbox, sessions, round);
        if let Some(path) = config.credentials_path {
            controller = controller.with_credentials_path(path);
        }
        Ok(controller)
    }

    /// Like [`build`](Self::build), with an [`OutboxRegistrar`] that asks
    /// the configured identity service through the same outbox.
    pub async fn build_with_outbox_registrar<O, Q, S>(
        self,
        outbox: Arc<O>,
        questions: Arc<Q>,
        scores: Arc<S>,
    ) -> Result<GameController<O, Q, S, OutboxRegistrar<O>>, QuizzerError>
    where
        O: Outbox,
        Q: QuestionSource,
        S: ScoreStore,
    {
        let service = Identity::new(&self.config.registrar_service)?;
        let registrar = OutboxRegistrar::new(Arc::clone(&outbox), service);
        self.build(outbox, questions, scores, registrar).await
    }
}

/// Reads a saved credential file. `None` when there is none yet.
async fn load_credentials(
    path: &Path,
    scheme: Arc<dyn PasswordScheme>,
) -> Result<Option<CredentialStore>, QuizzerError> {
    let raw = match tokio::fs::read_to_string(path).await {
        Ok(raw) => raw,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            tracing::info!(path = %path.display(), "no credentials file yet, seeding from config");
            return Ok(None);
        }
        Err(e) => return Err(ConfigError::Read(e).into()),
    };
    let store = CredentialStore::from_json(&raw, scheme)?;
    tracing::info!(path = %path.display(), accounts = store.len().await, "credentials loaded");
    Ok(Some(store))
}

impl Default for QuizzerBuilder {
    fn default() -> Self {
        Self::new()
    }
}
