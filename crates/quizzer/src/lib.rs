//! # Quizzer
//!
//! Core of a chat trivia bot: timed quiz rounds driven by chat commands,
//! with admin commands gated by password sessions, hostmask matching, the
//! network identity service, or a combination.
//!
//! The crate does not talk to a chat network itself. The connection layer
//! implements [`Outbox`] for outgoing lines, feeds each incoming line to
//! [`GameController::handle_line`] and forwards identity-service answers
//! and connection events to the controller.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use quizzer::prelude::*;
//!
//! # async fn run() -> Result<(), QuizzerError> {
//! let (outbox, _lines) = ChannelOutbox::new();
//! let bank = QuestionBank::load("questions.json").await?;
//! let controller = QuizzerBuilder::new()
//!     .config(QuizzerConfig::load("quizzer.json").await?)
//!     .build_with_outbox_registrar(Arc::new(outbox), Arc::new(bank), Arc::new(MemoryScores::new()))
//!     .await?;
//!
//! let alice = Identity::new("alice")?;
//! controller.handle_line(&alice, None, "!start science").await?;
//! # Ok(())
//! # }
//! ```

pub mod builder;
pub mod config;
pub mod controller;
pub mod error;
pub mod registrar;
pub mod telemetry;

pub use builder::QuizzerBuilder;
pub use config::{AdminSeed, QuizzerConfig};
pub use controller::{GameController, LEADERBOARD_SIZE, help_lines};
pub use error::{ConfigError, ErrorKind, QuizzerError};
pub use registrar::{OutboxRegistrar, info_reply_confirms};

/// Re-exports of the types most embedders need.
pub mod prelude {
    pub use crate::{
        GameController, OutboxRegistrar, QuizzerBuilder, QuizzerConfig, QuizzerError,
        info_reply_confirms,
    };
    pub use quizzer_protocol::{AdminAction, Command, Hostmask, Identity, Outbound, Question};
    pub use quizzer_round::{
        MemoryScores, QuestionBank, QuestionSource, RoundConfig, RoundState, ScoreStore,
    };
    pub use quizzer_session::{
        Argon2Scheme, AuthConfig, IdentityService, NoRegistrar, PasswordScheme, VerificationMethod,
    };
    pub use quizzer_transport::{ChannelOutbox, Outbox, WriterOutbox};
}
