//! Quiz round lifecycle for Quizzer.
//!
//! A single [`QuizRound`] recruits participants, asks timed questions,
//! scores answers and stores the results. It talks to the outside world
//! only through three collaborators:
//!
//! - an [`Outbox`](quizzer_transport::Outbox) for announcements and notices
//! - a [`QuestionSource`] for category lookup
//! - a [`ScoreStore`] for final scores and the leaderboard
//!
//! # Key types
//!
//! - [`QuizRound`]: the state machine
//! - [`RoundState`]: lifecycle states
//! - [`RoundConfig`]: question count, deadlines, recruitment window, cooldown
//! - [`QuestionBank`], [`MemoryScores`]: in-memory collaborators

mod config;
mod error;
mod round;
mod scores;
mod source;

pub use config::{RoundConfig, RoundState};
pub use error::RoundError;
pub use round::{AnswerOutcome, JoinOutcome, QuizRound, RoundReport, RoundSnapshot};
pub use scores::{MemoryScores, ScoreStore};
pub use source::{QuestionBank, QuestionSource};
