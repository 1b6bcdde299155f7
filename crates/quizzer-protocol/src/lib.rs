//! Shared vocabulary for Quizzer.
//!
//! This crate defines the values every other layer speaks in:
//!
//! - **Types** ([`Identity`], [`Hostmask`], [`Question`], [`Outbound`]):
//!   who is talking, what is being asked, and what the bot says back.
//! - **Commands** ([`Command`], [`AdminAction`]): the `!`-prefixed chat
//!   grammar, parsed from raw text lines.
//! - **Errors** ([`ProtocolError`]): malformed input of any of the above.
//!
//! # Architecture
//!
//! The protocol layer knows nothing about sessions, rounds, or the
//! network. It only turns text into typed values.
//!
//! ```text
//! Chat line (text) → Protocol (Command) → Controller (session + round)
//! ```

// ---------------------------------------------------------------------------
// Module declarations
// ---------------------------------------------------------------------------

mod command;
mod error;
mod types;

// ---------------------------------------------------------------------------
// Re-exports
// ---------------------------------------------------------------------------

pub use command::{AdminAction, Command, DEFAULT_CATEGORY, SayTarget};
pub use error::ProtocolError;
pub use types::{Hostmask, Identity, Outbound, Question, split_mask_fields};
