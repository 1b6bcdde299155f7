//! Outbound delivery layer for Quizzer.
//!
//! The game core never talks to the chat network directly. It produces
//! [`Outbound`] values and hands them to an [`Outbox`], which knows how to
//! get text to a user or to the channel.
//!
//! Two implementations ship with the crate:
//!
//! - [`ChannelOutbox`]: pushes messages into a tokio mpsc channel. The
//!   connection task (or a test) drains the receiver.
//! - [`WriterOutbox`]: formats each message as a line and writes it to any
//!   `AsyncWrite`, e.g. stdout for the console demo.

mod channel;
mod error;
mod writer;

pub use channel::ChannelOutbox;
pub use error::TransportError;
pub use writer::WriterOutbox;

use quizzer_protocol::{Identity, Outbound};

/// Delivers text to users and to the quiz channel.
///
/// Both methods return `Send` futures so callers can use an outbox from
/// inside spawned timer tasks.
pub trait Outbox: Send + Sync + 'static {
    /// Sends a private notice to one identity.
    fn send_notice(
        &self,
        to: &Identity,
        text: &str,
    ) -> impl std::future::Future<Output = Result<(), TransportError>> + Send;

    /// Sends a message to the quiz channel.
    fn send_channel_message(
        &self,
        text: &str,
    ) -> impl std::future::Future<Output = Result<(), TransportError>> + Send;

    /// Routes one [`Outbound`] to the matching method.
    fn send(
        &self,
        message: &Outbound,
    ) -> impl std::future::Future<Output = Result<(), TransportError>> + Send {
        async move {
            match message {
                Outbound::Notice { to, text } => self.send_notice(to, text).await,
                Outbound::Channel { text } => self.send_channel_message(text).await,
            }
        }
    }
}

/// Sends every message in order.
///
/// A failed delivery is logged and skipped; the rest are still attempted.
/// Returns the number of messages that could not be delivered.
pub async fn deliver_all<O: Outbox>(outbox: &O, messages: Vec<Outbound>) -> usize {
    let mut failed = 0;
    for message in &messages {
        if let Err(e) = outbox.send(message).await {
            failed += 1;
            tracing::warn!(error = %e, "failed to deliver outbound message");
        }
    }
    failed
}
