//! Channel-backed outbox.

use tokio::sync::mpsc;

use quizzer_protocol::{Identity, Outbound};

use crate::{Outbox, TransportError};

/// An [`Outbox`] that forwards every message into an unbounded mpsc
/// channel.
///
/// Cloning is cheap; all clones feed the same receiver. Sends never block,
/// so it is safe to call from inside a timer callback.
#[derive(Debug, Clone)]
pub struct ChannelOutbox {
    tx: mpsc::UnboundedSender<Outbound>,
}

impl ChannelOutbox {
    /// Creates the outbox together with the receiver that drains it.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Outbound>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    fn push(&self, message: Outbound) -> Result<(), TransportError> {
        self.tx.send(message).map_err(|_| TransportError::Closed)
    }
}

impl Outbox for ChannelOutbox {
    async fn send_notice(&self, to: &Identity, text: &str) -> Result<(), TransportError> {
        self.push(Outbound::notice(to, text))
    }

    async fn send_channel_message(&self, text: &str) -> Result<(), TransportError> {
        self.push(Outbound::channel(text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_send_notice_reaches_receiver() {
        let (outbox, mut rx) = ChannelOutbox::new();
        let bob = Identity::new("Bob").unwrap();
        outbox.send_notice(&bob, "hi").await.unwrap();
        assert_eq!(rx.recv().await, Some(Outbound::notice(&bob, "hi")));
    }

    #[tokio::test]
    async fn test_send_after_receiver_dropped_returns_closed() {
        let (outbox, rx) = ChannelOutbox::new();
        drop(rx);
        let result = outbox.send_channel_message("anyone?").await;
        assert!(matches!(result, Err(TransportError::Closed)));
    }

    #[tokio::test]
    async fn test_clones_share_receiver() {
        let (outbox, mut rx) = ChannelOutbox::new();
        let other = outbox.clone();
        other.send_channel_message("from clone").await.unwrap();
        assert_eq!(rx.recv().await.unwrap().text(), "from clone");
    }
}
