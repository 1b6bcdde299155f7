//! Line-oriented outbox over any async writer.

use std::sync::Arc;

use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::Mutex;

use quizzer_protocol::Identity;

use crate::{Outbox, TransportError};

/// An [`Outbox`] that writes one line per message.
///
/// Notices are written as `-> nick: text`, channel messages as
/// `#channel: text`. The writer sits behind a mutex so concurrent timer
/// tasks never interleave partial lines.
pub struct WriterOutbox<W> {
    channel: String,
    writer: Arc<Mutex<W>>,
}

impl<W> Clone for WriterOutbox<W> {
    fn clone(&self) -> Self {
        Self {
            channel: self.channel.clone(),
            writer: Arc::clone(&self.writer),
        }
    }
}

impl<W> WriterOutbox<W>
where
    W: AsyncWrite + Unpin + Send + 'static,
{
    pub fn new(channel: impl Into<String>, writer: W) -> Self {
        Self {
            channel: channel.into(),
            writer: Arc::new(Mutex::new(writer)),
        }
    }

    async fn write_line(&self, line: String) -> Result<(), TransportError> {
        let mut writer = self.writer.lock().await;
        writer
            .write_all(line.as_bytes())
            .await
            .map_err(TransportError::WriteFailed)?;
        writer.flush().await.map_err(TransportError::WriteFailed)
    }
}

impl<W> Outbox for WriterOutbox<W>
where
    W: AsyncWrite + Unpin + Send + 'static,
{
    async fn send_notice(&self, to: &Identity, text: &str) -> Result<(), TransportError> {
        self.write_line(format!("-> {to}: {text}\n")).await
    }

    async fn send_channel_message(&self, text: &str) -> Result<(), TransportError> {
        self.write_line(format!("{}: {text}\n", self.channel)).await
    }
}
