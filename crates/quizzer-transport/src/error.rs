/// Errors that can occur while delivering outbound messages.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The receiving side of the outbox has gone away.
    #[error("outbox closed")]
    Closed,

    /// Writing a line to the underlying sink failed.
    #[error("write failed: {0}")]
    WriteFailed(#[source] std::io::Error),
}
