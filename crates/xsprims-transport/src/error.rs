use std::time::Duration;

/// Errors that can occur in ring and event channel operations.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The event channel port does not index a bit inside the pending bitmap.
    #[error("event channel port {port} outside pending bitmap ({bits} bits)")]
    InvalidPort { port: u32, bits: usize },

    /// The host refused to deliver a notification.
    #[error("event channel notify on port {port} failed (rc {rc})")]
    Notify { port: u32, rc: i32 },

    /// The optional wait deadline passed before the peer signalled.
    #[error("no event on port {port} after {waited:?}")]
    Timeout { port: u32, waited: Duration },

    /// An I/O error surfaced through the stream adapter.
    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, TransportError>;

/// Halt the calling context on an unrecoverable condition.
///
/// Protocol violations and use of a torn-down connection end up here. There is
/// no caller that could retry: continuing would read or write outside the
/// buffers the peer and the client agreed on.
#[track_caller]
pub fn fatal(reason: impl std::fmt::Display) -> ! {
    tracing::error!(%reason, "xenbus fatal");
    panic!("xenbus fatal: {reason}");
}

impl From<TransportError> for std::io::Error {
    fn from(err: TransportError) -> Self {
        // Keep the transport error as the source so framing layers can recover it.
        match err {
            TransportError::Io(io) => io,
            TransportError::Timeout { .. } => {
                std::io::Error::new(std::io::ErrorKind::TimedOut, err)
            }
            other => std::io::Error::other(other),
        }
    }
}
