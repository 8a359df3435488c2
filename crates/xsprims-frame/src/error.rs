use xsprims_transport::TransportError;

/// Errors that can occur during message encoding/decoding.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// The payload exceeds the protocol maximum.
    #[error("payload too large ({size} bytes, max {max})")]
    PayloadTooLarge { size: usize, max: usize },

    /// The ring transport failed underneath the stream.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// An I/O error occurred while reading or writing messages.
    #[error("message I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The stream ended before a complete message was received.
    #[error("connection closed (incomplete message)")]
    ConnectionClosed,
}

impl FrameError {
    /// Map a stream error, recovering a transport error carried inside it.
    pub(crate) fn from_io(err: std::io::Error) -> Self {
        if err.kind() == std::io::ErrorKind::UnexpectedEof {
            return FrameError::ConnectionClosed;
        }
        let carries_transport = err
            .get_ref()
            .is_some_and(|inner| inner.is::<TransportError>());
        if !carries_transport {
            return FrameError::Io(err);
        }
        match err.into_inner().map(|inner| inner.downcast::<TransportError>()) {
            Some(Ok(transport)) => FrameError::Transport(*transport),
            _ => FrameError::Io(std::io::Error::other("transport error lost in conversion")),
        }
    }
}

pub type Result<T> = std::result::Result<T, FrameError>;
