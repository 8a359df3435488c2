/// Errors that can occur in xenstore client operations.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// Transport-level error.
    #[error("transport error: {0}")]
    Transport(#[from] xsprims_transport::TransportError),

    /// Frame-level error.
    #[error("frame error: {0}")]
    Frame(#[from] xsprims_frame::FrameError),

    /// The xenstore host answered with an error reply.
    #[error("xenstore error {name} (errno {errno})")]
    Xenstore { errno: i32, name: String },

    /// The shared page or event channel handed to `connect` is unusable.
    #[error("setup failed: {0}")]
    Setup(String),

    /// The host answered with a different message type than requested.
    #[error("unexpected {actual} reply to {expected} request")]
    UnexpectedReply {
        expected: &'static str,
        actual: &'static str,
    },

    /// The reply payload does not have the expected shape.
    #[error("malformed reply: {0}")]
    MalformedReply(String),

    /// A path or value cannot be encoded on the wire.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// A reply that should be text is not UTF-8.
    #[error("reply is not valid UTF-8: {0}")]
    Utf8(#[from] std::str::Utf8Error),
}

impl ClientError {
    /// The errno reported by the host, if this is a host error reply.
    pub fn errno(&self) -> Option<i32> {
        match self {
            ClientError::Xenstore { errno, .. } => Some(*errno),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, ClientError>;
