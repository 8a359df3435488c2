use std::io::Write;

use crate::codec::{check_payload_len, Message, MsgHeader, XENSTORE_PAYLOAD_MAX};
use crate::error::{FrameError, Result};

/// Writes complete messages to any `Write` stream.
///
/// The header and the payload are written as two separate writes, then the
/// stream is flushed. On the ring stream the flush is what signals the peer,
/// so the peer is only woken once every request byte is on the ring.
pub struct MessageWriter<T> {
    inner: T,
}

impl<T: Write> MessageWriter<T> {
    /// Create a new message writer.
    pub fn new(inner: T) -> Self {
        Self { inner }
    }

    /// Write a complete message (blocking).
    pub fn write_message(&mut self, msg: &Message) -> Result<()> {
        self.send(msg.header.msg_type, msg.header.req_id, msg.payload.as_ref())
    }

    /// Encode and send a payload outside any transaction.
    pub fn send(&mut self, msg_type: u32, req_id: u32, payload: &[u8]) -> Result<()> {
        check_payload_len(payload.len(), XENSTORE_PAYLOAD_MAX)?;

        let header = MsgHeader::new(msg_type, req_id, payload.len() as u32);
        self.inner
            .write_all(&header.to_bytes())
            .map_err(FrameError::from_io)?;
        self.inner.write_all(payload).map_err(FrameError::from_io)?;
        tracing::trace!(msg_type, len = payload.len(), "message written");

        self.flush()
    }

    /// Flush the underlying stream.
    pub fn flush(&mut self) -> Result<()> {
        self.inner.flush().map_err(FrameError::from_io)
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Mutably borrow the underlying stream.
    pub fn get_mut(&mut self) -> &mut T {
        &mut self.inner
    }

    /// Consume the writer and return the inner stream.
    pub fn into_inner(self) -> T {
        self.inner
    }
}
