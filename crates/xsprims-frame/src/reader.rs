use std::io::Read;

use crate::codec::{check_payload_len, MsgHeader, HEADER_SIZE, XENSTORE_PAYLOAD_MAX};
use crate::error::{FrameError, Result};

/// A message whose payload lives in the reader's scratch buffer.
///
/// Valid until the next read on the same reader.
#[derive(Debug, Clone, Copy)]
pub struct MessageRef<'a> {
    pub header: MsgHeader,
    /// Payload followed by one nul sentinel byte.
    terminated: &'a [u8],
}

impl<'a> MessageRef<'a> {
    /// The payload exactly as sent.
    pub fn payload(&self) -> &'a [u8] {
        &self.terminated[..self.terminated.len() - 1]
    }

    /// The payload with a trailing nul, even if the peer did not send one.
    pub fn payload_with_nul(&self) -> &'a [u8] {
        self.terminated
    }
}

/// Reads complete messages from any `Read` stream.
///
/// The header and payload are read with exact-length reads; on the ring
/// stream each one blocks until the peer has produced every byte.
pub struct MessageReader<T> {
    inner: T,
    scratch: Box<[u8]>,
    last: Option<MsgHeader>,
}

impl<T: Read> MessageReader<T> {
    /// Create a new message reader with a scratch buffer for the largest payload.
    pub fn new(inner: T) -> Self {
        Self {
            inner,
            scratch: vec![0u8; XENSTORE_PAYLOAD_MAX + 1].into_boxed_slice(),
            last: None,
        }
    }

    /// Read the next complete message (blocking).
    ///
    /// A declared length above the protocol maximum is reported before any
    /// payload byte is read.
    pub fn read_message(&mut self) -> Result<MessageRef<'_>> {
        self.last = None;
        let mut raw = [0u8; HEADER_SIZE];
        self.inner
            .read_exact(&mut raw)
            .map_err(FrameError::from_io)?;
        let header = MsgHeader::from_bytes(&raw);
        let len = header.len as usize;
        check_payload_len(len, XENSTORE_PAYLOAD_MAX)?;

        self.inner
            .read_exact(&mut self.scratch[..len])
            .map_err(FrameError::from_io)?;
        self.scratch[len] = 0;
        self.last = Some(header);

        tracing::trace!(msg_type = header.msg_type, len, "message read");
        Ok(MessageRef {
            header,
            terminated: &self.scratch[..=len],
        })
    }

    /// The message returned by the most recent successful `read_message`.
    pub fn last_message(&self) -> Option<MessageRef<'_>> {
        self.last.map(|header| MessageRef {
            header,
            terminated: &self.scratch[..=header.len as usize],
        })
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Mutably borrow the underlying stream.
    pub fn get_mut(&mut self) -> &mut T {
        &mut self.inner
    }

    /// Consume the reader and return the inner stream.
    pub fn into_inner(self) -> T {
        self.inner
    }
}
