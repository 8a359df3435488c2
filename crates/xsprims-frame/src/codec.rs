use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::{FrameError, Result};

pub use xsprims_transport::XENSTORE_PAYLOAD_MAX;

/// Message header: type (4) + req_id (4) + tx_id (4) + len (4) = 16 bytes.
pub const HEADER_SIZE: usize = 16;

/// Message header as it sits on the ring.
///
/// Fields are in host byte order: guest and xenstore host always share the
/// CPU they run on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MsgHeader {
    /// One of the `XS_*` type codes.
    pub msg_type: u32,
    /// Echoed back by the host in the reply.
    pub req_id: u32,
    /// Transaction the request belongs to, 0 for none.
    pub tx_id: u32,
    /// Payload length in bytes.
    pub len: u32,
}

impl MsgHeader {
    /// Header for a request outside any transaction.
    pub fn new(msg_type: u32, req_id: u32, len: u32) -> Self {
        Self {
            msg_type,
            req_id,
            tx_id: 0,
            len,
        }
    }

    pub fn to_bytes(&self) -> [u8; HEADER_SIZE] {
        let mut raw = [0u8; HEADER_SIZE];
        for (slot, field) in raw
            .chunks_exact_mut(4)
            .zip([self.msg_type, self.req_id, self.tx_id, self.len])
        {
            slot.copy_from_slice(&field.to_ne_bytes());
        }
        raw
    }

    pub fn from_bytes(raw: &[u8; HEADER_SIZE]) -> Self {
        let word = |at: usize| u32::from_ne_bytes([raw[at], raw[at + 1], raw[at + 2], raw[at + 3]]);
        Self {
            msg_type: word(0),
            req_id: word(4),
            tx_id: word(8),
            len: word(12),
        }
    }
}

/// A complete message with an owned payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub header: MsgHeader,
    pub payload: Bytes,
}

impl Message {
    /// Create a new message outside any transaction.
    pub fn new(msg_type: u32, req_id: u32, payload: impl Into<Bytes>) -> Self {
        let payload = payload.into();
        Self {
            header: MsgHeader::new(msg_type, req_id, payload.len() as u32),
            payload,
        }
    }

    /// The total wire size of this message (header + payload).
    pub fn wire_size(&self) -> usize {
        HEADER_SIZE + self.payload.len()
    }
}

/// Encode a message into the wire format.
///
/// Wire format:
/// ```text
/// ┌───────────┬───────────┬───────────┬───────────┬──────────────────┐
/// │ Type (4B) │ ReqId(4B) │ TxId (4B) │ Len (4B)  │ Payload          │
/// │           │           │ always 0  │           │ (Len bytes)      │
/// └───────────┴───────────┴───────────┴───────────┴──────────────────┘
/// ```
pub fn encode_message(
    msg_type: u32,
    req_id: u32,
    payload: &[u8],
    dst: &mut BytesMut,
) -> Result<()> {
    check_payload_len(payload.len(), XENSTORE_PAYLOAD_MAX)?;
    let header = MsgHeader::new(msg_type, req_id, payload.len() as u32);
    dst.reserve(HEADER_SIZE + payload.len());
    dst.put_slice(&header.to_bytes());
    dst.put_slice(payload);
    Ok(())
}

/// Decode a message from a buffer.
///
/// Returns `Ok(None)` if the buffer doesn't contain a complete message yet.
/// On success, consumes the message bytes from the buffer.
pub fn decode_message(src: &mut BytesMut, max_payload: usize) -> Result<Option<Message>> {
    let Some(raw) = src.get(..HEADER_SIZE) else {
        return Ok(None); // Need more data
    };
    let mut fixed = [0u8; HEADER_SIZE];
    fixed.copy_from_slice(raw);
    let header = MsgHeader::from_bytes(&fixed);
    let payload_len = header.len as usize;

    check_payload_len(payload_len, max_payload)?;

    if src.len() < HEADER_SIZE + payload_len {
        return Ok(None); // Need more data
    }

    src.advance(HEADER_SIZE);
    let payload = src.split_to(payload_len).freeze();

    Ok(Some(Message { header, payload }))
}

pub(crate) fn check_payload_len(size: usize, max: usize) -> Result<()> {
    if size > max {
        return Err(FrameError::PayloadTooLarge { size, max });
    }
    Ok(())
}
