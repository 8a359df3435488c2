//! Xenstore message framing.
//!
//! Every message on the rings is framed with a 16-byte header:
//! - a 4-byte message type (`XS_*`)
//! - a 4-byte request id, echoed in the reply
//! - a 4-byte transaction id (always 0 here)
//! - a 4-byte payload length, at most 4096
//!
//! No partial reads, no buffer management in user code.

pub mod codec;
pub mod error;
pub mod msg_type;
pub mod reader;
pub mod writer;

pub use codec::{
    decode_message, encode_message, Message, MsgHeader, HEADER_SIZE, XENSTORE_PAYLOAD_MAX,
};
pub use error::{FrameError, Result};
pub use msg_type::type_name;
pub use reader::{MessageReader, MessageRef};
pub use writer::MessageWriter;
