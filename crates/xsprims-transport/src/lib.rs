//! Shared-memory transport to a xenstore host.
//!
//! Provides the pieces a guest needs to talk to xenstore without sockets,
//! interrupts or a scheduler:
//! - [`bitops`]: atomic test-and-clear over the shared pending bitmap
//! - [`EventChannel`]: signal the host, or block until it signals back
//! - [`SharedRing`]: the request/response byte rings on the shared page
//!
//! This is the lowest layer of xsprims. Everything else builds on top of
//! the [`XsStream`] type provided here.

pub mod bitops;
pub mod error;
pub mod evtchn;
pub mod ring;
pub mod traits;

pub use error::{fatal, Result, TransportError};
pub use evtchn::{EventChannel, EvtchnPort};
pub use ring::{
    BackendRing, SharedRing, XenstoreInterface, XENSTORE_PAYLOAD_MAX, XENSTORE_RING_SIZE,
};
pub use traits::{EventChannelOps, XsStream};
