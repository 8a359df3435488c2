//! Xenstore client primitives for guests without sockets, interrupts or threads.
//!
//! xsprims talks to the xenstore host over one shared page and one event
//! channel: a pair of byte rings, a pending-bit wait loop, message framing
//! and a blocking request/reply client.
//!
//! # Crate Structure
//!
//! - [`transport`]: Shared rings, event channel and atomic bit operations
//! - [`frame`]: Xenstore message headers, encoding and stream framing
//! - [`client`]: Connection, request exchange and typed operations (behind `client` feature)
//! - [`logging`]: `tracing` subscriber bootstrap (behind `logging` feature)

/// Re-export transport types.
pub mod transport {
    pub use xsprims_transport::*;
}

/// Re-export frame types.
pub mod frame {
    pub use xsprims_frame::*;
}

/// Re-export client types (requires `client` feature).
#[cfg(feature = "client")]
pub mod client {
    pub use xsprims_client::*;
}

#[cfg(feature = "logging")]
pub mod logging;
