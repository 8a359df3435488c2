//! Synchronous xenstore client.
//!
//! This is the "just works" layer. Connect over a shared page and event
//! channel, then read, write, list and watch keys. Exactly one request is in
//! flight at a time and every call blocks until the host has answered.

pub mod config;
pub mod connector;
pub mod errno;
pub mod error;
pub mod ops;
pub mod watch;
pub mod xenbus;

pub use config::{ClientConfig, DEFAULT_REQUEST_ID};
pub use connector::{connect, connect_with_config};
pub use errno::errno_for;
pub use error::{ClientError, Result};
pub use ops::DirectoryListing;
pub use watch::WatchEvent;
pub use xenbus::{Reply, XenBus};
