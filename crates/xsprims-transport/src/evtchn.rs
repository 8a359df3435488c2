use std::sync::atomic::AtomicUsize;
use std::time::{Duration, Instant};

use crate::bitops::{bit_capacity, test_and_clear_bit, test_bit};
use crate::error::{fatal, Result, TransportError};
use crate::traits::EventChannelOps;

/// Event channel port number, as handed out by the host.
pub type EvtchnPort = u32;

/// One end of a single-bit notification channel to the host.
///
/// `signal` asks the host to notify the peer; `wait` blocks until the peer has
/// set this port's bit in the shared pending bitmap, then consumes it.
pub struct EventChannel<'a, H> {
    port: EvtchnPort,
    pending: &'a [AtomicUsize],
    ops: H,
    timeout: Option<Duration>,
}

impl<'a, H: EventChannelOps> EventChannel<'a, H> {
    /// Bind `port` to the shared pending bitmap.
    pub fn new(port: EvtchnPort, pending: &'a [AtomicUsize], ops: H) -> Result<Self> {
        let bits = bit_capacity(pending);
        if port as usize >= bits {
            return Err(TransportError::InvalidPort { port, bits });
        }
        Ok(Self {
            port,
            pending,
            ops,
            timeout: None,
        })
    }

    /// Give up waiting after `timeout` instead of blocking forever.
    ///
    /// `None` restores the plain protocol behaviour: a silent peer blocks the
    /// caller indefinitely.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Tell the peer that data is available.
    ///
    /// A host that cannot deliver the notification leaves no working transport.
    pub fn signal(&self) {
        if let Err(err) = self.ops.notify(self.port) {
            fatal(err);
        }
        tracing::trace!(port = self.port, "event channel signalled");
    }

    /// Block until the peer signals, consuming the pending bit.
    ///
    /// Returns immediately if the bit is already set. Otherwise the host's poll
    /// primitive is called until the bit shows up; spurious returns from poll
    /// are expected and simply re-checked.
    pub fn wait(&self) -> Result<()> {
        let started = self.timeout.map(|limit| (Instant::now(), limit));
        let mut polls: u64 = 0;

        while !test_and_clear_bit(self.port as usize, self.pending) {
            if let Some((since, limit)) = started {
                let waited = since.elapsed();
                if waited >= limit {
                    tracing::debug!(port = self.port, polls, ?waited, "event wait timed out");
                    return Err(TransportError::Timeout {
                        port: self.port,
                        waited,
                    });
                }
            }
            self.ops.poll(self.port);
            polls += 1;
        }

        if polls > 0 {
            tracing::trace!(port = self.port, polls, "event received");
        }
        Ok(())
    }

    /// Whether an event is pending, without consuming it.
    pub fn pending(&self) -> bool {
        test_bit(self.port as usize, self.pending)
    }

    /// The bound port.
    pub fn port(&self) -> EvtchnPort {
        self.port
    }

    /// The configured wait deadline.
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Borrow the host operations.
    pub fn ops(&self) -> &H {
        &self.ops
    }

    /// The shared pending bitmap.
    pub fn pending_bitmap(&self) -> &'a [AtomicUsize] {
        self.pending
    }
}

impl<H> std::fmt::Debug for EventChannel<'_, H> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventChannel")
            .field("port", &self.port)
            .field("timeout", &self.timeout)
            .finish()
    }
}
