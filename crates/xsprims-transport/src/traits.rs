use std::io::{Read, Write};

use crate::error::Result;
use crate::evtchn::{EventChannel, EvtchnPort};
use crate::ring::SharedRing;

/// Host primitives behind an event channel.
///
/// On a real guest these are the event-channel "send" and scheduler "poll"
/// hypercalls; tests substitute a simulated host.
pub trait EventChannelOps {
    /// Raise an event on `port` so the peer looks at the rings.
    fn notify(&self, port: EvtchnPort) -> Result<()>;

    /// Yield until something may have happened on `port`.
    ///
    /// May return without the pending bit being set.
    fn poll(&self, port: EvtchnPort);
}

impl<T: EventChannelOps + ?Sized> EventChannelOps for &T {
    fn notify(&self, port: EvtchnPort) -> Result<()> {
        (**self).notify(port)
    }

    fn poll(&self, port: EvtchnPort) {
        (**self).poll(port)
    }
}

/// A connected xenstore stream. Implements Read + Write.
///
/// Writes go to the request ring, reads come from the response ring, and
/// `flush` signals the peer. A `read` or `write` blocks until at least one
/// byte moves, then returns the count of one contiguous ring copy.
pub struct XsStream<'a, H> {
    ring: SharedRing<'a>,
    events: EventChannel<'a, H>,
    released: bool,
}

impl<'a, H: EventChannelOps> XsStream<'a, H> {
    pub fn new(ring: SharedRing<'a>, events: EventChannel<'a, H>) -> Self {
        Self {
            ring,
            events,
            released: false,
        }
    }

    /// Tell the peer that requests are waiting.
    pub fn signal(&self) {
        self.events.signal();
    }

    pub fn ring(&self) -> &SharedRing<'a> {
        &self.ring
    }

    pub fn events(&self) -> &EventChannel<'a, H> {
        &self.events
    }

    pub fn into_parts(self) -> (SharedRing<'a>, EventChannel<'a, H>) {
        (self.ring, self.events)
    }
}

impl<H: EventChannelOps> Read for XsStream<'_, H> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        loop {
            let read = self.ring.read_some(buf);
            if read > 0 {
                self.released = true;
                return Ok(read);
            }
            // The peer may be blocked on a full response ring we have drained.
            if self.released {
                self.events.signal();
                self.released = false;
            }
            self.events.wait()?;
        }
    }
}

impl<H: EventChannelOps> Write for XsStream<'_, H> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        loop {
            let written = self.ring.write_some(buf);
            if written > 0 {
                return Ok(written);
            }
            self.events.signal();
            self.released = false;
            self.events.wait()?;
        }
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.events.signal();
        self.released = false;
        Ok(())
    }
}

impl<H> std::fmt::Debug for XsStream<'_, H> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("XsStream")
            .field("ring", &self.ring)
            .field("events", &self.events)
            .field("released", &self.released)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;
    use std::sync::atomic::AtomicUsize;

    use super::*;
    use crate::bitops::set_bit;
    use crate::ring::{BackendRing, XenstoreInterface, XENSTORE_PAYLOAD_MAX, XENSTORE_RING_SIZE};

    /// Host that echoes every request byte straight back.
    struct EchoHost<'a> {
        iface: &'a XenstoreInterface,
        pending: &'a [AtomicUsize],
        notifies: Cell<usize>,
    }

    impl EventChannelOps for EchoHost<'_> {
        fn notify(&self, _port: EvtchnPort) -> Result<()> {
            self.notifies.set(self.notifies.get() + 1);
            Ok(())
        }

        fn poll(&self, port: EvtchnPort) {
            let backend = BackendRing::new(self.iface);
            let mut chunk = [0u8; 128];
            let n = backend.read_some(&mut chunk);
            let mut sent = 0;
            while sent < n {
                sent += backend.write_some(&chunk[sent..n]);
            }
            set_bit(port as usize, self.pending);
        }
    }

    #[test]
    fn stream_echoes_through_rings() {
        let iface = XenstoreInterface::new();
        let pending = vec![AtomicUsize::new(0)];
        let host = EchoHost {
            iface: &iface,
            pending: &pending,
            notifies: Cell::new(0),
        };
        let ring = SharedRing::new(&iface);
        let events = EventChannel::new(0, &pending, &host).unwrap();
        let mut stream = XsStream::new(ring, events);

        stream.write_all(b"ping-pong").unwrap();
        stream.flush().unwrap();
        let mut out = [0u8; 9];
        stream.read_exact(&mut out).unwrap();

        assert_eq!(&out, b"ping-pong");
        assert_eq!(host.notifies.get(), 1);
    }

    #[test]
    fn read_returns_what_is_available() {
        let iface = XenstoreInterface::new();
        let pending = vec![AtomicUsize::new(0)];
        let host = EchoHost {
            iface: &iface,
            pending: &pending,
            notifies: Cell::new(0),
        };
        let mut stream = XsStream::new(
            SharedRing::new(&iface),
            EventChannel::new(0, &pending, &host).unwrap(),
        );

        stream.write_all(b"short").unwrap();
        stream.flush().unwrap();
        let mut big = vec![0u8; 2 * XENSTORE_PAYLOAD_MAX];
        let n = stream.read(&mut big).unwrap();

        assert_eq!(&big[..n], b"short");
    }

    #[test]
    fn write_accepts_buffers_beyond_payload_maximum() {
        let iface = XenstoreInterface::new();
        let pending = vec![AtomicUsize::new(0)];
        let host = EchoHost {
            iface: &iface,
            pending: &pending,
            notifies: Cell::new(0),
        };
        let mut stream = XsStream::new(
            SharedRing::new(&iface),
            EventChannel::new(0, &pending, &host).unwrap(),
        );

        let data = vec![7u8; XENSTORE_PAYLOAD_MAX + 100];
        let n = stream.write(&data).unwrap();

        assert_eq!(n, XENSTORE_RING_SIZE);
    }

    #[test]
    fn empty_read_does_not_block() {
        let iface = XenstoreInterface::new();
        let pending = vec![AtomicUsize::new(0)];
        let host = EchoHost {
            iface: &iface,
            pending: &pending,
            notifies: Cell::new(0),
        };
        let mut stream = XsStream::new(
            SharedRing::new(&iface),
            EventChannel::new(0, &pending, &host).unwrap(),
        );

        assert_eq!(stream.read(&mut []).unwrap(), 0);
    }
}
