use std::collections::VecDeque;
use std::sync::atomic::Ordering;

use xsprims_frame::msg_type::{is_known, XS_ERROR, XS_WATCH_EVENT};
use xsprims_frame::{type_name, FrameError, MessageReader, MessageRef, MessageWriter};
use xsprims_transport::{fatal, EventChannelOps, XsStream};

use crate::config::ClientConfig;
use crate::errno::errno_for;
use crate::error::{ClientError, Result};
use crate::watch::WatchEvent;

/// A reply to the request just sent.
///
/// Borrows the connection's scratch buffer, so it must be dropped before the
/// next request.
#[derive(Debug, Clone, Copy)]
pub struct Reply<'a> {
    msg: MessageRef<'a>,
}

impl<'a> Reply<'a> {
    pub fn msg_type(&self) -> u32 {
        self.msg.header.msg_type
    }

    pub fn req_id(&self) -> u32 {
        self.msg.header.req_id
    }

    /// Payload length as declared in the reply header.
    pub fn len(&self) -> usize {
        self.msg.header.len as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn payload(&self) -> &'a [u8] {
        self.msg.payload()
    }

    /// The payload followed by a nul, so text replies can always be terminated.
    pub fn payload_with_nul(&self) -> &'a [u8] {
        self.msg.payload_with_nul()
    }

    /// The payload up to its first nul, as text.
    pub fn text(&self) -> Result<&'a str> {
        Ok(std::str::from_utf8(until_nul(self.payload_with_nul()))?)
    }

    /// Fail unless the host answered with `expected`.
    pub fn expect_type(self, expected: u32) -> Result<Self> {
        if self.msg_type() != expected {
            return Err(ClientError::UnexpectedReply {
                expected: type_name(expected),
                actual: type_name(self.msg_type()),
            });
        }
        Ok(self)
    }
}

pub(crate) fn until_nul(bytes: &[u8]) -> &[u8] {
    let end = bytes.iter().position(|b| *b == 0).unwrap_or(bytes.len());
    &bytes[..end]
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Open,
    /// A read or write failed part way; the rings may hold half a message.
    Broken,
    Closed,
}

/// An established connection to the xenstore host.
///
/// One request is in flight at a time: `send` writes the request, then blocks
/// until the matching reply has been read in full.
pub struct XenBus<'a, H> {
    reader: MessageReader<XsStream<'a, H>>,
    config: ClientConfig,
    events: VecDeque<WatchEvent>,
    state: State,
}

impl<'a, H: EventChannelOps> XenBus<'a, H> {
    pub(crate) fn from_stream(stream: XsStream<'a, H>, config: ClientConfig) -> Self {
        Self {
            reader: MessageReader::new(stream),
            config,
            events: VecDeque::new(),
            state: State::Open,
        }
    }

    /// Send one request and wait for its reply.
    ///
    /// Watch events that arrive first are queued for [`XenBus::next_watch_event`].
    /// An error reply becomes [`ClientError::Xenstore`] with the errno for the
    /// name the host sent.
    ///
    /// A transport or framing failure (a timeout included) may leave part of a
    /// message in either ring, so it retires the connection: every later call
    /// except [`XenBus::shutdown`] is fatal.
    pub fn send(&mut self, msg_type: u32, payload: &[u8]) -> Result<Reply<'_>> {
        self.ensure_usable();
        let req_id = self.config.request_id;

        let mut writer = MessageWriter::new(self.reader.get_mut());
        match writer.send(msg_type, req_id, payload) {
            Ok(()) => {}
            Err(FrameError::PayloadTooLarge { size, max }) => fatal(format!(
                "{} request of {size} bytes exceeds payload maximum {max}",
                type_name(msg_type)
            )),
            Err(err) => {
                retire(&mut self.state, &err);
                return Err(err.into());
            }
        }
        tracing::debug!(
            msg_type = type_name(msg_type),
            req_id,
            len = payload.len(),
            "request sent"
        );

        let header = loop {
            let msg = self.read_reply()?;
            if msg.header.msg_type != XS_WATCH_EVENT {
                break msg.header;
            }
            match WatchEvent::parse(msg.payload()) {
                Ok(event) => {
                    tracing::debug!(
                        path = %event.path,
                        token = %event.token,
                        "watch event queued"
                    );
                    self.events.push_back(event);
                }
                Err(err) => tracing::warn!(error = %err, "dropping malformed watch event"),
            }
        };

        if !is_known(header.msg_type) {
            tracing::warn!(msg_type = header.msg_type, "reply has an unknown type code");
        }
        if header.req_id != req_id {
            tracing::warn!(
                expected = req_id,
                actual = header.req_id,
                "reply carries a different request id"
            );
        }

        let msg = self
            .reader
            .last_message()
            .ok_or_else(|| ClientError::MalformedReply("reply vanished".to_string()))?;

        if header.msg_type == XS_ERROR {
            let name = String::from_utf8_lossy(until_nul(msg.payload_with_nul())).into_owned();
            tracing::debug!(request = type_name(msg_type), %name, "host returned error");
            return Err(ClientError::Xenstore {
                errno: errno_for(&name),
                name,
            });
        }

        tracing::debug!(
            msg_type = type_name(header.msg_type),
            len = header.len,
            "reply received"
        );
        Ok(Reply { msg })
    }

    /// The next fired watch, blocking until the host delivers one.
    ///
    /// Events queued while waiting for earlier replies come out first. Events
    /// that do not parse are logged and skipped. A failure while waiting
    /// retires the connection as in [`XenBus::send`].
    pub fn next_watch_event(&mut self) -> Result<WatchEvent> {
        self.ensure_usable();
        if let Some(event) = self.events.pop_front() {
            return Ok(event);
        }
        loop {
            let msg = self.read_reply()?;
            if msg.header.msg_type == XS_WATCH_EVENT {
                match WatchEvent::parse(msg.payload()) {
                    Ok(event) => return Ok(event),
                    Err(err) => {
                        tracing::warn!(error = %err, "dropping malformed watch event");
                        continue;
                    }
                }
            }
            tracing::warn!(
                msg_type = type_name(msg.header.msg_type),
                len = msg.header.len,
                "dropping unsolicited reply while waiting for watch event"
            );
        }
    }

    /// Watch events received but not yet handed out.
    pub fn queued_events(&self) -> usize {
        self.events.len()
    }

    /// Tear the connection down.
    ///
    /// Zeroes both rings and their cursors and clears the pending bitmap.
    /// Any later use of this connection is fatal. A retired connection can
    /// still be shut down, which leaves the page ready for a fresh `connect`.
    pub fn shutdown(&mut self) {
        if self.state == State::Closed {
            fatal("xenbus used after shutdown");
        }
        let stream = self.reader.get_ref();
        stream.ring().interface().reset();
        for word in stream.events().pending_bitmap() {
            word.store(0, Ordering::SeqCst);
        }
        self.events.clear();
        self.state = State::Closed;
        tracing::info!(port = stream.events().port(), "xenbus shut down");
    }

    /// False once [`XenBus::shutdown`] has run.
    pub fn is_open(&self) -> bool {
        self.state != State::Closed
    }

    /// True when a failed exchange has retired this connection.
    pub fn is_broken(&self) -> bool {
        self.state == State::Broken
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn stream(&self) -> &XsStream<'a, H> {
        self.reader.get_ref()
    }

    fn ensure_usable(&self) {
        match self.state {
            State::Open => {}
            State::Broken => fatal("xenbus used after an interrupted exchange"),
            State::Closed => fatal("xenbus used after shutdown"),
        }
    }

    fn read_reply(&mut self) -> Result<MessageRef<'_>> {
        match self.reader.read_message() {
            Ok(msg) => Ok(msg),
            Err(FrameError::PayloadTooLarge { size, max }) => fatal(format!(
                "host declared a {size} byte reply, payload maximum is {max}"
            )),
            Err(err) => {
                retire(&mut self.state, &err);
                Err(err.into())
            }
        }
    }
}

fn retire(state: &mut State, err: &FrameError) {
    tracing::warn!(error = %err, "exchange interrupted, retiring connection");
    *state = State::Broken;
}

impl<H> std::fmt::Debug for XenBus<'_, H> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("XenBus")
            .field("config", &self.config)
            .field("queued_events", &self.events.len())
            .field("state", &self.state)
            .finish()
    }
}
