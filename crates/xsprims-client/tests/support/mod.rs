//! A single-threaded xenstore daemon living on the other side of the rings.
//!
//! Every `notify` or `poll` from the client pumps it once: drain the request
//! ring, answer every complete request from an in-memory tree, push as much
//! of the pending output as fits into the response ring, then raise the
//! client's pending bit if anything moved.
#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::AtomicUsize;

use bytes::BytesMut;
use xsprims_frame::msg_type::*;
use xsprims_frame::{decode_message, encode_message, Message, XENSTORE_PAYLOAD_MAX};
use xsprims_transport::bitops::set_bit;
use xsprims_transport::{BackendRing, EventChannelOps, EvtchnPort, Result, XenstoreInterface};

pub const PORT: EvtchnPort = 5;

pub fn bitmap() -> Vec<AtomicUsize> {
    (0..2).map(|_| AtomicUsize::new(0)).collect()
}

#[derive(Default)]
struct State {
    tree: BTreeMap<String, String>,
    watches: Vec<(String, String)>,
    inbound: BytesMut,
    outbound: BytesMut,
    fail_next: Option<String>,
    requests: Vec<Message>,
}

pub struct Xenstored<'a> {
    iface: &'a XenstoreInterface,
    pending: &'a [AtomicUsize],
    state: RefCell<State>,
    stalled: Cell<u64>,
    pub notifies: Cell<u64>,
    pub polls: Cell<u64>,
}

impl<'a> Xenstored<'a> {
    pub fn new(iface: &'a XenstoreInterface, pending: &'a [AtomicUsize]) -> Self {
        Self {
            iface,
            pending,
            state: RefCell::new(State::default()),
            stalled: Cell::new(0),
            notifies: Cell::new(0),
            polls: Cell::new(0),
        }
    }

    /// Answer the next request with an error reply carrying `name`.
    pub fn fail_next(&self, name: &str) {
        self.state.borrow_mut().fail_next = Some(name.to_string());
    }

    /// Ignore the next `pumps` notifies and polls entirely.
    pub fn stall(&self, pumps: u64) {
        self.stalled.set(pumps);
    }

    /// Deliver an unsolicited reply, as a misbehaving daemon would.
    pub fn inject(&self, msg_type: u32, req_id: u32, payload: &[u8]) {
        let mut state = self.state.borrow_mut();
        encode_message(msg_type, req_id, payload, &mut state.outbound)
            .expect("injected reply should encode");
    }

    /// Fire every watch covering `path` without any request from the client.
    pub fn touch(&self, path: &str) {
        let mut state = self.state.borrow_mut();
        fire_watches(&mut state, path);
    }

    pub fn value(&self, path: &str) -> Option<String> {
        self.state.borrow().tree.get(path).cloned()
    }

    pub fn requests(&self) -> Vec<Message> {
        self.state.borrow().requests.clone()
    }

    pub fn watch_count(&self) -> usize {
        self.state.borrow().watches.len()
    }

    fn pump(&self, port: EvtchnPort) {
        let stalled = self.stalled.get();
        if stalled > 0 {
            self.stalled.set(stalled - 1);
            return;
        }

        let backend = BackendRing::new(self.iface);
        let mut state = self.state.borrow_mut();

        let mut consumed = 0;
        let mut chunk = [0u8; 512];
        loop {
            let n = backend.read_some(&mut chunk);
            if n == 0 {
                break;
            }
            state.inbound.extend_from_slice(&chunk[..n]);
            consumed += n;
        }

        while let Some(request) = decode_message(&mut state.inbound, XENSTORE_PAYLOAD_MAX)
            .expect("client sent an oversized request")
        {
            handle(&mut state, &request);
            state.requests.push(request);
        }

        let mut produced = 0;
        while !state.outbound.is_empty() {
            let n = backend.write_some(&state.outbound);
            if n == 0 {
                break;
            }
            let _ = state.outbound.split_to(n);
            produced += n;
        }

        if consumed > 0 || produced > 0 {
            set_bit(port as usize, self.pending);
        }
    }
}

impl EventChannelOps for Xenstored<'_> {
    fn notify(&self, port: EvtchnPort) -> Result<()> {
        self.notifies.set(self.notifies.get() + 1);
        self.pump(port);
        Ok(())
    }

    fn poll(&self, port: EvtchnPort) {
        self.polls.set(self.polls.get() + 1);
        self.pump(port);
    }
}

fn fields(payload: &[u8]) -> Vec<String> {
    let trimmed = payload.strip_suffix(&[0]).unwrap_or(payload);
    trimmed
        .split(|b| *b == 0)
        .map(|field| String::from_utf8_lossy(field).into_owned())
        .collect()
}

fn child_prefix(path: &str) -> String {
    if path.ends_with('/') {
        path.to_string()
    } else {
        format!("{path}/")
    }
}

fn children(tree: &BTreeMap<String, String>, path: &str) -> BTreeSet<String> {
    let prefix = child_prefix(path);
    tree.keys()
        .filter_map(|key| key.strip_prefix(&prefix))
        .filter_map(|rest| rest.split('/').next())
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .collect()
}

fn create(tree: &mut BTreeMap<String, String>, path: &str, value: Option<&str>) {
    let mut ancestor = String::new();
    for part in path.split('/').filter(|part| !part.is_empty()) {
        ancestor.push('/');
        ancestor.push_str(part);
        tree.entry(ancestor.clone()).or_default();
    }
    if let Some(value) = value {
        tree.insert(path.to_string(), value.to_string());
    }
}

fn fire_watches(state: &mut State, path: &str) {
    let fired: Vec<String> = state
        .watches
        .iter()
        .filter(|(watched, _)| path == watched || path.starts_with(&child_prefix(watched)))
        .map(|(_, token)| token.clone())
        .collect();
    for token in fired {
        let payload = format!("{path}\0{token}\0");
        encode_message(XS_WATCH_EVENT, 0, payload.as_bytes(), &mut state.outbound)
            .expect("watch event should encode");
    }
}

fn reply(state: &mut State, request: &Message, msg_type: u32, payload: &[u8]) {
    encode_message(msg_type, request.header.req_id, payload, &mut state.outbound)
        .expect("reply should encode");
}

fn error(state: &mut State, request: &Message, name: &str) {
    let payload = format!("{name}\0");
    reply(state, request, XS_ERROR, payload.as_bytes());
}

fn handle(state: &mut State, request: &Message) {
    if let Some(name) = state.fail_next.take() {
        error(state, request, &name);
        return;
    }

    let args = fields(&request.payload);
    let path = args.first().cloned().unwrap_or_default();
    let msg_type = request.header.msg_type;

    match msg_type {
        XS_READ => match state.tree.get(&path).cloned() {
            Some(value) => reply(state, request, XS_READ, value.as_bytes()),
            None => error(state, request, "ENOENT"),
        },
        XS_WRITE => {
            let value = args.get(1).cloned().unwrap_or_default();
            create(&mut state.tree, &path, Some(&value));
            reply(state, request, XS_WRITE, b"OK\0");
            fire_watches(state, &path);
        }
        XS_MKDIR => {
            create(&mut state.tree, &path, None);
            reply(state, request, XS_MKDIR, b"OK\0");
            fire_watches(state, &path);
        }
        XS_DIRECTORY => {
            if !state.tree.contains_key(&path) && path != "/" {
                error(state, request, "ENOENT");
                return;
            }
            let mut listing = Vec::new();
            for name in children(&state.tree, &path) {
                listing.extend_from_slice(name.as_bytes());
                listing.push(0);
            }
            reply(state, request, XS_DIRECTORY, &listing);
        }
        XS_RM => {
            if !state.tree.contains_key(&path) {
                error(state, request, "ENOENT");
                return;
            }
            let prefix = child_prefix(&path);
            state
                .tree
                .retain(|key, _| key != &path && !key.starts_with(&prefix));
            reply(state, request, XS_RM, b"OK\0");
            fire_watches(state, &path);
        }
        XS_WATCH => {
            let token = args.get(1).cloned().unwrap_or_default();
            state.watches.push((path.clone(), token.clone()));
            reply(state, request, XS_WATCH, b"OK\0");
            let payload = format!("{path}\0{token}\0");
            encode_message(XS_WATCH_EVENT, 0, payload.as_bytes(), &mut state.outbound)
                .expect("watch event should encode");
        }
        XS_UNWATCH => {
            let token = args.get(1).cloned().unwrap_or_default();
            let before = state.watches.len();
            state
                .watches
                .retain(|(watched, tok)| !(watched == &path && tok == &token));
            if state.watches.len() == before {
                error(state, request, "ENOENT");
            } else {
                reply(state, request, XS_UNWATCH, b"OK\0");
            }
        }
        XS_GET_DOMAIN_PATH => {
            let payload = format!("/local/domain/{path}\0");
            reply(state, request, XS_GET_DOMAIN_PATH, payload.as_bytes());
        }
        XS_GET_PERMS => {
            if state.tree.contains_key(&path) {
                reply(state, request, XS_GET_PERMS, b"n0\0");
            } else {
                error(state, request, "ENOENT");
            }
        }
        _ => error(state, request, "EINVAL"),
    }
}
