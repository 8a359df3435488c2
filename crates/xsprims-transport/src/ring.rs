//! The xenstore shared page: two byte rings with free-running cursors.
//!
//! ```text
//! ┌──────────────────┬──────────────────┬──────────┬──────────┬──────────┬──────────┐
//! │ req (1024 B)     │ rsp (1024 B)     │ req_cons │ req_prod │ rsp_cons │ rsp_prod │
//! │ guest → host     │ host → guest     │ (u32)    │ (u32)    │ (u32)    │ (u32)    │
//! └──────────────────┴──────────────────┴──────────┴──────────┴──────────┴──────────┘
//! ```
//!
//! Cursors only ever grow (mod 2^32); the byte offset of a cursor is
//! `cursor & (XENSTORE_RING_SIZE - 1)`. For each half `prod - cons` (wrapping)
//! is the number of unread bytes and never exceeds the ring size. A producer
//! publishes bytes by copying them first and advancing its cursor second, with
//! a full barrier in between; a consumer frees space the same way.

use std::cell::UnsafeCell;
use std::sync::atomic::{fence, AtomicU32, Ordering};

use crate::error::{fatal, Result};
use crate::evtchn::EventChannel;
use crate::traits::EventChannelOps;

/// Size of each ring half in bytes.
pub const XENSTORE_RING_SIZE: usize = 1024;

/// Largest payload a single xenstore message may carry.
pub const XENSTORE_PAYLOAD_MAX: usize = 4096;

const _: () = assert!(XENSTORE_RING_SIZE.is_power_of_two());

/// Byte offset inside a ring half for a free-running cursor value.
#[inline]
pub fn ring_index(cursor: u32) -> usize {
    cursor as usize & (XENSTORE_RING_SIZE - 1)
}

/// Unread bytes between a producer and consumer cursor.
#[inline]
pub fn available(prod: u32, cons: u32) -> u32 {
    prod.wrapping_sub(cons)
}

/// Bytes a producer may still write before catching up with the consumer.
#[inline]
pub fn free_space(prod: u32, cons: u32) -> u32 {
    XENSTORE_RING_SIZE as u32 - available(prod, cons)
}

/// Shared page layout, bit-compatible with the host's `xenstore_domain_interface`.
#[repr(C)]
pub struct XenstoreInterface {
    req: UnsafeCell<[u8; XENSTORE_RING_SIZE]>,
    rsp: UnsafeCell<[u8; XENSTORE_RING_SIZE]>,
    req_cons: AtomicU32,
    req_prod: AtomicU32,
    rsp_cons: AtomicU32,
    rsp_prod: AtomicU32,
}

const _: () = assert!(core::mem::size_of::<XenstoreInterface>() == 2 * XENSTORE_RING_SIZE + 16);

// SAFETY: the byte buffers are only touched through `RingHalf`, which copies
// exclusively inside the region its cursor pair grants to the caller's side.
unsafe impl Sync for XenstoreInterface {}

impl XenstoreInterface {
    /// A zeroed interface, for hosts that allocate the page themselves.
    pub fn new() -> Self {
        Self {
            req: UnsafeCell::new([0; XENSTORE_RING_SIZE]),
            rsp: UnsafeCell::new([0; XENSTORE_RING_SIZE]),
            req_cons: AtomicU32::new(0),
            req_prod: AtomicU32::new(0),
            rsp_cons: AtomicU32::new(0),
            rsp_prod: AtomicU32::new(0),
        }
    }

    /// View a mapped xenstore page.
    ///
    /// # Safety
    /// `ptr` must point to a mapped, suitably aligned xenstore page that stays
    /// mapped for `'a` and is only shared with the xenstore host.
    pub unsafe fn from_raw<'a>(ptr: *mut XenstoreInterface) -> &'a XenstoreInterface {
        // SAFETY: guaranteed by the caller.
        unsafe { &*ptr }
    }

    /// Zero both rings and all four cursors.
    ///
    /// Only meaningful at teardown, once neither side is using the page.
    pub fn reset(&self) {
        self.req_cons.store(0, Ordering::SeqCst);
        self.req_prod.store(0, Ordering::SeqCst);
        self.rsp_cons.store(0, Ordering::SeqCst);
        self.rsp_prod.store(0, Ordering::SeqCst);
        // SAFETY: both buffers are exactly XENSTORE_RING_SIZE bytes and no
        // reference into them outlives a single RingHalf copy.
        unsafe {
            std::ptr::write_bytes(self.req.get().cast::<u8>(), 0, XENSTORE_RING_SIZE);
            std::ptr::write_bytes(self.rsp.get().cast::<u8>(), 0, XENSTORE_RING_SIZE);
        }
        fence(Ordering::SeqCst);
    }

    /// Current `(req_cons, req_prod, rsp_cons, rsp_prod)`.
    pub fn cursors(&self) -> (u32, u32, u32, u32) {
        (
            self.req_cons.load(Ordering::Acquire),
            self.req_prod.load(Ordering::Acquire),
            self.rsp_cons.load(Ordering::Acquire),
            self.rsp_prod.load(Ordering::Acquire),
        )
    }

    fn request(&self) -> RingHalf<'_> {
        RingHalf {
            name: "req",
            buf: &self.req,
            prod: &self.req_prod,
            cons: &self.req_cons,
        }
    }

    fn response(&self) -> RingHalf<'_> {
        RingHalf {
            name: "rsp",
            buf: &self.rsp,
            prod: &self.rsp_prod,
            cons: &self.rsp_cons,
        }
    }
}

impl Default for XenstoreInterface {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for XenstoreInterface {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let (req_cons, req_prod, rsp_cons, rsp_prod) = self.cursors();
        f.debug_struct("XenstoreInterface")
            .field("req_cons", &req_cons)
            .field("req_prod", &req_prod)
            .field("rsp_cons", &rsp_cons)
            .field("rsp_prod", &rsp_prod)
            .finish()
    }
}

/// One direction of the page. Whoever calls `produce` owns `prod`, whoever
/// calls `consume` owns `cons`.
struct RingHalf<'a> {
    name: &'static str,
    buf: &'a UnsafeCell<[u8; XENSTORE_RING_SIZE]>,
    prod: &'a AtomicU32,
    cons: &'a AtomicU32,
}

impl RingHalf<'_> {
    fn checked_used(&self, prod: u32, cons: u32) -> u32 {
        let used = available(prod, cons);
        if used as usize > XENSTORE_RING_SIZE {
            fatal(format_args!(
                "{} ring cursors corrupt (prod {prod}, cons {cons})",
                self.name
            ));
        }
        used
    }

    fn used(&self) -> usize {
        let cons = self.cons.load(Ordering::Acquire);
        let prod = self.prod.load(Ordering::Acquire);
        self.checked_used(prod, cons) as usize
    }

    /// Copy one contiguous chunk in and publish it. Returns bytes written.
    fn produce(&self, data: &[u8]) -> usize {
        let cons = self.cons.load(Ordering::Acquire);
        let prod = self.prod.load(Ordering::Relaxed);
        let free = XENSTORE_RING_SIZE - self.checked_used(prod, cons) as usize;
        let start = ring_index(prod);
        let part = free.min(XENSTORE_RING_SIZE - start).min(data.len());
        if part == 0 {
            return 0;
        }

        // SAFETY: `start + part <= XENSTORE_RING_SIZE`, and the region lies in
        // the free space the consumer will not read until `prod` moves past it.
        unsafe {
            std::ptr::copy_nonoverlapping(
                data.as_ptr(),
                self.buf.get().cast::<u8>().add(start),
                part,
            );
        }
        fence(Ordering::SeqCst);
        self.prod.store(prod.wrapping_add(part as u32), Ordering::Release);
        tracing::trace!(ring = self.name, offset = start, len = part, "ring produce");
        part
    }

    /// Copy one contiguous chunk out and release it. Returns bytes read.
    fn consume(&self, out: &mut [u8]) -> usize {
        let prod = self.prod.load(Ordering::Acquire);
        let cons = self.cons.load(Ordering::Relaxed);
        let avail = self.checked_used(prod, cons) as usize;
        let start = ring_index(cons);
        let part = avail.min(XENSTORE_RING_SIZE - start).min(out.len());
        if part == 0 {
            return 0;
        }

        // SAFETY: `start + part <= XENSTORE_RING_SIZE`, and the region was
        // published by the producer before `prod` was advanced past it.
        unsafe {
            std::ptr::copy_nonoverlapping(
                self.buf.get().cast::<u8>().add(start),
                out.as_mut_ptr(),
                part,
            );
        }
        fence(Ordering::SeqCst);
        self.cons.store(cons.wrapping_add(part as u32), Ordering::Release);
        tracing::trace!(ring = self.name, offset = start, len = part, "ring consume");
        part
    }
}

fn check_length(op: &str, len: usize) {
    if len > XENSTORE_PAYLOAD_MAX {
        fatal(format_args!(
            "ring {op} of {len} bytes exceeds payload maximum {XENSTORE_PAYLOAD_MAX}"
        ));
    }
}

/// Guest view of the page: writes requests, reads responses.
#[derive(Clone, Copy)]
pub struct SharedRing<'a> {
    iface: &'a XenstoreInterface,
}

impl<'a> SharedRing<'a> {
    pub fn new(iface: &'a XenstoreInterface) -> Self {
        Self { iface }
    }

    /// Bytes that can be written to the request ring right now.
    pub fn free_space(&self) -> usize {
        XENSTORE_RING_SIZE - self.iface.request().used()
    }

    /// Response bytes waiting to be read.
    pub fn available(&self) -> usize {
        self.iface.response().used()
    }

    /// Copy as much of `data` as fits without wrapping. Never blocks.
    pub fn write_some(&self, data: &[u8]) -> usize {
        self.iface.request().produce(data)
    }

    /// Read as much into `out` as is contiguous and available. Never blocks.
    pub fn read_some(&self, out: &mut [u8]) -> usize {
        self.iface.response().consume(out)
    }

    /// Write all of `data` to the request ring, waiting for space as needed.
    ///
    /// When the ring is full the peer is signalled before waiting, since it
    /// only drains requests it has been told about.
    pub fn write<H: EventChannelOps>(
        &self,
        data: &[u8],
        events: &EventChannel<'_, H>,
    ) -> Result<()> {
        check_length("write", data.len());

        let mut rest = data;
        while !rest.is_empty() {
            let written = self.write_some(rest);
            if written == 0 {
                events.signal();
                events.wait()?;
                continue;
            }
            rest = &rest[written..];
        }
        Ok(())
    }

    /// Fill `out` from the response ring, waiting for data as needed.
    ///
    /// The peer is signalled before waiting whenever this call has freed
    /// space, so a response larger than the ring can keep flowing.
    pub fn read<H: EventChannelOps>(
        &self,
        out: &mut [u8],
        events: &EventChannel<'_, H>,
    ) -> Result<()> {
        check_length("read", out.len());

        let mut filled = 0;
        let mut released = false;
        while filled < out.len() {
            let read = self.read_some(&mut out[filled..]);
            if read == 0 {
                if released {
                    events.signal();
                    released = false;
                }
                events.wait()?;
                continue;
            }
            filled += read;
            released = true;
        }
        Ok(())
    }

    pub fn interface(&self) -> &'a XenstoreInterface {
        self.iface
    }
}

impl std::fmt::Debug for SharedRing<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("SharedRing").field(self.iface).finish()
    }
}

/// Host view of the page: reads requests, writes responses.
///
/// Used by xenstore daemon implementations and by simulations of one.
#[derive(Clone, Copy)]
pub struct BackendRing<'a> {
    iface: &'a XenstoreInterface,
}

impl<'a> BackendRing<'a> {
    pub fn new(iface: &'a XenstoreInterface) -> Self {
        Self { iface }
    }

    /// Request bytes waiting to be read.
    pub fn pending_requests(&self) -> usize {
        self.iface.request().used()
    }

    /// Bytes that can be written to the response ring right now.
    pub fn response_space(&self) -> usize {
        XENSTORE_RING_SIZE - self.iface.response().used()
    }

    /// Read one contiguous chunk of request bytes.
    pub fn read_some(&self, out: &mut [u8]) -> usize {
        self.iface.request().consume(out)
    }

    /// Write one contiguous chunk of response bytes.
    pub fn write_some(&self, data: &[u8]) -> usize {
        self.iface.response().produce(data)
    }
}
