use std::sync::atomic::AtomicUsize;

use xsprims_transport::{
    ring::available, EventChannel, EventChannelOps, EvtchnPort, SharedRing, XenstoreInterface,
    XsStream, XENSTORE_RING_SIZE,
};

use crate::config::ClientConfig;
use crate::error::{ClientError, Result};
use crate::xenbus::XenBus;

/// Connect to xenstore over a page and port the caller has already discovered.
pub fn connect<'a, H: EventChannelOps>(
    iface: &'a XenstoreInterface,
    pending: &'a [AtomicUsize],
    port: EvtchnPort,
    ops: H,
) -> Result<XenBus<'a, H>> {
    connect_with_config(iface, pending, port, ops, ClientConfig::default())
}

/// Connect with explicit configuration.
///
/// Fails if the port has no bit in `pending` or if the page's cursors are
/// not a state any host could have left them in.
pub fn connect_with_config<'a, H: EventChannelOps>(
    iface: &'a XenstoreInterface,
    pending: &'a [AtomicUsize],
    port: EvtchnPort,
    ops: H,
    config: ClientConfig,
) -> Result<XenBus<'a, H>> {
    let (req_cons, req_prod, rsp_cons, rsp_prod) = iface.cursors();
    let halves = [
        ("request", req_prod, req_cons),
        ("response", rsp_prod, rsp_cons),
    ];
    for (ring, prod, cons) in halves {
        if available(prod, cons) as usize > XENSTORE_RING_SIZE {
            return Err(ClientError::Setup(format!(
                "{ring} ring cursors inconsistent (prod {prod}, cons {cons})"
            )));
        }
    }

    let events = EventChannel::new(port, pending, ops)
        .map_err(|err| ClientError::Setup(err.to_string()))?
        .with_timeout(config.wait_timeout);

    tracing::debug!(
        port,
        request_id = config.request_id,
        timeout = ?config.wait_timeout,
        "xenbus connected"
    );
    Ok(XenBus::from_stream(
        XsStream::new(SharedRing::new(iface), events),
        config,
    ))
}

#[cfg(test)]
mod tests {
    use xsprims_transport::Result as TransportResult;

    use super::*;

    struct NullHost;

    impl EventChannelOps for NullHost {
        fn notify(&self, _port: EvtchnPort) -> TransportResult<()> {
            Ok(())
        }

        fn poll(&self, _port: EvtchnPort) {}
    }

    #[test]
    fn connect_fresh_page() {
        let iface = XenstoreInterface::new();
        let pending = vec![AtomicUsize::new(0)];

        let bus = connect(&iface, &pending, 4, NullHost).unwrap();
        assert!(bus.is_open());
        assert_eq!(bus.config(), &ClientConfig::default());
        assert_eq!(bus.stream().events().port(), 4);
        assert_eq!(bus.stream().events().timeout(), None);
    }

    #[test]
    fn timeout_carried_into_event_channel() {
        let iface = XenstoreInterface::new();
        let pending = vec![AtomicUsize::new(0)];
        let config = ClientConfig {
            wait_timeout: Some(std::time::Duration::from_secs(2)),
            ..ClientConfig::default()
        };

        let bus = connect_with_config(&iface, &pending, 0, NullHost, config).unwrap();
        assert_eq!(
            bus.stream().events().timeout(),
            Some(std::time::Duration::from_secs(2))
        );
    }

    #[test]
    fn port_outside_bitmap_is_setup_error() {
        let iface = XenstoreInterface::new();
        let pending = vec![AtomicUsize::new(0)];

        let err = connect(&iface, &pending, usize::BITS, NullHost).unwrap_err();
        assert!(matches!(err, ClientError::Setup(_)));
    }

    #[test]
    fn corrupt_cursors_are_setup_error() {
        let raw = Box::into_raw(Box::new(XenstoreInterface::new()));
        // rsp_prod is the last word of the page.
        unsafe {
            raw.cast::<u8>()
                .add(2 * XENSTORE_RING_SIZE + 12)
                .cast::<u32>()
                .write(XENSTORE_RING_SIZE as u32 + 1);
        }
        let iface = unsafe { XenstoreInterface::from_raw(raw) };
        let pending = vec![AtomicUsize::new(0)];

        let err = connect(iface, &pending, 0, NullHost).unwrap_err();
        assert!(matches!(err, ClientError::Setup(ref msg) if msg.contains("response")));

        drop(unsafe { Box::from_raw(raw) });
    }
}
