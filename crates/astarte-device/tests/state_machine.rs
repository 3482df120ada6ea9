//! Integration tests for the connection state machine driven against the
//! `FakeTransport`/`ScriptedPairingClient`/`MemoryCredentialStore` doubles:
//! a full connect handshake (control + server-owned subscribes, emptyCache
//! publish) and a subscription-failure backoff/retry cycle.

use astarte_device::config::Config;
use astarte_device::device::{Device, DeviceEventHandler, NullEventHandler};
use astarte_device::state::ConnectionState;
use astarte_device::storage::Storage;
use astarte_device_core::{Aggregation, Id, Interface, InterfaceType, Introspection, Mapping, MappingType, Ownership};
use astarte_device_net::credentials::MemoryCredentialStore;
use astarte_device_net::pairing::{PairingResponse, ScriptedPairingClient};
use astarte_device_net::transport::{FakeTransport, TransportEvent};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tempfile::tempdir;

fn config() -> Config {
    Config {
        realm: "acme".into(),
        device_id: "my-device".into(),
        pairing_url: "https://pairing.example".into(),
        credentials_secret: "s3cr3t".into(),
        store_dir: tempdir().unwrap().into_path(),
        interfaces_dir: tempdir().unwrap().into_path(),
        max_document_bytes: 4 * 1024 * 1024,
        backoff_min_ms: 5,
        backoff_max_ms: 500,
        insecure_skip_verify: true,
        log_format: "pretty".into(),
    }
}

fn introspection() -> Introspection {
    let mut intro = Introspection::init();
    intro.add(
        Interface::new(
            "org.acme.Sensors",
            1,
            0,
            Ownership::Device,
            Aggregation::Individual,
            InterfaceType::Datastream,
            vec![Mapping::new("/temperature", MappingType::Double)],
        )
        .unwrap(),
    );
    intro.add(
        Interface::new(
            "org.acme.Commands",
            1,
            0,
            Ownership::Server,
            Aggregation::Individual,
            InterfaceType::Datastream,
            vec![Mapping::new("/reboot", MappingType::Bool)],
        )
        .unwrap(),
    );
    intro
}

#[derive(Default)]
struct RecordingHandler {
    connected: AtomicUsize,
    disconnected: AtomicUsize,
    last_session_present: Mutex<Option<bool>>,
}

impl DeviceEventHandler for RecordingHandler {
    fn on_connected(&self, session_present: bool) {
        self.connected.fetch_add(1, Ordering::SeqCst);
        *self.last_session_present.lock() = Some(session_present);
    }

    fn on_disconnected(&self) {
        self.disconnected.fetch_add(1, Ordering::SeqCst);
    }
}

fn make_device(
    handler: Arc<dyn DeviceEventHandler>,
) -> (
    Device<FakeTransport, ScriptedPairingClient, MemoryCredentialStore>,
    Arc<FakeTransport>,
) {
    let config = config();
    let transport = FakeTransport::new();
    let pairing = Arc::new(ScriptedPairingClient::new(
        vec![PairingResponse {
            broker_url: "mqtts://broker.acme.example:8883".into(),
            client_crt_pem: "-----BEGIN CERTIFICATE-----\nfake\n-----END CERTIFICATE-----".into(),
        }],
        true,
    ));
    let credentials = Arc::new(MemoryCredentialStore::new());
    let storage = Arc::new(Storage::open(&config.store_dir).unwrap());
    let device = Device::new(
        &config,
        Id::v4(),
        introspection(),
        transport.clone(),
        pairing,
        credentials,
        storage,
        handler,
    );
    (device, transport)
}

/// S1: a fresh device pairs, arms the transport, and — once `poll()`
/// observes `Connected` and every `SubAck` it triggers — subscribes to the
/// control wildcard and every server-owned interface, publishes emptyCache,
/// and reaches `Connected`. `connect()` itself only arms the transport.
#[tokio::test]
async fn s1_full_connect_handshake() {
    let (device, transport) = make_device(Arc::new(NullEventHandler));

    device.connect().await.unwrap();
    assert_eq!(device.state(), ConnectionState::Connecting);

    transport.push_event(TransportEvent::Connected { session_present: false });
    device.poll().await.unwrap();
    assert_eq!(device.state(), ConnectionState::EndHandshake);

    let subscribed = transport.subscribed.lock();
    assert!(subscribed.iter().any(|(topic, _)| topic.ends_with("control/#")));
    assert!(subscribed.iter().any(|(topic, _)| topic.contains("org.acme.Commands")));
    assert!(!subscribed.iter().any(|(topic, _)| topic.contains("org.acme.Sensors")));
    let pending_ids: Vec<u16> = (1..=subscribed.len() as u16).collect();
    drop(subscribed);

    for id in pending_ids {
        transport.push_event(TransportEvent::SubAck { id, success: true });
        device.poll().await.unwrap();
    }

    assert_eq!(device.state(), ConnectionState::Connected);
    let published = transport.published.lock();
    assert!(published.iter().any(|(topic, _, _)| topic.ends_with("control/emptyCache")));
}

/// S6: the broker accepts the connection but rejects one subscribe in the
/// round. The single failure raises `subscription_failure`, which drops the
/// device to `HandshakeError`, waits one backoff tick, and re-enters
/// `StartHandshake` with a fresh subscribe round — all internally, inside
/// the `poll()` call that observed the last `SubAck` of the failed round.
/// Per §7 this retry never surfaces as an `Err` to the caller.
#[tokio::test]
async fn s6_subscription_failure_backs_off_and_retries() {
    let handler = Arc::new(RecordingHandler::default());
    let (device, transport) = make_device(handler.clone());

    device.connect().await.unwrap();
    transport.push_event(TransportEvent::Connected { session_present: false });
    device.poll().await.unwrap();
    assert_eq!(device.state(), ConnectionState::EndHandshake);

    let first_round_ids: Vec<u16> = (1..=transport.subscribed.lock().len() as u16).collect();
    assert_eq!(first_round_ids.len(), 2, "control wildcard + one server-owned interface");

    // Ack every id but the last as successful; fail the last one.
    for &id in &first_round_ids[..first_round_ids.len() - 1] {
        transport.push_event(TransportEvent::SubAck { id, success: true });
        device.poll().await.unwrap();
    }
    let failing_id = *first_round_ids.last().unwrap();
    transport.push_event(TransportEvent::SubAck { id: failing_id, success: false });
    device.poll().await.unwrap();

    // The failure was handled locally: no Err reached this test, and the
    // device re-entered the handshake rather than staying in HandshakeError.
    assert_eq!(device.state(), ConnectionState::EndHandshake);
    assert_eq!(handler.connected.load(Ordering::SeqCst), 0);

    let subs_after_retry = transport.subscribed.lock().len();
    assert_eq!(
        subs_after_retry,
        first_round_ids.len() * 2,
        "retry issued a fresh subscribe round of the same size"
    );
    let second_round_ids: Vec<u16> = (first_round_ids.len() as u16 + 1..=subs_after_retry as u16).collect();

    for id in second_round_ids {
        transport.push_event(TransportEvent::SubAck { id, success: true });
        device.poll().await.unwrap();
    }

    assert_eq!(device.state(), ConnectionState::Connected);
    assert_eq!(handler.connected.load(Ordering::SeqCst), 1);
    assert_eq!(*handler.last_session_present.lock(), Some(false));
}
