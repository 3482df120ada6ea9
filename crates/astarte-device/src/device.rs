//! Device facade (C6): the surface an application holds. Wraps the
//! connection state machine (C5) around a `Transport`, a `PairingClient`,
//! and a `CredentialStore`, dispatching inbound server-owned data to a
//! `DeviceEventHandler`.
//!
//! Generic over the three capability traits rather than `dyn`: all three
//! use native async-fn-in-traits, which are not object-safe.

use crate::config::Config;
use crate::error::{DeviceError, Result};
use crate::state::{Backoff, ConnectionState};
use crate::storage::Storage;
use astarte_device_core::{
    decode_message, decode_object_message, encode_message, encode_object_message, Aggregation,
    Id, Introspection, MappingType, ObjectEntry, Ownership, TypedValue,
};
use astarte_device_net::topic::{ParsedTopic, TopicBuilder, EMPTY_CACHE_PAYLOAD};
use astarte_device_net::{CredentialStore, PairingClient, Transport, TransportEvent};
use parking_lot::RwLock;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

/// Callbacks for inbound server-owned data and connection lifecycle events.
/// Default bodies are no-ops so a handler only needs to override what it cares about.
pub trait DeviceEventHandler: Send + Sync {
    fn on_connected(&self, _session_present: bool) {}
    fn on_disconnected(&self) {}
    fn on_data_individual(&self, _interface: &str, _path: &str, _value: &TypedValue) {}
    fn on_data_object(&self, _interface: &str, _entries: &[ObjectEntry]) {}
    fn on_property_unset(&self, _interface: &str, _path: &str) {}
}

pub struct NullEventHandler;
impl DeviceEventHandler for NullEventHandler {}

pub struct Device<T: Transport, P: PairingClient, C: CredentialStore> {
    id: Id,
    realm: String,
    introspection: Introspection,
    topics: TopicBuilder,
    transport: Arc<T>,
    pairing: Arc<P>,
    credentials: Arc<C>,
    storage: Arc<Storage>,
    handler: Arc<dyn DeviceEventHandler>,
    state: RwLock<ConnectionState>,
    backoff: parking_lot::Mutex<Backoff>,
    /// Subscribe ids issued by the current handshake round that haven't
    /// been acknowledged yet; `EndHandshake` drains this to zero.
    pending_subs: parking_lot::Mutex<HashSet<u16>>,
    /// Set by any `SubAck { success: false }` seen during the current
    /// handshake round; consumed once the round's acks are all in.
    subscription_failure: AtomicBool,
    /// `session_present` from the most recent `TransportEvent::Connected`,
    /// forwarded to the handler once the handshake actually reaches `Connected`.
    session_present: parking_lot::Mutex<bool>,
    /// Per-device ceiling passed to `decode_message`/`decode_object_message`,
    /// clamped to `astarte_device_core::MAX_DOCUMENT_BYTES` by the codec itself.
    max_document_bytes: usize,
}

impl<T: Transport, P: PairingClient, C: CredentialStore> Device<T, P, C> {
    pub fn new(
        config: &Config,
        device_id: Id,
        introspection: Introspection,
        transport: Arc<T>,
        pairing: Arc<P>,
        credentials: Arc<C>,
        storage: Arc<Storage>,
        handler: Arc<dyn DeviceEventHandler>,
    ) -> Self {
        let topics = TopicBuilder::new(&config.realm, &device_id.to_base64url());
        Device {
            id: device_id,
            realm: config.realm.clone(),
            introspection,
            topics,
            transport,
            pairing,
            credentials,
            storage,
            handler,
            state: RwLock::new(ConnectionState::Disconnected),
            backoff: parking_lot::Mutex::new(Backoff::new(
                config.backoff_min(),
                config.backoff_max(),
            )),
            pending_subs: parking_lot::Mutex::new(HashSet::new()),
            subscription_failure: AtomicBool::new(false),
            session_present: parking_lot::Mutex::new(false),
            max_document_bytes: config.max_document_bytes,
        }
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.read()
    }

    fn set_state(&self, s: ConnectionState) {
        debug!(?s, "connection state transition");
        *self.state.write() = s;
    }

    /// Non-blocking: ensures credentials then arms the transport and
    /// returns. `StartHandshake`/`EndHandshake`/`Connected` are reached by
    /// `poll()` as it observes `TransportEvent::Connected` and the
    /// subsequent `SubAck`s — `connect()` itself never occupies them.
    pub async fn connect(&self) -> Result<()> {
        if self.state() == ConnectionState::Connected {
            return Err(DeviceError::AlreadyConnected);
        }
        self.set_state(ConnectionState::Connecting);

        if let Err(e) = self.ensure_credentials().await {
            self.set_state(ConnectionState::HandshakeError);
            return Err(e);
        }

        self.transport.connect().await?;
        Ok(())
    }

    /// Entered once per `TransportEvent::Connected`. Skips straight to
    /// `Connected` on a matching resumed session; otherwise issues the
    /// subscribe round and waits in `EndHandshake` for the `SubAck`s.
    async fn handle_transport_connected(&self, session_present: bool) -> Result<()> {
        self.set_state(ConnectionState::StartHandshake);
        *self.session_present.lock() = session_present;

        let canonical = self.introspection.canonical_string();
        let stored_matches = self.storage.get_introspection().ok().flatten().as_deref() == Some(canonical.as_str());

        if session_present && stored_matches {
            self.set_state(ConnectionState::Connected);
            self.backoff.lock().reset();
            self.handler.on_connected(session_present);
            return Ok(());
        }

        if !stored_matches {
            self.storage.put_introspection(&canonical)?;
        }

        self.subscription_failure.store(false, Ordering::SeqCst);
        self.subscribe_server_owned().await?;
        self.set_state(ConnectionState::EndHandshake);
        Ok(())
    }

    /// Folds one `SubAck` into the current handshake round. Once every
    /// outstanding subscribe id has been acknowledged: a clean round
    /// publishes emptyCache and reaches `Connected`; a round with any
    /// failure raises `subscription_failure`, drops to `HandshakeError`,
    /// waits one backoff tick, and re-enters `StartHandshake` by issuing a
    /// fresh subscribe round — handled entirely within this call, per §7's
    /// "state-machine errors are handled locally".
    async fn handle_suback(&self, id: u16, success: bool) -> Result<()> {
        if !success {
            warn!(id, "subscription rejected by broker");
            self.subscription_failure.store(true, Ordering::SeqCst);
        }

        let remaining = {
            let mut pending = self.pending_subs.lock();
            pending.remove(&id);
            pending.len()
        };
        if remaining > 0 {
            return Ok(());
        }

        if self.subscription_failure.swap(false, Ordering::SeqCst) {
            self.set_state(ConnectionState::HandshakeError);
            let delay = self.backoff.lock().next_delay();
            tokio::time::sleep(delay).await;
            self.set_state(ConnectionState::StartHandshake);
            self.subscribe_server_owned().await?;
            self.set_state(ConnectionState::EndHandshake);
            return Ok(());
        }

        self.transport
            .publish(&self.topics.empty_cache(), EMPTY_CACHE_PAYLOAD.to_vec(), 2, false)
            .await?;
        self.set_state(ConnectionState::Connected);
        self.backoff.lock().reset();
        self.handler.on_connected(*self.session_present.lock());
        Ok(())
    }

    async fn ensure_credentials(&self) -> Result<()> {
        let have_cert = self.credentials.load_certificate()?.is_some();
        let still_valid = if let Some(cert) = self.credentials.load_certificate()? {
            self.pairing.verify_certificate(&cert).await.unwrap_or(false)
        } else {
            false
        };
        if have_cert && still_valid {
            return Ok(());
        }
        let csr = format!("CSR for {}", self.id.to_string_canonical());
        let response = self.pairing.obtain_credentials(&csr).await?;
        self.credentials.store_certificate(&response.client_crt_pem)?;
        Ok(())
    }

    /// Issues one subscribe round and records every id it's waiting on in
    /// `pending_subs`; does not wait for the acks itself.
    async fn subscribe_server_owned(&self) -> Result<()> {
        self.pending_subs.lock().clear();
        let id = self.transport.subscribe(&self.topics.control_wildcard(), 2).await?;
        self.pending_subs.lock().insert(id);
        for iface in self.introspection.iter() {
            if iface.ownership == Ownership::Server {
                let id = self
                    .transport
                    .subscribe(&self.topics.interface_wildcard(&iface.name), 2)
                    .await?;
                self.pending_subs.lock().insert(id);
            }
        }
        Ok(())
    }

    pub async fn disconnect(&self) -> Result<()> {
        self.transport.disconnect().await?;
        self.set_state(ConnectionState::Disconnected);
        self.handler.on_disconnected();
        Ok(())
    }

    /// Pulls and dispatches the next transport event. Callers drive this
    /// in a loop; it never sleeps beyond the transport's own `poll`.
    pub async fn poll(&self) -> Result<()> {
        let event = self.transport.poll().await?;
        match event {
            TransportEvent::Connected { session_present } => {
                self.handle_transport_connected(session_present).await?;
            }
            TransportEvent::Disconnected => {
                self.set_state(ConnectionState::Disconnected);
                self.handler.on_disconnected();
            }
            TransportEvent::SubAck { id, success } => {
                self.handle_suback(id, success).await?;
            }
            TransportEvent::PubAck { .. } => {}
            TransportEvent::Publish { topic, payload, qos: _ } => {
                self.dispatch_publish(&topic, &payload)?;
            }
        }
        Ok(())
    }

    fn dispatch_publish(&self, topic: &str, payload: &[u8]) -> Result<()> {
        let parsed = match self.topics.parse(topic) {
            Some(p) => p,
            None => {
                warn!(topic, "publish on a topic outside our base, ignoring");
                return Ok(());
            }
        };
        match parsed {
            ParsedTopic::EmptyCacheAck | ParsedTopic::ConsumerProperties | ParsedTopic::OtherControl => Ok(()),
            ParsedTopic::Data(data) => {
                let iface = self
                    .introspection
                    .get_by_name(&data.interface)
                    .ok_or_else(|| DeviceError::UnknownInterface(data.interface.clone()))?;

                if iface.aggregation == Aggregation::Object {
                    let mapping_type_of = |key: &str| {
                        iface.get_mapping(&format!("/{key}")).map(|m| m.mapping_type)
                    };
                    let (entries, _ts) = decode_object_message(payload, mapping_type_of, self.max_document_bytes)?;
                    self.handler.on_data_object(&data.interface, &entries);
                } else if payload.is_empty() {
                    self.storage.remove_property(&format!("{}{}", data.interface, data.path)).ok();
                    self.handler.on_property_unset(&data.interface, &data.path);
                } else {
                    let mapping = iface
                        .get_mapping(&data.path)
                        .ok_or_else(|| DeviceError::UnknownMapping(data.interface.clone(), data.path.clone()))?;
                    let (value, _ts) = decode_message(mapping.mapping_type, payload, self.max_document_bytes)?;
                    self.handler.on_data_individual(&data.interface, &data.path, &value);
                }
                Ok(())
            }
        }
    }

    fn lookup_device_owned_mapping(&self, interface: &str, path: &str) -> Result<MappingType> {
        let iface = self
            .introspection
            .get_by_name(interface)
            .ok_or_else(|| DeviceError::UnknownInterface(interface.to_string()))?;
        if iface.ownership != Ownership::Device {
            return Err(DeviceError::UnknownInterface(format!(
                "{interface} is server-owned, device cannot publish to it"
            )));
        }
        let mapping = iface
            .get_mapping(path)
            .ok_or_else(|| DeviceError::UnknownMapping(interface.to_string(), path.to_string()))?;
        Ok(mapping.mapping_type)
    }

    pub async fn send_individual(
        &self,
        interface: &str,
        path: &str,
        value: TypedValue,
        timestamp: Option<i64>,
    ) -> Result<()> {
        if self.state() != ConnectionState::Connected {
            return Err(DeviceError::NotConnected);
        }
        let expected = self.lookup_device_owned_mapping(interface, path)?;
        if value.mapping_type() != expected {
            return Err(DeviceError::MappingTypeMismatch {
                expected: expected.to_string(),
                found: value.mapping_type().to_string(),
            });
        }
        let bytes = encode_message(&value, timestamp);
        let qos = self
            .introspection
            .get_mapping(interface, path)
            .map(|m| m.reliability.qos())
            .unwrap_or(0);
        self.transport
            .publish(&self.topics.data(interface, path), bytes, qos, false)
            .await?;
        Ok(())
    }

    pub async fn send_object(
        &self,
        interface: &str,
        entries: Vec<ObjectEntry>,
        timestamp: Option<i64>,
    ) -> Result<()> {
        if self.state() != ConnectionState::Connected {
            return Err(DeviceError::NotConnected);
        }
        let iface = self
            .introspection
            .get_by_name(interface)
            .ok_or_else(|| DeviceError::UnknownInterface(interface.to_string()))?;
        if iface.aggregation != Aggregation::Object {
            return Err(DeviceError::WrongAggregation(interface.to_string()));
        }
        let base_path = entries
            .first()
            .map(|e| common_prefix_path(&e.path))
            .unwrap_or_default();
        let bytes = encode_object_message(&entries, timestamp);
        self.transport
            .publish(&self.topics.data(interface, &base_path), bytes, 2, false)
            .await?;
        Ok(())
    }

    pub async fn set_property(&self, interface: &str, path: &str, value: TypedValue) -> Result<()> {
        if self.state() != ConnectionState::Connected {
            return Err(DeviceError::NotConnected);
        }
        let expected = self.lookup_device_owned_mapping(interface, path)?;
        if value.mapping_type() != expected {
            return Err(DeviceError::MappingTypeMismatch {
                expected: expected.to_string(),
                found: value.mapping_type().to_string(),
            });
        }
        let bytes = encode_message(&value, None);
        self.transport
            .publish(&self.topics.data(interface, path), bytes.clone(), 2, true)
            .await?;
        let json = serde_json::to_string(&format!("{value:?}"))?;
        self.storage.put_property(&format!("{interface}{path}"), &json)?;
        Ok(())
    }

    pub async fn unset_property(&self, interface: &str, path: &str) -> Result<()> {
        if self.state() != ConnectionState::Connected {
            return Err(DeviceError::NotConnected);
        }
        self.lookup_device_owned_mapping(interface, path)?;
        self.transport
            .publish(&self.topics.data(interface, path), Vec::new(), 2, true)
            .await?;
        self.storage.remove_property(&format!("{interface}{path}"))?;
        Ok(())
    }

    /// Delay the caller should wait before the next `connect()` retry.
    pub fn next_backoff(&self) -> std::time::Duration {
        self.backoff.lock().next_delay()
    }
}

/// A grouped object publish shares one topic: the path up to (but not
/// including) the final segment that differs per entry.
fn common_prefix_path(first_entry_path: &str) -> String {
    match first_entry_path.rsplit_once('/') {
        Some((prefix, _last)) if !prefix.is_empty() => prefix.to_string(),
        _ => String::new(),
    }
}
