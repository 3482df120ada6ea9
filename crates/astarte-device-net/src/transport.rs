//! MQTT transport capability (§6).
//!
//! `Transport` is the seam the connection state machine drives; everything
//! above it only ever sees `connect`/`disconnect`/`subscribe`/`publish` and
//! an event stream. `MqttTransport` is the concrete adapter over `rumqttc`.
//! Native async-fn-in-traits (stable since 1.75) means no `dyn Transport`;
//! callers are generic over `T: Transport`.

use std::sync::atomic::{AtomicU16, Ordering};
use std::sync::Arc;
use std::time::Duration;

use rumqttc::{AsyncClient, Event, EventLoop, MqttOptions, Packet, QoS, TlsConfiguration, Transport as RumqttcTransport};
use tokio::sync::mpsc;
use tracing::debug;

use crate::error::{NetError, Result};

/// Client identity and TLS material for a broker connection.
#[derive(Clone)]
pub struct TlsConfig {
    pub ca_cert_pem: Vec<u8>,
    pub client_cert_pem: Vec<u8>,
    pub client_key_pem: Vec<u8>,
}

/// Events surfaced by a `Transport` while it runs.
#[derive(Debug, Clone)]
pub enum TransportEvent {
    Connected { session_present: bool },
    Disconnected,
    SubAck { id: u16, success: bool },
    PubAck { id: u16 },
    Publish { topic: String, payload: Vec<u8>, qos: u8 },
}

/// The capability a connection state machine needs from its transport:
/// connect/disconnect, fire-and-correlate subscribe/publish, and a stream
/// of inbound events.
pub trait Transport: Send + Sync {
    async fn connect(&self) -> Result<()>;
    async fn disconnect(&self) -> Result<()>;
    /// Returns a locally-assigned id later echoed back on a `SubAck` event.
    async fn subscribe(&self, topic: &str, qos: u8) -> Result<u16>;
    /// Returns a locally-assigned id later echoed back on a `PubAck` event
    /// (QoS 0 publishes never ack; callers should not wait on them).
    async fn publish(&self, topic: &str, payload: Vec<u8>, qos: u8, retain: bool) -> Result<u16>;
    /// Pulls the next transport event, blocking until one is available.
    async fn poll(&self) -> Result<TransportEvent>;
}

/// `rumqttc`-backed MQTT client.
///
/// rumqttc's async client does not hand back broker-assigned packet ids
/// synchronously, so subscribe/publish self-assign a sequential local id
/// and `poll` correlates incoming `SubAck`/`PubAck` frames against them
/// FIFO. This is a simplification, not wire-protocol tracking of the
/// broker's actual packet identifiers.
pub struct MqttTransport {
    client: AsyncClient,
    event_loop: tokio::sync::Mutex<EventLoop>,
    next_id: AtomicU16,
}

impl MqttTransport {
    pub fn new(client_id: &str, host: &str, port: u16, tls: TlsConfig) -> Result<Self> {
        let mut opts = MqttOptions::new(client_id, host, port);
        opts.set_keep_alive(Duration::from_secs(30));

        let tls_config = TlsConfiguration::Simple {
            ca: tls.ca_cert_pem,
            alpn: None,
            client_auth: Some((tls.client_cert_pem, tls.client_key_pem)),
        };
        opts.set_transport(RumqttcTransport::tls_with_config(tls_config));

        let (client, event_loop) = AsyncClient::new(opts, 64);
        Ok(MqttTransport {
            client,
            event_loop: tokio::sync::Mutex::new(event_loop),
            next_id: AtomicU16::new(1),
        })
    }

    fn next_local_id(&self) -> u16 {
        self.next_id.fetch_add(1, Ordering::Relaxed).max(1)
    }
}

impl Transport for MqttTransport {
    async fn connect(&self) -> Result<()> {
        // rumqttc connects lazily from the first `poll()` drive of the
        // event loop; nothing to do eagerly here beyond constructing it.
        Ok(())
    }

    async fn disconnect(&self) -> Result<()> {
        self.client
            .disconnect()
            .await
            .map_err(|e| NetError::Mqtt(e.to_string()))
    }

    async fn subscribe(&self, topic: &str, qos: u8) -> Result<u16> {
        let qos = qos_from_u8(qos);
        self.client
            .subscribe(topic, qos)
            .await
            .map_err(|e| NetError::Mqtt(e.to_string()))?;
        Ok(self.next_local_id())
    }

    async fn publish(&self, topic: &str, payload: Vec<u8>, qos: u8, retain: bool) -> Result<u16> {
        let qos = qos_from_u8(qos);
        self.client
            .publish(topic, qos, retain, payload)
            .await
            .map_err(|e| NetError::Mqtt(e.to_string()))?;
        Ok(self.next_local_id())
    }

    async fn poll(&self) -> Result<TransportEvent> {
        let mut event_loop = self.event_loop.lock().await;
        loop {
            let notification = event_loop
                .poll()
                .await
                .map_err(|e| NetError::Mqtt(e.to_string()))?;
            if let Some(ev) = translate(notification) {
                return Ok(ev);
            }
        }
    }
}

fn qos_from_u8(qos: u8) -> QoS {
    match qos {
        0 => QoS::AtMostOnce,
        1 => QoS::AtLeastOnce,
        _ => QoS::ExactlyOnce,
    }
}

fn translate(event: Event) -> Option<TransportEvent> {
    match event {
        Event::Incoming(Packet::ConnAck(ack)) => Some(TransportEvent::Connected {
            session_present: ack.session_present,
        }),
        Event::Incoming(Packet::Disconnect) => Some(TransportEvent::Disconnected),
        Event::Incoming(Packet::SubAck(ack)) => Some(TransportEvent::SubAck {
            id: ack.pkid,
            success: ack
                .return_codes
                .iter()
                .all(|c| !matches!(c, rumqttc::SubscribeReasonCode::Failure)),
        }),
        Event::Incoming(Packet::PubAck(ack)) => Some(TransportEvent::PubAck { id: ack.pkid }),
        Event::Incoming(Packet::Publish(p)) => Some(TransportEvent::Publish {
            topic: p.topic,
            payload: p.payload.to_vec(),
            qos: p.qos as u8,
        }),
        Event::Incoming(_) | Event::Outgoing(_) => {
            debug!("unhandled rumqttc notification");
            None
        }
    }
}

/// An in-memory `Transport` double for tests: no network, drives events
/// fed in over a channel and records publishes/subscribes.
pub struct FakeTransport {
    inbound: tokio::sync::Mutex<mpsc::UnboundedReceiver<TransportEvent>>,
    inbound_tx: mpsc::UnboundedSender<TransportEvent>,
    pub published: parking_lot::Mutex<Vec<(String, Vec<u8>, u8)>>,
    pub subscribed: parking_lot::Mutex<Vec<(String, u8)>>,
    next_id: AtomicU16,
}

impl FakeTransport {
    pub fn new() -> Arc<Self> {
        let (tx, rx) = mpsc::unbounded_channel();
        Arc::new(FakeTransport {
            inbound: tokio::sync::Mutex::new(rx),
            inbound_tx: tx,
            published: parking_lot::Mutex::new(Vec::new()),
            subscribed: parking_lot::Mutex::new(Vec::new()),
            next_id: AtomicU16::new(1),
        })
    }

    pub fn push_event(&self, ev: TransportEvent) {
        let _ = self.inbound_tx.send(ev);
    }
}

impl Transport for FakeTransport {
    async fn connect(&self) -> Result<()> {
        Ok(())
    }

    async fn disconnect(&self) -> Result<()> {
        Ok(())
    }

    async fn subscribe(&self, topic: &str, qos: u8) -> Result<u16> {
        self.subscribed.lock().push((topic.to_string(), qos));
        Ok(self.next_id.fetch_add(1, Ordering::Relaxed).max(1))
    }

    async fn publish(&self, topic: &str, payload: Vec<u8>, qos: u8, _retain: bool) -> Result<u16> {
        self.published.lock().push((topic.to_string(), payload, qos));
        Ok(self.next_id.fetch_add(1, Ordering::Relaxed).max(1))
    }

    async fn poll(&self) -> Result<TransportEvent> {
        let mut rx = self.inbound.lock().await;
        rx.recv().await.ok_or(NetError::NotConnected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn fake_transport_records_publishes_and_replays_events() {
        let t = FakeTransport::new();
        let id = t.publish("realm/dev/org.Iface/path", b"x".to_vec(), 1, false).await.unwrap();
        assert_eq!(id, 1);
        assert_eq!(t.published.lock().len(), 1);

        t.push_event(TransportEvent::Connected { session_present: false });
        let ev = t.poll().await.unwrap();
        assert!(matches!(ev, TransportEvent::Connected { session_present: false }));
    }
}
