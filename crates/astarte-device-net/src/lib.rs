//! Astarte Device Net
//!
//! Capability traits for the outer edges of a device connection: the MQTT
//! transport, the pairing API client, and the credential store, plus the
//! topic layout shared by the two.
//!
//! # Modules
//!
//! - [`transport`]: `Transport` trait and the `rumqttc`-backed adapter
//! - [`pairing`]: `PairingClient` trait for certificate (re-)issuance
//! - [`credentials`]: `CredentialStore` trait for the device's key/cert
//! - [`topic`]: MQTT topic layout builders and parsers
//! - [`error`]: shared error taxonomy

pub mod credentials;
pub mod error;
pub mod pairing;
pub mod topic;
pub mod transport;

pub use credentials::{CredentialStore, MemoryCredentialStore, SledCredentialStore};
pub use error::{NetError, Result};
pub use pairing::{PairingClient, PairingResponse, ScriptedPairingClient};
pub use topic::{DataTopic, ParsedTopic, TopicBuilder};
pub use transport::{FakeTransport, MqttTransport, TlsConfig, Transport, TransportEvent};
