//! astarte-device - Astarte device connection daemon
//!
//! Pairs (or re-pairs) the device, connects to the MQTT broker, and keeps
//! the connection alive across disconnects using full-jitter exponential
//! backoff, logging every inbound server-owned publish it receives.

use astarte_device::config::Config;
use astarte_device::device::{Device, NullEventHandler};
use astarte_device::storage::Storage;
use astarte_device_core::{load_interface_file, Id, Introspection};
use astarte_device_net::credentials::SledCredentialStore;
use astarte_device_net::pairing::{PairingClient, PairingResponse};
use astarte_device_net::transport::{MqttTransport, TlsConfig};
use clap::Parser;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Minimal HTTPS pairing client stub; a full implementation would call
/// the Astarte pairing API with `config.credentials_secret` as bearer auth.
struct NotImplementedPairingClient;

impl PairingClient for NotImplementedPairingClient {
    async fn obtain_credentials(&self, _csr_pem: &str) -> astarte_device_net::Result<PairingResponse> {
        Err(astarte_device_net::NetError::Pairing(
            "pairing API client is not wired up in this binary yet".into(),
        ))
    }

    async fn verify_certificate(&self, _client_crt_pem: &str) -> astarte_device_net::Result<bool> {
        Ok(false)
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env().add_directive("astarte_device=info".parse().unwrap()))
        .init();

    let config = Config::parse();
    if let Err(e) = config.validate() {
        error!("invalid configuration: {e}");
        return ExitCode::FAILURE;
    }

    info!("astarte-device v{} starting", env!("CARGO_PKG_VERSION"));

    let device_id = match Id::parse(&config.device_id) {
        Ok(id) => id,
        Err(e) => {
            error!("invalid device id: {e}");
            return ExitCode::FAILURE;
        }
    };

    let storage = match Storage::open(&config.store_dir) {
        Ok(s) => Arc::new(s),
        Err(e) => {
            error!("failed to open storage: {e}");
            return ExitCode::FAILURE;
        }
    };

    let cred_db = match sled::open(config.store_dir.join("credentials")) {
        Ok(db) => db,
        Err(e) => {
            error!("failed to open credential store: {e}");
            return ExitCode::FAILURE;
        }
    };
    let credentials = match SledCredentialStore::open(&cred_db, "credentials") {
        Ok(c) => Arc::new(c),
        Err(e) => {
            error!("failed to open credential store: {e}");
            return ExitCode::FAILURE;
        }
    };

    let pairing = Arc::new(NotImplementedPairingClient);

    let transport = match MqttTransport::new(
        &device_id.to_base64url(),
        "localhost",
        8883,
        TlsConfig {
            ca_cert_pem: Vec::new(),
            client_cert_pem: Vec::new(),
            client_key_pem: Vec::new(),
        },
    ) {
        Ok(t) => Arc::new(t),
        Err(e) => {
            error!("failed to build transport: {e}");
            return ExitCode::FAILURE;
        }
    };

    let mut introspection = Introspection::init();
    let dir_entries = match std::fs::read_dir(&config.interfaces_dir) {
        Ok(entries) => entries,
        Err(e) => {
            error!("failed to read interfaces directory {}: {e}", config.interfaces_dir.display());
            return ExitCode::FAILURE;
        }
    };
    for entry in dir_entries {
        let Ok(entry) = entry else { continue };
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some("json") {
            continue;
        }
        match load_interface_file(&path) {
            Ok(iface) => introspection.add(iface),
            Err(e) => {
                error!("failed to load interface {}: {e}", path.display());
                return ExitCode::FAILURE;
            }
        }
    }

    let device = Device::new(
        &config,
        device_id,
        introspection,
        transport,
        pairing,
        credentials,
        storage,
        Arc::new(NullEventHandler),
    );

    if let Err(e) = device.connect().await {
        error!("connect failed: {e}");
        return ExitCode::FAILURE;
    }

    loop {
        if let Err(e) = device.poll().await {
            error!("poll error: {e}, backing off before reconnect");
            tokio::time::sleep(device.next_backoff()).await;
            if let Err(e) = device.connect().await {
                error!("reconnect failed: {e}");
            }
        }
    }
}
