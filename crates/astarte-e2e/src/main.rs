//! astarte-e2e - scriptable end-to-end verification harness
//!
//! Connects to the same broker as the device under test, loads its
//! interfaces, then drives an `expect_*`/`send_*` command script from
//! stdin. Exits 0 if every expectation was satisfied, 1 otherwise.

use astarte_e2e::harness::Harness;
use astarte_device_core::{load_interface_file, Introspection};
use astarte_device_net::transport::{MqttTransport, TlsConfig};
use astarte_device_net::Transport;
use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::error;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// astarte-e2e - Astarte device SDK verification harness
#[derive(Parser, Debug)]
#[command(name = "astarte-e2e")]
pub struct Cli {
    /// Realm the device under test is paired into
    #[arg(long, env = "ASTARTE_E2E_REALM")]
    realm: String,

    /// Device id of the device under test (base64url)
    #[arg(long, env = "ASTARTE_E2E_DEVICE_ID")]
    device_id: String,

    /// Broker hostname
    #[arg(long, default_value = "localhost")]
    broker_host: String,

    /// Broker port
    #[arg(long, default_value = "8883")]
    broker_port: u16,

    /// One or more interface JSON files describing the device under test
    #[arg(long = "interface", required = true)]
    interfaces: Vec<PathBuf>,
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env().add_directive("astarte_e2e=info".parse().unwrap()))
        .init();

    let cli = Cli::parse();

    let mut introspection = Introspection::init();
    for path in &cli.interfaces {
        match load_interface_file(path) {
            Ok(iface) => introspection.add(iface),
            Err(e) => {
                error!("failed to load interface {}: {e}", path.display());
                return ExitCode::FAILURE;
            }
        }
    }

    let transport = match MqttTransport::new(
        &format!("{}-e2e", cli.device_id),
        &cli.broker_host,
        cli.broker_port,
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

    if let Err(e) = transport.connect().await {
        error!("failed to connect: {e}");
        return ExitCode::FAILURE;
    }

    let harness = Harness::new(transport, &cli.realm, &cli.device_id, introspection);
    if harness.run().await {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}
