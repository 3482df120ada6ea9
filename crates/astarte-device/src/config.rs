//! Configuration for the astarte-device binary and library facade.

use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

/// astarte-device - Astarte device connection daemon
#[derive(Parser, Debug, Clone)]
#[command(name = "astarte-device")]
#[command(about = "Astarte device pairing, connection, and data publish/receive daemon")]
pub struct Config {
    /// Astarte realm name
    #[arg(long, env = "ASTARTE_REALM")]
    pub realm: String,

    /// Device identifier (base64url-encoded 128-bit id)
    #[arg(long, env = "ASTARTE_DEVICE_ID")]
    pub device_id: String,

    /// Pairing API base URL
    #[arg(long, env = "ASTARTE_PAIRING_URL")]
    pub pairing_url: String,

    /// Credentials secret issued at device registration
    #[arg(long, env = "ASTARTE_CREDENTIALS_SECRET")]
    pub credentials_secret: String,

    /// Local directory for persisted introspection and credentials
    #[arg(long, default_value = "./data/astarte-device")]
    pub store_dir: PathBuf,

    /// Directory of interface JSON files declaring this device's introspection
    #[arg(long, default_value = "./interfaces")]
    pub interfaces_dir: PathBuf,

    /// Maximum BSON document size accepted on decode, in bytes
    #[arg(long, default_value = "4194304")]
    pub max_document_bytes: usize,

    /// Minimum reconnect backoff, in milliseconds
    #[arg(long, default_value = "1000")]
    pub backoff_min_ms: u64,

    /// Maximum reconnect backoff, in milliseconds
    #[arg(long, default_value = "300000")]
    pub backoff_max_ms: u64,

    /// Skip TLS certificate verification (testing only)
    #[arg(long)]
    pub insecure_skip_verify: bool,

    /// Log format (json or pretty)
    #[arg(long, default_value = "pretty")]
    pub log_format: String,
}

impl Config {
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.realm.is_empty() {
            anyhow::bail!("realm must not be empty");
        }
        if self.backoff_min_ms == 0 || self.backoff_min_ms > self.backoff_max_ms {
            anyhow::bail!("backoff_min_ms must be > 0 and <= backoff_max_ms");
        }
        if self.max_document_bytes == 0 {
            anyhow::bail!("max_document_bytes must be > 0");
        }
        Ok(())
    }

    pub fn backoff_min(&self) -> Duration {
        Duration::from_millis(self.backoff_min_ms)
    }

    pub fn backoff_max(&self) -> Duration {
        Duration::from_millis(self.backoff_max_ms)
    }
}
