//! Error taxonomy for the transport, pairing, and credential-store capability traits.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum NetError {
    #[error("not connected")]
    NotConnected,
    #[error("already connected")]
    AlreadyConnected,
    #[error("mqtt client error: {0}")]
    Mqtt(String),
    #[error("pairing request failed: {0}")]
    Pairing(String),
    #[error("credential store error: {0}")]
    CredentialStore(String),
    #[error("tls configuration error: {0}")]
    Tls(String),
    #[error(transparent)]
    Core(#[from] astarte_device_core::Error),
}

pub type Result<T> = std::result::Result<T, NetError>;
