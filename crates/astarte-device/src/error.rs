//! Error taxonomy for the connection state machine and device facade.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DeviceError {
    #[error(transparent)]
    Core(#[from] astarte_device_core::Error),
    #[error(transparent)]
    Net(#[from] astarte_device_net::NetError),
    #[error(transparent)]
    Storage(#[from] crate::storage::StorageError),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("unknown interface: {0}")]
    UnknownInterface(String),
    #[error("unknown mapping for {0}{1}")]
    UnknownMapping(String, String),
    #[error("mapping type mismatch: interface expects {expected}, value is {found}")]
    MappingTypeMismatch { expected: String, found: String },
    #[error("device is not connected")]
    NotConnected,
    #[error("device is already connected")]
    AlreadyConnected,
    #[error("object aggregation interface {0} requires send_object, not send_individual")]
    WrongAggregation(String),
}

pub type Result<T> = std::result::Result<T, DeviceError>;
