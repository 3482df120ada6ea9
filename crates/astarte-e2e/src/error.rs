//! Error taxonomy for the verification harness binary.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum E2eError {
    #[error(transparent)]
    Core(#[from] astarte_device_core::Error),
    #[error(transparent)]
    Net(#[from] astarte_device_net::NetError),
    #[error(transparent)]
    Command(#[from] crate::command::CommandError),
}

pub type Result<T> = std::result::Result<T, E2eError>;
