//! Astarte Device
//!
//! The connection state machine and device facade: pairing, MQTT
//! handshake, reconnect backoff, and the publish/receive surface an
//! application drives.
//!
//! # Modules
//!
//! - [`state`]: `ConnectionState` and the full-jitter reconnect backoff
//! - [`device`]: `Device` facade and `DeviceEventHandler`
//! - [`storage`]: persisted introspection and property cache
//! - [`config`]: CLI/env configuration
//! - [`error`]: shared error taxonomy

pub mod config;
pub mod device;
pub mod error;
pub mod state;
pub mod storage;

pub use config::Config;
pub use device::{Device, DeviceEventHandler, NullEventHandler};
pub use error::{DeviceError, Result};
pub use state::{Backoff, ConnectionState};
pub use storage::Storage;
