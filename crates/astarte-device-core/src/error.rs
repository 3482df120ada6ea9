//! Error taxonomy shared by every in-scope component (C1-C4).
//!
//! Each crate in this workspace keeps its own `Error` enum rather than a
//! single error type threaded across crate boundaries; this is the core
//! one, consumed by `astarte-device` and `astarte-e2e` through `#[from]`.

use thiserror::Error;

/// Result type alias using our Error
pub type Result<T> = std::result::Result<T, Error>;

/// Core error kinds (identifiers, codec, typed-value model, introspection).
#[derive(Debug, Error)]
pub enum Error {
    /// Caller contract broken: bad path, unknown interface, MT mismatch, bad QoS.
    #[error("invalid parameter: {0}")]
    InvalidParam(String),

    /// Wire element type does not satisfy the schema for the mapping being read.
    #[error("codec type mismatch: expected {expected}, found {found}")]
    CodecTypeMismatch { expected: String, found: String },

    /// Truncated or structurally invalid document.
    #[error("malformed document: {0}")]
    CodecMalformed(String),

    /// Allocation failure; callers must release any partial state.
    #[error("out of memory")]
    OutOfMemory,

    /// Reached a branch the design claims unreachable.
    #[error("internal error: {0}")]
    Internal(String),

    /// Interface JSON file could not be read or parsed.
    #[error("interface file error: {0}")]
    InterfaceFile(String),
}

impl Error {
    pub fn invalid_param(msg: impl Into<String>) -> Self {
        Error::InvalidParam(msg.into())
    }
}
