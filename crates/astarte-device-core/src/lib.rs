//! Astarte Device Core
//!
//! Identifiers, binary wire codec, interface introspection, and the typed-
//! value model shared by every other crate in this workspace.
//!
//! # Modules
//!
//! - [`identifier`]: 128-bit device/namespace identifiers (v4/v5, string/base64 forms)
//! - [`codec`]: the BSON-subset wire document format, schema-directed
//! - [`interface`]: interface/mapping descriptors and introspection
//! - [`interface_file`]: loading interfaces from Astarte's JSON file shape
//! - [`value`]: the 14-shape typed-value model and object equality
//! - [`error`]: shared error taxonomy

pub mod codec;
pub mod error;
pub mod identifier;
pub mod interface;
pub mod interface_file;
pub mod value;

pub use codec::{
    decode_message, decode_object_message, encode_message, encode_object_message, MAX_DOCUMENT_BYTES,
};
pub use error::{Error, Result};
pub use identifier::Id;
pub use interface::{Aggregation, Interface, InterfaceType, Introspection, Mapping, Ownership, Reliability, Retention};
pub use interface_file::load_interface_file;
pub use value::{objects_equal, MappingType, ObjectEntry, TypedValue};
