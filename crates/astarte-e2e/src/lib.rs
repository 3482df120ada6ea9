//! Astarte E2E
//!
//! A scriptable verification harness: reads `expect_*`/`send_*` commands
//! from stdin, drives a transport connected to the device under test, and
//! exits non-zero if anything the device sent didn't match what was
//! declared.
//!
//! # Modules
//!
//! - [`spsc`]: the two-slot queue handing stdin commands to the async loop
//! - [`command`]: the line grammar and its JSON value decoding
//! - [`matcher`]: FIFO expectation matching against observed device data
//! - [`harness`]: wires the above around a `Transport`
//! - [`error`]: shared error taxonomy

pub mod command;
pub mod error;
pub mod harness;
pub mod matcher;
pub mod spsc;

pub use astarte_device_core::load_interface_file;
pub use command::{parse_line, Command, CommandError};
pub use error::{E2eError, Result};
pub use harness::Harness;
pub use matcher::{Expectation, Matcher, Observed};
pub use spsc::SpscQueue;
