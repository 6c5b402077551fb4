//! Wire types for the message-bridge driver protocol.
//!
//! This crate contains the serde-serializable types exchanged with driver
//! processes plus the identifiers threaded through the whole stack. These
//! types represent the "protocol layer" - the shapes of data as they appear
//! on the wire and at the API boundary.
//!
//! # Design Philosophy
//!
//! Types in this crate are:
//! * Pure data: No behavior beyond (de)serialization and validation
//! * 1:1 with protocol: Match the driver's line-delimited JSON schema
//! * Stable: Changes only when the wire protocol changes
//!
//! Higher-level session orchestration is built on top of these types in
//! `mb-rs`.

pub mod address;
pub mod event;
pub mod tenant;

pub use address::*;
pub use event::*;
pub use tenant::*;
