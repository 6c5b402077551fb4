//! HTTP surface for the message-bridge session hub.
//!
//! A thin axum layer over `mb`: request validation, error-to-status
//! mapping, and static serving of pairing images. All session semantics
//! live in the core crate.

pub mod cli;
pub mod routes;
pub mod state;
