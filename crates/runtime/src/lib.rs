//! Driver process lifecycle and transport plumbing.
//!
//! The session hub talks to the remote messaging service through one driver
//! process per tenant. This crate owns that boundary: the
//! [`TransportFactory`]/[`MessagingTransport`] traits, the production
//! [`DriverTransportFactory`] that spawns and supervises driver processes,
//! and the in-memory [`FakeTransportFactory`] used to exercise the session
//! lifecycle in tests without real drivers.

pub mod driver;
pub mod fake;
pub mod transport;

pub use driver::{DriverConfig, DriverTransportFactory};
pub use fake::{FakeTransportController, FakeTransportFactory};
pub use transport::{MessagingTransport, TransportError, TransportFactory, TransportLink};
