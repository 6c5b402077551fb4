//! Multi-tenant messaging-automation session hub.
//!
//! One long-lived automated connection per tenant: pair it via a scannable
//! one-time code, observe readiness, relay outbound messages, tear down and
//! re-pair on demand. The [`SessionLifecycleController`] is the only
//! component that mutates the [`SessionRegistry`]; each [`TenantSession`]
//! owns its transport exclusively and publishes its state through a watch
//! channel that waiters subscribe to.

pub mod controller;
pub mod dispatch;
pub mod error;
pub mod pairing;
pub mod registry;
pub mod session;

pub use controller::{AuthOutcome, SessionLifecycleController};
pub use dispatch::MessageDispatcher;
pub use error::{Error, Result};
pub use pairing::{PairingArtifact, PairingArtifactProducer};
pub use registry::{SessionRegistry, TenantEntry};
pub use session::{SessionState, TenantSession};
