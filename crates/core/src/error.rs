//! Error taxonomy for the session hub.

use mb_protocol::{InvalidAddress, InvalidTenantId, TenantId};
use mb_runtime::TransportError;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("no session for tenant {0}")]
    SessionNotFound(TenantId),
    #[error("session for tenant {tenant} is not ready ({state})")]
    NotReady {
        tenant: TenantId,
        state: &'static str,
    },
    #[error("transport initialization failed: {0}")]
    TransportInit(String),
    #[error("session for tenant {0} closed before pairing completed")]
    SessionClosed(TenantId),
    #[error("pairing artifact failed: {0}")]
    Pairing(String),
    #[error(transparent)]
    InvalidTenantId(#[from] InvalidTenantId),
    #[error(transparent)]
    InvalidAddress(#[from] InvalidAddress),
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}
