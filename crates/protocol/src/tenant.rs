//! Tenant identifiers and their validation rules.

use std::fmt;

use serde::Serialize;

/// Maximum accepted tenant id length in bytes.
pub const MAX_TENANT_ID_LEN: usize = 64;

/// Opaque key identifying the external identity that owns one automation
/// session.
///
/// Tenant ids double as file-system partition keys (pairing image names,
/// credential folders), so construction goes through [`TenantId::parse`]
/// which restricts them to `[A-Za-z0-9._-]` and rejects empty or oversized
/// input.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct TenantId(String);

impl TenantId {
    /// Validates `raw` and returns it as a tenant id.
    pub fn parse(raw: &str) -> Result<Self, InvalidTenantId> {
        if raw.is_empty() {
            return Err(InvalidTenantId::Empty);
        }
        if raw.len() > MAX_TENANT_ID_LEN {
            return Err(InvalidTenantId::TooLong { len: raw.len() });
        }
        if let Some(ch) = raw
            .chars()
            .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-')))
        {
            return Err(InvalidTenantId::BadChar { ch });
        }
        Ok(Self(raw.to_string()))
    }

    /// Returns the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TenantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for TenantId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Rejection reasons for [`TenantId::parse`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvalidTenantId {
    Empty,
    TooLong { len: usize },
    BadChar { ch: char },
}

impl fmt::Display for InvalidTenantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => write!(f, "tenant id must not be empty"),
            Self::TooLong { len } => write!(
                f,
                "tenant id is {len} bytes, maximum is {MAX_TENANT_ID_LEN}"
            ),
            Self::BadChar { ch } => write!(
                f,
                "tenant id contains {ch:?}, allowed characters are [A-Za-z0-9._-]"
            ),
        }
    }
}

impl std::error::Error for InvalidTenantId {}
