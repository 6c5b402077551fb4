//! Chat address derivation from caller-supplied phone numbers.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Suffix the remote messaging service expects on individual chat ids.
pub const CHAT_SUFFIX: &str = "@c.us";

/// Destination address of a chat on the remote messaging service.
///
/// Outbound addresses are derived from an MSISDN via
/// [`ChatAddress::from_msisdn`]; inbound events carry already-formed
/// addresses and deserialize verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChatAddress(String);

impl ChatAddress {
    /// Converts a phone number into a chat address: one leading `+` is
    /// stripped, the remainder must be digits, and the chat suffix is
    /// appended. Input that already carries the suffix is accepted as-is.
    pub fn from_msisdn(number: &str) -> Result<Self, InvalidAddress> {
        let trimmed = number.trim();
        if let Some(digits) = trimmed.strip_suffix(CHAT_SUFFIX) {
            require_digits(digits)?;
            return Ok(Self(trimmed.to_string()));
        }
        let digits = trimmed.strip_prefix('+').unwrap_or(trimmed);
        require_digits(digits)?;
        Ok(Self(format!("{digits}{CHAT_SUFFIX}")))
    }

    /// Returns the address as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

fn require_digits(digits: &str) -> Result<(), InvalidAddress> {
    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
        return Err(InvalidAddress {
            input: digits.to_string(),
        });
    }
    Ok(())
}

impl fmt::Display for ChatAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Rejection for [`ChatAddress::from_msisdn`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidAddress {
    input: String,
}

impl fmt::Display for InvalidAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "destination number {:?} is not a phone number",
            self.input
        )
    }
}

impl std::error::Error for InvalidAddress {}
