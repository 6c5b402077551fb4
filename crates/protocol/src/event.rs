//! Driver event and command shapes.
//!
//! Drivers speak line-delimited JSON: one [`TransportEvent`] object per
//! stdout line, one [`DriverCommand`] object per stdin line. Events are
//! tagged with `"event"`, commands with `"cmd"`:
//!
//! ```json
//! {"event":"pairing_code","payload":"2@AbC..."}
//! {"event":"ready"}
//! {"cmd":"send_message","chat":"15551234567@c.us","body":"hi"}
//! ```

use serde::{Deserialize, Serialize};

use crate::address::ChatAddress;

/// Events emitted by a driver process over its lifetime, in order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum TransportEvent {
    /// The remote wants this raw payload rendered as a scannable code.
    PairingCode { payload: String },
    /// The connection is approved and usable for sending.
    Ready,
    /// Inbound message from a chat.
    Message { from: ChatAddress, body: String },
    /// Transport-level failure.
    Error { message: String },
}

/// Commands accepted by a driver process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "cmd", rename_all = "snake_case")]
pub enum DriverCommand {
    /// Enqueue an outbound message.
    SendMessage { chat: ChatAddress, body: String },
    /// Close the connection and exit.
    Shutdown,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_round_trip_with_snake_case_tags() {
        let event: TransportEvent =
            serde_json::from_str(r#"{"event":"pairing_code","payload":"2@AbC"}"#).unwrap();
        assert_eq!(
            event,
            TransportEvent::PairingCode {
                payload: "2@AbC".to_string()
            }
        );

        let event: TransportEvent = serde_json::from_str(r#"{"event":"ready"}"#).unwrap();
        assert_eq!(event, TransportEvent::Ready);

        let event: TransportEvent =
            serde_json::from_str(r#"{"event":"message","from":"1555@c.us","body":"!ping"}"#)
                .unwrap();
        let TransportEvent::Message { from, body } = event else {
            panic!("expected message event");
        };
        assert_eq!(from.as_str(), "1555@c.us");
        assert_eq!(body, "!ping");
    }

    #[test]
    fn unknown_event_tags_fail_to_parse() {
        assert!(serde_json::from_str::<TransportEvent>(r#"{"event":"nope"}"#).is_err());
    }

    #[test]
    fn commands_serialize_with_cmd_tag() {
        let command = DriverCommand::SendMessage {
            chat: ChatAddress::from_msisdn("+1555").unwrap(),
            body: "hi".to_string(),
        };
        let line = serde_json::to_string(&command).unwrap();
        assert_eq!(
            line,
            r#"{"cmd":"send_message","chat":"1555@c.us","body":"hi"}"#
        );

        assert_eq!(
            serde_json::to_string(&DriverCommand::Shutdown).unwrap(),
            r#"{"cmd":"shutdown"}"#
        );
    }
}
