//! Gateway payload envelope and opcodes
//!
//! Every message exchanged with the gateway is a JSON object with four
//! fields: `op` (opcode), `d` (event data), `s` (sequence number, dispatch
//! only) and `t` (event name, dispatch only).

use serde::{Deserialize, Serialize};
use serde_json::Value;
use serde_repr::{Deserialize_repr, Serialize_repr};

use crate::error::Result;
use crate::messages::{Identify, Resume};
use crate::presence::PresenceUpdate;

/// Gateway opcodes recognized by this library.
///
/// Opcodes 2, 3 and 6 are client-to-server; the rest are received.
/// Anything the library does not know deserializes to [`Opcode::Unknown`]
/// and is ignored by the connection loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize_repr, Deserialize_repr)]
#[repr(u8)]
pub enum Opcode {
    /// An event, with a name in `t` and a sequence number in `s`.
    Dispatch = 0,
    /// Keepalive; the server may also request one on demand.
    Heartbeat = 1,
    /// Initial authentication for a new session.
    Identify = 2,
    /// Presence change on an established connection.
    PresenceUpdate = 3,
    /// Continuation of an existing session after a reconnect.
    Resume = 6,
    /// The server wants us to close and resume.
    Reconnect = 7,
    /// The session is gone; `d` says whether it can be resumed.
    InvalidSession = 9,
    /// First payload on every connection, carrying the heartbeat interval.
    Hello = 10,
    /// Acknowledges a heartbeat we sent.
    HeartbeatAck = 11,
    /// Any opcode this library does not recognize.
    #[serde(other)]
    Unknown = 255,
}

/// A single gateway payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Payload {
    /// The opcode indicating the payload type.
    pub op: Opcode,

    /// The data for the event. `null` when the opcode carries none.
    #[serde(default)]
    pub d: Value,

    /// Sequence number, present only on dispatch.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub s: Option<u64>,

    /// Event name, present only on dispatch.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub t: Option<String>,
}

impl Payload {
    /// Creates a heartbeat payload carrying the last observed sequence
    /// number, or `null` if no dispatch has been seen yet.
    pub fn heartbeat(sequence: Option<u64>) -> Self {
        Self {
            op: Opcode::Heartbeat,
            d: match sequence {
                Some(seq) => Value::from(seq),
                None => Value::Null,
            },
            s: None,
            t: None,
        }
    }

    /// Creates an identify payload for a fresh session.
    pub fn identify(identify: &Identify) -> Result<Self> {
        Ok(Self {
            op: Opcode::Identify,
            d: serde_json::to_value(identify)?,
            s: None,
            t: None,
        })
    }

    /// Creates a resume payload for continuing an existing session.
    pub fn resume(resume: &Resume) -> Result<Self> {
        Ok(Self {
            op: Opcode::Resume,
            d: serde_json::to_value(resume)?,
            s: None,
            t: None,
        })
    }

    /// Creates an update-presence payload.
    pub fn presence_update(presence: &PresenceUpdate) -> Result<Self> {
        Ok(Self {
            op: Opcode::PresenceUpdate,
            d: serde_json::to_value(presence)?,
            s: None,
            t: None,
        })
    }

    /// Serializes the payload to the JSON text sent on the wire.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Parses a payload from JSON text received on the wire.
    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    /// Converts a dispatch payload into the event record handed to the
    /// user callback. Returns `None` for any other opcode, or when the
    /// payload is missing its event name or sequence number.
    pub fn into_dispatch(self) -> Option<DispatchEvent> {
        if self.op != Opcode::Dispatch {
            return None;
        }
        Some(DispatchEvent {
            name: self.t?,
            seq: self.s?,
            data: self.d,
        })
    }
}

/// A named event dispatched by the gateway (opcode 0).
#[derive(Debug, Clone)]
pub struct DispatchEvent {
    /// The event name, e.g. `READY` or `MESSAGE_CREATE`.
    pub name: String,

    /// The event's sequence number, used for heartbeats and resumption.
    pub seq: u64,

    /// The raw event data. This library does not model dispatched
    /// entities; the JSON is forwarded as-is.
    pub data: Value,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_heartbeat_without_sequence_sends_null() {
        let json = Payload::heartbeat(None).to_json().unwrap();
        assert_eq!(json, r#"{"op":1,"d":null}"#);
    }

    #[test]
    fn test_heartbeat_with_sequence() {
        let json = Payload::heartbeat(Some(251)).to_json().unwrap();
        assert_eq!(json, r#"{"op":1,"d":251}"#);
    }

    #[test]
    fn test_dispatch_round_trip() {
        let payload = Payload::from_json(
            r#"{"op":0,"d":{"content":"hi"},"s":7,"t":"MESSAGE_CREATE"}"#,
        )
        .unwrap();
        assert_eq!(payload.op, Opcode::Dispatch);

        let event = payload.into_dispatch().unwrap();
        assert_eq!(event.name, "MESSAGE_CREATE");
        assert_eq!(event.seq, 7);
        assert_eq!(event.data["content"], "hi");
    }

    #[test]
    fn test_non_dispatch_is_not_an_event() {
        let payload = Payload::from_json(r#"{"op":11}"#).unwrap();
        assert!(payload.into_dispatch().is_none());
    }

    #[test]
    fn test_missing_fields_default() {
        let payload = Payload::from_json(r#"{"op":11}"#).unwrap();
        assert_eq!(payload.op, Opcode::HeartbeatAck);
        assert!(payload.d.is_null());
        assert!(payload.s.is_none());
        assert!(payload.t.is_none());
    }

    #[test]
    fn test_unrecognized_opcode_deserializes() {
        let payload = Payload::from_json(r#"{"op":8,"d":null}"#).unwrap();
        assert_eq!(payload.op, Opcode::Unknown);
    }

    #[test]
    fn test_sequence_and_name_omitted_when_absent() {
        let json = Payload::heartbeat(Some(1)).to_json().unwrap();
        assert!(!json.contains("\"s\""));
        assert!(!json.contains("\"t\""));
    }
}
