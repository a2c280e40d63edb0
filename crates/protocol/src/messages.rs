//! Typed bodies for the gateway's control payloads
//!
//! - `Identify`: initial authentication for a new session (opcode 2)
//! - `Resume`: continuation of an existing session (opcode 6)
//! - `Hello`: the heartbeat interval sent on every new connection (opcode 10)
//! - `Ready`: the subset of the READY dispatch needed for resumption

use serde::{Deserialize, Serialize};

use crate::presence::PresenceUpdate;

/// Identification properties describing the connecting client.
///
/// The strings are implementation-chosen; no personal data is involved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionProperties {
    /// Operating system name.
    pub os: String,

    /// Library name reported as the browser.
    pub browser: String,

    /// Library name reported as the device.
    pub device: String,
}

impl Default for ConnectionProperties {
    fn default() -> Self {
        Self {
            os: std::env::consts::OS.to_string(),
            browser: "discord-gateway".to_string(),
            device: "discord-gateway".to_string(),
        }
    }
}

/// The identify payload body establishing a new session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Identify {
    /// The token, including its authentication scheme prefix.
    pub token: String,

    /// Client identification properties.
    pub properties: ConnectionProperties,

    /// Bitmask of the event categories to receive.
    pub intents: u64,

    /// Member count above which offline guild members are not sent.
    /// Must be within 50..=250.
    pub large_threshold: u16,

    /// Initial presence for the session, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub presence: Option<PresenceUpdate>,

    /// Payload-layer compression. Transport compression is independent
    /// and negotiated through the connection query string instead.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub compress: Option<bool>,
}

/// The resume payload body continuing an existing session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resume {
    /// The token, including its authentication scheme prefix.
    pub token: String,

    /// The session to resume, as provided by READY.
    pub session_id: String,

    /// The last sequence number observed. Sent even when zero.
    pub seq: u64,
}

/// Data carried by the Hello payload (opcode 10).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hello {
    /// The interval, in milliseconds, at which the client must heartbeat.
    pub heartbeat_interval: u64,
}

/// The fields of the READY dispatch consumed by the client.
///
/// READY carries much more (user, guilds, shard info); unknown fields are
/// ignored since dispatched entities are forwarded raw.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Ready {
    /// The session id to present when resuming.
    pub session_id: String,

    /// The URL to reconnect to when resuming this session.
    pub resume_gateway_url: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identify_serialization() {
        let identify = Identify {
            token: "Bot abc".to_string(),
            properties: ConnectionProperties {
                os: "linux".to_string(),
                browser: "discord-gateway".to_string(),
                device: "discord-gateway".to_string(),
            },
            intents: 513,
            large_threshold: 50,
            presence: None,
            compress: None,
        };

        let json = serde_json::to_value(&identify).unwrap();
        assert_eq!(json["token"], "Bot abc");
        assert_eq!(json["intents"], 513);
        assert_eq!(json["large_threshold"], 50);
        assert_eq!(json["properties"]["os"], "linux");
        assert!(json.get("presence").is_none());
        assert!(json.get("compress").is_none());
    }

    #[test]
    fn test_resume_sends_zero_sequence() {
        let resume = Resume {
            token: "Bot abc".to_string(),
            session_id: "deadbeef".to_string(),
            seq: 0,
        };

        let json = serde_json::to_value(&resume).unwrap();
        assert_eq!(json["seq"], 0);
        assert_eq!(json["session_id"], "deadbeef");
    }

    #[test]
    fn test_hello_deserialization() {
        let hello: Hello =
            serde_json::from_str(r#"{"heartbeat_interval":41250}"#).unwrap();
        assert_eq!(hello.heartbeat_interval, 41250);
    }

    #[test]
    fn test_ready_ignores_unknown_fields() {
        let ready: Ready = serde_json::from_str(
            r#"{
                "v": 10,
                "session_id": "abc",
                "resume_gateway_url": "wss://resume.example",
                "user": {"id": "1"},
                "guilds": []
            }"#,
        )
        .unwrap();
        assert_eq!(ready.session_id, "abc");
        assert_eq!(ready.resume_gateway_url, "wss://resume.example");
    }

    #[test]
    fn test_default_properties_use_host_os() {
        let properties = ConnectionProperties::default();
        assert_eq!(properties.os, std::env::consts::OS);
        assert_eq!(properties.browser, properties.device);
    }
}
