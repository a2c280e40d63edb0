//! Presence types for the Update Presence payload
//!
//! Sent either inside the identify payload or on its own with opcode 3.

use serde::{Deserialize, Serialize};
use serde_repr::{Deserialize_repr, Serialize_repr};

/// The payload used for updating the client's presence via the gateway.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PresenceUpdate {
    /// Unix time in milliseconds since the client went idle, or `null`
    /// if it is not idle. The key is always sent.
    pub since: Option<u64>,

    /// The client's activities, if any.
    pub activities: Vec<Activity>,

    /// The client's new status.
    pub status: Status,

    /// Whether the client is AFK.
    pub afk: bool,
}

impl PresenceUpdate {
    /// An online presence with a single playing activity.
    pub fn playing(name: impl Into<String>) -> Self {
        Self {
            since: None,
            activities: vec![Activity {
                name: name.into(),
                kind: ActivityType::Playing,
                url: None,
                state: None,
            }],
            status: Status::Online,
            afk: false,
        }
    }
}

/// A user activity.
///
/// Bots may only set the name, state, type, and url fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Activity {
    /// The activity's name.
    pub name: String,

    /// The activity type.
    #[serde(rename = "type")]
    pub kind: ActivityType,

    /// Stream URL, validated only when the type is streaming.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    /// The user's current party status, or the text of a custom status.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
}

/// The type of an activity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize_repr, Deserialize_repr)]
#[repr(u8)]
pub enum ActivityType {
    Playing = 0,
    Streaming = 1,
    Listening = 2,
    Watching = 3,
    Custom = 4,
    Competing = 5,
}

/// The status of a user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Online,
    Dnd,
    Idle,
    Invisible,
    Offline,
}
