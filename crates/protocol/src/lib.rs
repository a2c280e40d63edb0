//! # Discord Gateway protocol
//!
//! Wire-level definitions for the Discord Gateway.
//!
//! This crate provides:
//! - `Payload`: the `{op, d, s, t}` envelope carried by every gateway message
//! - `Opcode`: the gateway opcodes recognized by this library
//! - `PayloadDecoder`: frame-to-payload decoding, plain or zlib-stream
//! - Close-code classification and client-sent close codes
//! - `Intents`: the event-subscription bitmask sent with Identify
//! - Presence types for the Update Presence payload
//!
//! ## Example
//!
//! ```
//! use discord_gateway_protocol::{Payload, Opcode};
//!
//! let payload = Payload::heartbeat(Some(42));
//! let json = payload.to_json().unwrap();
//! assert_eq!(json, r#"{"op":1,"d":42}"#);
//!
//! let received = Payload::from_json(r#"{"op":11}"#).unwrap();
//! assert_eq!(received.op, Opcode::HeartbeatAck);
//! ```

pub mod close;
pub mod codec;
pub mod error;
pub mod intents;
pub mod messages;
pub mod payload;
pub mod presence;

pub use close::{CloseAction, CLOSE_NORMAL, CLOSE_RESUME};
pub use codec::{PayloadDecoder, ZLIB_SUFFIX};
pub use error::{ProtocolError, Result};
pub use intents::Intents;
pub use payload::{DispatchEvent, Opcode, Payload};
pub use presence::{Activity, ActivityType, PresenceUpdate, Status};

/// The gateway API version this library speaks.
pub const API_VERSION: u8 = 10;
