//! Close-code classification
//!
//! The gateway communicates most terminal conditions through WebSocket
//! close codes. They divide into three groups: transient closures that may
//! be retried (resuming the session where possible), closures that destroy
//! the session and require a fresh identify, and fatal closures that must
//! be surfaced to the caller without any retry.

/// Close code sent for an intentional shutdown, and when acknowledging a
/// non-resumable session invalidation.
pub const CLOSE_NORMAL: u16 = 1000;

/// Close code sent whenever the client intends to resume the session.
/// Any non-1000/1001 code preserves resumability on the server side.
pub const CLOSE_RESUME: u16 = 4000;

/// What the reconnect controller should do after a given close code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseAction {
    /// Reconnect, resuming the session if one is held.
    Transient,
    /// The session is gone; reconnect with a fresh identify.
    Invalidate,
    /// Surface the error and stop.
    Fatal,
}

/// Classifies a close code received from the gateway.
///
/// Codes this library does not know are treated as transient.
pub fn classify(code: u16) -> CloseAction {
    match code {
        4004 | 4010 | 4011 | 4012 | 4013 | 4014 => CloseAction::Fatal,
        4007 | 4008 | 4009 => CloseAction::Invalidate,
        _ => CloseAction::Transient,
    }
}

/// Returns the documented name for a gateway close code, if known.
pub fn describe(code: u16) -> Option<&'static str> {
    match code {
        4000 => Some("Unknown Error"),
        4001 => Some("Unknown Opcode"),
        4002 => Some("Decode Error"),
        4003 => Some("Not Authenticated"),
        4004 => Some("Authentication Failed"),
        4005 => Some("Already Authenticated"),
        4007 => Some("Invalid Sequence"),
        4008 => Some("Rate Limited"),
        4009 => Some("Session Timed Out"),
        4010 => Some("Invalid Shard"),
        4011 => Some("Sharding Required"),
        4012 => Some("Invalid API Version"),
        4013 => Some("Invalid Intents"),
        4014 => Some("Disallowed Intents"),
        _ => None,
    }
}
