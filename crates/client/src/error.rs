//! Error taxonomy for the gateway client

use discord_gateway_protocol::close::{self, CloseAction};
use discord_gateway_protocol::{Intents, ProtocolError};
use thiserror::Error;
use tokio_tungstenite::tungstenite;

/// Recoverable interruptions requested by the gateway during normal
/// operation.
///
/// When automatic reconnection is enabled these are absorbed by the
/// reconnect controller; with `with_auto_reconnect(false)` they surface
/// from [`Client::run`](crate::Client::run) as
/// [`ClientError::Interrupt`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum GatewayInterrupt {
    /// The gateway asked us to reconnect (opcode 7).
    #[error("the gateway requested a reconnect")]
    Reconnect,

    /// The gateway invalidated our session (opcode 9).
    #[error("the gateway invalidated the session (resumable: {resumable})")]
    SessionInvalidated {
        /// Whether the session can still be resumed.
        resumable: bool,
    },

    /// No heartbeat acknowledgement arrived within one interval.
    #[error("no heartbeat acknowledgement was received within one interval")]
    HeartbeatLost,
}

/// Errors surfaced by the gateway client.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Close code 4004. The token was rejected.
    #[error("authentication failed ({code} {reason}); is the token correct?")]
    AuthenticationFailed { code: u16, reason: String },

    /// Close codes 4013 and 4014. The requested intents are invalid or
    /// not enabled in the developer portal.
    #[error("the gateway rejected the requested intents ({code} {reason}); privileged bits requested: {requested:?}")]
    PrivilegedIntents {
        /// The privileged subset of the intents that were requested.
        requested: Intents,
        code: u16,
        reason: String,
    },

    /// The connection closed outside the cases above; the reconnect
    /// controller decides whether to retry based on the code.
    #[error("connection closed ({code:?}): {reason}")]
    ConnectionClosed { code: Option<u16>, reason: String },

    /// A recoverable gateway interruption, surfaced only when automatic
    /// reconnection is disabled.
    #[error(transparent)]
    Interrupt(#[from] GatewayInterrupt),

    /// The server violated the gateway protocol; the connection is torn
    /// down and reopened.
    #[error("gateway protocol violation: {0}")]
    Protocol(#[from] ProtocolError),

    /// WebSocket-level failure.
    #[error("websocket transport error: {0}")]
    Transport(#[from] tungstenite::Error),

    /// The gateway-URL fetch failed.
    #[error("gateway url request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// An internal task failed in a way that should never happen.
    #[error("internal task failure: {0}")]
    Task(String),

    /// The reader and the heartbeat task failed at the same time.
    #[error("connection failed with multiple errors: {}", format_errors(.0))]
    Multiple(Vec<ClientError>),
}

fn format_errors(errors: &[ClientError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// What the reconnect controller does with a terminal connection error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Retry {
    /// Back off, then reconnect resuming the session where possible.
    Resume,
    /// Clear the session, wait briefly, reconnect with a fresh identify.
    Fresh,
    /// Surface the error and stop.
    Fatal,
}

impl ClientError {
    pub(crate) fn retry_action(&self) -> Retry {
        match self {
            Self::AuthenticationFailed { .. }
            | Self::PrivilegedIntents { .. }
            | Self::Http(_)
            | Self::Task(_) => Retry::Fatal,
            Self::ConnectionClosed { code: Some(code), .. } => match close::classify(*code) {
                CloseAction::Fatal => Retry::Fatal,
                CloseAction::Invalidate => Retry::Fresh,
                CloseAction::Transient => Retry::Resume,
            },
            Self::ConnectionClosed { code: None, .. }
            | Self::Transport(_)
            | Self::Protocol(_) => Retry::Resume,
            Self::Interrupt(GatewayInterrupt::Reconnect | GatewayInterrupt::HeartbeatLost) => {
                Retry::Resume
            }
            Self::Interrupt(GatewayInterrupt::SessionInvalidated { resumable }) => {
                if *resumable {
                    Retry::Resume
                } else {
                    Retry::Fresh
                }
            }
            Self::Multiple(errors) => {
                errors
                    .iter()
                    .map(Self::retry_action)
                    .fold(Retry::Resume, |acc, action| match (acc, action) {
                        (Retry::Fatal, _) | (_, Retry::Fatal) => Retry::Fatal,
                        (Retry::Fresh, _) | (_, Retry::Fresh) => Retry::Fresh,
                        _ => Retry::Resume,
                    })
            }
        }
    }

    /// True when the error is one of the recoverable gateway interrupts.
    pub fn is_interrupt(&self) -> bool {
        matches!(self, Self::Interrupt(_))
    }
}

impl From<serde_json::Error> for ClientError {
    fn from(e: serde_json::Error) -> Self {
        Self::Protocol(ProtocolError::from(e))
    }
}
