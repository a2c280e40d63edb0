//! # discord-gateway
//!
//! A bare-bones client for the Discord Gateway with support for:
//! - The hello/identify handshake and concurrent heartbeating
//! - zlib-stream transport compression
//! - Session resumption and reconnection with exponential backoff
//! - Raw dispatch events forwarded to a single callback
//!
//! ## Components
//!
//! - `discord-gateway-protocol`: wire format, opcodes, and codec
//! - `discord-gateway-client`: connection lifecycle and the [`Client`]
//!
//! ## Example
//!
//! See the `demos/` directory for runnable examples.

pub use discord_gateway_client as client;
pub use discord_gateway_protocol as protocol;

pub use discord_gateway_client::{Client, ClientError, ClientHandle, GatewayInterrupt};
pub use discord_gateway_protocol::{DispatchEvent, Intents};
