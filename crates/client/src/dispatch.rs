//! Dispatch callback plumbing
//!
//! A single handler receives every dispatch event, in wire order, one at
//! a time. Registering a new handler replaces the previous one.

use std::future::Future;
use std::pin::Pin;

use discord_gateway_protocol::DispatchEvent;

/// Error a dispatch handler may return. Failures are logged and isolated;
/// they never terminate the gateway connection.
pub type DispatchError = Box<dyn std::error::Error + Send + Sync>;

/// Future returned by a dispatch handler.
pub type DispatchFuture = Pin<Box<dyn Future<Output = Result<(), DispatchError>> + Send>>;

pub(crate) type DispatchHandler = Box<dyn FnMut(DispatchEvent) -> DispatchFuture + Send + Sync>;
