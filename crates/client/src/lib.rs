//! # Discord Gateway client
//!
//! Connection lifecycle for the Discord Gateway: hello/identify
//! handshake, concurrent heartbeating, session resumption, and
//! reconnection with exponential backoff.
//!
//! ## Example
//!
//! ```no_run
//! use discord_gateway_client::Client;
//! use discord_gateway_protocol::Intents;
//!
//! #[tokio::main]
//! async fn main() {
//!     let mut client = Client::new("Bot my-token", Intents::standard());
//!     client.on_dispatch(|event| async move {
//!         println!("{} (seq {})", event.name, event.seq);
//!         Ok(())
//!     });
//!     client.run().await.unwrap();
//! }
//! ```

mod backoff;
mod connection;
mod dispatch;
mod error;
mod heartbeat;
mod http;
mod session;
mod shutdown;
mod transport;

pub use backoff::ReconnectConfig;
pub use dispatch::{DispatchError, DispatchFuture};
pub use error::{ClientError, GatewayInterrupt};
pub use shutdown::ShutdownHandle;

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::time::sleep;
use tokio_tungstenite::tungstenite::Message;
use tracing::{info, warn};

use discord_gateway_protocol::messages::ConnectionProperties;
use discord_gateway_protocol::{DispatchEvent, Intents, Payload, PresenceUpdate};

use crate::backoff::Backoff;
use crate::connection::ConnectionContext;
use crate::dispatch::DispatchHandler;
use crate::error::Retry;
use crate::heartbeat::Heart;
use crate::session::SharedSession;

/// The websocket client for connecting to the Discord Gateway.
///
/// Configuration is immutable once [`run`](Client::run) is called; the
/// cloneable [`ClientHandle`] covers everything that can change on a live
/// connection (presence and shutdown).
pub struct Client {
    token: String,
    intents: Intents,
    gateway_url: Option<String>,
    zlib_stream: bool,
    large_threshold: u16,
    properties: ConnectionProperties,
    auto_reconnect: bool,
    reconnect_config: ReconnectConfig,
    presence: Arc<Mutex<Option<PresenceUpdate>>>,
    handler: Option<DispatchHandler>,
    session: SharedSession,
    heart: Arc<Heart>,
    shutdown: ShutdownHandle,
    outgoing: Arc<Mutex<Option<mpsc::Sender<Message>>>>,
    progressed: Arc<AtomicBool>,
}

impl Client {
    /// Creates a client for the given token and intents.
    ///
    /// The token must carry its authentication scheme prefix
    /// (e.g. `"Bot <token>"`).
    pub fn new(token: impl Into<String>, intents: Intents) -> Self {
        Self {
            token: token.into(),
            intents,
            gateway_url: None,
            zlib_stream: true,
            large_threshold: 50,
            properties: ConnectionProperties::default(),
            auto_reconnect: true,
            reconnect_config: ReconnectConfig::default(),
            presence: Arc::new(Mutex::new(None)),
            handler: None,
            session: SharedSession::default(),
            heart: Arc::new(Heart::new()),
            shutdown: ShutdownHandle::new(),
            outgoing: Arc::new(Mutex::new(None)),
            progressed: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Overrides the gateway URL, skipping the HTTP fetch.
    #[must_use]
    pub fn with_gateway_url(mut self, url: impl Into<String>) -> Self {
        self.gateway_url = Some(url.into());
        self
    }

    /// Enables or disables zlib transport compression (default: enabled).
    ///
    /// This is distinct from payload compression, which this library does
    /// not implement.
    #[must_use]
    pub fn with_zlib_stream(mut self, enabled: bool) -> Self {
        self.zlib_stream = enabled;
        self
    }

    /// Sets the member count above which offline guild members are not
    /// sent. Clamped to the gateway's accepted range of 50..=250.
    #[must_use]
    pub fn with_large_threshold(mut self, threshold: u16) -> Self {
        self.large_threshold = threshold.clamp(50, 250);
        self
    }

    /// Sets the presence sent with the identify payload.
    #[must_use]
    pub fn with_presence(mut self, presence: PresenceUpdate) -> Self {
        *self.presence.lock() = Some(presence);
        self
    }

    /// Overrides the identification properties.
    #[must_use]
    pub fn with_properties(mut self, properties: ConnectionProperties) -> Self {
        self.properties = properties;
        self
    }

    /// Enables or disables automatic reconnection (default: enabled).
    ///
    /// When disabled, the first terminal outcome of a connection is
    /// surfaced from [`run`](Client::run), including the recoverable
    /// [`GatewayInterrupt`] variants.
    #[must_use]
    pub fn with_auto_reconnect(mut self, enabled: bool) -> Self {
        self.auto_reconnect = enabled;
        self
    }

    /// Overrides the reconnect backoff tuning.
    #[must_use]
    pub fn with_reconnect_config(mut self, config: ReconnectConfig) -> Self {
        self.reconnect_config = config;
        self
    }

    /// Sets the callback invoked for every dispatch event, replacing any
    /// previously registered handler.
    ///
    /// Events are delivered in wire order, one at a time. An error
    /// returned by the handler is logged and discarded; it never
    /// terminates the gateway connection.
    pub fn on_dispatch<F, Fut>(&mut self, mut handler: F)
    where
        F: FnMut(DispatchEvent) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), DispatchError>> + Send + 'static,
    {
        self.handler = Some(Box::new(move |event| Box::pin(handler(event))));
    }

    /// Returns a handle for presence updates and shutdown from other
    /// tasks.
    pub fn handle(&self) -> ClientHandle {
        ClientHandle {
            outgoing: Arc::clone(&self.outgoing),
            presence: Arc::clone(&self.presence),
            shutdown: self.shutdown.clone(),
        }
    }

    /// Returns the shutdown handle on its own.
    pub fn shutdown_handle(&self) -> ShutdownHandle {
        self.shutdown.clone()
    }

    /// Begins and maintains a connection to the gateway.
    ///
    /// Returns `Ok(())` after a shutdown requested through the handle.
    /// With automatic reconnection enabled (the default), transient
    /// failures and gateway-requested reconnects are absorbed here:
    /// the client backs off exponentially, resumes the session where
    /// possible, and re-identifies after an invalidation. Fatal errors
    /// (bad token, rejected intents, invalid shard or API version) are
    /// returned immediately regardless of configuration.
    pub async fn run(&mut self) -> Result<(), ClientError> {
        let gateway_url = match self.gateway_url.clone() {
            Some(url) => url,
            None => {
                let url = http::fetch_gateway_url(&self.token).await?;
                self.gateway_url = Some(url.clone());
                url
            }
        };

        let mut backoff = Backoff::new(self.reconnect_config.clone());
        let mut first = true;
        while first || self.auto_reconnect {
            first = false;
            if self.shutdown.is_shutdown() {
                break;
            }

            let resume_url = self.session.resume_target();
            let resuming = resume_url.is_some();
            if !resuming {
                self.session.reset_for_fresh();
            }
            let url = resume_url.unwrap_or_else(|| gateway_url.clone());
            info!(resuming, "connecting to the gateway");

            let outcome = connection::run(
                ConnectionContext {
                    token: &self.token,
                    intents: self.intents,
                    zlib_stream: self.zlib_stream,
                    large_threshold: self.large_threshold,
                    properties: &self.properties,
                    presence: &self.presence,
                    session: &self.session,
                    heart: &self.heart,
                    handler: &mut self.handler,
                    outgoing: &self.outgoing,
                    shutdown: &self.shutdown,
                    progressed: &self.progressed,
                    resuming,
                },
                &url,
            )
            .await;

            // Any READY or RESUMED on the connection means the backoff
            // schedule starts over.
            if self.progressed.swap(false, Ordering::SeqCst) {
                backoff.reset();
            }

            let err = match outcome {
                Ok(()) => return Ok(()),
                Err(err) => err,
            };

            match err.retry_action() {
                Retry::Fatal => return Err(err),
                _ if !self.auto_reconnect => return Err(err),
                Retry::Resume => {
                    let delay = backoff.next_delay();
                    info!(
                        error = %err,
                        delay_ms = delay.as_millis() as u64,
                        "reconnecting after transient failure"
                    );
                    sleep(delay).await;
                }
                Retry::Fresh => {
                    self.session.invalidate();
                    let delay = backoff.invalid_session_delay();
                    info!(
                        error = %err,
                        delay_ms = delay.as_millis() as u64,
                        "re-identifying after session invalidation"
                    );
                    sleep(delay).await;
                }
            }
        }
        Ok(())
    }
}

/// Handle for interacting with a running [`Client`] from other tasks.
#[derive(Clone)]
pub struct ClientHandle {
    outgoing: Arc<Mutex<Option<mpsc::Sender<Message>>>>,
    presence: Arc<Mutex<Option<PresenceUpdate>>>,
    shutdown: ShutdownHandle,
}

impl ClientHandle {
    /// Updates the bot's presence on the current connection, if any.
    ///
    /// When `persistent` is true the presence is also remembered and sent
    /// with future identify payloads.
    pub async fn set_presence(
        &self,
        presence: PresenceUpdate,
        persistent: bool,
    ) -> Result<(), ClientError> {
        if persistent {
            *self.presence.lock() = Some(presence.clone());
        }
        let sender = self.outgoing.lock().clone();
        if let Some(sender) = sender {
            let payload = Payload::presence_update(&presence)?.to_json()?;
            if sender.send(Message::Text(payload)).await.is_err() {
                warn!("presence update dropped; the connection is closing");
            }
        }
        Ok(())
    }

    /// Gracefully closes the connection and stops the reconnect loop.
    pub fn shutdown(&self) {
        self.shutdown.shutdown();
    }
}
