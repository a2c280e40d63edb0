//! Drives a single gateway connection from open to close
//!
//! One call to [`run`] corresponds to one WebSocket connection: await
//! Hello, start the heartbeat task, identify or resume, then classify
//! inbound opcodes until something terminates the connection. The reader
//! owns the decoder; the heart only writes. The first failure of either
//! task cancels the other, and simultaneous failures are reported
//! together.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, error, info, trace, warn};

use discord_gateway_protocol::close::{self, CloseAction, CLOSE_NORMAL, CLOSE_RESUME};
use discord_gateway_protocol::messages::{ConnectionProperties, Hello, Identify, Ready, Resume};
use discord_gateway_protocol::{Intents, Opcode, Payload, PayloadDecoder, PresenceUpdate, ProtocolError};

use crate::dispatch::DispatchHandler;
use crate::error::{ClientError, GatewayInterrupt, Retry};
use crate::heartbeat::Heart;
use crate::session::SharedSession;
use crate::shutdown::ShutdownHandle;
use crate::transport::{gateway_query_url, Frame, GatewaySocket};

/// Everything one connection needs from the client.
pub(crate) struct ConnectionContext<'a> {
    pub token: &'a str,
    pub intents: Intents,
    pub zlib_stream: bool,
    pub large_threshold: u16,
    pub properties: &'a ConnectionProperties,
    pub presence: &'a Mutex<Option<PresenceUpdate>>,
    pub session: &'a SharedSession,
    pub heart: &'a Arc<Heart>,
    pub handler: &'a mut Option<DispatchHandler>,
    pub outgoing: &'a Mutex<Option<mpsc::Sender<Message>>>,
    pub shutdown: &'a ShutdownHandle,
    /// Set when READY or RESUMED arrives, so the controller can reset
    /// its backoff.
    pub progressed: &'a AtomicBool,
    /// Whether this connection resumes the stored session.
    pub resuming: bool,
}

/// Runs one connection to completion. `Ok(())` means a clean,
/// caller-requested shutdown; every other outcome is an error the
/// reconnect controller classifies.
pub(crate) async fn run(mut ctx: ConnectionContext<'_>, url: &str) -> Result<(), ClientError> {
    let connect_url = gateway_query_url(url, ctx.zlib_stream);
    let mut socket = GatewaySocket::connect(&connect_url).await?;
    let mut decoder = PayloadDecoder::new(ctx.zlib_stream);

    *ctx.outgoing.lock() = Some(socket.sender());
    let result = drive(&mut ctx, &mut socket, &mut decoder).await;
    *ctx.outgoing.lock() = None;
    result
}

enum Exit {
    Shutdown,
    Failed(ClientError),
}

async fn drive(
    ctx: &mut ConnectionContext<'_>,
    socket: &mut GatewaySocket,
    decoder: &mut PayloadDecoder,
) -> Result<(), ClientError> {
    let shutdown = ctx.shutdown;

    let hello = match await_hello(ctx.session, ctx.intents, socket, decoder, shutdown).await? {
        Some(hello) => hello,
        None => {
            socket.close(CLOSE_NORMAL, "going offline").await;
            return Ok(());
        }
    };
    let interval = Duration::from_millis(hello.heartbeat_interval);
    debug!(interval_ms = hello.heartbeat_interval, "received hello");
    ctx.session.set_heartbeat_interval(interval);

    ctx.heart.reset();
    let mut heart_task: JoinHandle<Result<(), ClientError>> = tokio::spawn(
        Arc::clone(ctx.heart).run(socket.sender(), ctx.session.clone()),
    );
    let mut heart_done = false;

    if let Err(e) = authenticate(ctx, socket).await {
        heart_task.abort();
        return Err(e);
    }

    let exit = loop {
        tokio::select! {
            () = shutdown.wait() => break Exit::Shutdown,

            joined = &mut heart_task, if !heart_done => {
                heart_done = true;
                match joined {
                    // The heart stops quietly when the writer goes away;
                    // the reader is about to observe the actual cause.
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => break Exit::Failed(e),
                    Err(e) => break Exit::Failed(ClientError::Task(format!(
                        "heartbeat task failed: {e}"
                    ))),
                }
            }

            frame = socket.next_frame() => {
                let decoded = match frame {
                    Err(e) => break Exit::Failed(e),
                    Ok(Frame::Close { code, reason }) => {
                        break Exit::Failed(close_error(ctx.session, ctx.intents, code, reason))
                    }
                    Ok(Frame::Text(text)) => decoder.decode_text(&text),
                    Ok(Frame::Binary(bytes)) => decoder.decode_binary(&bytes),
                };
                match decoded {
                    Err(e) => break Exit::Failed(e.into()),
                    Ok(None) => {}
                    Ok(Some(payload)) => {
                        if let Err(e) = handle_payload(ctx, payload).await {
                            break Exit::Failed(e);
                        }
                    }
                }
            }
        }
    };

    match exit {
        Exit::Shutdown => {
            info!("shutting down gateway connection");
            if !heart_done {
                heart_task.abort();
            }
            socket.close(CLOSE_NORMAL, "going offline").await;
            Ok(())
        }
        Exit::Failed(err) => {
            // A heart failure may have landed in the same instant as the
            // reader's; report both rather than discarding one.
            let err = if !heart_done && heart_task.is_finished() {
                match heart_task.await {
                    Ok(Err(heart_err)) => ClientError::Multiple(vec![err, heart_err]),
                    _ => err,
                }
            } else {
                if !heart_done {
                    heart_task.abort();
                }
                err
            };
            let (code, reason) = close_params(&err);
            socket.close(code, reason).await;
            Err(err)
        }
    }
}

/// Reads frames until the Hello payload arrives. Returns `None` when
/// shutdown is requested mid-handshake.
async fn await_hello(
    session: &SharedSession,
    intents: Intents,
    socket: &mut GatewaySocket,
    decoder: &mut PayloadDecoder,
    shutdown: &ShutdownHandle,
) -> Result<Option<Hello>, ClientError> {
    loop {
        tokio::select! {
            () = shutdown.wait() => return Ok(None),

            frame = socket.next_frame() => {
                let decoded = match frame? {
                    Frame::Close { code, reason } => {
                        return Err(close_error(session, intents, code, reason))
                    }
                    Frame::Text(text) => decoder.decode_text(&text)?,
                    Frame::Binary(bytes) => decoder.decode_binary(&bytes)?,
                };
                match decoded {
                    None => {}
                    Some(payload) if payload.op == Opcode::Hello => {
                        let hello: Hello = serde_json::from_value(payload.d)?;
                        return Ok(Some(hello));
                    }
                    Some(payload) => {
                        return Err(ProtocolError::MissingHello(payload.op).into())
                    }
                }
            }
        }
    }
}

/// Sends Identify on a fresh connection, Resume otherwise.
async fn authenticate(
    ctx: &ConnectionContext<'_>,
    socket: &GatewaySocket,
) -> Result<(), ClientError> {
    if ctx.resuming {
        let Some((session_id, seq)) = ctx.session.resume_info() else {
            return Err(ClientError::Task(
                "resume requested without a stored session".to_string(),
            ));
        };
        info!(%session_id, seq, "resuming session");
        let resume = Resume {
            token: ctx.token.to_string(),
            session_id,
            seq,
        };
        socket.send_text(Payload::resume(&resume)?.to_json()?).await
    } else {
        debug!("sending identify");
        let identify = Identify {
            token: ctx.token.to_string(),
            properties: ctx.properties.clone(),
            intents: ctx.intents.bits(),
            large_threshold: ctx.large_threshold,
            presence: ctx.presence.lock().clone(),
            compress: None,
        };
        socket
            .send_text(Payload::identify(&identify)?.to_json()?)
            .await
    }
}

/// Classifies one decoded payload. Returns an error for the opcodes that
/// terminate the connection.
async fn handle_payload(
    ctx: &mut ConnectionContext<'_>,
    payload: Payload,
) -> Result<(), ClientError> {
    match payload.op {
        Opcode::Dispatch => {
            if let Some(seq) = payload.s {
                ctx.session.record_sequence(seq);
            }
            match payload.t.as_deref() {
                Some("READY") => {
                    let ready: Ready = serde_json::from_value(payload.d.clone())?;
                    ctx.session.ready(ready.session_id, ready.resume_gateway_url);
                    ctx.progressed.store(true, Ordering::SeqCst);
                    info!("session is ready");
                }
                Some("RESUMED") => {
                    ctx.progressed.store(true, Ordering::SeqCst);
                    info!("session resumed");
                }
                _ => {}
            }

            let Some(event) = payload.into_dispatch() else {
                warn!("dispatch payload is missing its name or sequence");
                return Ok(());
            };
            trace!(name = %event.name, seq = event.seq, "dispatching event");
            if let Some(handler) = ctx.handler.as_mut() {
                if let Err(e) = handler(event).await {
                    error!(error = %e, "dispatch handler failed");
                }
            }
            Ok(())
        }
        Opcode::Heartbeat => {
            debug!("gateway requested an immediate heartbeat");
            ctx.heart.beat_soon();
            Ok(())
        }
        Opcode::HeartbeatAck => {
            ctx.heart.acknowledge();
            Ok(())
        }
        Opcode::Reconnect => {
            debug!("gateway requested a reconnect");
            Err(GatewayInterrupt::Reconnect.into())
        }
        Opcode::InvalidSession => {
            let resumable = serde_json::from_value(payload.d).unwrap_or(false);
            warn!(resumable, "gateway invalidated the session");
            if !resumable {
                ctx.session.invalidate();
            }
            Err(GatewayInterrupt::SessionInvalidated { resumable }.into())
        }
        Opcode::Hello => {
            debug!("ignoring hello on an established connection");
            Ok(())
        }
        other => {
            trace!(op = ?other, "ignoring unhandled opcode");
            Ok(())
        }
    }
}

/// Builds the error for a close frame received from the gateway.
fn close_error(
    session: &SharedSession,
    intents: Intents,
    code: Option<u16>,
    reason: String,
) -> ClientError {
    let Some(code) = code else {
        info!("connection closed without a close code");
        return ClientError::ConnectionClosed { code: None, reason };
    };

    let reason = if reason.is_empty() {
        close::describe(code).unwrap_or("Unknown").to_string()
    } else {
        reason
    };
    info!(code, %reason, "connection closed by the gateway");

    match close::classify(code) {
        CloseAction::Transient => ClientError::ConnectionClosed {
            code: Some(code),
            reason,
        },
        CloseAction::Invalidate => {
            session.invalidate();
            ClientError::ConnectionClosed {
                code: Some(code),
                reason,
            }
        }
        CloseAction::Fatal => match code {
            4004 => ClientError::AuthenticationFailed { code, reason },
            4013 | 4014 => ClientError::PrivilegedIntents {
                requested: intents & Intents::privileged(),
                code,
                reason,
            },
            _ => ClientError::ConnectionClosed {
                code: Some(code),
                reason,
            },
        },
    }
}

/// The close code and reason sent back to the gateway for a terminal
/// error. Anything the client intends to resume closes with a
/// non-1000 code to preserve resumability.
fn close_params(err: &ClientError) -> (u16, &'static str) {
    match err {
        ClientError::Interrupt(GatewayInterrupt::Reconnect) => (CLOSE_RESUME, "reconnect ack"),
        ClientError::Interrupt(GatewayInterrupt::SessionInvalidated { resumable: false }) => {
            (CLOSE_NORMAL, "invalid session ack")
        }
        ClientError::Interrupt(GatewayInterrupt::SessionInvalidated { resumable: true }) => {
            (CLOSE_RESUME, "invalid session ack")
        }
        ClientError::Interrupt(GatewayInterrupt::HeartbeatLost) => {
            (CLOSE_RESUME, "heartbeat ack lost")
        }
        err if err.retry_action() == Retry::Fatal => (CLOSE_NORMAL, "fatal gateway error"),
        _ => (CLOSE_RESUME, "reconnecting"),
    }
}
