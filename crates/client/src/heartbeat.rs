//! Heartbeat task keeping the gateway session alive
//!
//! The heart never reads from the socket. Acknowledgements and on-demand
//! beat requests are delivered by the reader, which is the only consumer
//! of the payload stream.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::sync::mpsc;
use tokio::sync::Notify;
use tokio::time::sleep;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, trace, warn};

use discord_gateway_protocol::Payload;

use crate::error::{ClientError, GatewayInterrupt};
use crate::session::SharedSession;

/// Heartbeat state shared with the reader, reused across connections.
///
/// The acknowledged flag means "at least one ack has arrived since the
/// most recent send"; a single ack satisfies any outstanding send.
pub(crate) struct Heart {
    acknowledged: AtomicBool,
    beat_requested: Notify,
    last_beat: Mutex<Option<Instant>>,
}

impl Heart {
    pub(crate) fn new() -> Self {
        Self {
            acknowledged: AtomicBool::new(true),
            beat_requested: Notify::new(),
            last_beat: Mutex::new(None),
        }
    }

    /// Clears state left over from a previous connection.
    pub(crate) fn reset(&self) {
        self.acknowledged.store(true, Ordering::SeqCst);
        *self.last_beat.lock() = None;
    }

    /// Records a heartbeat acknowledgement (opcode 11).
    pub(crate) fn acknowledge(&self) {
        self.acknowledged.store(true, Ordering::SeqCst);
        if let Some(sent) = *self.last_beat.lock() {
            trace!(
                latency_ms = sent.elapsed().as_millis() as u64,
                "heartbeat acknowledged"
            );
        }
    }

    /// Asks the heartbeat task to send immediately (server opcode 1).
    pub(crate) fn beat_soon(&self) {
        self.beat_requested.notify_one();
    }

    /// Runs the heartbeat loop until the connection goes away or an
    /// acknowledgement is missed.
    ///
    /// The first beat is delayed by a uniform random fraction of the
    /// interval, drawn from an instance-local generator. Each scheduled
    /// beat first checks that the previous send window saw an ack; an
    /// on-demand beat skips the check, leaves any pending window pending,
    /// and restarts the timer relative to its own send.
    pub(crate) async fn run(
        self: Arc<Self>,
        writer: mpsc::Sender<Message>,
        session: SharedSession,
    ) -> Result<(), ClientError> {
        let Some(interval) = session.heartbeat_interval() else {
            return Err(ClientError::Task(
                "heartbeat task started before hello".to_string(),
            ));
        };

        let mut rng = StdRng::from_entropy();
        let mut delay = interval.mul_f64(rng.gen::<f64>());

        loop {
            let scheduled = tokio::select! {
                () = sleep(delay) => true,
                () = self.beat_requested.notified() => {
                    debug!("immediate heartbeat requested");
                    false
                }
            };

            if scheduled && !self.acknowledged.load(Ordering::SeqCst) {
                warn!("heartbeat was not acknowledged within one interval");
                return Err(GatewayInterrupt::HeartbeatLost.into());
            }

            let sequence = session.sequence();
            trace!(?sequence, "sending heartbeat");
            let payload = Payload::heartbeat(sequence).to_json()?;
            if writer.send(Message::Text(payload)).await.is_err() {
                // The connection is tearing down; the reader reports why.
                return Ok(());
            }

            *self.last_beat.lock() = Some(Instant::now());
            self.acknowledged.store(false, Ordering::SeqCst);
            delay = interval;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::time::timeout;

    fn session_with_interval(millis: u64) -> SharedSession {
        let session = SharedSession::default();
        session.set_heartbeat_interval(Duration::from_millis(millis));
        session
    }

    async fn next_heartbeat(rx: &mut mpsc::Receiver<Message>) -> serde_json::Value {
        let message = timeout(Duration::from_secs(1), rx.recv())
            .await
            .expect("timed out waiting for heartbeat")
            .expect("writer channel closed");
        match message {
            Message::Text(text) => serde_json::from_str(&text).unwrap(),
            other => panic!("expected text frame, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_heartbeats_carry_the_last_sequence() {
        let heart = Arc::new(Heart::new());
        let session = session_with_interval(20);
        session.record_sequence(41);

        let (tx, mut rx) = mpsc::channel(8);
        let task = tokio::spawn(Arc::clone(&heart).run(tx, session));

        let beat = next_heartbeat(&mut rx).await;
        assert_eq!(beat["op"], 1);
        assert_eq!(beat["d"], 41);

        task.abort();
    }

    #[tokio::test]
    async fn test_acknowledged_heart_keeps_beating() {
        let heart = Arc::new(Heart::new());
        let session = session_with_interval(20);

        let (tx, mut rx) = mpsc::channel(8);
        let task = tokio::spawn(Arc::clone(&heart).run(tx, session));

        for _ in 0..3 {
            let beat = next_heartbeat(&mut rx).await;
            assert_eq!(beat["op"], 1);
            heart.acknowledge();
        }
        assert!(!task.is_finished());

        task.abort();
    }

    #[tokio::test]
    async fn test_missed_ack_stops_the_heart() {
        let heart = Arc::new(Heart::new());
        let session = session_with_interval(20);

        let (tx, mut rx) = mpsc::channel(8);
        let task = tokio::spawn(Arc::clone(&heart).run(tx, session));

        // First beat goes out; nobody acknowledges it.
        let beat = next_heartbeat(&mut rx).await;
        assert_eq!(beat["d"], serde_json::Value::Null);

        let result = timeout(Duration::from_secs(1), task)
            .await
            .expect("heart did not stop")
            .expect("heart panicked");
        assert!(matches!(
            result,
            Err(ClientError::Interrupt(GatewayInterrupt::HeartbeatLost))
        ));
    }

    #[tokio::test]
    async fn test_beat_soon_sends_immediately() {
        let heart = Arc::new(Heart::new());
        // Long interval: nothing would be sent for a while on its own.
        let session = session_with_interval(60_000);

        let (tx, mut rx) = mpsc::channel(8);
        let task = tokio::spawn(Arc::clone(&heart).run(tx, session));

        heart.beat_soon();
        let beat = next_heartbeat(&mut rx).await;
        assert_eq!(beat["op"], 1);

        // A second on-demand beat goes out even though the first was
        // never acknowledged; only scheduled beats check the window.
        heart.beat_soon();
        let beat = next_heartbeat(&mut rx).await;
        assert_eq!(beat["op"], 1);

        task.abort();
    }

    #[tokio::test]
    async fn test_heart_stops_quietly_when_writer_closes() {
        let heart = Arc::new(Heart::new());
        let session = session_with_interval(10);

        let (tx, rx) = mpsc::channel(8);
        drop(rx);
        let result = Arc::clone(&heart).run(tx, session).await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_heart_requires_an_interval() {
        let heart = Arc::new(Heart::new());
        let (tx, _rx) = mpsc::channel(8);
        let result = Arc::clone(&heart).run(tx, SharedSession::default()).await;
        assert!(matches!(result, Err(ClientError::Task(_))));
    }
}
