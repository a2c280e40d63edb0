use std::time::Duration;

use futures::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, oneshot};
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{accept_async, WebSocketStream};

use discord_gateway::client::{Client, ReconnectConfig};
use discord_gateway::protocol::Intents;

fn fast_reconnect() -> ReconnectConfig {
    ReconnectConfig {
        base: Duration::from_millis(10),
        cap: Duration::from_millis(100),
        invalid_session_min: Duration::from_millis(10),
        invalid_session_max: Duration::from_millis(30),
    }
}

async fn send_json(ws: &mut WebSocketStream<TcpStream>, value: Value) {
    ws.send(Message::Text(value.to_string())).await.unwrap();
}

/// Receives the next JSON payload from the client, acking and skipping
/// heartbeats.
async fn recv_command(ws: &mut WebSocketStream<TcpStream>) -> Value {
    loop {
        let message = timeout(Duration::from_secs(5), ws.next())
            .await
            .expect("timed out waiting for client payload")
            .expect("client closed the stream")
            .expect("websocket error");
        if let Message::Text(text) = message {
            let value: Value = serde_json::from_str(&text).unwrap();
            if value["op"] == 1 {
                send_json(ws, json!({"op": 11})).await;
                continue;
            }
            return value;
        }
    }
}

async fn read_until_close(ws: &mut WebSocketStream<TcpStream>) -> Option<u16> {
    loop {
        match timeout(Duration::from_secs(5), ws.next())
            .await
            .expect("timed out waiting for close")
        {
            Some(Ok(Message::Close(frame))) => return frame.map(|f| u16::from(f.code)),
            Some(Ok(_)) => continue,
            _ => return None,
        }
    }
}

fn collect_events(client: &mut Client) -> mpsc::UnboundedReceiver<(String, u64)> {
    let (tx, rx) = mpsc::unbounded_channel();
    client.on_dispatch(move |event| {
        let tx = tx.clone();
        async move {
            tx.send((event.name, event.seq)).unwrap();
            Ok(())
        }
    });
    rx
}

async fn next_event(rx: &mut mpsc::UnboundedReceiver<(String, u64)>) -> (String, u64) {
    timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("timed out waiting for dispatch")
        .expect("event channel closed")
}

#[tokio::test]
async fn test_gateway_reconnect_resumes_on_the_resume_url() {
    tracing_subscriber::fmt().with_test_writer().try_init().ok();

    let listener_a = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let listener_b = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr_a = listener_a.local_addr().unwrap();
    let addr_b = listener_b.local_addr().unwrap();

    // The resume server: must see a resume payload, never an identify.
    let server_b = tokio::spawn(async move {
        let (stream, _) = listener_b.accept().await.unwrap();
        let mut ws = accept_async(stream).await.unwrap();
        send_json(&mut ws, json!({"op": 10, "d": {"heartbeat_interval": 60000}})).await;

        let resume = recv_command(&mut ws).await;
        assert_eq!(resume["op"], 6, "expected resume, got {resume}");
        assert_eq!(resume["d"]["token"], "Bot test-token");
        assert_eq!(resume["d"]["session_id"], "abc");
        assert_eq!(resume["d"]["seq"], 1);

        send_json(&mut ws, json!({"op": 0, "s": 2, "t": "RESUMED", "d": null})).await;
        read_until_close(&mut ws).await
    });

    // The fresh server: identify, READY pointing at the resume server,
    // then a reconnect request.
    let server_a = tokio::spawn(async move {
        let (stream, _) = listener_a.accept().await.unwrap();
        let mut ws = accept_async(stream).await.unwrap();
        send_json(&mut ws, json!({"op": 10, "d": {"heartbeat_interval": 60000}})).await;

        let identify = recv_command(&mut ws).await;
        assert_eq!(identify["op"], 2);

        send_json(
            &mut ws,
            json!({
                "op": 0, "s": 1, "t": "READY",
                "d": {"session_id": "abc", "resume_gateway_url": format!("ws://{addr_b}")}
            }),
        )
        .await;
        send_json(&mut ws, json!({"op": 7, "d": null})).await;
        read_until_close(&mut ws).await
    });

    let mut client = Client::new("Bot test-token", Intents::none())
        .with_gateway_url(format!("ws://{addr_a}"))
        .with_zlib_stream(false)
        .with_reconnect_config(fast_reconnect());
    let mut events = collect_events(&mut client);
    let handle = client.handle();
    let run = tokio::spawn(async move { client.run().await });

    let (name, seq) = next_event(&mut events).await;
    assert_eq!((name.as_str(), seq), ("READY", 1));
    let (name, seq) = next_event(&mut events).await;
    assert_eq!((name.as_str(), seq), ("RESUMED", 2));

    // A reconnect request closes with a resumable (non-1000) code.
    let close_a = server_a.await.unwrap();
    assert_eq!(close_a, Some(4000));

    handle.shutdown();
    timeout(Duration::from_secs(5), run)
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    server_b.await.unwrap();
}

#[tokio::test]
async fn test_non_resumable_invalidation_identifies_fresh() {
    tracing_subscriber::fmt().with_test_writer().try_init().ok();

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (done_tx, done_rx) = oneshot::channel();

    let server = tokio::spawn(async move {
        // First connection: establish a session, then invalidate it
        // non-resumably.
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = accept_async(stream).await.unwrap();
        send_json(&mut ws, json!({"op": 10, "d": {"heartbeat_interval": 60000}})).await;
        let identify = recv_command(&mut ws).await;
        assert_eq!(identify["op"], 2);
        send_json(
            &mut ws,
            json!({
                "op": 0, "s": 1, "t": "READY",
                "d": {"session_id": "abc", "resume_gateway_url": format!("ws://{addr}")}
            }),
        )
        .await;
        send_json(&mut ws, json!({"op": 9, "d": false})).await;
        let first_close = read_until_close(&mut ws).await;

        // Second connection: the session is gone, so the client must
        // identify from scratch, not resume.
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = accept_async(stream).await.unwrap();
        send_json(&mut ws, json!({"op": 10, "d": {"heartbeat_interval": 60000}})).await;
        let second = recv_command(&mut ws).await;
        assert_eq!(second["op"], 2, "expected a fresh identify, got {second}");
        send_json(
            &mut ws,
            json!({
                "op": 0, "s": 1, "t": "READY",
                "d": {"session_id": "xyz", "resume_gateway_url": format!("ws://{addr}")}
            }),
        )
        .await;

        done_tx.send(()).unwrap();
        let _ = read_until_close(&mut ws).await;
        first_close
    });

    let mut client = Client::new("Bot test-token", Intents::none())
        .with_gateway_url(format!("ws://{addr}"))
        .with_zlib_stream(false)
        .with_reconnect_config(fast_reconnect());
    let mut events = collect_events(&mut client);
    let handle = client.handle();
    let run = tokio::spawn(async move { client.run().await });

    let (name, _) = next_event(&mut events).await;
    assert_eq!(name, "READY");
    timeout(Duration::from_secs(5), done_rx)
        .await
        .expect("client never re-identified")
        .unwrap();
    let (name, _) = next_event(&mut events).await;
    assert_eq!(name, "READY");

    handle.shutdown();
    timeout(Duration::from_secs(5), run)
        .await
        .unwrap()
        .unwrap()
        .unwrap();

    // Acknowledging a non-resumable invalidation closes with 1000.
    let first_close = server.await.unwrap();
    assert_eq!(first_close, Some(1000));
}
