
use std::time::{Duration, Instant};

use futures_util::SinkExt;
use socketio_client::{Client, DisconnectReason, ReconnectConfig, Value};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;

async fn timeout_rcv<T: std::fmt::Debug>(rx: &mut mpsc::UnboundedReceiver<T>) -> T {
    tokio::time::timeout(Duration::from_secs(10), rx.recv())
        .await
        .expect("no event within 10s")
        .expect("channel closed")
}

#[tokio::test]
async fn ping_timeout_closes_the_connection() {
    let (listener, uri) = fixture::bind().await;

    let client = Client::new();
    client.set_reconnect_config(ReconnectConfig::disabled());
    let (close_tx, mut close_rx) = mpsc::unbounded_channel();
    client.on_close(move |reason| close_tx.send(reason).unwrap());

    let started = Instant::now();
    client.connect(&uri);
    // pingInterval=1000, pingTimeout=500: the heartbeat window is 1500ms
    let mut ws = fixture::handshake_with(&listener, 1000, 500).await;
    ws.send(Message::text("2")).await.unwrap();

    // the client replies PONG, then the server goes silent
    let pong = fixture::recv_text(&mut ws).await;
    assert_eq!(pong, "3");

    let reason = timeout_rcv(&mut close_rx).await;
    assert_eq!(reason, DisconnectReason::PingTimeout);
    let elapsed = started.elapsed();
    assert!(elapsed >= Duration::from_millis(1300), "closed after {elapsed:?}");
    assert!(elapsed < Duration::from_secs(6), "closed after {elapsed:?}");

    fixture::recv_until_closed(&mut ws).await;
}

#[tokio::test]
async fn reconnect_backoff_saturates_then_gives_up() {
    let (listener, uri) = fixture::bind().await;

    let client = Client::new();
    client.set_reconnect_config(ReconnectConfig::new(3, 100, 400));

    let (reconnect_tx, mut reconnect_rx) = mpsc::unbounded_channel();
    client.on_reconnect(move |attempt, delay| reconnect_tx.send((attempt, delay)).unwrap());
    let (close_tx, mut close_rx) = mpsc::unbounded_channel();
    client.on_close(move |reason| close_tx.send(reason).unwrap());

    client.connect(&uri);
    let mut ws = fixture::handshake(&listener).await;
    // force the transport closed and stop listening so every retry fails
    ws.close(None).await.unwrap();
    drop(ws);
    drop(listener);

    assert_eq!(timeout_rcv(&mut reconnect_rx).await, (1, 100));
    assert_eq!(timeout_rcv(&mut reconnect_rx).await, (2, 200));
    assert_eq!(timeout_rcv(&mut reconnect_rx).await, (3, 400));
    assert_eq!(
        timeout_rcv(&mut close_rx).await,
        DisconnectReason::MaxReconnectAttempts
    );
    assert!(reconnect_rx.try_recv().is_err());

    client.sync_close().await;
}

#[tokio::test]
async fn reconnect_counter_resets_after_successful_handshake() {
    let (listener, uri) = fixture::bind().await;

    let client = Client::new();
    client.set_reconnect_config(ReconnectConfig::new(10, 50, 50));
    let (reconnect_tx, mut reconnect_rx) = mpsc::unbounded_channel();
    client.on_reconnect(move |attempt, delay| reconnect_tx.send((attempt, delay)).unwrap());

    client.connect(&uri);
    let mut ws = fixture::handshake(&listener).await;
    ws.close(None).await.unwrap();
    drop(ws);

    // first outage: one attempt which succeeds
    assert_eq!(timeout_rcv(&mut reconnect_rx).await, (1, 50));
    let mut ws = fixture::handshake(&listener).await;

    // the successful handshake zeroed the counter, so the next outage starts
    // from attempt 1 again
    ws.close(None).await.unwrap();
    drop(ws);
    assert_eq!(timeout_rcv(&mut reconnect_rx).await, (1, 50));
    let ws = fixture::handshake(&listener).await;

    drop(ws);
    client.sync_close().await;
}

#[tokio::test]
async fn server_close_reason() {
    let (listener, uri) = fixture::bind().await;

    let client = Client::new();
    client.set_reconnect_config(ReconnectConfig::disabled());
    let (close_tx, mut close_rx) = mpsc::unbounded_channel();
    client.on_close(move |reason| close_tx.send(reason).unwrap());

    client.connect(&uri);
    let mut ws = fixture::handshake(&listener).await;
    ws.close(None).await.unwrap();

    assert_eq!(
        timeout_rcv(&mut close_rx).await,
        DisconnectReason::ServerDisconnect
    );

    client.sync_close().await;
}

#[tokio::test]
async fn client_close_reason() {
    let (listener, uri) = fixture::bind().await;

    let client = Client::new();
    client.set_reconnect_config(ReconnectConfig::disabled());
    let (close_tx, mut close_rx) = mpsc::unbounded_channel();
    client.on_close(move |reason| close_tx.send(reason).unwrap());
    let _socket = client.socket("/");

    client.connect(&uri);
    let mut ws = fixture::handshake(&listener).await;
    fixture::expect_connect(&mut ws, "/").await;

    client.close();
    assert_eq!(
        timeout_rcv(&mut close_rx).await,
        DisconnectReason::ClientDisconnect
    );

    fixture::recv_until_closed(&mut ws).await;
    drop(ws);
    client.sync_close().await;
}

#[tokio::test]
async fn connect_error_reaches_the_error_listener() {
    let (listener, uri) = fixture::bind().await;

    let client = Client::new();
    client.set_reconnect_config(ReconnectConfig::disabled());
    let socket = client.socket("/");
    let (err_tx, mut err_rx) = mpsc::unbounded_channel();
    socket.on_error(move |payload| {
        err_tx.send(payload.get("message").as_str().to_string()).unwrap();
    });
    let (fail_tx, mut fail_rx) = mpsc::unbounded_channel();
    client.on_fail(move |error| fail_tx.send(error).unwrap());

    client.connect(&uri);
    let mut ws = fixture::handshake(&listener).await;
    let frame = fixture::recv_text(&mut ws).await;
    assert!(frame.starts_with("40"));
    ws.send(Message::text(r#"44{"message":"Not authorized"}"#))
        .await
        .unwrap();

    assert_eq!(timeout_rcv(&mut err_rx).await, "Not authorized");
    assert_eq!(
        timeout_rcv(&mut fail_rx).await,
        socketio_client::ConnectionError::AuthenticationFailed
    );

    drop(ws);
    client.sync_close().await;
}

#[tokio::test]
async fn listener_churn_during_dispatch() {
    let (listener, uri) = fixture::bind().await;

    let client = Client::new();
    client.set_reconnect_config(ReconnectConfig::disabled());
    let socket = client.socket("/");
    let (tx, mut rx) = mpsc::unbounded_channel();
    socket.on("evt", move |ev| {
        tx.send(ev.message().as_int()).unwrap();
    });

    client.connect(&uri);
    let mut ws = fixture::handshake(&listener).await;
    fixture::expect_connect(&mut ws, "/").await;

    // register and remove listeners from another task while the server
    // floods events at the dispatcher
    let churner = {
        let socket = socket.clone();
        tokio::spawn(async move {
            for i in 0..200 {
                socket.on(format!("other-{i}"), |_| {});
                socket.on_any(|_| {});
                socket.off(&format!("other-{i}"));
                socket.off_all();
                if i % 16 == 0 {
                    tokio::task::yield_now().await;
                }
            }
        })
    };

    for i in 0..200i64 {
        ws.send(Message::text(format!(r#"42["evt",{i}]"#)))
            .await
            .unwrap();
    }
    churner.await.unwrap();

    // "evt" may be dropped by off_all at any point; whatever was delivered
    // arrived in order
    let mut last = -1;
    while let Ok(i) = rx.try_recv() {
        assert!(i > last);
        last = i;
    }
    assert!(client.opened());
    socket.emit("still-alive", vec![Value::from(1)]);
    let text = fixture::recv_text(&mut ws).await;
    let (_, json) = fixture::parse_event(&text);
    assert_eq!(json, r#"["still-alive",1]"#);

    drop(ws);
    client.sync_close().await;
}
