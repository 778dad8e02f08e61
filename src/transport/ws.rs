//! Reconnecting WebSocket transport to the analyzer backend.
//!
//! One socket per session. The run loop owns the socket and the reconnect
//! timer; consumers interact through a cloneable `TransportHandle` and a
//! `watch`ed `ConnectionSnapshot`.

use std::sync::Arc;
use std::time::Duration;

use async_tungstenite::tokio::connect_async;
use async_tungstenite::tungstenite::Message;
use futures_util::{SinkExt, StreamExt};
use log::{error, info, warn};
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;

use crate::assets::FRAME_CHANNEL_CAPACITY;
use crate::pipeline::health::PipelineHealth;
use crate::protocol::{self, ClientMessage, WorkoutUpdate};
use crate::transport::state::{ConnEvent, ConnState};

/// Reconnection policy. The delay is fixed (no backoff curve); the
/// attempt bound is opt-in and unbounded by default.
#[derive(Debug, Clone, Copy)]
pub struct ReconnectPolicy {
    pub delay: Duration,
    pub max_attempts: Option<u32>,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            delay: crate::assets::RECONNECT_DELAY,
            max_attempts: None,
        }
    }
}

/// Shared connection view, mutated exclusively by the transport
#[derive(Debug, Clone, Default)]
pub struct ConnectionSnapshot {
    pub state: ConnState,
    /// Most recent well-formed update from the analyzer
    pub last_update: Option<WorkoutUpdate>,
    /// Consecutive reconnect attempts since the last successful connect
    pub retries: u32,
}

/// Cloneable sending side handed to the sampler
#[derive(Clone)]
pub struct TransportHandle {
    frame_tx: mpsc::Sender<ClientMessage>,
    snapshot_rx: watch::Receiver<ConnectionSnapshot>,
}

impl TransportHandle {
    pub fn is_connected(&self) -> bool {
        self.snapshot_rx.borrow().state.is_connected()
    }

    /// Queue a message for sending. No-op unless the transport is
    /// currently connected: frames are dropped, never buffered, while
    /// offline. Returns whether the message was accepted.
    pub fn send(&self, message: ClientMessage) -> bool {
        if !self.is_connected() {
            return false;
        }
        match self.frame_tx.try_send(message) {
            Ok(()) => true,
            Err(e) => {
                warn!("Outbound frame dropped: {}", e);
                false
            }
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<ConnectionSnapshot> {
        self.snapshot_rx.clone()
    }
}

pub struct WsTransport {
    handle: TransportHandle,
    snapshot_tx: Arc<watch::Sender<ConnectionSnapshot>>,
    cancel: CancellationToken,
    task: Option<tokio::task::JoinHandle<()>>,
}

impl WsTransport {
    /// Spawn the transport task and begin connecting to `url`.
    pub fn start(url: String, policy: ReconnectPolicy, health: Arc<PipelineHealth>) -> Self {
        let (snapshot_tx, snapshot_rx) = watch::channel(ConnectionSnapshot::default());
        let snapshot_tx = Arc::new(snapshot_tx);
        let (frame_tx, frame_rx) = mpsc::channel(FRAME_CHANNEL_CAPACITY);
        let cancel = CancellationToken::new();

        let task = tokio::spawn(run(
            url,
            policy,
            frame_rx,
            Arc::clone(&snapshot_tx),
            cancel.clone(),
            health,
        ));

        Self {
            handle: TransportHandle {
                frame_tx,
                snapshot_rx,
            },
            snapshot_tx,
            cancel,
            task: Some(task),
        }
    }

    pub fn handle(&self) -> TransportHandle {
        self.handle.clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<ConnectionSnapshot> {
        self.handle.snapshot_rx.clone()
    }

    pub fn is_connected(&self) -> bool {
        self.handle.is_connected()
    }

    /// Clear the locally held workout update (the reset action). Purely
    /// local; the analyzer is not messaged.
    pub fn reset_workout(&self) {
        self.snapshot_tx.send_modify(|s| s.last_update = None);
    }

    /// Cancel any pending reconnect, close the socket, and wait for the
    /// transport task to finish.
    pub async fn shutdown(&mut self) {
        self.cancel.cancel();
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

/// Publish a state transition. Invalid transitions are a programming
/// error; they are logged and the current state kept.
fn transition(
    snapshot: &watch::Sender<ConnectionSnapshot>,
    state: ConnState,
    event: ConnEvent,
) -> ConnState {
    match state.apply(event) {
        Ok(next) => {
            if next != state {
                info!("Transport: {} -> {}", state, next);
                snapshot.send_modify(|s| s.state = next);
            }
            next
        }
        Err(e) => {
            error!("Transport state error: {}", e);
            state
        }
    }
}

async fn run(
    url: String,
    policy: ReconnectPolicy,
    mut frame_rx: mpsc::Receiver<ClientMessage>,
    snapshot: Arc<watch::Sender<ConnectionSnapshot>>,
    cancel: CancellationToken,
    health: Arc<PipelineHealth>,
) {
    let mut state = ConnState::default();
    let mut retries: u32 = 0;

    loop {
        if cancel.is_cancelled() {
            break;
        }

        state = transition(&snapshot, state, ConnEvent::ConnectRequested);
        let connection = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            result = connect_async(url.as_str()) => result,
        };

        match connection {
            Ok((ws, _response)) => {
                info!("Connected to {}", url);
                retries = 0;
                snapshot.send_modify(|s| s.retries = 0);
                state = transition(&snapshot, state, ConnEvent::Opened);

                serve(ws, &mut frame_rx, &snapshot, &cancel, &health).await;

                if cancel.is_cancelled() {
                    break;
                }
                state = transition(&snapshot, state, ConnEvent::Lost);
            }
            Err(e) => {
                warn!("Connect to {} failed: {}", url, e);
                health.record_network_error();
                state = transition(&snapshot, state, ConnEvent::Lost);
            }
        }

        // schedule exactly one reconnect attempt per loss
        retries += 1;
        snapshot.send_modify(|s| s.retries = retries);
        if let Some(max) = policy.max_attempts {
            if retries > max {
                error!("Giving up after {} reconnect attempts", max);
                break;
            }
        }
        info!("Reconnecting in {:?} (attempt {})", policy.delay, retries);
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = tokio::time::sleep(policy.delay) => {}
        }
    }

    transition(&snapshot, state, ConnEvent::Teardown);
    info!("Transport closed");
}

/// Drive one open socket until it drops or teardown is requested.
async fn serve(
    ws: async_tungstenite::WebSocketStream<async_tungstenite::tokio::ConnectStream>,
    frame_rx: &mut mpsc::Receiver<ClientMessage>,
    snapshot: &watch::Sender<ConnectionSnapshot>,
    cancel: &CancellationToken,
    health: &PipelineHealth,
) {
    let (mut sink, mut stream) = ws.split();

    // frames queued against the previous connection are stale
    let mut stale = 0u32;
    while frame_rx.try_recv().is_ok() {
        stale += 1;
    }
    if stale > 0 {
        warn!("Discarded {} stale queued frames", stale);
    }

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                let _ = sink.send(Message::Close(None)).await;
                break;
            }
            outbound = frame_rx.recv() => {
                let Some(message) = outbound else { break };
                let payload = match serde_json::to_string(&message) {
                    Ok(payload) => payload,
                    Err(e) => {
                        error!("Failed to serialize frame message: {}", e);
                        continue;
                    }
                };
                if let Err(e) = sink.send(Message::text(payload)).await {
                    warn!("Send failed: {}", e);
                    health.record_network_error();
                    break;
                }
                health.record_frame_sent();
            }
            inbound = stream.next() => {
                match inbound {
                    Some(Ok(Message::Text(payload))) => {
                        if let Some(update) = protocol::parse_update(payload.as_str()) {
                            snapshot.send_modify(|s| s.last_update = Some(update));
                        } else {
                            health.record_parse_failure();
                        }
                    }
                    // pings are answered by the library on read
                    Some(Ok(Message::Ping(_))) | Some(Ok(Message::Pong(_))) => {}
                    Some(Ok(Message::Close(_))) => {
                        info!("Server closed the connection");
                        break;
                    }
                    // binary frames are not part of the protocol
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        warn!("Socket error: {}", e);
                        health.record_network_error();
                        break;
                    }
                    None => {
                        info!("Socket stream ended");
                        break;
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_tungstenite::tokio::accept_async;
    use tokio::net::TcpListener;

    async fn bind() -> (TcpListener, String) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("ws://{}", listener.local_addr().unwrap());
        (listener, url)
    }

    fn update_json(total: u32) -> String {
        format!(
            r#"{{"validSquats":0,"invalidSquats":0,"validThrows":0,"invalidThrows":0,"totalWallBallReps":{},"currentState":"ready"}}"#,
            total
        )
    }

    fn quick_policy() -> ReconnectPolicy {
        ReconnectPolicy {
            delay: Duration::from_millis(100),
            max_attempts: None,
        }
    }

    async fn wait_for_total(rx: &mut watch::Receiver<ConnectionSnapshot>, total: u32) {
        tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                let seen = rx
                    .borrow()
                    .last_update
                    .as_ref()
                    .map(|u| u.total_wall_ball_reps);
                if seen == Some(total) {
                    return;
                }
                rx.changed().await.unwrap();
            }
        })
        .await
        .expect("timed out waiting for workout update");
    }

    #[tokio::test]
    async fn test_updates_flow_and_connection_recovers() {
        let (listener, url) = bind().await;

        let server = tokio::spawn(async move {
            // first connection: one update, then an abrupt drop
            let (stream, _) = listener.accept().await.unwrap();
            let mut ws = accept_async(stream).await.unwrap();
            ws.send(Message::text(update_json(1))).await.unwrap();
            drop(ws);

            // the client comes back on its own after the fixed delay
            let (stream, _) = listener.accept().await.unwrap();
            let mut ws = accept_async(stream).await.unwrap();
            ws.send(Message::text(update_json(2))).await.unwrap();
            while let Some(Ok(_)) = ws.next().await {}
        });

        let mut transport =
            WsTransport::start(url, quick_policy(), Arc::new(PipelineHealth::new()));
        let mut snapshot_rx = transport.subscribe();

        wait_for_total(&mut snapshot_rx, 1).await;
        // the second update can only arrive over the reconnected socket
        wait_for_total(&mut snapshot_rx, 2).await;
        assert!(snapshot_rx.borrow().state.is_connected());

        // reset clears the locally held update without touching the socket
        transport.reset_workout();
        assert!(snapshot_rx.borrow().last_update.is_none());
        assert!(snapshot_rx.borrow().state.is_connected());

        transport.shutdown().await;
        assert_eq!(transport.subscribe().borrow().state, ConnState::Closed);
        server.abort();
    }

    #[tokio::test]
    async fn test_malformed_payload_is_dropped_without_closing() {
        let (listener, url) = bind().await;
        let health = Arc::new(PipelineHealth::new());

        let server = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let mut ws = accept_async(stream).await.unwrap();
            ws.send(Message::text(update_json(5))).await.unwrap();
            ws.send(Message::text("this is not json".to_string()))
                .await
                .unwrap();
            ws.send(Message::text(update_json(6))).await.unwrap();
            while let Some(Ok(_)) = ws.next().await {}
        });

        let mut transport = WsTransport::start(url, quick_policy(), Arc::clone(&health));
        let mut snapshot_rx = transport.subscribe();

        wait_for_total(&mut snapshot_rx, 5).await;
        // the next valid update arrives over the SAME connection: the
        // malformed one in between neither closed the socket nor clobbered
        // the last valid update
        wait_for_total(&mut snapshot_rx, 6).await;
        assert_eq!(snapshot_rx.borrow().retries, 0);
        assert_eq!(health.parse_failures(), 1);

        transport.shutdown().await;
        server.abort();
    }

    #[tokio::test]
    async fn test_send_is_noop_while_disconnected() {
        // nothing is listening here; the transport stays in its retry loop
        let mut transport = WsTransport::start(
            "ws://127.0.0.1:9".to_string(),
            quick_policy(),
            Arc::new(PipelineHealth::new()),
        );
        let handle = transport.handle();

        assert!(!handle.is_connected());
        let accepted = handle.send(ClientMessage::Frame {
            data: "aGVsbG8=".into(),
            timestamp: 0,
        });
        assert!(!accepted);

        transport.shutdown().await;
    }

    #[tokio::test]
    async fn test_retry_budget_closes_transport() {
        let mut transport = WsTransport::start(
            "ws://127.0.0.1:9".to_string(),
            ReconnectPolicy {
                delay: Duration::from_millis(10),
                max_attempts: Some(2),
            },
            Arc::new(PipelineHealth::new()),
        );
        let mut snapshot_rx = transport.subscribe();

        tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                if snapshot_rx.borrow().state.is_closed() {
                    return;
                }
                snapshot_rx.changed().await.unwrap();
            }
        })
        .await
        .expect("transport never exhausted its retry budget");

        transport.shutdown().await;
    }
}
