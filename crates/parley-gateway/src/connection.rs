use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket};
use futures_util::{Sink, SinkExt, StreamExt};
use tracing::{error, info, trace, warn};

use parley_types::events::GatewayEvent;
use parley_types::models::UserId;

use crate::dispatcher::Dispatcher;

/// Heartbeat interval: server sends a Ping every 15 seconds.
/// If 2 consecutive Pongs are missed (~30s), the connection is dropped.
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(15);

/// Serve one WebSocket session. The bearer token was already checked at the
/// HTTP upgrade, so the session goes straight to Ready + event loop.
/// The gateway is push-only: client text frames are ignored.
pub async fn handle_connection(socket: WebSocket, dispatcher: Dispatcher, user_id: UserId) {
    let (mut sender, mut receiver) = socket.split();
    let (conn_id, mut events) = dispatcher.register(user_id);

    info!(user_id, %conn_id, "Gateway session opened");

    let pong_received = Arc::new(AtomicBool::new(true));
    let pong_flag_send = pong_received.clone();

    let mut send_task = tokio::spawn(async move {
        let ready = GatewayEvent::Ready { user_id };
        if send_event(&mut sender, &ready).await.is_err() {
            return;
        }

        let mut heartbeat = tokio::time::interval(HEARTBEAT_INTERVAL);
        heartbeat.tick().await;
        let mut missed_heartbeats: u8 = 0;

        loop {
            tokio::select! {
                event = events.recv() => {
                    let Some(event) = event else { break };
                    if send_event(&mut sender, &event).await.is_err() {
                        break;
                    }
                }
                _ = heartbeat.tick() => {
                    if pong_flag_send.swap(false, Ordering::Acquire) {
                        missed_heartbeats = 0;
                    } else {
                        missed_heartbeats += 1;
                        if missed_heartbeats >= 2 {
                            warn!(user_id, "Heartbeat timeout (missed {} pongs), dropping connection", missed_heartbeats);
                            break;
                        }
                    }
                    if sender.send(Message::Ping(Vec::new().into())).await.is_err() {
                        break;
                    }
                }
            }
        }
    });

    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = receiver.next().await {
            match msg {
                Message::Pong(_) => pong_received.store(true, Ordering::Release),
                Message::Close(_) => break,
                Message::Text(text) => trace!(user_id, "Ignoring client frame: {}", text.as_str()),
                _ => {}
            }
        }
    });

    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }

    dispatcher.unregister(user_id, conn_id);
    info!(user_id, %conn_id, "Gateway session closed");
}

async fn send_event<S>(sender: &mut S, event: &GatewayEvent) -> Result<(), ()>
where
    S: Sink<Message> + Unpin,
{
    let text = match serde_json::to_string(event) {
        Ok(text) => text,
        Err(e) => {
            error!("Failed to serialize {} event: {}", event.kind(), e);
            return Ok(());
        }
    };
    sender.send(Message::Text(text.into())).await.map_err(|_| ())
}
