use axum::{
    extract::ws::{Message, WebSocket, WebSocketUpgrade},
    response::Response,
};
use futures_util::{SinkExt, StreamExt};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::{broadcast, RwLock};

use crate::models::{Notification, Request, RequestStatus};

/// Event types for WebSocket messages
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    Notification,
    RequestUpdated,
}

/// WebSocket event message
#[derive(Debug, Clone, Serialize)]
pub struct Event {
    #[serde(rename = "type")]
    pub event_type: EventType,
    pub payload: serde_json::Value,
}

/// Payload for request status events
#[derive(Debug, Clone, Serialize)]
pub struct RequestUpdatedPayload {
    pub request_id: i64,
    pub name: String,
    pub status: RequestStatus,
    pub version: i64,
}

/// Serialized event plus the users it is addressed to
#[derive(Debug, Clone)]
struct Envelope {
    recipients: Vec<i64>,
    data: String,
}

impl Envelope {
    fn is_for(&self, user_id: i64) -> bool {
        self.recipients.contains(&user_id)
    }
}

/// WebSocket hub manages connections and broadcasts events
pub struct Hub {
    tx: broadcast::Sender<Envelope>,
    client_count: Arc<RwLock<usize>>,
}

impl Hub {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(256);
        Self {
            tx,
            client_count: Arc::new(RwLock::new(0)),
        }
    }

    /// Send an event to the sockets of `recipients`; nobody else sees it
    pub async fn broadcast_event(&self, event: Event, recipients: Vec<i64>) {
        if recipients.is_empty() {
            return;
        }
        let data = match serde_json::to_string(&event) {
            Ok(data) => data,
            Err(e) => {
                tracing::error!("Error serializing WebSocket event: {}", e);
                return;
            }
        };

        let count = *self.client_count.read().await;
        if count > 0 {
            if let Err(e) = self.tx.send(Envelope { recipients, data }) {
                tracing::warn!("Error broadcasting WebSocket event: {}", e);
            } else {
                tracing::debug!("Broadcasting {:?} to {} clients", event.event_type, count);
            }
        }
    }

    /// Push a freshly stored notification to its recipient
    pub async fn broadcast_notification(&self, notification: &Notification) {
        self.broadcast_event(
            Event {
                event_type: EventType::Notification,
                payload: serde_json::to_value(notification).unwrap_or_default(),
            },
            vec![notification.user_id],
        )
        .await;
    }

    /// Announce a request status change to the users allowed to see the request
    pub async fn broadcast_request_updated(&self, request: &Request, recipients: Vec<i64>) {
        self.broadcast_event(
            Event {
                event_type: EventType::RequestUpdated,
                payload: serde_json::to_value(RequestUpdatedPayload {
                    request_id: request.id,
                    name: request.name.clone(),
                    status: request.status,
                    version: request.version,
                })
                .unwrap_or_default(),
            },
            recipients,
        )
        .await;
    }

    /// Get the number of connected clients
    pub async fn client_count(&self) -> usize {
        *self.client_count.read().await
    }

    fn subscribe(&self) -> broadcast::Receiver<Envelope> {
        self.tx.subscribe()
    }

    async fn increment_clients(&self) {
        let mut count = self.client_count.write().await;
        *count += 1;
        tracing::info!("WebSocket client connected. Total clients: {}", *count);
    }

    async fn decrement_clients(&self) {
        let mut count = self.client_count.write().await;
        *count = count.saturating_sub(1);
        tracing::info!("WebSocket client disconnected. Total clients: {}", *count);
    }
}

impl Default for Hub {
    fn default() -> Self {
        Self::new()
    }
}

/// Upgrade an authenticated connection for `user_id`
pub fn ws_handler(ws: WebSocketUpgrade, hub: Arc<Hub>, user_id: i64) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, hub, user_id))
}

async fn handle_socket(socket: WebSocket, hub: Arc<Hub>, user_id: i64) {
    let (mut sender, mut receiver) = socket.split();

    hub.increment_clients().await;
    let mut rx = hub.subscribe();

    let send_task = tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(envelope) => {
                    if !envelope.is_for(user_id) {
                        continue;
                    }
                    if sender.send(Message::Text(envelope.data)).await.is_err() {
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!("WebSocket client lagged, skipped {} events", skipped);
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    });

    // Drain incoming frames to keep the connection alive
    let recv_task = tokio::spawn(async move {
        while let Some(msg) = receiver.next().await {
            if msg.is_err() {
                break;
            }
        }
    });

    tokio::select! {
        _ = send_task => {},
        _ = recv_task => {},
    }

    hub.decrement_clients().await;
}
