use super::{AppState, RequireUser};
use crate::realtime::{ChangeHub, Subscription};
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::Response;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::broadcast;

/// WebSocket endpoint. The client sends [`Subscription`] JSON messages and
/// receives every matching change event as JSON. A lag notice tells the
/// client to re-fetch instead of trusting the event stream.
pub(crate) async fn realtime_handler(
    State(state): State<AppState>,
    RequireUser(ctx): RequireUser,
    ws: WebSocketUpgrade,
) -> Response {
    let hub = state.hub.clone();
    tracing::debug!(user_id = %ctx.user_id, "realtime socket opened");
    ws.on_upgrade(move |socket| forward_changes(socket, hub))
}

async fn forward_changes(socket: WebSocket, hub: ChangeHub) {
    let mut rx = hub.subscribe();
    let (mut sender, mut receiver) = socket.split();
    let mut subscriptions: Vec<Subscription> = Vec::new();

    loop {
        tokio::select! {
            event = rx.recv() => match event {
                Ok(event) => {
                    if !subscriptions.iter().any(|sub| sub.matches(&event)) {
                        continue;
                    }
                    let payload = match serde_json::to_string(&event) {
                        Ok(payload) => payload,
                        Err(err) => {
                            tracing::warn!(error = %err, "unserializable change event");
                            continue;
                        }
                    };
                    if sender.send(Message::Text(payload)).await.is_err() {
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::debug!(skipped, "realtime socket lagged");
                    let notice = r#"{"lagged":true}"#.to_string();
                    if sender.send(Message::Text(notice)).await.is_err() {
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
            incoming = receiver.next() => match incoming {
                Some(Ok(Message::Text(text))) => {
                    match serde_json::from_str::<Subscription>(&text) {
                        Ok(subscription) => subscriptions.push(subscription),
                        Err(err) => {
                            tracing::debug!(error = %err, "ignoring malformed subscription");
                        }
                    }
                }
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => {}
                Some(Err(_)) => break,
            },
        }
    }
    tracing::debug!("realtime socket closed");
}
