//! Real-time notifications over WebSocket.
//!
//! `GET /api/ws?token=<jwt>` upgrades to a socket that receives every
//! notification addressed to the token's user (and, for admins, every
//! withdrawal update). The token is checked before the upgrade, so a bad
//! token gets a plain 401 response.

use axum::{
    extract::{
        Query, State, WebSocketUpgrade,
        ws::{Message, WebSocket},
    },
    response::Response,
};
use futures::{SinkExt, StreamExt};
use tokio::sync::broadcast::error::RecvError;

use crate::{
    error::AppError,
    middleware::auth::AuthContext,
    models::notification::WsQuery,
    services::{auth_service, notifier},
    state::AppState,
};

pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Query(query): Query<WsQuery>,
) -> Result<Response, AppError> {
    let token = query.token.as_deref().ok_or(AppError::Unauthorized)?;
    let auth = auth_service::decode_token(token, &state.config.jwt_secret)?;

    Ok(ws.on_upgrade(move |socket| handle_socket(socket, state, auth)))
}

async fn handle_socket(socket: WebSocket, state: AppState, auth: AuthContext) {
    let (mut sender, mut receiver) = socket.split();
    let mut events = state.notifier.subscribe();

    tracing::info!(user_id = %auth.user_id, "websocket connected");

    loop {
        tokio::select! {
            received = events.recv() => match received {
                Ok(notification) => {
                    if !notifier::should_deliver(&auth, &notification) {
                        continue;
                    }
                    let payload = match serde_json::to_string(&notification.event) {
                        Ok(payload) => payload,
                        Err(e) => {
                            tracing::error!(error = %e, "failed to serialize notification");
                            continue;
                        }
                    };
                    if sender.send(Message::Text(payload.into())).await.is_err() {
                        break;
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(user_id = %auth.user_id, skipped, "websocket subscriber lagged");
                }
                Err(RecvError::Closed) => break,
            },
            incoming = receiver.next() => match incoming {
                Some(Ok(Message::Text(text))) if text.as_str().trim() == "ping" => {
                    if sender.send(Message::Text("pong".into())).await.is_err() {
                        break;
                    }
                }
                Some(Ok(Message::Close(_))) | None | Some(Err(_)) => break,
                // Protocol pings are answered by axum
                Some(Ok(_)) => {}
            },
        }
    }

    tracing::info!(user_id = %auth.user_id, "websocket disconnected");
}
