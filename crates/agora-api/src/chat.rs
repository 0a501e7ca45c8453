use axum::{
    Extension,
    extract::{
        State,
        ws::{WebSocketUpgrade, rejection::WebSocketUpgradeRejection},
    },
    response::Response,
};
use tracing::warn;

use agora_gateway::connection::MAX_MESSAGE_SIZE;
use agora_gateway::session::run_session;
use agora_token::Payload;

use crate::auth::AppState;
use crate::error::ApiError;

/// `GET /api/chat`: upgrade an authenticated request into a chat session.
///
/// Runs behind [`require_auth`](crate::middleware::require_auth), so the
/// credential is already verified by the time the upgrade is inspected.
pub async fn chat(
    State(state): State<AppState>,
    Extension(payload): Extension<Payload>,
    ws: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> Result<Response, ApiError> {
    let ws = ws.map_err(|e| ApiError::Upgrade(e.to_string()))?;

    let hub = state.hub.clone();
    let identity = payload.subject;
    Ok(ws
        .max_message_size(MAX_MESSAGE_SIZE)
        .max_frame_size(MAX_MESSAGE_SIZE)
        .on_failed_upgrade(|e| warn!("WebSocket upgrade failed: {}", e))
        .on_upgrade(move |socket| run_session(socket, hub, identity)))
}
