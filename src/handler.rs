//! Route handlers
//!
//! `/` serves the chat page. `/room` upgrades to WebSocket and hands the
//! socket to a new client session. Everything else (unknown paths, wrong
//! methods, requests that are not valid upgrades) is answered by axum.

use axum::extract::ws::{WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use futures_util::StreamExt;
use tracing::{error, info, warn};

use crate::server::AppState;
use crate::session::ClientSession;

/// Path that upgrades to the room's WebSocket
pub const ROOM_PATH: &str = "/room";

/// The chat page served at `/`
pub const CHAT_PAGE: &str = include_str!("../templates/chat.html");

/// Chat page handler
pub async fn chat_page() -> Html<&'static str> {
    Html(CHAT_PAGE)
}

/// WebSocket upgrade handler
///
/// The session is admitted before the upgrade response goes out, so a
/// client whose handshake has completed receives everything broadcast
/// afterwards.
pub async fn room_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    let session = match ClientSession::join(state.room.clone(), state.outbound_capacity).await {
        Ok(session) => session,
        Err(e) => {
            error!("Cannot admit client: {}", e);
            return StatusCode::SERVICE_UNAVAILABLE.into_response();
        }
    };

    let id = session.id();
    let room = state.room;
    info!("Client {} connected", id);

    ws.on_failed_upgrade(move |e| {
        warn!("Upgrade failed for {}: {}", id, e);
        tokio::spawn(async move {
            let _ = room.leave(id).await;
        });
    })
    .on_upgrade(move |socket| handle_socket(socket, session))
}

/// Run an admitted session over an upgraded socket
async fn handle_socket(socket: WebSocket, session: ClientSession) {
    let (ws_sender, ws_receiver) = socket.split();
    session.run(ws_receiver, ws_sender).await;
}
