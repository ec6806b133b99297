//! Front door
//!
//! Binds the listener, starts the room actor, and serves the axum router.
//! The room is passed to the handlers as explicit state; there is no global
//! room.

use axum::routing::get;
use axum::Router;
use tokio::net::TcpListener;
use tracing::info;

use crate::config::Config;
use crate::error::AppError;
use crate::handler::{chat_page, room_handler, ROOM_PATH};
use crate::room::{Room, RoomHandle};

/// Shared state passed to axum handlers
#[derive(Debug, Clone)]
pub struct AppState {
    pub room: RoomHandle,
    pub outbound_capacity: usize,
}

/// Build the router with all routes
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(chat_page))
        .route(ROOM_PATH, get(room_handler))
        .with_state(state)
}

/// Start the room and serve connections on the configured address
pub async fn run(config: Config) -> Result<(), AppError> {
    let listener = TcpListener::bind(&config.addr).await?;
    info!("Broadcast hub listening on {}", config.addr);

    let (room, handle) = Room::new(config.overflow);
    tokio::spawn(room.run());

    serve(listener, handle, config.outbound_capacity).await
}

/// Serve the router on an already bound listener
pub async fn serve(
    listener: TcpListener,
    room: RoomHandle,
    outbound_capacity: usize,
) -> Result<(), AppError> {
    let router = build_router(AppState {
        room,
        outbound_capacity,
    });

    axum::serve(listener, router).await?;

    Ok(())
}
