//! Single-Room WebSocket Broadcast Hub Library
//!
//! Clients connect over WebSocket, send messages, and receive every message
//! sent by any connected client, their own included. Built with axum
//! using the Actor pattern for state management.
//!
//! # Features
//! - Chat page served at `/`
//! - WebSocket upgrade at `/room`
//! - Text and binary payloads relayed verbatim
//! - Bounded per-client outbound queues with a configurable overflow policy
//! - Disconnection handling
//!
//! # Architecture
//! Uses the Actor pattern with `mpsc` channels:
//! - `Room` is the central actor owning the member set
//! - Each connection runs a `ClientSession` with an inbound and an outbound pump
//! - The axum router reaches the room through a `RoomHandle` in its state
//! - No locks needed - all state access goes through message passing
//!
//! # Example
//! ```ignore
//! use tokio::net::TcpListener;
//! use broadcast_hub::{server, OverflowPolicy, Room};
//!
//! #[tokio::main]
//! async fn main() {
//!     let listener = TcpListener::bind("127.0.0.1:8080").await.unwrap();
//!     let (room, handle) = Room::new(OverflowPolicy::DropNewest);
//!
//!     tokio::spawn(room.run());
//!
//!     server::serve(listener, handle, 256).await.unwrap();
//! }
//! ```

pub mod config;
pub mod error;
pub mod handler;
pub mod message;
pub mod room;
pub mod server;
pub mod session;
pub mod types;

// Re-export main types for convenience
pub use config::{Config, OverflowPolicy};
pub use error::{AppError, ConfigError, RoomError};
pub use message::Payload;
pub use room::{Room, RoomHandle};
pub use server::{build_router, AppState};
pub use session::ClientSession;
pub use types::ClientId;
