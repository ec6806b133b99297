//! Error types for the broadcast hub
//!
//! Defines application-level errors, room communication errors and
//! configuration errors. Uses thiserror for ergonomic error definitions.

use thiserror::Error;

/// Application-level errors
///
/// Transport errors are local to one connection. None of them reach the
/// room's control loop or other sessions.
#[derive(Debug, Error)]
pub enum AppError {
    /// WebSocket transport error (fatal for the connection)
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] axum::Error),

    /// IO error (listener bind or accept)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The room task is gone
    #[error(transparent)]
    Room(#[from] RoomError),
}

/// Room communication errors
///
/// Occurs when the room's intake channels are closed, which only happens
/// once the room task has stopped.
#[derive(Debug, Error)]
pub enum RoomError {
    /// The room's control loop is no longer running
    #[error("Room closed")]
    Closed,
}

/// Command line configuration errors
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// Overflow policy argument not recognized
    #[error("Unknown overflow policy: {0} (expected drop-newest or disconnect)")]
    UnknownOverflowPolicy(String),
}
