//! Payload definitions
//!
//! The hub does not interpret message contents. A payload is the body of a
//! text or binary frame, relayed verbatim with the same frame kind it arrived
//! in. Bodies are reference counted so fan-out clones are cheap.

use std::sync::Arc;

use axum::extract::ws::Message;

/// Opaque message relayed between sessions
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    /// Body of a text frame
    Text(Arc<str>),
    /// Body of a binary frame
    Binary(Arc<[u8]>),
}

impl Payload {
    /// Extract the payload from a data frame
    ///
    /// Returns None for control frames (ping, pong, close),
    /// which are never relayed.
    pub fn from_message(msg: Message) -> Option<Self> {
        match msg {
            Message::Text(text) => Some(Self::Text(Arc::from(text.as_str()))),
            Message::Binary(data) => Some(Self::Binary(Arc::from(&data[..]))),
            _ => None,
        }
    }

    /// Build the frame that carries this payload to a client
    pub fn to_message(&self) -> Message {
        match self {
            Self::Text(text) => Message::Text(text.to_string().into()),
            Self::Binary(data) => Message::Binary(data.to_vec().into()),
        }
    }

    /// Body length in bytes
    pub fn len(&self) -> usize {
        match self {
            Self::Text(text) => text.len(),
            Self::Binary(data) => data.len(),
        }
    }

    /// True for a zero-length body
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl From<&str> for Payload {
    fn from(text: &str) -> Self {
        Self::Text(Arc::from(text))
    }
}

impl From<String> for Payload {
    fn from(text: String) -> Self {
        Self::Text(Arc::from(text))
    }
}

impl From<Vec<u8>> for Payload {
    fn from(data: Vec<u8>) -> Self {
        Self::Binary(Arc::from(data))
    }
}
