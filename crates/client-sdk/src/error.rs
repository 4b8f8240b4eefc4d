//! Error types for the client SDK.
//!
//! Nothing here is fatal to the process: the worst outcome of any of these
//! is a dropped message or a temporarily stale view, which self-heals on
//! the next reconnect or snapshot.

/// Errors surfaced by the client.
#[derive(thiserror::Error, Debug)]
pub enum ClientError {
    /// Send attempted while the session is not open. The message is
    /// dropped, never queued.
    #[error("not connected")]
    NotConnected,

    /// Inbound payload could not be decoded. The frame is dropped and the
    /// session stays open.
    #[error("malformed message: {0}")]
    Malformed(String),

    /// Inbound envelope carried a tag this client does not know.
    #[error("unknown message type: {0}")]
    UnknownType(String),

    /// A message handler failed. Isolated to that one message; neither the
    /// session nor other vehicles are affected.
    #[error("handler failure: {0}")]
    Handler(String),

    #[error("config: {0}")]
    Config(String),

    /// The engine is no longer running.
    #[error("client stopped")]
    Stopped,
}
