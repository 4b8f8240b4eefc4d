//! Outbound gate and connection status.

use std::sync::Arc;

use parking_lot::Mutex;
use puente_protocol::ClientMessage;
use tokio::sync::mpsc;

use crate::error::ClientError;

/// Connectivity of the session, observable through a watch channel on the
/// client handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStatus {
    Connecting,
    Open,
    Closed,
}

/// Hands outbound messages to the live connection's writer task, if any.
///
/// The sender is installed when a connection opens and cleared when it
/// closes. A send without a live connection fails with
/// [`ClientError::NotConnected`]; nothing is queued across connections.
#[derive(Clone, Default)]
pub(crate) struct Transport {
    outbound: Arc<Mutex<Option<mpsc::Sender<ClientMessage>>>>,
}

impl Transport {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn install(&self, tx: mpsc::Sender<ClientMessage>) {
        *self.outbound.lock() = Some(tx);
    }

    pub(crate) fn clear(&self) {
        *self.outbound.lock() = None;
    }

    /// Try to hand a message to the writer. Fails fast when the session is
    /// down or the writer cannot keep up; callers log and drop.
    pub(crate) fn try_send(&self, message: ClientMessage) -> Result<(), ClientError> {
        let guard = self.outbound.lock();
        match guard.as_ref() {
            Some(tx) => tx.try_send(message).map_err(|_| ClientError::NotConnected),
            None => Err(ClientError::NotConnected),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn send_without_connection_is_rejected() {
        let transport = Transport::new();
        let result = transport.try_send(ClientMessage::RequestCrossing { auto_id: 1 });
        assert!(matches!(result, Err(ClientError::NotConnected)));
    }

    #[tokio::test]
    async fn send_reaches_installed_writer() {
        let transport = Transport::new();
        let (tx, mut rx) = mpsc::channel(4);
        transport.install(tx);
        transport
            .try_send(ClientMessage::RequestCrossing { auto_id: 7 })
            .unwrap();
        assert!(matches!(
            rx.recv().await,
            Some(ClientMessage::RequestCrossing { auto_id: 7 })
        ));
    }

    #[tokio::test]
    async fn clear_drops_the_writer() {
        let transport = Transport::new();
        let (tx, _rx) = mpsc::channel(4);
        transport.install(tx);
        transport.clear();
        let result = transport.try_send(ClientMessage::ResetSystem {});
        assert!(matches!(result, Err(ClientError::NotConnected)));
    }
}
