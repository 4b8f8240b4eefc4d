//! Client-facing activity events.
//!
//! Everything a renderer's log pane would show is published here as a
//! structured, machine-parseable event. The default sink forwards to
//! `tracing`; embedders that draw their own feed plug in a [`ChannelSink`]
//! or their own [`EventSink`] implementation.

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::mpsc;

/// Who initiated a full system reset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResetOrigin {
    Local,
    Remote,
}

/// Structured client activity, one variant per log-worthy occurrence.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event")]
pub enum ClientEvent {
    Connected {
        endpoint: String,
    },
    Disconnected {
        reason: String,
    },
    Reconnecting {
        delay_ms: u64,
    },
    /// Registration request handed to the authority; the id arrives later.
    RegistrationSent {
        name: String,
    },
    VehicleRegistered {
        id: u64,
        name: String,
        priority: String,
        direction: String,
        laps_total: u32,
    },
    CrossingGranted {
        id: u64,
        message: String,
    },
    /// Crossing denied. Published once per wait, not on every denial.
    WaitingForTurn {
        id: u64,
        message: String,
    },
    VehicleCrossing {
        id: u64,
        name: String,
        lap: u32,
        laps_total: u32,
    },
    /// Simulated transit elapsed and the finish notice went out.
    TransitFinished {
        id: u64,
    },
    VehicleRequeued {
        id: u64,
        name: String,
        laps_remaining: u32,
    },
    VehicleFinished {
        id: u64,
        name: String,
        laps_total: u32,
    },
    SystemReset {
        origin: ResetOrigin,
    },
    /// An outbound message was dropped because the session is down.
    TransportUnavailable {
        action: String,
    },
    ServerError {
        message: String,
    },
    /// Malformed frame, unrecognized tag, or isolated handler failure.
    ProtocolWarning {
        detail: String,
    },
}

impl ClientEvent {
    /// Emit this event through `tracing` as a structured line.
    pub fn emit(&self) {
        let json = serde_json::to_string(self).unwrap_or_default();
        match self {
            Self::Disconnected { .. }
            | Self::TransportUnavailable { .. }
            | Self::ServerError { .. }
            | Self::ProtocolWarning { .. } => {
                tracing::warn!(client_event = %json, "puente_event");
            }
            _ => tracing::info!(client_event = %json, "puente_event"),
        }
    }
}

/// Where client activity is delivered.
///
/// Publishing happens on the engine task, so implementations must not
/// block for long.
#[async_trait::async_trait]
pub trait EventSink: Send + Sync + 'static {
    async fn publish(&self, event: ClientEvent);
}

/// Default sink: forwards every event to `tracing`.
pub struct TracingSink;

#[async_trait::async_trait]
impl EventSink for TracingSink {
    async fn publish(&self, event: ClientEvent) {
        event.emit();
    }
}

/// Buffers events on an mpsc channel for tests and embedders that render
/// their own feed.
pub struct ChannelSink {
    tx: mpsc::Sender<ClientEvent>,
}

impl ChannelSink {
    pub fn new(capacity: usize) -> (Arc<Self>, mpsc::Receiver<ClientEvent>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Arc::new(Self { tx }), rx)
    }
}

#[async_trait::async_trait]
impl EventSink for ChannelSink {
    async fn publish(&self, event: ClientEvent) {
        // Slow consumers lose events rather than stalling the engine.
        let _ = self.tx.try_send(event);
    }
}

/// Display label for a wire priority ordinal.
pub fn priority_label(priority: u8) -> String {
    match priority {
        1 => "P1 (critical)".into(),
        2 => "P2 (high)".into(),
        3 => "P3 (medium)".into(),
        4 => "P4 (low)".into(),
        5 => "P5 (very low)".into(),
        other => format!("P{other}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_serialize_with_tag() {
        let event = ClientEvent::WaitingForTurn {
            id: 3,
            message: "bridge occupied".into(),
        };
        let json: serde_json::Value =
            serde_json::from_str(&serde_json::to_string(&event).unwrap()).unwrap();
        assert_eq!(json["event"], "WaitingForTurn");
        assert_eq!(json["id"], 3);
    }

    #[test]
    fn priority_labels() {
        assert_eq!(priority_label(1), "P1 (critical)");
        assert_eq!(priority_label(5), "P5 (very low)");
        assert_eq!(priority_label(9), "P9");
    }

    #[tokio::test]
    async fn channel_sink_drops_when_full() {
        let (sink, mut rx) = ChannelSink::new(1);
        sink.publish(ClientEvent::TransitFinished { id: 1 }).await;
        sink.publish(ClientEvent::TransitFinished { id: 2 }).await;
        assert!(matches!(
            rx.recv().await,
            Some(ClientEvent::TransitFinished { id: 1 })
        ));
        assert!(rx.try_recv().is_err());
    }
}
