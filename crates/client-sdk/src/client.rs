//! Session management: owns the WebSocket lifecycle and supervises
//! reconnection.
//!
//! One connection is live at a time and is never reused across
//! reconnects. On any closure, including a failure to open, the
//! supervisor clears the outbound gate, waits the fixed reconnect delay,
//! and tries again until the shutdown token fires.

use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use puente_protocol::ClientMessage;
use tokio::sync::{mpsc, watch};
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;

use crate::builder::BridgeClientBuilder;
use crate::engine::{Engine, Event};
use crate::event::{ClientEvent, EventSink};
use crate::handle::ClientHandle;
use crate::reconcile::Reconciler;
use crate::reconnect::ReconnectPolicy;
use crate::transport::{ConnectionStatus, Transport};

/// A fully-configured bridge client.
///
/// Create via [`BridgeClientBuilder`], then [`spawn`](Self::spawn) it to
/// get a [`ClientHandle`] for registering vehicles and observing state.
pub struct BridgeClient {
    pub(crate) endpoint: String,
    pub(crate) reconnect: ReconnectPolicy,
    pub(crate) jitter_max_secs: f64,
    pub(crate) bridge_length_km: f64,
    pub(crate) sink: Arc<dyn EventSink>,
    pub(crate) event_capacity: usize,
    pub(crate) outbound_capacity: usize,
}

impl BridgeClient {
    /// Start a new builder.
    pub fn builder() -> BridgeClientBuilder {
        BridgeClientBuilder::new()
    }

    /// Start the engine and the session supervisor. Runs until `shutdown`
    /// is cancelled; the engine tears down every timer on the way out.
    pub fn spawn(
        self,
        shutdown: CancellationToken,
    ) -> (ClientHandle, tokio::task::JoinHandle<()>) {
        let (events_tx, events_rx) = mpsc::channel(self.event_capacity);
        let (status_tx, status_rx) = watch::channel(ConnectionStatus::Connecting);
        let transport = Transport::new();
        let (reconciler, view_rx) = Reconciler::new();

        let engine = Engine::new(
            reconciler,
            transport.clone(),
            events_tx.clone(),
            self.sink.clone(),
            self.jitter_max_secs,
            self.bridge_length_km,
        );
        let engine_task = tokio::spawn(engine.run(events_rx, shutdown.child_token()));

        let handle = ClientHandle::new(events_tx.clone(), view_rx, status_rx);
        let supervisor = tokio::spawn(async move {
            self.supervise(events_tx, transport, status_tx, shutdown).await;
            let _ = engine_task.await;
        });
        (handle, supervisor)
    }

    /// Supervised retry loop: one connection lifetime per iteration, a
    /// fixed delay between iterations, no attempt cap.
    async fn supervise(
        self,
        events: mpsc::Sender<Event>,
        transport: Transport,
        status: watch::Sender<ConnectionStatus>,
        shutdown: CancellationToken,
    ) {
        let mut attempt: u32 = 0;
        loop {
            if shutdown.is_cancelled() {
                break;
            }
            status.send_replace(ConnectionStatus::Connecting);
            let result = tokio::select! {
                result = self.connect_and_pump(&events, &transport, &status) => result,
                _ = shutdown.cancelled() => break,
            };
            transport.clear();
            status.send_replace(ConnectionStatus::Closed);
            match result {
                Ok(()) => {
                    tracing::info!("session closed");
                    self.sink
                        .publish(ClientEvent::Disconnected {
                            reason: "closed by server".into(),
                        })
                        .await;
                }
                Err(error) => {
                    tracing::warn!(attempt, error = %error, "session lost");
                    self.sink
                        .publish(ClientEvent::Disconnected {
                            reason: error.to_string(),
                        })
                        .await;
                }
            }

            let delay = self.reconnect.delay_for_attempt(attempt);
            self.sink
                .publish(ClientEvent::Reconnecting {
                    delay_ms: delay.as_millis() as u64,
                })
                .await;
            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = shutdown.cancelled() => break,
            }
            attempt = attempt.wrapping_add(1);
        }
        transport.clear();
        status.send_replace(ConnectionStatus::Closed);
    }

    /// One connection lifetime: open, install the outbound gate, pump
    /// frames in arrival order until the stream ends.
    async fn connect_and_pump(
        &self,
        events: &mpsc::Sender<Event>,
        transport: &Transport,
        status: &watch::Sender<ConnectionStatus>,
    ) -> anyhow::Result<()> {
        tracing::info!(endpoint = %self.endpoint, "connecting");
        let (ws, _response) = tokio_tungstenite::connect_async(&self.endpoint).await?;
        status.send_replace(ConnectionStatus::Open);
        self.sink
            .publish(ClientEvent::Connected {
                endpoint: self.endpoint.clone(),
            })
            .await;

        let (mut ws_sink, mut ws_stream) = ws.split();
        let (outbound_tx, mut outbound_rx) =
            mpsc::channel::<ClientMessage>(self.outbound_capacity);
        transport.install(outbound_tx);

        // Writer task: serialize and send outbound messages.
        let writer = tokio::spawn(async move {
            while let Some(message) = outbound_rx.recv().await {
                let json = match serde_json::to_string(&message) {
                    Ok(json) => json,
                    Err(error) => {
                        tracing::error!(error = %error, "failed to serialize outbound message");
                        continue;
                    }
                };
                if ws_sink.send(Message::Text(json)).await.is_err() {
                    break;
                }
            }
        });

        // Reader loop: the engine sees frames strictly in arrival order.
        let result = loop {
            match ws_stream.next().await {
                Some(Ok(Message::Text(text))) => {
                    if events.send(Event::Inbound(text)).await.is_err() {
                        break Ok(());
                    }
                }
                Some(Ok(Message::Close(_))) => {
                    tracing::info!("authority closed the connection");
                    break Ok(());
                }
                Some(Ok(_)) => {}
                Some(Err(error)) => break Err(error.into()),
                None => break Ok(()),
            }
        };

        transport.clear();
        writer.abort();
        result
    }
}
