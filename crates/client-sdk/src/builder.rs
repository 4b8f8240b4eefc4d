//! Builder pattern for constructing a [`BridgeClient`].

use std::sync::Arc;
use std::time::Duration;

use crate::client::BridgeClient;
use crate::error::ClientError;
use crate::event::{EventSink, TracingSink};
use crate::reconnect::ReconnectPolicy;
use crate::scheduler::{BRIDGE_LENGTH_KM, RETRY_JITTER_MAX};

/// Fluent builder for [`BridgeClient`].
///
/// # Example
///
/// ```rust,no_run
/// # use puente_client_sdk::BridgeClientBuilder;
/// # use tokio_util::sync::CancellationToken;
/// # async fn run() {
/// let client = BridgeClientBuilder::new()
///     .endpoint("ws://localhost:8000/ws/puente_app/")
///     .build()
///     .unwrap();
/// let (handle, _supervisor) = client.spawn(CancellationToken::new());
/// handle.wait_until_connected().await.unwrap();
/// # }
/// ```
pub struct BridgeClientBuilder {
    endpoint: String,
    reconnect: ReconnectPolicy,
    retry_jitter_max: Duration,
    bridge_length_km: f64,
    sink: Arc<dyn EventSink>,
    event_capacity: usize,
    outbound_capacity: usize,
}

impl BridgeClientBuilder {
    pub fn new() -> Self {
        Self {
            endpoint: String::new(),
            reconnect: ReconnectPolicy::default(),
            retry_jitter_max: RETRY_JITTER_MAX,
            bridge_length_km: BRIDGE_LENGTH_KM,
            sink: Arc::new(TracingSink),
            event_capacity: 256,
            outbound_capacity: 64,
        }
    }

    /// Authority WebSocket URL (e.g. `ws://host/ws/puente_app/`). Required.
    pub fn endpoint(mut self, url: impl Into<String>) -> Self {
        self.endpoint = url.into();
        self
    }

    /// Override the fixed delay between reconnect attempts (default 5 s).
    pub fn reconnect_delay(mut self, delay: Duration) -> Self {
        self.reconnect = ReconnectPolicy { delay };
        self
    }

    /// Cap on the uniform jitter added to each vehicle's retry period
    /// (default 5 s).
    pub fn retry_jitter_max(mut self, cap: Duration) -> Self {
        self.retry_jitter_max = cap;
        self
    }

    /// Simulated bridge length in kilometers (default 0.5).
    pub fn bridge_length_km(mut self, km: f64) -> Self {
        self.bridge_length_km = km;
        self
    }

    /// Replace the default tracing sink for client activity.
    pub fn event_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Build the [`BridgeClient`].
    pub fn build(self) -> Result<BridgeClient, ClientError> {
        if self.endpoint.is_empty() {
            return Err(ClientError::Config("endpoint is required".into()));
        }
        if !(self.bridge_length_km > 0.0) {
            return Err(ClientError::Config(
                "bridge_length_km must be positive".into(),
            ));
        }
        Ok(BridgeClient {
            endpoint: self.endpoint,
            reconnect: self.reconnect,
            jitter_max_secs: self.retry_jitter_max.as_secs_f64(),
            bridge_length_km: self.bridge_length_km,
            sink: self.sink,
            event_capacity: self.event_capacity,
            outbound_capacity: self.outbound_capacity,
        })
    }
}

impl Default for BridgeClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_is_required() {
        let result = BridgeClientBuilder::new().build();
        assert!(matches!(result, Err(ClientError::Config(_))));
    }

    #[test]
    fn defaults_match_the_authority_contract() {
        let client = BridgeClientBuilder::new()
            .endpoint("ws://localhost:8000/ws/puente_app/")
            .build()
            .unwrap();
        assert_eq!(client.reconnect.delay, Duration::from_secs(5));
        assert_eq!(client.jitter_max_secs, 5.0);
        assert_eq!(client.bridge_length_km, 0.5);
    }

    #[test]
    fn zero_bridge_length_is_rejected() {
        let result = BridgeClientBuilder::new()
            .endpoint("ws://localhost:8000/ws/puente_app/")
            .bridge_length_km(0.0)
            .build();
        assert!(matches!(result, Err(ClientError::Config(_))));
    }
}
