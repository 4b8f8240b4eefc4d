//! Cloneable handle for driving a running client.

use puente_protocol::VehicleSpec;
use tokio::sync::{mpsc, watch};

use crate::engine::Event;
use crate::error::ClientError;
use crate::reconcile::BridgeView;
use crate::transport::ConnectionStatus;

/// Commands and queries against a spawned
/// [`BridgeClient`](crate::BridgeClient).
#[derive(Clone)]
pub struct ClientHandle {
    events: mpsc::Sender<Event>,
    view: watch::Receiver<BridgeView>,
    status: watch::Receiver<ConnectionStatus>,
}

impl ClientHandle {
    pub(crate) fn new(
        events: mpsc::Sender<Event>,
        view: watch::Receiver<BridgeView>,
        status: watch::Receiver<ConnectionStatus>,
    ) -> Self {
        Self {
            events,
            view,
            status,
        }
    }

    /// Ask the authority to register a vehicle. The local record is
    /// created only when the confirmation arrives with the assigned id.
    pub async fn register_vehicle(&self, spec: VehicleSpec) -> Result<(), ClientError> {
        self.events
            .send(Event::Register(spec))
            .await
            .map_err(|_| ClientError::Stopped)
    }

    /// Trigger a locally-initiated full reset.
    pub async fn reset(&self) -> Result<(), ClientError> {
        self.events
            .send(Event::Reset)
            .await
            .map_err(|_| ClientError::Stopped)
    }

    /// Subscribe to the reconciled bridge view.
    pub fn view(&self) -> watch::Receiver<BridgeView> {
        self.view.clone()
    }

    /// Current session connectivity.
    pub fn status(&self) -> ConnectionStatus {
        *self.status.borrow()
    }

    /// Watch connectivity transitions.
    pub fn status_watch(&self) -> watch::Receiver<ConnectionStatus> {
        self.status.clone()
    }

    /// Wait until the session is open. Fails with
    /// [`ClientError::Stopped`] if the client shuts down first.
    pub async fn wait_until_connected(&self) -> Result<(), ClientError> {
        let mut status = self.status.clone();
        loop {
            if *status.borrow_and_update() == ConnectionStatus::Open {
                return Ok(());
            }
            status.changed().await.map_err(|_| ClientError::Stopped)?;
        }
    }
}
