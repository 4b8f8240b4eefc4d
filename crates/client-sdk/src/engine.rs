//! The client engine: one event-loop task owning all mutable state.
//!
//! Every mutation of the registry, the timer table, or the derived view
//! flows through this loop as an event, so no locking is needed and every
//! timer firing is re-checked against current state before it acts.
//! Cancellation only prevents future firings; a tick that was already
//! queued behind a teardown is neutralized by the presence/completion
//! guards here.

use std::collections::HashSet;
use std::sync::Arc;

use puente_protocol::{
    ClientMessage, CrossingOutcome, ServerMessage, Snapshot, VehicleInfo, VehicleSpec,
};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::error::ClientError;
use crate::event::{priority_label, ClientEvent, EventSink, ResetOrigin};
use crate::reconcile::Reconciler;
use crate::registry::{LifecycleState, Vehicle, VehicleRegistry};
use crate::router;
use crate::scheduler::{self, TimerTable};
use crate::transport::Transport;

/// Inputs to the engine loop, processed strictly in arrival order.
#[derive(Debug)]
pub(crate) enum Event {
    /// Raw text frame from the session.
    Inbound(String),
    /// The repeating crossing-request timer fired for this vehicle.
    RetryTick(u64),
    /// The simulated transit finished for this vehicle.
    TransitElapsed(u64),
    /// Local request to register a vehicle with the authority.
    Register(VehicleSpec),
    /// Locally-initiated full reset.
    Reset,
}

pub(crate) struct Engine {
    registry: VehicleRegistry,
    timers: TimerTable,
    /// Ids whose terminal notice has arrived; guards late timer firings.
    completed: HashSet<u64>,
    /// Ids whose "waiting for turn" denial has been surfaced already.
    announced_waiting: HashSet<u64>,
    reconciler: Reconciler,
    transport: Transport,
    /// Sender side of our own event stream, handed to timer tasks.
    events_tx: mpsc::Sender<Event>,
    sink: Arc<dyn EventSink>,
    jitter_max_secs: f64,
    bridge_length_km: f64,
}

impl Engine {
    pub(crate) fn new(
        reconciler: Reconciler,
        transport: Transport,
        events_tx: mpsc::Sender<Event>,
        sink: Arc<dyn EventSink>,
        jitter_max_secs: f64,
        bridge_length_km: f64,
    ) -> Self {
        Self {
            registry: VehicleRegistry::new(),
            timers: TimerTable::new(),
            completed: HashSet::new(),
            announced_waiting: HashSet::new(),
            reconciler,
            transport,
            events_tx,
            sink,
            jitter_max_secs,
            bridge_length_km,
        }
    }

    pub(crate) async fn run(mut self, mut events: mpsc::Receiver<Event>, shutdown: CancellationToken) {
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                event = events.recv() => match event {
                    Some(event) => self.handle(event).await,
                    None => break,
                },
            }
        }
        // Leave nothing ticking behind the loop.
        self.timers.cancel_all();
    }

    async fn handle(&mut self, event: Event) {
        match event {
            Event::Inbound(raw) => self.on_frame(&raw).await,
            Event::RetryTick(id) => self.on_retry_tick(id).await,
            Event::TransitElapsed(id) => self.on_transit_elapsed(id).await,
            Event::Register(spec) => self.on_register(spec).await,
            Event::Reset => self.reset(ResetOrigin::Local).await,
        }
    }

    // ── Message router ───────────────────────────────────────────────

    async fn on_frame(&mut self, raw: &str) {
        let message = match router::decode(raw) {
            Ok(message) => message,
            Err(ClientError::UnknownType(tag)) => {
                tracing::warn!(tag = %tag, "dropping message with unrecognized type");
                self.sink
                    .publish(ClientEvent::ProtocolWarning {
                        detail: format!("unrecognized message type: {tag}"),
                    })
                    .await;
                return;
            }
            Err(error) => {
                tracing::warn!(error = %error, "dropping undecodable message");
                self.sink
                    .publish(ClientEvent::ProtocolWarning {
                        detail: error.to_string(),
                    })
                    .await;
                return;
            }
        };
        if let Err(error) = self.dispatch(message).await {
            // A failing handler is isolated to its one message.
            tracing::error!(error = %error, "message handler failed");
            self.sink
                .publish(ClientEvent::ProtocolWarning {
                    detail: error.to_string(),
                })
                .await;
        }
    }

    async fn dispatch(&mut self, message: ServerMessage) -> Result<(), ClientError> {
        match message {
            ServerMessage::InitialState { data } => self.on_snapshot(data),
            ServerMessage::StateUpdated { estado } => self.on_snapshot(estado),
            ServerMessage::VehicleRegistered { auto } => self.on_vehicle_registered(auto).await?,
            ServerMessage::CrossingReply { data } => self.on_crossing_reply(data).await,
            ServerMessage::VehicleCrossing { auto } => self.on_vehicle_crossing(auto).await,
            ServerMessage::VehicleFinished { auto } => self.on_vehicle_finished(auto).await,
            ServerMessage::VehicleRequeued { auto } => self.on_vehicle_requeued(auto).await,
            ServerMessage::SystemReset {} => self.reset(ResetOrigin::Remote).await,
            ServerMessage::ServerError { message } => {
                self.sink.publish(ClientEvent::ServerError { message }).await;
            }
            // Filtered out by the decoder; nothing to do.
            ServerMessage::Unknown => {}
        }
        Ok(())
    }

    // ── Outbound helpers ─────────────────────────────────────────────

    /// Hand a message to the session, logging and dropping it when the
    /// session is down. Returns whether the message went out.
    async fn send_or_log(&self, message: ClientMessage) -> bool {
        let action = message.wire_type();
        match self.transport.try_send(message) {
            Ok(()) => true,
            Err(error) => {
                tracing::warn!(action, error = %error, "dropping outbound message");
                self.sink
                    .publish(ClientEvent::TransportUnavailable {
                        action: action.into(),
                    })
                    .await;
                false
            }
        }
    }

    /// Send one crossing request now, if the vehicle is still in play.
    async fn request_crossing(&mut self, id: u64) {
        if !self.registry.has(id) || self.completed.contains(&id) {
            return;
        }
        self.send_or_log(ClientMessage::RequestCrossing { auto_id: id })
            .await;
    }

    // ── Crossing scheduler ───────────────────────────────────────────

    /// Arm (or re-arm) the repeating request loop for a vehicle, sending
    /// one request immediately. Arming cancels any previous loop, so two
    /// loops can never run concurrently for the same id.
    async fn start_requesting(&mut self, id: u64) {
        let wait_secs = match self.registry.get_mut(id) {
            Some(vehicle) => {
                vehicle.state = LifecycleState::Requesting;
                vehicle.wait_interval_secs
            }
            None => return,
        };
        self.request_crossing(id).await;
        let period = scheduler::jittered_period(wait_secs, self.jitter_max_secs);
        let cancel = CancellationToken::new();
        scheduler::spawn_retry_loop(id, period, self.events_tx.clone(), cancel.clone());
        self.timers.set_retry(id, cancel);
    }

    /// Arm the one-shot transit timer unless one is already live. Both the
    /// grant reply and the authority's crossing push lead here; whichever
    /// arrives first wins and the other is a no-op.
    fn start_transit(&mut self, id: u64) {
        if self.timers.has_transit(id) {
            return;
        }
        let speed_kmh = match self.registry.get(id) {
            Some(vehicle) => vehicle.speed_kmh,
            None => return,
        };
        let duration = scheduler::transit_duration(self.bridge_length_km, speed_kmh);
        let cancel = CancellationToken::new();
        scheduler::spawn_transit(id, duration, self.events_tx.clone(), cancel.clone());
        self.timers.set_transit(id, cancel);
    }

    async fn on_retry_tick(&mut self, id: u64) {
        // The loop may fire after its cancellation was issued; re-verify.
        if !self.registry.has(id) || self.completed.contains(&id) {
            self.timers.cancel_retry(id);
            return;
        }
        self.request_crossing(id).await;
    }

    async fn on_transit_elapsed(&mut self, id: u64) {
        // The one-shot is spent either way; drop its table entry.
        self.timers.cancel_transit(id);
        // A terminal notice may have raced the timer; never report a
        // finished transit for a vehicle that is gone.
        if !self.registry.has(id) || self.completed.contains(&id) {
            return;
        }
        if self
            .send_or_log(ClientMessage::FinishCrossing { auto_id: id })
            .await
        {
            self.sink.publish(ClientEvent::TransitFinished { id }).await;
        }
    }

    // ── Local commands ───────────────────────────────────────────────

    async fn on_register(&mut self, spec: VehicleSpec) {
        let name = spec.nombre.clone();
        if self
            .send_or_log(ClientMessage::RegisterVehicle { auto: spec })
            .await
        {
            self.sink
                .publish(ClientEvent::RegistrationSent { name })
                .await;
        }
    }

    // ── Vehicle lifecycle handlers ───────────────────────────────────

    async fn on_vehicle_registered(&mut self, auto: VehicleInfo) -> Result<(), ClientError> {
        if !(auto.velocidad.is_finite() && auto.velocidad > 0.0) {
            return Err(ClientError::Handler(format!(
                "vehicle {} confirmed with unusable speed {}",
                auto.id, auto.velocidad
            )));
        }
        let vehicle = Vehicle::from_wire(&auto);
        self.sink
            .publish(ClientEvent::VehicleRegistered {
                id: vehicle.id,
                name: vehicle.name.clone(),
                priority: priority_label(vehicle.priority),
                direction: vehicle.direction.label().into(),
                laps_total: vehicle.laps_total,
            })
            .await;
        // The authority may hand out an id it previously retired.
        self.completed.remove(&auto.id);
        self.registry.upsert(vehicle);
        self.start_requesting(auto.id).await;
        Ok(())
    }

    async fn on_crossing_reply(&mut self, data: CrossingOutcome) {
        let Some(id) = data.auto_id else {
            // Denials for unresolved vehicles carry no id.
            if !data.permiso {
                self.sink
                    .publish(ClientEvent::ServerError {
                        message: data.mensaje,
                    })
                    .await;
            }
            return;
        };
        if data.permiso {
            self.announced_waiting.remove(&id);
            self.timers.cancel_retry(id);
            if let Some(vehicle) = self.registry.get_mut(id) {
                vehicle.state = LifecycleState::Crossing;
            } else {
                return;
            }
            self.sink
                .publish(ClientEvent::CrossingGranted {
                    id,
                    message: data.mensaje,
                })
                .await;
            self.start_transit(id);
        } else {
            // Expected steady state while waiting for right-of-way; the
            // retry cadence is untouched. Surface it once per wait.
            if self.registry.has(id) && self.announced_waiting.insert(id) {
                self.sink
                    .publish(ClientEvent::WaitingForTurn {
                        id,
                        message: data.mensaje,
                    })
                    .await;
            }
        }
    }

    async fn on_vehicle_crossing(&mut self, auto: VehicleInfo) {
        // Broadcast notice: other clients' vehicles cross too. Only
        // vehicles in the local registry get a transit timer.
        if self.completed.contains(&auto.id) {
            return;
        }
        let (name, lap, laps_total) = match self.registry.get_mut(auto.id) {
            Some(vehicle) => {
                vehicle.update_from_wire(&auto);
                vehicle.state = LifecycleState::Crossing;
                (
                    vehicle.name.clone(),
                    vehicle.laps_completed + 1,
                    vehicle.laps_total,
                )
            }
            None => return,
        };
        self.timers.cancel_retry(auto.id);
        self.announced_waiting.remove(&auto.id);
        self.sink
            .publish(ClientEvent::VehicleCrossing {
                id: auto.id,
                name,
                lap,
                laps_total,
            })
            .await;
        self.start_transit(auto.id);
    }

    async fn on_vehicle_requeued(&mut self, auto: VehicleInfo) {
        if self.completed.contains(&auto.id) {
            return;
        }
        let (name, laps_remaining) = match self.registry.get_mut(auto.id) {
            Some(vehicle) => {
                vehicle.update_from_wire(&auto);
                vehicle.state = LifecycleState::Requeued;
                (vehicle.name.clone(), vehicle.laps_remaining())
            }
            None => return,
        };
        self.announced_waiting.remove(&auto.id);
        // A spent transit entry may linger; drop it before the next lap.
        self.timers.cancel_transit(auto.id);
        self.sink
            .publish(ClientEvent::VehicleRequeued {
                id: auto.id,
                name,
                laps_remaining,
            })
            .await;
        self.start_requesting(auto.id).await;
    }

    async fn on_vehicle_finished(&mut self, auto: VehicleInfo) {
        let id = auto.id;
        // Terminal: nothing about this id is expected or acted on again.
        self.completed.insert(id);
        self.timers.cancel_vehicle(id);
        let removed = self.registry.remove(id);
        // Vehicles still waiting may announce again now that the bridge freed.
        self.announced_waiting.clear();
        if let Some(vehicle) = removed {
            self.sink
                .publish(ClientEvent::VehicleFinished {
                    id,
                    name: vehicle.name,
                    laps_total: vehicle.laps_total,
                })
                .await;
        }
    }

    // ── Reconciler ───────────────────────────────────────────────────

    fn on_snapshot(&mut self, snapshot: Snapshot) {
        // Ground truth for display: replace wholesale, never merge.
        // Lifecycle transitions are event-driven and not touched here.
        self.reconciler.apply_snapshot(snapshot);
    }

    // ── Reset coordinator ────────────────────────────────────────────

    /// Tear down every vehicle, timer, and derived value. Local resets
    /// also ask the authority to reset, best-effort.
    async fn reset(&mut self, origin: ResetOrigin) {
        if origin == ResetOrigin::Local {
            self.send_or_log(ClientMessage::ResetSystem {}).await;
        }
        self.timers.cancel_all();
        self.registry.clear();
        self.completed.clear();
        self.announced_waiting.clear();
        self.reconciler.clear();
        self.sink
            .publish(ClientEvent::SystemReset { origin })
            .await;
    }
}
