//! `puente-client-sdk` — client for a remotely-arbitrated single-lane
//! bridge.
//!
//! The bridge is shared by vehicles approaching from two opposite
//! directions; a remote authority decides who may cross, applying its own
//! priority + FIFO policy. This crate is the client side of that
//! conversation: it keeps a persistent WebSocket session alive, registers
//! vehicles, polls for right-of-way without hammering the authority,
//! simulates the physical transit once a crossing is granted, and
//! reconciles its view against the authority's snapshots.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │  Your app (CLI / dashboard / embedded)                      │
//! │                                                             │
//! │   let client = BridgeClientBuilder::new()                   │
//! │       .endpoint("ws://host/ws/puente_app/")                 │
//! │       .build()?;                                            │
//! │   let (handle, supervisor) = client.spawn(shutdown);        │
//! │   handle.register_vehicle(spec).await?;                     │
//! │   let view = handle.view();        // watch channel         │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Session flow (hard-coded by the SDK)
//!
//! 1. Connect to the authority's WebSocket endpoint
//! 2. On any closure, reconnect after a fixed 5 s delay, forever
//! 3. Main loop, per vehicle:
//!    - `registrar_auto` → confirmation assigns the id
//!    - `solicitar_cruce` immediately, then on a jittered cadence
//!    - grant → simulate transit, then `finalizar_cruce`
//!    - `auto_regreso_cola` → fresh request loop for the next lap
//!    - `auto_salio` → evict; nothing further for that id
//! 4. Snapshots (`estado_inicial` / `estado_actualizado`) replace the
//!    derived view wholesale
//!
//! All mutable state lives on a single event-loop task; timers deliver
//! ticks into it and every tick is re-validated against the registry, so
//! cancellation races resolve to no-ops instead of duplicate requests.

pub mod builder;
pub mod client;
mod engine;
pub mod error;
pub mod event;
pub mod handle;
pub mod reconcile;
pub mod reconnect;
pub mod registry;
mod router;
mod scheduler;
pub mod transport;

// ── Re-exports for ergonomic imports ─────────────────────────────────

pub use builder::BridgeClientBuilder;
pub use client::BridgeClient;
pub use error::ClientError;
pub use event::{priority_label, ChannelSink, ClientEvent, EventSink, ResetOrigin, TracingSink};
pub use handle::ClientHandle;
pub use reconcile::BridgeView;
pub use reconnect::ReconnectPolicy;
pub use registry::{LifecycleState, Vehicle, VehicleRegistry};
pub use transport::ConnectionStatus;

// Re-export the wire types so embedders rarely need puente-protocol
// directly.
pub use puente_protocol::{
    ClientMessage, CrossingOutcome, Direction, ServerMessage, Snapshot, VehicleInfo, VehicleSpec,
};
