//! `puente-sim` — reference simulator client for the bridge authority.
//!
//! Connects to the authority, registers a batch of randomly generated
//! vehicles, and logs bridge activity until interrupted.
//!
//! Usage:
//!   puente-sim [vehicle-count]
//!
//! Env vars:
//!   PUENTE_WS_URL   — authority WebSocket URL
//!                     (default: ws://localhost:8000/ws/puente_app/)
//!   PUENTE_VEHICLES — vehicle count when no argument is given (default: 4)

use std::time::Duration;

use puente_client_sdk::{BridgeClient, Direction, VehicleSpec};
use rand::Rng;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let endpoint = std::env::var("PUENTE_WS_URL")
        .unwrap_or_else(|_| "ws://localhost:8000/ws/puente_app/".into());
    let count: usize = std::env::args()
        .nth(1)
        .map(|arg| arg.parse::<usize>())
        .transpose()?
        .or_else(|| {
            std::env::var("PUENTE_VEHICLES")
                .ok()
                .and_then(|v| v.parse().ok())
        })
        .unwrap_or(4);

    tracing::info!(endpoint = %endpoint, count, "starting simulator");

    let shutdown = CancellationToken::new();
    let client = BridgeClient::builder().endpoint(endpoint).build()?;
    let (handle, supervisor) = client.spawn(shutdown.clone());

    handle.wait_until_connected().await?;

    for index in 0..count {
        let spec = random_vehicle(index);
        tracing::info!(
            name = %spec.nombre,
            speed_kmh = spec.velocidad,
            laps = spec.vueltas,
            direction = spec.direccion.label(),
            "registering vehicle"
        );
        handle.register_vehicle(spec).await?;
        tokio::time::sleep(Duration::from_secs(1)).await;
    }

    // Log bridge occupancy changes until ctrl-c.
    let mut view = handle.view();
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            changed = view.changed() => {
                if changed.is_err() {
                    break;
                }
                let current = view.borrow().clone();
                match current.occupant() {
                    Some(auto) => tracing::info!(
                        occupant = %auto.nombre,
                        waiting = current.waiting.len(),
                        total = current.total,
                        "bridge occupied"
                    ),
                    None => tracing::info!(
                        waiting = current.waiting.len(),
                        total = current.total,
                        "bridge free"
                    ),
                }
            }
        }
    }

    tracing::info!("shutting down");
    shutdown.cancel();
    let _ = supervisor.await;
    Ok(())
}

/// Mirror of the original UI's "generate random vehicles" action.
fn random_vehicle(index: usize) -> VehicleSpec {
    let mut rng = rand::thread_rng();
    let prioridad = rng.gen_range(1..=5);
    let vueltas = rng.gen_range(1..=4);
    VehicleSpec {
        nombre: format!("Auto_{}_P{prioridad}_{vueltas}V", 1000 + index),
        velocidad: rng.gen_range(30.0..80.0),
        tiempo_espera: rng.gen_range(1.0..3.0),
        direccion: if rng.gen_bool(0.5) {
            Direction::NorthToSouth
        } else {
            Direction::SouthToNorth
        },
        prioridad,
        vueltas,
    }
}
