//! In-memory vehicle registry.
//!
//! The single source of truth for which vehicles this client still cares
//! about: a vehicle is present exactly while the client has outstanding
//! interest in it (no terminal notice yet, not wiped by a reset). Only the
//! engine task writes lifecycle fields; everything else reads through it.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use puente_protocol::{Direction, VehicleInfo};

/// Lifecycle of a locally-tracked vehicle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    /// Confirmed by the authority; the request loop is not yet armed.
    Registered,
    /// Polling for permission to cross.
    Requesting,
    /// On the bridge; the transit timer is armed.
    Crossing,
    /// Finished a lap, back at the tail of the queue.
    Requeued,
}

/// A vehicle this client registered and still tracks.
#[derive(Debug, Clone)]
pub struct Vehicle {
    pub id: u64,
    pub name: String,
    pub speed_kmh: f64,
    /// Seconds between crossing-request retries, before jitter.
    pub wait_interval_secs: f64,
    pub direction: Direction,
    /// 1 = most urgent, 5 = least.
    pub priority: u8,
    pub laps_total: u32,
    pub laps_completed: u32,
    pub state: LifecycleState,
    pub registered_at: DateTime<Utc>,
}

impl Vehicle {
    /// Build the local record from the authority's confirmation payload.
    pub fn from_wire(info: &VehicleInfo) -> Self {
        Self {
            id: info.id,
            name: info.nombre.clone(),
            speed_kmh: info.velocidad,
            wait_interval_secs: info.tiempo_espera,
            direction: info.direccion,
            priority: info.prioridad,
            laps_total: info.laps_total(),
            laps_completed: info.laps_completed(),
            state: LifecycleState::Registered,
            registered_at: Utc::now(),
        }
    }

    /// Fold an updated wire payload into the record. The authority omits
    /// some fields on some message kinds; absent or zeroed fields must not
    /// clobber known values.
    pub fn update_from_wire(&mut self, info: &VehicleInfo) {
        if !info.nombre.is_empty() {
            self.name = info.nombre.clone();
        }
        if info.velocidad > 0.0 {
            self.speed_kmh = info.velocidad;
        }
        if info.tiempo_espera > 0.0 {
            self.wait_interval_secs = info.tiempo_espera;
        }
        self.direction = info.direccion;
        self.priority = info.prioridad;
        if let Some(total) = info.vueltas_totales {
            self.laps_total = total.max(1);
        }
        if let Some(done) = info.cruzadas {
            self.laps_completed = done.min(self.laps_total);
        } else if let Some(remaining) = info.vueltas {
            self.laps_completed = self.laps_total.saturating_sub(remaining);
        }
    }

    pub fn laps_remaining(&self) -> u32 {
        self.laps_total.saturating_sub(self.laps_completed)
    }
}

/// Vehicle-id keyed map. No operation panics; absence is a lookup miss.
#[derive(Default)]
pub struct VehicleRegistry {
    vehicles: HashMap<u64, Vehicle>,
}

impl VehicleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite by id.
    pub fn upsert(&mut self, vehicle: Vehicle) {
        self.vehicles.insert(vehicle.id, vehicle);
    }

    pub fn remove(&mut self, id: u64) -> Option<Vehicle> {
        self.vehicles.remove(&id)
    }

    pub fn has(&self, id: u64) -> bool {
        self.vehicles.contains_key(&id)
    }

    pub fn get(&self, id: u64) -> Option<&Vehicle> {
        self.vehicles.get(&id)
    }

    pub fn get_mut(&mut self, id: u64) -> Option<&mut Vehicle> {
        self.vehicles.get_mut(&id)
    }

    pub fn clear(&mut self) {
        self.vehicles.clear();
    }

    pub fn len(&self) -> usize {
        self.vehicles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vehicles.is_empty()
    }

    /// All tracked ids, sorted for deterministic iteration.
    pub fn ids(&self) -> Vec<u64> {
        let mut ids: Vec<u64> = self.vehicles.keys().copied().collect();
        ids.sort_unstable();
        ids
    }
}
