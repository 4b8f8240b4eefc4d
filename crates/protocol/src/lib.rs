//! Bridge protocol: WebSocket message types exchanged with the crossing
//! authority.
//!
//! The authority owns the wire contract, so the envelope tags and payload
//! field names are kept exactly as it defines them (`registrar_auto`,
//! `solicitar_cruce`, ...). Everything is a `{type, ...}` JSON envelope;
//! both directions are modeled as internally-tagged serde enums.

use serde::{Deserialize, Serialize};

/// Travel direction across the single-lane bridge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    /// Wire value `"N"`.
    #[serde(rename = "N")]
    NorthToSouth,
    /// Wire value `"S"`.
    #[serde(rename = "S")]
    SouthToNorth,
}

impl Direction {
    /// Human-readable label used in log output.
    pub fn label(&self) -> &'static str {
        match self {
            Self::NorthToSouth => "north to south",
            Self::SouthToNorth => "south to north",
        }
    }
}

/// Registration request payload. The authority assigns the id, so none is
/// supplied here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VehicleSpec {
    pub nombre: String,
    /// Speed in km/h, used by the client to simulate transit time.
    pub velocidad: f64,
    /// Seconds between crossing-request retries.
    pub tiempo_espera: f64,
    pub direccion: Direction,
    /// 1 = most urgent, 5 = least.
    pub prioridad: u8,
    /// Total laps requested.
    pub vueltas: u32,
}

/// A vehicle as the authority describes it. Payloads differ slightly per
/// message kind (registration carries totals, requeue carries the remaining
/// lap count), so the lap fields are optional on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VehicleInfo {
    pub id: u64,
    #[serde(default)]
    pub nombre: String,
    pub direccion: Direction,
    #[serde(default)]
    pub velocidad: f64,
    #[serde(default)]
    pub tiempo_espera: f64,
    #[serde(default = "default_priority")]
    pub prioridad: u8,
    /// Laps still to run (present on `auto_regreso_cola`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vueltas: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vueltas_totales: Option<u32>,
    /// Laps already completed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cruzadas: Option<u32>,
}

fn default_priority() -> u8 {
    5
}

impl VehicleInfo {
    /// Total laps, falling back to the remaining count or 1 when the
    /// authority omits the field.
    pub fn laps_total(&self) -> u32 {
        self.vueltas_totales.or(self.vueltas).unwrap_or(1).max(1)
    }

    /// Completed laps, derived from the remaining count when `cruzadas` is
    /// absent.
    pub fn laps_completed(&self) -> u32 {
        if let Some(done) = self.cruzadas {
            return done;
        }
        match self.vueltas {
            Some(remaining) => self.laps_total().saturating_sub(remaining),
            None => 0,
        }
    }
}

/// Grant/denial payload of `respuesta_cruce`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrossingOutcome {
    /// Absent when the authority could not resolve the vehicle.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auto_id: Option<u64>,
    pub permiso: bool,
    #[serde(default)]
    pub mensaje: String,
}

/// Authoritative full-state listing, pushed on connect and after every
/// scheduling change.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(default)]
    pub autos_en_puente: Vec<VehicleInfo>,
    #[serde(default)]
    pub autos_esperando: Vec<VehicleInfo>,
    #[serde(default)]
    pub total_autos: u32,
}

/// Client → authority envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ClientMessage {
    /// Request registration; the authority replies with `auto_registrado`.
    #[serde(rename = "registrar_auto")]
    RegisterVehicle { auto: VehicleSpec },

    /// Ask for permission to cross now.
    #[serde(rename = "solicitar_cruce")]
    RequestCrossing { auto_id: u64 },

    /// Simulated physical transit has completed.
    #[serde(rename = "finalizar_cruce")]
    FinishCrossing { auto_id: u64 },

    /// Ask the authority for a full system reset.
    #[serde(rename = "resetear_sistema")]
    ResetSystem {},
}

impl ClientMessage {
    /// The envelope tag this message serializes with.
    pub fn wire_type(&self) -> &'static str {
        match self {
            Self::RegisterVehicle { .. } => "registrar_auto",
            Self::RequestCrossing { .. } => "solicitar_cruce",
            Self::FinishCrossing { .. } => "finalizar_cruce",
            Self::ResetSystem {} => "resetear_sistema",
        }
    }
}

/// Authority → client envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ServerMessage {
    /// Full snapshot sent right after the connection opens.
    #[serde(rename = "estado_inicial")]
    InitialState { data: Snapshot },

    /// Full snapshot pushed after a scheduling change.
    #[serde(rename = "estado_actualizado")]
    StateUpdated { estado: Snapshot },

    /// Registration confirmed; `auto` now carries the assigned id.
    #[serde(rename = "auto_registrado")]
    VehicleRegistered { auto: VehicleInfo },

    /// Grant or denial of a crossing request.
    #[serde(rename = "respuesta_cruce")]
    CrossingReply { data: CrossingOutcome },

    /// A vehicle has begun crossing; the bridge is occupied.
    #[serde(rename = "auto_cruzando")]
    VehicleCrossing { auto: VehicleInfo },

    /// All laps done; the vehicle left the system.
    #[serde(rename = "auto_salio")]
    VehicleFinished { auto: VehicleInfo },

    /// One lap done, more remain; requeued at the tail.
    #[serde(rename = "auto_regreso_cola")]
    VehicleRequeued { auto: VehicleInfo },

    /// Authority-initiated full reset.
    #[serde(rename = "reset_sistema")]
    SystemReset {},

    /// Non-fatal server-side error.
    #[serde(rename = "error")]
    ServerError { message: String },

    /// Catch-all for tags this client does not know. Logged and dropped.
    #[serde(other)]
    Unknown,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec() -> VehicleSpec {
        VehicleSpec {
            nombre: "Auto_1234".into(),
            velocidad: 60.0,
            tiempo_espera: 2.0,
            direccion: Direction::NorthToSouth,
            prioridad: 3,
            vueltas: 2,
        }
    }

    #[test]
    fn register_vehicle_wire_shape() {
        let msg = ClientMessage::RegisterVehicle { auto: spec() };
        let json: serde_json::Value =
            serde_json::from_str(&serde_json::to_string(&msg).unwrap()).unwrap();
        assert_eq!(json["type"], "registrar_auto");
        assert_eq!(json["auto"]["nombre"], "Auto_1234");
        assert_eq!(json["auto"]["direccion"], "N");
        assert_eq!(json["auto"]["prioridad"], 3);
        assert_eq!(json["auto"]["vueltas"], 2);
    }

    #[test]
    fn request_crossing_wire_shape() {
        let msg = ClientMessage::RequestCrossing { auto_id: 1 };
        assert_eq!(
            serde_json::to_string(&msg).unwrap(),
            r#"{"type":"solicitar_cruce","auto_id":1}"#
        );
    }

    #[test]
    fn finish_crossing_wire_shape() {
        let msg = ClientMessage::FinishCrossing { auto_id: 7 };
        assert_eq!(
            serde_json::to_string(&msg).unwrap(),
            r#"{"type":"finalizar_cruce","auto_id":7}"#
        );
    }

    #[test]
    fn reset_wire_shape() {
        let msg = ClientMessage::ResetSystem {};
        assert_eq!(
            serde_json::to_string(&msg).unwrap(),
            r#"{"type":"resetear_sistema"}"#
        );
    }

    #[test]
    fn crossing_reply_grant() {
        let raw = r#"{"type":"respuesta_cruce","data":{"auto_id":1,"permiso":true,"mensaje":"Auto 1 puede cruzar el puente"}}"#;
        match serde_json::from_str::<ServerMessage>(raw).unwrap() {
            ServerMessage::CrossingReply { data } => {
                assert_eq!(data.auto_id, Some(1));
                assert!(data.permiso);
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn crossing_reply_denial_without_id() {
        // The authority omits auto_id when it cannot resolve the vehicle.
        let raw = r#"{"type":"respuesta_cruce","data":{"permiso":false,"mensaje":"Auto no encontrado"}}"#;
        match serde_json::from_str::<ServerMessage>(raw).unwrap() {
            ServerMessage::CrossingReply { data } => {
                assert_eq!(data.auto_id, None);
                assert!(!data.permiso);
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn snapshot_fields_default_when_missing() {
        let raw = r#"{"type":"estado_inicial","data":{}}"#;
        match serde_json::from_str::<ServerMessage>(raw).unwrap() {
            ServerMessage::InitialState { data } => {
                assert!(data.autos_esperando.is_empty());
                assert!(data.autos_en_puente.is_empty());
                assert_eq!(data.total_autos, 0);
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn updated_snapshot_uses_estado_key() {
        let raw = r#"{"type":"estado_actualizado","estado":{"autos_esperando":[{"id":2,"nombre":"B","direccion":"S","velocidad":40.0}],"autos_en_puente":[],"total_autos":1}}"#;
        match serde_json::from_str::<ServerMessage>(raw).unwrap() {
            ServerMessage::StateUpdated { estado } => {
                assert_eq!(estado.total_autos, 1);
                assert_eq!(estado.autos_esperando[0].id, 2);
                assert_eq!(estado.autos_esperando[0].direccion, Direction::SouthToNorth);
                // Absent lap fields fall back to sane values.
                assert_eq!(estado.autos_esperando[0].laps_total(), 1);
                assert_eq!(estado.autos_esperando[0].prioridad, 5);
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn requeued_vehicle_lap_accounting() {
        let raw = r#"{"type":"auto_regreso_cola","auto":{"id":1,"nombre":"A","direccion":"N","velocidad":60.0,"vueltas":1,"vueltas_totales":3,"cruzadas":2}}"#;
        match serde_json::from_str::<ServerMessage>(raw).unwrap() {
            ServerMessage::VehicleRequeued { auto } => {
                assert_eq!(auto.laps_total(), 3);
                assert_eq!(auto.laps_completed(), 2);
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn lap_accounting_without_cruzadas() {
        let raw = r#"{"id":1,"direccion":"N","vueltas":1,"vueltas_totales":2}"#;
        let auto: VehicleInfo = serde_json::from_str(raw).unwrap();
        assert_eq!(auto.laps_total(), 2);
        assert_eq!(auto.laps_completed(), 1);
    }

    #[test]
    fn bare_reset_deserializes() {
        let msg: ServerMessage = serde_json::from_str(r#"{"type":"reset_sistema"}"#).unwrap();
        assert!(matches!(msg, ServerMessage::SystemReset {}));
    }

    #[test]
    fn unknown_tag_maps_to_catch_all() {
        let msg: ServerMessage =
            serde_json::from_str(r#"{"type":"telemetria","data":{}}"#).unwrap();
        assert!(matches!(msg, ServerMessage::Unknown));
    }
}
