//! Snapshot reconciliation.
//!
//! The authority's snapshots are ground truth for display: whenever one
//! arrives, the derived view is replaced wholesale and the aggregate
//! counter is overwritten, never merged field by field. Lifecycle
//! transitions stay event-driven and are never derived from snapshots, so
//! the scheduler and the reconciler cannot fight over state.

use puente_protocol::{Snapshot, VehicleInfo};
use tokio::sync::watch;

/// Derived display state. Renderers subscribe through the watch channel on
/// the client handle.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BridgeView {
    /// Vehicles currently on the bridge (at most one in practice).
    pub crossing: Vec<VehicleInfo>,
    /// Vehicles waiting for right-of-way, in authority order.
    pub waiting: Vec<VehicleInfo>,
    /// Aggregate vehicle count as the authority reports it.
    pub total: u32,
}

impl BridgeView {
    /// The vehicle currently occupying the bridge, if any.
    pub fn occupant(&self) -> Option<&VehicleInfo> {
        self.crossing.first()
    }

    pub fn is_free(&self) -> bool {
        self.crossing.is_empty()
    }
}

/// Publishes wholesale view replacements.
pub(crate) struct Reconciler {
    tx: watch::Sender<BridgeView>,
}

impl Reconciler {
    pub(crate) fn new() -> (Self, watch::Receiver<BridgeView>) {
        let (tx, rx) = watch::channel(BridgeView::default());
        (Self { tx }, rx)
    }

    /// Replace the derived state from an authoritative snapshot.
    pub(crate) fn apply_snapshot(&self, snapshot: Snapshot) {
        self.tx.send_replace(BridgeView {
            crossing: snapshot.autos_en_puente,
            waiting: snapshot.autos_esperando,
            total: snapshot.total_autos,
        });
    }

    /// Zero everything (reset path).
    pub(crate) fn clear(&self) {
        self.tx.send_replace(BridgeView::default());
    }

    pub(crate) fn current(&self) -> BridgeView {
        self.tx.borrow().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use puente_protocol::Direction;

    fn wire(id: u64) -> VehicleInfo {
        VehicleInfo {
            id,
            nombre: format!("Auto_{id}"),
            direccion: Direction::SouthToNorth,
            velocidad: 45.0,
            tiempo_espera: 1.5,
            prioridad: 2,
            vueltas: None,
            vueltas_totales: None,
            cruzadas: None,
        }
    }

    fn snapshot() -> Snapshot {
        Snapshot {
            autos_en_puente: vec![wire(1)],
            autos_esperando: vec![wire(2), wire(3)],
            total_autos: 3,
        }
    }

    #[test]
    fn snapshot_replaces_the_view() {
        let (reconciler, rx) = Reconciler::new();
        reconciler.apply_snapshot(snapshot());
        let view = rx.borrow().clone();
        assert_eq!(view.occupant().unwrap().id, 1);
        assert_eq!(view.waiting.len(), 2);
        assert_eq!(view.total, 3);
        assert!(!view.is_free());
    }

    #[test]
    fn applying_the_same_snapshot_twice_is_idempotent() {
        let (reconciler, rx) = Reconciler::new();
        reconciler.apply_snapshot(snapshot());
        let first = rx.borrow().clone();
        reconciler.apply_snapshot(snapshot());
        let second = rx.borrow().clone();
        assert_eq!(first, second);
    }

    #[test]
    fn replacement_is_wholesale_not_a_merge() {
        let (reconciler, rx) = Reconciler::new();
        reconciler.apply_snapshot(snapshot());
        // A later snapshot with fewer vehicles must not leave stale entries.
        reconciler.apply_snapshot(Snapshot {
            autos_en_puente: vec![],
            autos_esperando: vec![wire(3)],
            total_autos: 1,
        });
        let view = rx.borrow().clone();
        assert!(view.is_free());
        assert_eq!(view.waiting.len(), 1);
        assert_eq!(view.waiting[0].id, 3);
        assert_eq!(view.total, 1);
    }

    #[test]
    fn clear_zeroes_the_view() {
        let (reconciler, rx) = Reconciler::new();
        reconciler.apply_snapshot(snapshot());
        reconciler.clear();
        let view = rx.borrow().clone();
        assert_eq!(view, BridgeView::default());
        assert_eq!(reconciler.current(), BridgeView::default());
    }
}
