//! Per-vehicle timers: the repeating crossing-request loop and the
//! one-shot transit task.
//!
//! Timer tasks never touch state themselves; they deliver ticks into the
//! engine's event stream, and the engine re-verifies the vehicle against
//! the registry before acting. Cancellation is cooperative: a cancelled
//! task stops at its next poll, and a tick that was already queued is
//! neutralized by those same guards.

use std::collections::HashMap;
use std::time::Duration;

use rand::Rng;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::engine::Event;

/// Simulated bridge length used to derive transit times.
pub(crate) const BRIDGE_LENGTH_KM: f64 = 0.5;

/// Cap on the uniform jitter added to every retry period.
pub(crate) const RETRY_JITTER_MAX: Duration = Duration::from_secs(5);

/// Cancellation tokens for the live timers, keyed by vehicle id.
///
/// At most one timer of each kind is live per vehicle: arming a new one
/// cancels any existing one of the same kind first.
#[derive(Default)]
pub(crate) struct TimerTable {
    retry: HashMap<u64, CancellationToken>,
    transit: HashMap<u64, CancellationToken>,
}

impl TimerTable {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Track a new request loop, cancelling any previous one for this id.
    pub(crate) fn set_retry(&mut self, id: u64, token: CancellationToken) {
        if let Some(old) = self.retry.insert(id, token) {
            old.cancel();
        }
    }

    /// Track a new transit one-shot, cancelling any previous one for this id.
    pub(crate) fn set_transit(&mut self, id: u64, token: CancellationToken) {
        if let Some(old) = self.transit.insert(id, token) {
            old.cancel();
        }
    }

    pub(crate) fn cancel_retry(&mut self, id: u64) {
        if let Some(token) = self.retry.remove(&id) {
            token.cancel();
        }
    }

    pub(crate) fn cancel_transit(&mut self, id: u64) {
        if let Some(token) = self.transit.remove(&id) {
            token.cancel();
        }
    }

    /// Cancel both timer kinds for one vehicle.
    pub(crate) fn cancel_vehicle(&mut self, id: u64) {
        self.cancel_retry(id);
        self.cancel_transit(id);
    }

    /// Cancel everything for every vehicle (reset and shutdown paths).
    pub(crate) fn cancel_all(&mut self) {
        for (_, token) in self.retry.drain() {
            token.cancel();
        }
        for (_, token) in self.transit.drain() {
            token.cancel();
        }
    }

    pub(crate) fn has_retry(&self, id: u64) -> bool {
        self.retry.contains_key(&id)
    }

    pub(crate) fn has_transit(&self, id: u64) -> bool {
        self.transit.contains_key(&id)
    }

    pub(crate) fn live_count(&self) -> usize {
        self.retry.len() + self.transit.len()
    }
}

/// Retry period for one arming: the vehicle's configured wait plus a
/// uniform jitter draw, so many vehicles do not tick in lockstep.
pub(crate) fn jittered_period(wait_secs: f64, jitter_max_secs: f64) -> Duration {
    let jitter = if jitter_max_secs > 0.0 {
        rand::thread_rng().gen_range(0.0..jitter_max_secs)
    } else {
        0.0
    };
    Duration::from_secs_f64((wait_secs + jitter).max(0.01))
}

/// Time to physically cross the bridge at the given speed.
pub(crate) fn transit_duration(bridge_length_km: f64, speed_kmh: f64) -> Duration {
    let hours = bridge_length_km / speed_kmh.max(0.001);
    Duration::from_secs_f64(hours * 3600.0)
}

/// Spawn the repeating request loop. Delivers one tick per period until
/// cancelled or the engine goes away.
pub(crate) fn spawn_retry_loop(
    id: u64,
    period: Duration,
    events: mpsc::Sender<Event>,
    cancel: CancellationToken,
) {
    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(period) => {
                    if events.send(Event::RetryTick(id)).await.is_err() {
                        break;
                    }
                }
            }
        }
    });
}

/// Spawn the one-shot transit completion.
pub(crate) fn spawn_transit(
    id: u64,
    duration: Duration,
    events: mpsc::Sender<Event>,
    cancel: CancellationToken,
) {
    tokio::spawn(async move {
        tokio::select! {
            _ = cancel.cancelled() => {}
            _ = tokio::time::sleep(duration) => {
                let _ = events.send(Event::TransitElapsed(id)).await;
            }
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transit_duration_matches_speed_and_length() {
        // 0.5 km at 60 km/h is 30 seconds on the bridge.
        assert_eq!(transit_duration(0.5, 60.0), Duration::from_secs(30));
        assert_eq!(transit_duration(0.5, 1800.0), Duration::from_secs(1));
    }

    #[test]
    fn transit_duration_survives_zero_speed() {
        // Clamped rather than dividing by zero.
        let duration = transit_duration(0.5, 0.0);
        assert!(duration > Duration::from_secs(0));
    }

    #[test]
    fn jittered_period_stays_in_bounds() {
        for _ in 0..100 {
            let period = jittered_period(2.0, 5.0);
            assert!(period >= Duration::from_secs(2));
            assert!(period < Duration::from_secs(7));
        }
    }

    #[test]
    fn jittered_period_without_jitter_is_exact() {
        assert_eq!(jittered_period(2.0, 0.0), Duration::from_secs(2));
    }

    #[test]
    fn arming_twice_cancels_the_first_loop() {
        let mut timers = TimerTable::new();
        let first = CancellationToken::new();
        let second = CancellationToken::new();
        timers.set_retry(1, first.clone());
        timers.set_retry(1, second.clone());
        assert!(first.is_cancelled());
        assert!(!second.is_cancelled());
        assert_eq!(timers.live_count(), 1);
    }

    #[test]
    fn cancel_vehicle_clears_both_kinds() {
        let mut timers = TimerTable::new();
        let retry = CancellationToken::new();
        let transit = CancellationToken::new();
        timers.set_retry(1, retry.clone());
        timers.set_transit(1, transit.clone());
        timers.cancel_vehicle(1);
        assert!(retry.is_cancelled());
        assert!(transit.is_cancelled());
        assert_eq!(timers.live_count(), 0);
        assert!(!timers.has_retry(1));
        assert!(!timers.has_transit(1));
    }

    #[test]
    fn cancel_all_drains_every_vehicle() {
        let mut timers = TimerTable::new();
        let tokens: Vec<CancellationToken> = (0..4).map(|_| CancellationToken::new()).collect();
        timers.set_retry(1, tokens[0].clone());
        timers.set_retry(2, tokens[1].clone());
        timers.set_transit(1, tokens[2].clone());
        timers.set_transit(3, tokens[3].clone());
        timers.cancel_all();
        assert!(tokens.iter().all(|t| t.is_cancelled()));
        assert_eq!(timers.live_count(), 0);
    }
}
