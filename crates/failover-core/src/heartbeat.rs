// # Heartbeat
//
// The only state shared between the engine loop and the liveness probe.
// The engine writes one timestamp per completed cycle; the probe only
// reads it.

use chrono::{DateTime, TimeZone, Utc};
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Duration;

/// Cloneable handle over the last completed-cycle timestamp
#[derive(Debug, Clone)]
pub struct Heartbeat {
    last_millis: Arc<AtomicI64>,
}

impl Heartbeat {
    /// Create a heartbeat seeded with the current time
    ///
    /// The probe reports healthy while the first cycle is still running.
    pub fn new() -> Self {
        Self::starting_at(Utc::now())
    }

    /// Create a heartbeat seeded with a given time
    pub fn starting_at(at: DateTime<Utc>) -> Self {
        Self {
            last_millis: Arc::new(AtomicI64::new(at.timestamp_millis())),
        }
    }

    /// Record a completed cycle now
    pub fn beat(&self) {
        self.beat_at(Utc::now());
    }

    /// Record a completed cycle at a given time
    pub fn beat_at(&self, at: DateTime<Utc>) {
        self.last_millis.store(at.timestamp_millis(), Ordering::Release);
    }

    /// Timestamp of the last completed cycle
    pub fn last(&self) -> DateTime<Utc> {
        let millis = self.last_millis.load(Ordering::Acquire);
        Utc.timestamp_millis_opt(millis)
            .single()
            .unwrap_or(DateTime::<Utc>::MIN_UTC)
    }

    /// Whether the loop completed a cycle within two poll intervals of `now`
    pub fn is_alive_at(&self, now: DateTime<Utc>, poll_interval: Duration) -> bool {
        let window = chrono::Duration::from_std(poll_interval * 2)
            .unwrap_or(chrono::Duration::MAX);
        now.signed_duration_since(self.last()) < window
    }

    /// Whether the loop completed a cycle within two poll intervals
    pub fn is_alive(&self, poll_interval: Duration) -> bool {
        self.is_alive_at(Utc::now(), poll_interval)
    }
}

impl Default for Heartbeat {
    fn default() -> Self {
        Self::new()
    }
}
