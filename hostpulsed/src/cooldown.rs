use crate::types::MetricKey;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use std::time::{Duration, Instant};

pub const DEFAULT_WINDOW: Duration = Duration::from_secs(300);

/// Per-key alert gate. A key that fired at `T` stays closed until strictly
/// after `T + window`; a key never seen is open.
///
/// The check and the timestamp update happen under the shard lock of the
/// key's map entry, so two concurrent breaches of the same key cannot both
/// pass. Distinct keys do not contend.
pub struct CooldownTracker {
    window: Duration,
    last_alert: DashMap<MetricKey, Instant>,
}

impl CooldownTracker {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            last_alert: DashMap::new(),
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    pub fn try_acquire(&self, key: &MetricKey) -> bool {
        self.try_acquire_at(key, Instant::now())
    }

    pub fn try_acquire_at(&self, key: &MetricKey, now: Instant) -> bool {
        match self.last_alert.entry(key.clone()) {
            Entry::Vacant(slot) => {
                slot.insert(now);
                true
            }
            Entry::Occupied(mut slot) => {
                if now.saturating_duration_since(*slot.get()) > self.window {
                    slot.insert(now);
                    true
                } else {
                    false
                }
            }
        }
    }

    /// Time remaining before `key` may fire again, if it is closed.
    pub fn remaining(&self, key: &MetricKey, now: Instant) -> Option<Duration> {
        let last = *self.last_alert.get(key)?;
        let elapsed = now.saturating_duration_since(last);
        (elapsed <= self.window).then(|| self.window - elapsed)
    }
}

impl Default for CooldownTracker {
    fn default() -> Self {
        Self::new(DEFAULT_WINDOW)
    }
}
