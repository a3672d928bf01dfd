//! Debounce/settle timers for controller outputs
//!
//! A proposed output change only becomes the committed value once it has
//! persisted for its whole settle window. Deadlines are plain wall-clock
//! timestamps that are re-checked on every evaluation; nothing is scheduled.

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::warn;

/// Source of the current time
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Manually advanced clock, shareable between the controller and a test
#[derive(Debug, Clone)]
pub struct ManualClock {
    now: Arc<Mutex<DateTime<Utc>>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Arc::new(Mutex::new(start)),
        }
    }

    pub fn set(&self, at: DateTime<Utc>) {
        if let Ok(mut guard) = self.now.lock() {
            *guard = at;
        }
    }

    pub fn advance_secs(&self, secs: i64) {
        if let Ok(mut guard) = self.now.lock() {
            let next = TimeDelta::try_seconds(secs).and_then(|d| guard.checked_add_signed(d));
            if let Some(next) = next {
                *guard = next;
            }
        }
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        self.now.lock().map(|g| *g).unwrap_or_else(|_| Utc::now())
    }
}

/// Window of `secs` seconds, saturating at the largest representable span
pub fn window(secs: u64) -> TimeDelta {
    i64::try_from(secs)
        .ok()
        .and_then(TimeDelta::try_seconds)
        .unwrap_or(TimeDelta::MAX)
}

/// Result of a debounce evaluation
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Settled<T> {
    /// Whole seconds until the proposed value may be committed
    pub remaining_secs: u64,
    /// Value to apply this cycle
    pub value: T,
}

/// Per-output pending-commit deadlines, keyed by output name
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Debouncer {
    pending: HashMap<String, DateTime<Utc>>,
}

impl Debouncer {
    pub fn new() -> Self {
        Self::default()
    }


    /// Decide whether `new` may replace `old` for output `key` at `now`.
    ///
    /// Equal values and instant updates commit immediately and drop any
    /// pending deadline. A differing value starts the settle window on first
    /// sight and is committed once the deadline has passed, which also clears
    /// the entry.
    pub fn evaluate<T: PartialEq + Copy>(
        &mut self,
        key: &str,
        old: T,
        new: T,
        settle_secs: u64,
        instant_update: bool,
        now: DateTime<Utc>,
    ) -> Settled<T> {
        if old == new || instant_update {
            self.pending.remove(key);
            return Settled {
                remaining_secs: 0,
                value: new,
            };
        }

        let settle = window(settle_secs);
        let deadline = match self.pending.get(key) {
            Some(deadline) if *deadline - now > settle => {
                // A deadline beyond the window can only come from a clock jump
                // or a stale snapshot; start over.
                warn!(
                    "Discarding pending deadline for '{}' ({}), restarting settle window",
                    key, deadline
                );
                None
            }
            Some(deadline) => Some(*deadline),
            None => None,
        };

        match deadline {
            None => {
                match now.checked_add_signed(settle) {
                    Some(deadline) => {
                        self.pending.insert(key.to_string(), deadline);
                    }
                    None => {
                        // The window never elapses; hold without a deadline.
                        self.pending.remove(key);
                        warn!(
                            "Settle window of {}s for '{}' is out of range, holding current value",
                            settle_secs, key
                        );
                    }
                }
                Settled {
                    remaining_secs: settle_secs,
                    value: old,
                }
            }
            Some(deadline) if now >= deadline => {
                self.pending.remove(key);
                Settled {
                    remaining_secs: 0,
                    value: new,
                }
            }
            Some(deadline) => {
                let remaining = (deadline - now).num_milliseconds() as f64 / 1000.0;
                Settled {
                    remaining_secs: remaining.round().max(0.0) as u64,
                    value: old,
                }
            }
        }
    }

    /// Whether a change for `key` is waiting to settle
    pub fn is_pending(&self, key: &str) -> bool {
        self.pending.contains_key(key)
    }

    /// Snapshot of the pending deadlines
    pub fn pending(&self) -> &HashMap<String, DateTime<Utc>> {
        &self.pending
    }
}
