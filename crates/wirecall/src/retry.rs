//! Adaptive per-attempt timeouts.
//!
//! Each handshake operation runs under a total budget and retries its
//! whole sequence until that budget expires. Inside an attempt, the
//! small header and acknowledgement transfers use short timeouts that
//! start at 2 ms and grow between attempts, so two peers whose loops
//! have drifted out of phase cannot livelock retrying at exactly the
//! same cadence. The active side escalates geometrically; the passive
//! side escalates additively so it stays responsive to a fresh request.

use std::time::{Duration, Instant};

/// Initial value of both short timeouts at the start of an operation.
pub(crate) const SHORT_TIMEOUT_RESET: Duration = Duration::from_millis(2);

/// Tracks a total operation budget.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Deadline {
    end: Instant,
}

impl Deadline {
    pub fn after(total: Duration) -> Self {
        Self {
            end: Instant::now() + total,
        }
    }

    pub fn expired(&self) -> bool {
        Instant::now() >= self.end
    }

    /// Budget left; doubles as the "long" timeout for bulk transfers.
    pub fn remaining(&self) -> Duration {
        self.end.saturating_duration_since(Instant::now())
    }
}

/// Short-timeout pair carried across the retries of one operation.
#[derive(Debug, Clone, Copy)]
pub(crate) struct RetryTimers {
    pub put_short: Duration,
    pub get_short: Duration,
}

impl RetryTimers {
    pub fn start() -> Self {
        Self {
            put_short: SHORT_TIMEOUT_RESET,
            get_short: SHORT_TIMEOUT_RESET,
        }
    }

    /// Master-side escalation: grow by half, capped at the total budget.
    pub fn grow_geometric(&mut self, total: Duration) {
        self.put_short = (self.put_short * 3 / 2).min(total);
        self.get_short = (self.get_short * 3 / 2).min(total);
    }

    /// Slave-side escalation: one extra millisecond per failed attempt.
    pub fn grow_additive(&mut self, total: Duration) {
        let step = Duration::from_millis(1);
        self.put_short = (self.put_short + step).min(total);
        self.get_short = (self.get_short + step).min(total);
    }
}
