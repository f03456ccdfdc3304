use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

/// Usage accumulated over a fixed window that restarts once it has elapsed.
#[derive(Debug, Clone)]
pub struct UsageWindow {
    length: Duration,
    started: Instant,
    used: u64,
}

impl UsageWindow {
    pub fn new(length: Duration, now: Instant) -> Self {
        Self {
            length,
            started: now,
            used: 0,
        }
    }

    fn roll(&mut self, now: Instant) {
        if now.saturating_duration_since(self.started) >= self.length {
            self.started = now;
            self.used = 0;
        }
    }

    pub fn record(&mut self, amount: u64, now: Instant) {
        self.roll(now);
        self.used = self.used.saturating_add(amount);
    }

    pub fn used(&mut self, now: Instant) -> u64 {
        self.roll(now);
        self.used
    }

    /// Whether `amount` more would stay within `limit`
    pub fn fits(&mut self, amount: u64, limit: u64, now: Instant) -> bool {
        self.used(now).saturating_add(amount) <= limit
    }

    /// Time until the window restarts
    pub fn resets_in(&self, now: Instant) -> Duration {
        (self.started + self.length).saturating_duration_since(now)
    }
}

/// Per-minute and per-hour counters for one resource, tracked independently
#[derive(Debug, Clone)]
pub struct RollingUsage {
    pub minute: UsageWindow,
    pub hour: UsageWindow,
}

impl RollingUsage {
    pub fn new(now: Instant) -> Self {
        Self {
            minute: UsageWindow::new(Duration::from_secs(60), now),
            hour: UsageWindow::new(Duration::from_secs(3600), now),
        }
    }

    pub fn record(&mut self, amount: u64, now: Instant) {
        self.minute.record(amount, now);
        self.hour.record(amount, now);
    }

    pub fn totals(&mut self, now: Instant) -> UsageTotals {
        UsageTotals {
            last_minute: self.minute.used(now),
            last_hour: self.hour.used(now),
        }
    }
}

/// Usage in the current windows
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageTotals {
    pub last_minute: u64,
    pub last_hour: u64,
}
