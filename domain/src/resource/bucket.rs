use std::time::{Duration, Instant};

/// Token bucket with burst.
///
/// Holds up to `capacity` tokens and refills continuously at
/// `refill_per_sec`. A request larger than `capacity` can never be granted.
#[derive(Debug, Clone)]
pub struct TokenBucket {
    capacity: f64,
    tokens: f64,
    refill_per_sec: f64,
    last_refill: Instant,
}

impl TokenBucket {
    /// A full bucket
    pub fn new(capacity: u64, refill_per_sec: f64, now: Instant) -> Self {
        Self {
            capacity: capacity as f64,
            tokens: capacity as f64,
            refill_per_sec: refill_per_sec.max(0.0),
            last_refill: now,
        }
    }

    /// Steady `per_minute` rate with room for `burst` at once
    pub fn per_minute(per_minute: u64, burst: u64, now: Instant) -> Self {
        Self::new(burst.max(1), per_minute as f64 / 60.0, now)
    }

    pub fn capacity(&self) -> u64 {
        self.capacity as u64
    }

    fn refill(&mut self, now: Instant) {
        let elapsed = now.saturating_duration_since(self.last_refill).as_secs_f64();
        if elapsed > 0.0 {
            self.tokens = (self.tokens + elapsed * self.refill_per_sec).min(self.capacity);
            self.last_refill = now;
        }
    }

    pub fn available(&mut self, now: Instant) -> u64 {
        self.refill(now);
        self.tokens.floor() as u64
    }

    pub fn try_take(&mut self, amount: u64, now: Instant) -> bool {
        self.refill(now);
        let amount = amount as f64;
        if amount <= self.tokens {
            self.tokens -= amount;
            true
        } else {
            false
        }
    }

    /// Take regardless of balance (monitor mode); the balance may go negative
    pub fn force_take(&mut self, amount: u64, now: Instant) {
        self.refill(now);
        self.tokens -= amount as f64;
    }

    /// Return tokens that were taken but not used
    pub fn give_back(&mut self, amount: u64, now: Instant) {
        self.refill(now);
        self.tokens = (self.tokens + amount as f64).min(self.capacity);
    }

    /// How long until `amount` could be taken, or `None` if it never can
    pub fn time_until(&mut self, amount: u64, now: Instant) -> Option<Duration> {
        self.refill(now);
        let amount = amount as f64;
        if amount > self.capacity {
            return None;
        }
        if amount <= self.tokens {
            return Some(Duration::ZERO);
        }
        if self.refill_per_sec <= 0.0 {
            return None;
        }
        Some(Duration::from_secs_f64((amount - self.tokens) / self.refill_per_sec))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_burst_then_refill() {
        let t0 = Instant::now();
        // 60/min = 1 token per second, burst 5
        let mut bucket = TokenBucket::per_minute(60, 5, t0);

        assert!(bucket.try_take(5, t0));
        assert!(!bucket.try_take(1, t0));

        let t1 = t0 + Duration::from_secs(2);
        assert_eq!(bucket.available(t1), 2);
        assert!(bucket.try_take(2, t1));
        assert!(!bucket.try_take(1, t1));
    }

    #[test]
    fn test_refill_caps_at_capacity() {
        let t0 = Instant::now();
        let mut bucket = TokenBucket::per_minute(60, 3, t0);
        assert_eq!(bucket.available(t0 + Duration::from_secs(100)), 3);
    }

    #[test]
    fn test_request_over_capacity_never_fits() {
        let t0 = Instant::now();
        let mut bucket = TokenBucket::per_minute(60, 3, t0);
        assert!(!bucket.try_take(4, t0));
        assert_eq!(bucket.time_until(4, t0), None);
    }

    #[test]
    fn test_time_until() {
        let t0 = Instant::now();
        let mut bucket = TokenBucket::per_minute(60, 10, t0);
        assert!(bucket.try_take(10, t0));
        assert_eq!(bucket.time_until(3, t0), Some(Duration::from_secs(3)));
        assert_eq!(bucket.time_until(0, t0), Some(Duration::ZERO));
    }

    #[test]
    fn test_force_take_and_give_back() {
        let t0 = Instant::now();
        let mut bucket = TokenBucket::per_minute(60, 2, t0);
        bucket.force_take(5, t0);
        assert_eq!(bucket.time_until(1, t0), Some(Duration::from_secs(4)));
        bucket.give_back(10, t0);
        assert_eq!(bucket.available(t0), 2);
    }
}
