use async_trait::async_trait;
use std::fmt;
use std::time::Duration;

/// Identifies one seat on one persisted schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SeatKey {
    pub schedule_id: i64,
    pub seat_number: i32,
}

impl SeatKey {
    pub fn new(schedule_id: i64, seat_number: i32) -> Self {
        Self { schedule_id, seat_number }
    }

    pub fn lock_key(&self) -> String {
        format!("lock:seat:{}:{}", self.schedule_id, self.seat_number)
    }
}

impl fmt::Display for SeatKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.lock_key())
    }
}

/// Result of a set-if-absent attempt. An unreachable backend is an ordinary
/// outcome here, not an error: the caller decides how to degrade.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockOutcome {
    Acquired,
    /// Someone else holds a live lock on the key.
    Held,
    BackendDown,
}

#[derive(Debug, thiserror::Error)]
pub enum LockError {
    #[error("Lock backend unavailable: {0}")]
    Unavailable(String),
}

/// Short-lived, best-effort seat hold. The store stays the authority on who
/// owns a seat; this only serializes concurrent attempts in front of it.
#[async_trait]
pub trait SeatLocker: Send + Sync {
    async fn try_acquire(&self, key: &SeatKey, ttl: Duration) -> LockOutcome;

    async fn release(&self, key: &SeatKey) -> Result<(), LockError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lock_key_format() {
        let key = SeatKey::new(42, 5);
        assert_eq!(key.lock_key(), "lock:seat:42:5");
        assert_eq!(key.to_string(), "lock:seat:42:5");
    }
}
