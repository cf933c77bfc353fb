// Time Provider Port (for testability)

/// Time provider interface (allows mocking in tests)
pub trait TimeProvider: Send + Sync {
    /// Get current time in milliseconds since epoch
    fn now_millis(&self) -> i64;
}

/// System time provider (production)
pub struct SystemTimeProvider;

impl TimeProvider for SystemTimeProvider {
    fn now_millis(&self) -> i64 {
        chrono::Utc::now().timestamp_millis()
    }
}

/// Clock that advances one millisecond per reading, so creation order is total
pub struct TickingTimeProvider {
    now: std::sync::atomic::AtomicI64,
}

impl TickingTimeProvider {
    pub fn starting_at(millis: i64) -> Self {
        Self {
            now: std::sync::atomic::AtomicI64::new(millis),
        }
    }
}

impl TimeProvider for TickingTimeProvider {
    fn now_millis(&self) -> i64 {
        self.now.fetch_add(1, std::sync::atomic::Ordering::SeqCst)
    }
}
