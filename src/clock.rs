use chrono::Utc;

/// Milliseconds since the Unix epoch.
pub type Millis = i64;

/// Wall-clock source. Injected so the recovery flow can be driven by a
/// manual clock in tests.
pub trait Clock: Send + Sync {
    fn now_millis(&self) -> Millis;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> Millis {
        Utc::now().timestamp_millis()
    }
}
