use chrono::{DateTime, Utc};

/// Source of "now" for stamping and the recall window.
///
/// All timestamps are UTC so send and recall compare on the same scale
/// regardless of the host timezone.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock in UTC, truncated to whole milliseconds to match what the
/// store keeps.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        let now = Utc::now();
        DateTime::from_timestamp_millis(now.timestamp_millis()).unwrap_or(now)
    }
}
