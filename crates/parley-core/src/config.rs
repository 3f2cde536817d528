use std::time::Duration;

use tracing::warn;

pub const DEFAULT_QUEUE_CAPACITY: usize = 2000;
pub const DEFAULT_FLUSH_THRESHOLD: usize = 100;
pub const DEFAULT_FLUSH_INTERVAL: Duration = Duration::from_millis(1000);
pub const DEFAULT_RECALL_WINDOW: Duration = Duration::from_millis(120_000);

/// Tunables for the batch pipeline and the recall policy.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Maximum number of messages held in memory awaiting persistence.
    pub queue_capacity: usize,
    /// Queue size at which a submit triggers an immediate flush.
    pub flush_threshold: usize,
    /// Period of the background flush timer.
    pub flush_interval: Duration,
    /// How long after send the sender may still recall.
    pub recall_window: Duration,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            flush_threshold: DEFAULT_FLUSH_THRESHOLD,
            flush_interval: DEFAULT_FLUSH_INTERVAL,
            recall_window: DEFAULT_RECALL_WINDOW,
        }
    }
}

impl PipelineConfig {
    /// Read `PARLEY_QUEUE_CAPACITY`, `PARLEY_FLUSH_THRESHOLD`,
    /// `PARLEY_FLUSH_INTERVAL_MS` and `PARLEY_RECALL_WINDOW_MS`.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let read = |key: &str, default: u64| -> u64 {
            match lookup(key) {
                Some(raw) => match raw.trim().parse::<u64>() {
                    Ok(v) if v > 0 => v,
                    _ => {
                        warn!("Ignoring invalid {}={:?}, using {}", key, raw, default);
                        default
                    }
                },
                None => default,
            }
        };

        let queue_capacity = read("PARLEY_QUEUE_CAPACITY", defaults.queue_capacity as u64) as usize;
        let flush_threshold = read("PARLEY_FLUSH_THRESHOLD", defaults.flush_threshold as u64) as usize;
        let flush_interval = Duration::from_millis(read(
            "PARLEY_FLUSH_INTERVAL_MS",
            defaults.flush_interval.as_millis() as u64,
        ));
        let recall_window = Duration::from_millis(read(
            "PARLEY_RECALL_WINDOW_MS",
            defaults.recall_window.as_millis() as u64,
        ));

        Self {
            queue_capacity,
            flush_threshold: flush_threshold.min(queue_capacity),
            flush_interval,
            recall_window,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn defaults_when_unset() {
        let cfg = PipelineConfig::from_lookup(|_| None);
        assert_eq!(cfg.queue_capacity, 2000);
        assert_eq!(cfg.flush_threshold, 100);
        assert_eq!(cfg.flush_interval, Duration::from_secs(1));
        assert_eq!(cfg.recall_window, Duration::from_secs(120));
    }

    #[test]
    fn overrides_and_bad_values() {
        let vars: HashMap<&str, &str> = [
            ("PARLEY_QUEUE_CAPACITY", "50"),
            ("PARLEY_FLUSH_THRESHOLD", "500"),
            ("PARLEY_FLUSH_INTERVAL_MS", "soon"),
            ("PARLEY_RECALL_WINDOW_MS", "60000"),
        ]
        .into_iter()
        .collect();

        let cfg = PipelineConfig::from_lookup(|k| vars.get(k).map(|v| v.to_string()));
        assert_eq!(cfg.queue_capacity, 50);
        // clamped to capacity
        assert_eq!(cfg.flush_threshold, 50);
        assert_eq!(cfg.flush_interval, DEFAULT_FLUSH_INTERVAL);
        assert_eq!(cfg.recall_window, Duration::from_secs(60));
    }
}
