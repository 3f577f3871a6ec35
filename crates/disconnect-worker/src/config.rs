//! Worker tuning (§4.7): batch size, retry ceiling, backoff bounds, and the
//! polling-fallback interval used when the notification channel is down.

use std::time::Duration;

#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub batch_size: i64,
    pub max_retries: i32,
    pub backoff_base: Duration,
    pub backoff_max: Duration,
    pub poll_interval: Duration,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            batch_size: 200,
            max_retries: 5,
            backoff_base: Duration::from_secs(2),
            backoff_max: Duration::from_secs(300),
            poll_interval: Duration::from_secs(10),
        }
    }
}
