//! Job-key dedupe and retry-backoff pure functions (§4.7).

use crate::config::WorkerConfig;
use chrono::{DateTime, Utc};

/// `disconnect-<username>-<id>` (§4.7): dedupes re-enqueued rows for the
/// same queue item across worker ticks.
pub fn job_key(username: &str, id: i64) -> String {
    format!("disconnect-{username}-{id}")
}

/// Whether a job with `retry_count` prior failures, last attempted at
/// `last_attempt` (if ever), is due to be retried now.
pub fn is_due(retry_count: i32, last_attempt: Option<DateTime<Utc>>, now: DateTime<Utc>, config: &WorkerConfig) -> bool {
    let Some(last_attempt) = last_attempt else {
        return true;
    };
    let backoff = compute_backoff(retry_count, config);
    now >= last_attempt + backoff
}

/// Binary exponential backoff: `base * 2^(retry_count - 1)`, capped at
/// `backoff_max`.
pub fn compute_backoff(retry_count: i32, config: &WorkerConfig) -> chrono::Duration {
    if retry_count <= 0 {
        return chrono::Duration::zero();
    }
    let base_ms = config.backoff_base.as_millis() as u64;
    let max_ms = config.backoff_max.as_millis() as u64;
    let shift = retry_count.saturating_sub(1) as u32;
    let multiplier = 1u64.checked_shl(shift).unwrap_or(u64::MAX);
    let delay_ms = base_ms.saturating_mul(multiplier).min(max_ms);
    chrono::Duration::milliseconds(delay_ms as i64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn job_key_matches_spec_format() {
        assert_eq!(job_key("alice", 7), "disconnect-alice-7");
    }

    #[test]
    fn compute_backoff_grows_and_caps() {
        let config = WorkerConfig {
            backoff_base: std::time::Duration::from_secs(2),
            backoff_max: std::time::Duration::from_secs(10),
            ..WorkerConfig::default()
        };
        assert_eq!(compute_backoff(0, &config), chrono::Duration::zero());
        assert_eq!(compute_backoff(1, &config), chrono::Duration::seconds(2));
        assert_eq!(compute_backoff(2, &config), chrono::Duration::seconds(4));
        assert_eq!(compute_backoff(3, &config), chrono::Duration::seconds(8));
        assert_eq!(compute_backoff(10, &config), chrono::Duration::seconds(10));
    }

    #[test]
    fn is_due_with_no_prior_attempt_is_always_due() {
        let config = WorkerConfig::default();
        assert!(is_due(0, None, Utc::now(), &config));
    }

    #[test]
    fn is_due_respects_backoff_window() {
        let config = WorkerConfig {
            backoff_base: std::time::Duration::from_secs(2),
            ..WorkerConfig::default()
        };
        let now = Utc::now();
        let last_attempt = Some(now);
        assert!(!is_due(1, last_attempt, now, &config));
        assert!(is_due(1, last_attempt, now + chrono::Duration::seconds(3), &config));
    }
}
