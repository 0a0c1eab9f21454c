use std::time::Duration;

use rand::Rng;

use crate::config::DownloadSection;

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub min_backoff: Duration,
    pub max_backoff: Duration,
    pub factor: f64,
    pub jitter: Duration,
}

#[derive(Debug, Clone)]
pub struct RetryOutcome<T> {
    pub result: T,
    pub attempts: u32,
}

impl RetryPolicy {
    pub fn new(config: &DownloadSection) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            min_backoff: config.min_backoff(),
            max_backoff: config.max_backoff(),
            factor: config.backoff_factor.max(1.0),
            jitter: Duration::from_secs(config.jitter_seconds),
        }
    }

    pub fn fixed(max_attempts: u32, backoff: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            min_backoff: backoff,
            max_backoff: backoff,
            factor: 1.0,
            jitter: Duration::ZERO,
        }
    }

    /// Wait before retry number `retry` (1-based). Never below `min_backoff`.
    pub fn delay_for_retry(&self, retry: u32) -> Duration {
        let exponent = retry.saturating_sub(1).min(16) as i32;
        let scaled = self.min_backoff.as_secs_f64() * self.factor.powi(exponent);
        let capped = scaled.min(self.max_backoff.as_secs_f64());
        let base = Duration::from_secs_f64(capped).max(self.min_backoff);
        if self.jitter.is_zero() {
            base
        } else {
            let jitter_ms = rand::thread_rng().gen_range(0..=self.jitter.as_millis() as u64);
            base + Duration::from_millis(jitter_ms)
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(&DownloadSection::default())
    }
}
