use std::time::Duration;

use rand::Rng;

/// Exponential reconnect delay: `base * 2^(attempt-1)`, capped at 8x base,
/// plus up to 10% random jitter.
pub struct Backoff {
    attempt: u32,
    base_ms: u64,
    max_attempts: Option<u32>,
}

impl Backoff {
    /// `max_attempts: None` retries forever.
    pub fn new(base_ms: u64, max_attempts: Option<u32>) -> Self {
        Self {
            attempt: 0,
            base_ms,
            max_attempts,
        }
    }

    pub fn next(&mut self) -> Duration {
        self.attempt += 1;
        let delay = self.base_ms * 2u64.pow((self.attempt - 1).min(3));
        let jitter = rand::thread_rng().gen_range(0..=delay / 10);
        Duration::from_millis(delay + jitter)
    }

    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    pub fn is_exhausted(&self) -> bool {
        self.max_attempts
            .is_some_and(|max| self.attempt >= max)
    }

    pub fn reset(&mut self) {
        self.attempt = 0;
    }
}
