//! # Fibonacci Backoff
//!
//! Progressive retry delays for failing reconciliations.
//!
//! Delays follow the Fibonacci sequence scaled by the minimum and are capped at
//! the maximum: with a 60s minimum the sequence is 60, 60, 120, 180, 300, 480, ...

use std::time::Duration;

/// Fibonacci backoff between a minimum and a maximum delay (seconds)
#[derive(Debug, Clone)]
pub struct FibonacciBackoff {
    min_secs: u64,
    max_secs: u64,
    previous: u64,
    current: u64,
}

impl FibonacciBackoff {
    pub fn new(min_secs: u64, max_secs: u64) -> Self {
        let min_secs = min_secs.max(1);
        Self {
            min_secs,
            max_secs: max_secs.max(min_secs),
            previous: 0,
            current: 1,
        }
    }

    /// Delay for the next retry, advancing the sequence
    pub fn next_backoff_seconds(&mut self) -> u64 {
        let delay = self.current.saturating_mul(self.min_secs).min(self.max_secs);
        if delay < self.max_secs {
            let next = self.previous.saturating_add(self.current);
            self.previous = self.current;
            self.current = next;
        }
        delay
    }

    /// Delay after `error_count` consecutive errors (0-indexed)
    pub fn calculate_for_error_count(error_count: u32, min_secs: u64, max_secs: u64) -> Duration {
        let mut backoff = Self::new(min_secs, max_secs);
        let mut delay = backoff.next_backoff_seconds();
        for _ in 0..error_count {
            delay = backoff.next_backoff_seconds();
        }
        Duration::from_secs(delay)
    }
}

/// Per-resource error count kept by the reconciler
#[derive(Debug, Clone, Default)]
pub struct BackoffState {
    pub error_count: u32,
}

impl BackoffState {
    pub fn increment_error(&mut self) {
        self.error_count = self.error_count.saturating_add(1);
    }

    /// Delay before retrying after the errors counted so far
    pub fn delay(&self, min_secs: u64, max_secs: u64) -> Duration {
        FibonacciBackoff::calculate_for_error_count(
            self.error_count.saturating_sub(1),
            min_secs,
            max_secs,
        )
    }
}
