// Copyright 2022 VMware, Inc.
// SPDX-License-Identifier: MIT
use rand::Rng;
use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

/// Consecutive failure counters, one per custom resource key.
///
/// The n-th consecutive failure waits `min(base * 2^(n-1), max)`, jittered
/// into the upper half of that range so that records failing together spread out.
pub struct Backoff {
    base: Duration,
    max: Duration,
    failures: Mutex<HashMap<String, u32>>,
}

impl Backoff {
    pub fn new(base: Duration, max: Duration) -> Self {
        Backoff {
            base,
            max,
            failures: Mutex::new(HashMap::new()),
        }
    }

    // delay_for is the delay before jitter for the given number of consecutive failures (at least 1).
    pub fn delay_for(&self, failures: u32) -> Duration {
        let exponent = failures.saturating_sub(1).min(31);
        self.base
            .checked_mul(1u32 << exponent)
            .map_or(self.max, |delay| delay.min(self.max))
    }

    /// Counts one more failure of key and returns how long to wait before retrying it.
    pub fn next_delay(&self, key: &str) -> Duration {
        let failures = self.record_failure(key);
        let delay = self.delay_for(failures);
        let half = delay / 2;
        half + rand::thread_rng().gen_range(Duration::ZERO..=delay - half)
    }

    pub fn record_failure(&self, key: &str) -> u32 {
        let mut failures = self.failures.lock().unwrap_or_else(PoisonError::into_inner);
        let count = failures.entry(key.to_string()).or_insert(0);
        *count = count.saturating_add(1);
        *count
    }

    pub fn reset(&self, key: &str) {
        self.failures
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key);
    }

    pub fn failures(&self, key: &str) -> u32 {
        self.failures
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .copied()
            .unwrap_or(0)
    }

    pub fn max_delay(&self) -> Duration {
        self.max
    }
}
