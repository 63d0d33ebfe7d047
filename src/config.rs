// Copyright 2022 VMware, Inc.
// SPDX-License-Identifier: MIT
use crate::Error;
use std::env;
use std::str::FromStr;
use std::time::Duration;

pub const CONCURRENCY_VAR: &str = "JANUSGRAPH_CONCURRENCY";
pub const REQUEST_TIMEOUT_VAR: &str = "JANUSGRAPH_REQUEST_TIMEOUT_SECS";
pub const BACKOFF_BASE_VAR: &str = "JANUSGRAPH_BACKOFF_BASE_MS";
pub const BACKOFF_MAX_VAR: &str = "JANUSGRAPH_BACKOFF_MAX_SECS";
pub const RESYNC_VAR: &str = "JANUSGRAPH_RESYNC_SECS";
pub const REQUEUE_DELAY_VAR: &str = "JANUSGRAPH_REQUEUE_DELAY_MS";

/// Knobs of the controller runtime and the shim layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControllerConfig {
    /// Maximum number of custom resources reconciled at the same time.
    pub concurrency: u16,
    /// Deadline of every single request sent to the API server.
    pub request_timeout: Duration,
    /// First delay after a transient failure; doubled on every consecutive failure.
    pub backoff_base: Duration,
    pub backoff_max: Duration,
    /// Periodic re-invocation of converged custom resources; None waits for events only.
    pub resync_period: Option<Duration>,
    /// Delay before re-invoking a pass that stopped after creating or updating an object.
    pub requeue_delay: Duration,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        ControllerConfig {
            concurrency: 4,
            request_timeout: Duration::from_secs(10),
            backoff_base: Duration::from_millis(500),
            backoff_max: Duration::from_secs(300),
            resync_period: None,
            requeue_delay: Duration::ZERO,
        }
    }
}

impl ControllerConfig {
    pub fn from_env() -> Result<Self, Error> {
        Self::from_lookup(|var| env::var(var).ok())
    }

    // from_lookup reads every knob through lookup and falls back to the default for unset ones.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, Error>
    where
        F: Fn(&str) -> Option<String>,
    {
        let default = ControllerConfig::default();

        let concurrency = parse_or(&lookup, CONCURRENCY_VAR, default.concurrency)?;
        if concurrency == 0 {
            return Err(Error::InvalidConfig {
                var: CONCURRENCY_VAR,
                value: concurrency.to_string(),
            });
        }
        let request_timeout = parse_or(&lookup, REQUEST_TIMEOUT_VAR, default.request_timeout.as_secs())?;
        if request_timeout == 0 {
            return Err(Error::InvalidConfig {
                var: REQUEST_TIMEOUT_VAR,
                value: request_timeout.to_string(),
            });
        }
        let backoff_base = parse_or(&lookup, BACKOFF_BASE_VAR, millis(default.backoff_base))?;
        let backoff_max = parse_or(&lookup, BACKOFF_MAX_VAR, default.backoff_max.as_secs())?;
        if Duration::from_millis(backoff_base) > Duration::from_secs(backoff_max) {
            return Err(Error::InvalidConfig {
                var: BACKOFF_BASE_VAR,
                value: backoff_base.to_string(),
            });
        }
        let resync = parse_or(&lookup, RESYNC_VAR, default.resync_period.map_or(0, |d| d.as_secs()))?;
        let requeue_delay = parse_or(&lookup, REQUEUE_DELAY_VAR, millis(default.requeue_delay))?;

        Ok(ControllerConfig {
            concurrency,
            request_timeout: Duration::from_secs(request_timeout),
            backoff_base: Duration::from_millis(backoff_base),
            backoff_max: Duration::from_secs(backoff_max),
            resync_period: if resync == 0 {
                None
            } else {
                Some(Duration::from_secs(resync))
            },
            requeue_delay: Duration::from_millis(requeue_delay),
        })
    }
}

fn parse_or<F, T>(lookup: &F, var: &'static str, default: T) -> Result<T, Error>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(var) {
        None => Ok(default),
        Some(value) => value
            .trim()
            .parse::<T>()
            .map_err(|_| Error::InvalidConfig { var, value }),
    }
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
