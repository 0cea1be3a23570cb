//! Retry policy and rate-limit header parsing.
//!
//! The policy describes the generic loop (attempts, backoff bounds); parsing
//! the server's rate-limit signaling lives here as plain functions so the two
//! concerns never tangle.

use crate::config::Config;
use backon::ExponentialBuilder;
use reqwest::header::HeaderMap;
use std::time::Duration;

/// Statuses worth retrying: rate limiting plus transient upstream failures.
const RETRYABLE_STATUSES: [u16; 7] = [429, 500, 502, 503, 504, 522, 525];

pub fn is_retryable_status(status: u16) -> bool {
    RETRYABLE_STATUSES.contains(&status)
}

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: usize,
    pub min_delay: Duration,
    pub max_delay: Duration,
    /// A server-advertised wait longer than this is treated as garbage and the
    /// exponential backoff is used instead.
    pub hint_ceiling: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &Config) -> Self {
        Self {
            max_attempts: config.retry_max_attempts,
            min_delay: config.retry_min_delay,
            max_delay: config.retry_max_delay,
            hint_ceiling: config.retry_hint_ceiling,
        }
    }

    pub fn backoff(&self) -> ExponentialBuilder {
        ExponentialBuilder::default()
            .with_min_delay(self.min_delay)
            .with_max_delay(self.max_delay)
            .with_max_times(self.max_attempts)
            .with_jitter()
    }

    /// Pick the wait before the next attempt: a sane server hint wins over the
    /// planned backoff, an insane one falls back to it.
    pub fn next_wait(&self, hint: Option<Duration>, planned: Duration) -> Duration {
        match hint {
            Some(hinted) if hinted <= self.hint_ceiling => hinted,
            _ => planned,
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            min_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(8),
            hint_ceiling: Duration::from_secs(120),
        }
    }
}

/// Parse a server-advertised wait out of rate-limit response headers.
///
/// Recognized signals, in priority order: `Retry-After` (delta seconds),
/// `x-ratelimit-reset` (epoch seconds), and `x-ratelimit-remaining` of zero
/// combined with a reset. Absence of all of them yields `None` and the caller
/// falls back to exponential backoff.
pub fn rate_limit_hint(headers: &HeaderMap, now_epoch: i64) -> Option<Duration> {
    if let Some(seconds) = header_i64(headers, "retry-after") {
        if seconds >= 0 {
            return Some(Duration::from_secs(seconds as u64));
        }
    }
    if let Some(reset_epoch) = header_i64(headers, "x-ratelimit-reset") {
        let wait = reset_epoch - now_epoch;
        if wait > 0 {
            return Some(Duration::from_secs(wait as u64));
        }
        // Reset already elapsed; the next attempt is free to go immediately.
        if header_i64(headers, "x-ratelimit-remaining") == Some(0) {
            return Some(Duration::ZERO);
        }
    }
    None
}

fn header_i64(headers: &HeaderMap, name: &str) -> Option<i64> {
    headers
        .get(name)?
        .to_str()
        .ok()?
        .trim()
        .parse::<i64>()
        .ok()
}
