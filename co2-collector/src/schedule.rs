//! Inter-pass scheduling.
//!
//! The next pass fires at a time derived from the start of the previous one.
//! [`Cadence::FixedDelay`] sleeps the full interval after each pass, so a pass
//! lasting `t` gives a period of `interval + t`. [`Cadence::FixedRate`] keeps
//! the period at `interval` and starts immediately after an overrun.

use crate::error::ConfigError;
use std::time::Duration;
use tokio::time::Instant;

/// Requests per hour the service grants each token.
pub const RATE_LIMIT_PER_HOUR: u32 = 30;

// Horizon utilisé quand l'intervalle dépasse ce qu'un Instant peut représenter
const FAR_FUTURE: Duration = Duration::from_secs(86_400 * 365 * 30);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Cadence {
    #[default]
    FixedDelay,
    FixedRate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollSchedule {
    interval: Duration,
    cadence: Cadence,
}

impl PollSchedule {
    pub fn new(interval: Duration, cadence: Cadence) -> Self {
        Self { interval, cadence }
    }

    pub fn fixed_delay(interval: Duration) -> Self {
        Self::new(interval, Cadence::FixedDelay)
    }

    pub fn fixed_rate(interval: Duration) -> Self {
        Self::new(interval, Cadence::FixedRate)
    }

    /// Interval from a number of seconds as given on the command line.
    pub fn interval_from_secs(secs: f64) -> Result<Duration, ConfigError> {
        Duration::try_from_secs_f64(secs).map_err(|_| ConfigError::InvalidInterval(secs))
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn cadence(&self) -> Cadence {
        self.cadence
    }

    /// When the pass after one spanning `started..finished` should begin.
    pub fn next_fire(&self, started: Instant, finished: Instant) -> Instant {
        let after = |from: Instant| {
            from.checked_add(self.interval)
                .unwrap_or_else(|| from + FAR_FUTURE)
        };
        match self.cadence {
            Cadence::FixedDelay => after(finished),
            Cadence::FixedRate => after(started).max(finished),
        }
    }

    /// Requests per hour each token receives when polling `zones` zones with `tokens` tokens.
    ///
    /// `None` when there is no token or the interval is zero.
    pub fn requests_per_token_hour(&self, zones: usize, tokens: usize) -> Option<f64> {
        let secs = self.interval.as_secs_f64();
        if tokens == 0 || secs == 0.0 {
            return None;
        }
        Some(zones as f64 * (3600.0 / secs) / tokens as f64)
    }

    pub fn exceeds_rate_limit(&self, zones: usize, tokens: usize) -> bool {
        match self.requests_per_token_hour(zones, tokens) {
            Some(rate) => rate > RATE_LIMIT_PER_HOUR as f64,
            None => zones > 0,
        }
    }
}
