//! Runtime settings for sessions and the dispatcher

use std::time::Duration;

/// Default interval between polls while waiting for the first spectrum.
pub const DEFAULT_FIRST_SPECTRUM_POLL: Duration = Duration::from_secs(5);

/// Default interval between polls while the run is being acquired.
pub const DEFAULT_MONITORING_POLL: Duration = Duration::from_secs(30);

/// Bounded retry with exponential backoff.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts including the first one. Zero behaves like one.
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl RetryPolicy {
    /// Single attempt, no retry.
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            initial_backoff: Duration::ZERO,
            max_backoff: Duration::ZERO,
        }
    }

    pub fn attempts(&self) -> u32 {
        self.max_attempts.max(1)
    }

    /// Delay before attempt `attempt + 1`, where `attempt` counts from 1.
    pub fn backoff_after(&self, attempt: u32) -> Duration {
        let shift = attempt.saturating_sub(1).min(16);
        self.initial_backoff
            .saturating_mul(1u32 << shift)
            .min(self.max_backoff)
    }
}

/// Per-session polling behaviour.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonitorConfig {
    pub first_spectrum_poll_interval: Duration,
    pub monitoring_poll_interval: Duration,
    /// Applied around each refresh + snapshot read of a running session.
    pub refresh_retry: RetryPolicy,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            first_spectrum_poll_interval: DEFAULT_FIRST_SPECTRUM_POLL,
            monitoring_poll_interval: DEFAULT_MONITORING_POLL,
            refresh_retry: RetryPolicy {
                max_attempts: 3,
                initial_backoff: Duration::from_secs(1),
                max_backoff: Duration::from_secs(8),
            },
        }
    }
}

/// Worker pool behaviour.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchConfig {
    /// Sessions that may run at once. 1 serialises sessions.
    pub workers: usize,
    /// Applied around opening a newly observed file.
    pub open_retry: RetryPolicy,
    /// Stop everything after the first session completes.
    pub exit_after_first_run: bool,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            workers: 1,
            open_retry: RetryPolicy {
                max_attempts: 5,
                initial_backoff: Duration::from_secs(2),
                max_backoff: Duration::from_secs(30),
            },
            exit_after_first_run: false,
        }
    }
}
