use std::time::Duration;

/// Delay between two attempts of a bounded retry loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backoff {
    /// Same delay after every failed attempt.
    Fixed(Duration),
    /// `base × attempt`, where `attempt` is the 1-based number of the attempt
    /// that just failed.
    Linear(Duration),
}

impl Backoff {
    pub fn delay_after(&self, attempt: u32) -> Duration {
        match *self {
            Backoff::Fixed(delay) => delay,
            Backoff::Linear(base) => base * attempt.max(1),
        }
    }
}

/// Bounded attempt schedule. Waits happen only between attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff: Backoff,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, backoff: Backoff) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            backoff,
        }
    }

    /// Delay to wait after `attempt` failed, or `None` once attempts are spent.
    pub fn next_delay(&self, attempt: u32) -> Option<Duration> {
        (attempt < self.max_attempts).then(|| self.backoff.delay_after(attempt))
    }
}
