//! The millisecond timeout contract shared by every blocking call.
//!
//! `0` means "try once, don't block"; negative means "wait indefinitely";
//! positive is a bound in milliseconds. `Deadline` tracks how much of a
//! bounded budget remains as a call moves from lock acquisition to transport
//! read, mirroring the C source's `nc_timedlock(..., &elapsed)` /
//! `timeout -= elapsed` pattern (spec §5's "Cancellation and timeouts").

use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Timeout {
    NonBlocking,
    Infinite,
    Millis(u64),
}

impl Timeout {
    pub fn from_ms(ms: i64) -> Timeout {
        match ms {
            0 => Timeout::NonBlocking,
            n if n < 0 => Timeout::Infinite,
            n => Timeout::Millis(n as u64),
        }
    }

    pub fn as_duration(self) -> Option<Duration> {
        match self {
            Timeout::NonBlocking => Some(Duration::ZERO),
            Timeout::Infinite => None,
            Timeout::Millis(ms) => Some(Duration::from_millis(ms)),
        }
    }
}

/// Tracks remaining budget across several suspension points within one
/// public call (lock acquisition, then transport read).
#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    timeout: Timeout,
    start: Instant,
}

impl Deadline {
    pub fn start(timeout: Timeout) -> Deadline {
        Deadline {
            timeout,
            start: Instant::now(),
        }
    }

    /// Time remaining, or `None` for an infinite deadline. `Some(Duration::ZERO)`
    /// means the budget is exhausted; the caller should treat this the same
    /// as a non-blocking attempt that found nothing.
    pub fn remaining(&self) -> Option<Duration> {
        match self.timeout {
            Timeout::Infinite => None,
            Timeout::NonBlocking => Some(Duration::ZERO),
            Timeout::Millis(ms) => {
                let budget = Duration::from_millis(ms);
                let elapsed = self.start.elapsed();
                Some(budget.saturating_sub(elapsed))
            }
        }
    }

    pub fn expired(&self) -> bool {
        matches!(self.remaining(), Some(d) if d.is_zero())
    }
}
