//! Bounded polling with cancellation.
//!
//! Every wait in the handshake goes through [`poll_until`]. The default
//! [`PollOptions`] have no timeout and no poll budget, which is an
//! unbounded busy wait; set either bound to make a stalled device surface
//! as [`TransportError::Timeout`].

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use tracing::warn;

use crate::error::{TransportError, TransportResult};

/// Limits for one wait loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PollOptions {
    /// Wall-clock limit for one wait.
    pub timeout: Option<Duration>,
    /// Sleep between polls. Zero spins.
    pub interval: Duration,
    /// Maximum number of polls for one wait.
    pub max_polls: Option<usize>,
}

impl PollOptions {
    /// No timeout, no budget, no sleep.
    pub fn unbounded() -> Self {
        Self::default()
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn with_max_polls(mut self, max_polls: usize) -> Self {
        self.max_polls = Some(max_polls);
        self
    }

    pub fn is_bounded(&self) -> bool {
        self.timeout.is_some() || self.max_polls.is_some()
    }
}

/// Shared cancellation flag. Clones observe the same flag.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn reset(&self) {
        self.flag.store(false, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

/// Call `check` until it returns `true`.
///
/// Returns the number of polls made. Cancellation is checked before every
/// poll; the budget and the timeout after every unsuccessful poll.
pub fn poll_until<F>(
    options: &PollOptions,
    cancel: &CancelToken,
    what: &'static str,
    mut check: F,
) -> TransportResult<usize>
where
    F: FnMut() -> TransportResult<bool>,
{
    let start = Instant::now();
    let mut polls = 0usize;
    loop {
        if cancel.is_cancelled() {
            return Err(TransportError::Cancelled { what });
        }
        polls += 1;
        if check()? {
            return Ok(polls);
        }

        let exhausted = options.max_polls.is_some_and(|max| polls >= max);
        let expired = options.timeout.is_some_and(|t| start.elapsed() > t);
        if exhausted || expired {
            let elapsed_ms = start.elapsed().as_millis();
            warn!(what, polls, elapsed_ms, "handshake wait gave up");
            return Err(TransportError::Timeout {
                what,
                polls,
                elapsed_ms,
            });
        }

        if options.interval.is_zero() {
            std::hint::spin_loop();
        } else {
            thread::sleep(options.interval);
        }
    }
}
