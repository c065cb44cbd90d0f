//! Clock and Sleeper abstractions for deterministic waits
//!
//! The wait engine never reads wall-clock time or suspends the thread
//! directly. It asks a [`Clock`] for "now" and a [`Sleeper`] to pause, so
//! tests can drive timeouts with a [`FakeClock`] and [`FakeSleeper`] pair
//! instead of real time.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::time::{Duration, Instant};
use thiserror::Error;

/// Source of monotonic time, in milliseconds from an arbitrary origin
pub trait Clock: Send + Sync + fmt::Debug {
    /// Current time in milliseconds
    fn now_ms(&self) -> u64;

    /// The instant `duration` from now
    fn later_by(&self, duration: Duration) -> u64 {
        self.now_ms().saturating_add(duration_ms(duration))
    }

    /// Whether "now" is strictly before `end_ms`
    fn is_now_before(&self, end_ms: u64) -> bool {
        self.now_ms() < end_ms
    }
}

/// Suspends the caller between polls
pub trait Sleeper: Send + Sync + fmt::Debug {
    /// Sleep for `duration`, returning early with [`Interrupted`] on cancellation
    fn sleep(&self, duration: Duration) -> Result<(), Interrupted>;
}

/// Returned by a [`Sleeper`] whose sleep was cut short by an [`Interrupter`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("interrupted after {slept_ms}ms of a {requested_ms}ms sleep")]
pub struct Interrupted {
    /// How long the sleep actually lasted
    pub slept_ms: u64,
    /// How long the sleep was asked to last
    pub requested_ms: u64,
}

pub(crate) fn duration_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

// =============================================================================
// SYSTEM CLOCK
// =============================================================================

/// Monotonic clock backed by [`Instant`]
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    /// Create a clock whose origin is now
    #[must_use]
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now_ms(&self) -> u64 {
        duration_ms(self.origin.elapsed())
    }
}

// =============================================================================
// FAKE CLOCK
// =============================================================================

/// Manually advanced clock for tests
#[derive(Debug, Default)]
pub struct FakeClock {
    current_ms: AtomicU64,
}

impl FakeClock {
    /// Create a fake clock at `start_ms`
    #[must_use]
    pub fn new(start_ms: u64) -> Self {
        Self {
            current_ms: AtomicU64::new(start_ms),
        }
    }

    /// Move time forward
    pub fn advance(&self, duration: Duration) {
        self.current_ms
            .fetch_add(duration_ms(duration), Ordering::SeqCst);
    }

    /// Jump to an absolute time
    pub fn set_ms(&self, time_ms: u64) {
        self.current_ms.store(time_ms, Ordering::SeqCst);
    }
}

impl Clock for FakeClock {
    fn now_ms(&self) -> u64 {
        self.current_ms.load(Ordering::SeqCst)
    }
}

// =============================================================================
// INTERRUPTION
// =============================================================================

/// Cancellation handle shared between a sleeper and whoever may cancel it.
///
/// Interrupting wakes any sleep in progress and makes later sleeps fail
/// immediately until [`Interrupter::clear`] is called.
#[derive(Debug, Clone, Default)]
pub struct Interrupter {
    inner: Arc<(Mutex<bool>, Condvar)>,
}

impl Interrupter {
    /// Create a fresh, un-interrupted handle
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation of current and future sleeps
    pub fn interrupt(&self) {
        let (flag, cvar) = &*self.inner;
        *flag.lock().unwrap_or_else(PoisonError::into_inner) = true;
        cvar.notify_all();
    }

    /// Reset the handle so sleeps proceed normally again
    pub fn clear(&self) {
        let (flag, _) = &*self.inner;
        *flag.lock().unwrap_or_else(PoisonError::into_inner) = false;
    }

    /// Whether cancellation has been requested
    #[must_use]
    pub fn is_interrupted(&self) -> bool {
        let (flag, _) = &*self.inner;
        *flag.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn sleep(&self, duration: Duration) -> Result<(), Interrupted> {
        let (flag, cvar) = &*self.inner;
        let started = Instant::now();
        let guard = flag.lock().unwrap_or_else(PoisonError::into_inner);
        let (guard, _) = cvar
            .wait_timeout_while(guard, duration, |interrupted| !*interrupted)
            .unwrap_or_else(PoisonError::into_inner);
        if *guard {
            return Err(Interrupted {
                slept_ms: duration_ms(started.elapsed()),
                requested_ms: duration_ms(duration),
            });
        }
        Ok(())
    }
}

// =============================================================================
// SLEEPERS
// =============================================================================

/// Sleeper that parks the calling thread, wakeable through an [`Interrupter`]
#[derive(Debug, Clone, Default)]
pub struct ThreadSleeper {
    interrupter: Interrupter,
}

impl ThreadSleeper {
    /// Create a sleeper with its own interrupter
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a sleeper cancelled through an existing interrupter
    #[must_use]
    pub fn with_interrupter(interrupter: Interrupter) -> Self {
        Self { interrupter }
    }

    /// Handle for cancelling this sleeper from another thread
    #[must_use]
    pub fn interrupter(&self) -> Interrupter {
        self.interrupter.clone()
    }
}

impl Sleeper for ThreadSleeper {
    fn sleep(&self, duration: Duration) -> Result<(), Interrupted> {
        self.interrupter.sleep(duration)
    }
}

/// Sleeper that advances a [`FakeClock`] instead of blocking
#[derive(Debug)]
pub struct FakeSleeper {
    clock: Arc<FakeClock>,
    interrupter: Interrupter,
    slept: Mutex<Vec<Duration>>,
}

impl FakeSleeper {
    /// Create a sleeper driving `clock`
    #[must_use]
    pub fn new(clock: Arc<FakeClock>) -> Self {
        Self {
            clock,
            interrupter: Interrupter::new(),
            slept: Mutex::new(Vec::new()),
        }
    }

    /// Handle that makes the next sleep fail
    #[must_use]
    pub fn interrupter(&self) -> Interrupter {
        self.interrupter.clone()
    }

    /// Every sleep requested so far
    #[must_use]
    pub fn sleeps(&self) -> Vec<Duration> {
        self.slept
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl Sleeper for FakeSleeper {
    fn sleep(&self, duration: Duration) -> Result<(), Interrupted> {
        if self.interrupter.is_interrupted() {
            return Err(Interrupted {
                slept_ms: 0,
                requested_ms: duration_ms(duration),
            });
        }
        self.slept
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(duration);
        self.clock.advance(duration);
        Ok(())
    }
}

// =============================================================================
// TESTS
// =============================================================================
