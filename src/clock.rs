//! Microsecond time source and cooperative waiting.
//!
//! The pulse sequencer only needs a free-running microsecond counter. It is
//! allowed to wrap, so every comparison goes through [`elapsed_since`] or
//! [`deadline_reached`] instead of comparing absolute values.

/// A monotonic, wrapping microsecond counter.
///
/// Uses a shared reference because the same clock is read by the sequencer
/// (to measure its own latency) and by the wait loop.
pub trait MicrosClock {
    /// Microseconds since a clock-specific reference point, modulo 2^32.
    fn now_micros(&self) -> u32;
}

impl<F> MicrosClock for F
where
    F: Fn() -> u32,
{
    fn now_micros(&self) -> u32 {
        self()
    }
}

/// Microseconds elapsed from `start` to `now`, correct across one wrap.
#[inline]
pub fn elapsed_since(start: u32, now: u32) -> u32 {
    now.wrapping_sub(start)
}

/// Whether `now` is at or past `deadline`.
///
/// Valid as long as the two are less than 2^31 µs (about 35 minutes) apart.
#[inline]
pub fn deadline_reached(now: u32, deadline: u32) -> bool {
    (now.wrapping_sub(deadline) as i32) >= 0
}

/// Wait until `deadline`, calling `yield_now` on every poll.
///
/// `yield_now` is the suspension point for a hosting scheduler: an RTOS yield,
/// a watchdog feed, or [`core::hint::spin_loop`] when there is nothing else to run.
pub fn wait_until<C, Y>(clock: &C, deadline: u32, mut yield_now: Y)
where
    C: MicrosClock + ?Sized,
    Y: FnMut(),
{
    loop {
        yield_now();
        if deadline_reached(clock.now_micros(), deadline) {
            break;
        }
    }
}

/// A clock backed by the operating system's monotonic timer.
#[cfg(feature = "std")]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StdClock {
    origin: std::time::Instant,
}

#[cfg(feature = "std")]
impl StdClock {
    /// Create a clock whose zero is now.
    pub fn new() -> Self {
        Self::default()
    }
}

#[cfg(feature = "std")]
impl Default for StdClock {
    fn default() -> Self {
        Self {
            origin: std::time::Instant::now(),
        }
    }
}

#[cfg(feature = "std")]
impl MicrosClock for StdClock {
    fn now_micros(&self) -> u32 {
        // Truncation is the wrap.
        self.origin.elapsed().as_micros() as u32
    }
}
