use portable_atomic::{AtomicU64, Ordering};

use crate::TimeSource;

/// A backward step observed by [`Clock::now`].
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct Regression {
    /// The reading that was behind.
    pub now: u64,
    /// The highest reading returned so far.
    pub last: u64,
}

impl Regression {
    /// How far the clock stepped back, in milliseconds.
    pub const fn behind_by(&self) -> u64 {
        self.last - self.now
    }
}

/// A [`TimeSource`] wrapper that refuses to go backwards silently.
///
/// The clock remembers the highest reading it has handed out. A later read
/// below that mark is reported as a [`Regression`] instead of being returned,
/// and the mark itself is never lowered, so every read keeps failing until
/// the underlying source catches up.
#[derive(Debug)]
pub struct Clock<T> {
    time: T,
    high_water: AtomicU64,
}

impl<T: TimeSource> Clock<T> {
    pub const fn new(time: T) -> Self {
        Self::with_high_water(time, 0)
    }

    /// A clock that reports readings below `high_water` as regressions from
    /// the start.
    pub const fn with_high_water(time: T, high_water: u64) -> Self {
        Self {
            time,
            high_water: AtomicU64::new(high_water),
        }
    }

    /// Returns the current time, or the regression if the underlying source
    /// reads earlier than a previously returned value.
    ///
    /// # Errors
    ///
    /// Returns [`Regression`] when the clock has moved backwards.
    pub fn now(&self) -> Result<u64, Regression> {
        let now = self.time.current_millis();
        let last = self.high_water.fetch_max(now, Ordering::AcqRel);
        if now < last {
            return Err(Self::cold_regression(now, last));
        }
        Ok(now)
    }

    /// The highest reading returned so far.
    pub fn last(&self) -> u64 {
        self.high_water.load(Ordering::Acquire)
    }

    pub const fn source(&self) -> &T {
        &self.time
    }

    #[cold]
    #[inline(never)]
    fn cold_regression(now: u64, last: u64) -> Regression {
        Regression { now, last }
    }
}
