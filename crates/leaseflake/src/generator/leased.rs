use core::time::Duration;
use std::sync::Arc;

use parking_lot::Mutex;
#[cfg(feature = "tracing")]
use tracing::instrument;

use crate::{
    Clock, Config, ConfigError, Error, IdGenStatus, Layout, Regression, Result, SequenceState,
    Sequenced, SnowflakeId, TimeSource, WorkerIdentity,
};

/// A lock-based ID generator bound to a leased worker identity.
///
/// Reading the clock, stepping the sequence and packing the ID all happen
/// under one [`Mutex`], so concurrent callers never observe the same
/// `(timestamp, worker, sequence)` triple. The worker identity is checked
/// before each composition; once the backing lease is lost (or the service
/// starts shutting down) every call fails instead of risking a duplicate.
///
/// ## Clock regressions
///
/// A backward step no larger than the configured tolerance is absorbed by
/// continuing the sequence at the last recorded timestamp. A larger step
/// fails the call with [`Error::ClockRegression`] and leaves state untouched,
/// so issuance resumes by itself once the clock catches up.
///
/// ## Example
///
/// ```
/// use std::sync::Arc;
/// use core::time::Duration;
/// use leaseflake::{IdGenStatus, Layout, LeasedGenerator, WallClock, WorkerIdentity};
///
/// let generator = LeasedGenerator::new(
///     Layout::TWITTER,
///     Arc::new(WorkerIdentity::new(7)),
///     WallClock::default(),
///     Duration::from_millis(5),
/// )
/// .unwrap();
///
/// let id = generator.next_id().unwrap();
/// assert_eq!(Layout::TWITTER.decompose(id).worker_id, 7);
/// ```
#[derive(Debug)]
pub struct LeasedGenerator<T> {
    layout: Layout,
    identity: Arc<WorkerIdentity>,
    clock: Clock<T>,
    state: Mutex<SequenceState>,
    tolerance_ms: u64,
}

impl<T: TimeSource> LeasedGenerator<T> {
    /// Creates a generator stamping `identity`'s worker id into every ID.
    ///
    /// The generator never issues a timestamp below the identity's floor,
    /// and raises the floor as it issues.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::WorkerIdOutOfRange`] if the worker id does not
    /// fit the layout.
    pub fn new(
        layout: Layout,
        identity: Arc<WorkerIdentity>,
        time: T,
        tolerance: Duration,
    ) -> Result<Self, ConfigError> {
        if identity.worker_id() > layout.max_worker_id() {
            return Err(ConfigError::WorkerIdOutOfRange {
                worker_id: identity.worker_id(),
                max: layout.max_worker_id(),
            });
        }
        // Resume above whatever earlier holders of this worker id issued.
        let floor = identity.floor();
        Ok(Self {
            layout,
            clock: Clock::with_high_water(time, floor.saturating_sub(1)),
            state: Mutex::new(SequenceState::resume_below(layout.max_sequence(), floor)),
            identity,
            tolerance_ms: u64::try_from(tolerance.as_millis()).unwrap_or(u64::MAX),
        })
    }

    /// Creates a generator using the layout and tolerance from `config`.
    ///
    /// # Errors
    ///
    /// See [`Self::new`].
    pub fn from_config(
        config: &Config,
        identity: Arc<WorkerIdentity>,
        time: T,
    ) -> Result<Self, ConfigError> {
        Self::new(config.layout(), identity, time, config.clock_tolerance())
    }

    pub const fn layout(&self) -> Layout {
        self.layout
    }

    pub fn identity(&self) -> &Arc<WorkerIdentity> {
        &self.identity
    }

    pub fn worker_id(&self) -> u64 {
        self.identity.worker_id()
    }

    /// Attempts to generate the next ID without blocking.
    ///
    /// # Returns
    /// - `Ok(IdGenStatus::Ready { id })`: a new ID
    /// - `Ok(IdGenStatus::Pending { yield_for })`: the sequence is exhausted
    ///   for this millisecond; retry after `yield_for` milliseconds
    ///
    /// # Errors
    /// - [`Error::IdentityLost`] once the worker id lease is gone.
    /// - [`Error::ShuttingDown`] after [`Self::quiesce`].
    /// - [`Error::ClockRegression`] when the clock is behind by more than the
    ///   tolerance.
    /// - [`Error::TimestampOverflow`] when the clock has run past the
    ///   layout's timestamp range.
    #[cfg_attr(feature = "tracing", instrument(level = "trace", skip(self)))]
    pub fn try_poll_id(&self) -> Result<IdGenStatus> {
        let mut state = self.state.lock();
        let worker_id = self.identity.check()?;

        let now = match self.clock.now() {
            Ok(now) => now,
            Err(regression) => return self.cold_clock_behind(&mut state, worker_id, regression),
        };

        match state.next(now) {
            Sequenced::Ready {
                timestamp,
                sequence,
            } => self.compose(timestamp, worker_id, sequence),
            Sequenced::Overflow { yield_for } => Ok(IdGenStatus::Pending { yield_for }),
            Sequenced::Behind { last } => {
                self.cold_clock_behind(&mut state, worker_id, Regression { now, last })
            }
        }
    }

    /// Generates the next ID, blocking the thread through sequence
    /// exhaustion.
    ///
    /// The wait is at most about a millisecond (or the size of an absorbed
    /// clock regression).
    ///
    /// # Errors
    ///
    /// Same as [`Self::try_poll_id`].
    pub fn next_id(&self) -> Result<SnowflakeId> {
        loop {
            match self.try_poll_id()? {
                IdGenStatus::Ready { id } => return Ok(id),
                IdGenStatus::Pending { yield_for } if yield_for <= 1 => std::thread::yield_now(),
                IdGenStatus::Pending { yield_for } => {
                    std::thread::sleep(Duration::from_millis(yield_for));
                }
            }
        }
    }

    /// Generates the next ID, sleeping on the tokio timer through sequence
    /// exhaustion.
    ///
    /// # Errors
    ///
    /// Same as [`Self::try_poll_id`].
    pub async fn next_id_async(&self) -> Result<SnowflakeId> {
        loop {
            match self.try_poll_id()? {
                IdGenStatus::Ready { id } => return Ok(id),
                IdGenStatus::Pending { yield_for } => {
                    tokio::time::sleep(Duration::from_millis(yield_for)).await;
                }
            }
        }
    }

    /// Stops issuance and waits for any in-flight composition to finish.
    ///
    /// After this returns no further ID will be produced, so the lease can be
    /// released safely.
    pub fn quiesce(&self) {
        self.identity.retire();
        drop(self.state.lock());
    }

    fn compose(&self, timestamp: u64, worker_id: u64, sequence: u64) -> Result<IdGenStatus> {
        if timestamp > self.layout.max_timestamp() {
            return Err(Error::TimestampOverflow { timestamp });
        }
        self.identity.record_issued(timestamp);
        Ok(IdGenStatus::Ready {
            id: self.layout.compose(timestamp, worker_id, sequence),
        })
    }

    #[cold]
    #[inline(never)]
    fn cold_clock_behind(
        &self,
        state: &mut SequenceState,
        worker_id: u64,
        regression: Regression,
    ) -> Result<IdGenStatus> {
        if regression.behind_by() > self.tolerance_ms {
            #[cfg(feature = "tracing")]
            tracing::warn!(
                last = regression.last,
                now = regression.now,
                "clock regression beyond tolerance, refusing to issue"
            );
            return Err(Error::ClockRegression {
                last: regression.last,
                now: regression.now,
            });
        }

        #[cfg(feature = "tracing")]
        tracing::debug!(
            behind_by = regression.behind_by(),
            "absorbing clock regression at last timestamp"
        );
        match state.continue_at_last() {
            Sequenced::Ready {
                timestamp,
                sequence,
            } => self.compose(timestamp, worker_id, sequence),
            // The clock has to pass the recorded timestamp before a fresh
            // sequence opens up.
            Sequenced::Overflow { .. } | Sequenced::Behind { .. } => Ok(IdGenStatus::Pending {
                yield_for: regression.behind_by() + 1,
            }),
        }
    }
}
