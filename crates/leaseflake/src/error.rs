use crate::lease::StoreError;

/// A result type defaulting to this crate's [`Error`].
pub type Result<T, E = Error> = core::result::Result<T, E>;

/// All errors that `leaseflake` can produce.
///
/// Sequence exhaustion is deliberately absent: it is reported as
/// [`IdGenStatus::Pending`] and retried internally by the blocking and async
/// entry points.
///
/// [`IdGenStatus::Pending`]: crate::IdGenStatus::Pending
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// Every worker id in `[0, capacity)` is leased by another live owner.
    #[error("all {capacity} worker ids are leased")]
    LeaseExhausted {
        /// Size of the worker id space.
        capacity: u64,
    },

    /// The lease store could not be reached while acquiring a worker id.
    #[error("lease service unavailable: {reason}")]
    LeaseServiceUnavailable {
        /// The last error reported by the store.
        reason: String,
    },

    /// The worker id lease was reclaimed by another owner, or could not be
    /// renewed before it expired.
    ///
    /// The generator refuses to issue further IDs once this is observed.
    #[error("worker id {worker_id} lease lost")]
    IdentityLost {
        /// The worker id that is no longer held.
        worker_id: u64,
    },

    /// The clock moved backwards further than the configured tolerance.
    #[error("clock moved backwards from {last} to {now} ms")]
    ClockRegression {
        /// Highest timestamp observed so far.
        last: u64,
        /// The regressed reading.
        now: u64,
    },

    /// The current timestamp no longer fits the layout's timestamp field.
    #[error("timestamp {timestamp} exceeds the layout's timestamp field")]
    TimestampOverflow {
        /// The offending timestamp, in milliseconds since the epoch.
        timestamp: u64,
    },

    /// Issuance was stopped because the service is shutting down.
    #[error("generator is shutting down")]
    ShuttingDown,

    /// The configuration is invalid.
    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl Error {
    /// Returns `true` if the generator can no longer guarantee uniqueness and
    /// the process should re-lease or restart.
    ///
    /// Clock regressions are not fatal: they fail the call but leave state
    /// untouched, and issuance resumes once the clock catches up.
    pub const fn is_fatal(&self) -> bool {
        !matches!(self, Self::ClockRegression { .. })
    }
}

impl From<StoreError> for Error {
    fn from(err: StoreError) -> Self {
        Self::LeaseServiceUnavailable {
            reason: err.to_string(),
        }
    }
}

/// Reasons a [`Config`] or [`Layout`] is rejected.
///
/// [`Config`]: crate::Config
/// [`Layout`]: crate::Layout
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum ConfigError {
    #[error("layout widths {timestamp}+{worker}+{sequence} must sum to 63 bits")]
    LayoutWidth {
        timestamp: u8,
        worker: u8,
        sequence: u8,
    },

    #[error("layout needs at least one sequence bit")]
    NoSequenceBits,

    #[error("lease ttl must be non-zero")]
    ZeroLeaseTtl,

    #[error("renew interval ({renew_ms} ms) must be non-zero and shorter than the lease ttl ({ttl_ms} ms)")]
    RenewInterval { renew_ms: u128, ttl_ms: u128 },

    #[error("clock tolerance ({tolerance_ms} ms) must be shorter than the lease ttl ({ttl_ms} ms)")]
    ClockTolerance { tolerance_ms: u128, ttl_ms: u128 },

    #[error("startup attempts must be at least 1")]
    NoStartupAttempts,

    #[error("worker id {worker_id} exceeds the layout maximum {max}")]
    WorkerIdOutOfRange { worker_id: u64, max: u64 },

    #[error("epoch is {ahead_ms} ms ahead of the wall clock")]
    EpochInFuture { ahead_ms: u64 },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_clock_regression_is_recoverable() {
        assert!(!Error::ClockRegression { last: 2, now: 1 }.is_fatal());
        assert!(Error::IdentityLost { worker_id: 3 }.is_fatal());
        assert!(Error::ShuttingDown.is_fatal());
        assert!(Error::LeaseExhausted { capacity: 2 }.is_fatal());
    }

    #[test]
    fn store_errors_become_unavailable() {
        let err: Error = StoreError::Unavailable("connection refused".into()).into();
        assert_eq!(
            err,
            Error::LeaseServiceUnavailable {
                reason: "lease store unavailable: connection refused".into()
            }
        );
    }
}
