use core::{future::Future, time::Duration};

use crate::OwnerToken;

/// Result of [`LeaseStore::try_acquire`].
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum AcquireOutcome {
    /// The lease was created (or an expired one replaced) for the caller.
    Acquired {
        /// Timestamp floor left behind by earlier holders of this worker id.
        /// Timestamps below it may already appear in issued IDs.
        floor: u64,
    },
    /// Another owner holds a live lease on this worker id.
    Held,
}

/// Result of [`LeaseStore::renew`].
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum RenewOutcome {
    /// The expiry was extended.
    Renewed,
    /// The lease has expired or belongs to a different token.
    Conflict,
}

/// Failures talking to a lease store.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum StoreError {
    #[error("lease store unavailable: {0}")]
    Unavailable(String),
}

/// A shared store arbitrating worker id leases between processes.
///
/// Implementations must make each operation atomic with respect to the
/// others:
///
/// - `try_acquire` is create-if-absent: it succeeds only when no live lease
///   exists for the worker id.
/// - `renew` and `release` are conditional on the stored token matching the
///   caller's.
///
/// Expiry is decided by the store. A lease past its expiry is treated as
/// absent by all three operations.
///
/// Besides the lease itself the store keeps a per-worker-id timestamp
/// floor. Holders raise it on `renew` and `release`, it survives both release
/// and expiry, and `try_acquire` hands it to the next holder, which must not
/// issue IDs below it. The floor never decreases.
pub trait LeaseStore: Send + Sync + 'static {
    /// Claims `worker_id` for `token` for `ttl`, unless it is already held.
    fn try_acquire(
        &self,
        worker_id: u64,
        token: OwnerToken,
        ttl: Duration,
    ) -> impl Future<Output = Result<AcquireOutcome, StoreError>> + Send;

    /// Pushes the expiry of a held lease to `now + ttl` and raises the
    /// worker id's floor to at least `floor`.
    fn renew(
        &self,
        worker_id: u64,
        token: OwnerToken,
        ttl: Duration,
        floor: u64,
    ) -> impl Future<Output = Result<RenewOutcome, StoreError>> + Send;

    /// Raises the floor to at least `floor` and deletes the lease, if `token`
    /// still owns it. Releasing a lease that is gone or owned by someone else
    /// is a no-op.
    fn release(
        &self,
        worker_id: u64,
        token: OwnerToken,
        floor: u64,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;
}
