use core::time::Duration;

use portable_atomic::{AtomicBool, AtomicU64, Ordering};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::{Error, Result};

const NO_DEADLINE: u64 = u64::MAX;

/// The worker id a generator stamps into its IDs, together with the signals
/// that revoke it.
///
/// Shared between a [`Lease`] (which marks it lost when renewal fails) and a
/// [`LeasedGenerator`] (which checks it before composing every ID). The flags
/// are plain atomics so the check costs a load on the hot path.
///
/// The identity also carries two values the lease and the generator exchange:
///
/// - the lease deadline, mirrored here so issuance stops at the deadline even
///   if the renewal task never gets to run;
/// - the timestamp floor: timestamps below it may already appear in IDs
///   issued under this worker id, by this holder or an earlier one.
///
/// [`Lease`]: crate::Lease
/// [`LeasedGenerator`]: crate::LeasedGenerator
#[derive(Debug)]
pub struct WorkerIdentity {
    worker_id: u64,
    floor: AtomicU64,
    origin: Instant,
    // Nanoseconds after `origin`, or `NO_DEADLINE`.
    deadline: AtomicU64,
    lost: AtomicBool,
    retired: AtomicBool,
    on_lost: CancellationToken,
}

impl WorkerIdentity {
    /// An identity for `worker_id`. Nothing revokes it unless a [`Lease`]
    /// manages it, so only use this directly when exclusivity is guaranteed
    /// some other way (or in tests).
    ///
    /// [`Lease`]: crate::Lease
    pub fn new(worker_id: u64) -> Self {
        Self::resuming(worker_id, 0)
    }

    /// An identity for `worker_id` whose earlier holders issued timestamps up
    /// to, but not including, `floor`.
    pub fn resuming(worker_id: u64, floor: u64) -> Self {
        Self {
            worker_id,
            floor: AtomicU64::new(floor),
            origin: Instant::now(),
            deadline: AtomicU64::new(NO_DEADLINE),
            lost: AtomicBool::new(false),
            retired: AtomicBool::new(false),
            on_lost: CancellationToken::new(),
        }
    }

    pub const fn worker_id(&self) -> u64 {
        self.worker_id
    }

    /// Lowest timestamp guaranteed unused under this worker id.
    pub fn floor(&self) -> u64 {
        self.floor.load(Ordering::Acquire)
    }

    /// Raises the floor past `timestamp`, which has just been issued.
    #[inline]
    pub fn record_issued(&self, timestamp: u64) {
        self.floor
            .fetch_max(timestamp.saturating_add(1), Ordering::AcqRel);
    }

    /// The instant after which the identity refuses issuance, if any.
    pub fn deadline(&self) -> Option<Instant> {
        match self.deadline.load(Ordering::Acquire) {
            NO_DEADLINE => None,
            nanos => Some(self.origin + Duration::from_nanos(nanos)),
        }
    }

    /// Sets the instant after which [`Self::check`] fails with
    /// [`Error::IdentityLost`].
    pub fn set_deadline(&self, deadline: Instant) {
        let nanos = deadline.saturating_duration_since(self.origin).as_nanos();
        let nanos = u64::try_from(nanos).unwrap_or(NO_DEADLINE - 1);
        self.deadline
            .store(nanos.min(NO_DEADLINE - 1), Ordering::Release);
    }

    pub fn is_lost(&self) -> bool {
        self.lost.load(Ordering::Acquire)
    }

    pub fn is_retired(&self) -> bool {
        self.retired.load(Ordering::Acquire)
    }

    /// Revokes the identity. Returns `true` for the call that flipped it.
    pub fn mark_lost(&self) -> bool {
        let first = !self.lost.swap(true, Ordering::AcqRel);
        if first {
            self.on_lost.cancel();
        }
        first
    }

    /// Stops issuance for a graceful shutdown. The lease itself is untouched.
    pub fn retire(&self) {
        self.retired.store(true, Ordering::Release);
    }

    /// A token cancelled once the identity is lost.
    ///
    /// The returned token is a child: cancelling it does not revoke the
    /// identity.
    pub fn lost_token(&self) -> CancellationToken {
        self.on_lost.child_token()
    }

    /// Returns the worker id if it may still be used for issuance.
    ///
    /// # Errors
    ///
    /// - [`Error::IdentityLost`] once the lease has been lost, or once its
    ///   deadline has passed. Passing the deadline marks the identity lost.
    /// - [`Error::ShuttingDown`] once the identity has been retired.
    #[inline]
    pub fn check(&self) -> Result<u64> {
        if self.is_lost() || self.past_deadline() {
            return Err(Error::IdentityLost {
                worker_id: self.worker_id,
            });
        }
        if self.is_retired() {
            return Err(Error::ShuttingDown);
        }
        Ok(self.worker_id)
    }

    fn past_deadline(&self) -> bool {
        let nanos = self.deadline.load(Ordering::Acquire);
        if nanos == NO_DEADLINE || self.origin.elapsed() < Duration::from_nanos(nanos) {
            return false;
        }
        if self.mark_lost() {
            #[cfg(feature = "tracing")]
            tracing::error!(
                worker_id = self.worker_id,
                "worker id lease deadline passed, halting issuance"
            );
        }
        true
    }
}
