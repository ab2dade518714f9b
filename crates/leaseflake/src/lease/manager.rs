use core::time::Duration;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::{
    task::JoinHandle,
    time::{Instant, MissedTickBehavior, interval_at, sleep, sleep_until, timeout_at},
};
use tokio_util::sync::CancellationToken;

use crate::{
    AcquireOutcome, Config, Error, LeaseStore, OwnerToken, RenewOutcome, Result, WorkerIdentity,
};

/// Upper bound on the gap between startup acquisition attempts.
const MAX_STARTUP_BACKOFF: Duration = Duration::from_secs(10);

/// Claims a worker id from a [`LeaseStore`].
///
/// The manager scans `[0, 2^W)` and takes the first id nobody holds. It only
/// retries while the store is unreachable, and only during startup; once a
/// [`Lease`] is handed out, keeping it alive is the lease's job.
#[derive(Debug)]
pub struct LeaseManager<S> {
    store: Arc<S>,
    capacity: u64,
    ttl: Duration,
    renew_interval: Duration,
    startup_attempts: u32,
    startup_backoff: Duration,
}

impl<S: LeaseStore> LeaseManager<S> {
    /// Creates a manager for the worker id space described by `config`.
    ///
    /// `config` is assumed valid; [`IdService::start`] validates it first.
    ///
    /// [`IdService::start`]: crate::IdService::start
    pub fn new(store: Arc<S>, config: &Config) -> Self {
        Self {
            store,
            capacity: config.layout().worker_capacity(),
            ttl: config.lease_ttl(),
            renew_interval: config.renew_interval(),
            startup_attempts: config.startup_attempts(),
            startup_backoff: config.startup_backoff(),
        }
    }

    pub const fn capacity(&self) -> u64 {
        self.capacity
    }

    /// Acquires an exclusive worker id.
    ///
    /// Unreachable-store failures are retried with exponential backoff up to
    /// the configured number of attempts.
    ///
    /// # Errors
    ///
    /// - [`Error::LeaseExhausted`] if every worker id is held by a live
    ///   owner. This is not retried.
    /// - [`Error::LeaseServiceUnavailable`] if the store stayed unreachable
    ///   for every attempt.
    pub async fn acquire(&self) -> Result<Lease<S>> {
        let mut backoff = self.startup_backoff.min(MAX_STARTUP_BACKOFF);
        let mut attempt = 1;
        loop {
            match self.scan().await {
                Err(Error::LeaseServiceUnavailable { reason }) if attempt < self.startup_attempts => {
                    #[cfg(feature = "tracing")]
                    tracing::warn!(
                        attempt,
                        max_attempts = self.startup_attempts,
                        ?backoff,
                        "lease store unavailable, retrying: {reason}"
                    );
                    #[cfg(not(feature = "tracing"))]
                    let _ = reason;
                    sleep(backoff).await;
                    backoff = backoff.saturating_mul(2).min(MAX_STARTUP_BACKOFF);
                    attempt += 1;
                }
                result => return result,
            }
        }
    }

    /// One pass over the worker id space.
    async fn scan(&self) -> Result<Lease<S>> {
        let token = OwnerToken::generate();
        for worker_id in 0..self.capacity {
            // The deadline is measured from before the request so that the
            // local view never outlives the store's.
            let sent_at = Instant::now();
            match self.store.try_acquire(worker_id, token, self.ttl).await? {
                AcquireOutcome::Acquired { floor } => {
                    #[cfg(feature = "tracing")]
                    tracing::info!(worker_id, floor, ttl = ?self.ttl, "worker id lease acquired");
                    let deadline = sent_at + self.ttl;
                    let identity = WorkerIdentity::resuming(worker_id, floor);
                    identity.set_deadline(deadline);
                    return Ok(Lease {
                        store: Arc::clone(&self.store),
                        identity: Arc::new(identity),
                        token,
                        ttl: self.ttl,
                        renew_interval: self.renew_interval,
                        deadline: Mutex::new(deadline),
                    });
                }
                AcquireOutcome::Held => {}
            }
        }
        Err(Error::LeaseExhausted {
            capacity: self.capacity,
        })
    }
}

/// An exclusively held worker id.
///
/// The lease tracks a local deadline: the send time of the last successful
/// acquire or renew, plus the ttl. The store cannot have expired the lease
/// before that instant, so as long as renewals land before it the identity
/// is safe to use. Missing it, or being told the token no longer matches,
/// marks the [`WorkerIdentity`] lost.
///
/// Every renew and the final release also publish the identity's timestamp
/// floor, so the next holder of the worker id starts above every timestamp
/// this one issued.
#[derive(Debug)]
pub struct Lease<S> {
    store: Arc<S>,
    identity: Arc<WorkerIdentity>,
    token: OwnerToken,
    ttl: Duration,
    renew_interval: Duration,
    deadline: Mutex<Instant>,
}

impl<S: LeaseStore> Lease<S> {
    pub fn identity(&self) -> &Arc<WorkerIdentity> {
        &self.identity
    }

    pub fn worker_id(&self) -> u64 {
        self.identity.worker_id()
    }

    pub const fn token(&self) -> OwnerToken {
        self.token
    }

    /// Latest instant at which the lease is known to still be ours.
    pub fn deadline(&self) -> Instant {
        *self.deadline.lock()
    }

    /// Extends the lease once.
    ///
    /// # Errors
    ///
    /// - [`Error::IdentityLost`] if the store reports a conflict, or if the
    ///   store could not be reached before the local deadline. The identity
    ///   is marked lost in both cases and this is permanent.
    /// - [`Error::LeaseServiceUnavailable`] if the store could not be reached
    ///   but the deadline has not passed yet; the caller may try again.
    pub async fn renew(&self) -> Result<()> {
        if self.identity.is_lost() {
            return Err(self.lost_error());
        }

        let deadline = self.deadline();
        let sent_at = Instant::now();
        if sent_at >= deadline {
            return Err(self.lose("lease deadline passed before renewal"));
        }

        let outcome = timeout_at(
            deadline,
            self.store
                .renew(self.worker_id(), self.token, self.ttl, self.identity.floor()),
        )
        .await;

        match outcome {
            Ok(Ok(RenewOutcome::Renewed)) => {
                let deadline = sent_at + self.ttl;
                *self.deadline.lock() = deadline;
                self.identity.set_deadline(deadline);
                #[cfg(feature = "tracing")]
                tracing::trace!(worker_id = self.worker_id(), "worker id lease renewed");
                Ok(())
            }
            Ok(Ok(RenewOutcome::Conflict)) => {
                Err(self.lose("lease was reclaimed by another owner"))
            }
            Ok(Err(err)) => {
                if Instant::now() >= deadline {
                    return Err(self.lose("lease store unreachable past the deadline"));
                }
                #[cfg(feature = "tracing")]
                tracing::warn!(
                    worker_id = self.worker_id(),
                    "lease renewal failed, will retry: {err}"
                );
                Err(err.into())
            }
            Err(_elapsed) => Err(self.lose("lease renewal timed out past the deadline")),
        }
    }

    /// Spawns the background renewal loop.
    ///
    /// The task renews every `renew_interval` and also wakes at the local
    /// deadline, so an unreachable store revokes the identity on time. It
    /// exits when `cancel` fires or the identity is lost.
    pub fn spawn_renewal(self: &Arc<Self>, cancel: CancellationToken) -> JoinHandle<()> {
        let lease = Arc::clone(self);
        tokio::spawn(async move {
            let start = Instant::now() + lease.renew_interval;
            let mut ticker = interval_at(start, lease.renew_interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    () = cancel.cancelled() => break,
                    _ = ticker.tick() => {}
                    () = sleep_until(lease.deadline()) => {}
                }
                if let Err(Error::IdentityLost { .. }) = lease.renew().await {
                    break;
                }
            }

            #[cfg(feature = "tracing")]
            tracing::debug!(worker_id = lease.worker_id(), "lease renewal stopped");
        })
    }

    /// Gives the worker id back, together with the final timestamp floor.
    /// Best-effort: failures are logged and the store's expiry reclaims the
    /// id anyway.
    ///
    /// Call it only once issuance has stopped (see
    /// [`LeasedGenerator::quiesce`]), or IDs issued afterwards are not covered
    /// by the published floor.
    ///
    /// [`LeasedGenerator::quiesce`]: crate::LeasedGenerator::quiesce
    pub async fn release(&self) {
        if self.identity.is_lost() {
            return;
        }
        let floor = self.identity.floor();
        match self.store.release(self.worker_id(), self.token, floor).await {
            Ok(()) => {
                #[cfg(feature = "tracing")]
                tracing::info!(worker_id = self.worker_id(), floor, "worker id lease released");
            }
            Err(_err) => {
                #[cfg(feature = "tracing")]
                tracing::warn!(
                    worker_id = self.worker_id(),
                    "lease release failed, leaving it to expire: {_err}"
                );
            }
        }
    }

    fn lose(&self, _why: &'static str) -> Error {
        if self.identity.mark_lost() {
            #[cfg(feature = "tracing")]
            tracing::error!(
                worker_id = self.worker_id(),
                "worker id lost, halting issuance: {_why}"
            );
        }
        self.lost_error()
    }

    fn lost_error(&self) -> Error {
        Error::IdentityLost {
            worker_id: self.worker_id(),
        }
    }
}
