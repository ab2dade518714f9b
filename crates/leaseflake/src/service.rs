use std::sync::Arc;

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::{
    Config, Lease, LeaseManager, LeaseStore, LeasedGenerator, Result, SnowflakeId, TimeSource,
    WallClock,
};

/// A ready-to-use generator: a leased worker id, its renewal task, and the
/// generator stamping it.
///
/// Construct one per process at startup and share it (typically behind an
/// [`Arc`]) with everything that needs IDs. [`IdService::shutdown`] undoes
/// startup in reverse: issuance stops first, then renewal, then the lease is
/// handed back.
#[derive(Debug)]
pub struct IdService<S, T> {
    generator: Arc<LeasedGenerator<T>>,
    lease: Arc<Lease<S>>,
    renewal: Mutex<Option<JoinHandle<()>>>,
    cancel: CancellationToken,
}

impl<S: LeaseStore> IdService<S, WallClock> {
    /// Starts a service on the system wall clock at the configured epoch.
    ///
    /// # Errors
    ///
    /// See [`Self::start_with_time`].
    pub async fn start(config: Config, store: Arc<S>) -> Result<Self> {
        let clock = config.wall_clock();
        Self::start_with_time(config, store, clock).await
    }
}

impl<S, T> IdService<S, T>
where
    S: LeaseStore,
    T: TimeSource + Send + Sync + 'static,
{
    /// Validates `config`, leases a worker id from `store`, starts renewing
    /// it, and builds the generator.
    ///
    /// # Errors
    ///
    /// - [`Error::Config`] if `config` is invalid.
    /// - [`Error::LeaseExhausted`] if no worker id is free.
    /// - [`Error::LeaseServiceUnavailable`] if `store` stayed unreachable.
    ///
    /// [`Error::Config`]: crate::Error::Config
    /// [`Error::LeaseExhausted`]: crate::Error::LeaseExhausted
    /// [`Error::LeaseServiceUnavailable`]: crate::Error::LeaseServiceUnavailable
    pub async fn start_with_time(config: Config, store: Arc<S>, time: T) -> Result<Self> {
        config.validate()?;

        let lease = LeaseManager::new(store, &config).acquire().await?;
        let generator =
            match LeasedGenerator::from_config(&config, Arc::clone(lease.identity()), time) {
                Ok(generator) => generator,
                Err(err) => {
                    lease.release().await;
                    return Err(err.into());
                }
            };

        let lease = Arc::new(lease);
        let cancel = CancellationToken::new();
        let renewal = lease.spawn_renewal(cancel.clone());

        #[cfg(feature = "tracing")]
        tracing::info!(
            worker_id = lease.worker_id(),
            layout = ?config.layout(),
            "id service ready"
        );

        Ok(Self {
            generator: Arc::new(generator),
            lease,
            renewal: Mutex::new(Some(renewal)),
            cancel,
        })
    }

    pub fn generator(&self) -> &Arc<LeasedGenerator<T>> {
        &self.generator
    }

    pub fn lease(&self) -> &Arc<Lease<S>> {
        &self.lease
    }

    pub fn worker_id(&self) -> u64 {
        self.lease.worker_id()
    }

    /// A token cancelled if the worker id lease is lost.
    pub fn lost_token(&self) -> CancellationToken {
        self.lease.identity().lost_token()
    }

    /// Shorthand for [`LeasedGenerator::next_id`].
    ///
    /// # Errors
    ///
    /// See [`LeasedGenerator::try_poll_id`].
    pub fn next_id(&self) -> Result<SnowflakeId> {
        self.generator.next_id()
    }

    /// Shorthand for [`LeasedGenerator::next_id_async`].
    ///
    /// # Errors
    ///
    /// See [`LeasedGenerator::try_poll_id`].
    pub async fn next_id_async(&self) -> Result<SnowflakeId> {
        self.generator.next_id_async().await
    }

    /// Stops issuance, waits for in-flight IDs, stops renewal and releases
    /// the lease. Safe to call more than once.
    pub async fn shutdown(&self) {
        #[cfg(feature = "tracing")]
        tracing::info!(worker_id = self.worker_id(), "id service shutting down");

        self.generator.quiesce();
        self.cancel.cancel();

        let renewal = self.renewal.lock().take();
        if let Some(handle) = renewal {
            if let Err(_e) = handle.await {
                #[cfg(feature = "tracing")]
                tracing::error!("lease renewal task failed: {_e}");
            }
        }

        self.lease.release().await;
    }
}
