use core::{future, future::Future, time::Duration};
use std::{collections::HashMap, sync::Arc};

use parking_lot::Mutex;
use tokio::time::Instant;

use crate::{AcquireOutcome, LeaseStore, OwnerToken, RenewOutcome, StoreError};

#[derive(Copy, Clone, Debug)]
struct Entry {
    token: OwnerToken,
    expires_at: Instant,
}

#[derive(Debug, Default)]
struct Table {
    leases: HashMap<u64, Entry>,
    // Outlives the lease entries: a released or expired id keeps its floor.
    floors: HashMap<u64, u64>,
}

fn raise_floor(floors: &mut HashMap<u64, u64>, worker_id: u64, floor: u64) {
    let current = floors.entry(worker_id).or_default();
    *current = (*current).max(floor);
}

/// An in-process [`LeaseStore`].
///
/// Clones share the same table, so several [`LeaseManager`]s in one process
/// (or one test) contend for worker ids exactly as separate processes would
/// against a networked store. Expiry follows [`tokio::time::Instant`], which
/// means paused test clocks drive it.
///
/// Nothing is shared with other processes: two processes each holding their
/// own `MemoryLeaseStore` will both lease worker id 0.
///
/// [`LeaseManager`]: crate::LeaseManager
#[derive(Clone, Debug, Default)]
pub struct MemoryLeaseStore {
    table: Arc<Mutex<Table>>,
}

impl MemoryLeaseStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the owner of a live lease on `worker_id`, if any.
    pub fn holder(&self, worker_id: u64) -> Option<OwnerToken> {
        let now = Instant::now();
        self.table
            .lock()
            .leases
            .get(&worker_id)
            .filter(|entry| entry.expires_at > now)
            .map(|entry| entry.token)
    }

    /// Returns the timestamp floor recorded for `worker_id`.
    pub fn floor(&self, worker_id: u64) -> u64 {
        self.table
            .lock()
            .floors
            .get(&worker_id)
            .copied()
            .unwrap_or_default()
    }

    /// Number of live leases.
    pub fn live_leases(&self) -> usize {
        let now = Instant::now();
        self.table
            .lock()
            .leases
            .values()
            .filter(|entry| entry.expires_at > now)
            .count()
    }

    fn acquire_now(&self, worker_id: u64, token: OwnerToken, ttl: Duration) -> AcquireOutcome {
        let now = Instant::now();
        let mut table = self.table.lock();
        if table
            .leases
            .get(&worker_id)
            .is_some_and(|entry| entry.expires_at > now)
        {
            return AcquireOutcome::Held;
        }
        table.leases.insert(
            worker_id,
            Entry {
                token,
                expires_at: now + ttl,
            },
        );
        AcquireOutcome::Acquired {
            floor: table.floors.get(&worker_id).copied().unwrap_or_default(),
        }
    }

    fn renew_now(
        &self,
        worker_id: u64,
        token: OwnerToken,
        ttl: Duration,
        floor: u64,
    ) -> RenewOutcome {
        let now = Instant::now();
        let mut table = self.table.lock();
        let Table { leases, floors } = &mut *table;
        match leases.get_mut(&worker_id) {
            Some(entry) if entry.token == token && entry.expires_at > now => {
                entry.expires_at = now + ttl;
                raise_floor(floors, worker_id, floor);
                RenewOutcome::Renewed
            }
            _ => RenewOutcome::Conflict,
        }
    }

    fn release_now(&self, worker_id: u64, token: OwnerToken, floor: u64) {
        let mut table = self.table.lock();
        if table
            .leases
            .get(&worker_id)
            .is_some_and(|entry| entry.token == token)
        {
            raise_floor(&mut table.floors, worker_id, floor);
            table.leases.remove(&worker_id);
        }
    }
}

impl LeaseStore for MemoryLeaseStore {
    fn try_acquire(
        &self,
        worker_id: u64,
        token: OwnerToken,
        ttl: Duration,
    ) -> impl Future<Output = Result<AcquireOutcome, StoreError>> + Send {
        future::ready(Ok(self.acquire_now(worker_id, token, ttl)))
    }

    fn renew(
        &self,
        worker_id: u64,
        token: OwnerToken,
        ttl: Duration,
        floor: u64,
    ) -> impl Future<Output = Result<RenewOutcome, StoreError>> + Send {
        future::ready(Ok(self.renew_now(worker_id, token, ttl, floor)))
    }

    fn release(
        &self,
        worker_id: u64,
        token: OwnerToken,
        floor: u64,
    ) -> impl Future<Output = Result<(), StoreError>> + Send {
        self.release_now(worker_id, token, floor);
        future::ready(Ok(()))
    }
}
