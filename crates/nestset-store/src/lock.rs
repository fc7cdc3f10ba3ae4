//! Partition lock table.
//!
//! Mutations that renumber or allocate partition ids need the whole forest;
//! everything else only needs the partitions it rewrites. The table offers
//! two lock kinds:
//!
//! ```text
//!                    │ forest X │ partitions {P..} │
//! ───────────────────┼──────────┼──────────────────┤
//!  forest X          │    ✗     │        ✗         │
//!  partitions {Q..}  │    ✗     │  ✓ iff disjoint  │
//! ```
//!
//! A partition lock holds the forest shared plus every named partition
//! exclusively. All partitions of one request are granted together, so
//! there is no acquisition order to get wrong. Waiting forest requests
//! block new partition requests to keep renumbering from starving.

use std::collections::HashSet;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use tracing::{debug, warn};

use nestset_common::error::{NestError, NestResult};
use nestset_common::types::PartitionId;

/// Lock table statistics.
#[derive(Debug, Default)]
pub struct LockStats {
    /// Forest-wide acquisitions.
    pub forest_acquisitions: AtomicU64,
    /// Partition-set acquisitions.
    pub partition_acquisitions: AtomicU64,
    /// Requests that had to wait.
    pub waits: AtomicU64,
    /// Requests that gave up.
    pub timeouts: AtomicU64,
}

impl LockStats {
    /// Creates new stats.
    pub fn new() -> Self {
        Self::default()
    }

    fn record_forest(&self) {
        self.forest_acquisitions.fetch_add(1, AtomicOrdering::Relaxed);
    }

    fn record_partitions(&self) {
        self.partition_acquisitions
            .fetch_add(1, AtomicOrdering::Relaxed);
    }

    fn record_wait(&self) {
        self.waits.fetch_add(1, AtomicOrdering::Relaxed);
    }

    fn record_timeout(&self) {
        self.timeouts.fetch_add(1, AtomicOrdering::Relaxed);
    }
}

#[derive(Debug, Default)]
struct LockState {
    forest_exclusive: bool,
    forest_shared: usize,
    waiting_exclusive: usize,
    partitions: HashSet<PartitionId>,
}

impl LockState {
    fn forest_free(&self) -> bool {
        !self.forest_exclusive && self.forest_shared == 0
    }

    fn partitions_free(&self, wanted: &[PartitionId]) -> bool {
        !self.forest_exclusive
            && self.waiting_exclusive == 0
            && wanted.iter().all(|p| !self.partitions.contains(p))
    }
}

/// What a [`PartitionGuard`] holds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LockScope {
    /// The whole forest, exclusively.
    Forest,
    /// The listed partitions, with the forest shared.
    Partitions(Vec<PartitionId>),
}

/// Forest and partition locks for one tree table.
pub struct PartitionLocks {
    state: Mutex<LockState>,
    released: Condvar,
    timeout: Duration,
    stats: LockStats,
}

impl PartitionLocks {
    /// Creates a lock table whose requests wait at most `timeout`.
    pub fn new(timeout: Duration) -> Self {
        Self {
            state: Mutex::new(LockState::default()),
            released: Condvar::new(),
            timeout,
            stats: LockStats::new(),
        }
    }

    /// Returns the configured wait bound.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Returns the lock statistics.
    pub fn stats(&self) -> &LockStats {
        &self.stats
    }

    /// Takes the whole forest exclusively.
    pub fn lock_forest(&self) -> NestResult<PartitionGuard<'_>> {
        let start = Instant::now();
        let deadline = start + self.timeout;
        let mut state = self.state.lock();

        if !state.forest_free() {
            self.stats.record_wait();
            state.waiting_exclusive += 1;
            while !state.forest_free() {
                if self.released.wait_until(&mut state, deadline).timed_out()
                    && !state.forest_free()
                {
                    state.waiting_exclusive -= 1;
                    // Partition requests may have been held back by us.
                    self.released.notify_all();
                    return Err(self.timed_out(start));
                }
            }
            state.waiting_exclusive -= 1;
        }

        state.forest_exclusive = true;
        self.stats.record_forest();
        debug!("forest lock acquired");
        Ok(PartitionGuard {
            locks: self,
            scope: LockScope::Forest,
        })
    }

    /// Takes the given partitions exclusively and the forest shared.
    pub fn lock_partitions(&self, partitions: &[PartitionId]) -> NestResult<PartitionGuard<'_>> {
        let mut wanted = partitions.to_vec();
        wanted.sort();
        wanted.dedup();

        let start = Instant::now();
        let deadline = start + self.timeout;
        let mut state = self.state.lock();

        if !state.partitions_free(&wanted) {
            self.stats.record_wait();
            while !state.partitions_free(&wanted) {
                if self.released.wait_until(&mut state, deadline).timed_out()
                    && !state.partitions_free(&wanted)
                {
                    return Err(self.timed_out(start));
                }
            }
        }

        state.forest_shared += 1;
        state.partitions.extend(wanted.iter().copied());
        self.stats.record_partitions();
        debug!(partitions = ?wanted, "partition locks acquired");
        Ok(PartitionGuard {
            locks: self,
            scope: LockScope::Partitions(wanted),
        })
    }

    fn timed_out(&self, start: Instant) -> NestError {
        self.stats.record_timeout();
        let waited_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX);
        warn!(waited_ms, "timed out waiting for tree locks");
        NestError::LockTimeout { waited_ms }
    }

    fn release(&self, scope: &LockScope) {
        let mut state = self.state.lock();
        match scope {
            LockScope::Forest => state.forest_exclusive = false,
            LockScope::Partitions(held) => {
                state.forest_shared -= 1;
                for partition in held {
                    state.partitions.remove(partition);
                }
            }
        }
        drop(state);
        self.released.notify_all();
    }
}

impl Default for PartitionLocks {
    fn default() -> Self {
        Self::new(Duration::from_secs(30))
    }
}

impl fmt::Debug for PartitionLocks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("PartitionLocks")
            .field("forest_exclusive", &state.forest_exclusive)
            .field("forest_shared", &state.forest_shared)
            .field("partitions", &state.partitions.len())
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// RAII guard returned by [`PartitionLocks`]; releases on drop.
#[must_use = "the locks are released as soon as the guard is dropped"]
pub struct PartitionGuard<'a> {
    locks: &'a PartitionLocks,
    scope: LockScope,
}

impl PartitionGuard<'_> {
    /// What this guard holds.
    pub fn scope(&self) -> &LockScope {
        &self.scope
    }
}

impl Drop for PartitionGuard<'_> {
    fn drop(&mut self) {
        self.locks.release(&self.scope);
    }
}

impl fmt::Debug for PartitionGuard<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PartitionGuard")
            .field("scope", &self.scope)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nestset_common::error::ErrorCode;
    use std::sync::Arc;
    use std::thread;

    fn p(id: u64) -> PartitionId {
        PartitionId::new(id)
    }

    #[test]
    fn test_disjoint_partitions_coexist() {
        let locks = PartitionLocks::new(Duration::from_millis(50));
        let a = locks.lock_partitions(&[p(1), p(2)]).unwrap();
        let b = locks.lock_partitions(&[p(3)]).unwrap();
        assert_eq!(a.scope(), &LockScope::Partitions(vec![p(1), p(2)]));
        drop(a);
        drop(b);
        assert_eq!(locks.stats().partition_acquisitions.load(AtomicOrdering::Relaxed), 2);
    }

    #[test]
    fn test_overlapping_partitions_time_out() {
        let locks = PartitionLocks::new(Duration::from_millis(20));
        let _held = locks.lock_partitions(&[p(1)]).unwrap();
        let err = locks.lock_partitions(&[p(2), p(1)]).unwrap_err();
        assert_eq!(err.code(), ErrorCode::LockTimeout);
        assert!(err.is_retryable());
        assert_eq!(locks.stats().timeouts.load(AtomicOrdering::Relaxed), 1);
    }

    #[test]
    fn test_forest_excludes_partitions() {
        let locks = PartitionLocks::new(Duration::from_millis(20));
        let forest = locks.lock_forest().unwrap();
        assert!(locks.lock_partitions(&[p(1)]).is_err());
        drop(forest);

        let part = locks.lock_partitions(&[p(1)]).unwrap();
        assert!(locks.lock_forest().is_err());
        drop(part);
        assert!(locks.lock_forest().is_ok());
    }

    #[test]
    fn test_duplicate_partitions_in_one_request() {
        let locks = PartitionLocks::new(Duration::from_millis(20));
        let guard = locks.lock_partitions(&[p(4), p(4)]).unwrap();
        assert_eq!(guard.scope(), &LockScope::Partitions(vec![p(4)]));
    }

    #[test]
    fn test_waiter_is_woken_on_release() {
        let locks = Arc::new(PartitionLocks::new(Duration::from_secs(5)));
        let guard = locks.lock_forest().unwrap();

        let waiter = {
            let locks = Arc::clone(&locks);
            thread::spawn(move || {
                let acquired = locks.lock_partitions(&[p(1)]);
                acquired.is_ok()
            })
        };
        thread::sleep(Duration::from_millis(20));
        drop(guard);

        assert!(waiter.join().unwrap());
    }
}
