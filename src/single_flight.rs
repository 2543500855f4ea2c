//! Per-Key Build Deduplication
//!
//! [`SingleFlight`] lets many callers ask for the same expensive value while
//! at most one of them computes it. The first caller for a key becomes the
//! leader and runs the build; callers arriving meanwhile block until the
//! leader finishes, then probe again.
//!
//! The guard stores no results. Waiters learn the outcome by re-running
//! their probe (typically a cache lookup). If the leader failed, nothing was
//! stored, the probe misses again and one waiter takes over as the new
//! leader. Errors are not shared between callers.

use crate::error::Result;
use parking_lot::{Condvar, Mutex};
use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;
use std::sync::Arc;
use tracing::debug;

#[derive(Default)]
struct Flight {
    done: Mutex<bool>,
    cond: Condvar,
}

impl Flight {
    fn wait(&self) {
        let mut done = self.done.lock();
        while !*done {
            self.cond.wait(&mut done);
        }
    }

    fn land(&self) {
        *self.done.lock() = true;
        self.cond.notify_all();
    }
}

/// At-most-one concurrent build per key
pub struct SingleFlight<K> {
    flights: Mutex<HashMap<K, Arc<Flight>>>,
}

impl<K> Default for SingleFlight<K> {
    fn default() -> Self {
        Self {
            flights: Mutex::new(HashMap::new()),
        }
    }
}

impl<K> fmt::Debug for SingleFlight<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SingleFlight")
            .field("in_flight", &self.flights.lock().len())
            .finish()
    }
}

/// Removes the leader's flight and wakes its waiters, however the build ends
struct LeaderGuard<'a, K: Eq + Hash> {
    owner: &'a SingleFlight<K>,
    key: &'a K,
}

impl<K: Eq + Hash> Drop for LeaderGuard<'_, K> {
    fn drop(&mut self) {
        let flight = self.owner.flights.lock().remove(self.key);
        if let Some(flight) = flight {
            flight.land();
        }
    }
}

impl<K: Eq + Hash + Clone + fmt::Display> SingleFlight<K> {
    /// Create an empty guard
    pub fn new() -> Self {
        Self::default()
    }

    /// Return `probe()` if it yields a value; otherwise run `build` unless
    /// another caller is already building `key`, in which case wait for it
    /// and probe again.
    ///
    /// `build` is expected to publish its result where `probe` can see it.
    pub fn run<T, P, B>(&self, key: &K, probe: P, build: B) -> Result<T>
    where
        P: Fn() -> Option<T>,
        B: FnOnce() -> Result<T>,
    {
        loop {
            if let Some(value) = probe() {
                return Ok(value);
            }
            match self.join_or_lead(key) {
                Some(flight) => {
                    debug!(key = %key, "Waiting for in-flight build");
                    flight.wait();
                }
                None => break,
            }
        }

        let _guard = LeaderGuard { owner: self, key };
        // A previous leader may have published between our probe and taking the lead.
        if let Some(value) = probe() {
            return Ok(value);
        }
        build()
    }

    /// The existing flight for `key`, or `None` after registering a new one
    fn join_or_lead(&self, key: &K) -> Option<Arc<Flight>> {
        let mut flights = self.flights.lock();
        if let Some(flight) = flights.get(key) {
            return Some(Arc::clone(flight));
        }
        flights.insert(key.clone(), Arc::new(Flight::default()));
        None
    }

    /// Number of keys currently being built
    pub fn in_flight(&self) -> usize {
        self.flights.lock().len()
    }
}
