//! In-flight computation tracking for single-flight misses
//!
//! The first caller to miss on a fingerprint becomes the leader and receives a
//! [`Leader`] guard; later callers receive the shared [`Flight`] and block
//! until the leader resolves it. Dropping an unresolved guard (for example
//! while unwinding from a panicking computation) resolves the flight as
//! failed, so waiters are never stranded.

use std::collections::HashMap;
use std::sync::Arc;

use ahash::RandomState;
use parking_lot::{Condvar, Mutex};

use crate::key::Fingerprint;

enum State<V> {
    Running,
    Done(V),
    Failed,
}

/// A computation some other caller is running
pub(crate) struct Flight<V> {
    state: Mutex<State<V>>,
    resolved: Condvar,
}

impl<V: Clone> Flight<V> {
    fn new() -> Self {
        Self {
            state: Mutex::new(State::Running),
            resolved: Condvar::new(),
        }
    }

    /// Block until the leader finishes; `None` means it failed
    pub(crate) fn wait(&self) -> Option<V> {
        let mut state = self.state.lock();
        loop {
            match &*state {
                State::Running => self.resolved.wait(&mut state),
                State::Done(value) => return Some(value.clone()),
                State::Failed => return None,
            }
        }
    }

    fn resolve(&self, outcome: State<V>) {
        *self.state.lock() = outcome;
        self.resolved.notify_all();
    }
}

/// Result of joining the in-flight table
pub(crate) enum Role<'a, V: Clone> {
    /// This caller must compute
    Leader(Leader<'a, V>),
    /// Another caller is computing
    Follower(Arc<Flight<V>>),
}

/// Table of computations currently running, keyed by fingerprint
pub(crate) struct Flights<V> {
    inflight: Mutex<HashMap<Fingerprint, Arc<Flight<V>>, RandomState>>,
}

impl<V: Clone> Flights<V> {
    pub(crate) fn new() -> Self {
        Self {
            inflight: Mutex::new(HashMap::with_hasher(RandomState::new())),
        }
    }

    /// Register interest in `key`
    pub(crate) fn join(&self, key: &Fingerprint) -> Role<'_, V> {
        let mut inflight = self.inflight.lock();
        if let Some(flight) = inflight.get(key) {
            return Role::Follower(Arc::clone(flight));
        }

        let flight = Arc::new(Flight::new());
        inflight.insert(key.clone(), Arc::clone(&flight));
        Role::Leader(Leader {
            flights: self,
            key: key.clone(),
            flight,
            resolved: false,
        })
    }

    /// Number of computations currently running
    pub(crate) fn len(&self) -> usize {
        self.inflight.lock().len()
    }

    fn finish(&self, key: &Fingerprint, flight: &Arc<Flight<V>>, outcome: State<V>) {
        {
            let mut inflight = self.inflight.lock();
            if inflight.get(key).is_some_and(|f| Arc::ptr_eq(f, flight)) {
                inflight.remove(key);
            }
        }
        flight.resolve(outcome);
    }
}

/// Obligation to resolve a flight; resolves as failed on drop
pub(crate) struct Leader<'a, V: Clone> {
    flights: &'a Flights<V>,
    key: Fingerprint,
    flight: Arc<Flight<V>>,
    resolved: bool,
}

impl<V: Clone> Leader<'_, V> {
    /// Hand the computed value to every waiter
    pub(crate) fn complete(mut self, value: V) {
        self.resolved = true;
        self.flights
            .finish(&self.key, &self.flight, State::Done(value));
    }

    /// Wake waiters without a value
    pub(crate) fn fail(mut self) {
        self.resolved = true;
        self.flights.finish(&self.key, &self.flight, State::Failed);
    }
}

impl<V: Clone> Drop for Leader<'_, V> {
    fn drop(&mut self) {
        if !self.resolved {
            self.flights.finish(&self.key, &self.flight, State::Failed);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key::Args;
    use std::thread;
    use std::time::Duration;

    fn key(n: i32) -> Fingerprint {
        Args::new().arg(n).fingerprint().unwrap()
    }

    #[test]
    fn test_first_caller_leads() {
        let flights: Flights<i32> = Flights::new();

        let leader = match flights.join(&key(1)) {
            Role::Leader(leader) => leader,
            Role::Follower(_) => panic!("first caller should lead"),
        };
        assert!(matches!(flights.join(&key(1)), Role::Follower(_)));
        assert!(matches!(flights.join(&key(2)), Role::Leader(_)));
        assert_eq!(flights.len(), 1);

        leader.complete(10);
        assert_eq!(flights.len(), 0);
    }

    #[test]
    fn test_follower_receives_value() {
        let flights: Flights<i32> = Flights::new();
        let Role::Leader(leader) = flights.join(&key(1)) else {
            panic!("first caller should lead");
        };
        let Role::Follower(flight) = flights.join(&key(1)) else {
            panic!("second caller should follow");
        };

        thread::scope(|s| {
            let waiter = s.spawn(|| flight.wait());
            thread::sleep(Duration::from_millis(20));
            leader.complete(42);
            assert_eq!(waiter.join().unwrap(), Some(42));
        });
    }

    #[test]
    fn test_dropped_leader_fails_flight() {
        let flights: Flights<i32> = Flights::new();
        let Role::Leader(leader) = flights.join(&key(1)) else {
            panic!("first caller should lead");
        };
        let Role::Follower(flight) = flights.join(&key(1)) else {
            panic!("second caller should follow");
        };

        drop(leader);
        assert_eq!(flight.wait(), None);
        assert_eq!(flights.len(), 0);
        assert!(matches!(flights.join(&key(1)), Role::Leader(_)));
    }

    #[test]
    fn test_explicit_fail() {
        let flights: Flights<i32> = Flights::new();
        let Role::Leader(leader) = flights.join(&key(3)) else {
            panic!("first caller should lead");
        };
        let Role::Follower(flight) = flights.join(&key(3)) else {
            panic!("second caller should follow");
        };

        leader.fail();
        assert_eq!(flight.wait(), None);
    }
}
