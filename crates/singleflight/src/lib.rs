//! Per-key single-flight dispatcher.
//!
//! When multiple callers request the same key simultaneously, only one
//! execution of the underlying work happens; every caller receives a clone
//! of the same outcome. There is no memoization across time: a call that
//! arrives after the outcome was published starts a fresh execution.
//!
//! The work runs on a detached task, so a caller that goes away mid-flight
//! never cancels work other waiters depend on.

use parking_lot::Mutex;
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::watch;

/// One in-flight execution for a key.
///
/// At any instant at most one flight exists per key on a node; that is the
/// coalescing guarantee.
struct Flight<T> {
    /// Receives the published outcome. `None` until the leader publishes.
    rx: watch::Receiver<Option<T>>,
    /// Callers that joined after the flight started.
    waiters: u64,
}

type FlightMap<T> = Arc<Mutex<HashMap<String, Flight<T>>>>;

/// Counters for observing coalescing behaviour.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlightStats {
    /// Calls that started a fresh execution.
    pub led: u64,
    /// Calls that joined an existing flight.
    pub joined: u64,
}

/// Single-flight dispatcher over an in-flight table.
///
/// # Guarantees
///
/// - Exactly one execution per flight; every waiter observes the same
///   outcome (clone).
/// - Publication and record removal happen in one critical section, so a
///   call arriving strictly after publication always starts a new flight.
/// - The executing future is detached from its callers; dropping a waiter
///   does not cancel it.
pub struct SingleFlight<T> {
    flights: FlightMap<T>,
    led: AtomicU64,
    joined: AtomicU64,
}

impl<T: Clone + Send + Sync + 'static> SingleFlight<T> {
    pub fn new() -> Self {
        Self {
            flights: Arc::new(Mutex::new(HashMap::new())),
            led: AtomicU64::new(0),
            joined: AtomicU64::new(0),
        }
    }

    /// Runs `fut` under single-flight semantics for `key`.
    ///
    /// If no flight exists for `key`, `fut` is spawned as the leader and
    /// this caller waits for its outcome. Otherwise `fut` is dropped
    /// unexecuted and this caller joins the existing flight.
    pub async fn run<F>(&self, key: &str, fut: F) -> T
    where
        F: Future<Output = T> + Send + 'static,
    {
        let mut rx = {
            let mut flights = self.flights.lock();
            match flights.entry(key.to_string()) {
                Entry::Occupied(mut entry) => {
                    entry.get_mut().waiters += 1;
                    self.joined.fetch_add(1, Ordering::Relaxed);
                    tracing::trace!(key, "joined in-flight call");
                    entry.get().rx.clone()
                }
                Entry::Vacant(slot) => {
                    let (tx, rx) = watch::channel(None);
                    slot.insert(Flight {
                        rx: rx.clone(),
                        waiters: 0,
                    });
                    self.led.fetch_add(1, Ordering::Relaxed);
                    tracing::trace!(key, "leading new call");
                    tokio::spawn(drive(Arc::clone(&self.flights), key.to_string(), tx, fut));
                    rx
                }
            }
        };

        loop {
            let published = (*rx.borrow_and_update()).clone();
            if let Some(outcome) = published {
                return outcome;
            }
            if rx.changed().await.is_err() {
                // Only reachable if the leader task died without publishing,
                // i.e. the future panicked.
                panic!("single-flight leader for key terminated without publishing");
            }
        }
    }

    /// Number of keys currently in flight.
    pub fn in_flight(&self) -> usize {
        self.flights.lock().len()
    }

    pub fn stats(&self) -> FlightStats {
        FlightStats {
            led: self.led.load(Ordering::Relaxed),
            joined: self.joined.load(Ordering::Relaxed),
        }
    }
}

impl<T: Clone + Send + Sync + 'static> Default for SingleFlight<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Leader task: run the work, then remove the record and publish the
/// outcome under one critical section.
///
/// Removing before publishing means a caller that observes the outcome can
/// never find the stale record afterwards; the next call for the key leads
/// a fresh flight.
async fn drive<T, F>(flights: FlightMap<T>, key: String, tx: watch::Sender<Option<T>>, fut: F)
where
    T: Clone + Send + Sync + 'static,
    F: Future<Output = T> + Send + 'static,
{
    let mut guard = FlightGuard {
        flights,
        key,
        armed: true,
    };
    let outcome = fut.await;
    guard.publish(tx, outcome);
}

/// Removes the flight record even if the leader future panics, so the key
/// is never wedged. On the normal path `publish` disarms it.
struct FlightGuard<T> {
    flights: FlightMap<T>,
    key: String,
    armed: bool,
}

impl<T> FlightGuard<T> {
    fn publish(&mut self, tx: watch::Sender<Option<T>>, outcome: T) {
        let mut flights = self.flights.lock();
        self.armed = false;
        if let Some(flight) = flights.remove(&self.key) {
            tracing::trace!(key = %self.key, waiters = flight.waiters, "flight published");
        }
        let _ = tx.send(Some(outcome));
    }
}

impl<T> Drop for FlightGuard<T> {
    fn drop(&mut self) {
        if self.armed {
            self.flights.lock().remove(&self.key);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_single_caller_runs_once() {
        let flights: SingleFlight<u32> = SingleFlight::new();
        let out = flights.run("k", async { 7 }).await;
        assert_eq!(out, 7);
        assert_eq!(flights.in_flight(), 0);
        assert_eq!(flights.stats(), FlightStats { led: 1, joined: 0 });
    }

    #[tokio::test]
    async fn test_sequential_calls_do_not_memoize() {
        let flights: SingleFlight<u32> = SingleFlight::new();
        assert_eq!(flights.run("k", async { 1 }).await, 1);
        assert_eq!(flights.run("k", async { 2 }).await, 2);
        assert_eq!(flights.stats(), FlightStats { led: 2, joined: 0 });
    }

    #[tokio::test]
    async fn test_joined_future_is_dropped_unexecuted() {
        let flights: Arc<SingleFlight<u32>> = Arc::new(SingleFlight::new());

        let slow = {
            let flights = Arc::clone(&flights);
            tokio::spawn(async move {
                flights
                    .run("k", async {
                        tokio::time::sleep(Duration::from_millis(100)).await;
                        1
                    })
                    .await
            })
        };
        // Give the leader time to register its flight.
        tokio::time::sleep(Duration::from_millis(20)).await;

        let joined = flights.run("k", async { 2 }).await;
        assert_eq!(joined, 1, "joiner must observe the leader's outcome");
        assert_eq!(slow.await.unwrap(), 1);
    }
}
