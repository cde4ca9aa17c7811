//! Singleflight: concurrent callers with the same key share one execution.

use std::hash::Hash;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tokio::sync::broadcast;

/// Outcome of `Singleflight::acquire`.
pub enum Slot<V> {
    /// First caller for the key. Runs the work and publishes through the sender.
    Leader(broadcast::Sender<V>),
    /// Work for the key is already running; wait on the receiver.
    Follower(broadcast::Receiver<V>),
}

/// Registry of in-flight work keyed by `K`, publishing values of type `V`.
///
/// Only concurrent callers are coalesced. Once the leader completes, the key
/// is removed and the next caller starts a fresh execution.
pub struct Singleflight<K, V> {
    in_flight: DashMap<K, broadcast::Sender<V>>,
}

impl<K, V> Singleflight<K, V>
where
    K: Hash + Eq + Clone,
    V: Clone,
{
    pub fn new() -> Self {
        Self {
            in_flight: DashMap::new(),
        }
    }

    /// Registers the caller as leader or subscribes it as follower.
    ///
    /// Check and insert happen under one entry lock, so two callers can
    /// never both become leader for the same key.
    pub fn acquire(&self, key: K) -> Slot<V> {
        match self.in_flight.entry(key) {
            Entry::Occupied(entry) => Slot::Follower(entry.get().subscribe()),
            Entry::Vacant(entry) => {
                let (tx, _rx) = broadcast::channel(1);
                entry.insert(tx.clone());
                Slot::Leader(tx)
            }
        }
    }

    /// Number of keys currently in flight.
    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }

    fn remove(&self, key: &K) {
        self.in_flight.remove(key);
    }
}

impl<K, V> Default for Singleflight<K, V>
where
    K: Hash + Eq + Clone,
    V: Clone,
{
    fn default() -> Self {
        Self::new()
    }
}

/// Removes the leader's key when dropped, including on panic or cancellation.
///
/// Followers of a leader that never published see a closed channel and retry.
pub struct LeaderGuard<'a, K, V>
where
    K: Hash + Eq + Clone,
    V: Clone,
{
    flight: &'a Singleflight<K, V>,
    key: K,
}

impl<'a, K, V> LeaderGuard<'a, K, V>
where
    K: Hash + Eq + Clone,
    V: Clone,
{
    pub fn new(flight: &'a Singleflight<K, V>, key: K) -> Self {
        Self { flight, key }
    }
}

impl<K, V> Drop for LeaderGuard<'_, K, V>
where
    K: Hash + Eq + Clone,
    V: Clone,
{
    fn drop(&mut self) {
        self.flight.remove(&self.key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_second_caller_follows_until_leader_finishes() {
        let flight: Singleflight<&str, u32> = Singleflight::new();

        let Slot::Leader(tx) = flight.acquire("k") else {
            panic!("first caller must lead");
        };
        let Slot::Follower(mut rx) = flight.acquire("k") else {
            panic!("second caller must follow");
        };
        assert_eq!(flight.in_flight(), 1);

        {
            let _guard = LeaderGuard::new(&flight, "k");
            tx.send(7).unwrap();
        }

        assert_eq!(rx.recv().await.unwrap(), 7);
        assert_eq!(flight.in_flight(), 0);
        assert!(matches!(flight.acquire("k"), Slot::Leader(_)));
    }

    #[tokio::test]
    async fn test_dropped_leader_closes_followers() {
        let flight: Singleflight<&str, u32> = Singleflight::new();

        let leader = flight.acquire("k");
        let Slot::Follower(mut rx) = flight.acquire("k") else {
            panic!("second caller must follow");
        };

        drop(LeaderGuard::new(&flight, "k"));
        drop(leader);

        assert!(rx.recv().await.is_err());
        assert_eq!(flight.in_flight(), 0);
    }
}
