//! Partition selection for records with no explicit partition assignment.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU32, Ordering};

use rand::Rng;

/// Picks which partition a record with no explicit partition index lands
/// on, given the set of partitions a topic currently advertises.
pub trait Partitioner: std::fmt::Debug + Send + Sync {
    /// `partition_indices` must be non-empty; returns an index into it.
    fn partition(&self, key: Option<&[u8]>, partition_indices: &[i32]) -> i32;
}

/// Picks a uniformly random partition for every record, ignoring the key.
#[derive(Debug, Default)]
pub struct BasicRandom;

impl Partitioner for BasicRandom {
    fn partition(&self, _key: Option<&[u8]>, partition_indices: &[i32]) -> i32 {
        let idx = rand::thread_rng().gen_range(0..partition_indices.len());
        partition_indices[idx]
    }
}

/// Hashes the key to a partition when a key is present; falls back to a
/// monotonic counter (spread round-robin across partitions) when it's not.
#[derive(Debug, Default)]
pub struct RoundRobin {
    counter: AtomicU32,
}

impl Partitioner for RoundRobin {
    fn partition(&self, key: Option<&[u8]>, partition_indices: &[i32]) -> i32 {
        let idx = match key {
            Some(key) if !key.is_empty() => {
                let mut hasher = DefaultHasher::new();
                key.hash(&mut hasher);
                (hasher.finish() % partition_indices.len() as u64) as usize
            }
            _ => {
                let n = self.counter.fetch_add(1, Ordering::Relaxed);
                (n as usize) % partition_indices.len()
            }
        };
        partition_indices[idx]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn basic_random_always_picks_a_listed_partition() {
        let partitioner = BasicRandom;
        let partitions = [0, 1, 2, 3];
        for _ in 0..100 {
            let p = partitioner.partition(None, &partitions);
            assert!(partitions.contains(&p));
        }
    }

    #[test]
    fn round_robin_is_deterministic_for_a_fixed_key() {
        let partitioner = RoundRobin::default();
        let partitions = [0, 1, 2, 3];
        let a = partitioner.partition(Some(b"order-42"), &partitions);
        let b = partitioner.partition(Some(b"order-42"), &partitions);
        assert_eq!(a, b);
    }

    #[test]
    fn round_robin_without_key_cycles_through_partitions() {
        let partitioner = RoundRobin::default();
        let partitions = [10, 20, 30];
        let seen: Vec<i32> = (0..6)
            .map(|_| partitioner.partition(None, &partitions))
            .collect();
        assert_eq!(seen, vec![10, 20, 30, 10, 20, 30]);
    }
}
