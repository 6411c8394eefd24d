//! Cluster metadata cache: a background refresh loop feeding an
//! atomically-swapped, sorted snapshot that the batcher/sender reads
//! without ever blocking on a network round trip.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use tracing::warn;

use crate::connection::manager::ConnectionManager;
use crate::protocol::error::Error as KafkaError;
use crate::protocol::messages::metadata::{
    MetadataRequest, MetadataRequestTopic, MetadataResponse, MetadataResponseBroker,
    MetadataResponsePartition, MetadataResponseTopic,
};

/// A point-in-time view of the cluster, sorted so the sender can route
/// records to a leader with a binary search instead of a linear scan.
///
/// Brokers are sorted by `node_id`; topics are sorted by `name`; partitions
/// within a topic are sorted by `partition_index`. When metadata from the
/// broker includes the same key twice (which shouldn't happen, but brokers
/// have been known to disagree with themselves across MetadataResponse
/// pages) the error-free entry wins, on the theory that a broker that
/// reports an error for a key it also reports cleanly is mid-transition
/// and the clean entry is more likely current.
#[derive(Debug, Clone, Default)]
pub struct ClusterMetadata {
    pub brokers: Vec<MetadataResponseBroker>,
    pub topics: Vec<TopicMetadata>,
}

#[derive(Debug, Clone)]
pub struct TopicMetadata {
    pub name: String,
    pub error: Option<KafkaError>,
    pub partitions: Vec<MetadataResponsePartition>,
}

impl ClusterMetadata {
    fn from_response(response: MetadataResponse) -> Self {
        let mut brokers = response.brokers;
        brokers.sort_by_key(|b| b.node_id);
        brokers.dedup_by_key(|b| b.node_id);

        let mut topics: Vec<TopicMetadata> = response
            .topics
            .into_iter()
            .map(TopicMetadata::from_response)
            .collect();
        topics.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| error_rank(&a.error).cmp(&error_rank(&b.error))));
        topics.dedup_by(|a, b| {
            if a.name == b.name {
                // `a` is the later (worse-or-equal ranked) element in a
                // `dedup_by` pass; keep whichever of the pair is error-free.
                if b.error.is_none() {
                    *a = b.clone();
                }
                true
            } else {
                false
            }
        });

        Self { brokers, topics }
    }

    /// Binary search for a broker by node id. A miss here means routing
    /// failed, not undefined behavior -- callers turn it into
    /// `UnknownTopicOrPartition` for the affected records.
    pub fn broker_for_id(&self, node_id: i32) -> Option<&MetadataResponseBroker> {
        self.brokers
            .binary_search_by_key(&node_id, |b| b.node_id)
            .ok()
            .map(|idx| &self.brokers[idx])
    }

    pub fn topic(&self, name: &str) -> Option<&TopicMetadata> {
        self.topics
            .binary_search_by(|t| t.name.as_str().cmp(name))
            .ok()
            .map(|idx| &self.topics[idx])
    }
}

impl TopicMetadata {
    fn from_response(topic: MetadataResponseTopic) -> Self {
        let mut partitions = topic.partitions;
        partitions.sort_by(|a, b| {
            a.partition_index
                .cmp(&b.partition_index)
                .then_with(|| error_rank(&a.error).cmp(&error_rank(&b.error)))
        });
        partitions.dedup_by(|a, b| {
            if a.partition_index == b.partition_index {
                if b.error.is_none() {
                    *a = b.clone();
                }
                true
            } else {
                false
            }
        });

        Self {
            name: topic.name,
            error: topic.error,
            partitions,
        }
    }

    pub fn partition(&self, index: i32) -> Option<&MetadataResponsePartition> {
        self.partitions
            .binary_search_by_key(&index, |p| p.partition_index)
            .ok()
            .map(|idx| &self.partitions[idx])
    }
}

fn error_rank(error: &Option<KafkaError>) -> u8 {
    if error.is_none() {
        0
    } else {
        1
    }
}

/// Background-refreshed metadata cache.
///
/// `refresh` is failure-tolerant: a refresh attempt that can't reach any
/// seed broker leaves the previous snapshot in place rather than clearing
/// it, so a transient network blip doesn't make every partition look
/// unroutable.
pub struct MetadataManager {
    connections: Arc<ConnectionManager>,
    seed_brokers: Vec<(String, i32)>,
    snapshot: RwLock<Arc<ClusterMetadata>>,
    stop: AtomicBool,
}

impl MetadataManager {
    pub fn new(connections: Arc<ConnectionManager>, seed_brokers: Vec<(String, i32)>) -> Self {
        Self {
            connections,
            seed_brokers,
            snapshot: RwLock::new(Arc::new(ClusterMetadata::default())),
            stop: AtomicBool::new(false),
        }
    }

    pub fn current(&self) -> Arc<ClusterMetadata> {
        Arc::clone(&self.snapshot.read())
    }

    pub fn request_stop(&self) {
        self.stop.store(true, Ordering::Relaxed);
    }

    /// Fetches fresh metadata for `topics` (or the whole cluster when
    /// empty) and atomically replaces the cached snapshot on success.
    /// Every known broker, then every seed broker, is tried in order via
    /// the connection manager; the first one that answers wins. If none
    /// do, the previous snapshot is left in place and
    /// [`crate::connection::Error::MetadataRefreshFailed`] is returned.
    pub async fn refresh(&self, topics: &[String]) -> Result<(), crate::connection::Error> {
        let candidates = self.candidate_addresses();

        let request = MetadataRequest {
            topics: if topics.is_empty() {
                None
            } else {
                Some(
                    topics
                        .iter()
                        .map(|name| MetadataRequestTopic { name: name.clone() })
                        .collect(),
                )
            },
            allow_auto_topic_creation: Some(false),
            include_cluster_authorized_operations: Some(false),
            include_topic_authorized_operations: Some(false),
        };

        let response = self
            .connections
            .ask_for_metadata(&candidates, &request)
            .await?;
        *self.snapshot.write() = Arc::new(ClusterMetadata::from_response(response));
        Ok(())
    }

    fn candidate_addresses(&self) -> Vec<(String, i32)> {
        let snapshot = self.current();
        let mut addrs: Vec<(String, i32)> = snapshot
            .brokers
            .iter()
            .map(|b| (b.host.clone(), b.port))
            .collect();
        addrs.extend(self.seed_brokers.iter().cloned());
        addrs
    }

    /// Runs the periodic refresh loop until [`Self::request_stop`] is
    /// called. Intended to be spawned as its own task.
    pub async fn run_refresh_loop(self: Arc<Self>, interval: Duration) {
        let mut tick = tokio::time::interval(interval);
        loop {
            tick.tick().await;
            if self.stop.load(Ordering::Relaxed) {
                return;
            }
            if let Err(e) = self.refresh(&[]).await {
                warn!(error = %e, "Background metadata refresh failed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::error::Error as KafkaError;

    fn broker(id: i32) -> MetadataResponseBroker {
        MetadataResponseBroker {
            node_id: id,
            host: format!("broker-{id}"),
            port: 9092,
            rack: None,
        }
    }

    fn partition(index: i32, error: Option<KafkaError>) -> MetadataResponsePartition {
        MetadataResponsePartition {
            error,
            partition_index: index,
            leader_id: 0,
            leader_epoch: None,
            replica_nodes: vec![],
            isr_nodes: vec![],
            offline_replicas: vec![],
        }
    }

    #[test]
    fn brokers_are_sorted_by_node_id() {
        let response = MetadataResponse {
            throttle_time_ms: None,
            brokers: vec![broker(3), broker(1), broker(2)],
            cluster_id: None,
            controller_id: None,
            topics: vec![],
        };
        let meta = ClusterMetadata::from_response(response);
        let ids: Vec<i32> = meta.brokers.iter().map(|b| b.node_id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
    }

    #[test]
    fn broker_for_id_is_a_binary_search_miss_not_a_panic() {
        let meta = ClusterMetadata::from_response(MetadataResponse {
            throttle_time_ms: None,
            brokers: vec![broker(1)],
            cluster_id: None,
            controller_id: None,
            topics: vec![],
        });
        assert!(meta.broker_for_id(999).is_none());
        assert!(meta.broker_for_id(1).is_some());
    }

    #[test]
    fn duplicate_partitions_prefer_the_error_free_entry() {
        let topic = MetadataResponseTopic {
            error: None,
            name: "orders".to_string(),
            is_internal: Some(false),
            partitions: vec![
                partition(0, Some(KafkaError::LeaderNotAvailable)),
                partition(0, None),
            ],
        };
        let meta = TopicMetadata::from_response(topic);
        assert_eq!(meta.partitions.len(), 1);
        assert!(meta.partitions[0].error.is_none());
    }

    #[test]
    fn partitions_are_sorted_by_index() {
        let topic = MetadataResponseTopic {
            error: None,
            name: "orders".to_string(),
            is_internal: Some(false),
            partitions: vec![partition(2, None), partition(0, None), partition(1, None)],
        };
        let meta = TopicMetadata::from_response(topic);
        let indices: Vec<i32> = meta.partitions.iter().map(|p| p.partition_index).collect();
        assert_eq!(indices, vec![0, 1, 2]);
    }
}
