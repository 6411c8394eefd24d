//! One flush round: route queued records to their partition leaders, build
//! one `Produce` request per broker, dispatch them concurrently, and
//! reconcile each record's outcome from the responses.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use futures::future::join_all;
use thiserror::Error;
use tokio::sync::oneshot;

use crate::connection::manager::ConnectionManager;
use crate::metadata::{ClusterMetadata, MetadataManager};
use crate::protocol::error::Error as KafkaError;
use crate::protocol::messages::produce::{
    ProduceRequest, ProduceRequestPartition, ProduceRequestTopic, ProduceResponse,
};
use crate::protocol::primitives::Records;
use crate::protocol::record::{build_batch, Record};

/// Acknowledgment policy requested from the partition leader.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AckPolicy {
    /// The leader does not wait for the write before responding -- in
    /// fact, with this client, it doesn't respond at all.
    None,
    /// The leader acknowledges once it has written the record locally.
    Leader,
    /// The leader acknowledges once all in-sync replicas have the record.
    All,
}

impl AckPolicy {
    pub fn as_wire_value(self) -> i16 {
        match self {
            Self::None => 0,
            Self::Leader => 1,
            Self::All => -1,
        }
    }
}

/// The terminal failure delivered through a record's completion channel.
#[derive(Debug, Clone, Error)]
#[error("{0}")]
pub struct ProduceError(pub String);

/// A record queued for delivery, carried from admission through to
/// resolution of its completion channel.
pub struct SenderMessage {
    pub key: Option<Vec<u8>>,
    pub value: Option<Vec<u8>>,
    pub timestamp_ms: i64,
    pub topic: String,
    pub partition_index: i32,
    error: Option<KafkaError>,
    completion: Option<oneshot::Sender<Result<(), ProduceError>>>,
}

impl SenderMessage {
    pub fn new(
        topic: String,
        partition_index: i32,
        key: Option<Vec<u8>>,
        value: Option<Vec<u8>>,
        completion: oneshot::Sender<Result<(), ProduceError>>,
    ) -> Self {
        let timestamp_ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as i64)
            .unwrap_or_default();

        Self {
            key,
            value,
            timestamp_ms,
            topic,
            partition_index,
            // Sentinel until routing/dispatch assigns a real outcome. Never
            // surfaced: every message is routed or explicitly failed before
            // `filter_and_resolve` runs.
            error: Some(KafkaError::UnknownServerError),
            completion: Some(completion),
        }
    }

    /// Bytes this record counts against `buffer_memory`.
    pub fn size(&self) -> usize {
        self.key.as_ref().map_or(0, Vec::len) + self.value.as_ref().map_or(0, Vec::len)
    }
}

fn resolve(message: &mut SenderMessage, result: Result<(), ProduceError>) {
    if let Some(tx) = message.completion.take() {
        let _ = tx.send(result);
    }
}

type BrokerKey = (String, i32);
type TopicPartition = (String, i32);

fn broker_for_topic_partition(
    snapshot: &ClusterMetadata,
    topic: &str,
    partition_index: i32,
) -> Option<BrokerKey> {
    let topic_meta = snapshot.topic(topic)?;
    if topic_meta.error.is_some() {
        return None;
    }
    let partition = topic_meta.partition(partition_index)?;
    if partition.error.is_some() {
        return None;
    }
    let broker = snapshot.broker_for_id(partition.leader_id)?;
    Some((broker.host.clone(), broker.port))
}

/// Owns one round's worth of queued records and drives them to completion.
pub struct Sender {
    connections: Arc<ConnectionManager>,
    metadata: Arc<MetadataManager>,
    request_timeout: Duration,
    acks: AckPolicy,
    messages: Vec<SenderMessage>,
}

impl Sender {
    pub fn new(
        connections: Arc<ConnectionManager>,
        metadata: Arc<MetadataManager>,
        request_timeout: Duration,
        acks: AckPolicy,
    ) -> Self {
        Self {
            connections,
            metadata,
            request_timeout,
            acks,
            messages: Vec::new(),
        }
    }

    /// Moves `messages` into this sender, preserving order. It is important
    /// that the caller does this and dispatches in the same step that
    /// drains the batcher's queue, so enqueue order is preserved end to end.
    pub fn move_messages(&mut self, messages: &mut Vec<SenderMessage>) {
        self.messages.append(messages);
    }

    pub fn messages_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Routes, dispatches, and reconciles exactly one round. Does not
    /// retry -- the caller's retry loop decides whether to call this again.
    pub async fn send_and_receive(&mut self) {
        let snapshot = self.metadata.current();
        let mut groups: HashMap<BrokerKey, HashMap<TopicPartition, Vec<usize>>> = HashMap::new();

        for (idx, message) in self.messages.iter_mut().enumerate() {
            match broker_for_topic_partition(&snapshot, &message.topic, message.partition_index) {
                Some(broker) => groups
                    .entry(broker)
                    .or_default()
                    .entry((message.topic.clone(), message.partition_index))
                    .or_default()
                    .push(idx),
                None => message.error = Some(KafkaError::UnknownTopicOrPartition),
            }
        }

        if groups.is_empty() {
            return;
        }

        let requests: Vec<(BrokerKey, ProduceRequest)> = groups
            .iter()
            .map(|(broker, by_tp)| (broker.clone(), self.build_request(by_tp)))
            .collect();

        let with_response = self.acks != AckPolicy::None;
        let futures = requests.into_iter().map(|(broker, request)| {
            let connections = Arc::clone(&self.connections);
            let timeout = self.request_timeout;
            async move {
                let outcome = dispatch(&connections, &broker, request, timeout, with_response).await;
                (broker, outcome)
            }
        });

        let responses = join_all(futures).await;

        for (broker, outcome) in responses {
            let Some(indices_by_tp) = groups.get(&broker) else {
                continue;
            };
            match outcome {
                Ok(Some(response)) => {
                    if response_warrants_disconnect(&response) {
                        self.connections.defer_disconnect(&broker.0, broker.1);
                    }
                    self.apply_response(indices_by_tp, response);
                }
                Ok(None) => self.mark_success(indices_by_tp),
                Err(err) => {
                    let kafka_error = crate::connection::connection_error_to_kafka_error(&err);
                    self.connections.defer_disconnect(&broker.0, broker.1);
                    self.mark_error(indices_by_tp, kafka_error);
                }
            }
        }
    }

    fn build_request(&self, by_tp: &HashMap<TopicPartition, Vec<usize>>) -> ProduceRequest {
        let mut topics: HashMap<String, Vec<ProduceRequestPartition>> = HashMap::new();

        for ((topic, partition_index), indices) in by_tp {
            let first_timestamp = self.messages[indices[0]].timestamp_ms;
            let records: Vec<Record> = indices
                .iter()
                .enumerate()
                .map(|(offset_delta, &idx)| {
                    let message = &self.messages[idx];
                    Record {
                        timestamp_delta: (message.timestamp_ms - first_timestamp) as i32,
                        offset_delta: offset_delta as i32,
                        key: message.key.clone(),
                        value: message.value.clone(),
                        headers: vec![],
                    }
                })
                .collect();

            let batch = build_batch(0, records);
            topics
                .entry(topic.clone())
                .or_default()
                .push(ProduceRequestPartition {
                    partition_index: *partition_index,
                    records: Records(vec![batch]),
                });
        }

        ProduceRequest {
            transactional_id: None,
            acks: self.acks.as_wire_value(),
            timeout_ms: self.request_timeout.as_millis() as i32,
            topics: topics
                .into_iter()
                .map(|(name, partitions)| ProduceRequestTopic { name, partitions })
                .collect(),
        }
    }

    fn apply_response(
        &mut self,
        indices_by_tp: &HashMap<TopicPartition, Vec<usize>>,
        response: ProduceResponse,
    ) {
        let mut by_tp: HashMap<(&str, i32), Option<KafkaError>> = HashMap::new();
        for topic in &response.topics {
            for partition in &topic.partitions {
                by_tp.insert((topic.name.as_str(), partition.partition_index), partition.error);
            }
        }

        for ((topic, partition_index), indices) in indices_by_tp {
            match by_tp.get(&(topic.as_str(), *partition_index)) {
                Some(None) => self.mark_success_indices(indices),
                Some(Some(error)) => self.mark_error_indices(indices, *error),
                // The broker answered but said nothing about a
                // topic/partition we asked for -- treat it the same as a
                // stale routing decision rather than assume success.
                None => self.mark_error_indices(indices, KafkaError::UnknownTopicOrPartition),
            }
        }
    }

    fn mark_success(&mut self, indices_by_tp: &HashMap<TopicPartition, Vec<usize>>) {
        for indices in indices_by_tp.values() {
            self.mark_success_indices(indices);
        }
    }

    fn mark_error(&mut self, indices_by_tp: &HashMap<TopicPartition, Vec<usize>>, error: KafkaError) {
        for indices in indices_by_tp.values() {
            self.mark_error_indices(indices, error);
        }
    }

    fn mark_success_indices(&mut self, indices: &[usize]) {
        for &idx in indices {
            self.messages[idx].error = None;
        }
    }

    fn mark_error_indices(&mut self, indices: &[usize], error: KafkaError) {
        for &idx in indices {
            self.messages[idx].error = Some(error);
        }
    }

    /// Resolves every message that's done (success or non-retriable
    /// failure), keeping retriable failures queued for the next round.
    /// Returns whether any remaining message's error means cached metadata
    /// should be refreshed before retrying.
    pub fn filter_and_resolve(&mut self) -> bool {
        let mut needs_refresh = false;
        let mut retained = Vec::with_capacity(self.messages.len());

        for mut message in self.messages.drain(..) {
            match message.error {
                None => resolve(&mut message, Ok(())),
                Some(error) if !error.is_retriable() => {
                    resolve(&mut message, Err(ProduceError(error.message().to_string())));
                }
                Some(error) => {
                    needs_refresh |= error.invalidates_metadata();
                    retained.push(message);
                }
            }
        }

        self.messages = retained;
        needs_refresh
    }

    /// Fails every still-queued record with its last-seen error.
    pub fn close(&mut self) {
        for mut message in self.messages.drain(..) {
            let error = message.error.unwrap_or(KafkaError::UnknownServerError);
            resolve(&mut message, Err(ProduceError(error.message().to_string())));
        }
    }
}

/// Whether any partition in `response` carries an error that should tear
/// down the connection it arrived on: `REQUEST_TIMED_OUT`,
/// `CORRUPT_MESSAGE`, and `NETWORK_EXCEPTION` all mean the broker side of
/// this connection is in a state the client can't trust going forward.
fn response_warrants_disconnect(response: &ProduceResponse) -> bool {
    response.topics.iter().any(|topic| {
        topic.partitions.iter().any(|partition| {
            matches!(
                partition.error,
                Some(KafkaError::RequestTimedOut)
                    | Some(KafkaError::CorruptMessage)
                    | Some(KafkaError::NetworkException)
            )
        })
    })
}

async fn dispatch(
    connections: &ConnectionManager,
    broker: &BrokerKey,
    request: ProduceRequest,
    timeout: Duration,
    with_response: bool,
) -> Result<Option<ProduceResponse>, crate::connection::Error> {
    let conn = connections.get_or_connect(&broker.0, broker.1).await?;
    if with_response {
        let response = conn.with_timeout(timeout, conn.send(&request)).await?;
        Ok(Some(response))
    } else {
        conn.with_timeout(timeout, conn.send_without_response(&request))
            .await?;
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ack_policy_wire_values_match_the_protocol() {
        assert_eq!(AckPolicy::None.as_wire_value(), 0);
        assert_eq!(AckPolicy::Leader.as_wire_value(), 1);
        assert_eq!(AckPolicy::All.as_wire_value(), -1);
    }

    #[test]
    fn sender_message_size_is_key_plus_value() {
        let (tx, _rx) = oneshot::channel();
        let message = SenderMessage::new(
            "orders".to_string(),
            0,
            Some(b"key".to_vec()),
            Some(b"value".to_vec()),
            tx,
        );
        assert_eq!(message.size(), 3 + 5);
    }

    #[test]
    fn broker_for_topic_partition_is_none_when_metadata_is_empty() {
        let snapshot = ClusterMetadata::default();
        assert!(broker_for_topic_partition(&snapshot, "orders", 0).is_none());
    }

    fn response_with_partition_error(error: Option<KafkaError>) -> ProduceResponse {
        ProduceResponse {
            topics: vec![crate::protocol::messages::produce::ProduceResponseTopic {
                name: "orders".to_string(),
                partitions: vec![crate::protocol::messages::produce::ProduceResponsePartition {
                    partition_index: 0,
                    error,
                    base_offset: 0,
                    log_append_time_ms: None,
                    log_start_offset: None,
                    record_errors: vec![],
                    error_message: None,
                }],
            }],
            throttle_time_ms: None,
        }
    }

    #[test]
    fn a_timed_out_partition_warrants_disconnect() {
        let response = response_with_partition_error(Some(KafkaError::RequestTimedOut));
        assert!(response_warrants_disconnect(&response));
    }

    #[test]
    fn an_ordinary_partition_error_does_not_warrant_disconnect() {
        let response = response_with_partition_error(Some(KafkaError::UnknownTopicOrPartition));
        assert!(!response_warrants_disconnect(&response));
    }

    #[test]
    fn a_clean_response_does_not_warrant_disconnect() {
        let response = response_with_partition_error(None);
        assert!(!response_warrants_disconnect(&response));
    }
}
