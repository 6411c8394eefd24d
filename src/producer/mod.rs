//! The public producer: configuration, construction, and the
//! `init`/`produce`/`flush`/`disconnect` lifecycle.

pub mod batcher;
pub mod error;
pub mod sender;

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::oneshot;
use tracing::{info, warn};

use crate::backoff::BackoffConfig;
use crate::build_info::{
    DEFAULT_BATCH_SIZE_BYTES, DEFAULT_BUFFER_MEMORY_BYTES, DEFAULT_CLIENT_ID,
    DEFAULT_CONNECT_TIMEOUT_MS, DEFAULT_LINGER_MS, DEFAULT_METADATA_REFRESH_INTERVAL_MS,
    DEFAULT_REQUEST_TIMEOUT_MS, DEFAULT_RETRIES,
};
use crate::connection::manager::{parse_host_port, ConnectionManager};
use crate::metadata::MetadataManager;
use crate::partitioner::{BasicRandom, Partitioner};

use self::batcher::Batcher;
use self::error::{Error, Result};
use self::sender::{AckPolicy, ProduceError, SenderMessage};

/// Producer configuration, named and defaulted the way Kafka's own
/// producer properties are.
pub struct ProducerConfig {
    pub client_id: Arc<str>,
    pub bootstrap_servers: Vec<String>,
    pub acks: AckPolicy,
    pub linger: Duration,
    pub buffer_memory: usize,
    pub retries: u32,
    /// Advisory upper bound on a single batch; the primary admission cap
    /// is `buffer_memory`. Kept for parity with the configuration surface,
    /// not enforced independently.
    pub batch_size: usize,
    pub request_timeout: Duration,
    pub metadata_refresh_interval: Duration,
    pub partitioner: Arc<dyn Partitioner>,
    pub retry_backoff: BackoffConfig,
}

impl std::fmt::Debug for ProducerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProducerConfig")
            .field("client_id", &self.client_id)
            .field("bootstrap_servers", &self.bootstrap_servers)
            .field("acks", &self.acks)
            .field("linger", &self.linger)
            .field("buffer_memory", &self.buffer_memory)
            .field("retries", &self.retries)
            .finish_non_exhaustive()
    }
}

/// Builds a [`Producer`], defaulting every field `spec.md` leaves optional.
pub struct ProducerBuilder {
    bootstrap_servers: Vec<String>,
    client_id: Arc<str>,
    acks: AckPolicy,
    linger: Duration,
    buffer_memory: usize,
    retries: u32,
    batch_size: usize,
    request_timeout: Duration,
    metadata_refresh_interval: Duration,
    partitioner: Arc<dyn Partitioner>,
    retry_backoff: BackoffConfig,
}

impl ProducerBuilder {
    pub fn new(bootstrap_servers: Vec<String>) -> Self {
        Self {
            bootstrap_servers,
            client_id: Arc::from(DEFAULT_CLIENT_ID),
            acks: AckPolicy::All,
            linger: Duration::from_millis(DEFAULT_LINGER_MS),
            buffer_memory: DEFAULT_BUFFER_MEMORY_BYTES,
            retries: DEFAULT_RETRIES,
            batch_size: DEFAULT_BATCH_SIZE_BYTES,
            request_timeout: Duration::from_millis(DEFAULT_REQUEST_TIMEOUT_MS),
            metadata_refresh_interval: Duration::from_millis(DEFAULT_METADATA_REFRESH_INTERVAL_MS),
            partitioner: Arc::new(BasicRandom),
            retry_backoff: BackoffConfig::default(),
        }
    }

    pub fn client_id(mut self, client_id: impl Into<Arc<str>>) -> Self {
        self.client_id = client_id.into();
        self
    }

    pub fn acks(mut self, acks: AckPolicy) -> Self {
        self.acks = acks;
        self
    }

    pub fn linger(mut self, linger: Duration) -> Self {
        self.linger = linger;
        self
    }

    pub fn buffer_memory(mut self, buffer_memory: usize) -> Self {
        self.buffer_memory = buffer_memory;
        self
    }

    pub fn retries(mut self, retries: u32) -> Self {
        self.retries = retries;
        self
    }

    pub fn batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn metadata_refresh_interval(mut self, interval: Duration) -> Self {
        self.metadata_refresh_interval = interval;
        self
    }

    pub fn partitioner(mut self, partitioner: Arc<dyn Partitioner>) -> Self {
        self.partitioner = partitioner;
        self
    }

    pub fn retry_backoff(mut self, backoff: BackoffConfig) -> Self {
        self.retry_backoff = backoff;
        self
    }

    pub fn build(self) -> Result<Producer> {
        Producer::from_config(ProducerConfig {
            client_id: self.client_id,
            bootstrap_servers: self.bootstrap_servers,
            acks: self.acks,
            linger: self.linger,
            buffer_memory: self.buffer_memory,
            retries: self.retries,
            batch_size: self.batch_size,
            request_timeout: self.request_timeout,
            metadata_refresh_interval: self.metadata_refresh_interval,
            partitioner: self.partitioner,
            retry_backoff: self.retry_backoff,
        })
    }
}

impl std::fmt::Debug for ProducerBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProducerBuilder").finish_non_exhaustive()
    }
}

/// A running Kafka producer: admits records, batches them, and drives them
/// to their partition leaders.
///
/// Must be constructed with [`ProducerBuilder`] and initialized with
/// [`Producer::init`] before [`Producer::produce`] is called.
pub struct Producer {
    connections: Arc<ConnectionManager>,
    metadata: Arc<MetadataManager>,
    batcher: Arc<Batcher>,
    seed_brokers: Vec<(String, i32)>,
    partitioner: Arc<dyn Partitioner>,
    metadata_refresh_interval: Duration,
}

impl std::fmt::Debug for Producer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Producer").finish_non_exhaustive()
    }
}

impl Producer {
    /// Builds a producer directly from a [`ProducerConfig`], bypassing
    /// [`ProducerBuilder`]. `ProducerBuilder::build` is the usual entry
    /// point; this exists for callers that already have a fully-formed
    /// config, e.g. one assembled from an external properties file.
    pub fn from_config(config: ProducerConfig) -> Result<Producer> {
        if config.bootstrap_servers.is_empty() {
            return Err(Error::Config(
                "at least one bootstrap server is required".to_string(),
            ));
        }

        let seed_brokers = config
            .bootstrap_servers
            .iter()
            .map(|addr| parse_host_port(addr).map_err(|e| Error::Config(e.to_string())))
            .collect::<Result<Vec<_>>>()?;

        let mut retry_backoff = config.retry_backoff;
        retry_backoff.max_retries = config.retries;

        let connections = Arc::new(ConnectionManager::new(
            Arc::clone(&config.client_id),
            Some(Duration::from_millis(DEFAULT_CONNECT_TIMEOUT_MS)),
        ));
        let metadata = Arc::new(MetadataManager::new(
            Arc::clone(&connections),
            seed_brokers.clone(),
        ));
        let batcher = Arc::new(Batcher::new(
            Arc::clone(&connections),
            Arc::clone(&metadata),
            config.buffer_memory,
            config.linger,
            config.request_timeout,
            config.acks,
            retry_backoff,
        ));

        Ok(Producer {
            connections,
            metadata,
            batcher,
            seed_brokers,
            partitioner: config.partitioner,
            metadata_refresh_interval: config.metadata_refresh_interval,
        })
    }

    /// Opens every bootstrap connection in parallel, performs a first
    /// metadata refresh, then starts the background metadata-refresh and
    /// flush loops.
    pub async fn init(&self) -> Result<()> {
        let dials = self.seed_brokers.iter().map(|(host, port)| {
            let connections = Arc::clone(&self.connections);
            let host = host.clone();
            let port = *port;
            async move { connections.get_or_connect(&host, port).await }
        });

        let dial_results = futures::future::join_all(dials).await;
        let all_failed = dial_results.iter().all(|r| r.is_err());
        for result in &dial_results {
            if let Err(e) = result {
                warn!(error = %e, "Failed to open a bootstrap connection");
            }
        }
        if all_failed {
            if let Some(Err(e)) = dial_results.into_iter().find(|r| r.is_err()) {
                return Err(Error::Connection(e));
            }
        }

        self.metadata.refresh(&[]).await?;

        let metadata = Arc::clone(&self.metadata);
        let interval = self.metadata_refresh_interval;
        tokio::spawn(async move {
            metadata.run_refresh_loop(interval).await;
        });

        self.batcher.start_flush_loop();

        info!("Producer initialized");
        Ok(())
    }

    /// Queues a record for `topic` and resolves once it's acknowledged
    /// according to the configured `acks`, or fails with the terminal
    /// error.
    pub async fn produce(
        &self,
        topic: impl Into<String>,
        key: Option<Vec<u8>>,
        value: Option<Vec<u8>>,
    ) -> Result<()> {
        let topic = topic.into();
        let partition_index = self.choose_partition(&topic, key.as_deref()).await?;

        let (tx, rx) = oneshot::channel();
        let message = SenderMessage::new(topic, partition_index, key, value, tx);
        self.batcher.queue_message(message).await;

        match rx.await {
            Ok(result) => result.map_err(Error::Produce),
            Err(_) => Err(Error::Produce(ProduceError(
                "producer was disconnected before the record was acknowledged".to_string(),
            ))),
        }
    }

    async fn choose_partition(&self, topic: &str, key: Option<&[u8]>) -> Result<i32> {
        let mut snapshot = self.metadata.current();
        if snapshot.topic(topic).filter(|t| t.error.is_none()).is_none() {
            self.metadata.refresh(&[topic.to_string()]).await?;
            snapshot = self.metadata.current();
        }

        let indices: Vec<i32> = snapshot
            .topic(topic)
            .filter(|t| t.error.is_none())
            .map(|t| t.partitions.iter().map(|p| p.partition_index).collect())
            .unwrap_or_default();

        if indices.is_empty() {
            return Err(Error::Produce(ProduceError(format!(
                "no known partitions for topic '{topic}'"
            ))));
        }

        Ok(self.partitioner.partition(key, &indices))
    }

    /// Forces a flush cycle and awaits it.
    pub async fn flush(&self) {
        self.batcher.flush().await;
    }

    /// Stops the flush loop, stops the metadata-refresh loop, and closes
    /// every broker connection. Records still in flight are failed with
    /// their last-observed error.
    pub async fn disconnect(&self) {
        self.batcher.stop_flush_loop();
        self.metadata.request_stop();
        self.batcher.flush().await;
        self.connections.disconnect_all().await;
        info!("Producer disconnected");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_rejects_empty_bootstrap_list() {
        let err = ProducerBuilder::new(vec![]).build().unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn builder_rejects_malformed_bootstrap_address() {
        let err = ProducerBuilder::new(vec!["localhost".to_string()])
            .build()
            .unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn builder_accepts_a_well_formed_bootstrap_list() {
        let producer = ProducerBuilder::new(vec!["localhost:9092".to_string()])
            .client_id("test-producer")
            .acks(AckPolicy::Leader)
            .build()
            .unwrap();
        assert_eq!(producer.seed_brokers, vec![("localhost".to_string(), 9092)]);
    }
}
