//! Admits queued records and drains them into the wire, either
//! immediately (`linger_ms == 0`) or on a periodic, cooperatively
//! cancelable flush loop.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tracing::debug;

use crate::backoff::{retry_with_backoff, BackoffConfig, Retry};
use crate::connection::manager::ConnectionManager;
use crate::metadata::MetadataManager;

use super::sender::{AckPolicy, Sender, SenderMessage};

/// Batches and flushes queued records.
///
/// Admission is lock-free accounting against an atomic byte counter;
/// flushing serializes through a mutex so two concurrent flushes (one
/// triggered by admission, one by the periodic loop) don't race on the
/// same queue.
pub struct Batcher {
    connections: Arc<ConnectionManager>,
    metadata: Arc<MetadataManager>,
    queue: Mutex<Vec<SenderMessage>>,
    bytes_queued: AtomicUsize,
    buffer_memory: usize,
    linger: Duration,
    request_timeout: Duration,
    acks: AckPolicy,
    backoff: BackoffConfig,
    keep_refreshing: AtomicBool,
}

impl Batcher {
    pub fn new(
        connections: Arc<ConnectionManager>,
        metadata: Arc<MetadataManager>,
        buffer_memory: usize,
        linger: Duration,
        request_timeout: Duration,
        acks: AckPolicy,
        backoff: BackoffConfig,
    ) -> Self {
        Self {
            connections,
            metadata,
            queue: Mutex::new(Vec::new()),
            bytes_queued: AtomicUsize::new(0),
            buffer_memory,
            linger,
            request_timeout,
            acks,
            backoff,
            keep_refreshing: AtomicBool::new(false),
        }
    }

    /// Appends `message` to the queue. Triggers an immediate flush if
    /// lingering is disabled or the queue has grown past `buffer_memory`.
    pub async fn queue_message(self: &Arc<Self>, message: SenderMessage) {
        let size = message.size();
        {
            let mut queue = self.queue.lock().await;
            queue.push(message);
        }
        let queued = self.bytes_queued.fetch_add(size, Ordering::SeqCst) + size;

        if self.linger.is_zero() || queued > self.buffer_memory {
            let this = Arc::clone(self);
            tokio::spawn(async move {
                this.flush().await;
            });
        }
    }

    /// Runs one full flush cycle: move the queue into a sender, then retry
    /// dispatch/reconcile rounds until the queue drains or retries run out.
    pub async fn flush(&self) {
        let mut queue = self.queue.lock().await;
        if queue.is_empty() {
            return;
        }

        let mut sender = Sender::new(
            Arc::clone(&self.connections),
            Arc::clone(&self.metadata),
            self.request_timeout,
            self.acks,
        );

        // Moving the queue into the sender and dropping the counter by the
        // same amount must happen together, so a concurrent `queue_message`
        // racing this flush can't see a byte count that doesn't match what's
        // actually still queued.
        let moved_bytes: usize = queue.iter().map(SenderMessage::size).sum();
        sender.move_messages(&mut queue);
        self.bytes_queued.fetch_sub(moved_bytes, Ordering::SeqCst);
        drop(queue);

        retry_with_backoff(&self.backoff, |_retry_number| {
            let sender = &mut sender;
            let metadata = &self.metadata;
            async move {
                sender.send_and_receive().await;
                let needs_refresh = sender.filter_and_resolve();
                if sender.messages_empty() {
                    return Retry::No;
                }
                if needs_refresh {
                    let _ = metadata.refresh(&[]).await;
                }
                Retry::Yes
            }
        })
        .await;

        // Retries exhausted with records still queued: fail them with
        // their last-seen error rather than silently dropping them.
        sender.close();
    }

    /// Spawns the periodic flush loop. A no-op if lingering is disabled.
    pub fn start_flush_loop(self: &Arc<Self>) {
        if self.linger.is_zero() {
            return;
        }
        self.keep_refreshing.store(true, Ordering::SeqCst);
        let this = Arc::clone(self);
        tokio::spawn(async move {
            this.flush_loop().await;
        });
    }

    async fn flush_loop(self: Arc<Self>) {
        while self.keep_refreshing.load(Ordering::SeqCst) {
            tokio::time::sleep(self.linger).await;
            if !self.keep_refreshing.load(Ordering::SeqCst) {
                return;
            }
            self.flush().await;
        }
        debug!("Flush loop stopped");
    }

    pub fn stop_flush_loop(&self) {
        self.keep_refreshing.store(false, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_batcher_starts_with_an_empty_counter() {
        // Constructed without a runtime: just exercises the builder path.
        let connections = Arc::new(ConnectionManager::new(Arc::from("test-client"), None));
        let metadata = Arc::new(MetadataManager::new(Arc::clone(&connections), vec![]));
        let batcher = Batcher::new(
            connections,
            metadata,
            1024,
            Duration::from_millis(0),
            Duration::from_secs(1),
            AckPolicy::Leader,
            BackoffConfig::default(),
        );
        assert_eq!(batcher.bytes_queued.load(Ordering::SeqCst), 0);
    }
}
