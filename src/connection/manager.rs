//! Connection pool keyed by `host:port`.
//!
//! Connections are created lazily and reused; admission into the pool
//! (looking a connection up, creating it if absent) is serialized per key
//! so two concurrent callers never race to dial the same broker twice.
//! Disconnects triggered by a faulty response are deferred: rather than
//! tearing the connection down on the caller's stack, a task is spawned
//! that joins a shared pending-disconnect lock, so a burst of faults
//! against different brokers still tears each one down one at a time, in
//! the order the faults were observed, without the original caller waiting
//! on the teardown.

use std::collections::BTreeMap;
use std::io::Cursor;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::protocol::messages::{ReadVersionedType, RequestBody, WriteVersionedType};

use super::{BrokerConnection, Error, Result};

#[derive(Debug, Clone, Hash, PartialEq, Eq, PartialOrd, Ord)]
struct BrokerKey {
    host: String,
    port: i32,
}

struct Slot {
    connection: Mutex<Option<Arc<BrokerConnection>>>,
}

struct Inner {
    client_id: Arc<str>,
    connect_timeout: Option<Duration>,
    slots: Mutex<BTreeMap<BrokerKey, Arc<Slot>>>,
    /// Serializes deferred disconnects: every task queued through
    /// `defer_disconnect` waits its turn on this lock before tearing its
    /// connection down, so a burst of faults runs one at a time, in the
    /// order the faults were observed, without making the caller wait.
    pending_disconnects: Mutex<()>,
}

/// Owns every broker connection this client has opened, keyed by address.
pub struct ConnectionManager {
    inner: Arc<Inner>,
}

impl ConnectionManager {
    pub fn new(client_id: Arc<str>, connect_timeout: Option<Duration>) -> Self {
        Self {
            inner: Arc::new(Inner {
                client_id,
                connect_timeout,
                slots: Mutex::new(BTreeMap::new()),
                pending_disconnects: Mutex::new(()),
            }),
        }
    }

    /// Returns the connection for `host:port`, dialing it if this is the
    /// first request for that address.
    pub async fn get_or_connect(&self, host: &str, port: i32) -> Result<Arc<BrokerConnection>> {
        get_or_connect(&self.inner, host, port).await
    }

    /// Drops the cached connection for `host:port`, if any. In-flight
    /// requests already holding an `Arc<BrokerConnection>` keep working
    /// until they finish; only the pool's reference is released, so the
    /// next call to `get_or_connect` dials fresh.
    pub async fn disconnect(&self, host: &str, port: i32) {
        disconnect_key(
            &self.inner,
            &BrokerKey {
                host: host.to_string(),
                port,
            },
        )
        .await;
    }

    /// Disconnects from every broker, in address order (lowest host:port
    /// first), so teardown is deterministic when observed from logs.
    pub async fn disconnect_all(&self) {
        let keys: Vec<BrokerKey> = self.inner.slots.lock().await.keys().cloned().collect();
        for key in keys {
            disconnect_key(&self.inner, &key).await;
        }
    }

    /// Queues a disconnect for `host:port` without waiting for it. Spawns a
    /// task that joins the pending-disconnect chain, so it runs after every
    /// disconnect queued before it and before any queued after it, but
    /// never blocks the caller that detected the fault.
    pub fn defer_disconnect(&self, host: &str, port: i32) {
        let inner = Arc::clone(&self.inner);
        let key = BrokerKey {
            host: host.to_string(),
            port,
        };
        tokio::spawn(async move {
            let _serial = inner.pending_disconnects.lock().await;
            disconnect_key(&inner, &key).await;
        });
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.slots.lock().await.is_empty()
    }

    /// Walks `addresses` in order, dialing (or reusing) each connection and
    /// issuing `request` on it, until one returns a response. If every
    /// address fails, returns [`Error::MetadataRefreshFailed`].
    pub async fn ask_for_metadata<Req>(
        &self,
        addresses: &[(String, i32)],
        request: &Req,
    ) -> Result<Req::ResponseBody>
    where
        Req: RequestBody,
        for<'a> Req: WriteVersionedType<Cursor<&'a mut Vec<u8>>>,
        Req::ResponseBody: ReadVersionedType<Cursor<Vec<u8>>>,
    {
        for (host, port) in addresses {
            let outcome = async {
                let conn = get_or_connect(&self.inner, host, port).await?;
                conn.send(request).await
            }
            .await;

            match outcome {
                Ok(response) => return Ok(response),
                Err(e) => {
                    debug!(host, port, error = %e, "Metadata request failed, trying next broker");
                }
            }
        }

        warn!("Metadata request failed against every candidate broker");
        Err(Error::MetadataRefreshFailed)
    }
}

async fn get_or_connect(inner: &Inner, host: &str, port: i32) -> Result<Arc<BrokerConnection>> {
    let key = BrokerKey {
        host: host.to_string(),
        port,
    };

    let slot = {
        let mut slots = inner.slots.lock().await;
        Arc::clone(slots.entry(key).or_insert_with(|| {
            Arc::new(Slot {
                connection: Mutex::new(None),
            })
        }))
    };

    let mut guard = slot.connection.lock().await;
    if let Some(conn) = guard.as_ref() {
        return Ok(Arc::clone(conn));
    }

    info!(host, port, "Opening broker connection");
    let conn = Arc::new(
        BrokerConnection::connect(host, port, Arc::clone(&inner.client_id), inner.connect_timeout)
            .await?,
    );
    *guard = Some(Arc::clone(&conn));
    Ok(conn)
}

async fn disconnect_key(inner: &Inner, key: &BrokerKey) {
    let slots = inner.slots.lock().await;
    if let Some(slot) = slots.get(key) {
        let mut guard = slot.connection.lock().await;
        if guard.take().is_some() {
            warn!(host = %key.host, port = key.port, "Disconnected from broker");
        }
    }
}

/// Parses a `host:port` bootstrap string. Used to seed the connection
/// manager and the metadata manager with their first broker address.
pub fn parse_host_port(addr: &str) -> Result<(String, i32)> {
    let mut parts = addr.rsplitn(2, ':');
    let port = parts
        .next()
        .ok_or_else(|| Error::Transport(super::transport::Error::InvalidHostPort(addr.to_string())))?;
    let host = parts
        .next()
        .ok_or_else(|| Error::Transport(super::transport::Error::InvalidHostPort(addr.to_string())))?;
    let port: i32 = port
        .parse()
        .map_err(|_| Error::Transport(super::transport::Error::InvalidHostPort(addr.to_string())))?;
    Ok((host.to_string(), port))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_host_and_port() {
        assert_eq!(
            parse_host_port("localhost:9092").unwrap(),
            ("localhost".to_string(), 9092)
        );
    }

    #[test]
    fn rejects_missing_port() {
        assert!(parse_host_port("localhost").is_err());
    }
}
