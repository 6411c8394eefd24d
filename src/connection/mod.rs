//! A single broker connection: TCP framing, correlation-id multiplexing,
//! and the `ApiVersions` handshake every connection performs before it is
//! usable.
//!
//! Requests and responses are pipelined: a caller doesn't have to wait for
//! one response before sending the next request. Kafka guarantees
//! responses arrive in the order requests were sent on a given connection,
//! so ordering is preserved with two single-slot locks (one gating writes,
//! one gating reads) rather than a full request/response matching table --
//! whichever task acquires the read lock next is guaranteed to be waiting
//! for the next response in line.

use std::io::Cursor;
use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::protocol::{
    api_version::ApiVersion,
    messages::{
        api_versions::{ApiVersionsRequest, ApiVersionsResponse},
        header::{RequestHeader, ResponseHeader},
        ReadVersionedType, RequestBody, WriteVersionedType,
    },
    traits::{ReadType, WriteType},
};

pub mod manager;
pub mod transport;

pub use transport::Transport;

const MAX_FRAME_SIZE: i32 = 100 * 1024 * 1024;

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    #[error("Transport error: {0}")]
    Transport(#[from] transport::Error),

    #[error("I/O error: {0}")]
    IO(#[from] std::io::Error),

    #[error("Timed out waiting for a response")]
    Timeout,

    #[error("Malformed response: {0}")]
    Malformed(#[from] crate::protocol::traits::ReadError),

    #[error("Failed to encode request: {0}")]
    Encode(#[from] crate::protocol::traits::WriteError),

    #[error("Broker does not support {api_key:?} version {requested}")]
    UnsupportedApiVersion {
        api_key: crate::protocol::api_key::ApiKey,
        requested: ApiVersion,
    },

    #[error("Response frame exceeds the maximum allowed size: {0}")]
    FrameTooLarge(i32),

    #[error("Metadata refresh failed: no candidate broker returned a usable response")]
    MetadataRefreshFailed,
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// A connected, handshaken broker connection.
///
/// Construction always performs the `ApiVersions` handshake, so by the time
/// a caller holds a `BrokerConnection` it already knows what version range
/// the broker supports for every API this client speaks.
pub struct BrokerConnection {
    host: String,
    port: i32,
    client_id: Arc<str>,
    correlation_id: AtomicI32,
    write_half: Mutex<tokio::io::WriteHalf<Transport>>,
    read_half: Mutex<tokio::io::ReadHalf<Transport>>,
    api_versions: ApiVersionsResponse,
}

impl std::fmt::Debug for BrokerConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BrokerConnection")
            .field("host", &self.host)
            .field("port", &self.port)
            .finish_non_exhaustive()
    }
}

impl BrokerConnection {
    pub async fn connect(
        host: &str,
        port: i32,
        client_id: Arc<str>,
        connect_timeout: Option<Duration>,
    ) -> Result<Self> {
        let addr = format!("{host}:{port}");
        let transport = Transport::connect(&addr, connect_timeout).await?;
        let _ = transport.set_nodelay(true);

        let (read_half, write_half) = tokio::io::split(transport);

        let mut conn = Self {
            host: host.to_string(),
            port,
            client_id,
            correlation_id: AtomicI32::new(0),
            write_half: Mutex::new(write_half),
            read_half: Mutex::new(read_half),
            api_versions: ApiVersionsResponse {
                error_code: None,
                api_keys: vec![],
                throttle_time_ms: None,
            },
        };

        conn.api_versions = conn.handshake().await?;
        Ok(conn)
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> i32 {
        self.port
    }

    /// The highest version this client supports for `Req` that the broker
    /// also advertises, clamped into the broker's own supported range.
    pub fn negotiated_version<Req: RequestBody>(&self) -> Option<ApiVersion> {
        let api_key = Req::API_KEY;
        let broker_range = self
            .api_versions
            .api_keys
            .iter()
            .find(|k| k.api_key == api_key)?;

        let min = Req::API_VERSION_RANGE.min().0.max(broker_range.min_version.0);
        let max = Req::API_VERSION_RANGE.max().0.min(broker_range.max_version.0);

        (min <= max).then_some(ApiVersion(max))
    }

    async fn handshake(&mut self) -> Result<ApiVersionsResponse> {
        // The handshake itself always speaks v0: we don't yet know what the
        // broker supports.
        self.send_versioned::<ApiVersionsRequest>(&ApiVersionsRequest {}, ApiVersion(0))
            .await
    }

    /// Sends a request expecting a response, using the highest mutually
    /// supported version.
    pub async fn send<Req>(&self, request: &Req) -> Result<Req::ResponseBody>
    where
        Req: RequestBody,
        for<'a> Req: WriteVersionedType<Cursor<&'a mut Vec<u8>>>,
        Req::ResponseBody: ReadVersionedType<Cursor<Vec<u8>>>,
    {
        let version = self.negotiated_version::<Req>().ok_or(Error::UnsupportedApiVersion {
            api_key: Req::API_KEY,
            requested: Req::API_VERSION_RANGE.max(),
        })?;
        self.send_versioned(request, version).await
    }

    async fn send_versioned<Req>(&self, request: &Req, version: ApiVersion) -> Result<Req::ResponseBody>
    where
        Req: RequestBody,
        for<'a> Req: WriteVersionedType<Cursor<&'a mut Vec<u8>>>,
        Req::ResponseBody: ReadVersionedType<Cursor<Vec<u8>>>,
    {
        let correlation_id = self.correlation_id.fetch_add(1, Ordering::SeqCst);
        let frame = self.encode_frame(request, version, correlation_id)?;

        // Send and receive are queued jointly, each behind its own
        // single-slot lock, to preserve per-connection request ordering
        // without forcing strict request/response lockstep.
        let write_result = {
            let mut write_half = self.write_half.lock().await;
            write_half.write_all(&frame).await
        };

        let mut read_half = self.read_half.lock().await;

        write_result.map_err(Error::IO)?;

        let body = Self::read_frame(&mut read_half).await?;
        let mut cursor = Cursor::new(body);

        let response_header = ResponseHeader::read_versioned(&mut cursor, ApiVersion(0))
            .map_err(|e| Error::Malformed(into_read_error(e)))?;
        if response_header.correlation_id != correlation_id {
            return Err(Error::Malformed(crate::protocol::traits::ReadError::Malformed(
                format!(
                    "correlation id mismatch: expected {correlation_id}, got {}",
                    response_header.correlation_id
                )
                .into(),
            )));
        }

        Req::ResponseBody::read_versioned(&mut cursor, version)
            .map_err(|e| Error::Malformed(into_read_error(e)))
    }

    fn encode_frame<Req>(
        &self,
        request: &Req,
        version: ApiVersion,
        correlation_id: i32,
    ) -> Result<Vec<u8>>
    where
        Req: RequestBody,
        for<'a> Req: WriteVersionedType<Cursor<&'a mut Vec<u8>>>,
    {
        let header = RequestHeader {
            request_api_key: Req::API_KEY,
            request_api_version: version,
            correlation_id,
            client_id: Some(self.client_id.to_string()),
        };

        let mut body = Vec::new();
        {
            let mut cursor = Cursor::new(&mut body);
            header
                .write_versioned(&mut cursor, ApiVersion(0))
                .map_err(into_write_error)?;
            request
                .write_versioned(&mut cursor, version)
                .map_err(into_write_error)?;
        }

        let mut frame = Vec::with_capacity(body.len() + 4);
        let size = i32::try_from(body.len()).map_err(|_| {
            Error::Encode(crate::protocol::traits::WriteError::Malformed(
                "request body too large".into(),
            ))
        })?;
        size.write(&mut frame).map_err(Error::Encode)?;
        frame.extend_from_slice(&body);
        Ok(frame)
    }

    async fn read_frame(read_half: &mut tokio::io::ReadHalf<Transport>) -> Result<Vec<u8>> {
        let mut size_buf = [0u8; 4];
        read_half.read_exact(&mut size_buf).await?;
        let size = i32::from_be_bytes(size_buf);
        if size < 0 || size > MAX_FRAME_SIZE {
            return Err(Error::FrameTooLarge(size));
        }

        let mut body = vec![0u8; size as usize];
        read_half.read_exact(&mut body).await?;
        Ok(body)
    }

    /// Sends a request and, on success, interprets the write as having
    /// succeeded without waiting for (or expecting) a response. Used only
    /// for `acks=0` produce requests, where the broker sends nothing back.
    pub async fn send_without_response<Req>(&self, request: &Req) -> Result<()>
    where
        Req: RequestBody,
        for<'a> Req: WriteVersionedType<Cursor<&'a mut Vec<u8>>>,
    {
        let version = self.negotiated_version::<Req>().ok_or(Error::UnsupportedApiVersion {
            api_key: Req::API_KEY,
            requested: Req::API_VERSION_RANGE.max(),
        })?;
        let correlation_id = self.correlation_id.fetch_add(1, Ordering::SeqCst);
        let frame = self.encode_frame(request, version, correlation_id)?;

        let mut write_half = self.write_half.lock().await;
        write_half.write_all(&frame).await?;
        Ok(())
    }

    pub async fn with_timeout<F, T>(&self, timeout: Duration, fut: F) -> Result<T>
    where
        F: std::future::Future<Output = Result<T>>,
    {
        match tokio::time::timeout(timeout, fut).await {
            Ok(result) => result,
            Err(_) => {
                debug!(host = %self.host, port = self.port, "Request timed out");
                Err(Error::Timeout)
            }
        }
    }
}

fn into_read_error(
    e: crate::protocol::messages::ReadVersionedError,
) -> crate::protocol::traits::ReadError {
    match e {
        crate::protocol::messages::ReadVersionedError::ReadError(e) => e,
        crate::protocol::messages::ReadVersionedError::UnsupportedVersion { version } => {
            crate::protocol::traits::ReadError::Malformed(
                format!("unsupported version: {version}").into(),
            )
        }
    }
}

fn into_write_error(
    e: crate::protocol::messages::WriteVersionedError,
) -> Error {
    match e {
        crate::protocol::messages::WriteVersionedError::WriteError(e) => Error::Encode(e),
        other => Error::Encode(crate::protocol::traits::WriteError::Malformed(
            other.to_string().into(),
        )),
    }
}

/// Whether a broker error observed on this connection should invalidate
/// cached metadata for the affected topic/partition.
pub fn error_invalidates_metadata(error: &Option<crate::protocol::error::Error>) -> bool {
    error.map(|e| e.invalidates_metadata()).unwrap_or(false)
}

/// Thrown into per-partition results when a connection-level failure
/// (timeout, I/O error, corrupt response) means a broker never actually
/// answered. Mirrors how the wire-level error catalog represents broker
/// -reported failures, so callers can treat both uniformly.
pub fn connection_error_to_kafka_error(err: &Error) -> crate::protocol::error::Error {
    use crate::protocol::error::Error as KafkaError;
    match err {
        Error::Timeout => KafkaError::RequestTimedOut,
        Error::Malformed(_) => KafkaError::CorruptMessage,
        _ => KafkaError::NetworkException,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connection_error_maps_to_retriable_kafka_errors() {
        assert_eq!(
            connection_error_to_kafka_error(&Error::Timeout),
            crate::protocol::error::Error::RequestTimedOut
        );
        assert!(connection_error_to_kafka_error(&Error::Timeout).is_retriable());
    }
}
