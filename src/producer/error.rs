//! The producer-facing error type: every fallible producer operation
//! resolves to one of these three kinds, per the configuration/transport/
//! protocol taxonomy.

use thiserror::Error;

use super::sender::ProduceError as SendError;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// Rejected at construction: invalid or inconsistent properties.
    #[error("Invalid producer configuration: {0}")]
    Config(String),

    /// A connection-level failure (transport or malformed response).
    #[error(transparent)]
    Connection(#[from] crate::connection::Error),

    /// A record's terminal Kafka-level failure.
    #[error(transparent)]
    Produce(#[from] SendError),
}
