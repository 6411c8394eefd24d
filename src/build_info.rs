//! Default constants a [`crate::ProducerBuilder`] falls back to when a
//! caller doesn't override them.

pub const DEFAULT_CLIENT_ID: &str = "oxikafka";

pub const DEFAULT_CONNECT_TIMEOUT_MS: u64 = 10_000;

pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 500;

pub const DEFAULT_METADATA_REFRESH_INTERVAL_MS: u64 = 5 * 60 * 1000;

pub const DEFAULT_BUFFER_MEMORY_BYTES: usize = 32 * 1024 * 1024;

pub const DEFAULT_BATCH_SIZE_BYTES: usize = 16384;

pub const DEFAULT_RETRIES: u32 = 10;

pub const DEFAULT_LINGER_MS: u64 = 0;
