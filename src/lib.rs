//! A minimal async Kafka producer.
//!
//! ```no_run
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! use oxikafka::ProducerBuilder;
//!
//! let producer = ProducerBuilder::new(vec!["localhost:9092".to_string()]).build()?;
//! producer.init().await?;
//! producer.produce("orders", None, Some(b"hello".to_vec())).await?;
//! producer.disconnect().await;
//! # Ok(())
//! # }
//! ```

pub mod backoff;
pub mod build_info;
pub mod connection;
pub mod metadata;
pub mod partitioner;
pub mod producer;
pub mod protocol;

pub use connection::Error as ConnectionError;
pub use partitioner::{BasicRandom, Partitioner, RoundRobin};
pub use producer::error::{Error, Result};
pub use producer::sender::AckPolicy;
pub use producer::{Producer, ProducerBuilder, ProducerConfig};
