//! End-to-end tests against a real broker. The `#[ignore]`d tests need
//! `KAFKA_CONNECT` (default `localhost:9092`) pointed at a broker with a
//! topic named `oxikafka-test` already created.

use once_cell::sync::Lazy;
use oxikafka::{AckPolicy, ProducerBuilder};

static LOGGING: Lazy<()> = Lazy::new(|| {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
});

fn maybe_start_logging() {
    Lazy::force(&LOGGING);
}

fn connect_string() -> String {
    std::env::var("KAFKA_CONNECT").unwrap_or_else(|_| "localhost:9092".to_string())
}

#[test]
fn builder_validates_bootstrap_servers_without_a_broker() {
    maybe_start_logging();

    assert!(ProducerBuilder::new(vec![]).build().is_err());
    assert!(ProducerBuilder::new(vec!["not-a-host-port".to_string()])
        .build()
        .is_err());
    assert!(ProducerBuilder::new(vec!["localhost:9092".to_string()])
        .build()
        .is_ok());
}

#[ignore]
#[tokio::test]
async fn produce_and_acknowledge_a_record() {
    maybe_start_logging();

    let producer = ProducerBuilder::new(vec![connect_string()])
        .acks(AckPolicy::All)
        .build()
        .expect("valid configuration");
    producer.init().await.expect("bootstrap succeeds");

    producer
        .produce("oxikafka-test", None, Some(b"hello".to_vec()))
        .await
        .expect("record is acknowledged");

    producer.disconnect().await;
}

#[ignore]
#[tokio::test]
async fn produce_many_records_concurrently() {
    maybe_start_logging();

    let producer = ProducerBuilder::new(vec![connect_string()])
        .acks(AckPolicy::Leader)
        .build()
        .expect("valid configuration");
    producer.init().await.expect("bootstrap succeeds");

    let mut handles = Vec::new();
    for i in 0..50 {
        let value = format!("record-{i}").into_bytes();
        handles.push(producer.produce("oxikafka-test", None, Some(value)));
    }
    for result in futures::future::join_all(handles).await {
        result.expect("record is acknowledged");
    }

    producer.disconnect().await;
}
