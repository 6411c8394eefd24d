use std::sync::Arc;
use std::time::Duration;

use oxikafka::{AckPolicy, Producer, ProducerBuilder};

const TOPIC: &str = "test";

#[tokio::main]
async fn main() {
    let brokers = vec!["localhost:9010".to_string(), "localhost:9011".to_string()];
    let producer = ProducerBuilder::new(brokers)
        .acks(AckPolicy::All)
        .linger(Duration::from_secs(5))
        .build()
        .unwrap();
    producer.init().await.unwrap();

    let producer = Arc::new(producer);
    tokio::spawn(produce_forever(producer.clone(), 0));
    tokio::spawn(produce_forever(producer.clone(), 1));
    tokio::spawn(produce_forever(producer.clone(), 2));

    tokio::time::sleep(Duration::from_secs(10000)).await;
    producer.disconnect().await;
}

async fn produce_forever(producer: Arc<Producer>, worker: usize) {
    let mut index = 0u64;
    loop {
        let value = format!("hello: {worker} {index}").into_bytes();
        match producer.produce(TOPIC, None, Some(value)).await {
            Ok(()) => println!("worker: {worker}, index: {index}, acked"),
            Err(e) => eprintln!("worker: {worker}, index: {index}, failed: {e}"),
        }
        index += 1;
        tokio::time::sleep(Duration::from_secs(1)).await;
    }
}
