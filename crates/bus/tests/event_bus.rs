//! Construction and dead-letter-routing tests. Anything that requires an
//! actual broker round trip is `#[ignore]`d — set `KAFKA_TEST_BROKERS` and
//! run with `--ignored` against a disposable Kafka.

use orc_bus::consumer::EventConsumer;
use orc_bus::producer::EventProducer;
use orc_domain::config::BusConfig;

fn test_config() -> BusConfig {
    BusConfig {
        bootstrap_servers: std::env::var("KAFKA_TEST_BROKERS").unwrap_or_else(|_| "localhost:9092".into()),
        consumer_group_id: "orchestration-service-test".into(),
        auto_offset_reset: "earliest".into(),
        enable_auto_commit: false,
        topic_conversation_new: "conversation.new".into(),
        topic_conversation_turn: "conversation.turn".into(),
        topic_conversation_response: "conversation.response".into(),
        topic_conversation_completed: "conversation.completed".into(),
        topic_conversation_error: "conversation.error".into(),
        max_retries: 3,
        retry_delay_seconds: 0.01,
    }
}

#[test]
fn producer_builds_from_config() {
    assert!(EventProducer::new(&test_config()).is_ok());
}

#[test]
fn consumer_builds_and_registers_handlers() {
    let mut consumer = EventConsumer::new(&test_config()).unwrap();
    consumer.register_handler(
        "conversation.new",
        std::sync::Arc::new(|_value| Box::pin(async { Ok(()) })),
    );
    consumer.register_handler(
        "conversation.turn",
        std::sync::Arc::new(|_value| Box::pin(async { Err("boom".to_string()) })),
    );
    assert!(consumer.subscribe().is_ok());
}

#[tokio::test]
#[ignore]
async fn handler_failure_routes_to_dead_letter_topic() {
    let config = test_config();
    let producer = EventProducer::new(&config).unwrap();
    let sent = producer
        .send_event("conversation.turn", "it-1", &serde_json::json!({"turn_number": 1}))
        .await;
    assert!(sent);

    let mut consumer = EventConsumer::new(&config).unwrap();
    consumer.register_handler(
        "conversation.turn",
        std::sync::Arc::new(|_value| Box::pin(async { Err("handler failed".to_string()) })),
    );
    consumer.subscribe().unwrap();

    let (tx, rx) = tokio::sync::oneshot::channel();
    let run = tokio::spawn(async move { consumer.run(rx).await });
    tokio::time::sleep(std::time::Duration::from_secs(2)).await;
    let _ = tx.send(());
    let _ = run.await;
}
