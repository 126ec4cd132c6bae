//! Process bootstrap for the conversation orchestration service.
//!
//! Headless worker: no HTTP surface. Conversations are started from two
//! ingestion paths — the store's `topic_queue` FIFO list (polled) and the
//! `conversation.new` bus topic (consumed) — both driving the same
//! `ConversationManager::start_new_conversation`. Production topic
//! ingestion itself lives outside this service.

use orc_bus::{EventConsumer, EventProducer};
use orc_domain::config::Config;
use orc_domain::topic::Topic;
use orc_manager::ConversationManager;
use orc_providers::LlmClientFactory;
use orc_store::RedisStore;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

const TOPIC_QUEUE_KEY: &str = "topic_queue";
const QUEUE_POLL_INTERVAL: Duration = Duration::from_secs(2);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env()?;

    let filter = tracing_subscriber::EnvFilter::try_new(&config.logging.level)
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    if config.logging.json {
        tracing_subscriber::fmt().with_env_filter(filter).json().init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }

    tracing::info!(app = %config.app.name, version = %config.app.version, "starting orchestration service");

    let store = Arc::new(RedisStore::connect(&config.store.url(), config.store.conversation_ttl_seconds).await?);
    let providers = Arc::new(LlmClientFactory::from_config(&config)?);
    let producer = Arc::new(EventProducer::new(&config.bus)?);

    let manager = Arc::new(ConversationManager::new(
        store.clone(),
        providers.clone(),
        producer.clone(),
        config.conversation.clone(),
        config.bus.clone(),
    ));

    let mut consumer = EventConsumer::new(&config.bus)?;
    let consumer_manager = manager.clone();
    consumer.register_handler(
        &config.bus.topic_conversation_new,
        Arc::new(move |value: serde_json::Value| {
            let manager = consumer_manager.clone();
            Box::pin(async move {
                let conversation_id = value
                    .get("conversation_id")
                    .and_then(|v| v.as_str())
                    .map(str::to_string)
                    .unwrap_or_else(|| Uuid::new_v4().to_string());
                let topic = value
                    .get("topic")
                    .and_then(|v| v.as_str())
                    .ok_or_else(|| "conversation.new event missing topic".to_string())?
                    .to_string();
                let source = value
                    .get("source")
                    .and_then(|v| v.as_str())
                    .map(str::to_string);
                manager.start_new_conversation(conversation_id, topic, source).await;
                Ok(())
            })
        }),
    );
    consumer.subscribe()?;

    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();
    let bus_task = tokio::spawn(async move {
        if let Err(e) = consumer.run(shutdown_rx).await {
            tracing::error!(error = %e, "bus consumer loop exited with error");
        }
    });

    let queue_manager = manager.clone();
    let queue_store = store.clone();
    let queue_task = tokio::spawn(async move {
        loop {
            match queue_store.pop_topic(TOPIC_QUEUE_KEY).await {
                Ok(Some(topic)) => {
                    let conversation_id = Uuid::new_v4().to_string();
                    spawn_from_topic(&queue_manager, conversation_id, topic).await;
                }
                Ok(None) => tokio::time::sleep(QUEUE_POLL_INTERVAL).await,
                Err(e) => {
                    tracing::warn!(error = %e, "topic queue poll failed");
                    tokio::time::sleep(QUEUE_POLL_INTERVAL).await;
                }
            }
        }
    });

    tokio::signal::ctrl_c().await?;
    tracing::info!("shutdown signal received");
    let _ = shutdown_tx.send(());
    queue_task.abort();
    let _ = bus_task.await;

    Ok(())
}

async fn spawn_from_topic(manager: &Arc<ConversationManager>, conversation_id: String, topic: Topic) {
    manager.start_new_conversation(conversation_id, topic.topic, topic.source).await;
}
