//! Event consumer and handler dispatch.
//!
//! A handler returning an error routes the raw message to `{topic}.dlq`;
//! the offset is only committed once the handler succeeds, or once the
//! dead-letter send itself succeeds.

use orc_domain::config::BusConfig;
use orc_domain::error::{Error, Result};
use orc_domain::events::DeadLetter;
use rdkafka::config::ClientConfig;
use rdkafka::consumer::{CommitMode, Consumer, StreamConsumer};
use rdkafka::message::Message;
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::producer::EventProducer;

type HandlerFuture = Pin<Box<dyn Future<Output = std::result::Result<(), String>> + Send>>;
pub type Handler = Arc<dyn Fn(serde_json::Value) -> HandlerFuture + Send + Sync>;

pub struct EventConsumer {
    consumer: StreamConsumer,
    producer: EventProducer,
    handlers: HashMap<String, Handler>,
}

impl EventConsumer {
    pub fn new(config: &BusConfig) -> Result<Self> {
        let consumer: StreamConsumer = ClientConfig::new()
            .set("bootstrap.servers", &config.bootstrap_servers)
            .set("group.id", &config.consumer_group_id)
            .set("auto.offset.reset", &config.auto_offset_reset)
            .set("enable.auto.commit", "false")
            .create()
            .map_err(|e| Error::Bus(e.to_string()))?;
        let producer = EventProducer::new(config)?;
        Ok(Self {
            consumer,
            producer,
            handlers: HashMap::new(),
        })
    }

    pub fn register_handler(&mut self, topic: &str, handler: Handler) {
        self.handlers.insert(topic.to_string(), handler);
    }

    pub fn subscribe(&self) -> Result<()> {
        let topics: Vec<&str> = self.handlers.keys().map(String::as_str).collect();
        self.consumer
            .subscribe(&topics)
            .map_err(|e| Error::Bus(e.to_string()))
    }

    /// Drives the consume loop until `shutdown` resolves. Each message is
    /// dispatched to the handler registered for its topic; messages on
    /// topics with no registered handler are committed and skipped.
    pub async fn run(&self, mut shutdown: tokio::sync::oneshot::Receiver<()>) -> Result<()> {
        loop {
            tokio::select! {
                _ = &mut shutdown => return Ok(()),
                received = self.consumer.recv() => {
                    let message = match received {
                        Ok(m) => m,
                        Err(e) => {
                            tracing::warn!(error = %e, "consumer recv error");
                            continue;
                        }
                    };
                    self.process_message(&message).await;
                }
            }
        }
    }

    async fn process_message(&self, message: &rdkafka::message::BorrowedMessage<'_>) {
        let topic = message.topic().to_string();
        let payload = match message.payload() {
            Some(p) => p,
            None => {
                let _ = self.consumer.commit_message(message, CommitMode::Sync);
                return;
            }
        };
        let value: serde_json::Value = match serde_json::from_slice(payload) {
            Ok(v) => v,
            Err(e) => {
                if self.send_to_dlq(&topic, serde_json::Value::Null, &e.to_string()).await {
                    let _ = self.consumer.commit_message(message, CommitMode::Sync);
                } else {
                    tracing::error!(topic, "dead-letter send failed, leaving offset uncommitted for redelivery");
                }
                return;
            }
        };

        let Some(handler) = self.handlers.get(&topic) else {
            let _ = self.consumer.commit_message(message, CommitMode::Sync);
            return;
        };

        match handler(value.clone()).await {
            Ok(()) => {
                if let Err(e) = self.consumer.commit_message(message, CommitMode::Sync) {
                    tracing::error!(topic, error = %e, "offset commit failed after handler success");
                }
            }
            Err(err) => {
                if self.send_to_dlq(&topic, value, &err).await {
                    if let Err(e) = self.consumer.commit_message(message, CommitMode::Sync) {
                        tracing::error!(topic, error = %e, "offset commit failed after dead-letter send");
                    }
                } else {
                    tracing::error!(topic, "dead-letter send failed, leaving offset uncommitted for redelivery");
                }
            }
        }
    }

    /// Returns whether the dead letter was delivered. The offset must stay
    /// uncommitted when this fails so the message is redelivered.
    async fn send_to_dlq(&self, topic: &str, original_message: serde_json::Value, error: &str) -> bool {
        let dlq_topic = BusConfig::dlq_topic(topic);
        let envelope = DeadLetter {
            original_topic: topic.to_string(),
            original_message,
            error: error.to_string(),
            timestamp: chrono::Utc::now(),
        };
        let sent = self.producer.send_event(&dlq_topic, topic, &envelope).await;
        if !sent {
            tracing::error!(topic, "failed to route message to dead-letter queue");
        }
        sent
    }
}
