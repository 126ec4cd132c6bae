//! Event producer.
//!
//! Ordered per-key delivery via `rdkafka`'s idempotent producer with a
//! single in-flight request per connection; bounded retries with linear
//! backoff (`retry_delay * (attempt + 1)`).

use orc_domain::config::BusConfig;
use orc_domain::error::{Error, Result};
use rdkafka::config::ClientConfig;
use rdkafka::producer::{FutureProducer, FutureRecord};
use serde::Serialize;
use std::time::Duration;

pub struct EventProducer {
    producer: FutureProducer,
    max_retries: u32,
    retry_delay_seconds: f64,
}

impl EventProducer {
    pub fn new(config: &BusConfig) -> Result<Self> {
        let producer: FutureProducer = ClientConfig::new()
            .set("bootstrap.servers", &config.bootstrap_servers)
            .set("enable.idempotence", "true")
            .set("max.in.flight.requests.per.connection", "1")
            .set("compression.type", "gzip")
            .set("linger.ms", "10")
            .create()
            .map_err(|e| Error::Bus(e.to_string()))?;
        Ok(Self {
            producer,
            max_retries: config.max_retries,
            retry_delay_seconds: config.retry_delay_seconds,
        })
    }

    /// Sends with the key so the broker preserves per-conversation ordering
    /// within a partition.
    pub async fn send_event<T: Serialize>(&self, topic: &str, key: &str, payload: &T) -> bool {
        let body = match serde_json::to_vec(payload) {
            Ok(b) => b,
            Err(_) => return false,
        };

        for attempt in 0..self.max_retries {
            let record = FutureRecord::to(topic).key(key).payload(&body);
            match self
                .producer
                .send(record, Duration::from_secs(5))
                .await
            {
                Ok(_) => return true,
                Err((err, _)) => {
                    tracing::warn!(topic, attempt, error = %err, "event send failed");
                    if attempt < self.max_retries - 1 {
                        let delay = self.retry_delay_seconds * (attempt as f64 + 1.0);
                        tokio::time::sleep(Duration::from_secs_f64(delay)).await;
                    } else {
                        return false;
                    }
                }
            }
        }
        false
    }

    pub async fn send_batch<T: Serialize>(&self, topic: &str, items: &[(String, T)]) -> Vec<bool> {
        let mut results = Vec::with_capacity(items.len());
        for (key, payload) in items {
            results.push(self.send_event(topic, key, payload).await);
        }
        results
    }
}
